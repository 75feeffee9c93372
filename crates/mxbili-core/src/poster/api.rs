//! Shape of the view API response. Only the fields the resolver reads.

use serde::Deserialize;

/// `{"code":0,"message":"0","data":{...}}`
#[derive(Debug, Clone, Deserialize)]
pub struct ViewEnvelope {
    pub code: i64,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub data: Option<ViewData>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ViewData {
    #[serde(default)]
    pub bvid: Option<String>,
    #[serde(default)]
    pub aid: Option<u64>,
    #[serde(default)]
    pub title: String,
    /// Cover image URL; sometimes `http://` or protocol-relative.
    #[serde(default)]
    pub pic: Option<String>,
}

/// Codes the API uses for deleted, hidden or never-existing videos.
pub(crate) const NOT_FOUND_CODES: [i64; 3] = [-404, 62002, 62004];
