//! Video identifiers: `BV…` ids, `av…` ids, bare aids, and page URLs.

use std::fmt;
use std::str::FromStr;
use url::Url;

/// Length of a BV id after the `BV` prefix.
const BVID_BODY_LEN: usize = 10;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VideoId {
    Bvid(String),
    Aid(u64),
}

impl VideoId {
    /// Query parameter for the view API.
    pub fn query_pair(&self) -> (&'static str, String) {
        match self {
            VideoId::Bvid(b) => ("bvid", b.clone()),
            VideoId::Aid(a) => ("aid", a.to_string()),
        }
    }

    fn from_token(token: &str) -> Option<Self> {
        let token = token.trim();
        if token.len() == BVID_BODY_LEN + 2
            && has_prefix(token, "bv")
            && token[2..].bytes().all(|b| b.is_ascii_alphanumeric())
        {
            return Some(VideoId::Bvid(format!("BV{}", &token[2..])));
        }
        let digits = if token.len() > 2 && has_prefix(token, "av") {
            &token[2..]
        } else {
            token
        };
        if !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()) {
            return digits.parse::<u64>().ok().filter(|&n| n > 0).map(VideoId::Aid);
        }
        None
    }

    fn from_url(url: &Url) -> Option<Self> {
        if let Some(segments) = url.path_segments() {
            for segment in segments {
                if let Some(id) = Self::from_token(segment) {
                    if matches!(id, VideoId::Bvid(_)) || has_prefix(segment, "av") {
                        return Some(id);
                    }
                }
            }
        }
        url.query_pairs().find_map(|(k, v)| match k.as_ref() {
            "bvid" | "aid" => Self::from_token(&v),
            _ => None,
        })
    }
}

/// Case-insensitive ASCII prefix check that never splits a character.
fn has_prefix(s: &str, prefix: &str) -> bool {
    s.get(..prefix.len())
        .is_some_and(|p| p.eq_ignore_ascii_case(prefix))
}

impl fmt::Display for VideoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VideoId::Bvid(b) => write!(f, "{}", b),
            VideoId::Aid(a) => write!(f, "av{}", a),
        }
    }
}

/// Input that names no recognisable video.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("not a video id or video URL: {0:?}")]
pub struct InvalidVideoId(pub String);

impl FromStr for VideoId {
    type Err = InvalidVideoId;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let parsed = if s.starts_with("http://") || s.starts_with("https://") {
            Url::parse(s).ok().and_then(|u| Self::from_url(&u))
        } else {
            Self::from_token(s)
        };
        parsed.ok_or_else(|| InvalidVideoId(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_bvid_and_normalises_prefix() {
        assert_eq!(
            "BV1xx411c7mD".parse::<VideoId>().unwrap(),
            VideoId::Bvid("BV1xx411c7mD".to_string())
        );
        assert_eq!(
            "bv1xx411c7mD".parse::<VideoId>().unwrap(),
            VideoId::Bvid("BV1xx411c7mD".to_string())
        );
    }

    #[test]
    fn parses_aid_forms() {
        assert_eq!("av170001".parse::<VideoId>().unwrap(), VideoId::Aid(170001));
        assert_eq!("AV2".parse::<VideoId>().unwrap(), VideoId::Aid(2));
        assert_eq!(" 170001 ".parse::<VideoId>().unwrap(), VideoId::Aid(170001));
    }

    #[test]
    fn parses_video_page_urls() {
        let id: VideoId = "https://www.bilibili.com/video/BV1GJ411x7h7/?spm_id_from=333"
            .parse()
            .unwrap();
        assert_eq!(id, VideoId::Bvid("BV1GJ411x7h7".to_string()));
        let id: VideoId = "https://www.bilibili.com/video/av170001".parse().unwrap();
        assert_eq!(id, VideoId::Aid(170001));
        let id: VideoId = "https://m.bilibili.com/playlist?bvid=BV1GJ411x7h7".parse().unwrap();
        assert_eq!(id, VideoId::Bvid("BV1GJ411x7h7".to_string()));
    }

    #[test]
    fn rejects_garbage() {
        for s in ["", "BV123", "av", "av0", "hello", "https://www.bilibili.com/", "BV1xx411c7m!"] {
            assert!(s.parse::<VideoId>().is_err(), "{s:?} should be rejected");
        }
    }

    #[test]
    fn query_pair_and_display() {
        assert_eq!(VideoId::Aid(5).query_pair(), ("aid", "5".to_string()));
        assert_eq!(VideoId::Aid(5).to_string(), "av5");
        let b = VideoId::Bvid("BV1GJ411x7h7".to_string());
        assert_eq!(b.query_pair().0, "bvid");
        assert_eq!(b.to_string(), "BV1GJ411x7h7");
    }
}
