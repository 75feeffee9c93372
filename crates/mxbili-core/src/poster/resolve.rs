//! Resolve a video id to its cover URL through the view API.

use std::collections::HashMap;
use std::time::Duration;
use url::Url;

use super::api::{ViewEnvelope, NOT_FOUND_CODES};
use super::id::{InvalidVideoId, VideoId};
use crate::config::MxbiliConfig;
use crate::reconcile::normalize_sessdata;
use crate::retry::{run_with_retry, FetchError, RetryPolicy};

/// Why a poster lookup failed. Callers typically treat all of these as
/// "no poster available".
#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    #[error(transparent)]
    InvalidId(#[from] InvalidVideoId),
    #[error("metadata request failed: {0}")]
    Network(#[source] reqwest::Error),
    #[error("metadata API returned HTTP {0}")]
    Http(u16),
    #[error("video {0} not found")]
    NotFound(VideoId),
    #[error("metadata API error {code}: {message}")]
    Api { code: i64, message: String },
    #[error("unexpected metadata response: {0}")]
    UnexpectedShape(String),
    #[error("invalid resolver setting: {0}")]
    Config(String),
}

impl From<FetchError> for ResolveError {
    fn from(e: FetchError) -> Self {
        match e {
            FetchError::Transport(e) => ResolveError::Network(e),
            FetchError::Status(code) => ResolveError::Http(code),
        }
    }
}

/// A resolved cover image.
#[derive(Debug, Clone)]
pub struct PosterDescriptor {
    pub video: VideoId,
    pub title: String,
    /// Direct CDN URL of the image.
    pub url: Url,
    /// Headers a direct fetch of `url` needs (referer, optional cookie).
    pub headers: HashMap<String, String>,
}

impl PosterDescriptor {
    /// URL that fetches the same image through the local proxy on `port`.
    pub fn proxied_url(&self, port: u16) -> String {
        let host = match (self.url.host_str(), self.url.port()) {
            (Some(h), Some(p)) => format!("/{}:{}", h, p),
            (Some(h), None) => format!("/{}", h),
            (None, _) => String::new(),
        };
        let query = self.url.query().map(|q| format!("?{}", q)).unwrap_or_default();
        format!("http://127.0.0.1:{}{}{}{}", port, host, self.url.path(), query)
    }
}

/// Upgrade `http://` and protocol-relative cover URLs to https.
fn normalize_pic(pic: &str) -> Result<Url, ResolveError> {
    let pic = pic.trim();
    let absolute = if let Some(rest) = pic.strip_prefix("//") {
        format!("https://{}", rest)
    } else if let Some(rest) = pic.strip_prefix("http://") {
        format!("https://{}", rest)
    } else {
        pic.to_string()
    };
    Url::parse(&absolute).map_err(|e| ResolveError::UnexpectedShape(format!("pic {:?}: {}", pic, e)))
}

/// Map a decoded envelope to a descriptor or a typed failure.
fn descriptor_from(
    video: &VideoId,
    envelope: ViewEnvelope,
    headers: HashMap<String, String>,
) -> Result<PosterDescriptor, ResolveError> {
    if NOT_FOUND_CODES.contains(&envelope.code) {
        return Err(ResolveError::NotFound(video.clone()));
    }
    if envelope.code != 0 {
        return Err(ResolveError::Api {
            code: envelope.code,
            message: envelope.message,
        });
    }
    let data = envelope
        .data
        .ok_or_else(|| ResolveError::UnexpectedShape("missing data".to_string()))?;
    let pic = data
        .pic
        .filter(|p| !p.trim().is_empty())
        .ok_or_else(|| ResolveError::UnexpectedShape("missing data.pic".to_string()))?;
    let video = match (data.bvid, data.aid) {
        (Some(b), _) if !b.is_empty() => VideoId::Bvid(b),
        (_, Some(a)) if a > 0 => VideoId::Aid(a),
        _ => video.clone(),
    };
    Ok(PosterDescriptor {
        video,
        title: data.title,
        url: normalize_pic(&pic)?,
        headers,
    })
}

/// Looks up cover images via `{api_base}/x/web-interface/view`.
#[derive(Debug, Clone)]
pub struct PosterResolver {
    client: reqwest::Client,
    view_url: Url,
    referer: String,
    user_agent: String,
    sessdata: Option<String>,
    retry: RetryPolicy,
}

impl PosterResolver {
    pub fn new(cfg: &MxbiliConfig) -> Result<Self, ResolveError> {
        let base = cfg.resolver.api_base.trim_end_matches('/');
        let view_url = Url::parse(&format!("{}/x/web-interface/view", base))
            .map_err(|e| ResolveError::Config(format!("api_base {:?}: {}", cfg.resolver.api_base, e)))?;
        let mut builder = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(cfg.upstream.connect_timeout_secs))
            .timeout(Duration::from_secs(cfg.upstream.timeout_secs));
        if !cfg.upstream.use_system_proxy {
            builder = builder.no_proxy();
        }
        let client = builder
            .build()
            .map_err(|e| ResolveError::Config(e.to_string()))?;
        Ok(Self {
            client,
            view_url,
            referer: format!("{}/", cfg.upstream.site_origin.trim_end_matches('/')),
            user_agent: cfg.upstream.user_agent.clone(),
            sessdata: normalize_sessdata(cfg.sessdata.as_deref()),
            retry: cfg.retry_policy(),
        })
    }

    /// Use `sessdata` instead of the configured cookie.
    pub fn with_sessdata(mut self, sessdata: Option<&str>) -> Self {
        self.sessdata = normalize_sessdata(sessdata);
        self
    }

    fn request_headers(&self) -> HashMap<String, String> {
        let mut headers = HashMap::new();
        headers.insert("Referer".to_string(), self.referer.clone());
        headers.insert("User-Agent".to_string(), self.user_agent.clone());
        if let Some(s) = &self.sessdata {
            headers.insert("Cookie".to_string(), format!("SESSDATA={}", s));
        }
        headers
    }

    async fn fetch_view(&self, video: &VideoId) -> Result<Vec<u8>, FetchError> {
        let (key, value) = video.query_pair();
        let mut request = self
            .client
            .get(self.view_url.clone())
            .query(&[(key, value)]);
        for (name, value) in self.request_headers() {
            request = request.header(name, value);
        }
        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }
        Ok(response.bytes().await?.to_vec())
    }

    pub async fn resolve(&self, video: &VideoId) -> Result<PosterDescriptor, ResolveError> {
        tracing::debug!(%video, "resolving poster");
        let body = run_with_retry(&self.retry, || self.fetch_view(video)).await?;
        let envelope: ViewEnvelope = serde_json::from_slice(&body)
            .map_err(|e| ResolveError::UnexpectedShape(e.to_string()))?;
        let poster = descriptor_from(video, envelope, self.request_headers())?;
        tracing::debug!(%video, url = %poster.url, "poster resolved");
        Ok(poster)
    }

    /// Parse `input` (id or video URL) and resolve it.
    pub async fn resolve_str(&self, input: &str) -> Result<PosterDescriptor, ResolveError> {
        let video: VideoId = input.parse()?;
        self.resolve(&video).await
    }

    /// Like [`resolve_str`](Self::resolve_str), but a failure is logged and
    /// reported as "no poster".
    pub async fn resolve_or_none(&self, input: &str) -> Option<PosterDescriptor> {
        match self.resolve_str(input).await {
            Ok(p) => Some(p),
            Err(e) => {
                tracing::warn!(input, "no poster: {}", e);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::poster::api::ViewData;

    fn envelope(code: i64, pic: Option<&str>) -> ViewEnvelope {
        ViewEnvelope {
            code,
            message: "msg".to_string(),
            data: Some(ViewData {
                bvid: Some("BV1GJ411x7h7".to_string()),
                aid: Some(80433022),
                title: "demo".to_string(),
                pic: pic.map(str::to_string),
            }),
        }
    }

    #[test]
    fn success_upgrades_pic_to_https() {
        let video = VideoId::Aid(80433022);
        let p = descriptor_from(
            &video,
            envelope(0, Some("http://i0.hdslb.com/bfs/archive/abc.jpg")),
            HashMap::new(),
        )
        .unwrap();
        assert_eq!(p.url.as_str(), "https://i0.hdslb.com/bfs/archive/abc.jpg");
        assert_eq!(p.video, VideoId::Bvid("BV1GJ411x7h7".to_string()));
        assert_eq!(p.title, "demo");
    }

    #[test]
    fn protocol_relative_pic_is_accepted() {
        let url = normalize_pic("//i1.hdslb.com/bfs/archive/x.png").unwrap();
        assert_eq!(url.as_str(), "https://i1.hdslb.com/bfs/archive/x.png");
    }

    #[test]
    fn not_found_and_api_errors_are_typed() {
        let video = VideoId::Aid(1);
        let err = descriptor_from(&video, envelope(-404, None), HashMap::new()).unwrap_err();
        assert!(matches!(err, ResolveError::NotFound(VideoId::Aid(1))));
        let err = descriptor_from(&video, envelope(-412, None), HashMap::new()).unwrap_err();
        assert!(matches!(err, ResolveError::Api { code: -412, .. }));
    }

    #[test]
    fn missing_pic_is_unexpected_shape() {
        let video = VideoId::Aid(1);
        let err = descriptor_from(&video, envelope(0, Some("  ")), HashMap::new()).unwrap_err();
        assert!(matches!(err, ResolveError::UnexpectedShape(_)));
    }

    #[test]
    fn proxied_url_prefixes_the_cdn_host() {
        let p = descriptor_from(
            &VideoId::Aid(1),
            envelope(0, Some("https://i2.hdslb.com/bfs/archive/abc.jpg")),
            HashMap::new(),
        )
        .unwrap();
        assert_eq!(
            p.proxied_url(2233),
            "http://127.0.0.1:2233/i2.hdslb.com/bfs/archive/abc.jpg"
        );
    }

    #[test]
    fn request_headers_carry_referer_and_cookie() {
        let mut cfg = MxbiliConfig::default();
        cfg.sessdata = Some("tok".to_string());
        let r = PosterResolver::new(&cfg).unwrap();
        let h = r.request_headers();
        assert_eq!(h.get("Referer").unwrap(), "https://www.bilibili.com/");
        assert_eq!(h.get("Cookie").unwrap(), "SESSDATA=tok");
        let h = r.with_sessdata(None).request_headers();
        assert!(!h.contains_key("Cookie"));
    }
}
