//! Validated upstream settings shared by every connection task.

use axum::http::HeaderValue;
use std::time::Duration;
use url::Url;

use super::error::ProxyError;
use crate::config::UpstreamConfig;

#[derive(Debug, Clone)]
pub struct ProxyOptions {
    /// Scheme + authority without a trailing slash.
    pub(crate) default_origin: String,
    pub(crate) origin: HeaderValue,
    pub(crate) referer: HeaderValue,
    pub(crate) allowed_hosts: Vec<String>,
    pub(crate) user_agent: HeaderValue,
    pub(crate) connect_timeout: Duration,
    pub(crate) timeout: Duration,
    pub(crate) max_request_body_bytes: usize,
    pub(crate) use_system_proxy: bool,
}

fn invalid(name: &'static str, reason: impl ToString) -> ProxyError {
    ProxyError::InvalidOption {
        name,
        reason: reason.to_string(),
    }
}

fn parse_origin(name: &'static str, raw: &str) -> Result<String, ProxyError> {
    let url = Url::parse(raw.trim()).map_err(|e| invalid(name, e))?;
    if !matches!(url.scheme(), "http" | "https") || url.host_str().is_none() {
        return Err(invalid(name, "expected an http(s) origin"));
    }
    Ok(url.as_str().trim_end_matches('/').to_string())
}

impl ProxyOptions {
    pub fn from_config(cfg: &UpstreamConfig) -> Result<Self, ProxyError> {
        let default_origin = parse_origin("default_origin", &cfg.default_origin)?;
        let site = parse_origin("site_origin", &cfg.site_origin)?;
        let origin = HeaderValue::from_str(&site).map_err(|e| invalid("site_origin", e))?;
        let referer =
            HeaderValue::from_str(&format!("{}/", site)).map_err(|e| invalid("site_origin", e))?;
        let user_agent =
            HeaderValue::from_str(&cfg.user_agent).map_err(|e| invalid("user_agent", e))?;
        let allowed_hosts = cfg
            .allowed_hosts
            .iter()
            .map(|h| h.trim().trim_end_matches('.').to_ascii_lowercase())
            .filter(|h| !h.is_empty())
            .collect();
        Ok(Self {
            default_origin,
            origin,
            referer,
            allowed_hosts,
            user_agent,
            connect_timeout: Duration::from_secs(cfg.connect_timeout_secs),
            timeout: Duration::from_secs(cfg.timeout_secs),
            max_request_body_bytes: cfg.max_request_body_bytes,
            use_system_proxy: cfg.use_system_proxy,
        })
    }

    /// True when `host` is an allowed host or one of its subdomains.
    pub fn host_allowed(&self, host: &str) -> bool {
        let host = host.trim_end_matches('.').to_ascii_lowercase();
        self.allowed_hosts.iter().any(|allowed| {
            host == *allowed
                || host
                    .strip_suffix(allowed.as_str())
                    .is_some_and(|prefix| prefix.ends_with('.'))
        })
    }

    pub(crate) fn build_client(&self) -> Result<reqwest::Client, ProxyError> {
        let mut builder = reqwest::Client::builder()
            .connect_timeout(self.connect_timeout)
            .timeout(self.timeout);
        if !self.use_system_proxy {
            builder = builder.no_proxy();
        }
        Ok(builder.build()?)
    }
}
