//! Per-request forwarding: pick the upstream URL, rewrite headers, stream the
//! response back.
//!
//! Failures here are confined to the request that caused them. The handler
//! always produces a response; it never returns an error to the listener.

use axum::body::{self, Body};
use axum::extract::{Request, State};
use axum::http::header::{
    self, HeaderMap, HeaderName, HeaderValue, CONTENT_LENGTH, COOKIE, HOST, ORIGIN, REFERER,
    USER_AGENT,
};
use axum::http::{StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use std::sync::{Arc, RwLock};
use url::Url;

use super::options::ProxyOptions;

/// State shared by every connection of one proxy server.
#[derive(Debug)]
pub(crate) struct ProxyState {
    pub(crate) options: ProxyOptions,
    pub(crate) client: reqwest::Client,
    cookie: RwLock<Option<String>>,
}

impl ProxyState {
    pub(crate) fn new(options: ProxyOptions, client: reqwest::Client, cookie: Option<String>) -> Self {
        Self {
            options,
            client,
            cookie: RwLock::new(cookie),
        }
    }

    pub(crate) fn cookie(&self) -> Option<String> {
        self.cookie
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub(crate) fn set_cookie(&self, cookie: Option<String>) {
        *self
            .cookie
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = cookie;
    }
}

/// Why a single request could not be forwarded.
#[derive(Debug, thiserror::Error)]
pub enum ForwardError {
    #[error("host {0} is not an allowed upstream")]
    ForbiddenHost(String),
    #[error("bad request target: {0}")]
    BadTarget(String),
    #[error("request body rejected: {0}")]
    Body(String),
    #[error("upstream request failed: {0}")]
    Upstream(#[from] reqwest::Error),
}

impl ForwardError {
    pub fn status(&self) -> StatusCode {
        match self {
            ForwardError::ForbiddenHost(_) => StatusCode::FORBIDDEN,
            ForwardError::BadTarget(_) => StatusCode::BAD_REQUEST,
            ForwardError::Body(_) => StatusCode::PAYLOAD_TOO_LARGE,
            ForwardError::Upstream(e) if e.is_timeout() => StatusCode::GATEWAY_TIMEOUT,
            ForwardError::Upstream(_) => StatusCode::BAD_GATEWAY,
        }
    }
}

impl IntoResponse for ForwardError {
    fn into_response(self) -> Response {
        (self.status(), self.to_string()).into_response()
    }
}

/// Headers that describe one hop and must not be replayed on the next.
const HOP_BY_HOP: [HeaderName; 7] = [
    header::CONNECTION,
    header::PROXY_AUTHENTICATE,
    header::PROXY_AUTHORIZATION,
    header::TE,
    header::TRAILER,
    header::TRANSFER_ENCODING,
    header::UPGRADE,
];

fn is_hop_by_hop(name: &HeaderName, connection_tokens: &[String]) -> bool {
    HOP_BY_HOP.contains(name)
        || matches!(name.as_str(), "keep-alive" | "proxy-connection")
        || connection_tokens.iter().any(|t| t == name.as_str())
}

/// Header names listed in `Connection:` are hop-by-hop too.
fn connection_tokens(headers: &HeaderMap) -> Vec<String> {
    headers
        .get_all(header::CONNECTION)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .map(|t| t.trim().to_ascii_lowercase())
        .filter(|t| !t.is_empty())
        .collect()
}

/// Choose the upstream URL for an inbound request target.
///
/// - absolute-form (`GET http://host/p`): that URL, if the host is allowed;
/// - `/<allowed-host>/rest`: `https://<allowed-host>/rest`;
/// - anything else: the default CDN origin with the same path and query.
pub fn resolve_target(uri: &Uri, options: &ProxyOptions) -> Result<Url, ForwardError> {
    if uri.scheme().is_some() {
        let url = Url::parse(&uri.to_string()).map_err(|e| ForwardError::BadTarget(e.to_string()))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(ForwardError::BadTarget(format!("unsupported scheme {}", url.scheme())));
        }
        let host = url
            .host_str()
            .ok_or_else(|| ForwardError::BadTarget(uri.to_string()))?;
        if !options.host_allowed(host) {
            return Err(ForwardError::ForbiddenHost(host.to_string()));
        }
        return Ok(url);
    }

    let path = uri.path();
    let query = uri.query().map(|q| format!("?{}", q)).unwrap_or_default();
    let trimmed = path.trim_start_matches('/');
    let (first, rest) = trimmed.split_once('/').unwrap_or((trimmed, ""));
    let first_host = first.split(':').next().unwrap_or(first);
    if !(first_host.contains('.') && options.host_allowed(first_host)) {
        let raw = format!("{}{}{}", options.default_origin, path, query);
        return Url::parse(&raw).map_err(|e| ForwardError::BadTarget(e.to_string()));
    }

    // The segment becomes the authority; only `host[:port]` may pass.
    let port_ok = match first.split_once(':') {
        Some((_, port)) => !port.is_empty() && port.bytes().all(|b| b.is_ascii_digit()),
        None => true,
    };
    if !port_ok || first.contains(['@', '\\', '%']) {
        return Err(ForwardError::ForbiddenHost(first.to_string()));
    }
    let url = Url::parse(&format!("https://{}/{}{}", first, rest, query))
        .map_err(|e| ForwardError::BadTarget(e.to_string()))?;
    match url.host_str() {
        Some(host) if url.username().is_empty() && options.host_allowed(host) => Ok(url),
        host => Err(ForwardError::ForbiddenHost(host.unwrap_or(first).to_string())),
    }
}

/// Copy of the inbound headers with the platform's cookie, referer and origin
/// injected. Inbound cookies are dropped; without a session cookie none is sent.
pub fn upstream_headers(
    inbound: &HeaderMap,
    cookie: Option<&str>,
    options: &ProxyOptions,
) -> HeaderMap {
    let tokens = connection_tokens(inbound);
    let mut out = HeaderMap::with_capacity(inbound.len() + 3);
    for (name, value) in inbound {
        if is_hop_by_hop(name, &tokens)
            || name == HOST
            || name == COOKIE
            || name == REFERER
            || name == ORIGIN
            || name == CONTENT_LENGTH
        {
            continue;
        }
        out.append(name.clone(), value.clone());
    }
    out.insert(REFERER, options.referer.clone());
    out.insert(ORIGIN, options.origin.clone());
    if let Some(sessdata) = cookie {
        match HeaderValue::from_str(&format!("SESSDATA={}", sessdata)) {
            Ok(v) => {
                out.insert(COOKIE, v);
            }
            Err(_) => tracing::warn!("session cookie contains characters not allowed in a header; not sent"),
        }
    }
    if !out.contains_key(USER_AGENT) {
        out.insert(USER_AGENT, options.user_agent.clone());
    }
    out
}

/// Response headers minus hop-by-hop ones.
fn downstream_headers(upstream: &HeaderMap) -> HeaderMap {
    let tokens = connection_tokens(upstream);
    let mut out = HeaderMap::with_capacity(upstream.len());
    for (name, value) in upstream {
        if !is_hop_by_hop(name, &tokens) {
            out.append(name.clone(), value.clone());
        }
    }
    out
}

async fn forward_request(state: &ProxyState, req: Request) -> Result<Response, ForwardError> {
    let (parts, inbound_body) = req.into_parts();
    let target = resolve_target(&parts.uri, &state.options)?;
    let cookie = state.cookie();
    let headers = upstream_headers(&parts.headers, cookie.as_deref(), &state.options);
    let bytes = body::to_bytes(inbound_body, state.options.max_request_body_bytes)
        .await
        .map_err(|e| ForwardError::Body(e.to_string()))?;

    tracing::debug!(method = %parts.method, %target, with_cookie = cookie.is_some(), "forwarding");

    let mut builder = state
        .client
        .request(parts.method, target.as_str())
        .headers(headers);
    if !bytes.is_empty() {
        builder = builder.body(bytes);
    }
    let upstream = builder.send().await?;

    let status = upstream.status();
    let headers = downstream_headers(upstream.headers());
    tracing::debug!(%target, %status, "upstream responded");

    let mut response = Response::new(Body::from_stream(upstream.bytes_stream()));
    *response.status_mut() = status;
    *response.headers_mut() = headers;
    Ok(response)
}

/// Fallback handler: every path and method goes through here.
pub(crate) async fn forward(State(state): State<Arc<ProxyState>>, req: Request) -> Response {
    let uri = req.uri().clone();
    match forward_request(&state, req).await {
        Ok(response) => response,
        Err(e) => {
            tracing::warn!(%uri, "proxy request failed: {}", e);
            e.into_response()
        }
    }
}
