// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Edge request routing between the regular and preview origins.
//!
//! # Per-request flow
//!
//! ```text
//! request ──► variant header == preview marker?
//!               │ yes                          │ no
//!               ▼                              ▼
//!         fetch(preview origin)          fetch(default origin)
//!               │ non-2xx / transport error    │ transport error → 502
//!               ▼                              │
//!         fetch(default origin) ───────────────┤
//!                                              ▼
//!                                   strip `age`, `x-robots-tag`
//! ```
//!
//! Upstream requests carry `x-forwarded-host` (the client's `Host`) and
//! `x-byo-cdn-type`. Nothing is kept between requests.

use crate::config::EdgeConfig;
use crate::error::{Result, SyncError};
use crate::metrics;
use crate::store::BoxFuture;
use axum::body::Body;
use axum::extract::State;
use axum::Router;
use bytes::Bytes;
use http::header::{HeaderName, HeaderValue, CONNECTION, HOST, TRANSFER_ENCODING};
use http::{Request, Response, StatusCode, Uri};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Largest request body the edge app buffers.
const MAX_REQUEST_BODY: usize = 8 * 1024 * 1024;

/// Sends a fully-built request to an origin.
///
/// `Err` means no response was received (transport failure).
pub trait Upstream: Send + Sync + 'static {
    fn fetch<'a>(&'a self, request: Request<Bytes>) -> BoxFuture<'a, Response<Bytes>>;
}

/// [`Upstream`] over reqwest. Redirects are passed through, not followed.
pub struct HttpUpstream {
    client: reqwest::Client,
}

impl HttpUpstream {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|e| SyncError::Config(format!("failed to create HTTP client: {}", e)))?;
        Ok(Self { client })
    }

    /// Client with the configured upstream timeout.
    pub fn from_config(config: &EdgeConfig) -> Result<Self> {
        Self::new(config.upstream_timeout_duration())
    }
}

impl Upstream for HttpUpstream {
    fn fetch<'a>(&'a self, request: Request<Bytes>) -> BoxFuture<'a, Response<Bytes>> {
        Box::pin(async move {
            let (parts, body) = request.into_parts();
            let response = self
                .client
                .request(parts.method, parts.uri.to_string())
                .headers(parts.headers)
                .body(body)
                .send()
                .await
                .map_err(|e| SyncError::transport("edge_fetch", e))?;

            let status = response.status();
            let mut headers = response.headers().clone();
            let body = response
                .bytes()
                .await
                .map_err(|e| SyncError::transport("edge_fetch", e))?;

            // The body is re-framed by the server.
            headers.remove(TRANSFER_ENCODING);
            headers.remove(CONNECTION);

            let mut out = Response::new(body);
            *out.status_mut() = status;
            *out.headers_mut() = headers;
            Ok(out)
        })
    }
}

/// Chooses an origin per request and sanitizes the response.
pub struct EdgeRouter<U: Upstream> {
    upstream: U,
    config: EdgeConfig,
    strip: Vec<HeaderName>,
}

impl<U: Upstream> EdgeRouter<U> {
    /// Header names in `strip_headers` that are not valid are ignored.
    pub fn new(upstream: U, config: EdgeConfig) -> Self {
        let strip = config
            .strip_headers
            .iter()
            .filter_map(|name| match HeaderName::from_bytes(name.as_bytes()) {
                Ok(header) => Some(header),
                Err(_) => {
                    warn!(header = %name, "Ignoring invalid strip header name");
                    None
                }
            })
            .collect();
        Self {
            upstream,
            config,
            strip,
        }
    }

    pub fn config(&self) -> &EdgeConfig {
        &self.config
    }

    pub fn upstream(&self) -> &U {
        &self.upstream
    }

    /// Whether the request asks for the preview variant.
    pub fn wants_preview<B>(&self, request: &Request<B>) -> bool {
        request
            .headers()
            .get(self.config.variant_header.as_str())
            .and_then(|v| v.to_str().ok())
            .map_or(false, |v| v == self.config.preview_value)
    }

    /// Route one request.
    pub async fn route(&self, request: Request<Bytes>) -> Response<Bytes> {
        let start = Instant::now();
        let preview = self.wants_preview(&request);
        let mut fell_back = false;

        let response = if preview {
            match self.fetch_from(&self.config.preview_origin, &request).await {
                Ok(response) if response.status().is_success() => Ok(response),
                Ok(response) => {
                    debug!(status = response.status().as_u16(), "Preview origin miss, falling back");
                    fell_back = true;
                    self.fetch_from(&self.config.default_origin, &request).await
                }
                Err(e) => {
                    warn!(error = %e, "Preview origin unreachable, falling back");
                    fell_back = true;
                    self.fetch_from(&self.config.default_origin, &request).await
                }
            }
        } else {
            self.fetch_from(&self.config.default_origin, &request).await
        };

        let mut response = match response {
            Ok(response) => response,
            Err(e) => {
                warn!(error = %e, "Default origin unreachable");
                let mut bad = Response::new(Bytes::from_static(b"Bad Gateway"));
                *bad.status_mut() = StatusCode::BAD_GATEWAY;
                bad
            }
        };

        for name in &self.strip {
            response.headers_mut().remove(name);
        }

        let variant = if preview { "preview" } else { "default" };
        metrics::record_edge_request(variant, fell_back, response.status().as_u16(), start.elapsed());
        response
    }

    async fn fetch_from(&self, origin: &str, request: &Request<Bytes>) -> Result<Response<Bytes>> {
        let upstream = self.upstream_request(origin, request)?;
        self.upstream.fetch(upstream).await
    }

    /// Copy of `request` aimed at `https://{origin}` with forwarding headers.
    pub fn upstream_request(&self, origin: &str, request: &Request<Bytes>) -> Result<Request<Bytes>> {
        let path = request
            .uri()
            .path_and_query()
            .map(|p| p.as_str())
            .unwrap_or("/");
        let uri: Uri = format!("https://{}{}", origin, path)
            .parse()
            .map_err(|e| SyncError::InvalidInput(format!("cannot build upstream URI: {}", e)))?;

        let client_host = request
            .headers()
            .get(HOST)
            .cloned()
            .or_else(|| request.uri().host().and_then(|h| HeaderValue::from_str(h).ok()));

        let mut headers = request.headers().clone();
        headers.remove(HOST);
        if let Some(host) = client_host {
            headers.insert(HeaderName::from_static("x-forwarded-host"), host);
        }
        let cdn = HeaderValue::from_str(&self.config.cdn_type)
            .map_err(|e| SyncError::Config(format!("invalid cdn_type: {}", e)))?;
        headers.insert(HeaderName::from_static("x-byo-cdn-type"), cdn);

        let mut upstream = Request::new(request.body().clone());
        *upstream.method_mut() = request.method().clone();
        *upstream.uri_mut() = uri;
        *upstream.headers_mut() = headers;
        Ok(upstream)
    }
}

/// axum app that routes every request through `router`.
pub fn app<U: Upstream>(router: Arc<EdgeRouter<U>>) -> Router {
    Router::new().fallback(handle::<U>).with_state(router)
}

async fn handle<U: Upstream>(
    State(router): State<Arc<EdgeRouter<U>>>,
    request: Request<Body>,
) -> Response<Body> {
    let (parts, body) = request.into_parts();
    let bytes = match axum::body::to_bytes(body, MAX_REQUEST_BODY).await {
        Ok(bytes) => bytes,
        Err(e) => {
            warn!(error = %e, "Failed to read request body");
            let mut bad = Response::new(Body::from("Bad Request"));
            *bad.status_mut() = StatusCode::BAD_REQUEST;
            return bad;
        }
    };
    router.route(Request::from_parts(parts, bytes)).await.map(Body::from)
}
