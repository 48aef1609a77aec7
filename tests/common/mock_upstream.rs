//! Mock Upstream for edge routing tests.
//!
//! Answers per origin host. Hosts without a configured answer fail with a
//! transport error. Every request is recorded.

use bytes::Bytes;
use floodgate_sync::edge::Upstream;
use floodgate_sync::error::SyncError;
use floodgate_sync::store::BoxFuture;
use http::{HeaderValue, Request, Response, StatusCode};
use std::collections::HashMap;
use std::sync::Mutex;

#[derive(Debug, Clone)]
struct Answer {
    status: StatusCode,
    body: Bytes,
    headers: Vec<(&'static str, &'static str)>,
}

/// Mock implementation of Upstream with per-host answers.
#[derive(Default)]
pub struct MockUpstream {
    answers: Mutex<HashMap<String, Answer>>,
    requests: Mutex<Vec<Request<Bytes>>>,
}

impl MockUpstream {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer requests for `host` with `status` and `body`, plus the
    /// `age` and `x-robots-tag` headers an origin would send.
    pub fn answer(self, host: &str, status: u16, body: &'static str) -> Self {
        self.answer_with_headers(
            host,
            status,
            body,
            vec![
                ("age", "42"),
                ("x-robots-tag", "noindex"),
                ("content-type", "text/html"),
            ],
        )
    }

    pub fn answer_with_headers(
        self,
        host: &str,
        status: u16,
        body: &'static str,
        headers: Vec<(&'static str, &'static str)>,
    ) -> Self {
        self.answers.lock().unwrap().insert(
            host.to_string(),
            Answer {
                status: StatusCode::from_u16(status).unwrap(),
                body: Bytes::from_static(body.as_bytes()),
                headers,
            },
        );
        self
    }

    /// Hosts of all recorded requests, in order.
    pub fn hosts(&self) -> Vec<String> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .map(|r| r.uri().host().unwrap_or_default().to_string())
            .collect()
    }

    /// Header value of the nth recorded request.
    pub fn request_header(&self, n: usize, name: &str) -> Option<String> {
        self.requests.lock().unwrap().get(n).and_then(|r| {
            r.headers()
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
        })
    }

    pub fn request_uri(&self, n: usize) -> Option<String> {
        self.requests.lock().unwrap().get(n).map(|r| r.uri().to_string())
    }
}

impl Upstream for MockUpstream {
    fn fetch<'a>(&'a self, request: Request<Bytes>) -> BoxFuture<'a, Response<Bytes>> {
        Box::pin(async move {
            let host = request.uri().host().unwrap_or_default().to_string();
            self.requests.lock().unwrap().push(request);

            let answer = self
                .answers
                .lock()
                .unwrap()
                .get(&host)
                .cloned()
                .ok_or_else(|| SyncError::transport_msg("edge_fetch", format!("{} unreachable", host)))?;

            let mut response = Response::new(answer.body);
            *response.status_mut() = answer.status;
            for (name, value) in answer.headers {
                response.headers_mut().insert(name, HeaderValue::from_static(value));
            }
            Ok(response)
        })
    }
}
