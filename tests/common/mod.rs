//! Shared test utilities for integration and property tests.
//!
//! This module provides:
//! - MockStore: in-memory RemoteStore with call recording and failure injection
//! - MockUpstream: per-host edge upstream
//! - MockHttp: scripted localhost HTTP server
//! - Project helpers and a silent TCP listener

#![allow(dead_code)]

pub mod mock_http;
pub mod mock_store;
pub mod mock_upstream;

pub use mock_http::*;
pub use mock_store::*;
pub use mock_upstream::*;

use floodgate_sync::project::ProjectDetail;
use std::net::SocketAddr;

/// A project listing `urls` in order, with the default child folder.
pub fn project_with(urls: &[&str]) -> ProjectDetail {
    let mut project = ProjectDetail::new("https://main--site--org.hlx.page/drafts/p.json", "p.xlsx", "child");
    for url in urls {
        project.add_url(url);
    }
    project
}

/// A listener that accepts connections and never answers.
pub async fn silent_server() -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((socket, _)) = listener.accept().await {
            held.push(socket);
        }
    });
    addr
}

/// Install a test subscriber once; later calls are no-ops.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("floodgate_sync=debug")
        .with_test_writer()
        .try_init();
}
