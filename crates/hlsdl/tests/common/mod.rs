#![allow(dead_code)]

use aes::Aes128;
use axum::Router;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use cbc::cipher::{BlockEncryptMut, KeyIvInit, block_padding::Pkcs7};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::net::TcpListener;

#[derive(Clone)]
struct Route {
    body: Vec<u8>,
    status: StatusCode,
    /// Answer 503 to this many requests before serving `body`
    failures_left: usize,
}

/// Local HTTP server with mutable routes and per-path request counters.
pub struct TestServer {
    base_url: String,
    routes: Arc<Mutex<HashMap<String, Route>>>,
    request_counts: Arc<Mutex<HashMap<String, usize>>>,
}

/// Route engine logs through the test harness; `RUST_LOG` overrides `warn`.
pub fn tracing_setup() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init();
}

impl TestServer {
    pub async fn new() -> Self {
        tracing_setup();

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let base_url = format!("http://127.0.0.1:{}", addr.port());

        let routes: Arc<Mutex<HashMap<String, Route>>> = Arc::default();
        let request_counts: Arc<Mutex<HashMap<String, usize>>> = Arc::default();

        let routes_clone = routes.clone();
        let counts_clone = request_counts.clone();
        let app = Router::new().fallback(move |req: axum::extract::Request| {
            let routes = routes_clone.clone();
            let counts = counts_clone.clone();
            async move {
                let path = req.uri().path().to_string();
                *counts.lock().unwrap().entry(path.clone()).or_insert(0) += 1;

                let response: Response = {
                    let mut routes = routes.lock().unwrap();
                    match routes.get_mut(&path) {
                        Some(route) if route.failures_left > 0 => {
                            route.failures_left -= 1;
                            StatusCode::SERVICE_UNAVAILABLE.into_response()
                        }
                        Some(route) => (route.status, route.body.clone()).into_response(),
                        None => StatusCode::NOT_FOUND.into_response(),
                    }
                };
                response
            }
        });

        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base_url,
            routes,
            request_counts,
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub fn serve(&self, path: &str, body: impl Into<Vec<u8>>) {
        self.insert(path, body.into(), StatusCode::OK, 0);
    }

    pub fn serve_status(&self, path: &str, status: StatusCode) {
        self.insert(path, Vec::new(), status, 0);
    }

    /// Serve `body` only after `failures` 503 responses.
    pub fn serve_flaky(&self, path: &str, body: impl Into<Vec<u8>>, failures: usize) {
        self.insert(path, body.into(), StatusCode::OK, failures);
    }

    fn insert(&self, path: &str, body: Vec<u8>, status: StatusCode, failures_left: usize) {
        self.routes.lock().unwrap().insert(
            path.to_string(),
            Route {
                body,
                status,
                failures_left,
            },
        );
    }

    pub fn get_request_count(&self, path: &str) -> usize {
        self.request_counts
            .lock()
            .unwrap()
            .get(path)
            .copied()
            .unwrap_or(0)
    }
}

/// Media playlist over `segments`, optionally preceded by `key_line`.
pub fn media_playlist(media_sequence: u64, key_line: Option<&str>, segments: &[&str]) -> String {
    let mut playlist = format!(
        "#EXTM3U\n#EXT-X-VERSION:3\n#EXT-X-TARGETDURATION:4\n#EXT-X-MEDIA-SEQUENCE:{media_sequence}\n#EXT-X-PLAYLIST-TYPE:VOD\n"
    );
    if let Some(key_line) = key_line {
        playlist.push_str(key_line);
        playlist.push('\n');
    }
    for segment in segments {
        playlist.push_str("#EXTINF:4.0,\n");
        playlist.push_str(segment);
        playlist.push('\n');
    }
    playlist.push_str("#EXT-X-ENDLIST\n");
    playlist
}

/// Transport-stream-looking payload: `0x47` followed by a per-segment marker.
pub fn ts_payload(index: usize) -> Vec<u8> {
    let mut data = vec![0x47];
    data.extend(format!("SEGMENT-{index}:").into_bytes());
    data.extend(std::iter::repeat_n(index as u8, 40));
    data
}

/// Payload with two junk bytes in front of the sync byte.
pub fn misaligned(payload: &[u8]) -> Vec<u8> {
    let mut data = vec![0x00, 0xFF];
    data.extend_from_slice(payload);
    data
}

pub fn encrypt(plaintext: &[u8], key: &[u8; 16], iv: &[u8; 16]) -> Vec<u8> {
    let mut buf = plaintext.to_vec();
    buf.resize(plaintext.len() + 16 - plaintext.len() % 16, 0);
    cbc::Encryptor::<Aes128>::new(key.into(), iv.into())
        .encrypt_padded_mut::<Pkcs7>(&mut buf, plaintext.len())
        .unwrap()
        .to_vec()
}
