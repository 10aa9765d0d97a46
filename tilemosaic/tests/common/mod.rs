//! Shared helpers for integration tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::io::Cursor;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use image::{ImageFormat, Rgba, RgbaImage};
use parking_lot::Mutex;

use tilemosaic::provider::{AsyncHttpClient, HttpResponse, ProviderError};

type Responder = dyn Fn(&str) -> HttpResponse + Send + Sync;

/// In-memory tile server that counts requests per URL.
#[derive(Clone)]
pub struct MockTileServer {
    responder: Arc<Responder>,
    calls: Arc<AtomicUsize>,
    per_url: Arc<Mutex<HashMap<String, usize>>>,
}

impl MockTileServer {
    pub fn new<F>(responder: F) -> Self
    where
        F: Fn(&str) -> HttpResponse + Send + Sync + 'static,
    {
        Self {
            responder: Arc::new(responder),
            calls: Arc::new(AtomicUsize::new(0)),
            per_url: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Serves the same solid PNG tile for every URL.
    pub fn solid(color: [u8; 4], size: u32) -> Self {
        let body = Bytes::from(solid_png(color, size));
        Self::new(move |_| response(200, "OK", body.clone()))
    }

    /// Answers every request with an empty body and the given status.
    pub fn status(status: u16, reason: &'static str) -> Self {
        Self::new(move |_| response(status, reason, Bytes::new()))
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn calls_for(&self, url: &str) -> usize {
        self.per_url.lock().get(url).copied().unwrap_or(0)
    }
}

impl AsyncHttpClient for MockTileServer {
    async fn get(
        &self,
        url: &str,
        _headers: &[(String, String)],
    ) -> Result<HttpResponse, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.per_url.lock().entry(url.to_string()).or_insert(0) += 1;
        Ok((self.responder)(url))
    }
}

pub fn response(status: u16, reason: &str, body: Bytes) -> HttpResponse {
    HttpResponse {
        status,
        reason: reason.to_string(),
        body,
    }
}

/// PNG-encodes a solid tile.
pub fn solid_png(color: [u8; 4], size: u32) -> Vec<u8> {
    let img = RgbaImage::from_pixel(size, size, Rgba(color));
    let mut buf = Cursor::new(Vec::new());
    img.write_to(&mut buf, ImageFormat::Png).unwrap();
    buf.into_inner()
}
