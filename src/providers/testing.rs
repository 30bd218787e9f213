//! Canned-response transport for adapter tests.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use super::transport::{HttpRequest, HttpResponse, HttpTransport};
use crate::error::{ProviderError, Result};

/// Base64 of an 8-byte PNG signature followed by four payload bytes.
pub fn png_base64() -> &'static str {
    "iVBORw0KGgoBAgME"
}

#[derive(Default)]
pub struct MockTransport {
    posts: Mutex<VecDeque<Result<HttpResponse>>>,
    gets: Mutex<VecDeque<Result<HttpResponse>>>,
    requests: Mutex<Vec<HttpRequest>>,
    fetched: Mutex<Vec<String>>,
    post_calls: AtomicUsize,
    get_calls: AtomicUsize,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_post(&self, response: Result<HttpResponse>) {
        self.posts.lock().unwrap().push_back(response);
    }

    pub fn push_json(&self, status: u16, body: serde_json::Value) {
        self.push_post(Ok(HttpResponse::new(status, body.to_string())));
    }

    pub fn push_get(&self, response: Result<HttpResponse>) {
        self.gets.lock().unwrap().push_back(response);
    }

    pub fn post_count(&self) -> usize {
        self.post_calls.load(Ordering::SeqCst)
    }

    pub fn get_count(&self) -> usize {
        self.get_calls.load(Ordering::SeqCst)
    }

    pub fn last_request(&self) -> HttpRequest {
        self.requests
            .lock()
            .unwrap()
            .last()
            .cloned()
            .expect("no request was sent")
    }

    pub fn fetched_urls(&self) -> Vec<String> {
        self.fetched.lock().unwrap().clone()
    }
}

#[async_trait]
impl HttpTransport for MockTransport {
    async fn post(&self, request: HttpRequest) -> Result<HttpResponse> {
        self.post_calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().unwrap().push(request);
        let next = self.posts.lock().unwrap().pop_front();
        next.unwrap_or_else(|| {
            Err(ProviderError::NetworkUnavailable(
                "no canned POST response".into(),
            ))
        })
    }

    async fn get(&self, url: &str) -> Result<HttpResponse> {
        self.get_calls.fetch_add(1, Ordering::SeqCst);
        self.fetched.lock().unwrap().push(url.to_string());
        let next = self.gets.lock().unwrap().pop_front();
        next.unwrap_or_else(|| {
            Err(ProviderError::NetworkUnavailable(
                "no canned GET response".into(),
            ))
        })
    }
}
