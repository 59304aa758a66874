//! Recording transport for unit tests.

use super::{BackendError, JsonTransport};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::Mutex;
use url::Url;

#[derive(Debug, Clone, PartialEq)]
pub struct RecordedCall {
    pub method: &'static str,
    pub url: String,
    pub body: Option<Value>,
}

/// Replays queued responses in order and records every request.
/// Running out of responses answers with a transport failure.
#[derive(Default)]
pub struct MockTransport {
    responses: Mutex<VecDeque<Result<Value, BackendError>>>,
    calls: Mutex<Vec<RecordedCall>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_response(self, body: Value) -> Self {
        self.responses.lock().unwrap().push_back(Ok(body));
        self
    }

    pub fn with_status(self, url: &str, status: u16) -> Self {
        self.responses
            .lock()
            .unwrap()
            .push_back(Err(BackendError::Status {
                url: url.to_string(),
                status,
            }));
        self
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }

    fn answer(&self, call: RecordedCall) -> Result<Value, BackendError> {
        let url = call.url.clone();
        self.calls.lock().unwrap().push(call);
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| {
                Err(BackendError::Transport {
                    url,
                    reason: "no mock response queued".to_string(),
                })
            })
    }
}

#[async_trait]
impl JsonTransport for MockTransport {
    async fn post_json(&self, url: &Url, body: &Value) -> Result<Value, BackendError> {
        self.answer(RecordedCall {
            method: "POST",
            url: url.to_string(),
            body: Some(body.clone()),
        })
    }

    async fn get_json(&self, url: &Url) -> Result<Value, BackendError> {
        self.answer(RecordedCall {
            method: "GET",
            url: url.to_string(),
            body: None,
        })
    }
}
