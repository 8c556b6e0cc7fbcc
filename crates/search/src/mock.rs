//! In-memory [`SearchBackend`] used by tests across the workspace.

use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::Value;

use crate::backend::{Hit, SearchBackend, SearchError, SearchRequest};

type Responder = dyn Fn(&SearchRequest) -> Result<Vec<Hit>, SearchError> + Send + Sync;

/// Backend that answers from a closure and records every request it sees.
pub struct RecordingBackend {
    responder: Box<Responder>,
    calls: Mutex<Vec<SearchRequest>>,
}

impl RecordingBackend {
    pub fn new<F>(responder: F) -> Self
    where
        F: Fn(&SearchRequest) -> Result<Vec<Hit>, SearchError> + Send + Sync + 'static,
    {
        Self {
            responder: Box::new(responder),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Answers every request with no hits.
    pub fn empty() -> Self {
        Self::new(|_| Ok(Vec::new()))
    }

    /// Fails every request with a transport error carrying `message`.
    pub fn failing(message: impl Into<String>) -> Self {
        let message = message.into();
        Self::new(move |_| Err(SearchError::Transport(message.clone())))
    }

    /// Requests seen so far, in call order.
    pub fn calls(&self) -> Vec<SearchRequest> {
        self.calls
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap_or_else(|p| p.into_inner()).len()
    }
}

impl std::fmt::Debug for RecordingBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordingBackend")
            .field("calls", &self.call_count())
            .finish()
    }
}

#[async_trait]
impl SearchBackend for RecordingBackend {
    async fn search(&self, request: &SearchRequest) -> Result<Vec<Hit>, SearchError> {
        self.calls
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .push(request.clone());
        (self.responder)(request)
    }
}

/// Shorthand for building a hit in tests.
pub fn hit(score: Option<f32>, source: Value) -> Hit {
    Hit::new(source, score)
}
