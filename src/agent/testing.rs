//! Scripted provider and vector store for unit tests.

use std::collections::BTreeMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;

use super::message::{ChatRequest, ChatResponse, TokenUsage};
use super::provider::LlmProvider;
use crate::core::ScoredDocument;
use crate::error::{GenerationError, RetrievalError};
use crate::retrieval::{SearchMode, VectorStore};

type Responder = Box<dyn Fn(&ChatRequest) -> Result<String, GenerationError> + Send + Sync>;

/// Provider whose replies are computed from the request by a closure.
pub(crate) struct ScriptedProvider {
    responder: Responder,
    calls: AtomicUsize,
    requests: Mutex<Vec<ChatRequest>>,
}

impl ScriptedProvider {
    pub(crate) fn new(
        responder: impl Fn(&ChatRequest) -> Result<String, GenerationError> + Send + Sync + 'static,
    ) -> Self {
        Self {
            responder: Box::new(responder),
            calls: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Always answers `text`.
    pub(crate) fn fixed(text: &str) -> Self {
        let text = text.to_string();
        Self::new(move |_| Ok(text.clone()))
    }

    /// Always fails with an API error.
    pub(crate) fn failing() -> Self {
        Self::new(|_| {
            Err(GenerationError::ApiRequest {
                message: "scripted failure".to_string(),
                status: Some(503),
            })
        })
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub(crate) fn requests(&self) -> Vec<ChatRequest> {
        self.requests
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }
}

/// System prompt of a request, or the empty string.
pub(crate) fn system_of(request: &ChatRequest) -> &str {
    request.messages.first().map_or("", |m| m.content.as_str())
}

#[async_trait]
impl LlmProvider for ScriptedProvider {
    fn name(&self) -> &'static str {
        "scripted"
    }

    async fn chat(&self, request: &ChatRequest) -> Result<ChatResponse, GenerationError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .push(request.clone());
        let content = (self.responder)(request)?;
        Ok(ChatResponse {
            content,
            usage: TokenUsage::default(),
            finish_reason: Some("stop".to_string()),
        })
    }
}

/// Text between `<query>` tags in the last user message, or the whole message.
pub(crate) fn query_of(request: &ChatRequest) -> String {
    let content = request.last_user_content().unwrap_or_default();
    content
        .split_once("<query>")
        .and_then(|(_, rest)| rest.split_once("</query>"))
        .map_or(content, |(inner, _)| inner)
        .to_string()
}

type SearchResponder =
    Box<dyn Fn(&str, usize) -> Result<Vec<ScoredDocument>, RetrievalError> + Send + Sync>;

/// Vector store that records every call and answers through a closure.
pub(crate) struct RecordingStore {
    responder: SearchResponder,
    calls: Mutex<Vec<(String, usize)>>,
}

impl RecordingStore {
    pub(crate) fn new(
        responder: impl Fn(&str, usize) -> Result<Vec<ScoredDocument>, RetrievalError>
        + Send
        + Sync
        + 'static,
    ) -> Self {
        Self {
            responder: Box::new(responder),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// `(query, k)` for every search, in call order.
    pub(crate) fn calls(&self) -> Vec<(String, usize)> {
        self.calls
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl VectorStore for RecordingStore {
    fn name(&self) -> &'static str {
        "recording"
    }

    async fn search(
        &self,
        query: &str,
        k: usize,
        _mode: SearchMode,
    ) -> Result<Vec<ScoredDocument>, RetrievalError> {
        self.calls
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .push((query.to_string(), k));
        (self.responder)(query, k)
    }
}

/// A store hit with a `source` metadata entry.
pub(crate) fn scored(content: &str, source: &str, score: f32) -> ScoredDocument {
    ScoredDocument {
        content: content.to_string(),
        metadata: BTreeMap::from([("source".to_string(), source.to_string())]),
        score,
    }
}
