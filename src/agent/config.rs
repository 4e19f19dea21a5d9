//! Pipeline configuration with builder pattern and environment variable support.
//!
//! Configuration is resolved in order: explicit values → environment variables → defaults.

use std::path::PathBuf;
use std::time::Duration;

use crate::error::GenerationError;
use crate::retrieval::SearchMode;

/// Default model for answer generation.
const DEFAULT_ANSWER_MODEL: &str = "gpt-4o-mini";
/// Default model for contextualization, classification and query transformation.
const DEFAULT_REASONING_MODEL: &str = "gpt-4o-mini";
/// Default number of documents handed to the synthesizer.
const DEFAULT_TOP_K: usize = 5;
/// Default cap on sub-queries per decomposition.
const DEFAULT_MAX_SUBQUERIES: usize = 3;
/// Default maximum concurrent sub-query retrievals.
const DEFAULT_MAX_CONCURRENCY: usize = 4;
/// Default number of prior turns used for contextualization and answering.
const DEFAULT_HISTORY_TURNS: usize = 3;
/// Default number of turns retained per session.
const DEFAULT_MEMORY_RETENTION: usize = 50;
/// Default cap on sessions held by the in-process memory store.
const DEFAULT_MAX_SESSIONS: usize = 10_000;
/// Default character budget for the answer context block.
const DEFAULT_CONTEXT_CHAR_BUDGET: usize = 12_000;
/// Default answer max tokens.
const DEFAULT_ANSWER_MAX_TOKENS: u32 = 2048;
/// Default max tokens for the short reasoning calls.
const DEFAULT_REASONING_MAX_TOKENS: u32 = 512;
/// Default answer temperature.
const DEFAULT_ANSWER_TEMPERATURE: f32 = 0.2;
/// Default per-call generation timeout in seconds.
const DEFAULT_GENERATION_TIMEOUT_SECS: u64 = 60;
/// Default per-call vector store timeout in seconds.
const DEFAULT_RETRIEVAL_TIMEOUT_SECS: u64 = 15;
/// Default end-to-end request timeout in seconds.
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 180;

/// Configuration for the question-answering pipeline.
#[derive(Debug, Clone)]
pub struct RagConfig {
    /// LLM provider name (e.g., "openai").
    pub provider: String,
    /// API key for the provider.
    pub api_key: String,
    /// Optional base URL override (for proxies or compatible APIs).
    pub base_url: Option<String>,
    /// Model used for the final answer.
    pub answer_model: String,
    /// Model used for contextualization, classification, rewrite and decomposition.
    pub reasoning_model: String,
    /// Number of documents the synthesizer receives.
    pub top_k: usize,
    /// Search mode requested from the vector store.
    pub search_mode: SearchMode,
    /// Maximum sub-queries produced by decomposition.
    pub max_subqueries: usize,
    /// Maximum sub-query retrievals in flight at once.
    pub max_concurrency: usize,
    /// Prior turns considered by the contextualizer and synthesizer.
    pub history_turns: usize,
    /// Turns kept per session before the oldest are dropped.
    pub memory_retention: usize,
    /// Sessions held by the in-process memory store before the stalest is evicted.
    pub max_sessions: usize,
    /// Character budget for retrieved context in the answer prompt.
    pub context_char_budget: usize,
    /// Reduce each retrieved document to its query-relevant passages before answering.
    pub compress_documents: bool,
    /// Maximum tokens for answers.
    pub answer_max_tokens: u32,
    /// Maximum tokens for reasoning calls.
    pub reasoning_max_tokens: u32,
    /// Sampling temperature for answers.
    pub answer_temperature: f32,
    /// Deadline for each generation call.
    pub generation_timeout: Duration,
    /// Deadline for each vector store call.
    pub retrieval_timeout: Duration,
    /// Deadline for a whole request at the HTTP boundary.
    pub request_timeout: Duration,
    /// Directory containing prompt template files.
    ///
    /// When set, system prompts are loaded from markdown files in this
    /// directory, falling back to compiled-in defaults for any missing files.
    pub prompt_dir: Option<PathBuf>,
    /// Base URL of an external vector store service.
    pub vector_store_url: Option<String>,
    /// JSON corpus file for the in-process index.
    pub corpus_path: Option<PathBuf>,
}

impl RagConfig {
    /// Creates a new builder for `RagConfig`.
    #[must_use]
    pub fn builder() -> RagConfigBuilder {
        RagConfigBuilder::default()
    }

    /// Creates configuration from environment variables with defaults.
    ///
    /// # Errors
    ///
    /// Returns [`GenerationError::ApiKeyMissing`] if no API key is found.
    pub fn from_env() -> Result<Self, GenerationError> {
        Self::builder().from_env().build()
    }

    /// Documents requested per sub-query when `n` sub-queries share the budget.
    ///
    /// Never below 2, so each facet keeps some evidence.
    #[must_use]
    pub fn per_subquery_k(&self, n: usize) -> usize {
        (self.top_k / n.max(1)).max(2)
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.trim().parse().ok())
}

fn env_flag(key: &str) -> Option<bool> {
    let value = std::env::var(key).ok()?;
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn env_secs(key: &str) -> Option<Duration> {
    env_parse::<u64>(key).map(Duration::from_secs)
}

/// Builder for [`RagConfig`].
#[derive(Debug, Clone, Default)]
pub struct RagConfigBuilder {
    provider: Option<String>,
    api_key: Option<String>,
    base_url: Option<String>,
    answer_model: Option<String>,
    reasoning_model: Option<String>,
    top_k: Option<usize>,
    search_mode: Option<SearchMode>,
    max_subqueries: Option<usize>,
    max_concurrency: Option<usize>,
    history_turns: Option<usize>,
    memory_retention: Option<usize>,
    max_sessions: Option<usize>,
    context_char_budget: Option<usize>,
    compress_documents: Option<bool>,
    answer_max_tokens: Option<u32>,
    reasoning_max_tokens: Option<u32>,
    answer_temperature: Option<f32>,
    generation_timeout: Option<Duration>,
    retrieval_timeout: Option<Duration>,
    request_timeout: Option<Duration>,
    prompt_dir: Option<PathBuf>,
    vector_store_url: Option<String>,
    corpus_path: Option<PathBuf>,
}

impl RagConfigBuilder {
    /// Populates unset fields from environment variables.
    ///
    /// Values that fail to parse are ignored and the default applies.
    #[must_use]
    pub fn from_env(mut self) -> Self {
        if self.provider.is_none() {
            self.provider = std::env::var("RAG_PROVIDER").ok();
        }
        if self.api_key.is_none() {
            self.api_key = std::env::var("OPENAI_API_KEY")
                .or_else(|_| std::env::var("RAG_API_KEY"))
                .ok();
        }
        if self.base_url.is_none() {
            self.base_url = std::env::var("OPENAI_BASE_URL")
                .or_else(|_| std::env::var("RAG_BASE_URL"))
                .ok();
        }
        if self.answer_model.is_none() {
            self.answer_model = std::env::var("RAG_ANSWER_MODEL").ok();
        }
        if self.reasoning_model.is_none() {
            self.reasoning_model = std::env::var("RAG_REASONING_MODEL").ok();
        }
        if self.top_k.is_none() {
            self.top_k = env_parse("RAG_TOP_K");
        }
        if self.search_mode.is_none() {
            self.search_mode = env_parse("RAG_SEARCH_MODE");
        }
        if self.max_subqueries.is_none() {
            self.max_subqueries = env_parse("RAG_MAX_SUBQUERIES");
        }
        if self.max_concurrency.is_none() {
            self.max_concurrency = env_parse("RAG_MAX_CONCURRENCY");
        }
        if self.history_turns.is_none() {
            self.history_turns = env_parse("RAG_HISTORY_TURNS");
        }
        if self.memory_retention.is_none() {
            self.memory_retention = env_parse("RAG_MEMORY_TURNS");
        }
        if self.max_sessions.is_none() {
            self.max_sessions = env_parse("RAG_MAX_SESSIONS");
        }
        if self.context_char_budget.is_none() {
            self.context_char_budget = env_parse("RAG_CONTEXT_CHARS");
        }
        if self.compress_documents.is_none() {
            self.compress_documents = env_flag("RAG_COMPRESS");
        }
        if self.generation_timeout.is_none() {
            self.generation_timeout = env_secs("RAG_GENERATION_TIMEOUT_SECS");
        }
        if self.retrieval_timeout.is_none() {
            self.retrieval_timeout = env_secs("RAG_RETRIEVAL_TIMEOUT_SECS");
        }
        if self.request_timeout.is_none() {
            self.request_timeout = env_secs("RAG_REQUEST_TIMEOUT_SECS");
        }
        if self.prompt_dir.is_none() {
            self.prompt_dir = std::env::var("RAG_PROMPT_DIR").ok().map(PathBuf::from);
        }
        if self.vector_store_url.is_none() {
            self.vector_store_url = std::env::var("RAG_VECTOR_STORE_URL").ok();
        }
        if self.corpus_path.is_none() {
            self.corpus_path = std::env::var("RAG_CORPUS").ok().map(PathBuf::from);
        }
        self
    }

    /// Sets the LLM provider name.
    #[must_use]
    pub fn provider(mut self, provider: impl Into<String>) -> Self {
        self.provider = Some(provider.into());
        self
    }

    /// Sets the API key.
    #[must_use]
    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Sets the base URL override.
    #[must_use]
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Sets the answer model.
    #[must_use]
    pub fn answer_model(mut self, model: impl Into<String>) -> Self {
        self.answer_model = Some(model.into());
        self
    }

    /// Sets the reasoning model.
    #[must_use]
    pub fn reasoning_model(mut self, model: impl Into<String>) -> Self {
        self.reasoning_model = Some(model.into());
        self
    }

    /// Sets the number of documents handed to the synthesizer.
    #[must_use]
    pub const fn top_k(mut self, k: usize) -> Self {
        self.top_k = Some(k);
        self
    }

    /// Sets the vector store search mode.
    #[must_use]
    pub const fn search_mode(mut self, mode: SearchMode) -> Self {
        self.search_mode = Some(mode);
        self
    }

    /// Sets the sub-query cap.
    #[must_use]
    pub const fn max_subqueries(mut self, n: usize) -> Self {
        self.max_subqueries = Some(n);
        self
    }

    /// Sets the maximum concurrency.
    #[must_use]
    pub const fn max_concurrency(mut self, n: usize) -> Self {
        self.max_concurrency = Some(n);
        self
    }

    /// Sets the number of history turns considered per question.
    #[must_use]
    pub const fn history_turns(mut self, n: usize) -> Self {
        self.history_turns = Some(n);
        self
    }

    /// Sets the number of turns retained per session.
    #[must_use]
    pub const fn memory_retention(mut self, n: usize) -> Self {
        self.memory_retention = Some(n);
        self
    }

    /// Sets the session cap of the in-process memory store.
    #[must_use]
    pub const fn max_sessions(mut self, n: usize) -> Self {
        self.max_sessions = Some(n);
        self
    }

    /// Sets the context character budget.
    #[must_use]
    pub const fn context_char_budget(mut self, chars: usize) -> Self {
        self.context_char_budget = Some(chars);
        self
    }

    /// Enables or disables contextual compression of retrieved documents.
    #[must_use]
    pub const fn compress_documents(mut self, enabled: bool) -> Self {
        self.compress_documents = Some(enabled);
        self
    }

    /// Sets the answer max tokens.
    #[must_use]
    pub const fn answer_max_tokens(mut self, n: u32) -> Self {
        self.answer_max_tokens = Some(n);
        self
    }

    /// Sets the reasoning max tokens.
    #[must_use]
    pub const fn reasoning_max_tokens(mut self, n: u32) -> Self {
        self.reasoning_max_tokens = Some(n);
        self
    }

    /// Sets the answer temperature.
    #[must_use]
    pub const fn answer_temperature(mut self, t: f32) -> Self {
        self.answer_temperature = Some(t);
        self
    }

    /// Sets the per-call generation timeout.
    #[must_use]
    pub const fn generation_timeout(mut self, duration: Duration) -> Self {
        self.generation_timeout = Some(duration);
        self
    }

    /// Sets the per-call retrieval timeout.
    #[must_use]
    pub const fn retrieval_timeout(mut self, duration: Duration) -> Self {
        self.retrieval_timeout = Some(duration);
        self
    }

    /// Sets the end-to-end request timeout.
    #[must_use]
    pub const fn request_timeout(mut self, duration: Duration) -> Self {
        self.request_timeout = Some(duration);
        self
    }

    /// Sets the prompt template directory.
    #[must_use]
    pub fn prompt_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.prompt_dir = Some(dir.into());
        self
    }

    /// Sets the external vector store URL.
    #[must_use]
    pub fn vector_store_url(mut self, url: impl Into<String>) -> Self {
        self.vector_store_url = Some(url.into());
        self
    }

    /// Sets the corpus file for the in-process index.
    #[must_use]
    pub fn corpus_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.corpus_path = Some(path.into());
        self
    }

    /// Builds the [`RagConfig`].
    ///
    /// Zero values for `top_k`, `max_subqueries` and `max_concurrency` are
    /// raised to 1.
    ///
    /// # Errors
    ///
    /// Returns [`GenerationError::ApiKeyMissing`] if no API key was set.
    pub fn build(self) -> Result<RagConfig, GenerationError> {
        let api_key = self
            .api_key
            .filter(|k| !k.trim().is_empty())
            .ok_or(GenerationError::ApiKeyMissing)?;

        Ok(RagConfig {
            provider: self.provider.unwrap_or_else(|| "openai".to_string()),
            api_key,
            base_url: self.base_url,
            answer_model: self
                .answer_model
                .unwrap_or_else(|| DEFAULT_ANSWER_MODEL.to_string()),
            reasoning_model: self
                .reasoning_model
                .unwrap_or_else(|| DEFAULT_REASONING_MODEL.to_string()),
            top_k: self.top_k.unwrap_or(DEFAULT_TOP_K).max(1),
            search_mode: self.search_mode.unwrap_or_default(),
            max_subqueries: self.max_subqueries.unwrap_or(DEFAULT_MAX_SUBQUERIES).max(1),
            max_concurrency: self
                .max_concurrency
                .unwrap_or(DEFAULT_MAX_CONCURRENCY)
                .max(1),
            history_turns: self.history_turns.unwrap_or(DEFAULT_HISTORY_TURNS),
            memory_retention: self.memory_retention.unwrap_or(DEFAULT_MEMORY_RETENTION),
            max_sessions: self.max_sessions.unwrap_or(DEFAULT_MAX_SESSIONS).max(1),
            context_char_budget: self
                .context_char_budget
                .unwrap_or(DEFAULT_CONTEXT_CHAR_BUDGET),
            compress_documents: self.compress_documents.unwrap_or(false),
            answer_max_tokens: self.answer_max_tokens.unwrap_or(DEFAULT_ANSWER_MAX_TOKENS),
            reasoning_max_tokens: self
                .reasoning_max_tokens
                .unwrap_or(DEFAULT_REASONING_MAX_TOKENS),
            answer_temperature: self
                .answer_temperature
                .unwrap_or(DEFAULT_ANSWER_TEMPERATURE),
            generation_timeout: self
                .generation_timeout
                .unwrap_or(Duration::from_secs(DEFAULT_GENERATION_TIMEOUT_SECS)),
            retrieval_timeout: self
                .retrieval_timeout
                .unwrap_or(Duration::from_secs(DEFAULT_RETRIEVAL_TIMEOUT_SECS)),
            request_timeout: self
                .request_timeout
                .unwrap_or(Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS)),
            prompt_dir: self.prompt_dir,
            vector_store_url: self.vector_store_url,
            corpus_path: self.corpus_path,
        })
    }
}
