//! Error types for adaptive-rag.
//!
//! Each collaborator boundary has its own error enum so that callers can
//! decide locally whether a failure is recoverable. Only [`SynthesisError`]
//! is meant to reach the end user; the others are absorbed by the
//! pipeline's fallbacks and surface as log events and metadata.

use std::time::Duration;

use thiserror::Error;

/// Result alias using the crate-level [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// Failure of a call to the generation model.
#[derive(Debug, Error)]
pub enum GenerationError {
    /// The provider rejected or failed the request (network, quota, 5xx).
    #[error("generation request failed: {message}")]
    ApiRequest {
        /// Provider error description.
        message: String,
        /// HTTP status when known.
        status: Option<u16>,
    },

    /// The call did not complete within its deadline.
    #[error("generation call timed out after {}s", timeout.as_secs_f64())]
    Timeout {
        /// Deadline that was exceeded.
        timeout: Duration,
    },

    /// The model returned no text.
    #[error("generation model returned an empty response")]
    EmptyResponse,

    /// No API key was configured.
    #[error("no API key configured (set OPENAI_API_KEY or RAG_API_KEY)")]
    ApiKeyMissing,

    /// The configured provider name is unknown.
    #[error("unsupported provider: {name}")]
    UnsupportedProvider {
        /// Provider name as configured.
        name: String,
    },
}

/// Failure of a call to the vector store.
#[derive(Debug, Error)]
pub enum RetrievalError {
    /// The backend reported an error.
    #[error("vector store error: {message}")]
    Backend {
        /// Backend error description.
        message: String,
    },

    /// The call did not complete within its deadline.
    #[error("vector store call timed out after {}s", timeout.as_secs_f64())]
    Timeout {
        /// Deadline that was exceeded.
        timeout: Duration,
    },

    /// The backend answered with something that is not a result list.
    #[error("invalid vector store response: {message}")]
    InvalidResponse {
        /// Decoder error description.
        message: String,
    },

    /// A corpus file could not be loaded into the in-process index.
    #[error("failed to load corpus: {message}")]
    Corpus {
        /// Loader error description.
        message: String,
    },
}

/// Model output did not match the shape a component expected.
#[derive(Debug, Error)]
pub enum ParseError {
    /// Classifier output contained no recognizable complexity or strategy label.
    #[error("unrecognized classification output: {content:?}")]
    Classification {
        /// Raw model output.
        content: String,
    },

    /// Decomposer output contained no usable sub-questions.
    #[error("unusable decomposition output: {content:?}")]
    Decomposition {
        /// Raw model output.
        content: String,
    },

    /// Rewriter output contained no usable query.
    #[error("unusable rewrite output: {content:?}")]
    Rewrite {
        /// Raw model output.
        content: String,
    },
}

/// Final answer generation failed.
#[derive(Debug, Error)]
pub enum SynthesisError {
    /// The generation call itself failed.
    #[error("answer generation failed: {0}")]
    Generation(#[from] GenerationError),

    /// The model produced only whitespace.
    #[error("answer generation produced no text")]
    EmptyAnswer,
}

impl SynthesisError {
    /// Message shown to end users in place of an answer.
    #[must_use]
    pub const fn user_message(&self) -> &'static str {
        "Sorry, I could not generate an answer right now. Please try again in a moment."
    }
}

/// Conversation memory store failures.
#[derive(Debug, Error)]
pub enum MemoryError {
    /// The backing store is unavailable.
    #[error("conversation memory unavailable: {message}")]
    Unavailable {
        /// Store error description.
        message: String,
    },
}

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A value could not be interpreted.
    #[error("invalid value for {key}: {value:?}")]
    InvalidValue {
        /// Setting name.
        key: &'static str,
        /// Offending value.
        value: String,
    },

    /// Neither a corpus nor a vector store URL was given.
    #[error("no vector store configured (pass --corpus <file> or --vector-store-url <url>)")]
    NoVectorStore,
}

/// Command execution errors.
#[derive(Debug, Error)]
pub enum CommandError {
    /// Command failed with a message.
    #[error("{0}")]
    ExecutionFailed(String),

    /// Input was rejected before any work was done.
    #[error("invalid input: {0}")]
    InvalidInput(String),
}

/// Top-level error type.
#[derive(Debug, Error)]
pub enum Error {
    /// Generation error.
    #[error(transparent)]
    Generation(#[from] GenerationError),

    /// Retrieval error.
    #[error(transparent)]
    Retrieval(#[from] RetrievalError),

    /// Parse error.
    #[error(transparent)]
    Parse(#[from] ParseError),

    /// Synthesis error.
    #[error(transparent)]
    Synthesis(#[from] SynthesisError),

    /// Memory error.
    #[error(transparent)]
    Memory(#[from] MemoryError),

    /// Configuration error.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Command error.
    #[error(transparent)]
    Command(#[from] CommandError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
