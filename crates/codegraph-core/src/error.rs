use thiserror::Error;

/// Error taxonomy for the indexing engine (§7), tagged by the subsystem that raised it.
///
/// Variants map onto the propagation policy in §7: some are always fatal for the run
/// (`Configuration`, `GrammarLoad`, `StorageConnection`, `WorkspaceInit`), most are
/// recoverable and handled in place by the caller (counted, logged, and surfaced on the
/// progress channel rather than aborting the run).
#[derive(Error, Debug)]
pub enum CodeGraphError {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("filesystem error during {operation}: {source}")]
    Filesystem {
        operation: String,
        #[source]
        source: std::io::Error,
    },

    #[error("unsupported language: {0}")]
    UnsupportedLanguage(String),

    #[error("grammar not found for language {language} in search path")]
    GrammarNotFound { language: String },

    #[error("failed to load grammar for language {language}: {reason}")]
    GrammarLoadFailed { language: String, reason: String },

    #[error("parse error in {file_path}: {reason}")]
    Parse { file_path: String, reason: String },

    #[error("extraction error: {0}")]
    Extraction(String),

    #[error("relationship endpoint could not be resolved: {0}")]
    Resolution(String),

    #[error("embedding error: {0}")]
    Embedding(String),

    #[error("embedding error (retryable): {0}")]
    EmbeddingRetryable(String),

    #[error("llm rate limited (retryable): {0}")]
    LlmRateLimited(String),

    #[error("llm authentication failed: {0}")]
    LlmAuthentication(String),

    #[error("llm request timed out (retryable): {0}")]
    LlmTimeout(String),

    #[error("malformed tool call: {0}")]
    MalformedToolCall(String),

    #[error("storage connection error: {0}")]
    StorageConnection(String),

    #[error("storage query error: {0}")]
    StorageQuery(String),

    #[error("workspace lock contention (retryable): {0}")]
    WorkspaceLock(String),

    #[error("workspace initialization error: {0}")]
    WorkspaceInit(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl CodeGraphError {
    /// Whether the operation that produced this error is worth retrying (§7).
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            CodeGraphError::EmbeddingRetryable(_)
                | CodeGraphError::LlmRateLimited(_)
                | CodeGraphError::LlmTimeout(_)
                | CodeGraphError::WorkspaceLock(_)
        )
    }

    /// Whether this error must abort the whole run rather than being handled locally (§7).
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            CodeGraphError::Configuration(_)
                | CodeGraphError::GrammarLoadFailed { .. }
                | CodeGraphError::GrammarNotFound { .. }
                | CodeGraphError::StorageConnection(_)
                | CodeGraphError::WorkspaceInit(_)
                | CodeGraphError::LlmAuthentication(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, CodeGraphError>;
