use crate::error::{CodeGraphError, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// A fully-resolved configuration object (§6, §10.3).
///
/// The core never reads environment variables or `.env` files itself — an external,
/// out-of-scope loader is responsible for assembling this struct (e.g. from env vars,
/// `.env`, and `<workspace>/.vibe/config`). The core only ever consumes an already
/// finalized `Configuration` and validates the subset it needs when constructing each
/// dependent service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Configuration {
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub processing: ProcessingConfig,
    pub workspace: WorkspaceConfig,
}

/// Selects between the two first-class orchestrator strategies (§4.5): a tool-driven agent
/// loop over one conversation, or a whole-codebase digest followed by per-component prompts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrchestratorMode {
    ToolDrivenAgent,
    DigestDriven,
}

impl Default for OrchestratorMode {
    fn default() -> Self {
        Self::ToolDrivenAgent
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    pub model: String,
    pub api_key: Option<String>,
    pub temperature: f32,
    pub max_tokens: usize,
    pub verbose: bool,
    #[serde(default)]
    pub mode: OrchestratorMode,
    pub max_iterations: usize,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            model: "claude-sonnet".to_string(),
            api_key: None,
            temperature: 0.1,
            max_tokens: 4096,
            verbose: false,
            mode: OrchestratorMode::default(),
            max_iterations: 20,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    pub model: String,
    pub dimensions: usize,
    pub batch_size: usize,
    pub enable_caching: bool,
    pub api_key: Option<String>,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            model: "text-embedding".to_string(),
            dimensions: 768,
            batch_size: 32,
            enable_caching: true,
            api_key: None,
        }
    }
}

impl EmbeddingConfig {
    /// Validate the subset of the configuration the embedding service needs (§4.4).
    pub fn validate(&self) -> Result<()> {
        if self.dimensions == 0 {
            return Err(CodeGraphError::Configuration(
                "embedding.dimensions must be a positive integer".to_string(),
            ));
        }
        if self.batch_size == 0 {
            return Err(CodeGraphError::Configuration(
                "embedding.batch_size must be a positive integer".to_string(),
            ));
        }
        if self.model.trim().is_empty() {
            return Err(CodeGraphError::Configuration(
                "embedding.model must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    pub db_path: PathBuf,
    pub base_port: u16,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 4243,
            username: None,
            password: None,
            db_path: PathBuf::from(".vibe/code.db"),
            base_port: 4243,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessingConfig {
    pub parallel_limit: usize,
    pub include_globs: Vec<String>,
    pub exclude_globs: Vec<String>,
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            parallel_limit: 10,
            include_globs: vec!["**/*.ts".to_string(), "**/*.tsx".to_string(), "**/*.js".to_string(), "**/*.jsx".to_string()],
            exclude_globs: vec!["**/node_modules/**".to_string(), "**/dist/**".to_string()],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndexingMode {
    Full,
    Incremental,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkspaceConfig {
    pub root: PathBuf,
    pub mode: IndexingMode,
}

impl Configuration {
    /// Fatal-only top-level validation (§7 Configuration errors are always fatal).
    ///
    /// Subsystem-specific constraints (e.g. embedding dimensions) are validated lazily by
    /// the component that needs them, since a pure query path may run without an LLM key.
    pub fn validate(&self) -> Result<()> {
        if !self.workspace.root.is_absolute() && self.workspace.root.as_os_str().is_empty() {
            return Err(CodeGraphError::Configuration(
                "workspace.root must be set".to_string(),
            ));
        }
        if self.processing.parallel_limit == 0 {
            return Err(CodeGraphError::Configuration(
                "processing.parallel_limit must be a positive integer".to_string(),
            ));
        }
        self.embedding.validate()?;
        Ok(())
    }

    /// `true` if the LLM subsystem is configured with credentials.
    pub fn llm_available(&self) -> bool {
        self.llm.api_key.as_deref().map(|k| !k.is_empty()).unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_config() -> Configuration {
        Configuration {
            llm: LlmConfig::default(),
            embedding: EmbeddingConfig::default(),
            storage: StorageConfig::default(),
            processing: ProcessingConfig::default(),
            workspace: WorkspaceConfig {
                root: PathBuf::from("/tmp/workspace"),
                mode: IndexingMode::Full,
            },
        }
    }

    #[test]
    fn valid_configuration_passes() {
        assert!(base_config().validate().is_ok());
    }

    #[test]
    fn zero_dimensions_is_invalid_configuration() {
        let mut cfg = base_config();
        cfg.embedding.dimensions = 0;
        assert!(matches!(cfg.validate(), Err(CodeGraphError::Configuration(_))));
    }

    #[test]
    fn zero_parallel_limit_is_invalid_configuration() {
        let mut cfg = base_config();
        cfg.processing.parallel_limit = 0;
        assert!(matches!(cfg.validate(), Err(CodeGraphError::Configuration(_))));
    }
}
