use crate::agent_loop::{run_agent_loop, AgentLoopConfig};
use crate::digest_mode::{describe_component, summarize_digest, DigestComponent, DigestResult};
use crate::llm_backend::LlmBackend;
use crate::token_tracker::{TokenTracker, TokenUsage};
use crate::tools::ToolExecutor;
use codegraph_core::{retry_with_backoff, BackoffPolicy, CodeGraphError, LlmConfig, OrchestratorMode, Result};
use std::time::Duration;

/// Every description call is retried up to 3 times with a 2s base / factor 2 exponential
/// backoff (2s, then 4s between attempts) before falling back (§4.5, §7).
const DESCRIPTION_RETRY_POLICY: BackoffPolicy = BackoffPolicy::new(3, Duration::from_secs(2), 2.0);

pub struct Orchestrator<'a> {
    backend: &'a dyn LlmBackend,
    tracker: TokenTracker,
}

impl<'a> Orchestrator<'a> {
    pub fn new(backend: &'a dyn LlmBackend) -> Self {
        Self {
            backend,
            tracker: TokenTracker::new(),
        }
    }

    pub fn token_usage(&self) -> TokenUsage {
        self.tracker.usage()
    }

    /// Runs Mode A (tool-driven) to completion; used when `config.mode` is `ToolDrivenAgent`.
    pub async fn run_tool_driven(
        &self,
        executor: &dyn ToolExecutor,
        goal: &str,
        config: &LlmConfig,
    ) -> Result<String> {
        let loop_config = AgentLoopConfig {
            max_iterations: config.max_iterations,
        };
        run_agent_loop(self.backend, executor, goal, loop_config, &self.tracker).await
    }

    /// Runs Mode B (digest-driven): one summary call, then one retried description call per
    /// discovered component. A component whose description call exhausts its retries gets a
    /// fallback string instead of aborting the whole run (§4.5, §7 — the pipeline never
    /// stalls on a single LLM failure).
    pub async fn run_digest_driven(
        &self,
        digest: &str,
        file_contents: impl Fn(&str) -> Option<String>,
    ) -> Result<(DigestResult, Vec<DescribedComponent>)> {
        let summary = summarize_digest(self.backend, digest, &self.tracker).await?;

        let mut described = Vec::new();
        for entry in &summary.entries {
            let content = file_contents(&entry.filename).unwrap_or_default();
            for component in &entry.components {
                let description = self.describe_with_retry(&content, component).await;
                described.push(DescribedComponent {
                    filename: entry.filename.clone(),
                    component: component.clone(),
                    description,
                });
            }
        }

        Ok((summary, described))
    }

    async fn describe_with_retry(&self, content: &str, component: &DigestComponent) -> String {
        let result = retry_with_backoff(
            DESCRIPTION_RETRY_POLICY,
            CodeGraphError::is_retryable,
            |_attempt| describe_component(self.backend, content, component, &self.tracker),
        )
        .await;

        match result {
            Ok(description) => description,
            Err(e) => format!("{} ({}): {e}", component.name, component.kind),
        }
    }
}

#[derive(Debug, Clone)]
pub struct DescribedComponent {
    pub filename: String,
    pub component: DigestComponent,
    pub description: String,
}

/// Dispatches to the configured mode (§4.5: "Specify both modes as first-class alternatives
/// selected by configuration").
pub async fn run_configured_mode(
    backend: &dyn LlmBackend,
    executor: &dyn ToolExecutor,
    config: &LlmConfig,
    goal: &str,
) -> Result<String> {
    let orchestrator = Orchestrator::new(backend);
    match config.mode {
        OrchestratorMode::ToolDrivenAgent => orchestrator.run_tool_driven(executor, goal, config).await,
        OrchestratorMode::DigestDriven => Err(CodeGraphError::Configuration(
            "digest-driven mode requires a pre-built digest; call run_digest_driven directly".to_string(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm_backend::{GenerationConfig, LlmResponse, Message, ToolDefinition};
    use crate::tools::{
        CreateIndexEntryArgs, GetSymbolDetailsArgs, ListFilesystemArgs, ListSymbolsInFileArgs, ReadFileArgs,
    };
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct AlwaysFailsBackend {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl LlmBackend for AlwaysFailsBackend {
        async fn generate_chat(
            &self,
            _messages: &[Message],
            _tools: &[ToolDefinition],
            _config: &GenerationConfig,
        ) -> Result<LlmResponse> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(CodeGraphError::LlmTimeout("simulated timeout".to_string()))
        }
    }

    struct NoopExecutor;

    #[async_trait]
    impl ToolExecutor for NoopExecutor {
        async fn list_filesystem(&self, _args: ListFilesystemArgs) -> Result<serde_json::Value> {
            Ok(serde_json::json!([]))
        }
        async fn read_file(&self, _args: ReadFileArgs) -> Result<serde_json::Value> {
            Ok(serde_json::json!(""))
        }
        async fn list_symbols_in_file(&self, _args: ListSymbolsInFileArgs) -> Result<serde_json::Value> {
            Ok(serde_json::json!([]))
        }
        async fn get_symbol_details(&self, _args: GetSymbolDetailsArgs) -> Result<serde_json::Value> {
            Ok(serde_json::json!({}))
        }
        async fn create_index_entry(&self, _args: CreateIndexEntryArgs) -> Result<serde_json::Value> {
            Ok(serde_json::json!({}))
        }
    }

    #[tokio::test]
    async fn description_failure_falls_back_after_exhausting_retries() {
        let backend = AlwaysFailsBackend { calls: AtomicUsize::new(0) };
        let orchestrator = Orchestrator::new(&backend);
        let component = DigestComponent {
            name: "Widget".to_string(),
            kind: "class".to_string(),
        };
        let description = orchestrator.describe_with_retry("class Widget {}", &component).await;
        assert!(description.starts_with("Widget (class):"));
        assert_eq!(backend.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn digest_driven_mode_rejects_run_configured_mode_entry_point() {
        let backend = AlwaysFailsBackend { calls: AtomicUsize::new(0) };
        let executor = NoopExecutor;
        let mut config = LlmConfig::default();
        config.mode = OrchestratorMode::DigestDriven;
        let result = run_configured_mode(&backend, &executor, &config, "index this repo").await;
        assert!(matches!(result, Err(CodeGraphError::Configuration(_))));
    }
}
