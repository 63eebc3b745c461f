pub mod agent_loop;
pub mod digest_mode;
pub mod llm_backend;
pub mod orchestrator;
pub mod token_tracker;
pub mod tools;

pub use agent_loop::{run_agent_loop, AgentLoopConfig};
pub use digest_mode::{describe_component, summarize_digest, DigestComponent, DigestFileEntry, DigestResult};
pub use llm_backend::{GenerationConfig, LlmBackend, LlmResponse, Message, MessageRole, ToolCall, ToolDefinition};
pub use orchestrator::{run_configured_mode, DescribedComponent, Orchestrator};
pub use token_tracker::{format, is_near_limit, progress, TokenTracker, TokenUsage};
pub use tools::{
    tool_definitions, CreateIndexEntryArgs, GetSymbolDetailsArgs, ListFilesystemArgs, ListSymbolsInFileArgs,
    ReadFileArgs, ToolExecutor,
};
