use crate::llm_backend::ToolDefinition;
use async_trait::async_trait;
use codegraph_core::Result;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct ListFilesystemArgs {
    /// Repo-relative directory path.
    pub path: String,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct ReadFileArgs {
    /// Repo-relative file path.
    pub path: String,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct ListSymbolsInFileArgs {
    /// Repo-relative file path.
    pub path: String,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct GetSymbolDetailsArgs {
    /// Repo-relative file path.
    pub path: String,
    /// Name of the symbol as extracted from the file.
    pub symbol_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CreateIndexEntryArgs {
    pub path: String,
    pub symbol_name: String,
    pub symbol_kind: String,
    pub start_line: u32,
    pub end_line: u32,
    pub content: String,
    pub synthesized_description: String,
}

fn schema_of<T: JsonSchema>() -> serde_json::Value {
    serde_json::to_value(schemars::schema_for!(T)).expect("generated schema always serializes")
}

/// The fixed, enumerated toolset offered to the model in Mode A (§4.5).
pub fn tool_definitions() -> Vec<ToolDefinition> {
    vec![
        ToolDefinition {
            name: "list_filesystem".to_string(),
            description: "List files and directories under a repo-relative path.".to_string(),
            parameters: schema_of::<ListFilesystemArgs>(),
        },
        ToolDefinition {
            name: "read_file".to_string(),
            description: "Read the full contents of a repo-relative file.".to_string(),
            parameters: schema_of::<ReadFileArgs>(),
        },
        ToolDefinition {
            name: "list_symbols_in_file".to_string(),
            description: "List the named symbols extracted from a repo-relative file.".to_string(),
            parameters: schema_of::<ListSymbolsInFileArgs>(),
        },
        ToolDefinition {
            name: "get_symbol_details".to_string(),
            description: "Get the span and content of one symbol in a file.".to_string(),
            parameters: schema_of::<GetSymbolDetailsArgs>(),
        },
        ToolDefinition {
            name: "create_index_entry".to_string(),
            description: "Record a synthesized description for one symbol.".to_string(),
            parameters: schema_of::<CreateIndexEntryArgs>(),
        },
    ]
}

/// Executes the fixed toolset against the real workspace. Implemented outside this crate
/// (the coordinator has the filesystem root, the parser, and the graph store); this trait
/// is the seam the agent loop calls through.
#[async_trait]
pub trait ToolExecutor: Send + Sync {
    async fn list_filesystem(&self, args: ListFilesystemArgs) -> Result<serde_json::Value>;
    async fn read_file(&self, args: ReadFileArgs) -> Result<serde_json::Value>;
    async fn list_symbols_in_file(&self, args: ListSymbolsInFileArgs) -> Result<serde_json::Value>;
    async fn get_symbol_details(&self, args: GetSymbolDetailsArgs) -> Result<serde_json::Value>;
    async fn create_index_entry(&self, args: CreateIndexEntryArgs) -> Result<serde_json::Value>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_tool_declares_its_required_fields() {
        for tool in tool_definitions() {
            assert!(tool.parameters.get("required").is_some(), "{} has no required list", tool.name);
        }
    }

    #[test]
    fn exactly_five_tools_are_declared() {
        assert_eq!(tool_definitions().len(), 5);
    }
}
