use codegraph_ai::{
    CreateIndexEntryArgs, GetSymbolDetailsArgs, ListFilesystemArgs, ListSymbolsInFileArgs, ReadFileArgs,
    ToolExecutor,
};
use codegraph_core::{CodeGraphError, Result};
use codegraph_parser::FileParseResult;
use dashmap::DashMap;
use std::path::PathBuf;

/// Backs Mode A's fixed toolset (§4.5) with the real workspace: the filesystem for
/// `list_filesystem`/`read_file`, the already-parsed elements for the two symbol-inspection
/// tools, and a shared map for `create_index_entry` that the pipeline drains afterwards.
pub struct WorkspaceToolExecutor {
    root: PathBuf,
    parsed: DashMap<String, FileParseResult>,
    descriptions: DashMap<(String, String), String>,
}

impl WorkspaceToolExecutor {
    pub fn new(root: PathBuf) -> Self {
        Self {
            root,
            parsed: DashMap::new(),
            descriptions: DashMap::new(),
        }
    }

    pub fn register_file(&self, result: FileParseResult) {
        self.parsed.insert(result.file_path.clone(), result);
    }

    /// Drains everything the model recorded via `create_index_entry` since the last drain.
    pub fn take_description(&self, file_path: &str, element_name: &str) -> Option<String> {
        self.descriptions
            .remove(&(file_path.to_string(), element_name.to_string()))
            .map(|(_, description)| description)
    }

    fn resolve(&self, relative: &str) -> PathBuf {
        self.root.join(relative)
    }
}

#[async_trait::async_trait]
impl ToolExecutor for WorkspaceToolExecutor {
    async fn list_filesystem(&self, args: ListFilesystemArgs) -> Result<serde_json::Value> {
        let dir = self.resolve(&args.path);
        let mut entries = tokio::fs::read_dir(&dir)
            .await
            .map_err(|e| CodeGraphError::NotFound(format!("{}: {e}", args.path)))?;

        let mut listing = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| CodeGraphError::NotFound(format!("{}: {e}", args.path)))?
        {
            let file_type = entry.file_type().await.map_err(|e| CodeGraphError::NotFound(e.to_string()))?;
            listing.push(serde_json::json!({
                "name": entry.file_name().to_string_lossy(),
                "is_dir": file_type.is_dir(),
            }));
        }
        Ok(serde_json::Value::Array(listing))
    }

    async fn read_file(&self, args: ReadFileArgs) -> Result<serde_json::Value> {
        let path = self.resolve(&args.path);
        let content = tokio::fs::read_to_string(&path)
            .await
            .map_err(|e| CodeGraphError::NotFound(format!("{}: {e}", args.path)))?;
        Ok(serde_json::Value::String(content))
    }

    async fn list_symbols_in_file(&self, args: ListSymbolsInFileArgs) -> Result<serde_json::Value> {
        let parsed = self
            .parsed
            .get(&args.path)
            .ok_or_else(|| CodeGraphError::NotFound(format!("{} has not been parsed", args.path)))?;
        let symbols: Vec<_> = parsed
            .elements
            .iter()
            .map(|e| serde_json::json!({"name": e.element_name, "kind": e.element_type.to_string()}))
            .collect();
        Ok(serde_json::Value::Array(symbols))
    }

    async fn get_symbol_details(&self, args: GetSymbolDetailsArgs) -> Result<serde_json::Value> {
        let parsed = self
            .parsed
            .get(&args.path)
            .ok_or_else(|| CodeGraphError::NotFound(format!("{} has not been parsed", args.path)))?;
        let element = parsed
            .elements
            .iter()
            .find(|e| e.element_name == args.symbol_name)
            .ok_or_else(|| CodeGraphError::NotFound(format!("no symbol named {}", args.symbol_name)))?;
        Ok(serde_json::json!({
            "name": element.element_name,
            "kind": element.element_type.to_string(),
            "start_line": element.span.start_line,
            "end_line": element.span.end_line,
            "content": element.content,
        }))
    }

    async fn create_index_entry(&self, args: CreateIndexEntryArgs) -> Result<serde_json::Value> {
        self.descriptions
            .insert((args.path.clone(), args.symbol_name.clone()), args.synthesized_description);
        Ok(serde_json::json!({"status": "recorded"}))
    }
}
