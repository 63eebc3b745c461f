use crate::discovery::discover_files;
use crate::tool_executor::WorkspaceToolExecutor;
use codegraph_ai::{LlmBackend, Orchestrator, TokenUsage, ToolExecutor};
use codegraph_core::{
    CancellationToken, CodeElement, CodeGraphError, Configuration, DataFlowRelationship, EmbeddingChannel,
    FileMetadata, GraphStore, IndexingMode, IndexingStrategy, OrchestratorMode, ProgressReporter, Result, Status,
    StructuralRelationship, WorkspaceInfo,
};
use codegraph_parser::{detect_language, extract_file, FileParseResult, ParsingPipeline};
use codegraph_relationships::{analyze_dataflow, analyze_structural, NameIndex};
use codegraph_vector::EmbeddingService;
use futures::stream::{self, StreamExt};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, warn};

/// Aggregate outcome of one [`IndexingPipeline::run`] call (§4.7).
#[derive(Debug, Clone, Default)]
pub struct PipelineSummary {
    pub files_discovered: usize,
    pub files_indexed: usize,
    pub files_failed: usize,
    pub elements_indexed: usize,
    pub token_usage: TokenUsage,
}

struct ParsedFile {
    path: String,
    source: String,
    result: FileParseResult,
    tree: tree_sitter::Tree,
}

struct AnalyzedFile {
    parsed: ParsedFile,
    relationships: Vec<StructuralRelationship>,
    dataflow: Vec<DataFlowRelationship>,
    dataflow_anchors: Vec<CodeElement>,
}

/// Drives C1 → C2 → C3 → C5 → C4 → C6 over a whole workspace (§4.7).
pub struct IndexingPipeline {
    root: PathBuf,
    config: Configuration,
    parser: Arc<ParsingPipeline>,
    embeddings: Arc<EmbeddingService>,
    store: Arc<dyn GraphStore>,
    llm: Arc<dyn LlmBackend>,
}

impl IndexingPipeline {
    pub fn new(
        root: PathBuf,
        config: Configuration,
        parser: Arc<ParsingPipeline>,
        embeddings: Arc<EmbeddingService>,
        store: Arc<dyn GraphStore>,
        llm: Arc<dyn LlmBackend>,
    ) -> Self {
        Self { root, config, parser, embeddings, store, llm }
    }

    pub async fn run(&self, progress: &ProgressReporter, cancellation: &CancellationToken) -> Result<PipelineSummary> {
        self.config.validate()?;

        let mut summary = PipelineSummary::default();
        let paths = discover_files(&self.root, &self.config.processing)?;
        summary.files_discovered = paths.len();
        for path in &paths {
            progress.set_status(path.display().to_string(), Status::Queued, None);
        }
        progress.render(true, |s| crate::progress::log_progress(s));

        let parse_limit = self.config.processing.parallel_limit.max(1);
        let parsed: Vec<_> = stream::iter(paths.into_iter())
            .map(|path| self.parse_one(path))
            .buffer_unordered(parse_limit)
            .collect()
            .await;

        let mut files = Vec::with_capacity(parsed.len());
        for outcome in parsed {
            match outcome {
                Ok(file) => {
                    progress.set_status(file.path.clone(), Status::Analyzing, None);
                    files.push(file);
                }
                Err((_, e)) if e.is_fatal() => return Err(e),
                Err((path, e)) => {
                    warn!("skipping {path}: {e}");
                    progress.set_status(path, Status::Failed, Some(e.to_string()));
                    summary.files_failed += 1;
                }
            }
        }

        if cancellation.is_cancelled() {
            return Ok(summary);
        }

        let index = NameIndex::new();
        for file in &files {
            index.index_file(&file.result.elements);
        }

        let mut analyzed: Vec<AnalyzedFile> = files
            .into_iter()
            .map(|parsed| {
                let relationships = analyze_structural(&parsed.result, &parsed.tree, &parsed.source, &index);
                let (dataflow, dataflow_anchors) = analyze_dataflow(&parsed.result, &parsed.tree, &parsed.source, &index);
                AnalyzedFile { parsed, relationships, dataflow, dataflow_anchors }
            })
            .collect();

        if cancellation.is_cancelled() {
            return Ok(summary);
        }

        summary.token_usage = self.describe(&mut analyzed).await?;

        progress.render(true, |s| crate::progress::log_progress(s));

        for file in &analyzed {
            if cancellation.is_cancelled() {
                break;
            }
            match self.embed_and_commit(file).await {
                Ok(element_count) => {
                    progress.set_status(file.parsed.path.clone(), Status::Completed, None);
                    summary.files_indexed += 1;
                    summary.elements_indexed += element_count;
                }
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    warn!("failed to commit {}: {e}", file.parsed.path);
                    progress.set_status(file.parsed.path.clone(), Status::Failed, Some(e.to_string()));
                    summary.files_failed += 1;
                }
            }
        }

        self.store
            .upsert_workspace_info(WorkspaceInfo {
                path: self.root.display().to_string(),
                created_at: chrono::Utc::now(),
                last_indexed: chrono::Utc::now(),
                total_files: summary.files_indexed,
                total_elements: summary.elements_indexed,
                indexing_strategy: match self.config.workspace.mode {
                    IndexingMode::Full => IndexingStrategy::Full,
                    IndexingMode::Incremental => IndexingStrategy::Incremental,
                },
            })
            .await?;

        progress.render(true, |s| crate::progress::log_progress(s));
        Ok(summary)
    }

    async fn parse_one(&self, path: PathBuf) -> std::result::Result<ParsedFile, (String, CodeGraphError)> {
        let display = path.display().to_string();
        let source = tokio::fs::read_to_string(&path)
            .await
            .map_err(|e| (display.clone(), CodeGraphError::Filesystem { operation: "read".to_string(), source: e }))?;

        let relative = path
            .strip_prefix(&self.root)
            .unwrap_or(&path)
            .to_string_lossy()
            .replace('\\', "/");

        let parser = Arc::clone(&self.parser);
        let relative_for_blocking = relative.clone();
        let source_for_blocking = source.clone();
        let (result, tree) = tokio::task::spawn_blocking(move || {
            let language = detect_language(&relative_for_blocking);
            let tree = parser.parse(&source_for_blocking, language)?;
            let result = extract_file(language, &relative_for_blocking, &source_for_blocking, &tree);
            Ok::<_, CodeGraphError>((result, tree))
        })
        .await
        .map_err(|e| (relative.clone(), CodeGraphError::Extraction(format!("parse task panicked: {e}"))))?
        .map_err(|e| (relative.clone(), e))?;

        Ok(ParsedFile { path: relative, source, result, tree })
    }

    /// Dispatches description generation for the whole run in the configured mode (§4.5,
    /// §4.7 step 5). Mode A runs one conversation over the entire workspace; Mode B sends
    /// one whole-codebase digest then one retried call per discovered component.
    async fn describe(&self, files: &mut [AnalyzedFile]) -> Result<TokenUsage> {
        let orchestrator = Orchestrator::new(self.llm.as_ref());
        match self.config.llm.mode {
            OrchestratorMode::ToolDrivenAgent => {
                let executor = WorkspaceToolExecutor::new(self.root.clone());
                for file in files.iter() {
                    executor.register_file(file.parsed.result.clone());
                }
                let goal = "Index this workspace: explore its files, enumerate the symbols worth \
                    describing, and call create_index_entry once per symbol with a concise, accurate \
                    description.";
                orchestrator.run_tool_driven(&executor as &dyn ToolExecutor, goal, &self.config.llm).await?;

                for file in files.iter_mut() {
                    for element in file.parsed.result.elements.iter_mut() {
                        if let Some(description) = executor.take_description(&file.parsed.path, &element.element_name) {
                            element.description = Some(description);
                        }
                    }
                }
            }
            OrchestratorMode::DigestDriven => {
                let digest = build_digest(files);
                let (_, described) = orchestrator
                    .run_digest_driven(&digest, |filename| {
                        files
                            .iter()
                            .find(|f| f.parsed.path == filename)
                            .map(|f| f.parsed.source.clone())
                    })
                    .await?;

                for component in described {
                    if let Some(file) = files.iter_mut().find(|f| f.parsed.path == component.filename) {
                        if let Some(element) = file
                            .parsed
                            .result
                            .elements
                            .iter_mut()
                            .find(|e| e.element_name == component.component.name)
                        {
                            element.description = Some(component.description);
                        }
                    }
                }
            }
        }
        Ok(orchestrator.token_usage())
    }

    /// Embeds every element/relationship/data-flow narrative and commits one file's worth
    /// of records in element-first order (§4.7 steps 6-7). Returns the element count.
    async fn embed_and_commit(&self, file: &AnalyzedFile) -> Result<usize> {
        let mut elements = file.parsed.result.elements.clone();

        let contents: Vec<String> = elements.iter().map(|e| e.content.clone()).collect();
        let content_vectors = self.embeddings.embed_batch(EmbeddingChannel::Content, &contents).await?;
        let semantic_inputs: Vec<String> = elements
            .iter()
            .map(|e| e.description.clone().unwrap_or_else(|| e.content.clone()))
            .collect();
        let semantic_vectors = self.embeddings.embed_batch(EmbeddingChannel::Semantic, &semantic_inputs).await?;

        for (i, element) in elements.iter_mut().enumerate() {
            element.content_embedding = content_vectors.vectors[i].clone();
            element.semantic_embedding = semantic_vectors.vectors[i].clone();
        }
        for diagnostic in content_vectors.diagnostics.iter().chain(semantic_vectors.diagnostics.iter()) {
            warn!("{}: {diagnostic}", file.parsed.path);
        }

        let mut relationships = file.relationships.clone();
        for relationship in relationships.iter_mut() {
            let text = relationship
                .semantic_description
                .clone()
                .unwrap_or_else(|| format!("{} {} {}", relationship.from, relationship.relationship_type, relationship.to));
            relationship.relationship_embedding = Some(self.embeddings.embed(EmbeddingChannel::Relationship, &text).await?);
        }

        let mut dataflow = file.dataflow.clone();
        for flow in dataflow.iter_mut() {
            let text = flow
                .data_transformation_description
                .clone()
                .unwrap_or_else(|| format!("{} {} {}", flow.from, flow.flow_type, flow.to));
            flow.data_flow_embedding = Some(self.embeddings.embed(EmbeddingChannel::DataFlow, &text).await?);
        }

        let element_count = elements.len();
        elements.extend(file.dataflow_anchors.clone());
        let commit = self.store.create_batch(elements, relationships).await?;
        if !commit.errors.is_empty() {
            error!("{}: {} element commit error(s)", file.parsed.path, commit.errors.len());
        }
        if !commit.dropped.is_empty() {
            warn!("{}: dropped {} unresolved relationship(s)", file.parsed.path, commit.dropped.len());
        }

        for flow in dataflow {
            if let Err(e) = self.store.create_data_flow(flow).await {
                warn!("{}: failed to commit a data-flow edge: {e}", file.parsed.path);
            }
        }

        self.store
            .upsert_file_metadata(FileMetadata {
                path: file.parsed.path.clone(),
                size: file.parsed.source.len() as u64,
                modified_at: chrono::Utc::now(),
                language: detect_language(&file.parsed.path),
                checksum: CodeElement::compute_content_hash(&file.parsed.source),
                symbol_count: element_count,
                processing_time_ms: file.parsed.result.processing_time.as_millis() as u64,
                last_indexed: chrono::Utc::now(),
            })
            .await?;

        Ok(element_count)
    }
}

/// Mode B's single-shot input: the summary system instruction asks for "the full contents
/// of a codebase in a single digest", so this is a concatenation of every file's source
/// rather than a pre-summarized outline (§4.5).
fn build_digest(files: &[AnalyzedFile]) -> String {
    files.iter().map(|f| render_digest_entry(&f.parsed.path, &f.parsed.source)).collect()
}

fn render_digest_entry(path: &str, source: &str) -> String {
    format!("## {path}\n```\n{source}\n```\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn digest_entry_fences_the_source_under_its_path_heading() {
        let rendered = render_digest_entry("src/a.ts", "export const a = 1;");
        assert!(rendered.starts_with("## src/a.ts"));
        assert!(rendered.contains("export const a = 1;"));
        assert!(rendered.trim_end().ends_with("```"));
    }
}
