use crate::error::Result;
use crate::types::{
    CodeElement, DataFlowRelationship, ElementId, FileMetadata, RelationshipType, StructuralRelationship,
    WorkspaceInfo,
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Which embedding channel a vector or a search query targets (§4.4, §4.6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmbeddingChannel {
    Content,
    Semantic,
    Relationship,
    DataFlow,
}

/// Parameters for a [`GraphStore::search`] call (§4.6).
#[derive(Debug, Clone)]
pub struct SearchOptions {
    pub limit: usize,
    pub threshold: f32,
    pub embedding_type: EmbeddingChannel,
    pub path_filter: Option<String>,
    pub kind_filter: Option<String>,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            limit: 10,
            threshold: 0.0,
            embedding_type: EmbeddingChannel::Semantic,
            path_filter: None,
            kind_filter: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SearchResult {
    pub element_id: ElementId,
    pub similarity: f32,
}

/// Direction to traverse outgoing/incoming edges (§4.6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TraversalDirection {
    Outgoing,
    Incoming,
    Both,
}

#[derive(Debug, Clone)]
pub struct TraversalOptions {
    pub relationship_types: Vec<RelationshipType>,
    pub max_depth: usize,
    pub direction: TraversalDirection,
}

/// Result of a breadth-first [`GraphStore::traverse`] call: nodes and edges visited, the
/// BFS visitation order, and the deepest layer reached.
#[derive(Debug, Clone, Default)]
pub struct TraversalResult {
    pub nodes: Vec<ElementId>,
    pub edges: Vec<(ElementId, ElementId)>,
    pub path: Vec<ElementId>,
    pub depth: usize,
}

/// Outcome of a [`GraphStore::create_batch`] call: per-record partial success (§4.6).
#[derive(Debug, Clone, Default)]
pub struct BatchCommitResult {
    pub created_ids: Vec<ElementId>,
    pub dropped: Vec<String>,
    pub errors: Vec<String>,
}

/// The graph-capable vector database abstraction (C6, §4.6).
///
/// The concrete storage engine is an external collaborator; this trait is the documented
/// query surface any adapter must implement.
#[async_trait]
pub trait GraphStore: Send + Sync {
    /// Idempotent upsert keyed by `element.id`; on conflict replaces description,
    /// embeddings, and `updated_at`, preserving `created_at` (§4.6 invariant 1).
    async fn create_element(&self, element: CodeElement) -> Result<ElementId>;

    async fn create_relationship(&self, relationship: StructuralRelationship) -> Result<()>;

    async fn create_data_flow(&self, flow: DataFlowRelationship) -> Result<()>;

    /// Stage a whole file's elements and relationships in one call; atomic per record, not
    /// per batch. Relationships whose endpoints do not resolve are dropped and reported.
    async fn create_batch(
        &self,
        elements: Vec<CodeElement>,
        relationships: Vec<StructuralRelationship>,
    ) -> Result<BatchCommitResult>;

    async fn get_element(&self, id: &ElementId) -> Result<Option<CodeElement>>;

    async fn find_by_name(&self, name: &str) -> Result<Vec<CodeElement>>;

    async fn search(&self, query_embedding: &[f32], options: SearchOptions) -> Result<Vec<SearchResult>>;

    async fn traverse(&self, start: &ElementId, options: TraversalOptions) -> Result<TraversalResult>;

    /// Cascades to owned relationships and data flows; returns the count of elements removed.
    async fn delete_by_path(&self, path: &str) -> Result<usize>;

    /// Idempotent upsert keyed by `metadata.path`, recorded once per file per run (§4.7 step 7).
    async fn upsert_file_metadata(&self, metadata: FileMetadata) -> Result<()>;

    /// Idempotent upsert of the single per-workspace record keyed by `info.path`.
    async fn upsert_workspace_info(&self, info: WorkspaceInfo) -> Result<()>;

    async fn get_workspace_info(&self, path: &str) -> Result<Option<WorkspaceInfo>>;
}
