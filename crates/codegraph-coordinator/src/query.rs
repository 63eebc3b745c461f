use codegraph_core::{
    CodeElement, EmbeddingChannel, GraphStore, Result, SearchOptions, TraversalDirection, TraversalOptions,
};
use codegraph_vector::EmbeddingService;
use std::sync::Arc;

/// One retrieved element with the similarity score that surfaced it and, if traversal ran,
/// the relationship hop count from the nearest seed (0 for a direct hit).
#[derive(Debug, Clone)]
pub struct RankedContext {
    pub element: CodeElement,
    pub similarity: f32,
    pub hops: usize,
}

/// Parameters for [`query`] beyond the raw query string; mirrors [`SearchOptions`] plus the
/// traversal knobs, all optional so a caller can ask for a pure similarity search.
#[derive(Debug, Clone)]
pub struct QueryOptions {
    pub limit: usize,
    pub threshold: f32,
    pub embedding_type: EmbeddingChannel,
    pub path_filter: Option<String>,
    pub kind_filter: Option<String>,
    pub traverse: Option<TraversalOptions>,
}

impl Default for QueryOptions {
    fn default() -> Self {
        Self {
            limit: 10,
            threshold: 0.0,
            embedding_type: EmbeddingChannel::Semantic,
            path_filter: None,
            kind_filter: None,
            traverse: None,
        }
    }
}

/// The query path (Q): embed the query, run a similarity search, and when `options.traverse`
/// is set, expand each hit outward to assemble richer context. Seed hits always come first,
/// in descending similarity order; traversal results follow, deduplicated against the seeds.
pub async fn query(
    store: &Arc<dyn GraphStore>,
    embeddings: &Arc<EmbeddingService>,
    text: &str,
    options: QueryOptions,
) -> Result<Vec<RankedContext>> {
    let query_embedding = embeddings.embed(options.embedding_type, text).await?;

    let search_options = SearchOptions {
        limit: options.limit,
        threshold: options.threshold,
        embedding_type: options.embedding_type,
        path_filter: options.path_filter,
        kind_filter: options.kind_filter,
    };
    let hits = store.search(&query_embedding, search_options).await?;

    let mut seen = std::collections::HashSet::new();
    let mut results = Vec::new();
    for hit in &hits {
        if let Some(element) = store.get_element(&hit.element_id).await? {
            seen.insert(hit.element_id.clone());
            results.push(RankedContext { element, similarity: hit.similarity, hops: 0 });
        }
    }

    if let Some(traversal_options) = options.traverse {
        for hit in &hits {
            let traversal = store
                .traverse(
                    &hit.element_id,
                    TraversalOptions {
                        relationship_types: traversal_options.relationship_types.clone(),
                        max_depth: traversal_options.max_depth,
                        direction: traversal_options.direction,
                    },
                )
                .await?;

            for (depth, node) in traversal.path.iter().enumerate() {
                if seen.contains(node) {
                    continue;
                }
                if let Some(element) = store.get_element(node).await? {
                    seen.insert(node.clone());
                    results.push(RankedContext { element, similarity: hit.similarity, hops: depth + 1 });
                }
            }
        }
    }

    Ok(results)
}

/// Convenience for the common case: traverse every direct structural/data-flow neighbor one
/// hop out, in either direction.
pub fn one_hop_both_directions() -> TraversalOptions {
    TraversalOptions {
        relationship_types: Vec::new(),
        max_depth: 1,
        direction: TraversalDirection::Both,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use codegraph_core::{
        BatchCommitResult, CodeGraphError, DataFlowRelationship, ElementId, FileMetadata, SearchResult,
        StructuralRelationship, WorkspaceInfo,
    };
    use codegraph_vector::EmbeddingBackend;
    use std::collections::HashMap;
    use std::sync::Mutex;

    struct StubBackend;

    #[async_trait]
    impl EmbeddingBackend for StubBackend {
        async fn embed_texts(&self, _model: &str, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            Ok(texts.iter().map(|_| vec![1.0, 0.0]).collect())
        }
        fn dimension(&self) -> usize {
            2
        }
    }

    struct StubStore {
        elements: Mutex<HashMap<String, CodeElement>>,
    }

    fn element(id: &str, name: &str) -> CodeElement {
        let content = "function f() {}".to_string();
        CodeElement {
            id: ElementId::from_raw(id.to_string()),
            file_path: "src/lib.ts".to_string(),
            element_name: name.to_string(),
            element_type: codegraph_core::ElementKind::Function,
            span: codegraph_core::Span { start_byte: 0, end_byte: content.len(), start_line: 1, end_line: 2, start_column: 0, end_column: 0 },
            content_hash: CodeElement::compute_content_hash(&content),
            content,
            description: None,
            search_phrases: Default::default(),
            exported: false,
            is_async: false,
            parameters: Vec::new(),
            return_type: None,
            inheritance: Vec::new(),
            visibility: None,
            content_embedding: None,
            semantic_embedding: None,
            created_at: chrono::Utc::now(),
            updated_at: chrono::Utc::now(),
        }
    }

    #[async_trait]
    impl GraphStore for StubStore {
        async fn create_element(&self, _element: CodeElement) -> Result<ElementId> {
            unimplemented!()
        }
        async fn create_relationship(&self, _relationship: StructuralRelationship) -> Result<()> {
            unimplemented!()
        }
        async fn create_data_flow(&self, _flow: DataFlowRelationship) -> Result<()> {
            unimplemented!()
        }
        async fn create_batch(
            &self,
            _elements: Vec<CodeElement>,
            _relationships: Vec<StructuralRelationship>,
        ) -> Result<BatchCommitResult> {
            unimplemented!()
        }
        async fn get_element(&self, id: &ElementId) -> Result<Option<CodeElement>> {
            Ok(self.elements.lock().unwrap().get(id.as_str()).cloned())
        }
        async fn find_by_name(&self, _name: &str) -> Result<Vec<CodeElement>> {
            unimplemented!()
        }
        async fn search(
            &self,
            _query_embedding: &[f32],
            _options: SearchOptions,
        ) -> Result<Vec<SearchResult>> {
            Ok(vec![SearchResult { element_id: ElementId::from_raw("validate_user".to_string()), similarity: 0.9 }])
        }
        async fn traverse(
            &self,
            _start: &ElementId,
            _options: TraversalOptions,
        ) -> Result<codegraph_core::TraversalResult> {
            Ok(codegraph_core::TraversalResult {
                nodes: vec![ElementId::from_raw("format_date".to_string())],
                edges: vec![],
                path: vec![ElementId::from_raw("format_date".to_string())],
                depth: 1,
            })
        }
        async fn delete_by_path(&self, _path: &str) -> Result<usize> {
            unimplemented!()
        }
        async fn upsert_file_metadata(&self, _metadata: FileMetadata) -> Result<()> {
            unimplemented!()
        }
        async fn upsert_workspace_info(&self, _info: WorkspaceInfo) -> Result<()> {
            unimplemented!()
        }
        async fn get_workspace_info(&self, _path: &str) -> Result<Option<WorkspaceInfo>> {
            unimplemented!()
        }
    }

    fn embedding_service() -> Arc<EmbeddingService> {
        let config = codegraph_core::EmbeddingConfig {
            model: "test".to_string(),
            dimensions: 2,
            batch_size: 4,
            enable_caching: false,
            api_key: Some("k".to_string()),
        };
        Arc::new(EmbeddingService::new(Arc::new(StubBackend), config).unwrap())
    }

    #[tokio::test]
    async fn seed_hit_is_returned_before_its_traversal_neighbors() {
        let mut elements = HashMap::new();
        elements.insert("validate_user".to_string(), element("validate_user", "validateUser"));
        elements.insert("format_date".to_string(), element("format_date", "formatDate"));
        let store: Arc<dyn GraphStore> = Arc::new(StubStore { elements: Mutex::new(elements) });

        let options = QueryOptions { traverse: Some(one_hop_both_directions()), ..Default::default() };
        let results = query(&store, &embedding_service(), "user validation", options).await.unwrap();

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].element.element_name, "validateUser");
        assert_eq!(results[0].hops, 0);
        assert_eq!(results[1].element.element_name, "formatDate");
        assert_eq!(results[1].hops, 1);
    }

    #[tokio::test]
    async fn missing_element_is_skipped_rather_than_failing_the_query() {
        let store: Arc<dyn GraphStore> = Arc::new(StubStore { elements: Mutex::new(HashMap::new()) });
        let results = query(&store, &embedding_service(), "user validation", QueryOptions::default())
            .await
            .unwrap();
        assert!(results.is_empty());
    }

    #[test]
    fn error_kind_is_retryable_matches_embedding_backend_failures() {
        assert!(CodeGraphError::EmbeddingRetryable("x".to_string()).is_retryable());
    }
}
