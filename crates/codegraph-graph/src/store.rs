use crate::schema::apply_schema;
use crate::search::run_search;
use crate::traversal::run_traversal;
use async_trait::async_trait;
use codegraph_core::{
    BatchCommitResult, CodeElement, CodeGraphError, DataFlowRelationship, ElementId, FileMetadata, GraphStore,
    Result, SearchOptions, SearchResult, StorageConfig, StructuralRelationship, TraversalOptions, TraversalResult,
    WorkspaceInfo,
};
use surrealdb::engine::any::{self, Any};
use surrealdb::opt::auth::Root;
use surrealdb::Surreal;
use tracing::{info, warn};

/// `GraphStore` backed by an embedded SurrealDB instance (§4.6). The connection string,
/// namespace, and database are derived from `StorageConfig`; `server.rs` owns the decision
/// of whether that connection targets an already-running process or a freshly launched one.
pub struct SurrealGraphStore {
    db: Surreal<Any>,
}

impl SurrealGraphStore {
    pub async fn connect(config: &StorageConfig) -> Result<Self> {
        let endpoint = format!("ws://{}:{}", config.host, config.port);
        let db = any::connect(endpoint)
            .await
            .map_err(|e| CodeGraphError::StorageConnection(format!("failed to connect: {e}")))?;

        if let (Some(username), Some(password)) = (&config.username, &config.password) {
            db.signin(Root { username, password })
                .await
                .map_err(|e| CodeGraphError::StorageConnection(format!("authentication failed: {e}")))?;
        }

        db.use_ns("codegraph")
            .use_db("codegraph")
            .await
            .map_err(|e| CodeGraphError::StorageConnection(format!("namespace selection failed: {e}")))?;

        apply_schema(&db).await?;

        info!("connected to graph store at {}:{}", config.host, config.port);
        Ok(Self { db })
    }

    pub(crate) fn connection(&self) -> &Surreal<Any> {
        &self.db
    }
}

fn query_err(e: impl std::fmt::Display) -> CodeGraphError {
    CodeGraphError::StorageQuery(e.to_string())
}

#[async_trait]
impl GraphStore for SurrealGraphStore {
    async fn create_element(&self, element: CodeElement) -> Result<ElementId> {
        let id = element.id.clone();
        let existing: Option<CodeElement> = self
            .db
            .select(("code_elements", id.as_str()))
            .await
            .map_err(query_err)?;

        let mut element = element;
        if let Some(existing) = existing {
            element.created_at = existing.created_at;
        }

        let _: Option<CodeElement> = self
            .db
            .upsert(("code_elements", id.as_str()))
            .content(element)
            .await
            .map_err(query_err)?;

        Ok(id)
    }

    async fn create_relationship(&self, relationship: StructuralRelationship) -> Result<()> {
        let id = relationship.id.clone();
        let _: Option<StructuralRelationship> = self
            .db
            .upsert(("structural_relationship", id.as_str()))
            .content(relationship)
            .await
            .map_err(query_err)?;
        Ok(())
    }

    async fn create_data_flow(&self, flow: DataFlowRelationship) -> Result<()> {
        let from_exists = self.get_element(&flow.from).await?.is_some();
        let to_exists = self.get_element(&flow.to).await?.is_some();
        if !from_exists || !to_exists {
            warn!("dropping data-flow edge {} -> {}: unresolved endpoint", flow.from, flow.to);
            return Ok(());
        }

        let id = flow.id.clone();
        let _: Option<DataFlowRelationship> = self
            .db
            .upsert(("data_flow", id.as_str()))
            .content(flow)
            .await
            .map_err(query_err)?;
        Ok(())
    }

    async fn create_batch(
        &self,
        elements: Vec<CodeElement>,
        relationships: Vec<StructuralRelationship>,
    ) -> Result<BatchCommitResult> {
        let mut result = BatchCommitResult::default();

        for element in elements {
            let label = element.element_name.clone();
            match self.create_element(element).await {
                Ok(id) => result.created_ids.push(id),
                Err(e) => result.errors.push(format!("{label}: {e}")),
            }
        }

        for relationship in relationships {
            let from_exists = self.get_element(&relationship.from).await?.is_some();
            let to_exists = self.get_element(&relationship.to).await?.is_some();
            if !from_exists || !to_exists {
                warn!(
                    "dropping relationship {} -> {}: unresolved endpoint",
                    relationship.from, relationship.to
                );
                result.dropped.push(format!(
                    "{} -> {} ({}): unresolved endpoint",
                    relationship.from, relationship.to, relationship.relationship_type
                ));
                continue;
            }
            if let Err(e) = self.create_relationship(relationship).await {
                result.errors.push(e.to_string());
            }
        }

        Ok(result)
    }

    async fn get_element(&self, id: &ElementId) -> Result<Option<CodeElement>> {
        self.db
            .select(("code_elements", id.as_str()))
            .await
            .map_err(query_err)
    }

    async fn find_by_name(&self, name: &str) -> Result<Vec<CodeElement>> {
        let mut response = self
            .db
            .query("SELECT * FROM code_elements WHERE element_name = $name")
            .bind(("name", name.to_string()))
            .await
            .map_err(query_err)?;
        response.take(0).map_err(query_err)
    }

    async fn search(&self, query_embedding: &[f32], options: SearchOptions) -> Result<Vec<SearchResult>> {
        run_search(&self.db, query_embedding, options).await
    }

    async fn traverse(&self, start: &ElementId, options: TraversalOptions) -> Result<TraversalResult> {
        run_traversal(&self.db, start, options).await
    }

    async fn delete_by_path(&self, path: &str) -> Result<usize> {
        let elements: Vec<CodeElement> = {
            let mut response = self
                .db
                .query("SELECT * FROM code_elements WHERE file_path = $path")
                .bind(("path", path.to_string()))
                .await
                .map_err(query_err)?;
            response.take(0).map_err(query_err)?
        };

        if elements.is_empty() {
            return Ok(0);
        }

        let ids: Vec<String> = elements.iter().map(|e| e.id.as_str().to_string()).collect();

        self.db
            .query("DELETE structural_relationship WHERE from IN $ids OR to IN $ids")
            .bind(("ids", ids.clone()))
            .await
            .map_err(query_err)?;
        self.db
            .query("DELETE data_flow WHERE from IN $ids OR to IN $ids")
            .bind(("ids", ids.clone()))
            .await
            .map_err(query_err)?;
        self.db
            .query("DELETE code_elements WHERE file_path = $path")
            .bind(("path", path.to_string()))
            .await
            .map_err(query_err)?;

        Ok(elements.len())
    }

    async fn upsert_file_metadata(&self, metadata: FileMetadata) -> Result<()> {
        let path = metadata.path.clone();
        let _: Option<FileMetadata> = self
            .db
            .upsert(("file_metadata", path.as_str()))
            .content(metadata)
            .await
            .map_err(query_err)?;
        Ok(())
    }

    async fn upsert_workspace_info(&self, info: WorkspaceInfo) -> Result<()> {
        let path = info.path.clone();
        let _: Option<WorkspaceInfo> = self
            .db
            .upsert(("workspace_info", path.as_str()))
            .content(info)
            .await
            .map_err(query_err)?;
        Ok(())
    }

    async fn get_workspace_info(&self, path: &str) -> Result<Option<WorkspaceInfo>> {
        self.db
            .select(("workspace_info", path))
            .await
            .map_err(query_err)
    }
}
