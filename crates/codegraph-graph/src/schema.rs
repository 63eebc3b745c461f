use codegraph_core::{CodeGraphError, Result};
use surrealdb::engine::any::Any;
use surrealdb::Surreal;
use tracing::info;

/// Table-per-entity schema (§4.6): `code_elements`, `structural_relationship`, `data_flow`,
/// `file_metadata`, `workspace_info`. Applied with `IF NOT EXISTS` so reconnecting to an
/// already-initialized database is a no-op.
const SCHEMA_DDL: &str = r#"
DEFINE TABLE IF NOT EXISTS code_elements SCHEMALESS;
DEFINE INDEX IF NOT EXISTS code_elements_file_path ON TABLE code_elements COLUMNS file_path;
DEFINE INDEX IF NOT EXISTS code_elements_element_name ON TABLE code_elements COLUMNS element_name;
DEFINE INDEX IF NOT EXISTS code_elements_content_embedding ON TABLE code_elements
    FIELDS content_embedding MTREE DIMENSION 1536 DIST COSINE;
DEFINE INDEX IF NOT EXISTS code_elements_semantic_embedding ON TABLE code_elements
    FIELDS semantic_embedding MTREE DIMENSION 1536 DIST COSINE;

DEFINE TABLE IF NOT EXISTS structural_relationship SCHEMALESS;
DEFINE INDEX IF NOT EXISTS structural_relationship_from ON TABLE structural_relationship COLUMNS from;
DEFINE INDEX IF NOT EXISTS structural_relationship_to ON TABLE structural_relationship COLUMNS to;
DEFINE INDEX IF NOT EXISTS structural_relationship_embedding ON TABLE structural_relationship
    FIELDS relationship_embedding MTREE DIMENSION 1536 DIST COSINE;

DEFINE TABLE IF NOT EXISTS data_flow SCHEMALESS;
DEFINE INDEX IF NOT EXISTS data_flow_from ON TABLE data_flow COLUMNS from;
DEFINE INDEX IF NOT EXISTS data_flow_to ON TABLE data_flow COLUMNS to;
DEFINE INDEX IF NOT EXISTS data_flow_embedding ON TABLE data_flow
    FIELDS data_flow_embedding MTREE DIMENSION 1536 DIST COSINE;

DEFINE TABLE IF NOT EXISTS file_metadata SCHEMALESS;
DEFINE INDEX IF NOT EXISTS file_metadata_path ON TABLE file_metadata COLUMNS path UNIQUE;

DEFINE TABLE IF NOT EXISTS workspace_info SCHEMALESS;
DEFINE INDEX IF NOT EXISTS workspace_info_path ON TABLE workspace_info COLUMNS path UNIQUE;
"#;

/// Runs the schema DDL against an already namespace/database-selected connection.
///
/// `MTREE` indexes on the two `code_elements` embedding vectors are defined eagerly even
/// though `search` (§4.6) falls back to a linear scan for now; once the embedding
/// dimensionality is configuration-driven rather than fixed, the index definition should
/// move to runtime based on `embedding.dimensions`.
pub async fn apply_schema(db: &Surreal<Any>) -> Result<()> {
    info!("applying code graph schema");
    db.query(SCHEMA_DDL)
        .await
        .map_err(|e| CodeGraphError::StorageConnection(format!("schema application failed: {e}")))?
        .check()
        .map_err(|e| CodeGraphError::StorageConnection(format!("schema application failed: {e}")))?;
    Ok(())
}
