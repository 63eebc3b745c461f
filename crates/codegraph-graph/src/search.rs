use codegraph_core::{CodeGraphError, ElementId, EmbeddingChannel, Result, SearchOptions, SearchResult};
use serde::Deserialize;
use surrealdb::engine::any::Any;
use surrealdb::Surreal;

#[derive(Debug, Deserialize)]
struct EmbeddingRow {
    id: surrealdb::RecordId,
    content_embedding: Option<Vec<f32>>,
    semantic_embedding: Option<Vec<f32>>,
}

/// `search` (§4.6): rank candidates by descending cosine similarity against the channel
/// named in `options.embedding_type`, drop anything below `threshold`, cap at `limit`.
///
/// Candidates are pulled with `path_filter`/`kind_filter` applied server-side and ranked in
/// process; an approximate-nearest-neighbor index is defined in the schema (see
/// `schema.rs`) for when the candidate set outgrows a linear scan, but this function always
/// computes an exact ranking over whatever SurrealQL returns.
pub async fn run_search(
    db: &Surreal<Any>,
    query_embedding: &[f32],
    options: SearchOptions,
) -> Result<Vec<SearchResult>> {
    let limit = options.limit.clamp(1, 100);

    let mut sql = "SELECT id, content_embedding, semantic_embedding \
                    FROM code_elements WHERE true"
        .to_string();
    if options.path_filter.is_some() {
        sql.push_str(" AND file_path = $path");
    }
    if options.kind_filter.is_some() {
        sql.push_str(" AND element_type = $kind");
    }

    let mut query = db.query(sql);
    if let Some(path) = &options.path_filter {
        query = query.bind(("path", path.clone()));
    }
    if let Some(kind) = &options.kind_filter {
        query = query.bind(("kind", kind.clone()));
    }

    let mut response = query
        .await
        .map_err(|e| CodeGraphError::StorageQuery(e.to_string()))?;
    let rows: Vec<EmbeddingRow> = response
        .take(0)
        .map_err(|e| CodeGraphError::StorageQuery(e.to_string()))?;

    let mut results: Vec<SearchResult> = rows
        .into_iter()
        .filter_map(|row| {
            let candidate = match options.embedding_type {
                EmbeddingChannel::Content => row.content_embedding,
                EmbeddingChannel::Semantic => row.semantic_embedding,
                // `structural_relationship`/`data_flow` embeddings are searched via their
                // own tables; not reachable through this code_elements-scoped query.
                EmbeddingChannel::Relationship | EmbeddingChannel::DataFlow => None,
            }?;
            let similarity = cosine_similarity(query_embedding, &candidate);
            if similarity < options.threshold {
                return None;
            }
            Some(SearchResult {
                element_id: ElementId::from_raw(row.id.key().to_string()),
                similarity,
            })
        })
        .collect();

    results.sort_by(|a, b| b.similarity.partial_cmp(&a.similarity).unwrap_or(std::cmp::Ordering::Equal));
    results.truncate(limit);
    Ok(results)
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_vectors_have_similarity_one() {
        let v = vec![1.0, 2.0, 3.0];
        assert!((cosine_similarity(&v, &v) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn orthogonal_vectors_have_similarity_zero() {
        assert!((cosine_similarity(&[1.0, 0.0], &[0.0, 1.0])).abs() < 1e-6);
    }

    #[test]
    fn mismatched_lengths_are_treated_as_dissimilar() {
        assert_eq!(cosine_similarity(&[1.0, 0.0], &[1.0, 0.0, 0.0]), 0.0);
    }
}
