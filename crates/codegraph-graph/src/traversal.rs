use codegraph_core::{
    CodeGraphError, ElementId, Result, TraversalDirection, TraversalOptions, TraversalResult,
};
use serde::Deserialize;
use std::collections::{HashSet, VecDeque};
use surrealdb::engine::any::Any;
use surrealdb::Surreal;

#[derive(Debug, Deserialize)]
struct EdgeRow {
    from: String,
    to: String,
    relationship_type: String,
}

/// `traverse` (§4.6): breadth-first over `structural_relationship`, visiting each node at
/// most once. `direction` selects which edge endpoint is treated as "outgoing" from the
/// current frontier node; `relationship_types` (empty = no filter) restricts which edges are
/// followed.
pub async fn run_traversal(
    db: &Surreal<Any>,
    start: &ElementId,
    options: TraversalOptions,
) -> Result<TraversalResult> {
    let mut result = TraversalResult::default();
    let mut visited: HashSet<String> = HashSet::new();
    let mut queue: VecDeque<(String, usize)> = VecDeque::new();

    visited.insert(start.as_str().to_string());
    queue.push_back((start.as_str().to_string(), 0));
    result.nodes.push(start.clone());
    result.path.push(start.clone());

    while let Some((current, depth)) = queue.pop_front() {
        if depth >= options.max_depth {
            continue;
        }

        let edges = fetch_edges(db, &current, options.direction).await?;
        for edge in edges {
            if !options.relationship_types.is_empty()
                && !options
                    .relationship_types
                    .iter()
                    .any(|t| t.to_string() == edge.relationship_type)
            {
                continue;
            }

            let neighbor = if edge.from == current { edge.to.clone() } else { edge.from.clone() };
            result
                .edges
                .push((ElementId::from_raw(edge.from.clone()), ElementId::from_raw(edge.to.clone())));

            if visited.insert(neighbor.clone()) {
                let neighbor_id = ElementId::from_raw(neighbor.clone());
                result.nodes.push(neighbor_id.clone());
                result.path.push(neighbor_id);
                result.depth = result.depth.max(depth + 1);
                queue.push_back((neighbor, depth + 1));
            }
        }
    }

    Ok(result)
}

async fn fetch_edges(db: &Surreal<Any>, node: &str, direction: TraversalDirection) -> Result<Vec<EdgeRow>> {
    let sql = match direction {
        TraversalDirection::Outgoing => "SELECT from, to, relationship_type FROM structural_relationship WHERE from = $node",
        TraversalDirection::Incoming => "SELECT from, to, relationship_type FROM structural_relationship WHERE to = $node",
        TraversalDirection::Both => {
            "SELECT from, to, relationship_type FROM structural_relationship WHERE from = $node OR to = $node"
        }
    };

    let mut response = db
        .query(sql)
        .bind(("node", node.to_string()))
        .await
        .map_err(|e| CodeGraphError::StorageQuery(e.to_string()))?;
    response.take(0).map_err(|e| CodeGraphError::StorageQuery(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn neighbor_selection_follows_the_non_current_endpoint() {
        let edge = EdgeRow {
            from: "a".to_string(),
            to: "b".to_string(),
            relationship_type: "calls".to_string(),
        };
        let current = "a".to_string();
        let neighbor = if edge.from == current { edge.to.clone() } else { edge.from.clone() };
        assert_eq!(neighbor, "b");
    }
}
