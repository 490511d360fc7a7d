//! GRBench graph JSON import.
//!
//! Input layout: `{"<type>_nodes": {"<id>": {"features": {..}, "neighbors": {"<relation>": [ids]}}}}`.
//! Display names come from a per-type feature; relation ids are assigned in first-seen order.

use std::collections::{HashMap, HashSet};

use serde_json::Value;

use crate::db::Db;
use crate::error::{Result, TogError};
use crate::graph::{EntityId, RelationId};

/// Counts reported after an import.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportStats {
    pub entities: usize,
    pub relations: usize,
    pub edges: usize,
    /// Edges whose target id is not a node of the graph.
    pub skipped_edges: usize,
}

/// A graph decoded from JSON, ready to be written to a store.
#[derive(Debug, Clone, Default)]
pub struct ParsedGraph {
    /// `(id, name, type)` in document order.
    pub entities: Vec<(EntityId, Option<String>, String)>,
    /// Relation names indexed by their id.
    pub relations: Vec<String>,
    pub edges: Vec<(EntityId, RelationId, EntityId)>,
    pub skipped_edges: usize,
}

impl ParsedGraph {
    pub fn stats(&self) -> ImportStats {
        ImportStats {
            entities: self.entities.len(),
            relations: self.relations.len(),
            edges: self.edges.len(),
            skipped_edges: self.skipped_edges,
        }
    }
}

/// Feature holding the display name for a node type.
fn name_feature(node_type: &str) -> &'static str {
    match node_type {
        "item" | "paper" => "title",
        _ => "name",
    }
}

fn id_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Decode a GRBench graph document.
pub fn parse_graph_json(doc: &Value) -> Result<ParsedGraph> {
    let node_types = doc
        .as_object()
        .ok_or_else(|| TogError::Graph("graph JSON must be an object of node types".to_string()))?;

    let mut parsed = ParsedGraph::default();
    let mut known: HashSet<String> = HashSet::new();

    // Pass 1: vertices
    for (type_key, nodes) in node_types {
        let node_type = type_key.split("_nodes").next().unwrap_or(type_key.as_str());
        let feature = name_feature(node_type);
        let nodes = nodes
            .as_object()
            .ok_or_else(|| TogError::Graph(format!("{} must map node ids to nodes", type_key)))?;
        for (node_id, node) in nodes {
            if !known.insert(node_id.clone()) {
                continue;
            }
            let name = node
                .get("features")
                .and_then(|f| f.get(feature))
                .and_then(Value::as_str)
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from);
            parsed.entities.push((node_id.clone(), name, node_type.to_string()));
        }
    }

    // Pass 2: edges
    let mut relation_ids: HashMap<String, RelationId> = HashMap::new();
    for nodes in node_types.values().filter_map(Value::as_object) {
        for (source_id, node) in nodes {
            let Some(neighbors) = node.get("neighbors").and_then(Value::as_object) else {
                continue;
            };
            for (relation, targets) in neighbors {
                let relation_id = *relation_ids.entry(relation.clone()).or_insert_with(|| {
                    parsed.relations.push(relation.clone());
                    (parsed.relations.len() - 1) as RelationId
                });
                for target in targets.as_array().into_iter().flatten() {
                    match id_string(target) {
                        Some(target_id) if known.contains(&target_id) => {
                            parsed.edges.push((source_id.clone(), relation_id, target_id));
                        }
                        _ => parsed.skipped_edges += 1,
                    }
                }
            }
        }
    }

    Ok(parsed)
}

/// Write a parsed graph into the store in a single transaction.
pub async fn import_parsed_graph(db: &Db, parsed: ParsedGraph) -> Result<ImportStats> {
    let stats = parsed.stats();
    db.with_connection(move |conn| {
        let tx = conn.transaction()?;
        {
            let mut insert_entity = tx.prepare(
                "INSERT OR REPLACE INTO entities (entity_id, name, entity_type) VALUES (?1, ?2, ?3)",
            )?;
            for (id, name, entity_type) in &parsed.entities {
                insert_entity.execute(rusqlite::params![id, name, entity_type])?;
            }

            let mut insert_relation =
                tx.prepare("INSERT OR REPLACE INTO relations (relation_id, name) VALUES (?1, ?2)")?;
            for (id, name) in parsed.relations.iter().enumerate() {
                insert_relation.execute(rusqlite::params![id as RelationId, name])?;
            }

            let mut insert_edge = tx
                .prepare("INSERT INTO edges (source_id, relation_id, target_id) VALUES (?1, ?2, ?3)")?;
            for (source, relation, target) in &parsed.edges {
                insert_edge.execute(rusqlite::params![source, relation, target])?;
            }
        }
        tx.commit()?;
        Ok(())
    })
    .await?;

    log::info!(
        "Imported {} entities, {} relations, {} edges ({} skipped)",
        stats.entities,
        stats.relations,
        stats.edges,
        stats.skipped_edges
    );
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_names_follow_node_type_feature() {
        let parsed = parse_graph_json(&json!({
            "paper_nodes": {"p1": {"features": {"title": "Graphs", "name": "ignored"}}},
            "author_nodes": {"a1": {"features": {"name": "Ada"}}},
            "venue_nodes": {"v1": {"features": {"title": "no name feature"}}}
        }))
        .unwrap();

        let lookup: HashMap<_, _> = parsed
            .entities
            .iter()
            .map(|(id, name, ty)| (id.as_str(), (name.clone(), ty.as_str())))
            .collect();
        assert_eq!(lookup["p1"], (Some("Graphs".to_string()), "paper"));
        assert_eq!(lookup["a1"], (Some("Ada".to_string()), "author"));
        assert_eq!(lookup["v1"], (None, "venue"));
    }

    #[test]
    fn test_relation_ids_first_seen_and_unknown_targets_skipped() {
        let parsed = parse_graph_json(&json!({
            "item_nodes": {
                "i1": {"features": {"title": "A"}, "neighbors": {"brand": ["b1", "ghost"]}},
                "i2": {"features": {"title": "B"}, "neighbors": {"also_bought": [1], "brand": ["b1"]}}
            },
            "brand_nodes": {"b1": {"features": {"name": "Acme"}}}
        }))
        .unwrap();

        assert_eq!(parsed.relations, vec!["brand", "also_bought"]);
        assert_eq!(parsed.skipped_edges, 2);
        assert_eq!(
            parsed.edges,
            vec![
                ("i1".to_string(), 0, "b1".to_string()),
                ("i2".to_string(), 0, "b1".to_string()),
            ]
        );
    }

    #[test]
    fn test_rejects_non_object_document() {
        assert!(parse_graph_json(&json!([1, 2, 3])).is_err());
        assert!(parse_graph_json(&json!({"item_nodes": []})).is_err());
    }
}
