//! SQLite-backed graph accessor over the `entities` / `relations` / `edges` tables.

use async_trait::async_trait;
use rusqlite::{Connection, OptionalExtension};
use std::collections::BTreeSet;
use std::path::Path;

use crate::db::{migrate, Db};
use crate::graph::{Direction, EntityId, GraphAccessor, RelationId, RelationSets};
use crate::Result;

/// Graph store persisted in a SQLite file produced by the `import` binary.
#[derive(Debug, Clone)]
pub struct SqliteGraph {
    db: Db,
}

fn entity_exists(conn: &Connection, entity: &str) -> Result<bool> {
    let found = conn
        .query_row(
            "SELECT 1 FROM entities WHERE entity_id = ?1",
            [entity],
            |_| Ok(()),
        )
        .optional()?;
    Ok(found.is_some())
}

fn relation_names(conn: &Connection, sql: &str, entity: &str) -> Result<BTreeSet<String>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt.query_map([entity], |row| row.get::<_, String>(0))?;
    let mut out = BTreeSet::new();
    for row in rows {
        out.insert(row?);
    }
    Ok(out)
}

impl SqliteGraph {
    /// Open the store and apply pending migrations.
    pub async fn open<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let db = Db::new(db_path);
        db.with_connection(migrate::run_migrations).await?;
        Ok(Self { db })
    }

    pub fn db(&self) -> &Db {
        &self.db
    }

    /// All resolved `(entity_id, name)` pairs, used to build the linking index.
    pub async fn named_entities(&self) -> Result<Vec<(EntityId, String)>> {
        self.db
            .with_connection(|conn| {
                let mut stmt = conn.prepare(
                    "SELECT entity_id, name FROM entities WHERE name IS NOT NULL ORDER BY entity_id",
                )?;
                let rows = stmt.query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?;
                let mut out = Vec::new();
                for row in rows {
                    out.push(row?);
                }
                Ok(out)
            })
            .await
    }

    /// Row counts of (entities, relations, edges).
    pub async fn counts(&self) -> Result<(usize, usize, usize)> {
        self.db
            .with_connection(|conn| {
                let count = |table: &str| -> Result<usize> {
                    let n: i64 =
                        conn.query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |row| row.get(0))?;
                    Ok(n as usize)
                };
                Ok((count("entities")?, count("relations")?, count("edges")?))
            })
            .await
    }
}

#[async_trait]
impl GraphAccessor for SqliteGraph {
    async fn relations(&self, entity: &str) -> Result<RelationSets> {
        let entity = entity.to_string();
        self.db
            .with_connection(move |conn| {
                if !entity_exists(conn, &entity)? {
                    log::warn!("Entity {} not found in graph store", entity);
                    return Ok(RelationSets::default());
                }
                let outgoing = relation_names(
                    conn,
                    "SELECT DISTINCT r.name FROM edges e \
                     JOIN relations r ON r.relation_id = e.relation_id \
                     WHERE e.source_id = ?1",
                    &entity,
                )?;
                let incoming = relation_names(
                    conn,
                    "SELECT DISTINCT r.name FROM edges e \
                     JOIN relations r ON r.relation_id = e.relation_id \
                     WHERE e.target_id = ?1",
                    &entity,
                )?;
                Ok(RelationSets { outgoing, incoming })
            })
            .await
    }

    async fn relation_id(&self, relation: &str) -> Result<Option<RelationId>> {
        let relation = relation.to_string();
        self.db
            .with_connection(move |conn| {
                let id = conn
                    .query_row(
                        "SELECT relation_id FROM relations WHERE name = ?1",
                        [&relation],
                        |row| row.get(0),
                    )
                    .optional()?;
                Ok(id)
            })
            .await
    }

    async fn neighbors(
        &self,
        entity: &str,
        relation: RelationId,
        direction: Direction,
    ) -> Result<Vec<EntityId>> {
        let entity = entity.to_string();
        self.db
            .with_connection(move |conn| {
                let sql = match direction {
                    Direction::Head => {
                        "SELECT target_id FROM edges WHERE source_id = ?1 AND relation_id = ?2 ORDER BY rowid"
                    }
                    Direction::Tail => {
                        "SELECT source_id FROM edges WHERE target_id = ?1 AND relation_id = ?2 ORDER BY rowid"
                    }
                };
                let mut stmt = conn.prepare(sql)?;
                let rows = stmt.query_map(rusqlite::params![entity, relation], |row| row.get(0))?;
                let mut out = Vec::new();
                for row in rows {
                    out.push(row?);
                }
                Ok(out)
            })
            .await
    }

    async fn entity_names(&self, entities: &[EntityId]) -> Result<Vec<Option<String>>> {
        let entities = entities.to_vec();
        self.db
            .with_connection(move |conn| {
                let mut stmt = conn.prepare("SELECT name FROM entities WHERE entity_id = ?1")?;
                let mut out = Vec::with_capacity(entities.len());
                for entity in &entities {
                    let name: Option<Option<String>> =
                        stmt.query_row([entity], |row| row.get(0)).optional()?;
                    out.push(name.flatten());
                }
                Ok(out)
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::import::{import_parsed_graph, parse_graph_json};
    use serde_json::json;
    use tempfile::TempDir;

    async fn setup_store() -> (SqliteGraph, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let graph = SqliteGraph::open(temp_dir.path().join("graph.db")).await.unwrap();
        let parsed = parse_graph_json(&json!({
            "item_nodes": {
                "i1": {"features": {"title": "Widget"}, "neighbors": {"brand": ["b1"], "also_bought": ["i2"]}},
                "i2": {"features": {"title": "Gadget"}, "neighbors": {"brand": ["b1"]}},
                "i3": {"features": {}, "neighbors": {"brand": ["b1"]}}
            },
            "brand_nodes": {
                "b1": {"features": {"name": "Acme"}}
            }
        }))
        .unwrap();
        import_parsed_graph(graph.db(), parsed).await.unwrap();
        (graph, temp_dir)
    }

    #[tokio::test]
    async fn test_relations_split_by_direction() {
        let (graph, _temp) = setup_store().await;
        let sets = graph.relations("i2").await.unwrap();
        assert_eq!(sets.outgoing.iter().cloned().collect::<Vec<_>>(), vec!["brand"]);
        assert_eq!(sets.incoming.iter().cloned().collect::<Vec<_>>(), vec!["also_bought"]);

        let brand = graph.relations("b1").await.unwrap();
        assert!(brand.outgoing.is_empty());
        assert!(brand.incoming.contains("brand"));
    }

    #[tokio::test]
    async fn test_unknown_entity_is_empty_not_error() {
        let (graph, _temp) = setup_store().await;
        let sets = graph.relations("nope").await.unwrap();
        assert!(sets.is_empty());
        let brand = graph.relation_id("brand").await.unwrap().unwrap();
        assert!(graph.neighbors("nope", brand, Direction::Head).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_neighbors_both_directions() {
        let (graph, _temp) = setup_store().await;
        let brand = graph.relation_id("brand").await.unwrap().unwrap();
        assert_eq!(graph.neighbors("i1", brand, Direction::Head).await.unwrap(), vec!["b1"]);
        let items = graph.neighbors("b1", brand, Direction::Tail).await.unwrap();
        assert_eq!(items, vec!["i1", "i2", "i3"]);
        assert!(graph.relation_id("category").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_entity_names_aligned_with_unresolved() {
        let (graph, _temp) = setup_store().await;
        let names = graph
            .entity_names(&["i1".to_string(), "i3".to_string(), "missing".to_string()])
            .await
            .unwrap();
        assert_eq!(names, vec![Some("Widget".to_string()), None, None]);
    }

    #[tokio::test]
    async fn test_named_entities_and_counts() {
        let (graph, _temp) = setup_store().await;
        let named = graph.named_entities().await.unwrap();
        assert_eq!(named.len(), 3);
        assert!(named.contains(&("b1".to_string(), "Acme".to_string())));
        assert_eq!(graph.counts().await.unwrap(), (4, 2, 4));
    }
}
