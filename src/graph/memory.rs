//! In-memory graph accessor.

use async_trait::async_trait;
use std::collections::HashMap;

use crate::graph::{Direction, EntityId, GraphAccessor, RelationId, RelationSets};
use crate::Result;

/// Adjacency-list graph held in memory; useful for small graphs and tests.
#[derive(Debug, Clone, Default)]
pub struct MemoryGraph {
    names: HashMap<EntityId, Option<String>>,
    relation_names: Vec<String>,
    relation_ids: HashMap<String, RelationId>,
    outgoing: HashMap<EntityId, Vec<(RelationId, EntityId)>>,
    incoming: HashMap<EntityId, Vec<(RelationId, EntityId)>>,
}

impl MemoryGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add (or rename) an entity; `None` leaves it unresolved.
    pub fn add_entity(&mut self, id: &str, name: Option<&str>) -> &mut Self {
        self.names.insert(id.to_string(), name.map(String::from));
        self
    }

    /// Add a directed edge, registering unseen endpoints as unnamed entities.
    pub fn add_edge(&mut self, source: &str, relation: &str, target: &str) -> &mut Self {
        let relation_id = self.intern_relation(relation);
        for endpoint in [source, target] {
            self.names.entry(endpoint.to_string()).or_insert(None);
        }
        self.outgoing
            .entry(source.to_string())
            .or_default()
            .push((relation_id, target.to_string()));
        self.incoming
            .entry(target.to_string())
            .or_default()
            .push((relation_id, source.to_string()));
        self
    }

    fn intern_relation(&mut self, relation: &str) -> RelationId {
        if let Some(id) = self.relation_ids.get(relation) {
            return *id;
        }
        let id = self.relation_names.len() as RelationId;
        self.relation_names.push(relation.to_string());
        self.relation_ids.insert(relation.to_string(), id);
        id
    }

    fn names_of<'a>(
        &'a self,
        adjacency: &'a [(RelationId, EntityId)],
    ) -> impl Iterator<Item = String> + 'a {
        let names = &self.relation_names;
        adjacency
            .iter()
            .filter_map(move |(id, _)| names.get(*id as usize).cloned())
    }
}

#[async_trait]
impl GraphAccessor for MemoryGraph {
    async fn relations(&self, entity: &str) -> Result<RelationSets> {
        if !self.names.contains_key(entity) {
            log::warn!("Entity {} not found in graph store", entity);
            return Ok(RelationSets::default());
        }
        let outgoing = self
            .outgoing
            .get(entity)
            .map(|adj| self.names_of(adj).collect())
            .unwrap_or_default();
        let incoming = self
            .incoming
            .get(entity)
            .map(|adj| self.names_of(adj).collect())
            .unwrap_or_default();
        Ok(RelationSets { outgoing, incoming })
    }

    async fn relation_id(&self, relation: &str) -> Result<Option<RelationId>> {
        Ok(self.relation_ids.get(relation).copied())
    }

    async fn neighbors(
        &self,
        entity: &str,
        relation: RelationId,
        direction: Direction,
    ) -> Result<Vec<EntityId>> {
        let adjacency = match direction {
            Direction::Head => self.outgoing.get(entity),
            Direction::Tail => self.incoming.get(entity),
        };
        Ok(adjacency
            .into_iter()
            .flatten()
            .filter(|(id, _)| *id == relation)
            .map(|(_, other)| other.clone())
            .collect())
    }

    async fn entity_names(&self, entities: &[EntityId]) -> Result<Vec<Option<String>>> {
        Ok(entities
            .iter()
            .map(|id| self.names.get(id).cloned().flatten())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> MemoryGraph {
        let mut graph = MemoryGraph::new();
        graph
            .add_entity("i1", Some("Widget"))
            .add_entity("b1", Some("Acme"))
            .add_edge("i1", "brand", "b1")
            .add_edge("i1", "also_bought", "i2")
            .add_edge("i3", "also_bought", "i1");
        graph
    }

    #[tokio::test]
    async fn test_relations_by_direction() {
        let graph = sample();
        let sets = graph.relations("i1").await.unwrap();
        assert!(sets.outgoing.contains("brand"));
        assert!(sets.outgoing.contains("also_bought"));
        assert_eq!(sets.incoming.len(), 1);
        assert!(sets.incoming.contains("also_bought"));
    }

    #[tokio::test]
    async fn test_unknown_entity_empty() {
        let graph = sample();
        assert!(graph.relations("zzz").await.unwrap().is_empty());
        assert!(graph.neighbors("zzz", 0, Direction::Head).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_neighbors_and_names() {
        let graph = sample();
        let also = graph.relation_id("also_bought").await.unwrap().unwrap();
        assert_eq!(graph.neighbors("i1", also, Direction::Head).await.unwrap(), vec!["i2"]);
        assert_eq!(graph.neighbors("i1", also, Direction::Tail).await.unwrap(), vec!["i3"]);
        let names = graph
            .entity_names(&["b1".to_string(), "i2".to_string()])
            .await
            .unwrap();
        assert_eq!(names, vec![Some("Acme".to_string()), None]);
    }
}
