//! Knowledge graph module: the read-only accessor consumed by the reasoning
//! engine, plus SQLite-backed and in-memory stores and GRBench JSON import.
//!
//! Lookups for identifiers that are not in the store return empty results
//! (and log a warning) instead of failing; `Err` is reserved for storage faults.

pub mod import;
mod memory;
mod sqlite;

pub use import::{parse_graph_json, ImportStats, ParsedGraph};
pub use memory::MemoryGraph;
pub use sqlite::SqliteGraph;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::Result;

/// Stable key of an entity in the graph store.
pub type EntityId = String;

/// Numeric identity of a relation name.
pub type RelationId = i64;

/// Frontier sentinel marking a branch that must not be expanded further.
pub const FINISH_ID: &str = "[FINISH_ID]";

/// Display name paired with [`FINISH_ID`] in chain layers.
pub const FINISH_NAME: &str = "[FINISH]";

/// Display name used for entities whose name could not be resolved.
pub const UNNAMED_ENTITY: &str = "Unknown_Entity";

/// Which side of an edge the frontier entity is on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Outgoing: the entity is the edge source.
    Head,
    /// Incoming: the entity is the edge target.
    Tail,
}

/// Relation names touching one entity, split by direction.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RelationSets {
    pub outgoing: BTreeSet<String>,
    pub incoming: BTreeSet<String>,
}

impl RelationSets {
    pub fn is_empty(&self) -> bool {
        self.outgoing.is_empty() && self.incoming.is_empty()
    }
}

/// Read-only neighbor/relation lookup by entity identity.
///
/// Implementations must be safe to call concurrently from many search branches.
#[async_trait]
pub trait GraphAccessor: Send + Sync {
    /// Outgoing and incoming relation names of `entity`.
    async fn relations(&self, entity: &str) -> Result<RelationSets>;

    /// Numeric identity of a relation name, if the store knows it.
    async fn relation_id(&self, relation: &str) -> Result<Option<RelationId>>;

    /// Entities reached from `entity` over `relation` in `direction`, in store order.
    async fn neighbors(
        &self,
        entity: &str,
        relation: RelationId,
        direction: Direction,
    ) -> Result<Vec<EntityId>>;

    /// Display names for `entities`, positionally aligned; `None` when unresolved.
    async fn entity_names(&self, entities: &[EntityId]) -> Result<Vec<Option<String>>>;
}
