//! Think-on-Graph reasoning engine.
//!
//! One question runs a depth-bounded beam search over the graph:
//! explore relations of the frontier, expand them to candidate entities,
//! prune to the beam width, then ask the oracle whether the accumulated
//! chain suffices. See [`Engine`] for the driver.

mod engine;
mod expander;
mod explorer;
mod judge;
mod pruner;
#[cfg(test)]
pub(crate) mod testing;

pub use engine::{Engine, QuestionInput, SearchOutcome, StopCause, Termination};
pub use explorer::filter_relations;
pub use pruner::{prune, PrunedLayer};

use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};
use std::fmt;

use crate::config::SearchConfig;
use crate::graph::{Direction, EntityId, GraphAccessor, FINISH_ID, FINISH_NAME};
use crate::oracle::Oracle;
use crate::scoring::RelationScoring;

fn valid_score(score: f64) -> bool {
    score.is_finite() && score >= 0.0
}

/// A relation selected for one frontier entity, with its base score.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredRelation {
    pub entity: EntityId,
    pub entity_name: String,
    pub relation: String,
    /// Head when the relation was offered from the entity's outgoing set.
    pub direction: Direction,
    score: f64,
}

impl ScoredRelation {
    /// `None` for negative or non-finite scores.
    pub fn new(
        entity: EntityId,
        entity_name: String,
        relation: String,
        direction: Direction,
        score: f64,
    ) -> Option<Self> {
        valid_score(score).then_some(Self {
            entity,
            entity_name,
            relation,
            direction,
            score,
        })
    }

    pub fn score(&self) -> f64 {
        self.score
    }
}

/// A candidate entity reached over a [`ScoredRelation`], carrying its final score.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredCandidate {
    pub source: EntityId,
    pub source_name: String,
    pub relation: String,
    pub direction: Direction,
    pub candidate: EntityId,
    pub candidate_name: String,
    score: f64,
}

impl ScoredCandidate {
    /// `None` for negative or non-finite scores.
    pub fn new(
        via: &ScoredRelation,
        candidate: EntityId,
        candidate_name: String,
        score: f64,
    ) -> Option<Self> {
        valid_score(score).then(|| Self {
            source: via.entity.clone(),
            source_name: via.entity_name.clone(),
            relation: via.relation.clone(),
            direction: via.direction,
            candidate,
            candidate_name,
            score,
        })
    }

    /// Sentinel candidate for a relation that leads nowhere.
    pub fn finished(via: &ScoredRelation) -> Self {
        Self {
            source: via.entity.clone(),
            source_name: via.entity_name.clone(),
            relation: via.relation.clone(),
            direction: via.direction,
            candidate: FINISH_ID.to_string(),
            candidate_name: FINISH_NAME.to_string(),
            score: via.score,
        }
    }

    pub fn score(&self) -> f64 {
        self.score
    }

    /// The `(frontier entity, relation, candidate)` triple this candidate contributes.
    pub fn triple(&self) -> Triple {
        Triple::new(&self.source_name, &self.relation, &self.candidate_name)
    }
}

/// One piece of evidence, by display name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Triple {
    pub head: String,
    pub relation: String,
    pub tail: String,
}

impl Triple {
    pub fn new(head: &str, relation: &str, tail: &str) -> Self {
        Self {
            head: head.to_string(),
            relation: relation.to_string(),
            tail: tail.to_string(),
        }
    }
}

impl fmt::Display for Triple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}, {}, {}", self.head, self.relation, self.tail)
    }
}

/// Triples committed at one depth.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChainLayer(Vec<Triple>);

impl ChainLayer {
    pub fn triples(&self) -> &[Triple] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Vec<Triple>> for ChainLayer {
    fn from(triples: Vec<Triple>) -> Self {
        Self(triples)
    }
}

/// Append-only evidence accumulated across depths.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReasoningChain {
    layers: Vec<ChainLayer>,
}

impl ReasoningChain {
    pub fn push(&mut self, layer: ChainLayer) {
        self.layers.push(layer);
    }

    pub fn layers(&self) -> &[ChainLayer] {
        &self.layers
    }

    /// Number of committed layers.
    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    pub fn triples(&self) -> impl Iterator<Item = &Triple> {
        self.layers.iter().flat_map(|layer| layer.triples())
    }

    /// One `head, relation, tail` line per triple, in commit order.
    pub fn evidence_lines(&self) -> Vec<String> {
        self.triples().map(Triple::to_string).collect()
    }
}

/// An entity to be expanded at the next depth.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrontierEntry {
    pub id: EntityId,
    pub name: String,
    /// Direction of the relation that reached this entity; `None` for topic entities.
    pub reached_via: Option<Direction>,
}

impl FrontierEntry {
    pub fn topic(id: EntityId, name: String) -> Self {
        Self {
            id,
            name,
            reached_via: None,
        }
    }

    pub fn is_finished(&self) -> bool {
        self.id == FINISH_ID
    }
}

/// Entities to expand, unique by id, in first-occurrence order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Frontier {
    entries: Vec<FrontierEntry>,
    seen: HashSet<EntityId>,
}

impl Frontier {
    /// Starting frontier from linked topic entities, capped at `width`.
    pub fn from_topics<I>(topics: I, width: usize) -> Self
    where
        I: IntoIterator<Item = (EntityId, String)>,
    {
        let mut frontier = Frontier::default();
        for (id, name) in topics {
            if frontier.len() == width {
                log::warn!("More topic entities than beam width {}; ignoring {}", width, id);
                continue;
            }
            frontier.push(FrontierEntry::topic(id, name));
        }
        frontier
    }

    /// Append unless an entry with the same id is already present.
    pub fn push(&mut self, entry: FrontierEntry) -> bool {
        if !self.seen.insert(entry.id.clone()) {
            return false;
        }
        self.entries.push(entry);
        true
    }

    pub fn entries(&self) -> &[FrontierEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Arrival direction of each entry, parallel to [`Frontier::entries`].
    pub fn pre_heads(&self) -> Vec<Option<Direction>> {
        self.entries.iter().map(|e| e.reached_via).collect()
    }

    /// True when every remaining branch is the finish sentinel.
    pub fn is_all_finished(&self) -> bool {
        self.entries.iter().all(FrontierEntry::is_finished)
    }

    pub fn without_finished(self) -> Frontier {
        let mut out = Frontier::default();
        for entry in self.entries.into_iter().filter(|e| !e.is_finished()) {
            out.push(entry);
        }
        out
    }
}

/// Search progress for one question.
#[derive(Debug, Clone)]
pub struct SearchState {
    /// 1-based depth currently being explored.
    pub depth: usize,
    pub frontier: Frontier,
    /// Relations used by the last committed layer.
    pub pre_relations: BTreeSet<String>,
    pub chain: ReasoningChain,
}

impl SearchState {
    pub fn start(frontier: Frontier) -> Self {
        Self {
            depth: 1,
            frontier,
            pre_relations: BTreeSet::new(),
            chain: ReasoningChain::default(),
        }
    }

    /// Commit a pruned layer: the chain grows by exactly one layer.
    pub fn commit(mut self, pruned: PrunedLayer) -> Self {
        self.chain.push(pruned.layer);
        self.frontier = pruned.frontier;
        self.pre_relations = pruned.pre_relations;
        self
    }

    /// Move to the next depth with the given (sentinel-free) frontier.
    pub fn descend(mut self, frontier: Frontier) -> Self {
        self.depth += 1;
        self.frontier = frontier;
        self
    }
}

/// Shared read-only inputs of the per-depth phases.
pub(crate) struct PhaseContext<'a> {
    pub graph: &'a dyn GraphAccessor,
    pub oracle: &'a dyn Oracle,
    pub scoring: &'a RelationScoring,
    pub settings: &'a SearchConfig,
    pub question: &'a str,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn relation(score: f64) -> Option<ScoredRelation> {
        ScoredRelation::new(
            "i1".to_string(),
            "Widget".to_string(),
            "brand".to_string(),
            Direction::Head,
            score,
        )
    }

    #[test]
    fn test_scores_must_be_non_negative_and_finite() {
        assert!(relation(0.0).is_some());
        assert!(relation(-0.1).is_none());
        assert!(relation(f64::NAN).is_none());
        assert!(relation(f64::INFINITY).is_none());

        let via = relation(0.5).unwrap();
        assert!(ScoredCandidate::new(&via, "b1".to_string(), "Acme".to_string(), -1.0).is_none());
        assert_eq!(ScoredCandidate::finished(&via).score(), 0.5);
    }

    #[test]
    fn test_triple_starts_at_frontier_entity() {
        let head = relation(1.0).unwrap();
        let c = ScoredCandidate::new(&head, "b1".to_string(), "Acme".to_string(), 1.0).unwrap();
        assert_eq!(c.triple().to_string(), "Widget, brand, Acme");

        let tail = ScoredRelation::new(
            "b1".to_string(),
            "Acme".to_string(),
            "brand".to_string(),
            Direction::Tail,
            1.0,
        )
        .unwrap();
        let c = ScoredCandidate::new(&tail, "i1".to_string(), "Widget".to_string(), 1.0).unwrap();
        assert_eq!(c.triple().to_string(), "Acme, brand, Widget");
    }

    #[test]
    fn test_frontier_unique_first_occurrence() {
        let mut frontier = Frontier::default();
        assert!(frontier.push(FrontierEntry::topic("a".to_string(), "A".to_string())));
        assert!(!frontier.push(FrontierEntry {
            id: "a".to_string(),
            name: "other".to_string(),
            reached_via: Some(Direction::Tail),
        }));
        assert_eq!(frontier.len(), 1);
        assert_eq!(frontier.entries()[0].name, "A");
    }

    #[test]
    fn test_frontier_from_topics_capped_at_width() {
        let topics = (0..5).map(|i| (format!("e{}", i), format!("E{}", i)));
        let frontier = Frontier::from_topics(topics, 3);
        assert_eq!(frontier.len(), 3);
        assert!(frontier.entries().iter().all(|e| e.reached_via.is_none()));
    }

    #[test]
    fn test_finished_branches() {
        let mut frontier = Frontier::default();
        frontier.push(FrontierEntry::topic(FINISH_ID.to_string(), FINISH_NAME.to_string()));
        assert!(frontier.is_all_finished());
        frontier.push(FrontierEntry::topic("a".to_string(), "A".to_string()));
        assert!(!frontier.is_all_finished());
        let live = frontier.without_finished();
        assert_eq!(live.len(), 1);
        assert_eq!(live.entries()[0].id, "a");
    }

    #[test]
    fn test_chain_serializes_as_nested_lists() {
        let mut chain = ReasoningChain::default();
        chain.push(ChainLayer::from(vec![Triple::new("Widget", "brand", "Acme")]));
        let value = serde_json::to_value(&chain).unwrap();
        assert_eq!(
            value,
            serde_json::json!([[{"head": "Widget", "relation": "brand", "tail": "Acme"}]])
        );
        assert_eq!(chain.evidence_lines(), vec!["Widget, brand, Acme"]);
    }
}
