//! Beam pruning: keep the best-scored candidates of one depth.

use std::cmp::Ordering;
use std::collections::BTreeSet;

use super::{ChainLayer, Frontier, FrontierEntry, ScoredCandidate};

/// Output of one pruning step.
#[derive(Debug, Clone, PartialEq)]
pub struct PrunedLayer {
    pub layer: ChainLayer,
    pub frontier: Frontier,
    pub pre_relations: BTreeSet<String>,
}

/// Keep the `width` best candidates with a positive score.
///
/// Sorting is stable, so equal scores keep collection order. Returns `None`
/// when nothing survives.
pub fn prune(candidates: &[ScoredCandidate], width: usize) -> Option<PrunedLayer> {
    let mut ranked: Vec<&ScoredCandidate> = candidates.iter().collect();
    ranked.sort_by(|a, b| b.score().partial_cmp(&a.score()).unwrap_or(Ordering::Equal));

    let survivors: Vec<&ScoredCandidate> = ranked
        .into_iter()
        .take(width)
        .filter(|c| c.score() > 0.0)
        .collect();
    if survivors.is_empty() {
        return None;
    }

    let layer = ChainLayer::from(survivors.iter().map(|c| c.triple()).collect::<Vec<_>>());

    let mut frontier = Frontier::default();
    for c in &survivors {
        frontier.push(FrontierEntry {
            id: c.candidate.clone(),
            name: c.candidate_name.clone(),
            reached_via: Some(c.direction),
        });
    }

    let pre_relations = survivors.iter().map(|c| c.relation.clone()).collect();

    Some(PrunedLayer {
        layer,
        frontier,
        pre_relations,
    })
}
