//! Relation exploration for one frontier entity.

use std::collections::{BTreeSet, HashSet};

use super::{FrontierEntry, PhaseContext, ScoredRelation};
use crate::graph::{Direction, RelationSets};
use crate::oracle::RankedRelation;
use crate::scoring::{bm25, embedding, RelationScoring};

/// Remove the relations used to reach an entity from the side they were
/// traversed on, so the search does not walk straight back.
///
/// An entity reached as an edge target (via a head relation) loses those
/// relations from its incoming set; one reached as a source loses them from
/// its outgoing set. Topic entities are left untouched.
pub fn filter_relations(
    mut sets: RelationSets,
    pre_relations: &BTreeSet<String>,
    reached_via: Option<Direction>,
) -> RelationSets {
    match reached_via {
        Some(Direction::Head) => sets.incoming.retain(|r| !pre_relations.contains(r)),
        Some(Direction::Tail) => sets.outgoing.retain(|r| !pre_relations.contains(r)),
        None => {}
    }
    sets
}

async fn rank(
    ctx: &PhaseContext<'_>,
    entry: &FrontierEntry,
    offered: &[String],
) -> Option<Vec<RankedRelation>> {
    let width = ctx.settings.width;
    match ctx.scoring {
        RelationScoring::Oracle => match ctx
            .oracle
            .rank_relations(ctx.question, &entry.name, offered, width)
            .await
        {
            Ok(ranked) => Some(ranked),
            Err(e) => {
                log::warn!("Discarding relations of {}: {}", entry.id, e);
                None
            }
        },
        RelationScoring::Bm25 => Some(bm25::rank_relations(ctx.question, offered, width)),
        RelationScoring::Embedding(embedder) => {
            match embedding::rank_relations(embedder.as_ref(), ctx.question, offered, width).await {
                Ok(ranked) => Some(ranked),
                Err(e) => {
                    log::warn!("Discarding relations of {}: {}", entry.id, e);
                    None
                }
            }
        }
    }
}

/// Scored relations worth following from `entry`.
///
/// Graph faults, oracle failures and malformed rankings all yield an empty
/// list for this entity only.
pub(crate) async fn explore(
    ctx: &PhaseContext<'_>,
    entry: &FrontierEntry,
    pre_relations: &BTreeSet<String>,
) -> Vec<ScoredRelation> {
    let sets = match ctx.graph.relations(&entry.id).await {
        Ok(sets) => filter_relations(sets, pre_relations, entry.reached_via),
        Err(e) => {
            log::warn!("Relation lookup failed for {}: {}", entry.id, e);
            return Vec::new();
        }
    };

    let offered: Vec<String> = sets.outgoing.union(&sets.incoming).cloned().collect();
    if offered.is_empty() {
        log::debug!("No relations to explore from {}", entry.id);
        return Vec::new();
    }

    let Some(ranked) = rank(ctx, entry, &offered).await else {
        return Vec::new();
    };

    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for RankedRelation { relation, score } in ranked {
        if !ctx.settings.accepts_relation(&relation) {
            log::debug!("Skipping invalid relation name {:?}", relation);
            continue;
        }
        if !sets.outgoing.contains(&relation) && !sets.incoming.contains(&relation) {
            log::debug!("Skipping relation {:?} not offered for {}", relation, entry.id);
            continue;
        }
        if !seen.insert(relation.clone()) {
            continue;
        }
        let direction = if sets.outgoing.contains(&relation) {
            Direction::Head
        } else {
            Direction::Tail
        };
        if let Some(scored) =
            ScoredRelation::new(entry.id.clone(), entry.name.clone(), relation, direction, score)
        {
            out.push(scored);
        }
    }
    out
}
