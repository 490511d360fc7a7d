//! Entity expansion: relations to scored candidate entities.

use rand::seq::SliceRandom;
use rand::Rng;

use super::{PhaseContext, ScoredCandidate, ScoredRelation};
use crate::config::SearchConfig;
use crate::graph::{EntityId, UNNAMED_ENTITY};

/// Entities reached over `relation` from its frontier entity, in store order.
pub(crate) async fn lookup(ctx: &PhaseContext<'_>, relation: &ScoredRelation) -> Vec<EntityId> {
    let relation_id = match ctx.graph.relation_id(&relation.relation).await {
        Ok(Some(id)) => id,
        Ok(None) => {
            log::debug!("Relation {:?} unknown to graph store", relation.relation);
            return Vec::new();
        }
        Err(e) => {
            log::warn!("Relation lookup failed for {:?}: {}", relation.relation, e);
            return Vec::new();
        }
    };

    match ctx
        .graph
        .neighbors(&relation.entity, relation_id, relation.direction)
        .await
    {
        Ok(ids) => ids,
        Err(e) => {
            log::warn!(
                "Neighbor lookup failed for {} over {:?}: {}",
                relation.entity,
                relation.relation,
                e
            );
            Vec::new()
        }
    }
}

/// Down-sample a large fan-out to `num_retain_entity` candidates.
///
/// Only oracle-scored searches sample; the static modes keep every candidate.
pub fn cap_fan_out<R: Rng + ?Sized>(
    candidates: Vec<EntityId>,
    settings: &SearchConfig,
    oracle_scoring: bool,
    rng: &mut R,
) -> Vec<EntityId> {
    if !oracle_scoring || candidates.len() <= settings.fan_out_ceiling {
        return candidates;
    }
    log::debug!(
        "Sampling {} of {} candidates",
        settings.num_retain_entity,
        candidates.len()
    );
    candidates
        .choose_multiple(rng, settings.num_retain_entity)
        .cloned()
        .collect()
}

fn uniform(n: usize) -> Vec<f64> {
    vec![1.0 / n as f64; n]
}

async fn candidate_weights(
    ctx: &PhaseContext<'_>,
    relation: &ScoredRelation,
    names: &[String],
) -> Vec<f64> {
    if !ctx.scoring.uses_oracle() {
        return uniform(names.len());
    }
    match ctx
        .oracle
        .score_candidates(ctx.question, &relation.relation, names)
        .await
    {
        Ok(scores) if scores.len() == names.len() => scores,
        Ok(scores) => {
            log::warn!(
                "Oracle returned {} scores for {} candidates of {:?}; weighting uniformly",
                scores.len(),
                names.len(),
                relation.relation
            );
            uniform(names.len())
        }
        Err(e) => {
            log::warn!(
                "Candidate scoring failed for {:?}: {}; weighting uniformly",
                relation.relation,
                e
            );
            uniform(names.len())
        }
    }
}

/// Score `candidates` reached over `relation`.
///
/// Final scores are the candidate weight times the relation's base score.
/// Unresolvable candidates are dropped unless none resolve, in which case
/// they all share the base score under the placeholder name.
pub(crate) async fn score(
    ctx: &PhaseContext<'_>,
    relation: &ScoredRelation,
    candidates: Vec<EntityId>,
) -> Vec<ScoredCandidate> {
    if candidates.is_empty() {
        if ctx.settings.finish_exhausted_relations {
            return vec![ScoredCandidate::finished(relation)];
        }
        return Vec::new();
    }

    let names = match ctx.graph.entity_names(&candidates).await {
        Ok(names) if names.len() == candidates.len() => names,
        Ok(_) | Err(_) => {
            log::warn!("Name lookup failed for candidates of {:?}", relation.relation);
            vec![None; candidates.len()]
        }
    };

    let base = relation.score();
    if names.iter().all(Option::is_none) {
        let share = base / candidates.len() as f64;
        return candidates
            .into_iter()
            .filter_map(|id| ScoredCandidate::new(relation, id, UNNAMED_ENTITY.to_string(), share))
            .collect();
    }

    let mut resolved: Vec<(String, EntityId)> = candidates
        .into_iter()
        .zip(names)
        .filter_map(|(id, name)| name.map(|name| (name, id)))
        .collect();

    if resolved.len() == 1 {
        let (name, id) = resolved.remove(0);
        return ScoredCandidate::new(relation, id, name, base).into_iter().collect();
    }

    resolved.sort();
    let display: Vec<String> = resolved.iter().map(|(name, _)| name.clone()).collect();
    let weights = candidate_weights(ctx, relation, &display).await;

    resolved
        .into_iter()
        .zip(weights)
        .filter_map(|((name, id), weight)| ScoredCandidate::new(relation, id, name, weight * base))
        .collect()
}
