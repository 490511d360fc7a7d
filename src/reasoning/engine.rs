//! Per-question search driver and its termination reporting.

use futures_util::stream::{self, StreamExt};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::sync::{Arc, Mutex};
use std::time::Instant;

use super::{
    expander, explorer, judge, pruner, Frontier, PhaseContext, ReasoningChain, ScoredCandidate,
    ScoredRelation, SearchState,
};
use crate::config::SearchConfig;
use crate::error::Result;
use crate::graph::{EntityId, GraphAccessor};
use crate::oracle::Oracle;
use crate::output::{OutputRecord, OutputSink};
use crate::scoring::RelationScoring;

/// A question with its linked topic entities.
#[derive(Debug, Clone, PartialEq)]
pub struct QuestionInput {
    pub question: String,
    /// `(entity id, display name)`; empty when linking found nothing.
    pub topic_entities: Vec<(EntityId, String)>,
}

/// Why the chain stopped growing before a positive judgement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopCause {
    /// No frontier entity had a usable relation.
    NoRelations,
    /// Selected relations expanded to no scorable candidate.
    NoCandidates,
    /// Pruning left no candidate with a positive score.
    BeamEmpty,
    /// Every surviving branch was the finish sentinel.
    BranchesFinished,
}

/// How the search for one question ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    /// The oracle judged the chain sufficient at `depth`.
    Answered { depth: usize },
    /// The chain stopped growing at `depth`.
    NoEvidence { depth: usize, cause: StopCause },
    /// Maximum depth reached without a positive judgement.
    DepthLimit { depth: usize },
    /// No topic entity; answered without graph evidence.
    Unlinked,
}

/// Result of one question: the record written to the sink and how search ended.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchOutcome {
    pub record: OutputRecord,
    pub termination: Termination,
}

/// Next step of the per-question state machine.
enum Phase {
    Explore,
    Expand(Vec<ScoredRelation>),
    Prune(Vec<ScoredCandidate>),
    Judge,
}

/// Beam-search driver.
///
/// Phases of one depth run strictly in order. Within a phase, per-entity and
/// per-relation work runs concurrently up to `concurrency` in-flight calls,
/// with results gathered back in frontier order so runs are reproducible.
/// Dropping the future returned by [`Engine::run`] cancels the question
/// without writing a record.
pub struct Engine {
    graph: Arc<dyn GraphAccessor>,
    oracle: Arc<dyn Oracle>,
    sink: Arc<dyn OutputSink>,
    scoring: RelationScoring,
    settings: SearchConfig,
    rng: Mutex<StdRng>,
}

impl Engine {
    pub fn new(
        graph: Arc<dyn GraphAccessor>,
        oracle: Arc<dyn Oracle>,
        sink: Arc<dyn OutputSink>,
        scoring: RelationScoring,
        settings: SearchConfig,
    ) -> Self {
        let rng = match settings.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            graph,
            oracle,
            sink,
            scoring,
            settings,
            rng: Mutex::new(rng),
        }
    }

    /// Answer one question and append exactly one record to the sink.
    pub async fn run(&self, input: &QuestionInput) -> Result<SearchOutcome> {
        let started = Instant::now();
        let question = input.question.as_str();

        let (answer, reasoning_chain, termination) = if input.topic_entities.is_empty() {
            log::warn!("No topic entity for {:?}; answering without graph evidence", question);
            let answer = match self.oracle.answer_without_graph(question).await {
                Ok(answer) => Some(answer),
                Err(e) => {
                    log::warn!("Chain-free answer failed: {}", e);
                    None
                }
            };
            (answer, ReasoningChain::default(), Termination::Unlinked)
        } else {
            let frontier =
                Frontier::from_topics(input.topic_entities.iter().cloned(), self.settings.width);
            let (chain, termination) = self.search(question, frontier).await;
            let answer = match self.oracle.answer(question, &chain).await {
                Ok(answer) => Some(answer),
                Err(e) => {
                    log::warn!("Answer generation failed: {}", e);
                    None
                }
            };
            (answer, chain, termination)
        };

        let record = OutputRecord {
            question: input.question.clone(),
            answer,
            reasoning_chain,
        };
        self.sink.append(&record)?;

        log::info!(
            "Question done in {:?}: {:?}, {} layers",
            started.elapsed(),
            termination,
            record.reasoning_chain.len()
        );
        Ok(SearchOutcome {
            record,
            termination,
        })
    }

    async fn search(&self, question: &str, frontier: Frontier) -> (ReasoningChain, Termination) {
        let ctx = PhaseContext {
            graph: self.graph.as_ref(),
            oracle: self.oracle.as_ref(),
            scoring: &self.scoring,
            settings: &self.settings,
            question,
        };
        let mut state = SearchState::start(frontier);
        let mut phase = Phase::Explore;

        loop {
            phase = match phase {
                Phase::Explore => {
                    let relations = self.explore_frontier(&ctx, &state).await;
                    log::debug!("Depth {}: {} relations selected", state.depth, relations.len());
                    if relations.is_empty() {
                        return stop(state, StopCause::NoRelations);
                    }
                    Phase::Expand(relations)
                }
                Phase::Expand(relations) => {
                    let candidates = self.expand_relations(&ctx, &relations).await;
                    log::debug!("Depth {}: {} candidates scored", state.depth, candidates.len());
                    if candidates.is_empty() {
                        return stop(state, StopCause::NoCandidates);
                    }
                    Phase::Prune(candidates)
                }
                Phase::Prune(candidates) => match pruner::prune(&candidates, self.settings.width) {
                    Some(pruned) => {
                        state = state.commit(pruned);
                        Phase::Judge
                    }
                    None => return stop(state, StopCause::BeamEmpty),
                },
                Phase::Judge => {
                    match judge::evaluate(&ctx, &state.chain, &state.frontier).await {
                        judge::Judgement::Sufficient => {
                            let depth = state.depth;
                            return (state.chain, Termination::Answered { depth });
                        }
                        judge::Judgement::Exhausted => {
                            return stop(state, StopCause::BranchesFinished);
                        }
                        judge::Judgement::Continue(frontier) => {
                            if state.depth >= self.settings.depth {
                                let depth = state.depth;
                                return (state.chain, Termination::DepthLimit { depth });
                            }
                            state = state.descend(frontier);
                            Phase::Explore
                        }
                    }
                }
            };
        }
    }

    async fn explore_frontier(
        &self,
        ctx: &PhaseContext<'_>,
        state: &SearchState,
    ) -> Vec<ScoredRelation> {
        let pre_relations = &state.pre_relations;
        let per_entity: Vec<Vec<ScoredRelation>> = stream::iter(
            state
                .frontier
                .entries()
                .iter()
                .filter(|entry| !entry.is_finished()),
        )
        .map(|entry| explorer::explore(ctx, entry, pre_relations))
        .buffered(self.settings.concurrency)
        .collect()
        .await;
        per_entity.into_iter().flatten().collect()
    }

    async fn expand_relations(
        &self,
        ctx: &PhaseContext<'_>,
        relations: &[ScoredRelation],
    ) -> Vec<ScoredCandidate> {
        let looked_up: Vec<Vec<EntityId>> = stream::iter(relations)
            .map(|relation| expander::lookup(ctx, relation))
            .buffered(self.settings.concurrency)
            .collect()
            .await;

        // Sample sequentially, in relation order, so a seeded run is reproducible.
        let capped: Vec<Vec<EntityId>> = {
            let mut rng = self.rng.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            looked_up
                .into_iter()
                .map(|ids| {
                    expander::cap_fan_out(ids, &self.settings, self.scoring.uses_oracle(), &mut *rng)
                })
                .collect()
        };

        let per_relation: Vec<Vec<ScoredCandidate>> = stream::iter(relations.iter().zip(capped))
            .map(|(relation, ids)| expander::score(ctx, relation, ids))
            .buffered(self.settings.concurrency)
            .collect()
            .await;
        per_relation.into_iter().flatten().collect()
    }
}

fn stop(state: SearchState, cause: StopCause) -> (ReasoningChain, Termination) {
    log::info!("No further evidence at depth {} ({:?})", state.depth, cause);
    let depth = state.depth;
    (state.chain, Termination::NoEvidence { depth, cause })
}
