//! Scripted oracle for engine tests.

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

use super::{PhaseContext, ReasoningChain};
use crate::config::SearchConfig;
use crate::graph::GraphAccessor;
use crate::oracle::{Oracle, OracleError, ParseError, RankedRelation};
use crate::scoring::RelationScoring;

/// Deterministic [`Oracle`] driven by canned answers.
///
/// Relation ranking returns every offered relation (scored from the
/// configured map, else 1.0) plus any configured extra names, optionally
/// after a per-entity delay. Judgements are popped in order and default to
/// "no" once exhausted.
#[derive(Default)]
pub struct ScriptedOracle {
    relation_scores: HashMap<String, f64>,
    extra_relations: Vec<String>,
    candidate_scores: Option<Vec<f64>>,
    judgements: Mutex<VecDeque<bool>>,
    fail_relations: bool,
    fail_judge: bool,
    judge_delay: Option<Duration>,
    rank_delays: HashMap<String, Duration>,
    /// Chain length seen by each `judge` call.
    pub judged_chain_lengths: Mutex<Vec<usize>>,
    pub answered_chains: Mutex<Vec<ReasoningChain>>,
}

impl ScriptedOracle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_relation_scores(mut self, scores: &[(&str, f64)]) -> Self {
        self.relation_scores = scores.iter().map(|(r, s)| (r.to_string(), *s)).collect();
        self
    }

    pub fn with_extra_relations(mut self, names: &[&str]) -> Self {
        self.extra_relations = names.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn with_candidate_scores(mut self, scores: Vec<f64>) -> Self {
        self.candidate_scores = Some(scores);
        self
    }

    pub fn with_judgements(self, verdicts: &[bool]) -> Self {
        *self.judgements.lock().unwrap() = verdicts.iter().copied().collect();
        self
    }

    pub fn failing_relations(mut self) -> Self {
        self.fail_relations = true;
        self
    }

    pub fn failing_judge(mut self) -> Self {
        self.fail_judge = true;
        self
    }

    pub fn with_judge_delay(mut self, delay: Duration) -> Self {
        self.judge_delay = Some(delay);
        self
    }

    /// Delay ranking for the named entities, in milliseconds.
    pub fn with_rank_delays(mut self, delays: &[(&str, u64)]) -> Self {
        self.rank_delays = delays
            .iter()
            .map(|(name, ms)| (name.to_string(), Duration::from_millis(*ms)))
            .collect();
        self
    }

    pub fn context<'a>(
        graph: &'a dyn GraphAccessor,
        oracle: &'a ScriptedOracle,
        scoring: &'a RelationScoring,
        settings: &'a SearchConfig,
        question: &'a str,
    ) -> PhaseContext<'a> {
        PhaseContext {
            graph,
            oracle,
            scoring,
            settings,
            question,
        }
    }
}

#[async_trait]
impl Oracle for ScriptedOracle {
    async fn rank_relations(
        &self,
        _question: &str,
        entity_name: &str,
        relations: &[String],
        _width: usize,
    ) -> Result<Vec<RankedRelation>, OracleError> {
        if let Some(delay) = self.rank_delays.get(entity_name) {
            tokio::time::sleep(*delay).await;
        }
        if self.fail_relations {
            return Err(OracleError::Parse(ParseError::NoRelations));
        }
        Ok(relations
            .iter()
            .chain(&self.extra_relations)
            .map(|r| RankedRelation {
                relation: r.clone(),
                score: self.relation_scores.get(r).copied().unwrap_or(1.0),
            })
            .collect())
    }

    async fn score_candidates(
        &self,
        _question: &str,
        _relation: &str,
        candidates: &[String],
    ) -> Result<Vec<f64>, OracleError> {
        Ok(self
            .candidate_scores
            .clone()
            .unwrap_or_else(|| vec![1.0 / candidates.len() as f64; candidates.len()]))
    }

    async fn judge(&self, _question: &str, chain: &ReasoningChain) -> Result<bool, OracleError> {
        if let Some(delay) = self.judge_delay {
            tokio::time::sleep(delay).await;
        }
        self.judged_chain_lengths.lock().unwrap().push(chain.len());
        if self.fail_judge {
            return Err(OracleError::Transport("scripted outage".to_string()));
        }
        Ok(self.judgements.lock().unwrap().pop_front().unwrap_or(false))
    }

    async fn answer(&self, _question: &str, chain: &ReasoningChain) -> Result<String, OracleError> {
        self.answered_chains.lock().unwrap().push(chain.clone());
        Ok(match chain.triples().last() {
            Some(triple) => format!("{{{}}}", triple.tail),
            None => "{unknown}".to_string(),
        })
    }

    async fn answer_without_graph(&self, _question: &str) -> Result<String, OracleError> {
        Ok("{guess}".to_string())
    }
}
