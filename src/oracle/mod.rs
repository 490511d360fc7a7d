//! Oracle boundary: the natural-language decision service that ranks
//! relations, weights candidates, judges chain sufficiency and writes answers.
//!
//! The reasoning engine only sees the [`Oracle`] trait and its typed
//! responses. All prompt wording lives in [`prompts`] and all response
//! scraping in [`parse`].

pub mod client;
mod llm;
pub mod parse;
pub mod prompts;

pub use client::{ChatClient, ChatCompletion, ChatRequest};
pub use llm::LlmOracle;
pub use parse::ParseError;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::reasoning::ReasoningChain;

/// A relation name with the oracle's confidence that it helps answer the question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedRelation {
    pub relation: String,
    pub score: f64,
}

/// Why an oracle call produced no usable signal.
#[derive(Debug, Error)]
pub enum OracleError {
    /// Retries exhausted or a non-retryable transport failure.
    #[error("oracle unavailable: {0}")]
    Transport(String),

    /// The response did not match the expected structure.
    #[error("malformed oracle response: {0}")]
    Parse(#[from] ParseError),
}

/// Structured requests the reasoning engine makes of its oracle.
///
/// Every method shares one failure contract: transport problems are retried
/// by the implementation and surface as [`OracleError::Transport`] only once
/// retries are exhausted; callers treat any `Err` as "no signal" and degrade.
#[async_trait]
pub trait Oracle: Send + Sync {
    /// Rank `relations` of `entity_name` by usefulness for `question`, keeping about `width`.
    async fn rank_relations(
        &self,
        question: &str,
        entity_name: &str,
        relations: &[String],
        width: usize,
    ) -> Result<Vec<RankedRelation>, OracleError>;

    /// Relative weights of `candidates` reached over `relation`, positionally aligned.
    async fn score_candidates(
        &self,
        question: &str,
        relation: &str,
        candidates: &[String],
    ) -> Result<Vec<f64>, OracleError>;

    /// Whether `chain` is enough to answer `question`.
    async fn judge(&self, question: &str, chain: &ReasoningChain) -> Result<bool, OracleError>;

    /// Final answer grounded on `chain` (possibly empty).
    async fn answer(&self, question: &str, chain: &ReasoningChain) -> Result<String, OracleError>;

    /// Answer for questions with no linked topic entity.
    async fn answer_without_graph(&self, question: &str) -> Result<String, OracleError>;
}
