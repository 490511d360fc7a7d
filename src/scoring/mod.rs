//! Relation ranking strategies.
//!
//! The default strategy asks the oracle. The two static strategies rank a
//! frontier entity's relations against the question text without an oracle
//! call: BM25 over relation-name tokens, or embedding similarity.

pub mod bm25;
pub mod embedding;

pub use embedding::Embedder;

use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

use crate::config::PruneTool;
use crate::error::{Result, TogError};
use crate::oracle::RankedRelation;

/// How relations of a frontier entity are ranked; also decides whether
/// candidate entities are weighted by the oracle or uniformly.
#[derive(Clone)]
pub enum RelationScoring {
    Oracle,
    Bm25,
    Embedding(Arc<dyn Embedder>),
}

impl RelationScoring {
    /// Build the strategy named in configuration.
    pub fn from_tool(tool: PruneTool, embedder: Option<Arc<dyn Embedder>>) -> Result<Self> {
        match tool {
            PruneTool::Llm => Ok(Self::Oracle),
            PruneTool::Bm25 => Ok(Self::Bm25),
            PruneTool::Embedding => embedder.map(Self::Embedding).ok_or_else(|| {
                TogError::Config("embedding pruning requires an embedder".to_string())
            }),
        }
    }

    /// Oracle-driven modes also score candidates and down-sample large fan-outs.
    pub fn uses_oracle(&self) -> bool {
        matches!(self, Self::Oracle)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Oracle => "llm",
            Self::Bm25 => "bm25",
            Self::Embedding(_) => "embedding",
        }
    }
}

impl fmt::Debug for RelationScoring {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Keep the `width` best `(relation, score)` pairs, best first.
///
/// Ties keep input order. When every kept score is zero the kept relations
/// share the unit mass uniformly.
pub(crate) fn top_relations(scored: Vec<(String, f64)>, width: usize) -> Vec<RankedRelation> {
    let mut scored = scored;
    scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));
    scored.truncate(width);

    if !scored.is_empty() && scored.iter().all(|(_, s)| *s <= 0.0) {
        let share = 1.0 / scored.len() as f64;
        for entry in &mut scored {
            entry.1 = share;
        }
    }

    scored
        .into_iter()
        .map(|(relation, score)| RankedRelation {
            relation,
            score: score.max(0.0),
        })
        .collect()
}
