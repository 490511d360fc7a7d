use async_trait::async_trait;

use super::top_relations;
use crate::error::{Result, TogError};
use crate::oracle::RankedRelation;

/// Text embedding service used by the embedding ranking strategy.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// One vector per input text, in order.
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;
}

fn dot(a: &[f32], b: &[f32]) -> f64 {
    a.iter().zip(b).map(|(x, y)| f64::from(*x) * f64::from(*y)).sum()
}

/// Top `width` relations by dot-product similarity to the question.
///
/// Negative similarities count as zero.
pub async fn rank_relations(
    embedder: &dyn Embedder,
    question: &str,
    relations: &[String],
    width: usize,
) -> Result<Vec<RankedRelation>> {
    if relations.is_empty() {
        return Ok(Vec::new());
    }

    let mut texts = Vec::with_capacity(relations.len() + 1);
    texts.push(question.to_string());
    texts.extend(relations.iter().cloned());

    let vectors = embedder.embed(&texts).await?;
    if vectors.len() != texts.len() {
        return Err(TogError::Embedding(format!(
            "expected {} embeddings, got {}",
            texts.len(),
            vectors.len()
        )));
    }

    let (query, docs) = vectors.split_at(1);
    let scored = relations
        .iter()
        .cloned()
        .zip(docs.iter().map(|doc| dot(&query[0], doc).max(0.0)))
        .collect();
    Ok(top_relations(scored, width))
}
