//! In-memory Okapi BM25 over relation names.

use std::collections::{HashMap, HashSet};

use super::top_relations;
use crate::oracle::RankedRelation;

const K1: f64 = 1.5;
const B: f64 = 0.75;

const STOP_WORDS: &[&str] = &[
    "the", "a", "an", "and", "or", "in", "on", "at", "to", "for", "of", "with", "by", "from",
    "as", "is", "are", "was", "were", "be", "been", "has", "have", "had", "do", "does", "did",
    "what", "which", "who", "whom", "where", "when", "how", "this", "that", "these", "those",
];

/// Lowercase word tokens; relation names split on `_` and punctuation.
pub fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
        .collect()
}

/// Score each relation name as a document against the question.
pub fn scores(question: &str, relations: &[String]) -> Vec<f64> {
    let docs: Vec<Vec<String>> = relations.iter().map(|r| tokenize(r)).collect();
    if docs.is_empty() {
        return Vec::new();
    }
    let n = docs.len() as f64;
    let avg_len = docs.iter().map(Vec::len).sum::<usize>() as f64 / n;

    let mut doc_freq: HashMap<&str, usize> = HashMap::new();
    for doc in &docs {
        let unique: HashSet<&str> = doc.iter().map(String::as_str).collect();
        for term in unique {
            *doc_freq.entry(term).or_default() += 1;
        }
    }

    let query: Vec<String> = tokenize(question)
        .into_iter()
        .filter(|t| !STOP_WORDS.contains(&t.as_str()))
        .collect();

    docs.iter()
        .map(|doc| {
            let len = doc.len() as f64;
            query
                .iter()
                .map(|term| {
                    let tf = doc.iter().filter(|t| *t == term).count() as f64;
                    if tf == 0.0 {
                        return 0.0;
                    }
                    let df = doc_freq.get(term.as_str()).copied().unwrap_or(0) as f64;
                    let idf = (1.0 + (n - df + 0.5) / (df + 0.5)).ln();
                    let norm = if avg_len > 0.0 { len / avg_len } else { 0.0 };
                    idf * tf * (K1 + 1.0) / (tf + K1 * (1.0 - B + B * norm))
                })
                .sum()
        })
        .collect()
}

/// Top `width` relations by BM25 score against the question.
pub fn rank_relations(question: &str, relations: &[String], width: usize) -> Vec<RankedRelation> {
    let scored = relations.iter().cloned().zip(scores(question, relations)).collect();
    top_relations(scored, width)
}
