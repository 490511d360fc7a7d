//! Exact-match scoring of generated answers.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;

use crate::dataset::QaItem;
use crate::oracle::parse::extract_braced;
use crate::output::OutputRecord;

/// Answer text of a model response: the first `{...}` span, else the whole response.
pub fn response_answer(response: &str) -> &str {
    extract_braced(response).unwrap_or(response)
}

fn normalize(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// True when any ground-truth answer and the response contain one another,
/// after lowercasing and collapsing whitespace. Empty strings never match.
pub fn exact_match(response: &str, answers: &[String]) -> bool {
    let response = normalize(response);
    if response.is_empty() {
        return false;
    }
    answers.iter().map(|a| normalize(a)).any(|answer| {
        !answer.is_empty() && (response.contains(&answer) || answer.contains(&response))
    })
}

/// Accuracy summary of one results file.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EvalReport {
    pub method: String,
    pub dataset: String,
    pub total: usize,
    pub right: usize,
    pub error: usize,
    /// Records whose question is missing from the ground truth.
    pub unmatched: usize,
    pub exact_match: f64,
    pub evaluated_at: DateTime<Utc>,
}

/// Score `records` against `ground_truth`, aligned by question text.
pub fn evaluate(
    records: &[OutputRecord],
    ground_truth: &[QaItem],
    method: &str,
    dataset: &str,
) -> EvalReport {
    let answers: HashMap<&str, Vec<String>> = ground_truth
        .iter()
        .map(|item| (item.question.as_str(), item.answers()))
        .collect();

    let (mut right, mut error, mut unmatched) = (0, 0, 0);
    for record in records {
        let Some(expected) = answers.get(record.question.as_str()) else {
            log::warn!("No ground truth for question {:?}", record.question);
            unmatched += 1;
            continue;
        };
        let response = record.answer.as_deref().unwrap_or("");
        if exact_match(response_answer(response), expected) {
            right += 1;
        } else {
            error += 1;
        }
    }

    let total = right + error;
    EvalReport {
        method: method.to_string(),
        dataset: dataset.to_string(),
        total,
        right,
        error,
        unmatched,
        exact_match: if total == 0 {
            0.0
        } else {
            right as f64 / total as f64
        },
        evaluated_at: Utc::now(),
    }
}
