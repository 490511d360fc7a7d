//! LLM-as-judge scoring: a chat model grades each answer against the ground truth.

use chrono::{DateTime, Utc};
use futures_util::stream::{self, StreamExt};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;

use crate::config::LlmConfig;
use crate::dataset::QaItem;
use crate::oracle::parse::{parse_verdict, Verdict};
use crate::oracle::{prompts, ChatCompletion, ChatRequest};
use crate::output::OutputRecord;

/// Judge accuracy of one results file.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JudgeReport {
    pub method: String,
    pub dataset: String,
    pub judge_model: String,
    /// Records with a Correct or Incorrect grade.
    pub judged: usize,
    pub correct: usize,
    pub incorrect: usize,
    /// Records the judge failed to grade; excluded from accuracy.
    pub judge_errors: usize,
    /// Records whose question is missing from the ground truth.
    pub unmatched: usize,
    pub accuracy: f64,
    pub evaluated_at: DateTime<Utc>,
}

/// Grades answers with a chat model at temperature 0.
pub struct LlmJudge {
    chat: Arc<dyn ChatCompletion>,
    model: String,
    max_tokens: u32,
    concurrency: usize,
}

impl LlmJudge {
    pub fn new(chat: Arc<dyn ChatCompletion>, config: &LlmConfig) -> Self {
        Self {
            chat,
            model: config.model.clone(),
            max_tokens: config.max_length,
            concurrency: 1,
        }
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Grade one answer; `None` when the judge call or its reply is unusable.
    ///
    /// A missing answer is Incorrect without asking the model.
    pub async fn grade(
        &self,
        question: &str,
        ground_truth: &[String],
        answer: Option<&str>,
    ) -> Option<Verdict> {
        let answer = match answer.map(str::trim) {
            Some(answer) if !answer.is_empty() => answer,
            _ => return Some(Verdict::Incorrect),
        };
        let request = ChatRequest {
            prompt: prompts::judge_answer(question, ground_truth, answer),
            temperature: 0.0,
            max_tokens: self.max_tokens,
        };
        let reply = match self.chat.complete(&request).await {
            Ok(reply) => reply,
            Err(e) => {
                log::warn!("Judge call failed for {:?}: {}", question, e);
                return None;
            }
        };
        match parse_verdict(&reply) {
            Ok(verdict) => Some(verdict),
            Err(e) => {
                log::warn!("Unusable judge reply for {:?}: {}", question, e);
                None
            }
        }
    }

    /// Grade `records` against `ground_truth`, aligned by question text.
    pub async fn evaluate(
        &self,
        records: &[OutputRecord],
        ground_truth: &[QaItem],
        method: &str,
        dataset: &str,
    ) -> JudgeReport {
        let answers: HashMap<&str, Vec<String>> = ground_truth
            .iter()
            .map(|item| (item.question.as_str(), item.answers()))
            .filter(|(_, answers)| !answers.is_empty())
            .collect();

        let mut unmatched = 0;
        let mut matched = Vec::new();
        for record in records {
            match answers.get(record.question.as_str()) {
                Some(expected) => matched.push((record, expected)),
                None => {
                    log::warn!("No ground truth for question {:?}", record.question);
                    unmatched += 1;
                }
            }
        }

        let grades: Vec<Option<Verdict>> = stream::iter(matched)
            .map(|(record, expected)| {
                self.grade(&record.question, expected, record.answer.as_deref())
            })
            .buffered(self.concurrency)
            .collect()
            .await;

        let (mut correct, mut incorrect, mut judge_errors) = (0, 0, 0);
        for grade in grades {
            match grade {
                Some(Verdict::Correct) => correct += 1,
                Some(Verdict::Incorrect) => incorrect += 1,
                None => judge_errors += 1,
            }
        }

        let judged = correct + incorrect;
        JudgeReport {
            method: method.to_string(),
            dataset: dataset.to_string(),
            judge_model: self.model.clone(),
            judged,
            correct,
            incorrect,
            judge_errors,
            unmatched,
            accuracy: if judged == 0 {
                0.0
            } else {
                correct as f64 / judged as f64
            },
            evaluated_at: Utc::now(),
        }
    }
}
