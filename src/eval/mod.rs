//! Offline evaluation of a results file against the QA ground truth, by
//! exact match or by an LLM judge.

pub mod judge;
pub mod metrics;

pub use judge::{JudgeReport, LlmJudge};
pub use metrics::{evaluate, exact_match, response_answer, EvalReport};
