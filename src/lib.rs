pub mod cache;
pub mod config;
pub mod dataset;
pub mod db;
pub mod embeddings;
pub mod error;
pub mod eval;
pub mod graph;
pub mod link;
pub mod oracle;
pub mod output;
pub mod reasoning;
pub mod scoring;

pub use config::Config;
pub use error::{Result, TogError};
pub use reasoning::{Engine, QuestionInput, SearchOutcome, Termination};
