//! Evaluation CLI: accuracy of a results file against the QA ground truth,
//! by exact match or, with `--llm-judge`, graded by a chat model.

use anyhow::{Context, Result};
use clap::Parser;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tog::dataset::{read_jsonl, QaItem};
use tog::eval::{evaluate, LlmJudge};
use tog::oracle::ChatClient;
use tog::output::OutputRecord;
use tog::Config;

#[derive(Parser, Debug)]
#[command(name = "eval")]
#[command(about = "Score a results JSONL file by exact match or with an LLM judge")]
struct Args {
    /// Ground-truth QA dataset (JSON Lines)
    #[arg(long)]
    qa_file: PathBuf,

    /// Results file written by `tog`
    #[arg(long)]
    output_file: PathBuf,

    /// Dataset name used in the report
    #[arg(long, default_value = "grbench")]
    dataset: String,

    /// Method name used in the report
    #[arg(long, default_value = "ToG")]
    method: String,

    /// Grade answers with the configured [llm] model instead of exact match
    #[arg(long)]
    llm_judge: bool,

    /// Override llm.model for judging
    #[arg(long, requires = "llm_judge")]
    judge_model: Option<String>,

    /// Report path (default: <method>_<dataset>_results.json, or
    /// <method>_<dataset>_llm_judge.json with --llm-judge)
    #[arg(long)]
    report: Option<PathBuf>,
}

fn write_report<T: Serialize>(path: &Path, report: &T) -> Result<()> {
    std::fs::write(path, serde_json::to_string_pretty(report)?)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    println!("\nReport saved to {}", path.display());
    Ok(())
}

async fn run_llm_judge(args: &Args, records: &[OutputRecord], truth: &[QaItem]) -> Result<()> {
    let mut config = Config::load()?;
    if let Some(model) = &args.judge_model {
        config.llm.model = model.clone();
    }
    let chat = ChatClient::new(&config.llm, config.llm.api_key()?)?;
    log::info!("Judging {} records with {}", records.len(), chat.model());

    let judge = LlmJudge::new(Arc::new(chat), &config.llm).with_concurrency(config.search.concurrency);
    let report = judge.evaluate(records, truth, &args.method, &args.dataset).await;

    println!("=== LLM-as-Judge Results ===");
    println!("Total Judged: {} / {}", report.judged, records.len());
    println!("Correct: {}, Incorrect: {}", report.correct, report.incorrect);
    println!("Judge Errors: {}", report.judge_errors);
    if report.unmatched > 0 {
        println!("Without ground truth: {}", report.unmatched);
    }
    println!("Judge Accuracy: {:.4}", report.accuracy);

    let report_path = args.report.clone().unwrap_or_else(|| {
        PathBuf::from(format!("{}_{}_llm_judge.json", args.method, args.dataset))
    });
    write_report(&report_path, &report)
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().filter_or("RUST_LOG", "info")).init();

    let args = Args::parse();
    let truth: Vec<QaItem> = read_jsonl(&args.qa_file)
        .with_context(|| format!("Failed to read {}", args.qa_file.display()))?;
    let records: Vec<OutputRecord> = read_jsonl(&args.output_file)
        .with_context(|| format!("Failed to read {}", args.output_file.display()))?;

    if records.is_empty() {
        anyhow::bail!("No records in {}", args.output_file.display());
    }

    if args.llm_judge {
        return run_llm_judge(&args, &records, &truth).await;
    }

    let report = evaluate(&records, &truth, &args.method, &args.dataset);

    println!("=== Evaluation Results ===");
    println!("Total Processed: {}", report.total);
    println!("Right: {}, Error: {}", report.right, report.error);
    if report.unmatched > 0 {
        println!("Without ground truth: {}", report.unmatched);
    }
    println!("Exact Match: {:.4}", report.exact_match);

    let report_path = args
        .report
        .clone()
        .unwrap_or_else(|| PathBuf::from(format!("{}_{}_results.json", args.method, args.dataset)));
    write_report(&report_path, &report)
}
