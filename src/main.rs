//! Think-on-Graph runner: answer every question of a QA dataset and append
//! one result record per question to the output JSONL file.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tog::config::PruneTool;
use tog::dataset::{read_jsonl, QaItem};
use tog::embeddings::OpenAIEmbedder;
use tog::graph::SqliteGraph;
use tog::link::EntityLinker;
use tog::oracle::{ChatClient, LlmOracle};
use tog::output::JsonlSink;
use tog::scoring::{Embedder, RelationScoring};
use tog::{Config, Engine, Termination};

#[derive(Parser, Debug)]
#[command(name = "tog")]
#[command(about = "Answer QA questions by beam search over the knowledge graph")]
struct Args {
    /// QA dataset (JSON Lines, one question per line)
    #[arg(long)]
    dataset: PathBuf,

    /// Results file (defaults to tog.output_path)
    #[arg(long)]
    output: Option<PathBuf>,

    /// Stop after this many questions
    #[arg(long)]
    limit: Option<usize>,

    /// Override search.width
    #[arg(long)]
    width: Option<usize>,

    /// Override search.depth
    #[arg(long)]
    depth: Option<usize>,
}

fn build_embedder(config: &Config) -> Result<Option<Arc<dyn Embedder>>> {
    if config.search.prune_tools != PruneTool::Embedding {
        return Ok(None);
    }
    let embeddings = config
        .embeddings
        .as_ref()
        .context("search.prune_tools = \"embedding\" requires an [embeddings] section")?;
    let api_key = std::env::var(&embeddings.api_key_env).with_context(|| {
        format!(
            "Environment variable {} not set. Set it in your .env file or as an environment variable.",
            embeddings.api_key_env
        )
    })?;
    let embedder = OpenAIEmbedder::from_config(embeddings, api_key)?;
    Ok(Some(Arc::new(embedder)))
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let mut config = Config::load()?;

    env_logger::Builder::from_env(
        env_logger::Env::default().filter_or("RUST_LOG", config.tog.log_level.as_str()),
    )
    .init();

    if let Some(width) = args.width.filter(|w| *w > 0) {
        config.search.width = width;
    }
    if let Some(depth) = args.depth.filter(|d| *d > 0) {
        config.search.depth = depth;
    }
    log::info!(
        "Search: width={}, depth={}, pruning={:?}, model={}",
        config.search.width,
        config.search.depth,
        config.search.prune_tools,
        config.llm.model
    );

    let graph = SqliteGraph::open(config.graph_db()).await?;
    let (entities, relations, edges) = graph.counts().await?;
    log::info!(
        "Graph {}: {} entities, {} relations, {} edges",
        config.graph_db().display(),
        entities,
        relations,
        edges
    );

    let chat = ChatClient::new(&config.llm, config.llm.api_key()?)?;
    let oracle = LlmOracle::new(Arc::new(chat), &config.llm);
    let scoring = RelationScoring::from_tool(config.search.prune_tools, build_embedder(&config)?)?;

    let items: Vec<QaItem> = read_jsonl(&args.dataset)
        .with_context(|| format!("Failed to read dataset {}", args.dataset.display()))?;
    let limit = args.limit.unwrap_or(items.len());
    log::info!("Loaded {} questions from {}", items.len(), args.dataset.display());

    let linker = if items.iter().take(limit).any(|item| !item.is_linked()) {
        let named = graph.named_entities().await?;
        Some(EntityLinker::new(named, config.linking.threshold))
    } else {
        None
    };

    let output = args.output.unwrap_or_else(|| config.output_path().to_path_buf());
    let sink = JsonlSink::open(&output)?;
    log::info!("Appending results to {}", sink.path().display());

    let engine = Engine::new(
        Arc::new(graph),
        Arc::new(oracle),
        Arc::new(sink),
        scoring,
        config.search.clone(),
    );

    let started = Instant::now();
    let (mut done, mut answered, mut unlinked) = (0usize, 0usize, 0usize);

    for (index, item) in items.iter().take(limit).enumerate() {
        if item.question.trim().is_empty() {
            log::warn!("Skipping item {} without a question", index + 1);
            continue;
        }

        let mut input = item.to_input();
        if input.topic_entities.is_empty() {
            if let Some(linked) = linker.as_ref().and_then(|l| l.link_question(&item.question)) {
                log::debug!("Linked {:?} to {} ({})", linked.name, linked.id, linked.score);
                input.topic_entities.push((linked.id, linked.name));
            }
        }

        log::info!("[{}/{}] {}", index + 1, limit, item.question);
        tokio::select! {
            outcome = engine.run(&input) => {
                let outcome = outcome?;
                done += 1;
                match outcome.termination {
                    Termination::Answered { .. } => answered += 1,
                    Termination::Unlinked => unlinked += 1,
                    _ => {}
                }
            }
            _ = tokio::signal::ctrl_c() => {
                log::warn!("Interrupted; current question discarded");
                break;
            }
        }
    }

    log::info!(
        "Finished {} questions in {:?} ({} judged sufficient, {} unlinked)",
        done,
        started.elapsed(),
        answered,
        unlinked
    );
    println!("Results written to {}", output.display());
    Ok(())
}
