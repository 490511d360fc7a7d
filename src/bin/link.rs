use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use tog::dataset::{read_jsonl, write_jsonl, QaItem};
use tog::graph::SqliteGraph;
use tog::link::EntityLinker;
use tog::Config;

#[derive(Parser, Debug)]
#[command(name = "link")]
#[command(about = "Link QA questions to topic entities of the graph store")]
struct Args {
    /// QA dataset (JSON Lines)
    #[arg(long)]
    qa_file: PathBuf,

    /// Linked dataset to write
    #[arg(long)]
    output: PathBuf,

    /// Override linking.threshold (0-100)
    #[arg(long)]
    threshold: Option<u8>,

    /// Re-link items that already carry a topic entity
    #[arg(long)]
    relink: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = Config::load()?;

    env_logger::Builder::from_env(
        env_logger::Env::default().filter_or("RUST_LOG", config.tog.log_level.as_str()),
    )
    .init();

    let threshold = args.threshold.unwrap_or(config.linking.threshold).min(100);
    let graph = SqliteGraph::open(config.graph_db()).await?;
    let linker = EntityLinker::new(graph.named_entities().await?, threshold);
    if linker.is_empty() {
        anyhow::bail!("Graph store {} has no named entities; run import first", config.graph_db().display());
    }

    let mut items: Vec<QaItem> = read_jsonl(&args.qa_file)
        .with_context(|| format!("Failed to read {}", args.qa_file.display()))?;

    let mut linked = 0usize;
    for item in items.iter_mut() {
        if item.is_linked() && !args.relink {
            linked += 1;
            continue;
        }
        item.topic_entity_id = None;
        item.topic_entity_name = None;
        if let Some(entity) = linker.link_question(&item.question) {
            item.topic_entity_id = Some(entity.id);
            item.topic_entity_name = Some(entity.name);
            linked += 1;
        } else {
            log::debug!("No topic entity for {:?}", item.question);
        }
    }

    write_jsonl(&args.output, &items)?;
    println!("Linked {} of {} questions (threshold {})", linked, items.len(), threshold);
    println!("Written to {}", args.output.display());
    Ok(())
}
