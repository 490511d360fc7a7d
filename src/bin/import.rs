use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::time::Instant;
use tog::graph::{import, SqliteGraph};
use tog::Config;

#[derive(Parser, Debug)]
#[command(name = "import")]
#[command(about = "Import a GRBench graph JSON into the SQLite graph store")]
struct Args {
    /// Graph JSON file (`{"<type>_nodes": {...}}`)
    #[arg(long)]
    graph: PathBuf,

    /// Target database (defaults to tog.graph_db)
    #[arg(long)]
    db: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = Config::load()?;

    env_logger::Builder::from_env(
        env_logger::Env::default().filter_or("RUST_LOG", config.tog.log_level.as_str()),
    )
    .init();

    let db_path = args.db.unwrap_or_else(|| config.graph_db().to_path_buf());
    let start = Instant::now();

    log::info!("Reading {}", args.graph.display());
    let text = std::fs::read_to_string(&args.graph)
        .with_context(|| format!("Failed to read {}", args.graph.display()))?;
    let doc: serde_json::Value = serde_json::from_str(&text)
        .with_context(|| format!("Invalid graph JSON in {}", args.graph.display()))?;
    let parsed = import::parse_graph_json(&doc)?;

    let graph = SqliteGraph::open(&db_path).await?;
    let stats = import::import_parsed_graph(graph.db(), parsed).await?;
    let (entities, relations, edges) = graph.counts().await?;

    println!("=== Import complete in {:?} ===", start.elapsed());
    println!("Database:  {}", db_path.display());
    println!("Imported:  {} entities, {} relations, {} edges", stats.entities, stats.relations, stats.edges);
    println!("Skipped:   {} edges to unknown nodes", stats.skipped_edges);
    println!("Store now: {} entities, {} relations, {} edges", entities, relations, edges);
    Ok(())
}
