use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use robonews::config::Config;
use robonews::enrich::{Enricher, OllamaClient, PromptTemplate};
use robonews::feed::build_client;
use robonews::pipeline::Pipeline;
use robonews::registry::Registry;
use robonews::storage::{ArchiveStore, Category};
use robonews::util::write_atomic;

#[derive(Parser, Debug)]
#[command(
    name = "robonews",
    about = "Fetch robotics news feeds, translate and classify them, and keep a bounded archive"
)]
struct Args {
    /// Path to the TOML config file
    #[arg(long, value_name = "FILE", default_value = "robonews.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Fetch, enrich and archive new items (default)
    Run,
    /// Re-apply the keyword classifier to every archived item
    Reclassify,
    /// Drop archived items with empty, garbled or markdown-wrapped titles
    Repair,
    /// Report which configured model answers first
    Probe,
    /// Print the newest archived items of a category as JSON
    Latest {
        #[arg(long, default_value = "robotics")]
        category: String,
        #[arg(long, default_value_t = 10)]
        limit: usize,
    },
}

fn build_enricher(config: &Config) -> Result<Enricher<OllamaClient>> {
    let client = OllamaClient::from_config(&config.llm).context("Failed to build model client")?;
    let prompt = PromptTemplate::load_or_default(&config.prompt_file);
    Ok(Enricher::new(client, prompt, config.enrich_settings()))
}

async fn run(config: &Config) -> Result<()> {
    let registry = Registry::load_or_empty(&config.feeds_file);
    let mut archive = ArchiveStore::load(&config.archive_file, config.max_archive_items);

    let http = build_client(&config.fetch.user_agent).context("Failed to build HTTP client")?;
    let mut pipeline = Pipeline::new(
        http,
        config.fetch_policy(),
        build_enricher(config)?,
        config.run_limits(),
    )
    .probe_models(config.llm.probe_models)
    .reclassify_on_load(config.reclassify_on_load);

    let report = pipeline.run(&registry, &mut archive).await.with_context(|| {
        format!(
            "Failed to save archive to '{}'",
            config.archive_file.display()
        )
    })?;

    let economy = serde_json::to_vec_pretty(&report.economy)?;
    write_atomic(&config.economy_output, &economy).with_context(|| {
        format!(
            "Failed to write economy batch to '{}'",
            config.economy_output.display()
        )
    })?;

    println!(
        "Archived {} new items ({} papers), {} economy items, {} fallbacks, {} failed sources",
        report.archived,
        report.papers,
        report.economy.len(),
        report.fallback_enrichments,
        report.failed_sources
    );
    Ok(())
}

fn reclassify(config: &Config) -> Result<()> {
    let (changed, total) =
        ArchiveStore::maintain(&config.archive_file, config.max_archive_items, ArchiveStore::reclassify)
            .with_context(|| {
                format!(
                    "Reclassify aborted, archive '{}' left unchanged",
                    config.archive_file.display()
                )
            })?;
    println!("Reclassified {changed} of {total} items");
    Ok(())
}

fn repair(config: &Config) -> Result<()> {
    let (removed, remaining) =
        ArchiveStore::maintain(&config.archive_file, config.max_archive_items, ArchiveStore::repair)
            .with_context(|| {
                format!(
                    "Repair aborted, archive '{}' left unchanged",
                    config.archive_file.display()
                )
            })?;
    println!("Removed {removed} broken items, {remaining} remain");
    Ok(())
}

async fn probe(config: &Config) -> Result<()> {
    let mut enricher = build_enricher(config)?;
    match enricher.probe().await {
        Some(model) => println!("Active model: {model}"),
        None => println!("No models configured"),
    }
    Ok(())
}

fn latest(config: &Config, category: &str, limit: usize) -> Result<()> {
    let archive = ArchiveStore::try_load(&config.archive_file, config.max_archive_items)
        .with_context(|| format!("Failed to read archive '{}'", config.archive_file.display()))?;
    let items = archive.latest(&Category::from(category), limit);
    println!("{}", serde_json::to_string_pretty(&items)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    let config = Config::load(&args.config)
        .with_context(|| format!("Failed to load config '{}'", args.config.display()))?;
    tracing::debug!(?config, "Configuration loaded");

    match args.command.unwrap_or(Command::Run) {
        Command::Run => run(&config).await,
        Command::Reclassify => reclassify(&config),
        Command::Repair => repair(&config),
        Command::Probe => probe(&config).await,
        Command::Latest { category, limit } => latest(&config, &category, limit),
    }
}
