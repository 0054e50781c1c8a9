mod acquire;
mod extract;
mod normalize;
mod overview;
mod pipeline;
mod records;
mod settings;
mod store;
mod table;

use std::path::PathBuf;
use std::time::{Duration, Instant};

use anyhow::Context;
use clap::{Parser, Subcommand};

use acquire::{AcquisitionOptions, ApifySource};
use extract::columns::{ORGANIC_RESULTS, PEOPLE_ALSO_ASK, RELATED_QUERIES};
use settings::Settings;
use store::RELATED_QUERIES_CLEAN;

#[derive(Parser)]
#[command(
    name = "serp_flattener",
    about = "Flatten search-engine result pages into per-term tables"
)]
struct Cli {
    /// JSON settings file (missing file means defaults + SERP_* env)
    #[arg(short, long, global = true, default_value = settings::DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Acquire raw results for each term and write the raw audit artifact
    Fetch {
        /// Terms to search (default: `terms` from settings)
        #[arg(short, long = "term")]
        terms: Vec<String>,
    },
    /// Flatten the raw audit artifact into tables
    Process {
        /// Abort if any section fails to serialize
        #[arg(long)]
        strict: bool,
    },
    /// Fetch + process in one pipeline
    Run {
        #[arg(short, long = "term")]
        terms: Vec<String>,
        #[arg(long)]
        strict: bool,
    },
    /// Row counts of every persisted table
    Stats,
    /// Term-filtered summary of the clean tables
    Overview {
        /// Terms to show (repeatable; default: all)
        #[arg(short, long = "term")]
        terms: Vec<String>,
        /// Max preview rows per table
        #[arg(short = 'n', long, default_value = "20")]
        limit: usize,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let t0 = Instant::now();
    let cli = Cli::parse();
    let settings = settings::load(&cli.config)
        .with_context(|| format!("Failed to load settings from {:?}", cli.config))?;

    let result = match cli.command {
        Commands::Fetch { terms } => fetch(&settings, terms).await.map(|_| ()),
        Commands::Process { strict } => {
            let path = store::raw_path(&settings);
            let records = store::read_raw(&path)
                .with_context(|| format!("No raw artifact at {:?}. Run 'fetch' first.", path))?;
            if records.is_empty() {
                println!("Raw artifact is empty. Nothing to process.");
                return Ok(());
            }
            process(&settings, &records, strict)
        }
        Commands::Run { terms, strict } => {
            let t_fetch = Instant::now();
            let records = fetch(&settings, terms).await?;
            println!("Fetched in {}", format_duration(t_fetch.elapsed()));
            if records.is_empty() {
                println!("No records acquired. Nothing to process.");
                return Ok(());
            }
            process(&settings, &records, strict)
        }
        Commands::Stats => {
            let store = store::open(&settings)?;
            println!("Store: {}", store.location());
            for name in table_names() {
                match store.read_table(name)? {
                    Some(t) => println!("{:<24} {:>6} rows", name, t.len()),
                    None => println!("{:<24} {:>6}", name, "-"),
                }
            }
            Ok(())
        }
        Commands::Overview { terms, limit } => show_overview(&settings, &terms, limit),
    };

    let elapsed = t0.elapsed();
    if elapsed.as_secs() >= 1 {
        println!("\nDone in {}", format_duration(elapsed));
    }

    result
}

async fn fetch(settings: &Settings, terms: Vec<String>) -> anyhow::Result<Vec<records::RawRecord>> {
    let terms = if terms.is_empty() {
        settings.terms.clone()
    } else {
        terms
    };
    if terms.is_empty() {
        anyhow::bail!("No terms given. Pass --term or set `terms` in settings.");
    }

    let source = ApifySource::from_settings(settings)?;
    let options = AcquisitionOptions::from_settings(settings);
    println!("Fetching {} terms via {}...", terms.len(), settings.actor_id);
    let (records, stats) = acquire::fetch_terms(
        &source,
        &terms,
        &options,
        Duration::from_millis(settings.pause_ms),
    )
    .await?;
    println!(
        "Done: {} terms ({} ok, {} errors), {} records ({} non-object items skipped).",
        stats.terms, stats.ok, stats.errors, stats.items, stats.skipped_items
    );

    let path = store::raw_path(settings);
    store::write_raw(&path, &records)
        .with_context(|| format!("Failed to write raw artifact {:?}", path))?;
    println!("Raw artifact: {}", path.display());
    Ok(records)
}

fn process(settings: &Settings, records: &[records::RawRecord], strict: bool) -> anyhow::Result<()> {
    let store = store::open(settings)?;
    println!("Processing {} records into {}...", records.len(), store.location());
    let counts = pipeline::process_records(records, store.as_ref(), strict)?;
    counts.print();
    Ok(())
}

fn show_overview(settings: &Settings, terms: &[String], limit: usize) -> anyhow::Result<()> {
    let store = store::open(settings)?;
    let load = |name: &str| -> anyhow::Result<table::FlatTable> {
        Ok(store.read_table(name)?.unwrap_or_default())
    };
    let organic = load(ORGANIC_RESULTS.table)?;
    let paa = load(PEOPLE_ALSO_ASK.table)?;
    let related = load(RELATED_QUERIES_CLEAN)?;

    let all_terms = overview::available_terms(&[&organic, &paa, &related]);
    if all_terms.is_empty() {
        println!("No data found in {}. Run 'process' first.", store.location());
        return Ok(());
    }
    println!("Terms: {}", all_terms.join(", "));

    let organic = overview::filter_by_terms(&organic, terms);
    let paa = overview::filter_by_terms(&paa, terms);
    let related = overview::filter_by_terms(&related, terms);

    println!("\nOrganic results:  {}", organic.len());
    println!("Questions:        {}", paa.len());
    println!("Related queries:  {}", related.len());

    overview::print_preview("Organic results", &organic, limit);
    overview::print_preview("People also ask", &paa, limit);

    let words = overview::word_frequencies(&paa, "question", 15);
    if !words.is_empty() {
        println!("\n--- Question words ---");
        for (word, count) in words {
            println!("  {:<20} {}", word, count);
        }
    }

    let edges = overview::related_edges(&related);
    if edges.is_empty() {
        println!("\nNo related queries for the selected terms.");
    } else {
        println!("\n--- Related queries ---");
        for (term, queries) in edges {
            println!("  {} -> {}", term, queries.join(" | "));
        }
    }
    Ok(())
}

fn table_names() -> [&'static str; 4] {
    [
        ORGANIC_RESULTS.table,
        PEOPLE_ALSO_ASK.table,
        RELATED_QUERIES.table,
        RELATED_QUERIES_CLEAN,
    ]
}

fn format_duration(d: Duration) -> String {
    let secs = d.as_secs();
    if secs < 60 {
        format!("{:.1}s", d.as_secs_f64())
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}
