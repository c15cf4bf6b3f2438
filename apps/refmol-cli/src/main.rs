//! refmol - reconcile curated chemical-entity records against ChEBI.
//!
//! Connects to the curated store, retrieves the current authority
//! record for every ChEBI-sourced molecule, applies name/formula
//! corrections and referrer name merges inside one transaction, and
//! writes per-category change reports.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use refmol_authority::{client, ChebiClient, Fetcher, FileCache};
use refmol_engine::{Category, RunConfig, RunCoordinator};
use refmol_store::{bootstrap, MoleculeStore, PgMoleculeStore};

mod error;

use error::CliResult;

/// Reconcile curated chemical entities against the ChEBI authority.
#[derive(Parser)]
#[command(name = "refmol")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Connection string for the curated store.
    #[arg(long, env = "DATABASE_URL")]
    database_url: String,

    /// Name of the authority's reference database in the store.
    #[arg(long, default_value = "ChEBI")]
    database_name: String,

    /// Person id the run's audit record is attributed to.
    #[arg(long, env = "REFMOL_PERSON_ID")]
    person_id: i64,

    /// Perform the full run but roll back all writes.
    #[arg(long)]
    dry_run: bool,

    /// Consult and fill the local response cache.
    #[arg(long)]
    use_cache: bool,

    /// Location of the response cache file.
    #[arg(long, default_value = "chebi-cache.tsv")]
    cache_file: PathBuf,

    /// Directory the per-category reports are written to.
    #[arg(long, default_value = "reports")]
    report_dir: PathBuf,

    /// Maximum concurrent authority requests.
    #[arg(long, default_value_t = 16)]
    max_in_flight: usize,

    /// Authority web-service endpoint.
    #[arg(long, default_value = client::DEFAULT_ENDPOINT)]
    authority_url: String,

    /// Apply pending store migrations before running.
    #[arg(long)]
    migrate: bool,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    if let Err(e) = run(cli).await {
        e.print();
        std::process::exit(e.exit_code());
    }
}

async fn run(cli: Cli) -> CliResult<()> {
    let pool = bootstrap::connect(&cli.database_url, 5).await?;
    if cli.migrate {
        bootstrap::run_migrations(&pool).await?;
    }
    let store: Arc<dyn MoleculeStore> = Arc::new(PgMoleculeStore::new(pool));

    let client = Arc::new(ChebiClient::new(cli.authority_url)?);
    let cache = if cli.use_cache {
        let cache = FileCache::open(&cli.cache_file).await?;
        info!(path = %cache.path().display(), entries = cache.len(), "response cache enabled");
        Some(Arc::new(cache))
    } else {
        None
    };
    let fetcher = Fetcher::new(client, cache, cli.max_in_flight);

    let coordinator = RunCoordinator::new(
        store,
        fetcher,
        RunConfig {
            database_name: cli.database_name,
            person_id: cli.person_id,
            dry_run: cli.dry_run,
        },
    );
    let outcome = coordinator.run().await?;

    tokio::fs::create_dir_all(&cli.report_dir).await?;
    for category in Category::ALL {
        let Some(rendered) = outcome.report.render(category) else {
            continue;
        };
        let path = cli.report_dir.join(format!("{}.tsv", category.stem()));
        tokio::fs::write(&path, rendered).await?;
        info!(report = %path.display(), "report written");
    }

    // Machine-readable summary on stdout; logs stay on stderr.
    match serde_json::to_string_pretty(&outcome.summary) {
        Ok(summary) => println!("{summary}"),
        Err(e) => info!(error = %e, "could not serialize run summary"),
    }
    Ok(())
}
