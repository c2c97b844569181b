use album_ark::config::{Config, EzidCredentials};
use album_ark::graph::GraphOptions;
use album_ark::infra::clock::SystemClock;
use album_ark::infra::ezid_client::EzidRegistrar;
use album_ark::infra::fast_labels::{FastLabelClient, NoLabelLookup};
use album_ark::minting::MintingClient;
use album_ark::pipeline::{BuildReport, MintReport, Pipeline};
use album_ark::record::{load_records, select_record};
use album_ark::storage::{DocumentStore, FsDocumentStore};
use album_ark::{app::ports::SubjectLabelPort, logging, types::CollectionRecord};
use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

#[derive(Parser)]
#[command(name = "album_ark")]
#[command(about = "Builds linked-data documents for digitized photo albums and mints their ARKs")]
#[command(version)]
struct Cli {
    /// TOML configuration file (defaults to ./album_ark.toml when present)
    #[arg(long, global = true, env = "ALBUM_ARK_CONFIG")]
    config: Option<PathBuf>,

    /// Root of the document tree (holds collection/ and items/)
    #[arg(long, global = true, env = "ALBUM_ARK_ROOT", default_value = ".")]
    root: PathBuf,

    /// Metadata CSV, one row per album
    #[arg(long, global = true, default_value = "metadata.csv")]
    csv: PathBuf,

    /// Collection id to process; required when the CSV has several rows
    #[arg(long, global = true)]
    collection: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build or reconcile the collection, item, page and rendition documents
    Build {
        /// Directory holding the page images and the PDF
        #[arg(long)]
        images: PathBuf,
    },
    /// Mint ARKs for the collection and its item
    Mint,
    /// Build, then mint
    Run {
        #[arg(long)]
        images: PathBuf,
    },
    /// Check a built graph is complete and identified
    Verify,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    let cli = Cli::parse();

    let config = Config::load(cli.config.as_deref()).context("loading configuration")?;
    let _guard = logging::init_logging(&config.logging.dir);

    let store: Arc<dyn DocumentStore> = Arc::new(FsDocumentStore::new(&cli.root));
    let labels: Arc<dyn SubjectLabelPort> = if config.labels.lookup {
        Arc::new(FastLabelClient::new(
            config.labels.fast_base_url.clone(),
            Duration::from_secs(config.labels.timeout_seconds),
        )?)
    } else {
        Arc::new(NoLabelLookup)
    };
    let pipeline = Pipeline::new(store.clone(), labels, GraphOptions::from_site(&config.site));

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received; cancelling");
            on_signal.cancel();
        }
    });

    let outcome = match &cli.command {
        Commands::Build { images } => {
            println!("🔨 Building collection documents...");
            let record = record_for(&cli)?;
            build(&pipeline, &record, images).await
        }
        Commands::Mint => {
            println!("🔖 Minting identifiers...");
            let collection_id = collection_id_for(&cli)?;
            mint(&pipeline, &config, store.clone(), &collection_id, &cancel).await
        }
        Commands::Run { images } => {
            println!("🚀 Running full pipeline (build + mint)...");
            let record = record_for(&cli)?;
            println!("\n📥 Step 1: Building documents...");
            match build(&pipeline, &record, images).await {
                Ok(()) => {
                    println!("\n🔖 Step 2: Minting identifiers...");
                    mint(&pipeline, &config, store.clone(), &record.id, &cancel).await
                }
                Err(e) => Err(e),
            }
        }
        Commands::Verify => {
            let collection_id = collection_id_for(&cli)?;
            pipeline
                .verify(&collection_id)
                .await
                .map(|graph| {
                    println!(
                        "✅ {} is ready for import ({} pages)",
                        collection_id,
                        graph.pages.len()
                    );
                })
                .map_err(anyhow::Error::from)
        }
    };

    if let Err(e) = &outcome {
        error!("Run failed: {:#}", e);
        println!("❌ {:#}", e);
    }
    outcome
}

fn record_for(cli: &Cli) -> anyhow::Result<CollectionRecord> {
    let records = load_records(&cli.csv)
        .with_context(|| format!("reading metadata CSV '{}'", cli.csv.display()))?;
    Ok(select_record(records, cli.collection.as_deref())?)
}

fn collection_id_for(cli: &Cli) -> anyhow::Result<String> {
    match &cli.collection {
        Some(id) => Ok(id.clone()),
        None => Ok(record_for(cli)?.id),
    }
}

async fn build(pipeline: &Pipeline, record: &CollectionRecord, images: &Path) -> anyhow::Result<()> {
    let report = pipeline.build(record, images).await?;
    print_build_report(&report);
    Ok(())
}

async fn mint(
    pipeline: &Pipeline,
    config: &Config,
    store: Arc<dyn DocumentStore>,
    collection_id: &str,
    cancel: &CancellationToken,
) -> anyhow::Result<()> {
    let credentials = EzidCredentials::from_env()?;
    let registrar = EzidRegistrar::new(&config.ezid, credentials)?;
    info!(endpoint = registrar.mint_url(), "Using EZID");
    let minter = MintingClient::new(
        Arc::new(registrar),
        store,
        Arc::new(SystemClock),
        config.retry.policy(),
        config.site.target_base_url.clone(),
    );
    let report = pipeline.mint(collection_id, &minter, cancel).await?;
    print_mint_report(&report);
    Ok(())
}

fn print_build_report(report: &BuildReport) {
    println!("\n📊 Build Results for {}:", report.collection_id);
    println!("   Pages: {}", report.pages);
    println!("   Rendition: {}", if report.has_rendition { "yes" } else { "no" });
    println!("   Created: {}", report.created);
    println!("   Patched: {}", report.patched);
    println!("   Unchanged: {}", report.unchanged);
    println!("   Supporting documents written: {}", report.auxiliary_written);
    println!("   Fingerprint: {}", report.fingerprint);
}

fn print_mint_report(report: &MintReport) {
    println!("\n📊 Mint Results for {}:", report.collection_id);
    println!("   Collection ARK: {}", report.collection_ark);
    println!("   Item ARK: {}", report.item_ark);
    println!("   Newly minted: {}", report.minted);
    println!("   Already present: {}", report.reused);
}
