use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use disk_bundle::archive::{ArchiveBuilder, ArchiveFormat};
use disk_bundle::config::{self, BuildConfig};
use disk_bundle::disk::{list_folder, DiskClient, FileFilter, ListingCache};
use log::info;
use tokio_util::sync::CancellationToken;

#[derive(Parser, Debug)]
#[command(name = "disk-bundle")]
#[command(about = "Browse a public disk share and download a selection as one archive")]
struct Cli {
    /// Public key (share link) of the shared resource
    #[arg(long, env = "DISK_BUNDLE_PUBLIC_KEY")]
    public_key: String,

    /// Public resources API endpoint
    #[arg(long, env = "DISK_BUNDLE_API_URL", default_value = config::DEFAULT_API_BASE_URL)]
    api_url: String,

    /// Per-request timeout in seconds
    #[arg(long, env = "DISK_BUNDLE_REQUEST_TIMEOUT", default_value_t = config::DEFAULT_REQUEST_TIMEOUT.as_secs())]
    request_timeout: u64,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List the items of a shared folder
    List(ListArgs),

    /// Download the selected paths into a single archive
    Bundle(BundleArgs),
}

#[derive(Args, Debug)]
struct ListArgs {
    /// Folder inside the share (empty for the shared root)
    #[arg(long, default_value = "")]
    path: String,

    /// File-type filter: images, documents or all
    #[arg(long, default_value = "all")]
    filter: FileFilter,

    /// Print the listing as JSON
    #[arg(long)]
    json: bool,
}

#[derive(Args, Debug)]
struct BundleArgs {
    /// Paths inside the share to include
    #[arg(required = true)]
    paths: Vec<String>,

    /// Output file (defaults to files.zip / files.tar.gz)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Archive format: zip or tar-gz
    #[arg(long, env = "DISK_BUNDLE_FORMAT", default_value = "zip")]
    format: ArchiveFormat,

    /// Maximum simultaneous requests to the provider
    #[arg(long, env = "DISK_BUNDLE_CONCURRENCY", default_value_t = config::MAX_CONCURRENT_REQUESTS)]
    concurrency: usize,

    /// Deepest folder level walked below a selected path
    #[arg(long, env = "DISK_BUNDLE_MAX_DEPTH", default_value_t = config::DEFAULT_MAX_DEPTH)]
    max_depth: usize,

    /// Maximum number of resources resolved per build
    #[arg(long, env = "DISK_BUNDLE_MAX_NODES", default_value_t = config::DEFAULT_MAX_NODES)]
    max_nodes: usize,

    /// Abandon the whole build after this many seconds
    #[arg(long, env = "DISK_BUNDLE_BUILD_TIMEOUT")]
    build_timeout: Option<u64>,
}

fn base_config(cli: &Cli) -> BuildConfig {
    let mut config = BuildConfig::default().with_api_base_url(cli.api_url.clone());
    config.request_timeout = Duration::from_secs(cli.request_timeout);
    config
}

async fn run_list(cli: &Cli, args: &ListArgs) -> Result<()> {
    let client = DiskClient::new(&base_config(cli)).context("Failed to create HTTP client")?;
    let cache = ListingCache::default();

    let items = list_folder(&client, &cache, &cli.public_key, &args.path, args.filter)
        .await
        .with_context(|| format!("Failed to list '{}'", args.path))?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&items)?);
        return Ok(());
    }

    for item in &items {
        let size = item.size.map(|s| s.to_string()).unwrap_or_else(|| "-".to_string());
        println!("{}\t{:>12}\t{}", item.kind, size, item.path);
    }
    Ok(())
}

async fn run_bundle(cli: &Cli, args: &BundleArgs) -> Result<()> {
    let mut config = base_config(cli)
        .with_format(args.format)
        .with_max_concurrent_requests(args.concurrency)
        .with_limits(args.max_depth, args.max_nodes);
    if let Some(secs) = args.build_timeout {
        config = config.with_build_timeout(Duration::from_secs(secs));
    }

    let builder = ArchiveBuilder::new(config)?;

    let cancel = CancellationToken::new();
    let ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            ctrl_c.cancel();
        }
    });

    let report = builder
        .build_with_cancel(&cli.public_key, &args.paths, cancel)
        .await?;

    for skipped in &report.skipped {
        eprintln!(
            "skipped {} ({}): {}",
            skipped.path, skipped.stage, skipped.reason
        );
    }

    let output = args
        .output
        .clone()
        .unwrap_or_else(|| PathBuf::from(report.format.suggested_filename()));
    tokio::fs::write(&output, &report.archive)
        .await
        .with_context(|| format!("Failed to write {}", output.display()))?;

    info!(
        "bundle_written: path={} type={} entries={} skipped={}",
        output.display(),
        report.format.mime_type(),
        report.entries.len(),
        report.skipped.len()
    );
    println!(
        "Wrote {} entries to {} ({} skipped)",
        report.entries.len(),
        output.display(),
        report.skipped.len()
    );
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();
    let result = match &cli.command {
        Commands::List(args) => run_list(&cli, args).await,
        Commands::Bundle(args) => run_bundle(&cli, args).await,
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}
