//! Table Dump
//!
//! Command-line entry point: parses flags, sets up logging, wires the table
//! store and dump storage adapters into an [`Orchestrator`] and turns the
//! run report into the process exit code.

use anyhow::{bail, Context};
use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use table_dump::controlplane::backends::{DynamoDbConfig, DynamoDbStore};
use table_dump::storage::{S3Config, S3Storage};
use table_dump::{
    DeploymentTarget, DumpStorageRef, ExhaustedPolicy, LocalStorage, Orchestrator,
    OrchestratorConfig, Separator, Settings, TableStoreRef, LOCAL_REGION,
};

// =============================================================================
// CLI Arguments
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Mode {
    Backup,
    Restore,
}

/// Simple table backup/restore
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// 'backup' or 'restore'
    #[arg(short = 'm', long, value_enum)]
    mode: Mode,

    /// Region to use, e.g. 'us-west-1'. Use 'local' for a local store
    #[arg(short = 'r', long, env = "AWS_REGION")]
    region: String,

    /// Source table name, or 'prefix*' for wildcard prefix selection
    #[arg(short = 's', long = "srcTable")]
    src_table: String,

    /// Destination table name or 'prefix*' [defaults to source]
    #[arg(short = 'd', long = "destTable")]
    dest_table: Option<String>,

    /// Prefix separator for wildcard patterns
    #[arg(long = "prefixSeparator", default_value = "-")]
    prefix_separator: String,

    /// Match wildcard prefixes as plain string prefixes
    #[arg(long = "noSeparator")]
    no_separator: bool,

    /// Temporary read capacity of the tables to back up
    #[arg(long = "readCapacity")]
    read_capacity: Option<i64>,

    /// Temporary write capacity of the tables to restore to
    #[arg(long = "writeCapacity")]
    write_capacity: Option<i64>,

    /// Host of the local store
    #[arg(long)]
    host: Option<String>,

    /// Port of the local store
    #[arg(long)]
    port: Option<u16>,

    /// Explicit store endpoint URL, overrides host and port
    #[arg(long, env = "TABLE_DUMP_ENDPOINT")]
    endpoint: Option<String>,

    /// Access key
    #[arg(long = "accessKey")]
    access_key: Option<String>,

    /// Secret key
    #[arg(long = "secretKey")]
    secret_key: Option<String>,

    /// Name of the S3 bucket to back up to or restore from
    #[arg(long = "s3bucket")]
    s3_bucket: Option<String>,

    /// Region the S3 bucket resides in
    #[arg(long = "s3location")]
    s3_location: Option<String>,

    /// Dump root; a key prefix when an S3 bucket is used
    #[arg(long = "dumpPath", default_value = "dump")]
    dump_path: PathBuf,

    /// YAML settings file
    #[arg(long, env = "TABLE_DUMP_CONFIG")]
    config: Option<PathBuf>,

    /// Maximum number of table workers running at once
    #[arg(long = "maxConcurrency")]
    max_concurrency: Option<usize>,

    /// Spacing between worker starts, in milliseconds
    #[arg(long = "startDelayMs")]
    start_delay_ms: Option<u64>,

    /// Batch-write attempts before unprocessed items are dropped
    #[arg(long = "batchRetries")]
    batch_retries: Option<u32>,

    /// Fail a table instead of reporting it partial when items are dropped
    #[arg(long = "failOnDroppedItems")]
    fail_on_dropped_items: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long = "log", env = "LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Output logs as JSON
    #[arg(long = "logJson", env = "LOG_JSON")]
    log_json: bool,
}

// =============================================================================
// Main
// =============================================================================

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    init_logging(&args)?;

    info!("Starting {} v{}", table_dump::NAME, table_dump::VERSION);

    let settings = load_settings(&args)?;
    let target = DeploymentTarget::from_region(&args.region);

    let mut config = OrchestratorConfig::from_settings(&settings, target);
    config.separator = Separator::new(&args.prefix_separator, args.no_separator)
        .context("Invalid prefix separator")?;
    config.read_capacity = args.read_capacity;
    config.write_capacity = args.write_capacity;

    let store = connect_store(&args, &settings).await?;
    let storage = open_storage(&args).await?;
    let orchestrator = Orchestrator::new(config, store, storage);

    let report = match args.mode {
        Mode::Backup => orchestrator
            .backup(&args.src_table)
            .await
            .context("Backup failed")?,
        Mode::Restore => {
            let destination = args.dest_table.as_deref().unwrap_or(&args.src_table);
            orchestrator
                .restore(&args.src_table, destination)
                .await
                .context("Restore failed")?
        }
    };

    report.log_summary();
    std::process::exit(report.exit_code());
}

// =============================================================================
// Wiring
// =============================================================================

fn load_settings(args: &Args) -> anyhow::Result<Settings> {
    let mut settings = match args.config {
        Some(ref path) => Settings::load(path)
            .with_context(|| format!("Failed to load settings from {}", path.display()))?,
        None => Settings::default(),
    };

    if let Some(max_concurrency) = args.max_concurrency {
        settings.max_concurrency = max_concurrency;
    }
    if let Some(start_delay_ms) = args.start_delay_ms {
        settings.start_delay_ms = start_delay_ms;
    }
    if let Some(batch_retries) = args.batch_retries {
        settings.batch_max_attempts = batch_retries;
    }
    if args.fail_on_dropped_items {
        settings.on_exhausted = ExhaustedPolicy::Fail;
    }

    settings.validate().context("Invalid settings")?;
    Ok(settings)
}

async fn connect_store(args: &Args, settings: &Settings) -> anyhow::Result<TableStoreRef> {
    let endpoint_url = match (&args.endpoint, args.region.as_str()) {
        (Some(endpoint), _) => Some(endpoint.clone()),
        (None, LOCAL_REGION) => match (&args.host, args.port) {
            (Some(host), Some(port)) => Some(format!("http://{}:{}", host, port)),
            _ => bail!("--host and --port are required for the '{}' region", LOCAL_REGION),
        },
        (None, _) => None,
    };

    let store = DynamoDbStore::connect(DynamoDbConfig {
        region: args.region.clone(),
        endpoint_url,
        access_key: args.access_key.clone(),
        secret_key: args.secret_key.clone(),
        scan_limit: settings.scan_page_limit,
    })
    .await
    .context("Failed to connect to the table store")?;

    Ok(Arc::new(store))
}

async fn open_storage(args: &Args) -> anyhow::Result<DumpStorageRef> {
    let backup = args.mode == Mode::Backup;

    if let Some(ref bucket) = args.s3_bucket {
        let storage = S3Storage::connect(
            S3Config {
                bucket_name: bucket.clone(),
                location: args.s3_location.clone(),
                key_prefix: args.dump_path.to_string_lossy().trim_matches('/').to_string(),
                ..Default::default()
            },
            backup,
        )
        .await
        .with_context(|| format!("Failed to open bucket {}", bucket))?;
        return Ok(Arc::new(storage));
    }

    let storage = if backup {
        LocalStorage::create(&args.dump_path).await
    } else {
        LocalStorage::open(&args.dump_path).await
    }
    .with_context(|| format!("Failed to open dump path {}", args.dump_path.display()))?;

    Ok(Arc::new(storage))
}

// =============================================================================
// Logging Setup
// =============================================================================

fn init_logging(args: &Args) -> anyhow::Result<()> {
    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" | "warning" => Level::WARN,
        "error" | "critical" => Level::ERROR,
        _ => Level::INFO,
    };

    let filter = EnvFilter::from_default_env()
        .add_directive(level.into())
        .add_directive("hyper=warn".parse()?)
        .add_directive("aws_config=warn".parse()?)
        .add_directive("aws_smithy_runtime=warn".parse()?)
        .add_directive("aws_sdk_dynamodb=warn".parse()?)
        .add_directive("aws_sdk_s3=warn".parse()?);

    if args.log_json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true))
            .init();
    }

    Ok(())
}
