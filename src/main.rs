//! Agent Evals - evaluation ingestion and dashboard service
//!
//! Entry point for the HTTP server and the operator commands (schema init,
//! demo data seeding, terminal KPI summary).

use agent_evals_core::{
    aggregation::{bucket_by_day_now, summarize, DayBucket, KpiSummary},
    api::{ApiServer, ApiServerConfig, AppState},
    auth::Authenticator,
    config::AppConfig,
    redaction::format_timestamp,
    source::{build_source, generate_records},
    ConnectionMode, EvaluationId, EvaluationSource, LibsqlStorage, OwnerId, StorageBackend,
};
use chrono::{Duration, Utc};
use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info, Level};
use tracing_subscriber::{self, EnvFilter};

#[derive(Parser)]
#[command(name = "agent-evals")]
#[command(about = "Multi-tenant dashboard for AI agent evaluations", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Set log level
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Configuration file (defaults to ./agent-evals.toml when present)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Database path, `:memory:` or libsql:// URL (overrides configuration)
    #[arg(long, env = "AGENT_EVALS_DB_PATH")]
    db_path: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP API server
    Serve {
        /// Server address (overrides configuration)
        #[arg(long)]
        addr: Option<String>,
    },

    /// Create the database and apply migrations
    Init,

    /// Insert generated demo evaluations for an owner
    Seed {
        /// Owner the records belong to
        #[arg(long)]
        owner: String,

        /// Number of records
        #[arg(long, default_value = "120")]
        count: usize,
    },

    /// Print KPIs for an owner
    Summary {
        /// Owner to summarize
        #[arg(long)]
        owner: String,

        /// Days of history
        #[arg(long, default_value = "30")]
        days: u32,

        /// Output format
        #[arg(long, value_enum, default_value = "text")]
        format: OutputFormat,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Serialize)]
struct SummaryReport<'a> {
    owner: &'a str,
    generated_at: String,
    days: u32,
    synthetic: bool,
    summary: KpiSummary,
    series: Vec<DayBucket>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    let level = match cli.log_level.as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let level = level.as_str().to_lowercase();
    let filter = EnvFilter::new(format!(
        "agent_evals={level},agent_evals_core={level},tower_http={level},libsql=warn"
    ));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr) // Write logs to stderr, not stdout
        .init();

    debug!("agent-evals v{} starting...", env!("CARGO_PKG_VERSION"));

    let mut config = AppConfig::load(cli.config.as_deref())?;
    if let Some(path) = cli.db_path {
        config.database.location = Some(path);
    }

    match cli.command {
        Commands::Serve { addr } => {
            if let Some(addr) = addr {
                config.server.addr = addr;
            }
            let storage = open_storage(&config).await?;
            let source = build_source(config.dashboard.data_source, storage.clone());

            let server = ApiServer::new(
                ApiServerConfig {
                    addr: config.server.socket_addr()?,
                },
                AppState::new(storage, source),
                Authenticator::new(&config.auth),
            );
            server.serve().await
        }

        Commands::Init => {
            open_storage(&config).await?;
            println!("Database ready at {}", config.database.location());
            Ok(())
        }

        Commands::Seed { owner, count } => {
            let storage = open_storage(&config).await?;
            let owner = OwnerId::new(owner);

            for mut record in generate_records(&owner, Utc::now(), count) {
                record.id = EvaluationId::new();
                storage.insert_evaluation(&record).await?;
            }

            info!("Seeded {} evaluations for {}", count, owner);
            println!("Inserted {} evaluations for {}", count, owner);
            Ok(())
        }

        Commands::Summary {
            owner,
            days,
            format,
        } => {
            let storage = open_storage(&config).await?;
            let source = build_source(config.dashboard.data_source, storage);
            let owner = OwnerId::new(owner);

            let since = Utc::now() - Duration::days(i64::from(days));
            let records = source.recent(&owner, since).await?;
            let report = SummaryReport {
                owner: owner.as_str(),
                generated_at: format_timestamp(&Utc::now()),
                days,
                synthetic: source.is_synthetic(),
                summary: summarize(&records),
                series: bucket_by_day_now(&records, days),
            };

            match format {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
                OutputFormat::Text => print_report(&report),
            }
            Ok(())
        }
    }
}

async fn open_storage(config: &AppConfig) -> anyhow::Result<Arc<dyn StorageBackend>> {
    let mode = config.database.connection_mode()?;
    if let ConnectionMode::Local(path) = &mode {
        debug!("Using database file {}", path);
    }
    let storage = LibsqlStorage::new(mode).await?;
    Ok(Arc::new(storage))
}

fn print_report(report: &SummaryReport<'_>) {
    let source = if report.synthetic { " (synthetic data)" } else { "" };
    println!("Evaluations for {} over the last {} days{}", report.owner, report.days, source);
    println!("Generated {}", report.generated_at);
    println!();
    println!("  Total evaluations: {}", report.summary.count);
    println!("  Avg latency:       {:.0} ms", report.summary.avg_latency_ms);
    println!("  Success rate:      {:.1}%", report.summary.success_rate);
    println!("  Avg score:         {:.2}", report.summary.avg_score);
    println!();
    println!("  {:<12} {:>6} {:>12} {:>9}", "Date", "Count", "Latency", "Success");
    for bucket in &report.series {
        println!(
            "  {:<12} {:>6} {:>9.0} ms {:>8.1}%",
            bucket.date, bucket.count, bucket.avg_latency_ms, bucket.success_rate
        );
    }
}
