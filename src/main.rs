//! `predb`: migrate, analyse and generate predicate training databases.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use predicate_db::analysis::PredicateDbAnalyser;
use predicate_db::backend::{Backend, ProcessEngine};
use predicate_db::config::{Config, LogFormat};
use predicate_db::generation::{MachineJob, PredicateDbGenerator};
use predicate_db::migration::PredicateDbMigration;
use predicate_db::storage::{FormatId, PredicateDbFormat};

#[derive(Parser, Debug)]
#[command(name = "predb", version, about = "Predicate training database tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Convert a database tree into another format
    Migrate {
        source_dir: PathBuf,
        target_dir: PathBuf,
        target_format: FormatId,
        #[arg(long, default_value = "legacy")]
        source_format: FormatId,
        #[arg(long)]
        workers: Option<usize>,
        #[arg(long)]
        overwrite: bool,
    },
    /// Print aggregate statistics of a database tree
    Analyse {
        dir: PathBuf,
        format: FormatId,
        #[arg(long)]
        workers: Option<usize>,
        #[arg(long)]
        json: bool,
    },
    /// Label the predicates of a machine with backend timings
    Generate {
        machine: PathBuf,
        predicates_file: PathBuf,
        target_dir: PathBuf,
        /// Backend descriptor such as `prob[CLPFD=TRUE]`; repeatable
        #[arg(long = "backend", required = true)]
        backends: Vec<String>,
        /// Evaluate every preference subset of each backend
        #[arg(long)]
        cross_product: bool,
        #[arg(long)]
        timeout_ms: Option<u64>,
        /// Root the machine's source path is recorded relative to
        #[arg(long)]
        source_root: Option<PathBuf>,
        #[arg(long, default_value = "json")]
        format: FormatId,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = Config::from_env().context("configuration error")?;

    init_logging(&config);
    info!(version = env!("CARGO_PKG_VERSION"), "predb starting");

    let result = run(cli.command, config).await;
    if let Err(e) = &result {
        error!(error = %e, "predb failed");
    }
    result
}

async fn run(command: Commands, config: Config) -> anyhow::Result<()> {
    match command {
        Commands::Migrate {
            source_dir,
            target_dir,
            target_format,
            source_format,
            workers,
            overwrite,
        } => {
            let migration = PredicateDbMigration::from_boxed(source_format.format())
                .with_workers(workers.unwrap_or(config.workers))
                .with_overwrite(overwrite);
            let stats = tokio::task::spawn_blocking(move || {
                migration.migrate(&source_dir, &target_dir, target_format.format().as_ref())
            })
            .await??;
            println!("{stats}");
        }
        Commands::Analyse {
            dir,
            format,
            workers,
            json,
        } => {
            let analyser = PredicateDbAnalyser::from_boxed(format.format())
                .with_workers(workers.unwrap_or(config.workers));
            let analysis = tokio::task::spawn_blocking(move || analyser.analyse(&dir)).await??;
            if json {
                println!("{}", serde_json::to_string_pretty(&analysis)?);
            } else {
                println!("{analysis}");
            }
        }
        Commands::Generate {
            machine,
            predicates_file,
            target_dir,
            backends,
            cross_product,
            timeout_ms,
            source_root,
            format,
        } => {
            let predicates: Vec<String> = std::fs::read_to_string(&predicates_file)
                .with_context(|| format!("cannot read {}", predicates_file.display()))?
                .lines()
                .map(str::trim)
                .filter(|line| !line.is_empty())
                .map(str::to_string)
                .collect();

            let mut parsed = Vec::new();
            for spec in &backends {
                let backend = Backend::parse(spec)?;
                if cross_product {
                    parsed.extend(backend.cross_produce()?);
                } else {
                    parsed.push(backend);
                }
            }

            let timeout = timeout_ms.map_or(config.timeout, Duration::from_millis);
            let engine = Arc::new(ProcessEngine::from_config(&config.engine));
            let format: Arc<dyn PredicateDbFormat> = Arc::from(format.format());
            let generator =
                PredicateDbGenerator::new(engine, parsed, format).with_timeout(timeout);

            let root = source_root
                .or_else(|| machine.parent().map(PathBuf::from))
                .unwrap_or_default();
            let job = MachineJob::new(machine, &root, predicates);
            let stats = generator.generate(&job, &target_dir).await?;
            println!("{stats}");
        }
    }
    Ok(())
}

/// Initialize tracing/logging
fn init_logging(config: &Config) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    match config.logging.format {
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().json().with_writer(std::io::stderr))
                .init();
        }
        LogFormat::Pretty => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().with_writer(std::io::stderr))
                .init();
        }
    }
}
