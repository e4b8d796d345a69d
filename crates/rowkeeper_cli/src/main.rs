//! Operator entry point for the rowkeeper entity layer.
//!
//! # Responsibility
//! - Load store configuration and start logging.
//! - Print creation order and DDL, or synchronize a live SQLite schema.

use clap::{Parser, Subcommand};
use log::error;
use rowkeeper_core::builtin::{builtin_registry, ensure_version_row};
use rowkeeper_core::logging::LogTarget;
use rowkeeper_core::schema::{creation_order, sync_app_schema, SchemaSynchronizer};
use rowkeeper_core::{AppContext, Engine, StoreConfig};
use std::error::Error;
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(name = "rowkeeper", version, about = "Entity schema and repository tooling")]
struct Cli {
    /// JSON store configuration; environment variables override it.
    #[arg(long, env = "ROWKEEPER_CONFIG")]
    config: Option<PathBuf>,
    /// Directory for rotated log files. Logs go to stderr when absent.
    #[arg(long)]
    log_dir: Option<PathBuf>,
    #[arg(long, default_value_t = rowkeeper_core::default_log_level().to_string())]
    log_level: String,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Print table creation order.
    Order,
    /// Print CREATE TABLE statements.
    Ddl {
        /// Target engine; defaults to the configured one.
        #[arg(long)]
        engine: Option<Engine>,
    },
    /// Create missing tables, seed the version row and report drift.
    Sync,
    /// Print the core version.
    Ping,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("event=cli_exit module=cli status=error error={}", err);
            eprintln!("rowkeeper: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), Box<dyn Error>> {
    let target = match &cli.log_dir {
        Some(dir) => LogTarget::Directory(dir.clone()),
        None => LogTarget::Stderr,
    };
    rowkeeper_core::logging::init_logging_to(&cli.log_level, target)?;

    let mut config = match &cli.config {
        Some(path) => StoreConfig::from_json_file(path)?,
        None => StoreConfig::default(),
    };
    config.apply_env()?;
    config.normalize()?;

    match cli.command {
        Command::Ping => {
            println!("rowkeeper_core ping={}", rowkeeper_core::ping());
            println!("rowkeeper_core version={}", rowkeeper_core::core_version());
        }
        Command::Order => {
            let registry = builtin_registry()?;
            let order = creation_order(&registry);
            for table in &order.tables {
                println!("{table}");
            }
            for cycle in &order.cycles {
                println!("cycle: {}", cycle.join(" -> "));
            }
        }
        Command::Ddl { engine } => {
            let registry = builtin_registry()?;
            let engine = engine.unwrap_or(config.engine);
            let synchronizer = SchemaSynchronizer::new(&registry, &config.table_prefix);
            for statement in synchronizer.create_statements(engine)? {
                println!("{statement};\n");
            }
        }
        Command::Sync => {
            let app = AppContext::open(config, builtin_registry()?)?;
            let report = sync_app_schema(&app)?;
            let context = app.context_for("", &[]);
            ensure_version_row(&app.repository(context))?;

            for table in &report.created {
                println!("created {table}");
            }
            for table in &report.existing {
                println!("exists  {table}");
            }
            for drift in &report.drift {
                println!("drift   {drift}");
            }
            for cycle in &report.cycles {
                println!("cycle   {}", cycle.join(" -> "));
            }
        }
    }
    Ok(())
}
