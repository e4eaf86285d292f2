//! SnapVX Clone
//!
//! Command line front end: parses arguments, sets up the console and trace
//! file logging, runs one action and maps failures to exit codes.

use chrono::Local;
use clap::Parser;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{filter::LevelFilter, fmt, prelude::*, EnvFilter};

use snapvx_clone::{
    Action, ArrayId, EnvironmentRequest, Invocation, OutputFormat, Overrides, Result,
    SnapvxConfig, SymcliGateway, Workflow,
};

// =============================================================================
// CLI Arguments
// =============================================================================

/// Clone databases between VMAX storage groups with SnapVX snapshots
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Action to run
    #[arg(value_enum)]
    action: Action,

    /// Source database name
    #[arg(short = 's', long, env = "SOURCE_DB")]
    source_db: String,

    /// Target database name
    #[arg(short = 't', long, env = "TARGET_DB")]
    target_db: Option<String>,

    /// Array id (full serial or last digits)
    #[arg(long, env = "SYMID")]
    symid: Option<String>,

    /// Use this source storage group instead of the discovered one
    #[arg(long)]
    source_sg: Option<String>,

    /// Use this target storage group instead of the discovered one
    #[arg(long)]
    target_sg: Option<String>,

    /// Snapshot name (default: generated on create, newest otherwise)
    #[arg(long)]
    snapshot: Option<String>,

    /// Snapshot time-to-live in days
    #[arg(long)]
    ttl: Option<u32>,

    /// Full copy on link
    #[arg(long)]
    copy: bool,

    /// Treat source and target as SRDF/Metro
    #[arg(long)]
    metro: bool,

    /// JSON output
    #[arg(long)]
    json: bool,

    /// Configuration file
    #[arg(long, env = "SNAPVX_CONFIG", default_value = "/etc/snapvx-clone.yaml")]
    config: PathBuf,

    /// Console log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL")]
    log_level: Option<String>,

    /// Directory for the trace file
    #[arg(long, env = "TRACE_DIR")]
    log_dir: Option<PathBuf>,

    /// Print mutating commands instead of running them
    #[arg(long)]
    dry_run: bool,
}

// =============================================================================
// Main
// =============================================================================

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let args = Args::parse();

    let config = match load_config(&args) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{}", e);
            return ExitCode::from(e.exit_code());
        }
    };

    init_logging(&config.logging.level, &config.logging.dir);

    info!("{} {}", snapvx_clone::NAME, snapvx_clone::VERSION);
    debug!("args: {:?}", args);

    match run(&args, &config).await {
        Ok(output) => {
            if !output.is_empty() {
                println!("{}", output);
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("{}", e);
            eprintln!("{}", e.report());
            ExitCode::from(e.exit_code())
        }
    }
}

fn load_config(args: &Args) -> Result<SnapvxConfig> {
    let mut config = SnapvxConfig::load(&args.config)?;

    if let Some(level) = &args.log_level {
        config.logging.level = level.clone();
    }
    if let Some(dir) = &args.log_dir {
        config.logging.dir = dir.clone();
    }
    if args.dry_run {
        config.array.dry_run = true;
    }

    Ok(config)
}

async fn run(args: &Args, config: &SnapvxConfig) -> Result<String> {
    let array = args.symid.as_deref().map(ArrayId::parse).transpose()?;

    let invocation = Invocation {
        action: args.action,
        request: EnvironmentRequest {
            source_db: args.source_db.clone(),
            target_db: args.target_db.clone(),
            array,
            snapshot_name: args.snapshot.clone(),
            overrides: Overrides {
                source_group: args.source_sg.clone(),
                target_group: args.target_sg.clone(),
                force_metro: args.metro,
            },
        },
        ttl_days: args.ttl.unwrap_or(config.snapshot.default_ttl_days),
        full_copy: args.copy,
        format: if args.json {
            OutputFormat::Json
        } else {
            OutputFormat::Text
        },
    };

    let gateway = Arc::new(SymcliGateway::new(config.array.clone()));
    Workflow::new(gateway, config).run(&invocation).await
}

// =============================================================================
// Logging Setup
// =============================================================================

/// Console on stderr at `level`, plus a per-run trace file at debug level.
/// The trace file is skipped when its directory is not writable.
fn init_logging(level: &str, dir: &Path) {
    let console_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let console = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_filter(console_filter);

    let file_name = format!("{}_snapvx_clone", Local::now().format("%Y%m%d_%H%M%S"));
    let appender = RollingFileAppender::builder()
        .rotation(Rotation::NEVER)
        .filename_prefix(file_name)
        .filename_suffix("log")
        .build(dir);

    let (trace_file, appender_error) = match appender {
        Ok(appender) => (
            Some(
                fmt::layer()
                    .with_ansi(false)
                    .with_writer(appender)
                    .with_filter(LevelFilter::DEBUG),
            ),
            None,
        ),
        Err(e) => (None, Some(e)),
    };

    tracing_subscriber::registry()
        .with(console)
        .with(trace_file)
        .init();

    if let Some(e) = appender_error {
        warn!("Trace file disabled, cannot write to {}: {}", dir.display(), e);
    }
}

