use std::process;

use anyhow::{Context, Result};
use clap::error::ErrorKind;
use clap::Parser;
use log::{error, info, warn, LevelFilter};
use simplelog::{ColorChoice, Config, TermLogger, TerminalMode};

use diag_collector::cli::{AdvisorCommand, Args, CollectArgs, Commands};
use diag_collector::collectors::{build_registry, collect, list_specs, open_context};
use diag_collector::config::load_or_default;
use diag_collector::constants::{EXIT_PRECONDITION_FAILED, EXIT_RUNTIME_ERROR, EXIT_SUCCESS};
use diag_collector::core::{filters, AbortHandle, ConfigError};

fn main() {
    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(e) => {
            let code = match e.kind() {
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => EXIT_SUCCESS,
                _ => EXIT_PRECONDITION_FAILED,
            };
            let _ = e.print();
            process::exit(code);
        }
    };

    if let Err(e) = initialize_logging(args.verbose) {
        eprintln!("{:#}", e);
        process::exit(EXIT_RUNTIME_ERROR);
    }

    let action = match args.command {
        Some(Commands::Advisor { action: Some(action) }) => action,
        Some(Commands::Advisor { action: None }) => {
            error!("Missing advisor action; try 'diag-collector advisor --help'");
            process::exit(EXIT_PRECONDITION_FAILED);
        }
        None => {
            error!("Missing command; try 'diag-collector --help'");
            process::exit(EXIT_PRECONDITION_FAILED);
        }
    };

    let code = match run(action) {
        Ok(()) => EXIT_SUCCESS,
        Err(e) => {
            error!("{:#}", e);
            exit_code_for(&e)
        }
    };
    process::exit(code);
}

/// Marks errors raised while loading the configuration file.
#[derive(Debug, thiserror::Error)]
#[error("invalid configuration")]
struct InvalidConfig;

/// Initialize logging with the specified verbosity level
fn initialize_logging(verbose: bool) -> Result<()> {
    let log_level = if verbose { LevelFilter::Debug } else { LevelFilter::Info };
    TermLogger::init(log_level, Config::default(), TerminalMode::Mixed, ColorChoice::Auto)
        .context("Failed to initialize logger")?;
    Ok(())
}

/// Configuration problems are preconditions; anything else is a runtime failure.
fn exit_code_for(e: &anyhow::Error) -> i32 {
    if e.downcast_ref::<ConfigError>().is_some() || e.downcast_ref::<InvalidConfig>().is_some() {
        EXIT_PRECONDITION_FAILED
    } else {
        EXIT_RUNTIME_ERROR
    }
}

fn run(action: AdvisorCommand) -> Result<()> {
    match action {
        AdvisorCommand::Collect(args) => run_collection(&args),
        AdvisorCommand::ListSpecs => {
            let registry = build_registry(filters::global())?;
            for line in list_specs(&registry, filters::global()) {
                println!("{}", line);
            }
            Ok(())
        }
    }
}

fn run_collection(args: &CollectArgs) -> Result<()> {
    let mut config = load_or_default(args.config.as_deref()).context(InvalidConfig)?;
    args.apply_to(&mut config);

    let context = open_context(&args.source(), &config)?;

    let abort = AbortHandle::new();
    let handler_abort = abort.clone();
    if let Err(e) = ctrlc::set_handler(move || {
        warn!("Interrupt received, finishing in-flight work");
        handler_abort.abort();
    }) {
        warn!("Failed to install interrupt handler: {}", e);
    }

    info!("Starting collection from {} context", context.name());
    let report = collect(&config, context.as_ref(), filters::global(), abort)?;

    for record in report.records.iter().filter(|r| r.outcome == "failed") {
        warn!(
            "{} failed: {}",
            record.name,
            record.reason.as_deref().unwrap_or("unknown error")
        );
    }
    info!(
        "Collection finished: {} succeeded, {} skipped, {} failed",
        report.counts.success, report.counts.skipped, report.counts.failed
    );
    info!("Archive: {}", report.archive_dir.display());
    if let Some(zip_path) = &report.zip_path {
        info!("Compressed archive: {}", zip_path.display());
    }
    Ok(())
}
