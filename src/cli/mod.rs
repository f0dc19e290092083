//! The AutoTest Command-Line Interface.
//!
//! Loads the station config, initializes logging and dispatches to the
//! subcommand handlers. Errors are rendered as miette reports.

use std::{
    env,
    fs::OpenOptions,
    path::{Path, PathBuf},
    process,
    sync::Mutex,
    time::Duration,
};

use clap::Parser;
use tracing_subscriber::EnvFilter;

use crate::{
    cli::args::{AutoTestArgs, Command},
    config::{LoggingSection, StationConfig},
    errors::{AutoTestError, Result},
    prompt::{PromptSource, ScriptedPrompt, TerminalPrompt},
    render::NullRenderer,
    report::{ReportKeyPair, RowDecryptor},
    station,
    test::Test,
};

pub mod args;
pub mod demo;
pub mod output;

/// The main entry point for the CLI.
pub fn run() {
    let args = AutoTestArgs::parse();

    if let Err(e) = dispatch(args) {
        let report = miette::Report::new(e);
        eprintln!("{report:?}");
        process::exit(1);
    }
}

fn dispatch(args: AutoTestArgs) -> Result<()> {
    let config = match &args.config {
        Some(path) => StationConfig::load(path)?,
        None => StationConfig::default(),
    };
    init_logging(&config.logging)?;

    match args.command {
        Command::Demo {
            targets,
            runs,
            seed,
            unattended,
            step_delay_ms,
        } => {
            let options = demo::DemoOptions {
                targets,
                seed: seed.unwrap_or_else(rand::random),
                step_delay: Duration::from_millis(step_delay_ms),
            };
            handle_demo(&config, &options, runs, unattended)
        }
        Command::Keygen { out } => handle_keygen(&out, &config),
        Command::Decrypt { key, report } => handle_decrypt(&key, &report),
        Command::Header => handle_header(),
        Command::StationId { interface } => {
            let interface = interface.unwrap_or_else(|| config.test.interface.clone());
            println!("{}", station::station_id(&interface)?);
            Ok(())
        }
    }
}

// ============================================================================
// SUBCOMMAND HANDLERS
// ============================================================================

fn handle_demo(
    config: &StationConfig,
    options: &demo::DemoOptions,
    runs: usize,
    unattended: bool,
) -> Result<()> {
    let prompt: Box<dyn PromptSource> = if unattended {
        let serials = demo::generated_serials(options.seed, runs * options.targets.max(1));
        Box::new(ScriptedPrompt::new(serials))
    } else {
        Box::new(TerminalPrompt::new(config.display.color.choice()))
    };

    let builder = Test::builder().name(
        config
            .test
            .name
            .clone()
            .unwrap_or_else(|| "Demo Test".to_string()),
    );
    let builder = config.apply(builder, &repo_dir())?;
    let mut test = demo::build(builder, options, prompt);
    tracing::info!(seed = options.seed, runs, "starting demo");

    for run in 1..=runs {
        test.run()?;
        output::print_run_summary(&test, run, config.display.color.choice())?;
    }
    Ok(())
}

fn handle_header() -> Result<()> {
    let options = demo::DemoOptions {
        targets: 1,
        seed: 0,
        step_delay: Duration::ZERO,
    };
    let builder = Test::builder().renderer(NullRenderer);
    let test = demo::build(builder, &options, ScriptedPrompt::default());
    output::print_csv(&[test.export_header()]).map_err(|e| AutoTestError::Io(e.into()))
}

fn handle_keygen(out: &Path, config: &StationConfig) -> Result<()> {
    let keys = ReportKeyPair::generate();
    let (public, secret) = keys.write_to(out)?;
    tracing::info!(public = %public.display(), "wrote report key pair");
    output::print_key_paths(&public, &secret, config.display.color.choice())?;
    Ok(())
}

fn handle_decrypt(key: &Path, report: &Path) -> Result<()> {
    let decryptor = RowDecryptor::from_file(key)?;
    let rows = decryptor.open_report(report)?;
    output::print_csv(&rows).map_err(|source| AutoTestError::Csv {
        path: report.to_path_buf(),
        source,
    })
}

// ============================================================================
// HELPER FUNCTIONS
// ============================================================================

/// Directory the version sha is read from: the current working directory.
fn repo_dir() -> PathBuf {
    env::current_dir().unwrap_or_else(|_| PathBuf::from("."))
}

/// Installs the global subscriber. `RUST_LOG` overrides the configured filter.
fn init_logging(logging: &LoggingSection) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&logging.filter))
        .unwrap_or_else(|_| EnvFilter::new(crate::config::DEFAULT_LOG_FILTER));

    let installed = match &logging.file {
        Some(path) => {
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .try_init()
        }
        None => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .try_init(),
    };
    if let Err(e) = installed {
        tracing::warn!(error = %e, "keeping the already installed log subscriber");
    }
    Ok(())
}
