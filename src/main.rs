//! devboot - main entry point

use anyhow::{Context, Result};
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

use devboot::bootstrap::Bootstrapper;
use devboot::cli::Cli;
use devboot::config::BootstrapConfig;
use devboot::process_guard::{self, ProcessGuard};
use devboot::sanity;
use devboot::step_runner::{DryRunExecutor, SystemExecutor};

/// Initialize tracing; `RUST_LOG` overrides the default `info` level
fn init_logger() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() {
    init_logger();

    let code = match run() {
        Ok(code) => code,
        Err(e) => {
            error!("{:#}", e);
            eprintln!("✗ {:#}", e);
            1
        }
    };
    std::process::exit(code);
}

/// Returns the exit status of the last step that ran.
fn run() -> Result<i32> {
    let cli = Cli::parse_args();
    debug!("CLI arguments parsed: {:?}", cli);
    if !cli.extra.is_empty() {
        debug!("Ignoring arguments after the mode: {:?}", cli.extra);
    }

    if let Err(e) = process_guard::init_signal_handlers() {
        warn!("Failed to initialize signal handlers: {}", e);
        // Cleanup still happens through ProcessGuard's Drop
    }
    let _guard = ProcessGuard::new();

    let mut config = match &cli.config {
        Some(path) => {
            info!("Loading configuration from {:?}", path);
            BootstrapConfig::load_from_file(path)?
        }
        None => BootstrapConfig::default(),
    };
    config.apply_process_env()?;
    config.validate().context("Invalid configuration")?;

    if let Some(path) = &cli.save_config {
        config.save_to_file(path)?;
        println!("✓ Configuration written to {:?}", path);
        return Ok(0);
    }

    let project_dir = std::fs::canonicalize(&cli.project_dir)
        .with_context(|| format!("Project directory {:?} is not accessible", cli.project_dir))?;

    let bootstrapper = Bootstrapper::new(project_dir, config, cli.runtime_mode());
    sanity::run_preflight_checks(bootstrapper.layout(), bootstrapper.config());

    let report = if cli.dry_run {
        info!("Dry run: commands are printed, not executed");
        bootstrapper.run(&mut DryRunExecutor::new())?
    } else {
        bootstrapper.run(&mut SystemExecutor)?
    };

    Ok(report.exit_code())
}
