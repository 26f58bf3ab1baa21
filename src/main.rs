//! gentoo-install - main entry point
//!
//! Parses the command line, loads the configuration, sets up logging and
//! runs the requested phase.

use std::path::Path;
use std::process::ExitCode;

use anyhow::{Context, Result};
use tracing::{debug, error, info, warn};

use gentoo_install::cli::{Cli, Commands, ConfigCommands};
use gentoo_install::config_file::InstallConfig;
use gentoo_install::context::InstallContext;
use gentoo_install::download::HttpFetcher;
use gentoo_install::executor::{Executor, RecordingExecutor, SystemExecutor};
use gentoo_install::hardware::{detect_internet, resolve_boot_mode};
use gentoo_install::logging::{self, LogOptions};
use gentoo_install::phases::{self, Phase, RunOptions};
use gentoo_install::step::format_elapsed;
use gentoo_install::process_guard;
use gentoo_install::prompt::{Prompter, TerminalPrompter, UnattendedPrompter};
use gentoo_install::sanity;

fn load_config(path: Option<&Path>) -> Result<InstallConfig> {
    match path {
        Some(path) => InstallConfig::load_from_file(path)
            .with_context(|| format!("loading configuration {}", path.display())),
        None => Ok(InstallConfig::default()),
    }
}

fn run_config_command(action: &ConfigCommands, config_path: Option<&Path>) -> Result<()> {
    match action {
        ConfigCommands::Init { file } => {
            if file.exists() {
                anyhow::bail!("{} already exists, not overwriting it", file.display());
            }
            InstallConfig::default().save_to_file(file)?;
            println!("✓ Default configuration written to {}", file.display());
        }
        ConfigCommands::Validate { file } => {
            let config = InstallConfig::load_from_file(file)?;
            config
                .validate()
                .with_context(|| format!("{} is not a valid configuration", file.display()))?;
            println!("✓ Configuration file is valid: {}", file.display());
        }
        ConfigCommands::Show => {
            let config = load_config(config_path)?;
            println!("{}", serde_json::to_string_pretty(&config)?);
        }
    }
    Ok(())
}

fn run_phase_command(cli: &Cli, phase: Phase, options: RunOptions) -> Result<()> {
    let config = load_config(cli.config.as_deref())?;
    config.validate().context("invalid configuration")?;

    let log_file = logging::init(&LogOptions {
        log_dir: cli.effective_log_dir(),
        name: phase.log_name().to_string(),
        verbose: cli.verbose,
    })?;
    debug!("Logging to {}", log_file.display());

    if cli.dry_run {
        info!("Dry run: commands are logged, not executed");
    } else {
        let binaries = match phase {
            Phase::Base => sanity::base_binaries(&config),
            Phase::Programs => sanity::PROGRAM_BINARIES.to_vec(),
        };
        sanity::run_preflight_checks(&binaries, false)?;
    }

    let firmware = resolve_boot_mode(config.disk.boot_mode);
    info!("Firmware: {}", firmware);

    if phase.runs_from_live_medium() && !cli.dry_run {
        let network = detect_internet("distfiles.gentoo.org");
        if !network.is_online() {
            warn!("No internet connection detected; downloads will likely fail");
        }
    }

    let exec: Box<dyn Executor> = if cli.dry_run {
        Box::new(RecordingExecutor::dry_run_with_fixtures())
    } else {
        Box::new(SystemExecutor::new())
    };

    let prompter: Box<dyn Prompter> = if cli.dry_run {
        Box::new(UnattendedPrompter)
    } else {
        Box::new(TerminalPrompter)
    };

    let mut ctx = InstallContext::new(
        config,
        exec,
        prompter,
        Box::new(HttpFetcher::new()?),
        firmware,
    )
    .with_env_passwords();

    let progress = phases::run_phase(phase, &mut ctx, &options)?;
    info!(
        "Phase {} complete: {} step(s) in {}",
        phase,
        progress.completed().len(),
        format_elapsed(progress.total_elapsed())
    );
    info!("Log written to {}", log_file.display());
    Ok(())
}

fn run(cli: &Cli) -> Result<()> {
    match &cli.command {
        Commands::Base(selection) => run_phase_command(cli, Phase::Base, selection.clone().into()),
        Commands::Programs(selection) => {
            run_phase_command(cli, Phase::Programs, selection.clone().into())
        }
        Commands::Steps { phase } => {
            logging::init_console(cli.verbose);
            print!("{}", phases::list_steps(*phase));
            Ok(())
        }
        Commands::Config { action } => {
            logging::init_console(cli.verbose);
            run_config_command(action, cli.config.as_deref())
        }
    }
}

fn main() -> ExitCode {
    if let Err(e) = process_guard::install_signal_handlers() {
        eprintln!("warning: failed to install signal handlers: {}", e);
    }

    let cli = Cli::parse_args();
    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            if tracing::dispatcher::has_been_set() {
                error!("{:#}", e);
            } else {
                eprintln!("✗ {:#}", e);
            }
            ExitCode::FAILURE
        }
    }
}
