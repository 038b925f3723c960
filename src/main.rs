//! Vigilo - menu bar agent that keeps the Mac awake
//!
//! A plain invocation spawns a detached agent and exits. The agent:
//! - takes the single-instance lock (or exits quietly if one is running)
//! - loads the IOKit power capability
//! - runs the menu bar event loop until Quit

use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;

use vigilo::config::{self, AppConfig, Paths};
use vigilo::error::{VigiloError, EXIT_FAILURE};
use vigilo::logging;
use vigilo::singleton;
use vigilo::supervisor::{self, Role};

#[derive(Parser, Debug)]
#[command(name = "vigilo", version, about = "Keeps your Mac awake from the menu bar")]
struct Cli {
    /// Run the agent in this process instead of spawning a detached copy
    #[arg(long)]
    foreground: bool,

    /// Log at debug level
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let app_config = config::load_config();
    logging::init(&app_config.log_filter, cli.verbose);

    match run(&cli, &app_config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{:#}", e);
            let code = e
                .downcast_ref::<VigiloError>()
                .map_or(EXIT_FAILURE, VigiloError::exit_code);
            ExitCode::from(code)
        }
    }
}

fn run(cli: &Cli, app_config: &AppConfig) -> Result<()> {
    let role = if cli.foreground {
        Role::Agent
    } else {
        Role::detect()
    };
    let paths = Paths::resolve().context("Failed to resolve Vigilo paths")?;

    match role {
        Role::Launcher => {
            let exe = std::env::current_exe().context("Failed to locate own executable")?;
            supervisor::spawn_agent(&exe, Some(&paths.log_file))?;
            Ok(())
        }
        Role::Agent => run_agent(app_config, &paths),
    }
}

fn run_agent(app_config: &AppConfig, paths: &Paths) -> Result<()> {
    tracing::info!("Vigilo agent starting (PID: {})", std::process::id());

    // A second instance leaves without touching the assertions and exits 0
    if singleton::with_instance_lock(&paths.lock_file, || run_menu_bar(app_config, paths))?.is_some() {
        tracing::info!("Vigilo agent exiting");
    }
    Ok(())
}

#[cfg(target_os = "macos")]
fn run_menu_bar(app_config: &AppConfig, paths: &Paths) -> Result<()> {
    let power = vigilo::power::load()?;
    vigilo::app::run(power, app_config, paths)?;
    Ok(())
}

#[cfg(not(target_os = "macos"))]
fn run_menu_bar(_app_config: &AppConfig, _paths: &Paths) -> Result<()> {
    match vigilo::power::load()? {}
}
