//! tracing subscriber setup.

use std::io::IsTerminal;

use tracing_subscriber::EnvFilter;

/// Pick the filter directive: `--verbose`, then `RUST_LOG`, then config.
fn filter_directive(verbose: bool, env: Option<&str>, configured: &str) -> String {
    if verbose {
        return "debug".to_string();
    }
    match env {
        Some(directive) if !directive.trim().is_empty() => directive.to_string(),
        _ => configured.to_string(),
    }
}

/// Install the global fmt subscriber on stderr.
///
/// The detached agent's stderr is the log file, so colours are only used
/// when stderr is a terminal.
pub fn init(configured_filter: &str, verbose: bool) {
    let env = std::env::var(EnvFilter::DEFAULT_ENV).ok();
    let directive = filter_directive(verbose, env.as_deref(), configured_filter);
    let filter = EnvFilter::try_new(&directive).unwrap_or_else(|_| EnvFilter::new("info"));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(std::io::stderr().is_terminal())
        .try_init();
}
