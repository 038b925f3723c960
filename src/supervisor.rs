//! Launcher / agent split.
//!
//! A plain `vigilo` invocation is the launcher: it starts a detached copy of
//! itself with `VIGILO_ROLE` set and exits. The copy sees the marker and runs
//! the agent. Since every spawned copy carries the marker, it can never spawn
//! again.

use std::ffi::OsStr;
use std::fs::OpenOptions;
use std::os::unix::process::CommandExt;
use std::path::Path;
use std::process::{Command, Stdio};

use crate::error::{Result, VigiloError};

/// Environment variable marking a process as the detached agent.
pub const ROLE_ENV: &str = "VIGILO_ROLE";
/// Value written into [`ROLE_ENV`] for spawned agents.
pub const AGENT_MARKER: &str = "agent";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// Initial invocation, only spawns the agent.
    Launcher,
    /// Long-lived menu bar agent.
    Agent,
}

impl Role {
    /// Decide the role from the marker value. Any value counts as the agent.
    pub fn from_marker(marker: Option<&OsStr>) -> Self {
        match marker {
            Some(_) => Role::Agent,
            None => Role::Launcher,
        }
    }

    /// Role of the current process, from its environment.
    pub fn detect() -> Self {
        Self::from_marker(std::env::var_os(ROLE_ENV).as_deref())
    }
}

/// Start `executable` as a detached agent and return its PID without waiting.
///
/// The child gets its own session, so it survives the launcher and any
/// terminal it was started from. Its stdout/stderr are appended to `log_path`
/// when given, otherwise discarded.
pub fn spawn_agent(executable: &Path, log_path: Option<&Path>) -> Result<u32> {
    let (stdout, stderr) = match log_path {
        Some(path) => {
            let log = open_log(path)?;
            let clone = log
                .try_clone()
                .map_err(|e| VigiloError::filesystem(path, e))?;
            (Stdio::from(log), Stdio::from(clone))
        }
        None => (Stdio::null(), Stdio::null()),
    };

    let mut command = Command::new(executable);
    command
        .env(ROLE_ENV, AGENT_MARKER)
        .stdin(Stdio::null())
        .stdout(stdout)
        .stderr(stderr);

    // SAFETY: setsid is async-signal-safe and touches no parent state.
    unsafe {
        command.pre_exec(|| nix::unistd::setsid().map(|_| ()).map_err(std::io::Error::from));
    }

    let child = command.spawn().map_err(VigiloError::Spawn)?;
    let pid = child.id();
    tracing::info!("Spawned agent {} (PID: {})", executable.display(), pid);

    // Dropping the handle does not wait on or kill the child
    drop(child);
    Ok(pid)
}

fn open_log(path: &Path) -> Result<std::fs::File> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| VigiloError::filesystem(parent, e))?;
    }
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| VigiloError::filesystem(path, e))
}
