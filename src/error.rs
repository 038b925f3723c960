//! Errors shared by every Vigilo component.

use std::path::PathBuf;
use thiserror::Error;

use crate::power::{AssertionId, AssertionKind};

/// Exit code for any failure without a dedicated code.
pub const EXIT_FAILURE: u8 = 1;
/// Exit code when the power-management capability cannot be loaded.
pub const EXIT_POWER_UNAVAILABLE: u8 = 2;
/// Exit code when the singleton lock fails for a reason other than contention.
pub const EXIT_LOCK_FAILED: u8 = 3;

/// Errors that can occur while running the agent.
#[derive(Debug, Error)]
pub enum VigiloError {
    /// IOKit could not be opened or a symbol could not be resolved.
    #[error("Power management unavailable: {0}")]
    ResourceUnavailable(String),

    /// The lock file could not be opened or locked.
    ///
    /// Contention with a live instance is not reported through this variant.
    #[error("Failed to lock {path}: {source}")]
    Lock {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Reading or writing a file owned by the agent failed.
    #[error("Filesystem error at {path}: {source}")]
    Filesystem {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The detached agent process could not be started.
    #[error("Failed to spawn agent process: {0}")]
    Spawn(#[source] std::io::Error),

    /// The power API refused to create an assertion.
    #[error("Failed to create {kind} assertion (IOReturn {code:#x})")]
    Power { kind: AssertionKind, code: i32 },

    /// The power API refused to release an assertion.
    #[error("Failed to release assertion {id} (IOReturn {code:#x})")]
    Release { id: AssertionId, code: i32 },

    /// launchctl could not be run or reported an error.
    #[error("Service manager error: {0}")]
    ServiceManager(String),

    /// Termination signals could not be routed to the event loop.
    #[error("Failed to set up signal handling: {0}")]
    Signal(String),

    /// Menu bar icon, menu or event loop construction failed.
    #[error("Tray error: {0}")]
    Tray(String),
}

impl VigiloError {
    /// Helper for wrapping an I/O error with the path it concerns.
    pub fn filesystem(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Filesystem {
            path: path.into(),
            source,
        }
    }

    /// Process exit code this error maps to.
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::ResourceUnavailable(_) => EXIT_POWER_UNAVAILABLE,
            Self::Lock { .. } => EXIT_LOCK_FAILED,
            _ => EXIT_FAILURE,
        }
    }
}

pub type Result<T> = std::result::Result<T, VigiloError>;
