//! Vigilo Library
//!
//! Keeps the Mac awake from the menu bar.
//!
//! Architecture:
//! - `supervisor` splits the launcher from the detached agent
//! - `singleton` makes sure only one agent runs
//! - `dispatcher` applies menu intents to `assertion` and `startup`
//! - `app` and `tray` own the macOS event loop and status item

#[cfg(not(unix))]
compile_error!("vigilo only supports Unix-like systems");

pub mod assertion;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod logging;
pub mod power;
pub mod signals;
pub mod singleton;
pub mod startup;
pub mod supervisor;

#[cfg(target_os = "macos")]
pub mod app;
#[cfg(target_os = "macos")]
pub mod tray;

pub use error::{Result, VigiloError};
