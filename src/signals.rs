//! Termination signals as quit requests.
//!
//! SIGTERM (launchctl stop, logout), SIGINT and SIGHUP are blocked for the
//! calling thread and every thread it spawns afterwards, then collected
//! synchronously by a dedicated thread with `sigwait`. The callback runs on
//! that thread, never in signal context.

use std::thread::JoinHandle;

use nix::sys::signal::{SigSet, Signal};

use crate::error::{Result, VigiloError};

pub const TERMINATION_SIGNALS: [Signal; 3] = [Signal::SIGTERM, Signal::SIGINT, Signal::SIGHUP];

/// Route termination signals to `on_signal`.
///
/// Must be called from the main thread before any other thread is started,
/// otherwise a signal can still land on a thread that does not block it.
pub fn forward_termination<F>(on_signal: F) -> Result<JoinHandle<()>>
where
    F: Fn(Signal) + Send + 'static,
{
    let mut set = SigSet::empty();
    for signal in TERMINATION_SIGNALS {
        set.add(signal);
    }
    set.thread_block()
        .map_err(|e| VigiloError::Signal(e.to_string()))?;

    std::thread::Builder::new()
        .name("vigilo-signals".to_string())
        .spawn(move || loop {
            match set.wait() {
                Ok(signal) => {
                    tracing::info!("Received {:?}", signal);
                    on_signal(signal);
                }
                Err(e) => {
                    tracing::warn!("sigwait failed: {}", e);
                    break;
                }
            }
        })
        .map_err(|e| VigiloError::Signal(e.to_string()))
}
