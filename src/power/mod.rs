//! Power-management capability.
//!
//! The rest of the crate only talks to the OS through [`PowerApi`]:
//! - [`IoKitPower`] resolves IOKit at runtime (macOS only)
//! - an in-memory fake backs the unit tests

#[cfg(test)]
pub(crate) mod fake;
#[cfg(target_os = "macos")]
mod iokit;

#[cfg(target_os = "macos")]
pub use iokit::IoKitPower;

use std::fmt;
use std::num::NonZeroU32;

use crate::error::Result;

/// Kind of sleep an assertion prevents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AssertionKind {
    PreventUserIdleDisplaySleep,
    PreventUserIdleSystemSleep,
}

impl AssertionKind {
    /// Both kinds, in the order they are acquired.
    pub const ALL: [AssertionKind; 2] = [
        AssertionKind::PreventUserIdleDisplaySleep,
        AssertionKind::PreventUserIdleSystemSleep,
    ];

    /// IOKit assertion type string.
    pub fn type_name(self) -> &'static str {
        match self {
            Self::PreventUserIdleDisplaySleep => "PreventUserIdleDisplaySleep",
            Self::PreventUserIdleSystemSleep => "PreventUserIdleSystemSleep",
        }
    }

    /// Human readable name shown by `pmset -g assertions`.
    pub fn label(self) -> &'static str {
        match self {
            Self::PreventUserIdleDisplaySleep => "Vigilo - Preventing Display Sleep",
            Self::PreventUserIdleSystemSleep => "Vigilo - Preventing System Sleep",
        }
    }
}

impl fmt::Display for AssertionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.type_name())
    }
}

/// Handle returned by the OS for a live assertion. Never zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AssertionId(NonZeroU32);

impl AssertionId {
    /// Wraps a raw id, rejecting the zero value IOKit uses for "no assertion".
    pub fn new(raw: u32) -> Option<Self> {
        NonZeroU32::new(raw).map(Self)
    }

    pub fn get(self) -> u32 {
        self.0.get()
    }
}

impl fmt::Display for AssertionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The two operations Vigilo needs from the OS power manager.
pub trait PowerApi {
    /// Create a named assertion of the given kind.
    fn create_assertion(&mut self, kind: AssertionKind, label: &str) -> Result<AssertionId>;

    /// Release an assertion previously returned by `create_assertion`.
    fn release_assertion(&mut self, id: AssertionId) -> Result<()>;
}

/// Load the platform power backend.
#[cfg(target_os = "macos")]
pub fn load() -> Result<IoKitPower> {
    IoKitPower::load()
}

/// Load the platform power backend.
#[cfg(not(target_os = "macos"))]
pub fn load() -> Result<std::convert::Infallible> {
    Err(crate::error::VigiloError::ResourceUnavailable(
        "IOKit power assertions are only available on macOS".to_string(),
    ))
}
