/// Assertion lifecycle for the display-sleep / system-sleep pair.
///
/// The manager holds either both assertions or neither. A failed
/// `enable` releases whatever it managed to create and stays disabled,
/// so the menu bar never shows "ON" while the Mac is free to sleep.
use crate::error::Result;
use crate::power::{AssertionId, AssertionKind, PowerApi};

/// Whether Vigilo is currently keeping the Mac awake.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssertionState {
    Disabled,
    Enabled,
}

impl AssertionState {
    /// Short status title for the menu bar.
    pub fn title(self) -> &'static str {
        match self {
            Self::Enabled => "ON",
            Self::Disabled => "OFF",
        }
    }
}

/// The two live assertion handles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeldAssertions {
    pub display: AssertionId,
    pub system: AssertionId,
}

/// Owns the assertion handles and the only code path that changes them.
pub struct AssertionManager<P: PowerApi> {
    power: P,
    held: Option<HeldAssertions>,
}

impl<P: PowerApi> AssertionManager<P> {
    /// Create a manager in the `Disabled` state.
    pub fn new(power: P) -> Self {
        Self { power, held: None }
    }

    pub fn state(&self) -> AssertionState {
        if self.held.is_some() {
            AssertionState::Enabled
        } else {
            AssertionState::Disabled
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.held.is_some()
    }

    /// Currently held handles, if enabled.
    pub fn held(&self) -> Option<HeldAssertions> {
        self.held
    }

    /// Acquire both assertions. No-op when already enabled.
    pub fn enable(&mut self) -> Result<()> {
        if self.held.is_some() {
            tracing::debug!("Assertions already held, enable ignored");
            return Ok(());
        }

        let display_id = self.create(AssertionKind::PreventUserIdleDisplaySleep)?;
        let system_id = match self.create(AssertionKind::PreventUserIdleSystemSleep) {
            Ok(id) => id,
            Err(e) => {
                // Roll back so we never hold just one of the pair
                if let Err(release_err) = self.power.release_assertion(display_id) {
                    tracing::warn!("Rollback of display assertion failed: {}", release_err);
                }
                return Err(e);
            }
        };

        self.held = Some(HeldAssertions {
            display: display_id,
            system: system_id,
        });
        tracing::info!(
            "Sleep prevention enabled (display assertion {}, system assertion {})",
            display_id,
            system_id
        );
        Ok(())
    }

    /// Release both assertions. No-op when already disabled.
    ///
    /// The handles are dropped before release, so the state is `Disabled`
    /// afterwards even when the OS reports a failure. The first failure is
    /// returned.
    pub fn disable(&mut self) -> Result<()> {
        let Some(held) = self.held.take() else {
            tracing::debug!("No assertions held, disable ignored");
            return Ok(());
        };

        let mut first_error = None;
        for id in [held.display, held.system] {
            if let Err(e) = self.power.release_assertion(id) {
                tracing::warn!("{}", e);
                first_error.get_or_insert(e);
            }
        }

        tracing::info!("Sleep prevention disabled");
        first_error.map_or(Ok(()), Err)
    }

    /// Flip the state and return the new one.
    pub fn toggle(&mut self) -> Result<AssertionState> {
        if self.is_enabled() {
            self.disable()?;
        } else {
            self.enable()?;
        }
        Ok(self.state())
    }

    fn create(&mut self, kind: AssertionKind) -> Result<AssertionId> {
        self.power
            .create_assertion(kind, kind.label())
            .inspect_err(|e| tracing::error!("{}", e))
    }
}

impl<P: PowerApi> Drop for AssertionManager<P> {
    fn drop(&mut self) {
        if self.held.is_some() {
            if let Err(e) = self.disable() {
                tracing::warn!("Failed to release assertions on drop: {}", e);
            }
        }
    }
}
