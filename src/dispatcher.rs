//! Menu intent dispatcher.
//!
//! Runs on the event-loop thread and is the only code that touches the
//! assertion manager or the login registrar, so neither needs locking.
//! Every intent is handled to completion before the next one is read.

use crate::assertion::{AssertionManager, AssertionState};
use crate::power::PowerApi;
use crate::startup::{LoginRegistrar, ServiceManager, StartupRegistration};

/// Discrete user actions coming from the menu bar.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intent {
    ToggleAssertion,
    ToggleStartup,
    Quit,
}

/// What the event loop should do after an intent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
}

/// Something that can display the agent's state (the menu bar item).
pub trait StatusView {
    /// Icon, title and toggle label for the assertion state.
    fn show_assertion_state(&mut self, state: AssertionState);

    /// Checkmark on the start-on-login item.
    fn show_startup(&mut self, registration: StartupRegistration);
}

/// Label of the toggle menu item: the action it will perform.
pub fn toggle_label(state: AssertionState) -> &'static str {
    match state {
        AssertionState::Enabled => "Disable",
        AssertionState::Disabled => "Enable",
    }
}

/// Label of the start-on-login menu item.
pub fn startup_label(registration: StartupRegistration) -> &'static str {
    match registration {
        StartupRegistration::Registered => "✓ Start on Startup",
        StartupRegistration::Unregistered => "Start on Startup",
    }
}

pub struct Dispatcher<P: PowerApi, S: ServiceManager, V: StatusView> {
    assertions: AssertionManager<P>,
    registrar: LoginRegistrar<S>,
    view: V,
    enable_on_launch: bool,
}

impl<P: PowerApi, S: ServiceManager, V: StatusView> Dispatcher<P, S, V> {
    pub fn new(assertions: AssertionManager<P>, registrar: LoginRegistrar<S>, view: V) -> Self {
        Self {
            assertions,
            registrar,
            view,
            enable_on_launch: true,
        }
    }

    pub fn with_enable_on_launch(mut self, enable: bool) -> Self {
        self.enable_on_launch = enable;
        self
    }

    /// Initial state: enable (unless configured otherwise) and paint the view.
    pub fn start(&mut self) {
        if self.enable_on_launch {
            if let Err(e) = self.assertions.enable() {
                tracing::error!("Could not enable sleep prevention at launch: {}", e);
            }
        }
        self.view.show_assertion_state(self.assertions.state());
        self.view.show_startup(self.registrar.registration());
    }

    /// Handle a single intent.
    pub fn handle(&mut self, intent: Intent) -> Flow {
        tracing::debug!("Handling {:?}", intent);
        match intent {
            Intent::ToggleAssertion => {
                if let Err(e) = self.assertions.toggle() {
                    tracing::error!("Toggling sleep prevention failed: {}", e);
                }
                // Show what is actually held, not what was requested
                self.view.show_assertion_state(self.assertions.state());
                Flow::Continue
            }
            Intent::ToggleStartup => {
                match self.registrar.toggle() {
                    Ok(registration) => {
                        tracing::info!("Start on login: {:?}", registration);
                    }
                    Err(e) => tracing::error!("Toggling start on login failed: {}", e),
                }
                self.view.show_startup(self.registrar.registration());
                Flow::Continue
            }
            Intent::Quit => {
                tracing::info!("Quit requested");
                Flow::Quit
            }
        }
    }

    /// Consume intents until `Quit` or the end of the stream, then shut down.
    pub fn run<I: IntoIterator<Item = Intent>>(&mut self, intents: I) {
        for intent in intents {
            if self.handle(intent) == Flow::Quit {
                break;
            }
        }
        self.shutdown();
    }

    /// Release everything held. Safe to call more than once.
    pub fn shutdown(&mut self) {
        if let Err(e) = self.assertions.disable() {
            tracing::warn!("Releasing assertions on exit: {}", e);
        }
        tracing::info!("Dispatcher shut down");
    }

    pub fn assertions(&self) -> &AssertionManager<P> {
        &self.assertions
    }

    pub fn registrar(&self) -> &LoginRegistrar<S> {
        &self.registrar
    }

    pub fn view(&self) -> &V {
        &self.view
    }
}
