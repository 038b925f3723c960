//! Agent event loop.
//!
//! winit owns the main thread and the NSApplication run loop; the status
//! item is built once the loop is running. Menu clicks and termination
//! signals arrive from other threads as user events, so the dispatcher
//! only ever runs here.

use nix::sys::signal::Signal;
use parking_lot::Mutex;
use tray_icon::menu::{MenuEvent, MenuId};
use winit::event::{Event, StartCause};
use winit::event_loop::{ControlFlow, EventLoopBuilder};
use winit::platform::macos::{ActivationPolicy, EventLoopBuilderExtMacOS};

use crate::assertion::AssertionManager;
use crate::config::{AppConfig, Paths};
use crate::dispatcher::{Dispatcher, Flow, Intent};
use crate::error::{Result, VigiloError};
use crate::power::PowerApi;
use crate::signals;
use crate::startup::{Launchctl, LoginRegistrar};
use crate::tray::TrayManager;

/// Events injected into the winit loop.
#[derive(Debug, Clone)]
pub enum AgentEvent {
    Menu(MenuId),
    Terminate(Signal),
}

/// Run the menu bar agent until the user quits or a termination signal arrives.
pub fn run<P: PowerApi>(power: P, config: &AppConfig, paths: &Paths) -> Result<()> {
    let mut builder = EventLoopBuilder::<AgentEvent>::with_user_event();
    // No Dock icon, no app menu
    builder.with_activation_policy(ActivationPolicy::Accessory);
    let event_loop = builder
        .build()
        .map_err(|e| VigiloError::Tray(format!("Failed to create event loop: {}", e)))?;

    let signal_proxy = event_loop.create_proxy();
    signals::forward_termination(move |signal| {
        let _ = signal_proxy.send_event(AgentEvent::Terminate(signal));
    })?;

    let menu_proxy = Mutex::new(event_loop.create_proxy());
    MenuEvent::set_event_handler(Some(move |event: MenuEvent| {
        tracing::debug!("Menu event: {:?}", event);
        let _ = menu_proxy.lock().send_event(AgentEvent::Menu(event.id));
    }));

    let registrar = LoginRegistrar::for_current_exe(&paths.launch_agent, &paths.log_file)?;
    let mut pending = Some((AssertionManager::new(power), registrar));
    let mut dispatcher: Option<Dispatcher<P, Launchctl, TrayManager>> = None;
    let mut failure: Option<VigiloError> = None;

    tracing::info!("Event handlers set, entering event loop");

    event_loop
        .run(|event, elwt| {
            elwt.set_control_flow(ControlFlow::Wait);

            match event {
                Event::NewEvents(StartCause::Init) => {
                    let Some((assertions, registrar)) = pending.take() else {
                        return;
                    };
                    match TrayManager::new() {
                        Ok(tray) => {
                            let mut agent = Dispatcher::new(assertions, registrar, tray)
                                .with_enable_on_launch(config.enable_on_launch);
                            agent.start();
                            dispatcher = Some(agent);
                        }
                        Err(e) => {
                            failure = Some(e);
                            elwt.exit();
                        }
                    }
                }

                Event::UserEvent(AgentEvent::Menu(id)) => {
                    let Some(agent) = dispatcher.as_mut() else {
                        return;
                    };
                    let Some(intent) = agent.view().intent_for(&id) else {
                        tracing::debug!("Ignoring unknown menu item {:?}", id);
                        return;
                    };
                    if agent.handle(intent) == Flow::Quit {
                        elwt.exit();
                    }
                }

                Event::UserEvent(AgentEvent::Terminate(signal)) => {
                    tracing::info!("Terminating on {:?}", signal);
                    if let Some(agent) = dispatcher.as_mut() {
                        agent.handle(Intent::Quit);
                    }
                    elwt.exit();
                }

                Event::LoopExiting => {
                    if let Some(agent) = dispatcher.as_mut() {
                        agent.shutdown();
                    }
                }

                _ => {}
            }
        })
        .map_err(|e| VigiloError::Tray(format!("Event loop failed: {}", e)))?;

    MenuEvent::set_event_handler(None::<fn(MenuEvent)>);

    match failure {
        Some(e) => Err(e),
        None => Ok(()),
    }
}
