//! Plugin protocol.
//!
//! A plugin attaches behavior to one or more phases. When a stack runs a
//! phase it calls [`Plugin::exec`] on each entry in order and looks at the
//! returned [`Control`] to decide whether to continue.
//!
//! ```
//! use tether_core::plugin::{self, Control};
//! use tether_core::phase;
//!
//! let tag = plugin::on_request(|ctx| {
//!     ctx.set("tagged", true);
//!     Control::Next
//! })
//! .on(phase::RESPONSE, |ctx| {
//!     if ctx.response.as_ref().is_some_and(|r| r.status.is_server_error()) {
//!         return Control::msg("upstream failed");
//!     }
//!     Control::Next
//! });
//! # let _ = tag;
//! ```

use crate::context::Context;
use crate::error::{Error, Result};
use crate::phase;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// What a handler wants the chain to do next.
#[derive(Debug)]
pub enum Control {
    /// Run the next handler of the phase.
    Next,
    /// End the phase chain successfully.
    Stop,
    /// End the phase chain and hand the error to the error phase.
    Error(Error),
}

impl Control {
    /// Fail with a plain message.
    pub fn msg(message: impl Into<String>) -> Self {
        Self::Error(Error::msg(message))
    }

    pub fn is_next(&self) -> bool {
        matches!(self, Self::Next)
    }
}

impl From<Result<()>> for Control {
    fn from(result: Result<()>) -> Self {
        match result {
            Ok(()) => Self::Next,
            Err(e) => Self::Error(e),
        }
    }
}

impl From<Error> for Control {
    fn from(error: Error) -> Self {
        Self::Error(error)
    }
}

/// Phase handler.
pub type Handler = Arc<dyn Fn(&mut Context) -> Control + Send + Sync>;

/// Runtime switches shared by plugins that support being toggled.
#[derive(Debug, Default)]
pub struct PluginState {
    disabled: AtomicBool,
    removed: AtomicBool,
}

impl PluginState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enable(&self) {
        self.disabled.store(false, Ordering::Release);
    }

    pub fn disable(&self) {
        self.disabled.store(true, Ordering::Release);
    }

    /// Mark for removal. The plugin is skipped from now on and dropped from
    /// its stack on the next flush.
    pub fn remove(&self) {
        self.removed.store(true, Ordering::Release);
    }

    pub fn is_enabled(&self) -> bool {
        !self.disabled.load(Ordering::Acquire)
    }

    pub fn is_removed(&self) -> bool {
        self.removed.load(Ordering::Acquire)
    }
}

/// Behavior attached to pipeline phases.
pub trait Plugin: Send + Sync {
    /// Run this plugin for `phase`. Plugins with nothing to do for the phase
    /// return [`Control::Next`].
    fn exec(&self, phase: &str, ctx: &mut Context) -> Control;

    /// Enable/remove switches, for plugins that support them.
    fn state(&self) -> Option<&PluginState> {
        None
    }

    /// Short name used in traces.
    fn name(&self) -> &str {
        "plugin"
    }
}

impl dyn Plugin {
    /// Check if the stack should run this plugin.
    pub fn is_active(&self) -> bool {
        self.state()
            .is_none_or(|state| state.is_enabled() && !state.is_removed())
    }

    pub fn is_removed(&self) -> bool {
        self.state().is_some_and(PluginState::is_removed)
    }
}

/// Plugin backed by a phase → handler map.
#[derive(Default)]
pub struct HandlerPlugin {
    handlers: HashMap<String, Handler>,
    state: PluginState,
    name: Option<String>,
}

impl HandlerPlugin {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` for `phase`, replacing any previous one.
    pub fn on<F>(mut self, phase: impl Into<String>, handler: F) -> Self
    where
        F: Fn(&mut Context) -> Control + Send + Sync + 'static,
    {
        self.handlers.insert(phase.into(), Arc::new(handler));
        self
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Check if a handler is registered for `phase`.
    pub fn handles(&self, phase: &str) -> bool {
        self.handlers.contains_key(phase)
    }

    pub fn enable(&self) {
        self.state.enable();
    }

    pub fn disable(&self) {
        self.state.disable();
    }

    pub fn remove(&self) {
        self.state.remove();
    }
}

impl Plugin for HandlerPlugin {
    fn exec(&self, phase: &str, ctx: &mut Context) -> Control {
        match self.handlers.get(phase) {
            Some(handler) => handler(ctx),
            None => Control::Next,
        }
    }

    fn state(&self) -> Option<&PluginState> {
        Some(&self.state)
    }

    fn name(&self) -> &str {
        self.name.as_deref().unwrap_or("handler")
    }
}

impl fmt::Debug for HandlerPlugin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut phases: Vec<_> = self.handlers.keys().collect();
        phases.sort();
        f.debug_struct("HandlerPlugin")
            .field("name", &self.name())
            .field("phases", &phases)
            .field("state", &self.state)
            .finish()
    }
}

/// Plugin with a single handler for `phase`.
pub fn on<F>(phase: impl Into<String>, handler: F) -> HandlerPlugin
where
    F: Fn(&mut Context) -> Control + Send + Sync + 'static,
{
    HandlerPlugin::new().on(phase, handler)
}

/// Plugin with a single handler for the request phase.
pub fn on_request<F>(handler: F) -> HandlerPlugin
where
    F: Fn(&mut Context) -> Control + Send + Sync + 'static,
{
    on(phase::REQUEST, handler)
}

/// Plugin with a single handler for the response phase.
pub fn on_response<F>(handler: F) -> HandlerPlugin
where
    F: Fn(&mut Context) -> Control + Send + Sync + 'static,
{
    on(phase::RESPONSE, handler)
}

/// Plugin with a single handler for the error phase.
pub fn on_error<F>(handler: F) -> HandlerPlugin
where
    F: Fn(&mut Context) -> Control + Send + Sync + 'static,
{
    on(phase::ERROR, handler)
}
