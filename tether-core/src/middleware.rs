//! Ordered plugin stacks.
//!
//! A [`Middleware`] runs its plugins for a phase in declaration order. A
//! stack may have a parent whose plugins run first, which is how client-wide
//! plugins compose with per-request ones.

use crate::context::Context;
use crate::phase::{self, PHASE_KEY};
use crate::plugin::{self, Control, Plugin};
use std::fmt;
use std::sync::Arc;
use tracing::trace;

/// How a phase run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Every handler continued.
    Completed,
    /// A handler stopped the chain.
    Stopped,
    /// A handler raised an error, now stored on the context.
    Failed,
}

/// Ordered stack of plugins with an optional parent.
///
/// Cloning copies the entry list, so adding to a clone never affects the
/// original. The parent is shared.
#[derive(Clone, Default)]
pub struct Middleware {
    stack: Vec<Arc<dyn Plugin>>,
    parent: Option<Arc<Middleware>>,
}

impl Middleware {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty stack inheriting from `parent`.
    pub fn with_parent(parent: Arc<Middleware>) -> Self {
        Self {
            stack: Vec::new(),
            parent: Some(parent),
        }
    }

    /// Append a plugin.
    pub fn use_plugin<P: Plugin + 'static>(&mut self, plugin: P) -> &mut Self {
        self.stack.push(Arc::new(plugin));
        self
    }

    /// Append a shared plugin, keeping a handle to toggle it later.
    pub fn use_shared(&mut self, plugin: Arc<dyn Plugin>) -> &mut Self {
        self.stack.push(plugin);
        self
    }

    pub fn use_handler<F>(&mut self, phase: impl Into<String>, handler: F) -> &mut Self
    where
        F: Fn(&mut Context) -> Control + Send + Sync + 'static,
    {
        self.use_plugin(plugin::on(phase, handler))
    }

    pub fn use_request<F>(&mut self, handler: F) -> &mut Self
    where
        F: Fn(&mut Context) -> Control + Send + Sync + 'static,
    {
        self.use_handler(phase::REQUEST, handler)
    }

    pub fn use_response<F>(&mut self, handler: F) -> &mut Self
    where
        F: Fn(&mut Context) -> Control + Send + Sync + 'static,
    {
        self.use_handler(phase::RESPONSE, handler)
    }

    pub fn use_error<F>(&mut self, handler: F) -> &mut Self
    where
        F: Fn(&mut Context) -> Control + Send + Sync + 'static,
    {
        self.use_handler(phase::ERROR, handler)
    }

    pub fn use_parent(&mut self, parent: Arc<Middleware>) -> &mut Self {
        self.parent = Some(parent);
        self
    }

    pub fn parent(&self) -> Option<&Arc<Middleware>> {
        self.parent.as_ref()
    }

    /// Resolved entries: the parent's, then this stack's own.
    pub fn stack(&self) -> Vec<Arc<dyn Plugin>> {
        let mut resolved = self
            .parent
            .as_ref()
            .map(|parent| parent.stack())
            .unwrap_or_default();
        resolved.extend(self.stack.iter().cloned());
        resolved
    }

    /// Drop plugins marked as removed. Returns how many were dropped.
    pub fn flush(&mut self) -> usize {
        let before = self.stack.len();
        self.stack.retain(|plugin| !plugin.is_removed());
        before - self.stack.len()
    }

    /// Number of local entries.
    pub fn len(&self) -> usize {
        self.stack.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stack.is_empty()
    }

    /// Run every active plugin for `phase` and record the phase on the
    /// context. An error raised by a handler is stored in `ctx.error`.
    pub fn run(&self, phase: &str, ctx: &mut Context) -> Outcome {
        ctx.set(PHASE_KEY, phase.to_string());
        match self.exec_chain(phase, ctx) {
            Control::Next => Outcome::Completed,
            Control::Stop => {
                trace!(phase, "Phase stopped");
                Outcome::Stopped
            }
            Control::Error(error) => {
                trace!(phase, error = %error, "Phase failed");
                ctx.set_error(error);
                Outcome::Failed
            }
        }
    }

    fn exec_chain(&self, phase: &str, ctx: &mut Context) -> Control {
        if let Some(parent) = &self.parent {
            match parent.exec_chain(phase, ctx) {
                Control::Next => {}
                control => return control,
            }
        }
        for plugin in &self.stack {
            if !plugin.is_active() {
                trace!(phase, plugin = plugin.name(), "Skipping inactive plugin");
                continue;
            }
            match plugin.exec(phase, ctx) {
                Control::Next => {}
                control => return control,
            }
        }
        Control::Next
    }
}

impl Plugin for Middleware {
    fn exec(&self, phase: &str, ctx: &mut Context) -> Control {
        self.exec_chain(phase, ctx)
    }

    fn name(&self) -> &str {
        "middleware"
    }
}

impl fmt::Debug for Middleware {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<_> = self.stack.iter().map(|p| p.name().to_string()).collect();
        f.debug_struct("Middleware")
            .field("stack", &names)
            .field("parent", &self.parent)
            .finish()
    }
}
