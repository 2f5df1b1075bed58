//! Conditional plugin stacks.
//!
//! A [`Mux`] holds matchers and a nested [`Middleware`]. When its containing
//! stack runs a phase, the mux checks every matcher against the context and
//! runs the nested stack for that same phase only if all of them pass.
//!
//! ```
//! use tether_core::mux::{Mux, matchers};
//! use tether_core::plugin::Control;
//!
//! let mut only_api = Mux::when([matchers::path_prefix("/api"), matchers::method("POST")]);
//! only_api.use_request(|ctx| {
//!     ctx.set("api", true);
//!     Control::Next
//! });
//! ```

use crate::context::Context;
use crate::middleware::{Middleware, Outcome};
use crate::plugin::{Control, Plugin, PluginState};
use std::fmt;
use std::sync::Arc;

/// Context predicate. Must not mutate anything.
pub type Matcher = Arc<dyn Fn(&Context) -> bool + Send + Sync>;

/// Matchers combined with AND, gating a nested stack.
#[derive(Default)]
pub struct Mux {
    matchers: Vec<Matcher>,
    middleware: Middleware,
    state: PluginState,
}

impl Mux {
    /// Create a mux without matchers. It always runs its stack.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a mux gated by all of `matchers`.
    pub fn when<I>(matchers: I) -> Self
    where
        I: IntoIterator<Item = Matcher>,
    {
        Self {
            matchers: matchers.into_iter().collect(),
            ..Self::default()
        }
    }

    pub fn add_matcher(&mut self, matcher: Matcher) -> &mut Self {
        self.matchers.push(matcher);
        self
    }

    /// Check every matcher against the context.
    pub fn matches(&self, ctx: &Context) -> bool {
        self.matchers.iter().all(|matcher| matcher(ctx))
    }

    pub fn use_plugin<P: Plugin + 'static>(&mut self, plugin: P) -> &mut Self {
        self.middleware.use_plugin(plugin);
        self
    }

    pub fn use_shared(&mut self, plugin: Arc<dyn Plugin>) -> &mut Self {
        self.middleware.use_shared(plugin);
        self
    }

    pub fn use_handler<F>(&mut self, phase: impl Into<String>, handler: F) -> &mut Self
    where
        F: Fn(&mut Context) -> Control + Send + Sync + 'static,
    {
        self.middleware.use_handler(phase, handler);
        self
    }

    pub fn use_request<F>(&mut self, handler: F) -> &mut Self
    where
        F: Fn(&mut Context) -> Control + Send + Sync + 'static,
    {
        self.middleware.use_request(handler);
        self
    }

    pub fn use_response<F>(&mut self, handler: F) -> &mut Self
    where
        F: Fn(&mut Context) -> Control + Send + Sync + 'static,
    {
        self.middleware.use_response(handler);
        self
    }

    pub fn use_error<F>(&mut self, handler: F) -> &mut Self
    where
        F: Fn(&mut Context) -> Control + Send + Sync + 'static,
    {
        self.middleware.use_error(handler);
        self
    }

    /// Run the nested stack directly if the matchers pass.
    pub fn run(&self, phase: &str, ctx: &mut Context) -> Outcome {
        if !self.matches(ctx) {
            return Outcome::Completed;
        }
        self.middleware.run(phase, ctx)
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

impl Plugin for Mux {
    fn exec(&self, phase: &str, ctx: &mut Context) -> Control {
        if !self.matches(ctx) {
            return Control::Next;
        }
        self.middleware.exec(phase, ctx)
    }

    fn state(&self) -> Option<&PluginState> {
        Some(&self.state)
    }

    fn name(&self) -> &str {
        "mux"
    }
}

impl fmt::Debug for Mux {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Mux")
            .field("matchers", &self.matchers.len())
            .field("middleware", &self.middleware)
            .finish()
    }
}

/// Built-in matchers.
pub mod matchers {
    use super::Matcher;
    use crate::context::Context;
    use http::{Method, StatusCode};
    use std::sync::Arc;

    /// Wrap any predicate.
    pub fn custom<F>(predicate: F) -> Matcher
    where
        F: Fn(&Context) -> bool + Send + Sync + 'static,
    {
        Arc::new(predicate)
    }

    /// Request method, case-insensitive.
    pub fn method(method: &str) -> Matcher {
        let method = method.to_ascii_uppercase();
        custom(move |ctx| ctx.request.method.as_str() == method)
    }

    /// Request host (with port, if any), case-insensitive.
    pub fn host(host: &str) -> Matcher {
        let host = host.to_ascii_lowercase();
        custom(move |ctx| {
            ctx.request
                .host()
                .is_some_and(|h| h.eq_ignore_ascii_case(&host))
        })
    }

    /// Exact request path.
    pub fn path(path: &str) -> Matcher {
        let path = path.to_string();
        custom(move |ctx| ctx.request.path() == path)
    }

    pub fn path_prefix(prefix: &str) -> Matcher {
        let prefix = prefix.to_string();
        custom(move |ctx| ctx.request.path().starts_with(&prefix))
    }

    /// Request header equal to `value`.
    pub fn header(name: &str, value: &str) -> Matcher {
        let name = name.to_string();
        let value = value.to_string();
        custom(move |ctx| {
            ctx.request
                .headers
                .get_all(name.as_str())
                .iter()
                .any(|v| v.as_bytes() == value.as_bytes())
        })
    }

    /// Query parameter equal to `value`.
    pub fn query(key: &str, value: &str) -> Matcher {
        let key = key.to_string();
        let value = value.to_string();
        custom(move |ctx| {
            ctx.request
                .query_pairs()
                .iter()
                .any(|(k, v)| *k == key && *v == value)
        })
    }

    /// Phase currently being run.
    pub fn phase(phase: &str) -> Matcher {
        let phase = phase.to_string();
        custom(move |ctx| ctx.phase().as_deref() == Some(phase.as_str()))
    }

    /// Response status equal to `status`. False before a response exists.
    pub fn status(status: u16) -> Matcher {
        custom(move |ctx| {
            ctx.response
                .as_ref()
                .is_some_and(|res| res.status.as_u16() == status)
        })
    }

    /// Response status within `start..=end`.
    pub fn status_range(start: u16, end: u16) -> Matcher {
        custom(move |ctx| {
            ctx.response
                .as_ref()
                .is_some_and(|res| (start..=end).contains(&res.status.as_u16()))
        })
    }

    pub fn server_error() -> Matcher {
        custom(|ctx| {
            ctx.response
                .as_ref()
                .is_some_and(|res| res.status.is_server_error())
        })
    }

    pub fn has_error() -> Matcher {
        custom(Context::has_error)
    }

    /// Passes if any of `matchers` passes.
    pub fn any<I>(matchers: I) -> Matcher
    where
        I: IntoIterator<Item = Matcher>,
    {
        let matchers: Vec<Matcher> = matchers.into_iter().collect();
        custom(move |ctx| matchers.iter().any(|m| m(ctx)))
    }

    pub fn not(matcher: Matcher) -> Matcher {
        custom(move |ctx| !matcher(ctx))
    }

    /// Shorthand for matching a method constant.
    pub fn method_is(method: Method) -> Matcher {
        custom(move |ctx| ctx.request.method == method)
    }

    /// Shorthand for matching a status constant.
    pub fn status_is(status: StatusCode) -> Matcher {
        self::status(status.as_u16())
    }
}
