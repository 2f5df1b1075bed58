//! Transport selection plugin.

use std::sync::Arc;
use tether_core::plugin::on_request;
use tether_core::{Control, HandlerPlugin, Transport};

/// Use `transport` for the round trip.
///
/// Runs in the `request` phase so `before dial` decorators wrap it.
pub fn set(transport: Arc<dyn Transport>) -> HandlerPlugin {
    on_request(move |ctx| {
        ctx.set_transport(transport.clone());
        Control::Next
    })
    .named("transport")
}
