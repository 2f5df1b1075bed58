//! Phase orchestration for a single request.
//!
//! Phases run in a fixed order: `request`, `before dial`, the network round
//! trip, then `response`. Whenever a phase leaves an error on the context the
//! `error` phase runs once. If it clears the error, dispatch carries on with
//! the next step. Otherwise dispatch ends there.
//!
//! A handler can answer a request without touching the network by attaching
//! a response during `request` or `before dial`. The dispatcher then skips
//! every remaining phase, the round trip included.

use crate::context::Context;
use crate::error::{Error, Result};
use crate::message::HttpResponse;
use crate::middleware::Middleware;
use crate::phase;
use tracing::{debug, trace};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Continue,
    Done,
}

/// Run a phase, then the error phase if it left an error behind.
fn run_phase(middleware: &Middleware, phase: &str, ctx: &mut Context) -> Flow {
    middleware.run(phase, ctx);
    recover(middleware, ctx)
}

fn recover(middleware: &Middleware, ctx: &mut Context) -> Flow {
    let Some(error) = &ctx.error else {
        return Flow::Continue;
    };
    debug!(error = %error, "Running error phase");
    middleware.run(phase::ERROR, ctx);
    if ctx.has_error() {
        Flow::Done
    } else {
        trace!("Error cleared by error phase");
        Flow::Continue
    }
}

fn run_until_dial(middleware: &Middleware, ctx: &mut Context) -> Flow {
    for phase in [phase::REQUEST, phase::BEFORE_DIAL] {
        if run_phase(middleware, phase, ctx) == Flow::Done {
            return Flow::Done;
        }
        if ctx.response.is_some() {
            debug!(phase, "Response attached before dial, skipping network call");
            return Flow::Done;
        }
    }
    Flow::Continue
}

fn finish(ctx: &Context) -> Result<HttpResponse> {
    if let Some(error) = &ctx.error {
        return Err(error.clone());
    }
    ctx.response.clone().ok_or(Error::NoResponse)
}

/// Drive `ctx` through every phase of `middleware` and the network call.
///
/// Returns the final response, or the error left on the context. The
/// context keeps the full outcome for inspection afterwards.
///
/// Decorators installed during `before dial` never outlive the dispatch,
/// including when the round trip is skipped.
pub async fn dispatch(middleware: &Middleware, ctx: &mut Context) -> Result<HttpResponse> {
    debug!(method = %ctx.request.method, uri = %ctx.request.uri, "Dispatching request");
    let result = drive(middleware, ctx).await;
    ctx.transport_handle().restore();
    result
}

async fn drive(middleware: &Middleware, ctx: &mut Context) -> Result<HttpResponse> {
    if run_until_dial(middleware, ctx) == Flow::Done {
        return finish(ctx);
    }

    let transport = ctx.transport();
    match transport.round_trip(ctx.request.clone()).await {
        Ok(response) => {
            trace!(status = %response.status, "Round trip completed");
            ctx.set_response(response);
        }
        Err(error) => {
            debug!(error = %error, "Round trip failed");
            ctx.set_error(error);
            if recover(middleware, ctx) == Flow::Done {
                return finish(ctx);
            }
        }
    }

    if ctx.response.is_some() {
        run_phase(middleware, phase::RESPONSE, ctx);
    }
    finish(ctx)
}

/// Run only the `request` and `before dial` phases.
///
/// Used to see the request exactly as it would go on the wire. Fails with
/// the error left on the context, if any.
pub fn dispatch_until_dial(middleware: &Middleware, ctx: &mut Context) -> Result<()> {
    run_until_dial(middleware, ctx);
    match &ctx.error {
        Some(error) => Err(error.clone()),
        None => Ok(()),
    }
}
