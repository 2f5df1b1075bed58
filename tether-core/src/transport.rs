//! Transport seam and the swappable transport slot held by a context.
//!
//! A [`Transport`] performs one network round trip. Decorators (retry,
//! redirect) wrap the current transport through
//! [`TransportHandle::decorate`] and hold a [`RestoreGuard`] while they run,
//! so once the decorated call finishes the context is back on the transport
//! it had before any decoration, even if the call failed or was cancelled.

use crate::error::{Error, Result};
use crate::message::{HttpRequest, HttpResponse};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;
use tracing::trace;

/// Performs a single request/response exchange.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send the request and return the response.
    async fn round_trip(&self, request: HttpRequest) -> Result<HttpResponse>;
}

/// Placeholder transport for contexts created without one.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoTransport;

#[async_trait]
impl Transport for NoTransport {
    async fn round_trip(&self, _request: HttpRequest) -> Result<HttpResponse> {
        Err(Error::NoTransport)
    }
}

struct Slot {
    current: Arc<dyn Transport>,
    pristine: Option<Arc<dyn Transport>>,
}

/// Shared, swappable transport reference.
///
/// Clones of a handle point at the same slot. Use [`TransportHandle::detached`]
/// to get an independent slot starting from the undecorated transport.
#[derive(Clone)]
pub struct TransportHandle {
    slot: Arc<Mutex<Slot>>,
}

impl TransportHandle {
    /// Create a handle over the given transport.
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            slot: Arc::new(Mutex::new(Slot {
                current: transport,
                pristine: None,
            })),
        }
    }

    /// Current transport, including any installed decorators.
    pub fn get(&self) -> Arc<dyn Transport> {
        self.slot.lock().current.clone()
    }

    /// Replace the transport outright.
    pub fn set(&self, transport: Arc<dyn Transport>) {
        let mut slot = self.slot.lock();
        slot.current = transport;
        slot.pristine = None;
    }

    /// Wrap the current transport.
    ///
    /// The undecorated transport is remembered the first time this is called,
    /// and put back by [`TransportHandle::restore`].
    pub fn decorate<F>(&self, wrap: F)
    where
        F: FnOnce(Arc<dyn Transport>) -> Arc<dyn Transport>,
    {
        let mut slot = self.slot.lock();
        let inner = slot.current.clone();
        if slot.pristine.is_none() {
            slot.pristine = Some(inner.clone());
        }
        slot.current = wrap(inner);
        trace!("Transport decorated");
    }

    /// Check if decorators are currently installed.
    pub fn is_decorated(&self) -> bool {
        self.slot.lock().pristine.is_some()
    }

    /// Put back the transport that was installed before any decoration.
    pub fn restore(&self) {
        let mut slot = self.slot.lock();
        if let Some(pristine) = slot.pristine.take() {
            slot.current = pristine;
            trace!("Transport restored");
        }
    }

    /// Guard that restores the transport when dropped.
    pub fn restore_guard(&self) -> RestoreGuard {
        RestoreGuard {
            handle: self.clone(),
        }
    }

    /// Independent handle starting from the undecorated transport.
    ///
    /// Installed decorators are bound to this handle, so they are left out.
    pub fn detached(&self) -> Self {
        let slot = self.slot.lock();
        let base = slot.pristine.clone().unwrap_or_else(|| slot.current.clone());
        Self::new(base)
    }
}

impl Default for TransportHandle {
    fn default() -> Self {
        Self::new(Arc::new(NoTransport))
    }
}

impl fmt::Debug for TransportHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransportHandle")
            .field("decorated", &self.is_decorated())
            .finish()
    }
}

/// Restores a [`TransportHandle`] on drop.
#[must_use = "the transport is restored when the guard is dropped"]
pub struct RestoreGuard {
    handle: TransportHandle,
}

impl Drop for RestoreGuard {
    fn drop(&mut self) {
        self.handle.restore();
    }
}
