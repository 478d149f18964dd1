//! Registration gate
//!
//! Subscribes a resolution engine to a host's failed-resolution notification
//! exactly once. The check-and-set runs under a single lock, so concurrent
//! callers either perform the installation or observe it finished.

use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, info};

use crate::engine::ResolutionEngine;
use crate::error::HostError;
use crate::host::HostLoader;

/// One-shot registration of the resolution engine
#[derive(Debug)]
pub struct RegistrationGate {
    registered: Mutex<bool>,
}

impl RegistrationGate {
    /// Create a gate that has not registered anything
    pub const fn new() -> Self {
        Self {
            registered: parking_lot::const_mutex(false),
        }
    }

    /// Subscribe the engine built by `engine` on `host`, unless this gate
    /// already did
    ///
    /// Returns `true` for the call that performed the subscription. A failed
    /// subscription leaves the gate open and returns the host's error.
    pub fn register(
        &self,
        host: &dyn HostLoader,
        engine: impl FnOnce() -> ResolutionEngine,
    ) -> Result<bool, HostError> {
        let mut registered = self.registered.lock();
        if *registered {
            debug!("embedded module resolution already registered");
            return Ok(false);
        }

        let engine = Arc::new(engine());
        let max_depth = engine.config().max_depth;
        let id = host.subscribe(engine.into_listener())?;
        *registered = true;

        info!(listener = ?id, max_depth, "registered embedded module resolution");
        Ok(true)
    }

    /// Whether this gate has registered its engine
    pub fn is_registered(&self) -> bool {
        *self.registered.lock()
    }
}

impl Default for RegistrationGate {
    fn default() -> Self {
        Self::new()
    }
}
