//! Resolution engine
//!
//! Answers a host's failed-resolution notification by searching the
//! fully-contained resources of every loaded module, in load order, and
//! loading the first image whose identity matches the request.

use std::sync::Arc;

use raya_image::{ModuleDescriptor, ModuleIdentity};
use tracing::{debug, trace, warn};

use crate::config::EmbedConfig;
use crate::error::HostError;
use crate::host::{listener, HostLoader, LoadedModule, ResolveListener, ResolveRequest};
use crate::search::search;

/// Searches loaded modules for bundled dependencies
#[derive(Debug, Clone, Default)]
pub struct ResolutionEngine {
    config: EmbedConfig,
}

impl ResolutionEngine {
    /// Create an engine with the given configuration
    pub fn new(config: EmbedConfig) -> Self {
        Self { config }
    }

    /// Engine configuration
    pub fn config(&self) -> &EmbedConfig {
        &self.config
    }

    /// Find `target` among the fully-contained resources of `image`
    ///
    /// `image` itself is not a candidate, only what it bundles. A directly
    /// embedded module is at depth 1.
    pub fn locate<'a>(&self, image: &'a [u8], target: &ModuleIdentity) -> Option<&'a [u8]> {
        let descriptor = ModuleDescriptor::read(image).ok()?;
        let below = self.config.max_depth.saturating_sub(1);
        for blob in descriptor.embedded_blobs() {
            if let Some(hit) = search(blob.data, target, below) {
                return Some(hit);
            }
        }
        None
    }

    /// Resolve a request against the modules loaded in `host`
    ///
    /// `Ok(None)` means nothing bundled matches and the host should fall
    /// through to its default failure. Once an image matches by identity,
    /// a failure to load it is returned as is; later candidates are not
    /// tried.
    pub fn resolve(
        &self,
        host: &dyn HostLoader,
        request: &ResolveRequest,
    ) -> Result<Option<Arc<LoadedModule>>, HostError> {
        let target = host.parse_identity(request.name())?;
        let modules = host.loaded_modules()?;
        debug!(identity = %target, modules = modules.len(), "searching bundled modules");

        for module in &modules {
            let Some(bytes) = self.locate(module.image(), &target) else {
                trace!(container = %module.identity(), "no match");
                continue;
            };

            debug!(
                identity = %target,
                container = %module.identity(),
                size = bytes.len(),
                "found bundled module"
            );
            return match host.load_from_bytes(bytes) {
                Ok(loaded) => Ok(Some(loaded)),
                Err(e) => {
                    warn!(
                        identity = %target,
                        container = %module.identity(),
                        error = %e,
                        "bundled module failed to load"
                    );
                    Err(e)
                }
            };
        }

        debug!(identity = %target, "no bundled module matches");
        Ok(None)
    }

    /// Adapt the engine to the host notification signature
    pub fn into_listener(self: Arc<Self>) -> ResolveListener {
        listener(move |host, request| self.resolve(host, request))
    }
}
