//! Embedded module resolution
//!
//! Lets Raya modules ship their dependencies bundled inside their own
//! resource directory. After [`register`] has been called, a module the host
//! loader cannot find on its own is looked up among the fully-contained
//! resources of every loaded module (recursively, through nested bundles)
//! and loaded from there.
//!
//! ```ignore
//! raya_embed::register()?;
//! let host = raya_embed::ModuleHost::global();
//! host.load(&std::fs::read("app.rym")?)?;
//! let json = host.resolve("json.core, Version=1.4.0")?;
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

pub mod config;
pub mod engine;
pub mod error;
pub mod gate;
pub mod host;
pub mod search;

pub use config::{ConfigError, EmbedConfig, DEFAULT_MAX_DEPTH, MAX_DEPTH_ENV, MAX_DEPTH_LIMIT};
pub use engine::ResolutionEngine;
pub use error::{HostError, LoadError};
pub use gate::RegistrationGate;
pub use host::{
    listener, HostLoader, ListenerId, LoadedModule, ModuleHost, ResolveListener, ResolveRequest,
};
pub use search::search;

static GATE: RegistrationGate = RegistrationGate::new();

/// Install embedded module resolution on the process-wide host
///
/// Safe to call any number of times from any thread; only the first call
/// subscribes. Settings come from the environment
/// (see [`EmbedConfig::from_env_or_default`]).
pub fn register() -> Result<(), HostError> {
    GATE.register(ModuleHost::global(), || {
        ResolutionEngine::new(EmbedConfig::from_env_or_default())
    })?;
    Ok(())
}

/// Whether [`register`] has installed resolution in this process
pub fn is_registered() -> bool {
    GATE.is_registered()
}
