//! Error types for embedded module resolution

use raya_image::{IdentityError, ImageError, Target};
use thiserror::Error;

/// Errors raised by a host loader while loading a module
#[derive(Debug, Error)]
pub enum LoadError {
    /// Bytes are not a loadable module image
    #[error("Bad module image: {0}")]
    BadImage(#[from] ImageError),

    /// Image was built for a different platform
    #[error("Module {identity} targets {image}, host is {host}")]
    IncompatibleTarget {
        /// Identity of the rejected module
        identity: String,
        /// Target recorded in the image
        image: Target,
        /// Target of the host loader
        host: Target,
    },

    /// Nothing could resolve the requested module
    #[error("Could not resolve module {0}")]
    NotFound(String),
}

/// Errors surfaced through the host-loader capability surface
#[derive(Debug, Error)]
pub enum HostError {
    /// Requested name is not a valid module identity
    #[error("Invalid module identity: {0}")]
    Identity(#[from] IdentityError),

    /// Load failed
    #[error(transparent)]
    Load(#[from] LoadError),

    /// Host loader API is not available
    #[error("Host loader unavailable: {0}")]
    Unavailable(String),
}
