//! Raya module images
//!
//! This crate defines the binary module image format used to ship Raya
//! modules, the canonical module identity, and a defensive reader that
//! recovers an image's identity and resource directory without interpreting
//! its code.

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

pub mod encoder;
pub mod identity;
pub mod image;
pub mod resource;

pub use encoder::{DecodeError, ImageReader, ImageWriter};
pub use identity::{IdentityError, ModuleIdentity, NEUTRAL_CULTURE};
pub use image::{
    read, ImageError, ModuleDescriptor, ModuleImage, OwnedResource, Target, FORMAT_VERSION,
    HEADER_SIZE, MAGIC,
};
pub use resource::{ResourceEntry, ResourceFlags};
pub use semver::Version;
