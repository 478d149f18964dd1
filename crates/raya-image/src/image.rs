//! Module image format
//!
//! Layout (all integers little-endian, strings are u32 length + UTF-8):
//!
//! ```text
//! Header (16 bytes)
//!   magic "RAYM" | format version u32 | target u32 | crc32 u32
//! Payload (covered by the crc32)
//!   identity   name, version, culture ("" = neutral), has_token u8, token [u8; 8]
//!   code       u32 length + opaque bytes
//!   resources  u32 count, then name, flags u32, u32 length + data
//! ```
//!
//! Reading never interprets the code section; only the header, the identity
//! and the resource directory are decoded.

use crate::encoder::{DecodeError, ImageReader, ImageWriter};
use crate::identity::{IdentityError, ModuleIdentity};
use crate::resource::{ResourceEntry, ResourceFlags};
use semver::Version;
use std::fmt;
use thiserror::Error;

/// Magic number for Raya module images: "RAYM"
pub const MAGIC: [u8; 4] = *b"RAYM";

/// Current image format version
pub const FORMAT_VERSION: u32 = 1;

/// Size of the fixed header in bytes
pub const HEADER_SIZE: usize = 16;

/// Smallest possible encoded resource entry (empty name + flags + empty data)
const MIN_RESOURCE_SIZE: usize = 12;

/// Image decoding errors
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ImageError {
    /// Decode error
    #[error("Decode error: {0}")]
    DecodeError(#[from] DecodeError),

    /// Invalid magic number
    #[error("Invalid magic number: expected RAYM, got {0:?}")]
    InvalidMagic([u8; 4]),

    /// Unsupported format version
    #[error("Unsupported format version: {0} (current: {FORMAT_VERSION})")]
    UnsupportedVersion(u32),

    /// Checksum mismatch
    #[error("Checksum mismatch: expected {expected:#x}, got {actual:#x}")]
    ChecksumMismatch {
        /// Checksum stored in the header
        expected: u32,
        /// Checksum of the payload
        actual: u32,
    },

    /// Identity block is not a valid module identity
    #[error("Invalid module identity: {0}")]
    InvalidIdentity(#[from] IdentityError),

    /// Resource count cannot fit in the remaining bytes
    #[error("Resource count {count} exceeds image size")]
    ResourceCountOverflow {
        /// Declared number of resources
        count: u32,
    },

    /// Bytes follow the resource directory
    #[error("{0} trailing bytes after resource directory")]
    TrailingData(usize),
}

/// Platform an image was built for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Target {
    /// Loadable everywhere
    Any,
    /// x86-64
    X86_64,
    /// 64-bit ARM
    Aarch64,
    /// 32-bit WebAssembly
    Wasm32,
    /// Target id this version does not know
    Unknown(u32),
}

impl Target {
    /// Decode a target id
    pub fn from_u32(value: u32) -> Self {
        match value {
            0 => Target::Any,
            1 => Target::X86_64,
            2 => Target::Aarch64,
            3 => Target::Wasm32,
            other => Target::Unknown(other),
        }
    }

    /// Encode to a target id
    pub fn to_u32(self) -> u32 {
        match self {
            Target::Any => 0,
            Target::X86_64 => 1,
            Target::Aarch64 => 2,
            Target::Wasm32 => 3,
            Target::Unknown(other) => other,
        }
    }

    /// Target of the running process
    pub fn current() -> Self {
        if cfg!(target_arch = "x86_64") {
            Target::X86_64
        } else if cfg!(target_arch = "aarch64") {
            Target::Aarch64
        } else if cfg!(target_arch = "wasm32") {
            Target::Wasm32
        } else {
            Target::Any
        }
    }

    /// Whether an image built for `self` can be loaded on `host`
    pub fn runs_on(self, host: Target) -> bool {
        self == Target::Any || host == Target::Any || self == host
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Target::Any => f.write_str("any"),
            Target::X86_64 => f.write_str("x86_64"),
            Target::Aarch64 => f.write_str("aarch64"),
            Target::Wasm32 => f.write_str("wasm32"),
            Target::Unknown(id) => write!(f, "unknown({})", id),
        }
    }
}

/// Decoded view of a module image
///
/// Borrows from the bytes it was read from; resource payloads are sub-slices
/// of the input.
#[derive(Debug, Clone)]
pub struct ModuleDescriptor<'a> {
    identity: ModuleIdentity,
    target: Target,
    code: &'a [u8],
    resources: Vec<ResourceEntry<'a>>,
}

impl<'a> ModuleDescriptor<'a> {
    /// Decode the header, identity and resource directory of an image
    pub fn read(data: &'a [u8]) -> Result<Self, ImageError> {
        let mut reader = ImageReader::new(data);

        // Header
        let magic: [u8; 4] = reader.read_array()?;
        if magic != MAGIC {
            return Err(ImageError::InvalidMagic(magic));
        }

        let version = reader.read_u32()?;
        if version != FORMAT_VERSION {
            return Err(ImageError::UnsupportedVersion(version));
        }

        let target = Target::from_u32(reader.read_u32()?);
        let stored_checksum = reader.read_u32()?;

        let calculated_checksum = crc32fast::hash(&data[HEADER_SIZE..]);
        if stored_checksum != calculated_checksum {
            return Err(ImageError::ChecksumMismatch {
                expected: stored_checksum,
                actual: calculated_checksum,
            });
        }

        let identity = read_identity(&mut reader)?;
        let code = reader.read_block()?;

        let count = reader.read_u32()?;
        if count as usize > reader.remaining() / MIN_RESOURCE_SIZE {
            return Err(ImageError::ResourceCountOverflow { count });
        }
        let mut resources = Vec::with_capacity(count as usize);
        for _ in 0..count {
            let name = reader.read_str()?;
            let flags = ResourceFlags::from_bits(reader.read_u32()?);
            let data = reader.read_block()?;
            resources.push(ResourceEntry { name, flags, data });
        }

        if reader.has_more() {
            return Err(ImageError::TrailingData(reader.remaining()));
        }

        Ok(Self {
            identity,
            target,
            code,
            resources,
        })
    }

    /// The module's own identity
    pub fn identity(&self) -> &ModuleIdentity {
        &self.identity
    }

    /// Platform the image was built for
    pub fn target(&self) -> Target {
        self.target
    }

    /// Opaque code section
    pub fn code(&self) -> &'a [u8] {
        self.code
    }

    /// Every resource directory entry, in directory order
    pub fn resources(&self) -> &[ResourceEntry<'a>] {
        &self.resources
    }

    /// Fully-contained resources only, in directory order
    pub fn embedded_blobs(&self) -> impl Iterator<Item = &ResourceEntry<'a>> + '_ {
        self.resources.iter().filter(|r| r.is_fully_contained())
    }
}

fn read_identity(reader: &mut ImageReader<'_>) -> Result<ModuleIdentity, ImageError> {
    let name = reader.read_str()?;
    let version = reader.read_str()?;
    let culture = reader.read_str()?;
    let key_token = if reader.read_bool()? {
        Some(reader.read_array::<8>()?)
    } else {
        None
    };

    let version = Version::parse(version)
        .map_err(|e| IdentityError::InvalidVersion(version.to_string(), e.to_string()))?;
    let culture = (!culture.is_empty()).then(|| culture.to_string());

    Ok(ModuleIdentity::with_parts(name, version, culture, key_token)?)
}

/// Read `data` as a module image, or `None` when it is not one
///
/// This is the silent form used while probing resources, most of which are
/// not modules at all.
pub fn read(data: &[u8]) -> Option<ModuleDescriptor<'_>> {
    ModuleDescriptor::read(data).ok()
}

/// Owned module image under construction
#[derive(Debug, Clone)]
pub struct ModuleImage {
    /// Module identity
    pub identity: ModuleIdentity,
    /// Target platform
    pub target: Target,
    /// Opaque code section
    pub code: Vec<u8>,
    /// Resource directory, in order
    pub resources: Vec<OwnedResource>,
}

/// Owned resource directory entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OwnedResource {
    /// Resource name
    pub name: String,
    /// Placement flags
    pub flags: ResourceFlags,
    /// Payload
    pub data: Vec<u8>,
}

impl ModuleImage {
    /// Create an empty image for `identity`, loadable on any target
    pub fn new(identity: ModuleIdentity) -> Self {
        Self {
            identity,
            target: Target::Any,
            code: Vec::new(),
            resources: Vec::new(),
        }
    }

    /// Set the target platform
    pub fn with_target(mut self, target: Target) -> Self {
        self.target = target;
        self
    }

    /// Set the code section
    pub fn with_code(mut self, code: impl Into<Vec<u8>>) -> Self {
        self.code = code.into();
        self
    }

    /// Append a fully-contained resource
    pub fn embed(self, name: impl Into<String>, data: impl Into<Vec<u8>>) -> Self {
        self.add_resource(name, ResourceFlags::FULLY_CONTAINED, data)
    }

    /// Append a resource with explicit placement flags
    pub fn add_resource(
        mut self,
        name: impl Into<String>,
        flags: ResourceFlags,
        data: impl Into<Vec<u8>>,
    ) -> Self {
        self.resources.push(OwnedResource {
            name: name.into(),
            flags,
            data: data.into(),
        });
        self
    }

    /// Encode the image to bytes
    pub fn encode(&self) -> Vec<u8> {
        let mut writer = ImageWriter::with_capacity(
            HEADER_SIZE
                + self.code.len()
                + self.resources.iter().map(|r| r.data.len() + 64).sum::<usize>()
                + 128,
        );

        writer.emit_raw(&MAGIC);
        writer.emit_u32(FORMAT_VERSION);
        writer.emit_u32(self.target.to_u32());
        let checksum_offset = writer.offset();
        writer.emit_u32(0); // Placeholder for checksum

        let id = &self.identity;
        writer.emit_string(id.name());
        writer.emit_string(&id.version().to_string());
        writer.emit_string(id.culture().unwrap_or(""));
        match id.key_token() {
            Some(token) => {
                writer.emit_u8(1);
                writer.emit_raw(token);
            }
            None => writer.emit_u8(0),
        }

        writer.emit_block(&self.code);

        writer.emit_u32(self.resources.len() as u32);
        for resource in &self.resources {
            writer.emit_string(&resource.name);
            writer.emit_u32(resource.flags.bits());
            writer.emit_block(&resource.data);
        }

        let checksum = crc32fast::hash(&writer.buffer()[HEADER_SIZE..]);
        writer.patch_u32(checksum_offset, checksum);

        writer.into_bytes()
    }
}
