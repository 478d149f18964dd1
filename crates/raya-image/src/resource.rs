//! Resource directory entries

use std::fmt;

/// Placement flags of a resource directory entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ResourceFlags(u32);

impl ResourceFlags {
    /// Payload is stored inside a module file
    pub const EMBEDDED: Self = Self(1 << 0);
    /// Payload belongs to another module of the bundle
    pub const CONTAINED_IN_ANOTHER_MODULE: Self = Self(1 << 1);
    /// Payload is stored inside this module's own file
    pub const CONTAINED_IN_MANIFEST_FILE: Self = Self(1 << 2);

    /// Placement of resources written by `ModuleImage::embed`
    pub const FULLY_CONTAINED: Self =
        Self(Self::EMBEDDED.0 | Self::CONTAINED_IN_MANIFEST_FILE.0);
    /// A resource that only links to an external file
    pub const LINKED: Self = Self(0);

    /// Build flags from their raw bits
    pub const fn from_bits(bits: u32) -> Self {
        Self(bits)
    }

    /// Raw bits
    pub const fn bits(self) -> u32 {
        self.0
    }

    /// True when every bit of `other` is set
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// True when the payload lives entirely inside the owning image
    pub const fn is_fully_contained(self) -> bool {
        self.contains(Self::FULLY_CONTAINED)
    }
}

impl std::ops::BitOr for ResourceFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl fmt::Display for ResourceFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names = Vec::new();
        if self.contains(Self::EMBEDDED) {
            names.push("embedded");
        }
        if self.contains(Self::CONTAINED_IN_ANOTHER_MODULE) {
            names.push("another-module");
        }
        if self.contains(Self::CONTAINED_IN_MANIFEST_FILE) {
            names.push("manifest-file");
        }
        if names.is_empty() {
            names.push("linked");
        }
        write!(f, "{}", names.join("|"))
    }
}

/// One entry of an image's resource directory, borrowed from the image bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResourceEntry<'a> {
    /// Resource name
    pub name: &'a str,
    /// Placement flags
    pub flags: ResourceFlags,
    /// Raw payload
    pub data: &'a [u8],
}

impl ResourceEntry<'_> {
    /// True when the entry can be searched without touching the filesystem
    pub fn is_fully_contained(&self) -> bool {
        self.flags.is_fully_contained()
    }
}
