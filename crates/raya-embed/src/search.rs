//! Recursive blob search
//!
//! Interprets a buffer as a module image, compares its identity against the
//! target, and descends into its fully-contained resources in directory
//! order. The first match wins and is returned as the matched buffer itself,
//! however deep it was found, so the result always re-reads as the target.

use raya_image::{ModuleDescriptor, ModuleIdentity};
use tracing::trace;

/// Find the module image for `target` inside `bytes`
///
/// `bytes` itself is checked first. `max_depth` is the number of nesting
/// levels the search may descend below `bytes`; deeper bundles are treated
/// as misses. Buffers that are not module images are misses, never errors.
pub fn search<'a>(
    bytes: &'a [u8],
    target: &ModuleIdentity,
    max_depth: usize,
) -> Option<&'a [u8]> {
    let descriptor = match ModuleDescriptor::read(bytes) {
        Ok(descriptor) => descriptor,
        Err(e) => {
            trace!(size = bytes.len(), error = %e, "candidate is not a module");
            return None;
        }
    };

    if descriptor.identity().full_name() == target.full_name() {
        return Some(bytes);
    }

    let mut blobs = descriptor.embedded_blobs().peekable();
    if max_depth == 0 {
        if blobs.peek().is_some() {
            trace!(container = %descriptor.identity(), "nesting limit reached");
        }
        return None;
    }

    blobs.find_map(|blob| search(blob.data, target, max_depth - 1))
}
