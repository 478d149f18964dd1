//! `raya-embed find`: Search a module image's bundle for an identity.

use std::path::Path;

use anyhow::{bail, Context};
use raya_embed::{EmbedConfig, ResolutionEngine};
use raya_image::{ModuleDescriptor, ModuleIdentity};
use sha2::{Digest, Sha256};
use termcolor::WriteColor;

use crate::output::StyledOutput;

/// A bundled module located inside a file
#[derive(Debug, PartialEq, Eq)]
pub struct Found {
    pub identity: ModuleIdentity,
    pub bytes: Vec<u8>,
}

/// Locate `identity` among the fully-contained resources of `bytes`
pub fn locate(bytes: &[u8], identity: &ModuleIdentity, config: &EmbedConfig) -> Option<Found> {
    let engine = ResolutionEngine::new(config.clone());
    let hit = engine.locate(bytes, identity)?;
    let descriptor = ModuleDescriptor::read(hit).ok()?;
    Some(Found {
        identity: descriptor.identity().clone(),
        bytes: hit.to_vec(),
    })
}

pub fn execute<W: WriteColor>(
    file: &Path,
    identity: &str,
    output: Option<&Path>,
    config: &EmbedConfig,
    out: &mut StyledOutput<W>,
) -> anyhow::Result<()> {
    let target: ModuleIdentity = identity
        .parse()
        .with_context(|| format!("invalid module identity {:?}", identity))?;
    let bytes = std::fs::read(file).with_context(|| format!("reading {}", file.display()))?;
    ModuleDescriptor::read(&bytes)
        .with_context(|| format!("{} is not a module image", file.display()))?;

    let Some(found) = locate(&bytes, &target, config) else {
        bail!("{} is not bundled in {}", target, file.display());
    };

    out.success("found ")?;
    out.identity(found.identity.full_name())?;
    out.newline()?;
    out.field("size", &format!("{} bytes", found.bytes.len()))?;
    out.field("sha256", &hex::encode(Sha256::digest(&found.bytes)))?;

    if let Some(path) = output {
        std::fs::write(path, &found.bytes)
            .with_context(|| format!("writing {}", path.display()))?;
        out.field("written", &path.display().to_string())?;
    }

    Ok(())
}
