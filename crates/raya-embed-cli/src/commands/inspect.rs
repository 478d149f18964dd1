//! `raya-embed inspect`: Show a module image and everything it bundles.

use std::io;
use std::path::Path;

use anyhow::{bail, Context};
use raya_embed::{EmbedConfig, MAX_DEPTH_LIMIT};
use raya_image::ModuleDescriptor;
use serde::Serialize;
use termcolor::WriteColor;

use crate::output::StyledOutput;

/// One decoded module image
#[derive(Debug, Serialize)]
pub struct ImageNode {
    pub identity: String,
    pub target: String,
    pub code_size: usize,
    pub resources: Vec<ResourceNode>,
}

/// One resource directory entry
#[derive(Debug, Serialize)]
pub struct ResourceNode {
    pub name: String,
    pub flags: String,
    pub size: usize,
    /// Decoded image, for fully-contained resources that are modules
    #[serde(skip_serializing_if = "Option::is_none")]
    pub module: Option<ImageNode>,
    /// A module sits here but lies beyond the requested depth
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub truncated: bool,
}

/// Decode `bytes` and its fully-contained module resources, `depth` levels deep
///
/// `depth` is capped at [`MAX_DEPTH_LIMIT`].
pub fn build_tree(bytes: &[u8], depth: usize) -> Option<ImageNode> {
    let descriptor = raya_image::read(bytes)?;
    Some(node(&descriptor, depth.min(MAX_DEPTH_LIMIT)))
}

/// Expansion depth: the flag when given, else the configured search depth
pub fn expansion_depth(flag: Option<usize>, config: &EmbedConfig) -> anyhow::Result<usize> {
    let depth = flag.unwrap_or(config.max_depth);
    if depth > MAX_DEPTH_LIMIT {
        bail!("--depth must be at most {}, got {}", MAX_DEPTH_LIMIT, depth);
    }
    Ok(depth)
}

fn node(descriptor: &ModuleDescriptor<'_>, depth: usize) -> ImageNode {
    let resources = descriptor
        .resources()
        .iter()
        .map(|entry| {
            let nested = entry
                .is_fully_contained()
                .then(|| raya_image::read(entry.data))
                .flatten();
            let (module, truncated) = match nested {
                Some(nested) if depth > 0 => (Some(node(&nested, depth - 1)), false),
                Some(_) => (None, true),
                None => (None, false),
            };
            ResourceNode {
                name: entry.name.to_string(),
                flags: entry.flags.to_string(),
                size: entry.data.len(),
                module,
                truncated,
            }
        })
        .collect();

    ImageNode {
        identity: descriptor.identity().to_string(),
        target: descriptor.target().to_string(),
        code_size: descriptor.code().len(),
        resources,
    }
}

pub fn execute<W: WriteColor>(
    file: &Path,
    depth: Option<usize>,
    json: bool,
    config: &EmbedConfig,
    out: &mut StyledOutput<W>,
) -> anyhow::Result<()> {
    let depth = expansion_depth(depth, config)?;
    let bytes = std::fs::read(file).with_context(|| format!("reading {}", file.display()))?;
    let tree = build_tree(&bytes, depth)
        .with_context(|| format!("{} is not a module image", file.display()))?;

    if json {
        out.plain(&serde_json::to_string_pretty(&tree)?)?;
        out.newline()?;
        return Ok(());
    }

    render(&tree, "", out)?;
    Ok(())
}

fn render<W: WriteColor>(
    image: &ImageNode,
    indent: &str,
    out: &mut StyledOutput<W>,
) -> io::Result<()> {
    out.identity(&image.identity)?;
    out.detail(&format!("  [{}, {} bytes of code]", image.target, image.code_size))?;
    out.newline()?;

    let count = image.resources.len();
    for (i, resource) in image.resources.iter().enumerate() {
        let last = i + 1 == count;
        out.plain(indent)?;
        out.plain(if last { "└── " } else { "├── " })?;
        out.resource(&resource.name)?;
        out.detail(&format!("  {} bytes, {}", resource.size, resource.flags))?;
        if resource.truncated {
            out.warning("  (module, not expanded)")?;
        }

        match &resource.module {
            Some(module) => {
                out.plain("  => ")?;
                let child_indent = format!("{}{}", indent, if last { "    " } else { "│   " });
                render(module, &child_indent, out)?;
            }
            None => out.newline()?,
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use raya_image::{ModuleImage, ResourceFlags};

    fn image(text: &str) -> ModuleImage {
        ModuleImage::new(text.parse().unwrap())
    }

    fn sample() -> Vec<u8> {
        let inner = image("inner, Version=1.0.0").encode();
        let middle = image("middle, Version=1.0.0").embed("inner.rym", inner).encode();
        image("app, Version=0.1.0")
            .with_code(vec![0; 10])
            .embed("middle.rym", middle.clone())
            .add_resource("linked.rym", ResourceFlags::LINKED, middle)
            .embed("notes.txt", b"hello".to_vec())
            .encode()
    }

    #[test]
    fn test_tree_expands_fully_contained_modules() {
        let tree = build_tree(&sample(), 8).unwrap();
        assert_eq!(tree.code_size, 10);
        assert_eq!(tree.resources.len(), 3);

        let middle = tree.resources[0].module.as_ref().unwrap();
        assert!(middle.identity.starts_with("middle, Version=1.0.0"));
        assert!(middle.resources[0].module.is_some());

        assert!(tree.resources[1].module.is_none());
        assert!(!tree.resources[1].truncated);
        assert!(tree.resources[2].module.is_none());
    }

    #[test]
    fn test_tree_depth_limit_marks_truncation() {
        let tree = build_tree(&sample(), 1).unwrap();
        let middle = tree.resources[0].module.as_ref().unwrap();
        assert!(middle.resources[0].module.is_none());
        assert!(middle.resources[0].truncated);
    }

    #[test]
    fn test_json_omits_empty_fields() {
        let tree = build_tree(&sample(), 0).unwrap();
        let json = serde_json::to_value(&tree).unwrap();
        assert_eq!(json["resources"][0]["truncated"], true);
        assert!(json["resources"][2].get("module").is_none());
        assert!(json["resources"][2].get("truncated").is_none());
    }

    #[test]
    fn test_rendered_tree() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("app.rym");
        std::fs::write(&path, sample()).unwrap();

        let mut out = StyledOutput::new(termcolor::NoColor::new(Vec::new()));
        execute(&path, Some(8), false, &EmbedConfig::default(), &mut out).unwrap();
        let text = String::from_utf8(out.into_inner().into_inner()).unwrap();

        let lines: Vec<&str> = text.lines().collect();
        assert!(lines[0].starts_with("app, Version=0.1.0"));
        assert!(lines[1].starts_with("├── middle.rym"));
        assert!(lines[1].contains("=> middle, Version=1.0.0"));
        assert!(lines[2].starts_with("│   └── inner.rym"));
        assert!(lines[3].starts_with("├── linked.rym"));
        assert!(lines[3].contains("linked"));
        assert!(lines[4].starts_with("└── notes.txt"));
        assert_eq!(lines.len(), 5);
    }

    #[test]
    fn test_execute_rejects_non_image() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.txt");
        std::fs::write(&path, "hello").unwrap();

        let mut out = StyledOutput::new(termcolor::NoColor::new(Vec::new()));
        assert!(execute(&path, Some(8), false, &EmbedConfig::default(), &mut out).is_err());
    }

    #[test]
    fn test_depth_defaults_to_config_and_is_bounded() {
        let config = EmbedConfig { max_depth: 3 };
        assert_eq!(expansion_depth(None, &config).unwrap(), 3);
        assert_eq!(expansion_depth(Some(0), &config).unwrap(), 0);
        assert_eq!(
            expansion_depth(Some(MAX_DEPTH_LIMIT), &config).unwrap(),
            MAX_DEPTH_LIMIT
        );
        assert!(expansion_depth(Some(MAX_DEPTH_LIMIT + 1), &config).is_err());
        assert!(expansion_depth(Some(usize::MAX), &config).is_err());
    }

    fn nested(levels: usize) -> Vec<u8> {
        (0..levels).fold(image("leaf, Version=1.0.0").encode(), |inner, level| {
            image(&format!("level{}, Version=1.0.0", level))
                .embed("inner.rym", inner)
                .encode()
        })
    }

    fn tree_depth(node: &ImageNode) -> usize {
        node.resources
            .iter()
            .filter_map(|r| r.module.as_ref())
            .map(|m| 1 + tree_depth(m))
            .max()
            .unwrap_or(0)
    }

    #[test]
    fn test_deep_bundle_expansion_is_capped() {
        let bytes = nested(MAX_DEPTH_LIMIT + 20);
        let tree = build_tree(&bytes, usize::MAX).unwrap();
        assert_eq!(tree_depth(&tree), MAX_DEPTH_LIMIT);
    }

    #[test]
    fn test_execute_rejects_excessive_depth() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("app.rym");
        std::fs::write(&path, sample()).unwrap();

        let mut out = StyledOutput::new(termcolor::NoColor::new(Vec::new()));
        let err = execute(
            &path,
            Some(usize::MAX),
            false,
            &EmbedConfig::default(),
            &mut out,
        )
        .unwrap_err();
        assert!(err.to_string().contains("--depth"));
        assert!(out.into_inner().into_inner().is_empty());
    }

    #[test]
    fn test_not_an_image() {
        assert!(build_tree(b"text", 4).is_none());
    }
}
