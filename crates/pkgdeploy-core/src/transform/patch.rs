//! Unified-diff transforms: `.install.patch` on install, the companion
//! `.uninstall.patch` on removal.

use std::path::Path;

use anyhow::{Context, bail};

use super::{RevertContext, Transformer};
use crate::project::{ProjectContext, ProjectTree};

#[derive(Debug, Clone, Copy, Default)]
pub struct PatchTransformer;

fn apply_patch(
    source: &[u8],
    target: &Path,
    project: &mut dyn ProjectTree,
) -> anyhow::Result<()> {
    let patch_text = std::str::from_utf8(source).context("Patch is not valid UTF-8")?;
    let patch = diffy::Patch::from_str(patch_text).context("Malformed patch")?;

    let current = project
        .read_file(target)
        .with_context(|| format!("Failed to read {}", target.display()))?;
    let current = String::from_utf8(current)
        .with_context(|| format!("{} is not valid UTF-8", target.display()))?;

    let patched = diffy::apply(&current, &patch)
        .with_context(|| format!("Patch does not apply to {}", target.display()))?;
    project
        .add_file(target, patched.as_bytes())
        .with_context(|| format!("Failed to write {}", target.display()))
}

impl Transformer for PatchTransformer {
    fn transform(
        &self,
        source: &[u8],
        target: &Path,
        project: &mut dyn ProjectTree,
        _context: &dyn ProjectContext,
    ) -> anyhow::Result<()> {
        if !project.file_exists(target) {
            bail!("Cannot patch {}: file does not exist", target.display());
        }
        apply_patch(source, target, project)
    }

    fn revert(
        &self,
        source: &[u8],
        target: &Path,
        _others: &RevertContext<'_>,
        project: &mut dyn ProjectTree,
        _context: &dyn ProjectContext,
    ) -> anyhow::Result<()> {
        if !project.file_exists(target) {
            return Ok(());
        }
        apply_patch(source, target, project)
    }
}
