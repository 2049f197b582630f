//! Content transforms applied instead of a plain copy or delete.
//!
//! A [`TransformRegistry`] maps file-suffix pairs to [`Transformer`]s in
//! registration order. It is built once per call and passed explicitly to
//! the installer and uninstaller.

pub mod merge;
pub mod patch;
pub mod preprocess;
pub mod xml;

use std::fmt;
use std::path::Path;

use tracing::debug;

use crate::config::DeployConfig;
use crate::error::Result;
use crate::package::{
    ArchiveOpener, OtherPackageReference, file_name, is_package_reference_file,
};
use crate::project::{ProjectContext, ProjectTree};

pub use merge::StructuredMerge;
pub use patch::PatchTransformer;
pub use preprocess::Preprocessor;

/// Install and uninstall suffixes of one transform family.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TransformExtensionPair {
    install: String,
    uninstall: String,
}

impl TransformExtensionPair {
    pub fn new(install: impl Into<String>, uninstall: impl Into<String>) -> Self {
        Self {
            install: install.into(),
            uninstall: uninstall.into(),
        }
    }

    pub fn install(&self) -> &str {
        &self.install
    }

    pub fn uninstall(&self) -> &str {
        &self.uninstall
    }

    pub fn select(&self, direction: TransformDirection) -> &str {
        match direction {
            TransformDirection::Install => &self.install,
            TransformDirection::Uninstall => &self.uninstall,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransformDirection {
    Install,
    Uninstall,
}

/// Other installed packages that contribute a source for the same target.
#[derive(Clone, Copy)]
pub struct RevertContext<'a> {
    pub other_owners: &'a [OtherPackageReference],
    pub archives: &'a dyn ArchiveOpener,
}

impl<'a> RevertContext<'a> {
    pub fn new(other_owners: &'a [OtherPackageReference], archives: &'a dyn ArchiveOpener) -> Self {
        Self {
            other_owners,
            archives,
        }
    }

    /// Read every other owner's source, one archive at a time.
    pub fn read_sources(&self) -> Result<Vec<Vec<u8>>> {
        self.other_owners
            .iter()
            .map(|owner| owner.read(self.archives))
            .collect()
    }
}

impl fmt::Debug for RevertContext<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RevertContext")
            .field("other_owners", &self.other_owners)
            .finish_non_exhaustive()
    }
}

pub trait Transformer: fmt::Debug {
    /// Apply `source` to `target`, usually merging into an existing file.
    fn transform(
        &self,
        source: &[u8],
        target: &Path,
        project: &mut dyn ProjectTree,
        context: &dyn ProjectContext,
    ) -> anyhow::Result<()>;

    /// Undo this package's contribution to `target`, leaving what other
    /// owners contribute in place.
    fn revert(
        &self,
        source: &[u8],
        target: &Path,
        others: &RevertContext<'_>,
        project: &mut dyn ProjectTree,
        context: &dyn ProjectContext,
    ) -> anyhow::Result<()>;
}

/// A registry hit: the matching pair, its transformer and the path with the
/// suffix removed.
#[derive(Debug)]
pub struct TransformMatch<'a> {
    pub pair: &'a TransformExtensionPair,
    pub transformer: &'a dyn Transformer,
    pub truncated: String,
}

#[derive(Debug, Default)]
pub struct TransformRegistry {
    entries: Vec<(TransformExtensionPair, Box<dyn Transformer>)>,
}

impl TransformRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The built-in transformers enabled in `config`.
    pub fn builtin(config: &DeployConfig) -> Self {
        let mut registry = Self::new();
        if config.transforms.merge {
            registry.register(
                TransformExtensionPair::new(".transform", ".transform"),
                StructuredMerge,
            );
        }
        if config.transforms.preprocess {
            registry.register(
                TransformExtensionPair::new(".pp", ".pp"),
                Preprocessor::new(config.tokens.clone()),
            );
        }
        if config.transforms.patch {
            registry.register(
                TransformExtensionPair::new(".install.patch", ".uninstall.patch"),
                PatchTransformer,
            );
        }
        registry
    }

    pub fn register<T>(&mut self, pair: TransformExtensionPair, transformer: T)
    where
        T: Transformer + 'static,
    {
        debug!(
            "Registered transform {} / {}",
            pair.install(),
            pair.uninstall()
        );
        self.entries.push((pair, Box::new(transformer)));
    }

    pub fn with<T>(mut self, pair: TransformExtensionPair, transformer: T) -> Self
    where
        T: Transformer + 'static,
    {
        self.register(pair, transformer);
        self
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn pairs(&self) -> impl Iterator<Item = &TransformExtensionPair> {
        self.entries.iter().map(|(pair, _)| pair)
    }

    /// First registered pair whose `direction` suffix ends `path`.
    ///
    /// A match that would truncate to the package reference manifest is
    /// passed over so the manifest is never transformed.
    pub fn find(&self, path: &str, direction: TransformDirection) -> Option<TransformMatch<'_>> {
        for (pair, transformer) in &self.entries {
            let Some(truncated) = strip_suffix_ignore_case(path, pair.select(direction)) else {
                continue;
            };
            if is_package_reference_file(file_name(truncated)) {
                continue;
            }
            return Some(TransformMatch {
                pair,
                transformer: transformer.as_ref(),
                truncated: truncated.to_string(),
            });
        }
        None
    }

    /// `path` with the matching suffix removed, or `path` itself.
    pub fn resolve_path(&self, path: &str, direction: TransformDirection) -> String {
        self.find(path, direction)
            .map(|hit| hit.truncated)
            .unwrap_or_else(|| path.to_string())
    }
}

impl DeployConfig {
    pub fn transform_registry(&self) -> TransformRegistry {
        TransformRegistry::builtin(self)
    }
}

fn strip_suffix_ignore_case<'p>(path: &'p str, suffix: &str) -> Option<&'p str> {
    if suffix.is_empty() || path.len() <= suffix.len() {
        return None;
    }
    let split = path.len() - suffix.len();
    let tail = path.as_bytes().get(split..)?;
    if tail.eq_ignore_ascii_case(suffix.as_bytes()) && path.is_char_boundary(split) {
        Some(&path[..split])
    } else {
        None
    }
}
