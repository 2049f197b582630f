//! Install and uninstall coordination.
//!
//! [`PackageInstaller`] and [`PackageUninstaller`] work on an already
//! selected content group. [`ContentDeployer`] opens the package, selects
//! the group for the project and builds the transform registry per call.

pub mod install;
pub mod owners;
pub mod uninstall;

use std::path::{Path, PathBuf};

use tracing::info;

use crate::config::DeployConfig;
use crate::error::{DeployError, Result};
use crate::framework::{
    DefaultReducer, Framework, FrameworkReducer, FrameworkSpecificGroup, most_compatible_group,
};
use crate::package::{ArchiveOpener, PackageArchive, ZipOpener, content_groups};
use crate::project::{MessageLevel, ProjectContext, ProjectTree, notify};

pub use install::{InstallReport, PackageInstaller};
pub use owners::{InstalledGroups, OwnerIndex};
pub use uninstall::{PackageUninstaller, UninstallReport};

/// Log a recoverable error once and keep it for the caller's report.
pub fn recover(context: &dyn ProjectContext, recovered: &mut Vec<DeployError>, error: DeployError) {
    notify(context, MessageLevel::Warning, &error.to_string());
    recovered.push(error);
}

pub struct ContentDeployer {
    config: DeployConfig,
    reducer: Box<dyn FrameworkReducer>,
    archives: Box<dyn ArchiveOpener>,
}

impl ContentDeployer {
    pub fn new(config: DeployConfig) -> Self {
        Self {
            config,
            reducer: Box::new(DefaultReducer),
            archives: Box::new(ZipOpener),
        }
    }

    pub fn with_reducer(mut self, reducer: impl FrameworkReducer + 'static) -> Self {
        self.reducer = Box::new(reducer);
        self
    }

    pub fn with_archives(mut self, archives: impl ArchiveOpener + 'static) -> Self {
        self.archives = Box::new(archives);
        self
    }

    pub fn config(&self) -> &DeployConfig {
        &self.config
    }

    /// The content group `archive` would install into a `framework` project.
    pub fn select_group(
        &self,
        framework: &Framework,
        archive: &dyn PackageArchive,
    ) -> Result<Option<FrameworkSpecificGroup>> {
        let groups = content_groups(archive);
        most_compatible_group(framework, &groups, self.reducer.as_ref())
    }

    pub fn install_package(
        &self,
        project: &mut dyn ProjectTree,
        context: &dyn ProjectContext,
        package: &Path,
    ) -> Result<InstallReport> {
        let mut archive = self.archives.open(package)?;
        let Some(group) = self.select_group(project.target_framework(), archive.as_ref())? else {
            notify(
                context,
                MessageLevel::Info,
                &format!(
                    "{} has no content compatible with {}",
                    package.display(),
                    project.target_framework()
                ),
            );
            return Ok(InstallReport::default());
        };

        let transforms = self.config.transform_registry();
        PackageInstaller::new(&transforms).install(project, context, archive.as_mut(), &group)
    }

    /// Uninstall `package`, consulting `other_packages` for shared content.
    ///
    /// Only opening the package itself and selecting its group can fail;
    /// everything after that is best effort.
    pub fn uninstall_package<I>(
        &self,
        project: &mut dyn ProjectTree,
        context: &dyn ProjectContext,
        package: &Path,
        other_packages: I,
    ) -> Result<UninstallReport>
    where
        I: IntoIterator<Item = PathBuf>,
    {
        let mut archive = self.archives.open(package)?;
        let Some(group) = self.select_group(project.target_framework(), archive.as_ref())? else {
            info!("{} has no compatible content to remove", package.display());
            return Ok(UninstallReport::default());
        };

        let transforms = self.config.transform_registry();
        let uninstaller =
            PackageUninstaller::new(&transforms, self.reducer.as_ref(), self.archives.as_ref())
                .with_retry(self.config.retry_policy())
                .with_settle(self.config.settle_policy());
        Ok(uninstaller.uninstall(project, context, archive.as_mut(), &group, other_packages))
    }
}

impl Default for ContentDeployer {
    fn default() -> Self {
        Self::new(DeployConfig::default())
    }
}
