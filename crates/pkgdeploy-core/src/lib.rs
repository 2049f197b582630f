//! pkgdeploy Core Library
//!
//! Deploys the content of framework-targeted packages into a project tree
//! and removes it again: compatible group selection, content transforms,
//! conflict handling and best-effort cleanup of files and directories.

pub mod config;
pub mod deploy;
pub mod error;
pub mod framework;
pub mod fs;
pub mod package;
pub mod project;
pub mod transform;

/// Re-exports of commonly used types
pub mod prelude {
    // Configuration
    pub use crate::config::{DeployConfig, parse_deploy_toml, parse_deploy_toml_str};

    // Errors
    pub use crate::error::{DeployError, Result};

    // Frameworks
    pub use crate::framework::{
        DefaultReducer, Framework, FrameworkReducer, FrameworkSpecificGroup, effective_path,
        most_compatible_group,
    };

    // Packages
    pub use crate::package::{ArchiveOpener, PackageArchive, ZipOpener, ZipPackage, content_groups};

    // Project collaborators
    pub use crate::project::{
        BatchContext, FileConflictAction, FileSystemProject, MessageLevel, ProjectContext,
        ProjectTree,
    };

    // Transforms
    pub use crate::transform::{
        TransformDirection, TransformExtensionPair, TransformRegistry, Transformer,
    };

    // Deployment
    pub use crate::deploy::{
        ContentDeployer, InstallReport, PackageInstaller, PackageUninstaller, UninstallReport,
    };
}
