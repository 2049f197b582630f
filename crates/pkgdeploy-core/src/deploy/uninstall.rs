//! Remove an installed content group from the project tree.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use super::owners::{InstalledGroups, OwnerIndex};
use super::recover;
use crate::error::DeployError;
use crate::framework::{FrameworkReducer, FrameworkSpecificGroup, effective_path};
use crate::fs::{
    DirectoryRemoval, FileRemoval, RetryPolicy, SettlePolicy, delete_directory_safe,
    delete_file_safe,
};
use crate::package::{ArchiveOpener, PackageArchive, is_empty_folder_marker};
use crate::project::{ProjectContext, ProjectTree};
use crate::transform::{RevertContext, TransformDirection, TransformMatch, TransformRegistry};

#[derive(Debug, Default)]
pub struct UninstallReport {
    pub removed: Vec<PathBuf>,
    /// Targets an uninstall transform was reverted on.
    pub reverted: Vec<PathBuf>,
    /// Files left in place because the user changed them.
    pub kept_modified: Vec<PathBuf>,
    pub removed_directories: Vec<PathBuf>,
    pub recovered: Vec<DeployError>,
}

/// One group item planned for removal.
struct PlannedItem<'r> {
    item: String,
    effective: String,
    target: PathBuf,
    transform: Option<TransformMatch<'r>>,
}

pub struct PackageUninstaller<'a> {
    transforms: &'a TransformRegistry,
    reducer: &'a dyn FrameworkReducer,
    archives: &'a dyn ArchiveOpener,
    retry: RetryPolicy,
    settle: SettlePolicy,
}

impl<'a> PackageUninstaller<'a> {
    pub fn new(
        transforms: &'a TransformRegistry,
        reducer: &'a dyn FrameworkReducer,
        archives: &'a dyn ArchiveOpener,
    ) -> Self {
        Self {
            transforms,
            reducer,
            archives,
            retry: RetryPolicy::default(),
            settle: SettlePolicy::default(),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_settle(mut self, settle: SettlePolicy) -> Self {
        self.settle = settle;
        self
    }

    /// Remove `group`'s files and any directories left empty.
    ///
    /// `other_packages` are the archives of the packages that stay
    /// installed. They are only opened if a file needs a transform revert.
    /// Nothing here aborts the call: each failure is logged and recorded.
    pub fn uninstall<I>(
        &self,
        project: &mut dyn ProjectTree,
        context: &dyn ProjectContext,
        archive: &mut dyn PackageArchive,
        group: &FrameworkSpecificGroup,
        other_packages: I,
    ) -> UninstallReport
    where
        I: IntoIterator<Item = PathBuf>,
    {
        let mut report = UninstallReport::default();
        let framework = group.target_framework();

        let mut by_directory: BTreeMap<PathBuf, Vec<PlannedItem<'_>>> = BTreeMap::new();
        for item in group.items() {
            let effective = effective_path(framework, item);
            let transform = self
                .transforms
                .find(&effective, TransformDirection::Uninstall);
            let truncated = transform
                .as_ref()
                .map(|hit| hit.truncated.clone())
                .unwrap_or_else(|| effective.clone());
            let target = match project.resolve_path(Path::new(&truncated)) {
                Ok(target) => target,
                Err(e) => {
                    recover(context, &mut report.recovered, DeployError::io(&truncated, e));
                    continue;
                }
            };
            let directory = target.parent().map(Path::to_path_buf).unwrap_or_default();
            by_directory.entry(directory).or_default().push(PlannedItem {
                item: item.clone(),
                effective,
                target,
                transform,
            });
        }

        let directories = self.candidate_directories(&*project, context, &by_directory, &mut report);
        info!(
            "Uninstalling {} item(s) across {} candidate directories from {}",
            group.items().len(),
            directories.len(),
            project.project_full_path().display()
        );

        let mut others = Some(other_packages.into_iter());
        let mut owners: Option<OwnerIndex> = None;

        for directory in directories {
            if !directory.as_os_str().is_empty() && !project.directory_exists(&directory) {
                continue;
            }

            for planned in by_directory.get(&directory).map(Vec::as_slice).unwrap_or(&[]) {
                if is_empty_folder_marker(&planned.item) {
                    continue;
                }
                if !project.is_supported_file(&planned.target) {
                    continue;
                }
                let Some(entry) = archive.find_entry(&planned.item) else {
                    debug!("{} is not in the package, skipping", planned.item);
                    continue;
                };
                let source = match archive.read_entry(&entry) {
                    Ok(source) => source,
                    Err(e) => {
                        recover(context, &mut report.recovered, e);
                        continue;
                    }
                };

                match &planned.transform {
                    Some(hit) => {
                        let index = owners.get_or_insert_with(|| {
                            let packages = others.take().into_iter().flatten();
                            OwnerIndex::build(
                                InstalledGroups::new(
                                    packages,
                                    project.target_framework().clone(),
                                    self.reducer,
                                    self.archives,
                                ),
                                context,
                                &mut report.recovered,
                            )
                        });
                        let revert_context =
                            RevertContext::new(index.owners_of(&planned.effective), self.archives);
                        match hit.transformer.revert(
                            &source,
                            &planned.target,
                            &revert_context,
                            project,
                            context,
                        ) {
                            Ok(()) => report.reverted.push(planned.target.clone()),
                            Err(e) => recover(
                                context,
                                &mut report.recovered,
                                DeployError::transform(&planned.target, e),
                            ),
                        }
                    }
                    None => match delete_file_safe(
                        project,
                        &planned.target,
                        &source,
                        &self.retry,
                        context,
                        &mut report.recovered,
                    ) {
                        FileRemoval::Removed => report.removed.push(planned.target.clone()),
                        FileRemoval::Modified => {
                            report.kept_modified.push(planned.target.clone())
                        }
                        FileRemoval::Absent | FileRemoval::Failed => {}
                    },
                }
            }

            // The project root itself is never removed.
            if directory.as_os_str().is_empty() {
                continue;
            }
            if self.directory_is_empty(&*project, &directory, context, &mut report)
                && delete_directory_safe(
                    project,
                    &directory,
                    &self.retry,
                    &self.settle,
                    context,
                    &mut report.recovered,
                ) == DirectoryRemoval::Removed
            {
                report.removed_directories.push(directory);
            }
        }

        report
    }

    /// Every directory the group's items live in, their ancestors, and the
    /// directories that physically exist below them, deepest first.
    fn candidate_directories(
        &self,
        project: &dyn ProjectTree,
        context: &dyn ProjectContext,
        by_directory: &BTreeMap<PathBuf, Vec<PlannedItem<'_>>>,
        report: &mut UninstallReport,
    ) -> Vec<PathBuf> {
        let mut directories = BTreeSet::new();
        for directory in by_directory.keys() {
            for ancestor in directory.ancestors() {
                directories.insert(ancestor.to_path_buf());
            }
            if directory.as_os_str().is_empty() {
                continue;
            }
            match project.list_directories(directory, true) {
                Ok(found) => directories.extend(found),
                Err(e) => recover(context, &mut report.recovered, DeployError::io(directory, e)),
            }
        }

        let mut directories: Vec<PathBuf> = directories.into_iter().collect();
        directories.sort_by(|a, b| {
            b.as_os_str()
                .len()
                .cmp(&a.as_os_str().len())
                .then_with(|| b.cmp(a))
        });
        directories
    }

    fn directory_is_empty(
        &self,
        project: &dyn ProjectTree,
        directory: &Path,
        context: &dyn ProjectContext,
        report: &mut UninstallReport,
    ) -> bool {
        let files = project.list_files(directory, false);
        let subdirectories = project.list_directories(directory, false);
        match (files, subdirectories) {
            (Ok(files), Ok(subdirectories)) => files.is_empty() && subdirectories.is_empty(),
            (Err(e), _) | (_, Err(e)) => {
                recover(context, &mut report.recovered, DeployError::io(directory, e));
                false
            }
        }
    }
}
