//! Which other installed packages contribute to a given effective path.

use std::collections::HashMap;
use std::path::PathBuf;

use tracing::debug;

use super::recover;
use crate::error::{DeployError, Result};
use crate::framework::{Framework, FrameworkReducer, FrameworkSpecificGroup, effective_path, most_compatible_group};
use crate::package::{ArchiveOpener, OtherPackageReference, content_groups, is_empty_folder_marker};
use crate::project::ProjectContext;

/// Lazily yields each other installed package together with the content
/// group it would install into the project. Each archive is released
/// before the next is opened; packages with nothing compatible are passed
/// over. The sequence is consumed once.
pub struct InstalledGroups<'a, I> {
    packages: I,
    project_framework: Framework,
    reducer: &'a dyn FrameworkReducer,
    archives: &'a dyn ArchiveOpener,
}

impl<'a, I> InstalledGroups<'a, I>
where
    I: Iterator<Item = PathBuf>,
{
    pub fn new(
        packages: I,
        project_framework: Framework,
        reducer: &'a dyn FrameworkReducer,
        archives: &'a dyn ArchiveOpener,
    ) -> Self {
        Self {
            packages,
            project_framework,
            reducer,
            archives,
        }
    }
}

impl<I> Iterator for InstalledGroups<'_, I>
where
    I: Iterator<Item = PathBuf>,
{
    type Item = Result<(PathBuf, FrameworkSpecificGroup)>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let location = self.packages.next()?;
            let groups = match self.archives.open(&location) {
                Ok(archive) => content_groups(archive.as_ref()),
                Err(e) => return Some(Err(e)),
            };

            match most_compatible_group(&self.project_framework, &groups, self.reducer) {
                Ok(Some(group)) => return Some(Ok((location, group))),
                Ok(None) => {
                    debug!("{} has no compatible content", location.display());
                }
                Err(e) => return Some(Err(e)),
            }
        }
    }
}

/// Effective path (case-insensitive) to the other packages' items that
/// land there.
#[derive(Debug, Default)]
pub struct OwnerIndex {
    owners: HashMap<String, Vec<OtherPackageReference>>,
}

impl OwnerIndex {
    pub fn build<I>(groups: I, context: &dyn ProjectContext, recovered: &mut Vec<DeployError>) -> Self
    where
        I: IntoIterator<Item = Result<(PathBuf, FrameworkSpecificGroup)>>,
    {
        let mut index = Self::default();
        for entry in groups {
            let (location, group) = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    recover(context, recovered, e);
                    continue;
                }
            };
            for item in group.items() {
                if is_empty_folder_marker(item) {
                    continue;
                }
                let key = effective_path(group.target_framework(), item).to_lowercase();
                index
                    .owners
                    .entry(key)
                    .or_default()
                    .push(OtherPackageReference::new(location.clone(), item.clone()));
            }
        }
        debug!("Indexed {} shared path(s) from other packages", index.owners.len());
        index
    }

    pub fn owners_of(&self, effective: &str) -> &[OtherPackageReference] {
        self.owners
            .get(&effective.to_lowercase())
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn len(&self) -> usize {
        self.owners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.owners.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::framework::DefaultReducer;
    use crate::package::PackageArchive;
    use crate::project::BatchContext;
    use std::path::Path;

    #[derive(Default)]
    struct FakeOpener {
        packages: HashMap<PathBuf, Vec<String>>,
    }

    struct Listed(Vec<String>);

    impl PackageArchive for Listed {
        fn entry_names(&self) -> Vec<String> {
            self.0.clone()
        }

        fn find_entry(&self, path: &str) -> Option<String> {
            self.0.iter().find(|name| name.eq_ignore_ascii_case(path)).cloned()
        }

        fn read_entry(&mut self, name: &str) -> Result<Vec<u8>> {
            Ok(name.as_bytes().to_vec())
        }
    }

    impl ArchiveOpener for FakeOpener {
        fn open(&self, location: &Path) -> Result<Box<dyn PackageArchive>> {
            let names = self
                .packages
                .get(location)
                .ok_or_else(|| DeployError::EntryNotFound(location.display().to_string()))?;
            Ok(Box::new(Listed(names.clone())))
        }
    }

    fn opener() -> FakeOpener {
        let mut opener = FakeOpener::default();
        opener.packages.insert(
            PathBuf::from("a.nupkg"),
            vec![
                "content/net40/web.config.transform".to_string(),
                "content/net45/web.config.transform".to_string(),
            ],
        );
        opener.packages.insert(
            PathBuf::from("b.nupkg"),
            vec!["content/Web.Config.transform".to_string(), "content/_._".to_string()],
        );
        opener
            .packages
            .insert(PathBuf::from("c.nupkg"), vec!["content/net6.0/app.json".to_string()]);
        opener
    }

    #[test]
    fn yields_compatible_groups_lazily() {
        let opener = opener();
        let packages = vec![PathBuf::from("a.nupkg"), PathBuf::from("c.nupkg")];
        let mut groups = InstalledGroups::new(
            packages.into_iter(),
            Framework::parse("net451").unwrap(),
            &DefaultReducer,
            &opener,
        );

        let (location, group) = groups.next().unwrap().unwrap();
        assert_eq!(location, PathBuf::from("a.nupkg"));
        assert_eq!(group.items(), ["content/net45/web.config.transform"]);
        // c.nupkg only targets net6.0
        assert!(groups.next().is_none());
    }

    #[test]
    fn index_matches_effective_paths_case_insensitively() {
        let opener = opener();
        let context = BatchContext::default();
        let mut recovered = Vec::new();
        let packages = vec![
            PathBuf::from("a.nupkg"),
            PathBuf::from("b.nupkg"),
            PathBuf::from("missing.nupkg"),
        ];

        let index = OwnerIndex::build(
            InstalledGroups::new(
                packages.into_iter(),
                Framework::parse("net451").unwrap(),
                &DefaultReducer,
                &opener,
            ),
            &context,
            &mut recovered,
        );

        let owners = index.owners_of("web.config.transform");
        assert_eq!(owners.len(), 2);
        assert_eq!(owners[0].archive, PathBuf::from("a.nupkg"));
        assert_eq!(owners[1].item, "content/Web.Config.transform");
        assert!(index.owners_of("_._").is_empty());
        assert_eq!(recovered.len(), 1);
    }
}
