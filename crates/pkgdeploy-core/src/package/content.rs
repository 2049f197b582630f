//! Content groups declared by a package archive.

use std::collections::BTreeMap;

use super::archive::PackageArchive;
use super::{CONTENT_DIRECTORY, is_package_file};
use crate::framework::{Framework, FrameworkSpecificGroup};

/// Group the archive's `content/` entries by target framework.
///
/// `content/<framework>/...` entries belong to that framework when the
/// folder parses as a named framework; everything else under `content/`
/// belongs to the `any` group.
pub fn content_groups(archive: &dyn PackageArchive) -> Vec<FrameworkSpecificGroup> {
    let mut groups: BTreeMap<Framework, Vec<String>> = BTreeMap::new();

    for name in archive.entry_names() {
        let normalized = name.replace('\\', "/");
        if !is_package_file(&normalized) {
            continue;
        }
        let Some(rest) = strip_content_root(&normalized) else {
            continue;
        };

        let framework = match rest.split_once('/') {
            Some((folder, tail)) if !tail.is_empty() => match Framework::parse(folder) {
                Ok(framework @ Framework::Named { .. }) => framework,
                _ => Framework::Any,
            },
            _ => Framework::Any,
        };
        groups.entry(framework).or_default().push(name);
    }

    groups
        .into_iter()
        .map(|(framework, items)| FrameworkSpecificGroup::new(framework, items))
        .collect()
}

fn strip_content_root(path: &str) -> Option<&str> {
    let prefix_len = CONTENT_DIRECTORY.len() + 1;
    let head = path.as_bytes().get(..prefix_len)?;
    let matches = head[..CONTENT_DIRECTORY.len()].eq_ignore_ascii_case(CONTENT_DIRECTORY.as_bytes())
        && head[CONTENT_DIRECTORY.len()] == b'/';
    matches.then(|| &path[prefix_len..])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Result;

    struct ListedArchive(Vec<&'static str>);

    impl PackageArchive for ListedArchive {
        fn entry_names(&self) -> Vec<String> {
            self.0.iter().map(|s| s.to_string()).collect()
        }

        fn find_entry(&self, path: &str) -> Option<String> {
            self.0
                .iter()
                .find(|name| name.eq_ignore_ascii_case(path))
                .map(|s| s.to_string())
        }

        fn read_entry(&mut self, _name: &str) -> Result<Vec<u8>> {
            Ok(Vec::new())
        }
    }

    #[test]
    fn groups_by_framework_folder() {
        let archive = ListedArchive(vec![
            "Contoso.nuspec",
            "lib/net45/Contoso.dll",
            "content/readme.txt",
            "content/net40/app.config.transform",
            "content/net45/app.config.transform",
            "content/net45/scripts/app.js",
            "content/images/logo.png",
        ]);

        let groups = content_groups(&archive);
        let labels: Vec<String> = groups
            .iter()
            .map(|g| g.target_framework().to_string())
            .collect();
        assert_eq!(labels, vec!["any", "net40", "net45"]);

        assert_eq!(
            groups[0].items(),
            ["content/readme.txt", "content/images/logo.png"]
        );
        assert_eq!(
            groups[2].items(),
            ["content/net45/app.config.transform", "content/net45/scripts/app.js"]
        );
    }

    #[test]
    fn package_without_content_has_no_groups() {
        let archive = ListedArchive(vec!["lib/net45/Contoso.dll", "_rels/.rels"]);
        assert!(content_groups(&archive).is_empty());
    }
}
