//! Framework-specific content groups and effective project paths.

use super::{Framework, FrameworkReducer};
use crate::error::{DeployError, Result};
use crate::package::{CONTENT_DIRECTORY, is_package_file};

/// A target framework paired with the package-relative paths built for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameworkSpecificGroup {
    target_framework: Framework,
    items: Vec<String>,
}

impl FrameworkSpecificGroup {
    pub fn new<I, S>(target_framework: Framework, items: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            target_framework,
            items: items.into_iter().map(Into::into).collect(),
        }
    }

    pub fn target_framework(&self) -> &Framework {
        &self.target_framework
    }

    pub fn items(&self) -> &[String] {
        &self.items
    }

    /// An empty group only makes sense as the explicit `any` marker.
    pub fn is_valid(&self) -> bool {
        !self.items.is_empty() || self.target_framework.is_any()
    }
}

/// Select the group nearest to `project` among the valid `groups`.
///
/// Returns `Ok(None)` when nothing is compatible. Two valid groups sharing
/// the nearest label is a package authoring error.
pub fn most_compatible_group<'a, I>(
    project: &Framework,
    groups: I,
    reducer: &dyn FrameworkReducer,
) -> Result<Option<FrameworkSpecificGroup>>
where
    I: IntoIterator<Item = &'a FrameworkSpecificGroup>,
{
    let valid: Vec<&FrameworkSpecificGroup> =
        groups.into_iter().filter(|group| group.is_valid()).collect();
    let frameworks: Vec<Framework> = valid
        .iter()
        .map(|group| group.target_framework.clone())
        .collect();

    let Some(nearest) = reducer.nearest(project, &frameworks) else {
        return Ok(None);
    };

    let mut matches = valid
        .into_iter()
        .filter(|group| group.target_framework == nearest);
    let Some(selected) = matches.next() else {
        return Ok(None);
    };
    if matches.next().is_some() {
        return Err(DeployError::AmbiguousGroups(nearest.to_string()));
    }

    let items = selected
        .items
        .iter()
        .map(|item| item.replace('\\', "/"))
        .filter(|item| is_package_file(item));
    Ok(Some(FrameworkSpecificGroup::new(nearest, items)))
}

/// Project-relative path for a package item.
///
/// Strips the `content/` root and, for framework-specific groups, the
/// framework folder that follows it. Items outside `content/` are returned
/// unchanged apart from separator normalization.
pub fn effective_path(framework: &Framework, item: &str) -> String {
    let normalized = item.replace('\\', "/");
    let prefix_len = CONTENT_DIRECTORY.len() + 1;

    let has_content_root = normalized.as_bytes().get(..prefix_len).is_some_and(|head| {
        head[..CONTENT_DIRECTORY.len()].eq_ignore_ascii_case(CONTENT_DIRECTORY.as_bytes())
            && head[CONTENT_DIRECTORY.len()] == b'/'
    });
    if !has_content_root {
        return normalized;
    }

    let rest = &normalized[prefix_len..];
    if !framework.is_any()
        && let Some(idx) = rest.find('/')
        && rest.len() > idx + 1
    {
        return rest[idx + 1..].to_string();
    }
    rest.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::framework::DefaultReducer;

    fn fw(moniker: &str) -> Framework {
        Framework::parse(moniker).unwrap()
    }

    fn group(moniker: &str, items: &[&str]) -> FrameworkSpecificGroup {
        FrameworkSpecificGroup::new(fw(moniker), items.iter().copied())
    }

    #[test]
    fn empty_group_is_valid_only_for_any() {
        assert!(group("any", &[]).is_valid());
        assert!(!group("net45", &[]).is_valid());
        assert!(group("net45", &["content/net45/a.txt"]).is_valid());
    }

    #[test]
    fn selects_nearest_group() {
        let groups = vec![
            group("net40", &["content/net40/a.txt"]),
            group("net45", &["content/net45/a.txt"]),
            group("any", &["content/a.txt"]),
        ];
        let selected = most_compatible_group(&fw("net451"), &groups, &DefaultReducer)
            .unwrap()
            .unwrap();
        assert_eq!(selected.target_framework(), &fw("net45"));
        assert_eq!(selected.items(), ["content/net45/a.txt"]);
    }

    #[test]
    fn invalid_groups_are_not_candidates() {
        let groups = vec![
            group("net45", &[]),
            group("net40", &["content/net40/a.txt"]),
        ];
        let selected = most_compatible_group(&fw("net451"), &groups, &DefaultReducer)
            .unwrap()
            .unwrap();
        assert_eq!(selected.target_framework(), &fw("net40"));
    }

    #[test]
    fn returns_none_without_compatible_group() {
        let groups = vec![group("net45", &["content/net45/a.txt"])];
        let selected = most_compatible_group(&fw("net40"), &groups, &DefaultReducer).unwrap();
        assert!(selected.is_none());
    }

    #[test]
    fn duplicate_nearest_label_is_an_error() {
        let groups = vec![
            group("net45", &["content/net45/a.txt"]),
            group("net45", &["content/net45/b.txt"]),
        ];
        let err = most_compatible_group(&fw("net45"), &groups, &DefaultReducer).unwrap_err();
        assert!(matches!(err, DeployError::AmbiguousGroups(label) if label == "net45"));
    }

    #[test]
    fn selected_items_drop_package_metadata() {
        let groups = vec![group(
            "any",
            &["content\\readme.txt", "_rels/.rels", "Contoso.nuspec"],
        )];
        let selected = most_compatible_group(&fw("net45"), &groups, &DefaultReducer)
            .unwrap()
            .unwrap();
        assert_eq!(selected.items(), ["content/readme.txt"]);
    }

    #[test]
    fn effective_path_strips_content_root() {
        assert_eq!(
            effective_path(&Framework::Any, "content/lib/helper.txt"),
            "lib/helper.txt"
        );
        assert_eq!(
            effective_path(&Framework::Any, "Content\\readme.txt"),
            "readme.txt"
        );
    }

    #[test]
    fn effective_path_strips_framework_folder() {
        assert_eq!(
            effective_path(&fw("net45"), "content/net45/scripts/app.js"),
            "scripts/app.js"
        );
        // Nothing after the folder: keep the segment.
        assert_eq!(effective_path(&fw("net45"), "content/net45/"), "net45/");
        assert_eq!(effective_path(&fw("net45"), "content/readme.txt"), "readme.txt");
    }

    #[test]
    fn effective_path_outside_content_is_unchanged() {
        assert_eq!(effective_path(&Framework::Any, "tools/init.ps1"), "tools/init.ps1");
        assert_eq!(effective_path(&Framework::Any, "content"), "content");
    }
}
