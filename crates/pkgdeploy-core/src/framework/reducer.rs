//! Nearest-framework selection.

use semver::Version;

use super::Framework;

/// Picks the candidate framework nearest to a project's framework.
///
/// Returns `None` when no candidate is compatible.
pub trait FrameworkReducer {
    fn nearest(&self, project: &Framework, candidates: &[Framework]) -> Option<Framework>;
}

/// Compatibility rules for the common framework families.
///
/// Ranking, best first:
/// - same family, version `<=` the project's (`net4x` and `net5+` are
///   different families)
/// - a foreign family the project can consume (`net5+` takes `netcoreapp`
///   before `netstandard`; `netcoreapp`, `uap10` and `net461+` take
///   `netstandard` up to the supported version)
/// - `any`
///
/// Inside a tier the highest version wins, and an exact profile beats a
/// profile-less candidate.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultReducer;

impl FrameworkReducer for DefaultReducer {
    fn nearest(&self, project: &Framework, candidates: &[Framework]) -> Option<Framework> {
        candidates
            .iter()
            .filter_map(|candidate| rank(project, candidate).map(|tier| (tier, candidate)))
            .max_by(|(tier_a, a), (tier_b, b)| {
                tier_a
                    .cmp(tier_b)
                    .then_with(|| a.version().cmp(&b.version()))
                    .then_with(|| a.profile().is_some().cmp(&b.profile().is_some()))
            })
            .map(|(_, candidate)| candidate.clone())
    }
}

const TIER_ANY: u8 = 0;
const TIER_NETSTANDARD: u8 = 1;
const TIER_NETCOREAPP: u8 = 2;
const TIER_SAME_FAMILY: u8 = 3;

fn rank(project: &Framework, candidate: &Framework) -> Option<u8> {
    let Framework::Named {
        family: candidate_family,
        version: candidate_version,
        profile: candidate_profile,
    } = candidate
    else {
        return Some(TIER_ANY);
    };
    let Framework::Named {
        family,
        version,
        profile,
    } = project
    else {
        return None;
    };

    if candidate_profile.is_some() && candidate_profile != profile {
        return None;
    }

    if lineage(candidate_family, candidate_version) == lineage(family, version) {
        return (candidate_version <= version).then_some(TIER_SAME_FAMILY);
    }

    match (family.as_str(), candidate_family.as_str()) {
        ("net", "netcoreapp") if version.major >= 5 => Some(TIER_NETCOREAPP),
        ("net" | "netcoreapp" | "uap", "netstandard") => {
            let supported = max_netstandard(family, version)?;
            (*candidate_version <= supported).then_some(TIER_NETSTANDARD)
        }
        _ => None,
    }
}

/// `net` names both .NET Framework (`net48`) and .NET 5+ (`net6.0`); the
/// two never consume each other's content.
fn lineage<'f>(family: &'f str, version: &Version) -> &'f str {
    match family {
        "net" if version.major < 5 => "netframework",
        other => other,
    }
}

fn max_netstandard(family: &str, version: &Version) -> Option<Version> {
    let at_least = |major, minor| *version >= Version::new(major, minor, 0);
    match family {
        "net" if at_least(5, 0) => Some(Version::new(2, 1, 0)),
        "net" if *version >= Version::new(4, 6, 1) => Some(Version::new(2, 0, 0)),
        "netcoreapp" if at_least(3, 0) => Some(Version::new(2, 1, 0)),
        "netcoreapp" if at_least(2, 0) => Some(Version::new(2, 0, 0)),
        "netcoreapp" => Some(Version::new(1, 6, 0)),
        "uap" if at_least(10, 0) => Some(Version::new(2, 0, 0)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fw(moniker: &str) -> Framework {
        Framework::parse(moniker).unwrap()
    }

    fn nearest(project: &str, candidates: &[&str]) -> Option<String> {
        let candidates: Vec<Framework> = candidates.iter().map(|c| fw(c)).collect();
        DefaultReducer
            .nearest(&fw(project), &candidates)
            .map(|f| f.to_string())
    }

    #[test]
    fn picks_highest_compatible_version_in_family() {
        assert_eq!(
            nearest("net451", &["net40", "net45", "any"]).as_deref(),
            Some("net45")
        );
        assert_eq!(nearest("net45", &["net40", "net451"]).as_deref(), Some("net40"));
    }

    #[test]
    fn falls_back_to_any() {
        assert_eq!(nearest("net35", &["net40", "any"]).as_deref(), Some("any"));
    }

    #[test]
    fn no_compatible_candidate() {
        assert_eq!(nearest("netcoreapp1.0", &["net45", "net40"]), None);
        assert_eq!(nearest("net40", &[]), None);
    }

    #[test]
    fn modern_net_prefers_netcoreapp_over_netstandard() {
        assert_eq!(
            nearest("net6.0", &["netstandard2.0", "netcoreapp3.1", "any"]).as_deref(),
            Some("netcoreapp3.1")
        );
        assert_eq!(
            nearest("net6.0", &["net5.0", "netcoreapp3.1"]).as_deref(),
            Some("net5.0")
        );
    }

    #[test]
    fn modern_net_never_takes_net_framework_content() {
        assert_eq!(
            nearest("net6.0", &["net48", "netstandard2.0"]).as_deref(),
            Some("netstandard2.0")
        );
        assert_eq!(nearest("net6.0", &["net45"]), None);
        assert_eq!(nearest("net48", &["net5.0"]), None);
        assert_eq!(
            nearest("net8.0", &["net48", "net5.0", "any"]).as_deref(),
            Some("net5.0")
        );
    }

    #[test]
    fn netstandard_support_is_capped() {
        assert_eq!(
            nearest("net461", &["netstandard2.0"]).as_deref(),
            Some("netstandard2.0")
        );
        assert_eq!(nearest("net461", &["netstandard2.1"]), None);
        assert_eq!(nearest("net45", &["netstandard1.0"]), None);
    }

    #[test]
    fn profiles_must_match() {
        assert_eq!(
            nearest("net6.0-windows", &["net6.0", "net6.0-windows"]).as_deref(),
            Some("net6.0-windows")
        );
        assert_eq!(nearest("net6.0", &["net6.0-windows"]), None);
    }

    #[test]
    fn any_project_only_takes_any() {
        assert_eq!(
            DefaultReducer
                .nearest(&Framework::Any, &[fw("net45"), Framework::Any])
                .map(|f| f.to_string())
                .as_deref(),
            Some("any")
        );
    }
}
