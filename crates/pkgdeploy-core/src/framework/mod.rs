//! Target framework monikers and content-group selection.
//!
//! A [`Framework`] is either the universal `any` marker or a named family
//! with a version (`net45`, `netstandard2.0`, `net6.0-windows`). The
//! compatibility relation itself is a pluggable capability
//! ([`FrameworkReducer`]); [`DefaultReducer`] covers the common families.

pub mod group;
pub mod reducer;

use std::fmt;
use std::str::FromStr;

use semver::Version;

use crate::error::{DeployError, Result};

pub use group::{FrameworkSpecificGroup, effective_path, most_compatible_group};
pub use reducer::{DefaultReducer, FrameworkReducer};

const KNOWN_FAMILIES: &[&str] = &[
    "net",
    "netstandard",
    "netcoreapp",
    "netcore",
    "uap",
    "win",
    "wp",
    "sl",
    "native",
];

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Framework {
    /// Universal content with no framework folder.
    Any,
    Named {
        family: String,
        version: Version,
        profile: Option<String>,
    },
}

impl Framework {
    pub fn named(family: &str, version: Version) -> Self {
        Framework::Named {
            family: family.to_ascii_lowercase(),
            version,
            profile: None,
        }
    }

    pub fn is_any(&self) -> bool {
        matches!(self, Framework::Any)
    }

    pub fn family(&self) -> Option<&str> {
        match self {
            Framework::Any => None,
            Framework::Named { family, .. } => Some(family),
        }
    }

    pub fn version(&self) -> Option<&Version> {
        match self {
            Framework::Any => None,
            Framework::Named { version, .. } => Some(version),
        }
    }

    pub fn profile(&self) -> Option<&str> {
        match self {
            Framework::Any => None,
            Framework::Named { profile, .. } => profile.as_deref(),
        }
    }

    /// Parse a short folder name such as `net451`, `netstandard2.0` or `any`.
    pub fn parse(moniker: &str) -> Result<Self> {
        let lower = moniker.trim().to_ascii_lowercase();
        if lower == "any" {
            return Ok(Framework::Any);
        }

        let (base, profile) = match lower.split_once('-') {
            Some((base, profile)) if !profile.is_empty() => (base, Some(profile.to_string())),
            Some(_) => return Err(DeployError::InvalidFramework(moniker.to_string())),
            None => (lower.as_str(), None),
        };

        let split = base
            .find(|c: char| !c.is_ascii_alphabetic())
            .unwrap_or(base.len());
        let (family, digits) = base.split_at(split);
        if !KNOWN_FAMILIES.contains(&family) {
            return Err(DeployError::InvalidFramework(moniker.to_string()));
        }

        let version = parse_version(digits)
            .ok_or_else(|| DeployError::InvalidFramework(moniker.to_string()))?;

        Ok(Framework::Named {
            family: family.to_string(),
            version,
            profile,
        })
    }
}

/// `451` reads as 4.5.1, `4.5` and `2.0` as dotted; empty reads as 0.0.
fn parse_version(digits: &str) -> Option<Version> {
    if digits.is_empty() {
        return Some(Version::new(0, 0, 0));
    }

    let parts: Vec<u64> = if digits.contains('.') {
        digits
            .split('.')
            .map(|part| part.parse::<u64>().ok())
            .collect::<Option<Vec<_>>>()?
    } else {
        digits
            .chars()
            .map(|c| c.to_digit(10).map(u64::from))
            .collect::<Option<Vec<_>>>()?
    };

    match parts.as_slice() {
        [major] => Some(Version::new(*major, 0, 0)),
        [major, minor] => Some(Version::new(*major, *minor, 0)),
        [major, minor, patch] => Some(Version::new(*major, *minor, *patch)),
        _ => None,
    }
}

impl FromStr for Framework {
    type Err = DeployError;

    fn from_str(s: &str) -> Result<Self> {
        Framework::parse(s)
    }
}

impl fmt::Display for Framework {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Framework::Any => write!(f, "any"),
            Framework::Named {
                family,
                version,
                profile,
            } => {
                if family == "net" && version.major < 5 {
                    write!(f, "net{}{}", version.major, version.minor)?;
                    if version.patch > 0 {
                        write!(f, "{}", version.patch)?;
                    }
                } else {
                    write!(f, "{}{}.{}", family, version.major, version.minor)?;
                    if version.patch > 0 {
                        write!(f, ".{}", version.patch)?;
                    }
                }
                if let Some(profile) = profile {
                    write!(f, "-{}", profile)?;
                }
                Ok(())
            }
        }
    }
}
