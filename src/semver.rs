//! Semantic version parsing and ordering for module and provider versions.
//!
//! Versions take the form `MAJOR.MINOR.PATCH[-PRERELEASE]`. A pre-release
//! suffix marks the version beta. Released versions sort greater than any
//! pre-release of the same `MAJOR.MINOR.PATCH`.

use std::cmp::Ordering;
use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use thiserror::Error;

static VERSION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d+)\.(\d+)\.(\d+)(?:-([0-9A-Za-z][0-9A-Za-z.\-]*))?$")
        .expect("version regex is valid")
});

/// Error raised for version strings that do not parse as semver.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("invalid semantic version '{0}'")]
pub struct InvalidVersion(pub String);

/// A parsed semantic version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Semver {
    pub major: u64,
    pub minor: u64,
    pub patch: u64,
    pub prerelease: Option<String>,
}

impl Semver {
    /// Parse a version string. Leading `v` prefixes are rejected; the tag
    /// format template is responsible for stripping them before storage.
    pub fn parse(value: &str) -> Result<Self, InvalidVersion> {
        let caps = VERSION_RE
            .captures(value)
            .ok_or_else(|| InvalidVersion(value.to_string()))?;

        let number = |idx: usize| -> Result<u64, InvalidVersion> {
            caps.get(idx)
                .expect("mandatory capture group")
                .as_str()
                .parse()
                .map_err(|_| InvalidVersion(value.to_string()))
        };

        Ok(Self {
            major: number(1)?,
            minor: number(2)?,
            patch: number(3)?,
            prerelease: caps.get(4).map(|m| m.as_str().to_string()),
        })
    }

    /// A version with a pre-release suffix is beta.
    pub fn is_beta(&self) -> bool {
        self.prerelease.is_some()
    }
}

impl fmt::Display for Semver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)?;
        if let Some(pre) = &self.prerelease {
            write!(f, "-{}", pre)?;
        }
        Ok(())
    }
}

impl Ord for Semver {
    fn cmp(&self, other: &Self) -> Ordering {
        self.major
            .cmp(&other.major)
            .then_with(|| self.minor.cmp(&other.minor))
            .then_with(|| self.patch.cmp(&other.patch))
            .then_with(|| match (&self.prerelease, &other.prerelease) {
                (None, None) => Ordering::Equal,
                // A release outranks any pre-release of the same triple.
                (None, Some(_)) => Ordering::Greater,
                (Some(_), None) => Ordering::Less,
                (Some(a), Some(b)) => compare_prerelease(a, b),
            })
    }
}

impl PartialOrd for Semver {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Semver pre-release precedence: dot-separated identifiers compared left to
/// right, numeric identifiers numerically and below alphanumeric ones, a
/// shorter identifier list sorting first when all shared identifiers tie.
fn compare_prerelease(a: &str, b: &str) -> Ordering {
    let mut left = a.split('.');
    let mut right = b.split('.');

    loop {
        match (left.next(), right.next()) {
            (None, None) => return Ordering::Equal,
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(l), Some(r)) => {
                let ord = match (l.parse::<u64>(), r.parse::<u64>()) {
                    (Ok(ln), Ok(rn)) => ln.cmp(&rn),
                    (Ok(_), Err(_)) => Ordering::Less,
                    (Err(_), Ok(_)) => Ordering::Greater,
                    (Err(_), Err(_)) => l.cmp(r),
                };
                if ord != Ordering::Equal {
                    return ord;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_release_and_prerelease() {
        let v = Semver::parse("1.2.3").unwrap();
        assert_eq!((v.major, v.minor, v.patch), (1, 2, 3));
        assert!(!v.is_beta());

        let beta = Semver::parse("2.0.0-beta.1").unwrap();
        assert!(beta.is_beta());
        assert_eq!(beta.prerelease.as_deref(), Some("beta.1"));
    }

    #[test]
    fn rejects_malformed_versions() {
        for bad in ["v1.2.3", "1.2", "1.2.3.4", "1.2.x", "", "1.2.3-"] {
            assert!(Semver::parse(bad).is_err(), "{bad} should not parse");
        }
    }

    #[test]
    fn release_sorts_above_its_prereleases() {
        let release = Semver::parse("1.0.0").unwrap();
        let rc = Semver::parse("1.0.0-rc.1").unwrap();
        let alpha = Semver::parse("1.0.0-alpha").unwrap();
        assert!(release > rc);
        assert!(rc > alpha);
    }

    #[test]
    fn numeric_components_compare_numerically() {
        assert!(Semver::parse("1.10.0").unwrap() > Semver::parse("1.9.9").unwrap());
        assert!(Semver::parse("10.0.0").unwrap() > Semver::parse("9.99.99").unwrap());
    }

    #[test]
    fn prerelease_precedence_follows_semver() {
        let ordered = [
            "1.0.0-alpha",
            "1.0.0-alpha.1",
            "1.0.0-alpha.beta",
            "1.0.0-beta",
            "1.0.0-beta.2",
            "1.0.0-beta.11",
            "1.0.0-rc.1",
            "1.0.0",
        ];
        for pair in ordered.windows(2) {
            let lo = Semver::parse(pair[0]).unwrap();
            let hi = Semver::parse(pair[1]).unwrap();
            assert!(lo < hi, "{} should sort below {}", pair[0], pair[1]);
        }
    }

    #[test]
    fn display_round_trips() {
        for s in ["0.0.1", "1.2.3-beta", "4.5.6-rc.2"] {
            assert_eq!(Semver::parse(s).unwrap().to_string(), s);
        }
    }
}
