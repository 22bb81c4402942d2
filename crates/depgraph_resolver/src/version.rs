//! Version constraints and the (externally delegated) version-ordering
//! collaborator.
//!
//! §1 Non-goals: version ordering rules are delegated to a `VersionSelector`
//! collaborator. [`VersionSelector`] is that seam; [`ExactVersion`] and
//! [`VersionRange`] are the one concrete implementation this crate ships so
//! it is exercisable standalone (§10.5), not a restatement of the
//! ordering policy.

use std::fmt;

/// Matches or rejects a version string. Implemented externally in a real
/// build tool (semver ranges, exact pins, `+`-suffix "latest" selectors...);
/// this crate only needs `accepts`.
pub trait VersionSelector: fmt::Debug + Send + Sync {
    fn accepts(&self, version: &str) -> bool;
}

/// Matches exactly one version string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExactVersion(pub String);

impl VersionSelector for ExactVersion {
    fn accepts(&self, version: &str) -> bool {
        self.0 == version
    }
}

/// A `[min, max)` style range over dot-separated numeric versions, falling
/// back to lexicographic comparison for anything that doesn't parse as
/// numeric components. This is intentionally the simplest thing that could
/// work; real version ordering is out of scope (§1 Non-goals).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionRange {
    pub min: Option<String>,
    pub max: Option<String>,
    pub max_inclusive: bool,
}

fn parts(v: &str) -> Vec<u64> {
    v.split('.').filter_map(|p| p.parse().ok()).collect()
}

fn cmp_versions(a: &str, b: &str) -> std::cmp::Ordering {
    let (pa, pb) = (parts(a), parts(b));
    if pa.is_empty() || pb.is_empty() {
        return a.cmp(b);
    }
    pa.cmp(&pb)
}

impl VersionSelector for VersionRange {
    fn accepts(&self, version: &str) -> bool {
        if let Some(min) = &self.min {
            if cmp_versions(version, min) == std::cmp::Ordering::Less {
                return false;
            }
        }
        if let Some(max) = &self.max {
            let ord = cmp_versions(version, max);
            let ok = if self.max_inclusive {
                ord != std::cmp::Ordering::Greater
            } else {
                ord == std::cmp::Ordering::Less
            };
            if !ok {
                return false;
            }
        }
        true
    }
}

/// Returns the greater of two version strings under the same fallback
/// ordering [`VersionRange`] uses.
pub fn max_version<'a>(a: &'a str, b: &'a str) -> &'a str {
    if cmp_versions(a, b) == std::cmp::Ordering::Less {
        b
    } else {
        a
    }
}

/// One side (preferred or rejected) of a [`VersionConstraint`]: the selector
/// itself plus whether it may be used to short-circuit compatible-selection
/// (§4.4) when a version is already chosen by some other selector.
#[derive(Debug, Clone)]
pub struct ConstraintSide {
    pub selector: std::sync::Arc<dyn VersionSelector>,
    pub can_short_circuit: bool,
}

impl ConstraintSide {
    pub fn new(selector: impl VersionSelector + 'static, can_short_circuit: bool) -> Self {
        Self {
            selector: std::sync::Arc::new(selector),
            can_short_circuit,
        }
    }
}

/// A dependency declaration's requested constraint: a preferred (accept) set
/// and an optional rejected (veto) set (§3).
#[derive(Debug, Clone, Default)]
pub struct VersionConstraint {
    pub preferred: Option<ConstraintSide>,
    pub rejected: Option<ConstraintSide>,
}

impl VersionConstraint {
    pub fn unconstrained() -> Self {
        Self::default()
    }

    pub fn new(preferred: ConstraintSide) -> Self {
        Self {
            preferred: Some(preferred),
            rejected: None,
        }
    }

    pub fn with_rejected(mut self, rejected: ConstraintSide) -> Self {
        self.rejected = Some(rejected);
        self
    }

    /// Does this constraint accept `version` outright (ignoring the
    /// short-circuit flag used by §4.4.1)?
    pub fn matches(&self, version: &str) -> bool {
        let preferred_ok = self
            .preferred
            .as_ref()
            .map_or(true, |p| p.selector.accepts(version));
        let not_rejected = self
            .rejected
            .as_ref()
            .map_or(true, |r| !r.selector.accepts(version));
        preferred_ok && not_rejected
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn range_is_half_open_by_default() {
        let r = VersionRange {
            min: Some("1.0".into()),
            max: Some("2.0".into()),
            max_inclusive: false,
        };
        assert!(r.accepts("1.0"));
        assert!(r.accepts("1.5"));
        assert!(!r.accepts("2.0"));
    }

    #[test]
    fn max_inclusive_range_accepts_upper_bound() {
        let r = VersionRange {
            min: Some("1.0".into()),
            max: Some("2.0".into()),
            max_inclusive: true,
        };
        assert!(r.accepts("2.0"));
    }

    #[test]
    fn exact_version_matches_only_itself() {
        let v = ExactVersion("1.2.3".into());
        assert!(v.accepts("1.2.3"));
        assert!(!v.accepts("1.2.4"));
    }

    #[test]
    fn max_version_picks_higher() {
        assert_eq!(max_version("1.0", "1.2"), "1.2");
        assert_eq!(max_version("2.0", "1.9"), "2.0");
    }
}
