//! Size regression policy

use std::fmt;

use tracing::debug;

use crate::diff::SizeDiff;

/// Growth limits in bytes. Zero disables a check.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Thresholds {
    /// Maximum allowed growth of the whole package
    pub package: u64,
    /// Per-assembly growth limit. Accepted but not enforced.
    pub assembly: u64,
}

impl Thresholds {
    /// Whether any threshold was requested
    #[must_use]
    pub fn is_set(&self) -> bool {
        self.package != 0 || self.assembly != 0
    }
}

/// A package that grew past its threshold
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Regression {
    pub threshold: u64,
    pub first_size: u64,
    pub second_size: u64,
}

impl fmt::Display for Regression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "PackageSize differ more than {} bytes. apk1 size: {} bytes, apk2 size: {} bytes.",
            self.threshold, self.first_size, self.second_size
        )
    }
}

/// Result of applying the policy to a comparison
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Verdict {
    pub regressions: Vec<Regression>,
}

impl Verdict {
    #[must_use]
    pub fn passed(&self) -> bool {
        self.regressions.is_empty()
    }
}

/// Checks a comparison against [`Thresholds`]
#[derive(Debug, Default, Clone, Copy)]
pub struct RegressionPolicy {
    thresholds: Thresholds,
}

impl RegressionPolicy {
    #[must_use]
    pub fn new(thresholds: Thresholds) -> Self {
        Self { thresholds }
    }

    #[must_use]
    pub fn thresholds(&self) -> Thresholds {
        self.thresholds
    }

    /// Evaluate the package-level delta of `diff`. Shrinkage never regresses.
    #[must_use]
    pub fn check(&self, diff: &SizeDiff) -> Verdict {
        let mut verdict = Verdict::default();

        if self.thresholds.assembly != 0 {
            debug!(
                "Assembly size regression threshold of {} bytes is not enforced",
                self.thresholds.assembly
            );
        }

        let threshold = self.thresholds.package;
        if threshold != 0 && i128::from(diff.package_delta()) > i128::from(threshold) {
            verdict.regressions.push(Regression {
                threshold,
                first_size: diff.first_package_size,
                second_size: diff.second_package_size,
            });
        }

        verdict
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Snapshot;

    fn diff_of(first: u64, second: u64) -> SizeDiff {
        let a = Snapshot::from_entries([("a", 1)]).with_package_size(first);
        let b = Snapshot::from_entries([("a", 1)]).with_package_size(second);
        SizeDiff::compute(&a, &b)
    }

    fn policy(package: u64) -> RegressionPolicy {
        RegressionPolicy::new(Thresholds {
            package,
            assembly: 0,
        })
    }

    #[test]
    fn test_growth_over_threshold_regresses() {
        let verdict = policy(100).check(&diff_of(6000, 6250));
        assert!(!verdict.passed());
        assert_eq!(
            verdict.regressions[0].to_string(),
            "PackageSize differ more than 100 bytes. apk1 size: 6000 bytes, apk2 size: 6250 bytes."
        );
    }

    #[test]
    fn test_growth_equal_to_threshold_passes() {
        assert!(policy(250).check(&diff_of(6000, 6250)).passed());
    }

    #[test]
    fn test_shrinkage_never_regresses() {
        assert!(policy(1).check(&diff_of(6250, 1000)).passed());
    }

    #[test]
    fn test_zero_threshold_disables_check() {
        assert!(policy(0).check(&diff_of(0, 1_000_000)).passed());
    }

    #[test]
    fn test_assembly_threshold_is_not_enforced() {
        let policy = RegressionPolicy::new(Thresholds {
            package: 0,
            assembly: 1,
        });
        assert!(policy.thresholds().is_set());
        assert!(policy.check(&diff_of(0, 1_000_000)).passed());
    }
}
