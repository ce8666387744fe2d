use serde::{Deserialize, Serialize};

use super::repository::RepositoryError;

const DEFAULT_DSR_THRESHOLD: f64 = 40.0;
const DEFAULT_SAVINGS_RATE_THRESHOLD: f64 = 20.0;
const DEFAULT_CONFIDENCE_THRESHOLD: f64 = 75.0;

/// Singleton review policy mutated through the admin settings endpoint.
/// Thresholds are percentages; out-of-range updates are sanitized back to
/// defaults rather than rejected, matching how the rest of the pipeline
/// degrades instead of erroring.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskPolicy {
    pub dsr_threshold: f64,
    pub savings_rate_threshold: f64,
    pub confidence_threshold: f64,
    pub notify_on_decision: bool,
    pub default_reviewer: String,
}

impl RiskPolicy {
    pub fn sanitized(mut self) -> Self {
        if !self.dsr_threshold.is_finite() || self.dsr_threshold <= 0.0 {
            self.dsr_threshold = DEFAULT_DSR_THRESHOLD;
        }
        if !self.savings_rate_threshold.is_finite() || self.savings_rate_threshold < 0.0 {
            self.savings_rate_threshold = DEFAULT_SAVINGS_RATE_THRESHOLD;
        }
        if !self.confidence_threshold.is_finite()
            || !(0.0..=100.0).contains(&self.confidence_threshold)
        {
            self.confidence_threshold = DEFAULT_CONFIDENCE_THRESHOLD;
        }
        if self.default_reviewer.trim().is_empty() {
            self.default_reviewer = Self::default().default_reviewer;
        }
        self
    }
}

impl Default for RiskPolicy {
    fn default() -> Self {
        Self {
            dsr_threshold: DEFAULT_DSR_THRESHOLD,
            savings_rate_threshold: DEFAULT_SAVINGS_RATE_THRESHOLD,
            confidence_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
            notify_on_decision: true,
            default_reviewer: "Credit Officer".to_string(),
        }
    }
}

/// Storage seam for the policy singleton.
pub trait PolicyStore: Send + Sync {
    fn load(&self) -> Result<RiskPolicy, RepositoryError>;
    fn save(&self, policy: RiskPolicy) -> Result<(), RepositoryError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_restores_defaults_for_bad_values() {
        let policy = RiskPolicy {
            dsr_threshold: -3.0,
            savings_rate_threshold: f64::NAN,
            confidence_threshold: 140.0,
            notify_on_decision: false,
            default_reviewer: "  ".to_string(),
        }
        .sanitized();

        assert_eq!(policy.dsr_threshold, DEFAULT_DSR_THRESHOLD);
        assert_eq!(policy.savings_rate_threshold, DEFAULT_SAVINGS_RATE_THRESHOLD);
        assert_eq!(policy.confidence_threshold, DEFAULT_CONFIDENCE_THRESHOLD);
        assert_eq!(policy.default_reviewer, "Credit Officer");
        assert!(!policy.notify_on_decision);
    }

    #[test]
    fn sanitize_keeps_valid_values() {
        let policy = RiskPolicy {
            dsr_threshold: 45.0,
            savings_rate_threshold: 25.0,
            confidence_threshold: 80.0,
            notify_on_decision: true,
            default_reviewer: "Senior Officer".to_string(),
        }
        .sanitized();

        assert_eq!(policy.dsr_threshold, 45.0);
        assert_eq!(policy.default_reviewer, "Senior Officer");
    }
}
