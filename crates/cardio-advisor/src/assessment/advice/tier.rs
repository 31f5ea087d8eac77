use serde::{Deserialize, Serialize};
use std::fmt;

pub const MODERATE_RISK_THRESHOLD: f64 = 0.33;
pub const HIGH_RISK_THRESHOLD: f64 = 0.66;

/// Three-level bucketing of a model probability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskTier {
    Low,
    Moderate,
    High,
}

impl RiskTier {
    /// Total over every `f64`: no range check is applied, and NaN lands in `High`
    /// because it fails both lower-bound comparisons.
    pub fn from_probability(probability: f64) -> Self {
        if probability < MODERATE_RISK_THRESHOLD {
            RiskTier::Low
        } else if probability < HIGH_RISK_THRESHOLD {
            RiskTier::Moderate
        } else {
            RiskTier::High
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            RiskTier::Low => "low",
            RiskTier::Moderate => "moderate",
            RiskTier::High => "high",
        }
    }

    /// Advisory placed at the top of the recommendation list.
    pub const fn headline(self) -> &'static str {
        match self {
            RiskTier::High => "You are in the HIGH risk group: please consult a doctor soon.",
            RiskTier::Moderate => {
                "MODERATE risk: follow the recommendations below and re-check in 1-3 months."
            }
            RiskTier::Low => "LOW risk: keep up a healthy lifestyle and have regular check-ups.",
        }
    }
}

impl fmt::Display for RiskTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn boundaries_are_inclusive_on_the_lower_edge() {
        assert_eq!(RiskTier::from_probability(0.32), RiskTier::Low);
        assert_eq!(RiskTier::from_probability(0.33), RiskTier::Moderate);
        assert_eq!(RiskTier::from_probability(0.65), RiskTier::Moderate);
        assert_eq!(RiskTier::from_probability(0.66), RiskTier::High);
    }

    #[test]
    fn out_of_range_values_still_classify() {
        assert_eq!(RiskTier::from_probability(-4.0), RiskTier::Low);
        assert_eq!(RiskTier::from_probability(17.5), RiskTier::High);
        assert_eq!(RiskTier::from_probability(f64::NAN), RiskTier::High);
        assert_eq!(RiskTier::from_probability(f64::NEG_INFINITY), RiskTier::Low);
    }

    #[test]
    fn tier_serializes_as_snake_case_label() {
        let value = serde_json::to_value(RiskTier::Moderate).expect("serializes");
        assert_eq!(value, serde_json::json!("moderate"));
        assert_eq!(RiskTier::High.to_string(), "high");
    }
}
