//! Rule-based personalised recommendations.
//!
//! The engine is a pure function of its inputs: a rule table over the measurements, a tier
//! headline derived from the probability, and an optional explainability line.

mod rules;
mod tier;

pub use rules::{Advice, AdviceGroup};
pub use tier::{RiskTier, HIGH_RISK_THRESHOLD, MODERATE_RISK_THRESHOLD};

use std::collections::HashSet;

use super::domain::FeatureVector;

/// Number of influential feature names rendered in the explainability line.
pub const TOP_FEATURES_SHOWN: usize = 3;

/// Derives the ordered, duplicate-free recommendation list.
///
/// Rule advisories come first in table order. When a probability is given, the tier headline
/// is then placed in front of them. A non-empty `top_influential` list adds a summary line
/// naming its first three entries.
pub fn derive_recommendations(
    features: &FeatureVector,
    probability: Option<f64>,
    top_influential: Option<&[String]>,
) -> Vec<String> {
    let mut recommendations: Vec<String> = rules::evaluate_rules(features)
        .into_iter()
        .map(|advice| advice.text().to_string())
        .collect();

    if let Some(probability) = probability {
        let tier = RiskTier::from_probability(probability);
        recommendations.insert(0, tier.headline().to_string());
    }

    if let Some(line) = top_influential.and_then(influential_summary) {
        recommendations.push(line);
    }

    dedup_in_order(recommendations)
}

/// Advisories fired by the rule table alone, in evaluation order.
pub fn matched_advice(features: &FeatureVector) -> Vec<Advice> {
    rules::evaluate_rules(features)
}

fn influential_summary(names: &[String]) -> Option<String> {
    if names.is_empty() {
        return None;
    }
    let shown: Vec<&str> = names
        .iter()
        .take(TOP_FEATURES_SHOWN)
        .map(String::as_str)
        .collect();
    Some(format!("Most influential factors: {}.", shown.join(", ")))
}

fn dedup_in_order(items: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::with_capacity(items.len());
    items
        .into_iter()
        .filter(|item| seen.insert(item.clone()))
        .collect()
}
