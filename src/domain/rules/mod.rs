use crate::domain::entities::threshold_rule::ThresholdRule;

/// Selects the rules that fire for a temperature reading.
///
/// Pure and exhaustive: every rule is checked on its own, nothing is
/// short-circuited or deduplicated, so contradictory rules may both fire.
/// Input order is preserved.
#[must_use]
pub fn firing_rules(temperature: f64, rules: &[ThresholdRule]) -> Vec<&ThresholdRule> {
    rules
        .iter()
        .filter(|rule| rule.fires_for(temperature))
        .collect()
}
