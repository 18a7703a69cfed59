use serde::{Deserialize, Serialize};

use crate::domain::value_objects::comparison::ComparisonOperator;

/// Per-enclosure condition that fires when a sample's temperature satisfies it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThresholdRule {
    pub id: i64,
    pub enclosure_id: i64,
    pub operator: ComparisonOperator,
    pub threshold: f64,
    /// Recipient or operator that created the rule, when known.
    pub created_by: Option<i64>,
}

impl ThresholdRule {
    #[must_use]
    pub fn fires_for(&self, temperature: f64) -> bool {
        self.operator.holds(temperature, self.threshold)
    }

    /// Human-readable condition, e.g. `temperature > 30.00`.
    #[must_use]
    pub fn describe(&self) -> String {
        format!("temperature {} {:.2}", self.operator, self.threshold)
    }
}
