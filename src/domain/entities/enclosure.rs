use serde::{Deserialize, Serialize};

/// A monitored cabinet or unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Enclosure {
    pub id: i64,
    pub name: String,
    pub location: String,
}
