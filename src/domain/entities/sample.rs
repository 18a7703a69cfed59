use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A reading waiting to be persisted. The capture timestamp is assigned by the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewSample {
    pub enclosure_id: i64,
    pub temperature: f64,
    pub humidity: f64,
    pub captured_at: DateTime<Utc>,
}

/// A persisted temperature/humidity reading. Never mutated once stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub id: i64,
    pub enclosure_id: i64,
    pub temperature: f64,
    pub humidity: f64,
    pub captured_at: DateTime<Utc>,
}

impl NewSample {
    #[must_use]
    pub fn now(enclosure_id: i64, temperature: f64, humidity: f64) -> Self {
        Self {
            enclosure_id,
            temperature,
            humidity,
            captured_at: Utc::now(),
        }
    }

    #[must_use]
    pub fn into_sample(self, id: i64) -> Sample {
        Sample {
            id,
            enclosure_id: self.enclosure_id,
            temperature: self.temperature,
            humidity: self.humidity,
            captured_at: self.captured_at,
        }
    }
}
