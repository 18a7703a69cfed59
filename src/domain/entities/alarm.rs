use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::value_objects::alarm_status::AlarmStatus;

/// Alarm about to be appended to the ledger: one firing rule against one sample.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewAlarm {
    pub enclosure_id: i64,
    pub sample_id: i64,
    pub rule_id: i64,
    pub triggered_at: DateTime<Utc>,
}

/// Record of one rule firing against one sample.
///
/// `delivered` only ever moves from `false` to `true`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Alarm {
    pub id: i64,
    pub enclosure_id: i64,
    pub sample_id: i64,
    pub rule_id: i64,
    pub triggered_at: DateTime<Utc>,
    pub status: AlarmStatus,
    pub delivered: bool,
}

impl NewAlarm {
    #[must_use]
    pub fn into_alarm(self, id: i64) -> Alarm {
        Alarm {
            id,
            enclosure_id: self.enclosure_id,
            sample_id: self.sample_id,
            rule_id: self.rule_id,
            triggered_at: self.triggered_at,
            status: AlarmStatus::New,
            delivered: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_alarm_starts_undelivered() {
        let alarm = NewAlarm {
            enclosure_id: 3,
            sample_id: 10,
            rule_id: 7,
            triggered_at: Utc::now(),
        }
        .into_alarm(42);
        assert_eq!(alarm.id, 42);
        assert_eq!(alarm.rule_id, 7);
        assert_eq!(alarm.status, AlarmStatus::New);
        assert!(!alarm.delivered);
    }
}
