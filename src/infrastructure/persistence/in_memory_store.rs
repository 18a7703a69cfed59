use std::sync::{Mutex, PoisonError};

use crate::domain::entities::alarm::{Alarm, NewAlarm};
use crate::domain::entities::enclosure::Enclosure;
use crate::domain::entities::recipient::Recipient;
use crate::domain::entities::sample::{NewSample, Sample};
use crate::domain::entities::threshold_rule::ThresholdRule;
use crate::domain::ports::store::{
    AlarmLedger, EnclosureDirectory, RecipientDirectory, RecordedAlarm, RuleStore, SampleStore,
    StoreError,
};
use crate::domain::value_objects::comparison::ComparisonOperator;

/// In-memory store for testing purposes.
///
/// Ids are assigned from the position in each vector, starting at 1.
pub struct InMemoryStore {
    enclosures: Mutex<Vec<Enclosure>>,
    rules: Mutex<Vec<ThresholdRule>>,
    recipients: Mutex<Vec<Recipient>>,
    samples: Mutex<Vec<Sample>>,
    alarms: Mutex<Vec<Alarm>>,
}

fn next_id(len: usize) -> i64 {
    i64::try_from(len).map_or(i64::MAX, |n| n + 1)
}

impl InMemoryStore {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            enclosures: Mutex::new(Vec::new()),
            rules: Mutex::new(Vec::new()),
            recipients: Mutex::new(Vec::new()),
            samples: Mutex::new(Vec::new()),
            alarms: Mutex::new(Vec::new()),
        }
    }

    // Seeding helpers recover a poisoned lock: a push cannot leave a vector
    // half-updated.

    pub fn add_enclosure(&self, name: &str, location: &str) -> Enclosure {
        let mut enclosures = self.enclosures.lock().unwrap_or_else(PoisonError::into_inner);
        let enclosure = Enclosure {
            id: next_id(enclosures.len()),
            name: name.to_string(),
            location: location.to_string(),
        };
        enclosures.push(enclosure.clone());
        enclosure
    }

    pub fn add_rule(
        &self,
        enclosure_id: i64,
        operator: ComparisonOperator,
        threshold: f64,
    ) -> ThresholdRule {
        let mut rules = self.rules.lock().unwrap_or_else(PoisonError::into_inner);
        let rule = ThresholdRule {
            id: next_id(rules.len()),
            enclosure_id,
            operator,
            threshold,
            created_by: None,
        };
        rules.push(rule.clone());
        rule
    }

    pub fn add_recipient(&self, address: &str, receive_notifications: bool) -> Recipient {
        let mut recipients = self.recipients.lock().unwrap_or_else(PoisonError::into_inner);
        let recipient = Recipient {
            id: next_id(recipients.len()),
            address: address.to_string(),
            receive_notifications,
        };
        recipients.push(recipient.clone());
        recipient
    }

    #[must_use]
    pub fn sample_count(&self) -> usize {
        self.samples.lock().map_or(0, |samples| samples.len())
    }

    #[must_use]
    pub fn alarm_count(&self) -> usize {
        self.alarms.lock().map_or(0, |alarms| alarms.len())
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl EnclosureDirectory for InMemoryStore {
    fn get_enclosure(&self, id: i64) -> Result<Option<Enclosure>, StoreError> {
        Ok(self
            .enclosures
            .lock()
            .map_err(|_| StoreError::ReadFailed("lock poisoned".into()))?
            .iter()
            .find(|e| e.id == id)
            .cloned())
    }
}

impl RuleStore for InMemoryStore {
    fn rules_for(&self, enclosure_id: i64) -> Result<Vec<ThresholdRule>, StoreError> {
        Ok(self
            .rules
            .lock()
            .map_err(|_| StoreError::ReadFailed("lock poisoned".into()))?
            .iter()
            .filter(|r| r.enclosure_id == enclosure_id)
            .cloned()
            .collect())
    }
}

impl RecipientDirectory for InMemoryStore {
    fn opted_in_recipients(&self) -> Result<Vec<Recipient>, StoreError> {
        Ok(self
            .recipients
            .lock()
            .map_err(|_| StoreError::ReadFailed("lock poisoned".into()))?
            .iter()
            .filter(|r| r.receive_notifications)
            .cloned()
            .collect())
    }
}

impl SampleStore for InMemoryStore {
    fn insert_sample(&self, sample: &NewSample) -> Result<Sample, StoreError> {
        let mut samples = self
            .samples
            .lock()
            .map_err(|_| StoreError::WriteFailed("lock poisoned".into()))?;
        let stored = sample.clone().into_sample(next_id(samples.len()));
        samples.push(stored.clone());
        Ok(stored)
    }
}

impl AlarmLedger for InMemoryStore {
    fn create_alarm(&self, alarm: &NewAlarm) -> Result<RecordedAlarm, StoreError> {
        let mut alarms = self
            .alarms
            .lock()
            .map_err(|_| StoreError::WriteFailed("lock poisoned".into()))?;
        if let Some(existing) = alarms
            .iter()
            .find(|a| a.sample_id == alarm.sample_id && a.rule_id == alarm.rule_id)
        {
            return Ok(RecordedAlarm {
                alarm: existing.clone(),
                created: false,
            });
        }
        let stored = alarm.clone().into_alarm(next_id(alarms.len()));
        alarms.push(stored.clone());
        Ok(RecordedAlarm {
            alarm: stored,
            created: true,
        })
    }

    fn mark_delivered(&self, alarm_id: i64) -> Result<(), StoreError> {
        let mut alarms = self
            .alarms
            .lock()
            .map_err(|_| StoreError::WriteFailed("lock poisoned".into()))?;
        let alarm = alarms
            .iter_mut()
            .find(|a| a.id == alarm_id)
            .ok_or_else(|| StoreError::NotFound(format!("alarm {alarm_id}")))?;
        alarm.delivered = true;
        Ok(())
    }

    fn get_alarm(&self, alarm_id: i64) -> Result<Option<Alarm>, StoreError> {
        Ok(self
            .alarms
            .lock()
            .map_err(|_| StoreError::ReadFailed("lock poisoned".into()))?
            .iter()
            .find(|a| a.id == alarm_id)
            .cloned())
    }

    fn alarms_for_sample(&self, sample_id: i64) -> Result<Vec<Alarm>, StoreError> {
        Ok(self
            .alarms
            .lock()
            .map_err(|_| StoreError::ReadFailed("lock poisoned".into()))?
            .iter()
            .filter(|a| a.sample_id == sample_id)
            .cloned()
            .collect())
    }
}
