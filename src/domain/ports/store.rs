use thiserror::Error;

use crate::domain::entities::alarm::{Alarm, NewAlarm};
use crate::domain::entities::enclosure::Enclosure;
use crate::domain::entities::recipient::Recipient;
use crate::domain::entities::sample::{NewSample, Sample};
use crate::domain::entities::threshold_rule::ThresholdRule;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("storage read failed: {0}")]
    ReadFailed(String),
    #[error("storage write failed: {0}")]
    WriteFailed(String),
    #[error("entry not found: {0}")]
    NotFound(String),
}

pub trait EnclosureDirectory: Send + Sync {
    /// Look up an enclosure by id.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the read operation fails. An unknown id is
    /// `Ok(None)`, not an error.
    fn get_enclosure(&self, id: i64) -> Result<Option<Enclosure>, StoreError>;
}

pub trait RuleStore: Send + Sync {
    /// All threshold rules attached to an enclosure, ordered by rule id.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the store is unavailable.
    fn rules_for(&self, enclosure_id: i64) -> Result<Vec<ThresholdRule>, StoreError>;
}

pub trait RecipientDirectory: Send + Sync {
    /// Recipients that opted into durable notifications.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the read operation fails.
    fn opted_in_recipients(&self) -> Result<Vec<Recipient>, StoreError>;
}

pub trait SampleStore: Send + Sync {
    /// Append a sample and return it with its assigned id.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the write operation fails.
    fn insert_sample(&self, sample: &NewSample) -> Result<Sample, StoreError>;
}

/// Outcome of [`AlarmLedger::create_alarm`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedAlarm {
    pub alarm: Alarm,
    /// `false` when the (sample, rule) pair already had an alarm, which is
    /// returned unchanged.
    pub created: bool,
}

pub trait AlarmLedger: Send + Sync {
    /// Record the alarm for one (sample, rule) pair. At most one alarm exists
    /// per pair: a repeat call returns the stored one. The alarm is readable
    /// before this returns.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the write operation fails.
    fn create_alarm(&self, alarm: &NewAlarm) -> Result<RecordedAlarm, StoreError>;

    /// Flag an alarm as delivered. Calling it again is a no-op.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NotFound` for an unknown alarm, or
    /// `StoreError::WriteFailed` if the update fails.
    fn mark_delivered(&self, alarm_id: i64) -> Result<(), StoreError>;

    /// # Errors
    ///
    /// Returns `StoreError` if the read operation fails.
    fn get_alarm(&self, alarm_id: i64) -> Result<Option<Alarm>, StoreError>;

    /// Alarms raised by one sample, ordered by alarm id.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the read operation fails.
    fn alarms_for_sample(&self, sample_id: i64) -> Result<Vec<Alarm>, StoreError>;
}
