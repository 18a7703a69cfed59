use std::sync::Arc;

use chrono::Utc;
use thiserror::Error;

use super::dispatcher::{DeliveryOutcome, NotificationDispatcher};
use crate::domain::entities::alarm::{Alarm, NewAlarm};
use crate::domain::entities::enclosure::Enclosure;
use crate::domain::entities::sample::Sample;
use crate::domain::entities::threshold_rule::ThresholdRule;
use crate::domain::ports::store::{AlarmLedger, RecordedAlarm, RuleStore, StoreError};
use crate::domain::rules::firing_rules;

#[derive(Error, Debug)]
pub enum EvaluationError {
    /// The rule store could not be read. The sample stays recorded.
    #[error("rule lookup failed for enclosure {enclosure_id}: {source}")]
    RuleLookup {
        enclosure_id: i64,
        #[source]
        source: StoreError,
    },
}

/// An alarm raised by one firing rule, with its notification outcome.
#[derive(Debug, Clone)]
pub struct FiredAlarm {
    pub alarm: Alarm,
    pub rule: ThresholdRule,
    pub delivery: DeliveryOutcome,
}

/// Evaluates a persisted sample: rule lookup → alarm per firing rule → dispatch.
pub struct EvaluationEngine {
    rules: Arc<dyn RuleStore>,
    ledger: Arc<dyn AlarmLedger>,
    dispatcher: NotificationDispatcher,
}

impl EvaluationEngine {
    #[must_use]
    pub fn new(
        rules: Arc<dyn RuleStore>,
        ledger: Arc<dyn AlarmLedger>,
        dispatcher: NotificationDispatcher,
    ) -> Self {
        Self {
            rules,
            ledger,
            dispatcher,
        }
    }

    /// Evaluate `sample` against every rule of its enclosure.
    ///
    /// Each firing rule gets its own alarm, written to the ledger before
    /// it is dispatched. A ledger write failure skips that rule only.
    /// Live subscribers hear about every new alarm before any durable send
    /// starts.
    ///
    /// Evaluating the same sample again raises nothing new: alarms already
    /// delivered are left alone, and undelivered ones are retried on the
    /// durable path only. The returned list holds the new alarms.
    ///
    /// # Errors
    ///
    /// Returns `EvaluationError::RuleLookup` if the rules cannot be read.
    pub async fn evaluate(
        &self,
        sample: &Sample,
        enclosure: &Enclosure,
    ) -> Result<Vec<FiredAlarm>, EvaluationError> {
        let rules = self
            .rules
            .rules_for(sample.enclosure_id)
            .map_err(|source| EvaluationError::RuleLookup {
                enclosure_id: sample.enclosure_id,
                source,
            })?;

        let firing = firing_rules(sample.temperature, &rules);
        if firing.is_empty() {
            tracing::debug!(
                sample_id = sample.id,
                enclosure_id = sample.enclosure_id,
                rules = rules.len(),
                "no rule fired"
            );
            return Ok(Vec::new());
        }

        tracing::warn!(
            sample_id = sample.id,
            enclosure_id = sample.enclosure_id,
            temperature = sample.temperature,
            "{} rule(s) fired",
            firing.len()
        );

        let mut raised = Vec::with_capacity(firing.len());
        let mut retries = Vec::new();
        for rule in firing {
            let new_alarm = NewAlarm {
                enclosure_id: sample.enclosure_id,
                sample_id: sample.id,
                rule_id: rule.id,
                triggered_at: Utc::now(),
            };
            match self.ledger.create_alarm(&new_alarm) {
                Ok(RecordedAlarm {
                    alarm,
                    created: true,
                }) => raised.push((alarm, rule)),
                Ok(RecordedAlarm { alarm, .. }) if !alarm.delivered => {
                    tracing::info!(alarm_id = alarm.id, "alarm already recorded, retrying delivery");
                    retries.push((alarm, rule));
                }
                Ok(RecordedAlarm { alarm, .. }) => {
                    tracing::debug!(alarm_id = alarm.id, "alarm already delivered");
                }
                Err(e) => {
                    tracing::warn!(
                        sample_id = sample.id,
                        rule_id = rule.id,
                        "failed to record alarm: {e}"
                    );
                }
            }
        }

        let live: Vec<_> = raised
            .iter()
            .map(|(alarm, rule)| {
                self.dispatcher
                    .broadcast_live(alarm, enclosure, sample, rule)
            })
            .collect();

        let mut fired = Vec::with_capacity(raised.len());
        for ((alarm, rule), live) in raised.into_iter().zip(live) {
            let mut delivery = self.dispatcher.deliver(&alarm, enclosure, sample, rule).await;
            delivery.live = live;
            fired.push(FiredAlarm {
                alarm,
                rule: rule.clone(),
                delivery,
            });
        }

        for (alarm, rule) in retries {
            self.dispatcher
                .deliver(&alarm, enclosure, sample, rule)
                .await;
        }

        Ok(fired)
    }
}
