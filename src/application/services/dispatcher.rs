use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinSet;

use super::live_registry::{BroadcastReport, LiveAlert, LiveSubscriberRegistry};
use crate::domain::entities::alarm::Alarm;
use crate::domain::entities::enclosure::Enclosure;
use crate::domain::entities::sample::Sample;
use crate::domain::entities::threshold_rule::ThresholdRule;
use crate::domain::ports::store::{AlarmLedger, RecipientDirectory};
use crate::domain::ports::transport::{MessageTransport, OutgoingMessage, TransportError};

/// What happened to one alarm on both notification paths.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeliveryOutcome {
    pub recipients_attempted: usize,
    pub recipients_succeeded: usize,
    pub recipients_failed: usize,
    /// Whether the alarm is now flagged delivered in the ledger.
    pub delivered: bool,
    pub live: BroadcastReport,
}

/// Fans an alarm out to durable recipients and live subscribers.
///
/// The live broadcast never blocks, so it runs first; the durable sends then
/// run concurrently, each bounded by `send_timeout`. No lock is held across a
/// send.
pub struct NotificationDispatcher {
    recipients: Arc<dyn RecipientDirectory>,
    transport: Arc<dyn MessageTransport>,
    ledger: Arc<dyn AlarmLedger>,
    registry: Arc<LiveSubscriberRegistry>,
    send_timeout: Duration,
}

impl NotificationDispatcher {
    #[must_use]
    pub fn new(
        recipients: Arc<dyn RecipientDirectory>,
        transport: Arc<dyn MessageTransport>,
        ledger: Arc<dyn AlarmLedger>,
        registry: Arc<LiveSubscriberRegistry>,
        send_timeout: Duration,
    ) -> Self {
        Self {
            recipients,
            transport,
            ledger,
            registry,
            send_timeout,
        }
    }

    /// Notify everyone about `alarm`. Never fails: every error is logged and
    /// reflected in the returned outcome.
    pub async fn dispatch(
        &self,
        alarm: &Alarm,
        enclosure: &Enclosure,
        sample: &Sample,
        rule: &ThresholdRule,
    ) -> DeliveryOutcome {
        let live = self.broadcast_live(alarm, enclosure, sample, rule);
        let mut outcome = self.deliver(alarm, enclosure, sample, rule).await;
        outcome.live = live;
        outcome
    }

    /// Push `alarm` to the live subscribers. Does not wait on any of them.
    pub fn broadcast_live(
        &self,
        alarm: &Alarm,
        enclosure: &Enclosure,
        sample: &Sample,
        rule: &ThresholdRule,
    ) -> BroadcastReport {
        self.registry
            .broadcast_all(live_alert(alarm, enclosure, sample, rule))
    }

    /// Send `alarm` to every opted-in recipient and flag it delivered on the
    /// first success. The returned outcome has an empty live report.
    pub async fn deliver(
        &self,
        alarm: &Alarm,
        enclosure: &Enclosure,
        sample: &Sample,
        rule: &ThresholdRule,
    ) -> DeliveryOutcome {
        let message = compose_message(alarm, enclosure, sample, rule);
        let outcome = self.deliver_durable(alarm.id, message).await;

        tracing::info!(
            alarm_id = alarm.id,
            enclosure_id = enclosure.id,
            attempted = outcome.recipients_attempted,
            succeeded = outcome.recipients_succeeded,
            failed = outcome.recipients_failed,
            delivered = outcome.delivered,
            "alarm dispatched"
        );
        outcome
    }

    async fn deliver_durable(&self, alarm_id: i64, message: OutgoingMessage) -> DeliveryOutcome {
        let mut outcome = DeliveryOutcome::default();

        let recipients = match self.recipients.opted_in_recipients() {
            Ok(recipients) => recipients,
            Err(e) => {
                tracing::warn!(alarm_id, "recipient lookup failed, alarm left undelivered: {e}");
                return outcome;
            }
        };
        if recipients.is_empty() {
            tracing::debug!(alarm_id, "no opted-in recipients");
            return outcome;
        }

        let message = Arc::new(message);
        let mut sends = JoinSet::new();
        for recipient in recipients {
            let transport = Arc::clone(&self.transport);
            let message = Arc::clone(&message);
            let timeout = self.send_timeout;
            sends.spawn(async move {
                let result =
                    match tokio::time::timeout(timeout, transport.send(&recipient.address, &message))
                        .await
                    {
                        Ok(result) => result,
                        Err(_) => Err(TransportError::Timeout(timeout)),
                    };
                (recipient.address, result)
            });
            outcome.recipients_attempted += 1;
        }

        while let Some(joined) = sends.join_next().await {
            match joined {
                Ok((_, Ok(()))) => {
                    outcome.recipients_succeeded += 1;
                    if !outcome.delivered {
                        match self.ledger.mark_delivered(alarm_id) {
                            Ok(()) => outcome.delivered = true,
                            Err(e) => tracing::warn!(alarm_id, "failed to mark alarm delivered: {e}"),
                        }
                    }
                }
                Ok((address, Err(e))) => {
                    outcome.recipients_failed += 1;
                    tracing::warn!(alarm_id, recipient = %address, "notification failed: {e}");
                }
                Err(e) => {
                    outcome.recipients_failed += 1;
                    tracing::warn!(alarm_id, "notification task aborted: {e}");
                }
            }
        }

        outcome
    }
}

fn live_alert(
    alarm: &Alarm,
    enclosure: &Enclosure,
    sample: &Sample,
    rule: &ThresholdRule,
) -> LiveAlert {
    LiveAlert {
        alarm_id: alarm.id,
        enclosure_id: enclosure.id,
        enclosure: enclosure.name.clone(),
        temperature: sample.temperature,
        operator: rule.operator.to_string(),
        threshold: rule.threshold,
        triggered_at: alarm.triggered_at,
    }
}

/// Render the durable alert text.
#[must_use]
pub fn compose_message(
    alarm: &Alarm,
    enclosure: &Enclosure,
    sample: &Sample,
    rule: &ThresholdRule,
) -> OutgoingMessage {
    OutgoingMessage {
        subject: format!("Alarm: {} crossed its temperature threshold", enclosure.name),
        body: format!(
            "Enclosure: {}\nLocation: {}\nMeasured: {:.2}\nThreshold: {} {:.2}\nTime: {}",
            enclosure.name,
            enclosure.location,
            sample.temperature,
            rule.operator,
            rule.threshold,
            alarm.triggered_at.to_rfc3339()
        ),
    }
}
