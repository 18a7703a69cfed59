use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

/// Identifier handed out at registration. Never reused within a registry.
pub type SubscriberId = u64;

/// Structured alert pushed to live subscribers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LiveAlert {
    pub alarm_id: i64,
    pub enclosure_id: i64,
    pub enclosure: String,
    pub temperature: f64,
    pub operator: String,
    pub threshold: f64,
    pub triggered_at: DateTime<Utc>,
}

/// Sending half of a live subscriber's channel.
pub type LiveSender = mpsc::Sender<Arc<LiveAlert>>;

/// Outcome of one broadcast.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    /// Members that accepted the message.
    pub delivered: usize,
    /// Members removed because their channel was closed or full.
    pub dropped: usize,
}

struct Member {
    sender: LiveSender,
    connected_at: DateTime<Utc>,
}

/// Set of currently connected live subscribers.
///
/// Membership lives behind a single mutex. `register`, `unregister` and the
/// snapshot taken by `broadcast_all` are serialized on it; sends happen after
/// the lock is released and never block (`try_send`). A member whose channel
/// is closed or full is removed on the spot.
pub struct LiveSubscriberRegistry {
    members: Mutex<HashMap<SubscriberId, Member>>,
    next_id: AtomicU64,
    buffer: usize,
}

impl LiveSubscriberRegistry {
    /// `buffer` is the channel depth given to subscribers created with
    /// [`LiveSubscriberRegistry::subscribe`]. Clamped to at least 1.
    #[must_use]
    pub fn new(buffer: usize) -> Self {
        Self {
            members: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            buffer: buffer.max(1),
        }
    }

    // Membership edits are single map operations, so a poisoned lock still
    // holds a consistent map.
    fn members(&self) -> MutexGuard<'_, HashMap<SubscriberId, Member>> {
        self.members.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a channel. Registering a sender whose channel is already a
    /// member returns the existing id instead of adding a duplicate.
    pub fn register(&self, sender: LiveSender) -> SubscriberId {
        let mut members = self.members();
        if let Some((&id, _)) = members
            .iter()
            .find(|(_, member)| member.sender.same_channel(&sender))
        {
            return id;
        }
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        members.insert(
            id,
            Member {
                sender,
                connected_at: Utc::now(),
            },
        );
        let count = members.len();
        drop(members);
        tracing::debug!(subscriber = id, members = count, "live subscriber registered");
        id
    }

    /// Remove a member. Returns `false` if it was already gone.
    pub fn unregister(&self, id: SubscriberId) -> bool {
        let mut members = self.members();
        let removed = members.remove(&id).is_some();
        let count = members.len();
        drop(members);
        if removed {
            tracing::debug!(subscriber = id, members = count, "live subscriber unregistered");
        }
        removed
    }

    /// Create a channel, register it, and return the receiving side wrapped
    /// in a guard that unregisters when dropped.
    #[must_use]
    pub fn subscribe(self: &Arc<Self>) -> Subscription {
        let (sender, receiver) = mpsc::channel(self.buffer);
        let id = self.register(sender);
        Subscription {
            id,
            receiver,
            registry: Arc::clone(self),
        }
    }

    /// Send `alert` to every member of a snapshot of the registry.
    ///
    /// Members registered while the broadcast runs may or may not receive
    /// it; no member receives it twice.
    pub fn broadcast_all(&self, alert: LiveAlert) -> BroadcastReport {
        let snapshot: Vec<(SubscriberId, LiveSender)> = self
            .members()
            .iter()
            .map(|(&id, member)| (id, member.sender.clone()))
            .collect();

        let alert = Arc::new(alert);
        let mut report = BroadcastReport::default();
        let mut failed = Vec::new();

        for (id, sender) in snapshot {
            match sender.try_send(Arc::clone(&alert)) {
                Ok(()) => report.delivered += 1,
                Err(TrySendError::Full(_)) => {
                    tracing::warn!(subscriber = id, "live subscriber lagging, disconnecting");
                    failed.push(id);
                }
                Err(TrySendError::Closed(_)) => {
                    tracing::debug!(subscriber = id, "live subscriber channel closed");
                    failed.push(id);
                }
            }
        }

        if !failed.is_empty() {
            let mut members = self.members();
            for id in &failed {
                if members.remove(id).is_some() {
                    report.dropped += 1;
                }
            }
        }

        report
    }

    /// Drop every member. Their receivers observe the end of the stream,
    /// which lets connection tasks finish on shutdown.
    pub fn disconnect_all(&self) -> usize {
        let mut members = self.members();
        let count = members.len();
        members.clear();
        drop(members);
        if count > 0 {
            tracing::info!(members = count, "live subscribers disconnected");
        }
        count
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.members().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.members().is_empty()
    }

    #[must_use]
    pub fn contains(&self, id: SubscriberId) -> bool {
        self.members().contains_key(&id)
    }

    /// Registration time of a member, if it is still connected.
    #[must_use]
    pub fn connected_at(&self, id: SubscriberId) -> Option<DateTime<Utc>> {
        self.members().get(&id).map(|member| member.connected_at)
    }
}

impl Default for LiveSubscriberRegistry {
    fn default() -> Self {
        Self::new(32)
    }
}

/// Receiving side of a registered live subscriber.
///
/// Dropping it unregisters the subscriber, so a connection task that ends
/// for any reason (error, close, cancellation) leaves no entry behind.
pub struct Subscription {
    id: SubscriberId,
    receiver: mpsc::Receiver<Arc<LiveAlert>>,
    registry: Arc<LiveSubscriberRegistry>,
}

impl Subscription {
    #[must_use]
    pub const fn id(&self) -> SubscriberId {
        self.id
    }

    /// Next alert, or `None` once the registry dropped this subscriber.
    pub async fn recv(&mut self) -> Option<Arc<LiveAlert>> {
        self.receiver.recv().await
    }

    /// Non-blocking variant of [`Subscription::recv`].
    pub fn try_recv(&mut self) -> Option<Arc<LiveAlert>> {
        self.receiver.try_recv().ok()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.registry.unregister(self.id);
    }
}
