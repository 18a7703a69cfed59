#![allow(clippy::expect_used)]

use std::collections::HashSet;
use std::sync::Arc;

use cabwatch::application::services::live_registry::{LiveAlert, LiveSubscriberRegistry};
use chrono::Utc;
use tokio::sync::mpsc;

fn make_alert(alarm_id: i64) -> LiveAlert {
    LiveAlert {
        alarm_id,
        enclosure_id: 1,
        enclosure: "Rack A".to_string(),
        temperature: 31.5,
        operator: ">".to_string(),
        threshold: 30.0,
        triggered_at: Utc::now(),
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_registrations_each_get_one_copy() {
    let registry = Arc::new(LiveSubscriberRegistry::new(8));

    let mut tasks = tokio::task::JoinSet::new();
    for _ in 0..100 {
        let registry = registry.clone();
        tasks.spawn(async move { registry.subscribe() });
    }
    let mut subscriptions = Vec::new();
    while let Some(sub) = tasks.join_next().await {
        subscriptions.push(sub.expect("join"));
    }

    let ids: HashSet<u64> = subscriptions.iter().map(|s| s.id()).collect();
    assert_eq!(ids.len(), 100);
    assert_eq!(registry.len(), 100);

    let report = registry.broadcast_all(make_alert(1));
    assert_eq!(report.delivered, 100);
    assert_eq!(report.dropped, 0);

    for sub in &mut subscriptions {
        assert_eq!(sub.recv().await.expect("alert").alarm_id, 1);
        assert!(sub.try_recv().is_none(), "no duplicate delivery");
    }

    drop(subscriptions);
    assert!(registry.is_empty());
}

#[tokio::test]
async fn unregistered_member_skipped_by_later_broadcasts() {
    let registry = Arc::new(LiveSubscriberRegistry::new(4));
    let (tx, mut rx) = mpsc::channel(4);
    let a = registry.register(tx);
    let mut b = registry.subscribe();

    registry.broadcast_all(make_alert(1));
    assert!(registry.unregister(a));
    registry.broadcast_all(make_alert(2));

    assert_eq!(rx.recv().await.expect("M").alarm_id, 1);
    assert!(rx.recv().await.is_none(), "channel closed after unregister");

    assert_eq!(b.recv().await.expect("first").alarm_id, 1);
    assert_eq!(b.recv().await.expect("second").alarm_id, 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn broadcast_during_churn_stays_consistent() {
    let registry = Arc::new(LiveSubscriberRegistry::new(64));
    let mut stable = registry.subscribe();

    let churn = {
        let registry = registry.clone();
        tokio::spawn(async move {
            for _ in 0..200 {
                let sub = registry.subscribe();
                tokio::task::yield_now().await;
                drop(sub);
            }
        })
    };
    for alarm_id in 0..50 {
        registry.broadcast_all(make_alert(alarm_id));
        tokio::task::yield_now().await;
    }
    churn.await.expect("churn");

    assert_eq!(registry.len(), 1);
    for expected in 0..50 {
        assert_eq!(stable.recv().await.expect("alert").alarm_id, expected);
    }
    assert!(stable.try_recv().is_none());
}
