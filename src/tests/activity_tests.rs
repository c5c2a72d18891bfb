use serde_json::json;

use super::{create_test_group, create_test_service, create_test_service_with, even_split, money};
use crate::core::models::ActivityEvent;
use crate::infrastructure::cache::Cache;
use crate::infrastructure::cache::in_memory::InMemoryCache;
use crate::infrastructure::logging::in_memory::InMemoryActivityLog;

#[tokio::test]
async fn test_actions_are_recorded_in_order() {
    let service = create_test_service();
    let group = create_test_group(&service, "A", &["B"]).await;
    let payment = service
        .add_payment(&group.id, "Lunch".to_string(), even_split("A", 2400, &["A", "B"]), "A", None)
        .await
        .unwrap();
    let settlement = service
        .propose_settlement(&group.id, "A", money(1200), "B", None)
        .await
        .unwrap();
    service.reject_settlement(&settlement.id, "A").await.unwrap();
    service.void_payment(&group.id, &payment.id, "A").await.unwrap();
    service.add_member(&group.id, "C", "A").await.unwrap();

    let history = service.get_activity(&group.id, "B").await.unwrap();
    assert_eq!(history.quarantined, 0);
    let names: Vec<_> = history.entries.iter().map(|e| e.event.name()).collect();
    assert_eq!(
        names,
        vec![
            "group_created",
            "payment_added",
            "settlement_proposed",
            "settlement_rejected",
            "payment_voided",
            "member_added",
        ]
    );

    match &history.entries[1].event {
        ActivityEvent::PaymentAdded(added) => {
            assert_eq!(added.transaction_id, payment.id);
            assert_eq!(added.payer_id, "A");
            assert_eq!(added.total, money(2400));
        }
        other => panic!("unexpected event {:?}", other),
    }
    assert_eq!(history.entries[2].user_id, "B");
}

#[tokio::test]
async fn test_unknown_activity_is_quarantined() {
    let activity = InMemoryActivityLog::new();
    let service = create_test_service_with(activity.clone(), InMemoryCache::new());
    let group = create_test_group(&service, "A", &["B"]).await;

    activity
        .record_raw(&group.id, "A", json!({ "kind": "group_renamed", "payload": { "name": "Ski" } }))
        .await;
    activity
        .record_raw(&group.id, "A", json!({ "kind": "payment_voided", "payload": { "id": 7 } }))
        .await;
    activity
        .record_raw(&group.id, "A", json!({ "kind": "member_added", "payload": { "user_id": "C" } }))
        .await;

    let history = service.get_activity(&group.id, "A").await.unwrap();
    assert_eq!(history.quarantined, 2);
    let names: Vec<_> = history.entries.iter().map(|e| e.event.name()).collect();
    assert_eq!(names, vec!["group_created", "member_added"]);
}

#[tokio::test]
async fn test_views_are_cached_per_version() {
    let cache = InMemoryCache::new();
    let service = create_test_service_with(InMemoryActivityLog::new(), cache.clone());
    let group = create_test_group(&service, "A", &["B"]).await;

    let before = service.get_ledger_view(&group.id, "A").await.unwrap();
    let cached = cache.get_ledger_view(&group.id, before.version).await.unwrap();
    assert_eq!(cached.map(|v| v.version), Some(before.version));

    service
        .add_payment(&group.id, "Lunch".to_string(), even_split("A", 2000, &["A", "B"]), "A", None)
        .await
        .unwrap();

    // a write moves the version on, so the stored view no longer matches
    let after = service.get_ledger_view(&group.id, "B").await.unwrap();
    assert!(after.version > before.version);
    assert_eq!(after.sheet.balance_of("B"), money(-1000));
    assert!(cache.get_ledger_view(&group.id, before.version).await.unwrap().is_none());
    assert!(cache.get_ledger_view(&group.id, after.version).await.unwrap().is_some());

    // an old view saved late does not displace the current one
    cache.save_ledger_view(&before).await.unwrap();
    let current = cache.get_ledger_view(&group.id, after.version).await.unwrap().unwrap();
    assert_eq!(current.debts.len(), 1);
}
