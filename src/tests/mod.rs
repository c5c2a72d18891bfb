mod activity_tests;

use crate::core::engine::PaymentDraft;
use crate::core::models::{Group, Money, Split, UserId};
use crate::core::services::LedgerService;
use crate::infrastructure::cache::in_memory::InMemoryCache;
use crate::infrastructure::logging::in_memory::InMemoryActivityLog;
use crate::infrastructure::notifier::in_memory::InMemoryNotifier;
use crate::infrastructure::storage::in_memory::InMemoryStorage;

pub const TEST_JWT_SECRET: &str = "test-secret";

pub type TestService = LedgerService<InMemoryActivityLog, InMemoryStorage, InMemoryCache, InMemoryNotifier>;

pub fn create_test_service() -> TestService {
    create_test_service_with(InMemoryActivityLog::new(), InMemoryCache::new())
}

/// For tests that need to look behind the service at its activity log or
/// cache; both are shared handles.
pub fn create_test_service_with(activity: InMemoryActivityLog, cache: InMemoryCache) -> TestService {
    let storage = InMemoryStorage::new();
    let notifier = InMemoryNotifier::new();
    LedgerService::new(storage, activity, cache, notifier, TEST_JWT_SECRET.to_string())
}

pub fn ids(users: &[&str]) -> Vec<UserId> {
    users.iter().map(|u| u.to_string()).collect()
}

pub fn money(cents: i64) -> Money {
    Money::from_cents(cents)
}

/// `manager` creates the group and is its only manager.
pub async fn create_test_group(service: &TestService, manager: &str, others: &[&str]) -> Group {
    service
        .create_group("Trip".to_string(), ids(others), manager)
        .await
        .unwrap()
}

pub fn even_split(payer: &str, cents: i64, among: &[&str]) -> Vec<Split> {
    PaymentDraft::even(payer, money(cents), &ids(among)).unwrap()
}
