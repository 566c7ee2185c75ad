//! Integration tests for common Rollout workflows.
//!
//! These tests drive the umbrella crate the way an application would.

use rollout::prelude::*;
use std::borrow::Cow;
use std::sync::Arc;

// =============================================================================
// Application user type
// =============================================================================

struct Account {
    id: u64,
}

impl RolloutUser for Account {
    fn rollout_identifier(&self) -> Cow<'_, str> {
        Cow::Owned(self.id.to_string())
    }
}

fn account(id: u64) -> Account {
    Account { id }
}

async fn build_rollout() -> Rollout {
    let rollout = Rollout::from_config(&StoreConfig::memory(), RolloutConfig::default())
        .await
        .unwrap();

    rollout.define_group("staff", |user: Option<&dyn RolloutUser>| {
        user.is_some_and(|u| u.rollout_identifier().starts_with('9'))
    });
    rollout
}

// =============================================================================
// Rollout lifecycle
// =============================================================================

#[tokio::test]
async fn test_staged_rollout() {
    let rollout = build_rollout().await;
    let staff = account(901);
    let customer = account(12);

    // Stage 1: staff only.
    rollout.activate_group("checkout-v2", "staff").await.unwrap();
    assert!(rollout
        .is_active("checkout-v2", &EvaluationContext::for_user(&staff))
        .await
        .unwrap());
    assert!(!rollout
        .is_active("checkout-v2", &EvaluationContext::for_user(&customer))
        .await
        .unwrap());

    // Stage 2: a pilot customer.
    rollout.activate_user("checkout-v2", &customer).await.unwrap();
    assert!(rollout
        .is_active("checkout-v2", &EvaluationContext::for_user(&customer))
        .await
        .unwrap());

    // Stage 3: everyone, including anonymous visitors.
    rollout.activate("checkout-v2").await.unwrap();
    assert!(rollout
        .is_active("checkout-v2", &EvaluationContext::new())
        .await
        .unwrap());

    // Kill switch.
    rollout.deactivate("checkout-v2").await.unwrap();
    for user in [&staff, &customer] {
        assert!(!rollout
            .is_active("checkout-v2", &EvaluationContext::for_user(user))
            .await
            .unwrap());
    }
    assert_eq!(rollout.features().await.unwrap(), vec!["checkout-v2"]);
}

#[tokio::test]
async fn test_bulk_configuration() {
    let rollout = build_rollout().await;
    let mut feature = rollout.get("search").await.unwrap();

    let report = rollout
        .configure(
            &mut feature,
            &BulkChange::activate()
                .users([&account(1), &account(2)])
                .group("staff")
                .percentage(10),
        )
        .await
        .unwrap();
    assert_eq!(report.users, vec!["1", "2"]);
    assert_eq!(report.groups, vec!["staff"]);

    let stored = rollout.get("search").await.unwrap();
    assert_eq!(stored.serialize(), "10|1,2|staff||{}");
    assert_eq!(stored, feature);
}

#[tokio::test]
async fn test_preview_links_via_request_param() {
    let rollout = build_rollout().await;
    rollout
        .activate_request_param("dark-mode", "preview=dark")
        .await
        .unwrap();

    let request = RequestParams::new().with_param("preview", "dark");
    let context = EvaluationContext::new().with_request(&request);
    assert!(rollout.is_active("dark-mode", &context).await.unwrap());

    let request = RequestParams::new().with_param("preview", "light");
    let context = EvaluationContext::new().with_request(&request);
    assert!(!rollout.is_active("dark-mode", &context).await.unwrap());
}

#[tokio::test]
async fn test_metadata_and_removal() {
    let rollout = build_rollout().await;

    let mut data = serde_json::Map::new();
    data.insert("owner".to_string(), serde_json::json!("payments"));
    rollout.set_feature_data("refunds", data).await.unwrap();
    rollout.activate("refunds").await.unwrap();
    rollout.activate("invoices").await.unwrap();

    let snapshot = rollout.get("refunds").await.unwrap().snapshot();
    assert_eq!(snapshot.percentage, 100);
    assert_eq!(snapshot.data.get("owner"), Some(&serde_json::json!("payments")));

    rollout.remove("refunds").await.unwrap();
    assert_eq!(rollout.features().await.unwrap(), vec!["invoices"]);
}

#[tokio::test]
async fn test_shared_store_between_instances() {
    let store: Arc<dyn RolloutStore> = Arc::new(MemoryStore::new());
    let writer = Rollout::new(store.clone());
    let reader = Rollout::new(store);

    writer.activate_user("beta", &7).await.unwrap();
    assert!(reader
        .is_active("beta", &EvaluationContext::for_user(&7))
        .await
        .unwrap());

    // Groups are per instance and never persisted.
    writer.define_group("sevens", |user: Option<&dyn RolloutUser>| {
        user.is_some_and(|u| u.rollout_identifier() == "7")
    });
    writer.activate_group("gamma", "sevens").await.unwrap();
    assert!(writer
        .is_active("gamma", &EvaluationContext::for_user(&7))
        .await
        .unwrap());
    assert!(!reader
        .is_active("gamma", &EvaluationContext::for_user(&7))
        .await
        .unwrap());
}

#[tokio::test]
async fn test_separators_in_values_are_refused() {
    let rollout = build_rollout().await;
    rollout.activate_user("search", &account(3)).await.unwrap();

    for result in [
        rollout.activate_user("search", "4,5").await,
        rollout.activate_group("search", "staff|beta").await,
        rollout.activate_request_param("search", "q=a|b").await,
    ] {
        let err = result.unwrap_err();
        assert!(matches!(err, RolloutError::InvalidValue { .. }));
        assert!(!err.is_store_error());
    }

    let stored = rollout.get("search").await.unwrap();
    assert_eq!(stored.serialize(), "0|3|||{}");
    assert!(!rollout
        .is_active("search", &EvaluationContext::for_user(&"5"))
        .await
        .unwrap());
}

#[tokio::test]
async fn test_store_errors_are_typed() {
    let store = StoreConfig::redis("redis://localhost:6379").with_hash("");
    let err = Rollout::from_config(&store, RolloutConfig::default())
        .await
        .unwrap_err();
    assert!(err.is_store_error());
    assert!(matches!(err, RolloutError::Store(StoreError::Config(_))));
}
