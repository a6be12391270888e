//! Cart aggregation integration tests.

mod common;

use std::time::Duration;

use common::{kettle, lamp, mug, TestHarness};
use serde_json::json;
use storefront_core::Cart;
use storefront_service::{CartService, StaticIdentity, StorefrontError};
use storefront_store::{DocPath, DocumentStore};

fn ids(cart: &Cart) -> Vec<String> {
    cart.items().iter().map(|item| item.id().to_string()).collect()
}

async fn stored_cart(harness: &TestHarness) -> Cart {
    let value = harness
        .store
        .read(&DocPath::cart(&harness.user_id))
        .await
        .unwrap()
        .unwrap_or(serde_json::Value::Null);
    Cart::from_document(value).unwrap()
}

// ============================================================================
// Line-item rules
// ============================================================================

#[tokio::test]
async fn repeated_adds_merge_into_one_line_per_product() {
    let harness = TestHarness::new();
    let cart = CartService::create(harness.dyn_store(), &harness.identity(), &harness.config).unwrap();

    for product in [lamp(), mug(), lamp(), lamp(), kettle(), mug()] {
        cart.add_item(&product).await.unwrap();
    }
    cart.flush().await;

    let snapshot = cart.snapshot();
    let quantities: Vec<(String, u32)> = snapshot
        .items()
        .iter()
        .map(|item| (item.id().to_string(), item.quantity))
        .collect();
    assert_eq!(
        quantities,
        vec![("lamp".into(), 3), ("mug".into(), 2), ("kettle".into(), 1)]
    );
    assert_eq!(stored_cart(&harness).await, snapshot);
}

#[tokio::test]
async fn quantity_below_one_is_clamped() {
    let harness = TestHarness::new();
    let cart = CartService::create(harness.dyn_store(), &harness.identity(), &harness.config).unwrap();
    let lamp = lamp();

    cart.add_item(&lamp).await.unwrap();
    cart.update_quantity(&lamp.id, 4).await.unwrap();
    assert_eq!(cart.snapshot().get(&lamp.id).unwrap().quantity, 4);

    cart.update_quantity(&lamp.id, -3).await.unwrap();
    assert_eq!(cart.snapshot().get(&lamp.id).unwrap().quantity, 1);

    cart.update_quantity(&lamp.id, 0).await.unwrap();
    assert_eq!(cart.snapshot().get(&lamp.id).unwrap().quantity, 1);
}

#[tokio::test]
async fn remove_then_add_starts_a_fresh_line() {
    let harness = TestHarness::new();
    let cart = CartService::create(harness.dyn_store(), &harness.identity(), &harness.config).unwrap();
    let lamp = lamp();

    cart.add_item(&lamp).await.unwrap();
    cart.add_item(&lamp).await.unwrap();
    cart.toggle_select(&lamp.id).await.unwrap();
    cart.remove_item(&lamp.id).await.unwrap();
    assert!(cart.snapshot().is_empty());

    cart.add_item(&lamp).await.unwrap();
    let item = cart.snapshot().get(&lamp.id).cloned().unwrap();
    assert_eq!(item.quantity, 1);
    assert!(!item.selected);
}

#[tokio::test]
async fn selected_total_counts_only_selected_lines() {
    let harness = TestHarness::new();
    let cart = CartService::create(harness.dyn_store(), &harness.identity(), &harness.config).unwrap();

    cart.add_item(&lamp()).await.unwrap();
    cart.add_item(&lamp()).await.unwrap();
    cart.add_item(&mug()).await.unwrap();
    assert_eq!(cart.selected_total().unwrap(), 0);

    cart.toggle_select(&lamp().id).await.unwrap();
    assert_eq!(cart.selected_total().unwrap(), 240_000);
    assert_eq!(cart.selected_items().len(), 1);

    cart.remove_items(&[lamp().id, mug().id]).await.unwrap();
    assert!(cart.snapshot().is_empty());
}

#[tokio::test]
async fn malformed_product_is_rejected() {
    let harness = TestHarness::new();
    let cart = CartService::create(harness.dyn_store(), &harness.identity(), &harness.config).unwrap();

    let free = common::product("free", "Freebie", -1);
    let err = cart.add_item(&free).await.unwrap_err();
    assert!(matches!(err, StorefrontError::Validation(_)));
    assert!(cart.snapshot().is_empty());
}

// ============================================================================
// Synchronization
// ============================================================================

#[tokio::test]
async fn loads_existing_cart_and_follows_remote_changes() {
    let harness = TestHarness::new();
    let path = DocPath::cart(&harness.user_id);
    harness
        .store
        .write(
            &path,
            json!([{"id": "mug", "name": "Mug", "price": 15000, "image": "", "quantity": 2}]),
        )
        .await
        .unwrap();

    let cart = CartService::create(harness.dyn_store(), &harness.identity(), &harness.config).unwrap();
    assert_eq!(cart.snapshot().total_quantity(), 2);

    let mut updates = cart.watch();
    harness.store.write(&path, serde_json::Value::Null).await.unwrap();
    assert!(updates.has_changed().unwrap());
    assert!(cart.snapshot().is_empty());
}

#[tokio::test]
async fn undecodable_remote_cart_is_ignored() {
    let harness = TestHarness::new();
    let cart = CartService::create(harness.dyn_store(), &harness.identity(), &harness.config).unwrap();
    cart.add_item(&lamp()).await.unwrap();
    cart.flush().await;

    harness
        .store
        .write(&DocPath::cart(&harness.user_id), json!("not a cart"))
        .await
        .unwrap();
    assert_eq!(cart.snapshot().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn echo_of_an_older_write_does_not_drop_queued_changes() {
    let harness = TestHarness::new();
    harness.store.delay_writes(Duration::from_millis(50));
    let cart = CartService::create(harness.dyn_store(), &harness.identity(), &harness.config).unwrap();

    cart.add_item(&lamp()).await.unwrap();
    tokio::time::sleep(Duration::from_millis(10)).await;
    cart.add_item(&mug()).await.unwrap();

    // The lamp-only write lands and is echoed while the mug write waits.
    tokio::time::sleep(Duration::from_millis(60)).await;
    assert_eq!(ids(&cart.snapshot()), vec!["lamp", "mug"]);

    cart.add_item(&kettle()).await.unwrap();
    cart.flush().await;

    assert_eq!(ids(&cart.snapshot()), vec!["lamp", "mug", "kettle"]);
    assert_eq!(stored_cart(&harness).await, cart.snapshot());
}

#[tokio::test(start_paused = true)]
async fn remote_changes_apply_once_queued_writes_land() {
    let harness = TestHarness::new();
    harness.store.delay_writes(Duration::from_millis(50));
    let cart = CartService::create(harness.dyn_store(), &harness.identity(), &harness.config).unwrap();

    cart.add_item(&lamp()).await.unwrap();
    cart.flush().await;
    assert_eq!(ids(&cart.snapshot()), vec!["lamp"]);

    harness.store.delay_writes(Duration::ZERO);
    harness
        .store
        .write(
            &DocPath::cart(&harness.user_id),
            json!([{"id": "mug", "name": "Mug", "price": 15000, "image": "", "quantity": 1}]),
        )
        .await
        .unwrap();
    assert_eq!(ids(&cart.snapshot()), vec!["mug"]);
}

#[tokio::test]
async fn failed_optimistic_write_keeps_local_state() {
    let harness = TestHarness::new();
    let cart = CartService::create(harness.dyn_store(), &harness.identity(), &harness.config).unwrap();

    harness.store.fail_writes(true);
    cart.add_item(&lamp()).await.unwrap();
    cart.flush().await;

    assert_eq!(cart.snapshot().len(), 1);
    assert_eq!(harness.store.write_count(), 1);
    assert!(stored_cart(&harness).await.is_empty());
}

#[tokio::test]
async fn unchanged_cart_is_not_written() {
    let harness = TestHarness::new();
    let cart = CartService::create(harness.dyn_store(), &harness.identity(), &harness.config).unwrap();

    cart.remove_item(&lamp().id).await.unwrap();
    cart.update_quantity(&mug().id, 3).await.unwrap();
    cart.flush().await;

    assert_eq!(harness.store.write_count(), 0);
}

// ============================================================================
// Confirm mode
// ============================================================================

#[tokio::test]
async fn confirm_mode_publishes_after_the_write() {
    let harness = TestHarness::confirming();
    let cart = CartService::create(harness.dyn_store(), &harness.identity(), &harness.config).unwrap();

    cart.add_item(&lamp()).await.unwrap();

    assert_eq!(cart.snapshot().len(), 1);
    assert_eq!(stored_cart(&harness).await, cart.snapshot());
}

#[tokio::test]
async fn confirm_mode_failure_is_reported_and_state_kept() {
    let harness = TestHarness::confirming();
    let cart = CartService::create(harness.dyn_store(), &harness.identity(), &harness.config).unwrap();
    cart.add_item(&mug()).await.unwrap();

    harness.store.fail_writes(true);
    let err = cart.add_item(&lamp()).await.unwrap_err();

    assert!(err.is_retryable());
    match err {
        StorefrontError::StoreWrite { path, .. } => assert_eq!(path, "users/user-1/cart"),
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(cart.snapshot().len(), 1);
    assert!(cart.snapshot().get(&lamp().id).is_none());
}

// ============================================================================
// Anonymous users and lifecycle
// ============================================================================

#[test]
fn optimistic_cart_needs_a_runtime() {
    let harness = TestHarness::new();
    let result = CartService::create(harness.dyn_store(), &harness.identity(), &harness.config);
    assert!(matches!(result, Err(StorefrontError::NoRuntime(_))));
    assert_eq!(harness.store.listener_count(), 0);

    let harness = TestHarness::confirming();
    let cart = CartService::create(harness.dyn_store(), &harness.identity(), &harness.config).unwrap();
    assert!(cart.snapshot().is_empty());
}

#[tokio::test]
async fn anonymous_mutations_are_no_ops() {
    let harness = TestHarness::new();
    let cart =
        CartService::create(harness.dyn_store(), &StaticIdentity::anonymous(), &harness.config).unwrap();

    cart.add_item(&lamp()).await.unwrap();
    cart.toggle_select(&lamp().id).await.unwrap();

    assert!(cart.user_id().is_none());
    assert!(cart.snapshot().is_empty());
    assert_eq!(harness.store.write_count(), 0);
    assert_eq!(harness.store.listener_count(), 0);
}

#[tokio::test]
async fn dispose_releases_listeners_and_drains_writes() {
    let harness = TestHarness::new();
    let cart = CartService::create(harness.dyn_store(), &harness.identity(), &harness.config).unwrap();
    assert_eq!(harness.store.listener_count(), 1);

    cart.add_item(&kettle()).await.unwrap();
    cart.dispose().await;

    assert_eq!(harness.store.listener_count(), 0);
    assert_eq!(stored_cart(&harness).await.len(), 1);
}
