//! Favorites integration tests.

mod common;

use common::{kettle, lamp, mug, TestHarness};
use serde_json::json;
use storefront_service::{FavoritesService, StaticIdentity, StorefrontError};
use storefront_store::{DocPath, DocumentStore};

fn names(favorites: &FavoritesService) -> Vec<String> {
    favorites.snapshot().into_iter().map(|p| p.name).collect()
}

#[tokio::test]
async fn add_and_remove_are_persisted_per_product() {
    let harness = TestHarness::new();
    let favorites =
        FavoritesService::create(harness.dyn_store(), &harness.identity(), &harness.config).unwrap();

    favorites.add(&lamp());
    favorites.add(&mug());
    favorites.add(&lamp());
    favorites.flush().await;

    assert_eq!(names(&favorites), vec!["Desk Lamp", "Mug"]);
    assert_eq!(harness.store.write_count(), 2);
    let stored = harness
        .store
        .read(&DocPath::favorite(&harness.user_id, &lamp().id))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored["name"], "Desk Lamp");

    favorites.remove(&lamp().id);
    favorites.flush().await;
    assert!(!favorites.is_favorite(&lamp().id));
    assert_eq!(
        harness
            .store
            .read(&DocPath::favorite(&harness.user_id, &lamp().id))
            .await
            .unwrap(),
        None
    );
}

#[tokio::test]
async fn toggle_flips_membership() {
    let harness = TestHarness::new();
    let favorites =
        FavoritesService::create(harness.dyn_store(), &harness.identity(), &harness.config).unwrap();

    assert!(favorites.toggle(&kettle()));
    assert!(favorites.is_favorite(&kettle().id));
    assert!(!favorites.toggle(&kettle()));
    assert!(favorites.snapshot().is_empty());

    // Both writes hit the same path, so only the last one is sent.
    favorites.flush().await;
    assert_eq!(harness.store.write_count(), 1);
    assert_eq!(harness.store.dump(), json!({}));
}

#[tokio::test]
async fn loads_and_follows_remote_favorites() {
    let harness = TestHarness::new();
    harness
        .store
        .write(
            &DocPath::favorites(&harness.user_id),
            json!({"mug": {"name": "Mug", "price": 15000}}),
        )
        .await
        .unwrap();

    let favorites =
        FavoritesService::create(harness.dyn_store(), &harness.identity(), &harness.config).unwrap();
    assert!(favorites.is_favorite(&mug().id));

    let mut updates = favorites.watch();
    harness
        .store
        .write(&DocPath::favorite(&harness.user_id, &kettle().id), json!({"name": "Kettle", "price": 45000}))
        .await
        .unwrap();

    assert!(updates.has_changed().unwrap());
    assert_eq!(names(&favorites), vec!["Kettle", "Mug"]);
}

#[tokio::test]
async fn failed_writes_keep_local_favorites() {
    let harness = TestHarness::new();
    let favorites =
        FavoritesService::create(harness.dyn_store(), &harness.identity(), &harness.config).unwrap();

    harness.store.fail_writes(true);
    favorites.add(&lamp());
    favorites.flush().await;

    assert!(favorites.is_favorite(&lamp().id));
    assert_eq!(harness.store.write_count(), 1);
}

#[tokio::test]
async fn anonymous_users_cannot_change_favorites() {
    let harness = TestHarness::new();
    let favorites =
        FavoritesService::create(harness.dyn_store(), &StaticIdentity::anonymous(), &harness.config)
            .unwrap();

    favorites.add(&lamp());
    assert!(!favorites.toggle(&mug()));

    assert!(favorites.snapshot().is_empty());
    assert_eq!(harness.store.write_count(), 0);
    assert_eq!(harness.store.listener_count(), 0);
}

#[tokio::test]
async fn dispose_releases_the_listener() {
    let harness = TestHarness::new();
    let favorites =
        FavoritesService::create(harness.dyn_store(), &harness.identity(), &harness.config).unwrap();
    assert_eq!(harness.store.listener_count(), 1);

    favorites.add(&mug());
    favorites.dispose().await;

    assert_eq!(harness.store.listener_count(), 0);
    assert!(harness
        .store
        .read(&DocPath::favorite(&harness.user_id, &mug().id))
        .await
        .unwrap()
        .is_some());
}

#[test]
fn signed_in_favorites_need_a_runtime() {
    let harness = TestHarness::new();
    let result = FavoritesService::create(harness.dyn_store(), &harness.identity(), &harness.config);
    assert!(matches!(result, Err(StorefrontError::NoRuntime(_))));

    let anonymous =
        FavoritesService::create(harness.dyn_store(), &StaticIdentity::anonymous(), &harness.config);
    assert!(anonymous.is_ok());
}
