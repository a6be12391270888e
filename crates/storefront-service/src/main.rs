//! Storefront inspector - prints a user's cart and orders as JSON.
//!
//! Usage: `storefront <user-id>`. Opens the `RocksDB` store in
//! `STOREFRONT_DATA_DIR` when built with `rocksdb-backend`, otherwise an
//! empty in-memory store.

use std::sync::Arc;

use storefront_core::{derive_timeline, UserId};
use storefront_service::{
    init_tracing, CartService, OrderTracker, StaticIdentity, StorefrontConfig,
};
use storefront_store::DocumentStore;

fn open_store(config: &StorefrontConfig) -> Result<Arc<dyn DocumentStore>, Box<dyn std::error::Error>> {
    #[cfg(feature = "rocksdb-backend")]
    {
        if let Some(dir) = &config.data_dir {
            tracing::info!(path = %dir.display(), "Opening RocksDB store");
            return Ok(Arc::new(storefront_store::RocksStore::open(dir)?));
        }
    }

    tracing::info!(data_dir = ?config.data_dir, "Using in-memory store");
    Ok(Arc::new(storefront_store::MemoryStore::new()))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing("info,storefront=debug");

    let user_id: UserId = std::env::args()
        .nth(1)
        .ok_or("usage: storefront <user-id>")?
        .parse()?;

    let config = StorefrontConfig::from_env();
    tracing::info!(
        write_policy = ?config.write_policy,
        standard_fee = config.shipping_fees.standard,
        express_fee = config.shipping_fees.express,
        "Storefront configuration loaded"
    );

    let store = open_store(&config)?;

    let cart = CartService::create(
        Arc::clone(&store),
        &StaticIdentity::user(user_id.clone()),
        &config,
    )?;
    let feed = OrderTracker::new(Arc::clone(&store)).subscribe(&user_id)?;

    let orders: Vec<serde_json::Value> = feed
        .current()
        .iter()
        .map(|order| {
            serde_json::json!({
                "order": order,
                "timeline": derive_timeline(order),
            })
        })
        .collect();

    let report = serde_json::json!({
        "userId": user_id,
        "cart": cart.snapshot(),
        "selectedTotal": cart.selected_total()?,
        "orders": orders,
    });
    println!("{}", serde_json::to_string_pretty(&report)?);

    feed.unsubscribe();
    cart.dispose().await;
    Ok(())
}
