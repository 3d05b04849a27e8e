// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Walks the laptop and phone lookups through the three tiers.
//!
//! Each tier decision is logged as a `lookup.event`. The clock is controlled so that TTL
//! expiry happens instantly.

use std::time::Duration;

use futures::executor::block_on;
use stratum::{
    CacheCoordinator, CacheEntry, CacheTier, CanonicalStore, CoordinatorConfig, InMemoryStore, ItemKey, SharedCache, codec,
};
use tick::ClockControl;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .init();

    block_on(run())
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let control = ClockControl::new();
    let clock = control.to_clock();
    let catalogue = InMemoryStore::catalogue();
    let shared = SharedCache::new(&clock);

    let config = CoordinatorConfig::from_toml_str(
        r#"
        local_capacity = 5
        local_ttl_secs = 60
        distributed_ttl_secs = 300
        "#,
    )?;
    let coordinator = CacheCoordinator::builder(&clock)
        .config(config)
        .distributed(shared.clone())
        .store(catalogue.clone())
        .build()?;

    let laptop = ItemKey::from(1);
    let phone = ItemKey::from(2);

    println!("-- laptop, cold: read from the catalogue");
    println!("{:?}", coordinator.get(&laptop).await?);

    println!("-- laptop, warm: read from the local tier");
    println!("{:?}", coordinator.get(&laptop).await?);

    // Another process already cached the phone.
    if let Some(record) = catalogue.get(&phone).await? {
        shared
            .insert(
                &format!("item_{phone}"),
                CacheEntry::with_ttl(codec::encode(&record)?, Duration::from_secs(300)),
            )
            .await?;
    }
    println!("-- phone: read from the shared tier");
    println!("{:?}", coordinator.get(&phone).await?);

    control.advance(Duration::from_secs(61));
    println!("-- laptop, local entry expired: read from the shared tier");
    println!("{:?}", coordinator.get(&laptop).await?);

    match coordinator.get(&ItemKey::from(99)).await {
        Ok(item) => println!("unexpected item {item:?}"),
        Err(err) => println!("-- unknown item: {err}"),
    }

    let (shared, _catalogue) = coordinator.into_parts();
    println!("shared keys: {:?}", shared.keys());
    Ok(())
}
