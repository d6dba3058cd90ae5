use std::sync::Arc;

use roleta_core::{commit, MemoryCatalog, MemoryConfigStore, MemoryLedger, ProvablyFairRng, Segment, SpinCoordinator};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Example end-to-end spin
    let store = Arc::new(MemoryConfigStore::new());
    let catalog = MemoryCatalog::new(["TEN", "SHIP"]);
    commit(
        store.as_ref(),
        &catalog,
        vec![
            Segment::new("10%", "10% off your order", "TEN", 3.0 / 4.0).with_color("#e74c3c"),
            Segment::new("Free ship", "Free shipping", "SHIP", 1.0 / 4.0).with_color("#3498db"),
        ],
    )
    .await?;

    let draw = Arc::new(ProvablyFairRng::new("example-server-seed"));
    let coord = SpinCoordinator::new(store, Arc::new(MemoryLedger::new()), draw.clone());
    let result = coord.spin("example-customer", None).await?;
    println!(
        "server_seed_hash={} won={} coupon={}",
        draw.server_seed_hash_hex(),
        result.segment.label,
        result.claim.coupon_code
    );
    Ok(())
}
