//! Integration test: owner synchronization under partial failure.
//!
//! Exercises:
//! 1. A full pass where 3 of 20 individual reads fail still persists
//!    the other 17 and finishes the pass
//! 2. A whole failed batch is skipped without aborting later batches
//! 3. Full and incremental passes converge on the same rows

use std::sync::Arc;

use velvet_chain::mock::MockChain;
use velvet_db::queries::{nfts, stats};
use velvet_sync::owner_sync::{OwnerSyncConfig, OwnerSyncService};
use velvet_sync::Db;
use velvet_types::{Address, ManualClock};

fn setup(chain: MockChain) -> (OwnerSyncService, Db) {
    let conn = velvet_db::open_memory().expect("open db");
    let db: Db = Arc::new(tokio::sync::Mutex::new(conn));
    let service = OwnerSyncService::new(
        db.clone(),
        Arc::new(chain),
        Arc::new(ManualClock::new(1_700_000_000)),
        OwnerSyncConfig {
            batch_delay: std::time::Duration::from_millis(1),
            ..OwnerSyncConfig::default()
        },
    );
    (service, db)
}

#[tokio::test]
async fn partial_read_failures_do_not_lose_the_batch() {
    let chain = MockChain::new();
    chain.set_supply(20);
    for id in 1..=20u64 {
        chain.set_owner(id, Address::new(&format!("0xowner{id}")), (id % 8) as u8);
    }
    chain.fail_owner_read(3);
    chain.fail_owner_read(11);
    chain.fail_owner_read(18);

    let (service, db) = setup(chain);
    let report = service.full_pass().await.expect("pass completes");

    assert_eq!(report.synced, 17);
    assert_eq!(report.failed_reads, 3);
    assert_eq!(report.failed_batches, 0);

    let conn = db.lock().await;
    assert_eq!(nfts::count(&conn).expect("count"), 17);
    for missing in [3u64, 11, 18] {
        assert!(nfts::get(&conn, missing).expect("get").is_none());
    }
}

#[tokio::test]
async fn failed_batch_skipped_pass_continues() {
    let chain = MockChain::new();
    chain.set_supply(60);
    for id in 1..=60u64 {
        chain.set_owner(id, Address::new("0xsame"), 0);
    }
    // First batch read dies wholesale (rate limit); the remaining two
    // batches of 20 still run.
    chain.fail_whole_batches(1);

    let (service, db) = setup(chain);
    let report = service.full_pass().await.expect("pass completes");

    assert_eq!(report.failed_batches, 1);
    assert_eq!(report.synced, 40);
    let conn = db.lock().await;
    assert_eq!(nfts::count(&conn).expect("count"), 40);
}

#[tokio::test]
async fn full_and_incremental_converge() {
    let chain = MockChain::new();
    chain.set_supply(8);
    for id in 1..=8u64 {
        chain.set_owner(id, Address::new("0xfirst"), 1);
    }

    let (service, db) = setup(chain.clone());
    service.full_pass().await.expect("full pass");

    // Supply grows and one existing owner changes.
    chain.set_supply(10);
    chain.set_owner(9, Address::new("0xnine"), 2);
    chain.set_owner(10, Address::new("0xten"), 2);
    chain.set_owner(4, Address::new("0xsecond"), 1);

    let synced = service.incremental_pass().await.expect("incremental");
    assert_eq!(synced, 2, "incremental touches only the new range");
    {
        let conn = db.lock().await;
        assert_eq!(
            nfts::get(&conn, 4).expect("get").expect("row").owner,
            Address::new("0xfirst"),
            "ownership change waits for the next full pass"
        );
    }

    service.full_pass().await.expect("second full pass");
    let conn = db.lock().await;
    assert_eq!(
        nfts::get(&conn, 4).expect("get").expect("row").owner,
        Address::new("0xsecond")
    );
    assert_eq!(nfts::count(&conn).expect("count"), 10);

    let tiers = stats::tiers(&conn).expect("tiers");
    assert_eq!(tiers[1].nft_count, 8);
    assert_eq!(tiers[2].nft_count, 2);
}
