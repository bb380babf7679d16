//! Integration test: the mint lifecycle across the event listener,
//! the pending-mint reconciler and the store.
//!
//! Exercises:
//! 1. Mint-requested records a pending mint and broadcasts
//! 2. Mint-completed settles the pending record, upserts NFT + sale,
//!    and routes reward registration through the admin queue
//! 3. Replaying the same completion is idempotent
//! 4. An abandoned pending mint is dropped exactly once, and a late
//!    real completion for that token still lands through the normal
//!    handler

use std::sync::Arc;

use tokio::sync::broadcast;
use velvet_chain::mock::MockChain;
use velvet_db::queries::{nfts, pending_mints, sales};
use velvet_sync::listener::{EventListener, ListenerConfig};
use velvet_sync::reconcile::{PendingMintReconciler, ReconcilerConfig};
use velvet_sync::Db;
use velvet_timereward::TimeRewardTracker;
use velvet_txqueue::{AdminTxQueue, QueueConfig};
use velvet_types::event::{Event, EventType};
use velvet_types::{Address, IssuanceEvent, ManualClock, TxHash};

const NOW: u64 = 1_700_000_000;

struct Env {
    chain: MockChain,
    clock: ManualClock,
    listener: Arc<EventListener>,
    db: Db,
    events: broadcast::Receiver<Event>,
}

fn setup() -> Env {
    let chain = MockChain::new();
    let clock = ManualClock::new(NOW);
    let conn = velvet_db::open_memory().expect("open db");
    let db: Db = Arc::new(tokio::sync::Mutex::new(conn));
    let (bus, events) = broadcast::channel(256);
    let queue = AdminTxQueue::new(
        Arc::new(chain.clone()),
        Some(Address::new("0xadmin")),
        QueueConfig {
            inter_tx_delay: std::time::Duration::from_millis(1),
            confirm_poll_interval: std::time::Duration::from_millis(1),
            confirm_timeout: std::time::Duration::from_secs(2),
        },
    );
    let listener = Arc::new(EventListener::new(
        db.clone(),
        Arc::new(chain.clone()),
        queue,
        TimeRewardTracker::new(1_000, 1_999),
        bus,
        Arc::new(clock.clone()),
        ListenerConfig::default(),
    ));
    Env {
        chain,
        clock,
        listener,
        db,
        events,
    }
}

fn requested(request_id: u64, token_id: u64, block: u64) -> IssuanceEvent {
    IssuanceEvent::MintRequested {
        request_id,
        sender: Address::new("0xbuyer"),
        token_id,
        price_wei: 3_000,
        tx_hash: TxHash::new(format!("0xreq{request_id}")),
        block_number: block,
        timestamp: NOW - 30,
    }
}

fn completed(request_id: u64, token_id: u64, block: u64) -> IssuanceEvent {
    IssuanceEvent::MintCompleted {
        request_id,
        token_id,
        owner: Address::new("0xbuyer"),
        hostess_index: 2,
        price_wei: 3_000,
        affiliate_tier1: Address::new("0xaff1"),
        affiliate_tier2: Address::zero(),
        tx_hash: TxHash::new(format!("0xmint{token_id}")),
        block_number: block,
        timestamp: NOW - 10,
    }
}

async fn wait_for_submission(chain: &MockChain, method: &str) {
    tokio::time::timeout(std::time::Duration::from_secs(2), async {
        loop {
            if chain.submissions().iter().any(|s| s.method == method) {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        }
    })
    .await
    .unwrap_or_else(|_| panic!("no {method} submission observed"));
}

fn drain_event_types(rx: &mut broadcast::Receiver<Event>) -> Vec<EventType> {
    let mut kinds = Vec::new();
    while let Ok(event) = rx.try_recv() {
        kinds.push(event.event_type);
    }
    kinds
}

#[tokio::test]
async fn mint_request_then_completion() {
    let mut env = setup();

    env.chain.push_issuance_event(5, requested(9, 77, 5));
    env.listener.tick().await.expect("tick");
    {
        let conn = env.db.lock().await;
        assert_eq!(pending_mints::count(&conn).expect("count"), 1);
    }
    assert!(drain_event_types(&mut env.events).contains(&EventType::MintPending));

    env.chain.push_issuance_event(6, completed(9, 77, 6));
    env.listener.tick().await.expect("tick");

    {
        let conn = env.db.lock().await;
        assert_eq!(pending_mints::count(&conn).expect("pending settled"), 0);

        let nft = nfts::get(&conn, 77).expect("get").expect("nft exists");
        assert_eq!(nft.owner, Address::new("0xbuyer"));
        assert_eq!(nft.hostess_index, 2);
        assert_eq!(nft.mint_tx_hash, Some(TxHash::new("0xmint77")));

        let sale_rows = sales::by_token(&conn, 77).expect("sales");
        assert_eq!(sale_rows.len(), 1);
        assert!(!sale_rows[0].synthetic);
    }
    assert!(drain_event_types(&mut env.events).contains(&EventType::NftMinted));

    // The registration reaches the chain through the serialized queue.
    wait_for_submission(&env.chain, "rewards_registerNft").await;
}

#[tokio::test]
async fn duplicate_completion_is_idempotent() {
    let env = setup();

    env.chain.push_issuance_event(6, completed(9, 77, 6));
    env.listener.tick().await.expect("first tick");
    // The same event arrives again in a later block range.
    env.chain.push_issuance_event(7, completed(9, 77, 7));
    env.listener.tick().await.expect("second tick");

    let conn = env.db.lock().await;
    assert_eq!(nfts::count(&conn).expect("one nft"), 1);
    assert_eq!(sales::count(&conn).expect("one sale"), 1);
}

#[tokio::test]
async fn abandoned_mint_does_not_block_late_completion() {
    let env = setup();

    // A pending mint the chain never resolves.
    env.chain.push_issuance_event(5, requested(9, 77, 5));
    env.listener.tick().await.expect("tick");

    // Past the abandon threshold, the token still has no owner.
    env.clock.advance(400);
    let reconciler = PendingMintReconciler::new(env.listener.clone(), ReconcilerConfig::default());
    let (recovered, abandoned) = reconciler.tick().await.expect("reconcile");
    assert_eq!((recovered, abandoned), (0, 1));
    let (_, abandoned_again) = reconciler.tick().await.expect("reconcile again");
    assert_eq!(abandoned_again, 0, "dropped exactly once");

    // The chain later confirms the mint after all; the normal handler
    // still lands it because every store write is an idempotent upsert.
    env.chain.push_issuance_event(8, completed(9, 77, 8));
    env.listener.tick().await.expect("tick");

    let conn = env.db.lock().await;
    assert!(nfts::get(&conn, 77).expect("get").is_some());
    assert_eq!(sales::count(&conn).expect("sale recorded"), 1);
}

#[tokio::test]
async fn missed_completion_recovered_and_upgraded() {
    let env = setup();

    env.chain.push_issuance_event(5, requested(9, 77, 5));
    env.listener.tick().await.expect("tick");

    // The completion event is missed, but the contract shows an owner.
    env.chain.set_owner(77, Address::new("0xbuyer"), 2);
    env.clock.advance(120);
    let reconciler = PendingMintReconciler::new(env.listener.clone(), ReconcilerConfig::default());
    let (recovered, _) = reconciler.tick().await.expect("reconcile");
    assert_eq!(recovered, 1);

    {
        let conn = env.db.lock().await;
        let sale_rows = sales::by_token(&conn, 77).expect("sales");
        assert_eq!(sale_rows.len(), 1);
        assert!(sale_rows[0].synthetic, "placeholder until the real event");
    }

    // The real event finally arrives: the placeholder is upgraded in
    // place, never duplicated.
    env.chain.push_issuance_event(9, completed(9, 77, 9));
    env.listener.tick().await.expect("tick");

    let conn = env.db.lock().await;
    let sale_rows = sales::by_token(&conn, 77).expect("sales");
    assert_eq!(sale_rows.len(), 1);
    assert!(!sale_rows[0].synthetic);
    assert_eq!(sale_rows[0].tx_hash, TxHash::new("0xmint77"));
}
