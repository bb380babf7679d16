//! Issuance chain event listener.
//!
//! Polls the NFT contract's event log and applies mint and transfer
//! events to the store. The cursor advances to the queried upper bound
//! whether or not events were found, so a quiet period never stalls
//! progress; anything a missed or failed event loses is re-derived by
//! reconciliation and the owner sync.

use std::sync::Arc;

use serde_json::json;
use tokio::sync::broadcast;
use tokio::time::MissedTickBehavior;
use velvet_chain::IssuanceChain;
use velvet_db::queries::{affiliates, cursors, nfts, pending_mints, sales, stats};
use velvet_db::DbError;
use velvet_timereward::TimeRewardTracker;
use velvet_txqueue::{AdminOp, AdminTxQueue};
use velvet_types::event::{Event, EventType};
use velvet_types::{Address, BlockNumber, Clock, IssuanceEvent, RequestId, TokenId, TxHash, Wei};

use crate::{emit, log_tick_error, Db, Result};

/// Affiliate payout percentages of the mint price.
const AFFILIATE_TIER1_PCT: Wei = 10;
const AFFILIATE_TIER2_PCT: Wei = 5;

/// Listener timing configuration.
#[derive(Clone, Debug)]
pub struct ListenerConfig {
    pub poll_interval: std::time::Duration,
    /// Largest block range scanned in one tick.
    pub max_block_range: u64,
    /// Cursor starting point for a fresh database.
    pub start_block: BlockNumber,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            poll_interval: std::time::Duration::from_secs(15),
            max_block_range: 1_000,
            start_block: 0,
        }
    }
}

/// Data applied by the mint-completed path. Built either from the
/// decoded event or, in reconciliation, from direct contract reads in
/// place of event arguments.
#[derive(Clone, Debug)]
pub(crate) struct MintData {
    pub request_id: Option<RequestId>,
    pub token_id: TokenId,
    pub owner: Address,
    pub hostess_index: u8,
    pub price_wei: Wei,
    pub affiliate_tier1: Option<Address>,
    pub affiliate_tier2: Option<Address>,
    pub tx_hash: TxHash,
    pub timestamp: u64,
    pub synthetic: bool,
}

/// The issuance chain event listener.
pub struct EventListener {
    pub(crate) db: Db,
    pub(crate) chain: Arc<dyn IssuanceChain>,
    pub(crate) queue: AdminTxQueue,
    pub(crate) tracker: TimeRewardTracker,
    pub(crate) bus: broadcast::Sender<Event>,
    pub(crate) clock: Arc<dyn Clock>,
    pub(crate) config: ListenerConfig,
}

impl EventListener {
    pub fn new(
        db: Db,
        chain: Arc<dyn IssuanceChain>,
        queue: AdminTxQueue,
        tracker: TimeRewardTracker,
        bus: broadcast::Sender<Event>,
        clock: Arc<dyn Clock>,
        config: ListenerConfig,
    ) -> Self {
        Self {
            db,
            chain,
            queue,
            tracker,
            bus,
            clock,
            config,
        }
    }

    /// One poll cycle. Returns the number of events processed.
    pub async fn tick(&self) -> Result<usize> {
        let head = self.chain.head_block().await?;
        let cursor = {
            let conn = self.db.lock().await;
            cursors::get(&conn, cursors::ISSUANCE_EVENTS, self.config.start_block)?
        };
        if head <= cursor {
            return Ok(0);
        }

        let to = head.min(cursor + self.config.max_block_range);
        let events = self.chain.query_events(cursor + 1, to).await?;
        let count = events.len();

        for event in events {
            if let Err(e) = self.handle_event(event).await {
                // The store upserts are idempotent and reconciliation
                // re-derives anything a failed handler lost.
                tracing::warn!(error = %e, "issuance event handling failed");
            }
        }

        {
            let conn = self.db.lock().await;
            cursors::set(&conn, cursors::ISSUANCE_EVENTS, to)?;
        }
        if count > 0 {
            tracing::debug!(from = cursor + 1, to, count, "processed issuance events");
        }
        Ok(count)
    }

    async fn handle_event(&self, event: IssuanceEvent) -> Result<()> {
        match event {
            IssuanceEvent::MintRequested {
                request_id,
                sender,
                token_id,
                price_wei,
                tx_hash,
                timestamp,
                ..
            } => {
                let recorded = {
                    let conn = self.db.lock().await;
                    pending_mints::insert(
                        &conn, request_id, &sender, token_id, price_wei, &tx_hash, timestamp,
                    )?
                };
                if recorded {
                    emit(
                        &self.bus,
                        EventType::MintPending,
                        self.clock.now(),
                        json!({
                            "request_id": request_id,
                            "token_id": token_id,
                            "sender": sender,
                        }),
                    );
                }
                Ok(())
            }

            IssuanceEvent::MintCompleted {
                request_id,
                token_id,
                owner,
                hostess_index,
                price_wei,
                affiliate_tier1,
                affiliate_tier2,
                tx_hash,
                timestamp,
                ..
            } => {
                self.apply_mint(MintData {
                    request_id: Some(request_id),
                    token_id,
                    owner,
                    hostess_index,
                    price_wei,
                    affiliate_tier1: Some(affiliate_tier1).filter(|a| !a.is_zero()),
                    affiliate_tier2: Some(affiliate_tier2).filter(|a| !a.is_zero()),
                    tx_hash,
                    timestamp,
                    synthetic: false,
                })
                .await
            }

            IssuanceEvent::Transferred {
                token_id,
                from,
                to,
                ..
            } => {
                if from.is_zero() {
                    // Ownership is established by the mint-completed
                    // event; acting on the mint's own transfer would
                    // race it.
                    tracing::trace!(token_id, "skipping zero-address transfer");
                    return Ok(());
                }
                let now = self.clock.now();
                {
                    let conn = self.db.lock().await;
                    match nfts::set_owner(&conn, token_id, &to, now) {
                        Err(DbError::NotFound(_)) => {
                            // The owner sync will pick the token up.
                            tracing::warn!(token_id, "transfer for untracked token");
                            return Ok(());
                        }
                        other => other?,
                    }
                    self.tracker.update_owner(&conn, token_id, &to)?;
                }
                emit(
                    &self.bus,
                    EventType::OwnershipChanged,
                    now,
                    json!({ "token_id": token_id, "from": from, "to": to }),
                );
                self.spawn_update_ownership(token_id, to);
                Ok(())
            }
        }
    }

    /// Apply a completed mint: settle the pending record, upsert the
    /// NFT and sale (upgrading any synthetic placeholder), record
    /// affiliate earnings, refresh tier counts, then register the NFT
    /// for rewards through the admin queue.
    pub(crate) async fn apply_mint(&self, mint: MintData) -> Result<()> {
        let now = self.clock.now();
        let newly_recorded = {
            let conn = self.db.lock().await;
            match mint.request_id {
                Some(request_id) => {
                    pending_mints::delete(&conn, request_id)?;
                }
                None => {
                    pending_mints::delete_by_token(&conn, mint.token_id)?;
                }
            }

            nfts::upsert_minted(
                &conn,
                mint.token_id,
                &mint.owner,
                mint.hostess_index,
                mint.price_wei,
                &mint.tx_hash,
                mint.affiliate_tier1.as_ref(),
                mint.affiliate_tier2.as_ref(),
                now,
            )?;

            let newly_recorded = if mint.synthetic {
                sales::insert_synthetic(
                    &conn,
                    mint.token_id,
                    &mint.owner,
                    mint.price_wei,
                    mint.hostess_index,
                    mint.timestamp,
                )?
            } else {
                sales::record_sale(
                    &conn,
                    mint.token_id,
                    &mint.owner,
                    mint.price_wei,
                    mint.hostess_index,
                    mint.timestamp,
                    &mint.tx_hash,
                )? != sales::SaleOutcome::Duplicate
            };

            if newly_recorded {
                if let Some(affiliate) = &mint.affiliate_tier1 {
                    affiliates::insert(
                        &conn,
                        affiliate,
                        mint.token_id,
                        1,
                        mint.price_wei * AFFILIATE_TIER1_PCT / 100,
                        &mint.tx_hash,
                        mint.timestamp,
                    )?;
                }
                if let Some(affiliate) = &mint.affiliate_tier2 {
                    affiliates::insert(
                        &conn,
                        affiliate,
                        mint.token_id,
                        2,
                        mint.price_wei * AFFILIATE_TIER2_PCT / 100,
                        &mint.tx_hash,
                        mint.timestamp,
                    )?;
                }
                let counts = nfts::count_by_tier(&conn)?;
                stats::update_tier_counts(&conn, &counts, now)?;
            }
            newly_recorded
        };

        if !newly_recorded {
            tracing::debug!(token_id = mint.token_id, "mint already recorded");
            return Ok(());
        }

        emit(
            &self.bus,
            EventType::NftMinted,
            now,
            json!({
                "token_id": mint.token_id,
                "owner": mint.owner,
                "hostess_index": mint.hostess_index,
                "price_wei": mint.price_wei.to_string(),
            }),
        );
        self.spawn_register(mint.token_id, mint.hostess_index, mint.owner.clone());
        Ok(())
    }

    /// Enqueue reward registration and, once confirmed, start time
    /// reward accrual for special-range tokens from the registration
    /// block timestamp.
    fn spawn_register(&self, token_id: TokenId, hostess_index: u8, owner: Address) {
        let handle = self.queue.enqueue(AdminOp::RegisterNft {
            token_id,
            hostess_index,
            owner: owner.clone(),
        });
        let db = self.db.clone();
        let tracker = self.tracker;
        let bus = self.bus.clone();
        let clock = self.clock.clone();

        tokio::spawn(async move {
            match handle.wait().await {
                Ok(submitted) => {
                    let now = clock.now();
                    emit(
                        &bus,
                        EventType::NftRegisteredForRewards,
                        now,
                        json!({ "token_id": token_id, "tx_hash": submitted.tx_hash }),
                    );
                    if !tracker.is_special(token_id) {
                        return;
                    }
                    let start_time = if submitted.confirmation.timestamp > 0 {
                        submitted.confirmation.timestamp
                    } else {
                        tracing::debug!(token_id, "confirmation lacked a timestamp");
                        now
                    };
                    let conn = db.lock().await;
                    match tracker.register(&conn, token_id, hostess_index, &owner, start_time) {
                        Ok(true) => emit(
                            &bus,
                            EventType::SpecialNftStarted,
                            now,
                            json!({ "token_id": token_id, "start_time": start_time }),
                        ),
                        Ok(false) => {}
                        Err(e) => {
                            tracing::warn!(token_id, error = %e, "time reward registration failed")
                        }
                    }
                }
                Err(e) => tracing::warn!(token_id, error = %e, "reward registration failed"),
            }
        });
    }

    /// Enqueue an ownership update; confirmation is logged, not waited
    /// on.
    fn spawn_update_ownership(&self, token_id: TokenId, new_owner: Address) {
        let handle = self.queue.enqueue(AdminOp::UpdateOwnership {
            token_id,
            new_owner,
        });
        tokio::spawn(async move {
            if let Err(e) = handle.wait().await {
                tracing::warn!(token_id, error = %e, "ownership update failed");
            }
        });
    }

    /// Interval loop until shutdown.
    pub async fn run(self: Arc<Self>, mut shutdown: broadcast::Receiver<()>) {
        let mut ticker = tokio::time::interval(self.config.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tracing::info!("event listener started");
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Err(e) = self.tick().await {
                        log_tick_error("event_listener", &e);
                    }
                }
                _ = shutdown.recv() => {
                    tracing::info!("event listener stopping");
                    break;
                }
            }
        }
    }
}
