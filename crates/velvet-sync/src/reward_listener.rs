//! Rewards chain event listener.
//!
//! Twin of the issuance listener, scoped to the rewards chain: ingests
//! reward deposits into the append-only ledger and confirmed claims
//! into the withdrawal table, and advances time-reward claim cursors
//! for special-range tokens covered by a claim.

use std::sync::Arc;

use serde_json::json;
use tokio::sync::broadcast;
use tokio::time::MissedTickBehavior;
use velvet_chain::RewardsChain;
use velvet_db::queries::{cursors, rewards, time_rewards};
use velvet_timereward::TimeRewardTracker;
use velvet_types::event::{Event, EventType};
use velvet_types::{BlockNumber, Clock, RewardsEvent};

use crate::{emit, log_tick_error, Db, Result};

/// Reward listener timing configuration.
#[derive(Clone, Debug)]
pub struct RewardListenerConfig {
    pub poll_interval: std::time::Duration,
    pub max_block_range: u64,
    pub start_block: BlockNumber,
}

impl Default for RewardListenerConfig {
    fn default() -> Self {
        Self {
            poll_interval: std::time::Duration::from_secs(20),
            max_block_range: 1_000,
            start_block: 0,
        }
    }
}

/// The rewards chain event listener.
pub struct RewardEventListener {
    db: Db,
    chain: Arc<dyn RewardsChain>,
    tracker: TimeRewardTracker,
    bus: broadcast::Sender<Event>,
    clock: Arc<dyn Clock>,
    config: RewardListenerConfig,
}

impl RewardEventListener {
    pub fn new(
        db: Db,
        chain: Arc<dyn RewardsChain>,
        tracker: TimeRewardTracker,
        bus: broadcast::Sender<Event>,
        clock: Arc<dyn Clock>,
        config: RewardListenerConfig,
    ) -> Self {
        Self {
            db,
            chain,
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
            cursors::get(&conn, cursors::REWARD_EVENTS, self.config.start_block)?
        };
        if head <= cursor {
            return Ok(0);
        }

        let to = head.min(cursor + self.config.max_block_range);
        let events = self.chain.query_events(cursor + 1, to).await?;
        let count = events.len();

        for event in events {
            if let Err(e) = self.handle_event(event).await {
                tracing::warn!(error = %e, "rewards event handling failed");
            }
        }

        {
            let conn = self.db.lock().await;
            cursors::set(&conn, cursors::REWARD_EVENTS, to)?;
        }
        if count > 0 {
            tracing::debug!(from = cursor + 1, to, count, "processed rewards events");
        }
        Ok(count)
    }

    async fn handle_event(&self, event: RewardsEvent) -> Result<()> {
        match event {
            RewardsEvent::RewardDeposited {
                commitment_hash,
                amount_wei,
                tx_hash,
                block_number,
                timestamp,
            } => {
                let inserted = {
                    let conn = self.db.lock().await;
                    rewards::insert_event(
                        &conn,
                        &tx_hash,
                        &commitment_hash,
                        amount_wei,
                        timestamp,
                        block_number,
                    )?
                };
                if inserted {
                    emit(
                        &self.bus,
                        EventType::RewardReceived,
                        self.clock.now(),
                        json!({ "amount_wei": amount_wei.to_string(), "tx_hash": tx_hash }),
                    );
                }
                Ok(())
            }

            RewardsEvent::RewardClaimed {
                user,
                amount_wei,
                token_ids,
                tx_hash,
                timestamp,
                ..
            } => {
                let now = self.clock.now();
                let mut time_claims: Vec<(u64, velvet_types::Wei)> = Vec::new();
                let inserted = {
                    let conn = self.db.lock().await;
                    let inserted = rewards::insert_withdrawal(
                        &conn, &tx_hash, &user, amount_wei, &token_ids, timestamp,
                    )?;
                    if inserted {
                        // A confirmed claim covering registered special
                        // tokens also settles their time accrual, keyed
                        // on the claim's block timestamp.
                        for token_id in &token_ids {
                            if !self.tracker.is_special(*token_id) {
                                continue;
                            }
                            if time_rewards::get(&conn, *token_id)?.is_none() {
                                continue;
                            }
                            let claimed = self
                                .tracker
                                .apply_confirmed_claim(&conn, *token_id, timestamp)?;
                            if claimed > 0 {
                                time_claims.push((*token_id, claimed));
                            }
                        }
                    }
                    inserted
                };

                if inserted {
                    emit(
                        &self.bus,
                        EventType::RewardClaimed,
                        now,
                        json!({
                            "user": user,
                            "amount_wei": amount_wei.to_string(),
                            "token_ids": token_ids,
                        }),
                    );
                    for (token_id, claimed) in time_claims {
                        emit(
                            &self.bus,
                            EventType::TimeRewardClaimed,
                            now,
                            json!({ "token_id": token_id, "claimed_wei": claimed.to_string() }),
                        );
                    }
                }
                Ok(())
            }
        }
    }

    /// Interval loop until shutdown.
    pub async fn run(self: Arc<Self>, mut shutdown: broadcast::Receiver<()>) {
        let mut ticker = tokio::time::interval(self.config.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tracing::info!("reward event listener started");
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Err(e) = self.tick().await {
                        log_tick_error("reward_event_listener", &e);
                    }
                }
                _ = shutdown.recv() => {
                    tracing::info!("reward event listener stopping");
                    break;
                }
            }
        }
    }
}
