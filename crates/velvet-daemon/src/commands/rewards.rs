//! Reward, withdrawal and time-reward command handlers.

use std::sync::Arc;

use serde_json::Value;
use velvet_db::queries::{earnings, nfts, rewards, time_rewards};
use velvet_timereward::AccrualStatus;
use velvet_txqueue::AdminOp;
use velvet_types::Address;

use crate::rpc::RpcError;
use crate::DaemonState;

type Result = std::result::Result<Value, RpcError>;

fn db_err(e: impl std::fmt::Display) -> RpcError {
    RpcError::internal_error(&format!("db error: {e}"))
}

/// Recent reward pool deposits.
pub async fn get_reward_history(state: &Arc<DaemonState>, params: &Value) -> Result {
    let limit = params
        .get("limit")
        .and_then(Value::as_u64)
        .unwrap_or(100)
        .min(1_000) as u32;

    let db = state.db.lock().await;
    let events = rewards::recent_events(&db, limit).map_err(db_err)?;
    let rows: Vec<Value> = events
        .iter()
        .map(|e| {
            serde_json::json!({
                "tx_hash": e.tx_hash,
                "commitment_hash": e.commitment_hash,
                "amount_wei": e.amount_wei.to_string(),
                "timestamp": e.timestamp,
                "block_number": e.block_number,
            })
        })
        .collect();
    Ok(serde_json::json!(rows))
}

/// Withdrawals for an address.
pub async fn get_withdrawals(state: &Arc<DaemonState>, params: &Value) -> Result {
    let user = params
        .get("address")
        .and_then(Value::as_str)
        .map(Address::new)
        .ok_or_else(|| RpcError::invalid_params("address required"))?;

    let db = state.db.lock().await;
    let rows = rewards::withdrawals_by_user(&db, &user).map_err(db_err)?;
    let out: Vec<Value> = rows
        .iter()
        .map(|w| {
            serde_json::json!({
                "tx_hash": w.tx_hash,
                "amount_wei": w.amount_wei.to_string(),
                "token_ids": w.token_ids,
                "timestamp": w.timestamp,
            })
        })
        .collect();
    Ok(serde_json::json!(out))
}

/// Initiate a withdrawal for an owner: resolve the owner's tokens with
/// a pending amount and route one batched withdrawal through the admin
/// queue. Resolves once the transaction is confirmed on-chain.
pub async fn initiate_withdrawal(state: &Arc<DaemonState>, params: &Value) -> Result {
    let owner = params
        .get("owner")
        .and_then(Value::as_str)
        .map(Address::new)
        .ok_or_else(|| RpcError::invalid_params("owner required"))?;

    let token_ids = {
        let db = state.db.lock().await;
        earnings::pending_tokens_for(&db, &owner).map_err(db_err)?
    };
    if token_ids.is_empty() {
        return Err(RpcError::nothing_pending());
    }

    tracing::info!(owner = %owner, tokens = token_ids.len(), "withdrawal requested");
    let handle = state.queue.enqueue(AdminOp::WithdrawRewards {
        recipient: owner.clone(),
        token_ids: token_ids.clone(),
    });
    let submitted = handle
        .wait()
        .await
        .map_err(|e| RpcError::tx_failed(&e.to_string()))?;

    Ok(serde_json::json!({
        "tx_hash": submitted.tx_hash,
        "token_ids": token_ids,
        "block_number": submitted.confirmation.block_number,
    }))
}

/// Time reward status and locally computed pending amount for one
/// token. No contract call involved.
pub async fn get_time_reward_status(state: &Arc<DaemonState>, params: &Value) -> Result {
    let token_id = params
        .get("token_id")
        .and_then(Value::as_u64)
        .ok_or_else(|| RpcError::invalid_params("token_id required"))?;

    if !state.tracker.is_special(token_id) {
        return Err(RpcError::invalid_params("token is not in the special range"));
    }

    let now = state.clock.now();
    let db = state.db.lock().await;
    let status = state
        .tracker
        .status(&db, token_id, now)
        .map_err(|e| RpcError::internal_error(&e.to_string()))?;
    let pending = state
        .tracker
        .pending(&db, token_id, now)
        .map_err(|e| RpcError::internal_error(&e.to_string()))?;

    let status_str = match status {
        AccrualStatus::NotStarted => "not_started",
        AccrualStatus::Active => "active",
        AccrualStatus::Expired => "expired",
    };
    let mut result = serde_json::json!({
        "token_id": token_id,
        "status": status_str,
        "pending_wei": pending.to_string(),
    });
    if let Some(row) = time_rewards::get(&db, token_id).map_err(db_err)? {
        result["start_time"] = Value::from(row.start_time);
        result["last_claim_time"] = Value::from(row.last_claim_time);
        result["total_claimed_wei"] = Value::from(row.total_claimed_wei.to_string());
        result["owner"] = Value::from(row.owner.as_str());
    }
    Ok(result)
}

/// Re-derive a token's time-reward claim cursor from the contract
/// (recovery when local state is suspected stale).
pub async fn verify_time_reward(state: &Arc<DaemonState>, params: &Value) -> Result {
    let token_id = params
        .get("token_id")
        .and_then(Value::as_u64)
        .ok_or_else(|| RpcError::invalid_params("token_id required"))?;

    let exists = {
        let db = state.db.lock().await;
        nfts::get(&db, token_id).map_err(db_err)?.is_some()
    };
    if !exists {
        return Err(RpcError::unknown_token(token_id));
    }

    let now = state.clock.now();
    let db = state.db.lock().await;
    let derived = state
        .tracker
        .verify_from_chain(&db, state.rewards.as_ref(), token_id, now)
        .await
        .map_err(|e| RpcError::internal_error(&e.to_string()))?;

    Ok(serde_json::json!({
        "token_id": token_id,
        "last_claim_time": derived,
    }))
}
