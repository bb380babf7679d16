//! Earnings query command handlers.

use std::sync::Arc;

use serde_json::Value;
use velvet_chain::link_affiliate_with_retry;
use velvet_db::queries::{affiliates, earnings, nfts, stats};
use velvet_types::Address;

use crate::rpc::RpcError;
use crate::DaemonState;

type Result = std::result::Result<Value, RpcError>;

/// Bounded retry for affiliate link submissions (invoked from
/// concurrent user-facing requests, not the serialized admin queue).
const LINK_ATTEMPTS: u32 = 3;
const LINK_RETRY_DELAY: std::time::Duration = std::time::Duration::from_secs(1);

fn token_id_param(params: &Value) -> std::result::Result<u64, RpcError> {
    params
        .get("token_id")
        .and_then(Value::as_u64)
        .ok_or_else(|| RpcError::invalid_params("token_id required"))
}

fn address_param(params: &Value, key: &str) -> std::result::Result<Address, RpcError> {
    params
        .get(key)
        .and_then(Value::as_str)
        .map(Address::new)
        .ok_or_else(|| RpcError::invalid_params(&format!("{key} required")))
}

/// Get the cached earnings snapshot and core fields for one NFT.
pub async fn get_nft_earnings(state: &Arc<DaemonState>, params: &Value) -> Result {
    let token_id = token_id_param(params)?;

    let db = state.db.lock().await;
    let nft = nfts::get(&db, token_id)
        .map_err(|e| RpcError::internal_error(&format!("db error: {e}")))?
        .ok_or_else(|| RpcError::unknown_token(token_id))?;
    let snapshot = earnings::get(&db, token_id)
        .map_err(|e| RpcError::internal_error(&format!("db error: {e}")))?;

    let mut result = serde_json::json!({
        "token_id": nft.token_id,
        "owner": nft.owner,
        "hostess_index": nft.hostess_index,
        "total_earned_wei": "0",
        "pending_wei": "0",
        "last24h_wei": "0",
        "apy_basis_points": 0u64,
        "last_synced": 0u64,
    });
    if let Some(snap) = snapshot {
        result["total_earned_wei"] = Value::from(snap.total_earned_wei.to_string());
        result["pending_wei"] = Value::from(snap.pending_wei.to_string());
        result["last24h_wei"] = Value::from(snap.last24h_wei.to_string());
        result["apy_basis_points"] = Value::from(snap.apy_basis_points);
        result["last_synced"] = Value::from(snap.last_synced);
    }
    Ok(result)
}

/// Get every snapshot for an owner's tokens plus totals.
pub async fn get_owner_earnings(state: &Arc<DaemonState>, params: &Value) -> Result {
    let owner = address_param(params, "owner")?;

    let db = state.db.lock().await;
    let snapshots = earnings::by_owner(&db, &owner)
        .map_err(|e| RpcError::internal_error(&format!("db error: {e}")))?;

    let total_pending: u128 = snapshots.iter().map(|s| s.pending_wei).sum();
    let total_24h: u128 = snapshots.iter().map(|s| s.last24h_wei).sum();
    let rows: Vec<Value> = snapshots
        .iter()
        .map(|s| {
            serde_json::json!({
                "token_id": s.token_id,
                "total_earned_wei": s.total_earned_wei.to_string(),
                "pending_wei": s.pending_wei.to_string(),
                "last24h_wei": s.last24h_wei.to_string(),
                "apy_basis_points": s.apy_basis_points,
            })
        })
        .collect();

    Ok(serde_json::json!({
        "owner": owner,
        "nfts": rows,
        "total_pending_wei": total_pending.to_string(),
        "total_last24h_wei": total_24h.to_string(),
    }))
}

/// Get the global and per-tier aggregate stats.
pub async fn get_collection_stats(state: &Arc<DaemonState>) -> Result {
    let db = state.db.lock().await;
    let global = stats::global(&db)
        .map_err(|e| RpcError::internal_error(&format!("db error: {e}")))?;
    let tiers = stats::tiers(&db)
        .map_err(|e| RpcError::internal_error(&format!("db error: {e}")))?;

    let tier_rows: Vec<Value> = tiers
        .iter()
        .map(|t| {
            serde_json::json!({
                "hostess_index": t.hostess_index,
                "nft_count": t.nft_count,
                "rewards_24h_wei": t.rewards_24h_wei.to_string(),
                "total_earned_wei": t.total_earned_wei.to_string(),
            })
        })
        .collect();

    Ok(serde_json::json!({
        "total_rewards_wei": global.total_rewards_wei.to_string(),
        "rewards_24h_wei": global.rewards_24h_wei.to_string(),
        "total_nfts": global.total_nfts,
        "total_sales_wei": global.total_sales_wei.to_string(),
        "updated_at": global.updated_at,
        "tiers": tier_rows,
    }))
}

/// Get affiliate earnings for a beneficiary.
pub async fn get_affiliate_earnings(state: &Arc<DaemonState>, params: &Value) -> Result {
    let beneficiary = address_param(params, "address")?;

    let db = state.db.lock().await;
    let rows = affiliates::by_beneficiary(&db, &beneficiary)
        .map_err(|e| RpcError::internal_error(&format!("db error: {e}")))?;
    let total = affiliates::total_for(&db, &beneficiary)
        .map_err(|e| RpcError::internal_error(&format!("db error: {e}")))?;

    let payouts: Vec<Value> = rows
        .iter()
        .map(|r| {
            serde_json::json!({
                "token_id": r.token_id,
                "level": r.level,
                "amount_wei": r.amount_wei.to_string(),
                "tx_hash": r.tx_hash,
                "timestamp": r.timestamp,
            })
        })
        .collect();

    Ok(serde_json::json!({
        "address": beneficiary,
        "total_wei": total.to_string(),
        "payouts": payouts,
    }))
}

/// Link an affiliate to a user on the issuance chain.
pub async fn link_affiliate(state: &Arc<DaemonState>, params: &Value) -> Result {
    let user = address_param(params, "user")?;
    let affiliate = address_param(params, "affiliate")?;

    let tx_hash = link_affiliate_with_retry(
        state.issuance.as_ref(),
        &user,
        &affiliate,
        LINK_ATTEMPTS,
        LINK_RETRY_DELAY,
    )
    .await
    .map_err(|e| RpcError::tx_failed(&e.to_string()))?;

    Ok(serde_json::json!({ "tx_hash": tx_hash }))
}
