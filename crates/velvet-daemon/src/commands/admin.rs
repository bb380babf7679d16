//! Administrative recovery command handlers.

use std::sync::Arc;

use serde_json::Value;
use velvet_db::queries::pending_mints;

use crate::rpc::RpcError;
use crate::DaemonState;

type Result = std::result::Result<Value, RpcError>;

/// Kick off a full owner reconciliation pass in the background. The
/// pass is rate-limited and can take a while for a large collection,
/// so the call returns immediately.
pub async fn force_owner_resync(state: &Arc<DaemonState>) -> Result {
    let owner_sync = state.owner_sync.clone();
    tokio::spawn(async move {
        match owner_sync.full_pass().await {
            Ok(report) => tracing::info!(
                synced = report.synced,
                failed_reads = report.failed_reads,
                "forced owner resync finished"
            ),
            Err(e) => tracing::warn!(error = %e, "forced owner resync failed"),
        }
    });
    Ok(serde_json::json!({ "started": true }))
}

/// Run one earnings pass now and report whether it ran (an overlapping
/// scheduled pass causes a skip).
pub async fn recompute_stats(state: &Arc<DaemonState>) -> Result {
    let report = state
        .earnings_sync
        .sync_pass()
        .await
        .map_err(|e| RpcError::internal_error(&e.to_string()))?;

    match report {
        Some(report) => Ok(serde_json::json!({
            "completed": true,
            "nfts_synced": report.nfts_synced,
            "global24h_wei": report.global24h.to_string(),
        })),
        None => Ok(serde_json::json!({ "completed": false, "reason": "pass already running" })),
    }
}

/// Current pending mints (diagnostic view).
pub async fn get_pending_mints(state: &Arc<DaemonState>) -> Result {
    let db = state.db.lock().await;
    let rows = pending_mints::all(&db)
        .map_err(|e| RpcError::internal_error(&format!("db error: {e}")))?;
    let out: Vec<Value> = rows
        .iter()
        .map(|p| {
            serde_json::json!({
                "request_id": p.request_id,
                "token_id": p.token_id,
                "sender": p.sender,
                "price_wei": p.price_wei.to_string(),
                "created_at": p.created_at,
            })
        })
        .collect();
    Ok(serde_json::json!(out))
}

/// Adjust the stub price oracle (development/testing only).
pub async fn dev_set_nft_value(state: &Arc<DaemonState>, params: &Value) -> Result {
    let value = params
        .get("value_wei")
        .and_then(Value::as_str)
        .and_then(|s| s.parse::<u128>().ok())
        .ok_or_else(|| RpcError::invalid_params("value_wei (decimal string) required"))?;

    state.oracle.dev_set_value(value);
    Ok(serde_json::json!({ "value_wei": value.to_string() }))
}
