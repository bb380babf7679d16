//! JSON-RPC server over Unix socket.
//!
//! Listens on a Unix domain socket, accepts connections, and
//! dispatches JSON-RPC method calls to the appropriate command
//! handlers. This is the thin query/admin surface; all heavy lifting
//! lives in the sync services.

use std::path::PathBuf;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::UnixListener;
use tracing::{debug, error, info, warn};

use crate::commands;
use crate::DaemonState;

/// JSON-RPC request.
#[derive(Debug, Deserialize)]
pub struct RpcRequest {
    /// JSON-RPC version (must be "2.0").
    pub jsonrpc: String,
    /// Request ID.
    pub id: serde_json::Value,
    /// Method name.
    pub method: String,
    /// Parameters.
    #[serde(default)]
    pub params: serde_json::Value,
}

/// JSON-RPC response.
#[derive(Debug, Serialize)]
pub struct RpcResponse {
    /// JSON-RPC version.
    pub jsonrpc: String,
    /// Request ID.
    pub id: serde_json::Value,
    /// Result or error.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcError>,
}

/// JSON-RPC error object.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct RpcError {
    /// Error code.
    pub code: i32,
    /// Error name.
    pub message: String,
    /// Optional structured data.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl RpcResponse {
    /// Create a success response.
    pub fn success(id: serde_json::Value, result: serde_json::Value) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            result: Some(result),
            error: None,
        }
    }

    /// Create an error response.
    pub fn error(id: serde_json::Value, error: RpcError) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            result: None,
            error: Some(error),
        }
    }
}

impl RpcError {
    /// Parse error (-32700).
    pub fn parse_error() -> Self {
        Self {
            code: -32700,
            message: "PARSE_ERROR".to_string(),
            data: None,
        }
    }

    /// Method not found (-32601).
    pub fn method_not_found(method: &str) -> Self {
        Self {
            code: -32601,
            message: "METHOD_NOT_FOUND".to_string(),
            data: Some(serde_json::json!({"method": method})),
        }
    }

    /// Invalid params (-32602).
    pub fn invalid_params(detail: &str) -> Self {
        Self {
            code: -32602,
            message: "INVALID_PARAMS".to_string(),
            data: Some(serde_json::json!({"detail": detail})),
        }
    }

    /// Internal error (-32603).
    pub fn internal_error(detail: &str) -> Self {
        Self {
            code: -32603,
            message: "INTERNAL_ERROR".to_string(),
            data: Some(serde_json::json!({"detail": detail})),
        }
    }

    /// NFT unknown to the store (-32020).
    pub fn unknown_token(token_id: u64) -> Self {
        Self {
            code: -32020,
            message: "UNKNOWN_TOKEN".to_string(),
            data: Some(serde_json::json!({"token_id": token_id})),
        }
    }

    /// Admin transaction failed or was rejected (-32030).
    pub fn tx_failed(detail: &str) -> Self {
        Self {
            code: -32030,
            message: "TX_FAILED".to_string(),
            data: Some(serde_json::json!({"detail": detail})),
        }
    }

    /// Nothing to withdraw (-32031).
    pub fn nothing_pending() -> Self {
        Self {
            code: -32031,
            message: "NOTHING_PENDING".to_string(),
            data: None,
        }
    }
}

/// The RPC server.
pub struct RpcServer {
    state: Arc<DaemonState>,
    socket_path: PathBuf,
}

impl RpcServer {
    /// Create a new RPC server.
    pub fn new(state: Arc<DaemonState>, socket_path: PathBuf) -> Self {
        Self { state, socket_path }
    }

    /// Run the server, accepting connections.
    pub async fn run(&self) -> anyhow::Result<()> {
        // Remove stale socket file
        let _ = std::fs::remove_file(&self.socket_path);

        let listener = UnixListener::bind(&self.socket_path)?;
        info!("RPC server listening on {:?}", self.socket_path);

        loop {
            match listener.accept().await {
                Ok((stream, _addr)) => {
                    let state = self.state.clone();
                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(state, stream).await {
                            warn!("Connection error: {}", e);
                        }
                    });
                }
                Err(e) => {
                    error!("Accept error: {}", e);
                }
            }
        }
    }
}

/// Handle a single client connection.
async fn handle_connection(
    state: Arc<DaemonState>,
    stream: tokio::net::UnixStream,
) -> anyhow::Result<()> {
    let (reader, mut writer) = stream.into_split();
    let mut reader = BufReader::new(reader);
    let mut line = String::new();

    loop {
        line.clear();
        let bytes_read = reader.read_line(&mut line).await?;
        if bytes_read == 0 {
            break; // EOF
        }

        let response = match serde_json::from_str::<RpcRequest>(&line) {
            Ok(request) => dispatch_request(state.clone(), request).await,
            Err(_) => RpcResponse::error(serde_json::Value::Null, RpcError::parse_error()),
        };

        let mut response_json = serde_json::to_string(&response)?;
        response_json.push('\n');
        writer.write_all(response_json.as_bytes()).await?;
        writer.flush().await?;
    }

    Ok(())
}

/// Dispatch a JSON-RPC request to the appropriate command handler.
async fn dispatch_request(state: Arc<DaemonState>, request: RpcRequest) -> RpcResponse {
    let id = request.id.clone();
    let method = request.method.as_str();

    debug!("Dispatching RPC method: {}", method);

    let result = match method {
        // Earnings queries
        "get_nft_earnings" => commands::earnings::get_nft_earnings(&state, &request.params).await,
        "get_owner_earnings" => {
            commands::earnings::get_owner_earnings(&state, &request.params).await
        }
        "get_collection_stats" => commands::earnings::get_collection_stats(&state).await,
        "get_affiliate_earnings" => {
            commands::earnings::get_affiliate_earnings(&state, &request.params).await
        }
        "link_affiliate" => commands::earnings::link_affiliate(&state, &request.params).await,

        // Rewards & withdrawals
        "get_reward_history" => commands::rewards::get_reward_history(&state, &request.params).await,
        "get_withdrawals" => commands::rewards::get_withdrawals(&state, &request.params).await,
        "initiate_withdrawal" => {
            commands::rewards::initiate_withdrawal(&state, &request.params).await
        }
        "get_time_reward_status" => {
            commands::rewards::get_time_reward_status(&state, &request.params).await
        }
        "verify_time_reward" => {
            commands::rewards::verify_time_reward(&state, &request.params).await
        }

        // Administrative recovery
        "force_owner_resync" => commands::admin::force_owner_resync(&state).await,
        "recompute_stats" => commands::admin::recompute_stats(&state).await,
        "get_pending_mints" => commands::admin::get_pending_mints(&state).await,

        // Dev-only commands
        "dev_set_nft_value" => commands::admin::dev_set_nft_value(&state, &request.params).await,

        _ => Err(RpcError::method_not_found(method)),
    };

    match result {
        Ok(value) => RpcResponse::success(id, value),
        Err(err) => RpcResponse::error(id, err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rpc_error_codes() {
        let err = RpcError::nothing_pending();
        assert_eq!(err.code, -32031);
        assert_eq!(err.message, "NOTHING_PENDING");

        let err = RpcError::unknown_token(42);
        assert_eq!(err.code, -32020);

        let err = RpcError::method_not_found("unknown");
        assert_eq!(err.code, -32601);
    }

    #[test]
    fn test_rpc_response_success() {
        let resp = RpcResponse::success(
            serde_json::json!(1),
            serde_json::json!({"total_earned_wei": 1000}),
        );
        assert!(resp.result.is_some());
        assert!(resp.error.is_none());
    }

    #[test]
    fn test_rpc_response_error() {
        let resp = RpcResponse::error(serde_json::json!(1), RpcError::internal_error("test"));
        assert!(resp.result.is_none());
        assert!(resp.error.is_some());
    }
}
