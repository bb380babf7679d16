//! Pending mint query functions.
//!
//! Transient records for mints awaiting asynchronous fulfillment.
//! Deleted when the completion event arrives, or abandoned (logged,
//! then deleted) by the reconciliation timer after a bounded wait.

use rusqlite::Connection;
use velvet_types::{Address, RequestId, TokenId, TxHash, Wei};

use super::wei_col;
use crate::Result;

/// A pending mint row.
#[derive(Clone, Debug)]
pub struct PendingMintRow {
    pub request_id: RequestId,
    pub sender: Address,
    pub token_id: TokenId,
    pub price_wei: Wei,
    pub tx_hash: TxHash,
    pub created_at: u64,
}

fn row_to_pending(row: &rusqlite::Row<'_>) -> rusqlite::Result<PendingMintRow> {
    Ok(PendingMintRow {
        request_id: row.get::<_, i64>(0)? as RequestId,
        sender: Address::new(row.get::<_, String>(1)?),
        token_id: row.get::<_, i64>(2)? as TokenId,
        price_wei: wei_col(row, 3)?,
        tx_hash: TxHash::new(row.get::<_, String>(4)?),
        created_at: row.get::<_, i64>(5)? as u64,
    })
}

/// Record a mint request. Duplicate request ids are a no-op.
pub fn insert(
    conn: &Connection,
    request_id: RequestId,
    sender: &Address,
    token_id: TokenId,
    price_wei: Wei,
    tx_hash: &TxHash,
    created_at: u64,
) -> Result<bool> {
    let inserted = conn.execute(
        "INSERT OR IGNORE INTO pending_mints
             (request_id, sender, token_id, price_wei, tx_hash, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        rusqlite::params![
            request_id as i64,
            sender.as_str(),
            token_id as i64,
            price_wei.to_string(),
            tx_hash.as_str(),
            created_at as i64,
        ],
    )?;
    Ok(inserted > 0)
}

/// Remove a pending mint by request id. Returns whether a row existed.
pub fn delete(conn: &Connection, request_id: RequestId) -> Result<bool> {
    let deleted = conn.execute(
        "DELETE FROM pending_mints WHERE request_id = ?1",
        [request_id as i64],
    )?;
    Ok(deleted > 0)
}

/// Remove any pending mints for a token (a completion observed through
/// reconciliation may not know the request id).
pub fn delete_by_token(conn: &Connection, token_id: TokenId) -> Result<usize> {
    let deleted = conn.execute(
        "DELETE FROM pending_mints WHERE token_id = ?1",
        [token_id as i64],
    )?;
    Ok(deleted)
}

/// Pending mints created at or before `cutoff`, oldest first.
pub fn older_than(conn: &Connection, cutoff: u64) -> Result<Vec<PendingMintRow>> {
    let mut stmt = conn.prepare(
        "SELECT request_id, sender, token_id, price_wei, tx_hash, created_at
         FROM pending_mints WHERE created_at <= ?1 ORDER BY created_at",
    )?;
    let rows = stmt
        .query_map([cutoff as i64], row_to_pending)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// All pending mints, oldest first.
pub fn all(conn: &Connection) -> Result<Vec<PendingMintRow>> {
    older_than(conn, i64::MAX as u64)
}

/// Number of pending mints.
pub fn count(conn: &Connection) -> Result<u64> {
    let n: i64 = conn.query_row("SELECT COUNT(*) FROM pending_mints", [], |row| row.get(0))?;
    Ok(n as u64)
}
