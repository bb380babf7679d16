//! Reward ledger query functions.
//!
//! `reward_events` is the append-only deposit ledger for the rewards
//! chain; total rewards received is the sum over this table and the
//! 24h window sum drives the proportional earnings pass.
//! `reward_withdrawals` records confirmed claims. Unique transaction
//! hashes are the defense against duplicate ingestion.

use rusqlite::Connection;
use velvet_types::{Address, TokenId, TxHash, Wei};

use super::wei_col;
use crate::{DbError, Result};

/// A reward deposit row.
#[derive(Clone, Debug)]
pub struct RewardEventRow {
    pub tx_hash: TxHash,
    pub commitment_hash: String,
    pub amount_wei: Wei,
    pub timestamp: u64,
    pub block_number: u64,
}

/// A confirmed withdrawal row.
#[derive(Clone, Debug)]
pub struct WithdrawalRow {
    pub tx_hash: TxHash,
    pub user_address: Address,
    pub amount_wei: Wei,
    pub token_ids: Vec<TokenId>,
    pub timestamp: u64,
}

/// Insert a reward deposit. Returns false when the hash was already
/// ingested (duplicate delivery is a no-op).
pub fn insert_event(
    conn: &Connection,
    tx_hash: &TxHash,
    commitment_hash: &str,
    amount_wei: Wei,
    timestamp: u64,
    block_number: u64,
) -> Result<bool> {
    let inserted = conn.execute(
        "INSERT OR IGNORE INTO reward_events
             (tx_hash, commitment_hash, amount_wei, timestamp, block_number)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        rusqlite::params![
            tx_hash.as_str(),
            commitment_hash,
            amount_wei.to_string(),
            timestamp as i64,
            block_number as i64,
        ],
    )?;
    Ok(inserted > 0)
}

/// Sum of deposits with `timestamp >= cutoff`. One table scan; never a
/// per-NFT query.
pub fn sum_since(conn: &Connection, cutoff: u64) -> Result<Wei> {
    let mut stmt =
        conn.prepare("SELECT amount_wei FROM reward_events WHERE timestamp >= ?1")?;
    let amounts = stmt
        .query_map([cutoff as i64], |row| wei_col(row, 0))?
        .collect::<std::result::Result<Vec<Wei>, _>>()?;
    Ok(amounts.into_iter().sum())
}

/// Total rewards ever received.
pub fn total(conn: &Connection) -> Result<Wei> {
    sum_since(conn, 0)
}

/// Insert a confirmed withdrawal. Returns false on duplicate hash.
pub fn insert_withdrawal(
    conn: &Connection,
    tx_hash: &TxHash,
    user_address: &Address,
    amount_wei: Wei,
    token_ids: &[TokenId],
    timestamp: u64,
) -> Result<bool> {
    let ids_json = serde_json::to_string(token_ids)
        .map_err(|e| DbError::Serialization(e.to_string()))?;
    let inserted = conn.execute(
        "INSERT OR IGNORE INTO reward_withdrawals
             (tx_hash, user_address, amount_wei, token_ids, timestamp)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        rusqlite::params![
            tx_hash.as_str(),
            user_address.as_str(),
            amount_wei.to_string(),
            ids_json,
            timestamp as i64,
        ],
    )?;
    Ok(inserted > 0)
}

/// Recent deposits, newest first.
pub fn recent_events(conn: &Connection, limit: u32) -> Result<Vec<RewardEventRow>> {
    let mut stmt = conn.prepare(
        "SELECT tx_hash, commitment_hash, amount_wei, timestamp, block_number
         FROM reward_events ORDER BY timestamp DESC LIMIT ?1",
    )?;
    let rows = stmt
        .query_map([limit], |row| {
            Ok(RewardEventRow {
                tx_hash: TxHash::new(row.get::<_, String>(0)?),
                commitment_hash: row.get(1)?,
                amount_wei: wei_col(row, 2)?,
                timestamp: row.get::<_, i64>(3)? as u64,
                block_number: row.get::<_, i64>(4)? as u64,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Withdrawals by a user, newest first.
pub fn withdrawals_by_user(conn: &Connection, user: &Address) -> Result<Vec<WithdrawalRow>> {
    let mut stmt = conn.prepare(
        "SELECT tx_hash, user_address, amount_wei, token_ids, timestamp
         FROM reward_withdrawals WHERE user_address = ?1 ORDER BY timestamp DESC",
    )?;
    let raw = stmt
        .query_map([user.as_str()], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                wei_col(row, 2)?,
                row.get::<_, String>(3)?,
                row.get::<_, i64>(4)? as u64,
            ))
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    raw.into_iter()
        .map(|(hash, addr, amount, ids_json, ts)| {
            let token_ids: Vec<TokenId> = serde_json::from_str(&ids_json)
                .map_err(|e| DbError::Serialization(e.to_string()))?;
            Ok(WithdrawalRow {
                tx_hash: TxHash::new(hash),
                user_address: Address::new(addr),
                amount_wei: amount,
                token_ids,
                timestamp: ts,
            })
        })
        .collect()
}
