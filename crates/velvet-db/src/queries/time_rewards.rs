//! Time reward state query functions.
//!
//! One row per registered special-range token. `start_time` is set once
//! from the on-chain registration block timestamp and never changes;
//! accrual math that used wall-clock time here would diverge from the
//! contract's own accounting.

use rusqlite::Connection;
use velvet_types::{Address, TokenId, Wei};

use super::wei_col;
use crate::{DbError, Result};

/// A time reward accrual state row.
#[derive(Clone, Debug)]
pub struct TimeRewardRow {
    pub token_id: TokenId,
    pub hostess_index: u8,
    pub owner: Address,
    pub start_time: u64,
    pub last_claim_time: u64,
    pub total_claimed_wei: Wei,
}

fn row_to_state(row: &rusqlite::Row<'_>) -> rusqlite::Result<TimeRewardRow> {
    Ok(TimeRewardRow {
        token_id: row.get::<_, i64>(0)? as TokenId,
        hostess_index: row.get::<_, i64>(1)? as u8,
        owner: Address::new(row.get::<_, String>(2)?),
        start_time: row.get::<_, i64>(3)? as u64,
        last_claim_time: row.get::<_, i64>(4)? as u64,
        total_claimed_wei: wei_col(row, 5)?,
    })
}

/// Register a token exactly once. Re-registration is a no-op; the
/// original `start_time` is preserved.
pub fn register(
    conn: &Connection,
    token_id: TokenId,
    hostess_index: u8,
    owner: &Address,
    block_timestamp: u64,
) -> Result<bool> {
    let inserted = conn.execute(
        "INSERT OR IGNORE INTO time_reward_states
             (token_id, hostess_index, owner, start_time, last_claim_time, total_claimed_wei)
         VALUES (?1, ?2, ?3, ?4, ?4, '0')",
        rusqlite::params![
            token_id as i64,
            hostess_index as i64,
            owner.as_str(),
            block_timestamp as i64,
        ],
    )?;
    Ok(inserted > 0)
}

/// Fetch the state for one token.
pub fn get(conn: &Connection, token_id: TokenId) -> Result<Option<TimeRewardRow>> {
    let mut stmt = conn.prepare(
        "SELECT token_id, hostess_index, owner, start_time, last_claim_time, total_claimed_wei
         FROM time_reward_states WHERE token_id = ?1",
    )?;
    let mut rows = stmt.query_map([token_id as i64], row_to_state)?;
    match rows.next() {
        Some(row) => Ok(Some(row?)),
        None => Ok(None),
    }
}

/// All registered states, ascending by token id.
pub fn all(conn: &Connection) -> Result<Vec<TimeRewardRow>> {
    let mut stmt = conn.prepare(
        "SELECT token_id, hostess_index, owner, start_time, last_claim_time, total_claimed_wei
         FROM time_reward_states ORDER BY token_id",
    )?;
    let rows = stmt
        .query_map([], row_to_state)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Advance the claim cursor after an on-chain claim is confirmed.
pub fn apply_claim(
    conn: &Connection,
    token_id: TokenId,
    claimed_wei: Wei,
    claim_time: u64,
) -> Result<()> {
    let current = get(conn, token_id)?
        .ok_or_else(|| DbError::NotFound(format!("time reward state {token_id}")))?;
    let new_total = current.total_claimed_wei.saturating_add(claimed_wei);
    conn.execute(
        "UPDATE time_reward_states
         SET last_claim_time = ?1, total_claimed_wei = ?2
         WHERE token_id = ?3",
        rusqlite::params![claim_time as i64, new_total.to_string(), token_id as i64],
    )?;
    Ok(())
}

/// Overwrite the claim cursor from a chain-derived value (recovery when
/// local state is suspected stale).
pub fn set_last_claim_time(
    conn: &Connection,
    token_id: TokenId,
    last_claim_time: u64,
) -> Result<()> {
    let updated = conn.execute(
        "UPDATE time_reward_states SET last_claim_time = ?1 WHERE token_id = ?2",
        rusqlite::params![last_claim_time as i64, token_id as i64],
    )?;
    if updated == 0 {
        return Err(DbError::NotFound(format!("time reward state {token_id}")));
    }
    Ok(())
}

/// Keep the cached owner current (time reward display groups by owner).
pub fn set_owner(conn: &Connection, token_id: TokenId, owner: &Address) -> Result<()> {
    conn.execute(
        "UPDATE time_reward_states SET owner = ?1 WHERE token_id = ?2",
        rusqlite::params![owner.as_str(), token_id as i64],
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_db() -> Connection {
        crate::open_memory().expect("open test db")
    }

    #[test]
    fn test_register_once() {
        let conn = test_db();
        let owner = Address::new("0xa1");
        assert!(register(&conn, 100, 1, &owner, 5_000).expect("first"));
        assert!(!register(&conn, 100, 1, &owner, 9_999).expect("re-register"));

        let row = get(&conn, 100).expect("get").expect("exists");
        assert_eq!(row.start_time, 5_000, "start_time immutable");
        assert_eq!(row.last_claim_time, 5_000);
        assert_eq!(row.total_claimed_wei, 0);
    }

    #[test]
    fn test_apply_claim_accumulates() {
        let conn = test_db();
        register(&conn, 100, 1, &Address::new("0xa1"), 5_000).expect("register");
        apply_claim(&conn, 100, 700, 6_000).expect("claim 1");
        apply_claim(&conn, 100, 300, 7_000).expect("claim 2");

        let row = get(&conn, 100).expect("get").expect("exists");
        assert_eq!(row.last_claim_time, 7_000);
        assert_eq!(row.total_claimed_wei, 1_000);
    }

    #[test]
    fn test_recovery_overwrites_cursor() {
        let conn = test_db();
        register(&conn, 100, 1, &Address::new("0xa1"), 5_000).expect("register");
        set_last_claim_time(&conn, 100, 8_000).expect("recover");
        let row = get(&conn, 100).expect("get").expect("exists");
        assert_eq!(row.last_claim_time, 8_000);
    }

    #[test]
    fn test_claim_unknown_token_fails() {
        let conn = test_db();
        assert!(apply_claim(&conn, 42, 100, 1_000).is_err());
    }
}
