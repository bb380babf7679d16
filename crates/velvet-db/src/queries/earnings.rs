//! Earnings snapshot query functions.
//!
//! One row per NFT, fully recomputed and overwritten on each earnings
//! sync pass. The snapshot is a cache, never a source of truth: a full
//! resync rebuilds it from the reward ledger and chain reads.

use rusqlite::Connection;
use velvet_types::{Address, TokenId, Wei};

use super::wei_col;
use crate::Result;

/// A per-NFT earnings snapshot row.
#[derive(Clone, Debug)]
pub struct SnapshotRow {
    pub token_id: TokenId,
    pub total_earned_wei: Wei,
    pub pending_wei: Wei,
    pub last24h_wei: Wei,
    pub apy_basis_points: u64,
    pub last_synced: u64,
}

fn row_to_snapshot(row: &rusqlite::Row<'_>) -> rusqlite::Result<SnapshotRow> {
    Ok(SnapshotRow {
        token_id: row.get::<_, i64>(0)? as TokenId,
        total_earned_wei: wei_col(row, 1)?,
        pending_wei: wei_col(row, 2)?,
        last24h_wei: wei_col(row, 3)?,
        apy_basis_points: row.get::<_, i64>(4)? as u64,
        last_synced: row.get::<_, i64>(5)? as u64,
    })
}

/// Overwrite (or create) the snapshot for one NFT.
pub fn upsert(
    conn: &Connection,
    token_id: TokenId,
    total_earned_wei: Wei,
    pending_wei: Wei,
    last24h_wei: Wei,
    apy_basis_points: u64,
    synced_at: u64,
) -> Result<()> {
    conn.execute(
        "INSERT INTO earnings_snapshots
             (token_id, total_earned_wei, pending_wei, last24h_wei,
              apy_basis_points, last_synced)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)
         ON CONFLICT(token_id) DO UPDATE SET
             total_earned_wei = excluded.total_earned_wei,
             pending_wei = excluded.pending_wei,
             last24h_wei = excluded.last24h_wei,
             apy_basis_points = excluded.apy_basis_points,
             last_synced = excluded.last_synced",
        rusqlite::params![
            token_id as i64,
            total_earned_wei.to_string(),
            pending_wei.to_string(),
            last24h_wei.to_string(),
            apy_basis_points as i64,
            synced_at as i64,
        ],
    )?;
    Ok(())
}

/// Bulk correction for one tier: every NFT of a tier has the same 24h
/// share and APY, so a mid-pass change of the global window is fixed
/// with one statement per tier instead of one per NFT.
pub fn correct_tier(
    conn: &Connection,
    hostess_index: u8,
    last24h_wei: Wei,
    apy_basis_points: u64,
    synced_at: u64,
) -> Result<usize> {
    let updated = conn.execute(
        "UPDATE earnings_snapshots
         SET last24h_wei = ?1, apy_basis_points = ?2, last_synced = ?3
         WHERE token_id IN
             (SELECT token_id FROM nfts WHERE hostess_index = ?4)",
        rusqlite::params![
            last24h_wei.to_string(),
            apy_basis_points as i64,
            synced_at as i64,
            hostess_index as i64,
        ],
    )?;
    Ok(updated)
}

/// Fetch the snapshot for one NFT.
pub fn get(conn: &Connection, token_id: TokenId) -> Result<Option<SnapshotRow>> {
    let mut stmt = conn.prepare(
        "SELECT token_id, total_earned_wei, pending_wei, last24h_wei,
                apy_basis_points, last_synced
         FROM earnings_snapshots WHERE token_id = ?1",
    )?;
    let mut rows = stmt.query_map([token_id as i64], row_to_snapshot)?;
    match rows.next() {
        Some(row) => Ok(Some(row?)),
        None => Ok(None),
    }
}

/// All snapshots for an owner's tokens.
pub fn by_owner(conn: &Connection, owner: &Address) -> Result<Vec<SnapshotRow>> {
    let mut stmt = conn.prepare(
        "SELECT s.token_id, s.total_earned_wei, s.pending_wei, s.last24h_wei,
                s.apy_basis_points, s.last_synced
         FROM earnings_snapshots s
         JOIN nfts n ON n.token_id = s.token_id
         WHERE n.owner = ?1
         ORDER BY s.token_id",
    )?;
    let rows = stmt
        .query_map([owner.as_str()], row_to_snapshot)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Token ids owned by `owner` with a non-zero pending amount. Used to
/// resolve which tokens a withdrawal should cover.
pub fn pending_tokens_for(conn: &Connection, owner: &Address) -> Result<Vec<TokenId>> {
    let rows = by_owner(conn, owner)?;
    Ok(rows
        .into_iter()
        .filter(|s| s.pending_wei > 0)
        .map(|s| s.token_id)
        .collect())
}

/// Per-tier sums of cumulative on-chain earnings, indexed by hostess
/// index. Feeds the per-tier aggregate stats.
pub fn sum_total_by_tier(conn: &Connection) -> Result<[Wei; 8]> {
    let mut sums = [0 as Wei; 8];
    let mut stmt = conn.prepare(
        "SELECT n.hostess_index, s.total_earned_wei
         FROM earnings_snapshots s
         JOIN nfts n ON n.token_id = s.token_id",
    )?;
    let rows = stmt
        .query_map([], |row| {
            Ok((row.get::<_, i64>(0)? as usize, wei_col(row, 1)?))
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    for (tier, amount) in rows {
        if tier < 8 {
            sums[tier] += amount;
        }
    }
    Ok(sums)
}

/// Sum of all 24h shares (used to cross-check the distribution against
/// the global window).
pub fn sum_last24h(conn: &Connection) -> Result<Wei> {
    let mut stmt = conn.prepare("SELECT last24h_wei FROM earnings_snapshots")?;
    let amounts = stmt
        .query_map([], |row| wei_col(row, 0))?
        .collect::<std::result::Result<Vec<Wei>, _>>()?;
    Ok(amounts.into_iter().sum())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queries::nfts;

    fn test_db() -> Connection {
        let conn = crate::open_memory().expect("open test db");
        for (id, tier, owner) in [(1u64, 0u8, "0xa1"), (2, 0, "0xa1"), (3, 4, "0xb2")] {
            nfts::upsert_owner(&conn, id, &Address::new(owner), tier, 10).expect("nft");
        }
        conn
    }

    #[test]
    fn test_upsert_overwrites() {
        let conn = test_db();
        upsert(&conn, 1, 100, 40, 10, 500, 1_000).expect("first");
        upsert(&conn, 1, 250, 0, 25, 700, 2_000).expect("second");

        let snap = get(&conn, 1).expect("get").expect("exists");
        assert_eq!(snap.total_earned_wei, 250);
        assert_eq!(snap.pending_wei, 0);
        assert_eq!(snap.last24h_wei, 25);
        assert_eq!(snap.last_synced, 2_000);
    }

    #[test]
    fn test_correct_tier_touches_only_that_tier() {
        let conn = test_db();
        upsert(&conn, 1, 0, 0, 10, 100, 1_000).expect("s1");
        upsert(&conn, 2, 0, 0, 10, 100, 1_000).expect("s2");
        upsert(&conn, 3, 0, 0, 6, 60, 1_000).expect("s3");

        let updated = correct_tier(&conn, 0, 20, 200, 2_000).expect("correct");
        assert_eq!(updated, 2);

        assert_eq!(get(&conn, 1).expect("get").expect("s1").last24h_wei, 20);
        assert_eq!(get(&conn, 3).expect("get").expect("s3").last24h_wei, 6);
    }

    #[test]
    fn test_pending_tokens_for_owner() {
        let conn = test_db();
        upsert(&conn, 1, 100, 40, 10, 0, 1_000).expect("s1");
        upsert(&conn, 2, 100, 0, 10, 0, 1_000).expect("s2");
        upsert(&conn, 3, 100, 70, 10, 0, 1_000).expect("s3");

        let owner = Address::new("0xa1");
        assert_eq!(pending_tokens_for(&conn, &owner).expect("pending"), vec![1]);
    }

    #[test]
    fn test_sum_last24h() {
        let conn = test_db();
        upsert(&conn, 1, 0, 0, 666, 0, 1_000).expect("s1");
        upsert(&conn, 2, 0, 0, 333, 0, 1_000).expect("s2");
        assert_eq!(sum_last24h(&conn).expect("sum"), 999);
    }
}
