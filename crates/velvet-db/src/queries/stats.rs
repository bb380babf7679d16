//! Aggregate stats query functions.
//!
//! The singleton `global_stats` row and the eight `tier_stats` rows are
//! caches, fully recomputed at the end of each earnings pass. The rows
//! are seeded by the initial migration so writes are plain UPDATEs.

use rusqlite::Connection;
use velvet_types::Wei;

use super::wei_col;
use crate::Result;

/// The collection-wide aggregate row.
#[derive(Clone, Debug)]
pub struct GlobalStatsRow {
    pub total_rewards_wei: Wei,
    pub rewards_24h_wei: Wei,
    pub total_nfts: u64,
    pub total_sales_wei: Wei,
    pub updated_at: u64,
}

/// A per-tier aggregate row.
#[derive(Clone, Debug)]
pub struct TierStatsRow {
    pub hostess_index: u8,
    pub nft_count: u64,
    pub rewards_24h_wei: Wei,
    pub total_earned_wei: Wei,
    pub updated_at: u64,
}

/// Overwrite the global aggregate.
pub fn update_global(
    conn: &Connection,
    total_rewards_wei: Wei,
    rewards_24h_wei: Wei,
    total_nfts: u64,
    total_sales_wei: Wei,
    updated_at: u64,
) -> Result<()> {
    conn.execute(
        "UPDATE global_stats
         SET total_rewards_wei = ?1, rewards_24h_wei = ?2, total_nfts = ?3,
             total_sales_wei = ?4, updated_at = ?5
         WHERE id = 1",
        rusqlite::params![
            total_rewards_wei.to_string(),
            rewards_24h_wei.to_string(),
            total_nfts as i64,
            total_sales_wei.to_string(),
            updated_at as i64,
        ],
    )?;
    Ok(())
}

/// Overwrite one tier's aggregate.
pub fn update_tier(
    conn: &Connection,
    hostess_index: u8,
    nft_count: u64,
    rewards_24h_wei: Wei,
    total_earned_wei: Wei,
    updated_at: u64,
) -> Result<()> {
    conn.execute(
        "UPDATE tier_stats
         SET nft_count = ?1, rewards_24h_wei = ?2, total_earned_wei = ?3, updated_at = ?4
         WHERE hostess_index = ?5",
        rusqlite::params![
            nft_count as i64,
            rewards_24h_wei.to_string(),
            total_earned_wei.to_string(),
            updated_at as i64,
            hostess_index as i64,
        ],
    )?;
    Ok(())
}

/// Overwrite only the per-tier NFT counts (owner sync recomputes these
/// after a full pass).
pub fn update_tier_counts(conn: &Connection, counts: &[u64; 8], updated_at: u64) -> Result<()> {
    let mut stmt = conn.prepare(
        "UPDATE tier_stats SET nft_count = ?1, updated_at = ?2 WHERE hostess_index = ?3",
    )?;
    for (tier, count) in counts.iter().enumerate() {
        stmt.execute(rusqlite::params![
            *count as i64,
            updated_at as i64,
            tier as i64
        ])?;
    }
    Ok(())
}

/// Read the global aggregate.
pub fn global(conn: &Connection) -> Result<GlobalStatsRow> {
    let row = conn.query_row(
        "SELECT total_rewards_wei, rewards_24h_wei, total_nfts, total_sales_wei, updated_at
         FROM global_stats WHERE id = 1",
        [],
        |row| {
            Ok(GlobalStatsRow {
                total_rewards_wei: wei_col(row, 0)?,
                rewards_24h_wei: wei_col(row, 1)?,
                total_nfts: row.get::<_, i64>(2)? as u64,
                total_sales_wei: wei_col(row, 3)?,
                updated_at: row.get::<_, i64>(4)? as u64,
            })
        },
    )?;
    Ok(row)
}

/// Read all tier aggregates, ascending by tier.
pub fn tiers(conn: &Connection) -> Result<Vec<TierStatsRow>> {
    let mut stmt = conn.prepare(
        "SELECT hostess_index, nft_count, rewards_24h_wei, total_earned_wei, updated_at
         FROM tier_stats ORDER BY hostess_index",
    )?;
    let rows = stmt
        .query_map([], |row| {
            Ok(TierStatsRow {
                hostess_index: row.get::<_, i64>(0)? as u8,
                nft_count: row.get::<_, i64>(1)? as u64,
                rewards_24h_wei: wei_col(row, 2)?,
                total_earned_wei: wei_col(row, 3)?,
                updated_at: row.get::<_, i64>(4)? as u64,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}
