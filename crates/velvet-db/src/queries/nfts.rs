//! Managed NFT query functions.
//!
//! Rows are created on mint-completed events or on first reconciliation
//! sighting, mutated by transfers and owner sync, and never deleted.
//! Every write is an idempotent upsert keyed by token id so the event
//! listener, full owner sync and incremental sync can run concurrently.

use rusqlite::Connection;
use velvet_types::{Address, TokenId, TxHash, Wei};

use super::wei_col;
use crate::{DbError, Result};

/// A managed NFT row.
#[derive(Clone, Debug)]
pub struct NftRow {
    pub token_id: TokenId,
    pub owner: Address,
    pub hostess_index: u8,
    pub mint_price_wei: Wei,
    pub mint_tx_hash: Option<TxHash>,
    pub affiliate_tier1: Option<Address>,
    pub affiliate_tier2: Option<Address>,
    pub last_owner_sync: u64,
}

fn row_to_nft(row: &rusqlite::Row<'_>) -> rusqlite::Result<NftRow> {
    Ok(NftRow {
        token_id: row.get::<_, i64>(0)? as TokenId,
        owner: Address::new(row.get::<_, String>(1)?),
        hostess_index: row.get::<_, i64>(2)? as u8,
        mint_price_wei: wei_col(row, 3)?,
        mint_tx_hash: row.get::<_, Option<String>>(4)?.map(TxHash::new),
        affiliate_tier1: row.get::<_, Option<String>>(5)?.map(Address::new),
        affiliate_tier2: row.get::<_, Option<String>>(6)?.map(Address::new),
        last_owner_sync: row.get::<_, i64>(7)? as u64,
    })
}

const NFT_COLUMNS: &str = "token_id, owner, hostess_index, mint_price_wei, \
     mint_tx_hash, affiliate_tier1, affiliate_tier2, last_owner_sync";

/// Full upsert from a mint-completed event. Idempotent: replaying the
/// same event leaves exactly one row.
#[allow(clippy::too_many_arguments)]
pub fn upsert_minted(
    conn: &Connection,
    token_id: TokenId,
    owner: &Address,
    hostess_index: u8,
    mint_price_wei: Wei,
    mint_tx_hash: &TxHash,
    affiliate_tier1: Option<&Address>,
    affiliate_tier2: Option<&Address>,
    synced_at: u64,
) -> Result<()> {
    conn.execute(
        "INSERT INTO nfts (token_id, owner, hostess_index, mint_price_wei,
                           mint_tx_hash, affiliate_tier1, affiliate_tier2, last_owner_sync)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
         ON CONFLICT(token_id) DO UPDATE SET
             owner = excluded.owner,
             hostess_index = excluded.hostess_index,
             mint_price_wei = excluded.mint_price_wei,
             mint_tx_hash = excluded.mint_tx_hash,
             affiliate_tier1 = excluded.affiliate_tier1,
             affiliate_tier2 = excluded.affiliate_tier2,
             last_owner_sync = excluded.last_owner_sync",
        rusqlite::params![
            token_id as i64,
            owner.as_str(),
            hostess_index as i64,
            mint_price_wei.to_string(),
            mint_tx_hash.as_str(),
            affiliate_tier1.map(Address::as_str),
            affiliate_tier2.map(Address::as_str),
            synced_at as i64,
        ],
    )?;
    Ok(())
}

/// Owner/tier upsert from a chain read (owner sync, reconciliation).
/// Creates the row on first sighting; otherwise updates only the fields
/// the read is authoritative for ("last writer with the freshest read
/// wins").
pub fn upsert_owner(
    conn: &Connection,
    token_id: TokenId,
    owner: &Address,
    hostess_index: u8,
    synced_at: u64,
) -> Result<()> {
    conn.execute(
        "INSERT INTO nfts (token_id, owner, hostess_index, last_owner_sync)
         VALUES (?1, ?2, ?3, ?4)
         ON CONFLICT(token_id) DO UPDATE SET
             owner = excluded.owner,
             hostess_index = excluded.hostess_index,
             last_owner_sync = excluded.last_owner_sync",
        rusqlite::params![
            token_id as i64,
            owner.as_str(),
            hostess_index as i64,
            synced_at as i64,
        ],
    )?;
    Ok(())
}

/// Update the owner of an existing NFT (transfer event).
pub fn set_owner(
    conn: &Connection,
    token_id: TokenId,
    owner: &Address,
    synced_at: u64,
) -> Result<()> {
    let updated = conn.execute(
        "UPDATE nfts SET owner = ?1, last_owner_sync = ?2 WHERE token_id = ?3",
        rusqlite::params![owner.as_str(), synced_at as i64, token_id as i64],
    )?;
    if updated == 0 {
        return Err(DbError::NotFound(format!("nft {token_id}")));
    }
    Ok(())
}

/// Fetch a single NFT.
pub fn get(conn: &Connection, token_id: TokenId) -> Result<Option<NftRow>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {NFT_COLUMNS} FROM nfts WHERE token_id = ?1"
    ))?;
    let mut rows = stmt.query_map([token_id as i64], row_to_nft)?;
    match rows.next() {
        Some(row) => Ok(Some(row?)),
        None => Ok(None),
    }
}

/// All NFTs owned by an address.
pub fn by_owner(conn: &Connection, owner: &Address) -> Result<Vec<NftRow>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {NFT_COLUMNS} FROM nfts WHERE owner = ?1 ORDER BY token_id"
    ))?;
    let rows = stmt
        .query_map([owner.as_str()], row_to_nft)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Token id and tier for every NFT, ascending by token id. Used by the
/// earnings pass to batch over the collection without a chain loop.
pub fn all_tokens_with_tier(conn: &Connection) -> Result<Vec<(TokenId, u8)>> {
    let mut stmt =
        conn.prepare("SELECT token_id, hostess_index FROM nfts ORDER BY token_id")?;
    let rows = stmt
        .query_map([], |row| {
            Ok((
                row.get::<_, i64>(0)? as TokenId,
                row.get::<_, i64>(1)? as u8,
            ))
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Total number of tracked NFTs.
pub fn count(conn: &Connection) -> Result<u64> {
    let n: i64 = conn.query_row("SELECT COUNT(*) FROM nfts", [], |row| row.get(0))?;
    Ok(n as u64)
}

/// Highest tracked token id (0 when empty). The incremental owner sync
/// compares this against the chain's total supply.
pub fn highest_token_id(conn: &Connection) -> Result<TokenId> {
    let id: i64 = conn.query_row(
        "SELECT COALESCE(MAX(token_id), 0) FROM nfts",
        [],
        |row| row.get(0),
    )?;
    Ok(id as TokenId)
}

/// NFT count per tier, indexed by hostess index.
pub fn count_by_tier(conn: &Connection) -> Result<[u64; 8]> {
    let mut counts = [0u64; 8];
    let mut stmt =
        conn.prepare("SELECT hostess_index, COUNT(*) FROM nfts GROUP BY hostess_index")?;
    let rows = stmt
        .query_map([], |row| {
            Ok((row.get::<_, i64>(0)? as usize, row.get::<_, i64>(1)? as u64))
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    for (tier, n) in rows {
        if tier < 8 {
            counts[tier] = n;
        }
    }
    Ok(counts)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_db() -> Connection {
        crate::open_memory().expect("open test db")
    }

    fn addr(s: &str) -> Address {
        Address::new(s)
    }

    #[test]
    fn test_upsert_minted_idempotent() {
        let conn = test_db();
        let owner = addr("0xa1");
        let hash = TxHash::new("0xmint1");
        for _ in 0..2 {
            upsert_minted(&conn, 1, &owner, 2, 1_000, &hash, None, None, 50).expect("upsert");
        }
        assert_eq!(count(&conn).expect("count"), 1);
        let row = get(&conn, 1).expect("get").expect("exists");
        assert_eq!(row.owner, owner);
        assert_eq!(row.hostess_index, 2);
    }

    #[test]
    fn test_upsert_owner_preserves_mint_data() {
        let conn = test_db();
        let hash = TxHash::new("0xmint1");
        upsert_minted(&conn, 1, &addr("0xa1"), 2, 1_000, &hash, None, None, 50).expect("mint");
        upsert_owner(&conn, 1, &addr("0xb2"), 2, 60).expect("sync");

        let row = get(&conn, 1).expect("get").expect("exists");
        assert_eq!(row.owner, addr("0xb2"));
        assert_eq!(row.mint_tx_hash, Some(hash));
        assert_eq!(row.mint_price_wei, 1_000);
        assert_eq!(row.last_owner_sync, 60);
    }

    #[test]
    fn test_set_owner_requires_existing() {
        let conn = test_db();
        assert!(set_owner(&conn, 9, &addr("0xb2"), 10).is_err());
    }

    #[test]
    fn test_highest_and_counts() {
        let conn = test_db();
        assert_eq!(highest_token_id(&conn).expect("highest"), 0);
        for (id, tier) in [(1u64, 0u8), (2, 0), (3, 5)] {
            upsert_owner(&conn, id, &addr("0xa1"), tier, 10).expect("upsert");
        }
        assert_eq!(highest_token_id(&conn).expect("highest"), 3);
        let counts = count_by_tier(&conn).expect("counts");
        assert_eq!(counts[0], 2);
        assert_eq!(counts[5], 1);
        assert_eq!(counts[7], 0);
    }

    #[test]
    fn test_by_owner() {
        let conn = test_db();
        upsert_owner(&conn, 1, &addr("0xa1"), 0, 10).expect("upsert");
        upsert_owner(&conn, 2, &addr("0xb2"), 0, 10).expect("upsert");
        upsert_owner(&conn, 3, &addr("0xA1"), 0, 10).expect("upsert");

        let owned = by_owner(&conn, &addr("0xa1")).expect("by_owner");
        let ids: Vec<TokenId> = owned.iter().map(|n| n.token_id).collect();
        assert_eq!(ids, vec![1, 3], "addresses compare case-insensitively");
    }
}
