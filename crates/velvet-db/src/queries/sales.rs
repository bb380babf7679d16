//! Sale record query functions.
//!
//! One immutable row per successful mint, keyed by transaction hash.
//! Reconciliation may insert a synthetic placeholder when the real mint
//! event was missed; when the real event is later observed the
//! placeholder is upgraded in place (never deleted and re-inserted, so
//! rows referencing it stay valid). A partial unique index guarantees
//! at most one real sale per token.

use rusqlite::Connection;
use velvet_types::{Address, TokenId, TxHash, Wei};

use super::wei_col;
use crate::Result;

/// A sale record row.
#[derive(Clone, Debug)]
pub struct SaleRow {
    pub tx_hash: TxHash,
    pub token_id: TokenId,
    pub buyer: Address,
    pub price_wei: Wei,
    pub hostess_index: u8,
    pub timestamp: u64,
    pub synthetic: bool,
}

/// What a [`record_sale`] call actually did.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SaleOutcome {
    /// New row inserted.
    Inserted,
    /// An existing synthetic placeholder was upgraded in place.
    UpgradedSynthetic,
    /// A real sale for this token (or this hash) already exists.
    Duplicate,
}

fn row_to_sale(row: &rusqlite::Row<'_>) -> rusqlite::Result<SaleRow> {
    Ok(SaleRow {
        tx_hash: TxHash::new(row.get::<_, String>(0)?),
        token_id: row.get::<_, i64>(1)? as TokenId,
        buyer: Address::new(row.get::<_, String>(2)?),
        price_wei: wei_col(row, 3)?,
        hostess_index: row.get::<_, i64>(4)? as u8,
        timestamp: row.get::<_, i64>(5)? as u64,
        synthetic: row.get::<_, i64>(6)? != 0,
    })
}

/// Record a real (event-observed) sale.
pub fn record_sale(
    conn: &Connection,
    token_id: TokenId,
    buyer: &Address,
    price_wei: Wei,
    hostess_index: u8,
    timestamp: u64,
    tx_hash: &TxHash,
) -> Result<SaleOutcome> {
    // Upgrade path: a reconciliation placeholder for this token is
    // replaced in place by the real transaction hash.
    let upgraded = conn.execute(
        "UPDATE sale_records
         SET tx_hash = ?1, buyer = ?2, price_wei = ?3, hostess_index = ?4,
             timestamp = ?5, synthetic = 0
         WHERE token_id = ?6 AND synthetic = 1",
        rusqlite::params![
            tx_hash.as_str(),
            buyer.as_str(),
            price_wei.to_string(),
            hostess_index as i64,
            timestamp as i64,
            token_id as i64,
        ],
    )?;
    if upgraded > 0 {
        tracing::info!(token_id, tx_hash = %tx_hash, "upgraded synthetic sale record");
        return Ok(SaleOutcome::UpgradedSynthetic);
    }

    // The tx_hash primary key and the one-real-sale-per-token index
    // both make duplicate ingestion a no-op.
    let inserted = conn.execute(
        "INSERT OR IGNORE INTO sale_records
             (tx_hash, token_id, buyer, price_wei, hostess_index, timestamp, synthetic)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, 0)",
        rusqlite::params![
            tx_hash.as_str(),
            token_id as i64,
            buyer.as_str(),
            price_wei.to_string(),
            hostess_index as i64,
            timestamp as i64,
        ],
    )?;
    Ok(if inserted > 0 {
        SaleOutcome::Inserted
    } else {
        SaleOutcome::Duplicate
    })
}

/// Insert a synthetic placeholder for a reconciled mint whose real
/// event was missed. No-op when any record for the token already
/// exists.
pub fn insert_synthetic(
    conn: &Connection,
    token_id: TokenId,
    buyer: &Address,
    price_wei: Wei,
    hostess_index: u8,
    timestamp: u64,
) -> Result<bool> {
    let placeholder = TxHash::synthetic(token_id);
    let inserted = conn.execute(
        "INSERT OR IGNORE INTO sale_records
             (tx_hash, token_id, buyer, price_wei, hostess_index, timestamp, synthetic)
         SELECT ?1, ?2, ?3, ?4, ?5, ?6, 1
         WHERE NOT EXISTS (SELECT 1 FROM sale_records WHERE token_id = ?2)",
        rusqlite::params![
            placeholder.as_str(),
            token_id as i64,
            buyer.as_str(),
            price_wei.to_string(),
            hostess_index as i64,
            timestamp as i64,
        ],
    )?;
    Ok(inserted > 0)
}

/// All sale records for a token (at most one real, possibly one
/// synthetic placeholder before upgrade).
pub fn by_token(conn: &Connection, token_id: TokenId) -> Result<Vec<SaleRow>> {
    let mut stmt = conn.prepare(
        "SELECT tx_hash, token_id, buyer, price_wei, hostess_index, timestamp, synthetic
         FROM sale_records WHERE token_id = ?1",
    )?;
    let rows = stmt
        .query_map([token_id as i64], row_to_sale)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Sum of all sale prices (synthetic placeholders included; they stand
/// for real mints).
pub fn total_sales_wei(conn: &Connection) -> Result<Wei> {
    let mut stmt = conn.prepare("SELECT price_wei FROM sale_records")?;
    let amounts = stmt
        .query_map([], |row| wei_col(row, 0))?
        .collect::<std::result::Result<Vec<Wei>, _>>()?;
    Ok(amounts.into_iter().sum())
}

/// Number of sale records.
pub fn count(conn: &Connection) -> Result<u64> {
    let n: i64 = conn.query_row("SELECT COUNT(*) FROM sale_records", [], |row| row.get(0))?;
    Ok(n as u64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queries::nfts;

    fn test_db() -> Connection {
        let conn = crate::open_memory().expect("open test db");
        nfts::upsert_owner(&conn, 1, &Address::new("0xa1"), 0, 10).expect("nft");
        conn
    }

    #[test]
    fn test_record_sale_idempotent() {
        let conn = test_db();
        let hash = TxHash::new("0xsale1");
        let buyer = Address::new("0xa1");

        let first = record_sale(&conn, 1, &buyer, 500, 0, 100, &hash).expect("first");
        let second = record_sale(&conn, 1, &buyer, 500, 0, 100, &hash).expect("second");
        assert_eq!(first, SaleOutcome::Inserted);
        assert_eq!(second, SaleOutcome::Duplicate);
        assert_eq!(count(&conn).expect("count"), 1);
    }

    #[test]
    fn test_synthetic_upgraded_not_duplicated() {
        let conn = test_db();
        let buyer = Address::new("0xa1");

        assert!(insert_synthetic(&conn, 1, &buyer, 500, 0, 100).expect("synthetic"));
        let real = TxHash::new("0xreal1");
        let outcome = record_sale(&conn, 1, &buyer, 500, 0, 120, &real).expect("real");
        assert_eq!(outcome, SaleOutcome::UpgradedSynthetic);

        let rows = by_token(&conn, 1).expect("rows");
        assert_eq!(rows.len(), 1, "upgrade must not duplicate");
        assert_eq!(rows[0].tx_hash, real);
        assert!(!rows[0].synthetic);
    }

    #[test]
    fn test_synthetic_noop_when_real_exists() {
        let conn = test_db();
        let buyer = Address::new("0xa1");
        let real = TxHash::new("0xreal1");
        record_sale(&conn, 1, &buyer, 500, 0, 100, &real).expect("real");

        assert!(!insert_synthetic(&conn, 1, &buyer, 500, 0, 130).expect("synthetic"));
        assert_eq!(count(&conn).expect("count"), 1);
    }

    #[test]
    fn test_second_real_sale_ignored() {
        let conn = test_db();
        let buyer = Address::new("0xa1");
        record_sale(&conn, 1, &buyer, 500, 0, 100, &TxHash::new("0xreal1")).expect("first");
        let outcome =
            record_sale(&conn, 1, &buyer, 501, 0, 101, &TxHash::new("0xreal2")).expect("second");
        assert_eq!(outcome, SaleOutcome::Duplicate);
        assert_eq!(count(&conn).expect("count"), 1);
    }

    #[test]
    fn test_total_sales() {
        let conn = test_db();
        nfts::upsert_owner(&conn, 2, &Address::new("0xa1"), 0, 10).expect("nft");
        let buyer = Address::new("0xa1");
        record_sale(&conn, 1, &buyer, 500, 0, 100, &TxHash::new("0xs1")).expect("sale");
        record_sale(&conn, 2, &buyer, 700, 0, 100, &TxHash::new("0xs2")).expect("sale");
        assert_eq!(total_sales_wei(&conn).expect("sum"), 1_200);
    }
}
