//! Affiliate earning query functions.
//!
//! One row per affiliate payout observed on a mint-completed event.
//! Rows are only written for non-zero affiliate addresses.

use rusqlite::Connection;
use velvet_types::{Address, TokenId, TxHash, Wei};

use super::wei_col;
use crate::Result;

/// An affiliate earning row.
#[derive(Clone, Debug)]
pub struct AffiliateRow {
    pub beneficiary: Address,
    pub token_id: TokenId,
    pub level: u8,
    pub amount_wei: Wei,
    pub tx_hash: TxHash,
    pub timestamp: u64,
}

/// Record an affiliate payout.
pub fn insert(
    conn: &Connection,
    beneficiary: &Address,
    token_id: TokenId,
    level: u8,
    amount_wei: Wei,
    tx_hash: &TxHash,
    timestamp: u64,
) -> Result<()> {
    conn.execute(
        "INSERT INTO affiliate_earnings
             (beneficiary, token_id, level, amount_wei, tx_hash, timestamp)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        rusqlite::params![
            beneficiary.as_str(),
            token_id as i64,
            level as i64,
            amount_wei.to_string(),
            tx_hash.as_str(),
            timestamp as i64,
        ],
    )?;
    Ok(())
}

/// Total affiliate earnings for a beneficiary.
pub fn total_for(conn: &Connection, beneficiary: &Address) -> Result<Wei> {
    let mut stmt =
        conn.prepare("SELECT amount_wei FROM affiliate_earnings WHERE beneficiary = ?1")?;
    let amounts = stmt
        .query_map([beneficiary.as_str()], |row| wei_col(row, 0))?
        .collect::<std::result::Result<Vec<Wei>, _>>()?;
    Ok(amounts.into_iter().sum())
}

/// All payouts for a beneficiary, newest first.
pub fn by_beneficiary(conn: &Connection, beneficiary: &Address) -> Result<Vec<AffiliateRow>> {
    let mut stmt = conn.prepare(
        "SELECT beneficiary, token_id, level, amount_wei, tx_hash, timestamp
         FROM affiliate_earnings WHERE beneficiary = ?1 ORDER BY timestamp DESC",
    )?;
    let rows = stmt
        .query_map([beneficiary.as_str()], |row| {
            Ok(AffiliateRow {
                beneficiary: Address::new(row.get::<_, String>(0)?),
                token_id: row.get::<_, i64>(1)? as TokenId,
                level: row.get::<_, i64>(2)? as u8,
                amount_wei: wei_col(row, 3)?,
                tx_hash: TxHash::new(row.get::<_, String>(4)?),
                timestamp: row.get::<_, i64>(5)? as u64,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_and_total() {
        let conn = crate::open_memory().expect("open");
        let b = Address::new("0xaff1");
        insert(&conn, &b, 1, 1, 50, &TxHash::new("0xm1"), 100).expect("insert");
        insert(&conn, &b, 2, 2, 25, &TxHash::new("0xm2"), 110).expect("insert");
        insert(&conn, &Address::new("0xaff2"), 3, 1, 99, &TxHash::new("0xm3"), 120)
            .expect("insert");

        assert_eq!(total_for(&conn, &b).expect("total"), 75);
        assert_eq!(by_beneficiary(&conn, &b).expect("rows").len(), 2);
    }
}
