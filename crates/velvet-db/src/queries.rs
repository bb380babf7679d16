//! Database query functions organized by domain.

pub mod affiliates;
pub mod cursors;
pub mod earnings;
pub mod nfts;
pub mod pending_mints;
pub mod rewards;
pub mod sales;
pub mod stats;
pub mod time_rewards;

use velvet_types::Wei;

/// Read a wei amount stored as base-10 TEXT.
pub(crate) fn wei_col(row: &rusqlite::Row<'_>, idx: usize) -> rusqlite::Result<Wei> {
    let text: String = row.get(idx)?;
    text.parse().map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(
            idx,
            rusqlite::types::Type::Text,
            Box::new(e),
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wei_roundtrip_through_text() {
        let conn = crate::open_memory().expect("open");
        let big: Wei = u128::MAX - 7;
        let parsed: Wei = conn
            .query_row("SELECT ?1", [big.to_string()], |row| wei_col(row, 0))
            .expect("roundtrip");
        assert_eq!(parsed, big);
    }

    #[test]
    fn test_wei_parse_error_surfaces() {
        let conn = crate::open_memory().expect("open");
        let result = conn.query_row("SELECT 'not-a-number'", [], |row| wei_col(row, 0));
        assert!(result.is_err());
    }
}
