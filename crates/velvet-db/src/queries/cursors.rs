//! Listener cursor query functions.
//!
//! Each listener persists its last processed block here so a restart
//! resumes where the previous process stopped, instead of relying on
//! process-local memory.

use rusqlite::Connection;
use velvet_types::BlockNumber;

use crate::Result;

/// Issuance chain event listener cursor.
pub const ISSUANCE_EVENTS: &str = "issuance_events";
/// Rewards chain event listener cursor.
pub const REWARD_EVENTS: &str = "reward_events";

/// Read a cursor, defaulting to `start` when it has never been written.
pub fn get(conn: &Connection, name: &str, start: BlockNumber) -> Result<BlockNumber> {
    let mut stmt = conn.prepare("SELECT value FROM sync_cursors WHERE name = ?1")?;
    let mut rows = stmt.query_map([name], |row| row.get::<_, i64>(0))?;
    match rows.next() {
        Some(value) => Ok(value? as BlockNumber),
        None => Ok(start),
    }
}

/// Advance a cursor.
pub fn set(conn: &Connection, name: &str, value: BlockNumber) -> Result<()> {
    conn.execute(
        "INSERT INTO sync_cursors (name, value) VALUES (?1, ?2)
         ON CONFLICT(name) DO UPDATE SET value = excluded.value",
        rusqlite::params![name, value as i64],
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_then_set() {
        let conn = crate::open_memory().expect("open");
        assert_eq!(get(&conn, ISSUANCE_EVENTS, 500).expect("get"), 500);
        set(&conn, ISSUANCE_EVENTS, 720).expect("set");
        assert_eq!(get(&conn, ISSUANCE_EVENTS, 500).expect("get"), 720);
        set(&conn, ISSUANCE_EVENTS, 721).expect("set again");
        assert_eq!(get(&conn, ISSUANCE_EVENTS, 0).expect("get"), 721);
    }

    #[test]
    fn test_cursors_independent() {
        let conn = crate::open_memory().expect("open");
        set(&conn, ISSUANCE_EVENTS, 10).expect("set");
        set(&conn, REWARD_EVENTS, 99).expect("set");
        assert_eq!(get(&conn, ISSUANCE_EVENTS, 0).expect("get"), 10);
        assert_eq!(get(&conn, REWARD_EVENTS, 0).expect("get"), 99);
    }
}
