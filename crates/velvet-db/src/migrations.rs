//! Database migration system.
//!
//! Schema version stored in `PRAGMA user_version`. Migrations are
//! forward-only; rollback requires rebuilding the cache from chain
//! state (every table here is reconstructible by a full resync).

use rusqlite::Connection;

use crate::{schema, DbError, Result, SCHEMA_VERSION};

/// Run all pending migrations.
pub fn run(conn: &Connection) -> Result<()> {
    let current_version: u32 = conn
        .pragma_query_value(None, "user_version", |row| row.get(0))
        .map_err(DbError::Sqlite)?;

    if current_version == 0 {
        // Fresh database — apply initial schema
        tracing::info!("Initializing database schema v{SCHEMA_VERSION}");
        conn.execute_batch(schema::SCHEMA_V1)
            .map_err(DbError::Sqlite)?;

        seed_aggregate_rows(conn)?;

        conn.pragma_update(None, "user_version", SCHEMA_VERSION)
            .map_err(DbError::Sqlite)?;
    } else if current_version < SCHEMA_VERSION {
        for version in (current_version + 1)..=SCHEMA_VERSION {
            tracing::info!("Running migration to v{version}");
            run_migration(conn, version)?;
            conn.pragma_update(None, "user_version", version)
                .map_err(DbError::Sqlite)?;
        }
    } else if current_version > SCHEMA_VERSION {
        return Err(DbError::Migration(format!(
            "Database version {current_version} is newer than supported {SCHEMA_VERSION}"
        )));
    }

    Ok(())
}

/// Seed the singleton and per-tier aggregate rows so sync passes can
/// use plain UPDATEs.
fn seed_aggregate_rows(conn: &Connection) -> Result<()> {
    conn.execute(
        "INSERT OR IGNORE INTO global_stats (id) VALUES (1)",
        [],
    )
    .map_err(DbError::Sqlite)?;

    let mut stmt = conn
        .prepare("INSERT OR IGNORE INTO tier_stats (hostess_index) VALUES (?1)")
        .map_err(DbError::Sqlite)?;
    for tier in 0..8 {
        stmt.execute([tier]).map_err(DbError::Sqlite)?;
    }

    Ok(())
}

/// Run a specific migration.
fn run_migration(conn: &Connection, version: u32) -> Result<()> {
    let _ = conn;
    match version {
        // Future migrations go here:
        // 2 => migration_v2(conn),
        _ => Err(DbError::Migration(format!(
            "Unknown migration version: {version}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fresh_migration() {
        let conn = Connection::open_in_memory().expect("open");
        conn.execute_batch("PRAGMA foreign_keys = ON;").expect("pragma");
        run(&conn).expect("migrate");

        let version: u32 = conn
            .pragma_query_value(None, "user_version", |row| row.get(0))
            .expect("version");
        assert_eq!(version, SCHEMA_VERSION);
    }

    #[test]
    fn test_idempotent_migration() {
        let conn = Connection::open_in_memory().expect("open");
        conn.execute_batch("PRAGMA foreign_keys = ON;").expect("pragma");
        run(&conn).expect("first run");
        run(&conn).expect("second run should be no-op");
    }

    #[test]
    fn test_aggregate_rows_seeded() {
        let conn = Connection::open_in_memory().expect("open");
        conn.execute_batch("PRAGMA foreign_keys = ON;").expect("pragma");
        run(&conn).expect("migrate");

        let tiers: i64 = conn
            .query_row("SELECT COUNT(*) FROM tier_stats", [], |row| row.get(0))
            .expect("tier count");
        assert_eq!(tiers, 8);

        let global: i64 = conn
            .query_row("SELECT COUNT(*) FROM global_stats", [], |row| row.get(0))
            .expect("global count");
        assert_eq!(global, 1);
    }

    #[test]
    fn test_tables_created() {
        let conn = Connection::open_in_memory().expect("open");
        conn.execute_batch("PRAGMA foreign_keys = ON;").expect("pragma");
        run(&conn).expect("migrate");

        let expected_tables = [
            "nfts",
            "sale_records",
            "affiliate_earnings",
            "pending_mints",
            "reward_events",
            "reward_withdrawals",
            "earnings_snapshots",
            "global_stats",
            "tier_stats",
            "time_reward_states",
            "sync_cursors",
        ];

        for table in &expected_tables {
            let count: i64 = conn
                .query_row(
                    "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name=?1",
                    [table],
                    |row| row.get(0),
                )
                .unwrap_or_else(|_| panic!("table {table} check"));
            assert_eq!(count, 1, "Table '{table}' should exist");
        }
    }
}
