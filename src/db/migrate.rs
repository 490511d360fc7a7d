//! Graph store schema migrations.
//!
//! Migrations are compiled into the binary so a store can be created or
//! upgraded from any working directory.

use rusqlite::{params, Connection, OptionalExtension};

use crate::error::{Result, TogError};

/// One schema step, applied at most once per store.
#[derive(Debug, Clone, Copy)]
pub struct Migration {
    pub version: u32,
    pub name: &'static str,
    pub sql: &'static str,
}

/// Known migrations in version order.
pub const MIGRATIONS: &[Migration] = &[Migration {
    version: 1,
    name: "001_graph_tables",
    sql: include_str!("../../migrations/001_graph_tables.sql"),
}];

fn ensure_migrations_table(conn: &Connection) -> Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version INTEGER PRIMARY KEY,
            name TEXT NOT NULL,
            applied_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
        )",
        [],
    )?;
    Ok(())
}

/// Highest applied version, or 0 for a fresh store.
pub fn schema_version(conn: &Connection) -> Result<u32> {
    ensure_migrations_table(conn)?;
    let version: Option<u32> = conn
        .query_row("SELECT MAX(version) FROM schema_migrations", [], |row| {
            row.get::<_, Option<u32>>(0)
        })
        .optional()?
        .flatten();
    Ok(version.unwrap_or(0))
}

/// Apply `migrations` newer than the store's version, each in its own transaction.
///
/// A store written by a newer build is rejected rather than read with a stale schema.
pub fn apply(conn: &mut Connection, migrations: &[Migration]) -> Result<u32> {
    let current = schema_version(conn)?;
    let latest = migrations.iter().map(|m| m.version).max().unwrap_or(0);
    if current > latest {
        return Err(TogError::Config(format!(
            "graph store schema version {} is newer than supported version {}",
            current, latest
        )));
    }

    let mut applied = 0;
    for migration in migrations.iter().filter(|m| m.version > current) {
        log::info!("Applying migration: {} (version {})", migration.name, migration.version);

        let tx = conn.transaction()?;
        tx.execute_batch(migration.sql).map_err(|e| {
            TogError::Config(format!("Failed to execute migration {}: {}", migration.name, e))
        })?;
        tx.execute(
            "INSERT INTO schema_migrations (version, name) VALUES (?1, ?2)",
            params![migration.version, migration.name],
        )?;
        tx.commit()?;
        applied += 1;
    }

    if applied == 0 {
        log::debug!("Graph store schema up to date (version {})", current);
    }
    Ok(applied)
}

/// Bring the graph store schema up to date.
pub fn run_migrations(conn: &mut Connection) -> Result<u32> {
    apply(conn, MIGRATIONS)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn open() -> (Connection, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let conn = Connection::open(temp_dir.path().join("test.db")).unwrap();
        (conn, temp_dir)
    }

    fn table_names(conn: &Connection) -> Vec<String> {
        conn.prepare("SELECT name FROM sqlite_master WHERE type='table' ORDER BY name")
            .unwrap()
            .query_map([], |row| row.get::<_, String>(0))
            .unwrap()
            .collect::<std::result::Result<Vec<_>, rusqlite::Error>>()
            .unwrap()
    }

    #[test]
    fn test_graph_schema_and_idempotence() {
        let (mut conn, _temp) = open();
        assert_eq!(schema_version(&conn).unwrap(), 0);

        assert_eq!(run_migrations(&mut conn).unwrap(), 1);
        assert_eq!(run_migrations(&mut conn).unwrap(), 0);
        assert_eq!(schema_version(&conn).unwrap(), 1);

        let tables = table_names(&conn);
        for table in ["edges", "entities", "relations", "schema_migrations"] {
            assert!(tables.contains(&table.to_string()), "missing table {}", table);
        }
    }

    #[test]
    fn test_only_newer_versions_applied() {
        let (mut conn, _temp) = open();
        let first = [Migration {
            version: 1,
            name: "001_a",
            sql: "CREATE TABLE a (id INTEGER);",
        }];
        apply(&mut conn, &first).unwrap();

        let both = [
            first[0],
            Migration {
                version: 2,
                name: "002_b",
                sql: "CREATE TABLE b (id INTEGER);",
            },
        ];
        assert_eq!(apply(&mut conn, &both).unwrap(), 1);
        assert_eq!(schema_version(&conn).unwrap(), 2);
        assert!(table_names(&conn).contains(&"b".to_string()));
    }

    #[test]
    fn test_failed_migration_rolls_back() {
        let (mut conn, _temp) = open();
        let broken = [Migration {
            version: 1,
            name: "001_broken",
            sql: "CREATE TABLE ok (id INTEGER); NOT SQL;",
        }];
        let err = apply(&mut conn, &broken).unwrap_err();
        assert!(err.to_string().contains("001_broken"));
        assert_eq!(schema_version(&conn).unwrap(), 0);
        assert!(!table_names(&conn).contains(&"ok".to_string()));
    }

    #[test]
    fn test_newer_store_rejected() {
        let (mut conn, _temp) = open();
        run_migrations(&mut conn).unwrap();
        conn.execute(
            "INSERT INTO schema_migrations (version, name) VALUES (?1, ?2)",
            params![99, "099_future"],
        )
        .unwrap();
        assert!(matches!(run_migrations(&mut conn), Err(TogError::Config(_))));
    }
}
