// src/cli/migrate.rs — Database migration command
//
// Migrations run automatically whenever the database is opened; this
// command shows where a database stands and can step it back one version.

use std::path::Path;

use crate::storage::schema;

/// Show migration status, roll back one step, or run pending migrations.
pub fn run_migrate(db_path: &Path, status_only: bool, rollback: bool) -> anyhow::Result<()> {
    if !db_path.exists() && (status_only || rollback) {
        println!("No database found at: {}", db_path.display());
        println!("Run `pairup migrate` to create it.");
        return Ok(());
    }

    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let conn = rusqlite::Connection::open(db_path)?;

    if status_only {
        return show_migration_status(&conn, db_path);
    }

    if rollback {
        match schema::rollback_last(&conn)? {
            Some(version) => println!("Reverted migration v{version}."),
            None => println!("No migrations to roll back."),
        }
        return show_migration_status(&conn, db_path);
    }

    println!("Running database migrations...");
    let applied = schema::run_migrations(&conn)?;
    println!("Applied {applied} migration(s).");
    show_migration_status(&conn, db_path)
}

fn show_migration_status(conn: &rusqlite::Connection, db_path: &Path) -> anyhow::Result<()> {
    let current = schema::current_version(conn)?;

    println!("Database: {}", db_path.display());
    println!(
        "Schema version: {current} (latest {})",
        schema::latest_version()
    );

    let mut stmt =
        conn.prepare("SELECT version, name, applied_at FROM _migrations ORDER BY version")?;
    let rows = stmt.query_map([], |row| {
        Ok((
            row.get::<_, u32>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, String>(2)?,
        ))
    })?;

    for row in rows {
        let (version, name, applied_at) = row?;
        println!("  v{version}: {name} (applied {applied_at})");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_migrate_then_rollback() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("pairup.db");

        run_migrate(&path, false, false).unwrap();
        let conn = rusqlite::Connection::open(&path).unwrap();
        assert_eq!(schema::current_version(&conn).unwrap(), schema::latest_version());
        drop(conn);

        run_migrate(&path, false, true).unwrap();
        let conn = rusqlite::Connection::open(&path).unwrap();
        assert_eq!(
            schema::current_version(&conn).unwrap(),
            schema::latest_version() - 1
        );
    }

    #[test]
    fn test_status_without_database_is_noop() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing.db");
        run_migrate(&path, true, false).unwrap();
        assert!(!path.exists());
    }
}
