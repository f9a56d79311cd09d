//! SQLite schema definition and initialization.
//!
//! The layout is fully normalized: directives, clauses, error patterns,
//! and run commands live in child tables keyed by the owning test's id,
//! and clause names are a shared vocabulary table so a clause spelling
//! is stored once no matter how many tests use it.

use rusqlite::Connection;

/// Current schema version, stored in `schema_version`.
pub const CURRENT_VERSION: &str = "1";

/// Initialize the schema, WAL mode, and performance pragmas.
pub fn init_schema(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(
        "PRAGMA journal_mode = WAL;
         PRAGMA synchronous = NORMAL;
         PRAGMA busy_timeout = 5000;
         PRAGMA foreign_keys = ON;
         PRAGMA temp_store = MEMORY;",
    )?;

    conn.execute_batch(SCHEMA_SQL)?;

    let count: i64 = conn.query_row("SELECT COUNT(*) FROM schema_version", [], |row| row.get(0))?;
    if count == 0 {
        conn.execute(
            "INSERT INTO schema_version (version) VALUES (?1)",
            [CURRENT_VERSION],
        )?;
    }

    Ok(())
}

const SCHEMA_SQL: &str = "
CREATE TABLE IF NOT EXISTS schema_version (
    version TEXT NOT NULL,
    applied_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE TABLE IF NOT EXISTS tests (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    identity TEXT UNIQUE NOT NULL,
    file_name TEXT NOT NULL,
    source TEXT NOT NULL,
    stage TEXT NOT NULL,
    category TEXT NOT NULL,
    complexity REAL NOT NULL,
    line_count INTEGER NOT NULL,
    compiler_flags TEXT NOT NULL DEFAULT '[]',
    openmp_version TEXT,
    ingest_seq INTEGER NOT NULL,
    created_at TEXT NOT NULL DEFAULT (datetime('now'))
);
CREATE INDEX IF NOT EXISTS idx_tests_stage ON tests(stage);
CREATE INDEX IF NOT EXISTS idx_tests_category ON tests(category);
CREATE INDEX IF NOT EXISTS idx_tests_complexity ON tests(complexity);

CREATE TABLE IF NOT EXISTS directives (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    test_id INTEGER NOT NULL REFERENCES tests(id) ON DELETE CASCADE,
    name TEXT NOT NULL,
    line INTEGER NOT NULL,
    position INTEGER NOT NULL,
    raw TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_directives_test ON directives(test_id);
CREATE INDEX IF NOT EXISTS idx_directives_name ON directives(name);

CREATE TABLE IF NOT EXISTS clauses (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT UNIQUE NOT NULL
);

CREATE TABLE IF NOT EXISTS directive_clauses (
    directive_id INTEGER NOT NULL REFERENCES directives(id) ON DELETE CASCADE,
    clause_id INTEGER NOT NULL REFERENCES clauses(id),
    position INTEGER NOT NULL,
    args TEXT,
    PRIMARY KEY (directive_id, position)
);

CREATE TABLE IF NOT EXISTS error_patterns (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    test_id INTEGER NOT NULL REFERENCES tests(id) ON DELETE CASCADE,
    message TEXT NOT NULL,
    severity TEXT NOT NULL,
    line INTEGER NOT NULL,
    position INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_error_patterns_test ON error_patterns(test_id);

CREATE TABLE IF NOT EXISTS run_commands (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    test_id INTEGER NOT NULL REFERENCES tests(id) ON DELETE CASCADE,
    command TEXT NOT NULL,
    line INTEGER NOT NULL,
    position INTEGER NOT NULL,
    checks TEXT NOT NULL DEFAULT '[]'
);
CREATE INDEX IF NOT EXISTS idx_run_commands_test ON run_commands(test_id);
";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_initializes_twice_without_error() {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();
        init_schema(&conn).unwrap();

        let version: String = conn
            .query_row("SELECT version FROM schema_version", [], |row| row.get(0))
            .unwrap();
        assert_eq!(version, CURRENT_VERSION);
    }
}
