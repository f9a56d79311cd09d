//! The pattern repository: normalized, index-backed storage for
//! analyzed test cases.
//!
//! Writes are serialized behind a single connection lock and each
//! ingest runs in one transaction, so a reader sees either the prior
//! version of an identity or the fully replaced one, never a mix of old
//! and new child records.

use crate::error::StoreResult;
use crate::schema;
use ompgen_extract::Clause;
use ompgen_extract::Directive;
use ompgen_extract::ErrorPattern;
use ompgen_extract::ExtractionResult;
use ompgen_extract::RunCommand;
use ompgen_extract::Severity;
use ompgen_extract::Stage;
use ompgen_extract::TestCase;
use rusqlite::params;
use rusqlite::Connection;
use rusqlite::OptionalExtension;
use rusqlite::Transaction;
use serde::Deserialize;
use serde::Serialize;
use std::collections::BTreeMap;
use std::io::Write;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;
use std::sync::Mutex;
use tracing::debug;
use tracing::warn;

/// Compact row describing a stored test, without children.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestSummary {
    pub identity: String,
    pub file_name: String,
    pub stage: Stage,
    pub category: String,
    pub complexity: f64,
    pub ingest_seq: i64,
}

/// Aggregate repository statistics.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RepositoryStats {
    pub total_tests: i64,
    pub total_error_patterns: i64,
    pub by_stage: BTreeMap<String, i64>,
    pub by_category: BTreeMap<String, i64>,
    /// Most common directive names, descending, capped at ten.
    pub top_directives: Vec<(String, i64)>,
}

/// Normalized SQLite-backed store for test patterns.
///
/// Cloning shares the underlying connection; the lock is the
/// single-writer serialization point required for replace-by-identity
/// ingestion.
#[derive(Debug, Clone)]
pub struct PatternRepository {
    conn: Arc<Mutex<Connection>>,
}

impl PatternRepository {
    /// Open (creating if needed) a repository at `path`.
    pub fn open(path: &Path) -> StoreResult<Self> {
        let conn = Connection::open(path)?;
        schema::init_schema(&conn)?;
        debug!("pattern repository opened at {}", path.display());
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// In-memory repository, mainly for tests.
    pub fn open_in_memory() -> StoreResult<Self> {
        let conn = Connection::open_in_memory()?;
        schema::init_schema(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Connection> {
        // A poisoned lock means another writer panicked mid-ingest; the
        // transaction it held has rolled back, so the data is intact.
        match self.conn.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Ingest a test case, replacing any prior record with the same
    /// identity. Replacement keeps the original ingestion sequence
    /// number so re-ingesting identical content cannot reorder
    /// retrieval results.
    pub fn ingest(&self, case: &TestCase) -> StoreResult<()> {
        let mut conn = self.lock();
        let tx = conn.transaction()?;

        let existing: Option<(i64, i64)> = tx
            .query_row(
                "SELECT id, ingest_seq FROM tests WHERE identity = ?1",
                params![case.identity],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;

        let test_id = match existing {
            Some((id, _seq)) => {
                // Children cascade; the row itself is updated in place
                // to preserve id and ingest_seq.
                tx.execute("DELETE FROM directives WHERE test_id = ?1", params![id])?;
                tx.execute("DELETE FROM error_patterns WHERE test_id = ?1", params![id])?;
                tx.execute("DELETE FROM run_commands WHERE test_id = ?1", params![id])?;
                tx.execute(
                    "UPDATE tests SET file_name = ?2, source = ?3, stage = ?4,
                         category = ?5, complexity = ?6, line_count = ?7,
                         compiler_flags = ?8, openmp_version = ?9
                     WHERE id = ?1",
                    params![
                        id,
                        case.file_name,
                        case.source,
                        case.stage.as_str(),
                        case.category,
                        case.complexity,
                        case.line_count,
                        serde_json::to_string(&case.compiler_flags)?,
                        case.openmp_version,
                    ],
                )?;
                id
            }
            None => {
                let next_seq: i64 = tx.query_row(
                    "SELECT COALESCE(MAX(ingest_seq), 0) + 1 FROM tests",
                    [],
                    |row| row.get(0),
                )?;
                tx.execute(
                    "INSERT INTO tests (identity, file_name, source, stage, category,
                         complexity, line_count, compiler_flags, openmp_version, ingest_seq)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                    params![
                        case.identity,
                        case.file_name,
                        case.source,
                        case.stage.as_str(),
                        case.category,
                        case.complexity,
                        case.line_count,
                        serde_json::to_string(&case.compiler_flags)?,
                        case.openmp_version,
                        next_seq,
                    ],
                )?;
                tx.last_insert_rowid()
            }
        };

        insert_children(&tx, test_id, &case.extraction)?;
        tx.commit()?;
        Ok(())
    }

    /// Ordered summaries for a stage, optionally narrowed to one
    /// category. Complexity descending, then earlier-ingested first.
    pub fn query(
        &self,
        stage: Stage,
        category: Option<&str>,
        limit: usize,
    ) -> StoreResult<Vec<TestSummary>> {
        let conn = self.lock();
        let mut sql = String::from(
            "SELECT identity, file_name, stage, category, complexity, ingest_seq
             FROM tests WHERE stage = ?1",
        );
        if category.is_some() {
            sql.push_str(" AND category = ?2");
        }
        sql.push_str(" ORDER BY complexity DESC, ingest_seq ASC");

        let mut stmt = conn.prepare(&sql)?;
        let map_row = |row: &rusqlite::Row<'_>| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, f64>(4)?,
                row.get::<_, i64>(5)?,
            ))
        };
        let rows: Vec<_> = match category {
            Some(cat) => stmt
                .query_map(params![stage.as_str(), cat], map_row)?
                .collect::<Result<_, _>>()?,
            None => stmt
                .query_map(params![stage.as_str()], map_row)?
                .collect::<Result<_, _>>()?,
        };

        let mut summaries = Vec::new();
        for (identity, file_name, stage_str, category, complexity, ingest_seq) in rows {
            if summaries.len() == limit {
                break;
            }
            // One malformed stored record must not fail the query.
            let stage = match Stage::from_str(&stage_str) {
                Ok(stage) => stage,
                Err(err) => {
                    warn!("skipping malformed record {identity}: {err}");
                    continue;
                }
            };
            summaries.push(TestSummary {
                identity,
                file_name,
                stage,
                category,
                complexity,
                ingest_seq,
            });
        }
        Ok(summaries)
    }

    /// Load a full test case back out of the normalized tables.
    pub fn load(&self, identity: &str) -> StoreResult<Option<TestCase>> {
        let conn = self.lock();
        #[allow(clippy::type_complexity)]
        let row: Option<(i64, String, String, String, String, f64, i64, String, Option<String>)> =
            conn.query_row(
                "SELECT id, file_name, source, stage, category, complexity, line_count,
                     compiler_flags, openmp_version
                 FROM tests WHERE identity = ?1",
                params![identity],
                |row| {
                    Ok((
                        row.get(0)?,
                        row.get(1)?,
                        row.get(2)?,
                        row.get(3)?,
                        row.get(4)?,
                        row.get(5)?,
                        row.get(6)?,
                        row.get(7)?,
                        row.get(8)?,
                    ))
                },
            )
            .optional()?;

        let Some((
            id,
            file_name,
            source,
            stage_str,
            category,
            complexity,
            line_count,
            flags,
            version,
        )) = row
        else {
            return Ok(None);
        };
        let stage = match Stage::from_str(&stage_str) {
            Ok(stage) => stage,
            Err(err) => {
                warn!("skipping malformed record {identity}: {err}");
                return Ok(None);
            }
        };

        let extraction = load_extraction(&conn, id)?;
        Ok(Some(TestCase {
            identity: identity.to_string(),
            file_name,
            source,
            stage,
            category,
            complexity,
            line_count: line_count as u32,
            compiler_flags: serde_json::from_str(&flags).unwrap_or_default(),
            openmp_version: version,
            extraction,
        }))
    }

    /// Remove by identity. Unknown identities are a successful no-op;
    /// the return value reports whether anything was deleted.
    pub fn remove(&self, identity: &str) -> StoreResult<bool> {
        let conn = self.lock();
        let deleted = conn.execute("DELETE FROM tests WHERE identity = ?1", params![identity])?;
        Ok(deleted > 0)
    }

    /// Drop every stored record.
    pub fn reset(&self) -> StoreResult<()> {
        let conn = self.lock();
        conn.execute_batch(
            "DELETE FROM tests;
             DELETE FROM clauses;",
        )?;
        Ok(())
    }

    /// Number of stored tests.
    pub fn count(&self) -> StoreResult<i64> {
        let conn = self.lock();
        Ok(conn.query_row("SELECT COUNT(*) FROM tests", [], |row| row.get(0))?)
    }

    /// Aggregate statistics over the stored corpus.
    pub fn stats(&self) -> StoreResult<RepositoryStats> {
        let conn = self.lock();
        let mut stats = RepositoryStats {
            total_tests: conn.query_row("SELECT COUNT(*) FROM tests", [], |row| row.get(0))?,
            total_error_patterns: conn.query_row(
                "SELECT COUNT(*) FROM error_patterns",
                [],
                |row| row.get(0),
            )?,
            ..Default::default()
        };

        let mut stmt =
            conn.prepare("SELECT stage, COUNT(*) FROM tests GROUP BY stage ORDER BY stage")?;
        for row in stmt.query_map([], |row| Ok((row.get(0)?, row.get(1)?)))? {
            let (stage, count): (String, i64) = row?;
            stats.by_stage.insert(stage, count);
        }

        let mut stmt = conn
            .prepare("SELECT category, COUNT(*) FROM tests GROUP BY category ORDER BY category")?;
        for row in stmt.query_map([], |row| Ok((row.get(0)?, row.get(1)?)))? {
            let (category, count): (String, i64) = row?;
            stats.by_category.insert(category, count);
        }

        let mut stmt = conn.prepare(
            "SELECT name, COUNT(*) AS n FROM directives
             GROUP BY name ORDER BY n DESC, name ASC LIMIT 10",
        )?;
        for row in stmt.query_map([], |row| Ok((row.get(0)?, row.get(1)?)))? {
            stats.top_directives.push(row?);
        }

        Ok(stats)
    }

    /// Export every stored test as a JSON document with a metadata
    /// header.
    pub fn export_json<W: Write>(&self, writer: W) -> StoreResult<()> {
        let identities: Vec<String> = {
            let conn = self.lock();
            let mut stmt =
                conn.prepare("SELECT identity FROM tests ORDER BY ingest_seq ASC")?;
            let rows = stmt.query_map([], |row| row.get(0))?;
            rows.collect::<Result<_, _>>()?
        };

        let mut patterns = Vec::with_capacity(identities.len());
        for identity in identities {
            if let Some(case) = self.load(&identity)? {
                patterns.push(case);
            }
        }

        let doc = serde_json::json!({
            "metadata": {
                "total_patterns": patterns.len(),
                "schema_version": schema::CURRENT_VERSION,
            },
            "patterns": patterns,
        });
        serde_json::to_writer_pretty(writer, &doc)?;
        Ok(())
    }
}

/// Insert child records for a test inside the ingest transaction.
fn insert_children(
    tx: &Transaction<'_>,
    test_id: i64,
    extraction: &ExtractionResult,
) -> StoreResult<()> {
    for (pos, directive) in extraction.directives.iter().enumerate() {
        tx.execute(
            "INSERT INTO directives (test_id, name, line, position, raw)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![test_id, directive.name, directive.line, pos as i64, directive.raw],
        )?;
        let directive_id = tx.last_insert_rowid();

        for (cpos, clause) in directive.clauses.iter().enumerate() {
            tx.execute(
                "INSERT OR IGNORE INTO clauses (name) VALUES (?1)",
                params![clause.name],
            )?;
            let clause_id: i64 = tx.query_row(
                "SELECT id FROM clauses WHERE name = ?1",
                params![clause.name],
                |row| row.get(0),
            )?;
            tx.execute(
                "INSERT INTO directive_clauses (directive_id, clause_id, position, args)
                 VALUES (?1, ?2, ?3, ?4)",
                params![directive_id, clause_id, cpos as i64, clause.args],
            )?;
        }
    }

    for (pos, pattern) in extraction.error_patterns.iter().enumerate() {
        tx.execute(
            "INSERT INTO error_patterns (test_id, message, severity, line, position)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                test_id,
                pattern.message,
                pattern.severity.as_str(),
                pattern.line,
                pos as i64
            ],
        )?;
    }

    for (pos, run) in extraction.run_commands.iter().enumerate() {
        tx.execute(
            "INSERT INTO run_commands (test_id, command, line, position, checks)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                test_id,
                run.command,
                run.line,
                pos as i64,
                serde_json::to_string(&run.checks)?
            ],
        )?;
    }

    Ok(())
}

/// Rebuild an [`ExtractionResult`] from the child tables.
fn load_extraction(conn: &Connection, test_id: i64) -> StoreResult<ExtractionResult> {
    let mut directives = Vec::new();
    {
        let mut stmt = conn.prepare(
            "SELECT id, name, line, raw FROM directives
             WHERE test_id = ?1 ORDER BY position ASC",
        )?;
        let rows: Vec<(i64, String, i64, String)> = stmt
            .query_map(params![test_id], |row| {
                Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?))
            })?
            .collect::<Result<_, _>>()?;

        for (directive_id, name, line, raw) in rows {
            let mut clause_stmt = conn.prepare(
                "SELECT c.name, dc.args FROM directive_clauses dc
                 JOIN clauses c ON c.id = dc.clause_id
                 WHERE dc.directive_id = ?1 ORDER BY dc.position ASC",
            )?;
            let clauses: Vec<Clause> = clause_stmt
                .query_map(params![directive_id], |row| {
                    Ok(Clause {
                        name: row.get(0)?,
                        args: row.get(1)?,
                    })
                })?
                .collect::<Result<_, _>>()?;
            directives.push(Directive {
                name,
                clauses,
                line: line as u32,
                raw,
            });
        }
    }

    let mut error_patterns = Vec::new();
    {
        let mut stmt = conn.prepare(
            "SELECT message, severity, line FROM error_patterns
             WHERE test_id = ?1 ORDER BY position ASC",
        )?;
        let rows: Vec<(String, String, i64)> = stmt
            .query_map(params![test_id], |row| {
                Ok((row.get(0)?, row.get(1)?, row.get(2)?))
            })?
            .collect::<Result<_, _>>()?;
        for (message, severity, line) in rows {
            // Same partial-failure policy as malformed stage rows.
            let severity = match Severity::from_str(&severity) {
                Ok(severity) => severity,
                Err(err) => {
                    warn!("skipping malformed error pattern for test {test_id}: {err}");
                    continue;
                }
            };
            error_patterns.push(ErrorPattern {
                message,
                severity,
                line: line as u32,
            });
        }
    }

    let mut run_commands = Vec::new();
    {
        let mut stmt = conn.prepare(
            "SELECT command, line, checks FROM run_commands
             WHERE test_id = ?1 ORDER BY position ASC",
        )?;
        let rows: Vec<(String, i64, String)> = stmt
            .query_map(params![test_id], |row| {
                Ok((row.get(0)?, row.get(1)?, row.get(2)?))
            })?
            .collect::<Result<_, _>>()?;
        for (command, line, checks) in rows {
            run_commands.push(RunCommand {
                command,
                line: line as u32,
                checks: serde_json::from_str(&checks).unwrap_or_default(),
            });
        }
    }

    Ok(ExtractionResult {
        directives,
        error_patterns,
        run_commands,
    })
}
