//! SQLite-backed `ProofRepository`.
//!
//! One connection behind a mutex. Every statement runs on the blocking pool,
//! so a slow query never stalls an async worker.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use proofmark_core::model::{AuditResult, AuditSource, AuditSummary, RawProofRecord};
use rusqlite::{params, Connection, OptionalExtension, Row};
use uuid::Uuid;

use crate::errors::{StoreError, StoreResult};
use crate::repo::{NewProof, ProofRepository};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS proofs (
    id              INTEGER PRIMARY KEY AUTOINCREMENT,
    hash_full       TEXT NOT NULL,
    signature       TEXT NOT NULL,
    canonical_json  TEXT,
    signed_at       TEXT NOT NULL,
    user_id         TEXT,
    batch_id        INTEGER
);
CREATE INDEX IF NOT EXISTS idx_proofs_hash ON proofs(hash_full);
CREATE INDEX IF NOT EXISTS idx_proofs_batch ON proofs(batch_id);

CREATE TABLE IF NOT EXISTS audit_summaries (
    run_id                  TEXT PRIMARY KEY,
    started_at              TEXT NOT NULL,
    finished_at             TEXT NOT NULL,
    total_audited           INTEGER NOT NULL,
    successful_recoveries   INTEGER NOT NULL,
    failed_recoveries       INTEGER NOT NULL,
    mirror_inconsistencies  INTEGER NOT NULL,
    integrity_score         REAL NOT NULL,
    halted_early            INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS audit_results (
    id                  INTEGER PRIMARY KEY AUTOINCREMENT,
    run_id              TEXT NOT NULL REFERENCES audit_summaries(run_id),
    proof_id            INTEGER NOT NULL,
    original_hash       TEXT NOT NULL,
    recovered_hash      TEXT,
    hash_match          INTEGER NOT NULL,
    signature_valid     INTEGER NOT NULL,
    source              TEXT NOT NULL,
    recovery_time_ms    INTEGER NOT NULL,
    integrity_score     INTEGER NOT NULL,
    mirror_consistent   INTEGER,
    error               TEXT
);
CREATE INDEX IF NOT EXISTS idx_audit_results_run ON audit_results(run_id);
"#;

const PROOF_COLUMNS: &str = "id, hash_full, signature, signed_at, user_id, canonical_json, batch_id";

#[derive(Debug)]
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let path = path.as_ref();
        let conn = Connection::open(path)
            .map_err(|e| StoreError::transport("open", path.display().to_string(), e))?;
        conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get::<_, String>(0))
            .map_err(|e| StoreError::transport("pragma", "journal_mode", e))?;
        Self::init(conn)
    }

    pub fn open_in_memory() -> StoreResult<Self> {
        let conn = Connection::open_in_memory().map_err(|e| StoreError::transport("open", ":memory:", e))?;
        Self::init(conn)
    }

    fn init(conn: Connection) -> StoreResult<Self> {
        conn.execute_batch("PRAGMA foreign_keys = ON;")
            .and_then(|_| conn.execute_batch(SCHEMA))
            .map_err(|e| StoreError::transport("migrate", "schema", e))?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Run `f` against the connection on tokio's blocking pool.
    async fn with_conn<T, F>(&self, op: &'static str, f: F) -> StoreResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection) -> StoreResult<T> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || f(&mut conn.lock()))
            .await
            .map_err(|e| StoreError::transport(op, "spawn_blocking", e))?
    }
}

fn db_err(op: &'static str, key: impl Into<String>) -> impl FnOnce(rusqlite::Error) -> StoreError {
    let key = key.into();
    move |e| StoreError::transport(op, key, e)
}

fn to_i64(v: u64, what: &str) -> StoreResult<i64> {
    i64::try_from(v).map_err(|_| StoreError::corrupt(what, format!("{v} exceeds i64")))
}

fn proof_from_row(row: &Row<'_>) -> rusqlite::Result<RawProofRecord> {
    let batch: Option<i64> = row.get(6)?;
    Ok(RawProofRecord {
        id: row.get(0)?,
        hash_full: row.get(1)?,
        signature: row.get(2)?,
        signed_at: row.get(3)?,
        user_id: row.get(4)?,
        canonical_json: row.get(5)?,
        batch_id: batch.map(|b| b.max(0) as u64),
    })
}

struct SummaryRow {
    run_id: String,
    started_at: String,
    finished_at: String,
    counts: [i64; 4],
    integrity_score: f64,
    halted_early: bool,
}

impl SummaryRow {
    const COLUMNS: &'static str = "run_id, started_at, finished_at, total_audited, successful_recoveries, \
         failed_recoveries, mirror_inconsistencies, integrity_score, halted_early";

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            run_id: row.get(0)?,
            started_at: row.get(1)?,
            finished_at: row.get(2)?,
            counts: [row.get(3)?, row.get(4)?, row.get(5)?, row.get(6)?],
            integrity_score: row.get(7)?,
            halted_early: row.get(8)?,
        })
    }

    fn into_summary(self) -> StoreResult<AuditSummary> {
        let run_id = Uuid::parse_str(&self.run_id).map_err(|e| StoreError::corrupt(&self.run_id, e.to_string()))?;
        let [total, ok, failed, inconsistent] = self.counts.map(|c| c.max(0) as u64);
        Ok(AuditSummary {
            run_id,
            started_at: self.started_at,
            finished_at: self.finished_at,
            total_audited: total,
            successful_recoveries: ok,
            failed_recoveries: failed,
            mirror_inconsistencies: inconsistent,
            integrity_score: self.integrity_score,
            halted_early: self.halted_early,
        })
    }
}

struct ResultRow {
    proof_id: i64,
    original_hash: String,
    recovered_hash: Option<String>,
    hash_match: bool,
    signature_valid: bool,
    source: String,
    recovery_time_ms: i64,
    integrity_score: i64,
    mirror_consistent: Option<bool>,
    error: Option<String>,
}

impl ResultRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            proof_id: row.get(0)?,
            original_hash: row.get(1)?,
            recovered_hash: row.get(2)?,
            hash_match: row.get(3)?,
            signature_valid: row.get(4)?,
            source: row.get(5)?,
            recovery_time_ms: row.get(6)?,
            integrity_score: row.get(7)?,
            mirror_consistent: row.get(8)?,
            error: row.get(9)?,
        })
    }

    fn into_result(self) -> StoreResult<AuditResult> {
        let source = AuditSource::parse(&self.source)
            .map_err(|e| StoreError::corrupt(format!("audit_results/{}", self.proof_id), e.to_string()))?;
        Ok(AuditResult {
            proof_id: self.proof_id,
            original_hash: self.original_hash,
            recovered_hash: self.recovered_hash,
            hash_match: self.hash_match,
            signature_valid: self.signature_valid,
            source,
            recovery_time_ms: self.recovery_time_ms.max(0) as u64,
            integrity_score: self.integrity_score.clamp(0, 100) as u8,
            mirror_consistent: self.mirror_consistent,
            error: self.error,
        })
    }
}

#[async_trait]
impl ProofRepository for SqliteStore {
    async fn insert_proof(&self, p: NewProof) -> StoreResult<i64> {
        self.with_conn("insert_proof", move |conn| {
            conn.execute(
                "INSERT INTO proofs (hash_full, signature, canonical_json, signed_at, user_id) VALUES (?1, ?2, ?3, ?4, ?5)",
                params![p.hash_full, p.signature, p.canonical_json, p.signed_at, p.user_id],
            )
            .map_err(db_err("insert_proof", p.hash_full.clone()))?;
            Ok(conn.last_insert_rowid())
        })
        .await
    }

    async fn get_proof(&self, id: i64) -> StoreResult<Option<RawProofRecord>> {
        self.with_conn("get_proof", move |conn| {
            conn.query_row(
                &format!("SELECT {PROOF_COLUMNS} FROM proofs WHERE id = ?1"),
                params![id],
                proof_from_row,
            )
            .optional()
            .map_err(db_err("get_proof", id.to_string()))
        })
        .await
    }

    async fn find_by_hash(&self, hash_full: &str) -> StoreResult<Option<RawProofRecord>> {
        let hash_full = hash_full.to_string();
        self.with_conn("find_by_hash", move |conn| {
            conn.query_row(
                &format!("SELECT {PROOF_COLUMNS} FROM proofs WHERE hash_full = ?1 ORDER BY id ASC LIMIT 1"),
                params![hash_full],
                proof_from_row,
            )
            .optional()
            .map_err(db_err("find_by_hash", hash_full.clone()))
        })
        .await
    }

    async fn proof_ids(&self) -> StoreResult<Vec<i64>> {
        self.with_conn("proof_ids", |conn| {
            let mut stmt = conn
                .prepare("SELECT id FROM proofs ORDER BY id ASC")
                .map_err(db_err("proof_ids", "proofs"))?;
            let ids = stmt
                .query_map([], |row| row.get::<_, i64>(0))
                .and_then(|rows| rows.collect::<rusqlite::Result<Vec<_>>>())
                .map_err(db_err("proof_ids", "proofs"))?;
            Ok(ids)
        })
        .await
    }

    async fn count_proofs(&self) -> StoreResult<u64> {
        self.with_conn("count_proofs", |conn| {
            let n: i64 = conn
                .query_row("SELECT COUNT(*) FROM proofs", [], |row| row.get(0))
                .map_err(db_err("count_proofs", "proofs"))?;
            Ok(n.max(0) as u64)
        })
        .await
    }

    async fn unbatched(&self, limit: usize) -> StoreResult<Vec<RawProofRecord>> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        self.with_conn("unbatched", move |conn| {
            let mut stmt = conn
                .prepare(&format!(
                    "SELECT {PROOF_COLUMNS} FROM proofs WHERE batch_id IS NULL ORDER BY id ASC LIMIT ?1"
                ))
                .map_err(db_err("unbatched", "proofs"))?;
            let rows = stmt
                .query_map(params![limit], proof_from_row)
                .and_then(|rows| rows.collect::<rusqlite::Result<Vec<_>>>())
                .map_err(db_err("unbatched", "proofs"))?;
            Ok(rows)
        })
        .await
    }

    async fn batch_proofs(&self, batch_id: u64) -> StoreResult<Vec<RawProofRecord>> {
        let batch = to_i64(batch_id, "batch_id")?;
        self.with_conn("batch_proofs", move |conn| {
            let mut stmt = conn
                .prepare(&format!(
                    "SELECT {PROOF_COLUMNS} FROM proofs WHERE batch_id = ?1 ORDER BY id ASC"
                ))
                .map_err(db_err("batch_proofs", batch_id.to_string()))?;
            let rows = stmt
                .query_map(params![batch], proof_from_row)
                .and_then(|rows| rows.collect::<rusqlite::Result<Vec<_>>>())
                .map_err(db_err("batch_proofs", batch_id.to_string()))?;
            Ok(rows)
        })
        .await
    }

    async fn max_batch_id(&self) -> StoreResult<Option<u64>> {
        self.with_conn("max_batch_id", |conn| {
            let max: Option<i64> = conn
                .query_row("SELECT MAX(batch_id) FROM proofs", [], |row| row.get(0))
                .map_err(db_err("max_batch_id", "proofs"))?;
            Ok(max.map(|m| m.max(0) as u64))
        })
        .await
    }

    async fn mark_batched(&self, batch_id: u64, ids: &[i64]) -> StoreResult<()> {
        let batch = to_i64(batch_id, "batch_id")?;
        let ids = ids.to_vec();
        self.with_conn("mark_batched", move |conn| {
            let tx = conn
                .transaction()
                .map_err(db_err("mark_batched", batch_id.to_string()))?;
            for id in &ids {
                let changed = tx
                    .execute(
                        "UPDATE proofs SET batch_id = ?1 WHERE id = ?2 AND (batch_id IS NULL OR batch_id = ?1)",
                        params![batch, id],
                    )
                    .map_err(db_err("mark_batched", id.to_string()))?;
                if changed != 1 {
                    return Err(StoreError::corrupt(
                        format!("proofs/{id}"),
                        format!("missing or already assigned to another batch than {batch_id}"),
                    ));
                }
            }
            tx.commit().map_err(db_err("mark_batched", batch_id.to_string()))
        })
        .await
    }

    async fn save_audit(&self, s: &AuditSummary, results: &[AuditResult]) -> StoreResult<()> {
        let run_id = s.run_id.to_string();
        let counts = [
            to_i64(s.total_audited, "total_audited")?,
            to_i64(s.successful_recoveries, "successful_recoveries")?,
            to_i64(s.failed_recoveries, "failed_recoveries")?,
            to_i64(s.mirror_inconsistencies, "mirror_inconsistencies")?,
        ];
        let s = s.clone();
        let results = results.to_vec();

        self.with_conn("save_audit", move |conn| {
            let tx = conn.transaction().map_err(db_err("save_audit", run_id.clone()))?;
            tx.execute(
                &format!(
                    "INSERT INTO audit_summaries ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                    SummaryRow::COLUMNS
                ),
                params![
                    run_id,
                    s.started_at,
                    s.finished_at,
                    counts[0],
                    counts[1],
                    counts[2],
                    counts[3],
                    s.integrity_score,
                    s.halted_early
                ],
            )
            .map_err(db_err("save_audit", run_id.clone()))?;

            for r in &results {
                tx.execute(
                    "INSERT INTO audit_results (run_id, proof_id, original_hash, recovered_hash, hash_match, \
                     signature_valid, source, recovery_time_ms, integrity_score, mirror_consistent, error) \
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
                    params![
                        run_id,
                        r.proof_id,
                        r.original_hash,
                        r.recovered_hash,
                        r.hash_match,
                        r.signature_valid,
                        r.source.as_str(),
                        to_i64(r.recovery_time_ms, "recovery_time_ms")?,
                        i64::from(r.integrity_score),
                        r.mirror_consistent,
                        r.error
                    ],
                )
                .map_err(db_err("save_audit", format!("{run_id}/{}", r.proof_id)))?;
            }

            tx.commit().map_err(db_err("save_audit", run_id))
        })
        .await
    }

    async fn load_audit(&self, run_id: Uuid) -> StoreResult<Option<(AuditSummary, Vec<AuditResult>)>> {
        let key = run_id.to_string();
        self.with_conn("load_audit", move |conn| {
            let summary = conn
                .query_row(
                    &format!(
                        "SELECT {} FROM audit_summaries WHERE run_id = ?1",
                        SummaryRow::COLUMNS
                    ),
                    params![key],
                    SummaryRow::from_row,
                )
                .optional()
                .map_err(db_err("load_audit", key.clone()))?;
            let Some(summary) = summary else {
                return Ok(None);
            };

            let mut stmt = conn
                .prepare(
                    "SELECT proof_id, original_hash, recovered_hash, hash_match, signature_valid, source, \
                     recovery_time_ms, integrity_score, mirror_consistent, error \
                     FROM audit_results WHERE run_id = ?1 ORDER BY id ASC",
                )
                .map_err(db_err("load_audit", key.clone()))?;
            let rows = stmt
                .query_map(params![key], ResultRow::from_row)
                .and_then(|rows| rows.collect::<rusqlite::Result<Vec<_>>>())
                .map_err(db_err("load_audit", key.clone()))?;

            let results = rows
                .into_iter()
                .map(ResultRow::into_result)
                .collect::<StoreResult<Vec<_>>>()?;
            Ok(Some((summary.into_summary()?, results)))
        })
        .await
    }

    async fn recent_audits(&self, limit: usize) -> StoreResult<Vec<AuditSummary>> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        self.with_conn("recent_audits", move |conn| {
            let mut stmt = conn
                .prepare(&format!(
                    "SELECT {} FROM audit_summaries ORDER BY finished_at DESC, rowid DESC LIMIT ?1",
                    SummaryRow::COLUMNS
                ))
                .map_err(db_err("recent_audits", "audit_summaries"))?;
            let rows = stmt
                .query_map(params![limit], SummaryRow::from_row)
                .and_then(|rows| rows.collect::<rusqlite::Result<Vec<_>>>())
                .map_err(db_err("recent_audits", "audit_summaries"))?;
            rows.into_iter().map(SummaryRow::into_summary).collect()
        })
        .await
    }
}
