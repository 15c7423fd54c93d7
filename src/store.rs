//! SQLite-backed persistence for diagnosis results.
//!
//! Daily results are unique per `(user_id, date, slot)`: a second submission
//! for the same slot overwrites the first. Quick results are append-only.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{params, Connection, Row};
use serde::{Deserialize, Serialize};

use crate::axis::Axis;
use crate::copy::CopySource;
use crate::scoring::{RankedOrder, ScoreVector, TypeKey};
use crate::theme::Slot;

// =============================================================================
// Types
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Flow {
    /// Four-axis type quiz, classified into a [`TypeKey`].
    Quick,
    /// Single-question slot quiz, reported as a winning [`Axis`].
    Daily,
}

impl Flow {
    pub fn as_str(self) -> &'static str {
        match self {
            Flow::Quick => "quick",
            Flow::Daily => "daily",
        }
    }

    pub fn parse(raw: &str) -> Option<Flow> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "quick" | "type" => Some(Flow::Quick),
            "daily" => Some(Flow::Daily),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiagnosisRecord {
    pub user_id: String,
    pub flow: Flow,
    pub date: NaiveDate,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slot: Option<Slot>,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub winning_axis: Option<Axis>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub type_key: Option<TypeKey>,
    pub score_vector: ScoreVector,
    pub ranked_order: RankedOrder,
    pub comment: String,
    pub advice: String,
    pub affirmation: String,
    pub source: CopySource,
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("store lock poisoned")]
    Poisoned,
    #[error("task join error: {0}")]
    Join(String),
    #[error("serialization error: {0}")]
    Serde(String),
    #[error("invalid record: {0}")]
    InvalidRecord(String),
}

#[async_trait]
pub trait DiagnosisStore: Send + Sync {
    /// Insert or overwrite the daily result for `(user_id, date, slot)`.
    async fn upsert_daily(&self, record: &DiagnosisRecord) -> Result<(), StoreError>;
    async fn append_quick(&self, record: &DiagnosisRecord) -> Result<(), StoreError>;
    /// Both flows, newest first.
    async fn history(&self, user_id: &str, limit: usize) -> Result<Vec<DiagnosisRecord>, StoreError>;
    async fn daily(
        &self,
        user_id: &str,
        date: NaiveDate,
        slot: Slot,
    ) -> Result<Option<DiagnosisRecord>, StoreError>;
}

// =============================================================================
// SQLite implementation
// =============================================================================

#[derive(Clone)]
pub struct SqliteDiagnosisStore {
    path: PathBuf,
    conn: Arc<Mutex<Connection>>,
}

const RESULT_COLUMNS: &str = "user_id TEXT NOT NULL, \
     date TEXT NOT NULL, \
     created_at INTEGER NOT NULL, \
     winning_axis TEXT, \
     type_key TEXT, \
     score_vector TEXT NOT NULL, \
     ranked_order TEXT NOT NULL, \
     comment TEXT NOT NULL, \
     advice TEXT NOT NULL, \
     affirmation TEXT NOT NULL, \
     source TEXT NOT NULL";

/// Column order read by [`row_to_record`].
const SELECT_DAILY: &str = "SELECT 'daily', user_id, date, slot, created_at, winning_axis, type_key, \
     score_vector, ranked_order, comment, advice, affirmation, source FROM daily_results";
const SELECT_QUICK: &str = "SELECT 'quick', user_id, date, slot, created_at, winning_axis, type_key, \
     score_vector, ranked_order, comment, advice, affirmation, source FROM quick_results";

impl SqliteDiagnosisStore {
    pub fn new(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).ok();
        }
        let conn = Connection::open(&path)?;
        conn.execute_batch(&format!(
            "PRAGMA journal_mode=WAL; \
             PRAGMA synchronous=NORMAL; \
             CREATE TABLE IF NOT EXISTS daily_results ( \
               slot TEXT NOT NULL, \
               {RESULT_COLUMNS}, \
               PRIMARY KEY (user_id, date, slot) \
             ); \
             CREATE TABLE IF NOT EXISTS quick_results ( \
               id INTEGER PRIMARY KEY AUTOINCREMENT, \
               slot TEXT, \
               {RESULT_COLUMNS} \
             ); \
             CREATE INDEX IF NOT EXISTS idx_quick_results_user ON quick_results(user_id, created_at);"
        ))?;

        Ok(Self {
            path,
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn with_conn<F, R>(&self, f: F) -> Result<R, StoreError>
    where
        F: FnOnce(&Connection) -> Result<R, StoreError>,
    {
        let guard = self.conn.lock().map_err(|_| StoreError::Poisoned)?;
        f(&guard)
    }

    async fn blocking<F, R>(&self, f: F) -> Result<R, StoreError>
    where
        F: FnOnce(&Connection) -> Result<R, StoreError> + Send + 'static,
        R: Send + 'static,
    {
        let store = self.clone();
        tokio::task::spawn_blocking(move || store.with_conn(f))
            .await
            .map_err(|e| StoreError::Join(e.to_string()))?
    }

    /// Write every stored result as one JSON object per line, oldest first.
    /// Returns the number of rows written.
    pub async fn export_jsonl(&self, path: impl AsRef<Path>) -> Result<usize, StoreError> {
        let path = path.as_ref().to_path_buf();
        self.blocking(move |conn| {
            use std::io::Write;

            let sql = format!("{SELECT_DAILY} UNION ALL {SELECT_QUICK} ORDER BY 5 ASC");
            let mut stmt = conn.prepare(&sql)?;
            let mut rows = stmt.query([])?;
            let mut file = std::io::BufWriter::new(std::fs::File::create(path)?);
            let mut written = 0usize;
            while let Some(row) = rows.next()? {
                let record = row_to_record(row)?;
                let line = serde_json::to_string(&record).map_err(|e| StoreError::Serde(e.to_string()))?;
                writeln!(file, "{line}")?;
                written += 1;
            }
            file.flush()?;
            Ok(written)
        })
        .await
    }
}

/// Owned column values for one insert.
struct RecordParams {
    user_id: String,
    date: String,
    slot: Option<String>,
    created_at: i64,
    winning_axis: Option<String>,
    type_key: Option<String>,
    score_vector: String,
    ranked_order: String,
    comment: String,
    advice: String,
    affirmation: String,
    source: String,
}

impl RecordParams {
    fn from_record(record: &DiagnosisRecord) -> Result<Self, StoreError> {
        Ok(Self {
            user_id: record.user_id.clone(),
            date: record.date.to_string(),
            slot: record.slot.map(|s| s.as_str().to_string()),
            created_at: record.created_at.timestamp_millis(),
            winning_axis: record.winning_axis.map(|a| a.symbol().to_string()),
            type_key: record.type_key.map(|k| k.as_str().to_string()),
            score_vector: to_json(&record.score_vector)?,
            ranked_order: to_json(&record.ranked_order)?,
            comment: record.comment.clone(),
            advice: record.advice.clone(),
            affirmation: record.affirmation.clone(),
            source: record.source.as_str().to_string(),
        })
    }
}

fn to_json<T: Serialize>(value: &T) -> Result<String, StoreError> {
    serde_json::to_string(value).map_err(|e| StoreError::Serde(e.to_string()))
}

fn row_to_record(row: &Row<'_>) -> Result<DiagnosisRecord, StoreError> {
    let bad = |what: &str, raw: &str| StoreError::Serde(format!("unrecognized {what} `{raw}`"));

    let flow_raw: String = row.get(0)?;
    let flow = Flow::parse(&flow_raw).ok_or_else(|| bad("flow", &flow_raw))?;

    let date_raw: String = row.get(2)?;
    let date = NaiveDate::parse_from_str(&date_raw, "%Y-%m-%d").map_err(|_| bad("date", &date_raw))?;

    let slot = match row.get::<_, Option<String>>(3)? {
        Some(raw) => Some(Slot::parse(&raw).ok_or_else(|| bad("slot", &raw))?),
        None => None,
    };

    let created_ms: i64 = row.get(4)?;
    let created_at =
        DateTime::<Utc>::from_timestamp_millis(created_ms).ok_or_else(|| bad("timestamp", &created_ms.to_string()))?;

    let winning_axis = match row.get::<_, Option<String>>(5)? {
        Some(raw) => Some(Axis::parse(&raw).ok_or_else(|| bad("axis", &raw))?),
        None => None,
    };
    let type_key = match row.get::<_, Option<String>>(6)? {
        Some(raw) => Some(TypeKey::parse(&raw).ok_or_else(|| bad("type key", &raw))?),
        None => None,
    };

    let score_raw: String = row.get(7)?;
    let score_vector = serde_json::from_str(&score_raw).map_err(|e| StoreError::Serde(e.to_string()))?;
    let order_raw: String = row.get(8)?;
    let ranked_order = serde_json::from_str(&order_raw).map_err(|e| StoreError::Serde(e.to_string()))?;

    let source_raw: String = row.get(12)?;
    let source = CopySource::parse(&source_raw).ok_or_else(|| bad("source", &source_raw))?;

    Ok(DiagnosisRecord {
        user_id: row.get(1)?,
        flow,
        date,
        slot,
        created_at,
        winning_axis,
        type_key,
        score_vector,
        ranked_order,
        comment: row.get(9)?,
        advice: row.get(10)?,
        affirmation: row.get(11)?,
        source,
    })
}

#[async_trait]
impl DiagnosisStore for SqliteDiagnosisStore {
    async fn upsert_daily(&self, record: &DiagnosisRecord) -> Result<(), StoreError> {
        if record.flow != Flow::Daily {
            return Err(StoreError::InvalidRecord("upsert_daily expects a daily record".into()));
        }
        if record.slot.is_none() {
            return Err(StoreError::InvalidRecord("daily record has no slot".into()));
        }
        let p = RecordParams::from_record(record)?;
        self.blocking(move |conn| {
            conn.execute(
                "INSERT INTO daily_results ( \
                    user_id, date, slot, created_at, winning_axis, type_key, \
                    score_vector, ranked_order, comment, advice, affirmation, source \
                 ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12) \
                 ON CONFLICT(user_id, date, slot) DO UPDATE SET \
                    created_at = excluded.created_at, \
                    winning_axis = excluded.winning_axis, \
                    type_key = excluded.type_key, \
                    score_vector = excluded.score_vector, \
                    ranked_order = excluded.ranked_order, \
                    comment = excluded.comment, \
                    advice = excluded.advice, \
                    affirmation = excluded.affirmation, \
                    source = excluded.source",
                params![
                    p.user_id,
                    p.date,
                    p.slot,
                    p.created_at,
                    p.winning_axis,
                    p.type_key,
                    p.score_vector,
                    p.ranked_order,
                    p.comment,
                    p.advice,
                    p.affirmation,
                    p.source,
                ],
            )?;
            Ok(())
        })
        .await
    }

    async fn append_quick(&self, record: &DiagnosisRecord) -> Result<(), StoreError> {
        if record.flow != Flow::Quick {
            return Err(StoreError::InvalidRecord("append_quick expects a quick record".into()));
        }
        let p = RecordParams::from_record(record)?;
        self.blocking(move |conn| {
            conn.execute(
                "INSERT INTO quick_results ( \
                    user_id, date, slot, created_at, winning_axis, type_key, \
                    score_vector, ranked_order, comment, advice, affirmation, source \
                 ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
                params![
                    p.user_id,
                    p.date,
                    p.slot,
                    p.created_at,
                    p.winning_axis,
                    p.type_key,
                    p.score_vector,
                    p.ranked_order,
                    p.comment,
                    p.advice,
                    p.affirmation,
                    p.source,
                ],
            )?;
            Ok(())
        })
        .await
    }

    async fn history(&self, user_id: &str, limit: usize) -> Result<Vec<DiagnosisRecord>, StoreError> {
        let user_id = user_id.to_string();
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        self.blocking(move |conn| {
            let sql = format!(
                "{SELECT_DAILY} WHERE user_id = ?1 UNION ALL {SELECT_QUICK} WHERE user_id = ?1 \
                 ORDER BY 5 DESC LIMIT ?2"
            );
            let mut stmt = conn.prepare(&sql)?;
            let mut rows = stmt.query(params![user_id, limit])?;
            let mut out = Vec::new();
            while let Some(row) = rows.next()? {
                out.push(row_to_record(row)?);
            }
            Ok(out)
        })
        .await
    }

    async fn daily(
        &self,
        user_id: &str,
        date: NaiveDate,
        slot: Slot,
    ) -> Result<Option<DiagnosisRecord>, StoreError> {
        let user_id = user_id.to_string();
        self.blocking(move |conn| {
            let sql = format!("{SELECT_DAILY} WHERE user_id = ?1 AND date = ?2 AND slot = ?3");
            let mut stmt = conn.prepare(&sql)?;
            let mut rows = stmt.query(params![user_id, date.to_string(), slot.as_str()])?;
            match rows.next()? {
                Some(row) => Ok(Some(row_to_record(row)?)),
                None => Ok(None),
            }
        })
        .await
    }
}
