//! LibSQL storage backend implementation
//!
//! Persists evaluation records and per-owner settings in libSQL (local file,
//! in-memory, or remote Turso database). Timestamps are stored as fixed-width
//! RFC 3339 strings in UTC so that lexical order matches time order.

use crate::error::{EvalError, Result};
use crate::storage::{ListQuery, StorageBackend};
use crate::types::{EvaluationId, EvaluationRecord, EvaluationSettings, OwnerId, RunPolicy};
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use libsql::{params, Builder, Connection, Database};
use tracing::{debug, info};

/// Embedded migrations, applied in order and tracked in `_migrations_applied`
const MIGRATIONS: &[(&str, &str)] = &[(
    "001_initial_schema.sql",
    include_str!("../../migrations/001_initial_schema.sql"),
)];

const EVALUATION_COLUMNS: &str = "id, owner_id, interaction_id, prompt, response, score, \
     latency_ms, flags, pii_tokens_redacted, created_at";

/// Database connection mode
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionMode {
    /// Local file-based database
    Local(String),
    /// In-memory database (for testing)
    InMemory,
    /// Remote database (Turso Cloud)
    Remote { url: String, token: String },
}

impl ConnectionMode {
    /// Pick a mode from a database location string
    ///
    /// - `":memory:"` → InMemory
    /// - `"libsql://..."` / `"https://..."` → Remote (token required)
    /// - anything else → local file path
    pub fn from_location(location: &str, token: Option<String>) -> Result<Self> {
        if location == ":memory:" {
            return Ok(ConnectionMode::InMemory);
        }
        if location.starts_with("libsql://") || location.starts_with("https://") {
            let token = token.filter(|t| !t.is_empty()).ok_or_else(|| {
                EvalError::Other(format!("Auth token required for remote database {}", location))
            })?;
            return Ok(ConnectionMode::Remote {
                url: location.to_string(),
                token,
            });
        }
        Ok(ConnectionMode::Local(location.to_string()))
    }
}

pub(crate) fn encode_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn decode_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| EvalError::Store(format!("Invalid timestamp '{}': {}", raw, e)))
}

/// LibSQL storage backend
pub struct LibsqlStorage {
    #[allow(dead_code)]
    db: Database,
    conn: Connection,
}

impl LibsqlStorage {
    /// Open (creating if needed) a database and run migrations
    ///
    /// # Example
    /// ```ignore
    /// let storage = LibsqlStorage::new(ConnectionMode::Local("evals.db".into())).await?;
    /// ```
    pub async fn new(mode: ConnectionMode) -> Result<Self> {
        info!("Connecting to LibSQL database: {}", describe(&mode));

        let db = match &mode {
            ConnectionMode::Local(path) => {
                if let Some(parent) = std::path::Path::new(path).parent() {
                    if !parent.as_os_str().is_empty() && !parent.exists() {
                        std::fs::create_dir_all(parent).map_err(|e| {
                            EvalError::Store(format!(
                                "Failed to create database directory {}: {}",
                                parent.display(),
                                e
                            ))
                        })?;
                    }
                }
                Builder::new_local(path).build().await.map_err(|e| {
                    EvalError::Store(format!("Failed to create local database: {}", e))
                })?
            }
            ConnectionMode::InMemory => Builder::new_local(":memory:")
                .build()
                .await
                .map_err(|e| {
                    EvalError::Store(format!("Failed to create in-memory database: {}", e))
                })?,
            ConnectionMode::Remote { url, token } => {
                Builder::new_remote(url.clone(), token.clone())
                    .build()
                    .await
                    .map_err(|e| {
                        EvalError::Store(format!("Failed to create remote database: {}", e))
                    })?
            }
        };

        // A single connection is shared; for :memory: every new connection
        // would see a different empty database.
        let conn = db
            .connect()
            .map_err(|e| EvalError::Store(format!("Failed to get connection: {}", e)))?;

        let storage = Self { db, conn };
        storage.run_migrations().await?;
        Ok(storage)
    }

    /// Convenience constructor for an in-memory database
    pub async fn in_memory() -> Result<Self> {
        Self::new(ConnectionMode::InMemory).await
    }

    /// Run embedded migrations that have not been applied yet
    pub async fn run_migrations(&self) -> Result<()> {
        debug!("Running database migrations...");

        self.conn
            .execute(
                "CREATE TABLE IF NOT EXISTS _migrations_applied (
                    migration_name TEXT PRIMARY KEY,
                    applied_at INTEGER NOT NULL
                )",
                (),
            )
            .await
            .map_err(|e| {
                EvalError::Migration(format!("Failed to create migrations table: {}", e))
            })?;

        for (name, sql) in MIGRATIONS {
            let mut rows = self
                .conn
                .query(
                    "SELECT COUNT(*) FROM _migrations_applied WHERE migration_name = ?1",
                    params![*name],
                )
                .await?;

            let already_applied = match rows.next().await? {
                Some(row) => row.get::<i64>(0)?,
                None => 0,
            };

            if already_applied > 0 {
                debug!("Skipping already applied migration: {}", name);
                continue;
            }

            self.conn.execute_batch(sql).await.map_err(|e| {
                EvalError::Migration(format!("Failed to execute {}: {}", name, e))
            })?;

            self.conn
                .execute(
                    "INSERT INTO _migrations_applied (migration_name, applied_at) VALUES (?1, ?2)",
                    params![*name, Utc::now().timestamp()],
                )
                .await
                .map_err(|e| EvalError::Migration(format!("Failed to record migration: {}", e)))?;

            info!("Executed migration: {}", name);
        }

        Ok(())
    }

    /// Check the database answers a trivial query
    pub async fn check_database_health(&self) -> Result<()> {
        self.conn
            .query("SELECT 1", ())
            .await
            .map_err(|e| EvalError::Store(format!("Database health check failed: {}", e)))?;
        Ok(())
    }

    fn row_to_evaluation(row: &libsql::Row) -> Result<EvaluationRecord> {
        let flags_raw: String = row.get(7)?;
        let flags: Vec<String> = serde_json::from_str(&flags_raw)?;

        let latency_ms = u64::try_from(row.get::<i64>(6)?)
            .map_err(|_| EvalError::Store("Negative latency_ms in store".to_string()))?;
        let pii_tokens_redacted = u32::try_from(row.get::<i64>(8)?)
            .map_err(|_| EvalError::Store("pii_tokens_redacted out of range".to_string()))?;

        let created_raw: String = row.get(9)?;

        Ok(EvaluationRecord {
            id: EvaluationId(row.get(0)?),
            owner_id: OwnerId(row.get(1)?),
            interaction_id: row.get(2)?,
            prompt: row.get(3)?,
            response: row.get(4)?,
            score: row.get(5)?,
            latency_ms,
            flags,
            pii_tokens_redacted,
            created_at: decode_timestamp(&created_raw)?,
        })
    }
}

fn describe(mode: &ConnectionMode) -> String {
    match mode {
        ConnectionMode::Local(path) => format!("local file {}", path),
        ConnectionMode::InMemory => "in-memory".to_string(),
        // never log the token
        ConnectionMode::Remote { url, .. } => format!("remote {}", url),
    }
}

fn range_params(query: &ListQuery) -> (Option<String>, Option<String>) {
    (
        query.created_from.as_ref().map(encode_timestamp),
        query.created_to.as_ref().map(encode_timestamp),
    )
}

#[async_trait]
impl StorageBackend for LibsqlStorage {
    async fn insert_evaluation(&self, record: &EvaluationRecord) -> Result<()> {
        debug!(
            "Inserting evaluation {} for owner {}",
            record.id, record.owner_id
        );

        let latency_ms = i64::try_from(record.latency_ms)
            .map_err(|_| EvalError::Store("latency_ms exceeds storage range".to_string()))?;

        self.conn
            .execute(
                &format!(
                    "INSERT INTO evaluations ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                    EVALUATION_COLUMNS
                ),
                params![
                    record.id.as_str(),
                    record.owner_id.as_str(),
                    record.interaction_id.as_str(),
                    record.prompt.as_str(),
                    record.response.as_str(),
                    record.score,
                    latency_ms,
                    serde_json::to_string(&record.flags)?,
                    i64::from(record.pii_tokens_redacted),
                    encode_timestamp(&record.created_at),
                ],
            )
            .await?;

        Ok(())
    }

    async fn get_evaluation(
        &self,
        owner: &OwnerId,
        id: &EvaluationId,
    ) -> Result<Option<EvaluationRecord>> {
        let mut rows = self
            .conn
            .query(
                &format!(
                    "SELECT {} FROM evaluations WHERE id = ?1 AND owner_id = ?2",
                    EVALUATION_COLUMNS
                ),
                params![id.as_str(), owner.as_str()],
            )
            .await?;

        match rows.next().await? {
            Some(row) => Ok(Some(Self::row_to_evaluation(&row)?)),
            None => Ok(None),
        }
    }

    async fn list_evaluations(
        &self,
        owner: &OwnerId,
        query: &ListQuery,
    ) -> Result<Vec<EvaluationRecord>> {
        let (from, to) = range_params(query);
        // SQLite treats a negative LIMIT as unbounded
        let limit = query
            .limit
            .map(|l| i64::try_from(l).unwrap_or(i64::MAX))
            .unwrap_or(-1);
        let offset = i64::try_from(query.offset).unwrap_or(i64::MAX);
        let order = query.order.as_sql();

        let sql = format!(
            "SELECT {columns} FROM evaluations
             WHERE owner_id = ?1
               AND (?2 IS NULL OR created_at >= ?2)
               AND (?3 IS NULL OR created_at < ?3)
             ORDER BY created_at {order}, id {order}
             LIMIT ?4 OFFSET ?5",
            columns = EVALUATION_COLUMNS,
            order = order,
        );

        let mut rows = self
            .conn
            .query(&sql, params![owner.as_str(), from, to, limit, offset])
            .await?;

        let mut records = Vec::new();
        while let Some(row) = rows.next().await? {
            records.push(Self::row_to_evaluation(&row)?);
        }

        debug!(
            "Listed {} evaluations for owner {} (offset {}, limit {:?})",
            records.len(),
            owner,
            query.offset,
            query.limit
        );
        Ok(records)
    }

    async fn count_evaluations(&self, owner: &OwnerId, query: &ListQuery) -> Result<u64> {
        let (from, to) = range_params(query);
        let mut rows = self
            .conn
            .query(
                "SELECT COUNT(*) FROM evaluations
                 WHERE owner_id = ?1
                   AND (?2 IS NULL OR created_at >= ?2)
                   AND (?3 IS NULL OR created_at < ?3)",
                params![owner.as_str(), from, to],
            )
            .await?;

        let count = match rows.next().await? {
            Some(row) => row.get::<i64>(0)?,
            None => 0,
        };
        Ok(u64::try_from(count).unwrap_or(0))
    }

    async fn get_settings(&self, owner: &OwnerId) -> Result<Option<EvaluationSettings>> {
        let mut rows = self
            .conn
            .query(
                "SELECT run_policy, sample_rate_pct, obfuscate_pii, max_eval_per_day
                 FROM evaluation_settings WHERE owner_id = ?1",
                params![owner.as_str()],
            )
            .await?;

        let Some(row) = rows.next().await? else {
            return Ok(None);
        };

        let run_policy: String = row.get(0)?;
        let run_policy: RunPolicy = run_policy.parse().map_err(EvalError::Store)?;
        let sample_rate_pct = u8::try_from(row.get::<i64>(1)?)
            .map_err(|_| EvalError::Store("sample_rate_pct out of range".to_string()))?;
        let max_eval_per_day = u32::try_from(row.get::<i64>(3)?)
            .map_err(|_| EvalError::Store("max_eval_per_day out of range".to_string()))?;

        Ok(Some(EvaluationSettings {
            run_policy,
            sample_rate_pct,
            obfuscate_pii: row.get::<i64>(2)? != 0,
            max_eval_per_day,
        }))
    }

    async fn upsert_settings(
        &self,
        owner: &OwnerId,
        settings: &EvaluationSettings,
    ) -> Result<EvaluationSettings> {
        self.conn
            .execute(
                "INSERT INTO evaluation_settings (
                    owner_id, run_policy, sample_rate_pct, obfuscate_pii,
                    max_eval_per_day, updated_at
                 ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                 ON CONFLICT(owner_id) DO UPDATE SET
                    run_policy = excluded.run_policy,
                    sample_rate_pct = excluded.sample_rate_pct,
                    obfuscate_pii = excluded.obfuscate_pii,
                    max_eval_per_day = excluded.max_eval_per_day,
                    updated_at = excluded.updated_at",
                params![
                    owner.as_str(),
                    settings.run_policy.to_string(),
                    i64::from(settings.sample_rate_pct),
                    i64::from(settings.obfuscate_pii),
                    i64::from(settings.max_eval_per_day),
                    encode_timestamp(&Utc::now()),
                ],
            )
            .await?;

        info!("Saved evaluation settings for owner {}", owner);
        Ok(settings.clone())
    }

    async fn check_health(&self) -> Result<()> {
        self.check_database_health().await
    }
}
