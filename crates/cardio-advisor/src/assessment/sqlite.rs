//! SQLite-backed account and history storage.
//!
//! One connection guarded by a `Mutex`; a poisoned mutex panics.

use std::path::Path;
use std::sync::Mutex;

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, ErrorCode, OptionalExtension, Row};
use uuid::Uuid;

use super::advice::RiskTier;
use super::domain::{HistoryId, HistoryRecord, UserAccount, UserId};
use super::repository::{HistoryRepository, RepositoryError, UserRepository};

const SCHEMA: &str = r"
    CREATE TABLE IF NOT EXISTS users (
        id TEXT PRIMARY KEY,
        email TEXT NOT NULL UNIQUE,
        password_hash TEXT NOT NULL,
        name TEXT,
        created_at TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS history (
        id TEXT PRIMARY KEY,
        user_id TEXT NOT NULL,
        timestamp TEXT NOT NULL,
        model_name TEXT NOT NULL,
        model_version TEXT NOT NULL,
        probability REAL NOT NULL,
        label INTEGER NOT NULL,
        risk_tier TEXT NOT NULL,
        features_json TEXT NOT NULL,
        top_features_json TEXT NOT NULL,
        recommendations_json TEXT NOT NULL
    );

    CREATE INDEX IF NOT EXISTS idx_history_user_time ON history(user_id, timestamp);
";

pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, RepositoryError> {
        let conn = Connection::open(path).map_err(unavailable)?;
        Self::with_connection(conn)
    }

    pub fn in_memory() -> Result<Self, RepositoryError> {
        let conn = Connection::open_in_memory().map_err(unavailable)?;
        Self::with_connection(conn)
    }

    fn with_connection(conn: Connection) -> Result<Self, RepositoryError> {
        conn.execute_batch(SCHEMA).map_err(unavailable)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn connection(&self) -> std::sync::MutexGuard<'_, Connection> {
        self.conn.lock().expect("sqlite mutex poisoned")
    }
}

fn unavailable(err: rusqlite::Error) -> RepositoryError {
    RepositoryError::Unavailable(err.to_string())
}

fn corrupt(detail: impl std::fmt::Display) -> RepositoryError {
    RepositoryError::Unavailable(format!("corrupt row: {detail}"))
}

fn format_timestamp(value: DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(value: &str) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(corrupt)
}

fn parse_uuid(value: &str) -> Result<Uuid, RepositoryError> {
    Uuid::parse_str(value).map_err(corrupt)
}

struct UserRow {
    id: String,
    email: String,
    password_hash: String,
    name: Option<String>,
    created_at: String,
}

impl UserRow {
    fn read(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            email: row.get(1)?,
            password_hash: row.get(2)?,
            name: row.get(3)?,
            created_at: row.get(4)?,
        })
    }

    fn into_account(self) -> Result<UserAccount, RepositoryError> {
        Ok(UserAccount {
            id: UserId(parse_uuid(&self.id)?),
            email: self.email,
            password_hash: self.password_hash,
            name: self.name,
            created_at: parse_timestamp(&self.created_at)?,
        })
    }
}

const USER_COLUMNS: &str = "id, email, password_hash, name, created_at";

impl UserRepository for SqliteStore {
    fn insert(&self, account: UserAccount) -> Result<UserAccount, RepositoryError> {
        let conn = self.connection();
        let result = conn.execute(
            "INSERT INTO users (id, email, password_hash, name, created_at) VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                account.id.to_string(),
                account.email,
                account.password_hash,
                account.name,
                format_timestamp(account.created_at),
            ],
        );

        match result {
            Ok(_) => Ok(account),
            Err(rusqlite::Error::SqliteFailure(err, _))
                if err.code == ErrorCode::ConstraintViolation =>
            {
                Err(RepositoryError::Conflict)
            }
            Err(err) => Err(unavailable(err)),
        }
    }

    fn find_by_email(&self, email: &str) -> Result<Option<UserAccount>, RepositoryError> {
        let conn = self.connection();
        let row = conn
            .query_row(
                &format!("SELECT {USER_COLUMNS} FROM users WHERE email = ?1"),
                params![email],
                UserRow::read,
            )
            .optional()
            .map_err(unavailable)?;
        row.map(UserRow::into_account).transpose()
    }

    fn find_by_id(&self, id: &UserId) -> Result<Option<UserAccount>, RepositoryError> {
        let conn = self.connection();
        let row = conn
            .query_row(
                &format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1"),
                params![id.to_string()],
                UserRow::read,
            )
            .optional()
            .map_err(unavailable)?;
        row.map(UserRow::into_account).transpose()
    }
}

struct HistoryRow {
    id: String,
    user_id: String,
    timestamp: String,
    model_name: String,
    model_version: String,
    probability: f64,
    label: bool,
    features_json: String,
    top_features_json: String,
    recommendations_json: String,
}

impl HistoryRow {
    fn read(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            user_id: row.get(1)?,
            timestamp: row.get(2)?,
            model_name: row.get(3)?,
            model_version: row.get(4)?,
            probability: row.get(5)?,
            label: row.get(6)?,
            features_json: row.get(7)?,
            top_features_json: row.get(8)?,
            recommendations_json: row.get(9)?,
        })
    }

    fn into_record(self) -> Result<HistoryRecord, RepositoryError> {
        Ok(HistoryRecord {
            id: HistoryId(parse_uuid(&self.id)?),
            user_id: UserId(parse_uuid(&self.user_id)?),
            timestamp: parse_timestamp(&self.timestamp)?,
            model_name: self.model_name,
            model_version: self.model_version,
            probability: self.probability,
            label: self.label,
            // The stored tier column is for ad-hoc queries; the record always re-derives it.
            risk_tier: RiskTier::from_probability(self.probability),
            features: serde_json::from_str(&self.features_json).map_err(corrupt)?,
            top_features: serde_json::from_str(&self.top_features_json).map_err(corrupt)?,
            recommendations: serde_json::from_str(&self.recommendations_json).map_err(corrupt)?,
        })
    }
}

impl HistoryRepository for SqliteStore {
    fn append(&self, record: HistoryRecord) -> Result<HistoryRecord, RepositoryError> {
        let features_json = serde_json::to_string(&record.features).map_err(corrupt)?;
        let top_features_json = serde_json::to_string(&record.top_features).map_err(corrupt)?;
        let recommendations_json =
            serde_json::to_string(&record.recommendations).map_err(corrupt)?;

        let conn = self.connection();
        let result = conn.execute(
            r"
            INSERT INTO history (
                id, user_id, timestamp, model_name, model_version, probability, label,
                risk_tier, features_json, top_features_json, recommendations_json
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
            ",
            params![
                record.id.to_string(),
                record.user_id.to_string(),
                format_timestamp(record.timestamp),
                record.model_name,
                record.model_version,
                record.probability,
                record.label,
                record.risk_tier.label(),
                features_json,
                top_features_json,
                recommendations_json,
            ],
        );

        match result {
            Ok(_) => Ok(record),
            Err(rusqlite::Error::SqliteFailure(err, _))
                if err.code == ErrorCode::ConstraintViolation =>
            {
                Err(RepositoryError::Conflict)
            }
            Err(err) => Err(unavailable(err)),
        }
    }

    fn for_user(
        &self,
        user_id: &UserId,
        limit: usize,
    ) -> Result<Vec<HistoryRecord>, RepositoryError> {
        let conn = self.connection();
        let mut stmt = conn
            .prepare(
                r"
                SELECT id, user_id, timestamp, model_name, model_version, probability, label,
                       features_json, top_features_json, recommendations_json
                FROM history
                WHERE user_id = ?1
                ORDER BY timestamp DESC, rowid DESC
                LIMIT ?2
                ",
            )
            .map_err(unavailable)?;

        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let rows = stmt
            .query_map(params![user_id.to_string(), limit], HistoryRow::read)
            .map_err(unavailable)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(unavailable)?;

        rows.into_iter().map(HistoryRow::into_record).collect()
    }
}
