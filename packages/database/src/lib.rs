#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! `SQLite` document store for safety reviews and users.
//!
//! Uses `switchy_database` for all database operations. Reviews carry their
//! like/dislike membership as JSON arrays next to the derived counters, and
//! an R-tree virtual table kept in sync by triggers indexes their locations
//! for the nearby query.

pub mod password;
pub mod reviews;
pub mod users;

use std::path::Path;

use chrono::{DateTime, SecondsFormat, Utc};
use moosicbox_json_utils::database::ToValue as _;
use safe_route_database_models::InvalidFieldError;
use switchy_database::Database;
use switchy_database_connection::init_sqlite_rusqlite;
use thiserror::Error;

/// Default path for the document store.
pub const DEFAULT_DB_PATH: &str = "data/safe_route.db";

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

/// Errors from document store operations.
#[derive(Debug, Error)]
pub enum DbError {
    /// A database query or command failed.
    #[error("Database error: {0}")]
    Database(#[from] switchy_database::DatabaseError),

    /// The database could not be opened.
    #[error("Failed to open database: {0}")]
    Open(String),

    /// A stored value could not be converted to its model type.
    #[error("Data conversion error: {message}")]
    Conversion {
        /// Description of what went wrong.
        message: String,
    },

    /// Input was missing or malformed.
    #[error("Validation error: {0}")]
    Validation(String),

    /// The addressed entity does not exist.
    #[error("{entity} {id} not found")]
    NotFound {
        /// Kind of entity ("review", "user").
        entity: &'static str,
        /// The requested id.
        id: i64,
    },

    /// The caller does not own the review it tried to change.
    #[error("User {user_id} does not own review {review_id}")]
    NotOwner {
        /// The review being changed.
        review_id: i64,
        /// The caller.
        user_id: i64,
    },

    /// A uniqueness rule or concurrent writer prevented the change.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// JSON serialization/deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// An I/O operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A password could not be hashed.
    #[error("Password hashing error: {0}")]
    PasswordHash(#[from] bcrypt::BcryptError),
}

impl From<InvalidFieldError> for DbError {
    fn from(value: InvalidFieldError) -> Self {
        Self::Validation(value.to_string())
    }
}

// ---------------------------------------------------------------------------
// Database lifecycle
// ---------------------------------------------------------------------------

/// Opens (or creates) the document store at `path` and ensures the schema
/// exists.
///
/// # Errors
///
/// Returns [`DbError`] if the file cannot be created, the database cannot be
/// opened, or schema creation fails.
pub async fn open_db(path: &Path) -> Result<Box<dyn Database>, DbError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let db = init_sqlite_rusqlite(Some(path)).map_err(|e| DbError::Open(e.to_string()))?;

    ensure_schema(db.as_ref()).await?;

    log::info!("Opened document store at {}", path.display());

    Ok(db)
}

/// Creates all tables, indexes and triggers if they don't already exist.
///
/// # Errors
///
/// Returns [`DbError`] if any DDL statement fails.
pub async fn ensure_schema(db: &dyn Database) -> Result<(), DbError> {
    db.exec_raw("PRAGMA foreign_keys = ON").await?;

    db.exec_raw(
        "CREATE TABLE IF NOT EXISTS users (
            id                  INTEGER PRIMARY KEY AUTOINCREMENT,
            name                TEXT NOT NULL,
            email               TEXT NOT NULL UNIQUE,
            password_hash       TEXT NOT NULL,
            emergency_contacts  TEXT NOT NULL DEFAULT '[]',
            created_at          TEXT NOT NULL
        )",
    )
    .await?;

    db.exec_raw(
        "CREATE TABLE IF NOT EXISTS reviews (
            id           INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id      INTEGER NOT NULL REFERENCES users(id),
            route_name   TEXT NOT NULL,
            content      TEXT NOT NULL,
            rating       INTEGER NOT NULL CHECK (rating BETWEEN 1 AND 5),
            longitude    REAL NOT NULL CHECK (longitude BETWEEN -180 AND 180),
            latitude     REAL NOT NULL CHECK (latitude BETWEEN -90 AND 90),
            likes        INTEGER NOT NULL DEFAULT 0,
            dislikes     INTEGER NOT NULL DEFAULT 0,
            liked_by     TEXT NOT NULL DEFAULT '[]',
            disliked_by  TEXT NOT NULL DEFAULT '[]',
            version      INTEGER NOT NULL DEFAULT 0,
            created_at   TEXT NOT NULL
        )",
    )
    .await?;

    db.exec_raw(
        "CREATE INDEX IF NOT EXISTS idx_reviews_created
         ON reviews (created_at)",
    )
    .await?;

    db.exec_raw(
        "CREATE VIRTUAL TABLE IF NOT EXISTS reviews_rtree USING rtree(
            id,
            min_lng, max_lng,
            min_lat, max_lat
        )",
    )
    .await?;

    db.exec_raw(
        "CREATE TRIGGER IF NOT EXISTS reviews_rtree_insert
         AFTER INSERT ON reviews
         BEGIN
            INSERT INTO reviews_rtree (id, min_lng, max_lng, min_lat, max_lat)
            VALUES (NEW.id, NEW.longitude, NEW.longitude, NEW.latitude, NEW.latitude);
         END",
    )
    .await?;

    db.exec_raw(
        "CREATE TRIGGER IF NOT EXISTS reviews_rtree_delete
         AFTER DELETE ON reviews
         BEGIN
            DELETE FROM reviews_rtree WHERE id = OLD.id;
         END",
    )
    .await?;

    Ok(())
}

// ---------------------------------------------------------------------------
// Row helpers
// ---------------------------------------------------------------------------

/// Formats a timestamp for storage. Fixed-width UTC so text ordering matches
/// time ordering.
fn format_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(value: &str) -> Result<DateTime<Utc>, DbError> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| DbError::Conversion {
            message: format!("Invalid timestamp {value:?}: {e}"),
        })
}

/// Reads a required integer column.
fn read_i64(row: &switchy_database::Row, name: &str) -> Result<i64, DbError> {
    row.to_value(name).map_err(|e| DbError::Conversion {
        message: format!("Failed to read column {name}: {e}"),
    })
}

/// Reads a required real column.
fn read_f64(row: &switchy_database::Row, name: &str) -> Result<f64, DbError> {
    row.to_value(name).map_err(|e| DbError::Conversion {
        message: format!("Failed to read column {name}: {e}"),
    })
}

/// Reads a required text column.
fn read_string(row: &switchy_database::Row, name: &str) -> Result<String, DbError> {
    row.to_value(name).map_err(|e| DbError::Conversion {
        message: format!("Failed to read column {name}: {e}"),
    })
}

/// Extracts the `id` of the first row returned by a `RETURNING id` clause.
fn returning_id(rows: &[switchy_database::Row]) -> Result<i64, DbError> {
    let row = rows.first().ok_or_else(|| DbError::Conversion {
        message: "INSERT returned no id".to_string(),
    })?;
    read_i64(row, "id")
}

/// Maps a unique constraint violation to [`DbError::Conflict`].
fn unique_violation(error: switchy_database::DatabaseError, message: &str) -> DbError {
    if error.to_string().contains("UNIQUE constraint failed") {
        DbError::Conflict(message.to_string())
    } else {
        DbError::Database(error)
    }
}
