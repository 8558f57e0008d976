//! Storage layer for pet points.
//!
//! Implements every `pp-core` storage contract on top of `rusqlite`.
//!
//! # Thread Safety
//!
//! The [`Database`] type wraps a `rusqlite::Connection`, which is `Send` but not `Sync`.
//! Several processes may open the same file: units of work run under
//! `BEGIN IMMEDIATE`, so writers to the same daily score row are serialized by
//! SQLite itself, waiting up to the configured busy timeout.
//!
//! # Schema
//!
//! ## Timestamp Format
//!
//! Timestamps are stored as TEXT in RFC 3339 format with nanosecond precision and a
//! `Z` suffix (e.g., `2025-06-10T12:00:00.000000000Z`). The width is fixed, so
//! lexicographic ordering matches chronological ordering. Logical days are stored as `YYYY-MM-DD`.
//!
//! ## Directory Tables
//!
//! `pets`, `groups`, `group_members`, `pet_access`, `group_access`, and
//! `user_settings` hold the facts the scoring engine asks about but never writes.
//! They are seeded through the `add_*` and `grant_*` methods.

use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::path::Path;
use std::time::Duration;

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use pp_core::{
    Behavior, BehaviorDraft, BehaviorId, BehaviorLog, CatalogStore, DailyScore, Directory,
    GroupId, GroupInfo, GroupShare, LogFilter, LogId, LogStore, PetId, PetInfo,
    PetOfTheDayWinner, ScoreFilter, ScoreStore, Species, Store, TimezoneSettings, UserId,
    ValidationError, WinnerStore,
};
use rusqlite::types::Value;
use rusqlite::{Connection, OptionalExtension, Row, params, params_from_iter};
use thiserror::Error;

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Database errors.
#[derive(Debug, Error)]
pub enum DbError {
    /// An error from the underlying database.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    /// Failed to parse a stored timestamp.
    #[error("invalid timestamp in {table}: {value}")]
    TimestampParse {
        table: &'static str,
        value: String,
        #[source]
        source: chrono::ParseError,
    },
    /// Failed to parse a stored logical day.
    #[error("invalid date in {table}: {value}")]
    DateParse {
        table: &'static str,
        value: String,
        #[source]
        source: chrono::ParseError,
    },
    /// A stored value no longer passes domain validation.
    #[error("invalid value in {table}: {message}")]
    InvalidValue {
        table: &'static str,
        message: String,
    },
}

impl DbError {
    fn invalid(table: &'static str, err: impl fmt::Display) -> Self {
        Self::InvalidValue {
            table,
            message: err.to_string(),
        }
    }
}

/// Database connection wrapper.
///
/// See the [module documentation](self) for thread safety considerations.
pub struct Database {
    conn: Connection,
}

/// Row counts reported by `pp status`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TableCounts {
    pub behaviors: i64,
    pub pets: i64,
    pub groups: i64,
    pub logs: i64,
    pub scores: i64,
    pub winners: i64,
}

impl Database {
    /// Opens a database at the given path, creating it if necessary.
    ///
    /// The database schema is automatically initialized on first open.
    pub fn open(path: &Path) -> Result<Self, DbError> {
        let conn = Connection::open(path)?;
        let db = Self { conn };
        db.init()?;
        Ok(db)
    }

    /// Opens an in-memory database.
    ///
    /// Useful for testing. The database is destroyed when the connection closes.
    pub fn open_in_memory() -> Result<Self, DbError> {
        let conn = Connection::open_in_memory()?;
        let db = Self { conn };
        db.init()?;
        Ok(db)
    }

    /// How long to wait for another writer before failing with `SQLITE_BUSY`.
    pub fn set_busy_timeout(&self, timeout: Duration) -> Result<(), DbError> {
        self.conn.busy_timeout(timeout)?;
        Ok(())
    }

    /// Initializes the database schema.
    ///
    /// This is idempotent - safe to call on an already-initialized database.
    fn init(&self) -> Result<(), DbError> {
        self.conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        self.conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS behaviors (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                category TEXT NOT NULL,
                point_value INTEGER NOT NULL,
                min_interval_minutes INTEGER NOT NULL,
                species TEXT NOT NULL,
                active INTEGER NOT NULL DEFAULT 1
            );

            CREATE TABLE IF NOT EXISTS pets (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                species TEXT NOT NULL,
                owner_id TEXT NOT NULL,
                owner_name TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_pets_owner ON pets(owner_id);

            CREATE TABLE IF NOT EXISTS groups (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                created_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS group_members (
                group_id TEXT NOT NULL,
                pet_id TEXT NOT NULL,
                PRIMARY KEY (group_id, pet_id),
                FOREIGN KEY (group_id) REFERENCES groups(id) ON DELETE CASCADE,
                FOREIGN KEY (pet_id) REFERENCES pets(id) ON DELETE CASCADE
            );

            CREATE TABLE IF NOT EXISTS pet_access (
                user_id TEXT NOT NULL,
                pet_id TEXT NOT NULL,
                PRIMARY KEY (user_id, pet_id),
                FOREIGN KEY (pet_id) REFERENCES pets(id) ON DELETE CASCADE
            );

            CREATE TABLE IF NOT EXISTS group_access (
                user_id TEXT NOT NULL,
                group_id TEXT NOT NULL,
                PRIMARY KEY (user_id, group_id),
                FOREIGN KEY (group_id) REFERENCES groups(id) ON DELETE CASCADE
            );

            CREATE TABLE IF NOT EXISTS user_settings (
                user_id TEXT PRIMARY KEY,
                timezone TEXT NOT NULL,
                reset_time TEXT NOT NULL,
                language TEXT NOT NULL,
                theme TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            -- logged_at: when the behavior happened; created_at: when it was recorded
            CREATE TABLE IF NOT EXISTS behavior_logs (
                id TEXT PRIMARY KEY,
                pet_id TEXT NOT NULL,
                behavior_id TEXT NOT NULL,
                user_id TEXT NOT NULL,
                points_awarded INTEGER NOT NULL,
                logged_at TEXT NOT NULL,
                created_at TEXT NOT NULL,
                notes TEXT,
                FOREIGN KEY (pet_id) REFERENCES pets(id),
                FOREIGN KEY (behavior_id) REFERENCES behaviors(id)
            );

            CREATE INDEX IF NOT EXISTS idx_behavior_logs_pet_behavior
                ON behavior_logs(pet_id, behavior_id, logged_at);
            CREATE INDEX IF NOT EXISTS idx_behavior_logs_logged_at ON behavior_logs(logged_at);

            CREATE TABLE IF NOT EXISTS log_group_shares (
                id TEXT PRIMARY KEY,
                log_id TEXT NOT NULL,
                group_id TEXT NOT NULL,
                created_at TEXT NOT NULL,
                UNIQUE (log_id, group_id),
                FOREIGN KEY (log_id) REFERENCES behavior_logs(id) ON DELETE CASCADE,
                FOREIGN KEY (group_id) REFERENCES groups(id) ON DELETE CASCADE
            );

            CREATE INDEX IF NOT EXISTS idx_log_group_shares_group ON log_group_shares(group_id);

            CREATE TABLE IF NOT EXISTS daily_scores (
                pet_id TEXT NOT NULL,
                group_id TEXT NOT NULL,
                date TEXT NOT NULL,
                total_points INTEGER NOT NULL DEFAULT 0,
                positive_behaviors INTEGER NOT NULL DEFAULT 0,
                negative_behaviors INTEGER NOT NULL DEFAULT 0,
                last_activity_at TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                PRIMARY KEY (pet_id, group_id, date)
            );

            CREATE INDEX IF NOT EXISTS idx_daily_scores_group_date ON daily_scores(group_id, date);

            CREATE TABLE IF NOT EXISTS pet_of_the_day (
                id TEXT PRIMARY KEY,
                group_id TEXT NOT NULL,
                date TEXT NOT NULL,
                pet_id TEXT NOT NULL,
                final_score INTEGER NOT NULL,
                positive_behaviors INTEGER NOT NULL,
                negative_behaviors INTEGER NOT NULL,
                created_at TEXT NOT NULL,
                UNIQUE (group_id, date, pet_id)
            );
            ",
        )?;
        Ok(())
    }

    // ========== Directory seeding ==========

    /// Registers a pet. Pets are either dogs or cats.
    pub fn add_pet(
        &mut self,
        pet_id: &PetId,
        name: &str,
        species: Species,
        owner_id: &UserId,
        owner_name: &str,
    ) -> Result<(), DbError> {
        if species == Species::Both {
            return Err(DbError::invalid("pets", "a pet must be a dog or a cat"));
        }
        self.conn.execute(
            "INSERT INTO pets (id, name, species, owner_id, owner_name) VALUES (?, ?, ?, ?, ?)",
            params![
                pet_id.as_str(),
                name,
                species.as_str(),
                owner_id.as_str(),
                owner_name
            ],
        )?;
        Ok(())
    }

    pub fn add_group(
        &mut self,
        group_id: &GroupId,
        name: &str,
        now: DateTime<Utc>,
    ) -> Result<(), DbError> {
        self.conn.execute(
            "INSERT INTO groups (id, name, created_at) VALUES (?, ?, ?)",
            params![group_id.as_str(), name, format_timestamp(now)],
        )?;
        Ok(())
    }

    /// Adds a pet to a group, ignoring duplicates.
    pub fn add_member(&mut self, group_id: &GroupId, pet_id: &PetId) -> Result<(), DbError> {
        self.conn.execute(
            "INSERT OR IGNORE INTO group_members (group_id, pet_id) VALUES (?, ?)",
            params![group_id.as_str(), pet_id.as_str()],
        )?;
        Ok(())
    }

    /// Lets a user other than the owner log for a pet, ignoring duplicates.
    pub fn grant_pet_access(&mut self, user_id: &UserId, pet_id: &PetId) -> Result<(), DbError> {
        self.conn.execute(
            "INSERT OR IGNORE INTO pet_access (user_id, pet_id) VALUES (?, ?)",
            params![user_id.as_str(), pet_id.as_str()],
        )?;
        Ok(())
    }

    /// Lets a user post to and view a group, ignoring duplicates.
    pub fn grant_group_access(
        &mut self,
        user_id: &UserId,
        group_id: &GroupId,
    ) -> Result<(), DbError> {
        self.conn.execute(
            "INSERT OR IGNORE INTO group_access (user_id, group_id) VALUES (?, ?)",
            params![user_id.as_str(), group_id.as_str()],
        )?;
        Ok(())
    }

    /// Creates or replaces a user's settings. Values are stored as given.
    pub fn save_settings(
        &mut self,
        user_id: &UserId,
        settings: &TimezoneSettings,
        now: DateTime<Utc>,
    ) -> Result<(), DbError> {
        self.conn.execute(
            "
            INSERT INTO user_settings (user_id, timezone, reset_time, language, theme, updated_at)
            VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT(user_id) DO UPDATE SET
                timezone = excluded.timezone,
                reset_time = excluded.reset_time,
                language = excluded.language,
                theme = excluded.theme,
                updated_at = excluded.updated_at
            ",
            params![
                user_id.as_str(),
                settings.timezone,
                settings.reset_time,
                settings.language,
                settings.theme.as_str(),
                format_timestamp(now),
            ],
        )?;
        Ok(())
    }

    /// Counts rows in the main tables.
    pub fn counts(&self) -> Result<TableCounts, DbError> {
        let count = |table: &str| -> Result<i64, DbError> {
            let sql = format!("SELECT COUNT(*) FROM {table}");
            Ok(self.conn.query_row(&sql, [], |row| row.get(0))?)
        };
        Ok(TableCounts {
            behaviors: count("behaviors")?,
            pets: count("pets")?,
            groups: count("groups")?,
            logs: count("behavior_logs")?,
            scores: count("daily_scores")?,
            winners: count("pet_of_the_day")?,
        })
    }

    fn shares_for(&self, log_id: &str) -> Result<Vec<GroupShare>, DbError> {
        let mut stmt = self.conn.prepare(
            "
            SELECT id, group_id, created_at
            FROM log_group_shares
            WHERE log_id = ?
            ORDER BY rowid ASC
            ",
        )?;
        let rows = stmt.query_map([log_id], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
            ))
        })?;
        let mut shares = Vec::new();
        for row in rows {
            let (id, group_id, created_at) = row?;
            shares.push(GroupShare {
                id,
                group_id: GroupId::new(group_id)
                    .map_err(|e| DbError::invalid("log_group_shares", e))?,
                created_at: parse_timestamp(&created_at, "log_group_shares")?,
            });
        }
        Ok(shares)
    }

    fn hydrate_logs(&self, rows: Vec<LogRow>) -> Result<Vec<BehaviorLog>, DbError> {
        rows.into_iter()
            .map(|row| {
                let shares = self.shares_for(&row.id)?;
                row.into_log(shares)
            })
            .collect()
    }

    fn exists(&self, sql: &str, params: impl rusqlite::Params) -> Result<bool, DbError> {
        Ok(self.conn.query_row(sql, params, |row| row.get(0))?)
    }
}

impl Store for Database {
    type Error = DbError;

    fn atomically<T, E, F>(&mut self, f: F) -> Result<Result<T, E>, Self::Error>
    where
        F: FnOnce(&mut Self) -> Result<T, E>,
    {
        self.conn.execute_batch("BEGIN IMMEDIATE")?;
        let result = match panic::catch_unwind(AssertUnwindSafe(|| f(&mut *self))) {
            Ok(result) => result,
            Err(payload) => {
                // Leave the connection usable for whoever catches the panic.
                if let Err(err) = self.conn.execute_batch("ROLLBACK") {
                    tracing::warn!(%err, "failed to roll back after a panic");
                }
                panic::resume_unwind(payload);
            }
        };
        if result.is_ok() {
            if let Err(err) = self.conn.execute_batch("COMMIT") {
                self.conn.execute_batch("ROLLBACK")?;
                return Err(err.into());
            }
        } else {
            self.conn.execute_batch("ROLLBACK")?;
            tracing::debug!("rolled back unit of work");
        }
        Ok(result)
    }
}

struct BehaviorRow {
    id: String,
    name: String,
    category: String,
    point_value: i32,
    min_interval_minutes: i64,
    species: String,
    active: bool,
}

impl BehaviorRow {
    const COLUMNS: &'static str =
        "id, name, category, point_value, min_interval_minutes, species, active";

    fn read(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            name: row.get(1)?,
            category: row.get(2)?,
            point_value: row.get(3)?,
            min_interval_minutes: row.get(4)?,
            species: row.get(5)?,
            active: row.get(6)?,
        })
    }

    fn into_behavior(self) -> Result<Behavior, DbError> {
        let invalid = |e: ValidationError| DbError::invalid("behaviors", e);
        let draft = BehaviorDraft {
            name: self.name,
            category: self.category.parse().map_err(invalid)?,
            point_value: self.point_value,
            min_interval_minutes: self.min_interval_minutes,
            species: self.species.parse().map_err(invalid)?,
            active: self.active,
        };
        let id = BehaviorId::new(self.id).map_err(invalid)?;
        Behavior::new(id, draft).map_err(invalid)
    }
}

impl Database {
    fn query_behaviors(
        &self,
        filter: &str,
        params: impl rusqlite::Params,
    ) -> Result<Vec<Behavior>, DbError> {
        let sql = format!(
            "SELECT {} FROM behaviors {filter} ORDER BY id ASC",
            BehaviorRow::COLUMNS
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params, BehaviorRow::read)?;
        let mut behaviors = Vec::new();
        for row in rows {
            behaviors.push(row?.into_behavior()?);
        }
        Ok(behaviors)
    }
}

impl CatalogStore for Database {
    fn behavior(&self, id: &BehaviorId) -> Result<Option<Behavior>, Self::Error> {
        Ok(self
            .query_behaviors("WHERE id = ?", [id.as_str()])?
            .into_iter()
            .next())
    }

    fn all_behaviors(&self) -> Result<Vec<Behavior>, Self::Error> {
        self.query_behaviors("", [])
    }

    fn active_behaviors(&self) -> Result<Vec<Behavior>, Self::Error> {
        self.query_behaviors("WHERE active = 1", [])
    }

    fn behaviors_for_species(&self, species: Species) -> Result<Vec<Behavior>, Self::Error> {
        self.query_behaviors(
            "WHERE active = 1 AND (species = ? OR species = 'both')",
            [species.as_str()],
        )
    }

    fn insert_behavior(&mut self, behavior: &Behavior) -> Result<(), Self::Error> {
        self.conn.execute(
            "
            INSERT INTO behaviors (id, name, category, point_value, min_interval_minutes, species, active)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            ",
            params![
                behavior.id().as_str(),
                behavior.name(),
                behavior.category().as_str(),
                behavior.point_value(),
                behavior.min_interval_minutes(),
                behavior.species().as_str(),
                behavior.is_active(),
            ],
        )?;
        Ok(())
    }

    fn update_behavior(&mut self, behavior: &Behavior) -> Result<bool, Self::Error> {
        let changed = self.conn.execute(
            "
            UPDATE behaviors
            SET name = ?, category = ?, point_value = ?, min_interval_minutes = ?, species = ?, active = ?
            WHERE id = ?
            ",
            params![
                behavior.name(),
                behavior.category().as_str(),
                behavior.point_value(),
                behavior.min_interval_minutes(),
                behavior.species().as_str(),
                behavior.is_active(),
                behavior.id().as_str(),
            ],
        )?;
        Ok(changed > 0)
    }
}

struct LogRow {
    id: String,
    pet_id: String,
    behavior_id: String,
    user_id: String,
    points_awarded: i32,
    logged_at: String,
    created_at: String,
    notes: Option<String>,
}

impl LogRow {
    const COLUMNS: &'static str =
        "id, pet_id, behavior_id, user_id, points_awarded, logged_at, created_at, notes";

    fn read(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            pet_id: row.get(1)?,
            behavior_id: row.get(2)?,
            user_id: row.get(3)?,
            points_awarded: row.get(4)?,
            logged_at: row.get(5)?,
            created_at: row.get(6)?,
            notes: row.get(7)?,
        })
    }

    fn into_log(self, group_shares: Vec<GroupShare>) -> Result<BehaviorLog, DbError> {
        let invalid = |e: ValidationError| DbError::invalid("behavior_logs", e);
        Ok(BehaviorLog {
            id: LogId::new(self.id).map_err(invalid)?,
            pet_id: PetId::new(self.pet_id).map_err(invalid)?,
            behavior_id: BehaviorId::new(self.behavior_id).map_err(invalid)?,
            user_id: UserId::new(self.user_id).map_err(invalid)?,
            points_awarded: self.points_awarded,
            logged_at: parse_timestamp(&self.logged_at, "behavior_logs")?,
            created_at: parse_timestamp(&self.created_at, "behavior_logs")?,
            notes: self.notes,
            group_shares,
        })
    }
}

impl LogStore for Database {
    fn insert_log(&mut self, log: &BehaviorLog) -> Result<(), Self::Error> {
        let sp = self.conn.savepoint()?;
        sp.execute(
            "
            INSERT INTO behavior_logs
            (id, pet_id, behavior_id, user_id, points_awarded, logged_at, created_at, notes)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            ",
            params![
                log.id.as_str(),
                log.pet_id.as_str(),
                log.behavior_id.as_str(),
                log.user_id.as_str(),
                log.points_awarded,
                format_timestamp(log.logged_at),
                format_timestamp(log.created_at),
                log.notes,
            ],
        )?;
        {
            let mut stmt = sp.prepare(
                "INSERT INTO log_group_shares (id, log_id, group_id, created_at) VALUES (?, ?, ?, ?)",
            )?;
            for share in &log.group_shares {
                stmt.execute(params![
                    share.id,
                    log.id.as_str(),
                    share.group_id.as_str(),
                    format_timestamp(share.created_at),
                ])?;
            }
        }
        sp.commit()?;
        Ok(())
    }

    fn log(&self, id: &LogId) -> Result<Option<BehaviorLog>, Self::Error> {
        let sql = format!("SELECT {} FROM behavior_logs WHERE id = ?", LogRow::COLUMNS);
        let row = self
            .conn
            .query_row(&sql, [id.as_str()], LogRow::read)
            .optional()?;
        row.map(|row| {
            let shares = self.shares_for(&row.id)?;
            row.into_log(shares)
        })
        .transpose()
    }

    fn last_logged_at(
        &self,
        pet_id: &PetId,
        behavior_id: &BehaviorId,
    ) -> Result<Option<DateTime<Utc>>, Self::Error> {
        let last: Option<String> = self.conn.query_row(
            "SELECT MAX(logged_at) FROM behavior_logs WHERE pet_id = ? AND behavior_id = ?",
            params![pet_id.as_str(), behavior_id.as_str()],
            |row| row.get(0),
        )?;
        last.map(|value| parse_timestamp(&value, "behavior_logs"))
            .transpose()
    }

    fn search_logs(&self, filter: &LogFilter) -> Result<Vec<BehaviorLog>, Self::Error> {
        let mut clauses = Vec::new();
        let mut values = Vec::new();
        if let Some(pet_id) = &filter.pet_id {
            clauses.push("pet_id = ?");
            values.push(Value::Text(pet_id.to_string()));
        }
        if let Some(behavior_id) = &filter.behavior_id {
            clauses.push("behavior_id = ?");
            values.push(Value::Text(behavior_id.to_string()));
        }
        if let Some(group_id) = &filter.group_id {
            clauses.push(
                "EXISTS (SELECT 1 FROM log_group_shares s WHERE s.log_id = behavior_logs.id AND s.group_id = ?)",
            );
            values.push(Value::Text(group_id.to_string()));
        }
        if let Some(user_id) = &filter.user_id {
            clauses.push("user_id = ?");
            values.push(Value::Text(user_id.to_string()));
        }
        if let Some(from) = filter.from {
            clauses.push("logged_at >= ?");
            values.push(Value::Text(format_timestamp(from)));
        }
        if let Some(until) = filter.until {
            clauses.push("logged_at < ?");
            values.push(Value::Text(format_timestamp(until)));
        }
        let where_clause = if clauses.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", clauses.join(" AND "))
        };
        // SQLite treats a negative LIMIT as no limit.
        let limit = filter
            .limit
            .map_or(-1, |limit| i64::try_from(limit).unwrap_or(i64::MAX));
        values.push(Value::Integer(limit));
        values.push(Value::Integer(
            i64::try_from(filter.offset).unwrap_or(i64::MAX),
        ));

        let sql = format!(
            "SELECT {} FROM behavior_logs {where_clause} ORDER BY logged_at DESC, id ASC LIMIT ? OFFSET ?",
            LogRow::COLUMNS
        );
        let rows = {
            let mut stmt = self.conn.prepare(&sql)?;
            let rows = stmt.query_map(params_from_iter(values), LogRow::read)?;
            rows.collect::<Result<Vec<_>, _>>()?
        };
        self.hydrate_logs(rows)
    }

    fn delete_log(&mut self, id: &LogId) -> Result<bool, Self::Error> {
        let deleted = self
            .conn
            .execute("DELETE FROM behavior_logs WHERE id = ?", [id.as_str()])?;
        Ok(deleted > 0)
    }

    fn insert_share(&mut self, log_id: &LogId, share: &GroupShare) -> Result<(), Self::Error> {
        self.conn.execute(
            "INSERT INTO log_group_shares (id, log_id, group_id, created_at) VALUES (?, ?, ?, ?)",
            params![
                share.id,
                log_id.as_str(),
                share.group_id.as_str(),
                format_timestamp(share.created_at),
            ],
        )?;
        Ok(())
    }

    fn delete_share(&mut self, log_id: &LogId, group_id: &GroupId) -> Result<bool, Self::Error> {
        let deleted = self.conn.execute(
            "DELETE FROM log_group_shares WHERE log_id = ? AND group_id = ?",
            params![log_id.as_str(), group_id.as_str()],
        )?;
        Ok(deleted > 0)
    }
}

struct ScoreRow {
    pet_id: String,
    group_id: String,
    date: String,
    total_points: i64,
    positive_behaviors: i64,
    negative_behaviors: i64,
    last_activity_at: Option<String>,
    created_at: String,
    updated_at: String,
}

impl ScoreRow {
    const COLUMNS: &'static str = "pet_id, group_id, date, total_points, positive_behaviors, \
         negative_behaviors, last_activity_at, created_at, updated_at";

    fn read(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            pet_id: row.get(0)?,
            group_id: row.get(1)?,
            date: row.get(2)?,
            total_points: row.get(3)?,
            positive_behaviors: row.get(4)?,
            negative_behaviors: row.get(5)?,
            last_activity_at: row.get(6)?,
            created_at: row.get(7)?,
            updated_at: row.get(8)?,
        })
    }

    fn into_score(self) -> Result<DailyScore, DbError> {
        let invalid = |e: ValidationError| DbError::invalid("daily_scores", e);
        Ok(DailyScore {
            pet_id: PetId::new(self.pet_id).map_err(invalid)?,
            group_id: GroupId::new(self.group_id).map_err(invalid)?,
            date: parse_date(&self.date, "daily_scores")?,
            total_points: self.total_points,
            positive_behaviors: self.positive_behaviors,
            negative_behaviors: self.negative_behaviors,
            last_activity_at: self
                .last_activity_at
                .map(|value| parse_timestamp(&value, "daily_scores"))
                .transpose()?,
            created_at: parse_timestamp(&self.created_at, "daily_scores")?,
            updated_at: parse_timestamp(&self.updated_at, "daily_scores")?,
        })
    }
}

impl ScoreStore for Database {
    fn get_or_create_score(
        &mut self,
        pet_id: &PetId,
        group_id: &GroupId,
        date: NaiveDate,
        now: DateTime<Utc>,
    ) -> Result<DailyScore, Self::Error> {
        let now = format_timestamp(now);
        let created = self.conn.execute(
            "
            INSERT OR IGNORE INTO daily_scores
            (pet_id, group_id, date, total_points, positive_behaviors, negative_behaviors, last_activity_at, created_at, updated_at)
            VALUES (?, ?, ?, 0, 0, 0, NULL, ?, ?)
            ",
            params![pet_id.as_str(), group_id.as_str(), format_date(date), now, now],
        )?;
        if created > 0 {
            tracing::debug!(pet = %pet_id, group = %group_id, %date, "created daily score row");
        }
        self.score(pet_id, group_id, date)?.ok_or_else(|| {
            DbError::invalid("daily_scores", "row vanished after insert")
        })
    }

    fn score(
        &self,
        pet_id: &PetId,
        group_id: &GroupId,
        date: NaiveDate,
    ) -> Result<Option<DailyScore>, Self::Error> {
        let sql = format!(
            "SELECT {} FROM daily_scores WHERE pet_id = ? AND group_id = ? AND date = ?",
            ScoreRow::COLUMNS
        );
        self.conn
            .query_row(
                &sql,
                params![pet_id.as_str(), group_id.as_str(), format_date(date)],
                ScoreRow::read,
            )
            .optional()?
            .map(ScoreRow::into_score)
            .transpose()
    }

    fn update_score(&mut self, score: &DailyScore) -> Result<(), Self::Error> {
        self.conn.execute(
            "
            UPDATE daily_scores
            SET total_points = ?, positive_behaviors = ?, negative_behaviors = ?,
                last_activity_at = ?, updated_at = ?
            WHERE pet_id = ? AND group_id = ? AND date = ?
            ",
            params![
                score.total_points,
                score.positive_behaviors,
                score.negative_behaviors,
                score.last_activity_at.map(format_timestamp),
                format_timestamp(score.updated_at),
                score.pet_id.as_str(),
                score.group_id.as_str(),
                format_date(score.date),
            ],
        )?;
        Ok(())
    }

    fn search_scores(&self, filter: &ScoreFilter) -> Result<Vec<DailyScore>, Self::Error> {
        let mut clauses = Vec::new();
        let mut values = Vec::new();
        if let Some(pet_id) = &filter.pet_id {
            clauses.push("pet_id = ?");
            values.push(pet_id.to_string());
        }
        if let Some(group_id) = &filter.group_id {
            clauses.push("group_id = ?");
            values.push(group_id.to_string());
        }
        if let Some(from) = filter.from {
            clauses.push("date >= ?");
            values.push(format_date(from));
        }
        if let Some(until) = filter.until {
            clauses.push("date <= ?");
            values.push(format_date(until));
        }
        let where_clause = if clauses.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", clauses.join(" AND "))
        };
        let sql = format!(
            "SELECT {} FROM daily_scores {where_clause} ORDER BY date ASC, pet_id ASC, group_id ASC",
            ScoreRow::COLUMNS
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(values), ScoreRow::read)?;
        let mut scores = Vec::new();
        for row in rows {
            scores.push(row?.into_score()?);
        }
        Ok(scores)
    }

    fn delete_score(
        &mut self,
        pet_id: &PetId,
        group_id: &GroupId,
        date: NaiveDate,
    ) -> Result<bool, Self::Error> {
        let deleted = self.conn.execute(
            "DELETE FROM daily_scores WHERE pet_id = ? AND group_id = ? AND date = ?",
            params![pet_id.as_str(), group_id.as_str(), format_date(date)],
        )?;
        Ok(deleted > 0)
    }
}

impl WinnerStore for Database {
    fn insert_winner(&mut self, winner: &PetOfTheDayWinner) -> Result<(), Self::Error> {
        self.conn.execute(
            "
            INSERT INTO pet_of_the_day
            (id, group_id, date, pet_id, final_score, positive_behaviors, negative_behaviors, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            ",
            params![
                winner.id,
                winner.group_id.as_str(),
                format_date(winner.date),
                winner.pet_id.as_str(),
                winner.final_score,
                winner.positive_behaviors,
                winner.negative_behaviors,
                format_timestamp(winner.created_at),
            ],
        )?;
        Ok(())
    }

    fn winners(
        &self,
        group_id: &GroupId,
        date: NaiveDate,
    ) -> Result<Vec<PetOfTheDayWinner>, Self::Error> {
        let mut stmt = self.conn.prepare(
            "
            SELECT id, pet_id, final_score, positive_behaviors, negative_behaviors, created_at
            FROM pet_of_the_day
            WHERE group_id = ? AND date = ?
            ORDER BY pet_id ASC
            ",
        )?;
        let rows = stmt.query_map(params![group_id.as_str(), format_date(date)], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, i64>(2)?,
                row.get::<_, i64>(3)?,
                row.get::<_, i64>(4)?,
                row.get::<_, String>(5)?,
            ))
        })?;
        let mut winners = Vec::new();
        for row in rows {
            let (id, pet_id, final_score, positive, negative, created_at) = row?;
            winners.push(PetOfTheDayWinner {
                id,
                group_id: group_id.clone(),
                date,
                pet_id: PetId::new(pet_id).map_err(|e| DbError::invalid("pet_of_the_day", e))?,
                final_score,
                positive_behaviors: positive,
                negative_behaviors: negative,
                created_at: parse_timestamp(&created_at, "pet_of_the_day")?,
            });
        }
        Ok(winners)
    }

    fn delete_winners(
        &mut self,
        group_id: &GroupId,
        date: NaiveDate,
    ) -> Result<usize, Self::Error> {
        Ok(self.conn.execute(
            "DELETE FROM pet_of_the_day WHERE group_id = ? AND date = ?",
            params![group_id.as_str(), format_date(date)],
        )?)
    }
}

impl Directory for Database {
    fn can_access_pet(&self, user_id: &UserId, pet_id: &PetId) -> Result<bool, Self::Error> {
        self.exists(
            "
            SELECT EXISTS (SELECT 1 FROM pets WHERE id = ?1 AND owner_id = ?2)
                OR EXISTS (SELECT 1 FROM pet_access WHERE pet_id = ?1 AND user_id = ?2)
            ",
            params![pet_id.as_str(), user_id.as_str()],
        )
    }

    fn can_access_group(
        &self,
        user_id: &UserId,
        group_id: &GroupId,
    ) -> Result<bool, Self::Error> {
        self.exists(
            "SELECT EXISTS (SELECT 1 FROM group_access WHERE user_id = ? AND group_id = ?)",
            params![user_id.as_str(), group_id.as_str()],
        )
    }

    fn is_pet_in_group(&self, pet_id: &PetId, group_id: &GroupId) -> Result<bool, Self::Error> {
        self.exists(
            "SELECT EXISTS (SELECT 1 FROM group_members WHERE pet_id = ? AND group_id = ?)",
            params![pet_id.as_str(), group_id.as_str()],
        )
    }

    fn pet_info(&self, pet_id: &PetId) -> Result<Option<PetInfo>, Self::Error> {
        let row = self
            .conn
            .query_row(
                "SELECT name, species, owner_name FROM pets WHERE id = ?",
                [pet_id.as_str()],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                    ))
                },
            )
            .optional()?;
        row.map(|(name, species, owner_name)| -> Result<PetInfo, DbError> {
            Ok(PetInfo {
                name,
                species: species.parse().map_err(|e| DbError::invalid("pets", e))?,
                owner_name,
            })
        })
        .transpose()
    }

    fn group_info(&self, group_id: &GroupId) -> Result<Option<GroupInfo>, Self::Error> {
        Ok(self
            .conn
            .query_row(
                "SELECT name FROM groups WHERE id = ?",
                [group_id.as_str()],
                |row| row.get(0),
            )
            .optional()?
            .map(|name| GroupInfo { name }))
    }

    fn timezone_settings(
        &self,
        user_id: &UserId,
    ) -> Result<Option<TimezoneSettings>, Self::Error> {
        let row = self
            .conn
            .query_row(
                "SELECT timezone, reset_time, language, theme FROM user_settings WHERE user_id = ?",
                [user_id.as_str()],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, String>(3)?,
                    ))
                },
            )
            .optional()?;
        row.map(
            |(timezone, reset_time, language, theme)| -> Result<TimezoneSettings, DbError> {
                Ok(TimezoneSettings {
                    timezone,
                    reset_time,
                    language,
                    theme: theme
                        .parse()
                        .map_err(|e| DbError::invalid("user_settings", e))?,
                })
            },
        )
        .transpose()
    }
}

fn parse_timestamp(value: &str, table: &'static str) -> Result<DateTime<Utc>, DbError> {
    DateTime::parse_from_rfc3339(value)
        .map(|parsed| parsed.with_timezone(&Utc))
        .map_err(|source| DbError::TimestampParse {
            table,
            value: value.to_string(),
            source,
        })
}

fn format_timestamp(timestamp: DateTime<Utc>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

fn parse_date(value: &str, table: &'static str) -> Result<NaiveDate, DbError> {
    NaiveDate::parse_from_str(value, DATE_FORMAT).map_err(|source| DbError::DateParse {
        table,
        value: value.to_string(),
        source,
    })
}

fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}
