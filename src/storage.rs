//! Storage module - SQLite database operations

use crate::error::{Error, Result};
use crate::models::*;
use crate::validation::validate_mode;
use chrono::{NaiveDate, NaiveTime, Timelike, Weekday};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::{debug, warn};

/// Weekday flag columns, Sunday first
const DAY_COLUMNS: [&str; 7] = ["sun", "mon", "tue", "wed", "thu", "fri", "sat"];

/// Read side of rule storage used by conflict checks and the resolver
pub trait RuleStore {
    /// Every rule of `table`, in storage order
    fn load_all_rules(&self, table: Table) -> Result<Vec<Rule>>;

    fn load_rule(&self, table: Table, id: u32) -> Result<Option<Rule>>;

    /// Active turn on rules set for `weekday`, ordered by time of day, each
    /// paired with the date `offset_days` after `today`
    fn load_turn_on_candidates(
        &self,
        weekday: Weekday,
        today: NaiveDate,
        offset_days: u32,
    ) -> Result<Vec<Candidate>>;

    fn load_config(&self) -> Result<Config>;
}

pub struct Database {
    conn: Mutex<Connection>,
}

/// Row shape shared by both rule tables before field decoding
struct RuleRow {
    id: i64,
    name: String,
    time: String,
    days: [bool; 7],
    active: bool,
    mode: i64,
}

impl Database {
    /// Open or create database at path
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;
        Self::with_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        let db = Self {
            conn: Mutex::new(conn),
        };
        db.run_migrations()?;
        Ok(db)
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Run database migrations
    fn run_migrations(&self) -> Result<()> {
        let conn = self.conn();
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS rules_turnon (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                rule_name TEXT NOT NULL,
                rule_time TEXT NOT NULL,
                sun INTEGER NOT NULL DEFAULT 0,
                mon INTEGER NOT NULL DEFAULT 0,
                tue INTEGER NOT NULL DEFAULT 0,
                wed INTEGER NOT NULL DEFAULT 0,
                thu INTEGER NOT NULL DEFAULT 0,
                fri INTEGER NOT NULL DEFAULT 0,
                sat INTEGER NOT NULL DEFAULT 0,
                active INTEGER NOT NULL DEFAULT 1
            );

            CREATE TABLE IF NOT EXISTS rules_turnoff (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                rule_name TEXT NOT NULL,
                rule_time TEXT NOT NULL,
                sun INTEGER NOT NULL DEFAULT 0,
                mon INTEGER NOT NULL DEFAULT 0,
                tue INTEGER NOT NULL DEFAULT 0,
                wed INTEGER NOT NULL DEFAULT 0,
                thu INTEGER NOT NULL DEFAULT 0,
                fri INTEGER NOT NULL DEFAULT 0,
                sat INTEGER NOT NULL DEFAULT 0,
                active INTEGER NOT NULL DEFAULT 1,
                mode INTEGER NOT NULL DEFAULT 4
            );

            CREATE TABLE IF NOT EXISTS settings (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS custom_schedule (
                id INTEGER PRIMARY KEY CHECK (id = 1),
                hour INTEGER NOT NULL,
                minutes INTEGER NOT NULL,
                day INTEGER NOT NULL,
                month INTEGER NOT NULL,
                year INTEGER NOT NULL,
                mode INTEGER NOT NULL
            );
        "#,
        )?;
        Ok(())
    }

    // === Rule CRUD ===

    /// Insert a rule and return the id assigned by SQLite
    pub fn insert_rule(&self, rule: &Rule) -> Result<u32> {
        let conn = self.conn();
        let d = &rule.days.0;
        match rule.table {
            Table::TurnOn => conn.execute(
                "INSERT INTO rules_turnon (rule_name, rule_time, sun, mon, tue, wed, thu, fri, sat, active)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                params![
                    rule.name,
                    rule.time_text(),
                    d[0], d[1], d[2], d[3], d[4], d[5], d[6],
                    rule.active,
                ],
            )?,
            Table::TurnOff => conn.execute(
                "INSERT INTO rules_turnoff (rule_name, rule_time, sun, mon, tue, wed, thu, fri, sat, active, mode)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
                params![
                    rule.name,
                    rule.time_text(),
                    d[0], d[1], d[2], d[3], d[4], d[5], d[6],
                    rule.active,
                    rule.mode.as_i64(),
                ],
            )?,
        };
        let id = conn.last_insert_rowid();
        u32::try_from(id).map_err(|_| Error::CorruptRow(format!("rule id {id} out of range")))
    }

    /// Update a persisted rule; false when no row has `rule.id`
    pub fn update_rule(&self, rule: &Rule) -> Result<bool> {
        let conn = self.conn();
        let d = &rule.days.0;
        let changed = match rule.table {
            Table::TurnOn => conn.execute(
                "UPDATE rules_turnon SET rule_name=?2, rule_time=?3,
                    sun=?4, mon=?5, tue=?6, wed=?7, thu=?8, fri=?9, sat=?10, active=?11
                 WHERE id=?1",
                params![
                    rule.id,
                    rule.name,
                    rule.time_text(),
                    d[0], d[1], d[2], d[3], d[4], d[5], d[6],
                    rule.active,
                ],
            )?,
            Table::TurnOff => conn.execute(
                "UPDATE rules_turnoff SET rule_name=?2, rule_time=?3,
                    sun=?4, mon=?5, tue=?6, wed=?7, thu=?8, fri=?9, sat=?10, active=?11, mode=?12
                 WHERE id=?1",
                params![
                    rule.id,
                    rule.name,
                    rule.time_text(),
                    d[0], d[1], d[2], d[3], d[4], d[5], d[6],
                    rule.active,
                    rule.mode.as_i64(),
                ],
            )?,
        };
        Ok(changed > 0)
    }

    pub fn delete_rule(&self, table: Table, id: u32) -> Result<bool> {
        let conn = self.conn();
        let sql = format!("DELETE FROM {} WHERE id = ?1", table.sql_name());
        Ok(conn.execute(&sql, params![id])? > 0)
    }

    pub fn set_rule_active(&self, table: Table, id: u32, active: bool) -> Result<bool> {
        let conn = self.conn();
        let sql = format!("UPDATE {} SET active = ?2 WHERE id = ?1", table.sql_name());
        Ok(conn.execute(&sql, params![id, active])? > 0)
    }

    fn select_rules_sql(table: Table) -> String {
        // Turn on rows have no mode column; read a constant so both decode alike
        let mode = match table {
            Table::TurnOn => "0",
            Table::TurnOff => "mode",
        };
        format!(
            "SELECT id, rule_name, rule_time, sun, mon, tue, wed, thu, fri, sat, active, {mode}
             FROM {}",
            table.sql_name()
        )
    }

    fn read_rule_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<RuleRow> {
        let mut days = [false; 7];
        for (i, day) in days.iter_mut().enumerate() {
            *day = row.get(3 + i)?;
        }
        Ok(RuleRow {
            id: row.get(0)?,
            name: row.get(1)?,
            time: row.get(2)?,
            days,
            active: row.get(10)?,
            mode: row.get(11)?,
        })
    }

    fn decode_rule(table: Table, row: RuleRow) -> Result<Rule> {
        let id = u32::try_from(row.id)
            .map_err(|_| Error::CorruptRow(format!("{table} rule id {}", row.id)))?;
        let time = parse_rule_time(&row.time)
            .ok_or_else(|| Error::CorruptRow(format!("{table} rule {id} time {:?}", row.time)))?;
        let mode = validate_mode(table, row.mode)
            .map_err(|_| Error::CorruptRow(format!("{table} rule {id} mode {}", row.mode)))?;

        Ok(Rule {
            id,
            name: row.name,
            hour: time.hour() as u8,
            minute: time.minute() as u8,
            days: Days(row.days),
            active: row.active,
            table,
            mode,
        })
    }

    // === Settings ===

    pub fn save_config(&self, config: &Config) -> Result<()> {
        let conn = self.conn();
        let pairs = [
            ("use_local_time", config.use_local_time.to_string()),
            ("default_mode", config.default_mode.rtcwake_name().to_string()),
            ("shutdown_on_failure", config.shutdown_on_failure.to_string()),
        ];

        for (key, value) in pairs {
            conn.execute(
                "INSERT OR REPLACE INTO settings (key, value) VALUES (?1, ?2)",
                params![key, value],
            )?;
        }
        Ok(())
    }

    // === Custom schedule ===

    pub fn save_custom_schedule(&self, request: &WakeRequest) -> Result<()> {
        let conn = self.conn();
        conn.execute(
            "INSERT OR REPLACE INTO custom_schedule (id, hour, minutes, day, month, year, mode)
             VALUES (1, ?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                request.hour,
                request.minute,
                request.day,
                request.month,
                request.year,
                request.mode.as_i64(),
            ],
        )?;
        Ok(())
    }

    pub fn load_custom_schedule(&self) -> Result<Option<WakeRequest>> {
        let conn = self.conn();
        let row = conn
            .query_row(
                "SELECT hour, minutes, day, month, year, mode FROM custom_schedule WHERE id = 1",
                [],
                |row| {
                    Ok((
                        row.get::<_, u8>(0)?,
                        row.get::<_, u8>(1)?,
                        row.get::<_, u32>(2)?,
                        row.get::<_, u32>(3)?,
                        row.get::<_, i32>(4)?,
                        row.get::<_, i64>(5)?,
                    ))
                },
            )
            .optional()?;

        let Some((hour, minute, day, month, year, mode)) = row else {
            return Ok(None);
        };
        let mode = Mode::try_from(mode)
            .map_err(|_| Error::CorruptRow(format!("custom schedule mode {mode}")))?;
        Ok(Some(WakeRequest {
            hour,
            minute,
            day,
            month,
            year,
            mode,
            found: true,
            shutdown_fail: false,
        }))
    }
}

impl RuleStore for Database {
    fn load_all_rules(&self, table: Table) -> Result<Vec<Rule>> {
        let conn = self.conn();
        let sql = format!("{} ORDER BY id", Self::select_rules_sql(table));
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map([], Self::read_rule_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        let rules = rows
            .into_iter()
            .map(|row| Self::decode_rule(table, row))
            .collect::<Result<Vec<_>>>()?;
        debug!(%table, count = rules.len(), "Loaded rules");
        Ok(rules)
    }

    fn load_rule(&self, table: Table, id: u32) -> Result<Option<Rule>> {
        let conn = self.conn();
        let sql = format!("{} WHERE id = ?1", Self::select_rules_sql(table));
        let row = conn
            .query_row(&sql, params![id], Self::read_rule_row)
            .optional()?;
        row.map(|row| Self::decode_rule(table, row)).transpose()
    }

    fn load_turn_on_candidates(
        &self,
        weekday: Weekday,
        today: NaiveDate,
        offset_days: u32,
    ) -> Result<Vec<Candidate>> {
        let conn = self.conn();
        // Column name comes from a fixed table, never from input
        let sql = format!(
            "SELECT id, rule_time, date(?1, ?2) FROM rules_turnon
             WHERE {} = 1 AND active = 1
             ORDER BY time(rule_time) ASC",
            DAY_COLUMNS[weekday.num_days_from_sunday() as usize]
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(
                params![
                    today.format("%Y-%m-%d").to_string(),
                    format!("+{offset_days} day")
                ],
                |row| {
                    Ok((
                        row.get::<_, i64>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                    ))
                },
            )?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        rows.into_iter()
            .map(|(id, time, date)| {
                let rule_id = u32::try_from(id)
                    .map_err(|_| Error::CorruptRow(format!("turn_on rule id {id}")))?;
                let time = parse_rule_time(&time).ok_or_else(|| {
                    Error::CorruptRow(format!("turn_on rule {rule_id} time {time:?}"))
                })?;
                let date = NaiveDate::parse_from_str(&date, "%Y-%m-%d")
                    .map_err(|e| Error::CorruptRow(format!("candidate date {date:?}: {e}")))?;
                Ok(Candidate {
                    rule_id,
                    hour: time.hour() as u8,
                    minute: time.minute() as u8,
                    date,
                })
            })
            .collect()
    }

    fn load_config(&self) -> Result<Config> {
        let conn = self.conn();
        let mut stmt = conn.prepare("SELECT key, value FROM settings")?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;

        let mut config = Config::default();
        for row in rows {
            let (key, value) = row?;
            match key.as_str() {
                "use_local_time" => match value.parse() {
                    Ok(flag) => config.use_local_time = flag,
                    Err(_) => warn!(%value, "Ignoring malformed use_local_time setting"),
                },
                "default_mode" => match value.parse() {
                    Ok(mode) => config.default_mode = mode,
                    Err(_) => warn!(%value, "Ignoring unknown default_mode setting"),
                },
                "shutdown_on_failure" => match value.parse() {
                    Ok(flag) => config.shutdown_on_failure = flag,
                    Err(_) => warn!(%value, "Ignoring malformed shutdown_on_failure setting"),
                },
                _ => {}
            }
        }
        Ok(config)
    }
}

/// Parse `HH:MM` or `HH:MM:SS` as stored in `rule_time`
fn parse_rule_time(text: &str) -> Option<NaiveTime> {
    NaiveTime::parse_from_str(text, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(text, "%H:%M"))
        .ok()
}
