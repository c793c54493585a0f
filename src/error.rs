//! Error types shared by validation, storage and scheduling

use crate::models::Table;
use std::fmt;
use thiserror::Error;

/// Rule field that failed validation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleField {
    Name,
    Hour,
    Minute,
    Mode,
}

/// Wake request field that failed validation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WakeField {
    Hour,
    Minute,
    Date,
    Year,
    Mode,
}

impl fmt::Display for RuleField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            RuleField::Name => "name",
            RuleField::Hour => "hour",
            RuleField::Minute => "minute",
            RuleField::Mode => "mode",
        })
    }
}

impl fmt::Display for WakeField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            WakeField::Hour => "hour",
            WakeField::Minute => "minute",
            WakeField::Date => "date",
            WakeField::Year => "year",
            WakeField::Mode => "mode",
        })
    }
}

fn join<T: fmt::Display>(fields: &[T]) -> String {
    fields
        .iter()
        .map(|f| f.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid rule values: {}", join(.0))]
    InvalidRule(Vec<RuleField>),

    #[error("Invalid table: {0}")]
    InvalidTable(i64),

    #[error("Invalid mode: {0}")]
    InvalidMode(i64),

    #[error("Unknown {kind}: {value}")]
    UnknownName { kind: &'static str, value: String },

    #[error("Invalid wake request: {}", join(.0))]
    InvalidWakeRequest(Vec<WakeField>),

    #[error("Time conflicts with {table} rule {id}")]
    Conflict { table: Table, id: u32 },

    #[error("No {table} rule with id {id}")]
    RuleNotFound { table: Table, id: u32 },

    #[error("Database error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("Corrupt row: {0}")]
    CorruptRow(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Field level problems the caller can fix by changing input
    pub fn is_invalid_input(&self) -> bool {
        matches!(
            self,
            Error::InvalidRule(_)
                | Error::InvalidTable(_)
                | Error::InvalidMode(_)
                | Error::UnknownName { .. }
                | Error::InvalidWakeRequest(_)
        )
    }

    pub fn is_collaborator_failure(&self) -> bool {
        matches!(self, Error::Storage(_) | Error::CorruptRow(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
