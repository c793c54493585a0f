//! Validation module - Field checks for rules and resolved wake requests
//!
//! Every check runs even after an earlier one fails, so a single error
//! reports all offending fields.

use crate::error::{Error, Result, RuleField, WakeField};
use crate::models::{Mode, Rule, Table, WakeRequest, RULE_NAME_LENGTH};
use chrono::Datelike;
use tracing::{debug, warn};

/// Validate a single rule before it reaches storage
pub fn validate_rule(rule: &Rule) -> Result<()> {
    let mut failed = Vec::new();

    // Stored names live in a fixed byte buffer, so the limit is in bytes
    let name_length = rule.name.len();
    if name_length >= RULE_NAME_LENGTH {
        failed.push(RuleField::Name);
    }
    if rule.hour > 23 {
        failed.push(RuleField::Hour);
    }
    if rule.minute > 59 {
        failed.push(RuleField::Minute);
    }
    // Table and Mode are closed enums here. Their raw forms are checked by
    // validate_table and validate_mode where they are decoded.

    debug!(
        id = rule.id,
        name_length,
        hour = rule.hour,
        minute = rule.minute,
        table = %rule.table,
        mode = %rule.mode,
        "Rule validation"
    );

    if failed.is_empty() {
        Ok(())
    } else {
        warn!(?failed, "Invalid rule values");
        Err(Error::InvalidRule(failed))
    }
}

/// Decode a raw table selector; the array sizing sentinel is rejected
pub fn validate_table(raw: i64) -> Result<Table> {
    Table::try_from(raw).map_err(|e| {
        warn!(raw, "Invalid table");
        e
    })
}

/// Decode a raw mode for a rule of `table`.
///
/// Turn on rules ignore the mode, so any value is accepted and normalized
/// to the zero mode. Turn off rules need a value inside the enum range.
pub fn validate_mode(table: Table, raw: i64) -> Result<Mode> {
    match table {
        Table::TurnOn => Ok(Mode::default()),
        Table::TurnOff => Mode::try_from(raw).map_err(|_| {
            warn!(raw, "Invalid mode for turn off rule");
            Error::InvalidRule(vec![RuleField::Mode])
        }),
    }
}

/// Validate a resolved wake request against the calendar and `current_year`
pub fn validate_wake_request(request: &WakeRequest, current_year: i32) -> Result<()> {
    let mut failed = Vec::new();

    if request.hour > 23 {
        failed.push(WakeField::Hour);
    }
    if request.minute > 59 {
        failed.push(WakeField::Minute);
    }

    // The date must survive a round trip through the calendar
    let round_trips = request.date().is_some_and(|d| {
        d.day() == request.day && d.month() == request.month && d.year() == request.year
    });
    if !round_trips {
        failed.push(WakeField::Date);
    }

    if request.year > current_year + 1 {
        failed.push(WakeField::Year);
    }

    if !request.mode.is_actionable() {
        failed.push(WakeField::Mode);
    }

    if failed.is_empty() {
        Ok(())
    } else {
        warn!(?failed, ?request, "Invalid wake request");
        Err(Error::InvalidWakeRequest(failed))
    }
}
