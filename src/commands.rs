//! CLI commands - Command line <-> backend bridge

use crate::error::Result;
use crate::models::*;
use crate::rules::RulesManager;
use crate::scheduler::NextOccurrenceResolver;
use crate::storage::{Database, RuleStore};
use crate::validation::validate_table;
use chrono::{Datelike, Utc};
use clap::{Args, Subcommand};
use serde_json::{json, Value};

#[derive(Debug, Subcommand)]
pub enum Command {
    /// List the rules of a table
    List {
        #[arg(short, long, value_parser = parse_table)]
        table: Table,
    },
    /// Show one rule
    Show(RuleRef),
    /// Add a rule
    Add(RuleArgs),
    /// Replace every field of an existing rule
    Edit {
        #[arg(long)]
        id: u32,
        #[command(flatten)]
        rule: RuleArgs,
    },
    /// Delete a rule
    Delete(RuleRef),
    /// Enable a rule
    Enable(RuleRef),
    /// Disable a rule
    Disable(RuleRef),
    /// Resolve the next turn on occurrence
    Upcoming {
        /// Power mode, or `default` to use the configured one
        #[arg(short, long, default_value = "default", value_parser = parse_mode)]
        mode: Mode,
    },
    /// Store a one-off wake request
    Custom {
        /// YYYY-MM-DD
        #[arg(long, value_parser = parse_date)]
        date: (i32, u32, u32),
        /// HH:MM
        #[arg(long, value_parser = parse_time)]
        time: (u8, u8),
        #[arg(short, long, value_parser = parse_mode)]
        mode: Mode,
    },
    /// Read or change the scheduling configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Debug, Subcommand)]
pub enum ConfigAction {
    Show,
    Set {
        #[arg(long)]
        local_time: Option<bool>,
        #[arg(long, value_parser = parse_mode)]
        default_mode: Option<Mode>,
        #[arg(long)]
        shutdown_on_failure: Option<bool>,
    },
}

#[derive(Debug, Args)]
pub struct RuleRef {
    #[arg(short, long, value_parser = parse_table)]
    pub table: Table,
    #[arg(long)]
    pub id: u32,
}

#[derive(Debug, Args)]
pub struct RuleArgs {
    #[arg(short, long, value_parser = parse_table)]
    pub table: Table,
    #[arg(short, long)]
    pub name: String,
    /// HH:MM
    #[arg(long, value_parser = parse_time)]
    pub time: (u8, u8),
    /// Comma separated weekdays, `all` or `none`
    #[arg(short, long, value_parser = parse_days)]
    pub days: Days,
    /// Turn off rules only
    #[arg(short, long, value_parser = parse_mode, default_value = "off")]
    pub mode: Mode,
    #[arg(long)]
    pub inactive: bool,
}

impl RuleArgs {
    fn into_rule(self, id: u32) -> Rule {
        let (hour, minute) = self.time;
        Rule {
            id,
            name: self.name,
            hour,
            minute,
            days: self.days,
            active: !self.inactive,
            table: self.table,
            mode: self.mode,
        }
    }
}

fn parse_table(s: &str) -> std::result::Result<Table, String> {
    match s.parse::<i64>() {
        Ok(raw) => validate_table(raw).map_err(|e| e.to_string()),
        Err(_) => s.parse().map_err(|e: crate::error::Error| e.to_string()),
    }
}

pub fn parse_mode(s: &str) -> std::result::Result<Mode, String> {
    s.parse().map_err(|e: crate::error::Error| e.to_string())
}

fn parse_days(s: &str) -> std::result::Result<Days, String> {
    s.parse().map_err(|e: crate::error::Error| e.to_string())
}

/// Split `HH:MM` without range checks; ranges belong to rule validation
fn parse_time(s: &str) -> std::result::Result<(u8, u8), String> {
    let (hour, minute) = s
        .split_once(':')
        .ok_or_else(|| format!("expected HH:MM, got {s:?}"))?;
    let hour = hour.trim().parse().map_err(|_| format!("bad hour in {s:?}"))?;
    let minute = minute.trim().parse().map_err(|_| format!("bad minute in {s:?}"))?;
    Ok((hour, minute))
}

/// Split `YYYY-MM-DD` without calendar checks; those belong to wake request validation
fn parse_date(s: &str) -> std::result::Result<(i32, u32, u32), String> {
    let parts: Vec<&str> = s.split('-').collect();
    let [year, month, day] = parts.as_slice() else {
        return Err(format!("expected YYYY-MM-DD, got {s:?}"));
    };
    Ok((
        year.parse().map_err(|_| format!("bad year in {s:?}"))?,
        month.parse().map_err(|_| format!("bad month in {s:?}"))?,
        day.parse().map_err(|_| format!("bad day in {s:?}"))?,
    ))
}

/// Run a one-shot command and return its JSON output
pub fn execute(db: &Database, command: Command) -> Result<Value> {
    let manager = RulesManager::new(db);

    match command {
        Command::List { table } => Ok(serde_json::to_value(manager.list(table)?)?),
        Command::Show(r) => Ok(serde_json::to_value(manager.get(r.table, r.id)?)?),
        Command::Add(args) => {
            let id = manager.add(&args.into_rule(0))?;
            Ok(json!({ "id": id }))
        }
        Command::Edit { id, rule } => {
            let id = manager.edit(&rule.into_rule(id))?;
            Ok(json!({ "id": id }))
        }
        Command::Delete(r) => {
            manager.delete(r.table, r.id)?;
            Ok(json!({ "deleted": r.id }))
        }
        Command::Enable(r) => {
            manager.set_active(r.table, r.id, true)?;
            Ok(json!({ "id": r.id, "active": true }))
        }
        Command::Disable(r) => {
            manager.set_active(r.table, r.id, false)?;
            Ok(json!({ "id": r.id, "active": false }))
        }
        Command::Upcoming { mode } => upcoming(db, mode),
        Command::Custom {
            date: (year, month, day),
            time: (hour, minute),
            mode,
        } => {
            let config = db.load_config()?;
            let request = WakeRequest {
                hour,
                minute,
                day,
                month,
                year,
                mode,
                found: true,
                shutdown_fail: config.shutdown_on_failure,
            };
            let current_year = config.wall_clock(Utc::now()).year();
            manager.custom_schedule(&request, current_year)?;
            Ok(serde_json::to_value(request)?)
        }
        Command::Config { action } => config(db, action),
    }
}

fn upcoming(db: &Database, mode: Mode) -> Result<Value> {
    let config = db.load_config()?;
    match NextOccurrenceResolver::new(db).resolve_upcoming_turn_on(mode)? {
        Some(request) => Ok(json!({
            "found": true,
            "request": request,
            "rtcwake": request.rtcwake_args(config.use_local_time),
        })),
        None => Ok(json!({ "found": false })),
    }
}

fn config(db: &Database, action: ConfigAction) -> Result<Value> {
    let mut current = db.load_config()?;
    if let ConfigAction::Set {
        local_time,
        default_mode,
        shutdown_on_failure,
    } = action
    {
        if let Some(v) = local_time {
            current.use_local_time = v;
        }
        if let Some(v) = default_mode {
            current.default_mode = v;
        }
        if let Some(v) = shutdown_on_failure {
            current.shutdown_on_failure = v;
        }
        db.save_config(&current)?;
        tracing::info!(?current, "Configuration saved");
    }
    Ok(serde_json::to_value(current)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    fn rule_args(table: Table, time: (u8, u8), days: &str) -> RuleArgs {
        RuleArgs {
            table,
            name: "cli".to_string(),
            time,
            days: days.parse().unwrap(),
            mode: Mode::Off,
            inactive: false,
        }
    }

    #[test]
    fn test_parsers() {
        assert_eq!(parse_time("07:05").unwrap(), (7, 5));
        assert_eq!(parse_time("24:00").unwrap(), (24, 0));
        assert!(parse_time("0700").is_err());
        assert_eq!(parse_date("2026-02-31").unwrap(), (2026, 2, 31));
        assert!(parse_date("2026/02/01").is_err());
        assert_eq!(parse_table("1").unwrap(), Table::TurnOff);
        assert!(parse_table("2").is_err());
        assert_eq!(parse_table("on").unwrap(), Table::TurnOn);
        assert_eq!(parse_mode("default").unwrap(), Mode::UseDefault);
    }

    #[test]
    fn test_add_list_and_conflict() {
        let db = Database::open_in_memory().unwrap();
        let out = execute(&db, Command::Add(rule_args(Table::TurnOn, (6, 30), "mon"))).unwrap();
        assert_eq!(out["id"], 1);

        let err = execute(&db, Command::Add(rule_args(Table::TurnOn, (6, 30), "all"))).unwrap_err();
        assert!(matches!(err, Error::Conflict { id: 1, .. }));

        let out = execute(&db, Command::List { table: Table::TurnOn }).unwrap();
        assert_eq!(out.as_array().unwrap().len(), 1);
        assert_eq!(out[0]["name"], "cli");
    }

    #[test]
    fn test_add_out_of_range_time() {
        let db = Database::open_in_memory().unwrap();
        let err = execute(&db, Command::Add(rule_args(Table::TurnOff, (25, 0), "mon"))).unwrap_err();
        assert!(err.is_invalid_input());
    }

    #[test]
    fn test_config_set_and_show() {
        let db = Database::open_in_memory().unwrap();
        let out = execute(
            &db,
            Command::Config {
                action: ConfigAction::Set {
                    local_time: Some(false),
                    default_mode: Some(Mode::Mem),
                    shutdown_on_failure: None,
                },
            },
        )
        .unwrap();
        assert_eq!(out["default_mode"], "mem");
        assert_eq!(out["use_local_time"], false);

        let shown = execute(&db, Command::Config { action: ConfigAction::Show }).unwrap();
        assert_eq!(shown, out);
    }

    #[test]
    fn test_custom_schedule_year_follows_config() {
        let db = Database::open_in_memory().unwrap();
        db.save_config(&Config {
            use_local_time: false,
            default_mode: Mode::Off,
            shutdown_on_failure: true,
        })
        .unwrap();
        let year = Utc::now().year();

        let next_year = Command::Custom {
            date: (year + 1, 1, 1),
            time: (6, 0),
            mode: Mode::Mem,
        };
        let out = execute(&db, next_year).unwrap();
        assert_eq!(out["shutdown_fail"], true);
        assert_eq!(db.load_custom_schedule().unwrap().unwrap().year, year + 1);

        let too_far = Command::Custom {
            date: (year + 2, 1, 1),
            time: (6, 0),
            mode: Mode::Mem,
        };
        assert!(execute(&db, too_far).unwrap_err().is_invalid_input());
    }

    #[test]
    fn test_upcoming_without_rules() {
        let db = Database::open_in_memory().unwrap();
        let out = execute(&db, Command::Upcoming { mode: Mode::UseDefault }).unwrap();
        assert_eq!(out, json!({ "found": false }));
    }
}
