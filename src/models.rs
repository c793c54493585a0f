//! Data models for Wake Scheduler

use crate::error::Error;
use chrono::{DateTime, Local, NaiveDate, NaiveDateTime, NaiveTime, Utc, Weekday};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Maximum rule name length, terminator included. Names must be strictly shorter.
pub const RULE_NAME_LENGTH: usize = 33;

/// Weekdays indexed the way rules store them: Sunday = 0 ... Saturday = 6
pub const WEEK: [Weekday; 7] = [
    Weekday::Sun,
    Weekday::Mon,
    Weekday::Tue,
    Weekday::Wed,
    Weekday::Thu,
    Weekday::Fri,
    Weekday::Sat,
];

/// Which rule collection a rule or query refers to
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum Table {
    #[default]
    TurnOn,
    TurnOff,
}

impl Table {
    /// Raw value one past the last real kind. Never a valid table.
    pub const COUNT: i64 = 2;

    /// SQLite table holding this kind of rule
    pub fn sql_name(self) -> &'static str {
        match self {
            Table::TurnOn => "rules_turnon",
            Table::TurnOff => "rules_turnoff",
        }
    }
}

impl TryFrom<i64> for Table {
    type Error = Error;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Table::TurnOn),
            1 => Ok(Table::TurnOff),
            other => Err(Error::InvalidTable(other)),
        }
    }
}

impl FromStr for Table {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "on" | "turnon" | "turn_on" | "turn-on" => Ok(Table::TurnOn),
            "off" | "turnoff" | "turn_off" | "turn-off" => Ok(Table::TurnOff),
            other => other
                .parse::<i64>()
                .map_err(|_| Error::UnknownName {
                    kind: "table",
                    value: s.to_string(),
                })
                .and_then(Table::try_from),
        }
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Table::TurnOn => f.write_str("turn_on"),
            Table::TurnOff => f.write_str("turn_off"),
        }
    }
}

/// Power mode applied when a rule fires.
///
/// The first five values are the actionable rtcwake modes. The rest are
/// query/control values that must never end up in a resolved [`WakeRequest`].
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    #[default]
    Standby,
    Freeze,
    Mem,
    Disk,
    Off,
    No,
    On,
    Disable,
    Show,
    /// Sentinel: "use the configured default mode"
    UseDefault,
}

impl Mode {
    pub const ALL: [Mode; 10] = [
        Mode::Standby,
        Mode::Freeze,
        Mode::Mem,
        Mode::Disk,
        Mode::Off,
        Mode::No,
        Mode::On,
        Mode::Disable,
        Mode::Show,
        Mode::UseDefault,
    ];

    pub fn as_i64(self) -> i64 {
        self as i64
    }

    /// Whether the OS wake mechanism can act on this mode
    pub fn is_actionable(self) -> bool {
        matches!(
            self,
            Mode::Standby | Mode::Freeze | Mode::Mem | Mode::Disk | Mode::Off
        )
    }

    /// Name understood by `rtcwake --mode`
    pub fn rtcwake_name(self) -> &'static str {
        match self {
            Mode::Standby => "standby",
            Mode::Freeze => "freeze",
            Mode::Mem => "mem",
            Mode::Disk => "disk",
            Mode::Off => "off",
            Mode::No => "no",
            Mode::On => "on",
            Mode::Disable => "disable",
            Mode::Show => "show",
            Mode::UseDefault => "default",
        }
    }
}

impl TryFrom<i64> for Mode {
    type Error = Error;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        usize::try_from(value)
            .ok()
            .and_then(|i| Mode::ALL.get(i).copied())
            .ok_or(Error::InvalidMode(value))
    }
}

impl FromStr for Mode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.to_ascii_lowercase();
        if let Some(mode) = Mode::ALL.iter().find(|m| m.rtcwake_name() == lower) {
            return Ok(*mode);
        }
        lower
            .parse::<i64>()
            .map_err(|_| Error::UnknownName {
                kind: "mode",
                value: s.to_string(),
            })
            .and_then(Mode::try_from)
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.rtcwake_name())
    }
}

/// Weekday flags, Sunday = index 0
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct Days(pub [bool; 7]);

impl Days {
    pub const NONE: Days = Days([false; 7]);
    pub const EVERY_DAY: Days = Days([true; 7]);

    pub fn from_weekdays<I: IntoIterator<Item = Weekday>>(days: I) -> Self {
        let mut mask = Days::NONE;
        for day in days {
            mask.set(day, true);
        }
        mask
    }

    pub fn contains(&self, day: Weekday) -> bool {
        self.0[day.num_days_from_sunday() as usize]
    }

    pub fn set(&mut self, day: Weekday, on: bool) {
        self.0[day.num_days_from_sunday() as usize] = on;
    }

    /// True when both masks share at least one weekday
    pub fn overlaps(&self, other: &Days) -> bool {
        self.0.iter().zip(other.0.iter()).any(|(a, b)| *a && *b)
    }

    pub fn is_empty(&self) -> bool {
        !self.0.iter().any(|d| *d)
    }
}

impl FromStr for Days {
    type Err = Error;

    /// Accepts `all`, `none`, or a comma separated list such as `mon,wed,fri`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "all" | "every" => return Ok(Days::EVERY_DAY),
            "none" | "" => return Ok(Days::NONE),
            _ => {}
        }

        s.split(',')
            .map(|part| {
                part.trim().parse::<Weekday>().map_err(|_| Error::UnknownName {
                    kind: "weekday",
                    value: part.trim().to_string(),
                })
            })
            .collect::<Result<Vec<_>, _>>()
            .map(Days::from_weekdays)
    }
}

impl fmt::Display for Days {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<String> = WEEK
            .iter()
            .filter(|d| self.contains(**d))
            .map(|d| d.to_string().to_lowercase())
            .collect();
        f.write_str(&names.join(","))
    }
}

/// One recurring schedule entry
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct Rule {
    /// 0 until the rule has been persisted
    pub id: u32,
    pub name: String,
    pub hour: u8,
    pub minute: u8,
    pub days: Days,
    pub active: bool,
    pub table: Table,
    /// Only meaningful for turn off rules
    pub mode: Mode,
}

impl Rule {
    pub fn new(table: Table, name: impl Into<String>, hour: u8, minute: u8, days: Days) -> Self {
        Self {
            id: 0,
            name: name.into(),
            hour,
            minute,
            days,
            active: true,
            table,
            mode: Mode::default(),
        }
    }

    pub fn with_mode(mut self, mode: Mode) -> Self {
        self.mode = mode;
        self
    }

    /// Turn on rules carry no mode; force the zero value
    pub fn normalize(&mut self) {
        if self.table == Table::TurnOn {
            self.mode = Mode::default();
        }
    }

    /// `HH:MM:00`, the form stored in the rules tables
    pub fn time_text(&self) -> String {
        format!("{:02}:{:02}:00", self.hour, self.minute)
    }
}

/// One candidate occurrence returned by the storage layer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Candidate {
    pub rule_id: u32,
    pub hour: u8,
    pub minute: u8,
    pub date: NaiveDate,
}

/// Fully resolved wake instant plus action, handed to rtcwake
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct WakeRequest {
    pub hour: u8,
    pub minute: u8,
    pub day: u32,
    pub month: u32,
    pub year: i32,
    pub mode: Mode,
    pub found: bool,
    pub shutdown_fail: bool,
}

impl WakeRequest {
    pub fn date(&self) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(self.year, self.month, self.day)
    }

    pub fn to_naive_datetime(&self) -> Option<NaiveDateTime> {
        let time = NaiveTime::from_hms_opt(self.hour.into(), self.minute.into(), 0)?;
        self.date().map(|d| d.and_time(time))
    }

    /// Argument vector for the external `rtcwake` invocation
    pub fn rtcwake_args(&self, use_local_time: bool) -> Vec<String> {
        vec![
            if use_local_time { "--local" } else { "--utc" }.to_string(),
            "--date".to_string(),
            format!(
                "{:04}-{:02}-{:02} {:02}:{:02}",
                self.year, self.month, self.day, self.hour, self.minute
            ),
            "--mode".to_string(),
            self.mode.rtcwake_name().to_string(),
        ]
    }
}

/// Scheduling configuration (single persisted row)
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct Config {
    pub use_local_time: bool,
    pub default_mode: Mode,
    pub shutdown_on_failure: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            use_local_time: true,
            default_mode: Mode::Off,
            shutdown_on_failure: false,
        }
    }
}

impl Config {
    /// `now` as wall clock time in the configured reference
    pub fn wall_clock(&self, now: DateTime<Utc>) -> NaiveDateTime {
        if self.use_local_time {
            now.with_timezone(&Local).naive_local()
        } else {
            now.naive_utc()
        }
    }
}
