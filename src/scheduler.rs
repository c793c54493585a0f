//! Scheduler module - Resolve the next turn on occurrence into a wake request

use crate::error::Result;
use crate::models::*;
use crate::storage::RuleStore;
use crate::validation::validate_wake_request;
use chrono::{DateTime, Datelike, NaiveDateTime, Timelike, Utc, Weekday};
use tracing::{debug, info, warn};

/// Weekday `offset` days after `day`
pub fn weekday_after(day: Weekday, offset: u32) -> Weekday {
    WEEK[((day.num_days_from_sunday() + offset) % 7) as usize]
}

/// Finds the earliest future firing of the active turn on rules
pub struct NextOccurrenceResolver<'a, S: RuleStore + ?Sized> {
    store: &'a S,
}

impl<'a, S: RuleStore + ?Sized> NextOccurrenceResolver<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }

    /// Resolve against the wall clock.
    ///
    /// `Ok(None)` means no active turn on rule exists; it is not a failure.
    pub fn resolve_upcoming_turn_on(&self, mode_override: Mode) -> Result<Option<WakeRequest>> {
        self.resolve_at(Utc::now(), mode_override)
    }

    /// Resolve as if the current instant were `now`.
    ///
    /// `Mode::UseDefault` picks the configured default mode; any other value
    /// is used as given and must pass wake request validation.
    pub fn resolve_at(
        &self,
        now: DateTime<Utc>,
        mode_override: Mode,
    ) -> Result<Option<WakeRequest>> {
        let config = self.store.load_config()?;
        let mode = if mode_override == Mode::UseDefault {
            config.default_mode
        } else {
            mode_override
        };

        let now = config.wall_clock(now);

        let Some(candidate) = self.find_next(now)? else {
            warn!("No turn on rule found");
            return Ok(None);
        };

        let request = WakeRequest {
            hour: candidate.hour,
            minute: candidate.minute,
            day: candidate.date.day(),
            month: candidate.date.month(),
            year: candidate.date.year(),
            mode,
            found: true,
            shutdown_fail: config.shutdown_on_failure,
        };
        debug!(?request, rule_id = candidate.rule_id, "Wake request built");

        validate_wake_request(&request, now.year())?;
        Ok(Some(request))
    }

    fn find_next(&self, now: NaiveDateTime) -> Result<Option<Candidate>> {
        let today = now.date();
        let weekday = today.weekday();
        let current = (now.hour(), now.minute());

        // Today: the first rule strictly later than the current minute
        let later_today = self
            .store
            .load_turn_on_candidates(weekday, today, 0)?
            .into_iter()
            .find(|c| (u32::from(c.hour), u32::from(c.minute)) > current);
        if let Some(candidate) = later_today {
            info!(rule_id = candidate.rule_id, "Scheduled for today");
            return Ok(Some(candidate));
        }

        // Next days: each day's earliest rule; offset 7 is today next week
        for offset in 1..=7 {
            let day = weekday_after(weekday, offset);
            let earliest = self
                .store
                .load_turn_on_candidates(day, today, offset)?
                .into_iter()
                .next();
            if let Some(candidate) = earliest {
                info!(rule_id = candidate.rule_id, offset, "Scheduled for a later day");
                return Ok(Some(candidate));
            }
        }

        Ok(None)
    }
}
