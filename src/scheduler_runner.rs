//! Scheduler Runner - Periodically re-resolve the upcoming wake request
//!
//! This is the outer timer around the synchronous resolver: it only
//! re-invokes it on a cadence and reports changes.

use crate::error::Result;
use crate::models::{Mode, WakeRequest};
use crate::scheduler::NextOccurrenceResolver;
use crate::storage::Database;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

pub struct SchedulerRunner {
    db: Arc<Database>,
    mode: Mode,
    period: Duration,
    last: Mutex<Option<WakeRequest>>,
}

impl SchedulerRunner {
    pub fn new(db: Arc<Database>, mode: Mode, period: Duration) -> Self {
        Self {
            db,
            mode,
            period,
            last: Mutex::new(None),
        }
    }

    /// Last resolved request, if any
    pub fn upcoming(&self) -> Option<WakeRequest> {
        *self.last.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Run until Ctrl-C
    pub async fn run(&self) {
        let mut interval = tokio::time::interval(self.period);

        loop {
            tokio::select! {
                _ = interval.tick() => {}
                _ = tokio::signal::ctrl_c() => {
                    tracing::info!("Stopping scheduler");
                    return;
                }
            }

            if let Err(e) = self.tick() {
                tracing::error!("Scheduler tick error: {}", e);
            }
        }
    }

    /// Resolve once; true when the upcoming request changed
    pub fn tick(&self) -> Result<bool> {
        let resolved = NextOccurrenceResolver::new(self.db.as_ref())
            .resolve_upcoming_turn_on(self.mode)?;

        let mut last = self.last.lock().unwrap_or_else(PoisonError::into_inner);
        if *last == resolved {
            return Ok(false);
        }

        match &resolved {
            Some(request) => tracing::info!(
                "Upcoming wake: {:?} ({})",
                request.to_naive_datetime(),
                request.mode
            ),
            None => tracing::info!("No upcoming wake"),
        }
        *last = resolved;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Days, Rule, Table};

    fn runner(period: Duration) -> (Arc<Database>, Arc<SchedulerRunner>) {
        let db = Arc::new(Database::open_in_memory().unwrap());
        let runner = Arc::new(SchedulerRunner::new(db.clone(), Mode::UseDefault, period));
        (db, runner)
    }

    #[test]
    fn test_tick_reports_changes_only() {
        let (db, runner) = runner(Duration::from_secs(60));
        assert!(!runner.tick().unwrap());
        assert!(runner.upcoming().is_none());

        db.insert_rule(&Rule::new(Table::TurnOn, "daily", 6, 0, Days::EVERY_DAY))
            .unwrap();
        assert!(runner.tick().unwrap());
        assert!(!runner.tick().unwrap());

        let upcoming = runner.upcoming().unwrap();
        assert_eq!((upcoming.hour, upcoming.minute), (6, 0));
        assert_eq!(upcoming.mode, Mode::Off);
    }

    #[tokio::test]
    async fn test_run_resolves_on_each_interval() {
        let (db, runner) = runner(Duration::from_millis(10));
        let handle = tokio::spawn({
            let runner = runner.clone();
            async move { runner.run().await }
        });

        // First tick fires immediately with nothing stored
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert!(runner.upcoming().is_none());

        db.insert_rule(&Rule::new(Table::TurnOn, "daily", 6, 0, Days::EVERY_DAY))
            .unwrap();
        let filled = tokio::time::timeout(Duration::from_secs(2), async {
            loop {
                if let Some(request) = runner.upcoming() {
                    return request;
                }
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();

        handle.abort();
        assert_eq!((filled.hour, filled.minute), (6, 0));
        assert_eq!(filled.mode, Mode::Off);
    }
}
