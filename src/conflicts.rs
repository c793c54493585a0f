//! Conflict index - Detect rules firing at the same minute on a shared weekday

use crate::error::{Error, Result};
use crate::models::{Days, Rule, Table};
use crate::storage::RuleStore;
use tracing::{debug, info};

/// Snapshot of one table's rules, loaded once and queried in memory.
///
/// The snapshot never refreshes. Build a new one after any write to the
/// table it was loaded from.
#[derive(Debug, Clone)]
pub struct ScheduleConflictIndex {
    table: Table,
    rules: Vec<Rule>,
}

impl ScheduleConflictIndex {
    /// Load every rule of `table`. A failed read yields no index.
    pub fn load<S: RuleStore + ?Sized>(store: &S, table: Table) -> Result<Self> {
        let rules = store.load_all_rules(table)?;
        debug!(%table, count = rules.len(), "Conflict index loaded");
        Ok(Self::from_rules(table, rules))
    }

    pub fn from_rules(table: Table, rules: Vec<Rule>) -> Self {
        Self { table, rules }
    }

    /// Id of the first active rule sharing the exact time and at least one
    /// weekday, ignoring the rule `exclude_id` (0 excludes nothing)
    pub fn check(&self, exclude_id: u32, hour: u8, minute: u8, days: &Days) -> Option<u32> {
        self.rules
            .iter()
            .filter(|r| r.active && r.id != exclude_id)
            .find(|r| r.hour == hour && r.minute == minute && r.days.overlaps(days))
            .map(|r| r.id)
    }

    /// Conflict check for a whole rule, excluding the rule itself
    pub fn ensure_free(&self, rule: &Rule) -> Result<()> {
        match self.check(rule.id, rule.hour, rule.minute, &rule.days) {
            None => Ok(()),
            Some(id) => {
                info!(
                    table = %self.table,
                    candidate = rule.id,
                    conflicting = id,
                    time = %rule.time_text(),
                    "Rule time conflicts with an existing rule"
                );
                Err(Error::Conflict {
                    table: self.table,
                    id,
                })
            }
        }
    }
}
