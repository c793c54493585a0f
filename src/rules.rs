//! Rules manager - Validate, conflict check and persist rule changes

use crate::conflicts::ScheduleConflictIndex;
use crate::error::{Error, Result};
use crate::models::*;
use crate::storage::{Database, RuleStore};
use crate::validation::{validate_rule, validate_wake_request};
use tracing::info;

pub struct RulesManager<'a> {
    db: &'a Database,
}

impl<'a> RulesManager<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    pub fn list(&self, table: Table) -> Result<Vec<Rule>> {
        self.db.load_all_rules(table)
    }

    pub fn get(&self, table: Table, id: u32) -> Result<Rule> {
        self.db
            .load_rule(table, id)?
            .ok_or(Error::RuleNotFound { table, id })
    }

    /// Validate and insert a new rule, returning its id
    pub fn add(&self, rule: &Rule) -> Result<u32> {
        let mut rule = rule.clone();
        rule.id = 0;
        rule.normalize();
        self.check(&rule)?;

        let id = self.db.insert_rule(&rule)?;
        info!(table = %rule.table, id, name = %rule.name, "Rule added");
        Ok(id)
    }

    /// Validate and overwrite an existing rule
    pub fn edit(&self, rule: &Rule) -> Result<u32> {
        let mut rule = rule.clone();
        rule.normalize();
        self.get(rule.table, rule.id)?;
        self.check(&rule)?;

        if !self.db.update_rule(&rule)? {
            return Err(Error::RuleNotFound {
                table: rule.table,
                id: rule.id,
            });
        }
        info!(table = %rule.table, id = rule.id, "Rule edited");
        Ok(rule.id)
    }

    pub fn delete(&self, table: Table, id: u32) -> Result<()> {
        if !self.db.delete_rule(table, id)? {
            return Err(Error::RuleNotFound { table, id });
        }
        info!(%table, id, "Rule deleted");
        Ok(())
    }

    /// Enable or disable a rule. Enabling re-checks conflicts, since other
    /// rules may have taken its time while it was inactive.
    pub fn set_active(&self, table: Table, id: u32, active: bool) -> Result<()> {
        let mut rule = self.get(table, id)?;
        if active && !rule.active {
            rule.active = true;
            self.check(&rule)?;
        }

        if !self.db.set_rule_active(table, id, active)? {
            return Err(Error::RuleNotFound { table, id });
        }
        info!(%table, id, active, "Rule active flag changed");
        Ok(())
    }

    /// Store a one-off wake request after validating it
    pub fn custom_schedule(&self, request: &WakeRequest, current_year: i32) -> Result<()> {
        validate_wake_request(request, current_year)?;
        self.db.save_custom_schedule(request)?;
        info!(?request, "Custom schedule saved");
        Ok(())
    }

    pub fn load_custom_schedule(&self) -> Result<Option<WakeRequest>> {
        self.db.load_custom_schedule()
    }

    /// Field validation, then a conflict check against a fresh snapshot
    fn check(&self, rule: &Rule) -> Result<()> {
        validate_rule(rule)?;
        if rule.active {
            ScheduleConflictIndex::load(self.db, rule.table)?.ensure_free(rule)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rule(table: Table, hour: u8, minute: u8, days: &str) -> Rule {
        Rule::new(table, "rule", hour, minute, days.parse().unwrap())
    }

    #[test]
    fn test_add_rejects_invalid_without_writing() {
        let db = Database::open_in_memory().unwrap();
        let manager = RulesManager::new(&db);

        let err = manager.add(&rule(Table::TurnOn, 24, 0, "mon")).unwrap_err();
        assert!(err.is_invalid_input());
        assert!(manager.list(Table::TurnOn).unwrap().is_empty());
    }

    #[test]
    fn test_add_normalizes_turn_on_mode() {
        let db = Database::open_in_memory().unwrap();
        let manager = RulesManager::new(&db);

        let id = manager
            .add(&rule(Table::TurnOn, 6, 0, "mon").with_mode(Mode::Disk))
            .unwrap();
        assert_eq!(manager.get(Table::TurnOn, id).unwrap().mode, Mode::Standby);

        let id = manager
            .add(&rule(Table::TurnOff, 22, 0, "mon").with_mode(Mode::Disk))
            .unwrap();
        assert_eq!(manager.get(Table::TurnOff, id).unwrap().mode, Mode::Disk);
    }

    #[test]
    fn test_add_conflict_reports_existing_id() {
        let db = Database::open_in_memory().unwrap();
        let manager = RulesManager::new(&db);
        let first = manager.add(&rule(Table::TurnOn, 7, 0, "mon,tue")).unwrap();

        match manager.add(&rule(Table::TurnOn, 7, 0, "tue")) {
            Err(Error::Conflict { id, .. }) => assert_eq!(id, first),
            other => panic!("unexpected: {:?}", other),
        }
        // Same time in the other table is fine
        assert!(manager.add(&rule(Table::TurnOff, 7, 0, "tue")).is_ok());
    }

    #[test]
    fn test_edit_excludes_itself() {
        let db = Database::open_in_memory().unwrap();
        let manager = RulesManager::new(&db);
        let id = manager.add(&rule(Table::TurnOn, 7, 0, "mon")).unwrap();

        let mut edited = manager.get(Table::TurnOn, id).unwrap();
        edited.name = "renamed".to_string();
        assert_eq!(manager.edit(&edited).unwrap(), id);
        assert_eq!(manager.get(Table::TurnOn, id).unwrap().name, "renamed");

        let mut missing = edited.clone();
        missing.id = 42;
        assert!(matches!(
            manager.edit(&missing),
            Err(Error::RuleNotFound { id: 42, .. })
        ));
    }

    #[test]
    fn test_enable_rechecks_conflicts() {
        let db = Database::open_in_memory().unwrap();
        let manager = RulesManager::new(&db);

        let mut sleeping = rule(Table::TurnOn, 8, 0, "fri");
        sleeping.active = false;
        let sleeping = manager.add(&sleeping).unwrap();
        let awake = manager.add(&rule(Table::TurnOn, 8, 0, "fri")).unwrap();

        match manager.set_active(Table::TurnOn, sleeping, true) {
            Err(Error::Conflict { id, .. }) => assert_eq!(id, awake),
            other => panic!("unexpected: {:?}", other),
        }

        manager.set_active(Table::TurnOn, awake, false).unwrap();
        manager.set_active(Table::TurnOn, sleeping, true).unwrap();
        assert!(manager.get(Table::TurnOn, sleeping).unwrap().active);
    }

    #[test]
    fn test_delete_missing_rule() {
        let db = Database::open_in_memory().unwrap();
        let manager = RulesManager::new(&db);
        let id = manager.add(&rule(Table::TurnOff, 1, 0, "sun")).unwrap();

        manager.delete(Table::TurnOff, id).unwrap();
        assert!(matches!(
            manager.delete(Table::TurnOff, id),
            Err(Error::RuleNotFound { .. })
        ));
    }

    #[test]
    fn test_custom_schedule_validated() {
        let db = Database::open_in_memory().unwrap();
        let manager = RulesManager::new(&db);
        let mut request = WakeRequest {
            hour: 5,
            minute: 0,
            day: 31,
            month: 2,
            year: 2026,
            mode: Mode::Off,
            found: true,
            shutdown_fail: false,
        };

        assert!(manager.custom_schedule(&request, 2026).is_err());
        assert!(manager.load_custom_schedule().unwrap().is_none());

        request.day = 28;
        manager.custom_schedule(&request, 2026).unwrap();
        assert_eq!(manager.load_custom_schedule().unwrap(), Some(request));
    }
}
