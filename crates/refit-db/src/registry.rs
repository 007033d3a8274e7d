use refit_types::api::DbTarget;

use crate::Database;

/// Every database the process talks to, opened once at start-up and shared
/// by reference. Requests pick a target; nothing switches connections
/// behind their back.
pub struct ConnectionRegistry {
    local: Database,
    production: Option<Database>,
}

impl ConnectionRegistry {
    pub fn new(local: Database, production: Option<Database>) -> Self {
        Self { local, production }
    }

    /// The database serving application traffic.
    pub fn primary(&self) -> &Database {
        &self.local
    }

    /// `Production` resolves to the local database when no separate
    /// production store was configured.
    pub fn get(&self, target: DbTarget) -> &Database {
        match target {
            DbTarget::Local => &self.local,
            DbTarget::Production => self.production.as_ref().unwrap_or(&self.local),
        }
    }

    pub fn is_dedicated(&self, target: DbTarget) -> bool {
        match target {
            DbTarget::Local => true,
            DbTarget::Production => self.production.is_some(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn production_falls_back_to_local() {
        let registry = ConnectionRegistry::new(Database::open_in_memory().unwrap(), None);
        registry
            .primary()
            .ensure_user("u1", None, None, None, Utc::now())
            .unwrap();

        let prod = registry.get(DbTarget::Production);
        assert!(prod.get_user_by_id("u1").unwrap().is_some());
        assert!(!registry.is_dedicated(DbTarget::Production));
    }

    #[test]
    fn dedicated_production_is_isolated() {
        let registry = ConnectionRegistry::new(
            Database::open_in_memory().unwrap(),
            Some(Database::open_in_memory().unwrap()),
        );
        registry
            .get(DbTarget::Local)
            .ensure_user("u1", None, None, None, Utc::now())
            .unwrap();

        assert!(registry.get(DbTarget::Production).get_user_by_id("u1").unwrap().is_none());
        assert!(registry.is_dedicated(DbTarget::Production));
    }
}
