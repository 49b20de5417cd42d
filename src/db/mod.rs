pub mod migrations;
pub mod models;
pub mod queries;
pub mod transfer;

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use rusqlite::Connection;

use crate::broker::matching::{self, MatchScore};
use crate::error::AppResult;
use models::{Broker, NewBroker, NewRequest, RemovalRequest, RequestUpdate};

/// Narrow persistence contract the removal core is written against.
///
/// Read paths return `None` for absent records; update and delete paths
/// report absence through their return value and leave it to the caller to
/// decide whether that is an error.
pub trait Repository: Send + Sync {
    /// All brokers in catalog (insertion) order.
    fn get_brokers(&self) -> AppResult<Vec<Broker>>;
    fn get_broker_by_name(&self, name: &str) -> AppResult<Option<Broker>>;
    fn add_broker(&self, data: NewBroker) -> AppResult<Broker>;
    fn delete_broker(&self, id: &str) -> AppResult<bool>;

    fn get_requests(&self) -> AppResult<Vec<RemovalRequest>>;
    fn get_request_by_id(&self, id: &str) -> AppResult<Option<RemovalRequest>>;
    fn create_request(&self, data: NewRequest) -> AppResult<RemovalRequest>;
    /// Apply `update` atomically. Returns `None` when the request does not exist.
    fn update_request(
        &self,
        id: &str,
        update: RequestUpdate,
    ) -> AppResult<Option<RemovalRequest>>;
    fn delete_request(&self, id: &str) -> AppResult<bool>;

    fn find_brokers_for_email(&self, email: &str) -> AppResult<Vec<MatchScore>> {
        let catalog = self.get_brokers()?;
        Ok(matching::score_brokers(email, &catalog))
    }
}

pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    pub fn open(path: &Path) -> AppResult<Self> {
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        migrations::run_migrations(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    #[cfg(test)]
    pub fn open_in_memory() -> AppResult<Self> {
        let conn = Connection::open_in_memory()?;
        migrations::run_migrations(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// A panic while holding the lock cannot leave SQLite half-written, so a
    /// poisoned mutex is still usable.
    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
