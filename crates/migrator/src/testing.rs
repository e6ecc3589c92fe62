//! In-crate test doubles

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;

use crate::backends::{DatabasePool, DatabaseRow, DatabaseValue, MapRow, SqlDialect};
use crate::error::{MigrationError, MigrationResult};

/// Pool that records every call and answers from scripted results
pub struct RecordingPool {
    dialect: SqlDialect,
    executed: Mutex<Vec<(String, Vec<DatabaseValue>)>>,
    transactions: Mutex<Vec<Vec<String>>>,
    optional_rows: Mutex<VecDeque<Option<MapRow>>>,
    row_sets: Mutex<VecDeque<Vec<MapRow>>>,
    execute_failure: Mutex<Option<String>>,
    transaction_failure: Mutex<Option<String>>,
}

impl RecordingPool {
    pub fn new() -> Self {
        Self::with_dialect(SqlDialect::PostgreSQL)
    }

    pub fn with_dialect(dialect: SqlDialect) -> Self {
        Self {
            dialect,
            executed: Mutex::new(Vec::new()),
            transactions: Mutex::new(Vec::new()),
            optional_rows: Mutex::new(VecDeque::new()),
            row_sets: Mutex::new(VecDeque::new()),
            execute_failure: Mutex::new(None),
            transaction_failure: Mutex::new(None),
        }
    }

    /// Queue the next `fetch_optional` answer
    pub fn push_optional(&self, row: Option<MapRow>) {
        self.optional_rows.lock().unwrap().push_back(row);
    }

    /// Queue the next `fetch_all` answer
    pub fn push_rows(&self, rows: Vec<MapRow>) {
        self.row_sets.lock().unwrap().push_back(rows);
    }

    pub fn fail_executes(&self, message: &str) {
        *self.execute_failure.lock().unwrap() = Some(message.to_string());
    }

    pub fn fail_transactions(&self, message: &str) {
        *self.transaction_failure.lock().unwrap() = Some(message.to_string());
    }

    /// Every `execute`/`fetch_*` call in order
    pub fn executed(&self) -> Vec<(String, Vec<DatabaseValue>)> {
        self.executed.lock().unwrap().clone()
    }

    pub fn transactions(&self) -> Vec<Vec<String>> {
        self.transactions.lock().unwrap().clone()
    }

    fn record(&self, sql: &str, params: &[DatabaseValue]) {
        self.executed
            .lock()
            .unwrap()
            .push((sql.to_string(), params.to_vec()));
    }
}

#[async_trait]
impl DatabasePool for RecordingPool {
    fn dialect(&self) -> SqlDialect {
        self.dialect
    }

    async fn execute(&self, sql: &str, params: &[DatabaseValue]) -> MigrationResult<u64> {
        self.record(sql, params);
        match self.execute_failure.lock().unwrap().clone() {
            Some(message) => Err(MigrationError::Database(message)),
            None => Ok(1),
        }
    }

    async fn fetch_all(
        &self,
        sql: &str,
        params: &[DatabaseValue],
    ) -> MigrationResult<Vec<Box<dyn DatabaseRow>>> {
        self.record(sql, params);
        let rows = self.row_sets.lock().unwrap().pop_front().unwrap_or_default();
        Ok(rows
            .into_iter()
            .map(|row| Box::new(row) as Box<dyn DatabaseRow>)
            .collect())
    }

    async fn fetch_optional(
        &self,
        sql: &str,
        params: &[DatabaseValue],
    ) -> MigrationResult<Option<Box<dyn DatabaseRow>>> {
        self.record(sql, params);
        let row = self.optional_rows.lock().unwrap().pop_front().flatten();
        Ok(row.map(|row| Box::new(row) as Box<dyn DatabaseRow>))
    }

    async fn execute_in_transaction(&self, statements: &[String]) -> MigrationResult<u64> {
        if let Some(message) = self.transaction_failure.lock().unwrap().clone() {
            return Err(MigrationError::Database(message));
        }
        self.transactions.lock().unwrap().push(statements.to_vec());
        Ok(0)
    }

    async fn close(&self) -> MigrationResult<()> {
        Ok(())
    }
}
