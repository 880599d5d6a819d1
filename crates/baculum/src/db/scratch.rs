//! Scoped transaction and staging-table guards for multi-step overviews.

use uuid::Uuid;

use super::criteria::Params;
use super::error::DatabaseError;
use super::executor::QueryExecutor;

/// An open transaction. Rolls back on drop unless [`commit`](Self::commit)
/// was called.
pub struct TransactionGuard<'a> {
    exec: &'a dyn QueryExecutor,
    finished: bool,
}

impl<'a> TransactionGuard<'a> {
    pub fn begin(exec: &'a dyn QueryExecutor) -> Result<Self, DatabaseError> {
        exec.begin()?;
        Ok(Self {
            exec,
            finished: false,
        })
    }

    pub fn commit(mut self) -> Result<(), DatabaseError> {
        self.finished = true;
        self.exec.commit()
    }
}

impl Drop for TransactionGuard<'_> {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        log::warn!("Rolling back catalog transaction");
        if let Err(e) = self.exec.rollback() {
            log::error!("Rollback failed: {}", e);
        }
    }
}

/// A uniquely named staging table, dropped when the guard goes out of scope.
///
/// Declare it after the [`TransactionGuard`] it belongs to so it is dropped
/// first.
pub struct ScratchTable<'a> {
    exec: &'a dyn QueryExecutor,
    name: String,
}

impl<'a> ScratchTable<'a> {
    /// Creates `{prefix}_{uuid}` from `select`, bound with `params`.
    pub fn create(
        exec: &'a dyn QueryExecutor,
        prefix: &str,
        select: &str,
        params: &Params,
    ) -> Result<Self, DatabaseError> {
        let name = format!("{}_{}", prefix, Uuid::new_v4().simple());
        let sql = exec.dialect().create_scratch_table(&name, select);
        // The guard exists before the statement runs, so a partially created
        // table is still dropped.
        let table = Self { exec, name };
        exec.execute(&sql, params)?;
        Ok(table)
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl Drop for ScratchTable<'_> {
    fn drop(&mut self) {
        let sql = self.exec.dialect().drop_table(&self.name);
        if let Err(e) = self.exec.execute(&sql, &Params::new()) {
            log::error!("Failed to drop scratch table {}: {}", self.name, e);
        }
    }
}
