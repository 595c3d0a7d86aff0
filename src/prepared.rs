use crate::codec::{Param, Value};
use crate::cursor::Cursor;
use crate::error::{ClientError, Result, Warning};
use crate::statement::{ExecutionContext, Statement};
use std::sync::{Mutex, MutexGuard};

/// A statement compiled once and executed with positional parameters.
///
/// Parameters are 1-based. Unbound parameters are sent as null.
#[derive(Debug)]
pub struct PreparedStatement {
    statement: Statement,
    sql: String,
    params: Mutex<Vec<Param>>,
}

impl PreparedStatement {
    pub(crate) fn new(statement: Statement, sql: &str, parameter_count: usize) -> Self {
        Self {
            statement,
            sql: sql.to_string(),
            params: Mutex::new(vec![Param::Value(Value::Null); parameter_count]),
        }
    }

    fn params(&self) -> MutexGuard<'_, Vec<Param>> {
        self.params.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }

    pub fn parameter_count(&self) -> usize {
        self.params().len()
    }

    /// Bind parameter `index` (1-based).
    pub fn set(&self, index: usize, value: impl Into<Param>) -> Result<()> {
        if self.statement.is_closed() {
            return Err(ClientError::Closed { object: "statement" });
        }
        let mut params = self.params();
        if index == 0 || index > params.len() {
            return Err(ClientError::InvalidValue {
                parameter: format!("parameter index {}", index),
            });
        }
        params[index - 1] = value.into();
        Ok(())
    }

    pub fn clear_parameters(&self) -> Result<()> {
        if self.statement.is_closed() {
            return Err(ClientError::Closed { object: "statement" });
        }
        self.params().fill(Param::Value(Value::Null));
        Ok(())
    }

    pub fn execute_query(&self) -> Result<Cursor> {
        let params = self.params().clone();
        self.statement.execute_query_with(&self.sql, &params)
    }

    pub fn execute_update(&self) -> Result<i64> {
        let params = self.params().clone();
        self.statement.execute_update_with(&self.sql, &params)
    }

    pub fn execute(&self) -> Result<bool> {
        let params = self.params().clone();
        self.statement.execute_with(&self.sql, &params)
    }

    /// The underlying statement, for results, limits and warnings.
    pub fn statement(&self) -> &Statement {
        &self.statement
    }

    pub fn warnings(&self) -> Result<Vec<Warning>> {
        self.statement.warnings()
    }

    pub fn execution_context(&self) -> ExecutionContext {
        self.statement.execution_context()
    }

    pub fn cancel(&self) -> Result<()> {
        self.statement.cancel()
    }

    pub fn close(&self) -> Result<()> {
        self.statement.close()
    }

    pub fn is_closed(&self) -> bool {
        self.statement.is_closed()
    }
}
