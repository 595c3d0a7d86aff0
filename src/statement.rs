//! Statements and the registries that tie their cursors to them.

use crate::codec::{Param, Value};
use crate::connection::ConnectionInner;
use crate::cursor::{Column, Cursor, CursorInner, RowSource};
use crate::error::{ClientError, CloseErrors, Result, Warning};
use crate::protocol::{QueryResponse, QueryService, StatementCategory, SubmitOptions};
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use tracing::debug;
use uuid::Uuid;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

/// Correlation token of one execution, used to cancel it out of band.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ExecutionContext(Uuid);

impl ExecutionContext {
    pub fn id(&self) -> Uuid {
        self.0
    }
}

impl fmt::Display for ExecutionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Default)]
struct Settings {
    query_timeout_secs: u64,
    max_rows: u64,
}

#[derive(Debug, Default)]
struct Outcome {
    update_count: Option<i64>,
    warnings: Vec<Warning>,
    /// Query response of `execute` whose cursor has not been requested yet.
    pending: Option<QueryResponse>,
    current: Option<Weak<CursorInner>>,
}

pub(crate) struct StatementInner {
    pub(crate) id: u64,
    connection: Weak<ConnectionInner>,
    service: Arc<dyn QueryService>,
    closed: AtomicBool,
    close_on_completion: AtomicBool,
    execution_id: Mutex<Uuid>,
    settings: Mutex<Settings>,
    outcome: Mutex<Outcome>,
    network_cursors: Mutex<HashMap<u64, Arc<CursorInner>>>,
    memory_cursors: Mutex<HashMap<u64, Weak<CursorInner>>>,
    next_cursor_id: AtomicU64,
}

impl StatementInner {
    pub(crate) fn new(id: u64, connection: Weak<ConnectionInner>, service: Arc<dyn QueryService>) -> Self {
        Self {
            id,
            connection,
            service,
            closed: AtomicBool::new(false),
            close_on_completion: AtomicBool::new(false),
            execution_id: Mutex::new(Uuid::new_v4()),
            settings: Mutex::new(Settings::default()),
            outcome: Mutex::new(Outcome::default()),
            network_cursors: Mutex::new(HashMap::new()),
            memory_cursors: Mutex::new(HashMap::new()),
            next_cursor_id: AtomicU64::new(1),
        }
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Close every cursor, then leave the connection's registry when `notify_connection` is set.
    pub(crate) fn close(&self, notify_connection: bool) -> Result<()> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        let mut errors = CloseErrors::new();

        let network: Vec<Arc<CursorInner>> = lock(&self.network_cursors).drain().map(|(_, c)| c).collect();
        for cursor in network {
            errors.record(cursor.close_detached());
        }
        let memory: Vec<Weak<CursorInner>> = lock(&self.memory_cursors).drain().map(|(_, c)| c).collect();
        for cursor in memory.iter().filter_map(Weak::upgrade) {
            errors.record(cursor.close_detached());
        }
        {
            let mut outcome = lock(&self.outcome);
            outcome.pending = None;
            outcome.current = None;
        }

        if notify_connection && let Some(connection) = self.connection.upgrade() {
            connection.statement_closed(self.id);
        }
        debug!("statement {} closed", self.id);
        errors.into_result()
    }

    /// Called by a cursor that closed itself.
    pub(crate) fn cursor_closed(&self, cursor_id: u64, owns_network: bool) -> Result<()> {
        if owns_network {
            lock(&self.network_cursors).remove(&cursor_id);
        } else {
            let mut memory = lock(&self.memory_cursors);
            memory.remove(&cursor_id);
            memory.retain(|_, c| c.strong_count() > 0);
        }
        if self.close_on_completion.load(Ordering::Acquire) && !self.is_closed() && self.has_no_open_cursors() {
            return self.close(true);
        }
        Ok(())
    }

    fn has_no_open_cursors(&self) -> bool {
        let network_empty = lock(&self.network_cursors).values().all(|c| c.is_closed());
        let memory_empty = lock(&self.memory_cursors)
            .values()
            .all(|c| c.upgrade().is_none_or(|c| c.is_closed()));
        network_empty && memory_empty
    }
}

/// A statement bound to one connection. Clones share the same statement.
///
/// Dropping a handle does not close the statement; it stays registered with
/// its connection until closed explicitly or by the connection.
#[derive(Clone)]
pub struct Statement {
    inner: Arc<StatementInner>,
}

impl Statement {
    pub(crate) fn from_inner(inner: Arc<StatementInner>) -> Self {
        Self { inner }
    }

    fn check_open(&self) -> Result<()> {
        if self.inner.is_closed() {
            return Err(ClientError::Closed { object: "statement" });
        }
        Ok(())
    }

    fn connection(&self) -> Result<Arc<ConnectionInner>> {
        self.inner
            .connection
            .upgrade()
            .filter(|c| !c.is_closed())
            .ok_or(ClientError::Closed { object: "connection" })
    }

    fn submit_options(&self) -> Result<SubmitOptions> {
        let mut options = self.connection()?.submit_options();
        options.timeout_secs = lock(&self.inner.settings).query_timeout_secs;
        Ok(options)
    }

    /// Run `f` under the current execution id, then rotate the id whatever the outcome.
    fn with_execution<T>(&self, f: impl FnOnce(Uuid) -> Result<T>) -> Result<T> {
        let execution_id = *lock(&self.inner.execution_id);
        let result = f(execution_id);
        *lock(&self.inner.execution_id) = Uuid::new_v4();
        result
    }

    fn record_outcome(&self, response: &QueryResponse, update_count: Option<i64>, pending: Option<QueryResponse>) {
        let mut outcome = lock(&self.inner.outcome);
        outcome.warnings = response.warnings();
        outcome.update_count = update_count;
        outcome.pending = pending;
    }

    pub(crate) fn execute_query_with(&self, sql: &str, params: &[Param]) -> Result<Cursor> {
        self.check_open()?;
        let mut options = self.submit_options()?;
        options.force_read_only = true;
        self.with_execution(|execution_id| {
            let response = self.inner.service.submit(sql, params, execution_id, &options)?;
            if !response.is_category(StatementCategory::Query) {
                return Err(ClientError::InvalidStatementCategory);
            }
            self.record_outcome(&response, None, None);
            self.cursor_for(&response)
        })
    }

    pub(crate) fn execute_update_with(&self, sql: &str, params: &[Param]) -> Result<i64> {
        self.check_open()?;
        let options = self.submit_options()?;
        self.with_execution(|execution_id| {
            let response = self.inner.service.submit(sql, params, execution_id, &options)?;
            if response.is_category(StatementCategory::Query) {
                return Err(ClientError::InvalidStatementCategory);
            }
            let count = response.update_count();
            self.record_outcome(&response, Some(count), None);
            Ok(count)
        })
    }

    pub(crate) fn execute_with(&self, sql: &str, params: &[Param]) -> Result<bool> {
        self.check_open()?;
        let options = self.submit_options()?;
        self.with_execution(|execution_id| {
            let response = self.inner.service.submit(sql, params, execution_id, &options)?;
            if response.is_category(StatementCategory::Query) {
                self.record_outcome(&response, None, Some(response.clone()));
                Ok(true)
            } else {
                self.record_outcome(&response, Some(response.update_count()), None);
                Ok(false)
            }
        })
    }

    /// Compile without executing; used to learn a statement's parameters.
    pub(crate) fn compile(&self, sql: &str) -> Result<QueryResponse> {
        self.check_open()?;
        let mut options = self.submit_options()?;
        options.compile_only = true;
        self.with_execution(|execution_id| self.inner.service.submit(sql, &[], execution_id, &options))
    }

    /// Run a query and return its rows. Fails for statements that are not queries.
    pub fn execute_query(&self, sql: &str) -> Result<Cursor> {
        self.execute_query_with(sql, &[])
    }

    /// Run a non-query statement and return its update count.
    pub fn execute_update(&self, sql: &str) -> Result<i64> {
        self.execute_update_with(sql, &[])
    }

    /// Run any statement. Returns `true` when it produced rows, available from
    /// [`Statement::result_cursor`].
    pub fn execute(&self, sql: &str) -> Result<bool> {
        self.execute_with(sql, &[])
    }

    pub fn result_cursor(&self) -> Result<Option<Cursor>> {
        self.check_open()?;
        let pending = lock(&self.inner.outcome).pending.take();
        let Some(response) = pending else {
            return Ok(None);
        };
        let cursor = self.cursor_for(&response)?;
        lock(&self.inner.outcome).current = Some(Arc::downgrade(cursor.inner()));
        Ok(Some(cursor))
    }

    /// Close the cursor obtained from [`Statement::result_cursor`]. There is never a further result.
    pub fn more_results(&self) -> Result<bool> {
        self.check_open()?;
        let current = lock(&self.inner.outcome).current.take();
        if let Some(cursor) = current.and_then(|c| c.upgrade()) {
            cursor.close_detached()?;
            self.inner.cursor_closed(cursor.id, cursor.owns_network())?;
        }
        Ok(false)
    }

    /// `None` when the last execution produced rows or nothing has run yet.
    pub fn update_count(&self) -> Result<Option<i64>> {
        self.check_open()?;
        Ok(lock(&self.inner.outcome).update_count)
    }

    pub fn query_timeout(&self) -> Result<u64> {
        self.check_open()?;
        Ok(lock(&self.inner.settings).query_timeout_secs)
    }

    /// Server-side timeout in whole seconds; 0 keeps the server default.
    pub fn set_query_timeout(&self, secs: u64) -> Result<()> {
        self.check_open()?;
        lock(&self.inner.settings).query_timeout_secs = secs;
        Ok(())
    }

    pub fn max_rows(&self) -> Result<u64> {
        self.check_open()?;
        Ok(lock(&self.inner.settings).max_rows)
    }

    /// Row limit for cursors created afterwards; 0 means unlimited.
    pub fn set_max_rows(&self, max_rows: u64) -> Result<()> {
        self.check_open()?;
        lock(&self.inner.settings).max_rows = max_rows;
        Ok(())
    }

    /// Warnings of the last execution, oldest first.
    pub fn warnings(&self) -> Result<Vec<Warning>> {
        self.check_open()?;
        Ok(lock(&self.inner.outcome).warnings.clone())
    }

    pub fn clear_warnings(&self) -> Result<()> {
        self.check_open()?;
        lock(&self.inner.outcome).warnings.clear();
        Ok(())
    }

    /// Generated keys are not reported by the service; always empty.
    pub fn generated_keys(&self) -> Result<Cursor> {
        self.check_open()?;
        Ok(self.memory_cursor(Vec::new(), Vec::new()))
    }

    pub fn execution_context(&self) -> ExecutionContext {
        ExecutionContext(*lock(&self.inner.execution_id))
    }

    /// Ask the server to stop whatever this statement is running now.
    pub fn cancel(&self) -> Result<()> {
        self.check_open()?;
        let execution_id = *lock(&self.inner.execution_id);
        self.inner.service.cancel(execution_id)
    }

    /// Cancel only if `context` is still the statement's current execution.
    pub fn cancel_context(&self, context: &ExecutionContext) -> Result<()> {
        self.check_open()?;
        let execution_id = *lock(&self.inner.execution_id);
        if execution_id != context.0 {
            debug!("cancel of stale execution {} ignored", context);
            return Ok(());
        }
        self.inner.service.cancel(execution_id)
    }

    /// Close this statement as soon as its last cursor closes.
    pub fn close_on_completion(&self) -> Result<()> {
        self.check_open()?;
        self.inner.close_on_completion.store(true, Ordering::Release);
        Ok(())
    }

    pub fn is_close_on_completion(&self) -> Result<bool> {
        self.check_open()?;
        Ok(self.inner.close_on_completion.load(Ordering::Acquire))
    }

    pub fn close(&self) -> Result<()> {
        self.inner.close(true)
    }

    pub fn is_closed(&self) -> bool {
        self.inner.is_closed()
    }

    fn cursor_for(&self, response: &QueryResponse) -> Result<Cursor> {
        let columns = response.columns()?;
        if response.is_explain_only() {
            let rows = response
                .explain_lines()?
                .into_iter()
                .map(|line| vec![Value::String(line)])
                .collect();
            return Ok(self.memory_cursor(columns, rows));
        }
        let stream = self.inner.service.fetch_result(response)?;
        let max_rows = lock(&self.inner.settings).max_rows;
        Ok(self.register(columns, RowSource::Stream(stream), max_rows))
    }

    /// Cursor over rows produced by the client itself.
    pub(crate) fn memory_cursor(&self, columns: Vec<Column>, rows: Vec<Vec<Value>>) -> Cursor {
        self.register(columns, RowSource::Memory(rows.into()), 0)
    }

    fn register(&self, columns: Vec<Column>, source: RowSource, max_rows: u64) -> Cursor {
        let id = self.inner.next_cursor_id.fetch_add(1, Ordering::Relaxed);
        let cursor = Cursor::new(id, columns, source, max_rows, Arc::downgrade(&self.inner));
        if cursor.inner().owns_network() {
            lock(&self.inner.network_cursors).insert(id, Arc::clone(cursor.inner()));
        } else {
            let mut memory = lock(&self.inner.memory_cursors);
            memory.retain(|_, c| c.strong_count() > 0);
            memory.insert(id, Arc::downgrade(cursor.inner()));
        }
        cursor
    }
}

impl fmt::Debug for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Statement")
            .field("id", &self.inner.id)
            .field("closed", &self.inner.is_closed())
            .finish()
    }
}
