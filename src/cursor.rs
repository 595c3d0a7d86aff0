//! Forward-only result cursors.
//!
//! A cursor either owns a streamed network response or an in-memory row set.
//! Closing is idempotent. It may race with a read on another thread: the
//! cursor is marked closed at once, and a response that is still being read is
//! released as soon as that read returns.

use crate::codec::{Datatype, Value, decode_value};
use crate::coerce::{self, Decimal};
use crate::error::{ClientError, Result};
use crate::statement::{Statement, StatementInner};
use crate::stream::RowStream;
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use std::collections::VecDeque;
use std::fmt;
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use tracing::{debug, warn};
use uuid::Uuid;

/// One result column as declared by the response signature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    name: String,
    datatype: Datatype,
    nullable: bool,
}

impl Column {
    pub fn new(name: impl Into<String>, datatype: Datatype, nullable: bool) -> Self {
        Self {
            name: name.into(),
            datatype,
            nullable,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn datatype(&self) -> Datatype {
        self.datatype
    }

    pub fn is_nullable(&self) -> bool {
        self.nullable
    }
}

impl fmt::Display for Column {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}{}", self.name, self.datatype, if self.nullable { "?" } else { "" })
    }
}

/// Addresses a column either by 1-based position or by name.
pub trait ColumnRef {
    fn resolve(&self, columns: &[Column]) -> Result<usize>;
}

impl ColumnRef for usize {
    fn resolve(&self, columns: &[Column]) -> Result<usize> {
        if *self == 0 || *self > columns.len() {
            return Err(ClientError::ColumnNotFound {
                column: self.to_string(),
            });
        }
        Ok(*self - 1)
    }
}

impl ColumnRef for &str {
    fn resolve(&self, columns: &[Column]) -> Result<usize> {
        columns
            .iter()
            .position(|c| c.name == *self)
            .ok_or_else(|| ClientError::ColumnNotFound {
                column: self.to_string(),
            })
    }
}

pub(crate) enum RowSource {
    Stream(RowStream),
    Memory(VecDeque<Vec<Value>>),
}

impl RowSource {
    pub(crate) fn owns_network(&self) -> bool {
        matches!(self, RowSource::Stream(_))
    }
}

struct CursorState {
    source: Option<RowSource>,
    row: Option<Vec<Value>>,
    position: u64,
    exhausted: bool,
    was_null: bool,
}

pub(crate) struct CursorInner {
    pub(crate) id: u64,
    columns: Vec<Column>,
    max_rows: u64,
    owns_network: bool,
    statement: Weak<StatementInner>,
    closed: AtomicBool,
    state: Mutex<CursorState>,
}

impl CursorInner {
    pub(crate) fn owns_network(&self) -> bool {
        self.owns_network
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Returns `true` only for the call that actually closed the cursor.
    fn mark_closed(&self) -> bool {
        if self.closed.swap(true, Ordering::AcqRel) {
            return false;
        }
        // A reader holding the lock drops the source itself once it notices the flag.
        if let Ok(mut state) = self.state.try_lock() {
            state.source = None;
            state.row = None;
        }
        true
    }

    /// Close without telling the owning statement. Used by the statement's own cascade.
    pub(crate) fn close_detached(&self) -> Result<()> {
        if self.mark_closed() {
            debug!("cursor {} closed by its statement", self.id);
        }
        Ok(())
    }

    fn close(&self) -> Result<()> {
        if !self.mark_closed() {
            return Ok(());
        }
        debug!("cursor {} closed", self.id);
        match self.statement.upgrade() {
            Some(statement) => statement.cursor_closed(self.id, self.owns_network),
            None => Ok(()),
        }
    }

    fn lock_open(&self) -> Result<OpenState<'_>> {
        if self.is_closed() {
            return Err(ClientError::Closed { object: "cursor" });
        }
        let mut state = OpenState {
            inner: self,
            guard: self.state.lock().unwrap_or_else(|e| e.into_inner()),
        };
        if self.is_closed() {
            state.release();
            return Err(ClientError::Closed { object: "cursor" });
        }
        Ok(state)
    }
}

/// Locked cursor state. A close that lost the race for the lock is completed on unlock.
struct OpenState<'a> {
    inner: &'a CursorInner,
    guard: MutexGuard<'a, CursorState>,
}

impl OpenState<'_> {
    fn release(&mut self) {
        self.guard.source = None;
        self.guard.row = None;
    }
}

impl Deref for OpenState<'_> {
    type Target = CursorState;

    fn deref(&self) -> &CursorState {
        &self.guard
    }
}

impl DerefMut for OpenState<'_> {
    fn deref_mut(&mut self) -> &mut CursorState {
        &mut self.guard
    }
}

impl Drop for OpenState<'_> {
    fn drop(&mut self) {
        if self.inner.is_closed() {
            self.release();
        }
    }
}

/// Map a raw result row onto the declared columns.
fn decode_row(raw: serde_json::Value, columns: &[Column]) -> Result<Vec<Value>> {
    use serde_json::Value as Json;
    match raw {
        Json::Object(fields) if columns.len() > 1 || columns.iter().any(|c| fields.contains_key(&c.name)) => {
            columns
                .iter()
                .map(|c| fields.get(&c.name).map_or(Ok(Value::Missing), decode_value))
                .collect()
        }
        Json::Array(items)
            if columns.len() > 1
                || !matches!(columns.first().map(Column::datatype), Some(Datatype::Array | Datatype::Multiset)) =>
        {
            let mut values: Vec<Value> = items.iter().map(decode_value).collect::<Result<_>>()?;
            values.resize(columns.len(), Value::Missing);
            Ok(values)
        }
        scalar if columns.len() == 1 => Ok(vec![decode_value(&scalar)?]),
        _ => Err(ClientError::protocol(format!(
            "result row does not match a {}-column signature",
            columns.len()
        ))),
    }
}

/// Forward-only, single-pass cursor over a result.
pub struct Cursor {
    inner: Arc<CursorInner>,
}

macro_rules! zero_getter {
    ($(#[$doc:meta])* $name:ident, $ty:ty, $conv:path) => {
        $(#[$doc])*
        pub fn $name<C: ColumnRef>(&self, column: C) -> Result<$ty> {
            self.read(column, |value, col| {
                if value.is_null() {
                    Ok(<$ty>::default())
                } else {
                    $conv(value, col)
                }
            })
        }
    };
}

macro_rules! optional_getter {
    ($(#[$doc:meta])* $name:ident, $ty:ty, $conv:path) => {
        $(#[$doc])*
        pub fn $name<C: ColumnRef>(&self, column: C) -> Result<Option<$ty>> {
            self.read(column, |value, col| {
                if value.is_null() {
                    Ok(None)
                } else {
                    $conv(value, col).map(Some)
                }
            })
        }
    };
}

impl Cursor {
    pub(crate) fn new(
        id: u64,
        columns: Vec<Column>,
        source: RowSource,
        max_rows: u64,
        statement: Weak<StatementInner>,
    ) -> Self {
        debug!(
            "result schema [{}]",
            columns.iter().map(Column::to_string).collect::<Vec<_>>().join(", ")
        );
        let owns_network = source.owns_network();
        Self {
            inner: Arc::new(CursorInner {
                id,
                columns,
                max_rows,
                owns_network,
                statement,
                closed: AtomicBool::new(false),
                state: Mutex::new(CursorState {
                    source: Some(source),
                    row: None,
                    position: 0,
                    exhausted: false,
                    was_null: false,
                }),
            }),
        }
    }

    pub(crate) fn inner(&self) -> &Arc<CursorInner> {
        &self.inner
    }

    /// Advance to the next row. Returns `false` once the rows are exhausted.
    pub fn next(&self) -> Result<bool> {
        let mut state = self.inner.lock_open()?;
        state.was_null = false;
        if state.exhausted {
            return Ok(false);
        }
        if self.inner.max_rows > 0 && state.position >= self.inner.max_rows {
            finish(&mut state);
            return Ok(false);
        }
        let next = match state.source.as_mut() {
            Some(RowSource::Stream(stream)) => match stream.next_value() {
                Ok(Some(raw)) => Some(decode_row(raw, &self.inner.columns)),
                Ok(None) => None,
                Err(e) => Some(Err(e)),
            },
            Some(RowSource::Memory(rows)) => rows.pop_front().map(Ok),
            None => None,
        };
        if self.inner.is_closed() {
            state.release();
            return Err(ClientError::Closed { object: "cursor" });
        }
        match next {
            Some(Ok(row)) => {
                state.row = Some(row);
                state.position += 1;
                Ok(true)
            }
            Some(Err(e)) => {
                // A row that cannot be read ends the cursor; later rows are never renumbered.
                finish(&mut state);
                Err(e)
            }
            None => {
                finish(&mut state);
                Ok(false)
            }
        }
    }

    /// Current 1-based row number, 0 before the first row and after the last.
    pub fn row(&self) -> Result<u64> {
        let state = self.inner.lock_open()?;
        Ok(if state.row.is_some() { state.position } else { 0 })
    }

    pub fn is_before_first(&self) -> Result<bool> {
        let state = self.inner.lock_open()?;
        Ok(state.position == 0 && !state.exhausted)
    }

    pub fn is_first(&self) -> Result<bool> {
        let state = self.inner.lock_open()?;
        Ok(state.row.is_some() && state.position == 1)
    }

    pub fn is_after_last(&self) -> Result<bool> {
        let state = self.inner.lock_open()?;
        Ok(state.exhausted && state.position > 0)
    }

    pub fn columns(&self) -> &[Column] {
        &self.inner.columns
    }

    /// 1-based position of the named column.
    pub fn find_column(&self, name: &str) -> Result<usize> {
        if self.inner.is_closed() {
            return Err(ClientError::Closed { object: "cursor" });
        }
        name.resolve(&self.inner.columns).map(|i| i + 1)
    }

    /// Whether the last getter call read a null value.
    pub fn was_null(&self) -> Result<bool> {
        let state = self.inner.lock_open()?;
        Ok(state.was_null)
    }

    /// Owning statement, if it is still alive.
    pub fn statement(&self) -> Option<Statement> {
        self.inner.statement.upgrade().map(Statement::from_inner)
    }

    pub fn close(&self) -> Result<()> {
        self.inner.close()
    }

    pub fn is_closed(&self) -> bool {
        self.inner.is_closed()
    }

    fn read<C, T>(&self, column: C, convert: impl FnOnce(&Value, &Column) -> Result<T>) -> Result<T>
    where
        C: ColumnRef,
    {
        let mut state = self.inner.lock_open()?;
        state.was_null = false;
        let index = column.resolve(&self.inner.columns)?;
        let Some(row) = state.row.as_ref() else {
            return Err(ClientError::NoCurrentRow);
        };
        let value = row.get(index).unwrap_or(&Value::Missing);
        let is_null = value.is_null();
        let result = convert(value, &self.inner.columns[index]);
        state.was_null = is_null;
        result
    }

    zero_getter!(get_bool, bool, coerce::to_bool);
    zero_getter!(get_i8, i8, coerce::to_i8);
    zero_getter!(get_i16, i16, coerce::to_i16);
    zero_getter!(get_i32, i32, coerce::to_i32);
    zero_getter!(get_i64, i64, coerce::to_i64);
    zero_getter!(get_f32, f32, coerce::to_f32);
    zero_getter!(get_f64, f64, coerce::to_f64);

    optional_getter!(get_decimal, Decimal, coerce::to_decimal);
    optional_getter!(get_string, String, coerce::to_string);
    optional_getter!(get_date, NaiveDate, coerce::to_date);
    optional_getter!(get_time, NaiveTime, coerce::to_time);
    optional_getter!(get_datetime, NaiveDateTime, coerce::to_datetime);
    optional_getter!(
        /// Total months.
        get_year_month_duration, i32, coerce::to_year_month_duration
    );
    optional_getter!(
        /// Total milliseconds.
        get_day_time_duration, i64, coerce::to_day_time_duration
    );
    optional_getter!(get_uuid, Uuid, coerce::to_uuid);
    optional_getter!(
        /// UTF-8 bytes of the canonical text rendering.
        get_bytes, Vec<u8>, coerce::to_bytes
    );
    optional_getter!(
        /// Character stream over the canonical text rendering.
        get_char_stream, std::io::Cursor<String>, coerce::to_char_stream
    );
    optional_getter!(
        /// The decoded value as is.
        get_value, Value, coerce::to_value
    );
}

fn finish(state: &mut CursorState) {
    state.exhausted = true;
    state.row = None;
    state.source = None;
}

impl fmt::Debug for Cursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cursor")
            .field("id", &self.inner.id)
            .field("columns", &self.inner.columns)
            .field("closed", &self.inner.is_closed())
            .finish()
    }
}

impl Drop for Cursor {
    fn drop(&mut self) {
        if let Err(e) = self.inner.close() {
            warn!("failed to close cursor {}: {}", self.inner.id, e);
        }
    }
}
