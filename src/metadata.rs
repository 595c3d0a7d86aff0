use crate::codec::{Datatype, Value};
use crate::cursor::{Column, Cursor};
use crate::error::{ClientError, Result};
use crate::statement::Statement;
use crate::version::ProductVersion;

/// Per-connection helper serving system-generated result sets.
///
/// Its cursors live in memory and belong to a statement registered with the
/// connection, so they close with it.
#[derive(Debug)]
pub struct SystemCatalog {
    statement: Statement,
    version: ProductVersion,
}

impl SystemCatalog {
    pub(crate) fn new(statement: Statement, version: ProductVersion) -> Self {
        Self { statement, version }
    }

    fn check_open(&self) -> Result<()> {
        if self.statement.is_closed() {
            return Err(ClientError::Closed { object: "metadata" });
        }
        Ok(())
    }

    pub fn server_version(&self) -> &ProductVersion {
        &self.version
    }

    /// One row per wire type: `TYPE_NAME`, `TYPE_TAG`, `NULLABLE`.
    pub fn type_info(&self) -> Result<Cursor> {
        self.check_open()?;
        let columns = vec![
            Column::new("TYPE_NAME", Datatype::String, false),
            Column::new("TYPE_TAG", Datatype::Integer, false),
            Column::new("NULLABLE", Datatype::Boolean, false),
        ];
        let rows = Datatype::ALL
            .into_iter()
            .map(|t| {
                vec![
                    Value::String(t.type_name().to_string()),
                    Value::Integer(i32::from(t.tag())),
                    Value::Boolean(!matches!(t, Datatype::Missing)),
                ]
            })
            .collect();
        Ok(self.statement.memory_cursor(columns, rows))
    }

    /// An empty result with the given columns.
    pub fn empty(&self, columns: Vec<Column>) -> Result<Cursor> {
        self.check_open()?;
        Ok(self.statement.memory_cursor(columns, Vec::new()))
    }

    pub fn is_closed(&self) -> bool {
        self.statement.is_closed()
    }
}
