use super::row::UserRow;
use super::table::UserTable;
use crate::error::{GpkgError, Result};
use crate::types::Value;
use std::sync::Arc;

/// A prepared query over a user table.
///
/// Owns the prepared statement and its parameters; call
/// [`UserQuery::result_set`] to run it.
pub struct UserQuery<'conn> {
    table: Arc<UserTable>,
    stmt: rusqlite::Statement<'conn>,
    params: Vec<Value>,
}

impl<'conn> UserQuery<'conn> {
    pub(crate) fn new(
        table: Arc<UserTable>,
        stmt: rusqlite::Statement<'conn>,
        params: Vec<Value>,
    ) -> Self {
        Self {
            table,
            stmt,
            params,
        }
    }

    pub fn table(&self) -> &UserTable {
        &self.table
    }

    /// Execute the query.
    ///
    /// Fails with `SchemaMismatch` if the statement's result columns are not
    /// the table's columns in order.
    pub fn result_set(&mut self) -> Result<ResultSet<'_>> {
        if !self.table.matches_columns(&self.stmt.column_names()) {
            return Err(GpkgError::SchemaMismatch {
                table: self.table.table_name().to_string(),
                expected: self.table.column_names().map(str::to_string).collect(),
                actual: self
                    .stmt
                    .column_names()
                    .into_iter()
                    .map(str::to_string)
                    .collect(),
            });
        }

        let rows = self
            .stmt
            .query(rusqlite::params_from_iter(self.params.iter()))?;
        Ok(ResultSet {
            table: Arc::clone(&self.table),
            rows,
            current: None,
            position: 0,
        })
    }

    /// Run the query and collect every row.
    pub fn rows(&mut self) -> Result<Vec<UserRow>> {
        self.result_set()?.collect()
    }

    /// Run the query and return the first row, if any.
    pub fn first(&mut self) -> Result<Option<UserRow>> {
        let mut result_set = self.result_set()?;
        if result_set.move_to_next()? {
            Ok(result_set.current.take())
        } else {
            Ok(None)
        }
    }
}

/// Forward-only cursor over the rows of a [`UserQuery`].
///
/// The underlying SQLite statement is reset when the result set is dropped
/// or closed.
pub struct ResultSet<'stmt> {
    table: Arc<UserTable>,
    rows: rusqlite::Rows<'stmt>,
    current: Option<UserRow>,
    position: usize,
}

impl ResultSet<'_> {
    pub fn table(&self) -> &UserTable {
        &self.table
    }

    /// Advance to the next row. Returns `false` once the rows are exhausted.
    pub fn move_to_next(&mut self) -> Result<bool> {
        match self.rows.next()? {
            Some(row) => {
                self.current = Some(read_row(&self.table, row)?);
                self.position += 1;
                Ok(true)
            }
            None => {
                self.current = None;
                Ok(false)
            }
        }
    }

    /// The current row; `None` before the first `move_to_next` and after the
    /// last row.
    pub fn row(&self) -> Option<&UserRow> {
        self.current.as_ref()
    }

    /// Value of a column of the current row.
    pub fn value(&self, column: &str) -> Option<&Value> {
        self.current.as_ref().and_then(|row| row.value(column))
    }

    /// Number of rows read so far.
    pub fn position(&self) -> usize {
        self.position
    }

    pub fn close(self) {}
}

impl Iterator for ResultSet<'_> {
    type Item = Result<UserRow>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.move_to_next() {
            Ok(true) => self.current.take().map(Ok),
            Ok(false) => None,
            Err(err) => Some(Err(err)),
        }
    }
}

fn read_row(table: &Arc<UserTable>, row: &rusqlite::Row<'_>) -> Result<UserRow> {
    let values = table
        .columns()
        .iter()
        .enumerate()
        .map(|(i, column)| Ok(column.coerce_read(Value::from(row.get_ref(i)?))))
        .collect::<Result<Vec<Value>>>()?;
    Ok(UserRow::from_values(Arc::clone(table), values))
}
