use super::column::UserColumn;
use super::result_set::UserQuery;
use super::row::UserRow;
use super::table::UserTable;
use crate::catalog::{ContentsDao, TableKind};
use crate::constraint::parser::{parse_table_constraints, table_sql};
use crate::db::{TableInfo, table_or_view_exists};
use crate::error::{GpkgError, Result};
use crate::gpkg::Gpkg;
use crate::ogc_sql::{
    quote_identifier, sql_add_column, sql_count, sql_delete, sql_drop_column,
    sql_drop_table, sql_insert, sql_rename_column, sql_select, sql_update,
};
use crate::types::Value;
use std::sync::Arc;

/// Data access object for one user table.
///
/// Holds a shared snapshot of the table definition. Rows created by the DAO
/// reference the snapshot they were created from; after a schema change the
/// DAO replaces its snapshot and rows of the old one are rejected.
#[derive(Debug)]
pub struct UserDao<'a> {
    gpkg: &'a Gpkg,
    table: Arc<UserTable>,
}

impl<'a> UserDao<'a> {
    /// Open a DAO over an existing table, loading its contents row if any.
    pub(crate) fn open(gpkg: &'a Gpkg, table_name: &str, kind: TableKind) -> Result<Self> {
        let mut table = read_table(gpkg.connection(), table_name, kind)?;
        if let Some(contents) = ContentsDao::new(gpkg).query_for_id(table_name)? {
            table.set_contents(contents)?;
        }
        Ok(Self {
            gpkg,
            table: Arc::new(table),
        })
    }

    /// Create the table from its definition and open a DAO over it.
    pub(crate) fn create_table(gpkg: &'a Gpkg, table: UserTable) -> Result<Self> {
        gpkg.check_writable()?;
        let conn = gpkg.connection();
        if table_or_view_exists(conn, table.table_name())? {
            return Err(GpkgError::LayerAlreadyExists {
                layer_name: table.table_name().to_string(),
            });
        }

        let sql = table.create_table_sql();
        tracing::debug!(table = table.table_name(), %sql, "creating user table");
        conn.execute_batch(&sql)?;
        tracing::info!(table = table.table_name(), kind = %table.kind(), "user table created");

        Ok(Self {
            gpkg,
            table: Arc::new(table),
        })
    }

    pub fn gpkg(&self) -> &'a Gpkg {
        self.gpkg
    }

    pub fn table(&self) -> &UserTable {
        &self.table
    }

    pub fn table_name(&self) -> &str {
        self.table.table_name()
    }

    /// A new row with every slot unset.
    pub fn new_row(&self) -> UserRow {
        UserRow::new(Arc::clone(&self.table))
    }

    fn check_row(&self, row: &UserRow) -> Result<()> {
        let names: Vec<&str> = row.table().column_names().collect();
        if Arc::ptr_eq(row.table_arc(), &self.table) || self.table.matches_columns(&names) {
            return Ok(());
        }
        Err(GpkgError::SchemaMismatch {
            table: self.table_name().to_string(),
            expected: self.table.column_names().map(str::to_string).collect(),
            actual: names.into_iter().map(str::to_string).collect(),
        })
    }

    fn require_pk(&self) -> Result<&UserColumn> {
        self.table
            .pk_column()
            .ok_or_else(|| GpkgError::MissingPrimaryKeyColumn {
                layer_name: self.table_name().to_string(),
            })
    }

    /// Insert a row.
    ///
    /// Returns the new row id when the table has a primary key (and stores it
    /// in the row), otherwise the number of inserted rows.
    pub fn create(&self, row: &mut UserRow) -> Result<i64> {
        self.gpkg.check_writable()?;
        self.check_row(row)?;

        let (columns, values) = row.assigned(false);
        let sql = sql_insert(self.table_name(), columns);
        let conn = self.gpkg.connection();
        let inserted = conn
            .execute(&sql, rusqlite::params_from_iter(values))
            .map_err(|err| GpkgError::from_write(self.table_name(), err))?;

        if self.table.pk_index().is_some() {
            let id = conn.last_insert_rowid();
            row.set_id(id);
            Ok(id)
        } else {
            Ok(inserted as i64)
        }
    }

    /// Update every assigned column of a row, keyed by its primary key.
    pub fn update(&self, row: &UserRow) -> Result<usize> {
        self.gpkg.check_writable()?;
        self.check_row(row)?;
        let pk = self.require_pk()?;
        let id = row.id().ok_or_else(|| {
            GpkgError::Message(format!(
                "row of table '{}' has no primary key value",
                self.table_name()
            ))
        })?;

        let (columns, mut values) = row.assigned(true);
        if columns.is_empty() {
            return Ok(0);
        }
        let sql = sql_update(self.table_name(), columns, pk.name());
        let key = Value::Integer(id);
        values.push(&key);
        self.gpkg
            .connection()
            .execute(&sql, rusqlite::params_from_iter(values))
            .map_err(|err| GpkgError::from_write(self.table_name(), err))
    }

    pub fn delete(&self, row: &UserRow) -> Result<usize> {
        self.check_row(row)?;
        match row.id() {
            Some(id) => self.delete_by_id(id),
            None => Ok(0),
        }
    }

    pub fn delete_by_id(&self, id: i64) -> Result<usize> {
        let pk = self.require_pk()?;
        let where_clause = format!("{} = ?1", quote_identifier(pk.name()));
        self.delete_where(&where_clause, &[Value::Integer(id)])
    }

    /// Delete rows matching a SQL `WHERE` clause with `?` parameters.
    pub fn delete_where(&self, where_clause: &str, params: &[Value]) -> Result<usize> {
        self.gpkg.check_writable()?;
        let sql = sql_delete(self.table_name(), Some(where_clause));
        self.gpkg
            .connection()
            .execute(&sql, rusqlite::params_from_iter(params))
            .map_err(|err| GpkgError::from_write(self.table_name(), err))
    }

    pub fn delete_all(&self) -> Result<usize> {
        self.gpkg.check_writable()?;
        let sql = sql_delete(self.table_name(), None);
        self.gpkg
            .connection()
            .execute(&sql, [])
            .map_err(|err| GpkgError::from_write(self.table_name(), err))
    }

    fn select(&self, where_clause: Option<&str>, params: Vec<Value>) -> Result<UserQuery<'a>> {
        let sql = sql_select(self.table_name(), self.table.column_names(), where_clause);
        self.query_sql(&sql, params)
    }

    pub fn query_for_all(&self) -> Result<UserQuery<'a>> {
        self.select(None, Vec::new())
    }

    pub fn query_for_id(&self, id: i64) -> Result<Option<UserRow>> {
        let pk = self.require_pk()?.name().to_string();
        self.query_for_eq(&pk, id)?.first()
    }

    /// Rows where `column = value`.
    pub fn query_for_eq(&self, column: &str, value: impl Into<Value>) -> Result<UserQuery<'a>> {
        let index = self.table.require_column_index(column)?;
        let name = self.table.columns()[index].name();
        let where_clause = format!("{} = ?1", quote_identifier(name));
        self.select(Some(&where_clause), vec![value.into()])
    }

    /// Rows matching a SQL `WHERE` clause with `?` parameters.
    pub fn query_where(&self, where_clause: &str, params: Vec<Value>) -> Result<UserQuery<'a>> {
        self.select(Some(where_clause), params)
    }

    /// Rows of a caller supplied `SELECT`.
    ///
    /// The result columns must be the table's columns in order; otherwise
    /// running the query fails with `SchemaMismatch`.
    pub fn query_sql(&self, sql: &str, params: Vec<Value>) -> Result<UserQuery<'a>> {
        let stmt = self.gpkg.connection().prepare(sql)?;
        Ok(UserQuery::new(Arc::clone(&self.table), stmt, params))
    }

    pub fn count(&self) -> Result<i64> {
        let sql = sql_count(self.table_name(), None);
        Ok(self.gpkg.connection().query_row(&sql, [], |row| row.get(0))?)
    }

    pub fn count_where(&self, where_clause: &str, params: &[Value]) -> Result<i64> {
        let sql = sql_count(self.table_name(), Some(where_clause));
        Ok(self.gpkg.connection().query_row(
            &sql,
            rusqlite::params_from_iter(params),
            |row| row.get(0),
        )?)
    }

    /// Add a column; its index is assigned as the next position.
    pub fn add_column(&mut self, mut column: UserColumn) -> Result<()> {
        self.gpkg.check_writable()?;
        if self.table.has_column(column.name()) {
            return Err(GpkgError::DuplicateColumnName {
                table: self.table_name().to_string(),
                column: column.name().to_string(),
            });
        }
        column.set_index(self.table.column_count());

        let sql = sql_add_column(self.table_name(), &column.build_sql());
        tracing::debug!(table = self.table_name(), %sql, "adding column");
        self.gpkg.connection().execute_batch(&sql)?;
        self.refresh()
    }

    pub fn rename_column(&mut self, column: &str, new_name: &str) -> Result<()> {
        self.gpkg.check_writable()?;
        let index = self.table.require_column_index(column)?;
        // a case-only rename resolves to the column itself
        if self.table.column_index(new_name).is_some_and(|other| other != index) {
            return Err(GpkgError::DuplicateColumnName {
                table: self.table_name().to_string(),
                column: new_name.to_string(),
            });
        }

        let current = self.table.columns()[index].name().to_string();
        if current == new_name {
            return Ok(());
        }
        let sql = sql_rename_column(self.table_name(), &current, new_name);
        tracing::debug!(table = self.table_name(), %sql, "renaming column");
        self.gpkg.connection().execute_batch(&sql)?;
        self.refresh()
    }

    /// Drop a column. The primary key, the geometry column and the standard
    /// tile columns cannot be dropped.
    pub fn drop_column(&mut self, column: &str) -> Result<()> {
        self.gpkg.check_writable()?;
        let index = self.table.require_column_index(column)?;
        let target = &self.table.columns()[index];
        let required = target.is_primary_key()
            || Some(index) == self.table.geometry_index()
            || (self.table.kind() == TableKind::Tiles
                && crate::gpkg::tiles::REQUIRED_TILE_COLUMNS
                    .iter()
                    .any(|name| name.eq_ignore_ascii_case(target.name())));
        if required {
            return Err(GpkgError::Message(format!(
                "column '{}' of table '{}' is required and cannot be dropped",
                target.name(),
                self.table_name()
            )));
        }

        let sql = sql_drop_column(self.table_name(), target.name());
        tracing::debug!(table = self.table_name(), %sql, "dropping column");
        self.gpkg.connection().execute_batch(&sql)?;
        self.refresh()
    }

    /// Drop the table itself. Catalog rows are left untouched; see
    /// `ContentsDao::delete_table_cascade` for a full removal.
    pub fn drop_table(self) -> Result<()> {
        self.gpkg.check_writable()?;
        self.gpkg
            .connection()
            .execute_batch(&sql_drop_table(self.table_name()))?;
        tracing::info!(table = self.table_name(), "user table dropped");
        Ok(())
    }

    /// Re-read the table definition from the database, keeping the contents.
    pub fn refresh(&mut self) -> Result<()> {
        let mut table = read_table(self.gpkg.connection(), self.table_name(), self.table.kind())?;
        if let Some(contents) = self.table.contents() {
            table.set_contents(contents.clone())?;
        }
        tracing::debug!(table = table.table_name(), columns = table.column_count(), "table definition refreshed");
        self.table = Arc::new(table);
        Ok(())
    }

    /// Reload the contents row of this table from `gpkg_contents`.
    pub fn refresh_contents(&mut self) -> Result<()> {
        if let Some(contents) = ContentsDao::new(self.gpkg).query_for_id(self.table_name())? {
            let mut table = (*self.table).clone();
            table.set_contents(contents)?;
            self.table = Arc::new(table);
        }
        Ok(())
    }
}

/// Read a table definition from live schema.
fn read_table(
    conn: &rusqlite::Connection,
    table_name: &str,
    kind: TableKind,
) -> Result<UserTable> {
    let info = TableInfo::info(conn, table_name)?.ok_or_else(|| GpkgError::MissingTable {
        table: table_name.to_string(),
    })?;
    let parsed = table_sql(conn, table_name)?.map(|sql| parse_table_constraints(&sql));
    UserTable::from_table_info(kind, &info, parsed.as_ref())
}
