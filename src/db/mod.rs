//! Schema introspection helpers over a live connection.

mod table_info;

pub use table_info::{TableColumn, TableInfo};

use crate::error::Result;
use crate::ogc_sql::{SQL_LIST_TABLES, SQL_TABLE_OR_VIEW_EXISTS};

/// Whether a table or view with the name exists.
pub fn table_or_view_exists(conn: &rusqlite::Connection, name: &str) -> Result<bool> {
    let exists: i64 = conn.query_row(SQL_TABLE_OR_VIEW_EXISTS, [name], |row| row.get(0))?;
    Ok(exists != 0)
}

/// Names of all tables and views, excluding SQLite internal tables.
pub fn list_tables(conn: &rusqlite::Connection) -> Result<Vec<String>> {
    let mut stmt = conn.prepare(SQL_LIST_TABLES)?;
    let tables = stmt
        .query_map([], |row| row.get(0))?
        .collect::<std::result::Result<Vec<String>, _>>()?;
    Ok(tables)
}

/// Run `f` inside a savepoint, rolling back everything it did if it fails.
///
/// Savepoints nest, so cascades can call into other cascades.
pub(crate) fn with_savepoint<T, F>(conn: &rusqlite::Connection, name: &str, f: F) -> Result<T>
where
    F: FnOnce() -> Result<T>,
{
    conn.execute_batch(&format!("SAVEPOINT {name}"))?;
    match f() {
        Ok(value) => {
            conn.execute_batch(&format!("RELEASE {name}"))?;
            Ok(value)
        }
        Err(err) => {
            if let Err(rollback_err) =
                conn.execute_batch(&format!("ROLLBACK TO {name}; RELEASE {name}"))
            {
                tracing::warn!(savepoint = name, %rollback_err, "failed to roll back savepoint");
            }
            Err(err)
        }
    }
}
