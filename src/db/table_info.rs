use crate::conversions::{data_type_from_declared, default_value_from_sql, split_type_max};
use crate::error::Result;
use crate::ogc_sql::{SQL_TABLE_HAS_AUTOINCREMENT, sql_table_info};
use crate::types::{DataType, Value};

/// Column metadata reconstructed from `PRAGMA table_info`.
#[derive(Clone, Debug, PartialEq)]
pub struct TableColumn {
    pub index: usize,
    pub name: String,
    /// Declared type as written in the schema, e.g. `TEXT(255)`.
    pub declared_type: String,
    /// Declared type without its length suffix, e.g. `TEXT`.
    pub type_name: String,
    /// `None` if the type is neither a GeoPackage data type nor a geometry type.
    pub data_type: Option<DataType>,
    pub max: Option<u32>,
    pub not_null: bool,
    pub default_value_string: Option<String>,
    pub default_value: Option<Value>,
    pub primary_key: bool,
    pub autoincrement: bool,
}

impl TableColumn {
    pub fn is_geometry(&self) -> bool {
        crate::conversions::geometry_type_from_name(&self.type_name).is_some()
    }
}

/// Columns and primary keys of a live table.
#[derive(Clone, Debug)]
pub struct TableInfo {
    table_name: String,
    columns: Vec<TableColumn>,
    primary_keys: Vec<usize>,
}

impl TableInfo {
    /// Introspect a table; `None` if it has no columns (does not exist).
    ///
    /// `autoincrement` is a heuristic: SQLite does not expose it per column,
    /// so it is set on every primary key column when the table's SQL contains
    /// `AUTOINCREMENT` anywhere.
    pub fn info(conn: &rusqlite::Connection, table_name: &str) -> Result<Option<TableInfo>> {
        let mut stmt = conn.prepare(&sql_table_info(table_name))?;
        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, i64>("cid")?,
                    row.get::<_, String>("name")?,
                    row.get::<_, Option<String>>("type")?.unwrap_or_default(),
                    row.get::<_, i64>("notnull")? != 0,
                    row.get::<_, Option<String>>("dflt_value")?,
                    row.get::<_, i64>("pk")? != 0,
                ))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        if rows.is_empty() {
            return Ok(None);
        }

        let mut autoincrement_checked: Option<bool> = None;
        let mut columns = Vec::with_capacity(rows.len());
        let mut primary_keys = Vec::new();

        for (position, (cid, name, declared_type, not_null, default_value_string, primary_key)) in
            rows.into_iter().enumerate()
        {
            let (type_name, max) = split_type_max(&declared_type);
            let type_name = type_name.to_string();
            let data_type = data_type_from_declared(&type_name);
            let default_value = default_value_string
                .as_deref()
                .and_then(|raw| default_value_from_sql(raw, data_type));

            let autoincrement = if primary_key {
                match autoincrement_checked {
                    Some(value) => value,
                    None => {
                        let value = table_has_autoincrement(conn, table_name)?;
                        autoincrement_checked = Some(value);
                        value
                    }
                }
            } else {
                false
            };

            if primary_key {
                primary_keys.push(position);
            }

            columns.push(TableColumn {
                index: usize::try_from(cid).unwrap_or(position),
                name,
                declared_type,
                type_name,
                data_type,
                max,
                not_null,
                default_value_string,
                default_value,
                primary_key,
                autoincrement,
            });
        }

        Ok(Some(TableInfo {
            table_name: table_name.to_string(),
            columns,
            primary_keys,
        }))
    }

    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    pub fn columns(&self) -> &[TableColumn] {
        &self.columns
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|c| c.name.as_str())
    }

    /// Case-insensitive column lookup.
    pub fn column(&self, name: &str) -> Option<&TableColumn> {
        self.columns
            .iter()
            .find(|c| c.name.eq_ignore_ascii_case(name))
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column(name).is_some()
    }

    /// Primary key columns in column order.
    pub fn primary_keys(&self) -> impl Iterator<Item = &TableColumn> {
        self.primary_keys.iter().map(|&i| &self.columns[i])
    }

    /// The primary key column, if the table has exactly one.
    pub fn primary_key(&self) -> Option<&TableColumn> {
        match self.primary_keys.as_slice() {
            [only] => Some(&self.columns[*only]),
            _ => None,
        }
    }

    pub fn has_primary_key(&self) -> bool {
        !self.primary_keys.is_empty()
    }

    pub fn has_composite_primary_key(&self) -> bool {
        self.primary_keys.len() > 1
    }
}

fn table_has_autoincrement(conn: &rusqlite::Connection, table_name: &str) -> Result<bool> {
    let found: i64 = conn.query_row(SQL_TABLE_HAS_AUTOINCREMENT, [table_name], |row| row.get(0))?;
    Ok(found != 0)
}
