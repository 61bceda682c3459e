use crate::db::table_or_view_exists;
use crate::error::{GpkgError, Result};
use crate::gpkg::Gpkg;
use crate::ogc_sql::{
    GPKG_EXTENSIONS, SQL_GPKG_EXTENSIONS, SQL_INSERT_EXTENSION, SQL_SELECT_EXTENSIONS,
    sql_delete,
};
use rusqlite::params;

/// Value of `gpkg_extensions.scope`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExtensionScope {
    ReadWrite,
    WriteOnly,
}

impl ExtensionScope {
    pub fn name(self) -> &'static str {
        match self {
            ExtensionScope::ReadWrite => "read-write",
            ExtensionScope::WriteOnly => "write-only",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "read-write" => Some(ExtensionScope::ReadWrite),
            "write-only" => Some(ExtensionScope::WriteOnly),
            _ => None,
        }
    }
}

/// A `gpkg_extensions` row.
///
/// `table_name` and `column_name` are `None` for extensions that apply to the
/// whole GeoPackage.
#[derive(Clone, Debug, PartialEq)]
pub struct Extension {
    pub table_name: Option<String>,
    pub column_name: Option<String>,
    pub extension_name: String,
    pub definition: String,
    pub scope: ExtensionScope,
}

impl Extension {
    pub fn new(
        table_name: Option<&str>,
        column_name: Option<&str>,
        extension_name: &str,
        definition: &str,
        scope: ExtensionScope,
    ) -> Self {
        Self {
            table_name: table_name.map(str::to_string),
            column_name: column_name.map(str::to_string),
            extension_name: extension_name.to_string(),
            definition: definition.to_string(),
            scope,
        }
    }

    fn from_row(row: &rusqlite::Row<'_>) -> Result<Self> {
        let scope: String = row.get("scope")?;
        Ok(Self {
            table_name: row.get("table_name")?,
            column_name: row.get("column_name")?,
            extension_name: row.get("extension_name")?,
            definition: row.get("definition")?,
            scope: ExtensionScope::from_name(&scope)
                .ok_or_else(|| GpkgError::Message(format!("invalid extension scope: {scope}")))?,
        })
    }
}

/// Access to `gpkg_extensions`.
#[derive(Clone, Copy, Debug)]
pub struct ExtensionsDao<'a> {
    gpkg: &'a Gpkg,
}

impl<'a> ExtensionsDao<'a> {
    pub fn new(gpkg: &'a Gpkg) -> Self {
        Self { gpkg }
    }

    pub fn table_exists(&self) -> Result<bool> {
        table_or_view_exists(self.gpkg.connection(), GPKG_EXTENSIONS)
    }

    /// Create `gpkg_extensions` if it does not exist yet.
    pub fn create_table(&self) -> Result<bool> {
        if self.table_exists()? {
            return Ok(false);
        }
        self.gpkg.check_writable()?;
        self.gpkg.connection().execute_batch(SQL_GPKG_EXTENSIONS)?;
        tracing::debug!(table = GPKG_EXTENSIONS, "catalog table created");
        Ok(true)
    }

    pub fn create(&self, extension: &Extension) -> Result<()> {
        self.gpkg.check_writable()?;
        if !self.table_exists()? {
            return Err(GpkgError::MissingTable {
                table: GPKG_EXTENSIONS.to_string(),
            });
        }
        self.gpkg
            .connection()
            .execute(
                SQL_INSERT_EXTENSION,
                params![
                    extension.table_name,
                    extension.column_name,
                    extension.extension_name,
                    extension.definition,
                    extension.scope.name(),
                ],
            )
            .map_err(|err| GpkgError::from_write(GPKG_EXTENSIONS, err))?;
        tracing::debug!(extension = %extension.extension_name, table = ?extension.table_name, "extension registered");
        Ok(())
    }

    /// Insert unless the same (table, column, name) triple is registered.
    ///
    /// The UNIQUE constraint treats NULLs as distinct, so the lookup is done
    /// here rather than left to the insert.
    pub fn create_if_missing(&self, extension: &Extension) -> Result<bool> {
        let exists = self
            .query_for_name(&extension.extension_name)?
            .iter()
            .any(|existing| {
                existing.table_name == extension.table_name
                    && existing.column_name == extension.column_name
            });
        if exists {
            return Ok(false);
        }
        self.create(extension)?;
        Ok(true)
    }

    fn query<P: rusqlite::Params>(&self, where_clause: &str, params: P) -> Result<Vec<Extension>> {
        if !self.table_exists()? {
            return Ok(Vec::new());
        }
        let sql = format!("{SQL_SELECT_EXTENSIONS} WHERE {where_clause}");
        let mut stmt = self.gpkg.connection().prepare(&sql)?;
        let mut rows = stmt.query(params)?;
        let mut out = Vec::new();
        while let Some(row) = rows.next()? {
            out.push(Extension::from_row(row)?);
        }
        Ok(out)
    }

    pub fn query_for_all(&self) -> Result<Vec<Extension>> {
        self.query("1 = 1", [])
    }

    pub fn query_for_name(&self, extension_name: &str) -> Result<Vec<Extension>> {
        self.query("extension_name = ?1", [extension_name])
    }

    pub fn query_for_table(&self, table_name: &str) -> Result<Vec<Extension>> {
        self.query("table_name = ?1", [table_name])
    }

    pub fn delete_for_table(&self, table_name: &str) -> Result<usize> {
        self.gpkg.check_writable()?;
        if !self.table_exists()? {
            return Ok(0);
        }
        Ok(self.gpkg.connection().execute(
            &sql_delete(GPKG_EXTENSIONS, Some("table_name = ?1")),
            [table_name],
        )?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registers_once() -> Result<()> {
        let gpkg = Gpkg::new_in_memory()?;
        let dao = gpkg.extensions_dao();
        assert!(dao.query_for_all()?.is_empty());
        dao.create_table()?;

        let extension = Extension::new(
            None,
            None,
            "acme_styles",
            "https://example.com/styles",
            ExtensionScope::ReadWrite,
        );
        assert!(dao.create_if_missing(&extension)?);
        assert!(!dao.create_if_missing(&extension)?);
        assert_eq!(dao.query_for_name("acme_styles")?, vec![extension]);
        Ok(())
    }

    #[test]
    fn deletes_table_scoped_rows() -> Result<()> {
        let gpkg = Gpkg::new_in_memory()?;
        let dao = gpkg.extensions_dao();
        dao.create_table()?;
        dao.create(&Extension::new(
            Some("roads"),
            Some("geom"),
            "gpkg_rtree_index",
            "http://www.geopackage.org/spec/#extension_rtree",
            ExtensionScope::WriteOnly,
        ))?;

        assert_eq!(dao.query_for_table("roads")?.len(), 1);
        assert_eq!(dao.delete_for_table("roads")?, 1);
        assert!(dao.query_for_table("roads")?.is_empty());
        Ok(())
    }
}
