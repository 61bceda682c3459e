use crate::conversions::{
    dimension_from_zm, dimension_to_zm, geometry_type_from_str, geometry_type_to_str,
};
use crate::db::table_or_view_exists;
use crate::error::{GpkgError, Result};
use crate::gpkg::Gpkg;
use crate::ogc_sql::{
    GPKG_GEOMETRY_COLUMNS, SQL_GPKG_GEOMETRY_COLUMNS, SQL_INSERT_GPKG_GEOMETRY_COLUMNS,
    SQL_SELECT_GEOMETRY_COLUMNS, sql_delete,
};
use crate::types::GeometryType;
use rusqlite::params;

/// A `gpkg_geometry_columns` row.
#[derive(Clone, Debug, PartialEq)]
pub struct GeometryColumns {
    pub table_name: String,
    pub column_name: String,
    pub geometry_type: GeometryType,
    pub srs_id: i32,
    /// 0: prohibited, 1: mandatory, 2: optional.
    pub z: i8,
    pub m: i8,
}

impl GeometryColumns {
    pub fn new(
        table_name: impl Into<String>,
        column_name: impl Into<String>,
        geometry_type: GeometryType,
        srs_id: i32,
    ) -> Self {
        Self {
            table_name: table_name.into(),
            column_name: column_name.into(),
            geometry_type,
            srs_id,
            z: 0,
            m: 0,
        }
    }

    pub fn with_zm(mut self, z: i8, m: i8) -> Self {
        self.z = z;
        self.m = m;
        self
    }

    /// Set the `z` / `m` flags to "mandatory" as implied by `dimension`.
    pub fn with_dimension(self, dimension: wkb::reader::Dimension) -> Self {
        let (z, m) = dimension_to_zm(dimension);
        self.with_zm(z, m)
    }

    /// Coordinate dimension implied by the `z` / `m` flags. Fails when either
    /// flag is "optional" (2).
    pub fn dimension(&self) -> Result<wkb::reader::Dimension> {
        dimension_from_zm(self.z, self.m)
    }

    fn from_row(row: &rusqlite::Row<'_>) -> Result<Self> {
        let geometry_type: String = row.get("geometry_type_name")?;
        Ok(Self {
            table_name: row.get("table_name")?,
            column_name: row.get("column_name")?,
            geometry_type: geometry_type_from_str(&geometry_type)?,
            srs_id: row.get("srs_id")?,
            z: row.get("z")?,
            m: row.get("m")?,
        })
    }
}

/// Access to `gpkg_geometry_columns`.
#[derive(Clone, Copy, Debug)]
pub struct GeometryColumnsDao<'a> {
    gpkg: &'a Gpkg,
}

impl<'a> GeometryColumnsDao<'a> {
    pub fn new(gpkg: &'a Gpkg) -> Self {
        Self { gpkg }
    }

    pub fn table_exists(&self) -> Result<bool> {
        table_or_view_exists(self.gpkg.connection(), GPKG_GEOMETRY_COLUMNS)
    }

    /// Create `gpkg_geometry_columns` if it does not exist yet.
    pub fn create_table(&self) -> Result<bool> {
        if self.table_exists()? {
            return Ok(false);
        }
        self.gpkg.check_writable()?;
        self.gpkg
            .connection()
            .execute_batch(SQL_GPKG_GEOMETRY_COLUMNS)?;
        tracing::debug!(table = GPKG_GEOMETRY_COLUMNS, "catalog table created");
        Ok(true)
    }

    pub fn create(&self, geometry_columns: &GeometryColumns) -> Result<()> {
        self.gpkg.check_writable()?;
        if !self.table_exists()? {
            return Err(GpkgError::MissingTable {
                table: GPKG_GEOMETRY_COLUMNS.to_string(),
            });
        }
        for flag in [geometry_columns.z, geometry_columns.m] {
            if !(0..=2).contains(&flag) {
                return Err(GpkgError::InvalidDimension {
                    z: geometry_columns.z,
                    m: geometry_columns.m,
                });
            }
        }
        self.gpkg
            .connection()
            .execute(
                SQL_INSERT_GPKG_GEOMETRY_COLUMNS,
                params![
                    geometry_columns.table_name,
                    geometry_columns.column_name,
                    geometry_type_to_str(geometry_columns.geometry_type),
                    geometry_columns.srs_id,
                    geometry_columns.z,
                    geometry_columns.m,
                ],
            )
            .map_err(|err| GpkgError::from_write(GPKG_GEOMETRY_COLUMNS, err))?;
        Ok(())
    }

    fn query(
        &self,
        where_clause: Option<&str>,
        param: Option<&dyn rusqlite::ToSql>,
    ) -> Result<Vec<GeometryColumns>> {
        if !self.table_exists()? {
            return Ok(Vec::new());
        }
        let mut sql = SQL_SELECT_GEOMETRY_COLUMNS.to_string();
        if let Some(where_clause) = where_clause {
            sql.push_str(" WHERE ");
            sql.push_str(where_clause);
        }
        sql.push_str(" ORDER BY table_name");

        let mut stmt = self.gpkg.connection().prepare(&sql)?;
        let mut rows = match param {
            Some(param) => stmt.query([param])?,
            None => stmt.query([])?,
        };
        let mut out = Vec::new();
        while let Some(row) = rows.next()? {
            out.push(GeometryColumns::from_row(row)?);
        }
        Ok(out)
    }

    pub fn query_for_all(&self) -> Result<Vec<GeometryColumns>> {
        self.query(None, None)
    }

    pub fn query_for_table(&self, table_name: &str) -> Result<Option<GeometryColumns>> {
        Ok(self
            .query(Some("table_name = ?1"), Some(&table_name))?
            .into_iter()
            .next())
    }

    pub fn query_for_srs(&self, srs_id: i32) -> Result<Vec<GeometryColumns>> {
        self.query(Some("srs_id = ?1"), Some(&srs_id))
    }

    pub fn delete_for_table(&self, table_name: &str) -> Result<usize> {
        self.gpkg.check_writable()?;
        if !self.table_exists()? {
            return Ok(0);
        }
        Ok(self.gpkg.connection().execute(
            &sql_delete(GPKG_GEOMETRY_COLUMNS, Some("table_name = ?1")),
            [table_name],
        )?)
    }
}
