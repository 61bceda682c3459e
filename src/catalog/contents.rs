use super::bounding_box::BoundingBox;
use super::data_type::TableKind;
use super::srs::SpatialReferenceSystemDao;
use crate::db::{table_or_view_exists, with_savepoint};
use crate::error::{GpkgError, Result};
use crate::gpkg::Gpkg;
use crate::ogc_sql::{
    GPKG_CONTENTS, GPKG_EXTENSIONS, GPKG_GEOMETRY_COLUMNS, GPKG_TILE_MATRIX, GPKG_TILE_MATRIX_SET,
    SQL_DELETE_CONTENTS, SQL_INSERT_GPKG_CONTENTS, SQL_SELECT_CONTENTS,
    SQL_UPDATE_CONTENTS_BOUNDS, SQL_UPSERT_GPKG_CONTENTS, sql_delete, sql_drop_table,
};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use rusqlite::params;

const LAST_CHANGE_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3fZ";

/// A `gpkg_contents` row.
#[derive(Clone, Debug, PartialEq)]
pub struct Contents {
    pub table_name: String,
    /// Data type name as stored; a core kind or a registered alias.
    pub data_type: String,
    pub identifier: Option<String>,
    pub description: Option<String>,
    pub last_change: Option<DateTime<Utc>>,
    pub min_x: Option<f64>,
    pub min_y: Option<f64>,
    pub max_x: Option<f64>,
    pub max_y: Option<f64>,
    pub srs_id: Option<i32>,
}

impl Contents {
    pub fn new(table_name: impl Into<String>, kind: TableKind) -> Self {
        let table_name = table_name.into();
        Self {
            identifier: Some(table_name.clone()),
            table_name,
            data_type: kind.name().to_string(),
            description: None,
            last_change: None,
            min_x: None,
            min_y: None,
            max_x: None,
            max_y: None,
            srs_id: None,
        }
    }

    pub fn with_srs_id(mut self, srs_id: i32) -> Self {
        self.srs_id = Some(srs_id);
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_bounding_box(mut self, bbox: BoundingBox) -> Self {
        self.set_bounding_box(bbox);
        self
    }

    /// Core kind of the data type, resolving registered aliases.
    pub fn kind(&self) -> Option<TableKind> {
        TableKind::from_name(&self.data_type)
    }

    /// The extent, if all four bounds are set.
    pub fn bounding_box(&self) -> Option<BoundingBox> {
        Some(BoundingBox::new(
            self.min_x?,
            self.min_y?,
            self.max_x?,
            self.max_y?,
        ))
    }

    pub fn set_bounding_box(&mut self, bbox: BoundingBox) {
        self.min_x = Some(bbox.min_x);
        self.min_y = Some(bbox.min_y);
        self.max_x = Some(bbox.max_x);
        self.max_y = Some(bbox.max_y);
    }

    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        let table_name: String = row.get("table_name")?;
        let last_change: Option<String> = row.get("last_change")?;
        let last_change = last_change.and_then(|raw| {
            let parsed = parse_last_change(&raw);
            if parsed.is_none() {
                tracing::warn!(table = %table_name, last_change = %raw, "unparseable last_change timestamp");
            }
            parsed
        });

        Ok(Self {
            data_type: row.get("data_type")?,
            identifier: row.get("identifier")?,
            description: row.get("description")?,
            last_change,
            min_x: row.get("min_x")?,
            min_y: row.get("min_y")?,
            max_x: row.get("max_x")?,
            max_y: row.get("max_y")?,
            srs_id: row.get("srs_id")?,
            table_name,
        })
    }
}

fn format_last_change(timestamp: &DateTime<Utc>) -> String {
    timestamp.format(LAST_CHANGE_FORMAT).to_string()
}

/// Parse `last_change`, accepting RFC 3339 and the common SQLite layouts.
fn parse_last_change(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(timestamp) = DateTime::parse_from_rfc3339(raw) {
        return Some(timestamp.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.fZ", "%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

/// Access to `gpkg_contents`.
#[derive(Clone, Copy, Debug)]
pub struct ContentsDao<'a> {
    gpkg: &'a Gpkg,
}

impl<'a> ContentsDao<'a> {
    pub fn new(gpkg: &'a Gpkg) -> Self {
        Self { gpkg }
    }

    fn conn(&self) -> &'a rusqlite::Connection {
        self.gpkg.connection()
    }

    pub fn table_exists(&self) -> Result<bool> {
        table_or_view_exists(self.conn(), GPKG_CONTENTS)
    }

    /// Check the prerequisites of writing a contents row.
    pub fn validate(&self, contents: &Contents) -> Result<TableKind> {
        let conn = self.conn();
        let kind = contents.kind().ok_or_else(|| GpkgError::UnknownDataType {
            table: contents.table_name.clone(),
            data_type: contents.data_type.clone(),
        })?;

        if !table_or_view_exists(conn, &contents.table_name)? {
            return Err(GpkgError::MissingTable {
                table: contents.table_name.clone(),
            });
        }

        let required: &[&'static str] = match kind {
            TableKind::Features => &[GPKG_GEOMETRY_COLUMNS],
            TableKind::Tiles => &[GPKG_TILE_MATRIX_SET, GPKG_TILE_MATRIX],
            TableKind::Attributes => &[],
        };
        for &required in required {
            if !table_or_view_exists(conn, required)? {
                return Err(GpkgError::MissingPrerequisiteTable {
                    table_name: contents.table_name.clone(),
                    data_type: contents.data_type.clone(),
                    required,
                });
            }
        }

        if let Some(srs_id) = contents.srs_id {
            if SpatialReferenceSystemDao::new(self.gpkg)
                .query_for_id(srs_id)?
                .is_none()
            {
                return Err(GpkgError::MissingSpatialRefSysId { srs_id });
            }
        }

        Ok(kind)
    }

    fn write(&self, sql: &str, contents: &Contents) -> Result<()> {
        self.gpkg.check_writable()?;
        self.validate(contents)?;

        let last_change = format_last_change(&contents.last_change.unwrap_or_else(Utc::now));
        self.conn()
            .execute(
                sql,
                params![
                    contents.table_name,
                    contents.data_type,
                    contents.identifier,
                    contents.description,
                    last_change,
                    contents.min_x,
                    contents.min_y,
                    contents.max_x,
                    contents.max_y,
                    contents.srs_id,
                ],
            )
            .map_err(|err| GpkgError::from_write(GPKG_CONTENTS, err))?;
        tracing::debug!(table = %contents.table_name, data_type = %contents.data_type, "contents written");
        Ok(())
    }

    /// Insert a contents row. Fails if one already exists for the table.
    pub fn create(&self, contents: &Contents) -> Result<()> {
        self.write(SQL_INSERT_GPKG_CONTENTS, contents)
    }

    /// Insert or replace the contents row of a table.
    pub fn create_or_update(&self, contents: &Contents) -> Result<()> {
        self.write(SQL_UPSERT_GPKG_CONTENTS, contents)
    }

    pub fn query_for_id(&self, table_name: &str) -> Result<Option<Contents>> {
        Ok(self
            .query(Some("table_name = ?1"), [table_name])?
            .into_iter()
            .next())
    }

    pub fn query_for_all(&self) -> Result<Vec<Contents>> {
        self.query(None, [])
    }

    /// Rows whose data type resolves to `kind`, including registered aliases.
    pub fn query_for_type(&self, kind: TableKind) -> Result<Vec<Contents>> {
        Ok(self
            .query_for_all()?
            .into_iter()
            .filter(|contents| contents.kind() == Some(kind))
            .collect())
    }

    pub fn table_names(&self) -> Result<Vec<String>> {
        Ok(self
            .query_for_all()?
            .into_iter()
            .map(|contents| contents.table_name)
            .collect())
    }

    pub fn tables_of_type(&self, kind: TableKind) -> Result<Vec<String>> {
        Ok(self
            .query_for_type(kind)?
            .into_iter()
            .map(|contents| contents.table_name)
            .collect())
    }

    fn query<P: rusqlite::Params>(
        &self,
        where_clause: Option<&str>,
        params: P,
    ) -> Result<Vec<Contents>> {
        if !self.table_exists()? {
            return Ok(Vec::new());
        }
        let mut sql = SQL_SELECT_CONTENTS.to_string();
        if let Some(where_clause) = where_clause {
            sql.push_str(" WHERE ");
            sql.push_str(where_clause);
        }
        sql.push_str(" ORDER BY table_name");

        let mut stmt = self.conn().prepare(&sql)?;
        let rows = stmt
            .query_map(params, Contents::from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Set the extent of a table and touch `last_change`.
    pub fn update_bounding_box(&self, table_name: &str, bbox: &BoundingBox) -> Result<usize> {
        self.gpkg.check_writable()?;
        let last_change = format_last_change(&Utc::now());
        Ok(self.conn().execute(
            SQL_UPDATE_CONTENTS_BOUNDS,
            params![
                table_name,
                bbox.min_x,
                bbox.min_y,
                bbox.max_x,
                bbox.max_y,
                last_change
            ],
        )?)
    }

    /// Delete only the contents row.
    pub fn delete(&self, table_name: &str) -> Result<usize> {
        self.gpkg.check_writable()?;
        if !self.table_exists()? {
            return Ok(0);
        }
        Ok(self.conn().execute(SQL_DELETE_CONTENTS, [table_name])?)
    }

    /// Delete a contents row together with its kind-specific metadata.
    ///
    /// In order: geometry columns row (features), tile matrices then tile
    /// matrix set (tiles), the user table itself (attributes or unregistered
    /// data types), then the contents row. Missing catalog tables are
    /// skipped. Returns the number of contents rows deleted.
    pub fn delete_cascade(&self, contents: &Contents) -> Result<usize> {
        self.gpkg.check_writable()?;
        let conn = self.conn();
        let table_name = contents.table_name.as_str();

        with_savepoint(conn, "contents_delete_cascade", || {
            match contents.kind() {
                Some(TableKind::Features) => {
                    delete_if_exists(conn, GPKG_GEOMETRY_COLUMNS, table_name)?;
                }
                Some(TableKind::Tiles) => {
                    delete_if_exists(conn, GPKG_TILE_MATRIX, table_name)?;
                    delete_if_exists(conn, GPKG_TILE_MATRIX_SET, table_name)?;
                }
                Some(TableKind::Attributes) | None => {
                    conn.execute_batch(&sql_drop_table(table_name))?;
                }
            }
            let deleted = self.delete(table_name)?;
            tracing::info!(table = table_name, data_type = %contents.data_type, deleted, "contents deleted with cascade");
            Ok(deleted)
        })
    }

    /// Cascade-delete the contents row of a table, if any.
    pub fn delete_cascade_by_id(&self, table_name: &str) -> Result<usize> {
        match self.query_for_id(table_name)? {
            Some(contents) => self.delete_cascade(&contents),
            None => Ok(0),
        }
    }

    /// Remove a user table completely: contents cascade, extension rows and
    /// the table itself.
    pub fn delete_table_cascade(&self, table_name: &str) -> Result<()> {
        self.gpkg.check_writable()?;
        let conn = self.conn();
        with_savepoint(conn, "delete_table_cascade", || {
            self.delete_cascade_by_id(table_name)?;
            delete_if_exists(conn, GPKG_EXTENSIONS, table_name)?;
            conn.execute_batch(&sql_drop_table(table_name))?;
            tracing::info!(table = table_name, "table deleted with cascade");
            Ok(())
        })
    }
}

/// `DELETE FROM <catalog> WHERE table_name = ?`, a no-op if the catalog table
/// does not exist.
fn delete_if_exists(
    conn: &rusqlite::Connection,
    catalog_table: &str,
    table_name: &str,
) -> Result<usize> {
    if !table_or_view_exists(conn, catalog_table)? {
        return Ok(0);
    }
    let sql = sql_delete(catalog_table, Some("table_name = ?1"));
    Ok(conn.execute(&sql, [table_name])?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{GeometryColumns, TileMatrix, TileMatrixSet};
    use crate::types::GeometryType;

    fn create_plain_table(gpkg: &Gpkg, name: &str) -> Result<()> {
        gpkg.connection()
            .execute_batch(&format!("CREATE TABLE {name} (id INTEGER PRIMARY KEY)"))?;
        Ok(())
    }

    #[test]
    fn features_require_geometry_columns_table() -> Result<()> {
        let gpkg = Gpkg::new_in_memory()?;
        create_plain_table(&gpkg, "roads")?;
        let dao = gpkg.contents_dao();

        let contents = Contents::new("roads", TableKind::Features).with_srs_id(4326);
        let err = dao.create_or_update(&contents).expect_err("missing prerequisite");
        assert!(matches!(
            err,
            GpkgError::MissingPrerequisiteTable {
                required: GPKG_GEOMETRY_COLUMNS,
                ..
            }
        ));
        assert!(dao.query_for_id("roads")?.is_none());
        Ok(())
    }

    #[test]
    fn rejects_missing_tables_and_srs() -> Result<()> {
        let gpkg = Gpkg::new_in_memory()?;
        let dao = gpkg.contents_dao();

        let err = dao
            .create(&Contents::new("nope", TableKind::Attributes))
            .expect_err("missing table");
        assert!(matches!(err, GpkgError::MissingTable { .. }));

        create_plain_table(&gpkg, "notes")?;
        let err = dao
            .create(&Contents::new("notes", TableKind::Attributes).with_srs_id(999))
            .expect_err("missing srs");
        assert!(matches!(err, GpkgError::MissingSpatialRefSysId { srs_id: 999 }));

        let mut unknown = Contents::new("notes", TableKind::Attributes);
        unknown.data_type = "mystery".to_string();
        let err = dao.create(&unknown).expect_err("unknown data type");
        assert!(matches!(err, GpkgError::UnknownDataType { .. }));
        Ok(())
    }

    #[test]
    fn create_query_and_update() -> Result<()> {
        let gpkg = Gpkg::new_in_memory()?;
        create_plain_table(&gpkg, "notes")?;
        let dao = gpkg.contents_dao();

        let contents = Contents::new("notes", TableKind::Attributes).with_description("memo");
        dao.create(&contents)?;
        assert!(dao.create(&contents).expect_err("duplicate").is_constraint_violation());

        let stored = dao.query_for_id("notes")?.expect("stored");
        assert_eq!(stored.description.as_deref(), Some("memo"));
        assert!(stored.last_change.is_some());
        assert_eq!(dao.tables_of_type(TableKind::Attributes)?, vec!["notes"]);
        assert!(dao.tables_of_type(TableKind::Features)?.is_empty());

        dao.create_or_update(&stored.clone().with_description("updated"))?;
        let stored = dao.query_for_id("notes")?.expect("stored");
        assert_eq!(stored.description.as_deref(), Some("updated"));

        dao.update_bounding_box("notes", &BoundingBox::new(0.0, 1.0, 2.0, 3.0))?;
        let stored = dao.query_for_id("notes")?.expect("stored");
        assert_eq!(stored.bounding_box(), Some(BoundingBox::new(0.0, 1.0, 2.0, 3.0)));
        Ok(())
    }

    #[test]
    fn tiles_cascade_removes_matrix_metadata() -> Result<()> {
        let gpkg = Gpkg::new_in_memory()?;
        gpkg.tile_matrix_set_dao().create_table()?;
        gpkg.tile_matrix_dao().create_table()?;
        create_plain_table(&gpkg, "imagery")?;

        let dao = gpkg.contents_dao();
        let contents = Contents::new("imagery", TableKind::Tiles).with_srs_id(3857);
        gpkg.srs_dao().create_web_mercator()?;
        dao.create(&contents)?;

        let extent = BoundingBox::new(-1000.0, -1000.0, 1000.0, 1000.0);
        gpkg.tile_matrix_set_dao()
            .create(&TileMatrixSet::new("imagery", 3857, extent))?;
        for zoom in 0..2 {
            gpkg.tile_matrix_dao()
                .create(&TileMatrix::for_zoom("imagery", zoom, &extent, 256, 256)?)?;
        }

        let deleted = dao.delete_cascade(&contents)?;
        assert!(deleted >= 1);
        assert!(dao.query_for_id("imagery")?.is_none());
        assert!(gpkg.tile_matrix_set_dao().query_for_table("imagery")?.is_none());
        assert!(gpkg.tile_matrix_dao().query_for_table("imagery")?.is_empty());
        // tile tables survive a contents cascade
        assert!(gpkg.table_exists("imagery")?);
        Ok(())
    }

    #[test]
    fn attributes_cascade_drops_the_table() -> Result<()> {
        let gpkg = Gpkg::new_in_memory()?;
        create_plain_table(&gpkg, "notes")?;
        let dao = gpkg.contents_dao();
        dao.create(&Contents::new("notes", TableKind::Attributes))?;

        assert_eq!(dao.delete_cascade_by_id("notes")?, 1);
        assert!(!gpkg.table_exists("notes")?);
        assert_eq!(dao.delete_cascade_by_id("notes")?, 0);
        Ok(())
    }

    #[test]
    fn features_cascade_removes_geometry_columns() -> Result<()> {
        let gpkg = Gpkg::new_in_memory()?;
        gpkg.geometry_columns_dao().create_table()?;
        create_plain_table(&gpkg, "roads")?;

        let dao = gpkg.contents_dao();
        dao.create(&Contents::new("roads", TableKind::Features).with_srs_id(4326))?;
        gpkg.geometry_columns_dao().create(&GeometryColumns::new(
            "roads",
            "geom",
            GeometryType::LineString,
            4326,
        ))?;

        dao.delete_table_cascade("roads")?;
        assert!(gpkg.geometry_columns_dao().query_for_table("roads")?.is_none());
        assert!(dao.query_for_id("roads")?.is_none());
        assert!(!gpkg.table_exists("roads")?);
        Ok(())
    }

    #[test]
    fn parses_last_change_layouts() {
        assert!(parse_last_change("2024-01-02T03:04:05.678Z").is_some());
        assert!(parse_last_change("2024-01-02T03:04:05Z").is_some());
        assert!(parse_last_change("2024-01-02 03:04:05").is_some());
        assert!(parse_last_change("2024-01-02").is_some());
        assert!(parse_last_change("yesterday").is_none());

        let timestamp = parse_last_change("2024-01-02T03:04:05.678Z").expect("timestamp");
        assert_eq!(format_last_change(&timestamp), "2024-01-02T03:04:05.678Z");
    }
}
