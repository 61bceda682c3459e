// cf. https://www.geopackage.org/spec140/index.html#table_definition_sql

pub(crate) const GPKG_SPATIAL_REF_SYS: &str = "gpkg_spatial_ref_sys";
pub(crate) const GPKG_CONTENTS: &str = "gpkg_contents";
pub(crate) const GPKG_GEOMETRY_COLUMNS: &str = "gpkg_geometry_columns";
pub(crate) const GPKG_TILE_MATRIX_SET: &str = "gpkg_tile_matrix_set";
pub(crate) const GPKG_TILE_MATRIX: &str = "gpkg_tile_matrix";
pub(crate) const GPKG_EXTENSIONS: &str = "gpkg_extensions";

// 'GPKG' in ASCII
pub(crate) const GPKG_APPLICATION_ID: i64 = 0x4750_4B47;
pub(crate) const GPKG_USER_VERSION: i64 = 10400;

// gpkg_spatial_ref_sys: the SRS catalog referenced by gpkg_contents and
// gpkg_geometry_columns to describe spatial reference systems.
pub(crate) const SQL_GPKG_SPATIAL_REF_SYS: &str = "
CREATE TABLE gpkg_spatial_ref_sys (
  srs_name TEXT NOT NULL,
  srs_id INTEGER PRIMARY KEY,
  organization TEXT NOT NULL,
  organization_coordsys_id INTEGER NOT NULL,
  definition  TEXT NOT NULL,
  description TEXT
);
";

// gpkg_contents: lists all geospatial contents in the package with identifying
// and descriptive metadata for user display and access.
pub(crate) const SQL_GPKG_CONTENTS: &str = "
CREATE TABLE gpkg_contents (
  table_name TEXT NOT NULL PRIMARY KEY,
  data_type TEXT NOT NULL,
  identifier TEXT UNIQUE,
  description TEXT DEFAULT '',
  last_change DATETIME NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ','now')),
  min_x DOUBLE,
  min_y DOUBLE,
  max_x DOUBLE,
  max_y DOUBLE,
  srs_id INTEGER,
  CONSTRAINT fk_gc_r_srs_id FOREIGN KEY (srs_id) REFERENCES gpkg_spatial_ref_sys(srs_id)
);
";

// gpkg_geometry_columns: identifies geometry columns and geometry types for
// vector feature user data tables.
pub(crate) const SQL_GPKG_GEOMETRY_COLUMNS: &str = "
CREATE TABLE gpkg_geometry_columns (
  table_name TEXT NOT NULL,
  column_name TEXT NOT NULL,
  geometry_type_name TEXT NOT NULL,
  srs_id INTEGER NOT NULL,
  z TINYINT NOT NULL,
  m TINYINT NOT NULL,
  CONSTRAINT pk_geom_cols PRIMARY KEY (table_name, column_name),
  CONSTRAINT uk_gc_table_name UNIQUE (table_name),
  CONSTRAINT fk_gc_tn FOREIGN KEY (table_name) REFERENCES gpkg_contents(table_name),
  CONSTRAINT fk_gc_srs FOREIGN KEY (srs_id) REFERENCES gpkg_spatial_ref_sys (srs_id)
);
";

// gpkg_tile_matrix_set: defines SRS and overall bounds for all tiles in a tile
// pyramid user data table.
pub(crate) const SQL_GPKG_TILE_MATRIX_SET: &str = "
CREATE TABLE gpkg_tile_matrix_set (
  table_name TEXT NOT NULL PRIMARY KEY,
  srs_id INTEGER NOT NULL,
  min_x DOUBLE NOT NULL,
  min_y DOUBLE NOT NULL,
  max_x DOUBLE NOT NULL,
  max_y DOUBLE NOT NULL,
  CONSTRAINT fk_gtms_table_name FOREIGN KEY (table_name) REFERENCES gpkg_contents(table_name),
  CONSTRAINT fk_gtms_srs FOREIGN KEY (srs_id) REFERENCES gpkg_spatial_ref_sys (srs_id)
);
";

// gpkg_tile_matrix: documents tile pyramid structure per zoom level (tile size,
// matrix size, and pixel sizes) to support non-square tiles and varied intervals.
pub(crate) const SQL_GPKG_TILE_MATRIX: &str = "
CREATE TABLE gpkg_tile_matrix (
  table_name TEXT NOT NULL,
  zoom_level INTEGER NOT NULL,
  matrix_width INTEGER NOT NULL,
  matrix_height INTEGER NOT NULL,
  tile_width INTEGER NOT NULL,
  tile_height INTEGER NOT NULL,
  pixel_x_size DOUBLE NOT NULL,
  pixel_y_size DOUBLE NOT NULL,
  CONSTRAINT pk_ttm PRIMARY KEY (table_name, zoom_level),
  CONSTRAINT fk_tmm_table_name FOREIGN KEY (table_name) REFERENCES gpkg_contents(table_name)
);
CREATE TRIGGER 'gpkg_tile_matrix_zoom_level_insert' BEFORE INSERT ON 'gpkg_tile_matrix' FOR EACH ROW BEGIN SELECT RAISE(ABORT, 'insert on table ''gpkg_tile_matrix'' violates constraint: zoom_level cannot be less than 0') WHERE (NEW.zoom_level < 0); END;
CREATE TRIGGER 'gpkg_tile_matrix_zoom_level_update' BEFORE UPDATE of zoom_level ON 'gpkg_tile_matrix' FOR EACH ROW BEGIN SELECT RAISE(ABORT, 'update on table ''gpkg_tile_matrix'' violates constraint: zoom_level cannot be less than 0') WHERE (NEW.zoom_level < 0); END;
CREATE TRIGGER 'gpkg_tile_matrix_matrix_width_insert' BEFORE INSERT ON 'gpkg_tile_matrix' FOR EACH ROW BEGIN SELECT RAISE(ABORT, 'insert on table ''gpkg_tile_matrix'' violates constraint: matrix_width cannot be less than 1') WHERE (NEW.matrix_width < 1); END;
CREATE TRIGGER 'gpkg_tile_matrix_matrix_width_update' BEFORE UPDATE OF matrix_width ON 'gpkg_tile_matrix' FOR EACH ROW BEGIN SELECT RAISE(ABORT, 'update on table ''gpkg_tile_matrix'' violates constraint: matrix_width cannot be less than 1') WHERE (NEW.matrix_width < 1); END;
CREATE TRIGGER 'gpkg_tile_matrix_matrix_height_insert' BEFORE INSERT ON 'gpkg_tile_matrix' FOR EACH ROW BEGIN SELECT RAISE(ABORT, 'insert on table ''gpkg_tile_matrix'' violates constraint: matrix_height cannot be less than 1') WHERE (NEW.matrix_height < 1); END;
CREATE TRIGGER 'gpkg_tile_matrix_matrix_height_update' BEFORE UPDATE OF matrix_height ON 'gpkg_tile_matrix' FOR EACH ROW BEGIN SELECT RAISE(ABORT, 'update on table ''gpkg_tile_matrix'' violates constraint: matrix_height cannot be less than 1') WHERE (NEW.matrix_height < 1); END;
CREATE TRIGGER 'gpkg_tile_matrix_pixel_x_size_insert' BEFORE INSERT ON 'gpkg_tile_matrix' FOR EACH ROW BEGIN SELECT RAISE(ABORT, 'insert on table ''gpkg_tile_matrix'' violates constraint: pixel_x_size must be greater than 0') WHERE NOT (NEW.pixel_x_size > 0); END;
CREATE TRIGGER 'gpkg_tile_matrix_pixel_x_size_update' BEFORE UPDATE OF pixel_x_size ON 'gpkg_tile_matrix' FOR EACH ROW BEGIN SELECT RAISE(ABORT, 'update on table ''gpkg_tile_matrix'' violates constraint: pixel_x_size must be greater than 0') WHERE NOT (NEW.pixel_x_size > 0); END;
CREATE TRIGGER 'gpkg_tile_matrix_pixel_y_size_insert' BEFORE INSERT ON 'gpkg_tile_matrix' FOR EACH ROW BEGIN SELECT RAISE(ABORT, 'insert on table ''gpkg_tile_matrix'' violates constraint: pixel_y_size must be greater than 0') WHERE NOT (NEW.pixel_y_size > 0); END;
CREATE TRIGGER 'gpkg_tile_matrix_pixel_y_size_update' BEFORE UPDATE OF pixel_y_size ON 'gpkg_tile_matrix' FOR EACH ROW BEGIN SELECT RAISE(ABORT, 'update on table ''gpkg_tile_matrix'' violates constraint: pixel_y_size must be greater than 0') WHERE NOT (NEW.pixel_y_size > 0); END;
";

// gpkg_extensions: declares which extensions apply to the GeoPackage, a table,
// or a column so clients can detect requirements without scanning user tables.
pub(crate) const SQL_GPKG_EXTENSIONS: &str = "
CREATE TABLE gpkg_extensions (
  table_name TEXT,
  column_name TEXT,
  extension_name TEXT NOT NULL,
  definition TEXT NOT NULL,
  scope TEXT NOT NULL,
  CONSTRAINT ge_tce UNIQUE (table_name, column_name, extension_name)
);
";

// cf. https://www.geopackage.org/spec140/index.html#extension_crs_wkt
pub(crate) const SQL_ADD_DEFINITION_12_063: &str = "
ALTER TABLE gpkg_spatial_ref_sys ADD COLUMN definition_12_063 TEXT NOT NULL DEFAULT 'undefined'
";

pub(crate) const SQL_SELECT_TABLE_SQL: &str = "
SELECT sql FROM sqlite_master
WHERE name = ?1 COLLATE NOCASE AND type IN ('table', 'view')
";

pub(crate) const SQL_TABLE_OR_VIEW_EXISTS: &str = "
SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE name = ?1 COLLATE NOCASE AND type IN ('table', 'view'))
";

// SQLite does not report AUTOINCREMENT per column; search the table SQL.
pub(crate) const SQL_TABLE_HAS_AUTOINCREMENT: &str = "
SELECT EXISTS(
  SELECT 1 FROM sqlite_master
  WHERE name = ?1 COLLATE NOCASE AND type = 'table' AND upper(sql) LIKE '%AUTOINCREMENT%'
)
";

pub(crate) const SQL_LIST_TABLES: &str = "
SELECT name FROM sqlite_master
WHERE type IN ('table', 'view') AND name NOT LIKE 'sqlite_%'
ORDER BY name
";

pub(crate) const SQL_SELECT_CONTENTS: &str = "
SELECT table_name, data_type, identifier, description, last_change,
  min_x, min_y, max_x, max_y, srs_id
FROM gpkg_contents
";

pub(crate) const SQL_INSERT_GPKG_CONTENTS: &str = "
INSERT INTO gpkg_contents
  (table_name, data_type, identifier, description, last_change, min_x, min_y, max_x, max_y, srs_id)
VALUES
  (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
";

pub(crate) const SQL_UPSERT_GPKG_CONTENTS: &str = "
INSERT INTO gpkg_contents
  (table_name, data_type, identifier, description, last_change, min_x, min_y, max_x, max_y, srs_id)
VALUES
  (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
ON CONFLICT(table_name) DO UPDATE SET
  data_type = excluded.data_type,
  identifier = excluded.identifier,
  description = excluded.description,
  last_change = excluded.last_change,
  min_x = excluded.min_x,
  min_y = excluded.min_y,
  max_x = excluded.max_x,
  max_y = excluded.max_y,
  srs_id = excluded.srs_id
";

pub(crate) const SQL_UPDATE_CONTENTS_BOUNDS: &str = "
UPDATE gpkg_contents
SET min_x = ?2, min_y = ?3, max_x = ?4, max_y = ?5, last_change = ?6
WHERE table_name = ?1
";

pub(crate) const SQL_DELETE_CONTENTS: &str = "DELETE FROM gpkg_contents WHERE table_name = ?1";

pub(crate) const SQL_SELECT_SRS: &str = "
SELECT srs_name, srs_id, organization, organization_coordsys_id, definition, description
FROM gpkg_spatial_ref_sys
";

pub(crate) const SQL_SELECT_SRS_12_063: &str = "
SELECT srs_name, srs_id, organization, organization_coordsys_id, definition, description,
  definition_12_063
FROM gpkg_spatial_ref_sys
";

pub(crate) const SQL_INSERT_SRS: &str = "
INSERT INTO gpkg_spatial_ref_sys
  (srs_name, srs_id, organization, organization_coordsys_id, definition, description)
VALUES
  (?1, ?2, ?3, ?4, ?5, ?6)
";

pub(crate) const SQL_INSERT_SRS_12_063: &str = "
INSERT INTO gpkg_spatial_ref_sys
  (srs_name, srs_id, organization, organization_coordsys_id, definition, description, definition_12_063)
VALUES
  (?1, ?2, ?3, ?4, ?5, ?6, ?7)
";

pub(crate) const SQL_DELETE_SRS: &str = "DELETE FROM gpkg_spatial_ref_sys WHERE srs_id = ?1";

pub(crate) const SQL_SELECT_GEOMETRY_COLUMNS: &str = "
SELECT table_name, column_name, geometry_type_name, srs_id, z, m
FROM gpkg_geometry_columns
";

pub(crate) const SQL_INSERT_GPKG_GEOMETRY_COLUMNS: &str = "
INSERT INTO gpkg_geometry_columns
  (table_name, column_name, geometry_type_name, srs_id, z, m)
VALUES
  (?1, ?2, ?3, ?4, ?5, ?6)
";

pub(crate) const SQL_SELECT_TILE_MATRIX_SET: &str = "
SELECT table_name, srs_id, min_x, min_y, max_x, max_y
FROM gpkg_tile_matrix_set
";

pub(crate) const SQL_INSERT_TILE_MATRIX_SET: &str = "
INSERT INTO gpkg_tile_matrix_set
  (table_name, srs_id, min_x, min_y, max_x, max_y)
VALUES
  (?1, ?2, ?3, ?4, ?5, ?6)
";

pub(crate) const SQL_SELECT_TILE_MATRIX: &str = "
SELECT table_name, zoom_level, matrix_width, matrix_height, tile_width, tile_height,
  pixel_x_size, pixel_y_size
FROM gpkg_tile_matrix
";

pub(crate) const SQL_INSERT_TILE_MATRIX: &str = "
INSERT INTO gpkg_tile_matrix
  (table_name, zoom_level, matrix_width, matrix_height, tile_width, tile_height,
   pixel_x_size, pixel_y_size)
VALUES
  (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
";

pub(crate) const SQL_SELECT_EXTENSIONS: &str = "
SELECT table_name, column_name, extension_name, definition, scope
FROM gpkg_extensions
";

pub(crate) const SQL_INSERT_EXTENSION: &str = "
INSERT INTO gpkg_extensions
  (table_name, column_name, extension_name, definition, scope)
VALUES
  (?1, ?2, ?3, ?4, ?5)
";

pub(crate) const SQL_COLUMN_EXISTS: &str = "
SELECT EXISTS(SELECT 1 FROM pragma_table_info(?1) WHERE name = ?2)
";

pub(crate) fn initialize_gpkg(conn: &rusqlite::Connection) -> rusqlite::Result<()> {
    conn.execute_batch(&format!(
        "PRAGMA application_id = {GPKG_APPLICATION_ID}; PRAGMA user_version = {GPKG_USER_VERSION};"
    ))?;
    conn.execute_batch(SQL_GPKG_SPATIAL_REF_SYS)?;
    conn.execute_batch(SQL_GPKG_CONTENTS)?;
    Ok(())
}

/// Quote an identifier for use in generated SQL.
pub(crate) fn quote_identifier(name: &str) -> String {
    format!(r#""{}""#, name.replace('"', "\"\""))
}

pub(crate) fn quote_identifiers<'a, I>(names: I) -> String
where
    I: IntoIterator<Item = &'a str>,
{
    names
        .into_iter()
        .map(quote_identifier)
        .collect::<Vec<String>>()
        .join(", ")
}

pub(crate) fn sql_create_table(table_name: &str, definitions: &[String]) -> String {
    format!(
        "CREATE TABLE {} ({})",
        quote_identifier(table_name),
        definitions.join(", ")
    )
}

pub(crate) fn sql_drop_table(table_name: &str) -> String {
    format!("DROP TABLE IF EXISTS {}", quote_identifier(table_name))
}

pub(crate) fn sql_table_info(table_name: &str) -> String {
    format!("PRAGMA table_info({})", quote_identifier(table_name))
}

pub(crate) fn sql_add_column(table_name: &str, column_definition: &str) -> String {
    format!(
        "ALTER TABLE {} ADD COLUMN {column_definition}",
        quote_identifier(table_name)
    )
}

pub(crate) fn sql_rename_column(table_name: &str, column: &str, new_name: &str) -> String {
    format!(
        "ALTER TABLE {} RENAME COLUMN {} TO {}",
        quote_identifier(table_name),
        quote_identifier(column),
        quote_identifier(new_name)
    )
}

pub(crate) fn sql_drop_column(table_name: &str, column: &str) -> String {
    format!(
        "ALTER TABLE {} DROP COLUMN {}",
        quote_identifier(table_name),
        quote_identifier(column)
    )
}

pub(crate) fn sql_select<'a, I>(table_name: &str, columns: I, where_clause: Option<&str>) -> String
where
    I: IntoIterator<Item = &'a str>,
{
    let mut sql = format!(
        "SELECT {} FROM {}",
        quote_identifiers(columns),
        quote_identifier(table_name)
    );
    if let Some(where_clause) = where_clause {
        sql.push_str(" WHERE ");
        sql.push_str(where_clause);
    }
    sql
}

pub(crate) fn sql_count(table_name: &str, where_clause: Option<&str>) -> String {
    let mut sql = format!("SELECT COUNT(*) FROM {}", quote_identifier(table_name));
    if let Some(where_clause) = where_clause {
        sql.push_str(" WHERE ");
        sql.push_str(where_clause);
    }
    sql
}

pub(crate) fn sql_insert<'a, I>(table_name: &str, columns: I) -> String
where
    I: IntoIterator<Item = &'a str>,
{
    let columns: Vec<&str> = columns.into_iter().collect();
    if columns.is_empty() {
        return format!("INSERT INTO {} DEFAULT VALUES", quote_identifier(table_name));
    }

    let placeholders = (1..=columns.len())
        .map(|i| format!("?{i}"))
        .collect::<Vec<String>>()
        .join(", ");

    format!(
        "INSERT INTO {} ({}) VALUES ({placeholders})",
        quote_identifier(table_name),
        quote_identifiers(columns)
    )
}

/// `UPDATE` assigning `?1..?n` to the columns, keyed by `?{n+1}`.
pub(crate) fn sql_update<'a, I>(table_name: &str, columns: I, key_column: &str) -> String
where
    I: IntoIterator<Item = &'a str>,
{
    let mut count = 0;
    let assignments = columns
        .into_iter()
        .enumerate()
        .map(|(idx, name)| {
            count = idx + 1;
            format!("{}=?{}", quote_identifier(name), idx + 1)
        })
        .collect::<Vec<String>>()
        .join(", ");

    format!(
        "UPDATE {} SET {assignments} WHERE {}=?{}",
        quote_identifier(table_name),
        quote_identifier(key_column),
        count + 1
    )
}

pub(crate) fn sql_delete(table_name: &str, where_clause: Option<&str>) -> String {
    let mut sql = format!("DELETE FROM {}", quote_identifier(table_name));
    if let Some(where_clause) = where_clause {
        sql.push_str(" WHERE ");
        sql.push_str(where_clause);
    }
    sql
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_crud_statements() {
        assert_eq!(
            sql_insert("t", ["a", "b"]),
            r#"INSERT INTO "t" ("a", "b") VALUES (?1, ?2)"#
        );
        assert_eq!(
            sql_insert("t", std::iter::empty()),
            r#"INSERT INTO "t" DEFAULT VALUES"#
        );
        assert_eq!(
            sql_update("t", ["a", "b"], "id"),
            r#"UPDATE "t" SET "a"=?1, "b"=?2 WHERE "id"=?3"#
        );
        assert_eq!(
            sql_select("t", ["id"], Some(r#""id" = ?1"#)),
            r#"SELECT "id" FROM "t" WHERE "id" = ?1"#
        );
        assert_eq!(quote_identifier(r#"we"ird"#), r#""we""ird""#);
    }
}
