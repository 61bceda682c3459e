use super::bounding_box::BoundingBox;
use crate::db::table_or_view_exists;
use crate::error::{GpkgError, Result};
use crate::gpkg::Gpkg;
use crate::ogc_sql::{
    GPKG_TILE_MATRIX, GPKG_TILE_MATRIX_SET, SQL_GPKG_TILE_MATRIX, SQL_GPKG_TILE_MATRIX_SET,
    SQL_INSERT_TILE_MATRIX, SQL_INSERT_TILE_MATRIX_SET, SQL_SELECT_TILE_MATRIX,
    SQL_SELECT_TILE_MATRIX_SET, sql_delete,
};
use rusqlite::params;

/// A `gpkg_tile_matrix_set` row: the SRS and full extent of a tile pyramid.
#[derive(Clone, Debug, PartialEq)]
pub struct TileMatrixSet {
    pub table_name: String,
    pub srs_id: i32,
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl TileMatrixSet {
    pub fn new(table_name: impl Into<String>, srs_id: i32, extent: BoundingBox) -> Self {
        Self {
            table_name: table_name.into(),
            srs_id,
            min_x: extent.min_x,
            min_y: extent.min_y,
            max_x: extent.max_x,
            max_y: extent.max_y,
        }
    }

    pub fn bounding_box(&self) -> BoundingBox {
        BoundingBox::new(self.min_x, self.min_y, self.max_x, self.max_y)
    }

    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            table_name: row.get("table_name")?,
            srs_id: row.get("srs_id")?,
            min_x: row.get("min_x")?,
            min_y: row.get("min_y")?,
            max_x: row.get("max_x")?,
            max_y: row.get("max_y")?,
        })
    }
}

/// A `gpkg_tile_matrix` row: the layout of one zoom level.
#[derive(Clone, Debug, PartialEq)]
pub struct TileMatrix {
    pub table_name: String,
    pub zoom_level: i32,
    pub matrix_width: i32,
    pub matrix_height: i32,
    pub tile_width: i32,
    pub tile_height: i32,
    pub pixel_x_size: f64,
    pub pixel_y_size: f64,
}

impl TileMatrix {
    /// Highest quadtree zoom level whose matrix width still fits in an `i32`.
    pub const MAX_QUADTREE_ZOOM: i32 = 30;

    /// Quadtree level over `extent`: `2^zoom` tiles per side.
    ///
    /// Fails for zoom levels outside `0..=30` and for non-positive tile sizes.
    pub fn for_zoom(
        table_name: impl Into<String>,
        zoom_level: i32,
        extent: &BoundingBox,
        tile_width: i32,
        tile_height: i32,
    ) -> Result<Self> {
        if !(0..=Self::MAX_QUADTREE_ZOOM).contains(&zoom_level) || tile_width <= 0 || tile_height <= 0 {
            return Err(GpkgError::InvalidTileMatrix {
                zoom_level,
                tile_width,
                tile_height,
            });
        }
        let tiles = 1_i32 << zoom_level;
        let tiles_per_side = 2f64.powi(zoom_level);
        Ok(Self {
            table_name: table_name.into(),
            zoom_level,
            matrix_width: tiles,
            matrix_height: tiles,
            tile_width,
            tile_height,
            pixel_x_size: extent.width() / (tiles_per_side * f64::from(tile_width)),
            pixel_y_size: extent.height() / (tiles_per_side * f64::from(tile_height)),
        })
    }

    /// Extent of the tile at `(column, row)`, rows counted from the top.
    pub fn tile_bounding_box(&self, extent: &BoundingBox, column: i32, row: i32) -> BoundingBox {
        let tile_span_x = extent.width() / f64::from(self.matrix_width);
        let tile_span_y = extent.height() / f64::from(self.matrix_height);
        let min_x = extent.min_x + tile_span_x * f64::from(column);
        let max_y = extent.max_y - tile_span_y * f64::from(row);
        BoundingBox::new(min_x, max_y - tile_span_y, min_x + tile_span_x, max_y)
    }

    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            table_name: row.get("table_name")?,
            zoom_level: row.get("zoom_level")?,
            matrix_width: row.get("matrix_width")?,
            matrix_height: row.get("matrix_height")?,
            tile_width: row.get("tile_width")?,
            tile_height: row.get("tile_height")?,
            pixel_x_size: row.get("pixel_x_size")?,
            pixel_y_size: row.get("pixel_y_size")?,
        })
    }
}

/// Access to `gpkg_tile_matrix_set`.
#[derive(Clone, Copy, Debug)]
pub struct TileMatrixSetDao<'a> {
    gpkg: &'a Gpkg,
}

impl<'a> TileMatrixSetDao<'a> {
    pub fn new(gpkg: &'a Gpkg) -> Self {
        Self { gpkg }
    }

    pub fn table_exists(&self) -> Result<bool> {
        table_or_view_exists(self.gpkg.connection(), GPKG_TILE_MATRIX_SET)
    }

    /// Create `gpkg_tile_matrix_set` if it does not exist yet.
    pub fn create_table(&self) -> Result<bool> {
        if self.table_exists()? {
            return Ok(false);
        }
        self.gpkg.check_writable()?;
        self.gpkg
            .connection()
            .execute_batch(SQL_GPKG_TILE_MATRIX_SET)?;
        tracing::debug!(table = GPKG_TILE_MATRIX_SET, "catalog table created");
        Ok(true)
    }

    pub fn create(&self, set: &TileMatrixSet) -> Result<()> {
        self.gpkg.check_writable()?;
        if !self.table_exists()? {
            return Err(GpkgError::MissingTable {
                table: GPKG_TILE_MATRIX_SET.to_string(),
            });
        }
        self.gpkg
            .connection()
            .execute(
                SQL_INSERT_TILE_MATRIX_SET,
                params![
                    set.table_name,
                    set.srs_id,
                    set.min_x,
                    set.min_y,
                    set.max_x,
                    set.max_y
                ],
            )
            .map_err(|err| GpkgError::from_write(GPKG_TILE_MATRIX_SET, err))?;
        Ok(())
    }

    fn query<P: rusqlite::Params>(&self, where_clause: &str, params: P) -> Result<Vec<TileMatrixSet>> {
        if !self.table_exists()? {
            return Ok(Vec::new());
        }
        let sql = format!("{SQL_SELECT_TILE_MATRIX_SET} WHERE {where_clause} ORDER BY table_name");
        let mut stmt = self.gpkg.connection().prepare(&sql)?;
        let sets = stmt
            .query_map(params, TileMatrixSet::from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(sets)
    }

    pub fn query_for_all(&self) -> Result<Vec<TileMatrixSet>> {
        self.query("1 = 1", [])
    }

    pub fn query_for_table(&self, table_name: &str) -> Result<Option<TileMatrixSet>> {
        Ok(self.query("table_name = ?1", [table_name])?.into_iter().next())
    }

    pub fn query_for_srs(&self, srs_id: i32) -> Result<Vec<TileMatrixSet>> {
        self.query("srs_id = ?1", [srs_id])
    }

    pub fn delete_for_table(&self, table_name: &str) -> Result<usize> {
        self.gpkg.check_writable()?;
        if !self.table_exists()? {
            return Ok(0);
        }
        Ok(self.gpkg.connection().execute(
            &sql_delete(GPKG_TILE_MATRIX_SET, Some("table_name = ?1")),
            [table_name],
        )?)
    }
}

/// Access to `gpkg_tile_matrix`.
#[derive(Clone, Copy, Debug)]
pub struct TileMatrixDao<'a> {
    gpkg: &'a Gpkg,
}

impl<'a> TileMatrixDao<'a> {
    pub fn new(gpkg: &'a Gpkg) -> Self {
        Self { gpkg }
    }

    pub fn table_exists(&self) -> Result<bool> {
        table_or_view_exists(self.gpkg.connection(), GPKG_TILE_MATRIX)
    }

    /// Create `gpkg_tile_matrix` and its validation triggers if missing.
    pub fn create_table(&self) -> Result<bool> {
        if self.table_exists()? {
            return Ok(false);
        }
        self.gpkg.check_writable()?;
        self.gpkg.connection().execute_batch(SQL_GPKG_TILE_MATRIX)?;
        tracing::debug!(table = GPKG_TILE_MATRIX, "catalog table created");
        Ok(true)
    }

    pub fn create(&self, matrix: &TileMatrix) -> Result<()> {
        self.gpkg.check_writable()?;
        if !self.table_exists()? {
            return Err(GpkgError::MissingTable {
                table: GPKG_TILE_MATRIX.to_string(),
            });
        }
        self.gpkg
            .connection()
            .execute(
                SQL_INSERT_TILE_MATRIX,
                params![
                    matrix.table_name,
                    matrix.zoom_level,
                    matrix.matrix_width,
                    matrix.matrix_height,
                    matrix.tile_width,
                    matrix.tile_height,
                    matrix.pixel_x_size,
                    matrix.pixel_y_size,
                ],
            )
            .map_err(|err| GpkgError::from_write(GPKG_TILE_MATRIX, err))?;
        Ok(())
    }

    fn query<P: rusqlite::Params>(&self, where_clause: &str, params: P) -> Result<Vec<TileMatrix>> {
        if !self.table_exists()? {
            return Ok(Vec::new());
        }
        let sql = format!("{SQL_SELECT_TILE_MATRIX} WHERE {where_clause} ORDER BY zoom_level");
        let mut stmt = self.gpkg.connection().prepare(&sql)?;
        let matrices = stmt
            .query_map(params, TileMatrix::from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(matrices)
    }

    /// All zoom levels of a tile table, lowest first.
    pub fn query_for_table(&self, table_name: &str) -> Result<Vec<TileMatrix>> {
        self.query("table_name = ?1", [table_name])
    }

    pub fn query_for_zoom(&self, table_name: &str, zoom_level: i32) -> Result<Option<TileMatrix>> {
        Ok(self
            .query("table_name = ?1 AND zoom_level = ?2", params![table_name, zoom_level])?
            .into_iter()
            .next())
    }

    /// Lowest and highest defined zoom level.
    pub fn zoom_range(&self, table_name: &str) -> Result<Option<(i32, i32)>> {
        let matrices = self.query_for_table(table_name)?;
        Ok(matrices
            .first()
            .zip(matrices.last())
            .map(|(min, max)| (min.zoom_level, max.zoom_level)))
    }

    pub fn delete_for_table(&self, table_name: &str) -> Result<usize> {
        self.gpkg.check_writable()?;
        if !self.table_exists()? {
            return Ok(0);
        }
        Ok(self.gpkg.connection().execute(
            &sql_delete(GPKG_TILE_MATRIX, Some("table_name = ?1")),
            [table_name],
        )?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{Contents, TableKind};

    fn tiles_fixture(gpkg: &Gpkg) -> Result<BoundingBox> {
        gpkg.srs_dao().create_web_mercator()?;
        gpkg.tile_matrix_set_dao().create_table()?;
        gpkg.tile_matrix_dao().create_table()?;
        gpkg.connection()
            .execute_batch("CREATE TABLE imagery (id INTEGER PRIMARY KEY)")?;
        gpkg.contents_dao()
            .create(&Contents::new("imagery", TableKind::Tiles).with_srs_id(3857))?;
        let extent = BoundingBox::new(-2000.0, -1000.0, 2000.0, 1000.0);
        gpkg.tile_matrix_set_dao()
            .create(&TileMatrixSet::new("imagery", 3857, extent))?;
        Ok(extent)
    }

    #[test]
    fn quadtree_levels() -> Result<()> {
        let gpkg = Gpkg::new_in_memory()?;
        let extent = tiles_fixture(&gpkg)?;
        let dao = gpkg.tile_matrix_dao();
        for zoom in [2, 0, 1] {
            dao.create(&TileMatrix::for_zoom("imagery", zoom, &extent, 256, 256)?)?;
        }

        let zooms: Vec<i32> = dao
            .query_for_table("imagery")?
            .iter()
            .map(|matrix| matrix.zoom_level)
            .collect();
        assert_eq!(zooms, vec![0, 1, 2]);
        assert_eq!(dao.zoom_range("imagery")?, Some((0, 2)));
        assert_eq!(dao.zoom_range("missing")?, None);

        let level = dao.query_for_zoom("imagery", 2)?.expect("zoom 2");
        assert_eq!(level.matrix_width, 4);
        assert!((level.pixel_x_size - 4000.0 / 1024.0).abs() < 1e-9);
        assert!((level.pixel_y_size - 2000.0 / 1024.0).abs() < 1e-9);

        let tile = level.tile_bounding_box(&extent, 0, 0);
        assert_eq!(tile, BoundingBox::new(-2000.0, 500.0, -1000.0, 1000.0));
        Ok(())
    }

    #[test]
    fn quadtree_zoom_bounds() -> Result<()> {
        let world = BoundingBox::new(-20037508.34, -20037508.34, 20037508.34, 20037508.34);

        let deep = TileMatrix::for_zoom("imagery", 23, &world, 256, 256)?;
        assert_eq!(deep.matrix_width, 1 << 23);
        assert!(deep.pixel_x_size.is_finite() && deep.pixel_x_size > 0.0);
        assert!((deep.pixel_x_size - world.width() / 2f64.powi(31)).abs() < 1e-12);

        let max = TileMatrix::for_zoom("imagery", TileMatrix::MAX_QUADTREE_ZOOM, &world, 256, 256)?;
        assert_eq!(max.matrix_width, 1 << 30);
        assert!(max.pixel_y_size > 0.0);

        for (zoom, width, height) in [(31, 1, 1), (-1, 256, 256), (0, 0, 256), (0, 256, -4)] {
            assert!(matches!(
                TileMatrix::for_zoom("imagery", zoom, &world, width, height),
                Err(GpkgError::InvalidTileMatrix { .. })
            ));
        }
        Ok(())
    }

    #[test]
    fn triggers_reject_negative_zoom() -> Result<()> {
        let gpkg = Gpkg::new_in_memory()?;
        let extent = tiles_fixture(&gpkg)?;
        let mut matrix = TileMatrix::for_zoom("imagery", 0, &extent, 256, 256)?;
        matrix.zoom_level = -1;
        assert!(gpkg.tile_matrix_dao().create(&matrix).is_err());
        Ok(())
    }

    #[test]
    fn matrix_set_round_trip() -> Result<()> {
        let gpkg = Gpkg::new_in_memory()?;
        let extent = tiles_fixture(&gpkg)?;
        let dao = gpkg.tile_matrix_set_dao();
        let set = dao.query_for_table("imagery")?.expect("matrix set");
        assert_eq!(set.bounding_box(), extent);
        assert_eq!(dao.query_for_srs(3857)?.len(), 1);
        assert_eq!(dao.query_for_all()?.len(), 1);
        assert_eq!(dao.delete_for_table("imagery")?, 1);
        assert!(dao.query_for_table("imagery")?.is_none());
        Ok(())
    }
}
