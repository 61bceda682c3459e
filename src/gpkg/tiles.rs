use super::gpkg::Gpkg;
use crate::catalog::{BoundingBox, TableKind, TileMatrix, TileMatrixDao, TileMatrixSet, TileMatrixSetDao};
use crate::constraint::{Constraint, Constraints};
use crate::error::{GpkgError, Result};
use crate::ogc_sql::quote_identifier;
use crate::types::{DataType, Value};
use crate::user::{UserColumn, UserDao, UserQuery, UserRow, UserTable};
use std::ops::{Deref, DerefMut};

/// Columns every tile pyramid table must have.
pub const REQUIRED_TILE_COLUMNS: [&str; 5] = ["id", "zoom_level", "tile_column", "tile_row", "tile_data"];

/// Standard tile table definition with `UNIQUE (zoom_level, tile_column, tile_row)`.
pub fn tile_table(table_name: &str) -> Result<UserTable> {
    let columns = vec![
        UserColumn::primary_key_column(0, "id", true),
        UserColumn::new(1, "zoom_level", DataType::Integer).not_null(),
        UserColumn::new(2, "tile_column", DataType::Integer).not_null(),
        UserColumn::new(3, "tile_row", DataType::Integer).not_null(),
        UserColumn::new(4, "tile_data", DataType::Blob).not_null(),
    ];
    let constraints: Constraints =
        std::iter::once(Constraint::table_unique(["zoom_level", "tile_column", "tile_row"])).collect();
    UserTable::new(TableKind::Tiles, table_name, columns, constraints)
}

/// DAO over a tile pyramid table.
///
/// Carries the tile matrix set and the tile matrices (lowest zoom first).
#[derive(Debug)]
pub struct TileDao<'a> {
    dao: UserDao<'a>,
    tile_matrix_set: TileMatrixSet,
    tile_matrices: Vec<TileMatrix>,
}

impl<'a> TileDao<'a> {
    pub(crate) fn open(gpkg: &'a Gpkg, table_name: &str) -> Result<Self> {
        let tile_matrix_set = TileMatrixSetDao::new(gpkg)
            .query_for_table(table_name)?
            .ok_or_else(|| {
                GpkgError::Message(format!("no tile matrix set for table: {table_name}"))
            })?;
        let tile_matrices = TileMatrixDao::new(gpkg).query_for_table(table_name)?;
        let dao = UserDao::open(gpkg, table_name, TableKind::Tiles)?;
        Ok(Self::from_parts(dao, tile_matrix_set, tile_matrices))
    }

    pub(crate) fn from_parts(
        dao: UserDao<'a>,
        tile_matrix_set: TileMatrixSet,
        tile_matrices: Vec<TileMatrix>,
    ) -> Self {
        Self {
            dao,
            tile_matrix_set,
            tile_matrices,
        }
    }

    pub fn tile_matrix_set(&self) -> &TileMatrixSet {
        &self.tile_matrix_set
    }

    pub fn tile_matrices(&self) -> &[TileMatrix] {
        &self.tile_matrices
    }

    pub fn tile_matrix(&self, zoom_level: i32) -> Option<&TileMatrix> {
        self.tile_matrices
            .iter()
            .find(|matrix| matrix.zoom_level == zoom_level)
    }

    pub fn min_zoom(&self) -> Option<i32> {
        self.tile_matrices.first().map(|matrix| matrix.zoom_level)
    }

    pub fn max_zoom(&self) -> Option<i32> {
        self.tile_matrices.last().map(|matrix| matrix.zoom_level)
    }

    /// Register a zoom level in `gpkg_tile_matrix`.
    pub fn create_tile_matrix(&mut self, matrix: TileMatrix) -> Result<()> {
        if matrix.table_name != self.table_name() {
            return Err(GpkgError::Message(format!(
                "tile matrix of table '{}' cannot be added to table '{}'",
                matrix.table_name,
                self.table_name()
            )));
        }
        TileMatrixDao::new(self.gpkg()).create(&matrix)?;
        let position = self
            .tile_matrices
            .partition_point(|existing| existing.zoom_level < matrix.zoom_level);
        self.tile_matrices.insert(position, matrix);
        Ok(())
    }

    /// Quadtree zoom levels `min_zoom..=max_zoom` over the matrix set extent.
    ///
    /// Every level is validated before any of them is written.
    pub fn create_quadtree_matrices(
        &mut self,
        min_zoom: i32,
        max_zoom: i32,
        tile_width: i32,
        tile_height: i32,
    ) -> Result<()> {
        let extent = self.tile_matrix_set.bounding_box();
        let matrices = (min_zoom..=max_zoom)
            .map(|zoom| TileMatrix::for_zoom(self.table_name(), zoom, &extent, tile_width, tile_height))
            .collect::<Result<Vec<_>>>()?;
        for matrix in matrices {
            self.create_tile_matrix(matrix)?;
        }
        Ok(())
    }

    /// A new row for one tile; the matrix for `zoom_level` must exist and
    /// the position must lie inside it.
    pub fn new_tile_row(
        &self,
        zoom_level: i32,
        tile_column: i32,
        tile_row: i32,
        tile_data: Vec<u8>,
    ) -> Result<UserRow> {
        let matrix = self.tile_matrix(zoom_level).ok_or_else(|| {
            GpkgError::Message(format!(
                "no tile matrix for zoom level {zoom_level} of table: {}",
                self.table_name()
            ))
        })?;
        if !(0..matrix.matrix_width).contains(&tile_column) || !(0..matrix.matrix_height).contains(&tile_row) {
            return Err(GpkgError::Message(format!(
                "tile ({tile_column}, {tile_row}) is outside the {}x{} matrix at zoom level {zoom_level}",
                matrix.matrix_width, matrix.matrix_height
            )));
        }

        let mut row = self.new_row();
        row.set_value("zoom_level", zoom_level)?;
        row.set_value("tile_column", tile_column)?;
        row.set_value("tile_row", tile_row)?;
        row.set_value("tile_data", tile_data)?;
        Ok(row)
    }

    pub fn query_for_tile(&self, zoom_level: i32, tile_column: i32, tile_row: i32) -> Result<Option<UserRow>> {
        self.dao
            .query_where(
                r#""zoom_level" = ?1 AND "tile_column" = ?2 AND "tile_row" = ?3"#,
                vec![
                    Value::Integer(i64::from(zoom_level)),
                    Value::Integer(i64::from(tile_column)),
                    Value::Integer(i64::from(tile_row)),
                ],
            )?
            .first()
    }

    pub fn query_for_zoom(&self, zoom_level: i32) -> Result<UserQuery<'a>> {
        self.dao.query_where(
            r#""zoom_level" = ?1"#,
            vec![Value::Integer(i64::from(zoom_level))],
        )
    }

    /// Distinct zoom levels that hold at least one tile.
    pub fn zoom_levels(&self) -> Result<Vec<i32>> {
        let sql = format!(
            "SELECT DISTINCT {zoom} FROM {} ORDER BY {zoom}",
            quote_identifier(self.table_name()),
            zoom = quote_identifier("zoom_level"),
        );
        let mut stmt = self.gpkg().connection().prepare(&sql)?;
        let zooms = stmt
            .query_map([], |row| row.get(0))?
            .collect::<std::result::Result<Vec<i32>, _>>()?;
        Ok(zooms)
    }

    pub fn count_at_zoom(&self, zoom_level: i32) -> Result<i64> {
        self.count_where(
            &format!("{} = ?1", quote_identifier("zoom_level")),
            &[Value::Integer(i64::from(zoom_level))],
        )
    }

    /// Extent of one tile in the matrix set's SRS.
    pub fn tile_bounding_box(&self, zoom_level: i32, tile_column: i32, tile_row: i32) -> Option<BoundingBox> {
        self.tile_matrix(zoom_level).map(|matrix| {
            matrix.tile_bounding_box(&self.tile_matrix_set.bounding_box(), tile_column, tile_row)
        })
    }
}

impl<'a> Deref for TileDao<'a> {
    type Target = UserDao<'a>;

    fn deref(&self) -> &Self::Target {
        &self.dao
    }
}

impl DerefMut for TileDao<'_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.dao
    }
}
