use super::gpkg::Gpkg;
use crate::catalog::{BoundingBox, GeometryColumns, GeometryColumnsDao, SpatialReferenceSystem, TableKind};
use crate::error::{GpkgError, Result};
use crate::ogc_sql::quote_identifier;
use crate::types::Value;
use crate::user::{UserDao, UserQuery, UserRow};
use geo_traits::GeometryTrait;
use std::ops::{Deref, DerefMut};

/// DAO over a feature table.
///
/// Carries the table's `gpkg_geometry_columns` row next to the generic DAO.
#[derive(Debug)]
pub struct FeatureDao<'a> {
    dao: UserDao<'a>,
    geometry_columns: GeometryColumns,
}

impl<'a> FeatureDao<'a> {
    pub(crate) fn open(gpkg: &'a Gpkg, table_name: &str) -> Result<Self> {
        let geometry_columns = GeometryColumnsDao::new(gpkg)
            .query_for_table(table_name)?
            .ok_or_else(|| GpkgError::MissingGeometryColumn {
                layer_name: table_name.to_string(),
            })?;
        let dao = UserDao::open(gpkg, table_name, TableKind::Features)?;
        Ok(Self::from_parts(dao, geometry_columns))
    }

    pub(crate) fn from_parts(dao: UserDao<'a>, geometry_columns: GeometryColumns) -> Self {
        Self {
            dao,
            geometry_columns,
        }
    }

    pub fn geometry_columns(&self) -> &GeometryColumns {
        &self.geometry_columns
    }

    pub fn geometry_column_name(&self) -> &str {
        &self.geometry_columns.column_name
    }

    pub fn srs_id(&self) -> i32 {
        self.geometry_columns.srs_id
    }

    pub fn srs(&self) -> Result<Option<SpatialReferenceSystem>> {
        self.gpkg().srs_dao().query_for_id(self.srs_id())
    }

    /// Set the geometry of a row, encoded with this table's `srs_id`.
    pub fn set_geometry<G>(&self, row: &mut UserRow, geometry: &G) -> Result<()>
    where
        G: GeometryTrait<T = f64>,
    {
        row.set_geometry(geometry, self.srs_id())
    }

    /// Extent of every non-empty geometry in the table; `None` when there is
    /// none.
    pub fn bounding_box(&self) -> Result<Option<BoundingBox>> {
        let geom = quote_identifier(self.geometry_column_name());
        let sql = format!(
            "SELECT MIN(ST_MinX({geom})), MIN(ST_MinY({geom})), MAX(ST_MaxX({geom})), MAX(ST_MaxY({geom})) \
             FROM {} WHERE {geom} IS NOT NULL AND NOT ST_IsEmpty({geom})",
            quote_identifier(self.table_name())
        );
        let bounds: (Option<f64>, Option<f64>, Option<f64>, Option<f64>) = self
            .gpkg()
            .connection()
            .query_row(&sql, [], |row| {
                Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?))
            })?;
        Ok(match bounds {
            (Some(min_x), Some(min_y), Some(max_x), Some(max_y)) => {
                Some(BoundingBox::new(min_x, min_y, max_x, max_y))
            }
            _ => None,
        })
    }

    /// Recompute the extent and store it in the table's contents row.
    pub fn update_contents_bounding_box(&mut self) -> Result<Option<BoundingBox>> {
        let Some(bbox) = self.bounding_box()? else {
            return Ok(None);
        };
        self.gpkg()
            .contents_dao()
            .update_bounding_box(self.table_name(), &bbox)?;
        self.dao.refresh_contents()?;
        tracing::debug!(table = self.table_name(), ?bbox, "contents extent updated");
        Ok(Some(bbox))
    }

    /// Rows whose geometry envelope intersects `bbox`.
    pub fn query_for_bounding_box(&self, bbox: &BoundingBox) -> Result<UserQuery<'a>> {
        let geom = quote_identifier(self.geometry_column_name());
        let where_clause = format!(
            "ST_MaxX({geom}) >= ?1 AND ST_MinX({geom}) <= ?2 AND ST_MaxY({geom}) >= ?3 AND ST_MinY({geom}) <= ?4"
        );
        self.dao.query_where(
            &where_clause,
            vec![
                Value::Real(bbox.min_x),
                Value::Real(bbox.max_x),
                Value::Real(bbox.min_y),
                Value::Real(bbox.max_y),
            ],
        )
    }
}

impl<'a> Deref for FeatureDao<'a> {
    type Target = UserDao<'a>;

    fn deref(&self) -> &Self::Target {
        &self.dao
    }
}

impl DerefMut for FeatureDao<'_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.dao
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{DataType, GeometryType};
    use crate::user::UserColumn;
    use geo_traits::{CoordTrait, PointTrait};
    use geo_types::{LineString, Point};

    fn create_places(gpkg: &Gpkg) -> Result<FeatureDao<'_>> {
        gpkg.create_feature_table(
            &GeometryColumns::new("places", "geom", GeometryType::Point, 4326),
            "fid",
            vec![UserColumn::new(0, "name", DataType::Text)],
        )
    }

    #[test]
    fn geometry_round_trip() -> Result<()> {
        let gpkg = Gpkg::new_in_memory()?;
        let dao = create_places(&gpkg)?;

        let mut row = dao.new_row();
        row.set_value("name", "tokyo")?;
        dao.set_geometry(&mut row, &Point::new(139.7, 35.7))?;
        let id = dao.create(&mut row)?;

        let stored = dao.query_for_id(id)?.expect("stored");
        let geometry = stored.geometry()?.expect("geometry");
        let geo_traits::GeometryType::Point(point) = geometry.as_type() else {
            panic!("expected a point");
        };
        let coord = point.coord().expect("coord");
        assert_eq!((coord.x(), coord.y()), (139.7, 35.7));

        let srid: i64 = gpkg.connection().query_row(
            "SELECT ST_SRID(geom) FROM places WHERE fid = ?1",
            [id],
            |row| row.get(0),
        )?;
        assert_eq!(srid, 4326);
        Ok(())
    }

    #[test]
    fn null_geometry_reads_as_none() -> Result<()> {
        let gpkg = Gpkg::new_in_memory()?;
        let dao = create_places(&gpkg)?;
        let mut row = dao.new_row();
        row.set_value("name", "nowhere")?;
        let id = dao.create(&mut row)?;
        assert!(dao.query_for_id(id)?.expect("stored").geometry()?.is_none());
        assert_eq!(dao.bounding_box()?, None);
        Ok(())
    }

    #[test]
    fn bounding_box_updates_contents() -> Result<()> {
        let gpkg = Gpkg::new_in_memory()?;
        let mut dao = create_places(&gpkg)?;
        for (x, y) in [(1.0, 5.0), (-3.0, 2.0), (4.0, -1.0)] {
            let mut row = dao.new_row();
            dao.set_geometry(&mut row, &Point::new(x, y))?;
            dao.create(&mut row)?;
        }
        let mut empty = dao.new_row();
        dao.set_geometry(&mut empty, &LineString::<f64>::new(Vec::new()))?;
        dao.create(&mut empty)?;

        let expected = BoundingBox::new(-3.0, -1.0, 4.0, 5.0);
        assert_eq!(dao.update_contents_bounding_box()?, Some(expected));
        let contents = dao.table().contents().expect("contents");
        assert_eq!(contents.bounding_box(), Some(expected));
        let stored = gpkg.contents_dao().query_for_id("places")?.expect("contents");
        assert_eq!(stored.bounding_box(), Some(expected));

        let hits = dao
            .query_for_bounding_box(&BoundingBox::new(0.0, 0.0, 10.0, 10.0))?
            .rows()?;
        assert_eq!(hits.len(), 1);
        Ok(())
    }

    #[test]
    fn open_existing_feature_table() -> Result<()> {
        let gpkg = Gpkg::new_in_memory()?;
        {
            let dao = create_places(&gpkg)?;
            let mut row = dao.new_row();
            dao.set_geometry(&mut row, &LineString::from(vec![(0.0, 0.0), (1.0, 1.0)]))?;
            dao.create(&mut row)?;
        }

        let dao = gpkg.feature_dao("places")?;
        assert_eq!(dao.geometry_column_name(), "geom");
        assert_eq!(dao.table().geometry_index(), Some(1));
        assert_eq!(dao.srs()?.map(|srs| srs.srs_id), Some(4326));
        assert_eq!(dao.count()?, 1);

        assert!(matches!(
            gpkg.feature_dao("gpkg_contents"),
            Err(GpkgError::MissingGeometryColumn { .. })
        ));
        Ok(())
    }
}
