use super::contents::ContentsDao;
use super::extensions::{Extension, ExtensionScope, ExtensionsDao};
use super::projection::{Projection, ProjectionTransform};
use crate::db::{table_or_view_exists, with_savepoint};
use crate::error::{GpkgError, Result};
use crate::gpkg::Gpkg;
use crate::ogc_sql::{
    GPKG_GEOMETRY_COLUMNS, GPKG_SPATIAL_REF_SYS, GPKG_TILE_MATRIX, GPKG_TILE_MATRIX_SET,
    SQL_ADD_DEFINITION_12_063, SQL_COLUMN_EXISTS, SQL_DELETE_SRS, SQL_INSERT_SRS,
    SQL_INSERT_SRS_12_063, SQL_SELECT_SRS, SQL_SELECT_SRS_12_063, sql_delete,
};
use rusqlite::params;

const EPSG4326_WKT: &str = r#"GEOGCS["WGS 84",DATUM["WGS_1984",SPHEROID["WGS 84",6378137,298.257223563,AUTHORITY["EPSG","7030"]],AUTHORITY["EPSG","6326"]],PRIMEM["Greenwich",0,AUTHORITY["EPSG","8901"]],UNIT["degree",0.0174532925199433,AUTHORITY["EPSG","9122"]],AXIS["Latitude",NORTH],AXIS["Longitude",EAST],AUTHORITY["EPSG","4326"]]"#;
const EPSG3857_WKT: &str = r#"PROJCS["WGS 84 / Pseudo-Mercator",GEOGCS["WGS 84",DATUM["WGS_1984",SPHEROID["WGS 84",6378137,298.257223563,AUTHORITY["EPSG","7030"]],AUTHORITY["EPSG","6326"]],PRIMEM["Greenwich",0,AUTHORITY["EPSG","8901"]],UNIT["degree",0.0174532925199433,AUTHORITY["EPSG","9122"]],AUTHORITY["EPSG","4326"]],PROJECTION["Mercator_1SP"],PARAMETER["central_meridian",0],PARAMETER["scale_factor",1],PARAMETER["false_easting",0],PARAMETER["false_northing",0],UNIT["metre",1,AUTHORITY["EPSG","9001"]],AXIS["Easting",EAST],AXIS["Northing",NORTH],EXTENSION["PROJ4","+proj=merc +a=6378137 +b=6378137 +lat_ts=0 +lon_0=0 +x_0=0 +y_0=0 +k=1 +units=m +nadgrids=@null +wktext +no_defs"],AUTHORITY["EPSG","3857"]]"#;
const EPSG4979_WKT: &str = r#"GEOGCS["WGS 84",DATUM["WGS_1984",SPHEROID["WGS 84",6378137,298.257223563,AUTHORITY["EPSG","7030"]],AUTHORITY["EPSG","6326"]],PRIMEM["Greenwich",0,AUTHORITY["EPSG","8901"]],UNIT["degree",0.0174532925199433,AUTHORITY["EPSG","9122"]],AXIS["Latitude",NORTH],AXIS["Longitude",EAST],AXIS["Ellipsoidal height",UP],AUTHORITY["EPSG","4979"]]"#;

const EPSG4326_WKT2: &str = r#"GEOGCRS["WGS 84",DATUM["World Geodetic System 1984",ELLIPSOID["WGS 84",6378137,298.257223563,LENGTHUNIT["metre",1]]],PRIMEM["Greenwich",0,ANGLEUNIT["degree",0.0174532925199433]],CS[ellipsoidal,2],AXIS["geodetic latitude (Lat)",north],AXIS["geodetic longitude (Lon)",east],ANGLEUNIT["degree",0.0174532925199433],ID["EPSG",4326]]"#;
const EPSG3857_WKT2: &str = r#"PROJCRS["WGS 84 / Pseudo-Mercator",BASEGEOGCRS["WGS 84",DATUM["World Geodetic System 1984",ELLIPSOID["WGS 84",6378137,298.257223563]]],CONVERSION["Popular Visualisation Pseudo-Mercator",METHOD["Popular Visualisation Pseudo Mercator",ID["EPSG",1024]]],CS[Cartesian,2],AXIS["easting (X)",east],AXIS["northing (Y)",north],LENGTHUNIT["metre",1],ID["EPSG",3857]]"#;
const EPSG4979_WKT2: &str = r#"GEOGCRS["WGS 84",DATUM["World Geodetic System 1984",ELLIPSOID["WGS 84",6378137,298.257223563,LENGTHUNIT["metre",1]]],CS[ellipsoidal,3],AXIS["geodetic latitude (Lat)",north],AXIS["geodetic longitude (Lon)",east],AXIS["ellipsoidal height (h)",up],ID["EPSG",4979]]"#;

const UNDEFINED: &str = "undefined";

const CRS_WKT_EXTENSION: &str = "gpkg_crs_wkt";
const CRS_WKT_EXTENSION_DEFINITION: &str = "http://www.geopackage.org/spec/#extension_crs_wkt";
const DEFINITION_12_063: &str = "definition_12_063";

/// A `gpkg_spatial_ref_sys` row.
#[derive(Clone, Debug, PartialEq)]
pub struct SpatialReferenceSystem {
    pub srs_name: String,
    pub srs_id: i32,
    pub organization: String,
    pub organization_coordsys_id: i32,
    pub definition: String,
    pub description: Option<String>,
    /// WKT2 definition; only stored when the CRS WKT extension is installed.
    pub definition_12_063: Option<String>,
}

impl SpatialReferenceSystem {
    fn known(
        srs_name: &str,
        srs_id: i32,
        organization: &str,
        definition: &str,
        description: &str,
        definition_12_063: &str,
    ) -> Self {
        Self {
            srs_name: srs_name.to_string(),
            srs_id,
            organization: organization.to_string(),
            organization_coordsys_id: srs_id,
            definition: definition.to_string(),
            description: Some(description.to_string()),
            definition_12_063: Some(definition_12_063.to_string()),
        }
    }

    pub fn wgs84() -> Self {
        Self::known(
            "WGS 84 geodetic",
            4326,
            "EPSG",
            EPSG4326_WKT,
            "longitude/latitude coordinates in decimal degrees on the WGS 84 spheroid",
            EPSG4326_WKT2,
        )
    }

    pub fn undefined_cartesian() -> Self {
        Self::known(
            "Undefined cartesian SRS",
            -1,
            "NONE",
            UNDEFINED,
            "undefined Cartesian coordinate reference system",
            UNDEFINED,
        )
    }

    pub fn undefined_geographic() -> Self {
        Self::known(
            "Undefined geographic SRS",
            0,
            "NONE",
            UNDEFINED,
            "undefined geographic coordinate reference system",
            UNDEFINED,
        )
    }

    pub fn web_mercator() -> Self {
        Self::known(
            "WGS 84 / Pseudo-Mercator",
            3857,
            "EPSG",
            EPSG3857_WKT,
            "Web Mercator / Pseudo-Mercator (EPSG:3857)",
            EPSG3857_WKT2,
        )
    }

    pub fn wgs84_3d() -> Self {
        Self::known(
            "WGS 84 3D",
            4979,
            "EPSG",
            EPSG4979_WKT,
            "longitude/latitude/ellipsoidal height on the WGS 84 spheroid",
            EPSG4979_WKT2,
        )
    }

    /// Built-in definition for one of the supported organization / code pairs.
    pub fn well_known(organization: &str, organization_coordsys_id: i32) -> Option<Self> {
        match (
            organization.to_ascii_uppercase().as_str(),
            organization_coordsys_id,
        ) {
            ("EPSG", 4326) => Some(Self::wgs84()),
            ("EPSG", 3857) => Some(Self::web_mercator()),
            ("EPSG", 4979) => Some(Self::wgs84_3d()),
            ("NONE", -1) => Some(Self::undefined_cartesian()),
            ("NONE", 0) => Some(Self::undefined_geographic()),
            _ => None,
        }
    }

    pub fn projection(&self) -> Projection {
        Projection::new(&self.organization, self.organization_coordsys_id)
    }

    /// Transform from this SRS into `other`.
    pub fn transform_to(&self, other: &SpatialReferenceSystem) -> Result<ProjectionTransform> {
        ProjectionTransform::new(&self.projection(), &other.projection())
    }

    fn from_row(row: &rusqlite::Row<'_>, with_12_063: bool) -> rusqlite::Result<Self> {
        Ok(Self {
            srs_name: row.get("srs_name")?,
            srs_id: row.get("srs_id")?,
            organization: row.get("organization")?,
            organization_coordsys_id: row.get("organization_coordsys_id")?,
            definition: row.get("definition")?,
            description: row.get("description")?,
            definition_12_063: if with_12_063 {
                row.get(DEFINITION_12_063)?
            } else {
                None
            },
        })
    }
}

/// Access to `gpkg_spatial_ref_sys`.
#[derive(Clone, Copy, Debug)]
pub struct SpatialReferenceSystemDao<'a> {
    gpkg: &'a Gpkg,
}

impl<'a> SpatialReferenceSystemDao<'a> {
    pub fn new(gpkg: &'a Gpkg) -> Self {
        Self { gpkg }
    }

    fn conn(&self) -> &'a rusqlite::Connection {
        self.gpkg.connection()
    }

    /// Whether the `definition_12_063` column (CRS WKT extension) exists.
    pub fn has_definition_12_063(&self) -> Result<bool> {
        let exists: i64 = self.conn().query_row(
            SQL_COLUMN_EXISTS,
            [GPKG_SPATIAL_REF_SYS, DEFINITION_12_063],
            |row| row.get(0),
        )?;
        Ok(exists != 0)
    }

    fn query<P: rusqlite::Params>(
        &self,
        where_clause: Option<&str>,
        params: P,
    ) -> Result<Vec<SpatialReferenceSystem>> {
        if !table_or_view_exists(self.conn(), GPKG_SPATIAL_REF_SYS)? {
            return Ok(Vec::new());
        }
        let with_12_063 = self.has_definition_12_063()?;
        let mut sql = if with_12_063 {
            SQL_SELECT_SRS_12_063
        } else {
            SQL_SELECT_SRS
        }
        .to_string();
        if let Some(where_clause) = where_clause {
            sql.push_str(" WHERE ");
            sql.push_str(where_clause);
        }
        sql.push_str(" ORDER BY srs_id");

        let mut stmt = self.conn().prepare(&sql)?;
        let rows = stmt
            .query_map(params, |row| SpatialReferenceSystem::from_row(row, with_12_063))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn query_for_id(&self, srs_id: i32) -> Result<Option<SpatialReferenceSystem>> {
        Ok(self.query(Some("srs_id = ?1"), [srs_id])?.into_iter().next())
    }

    pub fn query_for_all(&self) -> Result<Vec<SpatialReferenceSystem>> {
        self.query(None, [])
    }

    /// Look up by organization (case-insensitive) and organization code.
    pub fn query_for_organization(
        &self,
        organization: &str,
        organization_coordsys_id: i32,
    ) -> Result<Option<SpatialReferenceSystem>> {
        Ok(self
            .query(
                Some("upper(organization) = upper(?1) AND organization_coordsys_id = ?2"),
                params![organization, organization_coordsys_id],
            )?
            .into_iter()
            .next())
    }

    /// Insert a row; `definition_12_063` is written only if the column exists.
    pub fn create(&self, srs: &SpatialReferenceSystem) -> Result<()> {
        self.gpkg.check_writable()?;
        let result = if self.has_definition_12_063()? {
            self.conn().execute(
                SQL_INSERT_SRS_12_063,
                params![
                    srs.srs_name,
                    srs.srs_id,
                    srs.organization,
                    srs.organization_coordsys_id,
                    srs.definition,
                    srs.description,
                    srs.definition_12_063.as_deref().unwrap_or(UNDEFINED),
                ],
            )
        } else {
            self.conn().execute(
                SQL_INSERT_SRS,
                params![
                    srs.srs_name,
                    srs.srs_id,
                    srs.organization,
                    srs.organization_coordsys_id,
                    srs.definition,
                    srs.description,
                ],
            )
        };
        result.map_err(|err| GpkgError::from_write(GPKG_SPATIAL_REF_SYS, err))?;
        tracing::debug!(srs_id = srs.srs_id, organization = %srs.organization, "spatial reference system created");
        Ok(())
    }

    /// Insert the row unless one with the same `srs_id` exists; returns the
    /// stored row.
    pub fn create_if_missing(&self, srs: &SpatialReferenceSystem) -> Result<SpatialReferenceSystem> {
        if let Some(existing) = self.query_for_id(srs.srs_id)? {
            let same_code = existing.organization.eq_ignore_ascii_case(&srs.organization)
                && existing.organization_coordsys_id == srs.organization_coordsys_id;
            if !same_code {
                return Err(GpkgError::ConflictingSrs {
                    srs_id: srs.srs_id,
                    expected: format!("{}:{}", srs.organization, srs.organization_coordsys_id),
                    actual: format!("{}:{}", existing.organization, existing.organization_coordsys_id),
                });
            }
            return Ok(existing);
        }
        self.create(srs)?;
        self.query_for_id(srs.srs_id)?
            .ok_or(GpkgError::MissingSpatialRefSysId { srs_id: srs.srs_id })
    }

    pub fn create_wgs84(&self) -> Result<SpatialReferenceSystem> {
        self.create_if_missing(&SpatialReferenceSystem::wgs84())
    }

    pub fn create_undefined_cartesian(&self) -> Result<SpatialReferenceSystem> {
        self.create_if_missing(&SpatialReferenceSystem::undefined_cartesian())
    }

    pub fn create_undefined_geographic(&self) -> Result<SpatialReferenceSystem> {
        self.create_if_missing(&SpatialReferenceSystem::undefined_geographic())
    }

    pub fn create_web_mercator(&self) -> Result<SpatialReferenceSystem> {
        self.create_if_missing(&SpatialReferenceSystem::web_mercator())
    }

    pub fn create_wgs84_3d(&self) -> Result<SpatialReferenceSystem> {
        self.create_if_missing(&SpatialReferenceSystem::wgs84_3d())
    }

    /// Existing row for the organization code, or the built-in definition.
    ///
    /// Only EPSG 4326, 3857 and 4979 and NONE -1 and 0 can be created; any
    /// other pair fails with `UnsupportedSrs`.
    pub fn get_or_create_code(
        &self,
        organization: &str,
        organization_coordsys_id: i32,
    ) -> Result<SpatialReferenceSystem> {
        if let Some(existing) = self.query_for_organization(organization, organization_coordsys_id)? {
            return Ok(existing);
        }
        let srs = SpatialReferenceSystem::well_known(organization, organization_coordsys_id)
            .ok_or_else(|| GpkgError::UnsupportedSrs {
                organization: organization.to_string(),
                organization_coordsys_id,
            })?;
        self.create_if_missing(&srs)
    }

    /// Delete only the SRS row.
    pub fn delete(&self, srs_id: i32) -> Result<usize> {
        self.gpkg.check_writable()?;
        Ok(self.conn().execute(SQL_DELETE_SRS, [srs_id])?)
    }

    /// Delete an SRS and everything referencing it.
    ///
    /// In order: contents rows (each with its own cascade), geometry columns
    /// rows, tile matrix sets with their tile matrices, then the SRS row. The
    /// whole cascade is rolled back if any step fails.
    pub fn delete_cascade(&self, srs_id: i32) -> Result<usize> {
        self.gpkg.check_writable()?;
        let conn = self.conn();

        with_savepoint(conn, "srs_delete_cascade", || {
            let contents_dao = ContentsDao::new(self.gpkg);
            for contents in contents_dao
                .query_for_all()?
                .into_iter()
                .filter(|contents| contents.srs_id == Some(srs_id))
            {
                contents_dao.delete_cascade(&contents)?;
            }

            if table_or_view_exists(conn, GPKG_GEOMETRY_COLUMNS)? {
                conn.execute(
                    &sql_delete(GPKG_GEOMETRY_COLUMNS, Some("srs_id = ?1")),
                    [srs_id],
                )?;
            }

            if table_or_view_exists(conn, GPKG_TILE_MATRIX_SET)? {
                if table_or_view_exists(conn, GPKG_TILE_MATRIX)? {
                    conn.execute(
                        &sql_delete(
                            GPKG_TILE_MATRIX,
                            Some("table_name IN (SELECT table_name FROM gpkg_tile_matrix_set WHERE srs_id = ?1)"),
                        ),
                        [srs_id],
                    )?;
                }
                conn.execute(
                    &sql_delete(GPKG_TILE_MATRIX_SET, Some("srs_id = ?1")),
                    [srs_id],
                )?;
            }

            let deleted = self.delete(srs_id)?;
            tracing::info!(srs_id, deleted, "spatial reference system deleted with cascade");
            Ok(deleted)
        })
    }

    /// Install the CRS WKT extension: add `definition_12_063`, fill it for
    /// the built-in systems and register the extension.
    pub fn create_crs_wkt_extension(&self) -> Result<()> {
        self.gpkg.check_writable()?;
        let conn = self.conn();
        with_savepoint(conn, "crs_wkt_extension", || {
            if !self.has_definition_12_063()? {
                conn.execute_batch(SQL_ADD_DEFINITION_12_063)?;
                for srs in self.query_for_all()? {
                    if let Some(known) =
                        SpatialReferenceSystem::well_known(&srs.organization, srs.organization_coordsys_id)
                    {
                        conn.execute(
                            "UPDATE gpkg_spatial_ref_sys SET definition_12_063 = ?1 WHERE srs_id = ?2",
                            params![known.definition_12_063, srs.srs_id],
                        )?;
                    }
                }
                tracing::info!("crs wkt extension installed");
            }

            let extensions = ExtensionsDao::new(self.gpkg);
            extensions.create_table()?;
            extensions.create_if_missing(&Extension::new(
                Some(GPKG_SPATIAL_REF_SYS),
                Some(DEFINITION_12_063),
                CRS_WKT_EXTENSION,
                CRS_WKT_EXTENSION_DEFINITION,
                ExtensionScope::ReadWrite,
            ))?;
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{BoundingBox, Contents, GeometryColumns, TableKind, TileMatrixSet};
    use crate::types::GeometryType;

    #[test]
    fn new_packages_have_required_systems() -> Result<()> {
        let gpkg = Gpkg::new_in_memory()?;
        let ids: Vec<i32> = gpkg
            .srs_dao()
            .query_for_all()?
            .into_iter()
            .map(|srs| srs.srs_id)
            .collect();
        assert_eq!(ids, vec![-1, 0, 4326]);
        Ok(())
    }

    #[test]
    fn get_or_create_code_is_idempotent() -> Result<()> {
        let gpkg = Gpkg::new_in_memory()?;
        let dao = gpkg.srs_dao();

        let first = dao.get_or_create_code("EPSG", 3857)?;
        let second = dao.get_or_create_code("epsg", 3857)?;
        assert_eq!(first.srs_id, second.srs_id);
        let count: i64 = gpkg.connection().query_row(
            "SELECT COUNT(*) FROM gpkg_spatial_ref_sys WHERE organization_coordsys_id = 3857",
            [],
            |row| row.get(0),
        )?;
        assert_eq!(count, 1);

        assert_eq!(dao.get_or_create_code("EPSG", 4326)?.srs_id, 4326);
        assert_eq!(dao.get_or_create_code("EPSG", 4326)?.srs_id, 4326);
        assert_eq!(dao.query_for_all()?.len(), 4);
        Ok(())
    }

    #[test]
    fn unknown_codes_are_not_invented() -> Result<()> {
        let gpkg = Gpkg::new_in_memory()?;
        let err = gpkg
            .srs_dao()
            .get_or_create_code("EPSG", 32654)
            .expect_err("unsupported");
        assert!(matches!(
            err,
            GpkgError::UnsupportedSrs {
                organization_coordsys_id: 32654,
                ..
            }
        ));
        assert!(err.to_string().contains("not supported"));
        Ok(())
    }

    #[test]
    fn well_known_id_taken_by_another_code() -> Result<()> {
        let gpkg = Gpkg::new_in_memory()?;
        gpkg.connection().execute(
            "INSERT INTO gpkg_spatial_ref_sys (srs_name, srs_id, organization, organization_coordsys_id, definition) \
             VALUES ('local grid', 3857, 'LOCAL', 7, 'undefined')",
            [],
        )?;

        let err = gpkg
            .srs_dao()
            .get_or_create_code("EPSG", 3857)
            .expect_err("srs_id 3857 holds LOCAL:7");
        assert!(matches!(err, GpkgError::ConflictingSrs { srs_id: 3857, .. }));
        assert!(gpkg.srs_dao().create_web_mercator().is_err());
        assert_eq!(gpkg.srs_dao().query_for_id(3857)?.map(|srs| srs.organization), Some("LOCAL".to_string()));
        Ok(())
    }

    #[test]
    fn delete_cascade_removes_referencing_metadata() -> Result<()> {
        let gpkg = Gpkg::new_in_memory()?;
        let dao = gpkg.srs_dao();
        dao.create_web_mercator()?;
        gpkg.geometry_columns_dao().create_table()?;
        gpkg.tile_matrix_set_dao().create_table()?;
        gpkg.tile_matrix_dao().create_table()?;
        gpkg.connection().execute_batch(
            "CREATE TABLE roads (id INTEGER PRIMARY KEY, geom LINESTRING);
             CREATE TABLE imagery (id INTEGER PRIMARY KEY);",
        )?;

        gpkg.contents_dao()
            .create(&Contents::new("roads", TableKind::Features).with_srs_id(3857))?;
        gpkg.geometry_columns_dao().create(&GeometryColumns::new(
            "roads",
            "geom",
            GeometryType::LineString,
            3857,
        ))?;
        gpkg.contents_dao()
            .create(&Contents::new("imagery", TableKind::Tiles).with_srs_id(3857))?;
        gpkg.tile_matrix_set_dao().create(&TileMatrixSet::new(
            "imagery",
            3857,
            BoundingBox::new(0.0, 0.0, 1.0, 1.0),
        ))?;

        assert_eq!(dao.delete_cascade(3857)?, 1);
        assert!(dao.query_for_id(3857)?.is_none());
        assert!(gpkg.contents_dao().query_for_id("roads")?.is_none());
        assert!(gpkg.geometry_columns_dao().query_for_table("roads")?.is_none());
        assert!(gpkg.tile_matrix_set_dao().query_for_table("imagery")?.is_none());
        assert!(gpkg.table_exists("imagery")?);
        assert!(dao.query_for_id(4326)?.is_some());
        Ok(())
    }

    #[test]
    fn crs_wkt_extension_adds_definitions() -> Result<()> {
        let gpkg = Gpkg::new_in_memory()?;
        let dao = gpkg.srs_dao();
        assert!(!dao.has_definition_12_063()?);
        assert!(dao.query_for_id(4326)?.expect("wgs84").definition_12_063.is_none());

        dao.create_crs_wkt_extension()?;
        dao.create_crs_wkt_extension()?;
        assert!(dao.has_definition_12_063()?);
        let wgs84 = dao.query_for_id(4326)?.expect("wgs84");
        assert!(wgs84.definition_12_063.is_some_and(|wkt| wkt.starts_with("GEOGCRS")));

        let mercator = dao.create_web_mercator()?;
        assert!(mercator.definition_12_063.is_some_and(|wkt| wkt.contains("3857")));
        assert_eq!(
            gpkg.extensions_dao().query_for_name(CRS_WKT_EXTENSION)?.len(),
            1
        );
        Ok(())
    }

    #[test]
    fn transforms_between_systems() -> Result<()> {
        let wgs84 = SpatialReferenceSystem::wgs84();
        let mercator = SpatialReferenceSystem::web_mercator();
        let transform = wgs84.transform_to(&mercator)?;
        let (x, _) = transform.transform(180.0, 0.0);
        assert!((x - 20_037_508.342_789_244).abs() < 1e-6);
        assert!(wgs84.transform_to(&SpatialReferenceSystem::undefined_cartesian()).is_err());
        Ok(())
    }
}
