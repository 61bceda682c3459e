use super::attributes::AttributesDao;
use super::features::FeatureDao;
use super::tiles::{TileDao, tile_table};
use crate::catalog::{
    BoundingBox, Contents, ContentsDao, ExtensionsDao, GeometryColumns, GeometryColumnsDao,
    SpatialReferenceSystemDao, TableKind, TileMatrixDao, TileMatrixSet, TileMatrixSetDao,
};
use crate::constraint::Constraints;
use crate::db::{TableInfo, list_tables, table_or_view_exists, with_savepoint};
use crate::error::{GpkgError, Result};
use crate::ogc_sql::initialize_gpkg;
use crate::sql_functions::register_spatial_functions;
use crate::user::{UserColumn, UserDao, UserTable};
use rusqlite::OpenFlags;
use std::path::Path;

#[derive(Debug)]
/// GeoPackage connection wrapper; hands out the catalog and user table DAOs.
pub struct Gpkg {
    conn: rusqlite::Connection,
    read_only: bool,
}

impl Gpkg {
    /// Open a GeoPackage in read-only mode.
    pub fn open_read_only<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = rusqlite::Connection::open_with_flags(path, OpenFlags::SQLITE_OPEN_READ_ONLY)?;
        register_spatial_functions(&conn)?;
        Ok(Self {
            conn,
            read_only: true,
        })
    }

    /// Open a GeoPackage in read-write mode.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(GpkgError::Message(format!(
                "GeoPackage file does not exist: {}",
                path.display()
            )));
        }

        let conn = rusqlite::Connection::open(path)?;
        register_spatial_functions(&conn)?;
        tracing::debug!(path = %path.display(), "geopackage opened");
        Ok(Self {
            conn,
            read_only: false,
        })
    }

    /// Create a new GeoPackage
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if path.exists() {
            return Err(GpkgError::Message(format!(
                "GeoPackage file already exists: {}",
                path.display()
            )));
        }

        let conn = rusqlite::Connection::open(path)?;
        let gpkg = Self::initialize(conn)?;
        tracing::info!(path = %path.display(), "geopackage created");
        Ok(gpkg)
    }

    /// Create a new GeoPackage in memory
    pub fn new_in_memory() -> Result<Self> {
        let conn = rusqlite::Connection::open_in_memory()?;
        Self::initialize(conn)
    }

    // Required tables plus the three SRS rows every GeoPackage must carry.
    fn initialize(conn: rusqlite::Connection) -> Result<Self> {
        initialize_gpkg(&conn)?;
        register_spatial_functions(&conn)?;
        let gpkg = Self {
            conn,
            read_only: false,
        };

        let srs = gpkg.srs_dao();
        srs.create_undefined_cartesian()?;
        srs.create_undefined_geographic()?;
        srs.create_wgs84()?;
        Ok(gpkg)
    }

    pub(crate) fn connection(&self) -> &rusqlite::Connection {
        &self.conn
    }

    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    pub(crate) fn check_writable(&self) -> Result<()> {
        if self.read_only {
            return Err(GpkgError::ReadOnly);
        }
        Ok(())
    }

    /// Turn SQLite foreign key enforcement on or off for this connection.
    pub fn set_foreign_keys(&self, enabled: bool) -> Result<()> {
        self.conn
            .pragma_update(None, "foreign_keys", if enabled { "ON" } else { "OFF" })?;
        Ok(())
    }

    pub fn contents_dao(&self) -> ContentsDao<'_> {
        ContentsDao::new(self)
    }

    pub fn srs_dao(&self) -> SpatialReferenceSystemDao<'_> {
        SpatialReferenceSystemDao::new(self)
    }

    pub fn geometry_columns_dao(&self) -> GeometryColumnsDao<'_> {
        GeometryColumnsDao::new(self)
    }

    pub fn tile_matrix_set_dao(&self) -> TileMatrixSetDao<'_> {
        TileMatrixSetDao::new(self)
    }

    pub fn tile_matrix_dao(&self) -> TileMatrixDao<'_> {
        TileMatrixDao::new(self)
    }

    pub fn extensions_dao(&self) -> ExtensionsDao<'_> {
        ExtensionsDao::new(self)
    }

    /// DAO over an existing attributes table.
    pub fn attributes_dao(&self, table_name: &str) -> Result<AttributesDao<'_>> {
        AttributesDao::open(self, table_name)
    }

    /// DAO over an existing feature table.
    pub fn feature_dao(&self, table_name: &str) -> Result<FeatureDao<'_>> {
        FeatureDao::open(self, table_name)
    }

    /// DAO over an existing tile table.
    pub fn tile_dao(&self, table_name: &str) -> Result<TileDao<'_>> {
        TileDao::open(self, table_name)
    }

    /// Create an attributes table and its contents row.
    pub fn create_attributes_table(
        &self,
        table_name: &str,
        columns: Vec<UserColumn>,
    ) -> Result<AttributesDao<'_>> {
        self.check_writable()?;
        let table = UserTable::new(TableKind::Attributes, table_name, columns, Constraints::new())?;

        with_savepoint(&self.conn, "create_attributes_table", || {
            let mut dao = UserDao::create_table(self, table)?;
            self.contents_dao()
                .create(&Contents::new(table_name, TableKind::Attributes))?;
            dao.refresh_contents()?;
            Ok(AttributesDao::from_dao(dao))
        })
    }

    /// Create a feature table with the registration rows it needs.
    ///
    /// The table gets an autoincrement primary key `id_column`, the geometry
    /// column described by `geometry_columns`, then `columns` (re-indexed to
    /// follow those two).
    pub fn create_feature_table(
        &self,
        geometry_columns: &GeometryColumns,
        id_column: &str,
        columns: Vec<UserColumn>,
    ) -> Result<FeatureDao<'_>> {
        self.check_writable()?;
        let table_name = geometry_columns.table_name.as_str();

        let mut all_columns = Vec::with_capacity(columns.len() + 2);
        all_columns.push(UserColumn::primary_key_column(0, id_column, true));
        all_columns.push(UserColumn::geometry_column(
            1,
            &geometry_columns.column_name,
            geometry_columns.geometry_type,
        ));
        for (offset, mut column) in columns.into_iter().enumerate() {
            column.set_index(offset + 2);
            all_columns.push(column);
        }
        let table = UserTable::new(TableKind::Features, table_name, all_columns, Constraints::new())?;

        with_savepoint(&self.conn, "create_feature_table", || {
            self.geometry_columns_dao().create_table()?;
            let mut dao = UserDao::create_table(self, table)?;
            self.contents_dao().create(
                &Contents::new(table_name, TableKind::Features).with_srs_id(geometry_columns.srs_id),
            )?;
            self.geometry_columns_dao().create(geometry_columns)?;
            dao.refresh_contents()?;
            Ok(FeatureDao::from_parts(dao, geometry_columns.clone()))
        })
    }

    /// Create a tile table, its contents row and its tile matrix set.
    ///
    /// Zoom levels are added afterwards with `TileDao::create_tile_matrix`.
    pub fn create_tile_table(
        &self,
        table_name: &str,
        srs_id: i32,
        extent: BoundingBox,
    ) -> Result<TileDao<'_>> {
        self.check_writable()?;
        let table = tile_table(table_name)?;

        with_savepoint(&self.conn, "create_tile_table", || {
            self.tile_matrix_set_dao().create_table()?;
            self.tile_matrix_dao().create_table()?;
            let mut dao = UserDao::create_table(self, table)?;
            self.contents_dao().create(
                &Contents::new(table_name, TableKind::Tiles)
                    .with_srs_id(srs_id)
                    .with_bounding_box(extent),
            )?;
            let tile_matrix_set = TileMatrixSet::new(table_name, srs_id, extent);
            self.tile_matrix_set_dao().create(&tile_matrix_set)?;
            dao.refresh_contents()?;
            Ok(TileDao::from_parts(dao, tile_matrix_set, Vec::new()))
        })
    }

    /// Remove a user table with its contents row and every catalog row that
    /// references it.
    pub fn delete_table(&self, table_name: &str) -> Result<()> {
        self.contents_dao().delete_table_cascade(table_name)
    }

    pub fn table_exists(&self, table_name: &str) -> Result<bool> {
        table_or_view_exists(&self.conn, table_name)
    }

    /// Column metadata of a table, or `None` if it does not exist.
    pub fn table_info(&self, table_name: &str) -> Result<Option<TableInfo>> {
        TableInfo::info(&self.conn, table_name)
    }

    /// Names of every table and view, catalog tables included.
    pub fn list_tables(&self) -> Result<Vec<String>> {
        list_tables(&self.conn)
    }
}

#[cfg(test)]
mod tests {
    use super::Gpkg;
    use crate::catalog::{BoundingBox, GeometryColumns, TableKind};
    use crate::error::{GpkgError, Result};
    use crate::types::{DataType, GeometryType};
    use crate::user::UserColumn;
    use std::path::PathBuf;

    fn temp_path(prefix: &str) -> PathBuf {
        use std::time::{SystemTime, UNIX_EPOCH};

        let mut path = std::env::temp_dir();
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("time")
            .as_nanos();
        path.push(format!("gpkg_core_{prefix}_{nanos}.gpkg"));
        path
    }

    #[test]
    fn new_fails_if_file_exists() {
        use std::fs;

        let path = temp_path("exists");
        fs::write(&path, []).expect("create temp file");
        let err = Gpkg::new(&path).expect_err("existing file should fail");
        match err {
            GpkgError::Message(message) => {
                assert!(message.contains("already exists"));
            }
            other => panic!("unexpected error: {other:?}"),
        }

        let _ = fs::remove_file(&path);
    }

    #[test]
    fn open_fails_if_missing_file() {
        let path = temp_path("missing");
        let err = Gpkg::open(&path).expect_err("missing file should fail");
        match err {
            GpkgError::Message(message) => {
                assert!(message.contains("does not exist"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn read_only_rejects_writes() -> Result<()> {
        let path = temp_path("read_only");
        {
            let gpkg = Gpkg::new(&path)?;
            gpkg.create_attributes_table(
                "notes",
                vec![
                    UserColumn::primary_key_column(0, "id", true),
                    UserColumn::new(1, "body", DataType::Text),
                ],
            )?;
        }

        let gpkg = Gpkg::open_read_only(&path)?;
        assert!(gpkg.is_read_only());
        let err = gpkg.delete_table("notes").expect_err("read-only should fail");
        assert!(matches!(err, GpkgError::ReadOnly));

        let dao = gpkg.attributes_dao("notes")?;
        let mut row = dao.new_row();
        row.set_value("body", "x")?;
        assert!(matches!(dao.create(&mut row), Err(GpkgError::ReadOnly)));
        assert_eq!(dao.count()?, 0);

        drop(dao);
        drop(gpkg);
        let _ = std::fs::remove_file(&path);
        Ok(())
    }

    #[test]
    fn new_package_has_required_catalog() -> Result<()> {
        let gpkg = Gpkg::new_in_memory()?;
        let tables = gpkg.list_tables()?;
        assert!(tables.contains(&"gpkg_contents".to_string()));
        assert!(tables.contains(&"gpkg_spatial_ref_sys".to_string()));
        assert!(!gpkg.table_exists("gpkg_geometry_columns")?);

        let application_id: i64 =
            gpkg.connection()
                .query_row("PRAGMA application_id", [], |row| row.get(0))?;
        assert_eq!(application_id, 0x4750_4B47);
        Ok(())
    }

    #[test]
    fn create_feature_table_registers_metadata() -> Result<()> {
        let gpkg = Gpkg::new_in_memory()?;
        let geometry_columns = GeometryColumns::new("places", "geom", GeometryType::Point, 4326);
        let dao = gpkg.create_feature_table(
            &geometry_columns,
            "fid",
            vec![UserColumn::new(7, "name", DataType::Text)],
        )?;
        assert_eq!(dao.table().column_names().collect::<Vec<_>>(), vec!["fid", "geom", "name"]);

        let contents = gpkg.contents_dao().query_for_id("places")?.expect("contents");
        assert_eq!(contents.kind(), Some(TableKind::Features));
        assert_eq!(contents.srs_id, Some(4326));
        assert_eq!(
            gpkg.geometry_columns_dao().query_for_table("places")?,
            Some(geometry_columns)
        );

        let err = gpkg
            .create_feature_table(
                &GeometryColumns::new("places", "geom", GeometryType::Point, 4326),
                "fid",
                Vec::new(),
            )
            .expect_err("duplicate");
        assert!(matches!(err, GpkgError::LayerAlreadyExists { .. }));
        Ok(())
    }

    #[test]
    fn failed_creation_rolls_back() -> Result<()> {
        let gpkg = Gpkg::new_in_memory()?;
        let err = gpkg
            .create_feature_table(
                &GeometryColumns::new("places", "geom", GeometryType::Point, 9999),
                "fid",
                Vec::new(),
            )
            .expect_err("missing srs");
        assert!(matches!(err, GpkgError::MissingSpatialRefSysId { srs_id: 9999 }));
        assert!(!gpkg.table_exists("places")?);
        assert!(!gpkg.table_exists("gpkg_geometry_columns")?);
        Ok(())
    }

    #[test]
    fn delete_table_removes_everything() -> Result<()> {
        let gpkg = Gpkg::new_in_memory()?;
        gpkg.srs_dao().create_web_mercator()?;
        gpkg.create_tile_table("imagery", 3857, BoundingBox::new(0.0, 0.0, 10.0, 10.0))?;
        assert!(gpkg.tile_matrix_set_dao().query_for_table("imagery")?.is_some());

        gpkg.delete_table("imagery")?;
        assert!(!gpkg.table_exists("imagery")?);
        assert!(gpkg.contents_dao().query_for_id("imagery")?.is_none());
        assert!(gpkg.tile_matrix_set_dao().query_for_table("imagery")?.is_none());
        Ok(())
    }

    #[test]
    fn table_info_reports_columns() -> Result<()> {
        let gpkg = Gpkg::new_in_memory()?;
        assert!(gpkg.table_info("nope")?.is_none());
        let info = gpkg.table_info("gpkg_contents")?.expect("info");
        assert!(info.has_column("last_change"));
        Ok(())
    }
}
