//! GeoPackage table metadata, user table DAOs and catalog engine built on top
//! of rusqlite.
//!
//! ## Overview
//!
//! - `Gpkg` owns the SQLite connection and hands out every DAO.
//! - `UserTable` / `UserColumn` describe a user table. Definitions are either
//!   built in code or read back from `PRAGMA table_info` plus the parsed
//!   `CREATE TABLE` statement, so named constraints and defaults survive.
//! - `UserDao` is the generic CRUD layer; `AttributesDao`, `FeatureDao` and
//!   `TileDao` add what is specific to each table kind.
//! - `UserRow` holds one row. A slot that was never set is left out of
//!   writes, so the column default applies.
//! - `ContentsDao`, `SpatialReferenceSystemDao` and the other catalog DAOs
//!   keep `gpkg_*` metadata consistent and run the cascading deletes.
//!
//! `Gpkg` supports several open modes:
//!
//! - `Gpkg::open_read_only(path)`: open an existing file without write access.
//! - `Gpkg::open(path)`: open an existing file for read/write.
//! - `Gpkg::new(path)`: create a new file.
//! - `Gpkg::new_in_memory()`: create a transient in-memory GeoPackage.
//!
//! ## Attributes
//!
//! ```no_run
//! use gpkg_core::{DataType, Gpkg, UserColumn};
//!
//! let gpkg = Gpkg::new_in_memory()?;
//! let dao = gpkg.create_attributes_table(
//!     "labels",
//!     vec![
//!         UserColumn::primary_key_column(0, "id", true),
//!         UserColumn::new(1, "name", DataType::Text).not_null(),
//!     ],
//! )?;
//!
//! let mut row = dao.new_row();
//! row.set_value("name", "hello")?;
//! let id = dao.create(&mut row)?;
//! assert_eq!(dao.count()?, 1);
//!
//! let stored = dao.query_for_id(id)?.ok_or("missing row")?;
//! let name: String = stored.get("name")?;
//! assert_eq!(name, "hello");
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Features
//!
//! Geometries accept anything that implements
//! `geo_traits::GeometryTrait<T = f64>` (for example `geo_types::Point`) and
//! are stored as GeoPackage binary blobs.
//!
//! ```no_run
//! use geo_types::Point;
//! use gpkg_core::{GeometryColumns, GeometryType, Gpkg};
//!
//! let gpkg = Gpkg::new_in_memory()?;
//! let mut dao = gpkg.create_feature_table(
//!     &GeometryColumns::new("places", "geom", GeometryType::Point, 4326),
//!     "fid",
//!     Vec::new(),
//! )?;
//!
//! let mut row = dao.new_row();
//! dao.set_geometry(&mut row, &Point::new(139.7, 35.7))?;
//! dao.create(&mut row)?;
//! let _extent = dao.update_contents_bounding_box()?;
//! # Ok::<(), gpkg_core::GpkgError>(())
//! ```
//!
//! ## Catalog
//!
//! ```no_run
//! use gpkg_core::Gpkg;
//!
//! let gpkg = Gpkg::open("data.gpkg")?;
//! let mercator = gpkg.srs_dao().get_or_create_code("EPSG", 3857)?;
//! for contents in gpkg.contents_dao().query_for_all()? {
//!     println!("{} ({})", contents.table_name, contents.data_type);
//! }
//! // removes the SRS and every table that references it
//! gpkg.srs_dao().delete_cascade(mercator.srs_id)?;
//! # Ok::<(), gpkg_core::GpkgError>(())
//! ```
mod conversions;
mod error;
mod geometry;
mod gpkg;
mod ogc_sql;
mod sql_functions;
mod types;

pub mod catalog;
pub mod constraint;
pub mod db;
pub mod user;

pub use catalog::{
    BoundingBox, Contents, ContentsDao, Extension, ExtensionScope, ExtensionsDao,
    GeometryColumns, GeometryColumnsDao, Projection, ProjectionTransform,
    SpatialReferenceSystem, SpatialReferenceSystemDao, TableKind, TileMatrix, TileMatrixDao,
    TileMatrixSet, TileMatrixSetDao, data_type_aliases, register_data_type,
};
pub use constraint::{
    ColumnConstraints, Constraint, ConstraintType, Constraints, TableConstraints,
};
pub use db::{TableColumn, TableInfo};
pub use error::{GpkgError, Result};
pub use geometry::{
    geometry_envelope, geometry_to_gpkg, gpkg_geometry_envelope, gpkg_geometry_srs_id,
    gpkg_geometry_to_wkb, wkb_to_gpkg_geometry,
};
pub use gpkg::{AttributesDao, FeatureDao, Gpkg, REQUIRED_TILE_COLUMNS, TileDao, tile_table};
pub use sql_functions::register_spatial_functions;
pub use types::{DataType, GeometryType, StorageClass, Value};
pub use user::{ResultSet, UserColumn, UserDao, UserQuery, UserRow, UserTable};
