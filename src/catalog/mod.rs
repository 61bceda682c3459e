//! GeoPackage catalog tables (`gpkg_*`) and their DAOs.

mod bounding_box;
mod contents;
mod data_type;
mod extensions;
mod geometry_columns;
mod projection;
mod srs;
mod tile_matrix;

pub use bounding_box::BoundingBox;
pub use contents::{Contents, ContentsDao};
pub use data_type::{TableKind, data_type_aliases, register_data_type};
pub use extensions::{Extension, ExtensionScope, ExtensionsDao};
pub use geometry_columns::{GeometryColumns, GeometryColumnsDao};
pub use projection::{Projection, ProjectionTransform};
pub use srs::{SpatialReferenceSystem, SpatialReferenceSystemDao};
pub use tile_matrix::{TileMatrix, TileMatrixDao, TileMatrixSet, TileMatrixSetDao};
