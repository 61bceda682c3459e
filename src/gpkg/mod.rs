//! GeoPackage connection and the DAOs for its three user table kinds.

mod attributes;
mod features;
mod gpkg;
pub(crate) mod tiles;

pub use attributes::AttributesDao;
pub use features::FeatureDao;
pub use gpkg::Gpkg;
pub use tiles::{REQUIRED_TILE_COLUMNS, TileDao, tile_table};
