use std::error::Error;
use std::fmt;

/// Crate error type for GeoPackage operations.
#[derive(Debug)]
pub enum GpkgError {
    /// Wraps errors returned by `rusqlite`.
    Sql(rusqlite::Error),
    /// Wraps errors returned by the `wkb` crate.
    Wkb(wkb::error::WkbError),
    /// The storage layer rejected a write because of a NOT NULL, UNIQUE,
    /// CHECK or FOREIGN KEY constraint.
    ConstraintViolation {
        table: String,
        source: rusqlite::Error,
    },
    /// Column indices of a table definition are not contiguous from 0.
    MissingColumnIndex {
        table: String,
        index: usize,
    },
    /// Two columns of a table definition share the same index.
    DuplicateColumnIndex {
        table: String,
        index: usize,
    },
    /// Two columns of a table definition share the same name.
    DuplicateColumnName {
        table: String,
        column: String,
    },
    /// More than one column of a table definition is flagged as primary key.
    DuplicatePrimaryKey {
        table: String,
        first: String,
        second: String,
    },
    /// Layer schema has multiple primary key columns, which is unsupported.
    CompositePrimaryKeyUnsupported {
        layer_name: String,
    },
    /// Layer schema has no primary key column.
    MissingPrimaryKeyColumn {
        layer_name: String,
    },
    /// Layer schema has no geometry column.
    MissingGeometryColumn {
        layer_name: String,
    },
    /// A feature table definition has more than one geometry column.
    MultipleGeometryColumns {
        table: String,
        first: String,
        second: String,
    },
    /// A table kind requires a column that the definition lacks.
    MissingRequiredColumn {
        table: String,
        column: String,
    },
    /// A DAO was used against rows whose column signature differs from its table.
    SchemaMismatch {
        table: String,
        expected: Vec<String>,
        actual: Vec<String>,
    },
    /// A referenced table or view does not exist.
    MissingTable {
        table: String,
    },
    /// A catalog table required before writing a contents row does not exist.
    MissingPrerequisiteTable {
        table_name: String,
        data_type: String,
        required: &'static str,
    },
    /// Referenced `srs_id` does not exist in `gpkg_spatial_ref_sys`.
    MissingSpatialRefSysId {
        srs_id: i32,
    },
    /// The organization / coordinate system pair has no built-in definition.
    UnsupportedSrs {
        organization: String,
        organization_coordsys_id: i32,
    },
    /// The well-known `srs_id` is taken by a different organization / code pair.
    ConflictingSrs {
        srs_id: i32,
        expected: String,
        actual: String,
    },
    /// Zoom level or tile size cannot describe a quadtree tile matrix.
    InvalidTileMatrix {
        zoom_level: i32,
        tile_width: i32,
        tile_height: i32,
    },
    /// Contents data type does not match the table kind.
    DataTypeMismatch {
        table: String,
        expected: &'static str,
        actual: String,
    },
    /// Contents data type name is not registered.
    UnknownDataType {
        table: String,
        data_type: String,
    },
    /// Attempt to re-register one of the core contents data type names.
    CoreDataTypeOverwrite(String),
    /// No transform is available between the two projections.
    UnsupportedProjectionTransform {
        from: String,
        to: String,
    },
    /// A geometry type name could not be mapped to a GeoPackage geometry type.
    UnsupportedGeometryType(String),
    /// Invalid or mixed `z` / `m` dimension flags in GeoPackage metadata.
    InvalidDimension {
        z: i8,
        m: i8,
    },
    /// Invalid GeoPackage geometry flags byte.
    InvalidGpkgGeometryFlags(u8),
    /// GeoPackage geometry blob is shorter than its header and envelope.
    InvalidGpkgGeometryLength {
        len: usize,
        minimum: usize,
    },
    /// Dynamic `Value` type did not match the expected conversion target.
    ValueTypeMismatch {
        expected: &'static str,
        actual: &'static str,
    },
    /// Numeric conversion failed because the value is out of range.
    ValueOutOfRange {
        target: &'static str,
    },
    /// Requested column does not exist in the table.
    MissingColumn {
        table: String,
        column: String,
    },
    /// A table with the same name already exists.
    LayerAlreadyExists {
        layer_name: String,
    },
    Message(String),
    ReadOnly,
}

impl GpkgError {
    /// Whether the error describes a malformed in-memory table definition.
    pub fn is_schema_error(&self) -> bool {
        matches!(
            self,
            Self::MissingColumnIndex { .. }
                | Self::DuplicateColumnIndex { .. }
                | Self::DuplicateColumnName { .. }
                | Self::DuplicatePrimaryKey { .. }
                | Self::CompositePrimaryKeyUnsupported { .. }
                | Self::MissingPrimaryKeyColumn { .. }
                | Self::MissingGeometryColumn { .. }
                | Self::MultipleGeometryColumns { .. }
                | Self::MissingRequiredColumn { .. }
        )
    }

    pub fn is_constraint_violation(&self) -> bool {
        matches!(self, Self::ConstraintViolation { .. })
    }

    /// Wrap a storage error, classifying constraint failures for `table`.
    pub(crate) fn from_write(table: &str, err: rusqlite::Error) -> Self {
        if err.sqlite_error_code() == Some(rusqlite::ErrorCode::ConstraintViolation) {
            Self::ConstraintViolation {
                table: table.to_string(),
                source: err,
            }
        } else {
            Self::Sql(err)
        }
    }
}

impl fmt::Display for GpkgError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sql(err) => write!(f, "{err}"),
            Self::Wkb(err) => write!(f, "{err}"),
            Self::ConstraintViolation { table, source } => {
                write!(f, "constraint violation on table '{table}': {source}")
            }
            Self::MissingColumnIndex { table, index } => {
                write!(f, "missing column index {index} in table definition: {table}")
            }
            Self::DuplicateColumnIndex { table, index } => {
                write!(f, "duplicate column index {index} in table definition: {table}")
            }
            Self::DuplicateColumnName { table, column } => {
                write!(f, "duplicate column name '{column}' in table definition: {table}")
            }
            Self::DuplicatePrimaryKey {
                table,
                first,
                second,
            } => write!(
                f,
                "duplicate primary key in table '{table}': both '{first}' and '{second}' are flagged"
            ),
            Self::CompositePrimaryKeyUnsupported { layer_name } => write!(
                f,
                "composite primary keys are not supported yet for table: {layer_name}"
            ),
            Self::MissingPrimaryKeyColumn { layer_name } => {
                write!(f, "no primary key column found for table: {layer_name}")
            }
            Self::MissingGeometryColumn { layer_name } => {
                write!(f, "no geometry column found for table: {layer_name}")
            }
            Self::MultipleGeometryColumns {
                table,
                first,
                second,
            } => write!(
                f,
                "table '{table}' has more than one geometry column: '{first}' and '{second}'"
            ),
            Self::MissingRequiredColumn { table, column } => {
                write!(f, "table '{table}' is missing required column '{column}'")
            }
            Self::SchemaMismatch {
                table,
                expected,
                actual,
            } => write!(
                f,
                "result columns [{}] do not match table '{table}' columns [{}]",
                actual.join(", "),
                expected.join(", ")
            ),
            Self::MissingTable { table } => write!(f, "table or view does not exist: {table}"),
            Self::MissingPrerequisiteTable {
                table_name,
                data_type,
                required,
            } => write!(
                f,
                "cannot write '{data_type}' contents for table '{table_name}': {required} table does not exist"
            ),
            Self::MissingSpatialRefSysId { srs_id } => {
                write!(f, "srs_id {srs_id} not found in gpkg_spatial_ref_sys")
            }
            Self::UnsupportedSrs {
                organization,
                organization_coordsys_id,
            } => write!(
                f,
                "spatial reference system {organization}:{organization_coordsys_id} is not supported for metadata creation"
            ),
            Self::ConflictingSrs {
                srs_id,
                expected,
                actual,
            } => write!(
                f,
                "srs_id {srs_id} is already registered as {actual}, expected {expected}"
            ),
            Self::InvalidTileMatrix {
                zoom_level,
                tile_width,
                tile_height,
            } => write!(
                f,
                "invalid tile matrix: zoom level {zoom_level} (0..=30) with {tile_width}x{tile_height} tiles"
            ),
            Self::DataTypeMismatch {
                table,
                expected,
                actual,
            } => write!(
                f,
                "contents of table '{table}' has data type '{actual}', expected '{expected}'"
            ),
            Self::UnknownDataType { table, data_type } => {
                write!(f, "unknown contents data type '{data_type}' for table: {table}")
            }
            Self::CoreDataTypeOverwrite(name) => {
                write!(f, "core contents data type cannot be re-registered: {name}")
            }
            Self::UnsupportedProjectionTransform { from, to } => {
                write!(f, "no projection transform from {from} to {to}")
            }
            Self::UnsupportedGeometryType(ty) => write!(f, "unsupported geometry type: {ty}"),
            Self::InvalidDimension { z, m } => {
                write!(f, "invalid or mixed geometry dimension (z={z}, m={m})")
            }
            Self::InvalidGpkgGeometryFlags(flags) => {
                write!(f, "invalid gpkg geometry flags: {flags:#04x}")
            }
            Self::InvalidGpkgGeometryLength { len, minimum } => write!(
                f,
                "invalid gpkg geometry length: got {len} bytes, expected at least {minimum}"
            ),
            Self::ValueTypeMismatch { expected, actual } => {
                write!(f, "expected {expected}, got {actual}")
            }
            Self::ValueOutOfRange { target } => write!(f, "value out of range for {target}"),
            Self::MissingColumn { table, column } => {
                write!(f, "no column '{column}' in table: {table}")
            }
            Self::LayerAlreadyExists { layer_name } => {
                write!(f, "table already exists: {layer_name}")
            }
            Self::Message(message) => write!(f, "{message}"),
            Self::ReadOnly => write!(f, "operation not allowed on read-only connection"),
        }
    }
}

impl Error for GpkgError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Sql(err) => Some(err),
            Self::Wkb(err) => Some(err),
            Self::ConstraintViolation { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl From<rusqlite::Error> for GpkgError {
    fn from(err: rusqlite::Error) -> Self {
        Self::Sql(err)
    }
}

impl From<wkb::error::WkbError> for GpkgError {
    fn from(err: wkb::error::WkbError) -> Self {
        Self::Wkb(err)
    }
}

impl From<&str> for GpkgError {
    fn from(message: &str) -> Self {
        Self::Message(message.to_string())
    }
}

pub type Result<T> = std::result::Result<T, GpkgError>;
