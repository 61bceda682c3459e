use crate::error::GpkgError;
use rusqlite::ToSql;
use rusqlite::types::{ToSqlOutput, ValueRef};

/// Owned dynamic value of a single column.
///
/// Mirrors SQLite's dynamic typing (null, integer, real, text, blob). `Boolean`
/// is produced for columns declared `BOOLEAN`, which SQLite stores as 0/1.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
    Blob(Vec<u8>),
    Boolean(bool),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub(crate) fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Integer(_) => "integer",
            Value::Real(_) => "real",
            Value::Text(_) => "text",
            Value::Blob(_) => "blob",
            Value::Boolean(_) => "boolean",
        }
    }
}

impl From<ValueRef<'_>> for Value {
    fn from(value: ValueRef<'_>) -> Self {
        match value {
            ValueRef::Null => Value::Null,
            ValueRef::Integer(v) => Value::Integer(v),
            ValueRef::Real(v) => Value::Real(v),
            ValueRef::Text(v) => Value::Text(String::from_utf8_lossy(v).into_owned()),
            ValueRef::Blob(v) => Value::Blob(v.to_vec()),
        }
    }
}

impl ToSql for Value {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        let value = match self {
            Value::Null => ValueRef::Null,
            Value::Integer(v) => ValueRef::Integer(*v),
            Value::Real(v) => ValueRef::Real(*v),
            Value::Text(v) => ValueRef::Text(v.as_bytes()),
            Value::Blob(v) => ValueRef::Blob(v),
            Value::Boolean(v) => ValueRef::Integer(i64::from(*v)),
        };
        Ok(ToSqlOutput::Borrowed(value))
    }
}

macro_rules! impl_from_for_value {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for Value {
                fn from(value: $ty) -> Self {
                    Value::$variant(value.into())
                }
            }
        )*
    };
}

impl_from_for_value!(
    i64 => Integer,
    i32 => Integer,
    u32 => Integer,
    f64 => Real,
    f32 => Real,
    bool => Boolean,
    String => Text,
    &str => Text,
    Vec<u8> => Blob,
    &[u8] => Blob,
);

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Value::Null, Into::into)
    }
}

impl TryFrom<Value> for i64 {
    type Error = GpkgError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::Integer(v) => Ok(v),
            Value::Boolean(v) => Ok(i64::from(v)),
            other => Err(GpkgError::ValueTypeMismatch {
                expected: "integer",
                actual: other.type_name(),
            }),
        }
    }
}

impl TryFrom<Value> for i32 {
    type Error = GpkgError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        let v: i64 = value.try_into()?;
        i32::try_from(v).map_err(|_| GpkgError::ValueOutOfRange { target: "i32" })
    }
}

impl TryFrom<Value> for f64 {
    type Error = GpkgError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::Real(v) => Ok(v),
            Value::Integer(v) => Ok(v as f64),
            other => Err(GpkgError::ValueTypeMismatch {
                expected: "real",
                actual: other.type_name(),
            }),
        }
    }
}

impl TryFrom<Value> for bool {
    type Error = GpkgError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::Boolean(v) => Ok(v),
            Value::Integer(0) => Ok(false),
            Value::Integer(1) => Ok(true),
            Value::Integer(_) => Err(GpkgError::ValueOutOfRange { target: "bool" }),
            other => Err(GpkgError::ValueTypeMismatch {
                expected: "boolean",
                actual: other.type_name(),
            }),
        }
    }
}

impl TryFrom<Value> for String {
    type Error = GpkgError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::Text(v) => Ok(v),
            other => Err(GpkgError::ValueTypeMismatch {
                expected: "text",
                actual: other.type_name(),
            }),
        }
    }
}

impl TryFrom<Value> for Vec<u8> {
    type Error = GpkgError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::Blob(v) => Ok(v),
            other => Err(GpkgError::ValueTypeMismatch {
                expected: "blob",
                actual: other.type_name(),
            }),
        }
    }
}

macro_rules! impl_try_from_for_option {
    ($($ty:ty),* $(,)?) => {
        $(
            impl TryFrom<Value> for Option<$ty> {
                type Error = GpkgError;

                fn try_from(value: Value) -> Result<Self, Self::Error> {
                    match value {
                        Value::Null => Ok(None),
                        other => other.try_into().map(Some),
                    }
                }
            }
        )*
    };
}

impl_try_from_for_option!(i64, i32, f64, bool, String, Vec<u8>);

/// SQLite storage class backing a GeoPackage data type.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StorageClass {
    Integer,
    Real,
    Text,
    Blob,
}

/// Column data types allowed in GeoPackage user tables.
// cf. https://www.geopackage.org/spec140/index.html#table_column_data_types
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DataType {
    Boolean,
    TinyInt,
    SmallInt,
    MediumInt,
    Int,
    Integer,
    Float,
    Double,
    Real,
    Text,
    Blob,
    Date,
    DateTime,
}

impl DataType {
    pub const ALL: [DataType; 13] = [
        DataType::Boolean,
        DataType::TinyInt,
        DataType::SmallInt,
        DataType::MediumInt,
        DataType::Int,
        DataType::Integer,
        DataType::Float,
        DataType::Double,
        DataType::Real,
        DataType::Text,
        DataType::Blob,
        DataType::Date,
        DataType::DateTime,
    ];

    pub fn name(self) -> &'static str {
        match self {
            DataType::Boolean => "BOOLEAN",
            DataType::TinyInt => "TINYINT",
            DataType::SmallInt => "SMALLINT",
            DataType::MediumInt => "MEDIUMINT",
            DataType::Int => "INT",
            DataType::Integer => "INTEGER",
            DataType::Float => "FLOAT",
            DataType::Double => "DOUBLE",
            DataType::Real => "REAL",
            DataType::Text => "TEXT",
            DataType::Blob => "BLOB",
            DataType::Date => "DATE",
            DataType::DateTime => "DATETIME",
        }
    }

    /// Exact, case-insensitive match on a data type name.
    pub fn from_name(name: &str) -> Option<DataType> {
        let name = name.trim();
        DataType::ALL
            .into_iter()
            .find(|ty| ty.name().eq_ignore_ascii_case(name))
    }

    pub fn storage_class(self) -> StorageClass {
        match self {
            DataType::Boolean
            | DataType::TinyInt
            | DataType::SmallInt
            | DataType::MediumInt
            | DataType::Int
            | DataType::Integer => StorageClass::Integer,
            DataType::Float | DataType::Double | DataType::Real => StorageClass::Real,
            DataType::Text | DataType::Date | DataType::DateTime => StorageClass::Text,
            DataType::Blob => StorageClass::Blob,
        }
    }

    /// Coerce a value read from storage into the representation of this type.
    pub fn coerce_read(self, value: Value) -> Value {
        match (self, value) {
            (DataType::Boolean, Value::Integer(v)) => Value::Boolean(v != 0),
            (ty, Value::Integer(v)) if ty.storage_class() == StorageClass::Real => {
                Value::Real(v as f64)
            }
            (_, value) => value,
        }
    }
}

/// Geometry type names usable as declared column types in feature tables.
// cf. https://www.geopackage.org/spec140/index.html#geometry_types
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum GeometryType {
    Geometry,
    Point,
    LineString,
    Polygon,
    MultiPoint,
    MultiLineString,
    MultiPolygon,
    GeometryCollection,
    CircularString,
    CompoundCurve,
    CurvePolygon,
    MultiCurve,
    MultiSurface,
    Curve,
    Surface,
    PolyhedralSurface,
    Tin,
    Triangle,
}
