use crate::error::GpkgError;
use crate::types::{DataType, GeometryType, Value};

const GEOMETRY_TYPE_NAMES: [(GeometryType, &str); 18] = [
    (GeometryType::Geometry, "GEOMETRY"),
    (GeometryType::Point, "POINT"),
    (GeometryType::LineString, "LINESTRING"),
    (GeometryType::Polygon, "POLYGON"),
    (GeometryType::MultiPoint, "MULTIPOINT"),
    (GeometryType::MultiLineString, "MULTILINESTRING"),
    (GeometryType::MultiPolygon, "MULTIPOLYGON"),
    (GeometryType::GeometryCollection, "GEOMETRYCOLLECTION"),
    (GeometryType::CircularString, "CIRCULARSTRING"),
    (GeometryType::CompoundCurve, "COMPOUNDCURVE"),
    (GeometryType::CurvePolygon, "CURVEPOLYGON"),
    (GeometryType::MultiCurve, "MULTICURVE"),
    (GeometryType::MultiSurface, "MULTISURFACE"),
    (GeometryType::Curve, "CURVE"),
    (GeometryType::Surface, "SURFACE"),
    (GeometryType::PolyhedralSurface, "POLYHEDRALSURFACE"),
    (GeometryType::Tin, "TIN"),
    (GeometryType::Triangle, "TRIANGLE"),
];

#[inline]
pub(crate) fn geometry_type_to_str(geometry_type: GeometryType) -> &'static str {
    GEOMETRY_TYPE_NAMES
        .iter()
        .find(|(ty, _)| *ty == geometry_type)
        .map(|(_, name)| *name)
        .unwrap_or("GEOMETRY")
}

/// Case-insensitive lookup of a GeoPackage geometry type name.
#[inline]
pub(crate) fn geometry_type_from_name(name: &str) -> Option<GeometryType> {
    let name = name.trim();
    GEOMETRY_TYPE_NAMES
        .iter()
        .find(|(_, candidate)| candidate.eq_ignore_ascii_case(name))
        .map(|(ty, _)| *ty)
}

#[inline]
pub(crate) fn geometry_type_from_str(geometry_type_str: &str) -> Result<GeometryType, GpkgError> {
    geometry_type_from_name(geometry_type_str)
        .ok_or_else(|| GpkgError::UnsupportedGeometryType(geometry_type_str.to_string()))
}

#[inline]
pub(crate) fn dimension_to_zm(dimension: wkb::reader::Dimension) -> (i8, i8) {
    match dimension {
        wkb::reader::Dimension::Xy => (0, 0),
        wkb::reader::Dimension::Xyz => (1, 0),
        wkb::reader::Dimension::Xym => (0, 1),
        wkb::reader::Dimension::Xyzm => (1, 1),
    }
}

#[inline]
pub(crate) fn dimension_from_zm(z: i8, m: i8) -> Result<wkb::reader::Dimension, GpkgError> {
    match (z, m) {
        (0, 0) => Ok(wkb::reader::Dimension::Xy),
        (1, 0) => Ok(wkb::reader::Dimension::Xyz),
        (0, 1) => Ok(wkb::reader::Dimension::Xym),
        (1, 1) => Ok(wkb::reader::Dimension::Xyzm),
        // 2 means "optional"; there is no single WKB dimension for it.
        _ => Err(GpkgError::InvalidDimension { z, m }),
    }
}

/// Split a declared type such as `TEXT(255)` into its name and max length.
pub(crate) fn split_type_max(declared: &str) -> (&str, Option<u32>) {
    let declared = declared.trim();
    match (declared.find('('), declared.rfind(')')) {
        (Some(open), Some(close)) if open < close => {
            let digits: String = declared[open + 1..close]
                .trim()
                .chars()
                .take_while(|c| c.is_ascii_digit())
                .collect();
            (declared[..open].trim_end(), digits.parse().ok())
        }
        _ => (declared, None),
    }
}

/// Resolve a declared column type into a data type.
///
/// Geometry type names resolve to `BLOB` storage; anything else unrecognised
/// resolves to `None`.
pub(crate) fn data_type_from_declared(type_name: &str) -> Option<DataType> {
    DataType::from_name(type_name).or_else(|| {
        geometry_type_from_name(type_name).map(|_| DataType::Blob)
    })
}

/// Render a value as a SQL literal for `DEFAULT` clauses.
pub(crate) fn sql_literal(value: &Value) -> String {
    match value {
        Value::Null => "NULL".to_string(),
        Value::Integer(v) => v.to_string(),
        Value::Real(v) => {
            if v.fract() == 0.0 && v.is_finite() {
                format!("{v:.1}")
            } else {
                v.to_string()
            }
        }
        Value::Text(v) => format!("'{}'", v.replace('\'', "''")),
        Value::Blob(v) => {
            let hex: String = v.iter().map(|b| format!("{b:02X}")).collect();
            format!("X'{hex}'")
        }
        Value::Boolean(v) => i64::from(*v).to_string(),
    }
}

/// Parse the `dflt_value` text reported by `PRAGMA table_info`.
pub(crate) fn default_value_from_sql(raw: &str, data_type: Option<DataType>) -> Option<Value> {
    let raw = raw.trim();
    if raw.eq_ignore_ascii_case("NULL") {
        return Some(Value::Null);
    }

    if raw.len() >= 2 && raw.starts_with('\'') && raw.ends_with('\'') {
        let text = raw[1..raw.len() - 1].replace("''", "'");
        return Some(match data_type {
            Some(ty) => parse_typed_literal(&text, ty).unwrap_or(Value::Text(text)),
            None => Value::Text(text),
        });
    }

    if let Some(hex) = raw
        .strip_prefix("X'")
        .or_else(|| raw.strip_prefix("x'"))
        .and_then(|rest| rest.strip_suffix('\''))
    {
        return decode_hex(hex).map(Value::Blob);
    }

    match data_type {
        Some(ty) => parse_typed_literal(raw, ty).or_else(|| Some(Value::Text(raw.to_string()))),
        None => parse_untyped_literal(raw),
    }
}

fn parse_typed_literal(raw: &str, data_type: DataType) -> Option<Value> {
    match data_type {
        DataType::Boolean => match raw.to_ascii_lowercase().as_str() {
            "1" | "true" => Some(Value::Boolean(true)),
            "0" | "false" => Some(Value::Boolean(false)),
            _ => None,
        },
        DataType::TinyInt
        | DataType::SmallInt
        | DataType::MediumInt
        | DataType::Int
        | DataType::Integer => raw.parse().ok().map(Value::Integer),
        DataType::Float | DataType::Double | DataType::Real => raw.parse().ok().map(Value::Real),
        DataType::Text | DataType::Date | DataType::DateTime | DataType::Blob => {
            Some(Value::Text(raw.to_string()))
        }
    }
}

fn parse_untyped_literal(raw: &str) -> Option<Value> {
    if let Ok(v) = raw.parse::<i64>() {
        Some(Value::Integer(v))
    } else if let Ok(v) = raw.parse::<f64>() {
        Some(Value::Real(v))
    } else {
        Some(Value::Text(raw.to_string()))
    }
}

fn decode_hex(hex: &str) -> Option<Vec<u8>> {
    if !hex.is_ascii() || hex.len() % 2 != 0 {
        return None;
    }
    (0..hex.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&hex[i..i + 2], 16).ok())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_type_and_max() {
        assert_eq!(split_type_max("TEXT(255)"), ("TEXT", Some(255)));
        assert_eq!(split_type_max("BLOB"), ("BLOB", None));
        assert_eq!(split_type_max("DECIMAL (10, 2)"), ("DECIMAL", Some(10)));
    }

    #[test]
    fn resolves_geometry_names_as_blob() {
        assert_eq!(data_type_from_declared("POINT"), Some(DataType::Blob));
        assert_eq!(data_type_from_declared("integer"), Some(DataType::Integer));
        assert_eq!(data_type_from_declared("VARCHAR"), None);
    }

    #[test]
    fn parses_default_values() {
        assert_eq!(
            default_value_from_sql("'it''s'", Some(DataType::Text)),
            Some(Value::Text("it's".to_string()))
        );
        assert_eq!(
            default_value_from_sql("1", Some(DataType::Boolean)),
            Some(Value::Boolean(true))
        );
        assert_eq!(
            default_value_from_sql("2.5", Some(DataType::Double)),
            Some(Value::Real(2.5))
        );
        assert_eq!(default_value_from_sql("NULL", None), Some(Value::Null));
        assert_eq!(
            default_value_from_sql("X'0A0B'", Some(DataType::Blob)),
            Some(Value::Blob(vec![0x0a, 0x0b]))
        );
    }

    #[test]
    fn literals_roundtrip_through_default_parsing() {
        for (value, ty) in [
            (Value::Text("a'b".to_string()), DataType::Text),
            (Value::Integer(-3), DataType::Integer),
            (Value::Real(1.0), DataType::Double),
            (Value::Boolean(false), DataType::Boolean),
        ] {
            let literal = sql_literal(&value);
            assert_eq!(default_value_from_sql(&literal, Some(ty)), Some(value));
        }
    }

    #[test]
    fn rejects_invalid_dimension() {
        assert!(matches!(
            dimension_from_zm(2, 0),
            Err(GpkgError::InvalidDimension { z: 2, m: 0 })
        ));
    }
}
