use crate::catalog::BoundingBox;
use crate::error::Result;
use crate::geometry::{gpkg_geometry_envelope, gpkg_geometry_srs_id};
use rusqlite::functions::{Context, FunctionFlags};
use rusqlite::types::{Type, ValueRef};
use rusqlite::{Connection, Error};

/// Register the spatial SQL helper functions on a connection.
///
/// `ST_MinX`, `ST_MinY`, `ST_MaxX` and `ST_MaxY` return the envelope of a
/// GeoPackage geometry blob, `ST_IsEmpty` whether it has no coordinates and
/// `ST_SRID` the `srs_id` from its header. All of them map NULL to NULL.
///
/// ```no_run
/// use rusqlite::Connection;
/// use gpkg_core::register_spatial_functions;
///
/// let conn = Connection::open_in_memory()?;
/// register_spatial_functions(&conn)?;
/// # Ok::<(), gpkg_core::GpkgError>(())
/// ```
pub fn register_spatial_functions(conn: &Connection) -> Result<()> {
    let components: [(&str, fn(&BoundingBox) -> f64); 4] = [
        ("ST_MinX", |bbox| bbox.min_x),
        ("ST_MinY", |bbox| bbox.min_y),
        ("ST_MaxX", |bbox| bbox.max_x),
        ("ST_MaxY", |bbox| bbox.max_y),
    ];
    for (name, component) in components {
        conn.create_scalar_function(name, 1, FunctionFlags::SQLITE_DETERMINISTIC, move |ctx| {
            Ok(blob_arg(ctx)?
                .map(envelope_of)
                .transpose()?
                .flatten()
                .map(|bbox| component(&bbox)))
        })?;
    }

    conn.create_scalar_function("ST_IsEmpty", 1, FunctionFlags::SQLITE_DETERMINISTIC, |ctx| {
        Ok(blob_arg(ctx)?
            .map(envelope_of)
            .transpose()?
            .map(|envelope| i64::from(envelope.is_none())))
    })?;

    conn.create_scalar_function("ST_SRID", 1, FunctionFlags::SQLITE_DETERMINISTIC, |ctx| {
        blob_arg(ctx)?
            .map(|blob| {
                gpkg_geometry_srs_id(blob)
                    .map(i64::from)
                    .map_err(|err| Error::UserFunctionError(Box::new(err)))
            })
            .transpose()
    })?;

    tracing::trace!("spatial SQL functions registered");
    Ok(())
}

fn blob_arg<'a>(ctx: &'a Context<'_>) -> rusqlite::Result<Option<&'a [u8]>> {
    match ctx.get_raw(0) {
        ValueRef::Null => Ok(None),
        ValueRef::Blob(blob) => Ok(Some(blob)),
        _ => Err(Error::InvalidFunctionParameterType(0, Type::Blob)),
    }
}

fn envelope_of(blob: &[u8]) -> rusqlite::Result<Option<BoundingBox>> {
    gpkg_geometry_envelope(blob).map_err(|err| Error::UserFunctionError(Box::new(err)))
}

#[cfg(test)]
mod tests {
    use super::register_spatial_functions;
    use crate::geometry::{geometry_to_gpkg, wkb_to_gpkg_geometry};
    use geo_types::{LineString, MultiLineString, Point};
    use rusqlite::{Connection, params};

    type Extent = (Option<f64>, Option<f64>, Option<f64>, Option<f64>);

    fn extent(conn: &Connection, blob: Option<&[u8]>) -> crate::Result<Extent> {
        Ok(conn.query_row(
            "SELECT ST_MinX(?1), ST_MinY(?1), ST_MaxX(?1), ST_MaxY(?1)",
            params![blob],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
        )?)
    }

    #[test]
    fn extent_of_point_and_srid() -> crate::Result<()> {
        let conn = Connection::open_in_memory()?;
        register_spatial_functions(&conn)?;

        let blob = geometry_to_gpkg(&Point::new(1.5, -2.0), 3857)?;
        assert_eq!(
            extent(&conn, Some(blob.as_slice()))?,
            (Some(1.5), Some(-2.0), Some(1.5), Some(-2.0))
        );
        let (srs_id, empty): (i64, i64) = conn.query_row(
            "SELECT ST_SRID(?1), ST_IsEmpty(?1)",
            params![blob],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;
        assert_eq!((srs_id, empty), (3857, 0));
        Ok(())
    }

    #[test]
    fn extent_with_and_without_header_envelope() -> crate::Result<()> {
        let conn = Connection::open_in_memory()?;
        register_spatial_functions(&conn)?;

        let lines = MultiLineString(vec![
            LineString::from(vec![(0.0, 0.0), (2.0, 1.0)]),
            LineString::from(vec![(-3.0, 4.0), (-1.0, 2.0)]),
        ]);
        let expected = (Some(-3.0), Some(0.0), Some(2.0), Some(4.0));
        assert_eq!(extent(&conn, Some(geometry_to_gpkg(&lines, 4326)?.as_slice()))?, expected);

        let mut wkb = Vec::new();
        wkb::writer::write_geometry(&mut wkb, &lines, &Default::default())?;
        assert_eq!(extent(&conn, Some(wkb_to_gpkg_geometry(&wkb, 4326).as_slice()))?, expected);
        Ok(())
    }

    #[test]
    fn null_and_empty_geometries() -> crate::Result<()> {
        let conn = Connection::open_in_memory()?;
        register_spatial_functions(&conn)?;

        assert_eq!(extent(&conn, None)?, (None, None, None, None));
        let empty = geometry_to_gpkg(&LineString::<f64>::new(Vec::new()), 4326)?;
        assert_eq!(extent(&conn, Some(empty.as_slice()))?, (None, None, None, None));
        let is_empty: i64 = conn.query_row("SELECT ST_IsEmpty(?1)", params![empty], |row| row.get(0))?;
        assert_eq!(is_empty, 1);

        let err = conn.query_row("SELECT ST_MinX('text')", [], |row| row.get::<_, Option<f64>>(0));
        assert!(err.is_err());
        Ok(())
    }
}
