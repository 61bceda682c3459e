//! GeoPackage binary geometry encoding.
// cf. https://www.geopackage.org/spec140/index.html#gpb_format

use crate::catalog::BoundingBox;
use crate::error::{GpkgError, Result};
use geo_traits::{
    CoordTrait, GeometryCollectionTrait, GeometryTrait, GeometryType, LineStringTrait, LineTrait,
    MultiLineStringTrait, MultiPointTrait, MultiPolygonTrait, PointTrait, PolygonTrait, RectTrait,
    TriangleTrait,
};
use wkb::reader::Wkb;

const HEADER_SIZE: usize = 8;
const MAGIC: [u8; 2] = [0x47, 0x50];

const FLAG_LITTLE_ENDIAN: u8 = 0b0000_0001;
const FLAG_XY_ENVELOPE: u8 = 0b0000_0010;
const FLAG_EMPTY: u8 = 0b0001_0000;

fn envelope_size(flags: u8) -> Result<usize> {
    match flags & 0b00001110 {
        0b00000000 => Ok(0),  // no envelope
        0b00000010 => Ok(32), // [minx, maxx, miny, maxy]
        0b00000100 => Ok(48), // [minx, maxx, miny, maxy, minz, maxz]
        0b00000110 => Ok(48), // [minx, maxx, miny, maxy, minm, maxm]
        0b00001000 => Ok(64), // [minx, maxx, miny, maxy, minz, maxz, minm, maxm]
        _ => Err(GpkgError::InvalidGpkgGeometryFlags(flags)),
    }
}

fn check_header(b: &[u8]) -> Result<usize> {
    if b.len() < HEADER_SIZE {
        return Err(GpkgError::InvalidGpkgGeometryLength {
            len: b.len(),
            minimum: HEADER_SIZE,
        });
    }
    if b[..2] != MAGIC {
        return Err(GpkgError::Message(format!(
            "invalid gpkg geometry magic: {:#04x} {:#04x}",
            b[0], b[1]
        )));
    }
    let offset = HEADER_SIZE + envelope_size(b[3])?;
    if b.len() < offset {
        return Err(GpkgError::InvalidGpkgGeometryLength {
            len: b.len(),
            minimum: offset,
        });
    }
    Ok(offset)
}

/// Strip GeoPackage header and envelope bytes to access raw WKB.
pub fn gpkg_geometry_to_wkb(b: &[u8]) -> Result<Wkb<'_>> {
    let offset = check_header(b)?;
    Ok(Wkb::try_new(&b[offset..])?)
}

/// `srs_id` stored in a GeoPackage geometry header.
pub fn gpkg_geometry_srs_id(b: &[u8]) -> Result<i32> {
    check_header(b)?;
    let bytes = [b[4], b[5], b[6], b[7]];
    Ok(if b[3] & FLAG_LITTLE_ENDIAN != 0 {
        i32::from_le_bytes(bytes)
    } else {
        i32::from_be_bytes(bytes)
    })
}

/// XY extent of a GeoPackage geometry blob; `None` for an empty geometry.
///
/// Uses the header envelope when there is one and walks the WKB otherwise.
pub fn gpkg_geometry_envelope(b: &[u8]) -> Result<Option<BoundingBox>> {
    let offset = check_header(b)?;
    let flags = b[3];
    if flags & FLAG_EMPTY != 0 {
        return Ok(None);
    }
    if offset > HEADER_SIZE {
        let read = |i: usize| {
            let mut bytes = [0u8; 8];
            bytes.copy_from_slice(&b[HEADER_SIZE + i * 8..HEADER_SIZE + (i + 1) * 8]);
            if flags & FLAG_LITTLE_ENDIAN != 0 {
                f64::from_le_bytes(bytes)
            } else {
                f64::from_be_bytes(bytes)
            }
        };
        // envelope order is [minx, maxx, miny, maxy, ...]
        return Ok(Some(BoundingBox::new(read(0), read(2), read(1), read(3))));
    }
    Ok(geometry_envelope(&Wkb::try_new(&b[offset..])?))
}

/// XY extent of any `geo-traits` geometry; `None` when it has no coordinates.
pub fn geometry_envelope<G>(geometry: &G) -> Option<BoundingBox>
where
    G: GeometryTrait<T = f64>,
{
    let mut envelope: Option<BoundingBox> = None;
    visit_coords(geometry, &mut |x, y| {
        let point = BoundingBox::new(x, y, x, y);
        envelope = Some(match envelope {
            Some(bbox) => bbox.union(&point),
            None => point,
        });
    });
    envelope
}

fn visit_coords<G, F>(geometry: &G, f: &mut F)
where
    G: GeometryTrait<T = f64>,
    F: FnMut(f64, f64),
{
    fn ring<L: LineStringTrait<T = f64>>(line: &L, f: &mut impl FnMut(f64, f64)) {
        line.coords().for_each(|coord| f(coord.x(), coord.y()));
    }
    fn polygon<P: PolygonTrait<T = f64>>(polygon: &P, f: &mut impl FnMut(f64, f64)) {
        polygon.exterior().iter().for_each(|exterior| ring(exterior, f));
        polygon.interiors().for_each(|interior| ring(&interior, f));
    }

    match geometry.as_type() {
        GeometryType::Point(point) => {
            if let Some(coord) = point.coord() {
                f(coord.x(), coord.y());
            }
        }
        GeometryType::LineString(line) => ring(line, f),
        GeometryType::Polygon(p) => polygon(p, f),
        GeometryType::MultiPoint(points) => points
            .points()
            .filter_map(|point| point.coord().map(|coord| (coord.x(), coord.y())))
            .for_each(|(x, y)| f(x, y)),
        GeometryType::MultiLineString(lines) => lines.line_strings().for_each(|line| ring(&line, f)),
        GeometryType::MultiPolygon(polygons) => polygons.polygons().for_each(|p| polygon(&p, f)),
        GeometryType::GeometryCollection(collection) => collection
            .geometries()
            .for_each(|member| visit_coords(&member, f)),
        GeometryType::Rect(rect) => {
            f(rect.min().x(), rect.min().y());
            f(rect.max().x(), rect.max().y());
        }
        GeometryType::Triangle(triangle) => triangle
            .coords()
            .into_iter()
            .for_each(|coord| f(coord.x(), coord.y())),
        GeometryType::Line(line) => {
            f(line.start().x(), line.start().y());
            f(line.end().x(), line.end().y());
        }
    }
}

fn write_header(blob: &mut Vec<u8>, flags: u8, srs_id: i32) {
    blob.extend_from_slice(&[MAGIC[0], MAGIC[1], 0x00, flags | FLAG_LITTLE_ENDIAN]);
    blob.extend_from_slice(&srs_id.to_le_bytes());
}

/// Wrap WKB bytes in a GeoPackage header without an envelope.
pub fn wkb_to_gpkg_geometry(wkb: &[u8], srs_id: i32) -> Vec<u8> {
    let mut geom = Vec::with_capacity(wkb.len() + HEADER_SIZE);
    write_header(&mut geom, 0, srs_id);
    geom.extend_from_slice(wkb);
    geom
}

/// Encode any `geo-traits` geometry as a GeoPackage geometry blob.
///
/// Points carry no envelope. Other geometries get an XY envelope, and empty
/// ones set the empty flag instead.
pub fn geometry_to_gpkg<G>(geometry: &G, srs_id: i32) -> Result<Vec<u8>>
where
    G: GeometryTrait<T = f64>,
{
    let mut wkb = Vec::new();
    wkb::writer::write_geometry(&mut wkb, geometry, &Default::default())?;

    let is_point = matches!(geometry.as_type(), GeometryType::Point(_));
    let envelope = geometry_envelope(geometry);
    let mut blob = Vec::with_capacity(HEADER_SIZE + 32 + wkb.len());
    match envelope {
        None => write_header(&mut blob, FLAG_EMPTY, srs_id),
        Some(_) if is_point => write_header(&mut blob, 0, srs_id),
        Some(bbox) => {
            write_header(&mut blob, FLAG_XY_ENVELOPE, srs_id);
            for value in [bbox.min_x, bbox.max_x, bbox.min_y, bbox.max_y] {
                blob.extend_from_slice(&value.to_le_bytes());
            }
        }
    }
    blob.extend_from_slice(&wkb);
    Ok(blob)
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo_types::{Geometry, GeometryCollection, LineString, MultiPoint, Point, Polygon};

    #[test]
    fn gpkg_geometry_roundtrip() -> Result<()> {
        let point = Point::new(3.0, -1.0);
        let mut wkb = Vec::new();
        wkb::writer::write_geometry(&mut wkb, &point, &Default::default())?;
        let blob = wkb_to_gpkg_geometry(&wkb, 4326);

        assert_eq!(gpkg_geometry_to_wkb(&blob)?.buf(), wkb.as_slice());
        assert_eq!(gpkg_geometry_srs_id(&blob)?, 4326);
        assert_eq!(geometry_to_gpkg(&point, 4326)?, blob);
        Ok(())
    }

    #[test]
    fn gpkg_geometry_rejects_invalid_flags() {
        let mut blob = vec![0x47, 0x50, 0x00, 0x0A, 0, 0, 0, 0];
        blob.extend_from_slice(&[0; 16]);
        assert!(matches!(
            gpkg_geometry_to_wkb(&blob),
            Err(GpkgError::InvalidGpkgGeometryFlags(_))
        ));
    }

    #[test]
    fn gpkg_geometry_rejects_truncated_blob() {
        assert!(matches!(
            gpkg_geometry_to_wkb(&[0x47, 0x50, 0x00]),
            Err(GpkgError::InvalidGpkgGeometryLength { len: 3, minimum: 8 })
        ));
        // envelope flag set but no envelope bytes
        let blob = [0x47, 0x50, 0x00, 0x03, 0xE6, 0x10, 0, 0, 1, 2];
        assert!(matches!(
            gpkg_geometry_to_wkb(&blob),
            Err(GpkgError::InvalidGpkgGeometryLength { minimum: 40, .. })
        ));
    }

    #[test]
    fn envelope_written_for_non_point_geometries() -> Result<()> {
        let line = LineString::from(vec![(0.0, 0.0), (2.0, 1.0), (-3.0, 4.0)]);
        let blob = geometry_to_gpkg(&line, 3857)?;
        assert_eq!(blob[3], FLAG_LITTLE_ENDIAN | FLAG_XY_ENVELOPE);
        assert_eq!(gpkg_geometry_srs_id(&blob)?, 3857);
        assert_eq!(
            gpkg_geometry_envelope(&blob)?,
            Some(BoundingBox::new(-3.0, 0.0, 2.0, 4.0))
        );
        // the WKB part is still readable after the envelope
        assert!(matches!(
            gpkg_geometry_to_wkb(&blob)?.as_type(),
            GeometryType::LineString(_)
        ));
        Ok(())
    }

    #[test]
    fn envelope_walks_wkb_without_header_envelope() -> Result<()> {
        let exterior = LineString::from(vec![(0.0, 0.0), (4.0, 0.0), (4.0, 3.0), (0.0, 0.0)]);
        let collection = GeometryCollection::from(vec![
            Geometry::Point(Point::new(5.0, -1.0)),
            Geometry::Polygon(Polygon::new(exterior, Vec::new())),
            Geometry::MultiPoint(MultiPoint::from(vec![Point::new(-2.0, 2.0)])),
        ]);
        let mut wkb = Vec::new();
        wkb::writer::write_geometry(&mut wkb, &collection, &Default::default())?;
        let blob = wkb_to_gpkg_geometry(&wkb, 4326);

        assert_eq!(
            gpkg_geometry_envelope(&blob)?,
            Some(BoundingBox::new(-2.0, -1.0, 5.0, 3.0))
        );
        assert_eq!(
            gpkg_geometry_envelope(&geometry_to_gpkg(&Point::new(1.5, -2.0), 4326)?)?,
            Some(BoundingBox::new(1.5, -2.0, 1.5, -2.0))
        );
        Ok(())
    }

    #[test]
    fn empty_geometries_set_the_empty_flag() -> Result<()> {
        let blob = geometry_to_gpkg(&LineString::<f64>::new(Vec::new()), 4326)?;
        assert_ne!(blob[3] & FLAG_EMPTY, 0);
        assert_eq!(gpkg_geometry_envelope(&blob)?, None);
        Ok(())
    }
}
