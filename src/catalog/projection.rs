use crate::error::{GpkgError, Result};
use std::f64::consts::PI;
use std::fmt;

const EARTH_RADIUS: f64 = 6_378_137.0;
const WEB_MERCATOR_MAX_LATITUDE: f64 = 85.051_128_779_806_59;

/// Authority and code identifying a coordinate reference system.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Projection {
    pub authority: String,
    pub code: i32,
}

impl Projection {
    pub fn new(authority: impl Into<String>, code: i32) -> Self {
        Self {
            authority: authority.into().to_ascii_uppercase(),
            code,
        }
    }

    pub fn epsg(code: i32) -> Self {
        Self::new("EPSG", code)
    }

    pub fn is_epsg(&self, code: i32) -> bool {
        self.authority == "EPSG" && self.code == code
    }
}

impl fmt::Display for Projection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.authority, self.code)
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
enum TransformKind {
    Identity,
    Wgs84ToWebMercator,
    WebMercatorToWgs84,
}

/// Coordinate transform between two projections.
///
/// Only the closed-form cases are available: identity and
/// EPSG:4326 ↔ EPSG:3857 (spherical mercator).
#[derive(Clone, Debug)]
pub struct ProjectionTransform {
    from: Projection,
    to: Projection,
    kind: TransformKind,
}

impl ProjectionTransform {
    pub fn new(from: &Projection, to: &Projection) -> Result<Self> {
        let kind = if from == to {
            TransformKind::Identity
        } else if from.is_epsg(4326) && to.is_epsg(3857) {
            TransformKind::Wgs84ToWebMercator
        } else if from.is_epsg(3857) && to.is_epsg(4326) {
            TransformKind::WebMercatorToWgs84
        } else {
            return Err(GpkgError::UnsupportedProjectionTransform {
                from: from.to_string(),
                to: to.to_string(),
            });
        };

        Ok(Self {
            from: from.clone(),
            to: to.clone(),
            kind,
        })
    }

    pub fn from_projection(&self) -> &Projection {
        &self.from
    }

    pub fn to_projection(&self) -> &Projection {
        &self.to
    }

    pub fn is_identity(&self) -> bool {
        self.kind == TransformKind::Identity
    }

    /// Transform an `(x, y)` coordinate.
    pub fn transform(&self, x: f64, y: f64) -> (f64, f64) {
        match self.kind {
            TransformKind::Identity => (x, y),
            TransformKind::Wgs84ToWebMercator => {
                let lat = y.clamp(-WEB_MERCATOR_MAX_LATITUDE, WEB_MERCATOR_MAX_LATITUDE);
                let mx = x.to_radians() * EARTH_RADIUS;
                let my = (PI / 4.0 + lat.to_radians() / 2.0).tan().ln() * EARTH_RADIUS;
                (mx, my)
            }
            TransformKind::WebMercatorToWgs84 => {
                let lon = (x / EARTH_RADIUS).to_degrees();
                let lat = (2.0 * (y / EARTH_RADIUS).exp().atan() - PI / 2.0).to_degrees();
                (lon, lat)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wgs84_to_web_mercator_and_back() -> Result<()> {
        let forward = ProjectionTransform::new(&Projection::epsg(4326), &Projection::epsg(3857))?;
        let (x, y) = forward.transform(180.0, 0.0);
        assert!((x - 20_037_508.342_789_244).abs() < 1e-6);
        assert!(y.abs() < 1e-6);

        let back = ProjectionTransform::new(&Projection::epsg(3857), &Projection::epsg(4326))?;
        let (lon, lat) = back.transform(forward.transform(139.7, 35.6).0, forward.transform(139.7, 35.6).1);
        assert!((lon - 139.7).abs() < 1e-9);
        assert!((lat - 35.6).abs() < 1e-9);
        Ok(())
    }

    #[test]
    fn unsupported_transform_fails() {
        let err = ProjectionTransform::new(&Projection::epsg(4326), &Projection::epsg(32654))
            .expect_err("unsupported");
        assert!(matches!(err, GpkgError::UnsupportedProjectionTransform { .. }));
        assert!(
            ProjectionTransform::new(&Projection::new("epsg", 4326), &Projection::epsg(4326))
                .map(|t| t.is_identity())
                .unwrap_or(false)
        );
    }
}
