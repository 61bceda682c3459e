use super::projection::ProjectionTransform;

/// Axis-aligned extent in the units of a spatial reference system.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BoundingBox {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl BoundingBox {
    pub fn new(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Self {
        Self {
            min_x,
            min_y,
            max_x,
            max_y,
        }
    }

    /// Whole-world extent in WGS 84 degrees.
    pub fn world_wgs84() -> Self {
        Self::new(-180.0, -90.0, 180.0, 90.0)
    }

    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }

    pub fn union(&self, other: &BoundingBox) -> BoundingBox {
        BoundingBox {
            min_x: self.min_x.min(other.min_x),
            min_y: self.min_y.min(other.min_y),
            max_x: self.max_x.max(other.max_x),
            max_y: self.max_y.max(other.max_y),
        }
    }

    pub fn contains(&self, x: f64, y: f64) -> bool {
        x >= self.min_x && x <= self.max_x && y >= self.min_y && y <= self.max_y
    }

    /// Transform the corners and return their extent.
    pub fn transform(&self, transform: &ProjectionTransform) -> BoundingBox {
        if transform.is_identity() {
            return *self;
        }
        let corners = [
            transform.transform(self.min_x, self.min_y),
            transform.transform(self.min_x, self.max_y),
            transform.transform(self.max_x, self.min_y),
            transform.transform(self.max_x, self.max_y),
        ];
        let (x0, y0) = corners[0];
        corners
            .iter()
            .skip(1)
            .fold(BoundingBox::new(x0, y0, x0, y0), |bbox, &(x, y)| {
                bbox.union(&BoundingBox::new(x, y, x, y))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::projection::Projection;

    #[test]
    fn unions_and_transforms() -> crate::Result<()> {
        let a = BoundingBox::new(0.0, 0.0, 1.0, 1.0);
        let b = BoundingBox::new(-1.0, 0.5, 0.5, 2.0);
        assert_eq!(a.union(&b), BoundingBox::new(-1.0, 0.0, 1.0, 2.0));
        assert!(a.contains(0.5, 0.5));

        let transform = ProjectionTransform::new(&Projection::epsg(4326), &Projection::epsg(3857))?;
        let world = BoundingBox::new(-180.0, -85.0, 180.0, 85.0).transform(&transform);
        assert!((world.max_x - 20_037_508.342_789_244).abs() < 1e-6);
        assert!((world.min_x + world.max_x).abs() < 1e-6);
        assert!(world.max_y > 19_000_000.0);
        Ok(())
    }
}
