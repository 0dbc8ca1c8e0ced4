/// Centre/extents bounds tracking and oriented-box transforms
use glam::{Affine3A, Vec3};
use serde::{Deserialize, Serialize};

/// Axis-aligned bounds stored as centre plus half-size per axis.
/// Extents are always non-negative.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub center: Vec3,
    pub extents: Vec3,
}

impl Bounds {
    pub fn new(center: Vec3, extents: Vec3) -> Self {
        Self {
            center,
            extents: extents.abs(),
        }
    }

    /// Create bounds spanning two corners in any order
    pub fn from_min_max(a: Vec3, b: Vec3) -> Self {
        let min = a.min(b);
        let max = a.max(b);
        Self {
            center: (min + max) * 0.5,
            extents: (max - min) * 0.5,
        }
    }

    /// Create the tightest bounds around a point set, `None` when empty
    pub fn from_points(points: &[Vec3]) -> Option<Self> {
        let first = *points.first()?;
        let (min, max) = points
            .iter()
            .fold((first, first), |(min, max), &p| (min.min(p), max.max(p)));
        Some(Self::from_min_max(min, max))
    }

    pub fn min(&self) -> Vec3 {
        self.center - self.extents
    }

    pub fn max(&self) -> Vec3 {
        self.center + self.extents
    }

    /// Full size per axis
    pub fn size(&self) -> Vec3 {
        self.extents * 2.0
    }

    /// Bounding sphere radius around the centre
    pub fn radius(&self) -> f32 {
        self.extents.length()
    }

    /// Axis-aligned bounds of this box after a rotation/scale/translation.
    /// Each world extent is the sum of the absolute projections of the
    /// transformed local half-axes, which is exact for the oriented box.
    pub fn transformed(&self, transform: &Affine3A) -> Self {
        let center = transform.transform_point3(self.center);
        let ax = transform.transform_vector3(Vec3::new(self.extents.x, 0.0, 0.0));
        let ay = transform.transform_vector3(Vec3::new(0.0, self.extents.y, 0.0));
        let az = transform.transform_vector3(Vec3::new(0.0, 0.0, self.extents.z));

        Self {
            center,
            extents: ax.abs() + ay.abs() + az.abs(),
        }
    }

    pub fn contains(&self, point: Vec3) -> bool {
        let d = (point - self.center).abs();
        d.cmple(self.extents).all()
    }
}
