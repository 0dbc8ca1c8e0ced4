/// Octahedral view grid with per-tile camera placement and clip planes
use crate::bounds::Bounds;
use crate::octahedral;
use constants::coordinate_system::{UP_SWITCH_THRESHOLD, WORLD_RIGHT, WORLD_UP};
use constants::render_settings::{CLIP_RADIUS_MARGIN, FOV_FIT_PADDING, NEAR_PLANE_EPSILON};
use glam::{Mat3, Quat, Vec2, Vec3};
use serde::{Deserialize, Serialize};

/// Bake camera projection mode.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Projection {
    /// Perspective camera placed so the bounding sphere fits the vertical field of view.
    Perspective { fov_degrees: f32 },
    /// Orthographic camera at `radius * distance_multiplier`, half-size = radius.
    Orthographic,
}

/// Right/up pair perpendicular to `forward`.
/// World up is the reference axis unless `forward` is nearly parallel to it.
pub fn view_basis(forward: Vec3) -> (Vec3, Vec3) {
    let up = Vec3::from(WORLD_UP);
    let reference = if forward.dot(up).abs() > UP_SWITCH_THRESHOLD {
        Vec3::from(WORLD_RIGHT)
    } else {
        up
    };

    let back = -forward;
    let right = reference.cross(back).normalize();
    let up = back.cross(right);
    (right, up)
}

/// Rotation whose local -Z axis points along `forward`.
pub fn look_rotation(forward: Vec3) -> Quat {
    let forward = forward.normalize();
    let (right, up) = view_basis(forward);
    Quat::from_mat3(&Mat3::from_cols(right, up, -forward))
}

/// Camera placement and projection for one directional snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CameraPose {
    pub position: Vec3,
    pub rotation: Quat,
    pub projection: Projection,
    pub near: f32,
    pub far: f32,
    /// Half-size of the orthographic view volume (ignored for perspective).
    pub ortho_half_size: f32,
}

impl CameraPose {
    pub fn forward(&self) -> Vec3 {
        self.rotation * Vec3::NEG_Z
    }

    pub fn right(&self) -> Vec3 {
        self.rotation * Vec3::X
    }

    pub fn up(&self) -> Vec3 {
        self.rotation * Vec3::Y
    }

    /// World point in camera space (camera looks down -Z).
    pub fn to_view(&self, point: Vec3) -> Vec3 {
        self.rotation.inverse() * (point - self.position)
    }

    /// World direction in camera space.
    pub fn direction_to_view(&self, direction: Vec3) -> Vec3 {
        self.rotation.inverse() * direction
    }

    /// Projects a camera-space point to normalized device xy in [-1,1]²
    /// and linear depth in [0,1] between the clip planes.
    /// Returns `None` for points behind the camera.
    pub fn project_view(&self, view: Vec3) -> Option<(Vec2, f32)> {
        let depth = -view.z;
        if depth <= 0.0 {
            return None;
        }

        let ndc = match self.projection {
            Projection::Perspective { fov_degrees } => {
                let scale = (fov_degrees.to_radians() * 0.5).tan();
                Vec2::new(view.x, view.y) / (depth * scale)
            }
            Projection::Orthographic => Vec2::new(view.x, view.y) / self.ortho_half_size,
        };

        let linear = (depth - self.near) / (self.far - self.near);
        Some((ndc, linear))
    }
}

/// One octahedral view: grid cell, view direction and derived camera.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TileSample {
    pub tx: u32,
    pub ty: u32,
    /// Row-major tile index `ty * N + tx`, also the array layer index.
    pub index: u32,
    /// World-space view direction, the camera's forward axis.
    pub direction: Vec3,
    pub pose: CameraPose,
}

/// Generates the N x N camera set around a target.
#[derive(Debug, Clone)]
pub struct SampleGrid {
    tile_count: u32,
    bounds: Bounds,
    projection: Projection,
    distance_multiplier: f32,
    object_rotation: Quat,
}

impl SampleGrid {
    pub fn new(
        tile_count: u32,
        bounds: Bounds,
        projection: Projection,
        distance_multiplier: f32,
    ) -> Self {
        Self {
            tile_count,
            bounds,
            projection,
            distance_multiplier,
            object_rotation: Quat::IDENTITY,
        }
    }

    /// Rotates object-space tile directions into world space so the
    /// baked views stay attached to the target's local frame.
    pub fn with_object_rotation(mut self, rotation: Quat) -> Self {
        self.object_rotation = rotation.normalize();
        self
    }

    pub fn tile_count(&self) -> u32 {
        self.tile_count
    }

    pub fn sample_count(&self) -> u32 {
        self.tile_count * self.tile_count
    }

    pub fn radius(&self) -> f32 {
        self.bounds.radius()
    }

    /// Camera distance from the target centre.
    /// Orthographic uses the fixed multiplier, perspective fits the
    /// bounding sphere to the field of view with a constant padding.
    pub fn camera_distance(&self) -> f32 {
        let radius = self.radius();
        match self.projection {
            Projection::Perspective { fov_degrees } => {
                let half_fov = (fov_degrees * 0.5).to_radians();
                radius / half_fov.tan() * FOV_FIT_PADDING
            }
            Projection::Orthographic => radius * self.distance_multiplier,
        }
    }

    /// Near/far planes enclosing the whole bounding sphere.
    pub fn clip_planes(&self) -> (f32, f32) {
        let distance = self.camera_distance();
        let reach = self.radius() * CLIP_RADIUS_MARGIN;
        let near = (distance - reach).max(NEAR_PLANE_EPSILON);
        let far = (distance + reach).max(near + NEAR_PLANE_EPSILON);
        (near, far)
    }

    /// Builds the sample for tile (tx, ty).
    pub fn sample(&self, tx: u32, ty: u32) -> TileSample {
        let local = octahedral::tile_direction(tx, ty, self.tile_count);
        let direction = (self.object_rotation * local).normalize();

        let distance = self.camera_distance();
        let (near, far) = self.clip_planes();
        let position = self.bounds.center - direction * distance;

        TileSample {
            tx,
            ty,
            index: ty * self.tile_count + tx,
            direction,
            pose: CameraPose {
                position,
                rotation: look_rotation(self.bounds.center - position),
                projection: self.projection,
                near,
                far,
                ortho_half_size: self.radius(),
            },
        }
    }

    /// All samples in row-major (ty, tx) order.
    pub fn samples(&self) -> Vec<TileSample> {
        (0..self.tile_count)
            .flat_map(|ty| (0..self.tile_count).map(move |tx| (tx, ty)))
            .map(|(tx, ty)| self.sample(tx, ty))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::collections::HashSet;

    fn unit_bounds() -> Bounds {
        Bounds::new(Vec3::ZERO, Vec3::ONE)
    }

    #[test]
    fn test_grid_is_exhaustive_and_row_major() {
        for n in [2, 4, 7] {
            let grid = SampleGrid::new(n, unit_bounds(), Projection::Orthographic, 2.0);
            let samples = grid.samples();
            assert_eq!(samples.len() as u32, n * n);

            let indices: HashSet<u32> = samples.iter().map(|s| s.index).collect();
            assert_eq!(indices.len() as u32, n * n);
            assert!(indices.iter().all(|&i| i < n * n));

            for (i, sample) in samples.iter().enumerate() {
                assert_eq!(sample.index, i as u32);
                assert_eq!(sample.index, sample.ty * n + sample.tx);
            }
        }
    }

    #[test]
    fn test_camera_looks_at_centre() {
        let bounds = Bounds::new(Vec3::new(3.0, -1.0, 2.0), Vec3::new(1.0, 2.0, 0.5));
        let grid = SampleGrid::new(
            6,
            bounds,
            Projection::Perspective { fov_degrees: 40.0 },
            2.0,
        );

        for sample in grid.samples() {
            let to_center = (bounds.center - sample.pose.position).normalize();
            assert_relative_eq!(sample.pose.forward().dot(to_center), 1.0, epsilon = 1e-5);
            assert_relative_eq!(sample.direction.length(), 1.0, epsilon = 1e-5);

            // Centre projects to the image centre.
            let (ndc, _) = sample
                .pose
                .project_view(sample.pose.to_view(bounds.center))
                .unwrap();
            assert_relative_eq!(ndc.x, 0.0, epsilon = 1e-4);
            assert_relative_eq!(ndc.y, 0.0, epsilon = 1e-4);
        }
    }

    #[test]
    fn test_distance_policies() {
        let bounds = unit_bounds();
        let radius = bounds.radius();

        let ortho = SampleGrid::new(4, bounds, Projection::Orthographic, 2.5);
        assert_relative_eq!(ortho.camera_distance(), radius * 2.5, epsilon = 1e-5);

        let persp = SampleGrid::new(4, bounds, Projection::Perspective { fov_degrees: 90.0 }, 2.5);
        assert_relative_eq!(persp.camera_distance(), radius * FOV_FIT_PADDING, epsilon = 1e-4);
    }

    #[test]
    fn test_clip_planes_enclose_sphere() {
        let bounds = unit_bounds();
        for projection in [
            Projection::Orthographic,
            Projection::Perspective { fov_degrees: 20.0 },
            Projection::Perspective { fov_degrees: 90.0 },
        ] {
            let grid = SampleGrid::new(4, bounds, projection, 1.01);
            let (near, far) = grid.clip_planes();
            let distance = grid.camera_distance();
            assert!(near >= NEAR_PLANE_EPSILON);
            assert!(near <= distance - bounds.radius() || near == NEAR_PLANE_EPSILON);
            assert!(far >= distance + bounds.radius());
        }
    }

    #[test]
    fn test_sphere_fits_perspective_frustum() {
        let bounds = unit_bounds();
        let grid = SampleGrid::new(4, bounds, Projection::Perspective { fov_degrees: 40.0 }, 2.0);
        let sample = grid.sample(1, 2);
        let pose = sample.pose;

        // Points on the sphere's silhouette along the camera's right/up axes stay inside.
        for axis in [pose.right(), -pose.right(), pose.up(), -pose.up()] {
            let p = bounds.center + axis * bounds.radius();
            let (ndc, depth) = pose.project_view(pose.to_view(p)).unwrap();
            assert!(ndc.x.abs() < 1.0 && ndc.y.abs() < 1.0);
            assert!((0.0..=1.0).contains(&depth));
        }
    }

    #[test]
    fn test_object_rotation_rotates_directions() {
        let rotation = Quat::from_rotation_y(0.7);
        let plain = SampleGrid::new(4, unit_bounds(), Projection::Orthographic, 2.0);
        let rotated = plain.clone().with_object_rotation(rotation);

        let a = plain.sample(3, 1).direction;
        let b = rotated.sample(3, 1).direction;
        let expected = rotation * a;
        assert_relative_eq!(b.x, expected.x, epsilon = 1e-5);
        assert_relative_eq!(b.y, expected.y, epsilon = 1e-5);
        assert_relative_eq!(b.z, expected.z, epsilon = 1e-5);
    }

    #[test]
    fn test_look_rotation_near_vertical() {
        for forward in [Vec3::Y, Vec3::NEG_Y, Vec3::new(0.01, 1.0, 0.0).normalize()] {
            let q = look_rotation(forward);
            let f = q * Vec3::NEG_Z;
            assert_relative_eq!(f.dot(forward), 1.0, epsilon = 1e-5);
            assert!(q.is_normalized());
        }
    }
}
