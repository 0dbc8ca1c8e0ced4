/// Per-frame proxy orientation and footprint reconstruction
use crate::octahedral;
use crate::sample_grid::{look_rotation, view_basis};
use constants::material;
use glam::{Affine3A, Mat3, Quat, Vec3};

/// Footprint of the target's bounding box as seen from the current camera.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RuntimeFootprint {
    /// Unit view direction, proxy position minus camera position.
    pub view_dir: Vec3,
    /// Camera-relative right axis (world space).
    pub basis_u: Vec3,
    /// Camera-relative up axis (world space).
    pub basis_v: Vec3,
    /// Exact silhouette half-extents before padding.
    pub half_u: f32,
    pub half_v: f32,
    /// Half-extents after padding, fed to the impostor material.
    pub padded_half_u: f32,
    pub padded_half_v: f32,
    /// Proxy rotation mapping local X/Y/Z onto U, V and -view_dir.
    pub rotation: Quat,
    /// Proxy scale for a unit-sized proxy (built with radius 0.5).
    pub scale: Vec3,
}

/// Fits the proxy to the target from the current camera position.
///
/// `target` is the target's object-to-world transform and `extents_os`
/// its object-space half-size. Silhouette half-extents are the absolute
/// object-space basis vectors dotted with the extents; the linear part is
/// applied transposed, which equals its inverse for rigid transforms and
/// stays exact when the target is scaled.
pub fn fit_proxy(
    camera_position: Vec3,
    proxy_position: Vec3,
    target: &Affine3A,
    extents_os: Vec3,
    padding: f32,
) -> RuntimeFootprint {
    let view_dir = (proxy_position - camera_position)
        .try_normalize()
        .unwrap_or(Vec3::NEG_Z);
    let (basis_u, basis_v) = view_basis(view_dir);

    let to_object = Mat3::from(target.matrix3).transpose();
    let u_os = (to_object * basis_u).abs();
    let v_os = (to_object * basis_v).abs();
    let extents = extents_os.abs();

    let half_u = u_os.dot(extents);
    let half_v = v_os.dot(extents);
    let pad = 1.0 + padding.max(0.0);
    let padded_half_u = half_u * pad;
    let padded_half_v = half_v * pad;

    RuntimeFootprint {
        view_dir,
        basis_u,
        basis_v,
        half_u,
        half_v,
        padded_half_u,
        padded_half_v,
        rotation: Quat::from_mat3(&Mat3::from_cols(basis_u, basis_v, -view_dir)),
        scale: Vec3::new(
            2.0 * padded_half_u,
            2.0 * padded_half_v,
            2.0 * padded_half_u.max(padded_half_v),
        ),
    }
}

impl RuntimeFootprint {
    /// Proxy transform placing a unit proxy at `proxy_position`.
    pub fn proxy_transform(&self, proxy_position: Vec3) -> Affine3A {
        Affine3A::from_scale_rotation_translation(self.scale, self.rotation, proxy_position)
    }

    /// Padded half-extents under their material parameter names.
    pub fn bindings(&self) -> [(&'static str, f32); 2] {
        [
            (material::HALF_U, self.padded_half_u),
            (material::HALF_V, self.padded_half_v),
        ]
    }
}

/// Plain camera-facing rotation with world up, for single-view billboards.
pub fn billboard_rotation(proxy_position: Vec3, camera_position: Vec3) -> Quat {
    let to_proxy = (proxy_position - camera_position)
        .try_normalize()
        .unwrap_or(Vec3::NEG_Z);
    // The billboard's +Z faces the camera.
    look_rotation(to_proxy)
}

/// Tile (or array layer) the current view samples.
/// The view direction is taken into the target's local frame first,
/// matching the object-space directions used at bake time.
pub fn view_tile(
    camera_position: Vec3,
    proxy_position: Vec3,
    target_rotation: Quat,
    tile_count: u32,
) -> (u32, u32) {
    let view_dir = (proxy_position - camera_position)
        .try_normalize()
        .unwrap_or(Vec3::NEG_Z);
    let local = target_rotation.normalize().inverse() * view_dir;
    octahedral::nearest_tile(local, tile_count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_axis_views_match_face_extents() {
        let extents = Vec3::new(1.0, 2.0, 3.0);
        let target = Affine3A::IDENTITY;
        let cases = [
            // (camera offset, expected half-width, expected half-height)
            (Vec3::X, extents.z, extents.y),
            (Vec3::NEG_X, extents.z, extents.y),
            (Vec3::Z, extents.x, extents.y),
            (Vec3::NEG_Z, extents.x, extents.y),
            (Vec3::Y, extents.z, extents.x),
            (Vec3::NEG_Y, extents.z, extents.x),
        ];

        for (axis, expected_u, expected_v) in cases {
            let fit = fit_proxy(axis * 10.0, Vec3::ZERO, &target, extents, 0.02);
            assert_relative_eq!(fit.half_u, expected_u, epsilon = 1e-5);
            assert_relative_eq!(fit.half_v, expected_v, epsilon = 1e-5);
            assert_relative_eq!(fit.padded_half_u, expected_u * 1.02, epsilon = 1e-5);
        }
    }

    #[test]
    fn test_rotated_target_matches_local_face() {
        let extents = Vec3::new(1.0, 2.0, 3.0);
        let rotation = Quat::from_rotation_y(std::f32::consts::FRAC_PI_2);
        let target = Affine3A::from_rotation_translation(rotation, Vec3::new(4.0, 0.0, 0.0));

        // After a quarter turn about Y the local Z face looks down world X.
        let fit = fit_proxy(Vec3::new(14.0, 0.0, 0.0), target.translation.into(), &target, extents, 0.0);
        assert_relative_eq!(fit.half_u, extents.x, epsilon = 1e-5);
        assert_relative_eq!(fit.half_v, extents.y, epsilon = 1e-5);
    }

    #[test]
    fn test_footprint_never_below_silhouette() {
        let extents = Vec3::new(0.5, 1.5, 1.0);
        let target = Affine3A::from_quat(Quat::from_euler(glam::EulerRot::XYZ, 0.3, 1.1, -0.4));
        let corners: Vec<Vec3> = (0..8)
            .map(|i| {
                let s = Vec3::new(
                    if i & 1 == 0 { -1.0 } else { 1.0 },
                    if i & 2 == 0 { -1.0 } else { 1.0 },
                    if i & 4 == 0 { -1.0 } else { 1.0 },
                );
                target.transform_point3(s * extents)
            })
            .collect();

        for camera in [
            Vec3::new(5.0, 3.0, -2.0),
            Vec3::new(-4.0, 0.5, 6.0),
            Vec3::new(0.0, 9.0, 0.01),
        ] {
            let fit = fit_proxy(camera, Vec3::ZERO, &target, extents, 0.0);
            let max_u = corners.iter().map(|c| c.dot(fit.basis_u).abs()).fold(0.0, f32::max);
            let max_v = corners.iter().map(|c| c.dot(fit.basis_v).abs()).fold(0.0, f32::max);

            // The box's silhouette extent along each axis is exactly reached by a corner.
            assert_relative_eq!(fit.half_u, max_u, epsilon = 1e-4);
            assert_relative_eq!(fit.half_v, max_v, epsilon = 1e-4);
        }
    }

    #[test]
    fn test_scaled_target() {
        let target = Affine3A::from_scale(Vec3::new(2.0, 3.0, 1.0));
        let fit = fit_proxy(Vec3::new(0.0, 0.0, 5.0), Vec3::ZERO, &target, Vec3::ONE, 0.0);
        assert_relative_eq!(fit.half_u, 2.0, epsilon = 1e-5);
        assert_relative_eq!(fit.half_v, 3.0, epsilon = 1e-5);
    }

    #[test]
    fn test_bindings_carry_padded_extents() {
        let fit = fit_proxy(Vec3::new(0.0, 0.0, 5.0), Vec3::ZERO, &Affine3A::IDENTITY, Vec3::ONE, 0.1);
        let bindings = fit.bindings();
        assert_eq!(bindings[0].0, "_HalfU");
        assert_eq!(bindings[1].0, "_HalfV");
        assert_relative_eq!(bindings[0].1, 1.1, epsilon = 1e-5);
        assert_relative_eq!(bindings[1].1, 1.1, epsilon = 1e-5);
    }

    #[test]
    fn test_orientation_faces_camera() {
        let camera = Vec3::new(3.0, 2.0, 6.0);
        let fit = fit_proxy(camera, Vec3::ZERO, &Affine3A::IDENTITY, Vec3::ONE, 0.02);

        let facing = fit.rotation * Vec3::Z;
        assert_relative_eq!(facing.dot(camera.normalize()), 1.0, epsilon = 1e-5);
        assert_relative_eq!((fit.rotation * Vec3::X).dot(fit.basis_u), 1.0, epsilon = 1e-5);
        assert_relative_eq!(fit.scale.x, 2.0 * fit.padded_half_u, epsilon = 1e-6);
        assert_relative_eq!(fit.scale.y, 2.0 * fit.padded_half_v, epsilon = 1e-6);
    }

    #[test]
    fn test_vertical_view_switches_reference() {
        let fit = fit_proxy(Vec3::new(0.0, 10.0, 0.0), Vec3::ZERO, &Affine3A::IDENTITY, Vec3::ONE, 0.0);
        assert!(fit.basis_u.is_finite() && fit.basis_v.is_finite());
        assert_relative_eq!(fit.basis_u.dot(fit.view_dir), 0.0, epsilon = 1e-6);
        assert_relative_eq!(fit.basis_v.dot(fit.view_dir), 0.0, epsilon = 1e-6);
    }

    #[test]
    fn test_billboard_faces_camera() {
        let q = billboard_rotation(Vec3::ZERO, Vec3::new(0.0, 0.0, 4.0));
        let facing = q * Vec3::Z;
        assert_relative_eq!(facing.z, 1.0, epsilon = 1e-6);
    }

    #[test]
    fn test_view_tile_follows_target_rotation() {
        let rotation = Quat::from_rotation_y(0.9);
        let n = 8;
        let local = octahedral::tile_direction(5, 2, n);
        let world = rotation * local;
        let camera = -world * 10.0;
        assert_eq!(view_tile(camera, Vec3::ZERO, rotation, n), (5, 2));
    }
}
