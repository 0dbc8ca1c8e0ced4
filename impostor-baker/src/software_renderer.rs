/// Headless CPU rasterizer implementing the render collaborator
use crate::capture::{CaptureFailure, CaptureRequest, Channel, ChannelBuffer, RenderCollaborator};
use crate::mesh::TargetMesh;
use crate::sample_grid::{CameraPose, Projection};
use glam::{Vec2, Vec3, Vec4};

/// Triangle vertex after projection to pixel space.
#[derive(Clone, Copy)]
struct ScreenVert {
    pixel: Vec2,
    /// Linear depth in [0,1] between the clip planes.
    depth: f32,
    /// Perspective weight (1/view depth, or 1 for orthographic).
    inv_w: f32,
    color: Vec4,
}

/// Rasterizes a target mesh with a z-buffer, one channel per capture.
pub struct SoftwareRenderer<'a> {
    mesh: &'a TargetMesh,
    world_positions: Vec<Vec3>,
    depth_buffer: Vec<f32>,
    direct_copy: bool,
}

impl<'a> SoftwareRenderer<'a> {
    pub fn new(mesh: &'a TargetMesh) -> Self {
        let transform = mesh.world_transform();
        let world_positions = mesh
            .positions
            .iter()
            .map(|&p| transform.transform_point3(Vec3::from(p)))
            .collect();

        Self {
            mesh,
            world_positions,
            depth_buffer: Vec::new(),
            direct_copy: true,
        }
    }

    /// Reports no direct copy support, forcing the packer's readback path.
    pub fn with_readback_copy(mut self) -> Self {
        self.direct_copy = false;
        self
    }

    fn project(&self, pose: &CameraPose, resolution: f32, index: usize) -> Option<ScreenVert> {
        let view = pose.to_view(self.world_positions[index]);
        let (ndc, depth) = pose.project_view(view)?;

        let inv_w = match pose.projection {
            Projection::Perspective { .. } => 1.0 / -view.z,
            Projection::Orthographic => 1.0,
        };

        // Row 0 is the top of the image.
        let pixel = Vec2::new(
            (ndc.x * 0.5 + 0.5) * resolution,
            (0.5 - ndc.y * 0.5) * resolution,
        );

        Some(ScreenVert {
            pixel,
            depth,
            inv_w,
            color: Vec4::from(self.mesh.color(index)),
        })
    }

    /// Flat world normal of a triangle, flipped to face the camera.
    fn face_normal(&self, pose: &CameraPose, tri: [usize; 3]) -> Option<Vec3> {
        let a = self.world_positions[tri[0]];
        let b = self.world_positions[tri[1]];
        let c = self.world_positions[tri[2]];
        let normal = (b - a).cross(c - a).try_normalize()?;

        let to_camera = match pose.projection {
            Projection::Perspective { .. } => pose.position - a,
            Projection::Orthographic => -pose.forward(),
        };
        Some(if normal.dot(to_camera) < 0.0 { -normal } else { normal })
    }

    /// Z-tested fill of one triangle. `shade` gets the perspective-correct
    /// barycentrics and the linear depth of each visible pixel.
    fn rasterize(
        &mut self,
        verts: [ScreenVert; 3],
        shade: impl Fn(Vec3, f32) -> [f32; 4],
        target: &mut ChannelBuffer,
    ) {
        let width = target.width as usize;
        let depth_buffer = &mut self.depth_buffer;
        cover(verts, width, target.height as usize, |px, py, bary, depth| {
            let slot = py * width + px;
            if depth >= depth_buffer[slot] {
                return;
            }
            depth_buffer[slot] = depth;
            target.set(px as u32, py as u32, shade(bary, depth));
        });
    }

    /// Records the nearest and farthest surface depth of one triangle per pixel.
    fn accumulate_range(
        &mut self,
        verts: [ScreenVert; 3],
        back: &mut [f32],
        width: usize,
        height: usize,
    ) {
        let front = &mut self.depth_buffer;
        cover(verts, width, height, |px, py, _, depth| {
            let slot = py * width + px;
            front[slot] = front[slot].min(depth);
            back[slot] = back[slot].max(depth);
        });
    }
}

/// Visits every pixel centre inside the triangle whose depth lies between
/// the clip planes.
fn cover(
    verts: [ScreenVert; 3],
    width: usize,
    height: usize,
    mut visit: impl FnMut(usize, usize, Vec3, f32),
) {
    let [v0, v1, v2] = verts;

    let area = edge(v0.pixel, v1.pixel, v2.pixel);
    if area.abs() <= f32::EPSILON {
        return;
    }

    let min = v0.pixel.min(v1.pixel).min(v2.pixel).floor().max(Vec2::ZERO);
    let max = v0
        .pixel
        .max(v1.pixel)
        .max(v2.pixel)
        .ceil()
        .min(Vec2::new(width as f32, height as f32));

    for py in min.y as usize..max.y as usize {
        for px in min.x as usize..max.x as usize {
            let p = Vec2::new(px as f32 + 0.5, py as f32 + 0.5);
            let w0 = edge(v1.pixel, v2.pixel, p) / area;
            let w1 = edge(v2.pixel, v0.pixel, p) / area;
            let w2 = edge(v0.pixel, v1.pixel, p) / area;
            if w0 < 0.0 || w1 < 0.0 || w2 < 0.0 {
                continue;
            }

            // Linear depth is affine in view space, so it takes the
            // perspective-correct weights like any other attribute.
            let pw = Vec3::new(w0 * v0.inv_w, w1 * v1.inv_w, w2 * v2.inv_w);
            let bary = pw / (pw.x + pw.y + pw.z);
            let depth = bary.dot(Vec3::new(v0.depth, v1.depth, v2.depth));
            if !(0.0..=1.0).contains(&depth) {
                continue;
            }
            visit(px, py, bary, depth);
        }
    }
}

fn edge(a: Vec2, b: Vec2, p: Vec2) -> f32 {
    (b.x - a.x) * (p.y - a.y) - (b.y - a.y) * (p.x - a.x)
}

impl RenderCollaborator for SoftwareRenderer<'_> {
    fn capture(
        &mut self,
        request: &CaptureRequest,
        target: &mut ChannelBuffer,
    ) -> Result<(), CaptureFailure> {
        if target.width == 0 || target.height != target.width {
            return Err(CaptureFailure(format!(
                "unsupported render target {}x{}",
                target.width, target.height
            )));
        }
        if target.channel != request.channel {
            return Err(CaptureFailure(format!(
                "target holds {:?}, request is {:?}",
                target.channel, request.channel
            )));
        }

        target.clear(request.clear);
        self.depth_buffer.clear();
        self.depth_buffer
            .resize(target.width as usize * target.height as usize, f32::INFINITY);

        let pose = request.pose;
        let resolution = target.width as f32;
        let triangles: Vec<[usize; 3]> = self.mesh.triangles().collect();
        let mut back = Vec::new();
        if request.channel == Channel::DepthRange {
            back.resize(self.depth_buffer.len(), f32::NEG_INFINITY);
        }

        for tri in triangles {
            let projected = [
                self.project(&pose, resolution, tri[0]),
                self.project(&pose, resolution, tri[1]),
                self.project(&pose, resolution, tri[2]),
            ];
            let [Some(a), Some(b), Some(c)] = projected else {
                continue;
            };
            let Some(normal) = self.face_normal(&pose, tri) else {
                continue;
            };

            let colors = [a.color, b.color, c.color];
            match request.channel {
                Channel::Color => self.rasterize(
                    [a, b, c],
                    |w, _| (colors[0] * w.x + colors[1] * w.y + colors[2] * w.z).to_array(),
                    target,
                ),
                Channel::Normal => {
                    let encoded = normal * 0.5 + Vec3::splat(0.5);
                    self.rasterize(
                        [a, b, c],
                        |_, _| [encoded.x, encoded.y, encoded.z, 1.0],
                        target,
                    )
                }
                Channel::Depth => {
                    self.rasterize([a, b, c], |_, depth| [depth, 0.0, 0.0, 0.0], target)
                }
                Channel::DepthRange => self.accumulate_range(
                    [a, b, c],
                    &mut back,
                    target.width as usize,
                    target.height as usize,
                ),
            }
        }

        if request.channel == Channel::DepthRange {
            let width = target.width as usize;
            for (slot, (&near, &far)) in self.depth_buffer.iter().zip(&back).enumerate() {
                if near.is_finite() {
                    target.set((slot % width) as u32, (slot / width) as u32, [near, far, 0.0, 0.0]);
                }
            }
        }

        Ok(())
    }

    fn supports_direct_copy(&self) -> bool {
        self.direct_copy
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sample_grid::SampleGrid;
    use approx::assert_relative_eq;

    fn render(mesh: &TargetMesh, projection: Projection, channel: Channel) -> ChannelBuffer {
        let bounds = mesh.world_bounds().unwrap();
        let grid = SampleGrid::new(2, bounds, projection, 2.0);
        // Tile (0,0) of a 2x2 grid looks across the box's +X/+Y edge.
        let sample = grid.sample(0, 0);

        let mut renderer = SoftwareRenderer::new(mesh);
        let mut target = ChannelBuffer::new(channel, 32, 32);
        let request = CaptureRequest {
            pose: sample.pose,
            channel,
            clear: channel.background(),
        };
        renderer.capture(&request, &mut target).unwrap();
        target
    }

    #[test]
    fn test_centre_pixel_hits_geometry() {
        let mesh = TargetMesh::cuboid("box", Vec3::ONE);
        for projection in [Projection::Orthographic, Projection::Perspective { fov_degrees: 40.0 }] {
            let color = render(&mesh, projection, Channel::Color);
            assert_eq!(color.get(16, 16), [1.0; 4]);

            let depth = render(&mesh, projection, Channel::Depth);
            let d = depth.get(16, 16)[0];
            assert!(d > 0.0 && d < 0.5, "depth {} should be in front of the centre", d);

            let normal = render(&mesh, projection, Channel::Normal);
            assert_eq!(normal.get(16, 16)[3], 1.0);
        }
    }

    #[test]
    fn test_corners_keep_background() {
        let mesh = TargetMesh::cuboid("box", Vec3::splat(0.2));
        let normal = render(&mesh, Projection::Orthographic, Channel::Normal);
        assert_eq!(normal.get(0, 0), [0.5, 0.5, 1.0, 0.0]);
        let depth = render(&mesh, Projection::Orthographic, Channel::Depth);
        assert_eq!(depth.get(31, 31)[0], 1.0);
        let color = render(&mesh, Projection::Orthographic, Channel::Color);
        assert_eq!(color.get(0, 31), [0.0; 4]);
    }

    #[test]
    fn test_front_face_occludes_back_face() {
        // Camera looking down -Z sees the +Z face.
        let mesh = TargetMesh::cuboid("box", Vec3::ONE).with_colors(
            (0..8)
                .map(|i| if i & 4 == 0 { [1.0, 0.0, 0.0, 1.0] } else { [0.0, 0.0, 1.0, 1.0] })
                .collect(),
        );
        let pose = CameraPose {
            position: Vec3::new(0.0, 0.0, 5.0),
            rotation: glam::Quat::IDENTITY,
            projection: Projection::Orthographic,
            near: 0.5,
            far: 10.0,
            ortho_half_size: 2.0,
        };
        let mut renderer = SoftwareRenderer::new(&mesh);

        let mut color = ChannelBuffer::new(Channel::Color, 16, 16);
        let request = CaptureRequest {
            pose,
            channel: Channel::Color,
            clear: Channel::Color.background(),
        };
        renderer.capture(&request, &mut color).unwrap();
        assert_eq!(color.get(8, 8), [0.0, 0.0, 1.0, 1.0]);

        let mut normal = ChannelBuffer::new(Channel::Normal, 16, 16);
        let request = CaptureRequest {
            channel: Channel::Normal,
            clear: Channel::Normal.background(),
            ..request
        };
        renderer.capture(&request, &mut normal).unwrap();
        assert_eq!(normal.get(8, 8), [0.5, 0.5, 1.0, 1.0]);
    }

    #[test]
    fn test_perspective_depth_is_interpolated_in_view_space() {
        // Slanted plane z = -5 - x/2, seen from the origin with a 90 degree frustum.
        let mesh = TargetMesh::new(
            "slope",
            vec![[-4.0, -4.0, -3.0], [4.0, -4.0, -7.0], [0.0, 6.0, -5.0]],
            vec![0, 1, 2],
        );
        let pose = CameraPose {
            position: Vec3::ZERO,
            rotation: glam::Quat::IDENTITY,
            projection: Projection::Perspective { fov_degrees: 90.0 },
            near: 1.0,
            far: 11.0,
            ortho_half_size: 1.0,
        };
        let mut renderer = SoftwareRenderer::new(&mesh);
        let mut depth = ChannelBuffer::new(Channel::Depth, 32, 32);
        let request = CaptureRequest {
            pose,
            channel: Channel::Depth,
            clear: Channel::Depth.background(),
        };
        renderer.capture(&request, &mut depth).unwrap();

        // Pixel (16,16) samples the ray (1/32, -1/32, -1), which meets the
        // plane at view depth 5 * 64 / 63.
        let expected = (5.0 * 64.0 / 63.0 - 1.0) / 10.0;
        assert_relative_eq!(depth.get(16, 16)[0], expected, epsilon = 1e-3);
    }

    #[test]
    fn test_depth_range_holds_front_and_back_surfaces() {
        let mesh = TargetMesh::cuboid("box", Vec3::ONE);
        let pose = CameraPose {
            position: Vec3::new(0.0, 0.0, 5.0),
            rotation: glam::Quat::IDENTITY,
            projection: Projection::Orthographic,
            near: 1.0,
            far: 9.0,
            ortho_half_size: 2.0,
        };
        let mut renderer = SoftwareRenderer::new(&mesh);
        let mut range = ChannelBuffer::new(Channel::DepthRange, 16, 16);
        let request = CaptureRequest {
            pose,
            channel: Channel::DepthRange,
            clear: Channel::DepthRange.background(),
        };
        renderer.capture(&request, &mut range).unwrap();

        // Faces at z = 1 and z = -1 sit 4 and 6 units from the camera.
        let [front, back, ..] = range.get(8, 8);
        assert_relative_eq!(front, 3.0 / 8.0, epsilon = 1e-3);
        assert_relative_eq!(back, 5.0 / 8.0, epsilon = 1e-3);
        assert_eq!(range.get(0, 0), Channel::DepthRange.background());
    }

    #[test]
    fn test_mismatched_target_fails() {
        let mesh = TargetMesh::cuboid("box", Vec3::ONE);
        let mut renderer = SoftwareRenderer::new(&mesh);
        let sample = SampleGrid::new(2, mesh.world_bounds().unwrap(), Projection::Orthographic, 2.0)
            .sample(0, 0);
        let mut target = ChannelBuffer::new(Channel::Depth, 8, 8);
        let request = CaptureRequest {
            pose: sample.pose,
            channel: Channel::Color,
            clear: Channel::Color.background(),
        };
        assert!(renderer.capture(&request, &mut target).is_err());
    }
}
