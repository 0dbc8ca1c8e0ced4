/// Stand-in proxy meshes drawn with the baked impostor material
use crate::error::BakeError;
use crate::octahedral;
use constants::render_settings::MAX_ICOSPHERE_SUBDIVISIONS;
use glam::Vec3;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Proxy shape selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ProxyShape {
    /// Camera-facing quad, 2 triangles.
    Quad,
    /// Unit octahedron, 8 triangles.
    Octahedron,
    /// Icosphere with `20 * 4^subdivisions` triangles.
    Icosphere { subdivisions: u32 },
}

impl ProxyShape {
    pub fn validate(&self) -> Result<(), BakeError> {
        match *self {
            ProxyShape::Icosphere { subdivisions } if subdivisions > MAX_ICOSPHERE_SUBDIVISIONS => {
                Err(BakeError::InvalidSettings(format!(
                    "icosphere subdivisions must be at most {}, got {}",
                    MAX_ICOSPHERE_SUBDIVISIONS, subdivisions
                )))
            }
            _ => Ok(()),
        }
    }

    pub fn triangle_count(&self) -> usize {
        match *self {
            ProxyShape::Quad => 2,
            ProxyShape::Octahedron => 8,
            ProxyShape::Icosphere { subdivisions } => 20 * 4usize.pow(subdivisions),
        }
    }
}

/// Indexed triangle mesh centred at the origin.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProxyMesh {
    pub shape: ProxyShape,
    pub radius: f32,
    pub positions: Vec<[f32; 3]>,
    pub normals: Vec<[f32; 3]>,
    pub uvs: Vec<[f32; 2]>,
    pub indices: Vec<u32>,
}

impl ProxyMesh {
    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    pub fn triangles(&self) -> impl Iterator<Item = [u32; 3]> + '_ {
        self.indices.chunks_exact(3).map(|t| [t[0], t[1], t[2]])
    }
}

/// Builds the proxy mesh for `shape` sized by `radius`.
pub fn build(shape: ProxyShape, radius: f32) -> Result<ProxyMesh, BakeError> {
    shape.validate()?;
    let radius = radius.max(0.001);

    let (positions, indices) = match shape {
        ProxyShape::Quad => build_quad(radius),
        ProxyShape::Octahedron => build_octahedron(radius),
        ProxyShape::Icosphere { subdivisions } => build_icosphere(radius, subdivisions),
    };

    // Quads face +Z; closed shapes use radial normals and octahedral UVs.
    let (normals, uvs) = match shape {
        ProxyShape::Quad => (
            vec![[0.0, 0.0, 1.0]; 4],
            vec![[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 1.0]],
        ),
        _ => positions
            .iter()
            .map(|p| {
                let n = Vec3::from(*p).normalize();
                (n.to_array(), octahedral::encode_unit(n).to_array())
            })
            .unzip(),
    };

    Ok(ProxyMesh {
        shape,
        radius,
        positions,
        normals,
        uvs,
        indices,
    })
}

fn build_quad(s: f32) -> (Vec<[f32; 3]>, Vec<u32>) {
    (
        vec![[-s, -s, 0.0], [s, -s, 0.0], [s, s, 0.0], [-s, s, 0.0]],
        vec![0, 1, 2, 0, 2, 3],
    )
}

fn build_octahedron(r: f32) -> (Vec<[f32; 3]>, Vec<u32>) {
    let positions = vec![
        [r, 0.0, 0.0],
        [-r, 0.0, 0.0],
        [0.0, r, 0.0],
        [0.0, -r, 0.0],
        [0.0, 0.0, r],
        [0.0, 0.0, -r],
    ];
    let indices = vec![
        2, 4, 0, 2, 1, 4, 2, 5, 1, 2, 0, 5, // top half
        3, 0, 4, 3, 4, 1, 3, 1, 5, 3, 5, 0, // bottom half
    ];
    (positions, indices)
}

const ICOSAHEDRON_FACES: [[u32; 3]; 20] = [
    [0, 11, 5],
    [0, 5, 1],
    [0, 1, 7],
    [0, 7, 10],
    [0, 10, 11],
    [1, 5, 9],
    [5, 11, 4],
    [11, 10, 2],
    [10, 7, 6],
    [7, 1, 8],
    [3, 9, 4],
    [3, 4, 2],
    [3, 2, 6],
    [3, 6, 8],
    [3, 8, 9],
    [4, 9, 5],
    [2, 4, 11],
    [6, 2, 10],
    [8, 6, 7],
    [9, 8, 1],
];

/// Golden-ratio icosahedron, subdivided with shared edge midpoints.
fn build_icosphere(radius: f32, subdivisions: u32) -> (Vec<[f32; 3]>, Vec<u32>) {
    let t = (1.0 + 5.0f32.sqrt()) / 2.0;
    let seed = [
        Vec3::new(-1.0, t, 0.0),
        Vec3::new(1.0, t, 0.0),
        Vec3::new(-1.0, -t, 0.0),
        Vec3::new(1.0, -t, 0.0),
        Vec3::new(0.0, -1.0, t),
        Vec3::new(0.0, 1.0, t),
        Vec3::new(0.0, -1.0, -t),
        Vec3::new(0.0, 1.0, -t),
        Vec3::new(t, 0.0, -1.0),
        Vec3::new(t, 0.0, 1.0),
        Vec3::new(-t, 0.0, -1.0),
        Vec3::new(-t, 0.0, 1.0),
    ];

    let mut vertices: Vec<Vec3> = seed.iter().map(|p| p.normalize() * radius).collect();
    let mut triangles: Vec<[u32; 3]> = ICOSAHEDRON_FACES.to_vec();
    let mut midpoints: HashMap<(u32, u32), u32> = HashMap::new();

    for _ in 0..subdivisions {
        let mut next = Vec::with_capacity(triangles.len() * 4);
        for [a, b, c] in triangles {
            let ab = midpoint(&mut vertices, &mut midpoints, a, b, radius);
            let bc = midpoint(&mut vertices, &mut midpoints, b, c, radius);
            let ca = midpoint(&mut vertices, &mut midpoints, c, a, radius);
            next.extend([[a, ab, ca], [b, bc, ab], [c, ca, bc], [ab, bc, ca]]);
        }
        triangles = next;
    }

    (
        vertices.iter().map(|v| v.to_array()).collect(),
        triangles.into_iter().flatten().collect(),
    )
}

/// Shared midpoint of edge (a, b), pushed onto the sphere.
fn midpoint(
    vertices: &mut Vec<Vec3>,
    midpoints: &mut HashMap<(u32, u32), u32>,
    a: u32,
    b: u32,
    radius: f32,
) -> u32 {
    let key = (a.min(b), a.max(b));
    if let Some(&index) = midpoints.get(&key) {
        return index;
    }

    let mid = ((vertices[a as usize] + vertices[b as usize]) * 0.5).normalize() * radius;
    let index = vertices.len() as u32;
    vertices.push(mid);
    midpoints.insert(key, index);
    index
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn edge_counts(mesh: &ProxyMesh) -> HashMap<(u32, u32), usize> {
        let mut counts = HashMap::new();
        for [a, b, c] in mesh.triangles() {
            for (u, v) in [(a, b), (b, c), (c, a)] {
                *counts.entry((u.min(v), u.max(v))).or_insert(0) += 1;
            }
        }
        counts
    }

    #[test]
    fn test_icosphere_counts_and_closure() {
        for s in 0..=3 {
            let mesh = build(ProxyShape::Icosphere { subdivisions: s }, 2.5).unwrap();
            assert_eq!(mesh.triangle_count(), 20 * 4usize.pow(s));
            assert_eq!(mesh.triangle_count(), mesh.shape.triangle_count());

            // Euler characteristic of a sphere: V - E + F = 2.
            let edges = edge_counts(&mesh);
            assert!(edges.values().all(|&c| c == 2));
            let v = mesh.positions.len() as i64;
            let e = edges.len() as i64;
            let f = mesh.triangle_count() as i64;
            assert_eq!(v - e + f, 2);

            for p in &mesh.positions {
                assert_relative_eq!(Vec3::from(*p).length(), 2.5, epsilon = 1e-4);
            }
        }
    }

    #[test]
    fn test_icosphere_is_deterministic() {
        let a = build(ProxyShape::Icosphere { subdivisions: 2 }, 1.0).unwrap();
        let b = build(ProxyShape::Icosphere { subdivisions: 2 }, 1.0).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_icosphere_faces_point_outward() {
        let mesh = build(ProxyShape::Icosphere { subdivisions: 1 }, 1.0).unwrap();
        for [a, b, c] in mesh.triangles() {
            let pa = Vec3::from(mesh.positions[a as usize]);
            let pb = Vec3::from(mesh.positions[b as usize]);
            let pc = Vec3::from(mesh.positions[c as usize]);
            let normal = (pb - pa).cross(pc - pa);
            assert!(normal.dot(pa + pb + pc) > 0.0);
        }
    }

    #[test]
    fn test_octahedron_is_closed() {
        let mesh = build(ProxyShape::Octahedron, 1.5).unwrap();
        assert_eq!(mesh.triangle_count(), 8);
        assert_eq!(mesh.positions.len(), 6);
        assert!(edge_counts(&mesh).values().all(|&c| c == 2));
        for p in &mesh.positions {
            assert_relative_eq!(Vec3::from(*p).length(), 1.5);
        }
    }

    #[test]
    fn test_quad_covers_extent() {
        let mesh = build(ProxyShape::Quad, 0.5).unwrap();
        assert_eq!(mesh.triangle_count(), 2);
        assert_eq!(mesh.positions[0], [-0.5, -0.5, 0.0]);
        assert_eq!(mesh.positions[2], [0.5, 0.5, 0.0]);
        assert_eq!(mesh.uvs.len(), 4);
        assert!(mesh.normals.iter().all(|n| *n == [0.0, 0.0, 1.0]));
    }

    #[test]
    fn test_subdivision_limit() {
        let err = build(ProxyShape::Icosphere { subdivisions: 4 }, 1.0).unwrap_err();
        assert!(err.is_configuration());
    }
}
