/// Target triangle mesh input and its world placement
use crate::bounds::Bounds;
use crate::error::BakeError;
use glam::{Affine3A, Quat, Vec3};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Object-to-world placement of the target.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MeshTransform {
    pub translation: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
}

impl Default for MeshTransform {
    fn default() -> Self {
        Self {
            translation: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            scale: Vec3::ONE,
        }
    }
}

impl MeshTransform {
    pub fn to_affine(&self) -> Affine3A {
        Affine3A::from_scale_rotation_translation(self.scale, self.rotation.normalize(), self.translation)
    }
}

/// Indexed triangle mesh to bake, positions in object space.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetMesh {
    #[serde(default = "default_name")]
    pub name: String,
    pub positions: Vec<[f32; 3]>,
    pub indices: Vec<u32>,
    /// Optional per-vertex linear RGBA colour; white when absent.
    #[serde(default)]
    pub colors: Option<Vec<[f32; 4]>>,
    #[serde(default)]
    pub transform: MeshTransform,
}

fn default_name() -> String {
    "Object".to_string()
}

impl TargetMesh {
    pub fn new(name: &str, positions: Vec<[f32; 3]>, indices: Vec<u32>) -> Self {
        Self {
            name: name.to_string(),
            positions,
            indices,
            colors: None,
            transform: MeshTransform::default(),
        }
    }

    /// Axis-aligned box with per-axis half-size `extents`, 12 triangles wound outward.
    pub fn cuboid(name: &str, extents: Vec3) -> Self {
        let e = extents.abs();
        let positions = (0..8)
            .map(|i| {
                [
                    if i & 1 == 0 { -e.x } else { e.x },
                    if i & 2 == 0 { -e.y } else { e.y },
                    if i & 4 == 0 { -e.z } else { e.z },
                ]
            })
            .collect();
        let indices = vec![
            0, 2, 3, 0, 3, 1, // -z
            4, 5, 7, 4, 7, 6, // +z
            0, 4, 6, 0, 6, 2, // -x
            1, 3, 7, 1, 7, 5, // +x
            0, 1, 5, 0, 5, 4, // -y
            2, 6, 7, 2, 7, 3, // +y
        ];
        Self::new(name, positions, indices)
    }

    pub fn with_transform(mut self, transform: MeshTransform) -> Self {
        self.transform = transform;
        self
    }

    pub fn with_colors(mut self, colors: Vec<[f32; 4]>) -> Self {
        self.colors = Some(colors);
        self
    }

    /// Load a mesh from a JSON file.
    pub fn load_json(path: &Path) -> Result<Self, BakeError> {
        let text = fs::read_to_string(path)?;
        let mesh: TargetMesh = serde_json::from_str(&text)?;
        mesh.validate()?;
        Ok(mesh)
    }

    /// Rejects meshes that cannot be baked.
    pub fn validate(&self) -> Result<(), BakeError> {
        if self.indices.is_empty() || self.positions.is_empty() {
            return Err(BakeError::MissingTarget(format!(
                "mesh '{}' has no triangles",
                self.name
            )));
        }
        if self.indices.len() % 3 != 0 {
            return Err(BakeError::MissingTarget(format!(
                "mesh '{}' index count {} is not a multiple of 3",
                self.name,
                self.indices.len()
            )));
        }
        if let Some(&bad) = self
            .indices
            .iter()
            .find(|&&i| i as usize >= self.positions.len())
        {
            return Err(BakeError::MissingTarget(format!(
                "mesh '{}' index {} out of range",
                self.name, bad
            )));
        }
        if let Some(colors) = &self.colors {
            if colors.len() != self.positions.len() {
                return Err(BakeError::MissingTarget(format!(
                    "mesh '{}' has {} colours for {} vertices",
                    self.name,
                    colors.len(),
                    self.positions.len()
                )));
            }
        }
        Ok(())
    }

    pub fn world_transform(&self) -> Affine3A {
        self.transform.to_affine()
    }

    pub fn local_bounds(&self) -> Option<Bounds> {
        let points: Vec<Vec3> = self.positions.iter().map(|&p| Vec3::from(p)).collect();
        Bounds::from_points(&points)
    }

    /// World-space bounds of the transformed local box.
    pub fn world_bounds(&self) -> Option<Bounds> {
        Some(self.local_bounds()?.transformed(&self.world_transform()))
    }

    pub fn color(&self, vertex: usize) -> [f32; 4] {
        self.colors
            .as_ref()
            .and_then(|c| c.get(vertex).copied())
            .unwrap_or([1.0; 4])
    }

    pub fn triangles(&self) -> impl Iterator<Item = [usize; 3]> + '_ {
        self.indices
            .chunks_exact(3)
            .map(|t| [t[0] as usize, t[1] as usize, t[2] as usize])
    }
}
