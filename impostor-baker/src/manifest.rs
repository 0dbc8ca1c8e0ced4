/// Baked impostor bundle: texture handles, material parameters and proxy placement.
use crate::atlas::{AtlasLayout, AtlasRegion};
use crate::error::BakeError;
use crate::mesh::MeshTransform;
use crate::persistence::AssetHandle;
use crate::proxy::ProxyShape;
use crate::runtime_fit::{self, RuntimeFootprint};
use crate::sample_grid::{Projection, SampleGrid};
use constants::material;
use constants::texture::DEPTH_BACKGROUND_CUTOFF;
use glam::{Affine3A, Vec3};
use log::info;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Parameter set the impostor material is bound with.
/// Tile fields are copied from the packing layout, never entered separately.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MaterialParameters {
    pub layout: AtlasLayout,
    pub tile_count: u32,
    pub tile_resolution: u32,
    pub padding: u32,
    pub layer_count: u32,
    pub texture_size: u32,
    pub projection: Projection,
    pub near: f32,
    pub far: f32,
    pub radius: f32,
    pub distance: f32,
    /// Depth values at or above this read as empty.
    pub depth_background: f32,
}

impl MaterialParameters {
    pub fn new(layout: AtlasLayout, grid: &SampleGrid, projection: Projection) -> Self {
        let (near, far) = grid.clip_planes();
        Self {
            layout,
            tile_count: layout.tile_count(),
            tile_resolution: layout.tile_resolution(),
            padding: layout.padding(),
            layer_count: layout.layer_count(),
            texture_size: layout.texture_size(),
            projection,
            near,
            far,
            radius: grid.radius(),
            distance: grid.camera_distance(),
            depth_background: DEPTH_BACKGROUND_CUTOFF,
        }
    }

    /// Scalar bindings keyed by shader parameter name.
    pub fn bindings(&self) -> Vec<(&'static str, f32)> {
        vec![
            (material::TILE_COUNT, self.tile_count as f32),
            (material::TILE_RESOLUTION, self.tile_resolution as f32),
            (material::TILE_PADDING, self.padding as f32),
            (material::LAYER_COUNT, self.layer_count as f32),
            (material::NEAR_PLANE, self.near),
            (material::FAR_PLANE, self.far),
            (material::RADIUS, self.radius),
            (material::DEPTH_BACKGROUND, self.depth_background),
        ]
    }

    /// True when the declared tile fields agree with `layout`.
    pub fn matches_layout(&self, layout: &AtlasLayout) -> bool {
        self.layout == *layout
            && self.tile_count == layout.tile_count()
            && self.tile_resolution == layout.tile_resolution()
            && self.padding == layout.padding()
            && self.layer_count == layout.layer_count()
            && self.texture_size == layout.texture_size()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextureHandles {
    pub color: AssetHandle,
    pub normal: AssetHandle,
    pub depth: AssetHandle,
}

impl TextureHandles {
    /// Texture bindings keyed by shader parameter name.
    pub fn bindings(&self) -> [(&'static str, &AssetHandle); 3] {
        [
            (material::COLOR_TEXTURE, &self.color),
            (material::NORMAL_TEXTURE, &self.normal),
            (material::DEPTH_TEXTURE, &self.depth),
        ]
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProxyInfo {
    pub shape: ProxyShape,
    pub mesh: AssetHandle,
    pub radius: f32,
    pub triangle_count: usize,
    /// Placement of the proxy at bake time.
    pub transform: MeshTransform,
}

/// Everything a renderer needs to draw the baked impostor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImpostorManifest {
    pub name: String,
    pub textures: TextureHandles,
    pub material: MaterialParameters,
    pub proxy: ProxyInfo,
    /// Target bounds centre (world) and half-size (object space) at bake time.
    pub center: Vec3,
    pub extents_os: Vec3,
    pub target_transform: MeshTransform,
    pub fit_padding: f32,
    pub sample_count: u32,
}

impl ImpostorManifest {
    pub fn load_json(path: &Path) -> Result<Self, BakeError> {
        let text = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }

    pub fn layout(&self) -> &AtlasLayout {
        &self.material.layout
    }

    pub fn tile_region(&self, tx: u32, ty: u32) -> AtlasRegion {
        AtlasRegion::from_tile_position(self.layout(), tx, ty)
    }

    /// Footprint of the impostor for the current camera, using the stored
    /// object-space extents and the target's current world transform.
    pub fn fit(&self, camera_position: Vec3, target: &Affine3A) -> RuntimeFootprint {
        runtime_fit::fit_proxy(
            camera_position,
            target.transform_point3(self.local_center()),
            target,
            self.extents_os,
            self.fit_padding,
        )
    }

    /// Tile (or array layer position) sampled from `camera_position`, with
    /// the target at its current object-to-world transform.
    pub fn view_tile(&self, camera_position: Vec3, target: &Affine3A) -> (u32, u32) {
        let (_, rotation, _) = target.to_scale_rotation_translation();
        runtime_fit::view_tile(
            camera_position,
            target.transform_point3(self.local_center()),
            rotation,
            self.material.tile_count,
        )
    }

    /// Bounds centre in the target's object space.
    fn local_center(&self) -> Vec3 {
        self.target_transform
            .to_affine()
            .inverse()
            .transform_point3(self.center)
    }

    /// Logs a short summary of the bundle.
    pub fn log_summary(&self) {
        info!("Impostor '{}':", self.name);
        match self.material.layout {
            AtlasLayout::Atlas { .. } => info!(
                "  Atlas: {}x{} tiles of {}px, padding {}, {}x{} texture",
                self.material.tile_count,
                self.material.tile_count,
                self.material.tile_resolution,
                self.material.padding,
                self.material.texture_size,
                self.material.texture_size
            ),
            AtlasLayout::Array { .. } => info!(
                "  Array: {} layers of {}x{}",
                self.material.layer_count, self.material.texture_size, self.material.texture_size
            ),
        }
        info!(
            "  Camera: distance {:.3}, clip [{:.3}, {:.3}], radius {:.3}",
            self.material.distance, self.material.near, self.material.far, self.material.radius
        );
        info!(
            "  Proxy: {:?}, {} triangles",
            self.proxy.shape, self.proxy.triangle_count
        );
        for (parameter, handle) in self.textures.bindings() {
            info!("  {} -> {}", parameter, handle);
        }
    }
}
