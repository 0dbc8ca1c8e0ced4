/// Single-view "true impostor" bake: one orthographic capture of colour,
/// normal and the front/back depth range, ray marched at runtime.
use crate::atlas::PackedTexture;
use crate::baker::{commit_or_discard, output_stem, target_bounds};
use crate::bounds::Bounds;
use crate::capture::{Channel, RenderCollaborator, ScratchPool, TileCapture};
use crate::error::BakeError;
use crate::manifest::ProxyInfo;
use crate::mesh::{MeshTransform, TargetMesh};
use crate::persistence::{AssetHandle, Persistence};
use crate::proxy::{self, ProxyMesh, ProxyShape};
use crate::runtime_fit::{self, RuntimeFootprint};
use crate::sample_grid::{look_rotation, CameraPose, Projection, TileSample};
use crate::settings::TrueImpostorSettings;
use constants::material;
use constants::render_settings::{
    TRUE_IMPOSTOR_DISTANCE_EXTENTS, TRUE_IMPOSTOR_FAR_EXTENTS, TRUE_IMPOSTOR_NEAR_PLANE,
};
use glam::{Affine3A, Quat, Vec3};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Instant;

/// Capture direction; the camera sits behind the target and looks along +Z.
const VIEW_DIRECTION: Vec3 = Vec3::Z;

/// Orthographic camera framing the largest world extent of `bounds`.
pub fn capture_pose(bounds: &Bounds) -> CameraPose {
    let extent = bounds.extents.abs().max_element();
    CameraPose {
        position: bounds.center - VIEW_DIRECTION * (TRUE_IMPOSTOR_DISTANCE_EXTENTS * extent),
        rotation: look_rotation(VIEW_DIRECTION),
        projection: Projection::Orthographic,
        near: TRUE_IMPOSTOR_NEAR_PLANE,
        far: TRUE_IMPOSTOR_FAR_EXTENTS * extent,
        ortho_half_size: extent,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrueImpostorTextures {
    pub albedo: AssetHandle,
    pub normal: AssetHandle,
    /// Front depth in R, back depth in G.
    pub depth_range: AssetHandle,
}

impl TrueImpostorTextures {
    pub fn bindings(&self) -> [(&'static str, &AssetHandle); 3] {
        [
            (material::ALBEDO_TEXTURE, &self.albedo),
            (material::RELIEF_NORMAL_TEXTURE, &self.normal),
            (material::DEPTH_RANGE_TEXTURE, &self.depth_range),
        ]
    }
}

/// Everything a renderer needs to ray march a true impostor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrueImpostorManifest {
    pub name: String,
    pub textures: TrueImpostorTextures,
    pub resolution: u32,
    pub near: f32,
    pub far: f32,
    /// Largest world half-extent; the orthographic half-size of the capture.
    pub extent: f32,
    pub raymarch_steps: u32,
    pub binary_search_steps: u32,
    pub proxy: ProxyInfo,
    pub center: Vec3,
    pub extents_os: Vec3,
    pub target_transform: MeshTransform,
    pub fit_padding: f32,
}

impl TrueImpostorManifest {
    pub fn load_json(path: &Path) -> Result<Self, BakeError> {
        let text = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }

    pub fn bindings(&self) -> [(&'static str, f32); 4] {
        [
            (material::NEAR_PLANE, self.near),
            (material::FAR_PLANE, self.far),
            (material::RAYMARCH_STEPS, self.raymarch_steps as f32),
            (material::BINARY_SEARCH_STEPS, self.binary_search_steps as f32),
        ]
    }

    /// Footprint of the target at its current transform.
    pub fn fit(&self, camera_position: Vec3, target: &Affine3A) -> RuntimeFootprint {
        let local_center = self
            .target_transform
            .to_affine()
            .inverse()
            .transform_point3(self.center);
        runtime_fit::fit_proxy(
            camera_position,
            target.transform_point3(local_center),
            target,
            self.extents_os,
            self.fit_padding,
        )
    }

    /// Camera-facing rotation for the quad proxy.
    pub fn billboard(&self, camera_position: Vec3, proxy_position: Vec3) -> Quat {
        runtime_fit::billboard_rotation(proxy_position, camera_position)
    }

    pub fn log_summary(&self) {
        info!("True impostor '{}':", self.name);
        info!(
            "  View: {}x{}, extent {:.3}, clip [{:.3}, {:.3}]",
            self.resolution, self.resolution, self.extent, self.near, self.far
        );
        info!(
            "  Ray march: {} steps, {} binary steps",
            self.raymarch_steps, self.binary_search_steps
        );
        for (parameter, handle) in self.textures.bindings() {
            info!("  {} -> {}", parameter, handle);
        }
    }
}

/// Products of a committed true impostor bake, in `Channel::TRUE_IMPOSTOR` order.
#[derive(Debug, Clone)]
pub struct TrueImpostorOutput {
    pub manifest: TrueImpostorManifest,
    pub textures: [PackedTexture; 3],
    pub proxy: ProxyMesh,
}

impl TrueImpostorOutput {
    pub fn texture(&self, channel: Channel) -> Option<&PackedTexture> {
        self.textures.iter().find(|texture| texture.channel == channel)
    }
}

pub struct TrueImpostorBaker {
    settings: TrueImpostorSettings,
}

impl TrueImpostorBaker {
    pub fn new(settings: TrueImpostorSettings) -> Result<Self, BakeError> {
        settings.validate()?;
        Ok(Self { settings })
    }

    pub fn settings(&self) -> &TrueImpostorSettings {
        &self.settings
    }

    /// Captures the single view and commits textures, quad proxy and manifest.
    /// Nothing is committed unless every step succeeds.
    pub fn bake<R, P>(
        &self,
        target: &TargetMesh,
        renderer: &mut R,
        persistence: &mut P,
    ) -> Result<TrueImpostorOutput, BakeError>
    where
        R: RenderCollaborator,
        P: Persistence,
    {
        let start = Instant::now();
        let staged = self.bake_staged(target, renderer, persistence);
        let output = commit_or_discard(persistence, &target.name, staged)?;

        info!(
            "Baked true impostor '{}' in {:.2}s",
            output.manifest.name,
            start.elapsed().as_secs_f32()
        );
        output.manifest.log_summary();
        Ok(output)
    }

    fn bake_staged<R, P>(
        &self,
        target: &TargetMesh,
        renderer: &mut R,
        persistence: &mut P,
    ) -> Result<TrueImpostorOutput, BakeError>
    where
        R: RenderCollaborator,
        P: Persistence,
    {
        let (local_bounds, bounds) = target_bounds(target)?;
        let settings = &self.settings;
        let pose = capture_pose(&bounds);
        let extent = pose.ortho_half_size;
        let name = output_stem(settings.name.as_deref().unwrap_or(&target.name));
        info!(
            "Baking true impostor '{}': {}px, extent {:.3}",
            name, settings.resolution, extent
        );

        let sample = TileSample {
            tx: 0,
            ty: 0,
            index: 0,
            direction: VIEW_DIRECTION,
            pose,
        };
        let mut pool = ScratchPool::new(settings.resolution);
        let mut capture = TileCapture::new(renderer, &mut pool);
        let mut capture_channel = |channel: Channel| -> Result<PackedTexture, BakeError> {
            let buffer = capture.capture(&sample, channel)?;
            debug!("Captured {} at {}px", channel.name(), buffer.width);
            Ok(PackedTexture {
                channel,
                width: buffer.width,
                height: buffer.height,
                layers: 1,
                data: buffer.data.clone(),
            })
        };
        let textures = [
            capture_channel(Channel::Color)?,
            capture_channel(Channel::Normal)?,
            capture_channel(Channel::DepthRange)?,
        ];

        let proxy = proxy::build(ProxyShape::Quad, 0.5)?;
        let handles = TrueImpostorTextures {
            albedo: persistence.store_texture(&textures[0], &format!("{}_albedo", name))?,
            normal: persistence.store_texture(&textures[1], &format!("{}_normal", name))?,
            depth_range: persistence
                .store_texture(&textures[2], &format!("{}_{}", name, Channel::DepthRange.name()))?,
        };
        let mesh_handle = persistence.store_mesh(&proxy, &format!("{}_proxy", name))?;

        let manifest = TrueImpostorManifest {
            name: name.clone(),
            textures: handles,
            resolution: settings.resolution,
            near: pose.near,
            far: pose.far,
            extent,
            raymarch_steps: settings.raymarch_steps,
            binary_search_steps: settings.binary_search_steps,
            proxy: ProxyInfo {
                shape: ProxyShape::Quad,
                mesh: mesh_handle,
                radius: proxy.radius,
                triangle_count: proxy.triangle_count(),
                transform: MeshTransform {
                    translation: bounds.center,
                    rotation: Quat::IDENTITY,
                    scale: Vec3::splat(2.0 * extent),
                },
            },
            center: bounds.center,
            extents_os: local_bounds.extents,
            target_transform: target.transform,
            fit_padding: settings.fit_padding,
        };
        persistence.store_true_impostor_manifest(&manifest, &name)?;

        Ok(TrueImpostorOutput {
            manifest,
            textures,
            proxy,
        })
    }
}
