/// Bake orchestration: sample grid, captures, packing, proxy and persistence.
use crate::atlas::{AtlasLayout, AtlasPacker, CopyPath, PackedTexture};
use crate::bounds::Bounds;
use crate::capture::{Channel, RenderCollaborator, ScratchPool, TileCapture};
use crate::error::BakeError;
use crate::manifest::{ImpostorManifest, MaterialParameters, ProxyInfo, TextureHandles};
use crate::mesh::{MeshTransform, TargetMesh};
use crate::persistence::Persistence;
use crate::proxy::{self, ProxyMesh};
use crate::sample_grid::SampleGrid;
use crate::settings::BakeSettings;
use glam::Vec3;
use indicatif::{ProgressBar, ProgressStyle};
use log::{debug, error, info};
use std::time::Instant;

/// Products of a successful bake, already committed to persistence.
#[derive(Debug, Clone)]
pub struct BakeOutput {
    pub manifest: ImpostorManifest,
    pub textures: [PackedTexture; 3],
    pub proxy: ProxyMesh,
}

impl BakeOutput {
    pub fn texture(&self, channel: Channel) -> &PackedTexture {
        &self.textures[channel.slot()]
    }
}

/// Turns a mesh or file stem into a lowercase output stem.
pub fn output_stem(input: &str) -> String {
    let stem: String = input
        .trim()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_lowercase()
            } else {
                '_'
            }
        })
        .collect();
    let stem = stem.trim_matches('_');
    if stem.is_empty() {
        "impostor".to_string()
    } else {
        stem.to_string()
    }
}

/// Object-space and world-space bounds of a bakeable target.
pub(crate) fn target_bounds(target: &TargetMesh) -> Result<(Bounds, Bounds), BakeError> {
    target.validate()?;
    let local_bounds = target.local_bounds().ok_or_else(|| {
        BakeError::MissingTarget(format!("mesh '{}' has no vertices", target.name))
    })?;
    let bounds = local_bounds.transformed(&target.world_transform());
    if !(bounds.radius() > 0.0) || !bounds.center.is_finite() {
        return Err(BakeError::MissingTarget(format!(
            "mesh '{}' has degenerate bounds (radius {})",
            target.name,
            bounds.radius()
        )));
    }
    Ok((local_bounds, bounds))
}

/// Commits a staged bake, or discards everything it staged on failure.
pub(crate) fn commit_or_discard<T, P: Persistence>(
    persistence: &mut P,
    target_name: &str,
    staged: Result<T, BakeError>,
) -> Result<T, BakeError> {
    let result = staged.and_then(|output| persistence.commit().map(|_| output));
    if let Err(err) = &result {
        error!("Bake of '{}' failed: {}", target_name, err);
        persistence.discard();
    }
    result
}

/// Bakes targets into octahedral impostors with fixed settings.
#[derive(Debug)]
pub struct ImpostorBaker {
    settings: BakeSettings,
    show_progress: bool,
}

impl ImpostorBaker {
    /// Rejects invalid settings before any capture is issued.
    pub fn new(settings: BakeSettings) -> Result<Self, BakeError> {
        settings.validate()?;
        Ok(Self {
            settings,
            show_progress: false,
        })
    }

    /// Draws a progress bar on stderr while capturing.
    pub fn with_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    pub fn settings(&self) -> &BakeSettings {
        &self.settings
    }

    /// Bakes `target` and commits textures, proxy mesh and manifest.
    /// Nothing is committed unless every step succeeds.
    pub fn bake<R, P>(
        &self,
        target: &TargetMesh,
        renderer: &mut R,
        persistence: &mut P,
    ) -> Result<BakeOutput, BakeError>
    where
        R: RenderCollaborator,
        P: Persistence,
    {
        let start = Instant::now();
        let staged = self.bake_staged(target, renderer, persistence);
        let output = commit_or_discard(persistence, &target.name, staged)?;

        info!(
            "Baked '{}' in {:.2}s",
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
    ) -> Result<BakeOutput, BakeError>
    where
        R: RenderCollaborator,
        P: Persistence,
    {
        let (local_bounds, bounds) = target_bounds(target)?;

        let settings = &self.settings;
        let layout = settings.atlas_layout();
        let grid = SampleGrid::new(
            settings.tile_count,
            bounds,
            settings.projection,
            settings.distance_multiplier,
        )
        .with_object_rotation(target.transform.rotation);

        let name = output_stem(settings.name.as_deref().unwrap_or(&target.name));
        info!(
            "Baking '{}': {} views at {}px, radius {:.3}, distance {:.3}",
            name,
            grid.sample_count(),
            layout.tile_resolution(),
            grid.radius(),
            grid.camera_distance()
        );

        let textures = self.capture_tiles(&grid, layout, renderer)?;
        let proxy = proxy::build(settings.proxy, 0.5)?;

        let mut store = |channel: Channel| {
            persistence.store_texture(
                &textures[channel.slot()],
                &format!("{}_{}", name, channel.name()),
            )
        };
        let handles = TextureHandles {
            color: store(Channel::Color)?,
            normal: store(Channel::Normal)?,
            depth: store(Channel::Depth)?,
        };
        let mesh_handle = persistence.store_mesh(&proxy, &format!("{}_proxy", name))?;

        let manifest = ImpostorManifest {
            name: name.clone(),
            textures: handles,
            material: MaterialParameters::new(layout, &grid, settings.projection),
            proxy: ProxyInfo {
                shape: settings.proxy,
                mesh: mesh_handle,
                radius: proxy.radius,
                triangle_count: proxy.triangle_count(),
                transform: MeshTransform {
                    translation: bounds.center,
                    rotation: target.transform.rotation.normalize(),
                    scale: Vec3::splat(2.0 * bounds.radius()),
                },
            },
            center: bounds.center,
            extents_os: local_bounds.extents,
            target_transform: target.transform,
            fit_padding: settings.fit_padding,
            sample_count: grid.sample_count(),
        };
        persistence.store_manifest(&manifest, &name)?;

        Ok(BakeOutput {
            manifest,
            textures,
            proxy,
        })
    }

    /// Captures every channel of every tile and packs them.
    /// Each tile's captures finish before the next pose is used.
    fn capture_tiles<R: RenderCollaborator>(
        &self,
        grid: &SampleGrid,
        layout: AtlasLayout,
        renderer: &mut R,
    ) -> Result<[PackedTexture; 3], BakeError> {
        let copy_path = if renderer.supports_direct_copy() {
            CopyPath::Direct
        } else {
            CopyPath::Readback
        };
        let mut packer = AtlasPacker::new(layout, copy_path)?;
        let mut pool = ScratchPool::new(layout.tile_resolution());
        let mut capture = TileCapture::new(renderer, &mut pool);

        let samples = grid.samples();
        let pb = self.progress_bar(samples.len() as u64);

        for sample in &samples {
            for channel in Channel::ALL {
                let buffer = capture.capture(sample, channel)?;
                packer.write_tile(sample.tx, sample.ty, buffer)?;
            }
            debug!(
                "Tile {} ({}, {}) direction {:?}",
                sample.index, sample.tx, sample.ty, sample.direction
            );
            pb.inc(1);
        }

        pb.finish_with_message("Views captured");
        Ok(packer.into_textures())
    }

    fn progress_bar(&self, len: u64) -> ProgressBar {
        if !self.show_progress {
            return ProgressBar::hidden();
        }

        let pb = ProgressBar::new(len);
        let style = ProgressStyle::default_bar()
            .template("[{bar:40.green/blue}] {pos}/{len} views ({percent}%) {msg}")
            .map(|style| style.progress_chars("█▉▊▋▌▍▎▏"))
            .unwrap_or_else(|_| ProgressStyle::default_bar());
        pb.set_style(style);
        pb.set_message("Capturing views");
        pb
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::{CaptureFailure, CaptureRequest, ChannelBuffer};
    use crate::persistence::MemoryPersistence;
    use crate::software_renderer::SoftwareRenderer;

    fn small_settings() -> BakeSettings {
        BakeSettings {
            tile_count: 2,
            tile_resolution: 16,
            padding: 1,
            ..Default::default()
        }
    }

    struct Broken;

    impl RenderCollaborator for Broken {
        fn capture(
            &mut self,
            _request: &CaptureRequest,
            _target: &mut ChannelBuffer,
        ) -> Result<(), CaptureFailure> {
            Err(CaptureFailure("device lost".into()))
        }
    }

    #[test]
    fn test_output_stem() {
        assert_eq!(output_stem("Oak Tree (LOD0)"), "oak_tree__lod0");
        assert_eq!(output_stem("  "), "impostor");
    }

    #[test]
    fn test_invalid_settings_rejected_up_front() {
        let settings = BakeSettings {
            tile_count: 1,
            ..Default::default()
        };
        assert!(ImpostorBaker::new(settings).unwrap_err().is_configuration());
    }

    #[test]
    fn test_bake_commits_bundle() {
        let mesh = TargetMesh::cuboid("Crate", Vec3::ONE);
        let baker = ImpostorBaker::new(small_settings()).unwrap();
        let mut renderer = SoftwareRenderer::new(&mesh);
        let mut store = MemoryPersistence::new();

        let output = baker.bake(&mesh, &mut renderer, &mut store).unwrap();
        assert_eq!(output.manifest.name, "crate");
        assert_eq!(output.manifest.sample_count, 4);
        assert_eq!(store.committed().len(), 5);
        assert_eq!(store.staged_count(), 0);
        assert_eq!(output.texture(Channel::Color).width, 2 * 16 + 3);
    }

    #[test]
    fn test_capture_failure_commits_nothing() {
        let mesh = TargetMesh::cuboid("Crate", Vec3::ONE);
        let baker = ImpostorBaker::new(small_settings()).unwrap();
        let mut store = MemoryPersistence::new();

        let err = baker.bake(&mesh, &mut Broken, &mut store).unwrap_err();
        assert!(matches!(err, BakeError::CaptureFailed { tile: 0, channel: Channel::Color, .. }));
        assert!(store.committed().is_empty());
        assert_eq!(store.staged_count(), 0);
    }

    #[test]
    fn test_degenerate_target_rejected() {
        let mesh = TargetMesh::new("flat", vec![[1.0, 1.0, 1.0]; 3], vec![0, 1, 2]);
        let baker = ImpostorBaker::new(small_settings()).unwrap();
        let mut renderer = SoftwareRenderer::new(&mesh);
        let mut store = MemoryPersistence::new();

        let err = baker.bake(&mesh, &mut renderer, &mut store).unwrap_err();
        assert!(matches!(err, BakeError::MissingTarget(_)));
    }
}
