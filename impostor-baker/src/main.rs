/// Octahedral impostor baker entry point
use clap::{Parser, Subcommand, ValueEnum};
use impostor_baker::baker::ImpostorBaker;
use impostor_baker::manifest::ImpostorManifest;
use impostor_baker::mesh::TargetMesh;
use impostor_baker::persistence::FilePersistence;
use impostor_baker::proxy::ProxyShape;
use impostor_baker::sample_grid::Projection;
use impostor_baker::settings::{BakeSettings, LayoutKind, TrueImpostorSettings};
use impostor_baker::software_renderer::SoftwareRenderer;
use impostor_baker::true_impostor::TrueImpostorBaker;
use glam::Vec3;
use log::info;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "impostor-baker", about = "Bake meshes into octahedral impostors")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Bake a JSON mesh into colour, normal and depth atlases
    Bake {
        /// Input mesh (.json with positions, indices and optional colors/transform)
        mesh: Option<PathBuf>,
        /// Bake an axis-aligned box with these half-extents instead of a mesh file
        #[arg(long = "box", num_args = 3, value_names = ["X", "Y", "Z"], conflicts_with = "mesh")]
        box_extents: Option<Vec<f32>>,
        /// Output directory
        #[arg(long, short, default_value = "impostors")]
        output: PathBuf,
        /// Settings file; flags below override its values
        #[arg(long, short)]
        config: Option<PathBuf>,
        #[command(flatten)]
        overrides: SettingsOverrides,
        /// Force the decode/re-encode copy path
        #[arg(long)]
        readback: bool,
        /// Hide the progress bar
        #[arg(long)]
        quiet: bool,
    },
    /// Bake a single orthographic view with a front/back depth range for ray marching
    TrueImpostor {
        /// Input mesh (.json with positions, indices and optional colors/transform)
        mesh: Option<PathBuf>,
        /// Bake an axis-aligned box with these half-extents instead of a mesh file
        #[arg(long = "box", num_args = 3, value_names = ["X", "Y", "Z"], conflicts_with = "mesh")]
        box_extents: Option<Vec<f32>>,
        /// Output directory
        #[arg(long, short, default_value = "impostors")]
        output: PathBuf,
        /// Settings file; flags below override its values
        #[arg(long, short)]
        config: Option<PathBuf>,
        /// Capture resolution in pixels
        #[arg(long)]
        resolution: Option<u32>,
        /// Runtime ray march steps (8-96)
        #[arg(long)]
        raymarch_steps: Option<u32>,
        /// Runtime binary search steps (0-8)
        #[arg(long)]
        binary_steps: Option<u32>,
        /// Output file stem
        #[arg(long)]
        name: Option<String>,
    },
    /// Print the runtime footprint of a baked impostor for a camera position
    Fit {
        /// Manifest written by `bake`
        manifest: PathBuf,
        /// Camera position (X Y Z)
        #[arg(
            long,
            required = true,
            num_args = 3,
            value_names = ["X", "Y", "Z"],
            allow_hyphen_values = true
        )]
        camera: Vec<f32>,
    },
}

#[derive(clap::Args)]
struct SettingsOverrides {
    /// Views per atlas axis
    #[arg(long)]
    tiles: Option<u32>,
    /// Pixels per tile
    #[arg(long)]
    resolution: Option<u32>,
    /// Gutter pixels between atlas tiles
    #[arg(long)]
    padding: Option<u32>,
    #[arg(long, value_enum)]
    layout: Option<LayoutArg>,
    /// Perspective field of view in degrees
    #[arg(long, conflicts_with = "orthographic")]
    fov: Option<f32>,
    #[arg(long)]
    orthographic: bool,
    /// Orthographic camera distance in bounding radii
    #[arg(long)]
    distance_multiplier: Option<f32>,
    #[arg(long, value_enum)]
    proxy: Option<ProxyArg>,
    /// Icosphere subdivision level (0-3)
    #[arg(long, default_value_t = 1)]
    subdivisions: u32,
    /// Output file stem
    #[arg(long)]
    name: Option<String>,
}

#[derive(Clone, Copy, ValueEnum)]
enum LayoutArg {
    Atlas,
    Array,
}

#[derive(Clone, Copy, ValueEnum)]
enum ProxyArg {
    Quad,
    Octahedron,
    Icosphere,
}

impl SettingsOverrides {
    fn apply(&self, settings: &mut BakeSettings) {
        if let Some(tiles) = self.tiles {
            settings.tile_count = tiles;
        }
        if let Some(resolution) = self.resolution {
            settings.tile_resolution = resolution;
        }
        if let Some(padding) = self.padding {
            settings.padding = padding;
        }
        if let Some(layout) = self.layout {
            settings.layout = match layout {
                LayoutArg::Atlas => LayoutKind::Atlas,
                LayoutArg::Array => LayoutKind::Array,
            };
        }
        if self.orthographic {
            settings.projection = Projection::Orthographic;
        } else if let Some(fov_degrees) = self.fov {
            settings.projection = Projection::Perspective { fov_degrees };
        }
        if let Some(multiplier) = self.distance_multiplier {
            settings.distance_multiplier = multiplier;
        }
        if let Some(proxy) = self.proxy {
            settings.proxy = match proxy {
                ProxyArg::Quad => ProxyShape::Quad,
                ProxyArg::Octahedron => ProxyShape::Octahedron,
                ProxyArg::Icosphere => ProxyShape::Icosphere {
                    subdivisions: self.subdivisions,
                },
            };
        }
        if let Some(name) = &self.name {
            settings.name = Some(name.clone());
        }
    }
}

fn load_target(
    mesh: Option<PathBuf>,
    box_extents: Option<Vec<f32>>,
) -> Result<TargetMesh, Box<dyn std::error::Error>> {
    let target = match (mesh, box_extents) {
        (Some(path), _) => TargetMesh::load_json(&path)?,
        (None, Some(e)) => TargetMesh::cuboid("Box", Vec3::new(e[0], e[1], e[2])),
        (None, None) => return Err("either a mesh file or --box is required".into()),
    };
    info!(
        "Loaded '{}': {} vertices, {} triangles",
        target.name,
        target.positions.len(),
        target.indices.len() / 3
    );
    Ok(target)
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    match Cli::parse().command {
        Command::Bake {
            mesh,
            box_extents,
            output,
            config,
            overrides,
            readback,
            quiet,
        } => {
            let mut settings = match &config {
                Some(path) => BakeSettings::load_json(path)?,
                None => BakeSettings::default(),
            };
            overrides.apply(&mut settings);

            let target = load_target(mesh, box_extents)?;
            let baker = ImpostorBaker::new(settings)?.with_progress(!quiet);
            let mut renderer = SoftwareRenderer::new(&target);
            if readback {
                renderer = renderer.with_readback_copy();
            }
            let mut persistence = FilePersistence::new(&output)?;
            baker.bake(&target, &mut renderer, &mut persistence)?;
        }
        Command::TrueImpostor {
            mesh,
            box_extents,
            output,
            config,
            resolution,
            raymarch_steps,
            binary_steps,
            name,
        } => {
            let mut settings = match &config {
                Some(path) => TrueImpostorSettings::load_json(path)?,
                None => TrueImpostorSettings::default(),
            };
            if let Some(resolution) = resolution {
                settings.resolution = resolution;
            }
            if let Some(steps) = raymarch_steps {
                settings.raymarch_steps = steps;
            }
            if let Some(steps) = binary_steps {
                settings.binary_search_steps = steps;
            }
            if name.is_some() {
                settings.name = name;
            }

            let target = load_target(mesh, box_extents)?;
            let baker = TrueImpostorBaker::new(settings)?;
            let mut renderer = SoftwareRenderer::new(&target);
            let mut persistence = FilePersistence::new(&output)?;
            baker.bake(&target, &mut renderer, &mut persistence)?;
        }
        Command::Fit { manifest, camera } => {
            let manifest = ImpostorManifest::load_json(&manifest)?;
            let camera = Vec3::new(camera[0], camera[1], camera[2]);
            let target = manifest.target_transform.to_affine();

            let fit = manifest.fit(camera, &target);
            let (tx, ty) = manifest.view_tile(camera, &target);
            let region = manifest.tile_region(tx, ty);
            info!("View direction: {:?}", fit.view_dir);
            info!(
                "Half extents: {:.4} x {:.4} (padded {:.4} x {:.4})",
                fit.half_u, fit.half_v, fit.padded_half_u, fit.padded_half_v
            );
            info!("Proxy scale: {:?}", fit.scale);
            for (name, value) in fit.bindings() {
                info!("  {} = {:.4}", name, value);
            }
            info!(
                "Tile ({}, {}) layer {} uv {:?}..{:?}",
                tx, ty, region.layer, region.uv_min, region.uv_max
            );
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_fit_needs_a_camera() {
        assert!(Cli::try_parse_from(["impostor-baker", "fit", "crate.json"]).is_err());

        let cli = Cli::try_parse_from([
            "impostor-baker",
            "fit",
            "crate.json",
            "--camera",
            "-3",
            "1.5",
            "-2",
        ])
        .unwrap();
        match cli.command {
            Command::Fit { camera, .. } => assert_eq!(camera, vec![-3.0, 1.5, -2.0]),
            _ => panic!("expected fit"),
        }
    }

    #[test]
    fn test_true_impostor_flags() {
        let cli = Cli::try_parse_from([
            "impostor-baker",
            "true-impostor",
            "--box",
            "1",
            "2",
            "1",
            "--raymarch-steps",
            "48",
        ])
        .unwrap();
        match cli.command {
            Command::TrueImpostor {
                box_extents,
                raymarch_steps,
                binary_steps,
                ..
            } => {
                assert_eq!(box_extents, Some(vec![1.0, 2.0, 1.0]));
                assert_eq!(raymarch_steps, Some(48));
                assert_eq!(binary_steps, None);
            }
            _ => panic!("expected true-impostor"),
        }
    }
}
