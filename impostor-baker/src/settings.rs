/// Bake configuration with defaults, JSON loading and validation
use crate::atlas::AtlasLayout;
use crate::error::BakeError;
use crate::proxy::ProxyShape;
use crate::sample_grid::Projection;
use constants::render_settings::{
    DEFAULT_BAKE_FOV_DEGREES, DEFAULT_BINARY_SEARCH_STEPS, DEFAULT_DISTANCE_MULTIPLIER,
    DEFAULT_FIT_PADDING, DEFAULT_RAYMARCH_STEPS, DEFAULT_TILE_COUNT, DEFAULT_TILE_PADDING,
    DEFAULT_TILE_RESOLUTION, DEFAULT_TRUE_IMPOSTOR_RESOLUTION, MAX_BAKE_FOV_DEGREES,
    MAX_BINARY_SEARCH_STEPS, MAX_FIT_PADDING, MAX_RAYMARCH_STEPS, MAX_TILE_COUNT,
    MIN_BAKE_FOV_DEGREES, MIN_DISTANCE_MULTIPLIER, MIN_RAYMARCH_STEPS,
};
use constants::texture::{MAX_TILE_PADDING, MAX_TILE_RESOLUTION, MIN_TILE_RESOLUTION};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Packing kind; sizes come from the surrounding settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LayoutKind {
    Atlas,
    Array,
}

/// Everything a bake needs besides the target and its collaborators.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BakeSettings {
    /// Views per atlas axis; the bake captures `tile_count²` views.
    pub tile_count: u32,
    pub tile_resolution: u32,
    /// Gutter pixels around each atlas tile. Ignored by the array layout.
    pub padding: u32,
    pub layout: LayoutKind,
    pub projection: Projection,
    /// Orthographic camera distance in bounding radii.
    pub distance_multiplier: f32,
    pub proxy: ProxyShape,
    /// Uniform padding applied to the runtime footprint.
    pub fit_padding: f32,
    /// Output name for persisted textures, mesh and manifest.
    pub name: Option<String>,
}

impl Default for BakeSettings {
    fn default() -> Self {
        Self {
            tile_count: DEFAULT_TILE_COUNT,
            tile_resolution: DEFAULT_TILE_RESOLUTION,
            padding: DEFAULT_TILE_PADDING,
            layout: LayoutKind::Atlas,
            projection: Projection::Perspective {
                fov_degrees: DEFAULT_BAKE_FOV_DEGREES,
            },
            distance_multiplier: DEFAULT_DISTANCE_MULTIPLIER,
            proxy: ProxyShape::Octahedron,
            fit_padding: DEFAULT_FIT_PADDING,
            name: None,
        }
    }
}

impl BakeSettings {
    pub fn load_json(path: &Path) -> Result<Self, BakeError> {
        let text = fs::read_to_string(path)?;
        let settings: BakeSettings = serde_json::from_str(&text)?;
        Ok(settings)
    }

    /// Packing layout derived from these settings.
    pub fn atlas_layout(&self) -> AtlasLayout {
        match self.layout {
            LayoutKind::Atlas => AtlasLayout::Atlas {
                tile_count: self.tile_count,
                tile_resolution: self.tile_resolution,
                padding: self.padding,
            },
            LayoutKind::Array => AtlasLayout::Array {
                tile_count: self.tile_count,
                tile_resolution: self.tile_resolution,
            },
        }
    }

    /// Checks every range before any capture is issued.
    pub fn validate(&self) -> Result<(), BakeError> {
        if !(2..=MAX_TILE_COUNT).contains(&self.tile_count) {
            return Err(invalid(format!(
                "tile count must be in [2, {}], got {}",
                MAX_TILE_COUNT, self.tile_count
            )));
        }
        if !(MIN_TILE_RESOLUTION..=MAX_TILE_RESOLUTION).contains(&self.tile_resolution) {
            return Err(invalid(format!(
                "tile resolution must be in [{}, {}], got {}",
                MIN_TILE_RESOLUTION, MAX_TILE_RESOLUTION, self.tile_resolution
            )));
        }
        if self.padding > MAX_TILE_PADDING {
            return Err(invalid(format!(
                "padding must be at most {}, got {}",
                MAX_TILE_PADDING, self.padding
            )));
        }
        if let Projection::Perspective { fov_degrees } = self.projection {
            if !(MIN_BAKE_FOV_DEGREES..=MAX_BAKE_FOV_DEGREES).contains(&fov_degrees) {
                return Err(invalid(format!(
                    "field of view must be in [{}, {}] degrees, got {}",
                    MIN_BAKE_FOV_DEGREES, MAX_BAKE_FOV_DEGREES, fov_degrees
                )));
            }
        }
        if !(self.distance_multiplier >= MIN_DISTANCE_MULTIPLIER) {
            return Err(invalid(format!(
                "distance multiplier must be at least {}, got {}",
                MIN_DISTANCE_MULTIPLIER, self.distance_multiplier
            )));
        }
        validate_fit_padding(self.fit_padding)?;
        validate_name(self.name.as_deref())?;

        self.proxy.validate()?;
        self.atlas_layout().validate()
    }
}

/// Single-view true impostor configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrueImpostorSettings {
    /// Width and height of the single captured view.
    pub resolution: u32,
    /// Runtime ray march steps through the depth range.
    pub raymarch_steps: u32,
    /// Binary refinement steps after the march finds a hit.
    pub binary_search_steps: u32,
    pub fit_padding: f32,
    pub name: Option<String>,
}

impl Default for TrueImpostorSettings {
    fn default() -> Self {
        Self {
            resolution: DEFAULT_TRUE_IMPOSTOR_RESOLUTION,
            raymarch_steps: DEFAULT_RAYMARCH_STEPS,
            binary_search_steps: DEFAULT_BINARY_SEARCH_STEPS,
            fit_padding: DEFAULT_FIT_PADDING,
            name: None,
        }
    }
}

impl TrueImpostorSettings {
    pub fn load_json(path: &Path) -> Result<Self, BakeError> {
        let text = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }

    pub fn validate(&self) -> Result<(), BakeError> {
        if !(MIN_TILE_RESOLUTION..=MAX_TILE_RESOLUTION).contains(&self.resolution) {
            return Err(invalid(format!(
                "resolution must be in [{}, {}], got {}",
                MIN_TILE_RESOLUTION, MAX_TILE_RESOLUTION, self.resolution
            )));
        }
        if !(MIN_RAYMARCH_STEPS..=MAX_RAYMARCH_STEPS).contains(&self.raymarch_steps) {
            return Err(invalid(format!(
                "ray march steps must be in [{}, {}], got {}",
                MIN_RAYMARCH_STEPS, MAX_RAYMARCH_STEPS, self.raymarch_steps
            )));
        }
        if self.binary_search_steps > MAX_BINARY_SEARCH_STEPS {
            return Err(invalid(format!(
                "binary search steps must be at most {}, got {}",
                MAX_BINARY_SEARCH_STEPS, self.binary_search_steps
            )));
        }
        validate_fit_padding(self.fit_padding)?;
        validate_name(self.name.as_deref())
    }
}

fn validate_fit_padding(fit_padding: f32) -> Result<(), BakeError> {
    if !(0.0..=MAX_FIT_PADDING).contains(&fit_padding) {
        return Err(invalid(format!(
            "fit padding must be in [0, {}], got {}",
            MAX_FIT_PADDING, fit_padding
        )));
    }
    Ok(())
}

fn validate_name(name: Option<&str>) -> Result<(), BakeError> {
    match name {
        Some(name) if name.is_empty() || name.contains(['/', '\\']) => Err(invalid(format!(
            "output name '{}' is not a file stem",
            name
        ))),
        _ => Ok(()),
    }
}

fn invalid(message: String) -> BakeError {
    BakeError::InvalidSettings(message)
}
