/// Default tile count per atlas axis (N x N views)
pub const DEFAULT_TILE_COUNT: u32 = 8;

/// Largest accepted tile count; 64 x 64 views is already 4096 captures per channel
pub const MAX_TILE_COUNT: u32 = 64;

/// Default per-tile resolution (pixels)
pub const DEFAULT_TILE_RESOLUTION: u32 = 256;

/// Default atlas gutter (pixels)
pub const DEFAULT_TILE_PADDING: u32 = 2;

/// Default perspective bake field of view (degrees)
pub const DEFAULT_BAKE_FOV_DEGREES: f32 = 40.0;

/// Default orthographic bake distance as a multiple of the bounding radius
pub const DEFAULT_DISTANCE_MULTIPLIER: f32 = 2.0;

/// Minimum orthographic distance multiplier; keeps the camera outside the sphere
pub const MIN_DISTANCE_MULTIPLIER: f32 = 1.01;

/// Extra distance applied to a perspective camera so the sphere does not touch the frustum
pub const FOV_FIT_PADDING: f32 = 1.15;

/// Clip planes sit this many radii in front of and behind the target centre
pub const CLIP_RADIUS_MARGIN: f32 = 1.1;

/// Near plane floor, avoids a degenerate projection
pub const NEAR_PLANE_EPSILON: f32 = 0.01;

/// Allowed perspective field of view range (degrees)
pub const MIN_BAKE_FOV_DEGREES: f32 = 5.0;
pub const MAX_BAKE_FOV_DEGREES: f32 = 90.0;

/// Maximum icosphere subdivision level for proxy meshes
pub const MAX_ICOSPHERE_SUBDIVISIONS: u32 = 3;

/// Default uniform padding applied to the runtime footprint
pub const DEFAULT_FIT_PADDING: f32 = 0.02;

/// Maximum runtime footprint padding
pub const MAX_FIT_PADDING: f32 = 0.2;

/// Default single-view true impostor resolution (pixels)
pub const DEFAULT_TRUE_IMPOSTOR_RESOLUTION: u32 = 512;

/// True impostor camera distance from the centre, in bounding extents
pub const TRUE_IMPOSTOR_DISTANCE_EXTENTS: f32 = 2.0;

/// True impostor far plane, in bounding extents
pub const TRUE_IMPOSTOR_FAR_EXTENTS: f32 = 4.0;

/// True impostor near plane
pub const TRUE_IMPOSTOR_NEAR_PLANE: f32 = 0.001;

/// Runtime ray march step count for true impostors
pub const DEFAULT_RAYMARCH_STEPS: u32 = 32;
pub const MIN_RAYMARCH_STEPS: u32 = 8;
pub const MAX_RAYMARCH_STEPS: u32 = 96;

/// Binary refinement steps after the ray march hits
pub const DEFAULT_BINARY_SEARCH_STEPS: u32 = 4;
pub const MAX_BINARY_SEARCH_STEPS: u32 = 8;
