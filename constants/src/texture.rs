/// Largest single texture dimension accepted for a packed atlas
pub const MAX_TEXTURE_DIMENSION: u32 = 16384;

/// Smallest per-tile resolution accepted by the baker
pub const MIN_TILE_RESOLUTION: u32 = 16;

/// Largest per-tile resolution accepted by the baker
pub const MAX_TILE_RESOLUTION: u32 = 8192;

/// Largest gutter between atlas tiles (pixels)
pub const MAX_TILE_PADDING: u32 = 64;

/// Colour channel clear value: fully transparent black (RGBA)
pub const COLOR_BACKGROUND: [f32; 4] = [0.0, 0.0, 0.0, 0.0];

/// Normal channel clear value: flat "sky" normal, recognisable as no geometry (RGBA)
pub const NORMAL_BACKGROUND: [f32; 4] = [0.5, 0.5, 1.0, 0.0];

/// Depth channel clear value: far plane, nothing hit (R)
pub const DEPTH_BACKGROUND: f32 = 1.0;

/// Depth range clear value: front depth at the far plane, back depth at the near plane.
pub const DEPTH_RANGE_BACKGROUND: [f32; 4] = [1.0, 0.0, 0.0, 0.0];

/// Depth values at or above this are treated as background when sampling
pub const DEPTH_BACKGROUND_CUTOFF: f32 = 0.9995;
