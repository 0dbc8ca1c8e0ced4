/// Material parameter names shared between the baker and runtime shaders.
/// The values bound under these names are the bake/runtime contract.

pub const COLOR_TEXTURE: &str = "_ImpostorColor";
pub const NORMAL_TEXTURE: &str = "_ImpostorNormal";
pub const DEPTH_TEXTURE: &str = "_ImpostorDepth";

pub const TILE_COUNT: &str = "_Tiles";
pub const TILE_RESOLUTION: &str = "_TileRes";
pub const TILE_PADDING: &str = "_TilePad";
pub const LAYER_COUNT: &str = "_Layers";
pub const NEAR_PLANE: &str = "_Near";
pub const FAR_PLANE: &str = "_Far";
pub const RADIUS: &str = "_Radius";
pub const DEPTH_BACKGROUND: &str = "_DepthBG";

/// Per-frame footprint parameters written by the runtime fit.
pub const HALF_U: &str = "_HalfU";
pub const HALF_V: &str = "_HalfV";

/// True impostor textures and ray march controls.
pub const ALBEDO_TEXTURE: &str = "_AlbedoTex";
pub const RELIEF_NORMAL_TEXTURE: &str = "_NormalTex";
pub const DEPTH_RANGE_TEXTURE: &str = "_DepthRG";
pub const RAYMARCH_STEPS: &str = "_RaymarchSteps";
pub const BINARY_SEARCH_STEPS: &str = "_BinarySteps";
