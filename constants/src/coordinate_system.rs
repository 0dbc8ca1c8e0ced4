/// World up axis used as the reference for camera and billboard bases
pub const WORLD_UP: [f32; 3] = [0.0, 1.0, 0.0];

/// Fallback reference axis when a view direction is nearly parallel to `WORLD_UP`
pub const WORLD_RIGHT: [f32; 3] = [1.0, 0.0, 0.0];

/// `|dot(view, up)|` above which the basis switches to `WORLD_RIGHT`
pub const UP_SWITCH_THRESHOLD: f32 = 0.99;
