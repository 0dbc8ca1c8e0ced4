pub mod coordinate_system;
pub mod material;
pub mod render_settings;
pub mod texture;
