//! Octahedral impostor baking: a target mesh is captured from N x N
//! octahedrally mapped directions into colour, normal and depth atlases,
//! paired with a proxy mesh and the parameters a runtime material needs.

pub mod atlas;
pub mod baker;
pub mod bounds;
pub mod capture;
pub mod dds_writer;
pub mod error;
pub mod manifest;
pub mod mesh;
pub mod octahedral;
pub mod persistence;
pub mod proxy;
pub mod runtime_fit;
pub mod sample_grid;
pub mod settings;
pub mod software_renderer;
pub mod true_impostor;

pub use baker::{BakeOutput, ImpostorBaker};
pub use error::BakeError;
pub use settings::BakeSettings;
