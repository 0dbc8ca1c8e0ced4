/// Error taxonomy for impostor baking operations
use crate::capture::Channel;

/// Error types for bake, packing and persistence operations.
#[derive(Debug)]
pub enum BakeError {
    /// Settings rejected before any work begins.
    InvalidSettings(String),
    /// Target mesh has no triangles or no usable bounds.
    MissingTarget(String),
    /// Packed atlas would exceed the largest single texture dimension.
    AtlasTooLarge { size: u32, max: u32 },
    /// Render collaborator could not produce a buffer for a tile.
    CaptureFailed {
        tile: u32,
        channel: Channel,
        reason: String,
    },
    /// Render collaborator returned a buffer that does not match the request.
    BufferMismatch {
        tile: u32,
        channel: Channel,
        expected: (u32, u32),
        actual: (u32, u32),
    },
    /// Persistence collaborator rejected a write or reload.
    Persistence(String),
    IoError(std::io::Error),
    ImageError(image::ImageError),
    DdsError(ddsfile::Error),
    JsonError(serde_json::Error),
}

impl BakeError {
    /// Configuration errors are reported before any capture is issued.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            BakeError::InvalidSettings(_)
                | BakeError::MissingTarget(_)
                | BakeError::AtlasTooLarge { .. }
        )
    }

    /// Resource errors abort a bake that is already running.
    pub fn is_resource(&self) -> bool {
        matches!(
            self,
            BakeError::CaptureFailed { .. } | BakeError::BufferMismatch { .. }
        )
    }

    /// Persistence errors discard whatever the bake staged.
    pub fn is_persistence(&self) -> bool {
        matches!(
            self,
            BakeError::Persistence(_)
                | BakeError::IoError(_)
                | BakeError::ImageError(_)
                | BakeError::DdsError(_)
                | BakeError::JsonError(_)
        )
    }
}

impl From<std::io::Error> for BakeError {
    fn from(err: std::io::Error) -> Self {
        BakeError::IoError(err)
    }
}

impl From<image::ImageError> for BakeError {
    fn from(err: image::ImageError) -> Self {
        BakeError::ImageError(err)
    }
}

impl From<ddsfile::Error> for BakeError {
    fn from(err: ddsfile::Error) -> Self {
        BakeError::DdsError(err)
    }
}

impl From<serde_json::Error> for BakeError {
    fn from(err: serde_json::Error) -> Self {
        BakeError::JsonError(err)
    }
}

impl std::fmt::Display for BakeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BakeError::InvalidSettings(msg) => write!(f, "Invalid bake settings: {}", msg),
            BakeError::MissingTarget(msg) => write!(f, "Missing bake target: {}", msg),
            BakeError::AtlasTooLarge { size, max } => write!(
                f,
                "Atlas size {}x{} exceeds the {}px texture limit, use the array layout",
                size, size, max
            ),
            BakeError::CaptureFailed {
                tile,
                channel,
                reason,
            } => write!(
                f,
                "Capture of {:?} for tile {} failed: {}",
                channel, tile, reason
            ),
            BakeError::BufferMismatch {
                tile,
                channel,
                expected,
                actual,
            } => write!(
                f,
                "Capture of {:?} for tile {} returned {}x{}, expected {}x{}",
                channel, tile, actual.0, actual.1, expected.0, expected.1
            ),
            BakeError::Persistence(msg) => write!(f, "Persistence error: {}", msg),
            BakeError::IoError(e) => write!(f, "IO error: {}", e),
            BakeError::ImageError(e) => write!(f, "Image error: {}", e),
            BakeError::DdsError(e) => write!(f, "DDS error: {}", e),
            BakeError::JsonError(e) => write!(f, "JSON error: {}", e),
        }
    }
}

impl std::error::Error for BakeError {}
