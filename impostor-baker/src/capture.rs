/// Per-tile channel capture through the render collaborator
use crate::error::BakeError;
use crate::sample_grid::{CameraPose, TileSample};
use constants::texture::{
    COLOR_BACKGROUND, DEPTH_BACKGROUND, DEPTH_RANGE_BACKGROUND, NORMAL_BACKGROUND,
};
use half::f16;
use serde::{Deserialize, Serialize};

/// Semantic output of one capture request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    Color,
    Normal,
    Depth,
    /// Nearest and farthest linear depth in R and G, for single-view bakes.
    DepthRange,
}

impl Channel {
    /// Channels of an octahedral bake.
    pub const ALL: [Channel; 3] = [Channel::Color, Channel::Normal, Channel::Depth];
    /// Channels of a single-view true impostor bake.
    pub const TRUE_IMPOSTOR: [Channel; 3] =
        [Channel::Color, Channel::Normal, Channel::DepthRange];

    pub fn format(&self) -> PixelFormat {
        match self {
            Channel::Color => PixelFormat::Rgba8,
            Channel::Normal => PixelFormat::Rgba16F,
            Channel::Depth => PixelFormat::R16F,
            Channel::DepthRange => PixelFormat::Rg16F,
        }
    }

    /// Clear value for this channel, meaning "no geometry".
    pub fn background(&self) -> [f32; 4] {
        match self {
            Channel::Color => COLOR_BACKGROUND,
            Channel::Normal => NORMAL_BACKGROUND,
            Channel::Depth => [DEPTH_BACKGROUND, 0.0, 0.0, 0.0],
            Channel::DepthRange => DEPTH_RANGE_BACKGROUND,
        }
    }

    /// Background encoded as one texel of this channel's format.
    pub fn background_texel(&self) -> Vec<u8> {
        let mut texel = vec![0u8; self.format().texel_size()];
        self.format().encode_texel(self.background(), &mut texel);
        texel
    }

    pub fn slot(&self) -> usize {
        match self {
            Channel::Color => 0,
            Channel::Normal => 1,
            Channel::Depth => 2,
            Channel::DepthRange => 3,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Channel::Color => "color",
            Channel::Normal => "normal",
            Channel::Depth => "depth",
            Channel::DepthRange => "depth_range",
        }
    }
}

/// Storage format of channel texels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PixelFormat {
    /// 8-bit unorm RGBA.
    Rgba8,
    /// Half-float RGBA, little endian.
    Rgba16F,
    /// Half-float single channel, little endian.
    R16F,
    /// Half-float two channels, little endian.
    Rg16F,
}

impl PixelFormat {
    pub fn components(&self) -> usize {
        match self {
            PixelFormat::Rgba8 | PixelFormat::Rgba16F => 4,
            PixelFormat::Rg16F => 2,
            PixelFormat::R16F => 1,
        }
    }

    pub fn texel_size(&self) -> usize {
        match self {
            PixelFormat::Rgba8 => 4,
            PixelFormat::Rgba16F => 8,
            PixelFormat::Rg16F => 4,
            PixelFormat::R16F => 2,
        }
    }

    /// Writes a value into one texel. Unused components are dropped.
    pub fn encode_texel(&self, value: [f32; 4], out: &mut [u8]) {
        match self {
            PixelFormat::Rgba8 => {
                for (dst, v) in out.iter_mut().zip(value) {
                    *dst = (v.clamp(0.0, 1.0) * 255.0).round() as u8;
                }
            }
            PixelFormat::Rgba16F | PixelFormat::Rg16F | PixelFormat::R16F => {
                for (i, v) in value.iter().take(self.components()).enumerate() {
                    let bits = f16::from_f32(*v).to_bits();
                    out[i * 2..i * 2 + 2].copy_from_slice(&bits.to_le_bytes());
                }
            }
        }
    }

    /// Reads one texel as floats. Missing components read as zero.
    pub fn decode_texel(&self, texel: &[u8]) -> [f32; 4] {
        let mut value = [0.0f32; 4];
        match self {
            PixelFormat::Rgba8 => {
                for (dst, &b) in value.iter_mut().zip(texel) {
                    *dst = b as f32 / 255.0;
                }
            }
            PixelFormat::Rgba16F | PixelFormat::Rg16F | PixelFormat::R16F => {
                for (i, dst) in value.iter_mut().take(self.components()).enumerate() {
                    let bits = u16::from_le_bytes([texel[i * 2], texel[i * 2 + 1]]);
                    *dst = f16::from_bits(bits).to_f32();
                }
            }
        }
        value
    }
}

/// Raw pixels of one channel at tile resolution, rows top to bottom.
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelBuffer {
    pub channel: Channel,
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
}

impl ChannelBuffer {
    /// Buffer filled with the channel background.
    pub fn new(channel: Channel, width: u32, height: u32) -> Self {
        let mut buffer = Self {
            channel,
            width,
            height,
            data: vec![0u8; width as usize * height as usize * channel.format().texel_size()],
        };
        buffer.clear_to_background();
        buffer
    }

    pub fn format(&self) -> PixelFormat {
        self.channel.format()
    }

    pub fn clear(&mut self, value: [f32; 4]) {
        let mut texel = vec![0u8; self.format().texel_size()];
        self.format().encode_texel(value, &mut texel);
        for dst in self.data.chunks_exact_mut(texel.len()) {
            dst.copy_from_slice(&texel);
        }
    }

    pub fn clear_to_background(&mut self) {
        self.clear(self.channel.background());
    }

    fn texel_range(&self, x: u32, y: u32) -> std::ops::Range<usize> {
        let size = self.format().texel_size();
        let start = (y as usize * self.width as usize + x as usize) * size;
        start..start + size
    }

    pub fn get(&self, x: u32, y: u32) -> [f32; 4] {
        self.format().decode_texel(&self.data[self.texel_range(x, y)])
    }

    pub fn set(&mut self, x: u32, y: u32, value: [f32; 4]) {
        let format = self.format();
        let range = self.texel_range(x, y);
        format.encode_texel(value, &mut self.data[range]);
    }

    /// Checks the buffer still has the expected shape after a capture.
    pub fn is_consistent(&self, width: u32, height: u32) -> bool {
        self.width == width
            && self.height == height
            && self.data.len() == width as usize * height as usize * self.format().texel_size()
    }
}

/// Caller-owned scratch buffers, one per channel, sized to the tile resolution.
/// Acquired before the capture loop and dropped after it.
pub struct ScratchPool {
    tile_resolution: u32,
    buffers: [Option<ChannelBuffer>; 4],
}

impl ScratchPool {
    /// Allocates the octahedral channels up front; others on first use.
    pub fn new(tile_resolution: u32) -> Self {
        let mut buffers = [None, None, None, None];
        for channel in Channel::ALL {
            buffers[channel.slot()] =
                Some(ChannelBuffer::new(channel, tile_resolution, tile_resolution));
        }
        Self {
            tile_resolution,
            buffers,
        }
    }

    pub fn tile_resolution(&self) -> u32 {
        self.tile_resolution
    }

    /// Borrows the channel's buffer reset to its background.
    pub fn acquire(&mut self, channel: Channel) -> &mut ChannelBuffer {
        let resolution = self.tile_resolution;
        let slot = &mut self.buffers[channel.slot()];
        let reusable = matches!(
            slot.as_ref(),
            Some(buffer) if buffer.channel == channel && buffer.is_consistent(resolution, resolution)
        );
        if !reusable {
            *slot = None;
        }
        let buffer = slot.get_or_insert_with(|| ChannelBuffer::new(channel, resolution, resolution));
        if reusable {
            buffer.clear_to_background();
        }
        buffer
    }
}

/// One channel-isolated snapshot request.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CaptureRequest {
    pub pose: CameraPose,
    pub channel: Channel,
    /// Clear value the target must hold wherever nothing is drawn.
    pub clear: [f32; 4],
}

/// Failure reported by a render collaborator.
#[derive(Debug, Clone, PartialEq)]
pub struct CaptureFailure(pub String);

/// Host renderer producing one semantic channel per call.
pub trait RenderCollaborator {
    /// Renders `request` into `target`, which arrives cleared to `request.clear`
    /// at tile resolution in the channel's format.
    fn capture(
        &mut self,
        request: &CaptureRequest,
        target: &mut ChannelBuffer,
    ) -> Result<(), CaptureFailure>;

    /// Whether captured buffers can be copied straight into packed storage.
    /// Returning false selects the readback-and-convert copy path.
    fn supports_direct_copy(&self) -> bool {
        true
    }
}

/// Drives the render collaborator for each tile and channel.
pub struct TileCapture<'a, R: RenderCollaborator> {
    renderer: &'a mut R,
    pool: &'a mut ScratchPool,
}

impl<'a, R: RenderCollaborator> TileCapture<'a, R> {
    pub fn new(renderer: &'a mut R, pool: &'a mut ScratchPool) -> Self {
        Self { renderer, pool }
    }

    pub fn supports_direct_copy(&self) -> bool {
        self.renderer.supports_direct_copy()
    }

    /// Captures one channel of one sample into the pool's scratch buffer.
    /// Any failure is terminal for the bake.
    pub fn capture(
        &mut self,
        sample: &TileSample,
        channel: Channel,
    ) -> Result<&ChannelBuffer, BakeError> {
        let resolution = self.pool.tile_resolution();
        let request = CaptureRequest {
            pose: sample.pose,
            channel,
            clear: channel.background(),
        };

        let target = self.pool.acquire(channel);
        self.renderer
            .capture(&request, target)
            .map_err(|failure| BakeError::CaptureFailed {
                tile: sample.index,
                channel,
                reason: failure.0,
            })?;

        if target.channel != channel || !target.is_consistent(resolution, resolution) {
            return Err(BakeError::BufferMismatch {
                tile: sample.index,
                channel,
                expected: (resolution, resolution),
                actual: (target.width, target.height),
            });
        }

        Ok(target)
    }
}
