/// Tile packing into a padded 2D atlas or a layered texture array
use crate::capture::{Channel, ChannelBuffer, PixelFormat};
use crate::error::BakeError;
use constants::render_settings::MAX_TILE_COUNT;
use constants::texture::MAX_TEXTURE_DIMENSION;
use log::debug;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Output layout shared by the packer and the runtime material.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AtlasLayout {
    /// One texture, tiles separated by `padding` gutter pixels.
    Atlas {
        tile_count: u32,
        tile_resolution: u32,
        padding: u32,
    },
    /// One tile per layer, layer index `ty * N + tx`.
    Array {
        tile_count: u32,
        tile_resolution: u32,
    },
}

impl AtlasLayout {
    pub fn tile_count(&self) -> u32 {
        match *self {
            AtlasLayout::Atlas { tile_count, .. } | AtlasLayout::Array { tile_count, .. } => {
                tile_count
            }
        }
    }

    pub fn tile_resolution(&self) -> u32 {
        match *self {
            AtlasLayout::Atlas {
                tile_resolution, ..
            }
            | AtlasLayout::Array {
                tile_resolution, ..
            } => tile_resolution,
        }
    }

    pub fn padding(&self) -> u32 {
        match *self {
            AtlasLayout::Atlas { padding, .. } => padding,
            AtlasLayout::Array { .. } => 0,
        }
    }

    /// Width and height of one texture (or one layer), `None` on overflow.
    pub fn checked_texture_size(&self) -> Option<u32> {
        match *self {
            AtlasLayout::Atlas {
                tile_count,
                tile_resolution,
                padding,
            } => tile_count
                .checked_mul(tile_resolution)?
                .checked_add(tile_count.checked_add(1)?.checked_mul(padding)?),
            AtlasLayout::Array {
                tile_resolution, ..
            } => Some(tile_resolution),
        }
    }

    /// Width and height of one texture (or one layer). Saturates for
    /// layouts that `validate` rejects.
    pub fn texture_size(&self) -> u32 {
        self.checked_texture_size().unwrap_or(u32::MAX)
    }

    pub fn layer_count(&self) -> u32 {
        match *self {
            AtlasLayout::Atlas { .. } => 1,
            AtlasLayout::Array { tile_count, .. } => tile_count.saturating_mul(tile_count),
        }
    }

    pub fn is_array(&self) -> bool {
        matches!(self, AtlasLayout::Array { .. })
    }

    /// Top-left pixel of tile (tx, ty) within its texture or layer.
    pub fn tile_offset(&self, tx: u32, ty: u32) -> (u32, u32) {
        match *self {
            AtlasLayout::Atlas {
                tile_resolution,
                padding,
                ..
            } => (
                tx * tile_resolution + (tx + 1) * padding,
                ty * tile_resolution + (ty + 1) * padding,
            ),
            AtlasLayout::Array { .. } => (0, 0),
        }
    }

    /// Layer holding tile (tx, ty).
    pub fn tile_layer(&self, tx: u32, ty: u32) -> u32 {
        match *self {
            AtlasLayout::Atlas { .. } => 0,
            AtlasLayout::Array { tile_count, .. } => ty * tile_count + tx,
        }
    }

    /// Rejects layouts no texture can hold.
    pub fn validate(&self) -> Result<(), BakeError> {
        if self.tile_count() < 2 {
            return Err(BakeError::InvalidSettings(format!(
                "tile count must be at least 2, got {}",
                self.tile_count()
            )));
        }
        if self.tile_count() > MAX_TILE_COUNT {
            return Err(BakeError::InvalidSettings(format!(
                "tile count must be at most {}, got {}",
                MAX_TILE_COUNT,
                self.tile_count()
            )));
        }
        if self.tile_resolution() == 0 {
            return Err(BakeError::InvalidSettings(
                "tile resolution must be positive".into(),
            ));
        }

        let size = self.texture_size();
        if size > MAX_TEXTURE_DIMENSION {
            return Err(BakeError::AtlasTooLarge {
                size,
                max: MAX_TEXTURE_DIMENSION,
            });
        }
        Ok(())
    }
}

/// UV bounds of one tile for GPU sampling.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AtlasRegion {
    /// Minimum UV coordinates (top-left corner).
    pub uv_min: [f32; 2],
    /// Maximum UV coordinates (bottom-right corner).
    pub uv_max: [f32; 2],
    /// Array layer the tile lives in.
    pub layer: u32,
}

impl AtlasRegion {
    /// UV bounds of tile (tx, ty), excluding the gutter.
    pub fn from_tile_position(layout: &AtlasLayout, tx: u32, ty: u32) -> Self {
        let size = layout.texture_size() as f32;
        let resolution = layout.tile_resolution() as f32;
        let (px, py) = layout.tile_offset(tx, ty);

        Self {
            uv_min: [px as f32 / size, py as f32 / size],
            uv_max: [
                (px as f32 + resolution) / size,
                (py as f32 + resolution) / size,
            ],
            layer: layout.tile_layer(tx, ty),
        }
    }
}

/// How captured buffers reach packed storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CopyPath {
    /// Row-wise byte copy.
    Direct,
    /// Decode every texel to floats, then re-encode into the destination.
    Readback,
}

/// One packed channel: a single atlas or a stack of equally sized layers.
#[derive(Debug, Clone, PartialEq)]
pub struct PackedTexture {
    pub channel: Channel,
    pub width: u32,
    pub height: u32,
    pub layers: u32,
    /// Layers stored back to back, rows top to bottom.
    pub data: Vec<u8>,
}

impl PackedTexture {
    /// Allocates storage pre-filled with the channel background so
    /// gutter pixels filter to "no geometry".
    pub fn new(channel: Channel, width: u32, height: u32, layers: u32) -> Self {
        let texel = channel.background_texel();
        let len = width as usize * height as usize * layers as usize * texel.len();
        let mut data = vec![0u8; len];
        data.par_chunks_mut(texel.len())
            .for_each(|dst| dst.copy_from_slice(&texel));

        Self {
            channel,
            width,
            height,
            layers,
            data,
        }
    }

    pub fn format(&self) -> PixelFormat {
        self.channel.format()
    }

    pub fn layer_len(&self) -> usize {
        self.width as usize * self.height as usize * self.format().texel_size()
    }

    pub fn layer(&self, layer: u32) -> &[u8] {
        let len = self.layer_len();
        &self.data[layer as usize * len..(layer as usize + 1) * len]
    }

    fn row_start(&self, layer: u32, x: u32, y: u32) -> usize {
        let size = self.format().texel_size();
        layer as usize * self.layer_len() + (y as usize * self.width as usize + x as usize) * size
    }

    pub fn get(&self, layer: u32, x: u32, y: u32) -> [f32; 4] {
        let start = self.row_start(layer, x, y);
        self.format()
            .decode_texel(&self.data[start..start + self.format().texel_size()])
    }

    /// Copies `buffer` into the rectangle at (x, y) of `layer`.
    pub fn write(&mut self, layer: u32, x: u32, y: u32, buffer: &ChannelBuffer, path: CopyPath) {
        let format = self.format();
        let size = format.texel_size();
        let row_len = buffer.width as usize * size;

        for row in 0..buffer.height {
            let src = &buffer.data[row as usize * row_len..(row as usize + 1) * row_len];
            let start = self.row_start(layer, x, y + row);
            let dst = &mut self.data[start..start + row_len];

            match path {
                CopyPath::Direct => dst.copy_from_slice(src),
                CopyPath::Readback => {
                    let texels: Vec<[f32; 4]> = src
                        .par_chunks_exact(size)
                        .map(|t| format.decode_texel(t))
                        .collect();
                    for (out, value) in dst.chunks_exact_mut(size).zip(texels) {
                        format.encode_texel(value, out);
                    }
                }
            }
        }
    }

    /// Extracts a rectangle of `layer` as a channel buffer.
    pub fn read(&self, layer: u32, x: u32, y: u32, width: u32, height: u32) -> ChannelBuffer {
        let size = self.format().texel_size();
        let row_len = width as usize * size;
        let mut data = Vec::with_capacity(row_len * height as usize);

        for row in 0..height {
            let start = self.row_start(layer, x, y + row);
            data.extend_from_slice(&self.data[start..start + row_len]);
        }

        ChannelBuffer {
            channel: self.channel,
            width,
            height,
            data,
        }
    }
}

/// Composites captured tiles into the selected layout, one texture per channel.
pub struct AtlasPacker {
    layout: AtlasLayout,
    copy_path: CopyPath,
    textures: [PackedTexture; 3],
}

impl AtlasPacker {
    /// Validates the layout and allocates background-filled storage.
    pub fn new(layout: AtlasLayout, copy_path: CopyPath) -> Result<Self, BakeError> {
        layout.validate()?;

        let size = layout.texture_size();
        let layers = layout.layer_count();
        debug!(
            "Allocating {}x{}x{} packed textures ({:?} copy)",
            size, size, layers, copy_path
        );

        Ok(Self {
            layout,
            copy_path,
            textures: Channel::ALL.map(|c| PackedTexture::new(c, size, size, layers)),
        })
    }

    pub fn layout(&self) -> &AtlasLayout {
        &self.layout
    }

    pub fn copy_path(&self) -> CopyPath {
        self.copy_path
    }

    /// Writes one captured tile into its slot.
    pub fn write_tile(&mut self, tx: u32, ty: u32, buffer: &ChannelBuffer) -> Result<(), BakeError> {
        let resolution = self.layout.tile_resolution();
        let n = self.layout.tile_count();
        if tx >= n || ty >= n {
            return Err(BakeError::InvalidSettings(format!(
                "tile ({}, {}) outside {}x{} grid",
                tx, ty, n, n
            )));
        }
        if !Channel::ALL.contains(&buffer.channel) {
            return Err(BakeError::InvalidSettings(format!(
                "{:?} has no slot in an octahedral atlas",
                buffer.channel
            )));
        }
        if !buffer.is_consistent(resolution, resolution) {
            return Err(BakeError::BufferMismatch {
                tile: ty * n + tx,
                channel: buffer.channel,
                expected: (resolution, resolution),
                actual: (buffer.width, buffer.height),
            });
        }

        let (px, py) = self.layout.tile_offset(tx, ty);
        let layer = self.layout.tile_layer(tx, ty);
        let path = self.copy_path;
        self.textures[buffer.channel.slot()].write(layer, px, py, buffer, path);
        Ok(())
    }

    /// Reads tile (tx, ty) of a channel back out of packed storage.
    pub fn read_tile(&self, channel: Channel, tx: u32, ty: u32) -> ChannelBuffer {
        let resolution = self.layout.tile_resolution();
        let (px, py) = self.layout.tile_offset(tx, ty);
        let layer = self.layout.tile_layer(tx, ty);
        self.textures[channel.slot()].read(layer, px, py, resolution, resolution)
    }

    pub fn texture(&self, channel: Channel) -> &PackedTexture {
        &self.textures[channel.slot()]
    }

    pub fn into_textures(self) -> [PackedTexture; 3] {
        self.textures
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn atlas(tile_count: u32, tile_resolution: u32, padding: u32) -> AtlasLayout {
        AtlasLayout::Atlas {
            tile_count,
            tile_resolution,
            padding,
        }
    }

    /// Tile buffer whose texels encode the tile index so mix-ups are visible.
    fn marked_tile(channel: Channel, resolution: u32, mark: u32) -> ChannelBuffer {
        let mut buffer = ChannelBuffer::new(channel, resolution, resolution);
        for y in 0..resolution {
            for x in 0..resolution {
                let v = ((mark * 7 + x + y * 3) % 200) as f32 / 255.0;
                buffer.set(x, y, [v, 1.0 - v, 0.5 * v, 1.0]);
            }
        }
        buffer
    }

    #[test]
    fn test_atlas_sizing_invariant() {
        for (n, res, pad) in [(2, 16, 0), (4, 64, 2), (8, 256, 4), (16, 128, 1)] {
            let layout = atlas(n, res, pad);
            let size = layout.texture_size();
            assert_eq!(size, n * res + (n + 1) * pad);

            for ty in 0..n {
                for tx in 0..n {
                    let (px, py) = layout.tile_offset(tx, ty);
                    assert!(px <= size - res && py <= size - res);
                    assert!(px >= pad && py >= pad);
                }
            }
        }
    }

    #[test]
    fn test_scenario_layout() {
        let layout = atlas(4, 64, 2);
        assert_eq!(layout.texture_size(), 266);
        assert_eq!(layout.tile_offset(0, 0), (2, 2));
        assert_eq!(layout.tile_offset(1, 0), (68, 2));
        assert_eq!(layout.tile_offset(3, 3), (200, 200));
    }

    #[test]
    fn test_oversized_atlas_rejected() {
        let err = atlas(16, 1024, 2).validate().unwrap_err();
        assert!(matches!(err, BakeError::AtlasTooLarge { .. }));
        assert!(err.is_configuration());

        // Same grid as an array is not bound by the texture size.
        let array = AtlasLayout::Array {
            tile_count: 16,
            tile_resolution: 1024,
        };
        assert!(array.validate().is_ok());
        assert_eq!(array.layer_count(), 256);
    }

    #[test]
    fn test_huge_tile_counts_rejected_without_overflow() {
        for layout in [
            atlas(70_000, 1, 0),
            atlas(u32::MAX, u32::MAX, u32::MAX),
            AtlasLayout::Array {
                tile_count: 70_000,
                tile_resolution: 16,
            },
            AtlasLayout::Array {
                tile_count: MAX_TILE_COUNT + 1,
                tile_resolution: 16,
            },
        ] {
            assert!(layout.validate().unwrap_err().is_configuration(), "{:?}", layout);
        }
        assert_eq!(atlas(u32::MAX, 2, 2).texture_size(), u32::MAX);
        assert_eq!(
            AtlasLayout::Array {
                tile_count: MAX_TILE_COUNT,
                tile_resolution: 16,
            }
            .layer_count(),
            4096
        );
    }

    #[test]
    fn test_depth_range_tiles_have_no_atlas_slot() {
        let mut packer = AtlasPacker::new(atlas(2, 4, 1), CopyPath::Direct).unwrap();
        let err = packer
            .write_tile(0, 0, &ChannelBuffer::new(Channel::DepthRange, 4, 4))
            .unwrap_err();
        assert!(err.is_configuration());
    }

    #[test]
    fn test_region_excludes_gutter() {
        let layout = atlas(4, 64, 2);
        let region = AtlasRegion::from_tile_position(&layout, 0, 0);
        assert_eq!(region.uv_min, [2.0 / 266.0, 2.0 / 266.0]);
        assert_eq!(region.uv_max, [66.0 / 266.0, 66.0 / 266.0]);
        assert_eq!(region.layer, 0);
    }

    #[test]
    fn test_prefill_and_gutter_backgrounds() {
        let layout = atlas(2, 4, 2);
        let mut packer = AtlasPacker::new(layout, CopyPath::Direct).unwrap();

        for ty in 0..2 {
            for tx in 0..2 {
                for channel in Channel::ALL {
                    packer
                        .write_tile(tx, ty, &marked_tile(channel, 4, ty * 2 + tx))
                        .unwrap();
                }
            }
        }

        // Corner gutter keeps every channel's background.
        assert_eq!(packer.texture(Channel::Color).get(0, 0, 0), [0.0; 4]);
        assert_eq!(
            packer.texture(Channel::Normal).get(0, 1, 0),
            [0.5, 0.5, 1.0, 0.0]
        );
        assert_eq!(packer.texture(Channel::Depth).get(0, 6, 7)[0], 1.0);
    }

    #[test]
    fn test_atlas_tiles_do_not_overlap() {
        let layout = atlas(3, 5, 1);
        let mut packer = AtlasPacker::new(layout, CopyPath::Direct).unwrap();
        let tiles: Vec<_> = (0..9).map(|i| marked_tile(Channel::Color, 5, i)).collect();

        for (i, tile) in tiles.iter().enumerate() {
            packer.write_tile(i as u32 % 3, i as u32 / 3, tile).unwrap();
        }
        for (i, tile) in tiles.iter().enumerate() {
            assert_eq!(&packer.read_tile(Channel::Color, i as u32 % 3, i as u32 / 3), tile);
        }
    }

    #[test]
    fn test_array_layer_mapping() {
        let n = 3;
        let layout = AtlasLayout::Array {
            tile_count: n,
            tile_resolution: 6,
        };
        let mut packer = AtlasPacker::new(layout, CopyPath::Direct).unwrap();

        for ty in 0..n {
            for tx in 0..n {
                let tile = marked_tile(Channel::Normal, 6, ty * n + tx);
                packer.write_tile(tx, ty, &tile).unwrap();
            }
        }

        let texture = packer.texture(Channel::Normal);
        for ty in 0..n {
            for tx in 0..n {
                let expected = marked_tile(Channel::Normal, 6, ty * n + tx);
                assert_eq!(texture.layer(ty * n + tx), expected.data.as_slice());
            }
        }
    }

    #[test]
    fn test_readback_matches_direct_copy() {
        for layout in [
            atlas(2, 8, 3),
            AtlasLayout::Array {
                tile_count: 2,
                tile_resolution: 8,
            },
        ] {
            let mut direct = AtlasPacker::new(layout, CopyPath::Direct).unwrap();
            let mut readback = AtlasPacker::new(layout, CopyPath::Readback).unwrap();

            for i in 0..4 {
                for channel in Channel::ALL {
                    let tile = marked_tile(channel, 8, i);
                    direct.write_tile(i % 2, i / 2, &tile).unwrap();
                    readback.write_tile(i % 2, i / 2, &tile).unwrap();
                }
            }

            for channel in Channel::ALL {
                assert_eq!(direct.texture(channel), readback.texture(channel));
            }
        }
    }

    #[test]
    fn test_wrong_tile_size_rejected() {
        let mut packer = AtlasPacker::new(atlas(2, 8, 1), CopyPath::Direct).unwrap();
        let err = packer
            .write_tile(0, 0, &ChannelBuffer::new(Channel::Color, 4, 4))
            .unwrap_err();
        assert!(matches!(err, BakeError::BufferMismatch { .. }));
    }
}
