use crate::atlas::PackedTexture;
use crate::capture::{Channel, PixelFormat};
use crate::error::BakeError;
use ddsfile::{AlphaMode, D3D10ResourceDimension, Dds, DxgiFormat, NewDxgiParams};
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

fn dxgi_format(format: PixelFormat) -> DxgiFormat {
    match format {
        PixelFormat::Rgba8 => DxgiFormat::R8G8B8A8_UNorm,
        PixelFormat::Rgba16F => DxgiFormat::R16G16B16A16_Float,
        PixelFormat::R16F => DxgiFormat::R16_Float,
        PixelFormat::Rg16F => DxgiFormat::R16G16_Float,
    }
}

/// Writes a packed texture (atlas or array) as an uncompressed DDS file.
/// Texel bytes are stored as-is, layers back to back.
pub fn write_packed_dds(path: &Path, texture: &PackedTexture) -> Result<(), BakeError> {
    let params = NewDxgiParams {
        height: texture.height,
        width: texture.width,
        depth: None,
        format: dxgi_format(texture.format()),
        mipmap_levels: Some(1),
        array_layers: Some(texture.layers),
        caps2: None,
        is_cubemap: false,
        resource_dimension: D3D10ResourceDimension::Texture2D,
        alpha_mode: AlphaMode::Unknown,
    };

    let mut dds = Dds::new_dxgi(params)?;
    dds.data = texture.data.clone();
    let mut writer = BufWriter::new(File::create(path)?);
    dds.write(&mut writer)?;
    Ok(())
}

/// Reads a DDS file written by `write_packed_dds` back into a packed texture.
pub fn read_packed_dds(path: &Path, channel: Channel) -> Result<PackedTexture, BakeError> {
    let mut reader = BufReader::new(File::open(path)?);
    let dds = Dds::read(&mut reader)?;

    let expected = dxgi_format(channel.format());
    if dds.get_dxgi_format() != Some(expected) {
        return Err(BakeError::Persistence(format!(
            "{} holds {:?}, expected {:?}",
            path.display(),
            dds.get_dxgi_format(),
            expected
        )));
    }

    let texture = PackedTexture {
        channel,
        width: dds.get_width(),
        height: dds.get_height(),
        layers: dds.get_num_array_layers(),
        data: dds.data,
    };
    if texture.data.len() != texture.layer_len() * texture.layers as usize {
        return Err(BakeError::Persistence(format!(
            "{} has {} bytes of texel data, expected {}",
            path.display(),
            texture.data.len(),
            texture.layer_len() * texture.layers as usize
        )));
    }
    Ok(texture)
}
