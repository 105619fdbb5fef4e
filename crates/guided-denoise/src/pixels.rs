//! Convert texture pixels to and from the denoiser's forced `HALF3` format.
//!
//! The denoiser is told every layer is three packed half floats per pixel, whatever the source
//! container holds. So alpha is dropped on the way in, and on the way out the container's own
//! alpha is left untouched.

#![expect(
    clippy::little_endian_bytes,
    reason = "Both `.dds` and device memory are little endian"
)]

use color_eyre::Result;

/// Pack a texture's top level surface into `HALF3` pixels.
pub fn to_half3(texture: &crate::dds::Texture) -> Result<Vec<u8>> {
    let format = texture.header.format;
    let expected = texture.header.surface_size()?;
    if texture.data.len() != expected {
        color_eyre::eyre::bail!(
            "Texture has {} bytes of pixels, expected {expected}",
            texture.data.len()
        );
    }

    let pixel_count = expected / format.bytes_per_pixel();
    let mut packed = Vec::with_capacity(pixel_count * crate::layout::PIXEL_STRIDE);
    for pixel in texture.data.chunks_exact(format.bytes_per_pixel()) {
        if format.is_half() {
            packed.extend_from_slice(pixel.get(..crate::layout::PIXEL_STRIDE).unwrap_or_default());
        } else {
            for channel in pixel.chunks_exact(4).take(3) {
                let value = f32::from_le_bytes(channel.try_into()?);
                packed.extend_from_slice(&half::f16::from_f32(value).to_le_bytes());
            }
        }
    }

    Ok(packed)
}

/// Write `HALF3` pixels over a texture's top level surface, in the texture's own format.
pub fn write_half3(texture: &mut crate::dds::Texture, half3: &[u8]) -> Result<()> {
    let format = texture.header.format;
    let expected = texture.resolution().bytes(crate::layout::PIXEL_STRIDE)?;
    if half3.len() != expected {
        color_eyre::eyre::bail!(
            "Denoised output has {} bytes, expected {expected} for a {} texture",
            half3.len(),
            texture.resolution()
        );
    }
    if texture.data.len() != texture.header.surface_size()? {
        color_eyre::eyre::bail!("Output texture's pixel data doesn't match its header");
    }

    for (pixel, source) in texture
        .data
        .chunks_exact_mut(format.bytes_per_pixel())
        .zip(half3.chunks_exact(crate::layout::PIXEL_STRIDE))
    {
        if format.is_half() {
            if let Some(rgb) = pixel.get_mut(..crate::layout::PIXEL_STRIDE) {
                rgb.copy_from_slice(source);
            }
        } else {
            for (channel, half_bytes) in pixel.chunks_exact_mut(4).zip(source.chunks_exact(2)) {
                let value = half::f16::from_le_bytes(half_bytes.try_into()?).to_f32();
                channel.copy_from_slice(&value.to_le_bytes());
            }
        }
    }

    Ok(())
}

/// Read a `HALF3` buffer as `[r, g, b]` floats.
pub fn half3_to_rgb(half3: &[u8]) -> impl Iterator<Item = [f32; 3]> + '_ {
    half3
        .chunks_exact(crate::layout::PIXEL_STRIDE)
        .map(|pixel| bytemuck::pod_read_unaligned::<[half::f16; 3]>(pixel).map(half::f16::to_f32))
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::dds::header::test::texture;
    use crate::dds::PixelFormat;

    #[test]
    fn rgba16_drops_alpha() {
        let texture = crate::dds::header::test::uniform_rgba16(2, 1, [0.5, 1.0, 2.0, 0.25]);
        let packed = to_half3(&texture).unwrap();
        assert_eq!(packed.len(), 2 * 6);
        let rgb: Vec<[f32; 3]> = half3_to_rgb(&packed).collect();
        assert_eq!(rgb, [[0.5, 1.0, 2.0], [0.5, 1.0, 2.0]]);
    }

    #[test]
    fn rgb32_is_converted_to_half() {
        let data: Vec<u8> = [1.5f32, -2.0, 4.0]
            .iter()
            .flat_map(|value| value.to_le_bytes())
            .collect();
        let texture = texture(1, 1, PixelFormat::Rgb32Float, data);
        let packed = to_half3(&texture).unwrap();
        let rgb: Vec<[f32; 3]> = half3_to_rgb(&packed).collect();
        assert_eq!(rgb, [[1.5, -2.0, 4.0]]);
    }

    #[test]
    fn write_back_keeps_alpha() {
        let mut texture = crate::dds::header::test::uniform_rgba16(1, 1, [0.0, 0.0, 0.0, 0.75]);
        let source = crate::dds::header::test::uniform_rgba16(1, 1, [1.0, 2.0, 3.0, 1.0]);
        let packed = to_half3(&source).unwrap();
        write_half3(&mut texture, &packed).unwrap();
        let expected = crate::dds::header::test::uniform_rgba16(1, 1, [1.0, 2.0, 3.0, 0.75]);
        assert_eq!(texture.data, expected.data);
    }

    #[test]
    fn write_back_into_f32() {
        let data: Vec<u8> = [0.0f32, 0.0, 0.0, 0.5]
            .iter()
            .flat_map(|value| value.to_le_bytes())
            .collect();
        let mut texture = texture(1, 1, PixelFormat::Rgba32Float, data);
        let source = crate::dds::header::test::uniform_rgba16(1, 1, [0.25, 0.5, 8.0, 1.0]);
        write_half3(&mut texture, &to_half3(&source).unwrap()).unwrap();
        let floats: Vec<f32> = texture
            .data
            .chunks_exact(4)
            .map(bytemuck::pod_read_unaligned::<f32>)
            .collect();
        assert_eq!(floats, [0.25, 0.5, 8.0, 0.5]);
    }

    #[test]
    fn write_back_rejects_wrong_size() {
        let mut texture = crate::dds::header::test::uniform_rgba16(2, 2, [0.0; 4]);
        assert!(write_half3(&mut texture, &[0; 6]).is_err());
    }
}
