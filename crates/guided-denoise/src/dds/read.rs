//! Load textures from `.dds` files.

#![expect(
    clippy::little_endian_bytes,
    reason = "The `.dds` file format is little endian"
)]

use color_eyre::{eyre::ContextCompat as _, Result};

impl super::Texture {
    /// Read and parse a `.dds` file.
    pub fn read(path: &std::path::Path) -> Result<Self> {
        tracing::debug!("Loading texture from: {}", path.display());
        let bytes = std::fs::read(path)?;
        let texture = Self::parse(&bytes)?;
        tracing::debug!("Texture header parsed: {:?}", texture.header);
        if texture.header.mip_map_count > 1 {
            tracing::debug!(
                "Only the top of {} mip levels is denoised, the rest are kept as they are",
                texture.header.mip_map_count
            );
        }
        if !texture.header.is_dx10 {
            tracing::debug!("{} uses a legacy `fourcc` pixel format", path.display());
        }
        Ok(texture)
    }

    /// Parse the bytes of a whole `.dds` file.
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        if bytes.get(0..4) != Some(super::header::MAGIC_DDS.as_slice()) {
            color_eyre::eyre::bail!("Not a DirectDraw Surface file");
        }

        let header_size = read_u32_le(bytes, 4)?;
        if header_size != super::header::HEADER_STRUCT_SIZE {
            color_eyre::eyre::bail!("Unexpected `.dds` header size: {header_size}");
        }

        let height = read_u32_le(bytes, 12)?;
        let width = read_u32_le(bytes, 16)?;
        let mip_map_count = read_u32_le(bytes, 28)?;
        let pixel_format_size = read_u32_le(bytes, 76)?;
        if pixel_format_size != super::header::PIXEL_FORMAT_STRUCT_SIZE {
            color_eyre::eyre::bail!("Unexpected `.dds` pixel format size: {pixel_format_size}");
        }
        let pixel_format_flags = read_u32_le(bytes, 80)?;
        let fourcc = read_u32_le(bytes, 84)?;

        if pixel_format_flags & super::header::DDPF_FOURCC == 0 {
            color_eyre::eyre::bail!(
                "Only floating point `.dds` formats are supported, found pixel format flags \
                {pixel_format_flags:#x}"
            );
        }

        let (format, is_dx10, data_offset) = if fourcc == super::header::FOURCC_DX10 {
            let dxgi = read_u32_le(bytes, super::header::HEADER_SIZE)?;
            let format = super::PixelFormat::from_dxgi(dxgi)
                .with_context(|| format!("Unsupported DXGI format: {dxgi}"))?;
            let dimension = read_u32_le(bytes, super::header::HEADER_SIZE + 4)?;
            if dimension != super::header::DIMENSION_TEXTURE2D {
                color_eyre::eyre::bail!(
                    "Only 2D textures are supported, found dimension {dimension}"
                );
            }
            (
                format,
                true,
                super::header::HEADER_SIZE + super::header::DX10_HEADER_SIZE,
            )
        } else {
            let format = super::PixelFormat::from_fourcc(fourcc)
                .with_context(|| format!("Unsupported `.dds` fourcc: {fourcc}"))?;
            (format, false, super::header::HEADER_SIZE)
        };

        let header = super::Header {
            width,
            height,
            mip_map_count,
            format,
            is_dx10,
        };

        let data_end = data_offset
            .checked_add(header.surface_size()?)
            .context("`.dds` file size overflows")?;
        let raw_header = bytes
            .get(..data_offset)
            .context("`.dds` file is truncated in its header")?
            .to_vec();
        let data = bytes
            .get(data_offset..data_end)
            .with_context(|| {
                format!(
                    "`.dds` file is truncated: expected {data_end} bytes, found {}",
                    bytes.len()
                )
            })?
            .to_vec();
        let trailing = bytes.get(data_end..).unwrap_or_default().to_vec();

        Ok(Self {
            header,
            raw_header,
            data,
            trailing,
        })
    }
}

/// Read a little endian `u32` at a byte offset.
fn read_u32_le(bytes: &[u8], offset: usize) -> Result<u32> {
    let chunk = bytes
        .get(offset..offset + 4)
        .with_context(|| format!("`.dds` file is truncated at byte {offset}"))?;
    Ok(u32::from_le_bytes(chunk.try_into()?))
}

#[cfg(test)]
mod test {
    use crate::dds::PixelFormat;

    /// A minimal legacy (non-DX10) header for a 1x1 texture with the given `fourcc`.
    fn legacy_header(fourcc: u32) -> Vec<u8> {
        let mut bytes = vec![0u8; crate::dds::header::HEADER_SIZE];
        bytes[0..4].copy_from_slice(b"DDS ");
        bytes[4..8].copy_from_slice(&124u32.to_le_bytes());
        bytes[12..16].copy_from_slice(&1u32.to_le_bytes());
        bytes[16..20].copy_from_slice(&1u32.to_le_bytes());
        bytes[76..80].copy_from_slice(&32u32.to_le_bytes());
        bytes[80..84].copy_from_slice(&crate::dds::header::DDPF_FOURCC.to_le_bytes());
        bytes[84..88].copy_from_slice(&fourcc.to_le_bytes());
        bytes
    }

    #[test]
    fn legacy_fourcc() {
        let mut bytes = legacy_header(crate::dds::header::FOURCC_RGBA32_FLOAT);
        for channel in [1.0f32, 2.0, 3.0, 4.0] {
            bytes.extend_from_slice(&channel.to_le_bytes());
        }
        let texture = crate::dds::Texture::parse(&bytes).unwrap();
        assert_eq!(texture.header.format, PixelFormat::Rgba32Float);
        assert!(!texture.header.is_dx10);
        assert_eq!(texture.data.len(), 16);
        assert!(texture.trailing.is_empty());
    }

    #[test]
    fn keeps_trailing_mip_levels() {
        let mut bytes = legacy_header(crate::dds::header::FOURCC_RGBA16_FLOAT);
        bytes.extend_from_slice(&[1; 8]);
        bytes.extend_from_slice(&[2; 3]);
        let texture = crate::dds::Texture::parse(&bytes).unwrap();
        assert_eq!(texture.data, [1; 8]);
        assert_eq!(texture.trailing, [2; 3]);
    }

    #[test]
    fn rejects_bad_magic() {
        let mut bytes = legacy_header(crate::dds::header::FOURCC_RGBA16_FLOAT);
        bytes[0] = b'X';
        assert!(crate::dds::Texture::parse(&bytes).is_err());
    }

    #[test]
    fn rejects_unsupported_format() {
        let bytes = legacy_header(u32::from_le_bytes(*b"DXT1"));
        let error = crate::dds::Texture::parse(&bytes).unwrap_err();
        assert!(error.to_string().contains("Unsupported"));
    }

    #[test]
    fn rejects_volume_textures() {
        let mut texture = crate::dds::header::test::uniform_rgba16(1, 1, [0.0; 4]);
        // D3D10_RESOURCE_DIMENSION_TEXTURE3D
        texture.raw_header[crate::dds::header::HEADER_SIZE + 4] = 4;
        let mut bytes = texture.raw_header.clone();
        bytes.extend_from_slice(&texture.data);
        let error = crate::dds::Texture::parse(&bytes).unwrap_err();
        assert!(error.to_string().contains("2D"));
    }

    #[test]
    fn rejects_huge_dimensions() {
        let mut bytes = legacy_header(crate::dds::header::FOURCC_RGBA32_FLOAT);
        bytes[12..16].copy_from_slice(&u32::MAX.to_le_bytes());
        bytes[16..20].copy_from_slice(&u32::MAX.to_le_bytes());
        bytes.extend_from_slice(&[0; 16]);
        let error = crate::dds::Texture::parse(&bytes).unwrap_err();
        assert!(error.to_string().contains("overflows"));
    }

    #[test]
    fn rejects_truncated_data() {
        let mut bytes = legacy_header(crate::dds::header::FOURCC_RGBA16_FLOAT);
        bytes.extend_from_slice(&[0; 4]);
        assert!(crate::dds::Texture::parse(&bytes).is_err());
    }
}
