//! We read and write `.dds` (DirectDraw Surface) containers by hand because we only need the
//! uncompressed floating point layouts that renderers dump their AOVs in.
//! See: <https://learn.microsoft.com/en-us/windows/win32/direct3ddds/dds-header>

/// The signature at the start of every `.dds` file.
pub const MAGIC_DDS: [u8; 4] = *b"DDS ";

/// The size of the magic plus the legacy `DDS_HEADER` in bytes.
pub const HEADER_SIZE: usize = 128;

/// The size of the optional `DDS_HEADER_DXT10` extension in bytes.
pub const DX10_HEADER_SIZE: usize = 20;

/// The value of the header's own size field.
pub const HEADER_STRUCT_SIZE: u32 = 124;

/// The value of the pixel format's own size field.
pub const PIXEL_FORMAT_STRUCT_SIZE: u32 = 32;

/// Pixel format flag: the `fourcc` field is valid.
pub const DDPF_FOURCC: u32 = 0x4;

/// `fourcc` announcing the DX10 extension header.
pub const FOURCC_DX10: u32 = u32::from_le_bytes(*b"DX10");

/// Legacy `D3DFMT_A16B16G16R16F`.
pub const FOURCC_RGBA16_FLOAT: u32 = 113;

/// Legacy `D3DFMT_A32B32G32R32F`.
pub const FOURCC_RGBA32_FLOAT: u32 = 116;

/// `DXGI_FORMAT_R32G32B32A32_FLOAT`.
pub const DXGI_RGBA32_FLOAT: u32 = 2;

/// `DXGI_FORMAT_R32G32B32_FLOAT`.
pub const DXGI_RGB32_FLOAT: u32 = 6;

/// `DXGI_FORMAT_R16G16B16A16_FLOAT`.
pub const DXGI_RGBA16_FLOAT: u32 = 10;

/// `D3D10_RESOURCE_DIMENSION_TEXTURE2D`.
pub const DIMENSION_TEXTURE2D: u32 = 3;

/// The pixel layouts we can feed to the denoiser.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelFormat {
    /// Four half floats per pixel.
    Rgba16Float,
    /// Three single floats per pixel.
    Rgb32Float,
    /// Four single floats per pixel.
    Rgba32Float,
}

impl PixelFormat {
    /// The size of a single pixel in bytes.
    pub const fn bytes_per_pixel(self) -> usize {
        match self {
            Self::Rgba16Float => 8,
            Self::Rgb32Float => 12,
            Self::Rgba32Float => 16,
        }
    }

    /// Whether each channel is a 16 bit half float.
    pub const fn is_half(self) -> bool {
        matches!(self, Self::Rgba16Float)
    }

    /// Find our format from a legacy `fourcc`.
    pub const fn from_fourcc(fourcc: u32) -> Option<Self> {
        match fourcc {
            FOURCC_RGBA16_FLOAT => Some(Self::Rgba16Float),
            FOURCC_RGBA32_FLOAT => Some(Self::Rgba32Float),
            _ => None,
        }
    }

    /// Find our format from a DX10 extension `DXGI_FORMAT`.
    pub const fn from_dxgi(dxgi: u32) -> Option<Self> {
        match dxgi {
            DXGI_RGBA16_FLOAT => Some(Self::Rgba16Float),
            DXGI_RGB32_FLOAT => Some(Self::Rgb32Float),
            DXGI_RGBA32_FLOAT => Some(Self::Rgba32Float),
            _ => None,
        }
    }
}

/// The parts of the `.dds` header that we care about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    /// Width of the top level surface.
    pub width: u32,
    /// Height of the top level surface.
    pub height: u32,
    /// Number of mip levels, 0 and 1 both mean just the top level.
    pub mip_map_count: u32,
    /// The layout of each pixel.
    pub format: PixelFormat,
    /// Whether the pixel format came from the DX10 extension header.
    pub is_dx10: bool,
}

impl Header {
    /// The size of the top level surface in bytes.
    pub fn surface_size(&self) -> color_eyre::Result<usize> {
        use color_eyre::eyre::ContextCompat as _;

        let width = usize::try_from(self.width)?;
        let height = usize::try_from(self.height)?;
        width
            .checked_mul(height)
            .and_then(|pixels| pixels.checked_mul(self.format.bytes_per_pixel()))
            .with_context(|| {
                format!(
                    "Surface size of a {}x{} texture overflows",
                    self.width, self.height
                )
            })
    }
}

/// A `.dds` texture held in memory.
///
/// Only the top level surface is decoded. The raw header bytes and anything after the top level
/// surface (mip levels, array slices) are kept verbatim so that an untouched texture is written
/// back byte-for-byte.
#[derive(Debug, Clone)]
pub struct Texture {
    /// The parsed header.
    pub header: Header,
    /// Every byte before the pixel data, including the magic and any DX10 extension.
    pub raw_header: Vec<u8>,
    /// Pixels of the top level surface.
    pub data: Vec<u8>,
    /// Everything after the top level surface.
    pub trailing: Vec<u8>,
}

impl Texture {
    /// Whether there is no usable pixel data.
    pub fn is_empty(&self) -> bool {
        self.header.width == 0 || self.header.height == 0 || self.data.is_empty()
    }

    /// Width and height of the top level surface.
    pub const fn resolution(&self) -> crate::layout::Resolution {
        crate::layout::Resolution {
            width: self.header.width,
            height: self.header.height,
        }
    }
}

#[expect(
    clippy::little_endian_bytes,
    clippy::indexing_slicing,
    reason = "These are just tests"
)]
