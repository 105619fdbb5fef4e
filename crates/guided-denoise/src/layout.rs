//! How the denoiser's inputs are laid out in device memory.
//!
//! All three inputs live in one concatenated buffer, each in its own equally sized slot:
//!
//! ```text
//! | albedo (slot_size) | color (slot_size) | normal (slot_size) |
//! 0                    slot_size           2 * slot_size
//! ```

use color_eyre::{eyre::ContextCompat as _, Result};

/// Every input is uploaded as three half floats per pixel.
pub const PIXEL_STRIDE: usize = 6;

/// Albedo, color and normal.
pub const INPUT_COUNT: usize = 3;

/// The single resolution that both the denoiser memory query and the buffer sizes are based on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
pub struct Resolution {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl Resolution {
    /// The total number of pixels.
    pub fn area(self) -> Result<usize> {
        usize::try_from(self.width)?
            .checked_mul(usize::try_from(self.height)?)
            .with_context(|| format!("Pixel count of {self} overflows"))
    }

    /// The size in bytes of one image at this resolution.
    pub fn bytes(self, bytes_per_pixel: usize) -> Result<usize> {
        self.area()?
            .checked_mul(bytes_per_pixel)
            .with_context(|| format!("Image size of {self} overflows"))
    }

    /// The component-wise maximum of two resolutions.
    pub fn max(self, other: Self) -> Self {
        Self {
            width: self.width.max(other.width),
            height: self.height.max(other.height),
        }
    }
}

impl std::fmt::Display for Resolution {
    #[expect(clippy::min_ident_chars, reason = "This is from `std`")]
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

impl std::str::FromStr for Resolution {
    type Err = color_eyre::Report;

    fn from_str(string: &str) -> Result<Self> {
        let Some((width, height)) = string.split_once(['x', 'X']) else {
            color_eyre::eyre::bail!("Resolution must look like `WIDTHxHEIGHT`, got `{string}`");
        };
        Ok(Self {
            width: width.trim().parse()?,
            height: height.trim().parse()?,
        })
    }
}

/// Sizes and offsets of the concatenated input buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferLayout {
    /// The resolution every slot is sized for.
    pub resolution: Resolution,
    /// The size in bytes of a single input's slot.
    pub slot_size: usize,
}

impl BufferLayout {
    /// Size the slots for a resolution.
    pub fn new(resolution: Resolution) -> Result<Self> {
        let slot_size = resolution.bytes(PIXEL_STRIDE)?;
        if slot_size.checked_mul(INPUT_COUNT).is_none() {
            color_eyre::eyre::bail!("Denoiser input buffer for {resolution} overflows");
        }
        let layout = Self {
            resolution,
            slot_size,
        };
        if layout.pixel_buffer_size() == 0 {
            color_eyre::eyre::bail!("Denoiser inputs have no pixels at all ({resolution})");
        }
        Ok(layout)
    }

    /// The size in bytes of the whole concatenated input buffer.
    pub const fn pixel_buffer_size(&self) -> usize {
        self.slot_size * INPUT_COUNT
    }

    /// Where an input's slot starts within the concatenated buffer.
    pub const fn offset(&self, kind: crate::inputs::InputKind) -> usize {
        self.slot_size * kind.index()
    }

    /// The byte range of an input's slot within the concatenated buffer.
    pub const fn range(&self, kind: crate::inputs::InputKind) -> std::ops::Range<usize> {
        let start = self.offset(kind);
        start..start + self.slot_size
    }
}

/// Everything the device has to allocate for one denoise run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct AllocationPlan {
    /// The resolution the denoiser is set up for.
    pub resolution: Resolution,
    /// Denoiser state in bytes.
    pub state: usize,
    /// Denoiser scratch memory in bytes.
    pub scratch: usize,
    /// The HDR intensity value in bytes.
    pub intensity: usize,
    /// The concatenated input buffer in bytes.
    pub pixels: usize,
    /// The denoised output in bytes.
    pub output: usize,
}

impl AllocationPlan {
    /// Combine the denoiser's own requirements with our buffer layout.
    pub const fn new(layout: &BufferLayout, sizes: &crate::device::MemoryResources) -> Self {
        Self {
            resolution: layout.resolution,
            state: sizes.state,
            scratch: sizes.scratch,
            intensity: size_of::<f32>(),
            pixels: layout.pixel_buffer_size(),
            output: layout.slot_size,
        }
    }

    /// The total device memory needed by the denoiser algorithm.
    pub const fn total(&self) -> usize {
        self.state + self.scratch + self.pixels
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::inputs::InputKind;

    #[test]
    fn slots_are_contiguous_and_in_order() {
        let layout = BufferLayout::new(Resolution {
            width: 512,
            height: 512,
        })
        .unwrap();
        assert_eq!(layout.slot_size, 6 * 512 * 512);
        assert_eq!(layout.pixel_buffer_size(), 3 * 6 * 512 * 512);
        assert_eq!(layout.offset(InputKind::Albedo), 0);
        assert_eq!(layout.offset(InputKind::Color), layout.slot_size);
        assert_eq!(layout.offset(InputKind::Normal), 2 * layout.slot_size);
        assert_eq!(
            layout.range(InputKind::Normal).end,
            layout.pixel_buffer_size()
        );
    }

    #[test]
    fn zero_sized_inputs_are_rejected() {
        let result = BufferLayout::new(Resolution {
            width: 0,
            height: 512,
        });
        assert!(result.is_err());
    }

    #[test]
    fn huge_resolutions_are_rejected() {
        let result = BufferLayout::new(Resolution {
            width: u32::MAX,
            height: u32::MAX,
        });
        assert!(result.unwrap_err().to_string().contains("overflows"));
    }

    #[test]
    fn parse_resolution() {
        let resolution: Resolution = "1920x1080".parse().unwrap();
        assert_eq!(
            resolution,
            Resolution {
                width: 1920,
                height: 1080
            }
        );
        assert_eq!(resolution.to_string(), "1920x1080");
        assert!("1920".parse::<Resolution>().is_err());
        assert!("ax1".parse::<Resolution>().is_err());
    }

    #[test]
    fn allocation_total() {
        let layout = BufferLayout::new(Resolution {
            width: 2,
            height: 2,
        })
        .unwrap();
        let sizes = crate::device::MemoryResources {
            state: 100,
            scratch: 50,
        };
        let plan = AllocationPlan::new(&layout, &sizes);
        assert_eq!(plan.pixels, 72);
        assert_eq!(plan.output, 24);
        assert_eq!(plan.intensity, 4);
        assert_eq!(plan.total(), 100 + 50 + 72);
    }
}
