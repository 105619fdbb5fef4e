//! A device that lives entirely in host memory.
//!
//! It honours the same contract as a GPU device. The denoiser must exist before it is sized,
//! buffers must be allocated before they're written to, and every transfer is bounds checked. Its
//! "denoiser" just passes the color layer through, so it is useful for dry runs of the pipeline
//! on machines without a GPU, and for tests.

use super::backend::{check_bounds, DenoiserSettings, DeviceError, MemoryResources};

/// The API version the host device reports, mimicking a CUDA 12.0 driver.
pub const HOST_API_VERSION: u32 = 12000;

/// A record of a single host-to-device copy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transfer {
    /// Where in the concatenated input buffer the copy started.
    pub offset: usize,
    /// How many bytes were copied.
    pub length: usize,
}

/// Buffers that a GPU would hold in device memory.
#[derive(Debug, Default)]
struct Buffers {
    /// Denoiser state.
    state: Vec<u8>,
    /// Denoiser scratch memory.
    scratch: Vec<u8>,
    /// HDR intensity.
    intensity: f32,
    /// The concatenated inputs.
    pixels: Vec<u8>,
    /// The denoised output.
    output: Vec<u8>,
}

/// The host device.
#[derive(Debug)]
pub struct Host {
    /// The API version to report.
    api_version: u32,
    /// The configured denoiser, once created.
    denoiser: Option<DenoiserSettings>,
    /// The allocated buffers.
    buffers: Option<Buffers>,
    /// Every upload, in order.
    pub transfers: Vec<Transfer>,
}

impl Host {
    /// Open the host device.
    pub fn open() -> Self {
        Self::with_api_version(HOST_API_VERSION)
    }

    /// Open the host device, reporting a specific API version.
    pub fn with_api_version(api_version: u32) -> Self {
        tracing::debug!("Opening host device reporting API version {api_version}");
        Self {
            api_version,
            denoiser: None,
            buffers: None,
            transfers: Vec::new(),
        }
    }

    /// Whether a denoiser has been created.
    #[cfg(test)]
    pub const fn has_denoiser(&self) -> bool {
        self.denoiser.is_some()
    }

    /// Whether any buffers have been allocated.
    #[cfg(test)]
    pub const fn is_allocated(&self) -> bool {
        self.buffers.is_some()
    }

    /// The last HDR intensity that was set.
    #[cfg(test)]
    pub fn intensity(&self) -> Option<f32> {
        self.buffers.as_ref().map(|buffers| buffers.intensity)
    }

    /// The total number of bytes allocated.
    pub fn allocated_bytes(&self) -> usize {
        self.buffers.as_ref().map_or(0, |buffers| {
            buffers.state.len()
                + buffers.scratch.len()
                + size_of::<f32>()
                + buffers.pixels.len()
                + buffers.output.len()
        })
    }
}

impl super::Device for Host {
    fn name(&self) -> &'static str {
        "host"
    }

    fn api_version(&self) -> Result<u32, DeviceError> {
        Ok(self.api_version)
    }

    fn create_denoiser(&mut self, settings: &DenoiserSettings) -> Result<(), DeviceError> {
        tracing::debug!(
            "Creating host denoiser: {:?} model, albedo guide: {}, normal guide: {}",
            settings.model,
            settings.guide_albedo,
            settings.guide_normal
        );
        self.denoiser = Some(*settings);
        Ok(())
    }

    fn memory_resources(
        &self,
        resolution: crate::layout::Resolution,
    ) -> Result<MemoryResources, DeviceError> {
        if self.denoiser.is_none() {
            return Err(DeviceError::MissingDenoiser);
        }
        // One `f32` of state per pixel and room for one `HALF3` copy of the image as scratch.
        let overflow = || DeviceError::SizeOverflow(resolution);
        let area = usize::try_from(resolution.width)?
            .checked_mul(usize::try_from(resolution.height)?)
            .ok_or_else(overflow)?;
        Ok(MemoryResources {
            state: area.checked_mul(size_of::<f32>()).ok_or_else(overflow)?,
            scratch: area
                .checked_mul(crate::layout::PIXEL_STRIDE)
                .ok_or_else(overflow)?,
        })
    }

    fn allocate(&mut self, plan: &crate::layout::AllocationPlan) -> Result<(), DeviceError> {
        if self.denoiser.is_none() {
            return Err(DeviceError::MissingDenoiser);
        }
        self.buffers = Some(Buffers {
            state: vec![0; plan.state],
            scratch: vec![0; plan.scratch],
            intensity: 0.0,
            pixels: vec![0; plan.pixels],
            output: vec![0; plan.output],
        });
        tracing::debug!("Host device allocated {} bytes", self.allocated_bytes());
        Ok(())
    }

    fn upload(&mut self, offset: usize, bytes: &[u8]) -> Result<(), DeviceError> {
        let buffers = self.buffers.as_mut().ok_or(DeviceError::NotAllocated)?;
        check_bounds(offset, bytes.len(), buffers.pixels.len())?;
        if let Some(destination) = buffers.pixels.get_mut(offset..offset + bytes.len()) {
            destination.copy_from_slice(bytes);
        }
        self.transfers.push(Transfer {
            offset,
            length: bytes.len(),
        });
        Ok(())
    }

    fn set_intensity(&mut self, intensity: f32) -> Result<(), DeviceError> {
        let buffers = self.buffers.as_mut().ok_or(DeviceError::NotAllocated)?;
        buffers.intensity = intensity;
        Ok(())
    }

    fn invoke(&mut self, layout: &crate::layout::BufferLayout) -> Result<Vec<u8>, DeviceError> {
        let Some(settings) = self.denoiser else {
            return Err(DeviceError::MissingDenoiser);
        };
        let buffers = self.buffers.as_mut().ok_or(DeviceError::NotAllocated)?;
        tracing::debug!(
            "Host denoiser ({:?}, intensity {}) passing color through after {} uploads",
            settings.model,
            buffers.intensity,
            self.transfers.len()
        );

        let color = layout.range(crate::inputs::InputKind::Color);
        check_bounds(color.start, layout.slot_size, buffers.pixels.len())?;
        check_bounds(0, layout.slot_size, buffers.output.len())?;
        if let (Some(source), Some(destination)) = (
            buffers.pixels.get(color),
            buffers.output.get_mut(..layout.slot_size),
        ) {
            destination.copy_from_slice(source);
        }

        Ok(buffers.output.clone())
    }
}
