//! The contract every denoising device fulfils.
//!
//! A device owns its context, stream, denoiser and buffers. Every call is synchronous from the
//! caller's point of view and returns a [`DeviceError`] instead of aborting, so that a caller
//! processing many images can carry on past a bad one.

/// The oldest context API version we accept, encoded as `major * 1000 + minor * 10`.
pub const MIN_API_VERSION: u32 = 3020;

/// Errors from any device call site.
#[derive(Debug, thiserror::Error)]
pub enum DeviceError {
    /// The context reported an API version older than we support.
    #[error("Unsupported context API version {found}, at least {minimum} is required")]
    UnsupportedApiVersion {
        /// The version the context reported.
        found: u32,
        /// The minimum supported version.
        minimum: u32,
    },
    /// A call needed a denoiser before one was created.
    #[error("The denoiser has not been created yet")]
    MissingDenoiser,
    /// A call needed device buffers before they were allocated.
    #[error("Device buffers have not been allocated yet")]
    NotAllocated,
    /// A transfer would have landed outside of its buffer.
    #[error("Transfer of {length} bytes at offset {offset} overflows a {capacity} byte buffer")]
    OutOfBounds {
        /// Where the transfer starts.
        offset: usize,
        /// How many bytes were transferred.
        length: usize,
        /// The size of the destination.
        capacity: usize,
    },
    /// Memory for this resolution can't be addressed.
    #[error("Device memory needed for {0} overflows")]
    SizeOverflow(crate::layout::Resolution),
    /// A value couldn't be represented in the type the device needs.
    #[error("Value out of range for the device: {0}")]
    Conversion(#[from] std::num::TryFromIntError),
    /// Any failure from the CUDA driver.
    #[cfg(feature = "cuda")]
    #[error("CUDA call failed: {0}")]
    Cuda(#[from] cust::error::CudaError),
    /// Any failure from OptiX.
    #[cfg(feature = "cuda")]
    #[error("OptiX call failed: {0}")]
    Optix(String),
}

/// The denoiser model to use.
#[derive(clap::ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize)]
pub enum ModelKind {
    /// For low dynamic range images with colors in `0.0..=1.0`.
    Ldr,
    /// For high dynamic range images.
    #[default]
    Hdr,
}

/// How the denoiser should be configured.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DenoiserSettings {
    /// The model to bind to the denoiser.
    pub model: ModelKind,
    /// Whether an albedo guide layer is provided.
    pub guide_albedo: bool,
    /// Whether a normal guide layer is provided.
    pub guide_normal: bool,
}

impl DenoiserSettings {
    /// Color denoising guided by both albedo and normals.
    pub const fn guided(model: ModelKind) -> Self {
        Self {
            model,
            guide_albedo: true,
            guide_normal: true,
        }
    }
}

/// How much device memory the denoiser itself needs at a given resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MemoryResources {
    /// Persistent denoiser state in bytes.
    pub state: usize,
    /// Scratch memory for an untiled invocation, in bytes.
    pub scratch: usize,
}

/// A device that can run the guided denoiser.
pub trait Device {
    /// A short name for logs and reports.
    fn name(&self) -> &'static str;

    /// The API version of the device's context, encoded as `major * 1000 + minor * 10`.
    fn api_version(&self) -> Result<u32, DeviceError>;

    /// Create the denoiser and bind its model.
    fn create_denoiser(&mut self, settings: &DenoiserSettings) -> Result<(), DeviceError>;

    /// Ask the denoiser how much memory it needs for a resolution.
    fn memory_resources(
        &self,
        resolution: crate::layout::Resolution,
    ) -> Result<MemoryResources, DeviceError>;

    /// Allocate every buffer in the plan and set the denoiser up for its resolution.
    fn allocate(&mut self, plan: &crate::layout::AllocationPlan) -> Result<(), DeviceError>;

    /// Copy bytes from the host into the concatenated input buffer.
    fn upload(&mut self, offset: usize, bytes: &[u8]) -> Result<(), DeviceError>;

    /// Set the HDR intensity used by the next invocation.
    fn set_intensity(&mut self, intensity: f32) -> Result<(), DeviceError>;

    /// Denoise the color slot using the guide slots and return the `HALF3` result.
    fn invoke(&mut self, layout: &crate::layout::BufferLayout) -> Result<Vec<u8>, DeviceError>;
}

/// Check a context API version against [`MIN_API_VERSION`].
pub fn check_api_version(found: u32) -> Result<(), DeviceError> {
    if found < MIN_API_VERSION {
        return Err(DeviceError::UnsupportedApiVersion {
            found,
            minimum: MIN_API_VERSION,
        });
    }
    Ok(())
}

/// Make sure a transfer fits in its destination.
pub fn check_bounds(offset: usize, length: usize, capacity: usize) -> Result<(), DeviceError> {
    match offset.checked_add(length) {
        Some(end) if end <= capacity => Ok(()),
        _ => Err(DeviceError::OutOfBounds {
            offset,
            length,
            capacity,
        }),
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn api_versions() {
        assert!(check_api_version(3020).is_ok());
        assert!(check_api_version(12040).is_ok());
        assert!(matches!(
            check_api_version(3010),
            Err(DeviceError::UnsupportedApiVersion {
                found: 3010,
                minimum: 3020
            })
        ));
    }

    #[test]
    fn bounds() {
        assert!(check_bounds(0, 10, 10).is_ok());
        assert!(check_bounds(5, 6, 10).is_err());
        assert!(check_bounds(usize::MAX, 2, 10).is_err());
    }
}
