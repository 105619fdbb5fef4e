//! The real thing: a CUDA context running NVIDIA's OptiX AI denoiser.

use cust::context::legacy::Context;
use cust::context::{CacheConfig, ContextFlags, CurrentContext};
use cust::device::DeviceAttribute;
use cust::memory::{CopyDestination as _, DeviceBox, DeviceBuffer, DeviceSlice};
use cust::stream::{Stream, StreamFlags};
use optix::context::DeviceContext;
use optix::denoiser::{
    Denoiser, DenoiserGuideImages, DenoiserModelKind, DenoiserOptions, DenoiserParams, Image,
    ImageFormat,
};

use super::backend::{check_bounds, DenoiserSettings, DeviceError, MemoryResources};

/// Devices are always opened on the first ordinal.
const DEVICE_ORDINAL: u32 = 0;

/// The verbosity of the OptiX context's log callback: fatal, errors, warnings and prints.
const LOG_LEVEL: u32 = 3;

/// Device buffers that we manage ourselves. The denoiser state and scratch memory are owned by
/// the OptiX denoiser once it has been set up.
struct Buffers {
    /// A single `f32`.
    intensity: DeviceBox<f32>,
    /// The concatenated inputs.
    pixels: DeviceBuffer<u8>,
    /// The denoised color layer.
    output: DeviceBuffer<u8>,
}

/// A CUDA device with an OptiX context.
///
/// Field order matters: fields are dropped top to bottom, and everything depends on the CUDA
/// context being alive.
pub struct Cuda {
    /// Our device buffers.
    buffers: Option<Buffers>,
    /// The denoiser, once created.
    denoiser: Option<Denoiser>,
    /// The OptiX context bound to the CUDA context.
    optix: DeviceContext,
    /// The stream that invocations are queued on.
    stream: Stream,
    /// The CUDA context.
    context: Context,
}

/// OptiX's errors don't convert into ours automatically.
#[expect(clippy::needless_pass_by_value, reason = "Used with `map_err`")]
fn optix_error(error: optix::error::Error) -> DeviceError {
    DeviceError::Optix(format!("{error:?}"))
}

/// One input's slot within the concatenated pixel buffer.
fn slot(
    pixels: &DeviceBuffer<u8>,
    offset: usize,
    length: usize,
) -> Result<DeviceSlice<u8>, DeviceError> {
    check_bounds(offset, length, pixels.len())?;
    Ok(pixels.index(offset..offset + length))
}

/// Log the driver version and what every visible device can do.
fn log_system_information() -> Result<(), DeviceError> {
    let driver = cust::CudaApiVersion::get()?;
    tracing::debug!("CUDA driver version: {}.{}", driver.major(), driver.minor());
    tracing::debug!("CUDA devices: {}", cust::device::Device::num_devices()?);

    for (ordinal, device) in cust::device::Device::devices()?.enumerate() {
        let device = device?;
        tracing::debug!(
            "Device {ordinal}: {}, compute capability {}.{}, {} multiprocessors, {} bytes, \
            can map host memory: {}",
            device.name()?,
            device.get_attribute(DeviceAttribute::ComputeCapabilityMajor)?,
            device.get_attribute(DeviceAttribute::ComputeCapabilityMinor)?,
            device.get_attribute(DeviceAttribute::MultiprocessorCount)?,
            device.total_memory()?,
            device.get_attribute(DeviceAttribute::CanMapHostMemory)? != 0
        );
    }
    Ok(())
}

/// The `tracing` level for an OptiX log level: 1 fatal, 2 error, 3 warning, 4 print.
const fn optix_log_level(level: u32) -> tracing::Level {
    match level {
        1 | 2 => tracing::Level::ERROR,
        3 => tracing::Level::WARN,
        _ => tracing::Level::DEBUG,
    }
}

/// Forward an OptiX log message to `tracing`.
fn log_optix_message(level: u32, tag: &str, message: &str) {
    let level = optix_log_level(level);
    if level == tracing::Level::ERROR {
        tracing::error!("OptiX [{tag}]: {message}");
    } else if level == tracing::Level::WARN {
        tracing::warn!("OptiX [{tag}]: {message}");
    } else {
        tracing::debug!("OptiX [{tag}]: {message}");
    }
}

impl Cuda {
    /// Initialise the driver and OptiX, and create a context and stream on the first device.
    pub fn open() -> Result<Self, DeviceError> {
        cust::init(cust::CudaFlags::empty())?;
        optix::init().map_err(optix_error)?;
        log_system_information()?;

        let device = cust::device::Device::get_device(DEVICE_ORDINAL)?;
        tracing::info!("Using CUDA device: {}", device.name()?);

        let context = Context::create_and_push(
            ContextFlags::SCHED_YIELD | ContextFlags::MAP_HOST | ContextFlags::LMEM_RESIZE_TO_MAX,
            device,
        )?;
        CurrentContext::set_cache_config(CacheConfig::PreferL1)?;

        let stream = Stream::new(StreamFlags::NON_BLOCKING, None)?;

        let mut optix = DeviceContext::new(&context, false).map_err(optix_error)?;
        optix
            .set_log_callback(
                |level, tag, message| log_optix_message(level, tag, message),
                LOG_LEVEL,
            )
            .map_err(optix_error)?;

        Ok(Self {
            buffers: None,
            denoiser: None,
            optix,
            stream,
            context,
        })
    }
}

impl super::Device for Cuda {
    fn name(&self) -> &'static str {
        "cuda"
    }

    fn api_version(&self) -> Result<u32, DeviceError> {
        let version = self.context.get_api_version()?;
        let encoded = version.major() * 1000 + version.minor() * 10;
        Ok(u32::try_from(encoded)?)
    }

    fn create_denoiser(&mut self, settings: &DenoiserSettings) -> Result<(), DeviceError> {
        let kind = match settings.model {
            super::ModelKind::Hdr => DenoiserModelKind::Hdr,
            super::ModelKind::Ldr => DenoiserModelKind::Ldr,
        };
        let mut options = DenoiserOptions::default();
        options.guide_albedo = settings.guide_albedo;
        options.guide_normal = settings.guide_normal;

        let denoiser = Denoiser::new(&self.optix, kind, options).map_err(optix_error)?;
        self.denoiser = Some(denoiser);
        Ok(())
    }

    fn memory_resources(
        &self,
        resolution: crate::layout::Resolution,
    ) -> Result<MemoryResources, DeviceError> {
        let denoiser = self.denoiser.as_ref().ok_or(DeviceError::MissingDenoiser)?;
        let sizes = denoiser
            .required_gpu_memory(resolution.width, resolution.height)
            .map_err(optix_error)?;
        Ok(MemoryResources {
            state: sizes.state_size_in_bytes,
            scratch: sizes.scratch_size_in_bytes_without_overlap,
        })
    }

    fn allocate(&mut self, plan: &crate::layout::AllocationPlan) -> Result<(), DeviceError> {
        let denoiser = self.denoiser.as_mut().ok_or(DeviceError::MissingDenoiser)?;

        // Allocates and sets up the denoiser's state and scratch memory. Sizes come from the same
        // query that built the plan.
        denoiser
            .setup_state(
                &self.stream,
                plan.resolution.width,
                plan.resolution.height,
                false,
            )
            .map_err(optix_error)?;

        // SAFETY: the input slots are filled by uploads before any invocation, and the output is
        // only ever written by the denoiser.
        let (pixels, output) = unsafe {
            (
                DeviceBuffer::<u8>::uninitialized(plan.pixels)?,
                DeviceBuffer::<u8>::uninitialized(plan.output)?,
            )
        };

        self.buffers = Some(Buffers {
            intensity: DeviceBox::new(&0.0f32)?,
            pixels,
            output,
        });
        Ok(())
    }

    fn upload(&mut self, offset: usize, bytes: &[u8]) -> Result<(), DeviceError> {
        let buffers = self.buffers.as_mut().ok_or(DeviceError::NotAllocated)?;
        check_bounds(offset, bytes.len(), buffers.pixels.len())?;
        let mut destination = buffers.pixels.index_mut(offset..offset + bytes.len());
        destination.copy_from(bytes)?;
        Ok(())
    }

    fn set_intensity(&mut self, intensity: f32) -> Result<(), DeviceError> {
        let buffers = self.buffers.as_mut().ok_or(DeviceError::NotAllocated)?;
        buffers.intensity.copy_from(&intensity)?;
        Ok(())
    }

    fn invoke(&mut self, layout: &crate::layout::BufferLayout) -> Result<Vec<u8>, DeviceError> {
        use crate::inputs::InputKind;

        let denoiser = self.denoiser.as_ref().ok_or(DeviceError::MissingDenoiser)?;
        let buffers = self.buffers.as_mut().ok_or(DeviceError::NotAllocated)?;
        let width = layout.resolution.width;
        let height = layout.resolution.height;

        let albedo = slot(
            &buffers.pixels,
            layout.offset(InputKind::Albedo),
            layout.slot_size,
        )?;
        let color = slot(
            &buffers.pixels,
            layout.offset(InputKind::Color),
            layout.slot_size,
        )?;
        let normal = slot(
            &buffers.pixels,
            layout.offset(InputKind::Normal),
            layout.slot_size,
        )?;

        let guides = DenoiserGuideImages {
            albedo: Some(Image::new(&albedo, ImageFormat::Half3, width, height)),
            normal: Some(Image::new(&normal, ImageFormat::Half3, width, height)),
            ..Default::default()
        };
        let input = Image::new(&color, ImageFormat::Half3, width, height);
        let parameters = DenoiserParams {
            hdr_intensity: Some(&buffers.intensity),
            blend_factor: 0.0,
            ..Default::default()
        };

        denoiser
            .invoke(
                &self.stream,
                guides,
                input,
                parameters,
                &mut buffers.output,
            )
            .map_err(optix_error)?;
        self.stream.synchronize()?;

        Ok(buffers.output.as_host_vec()?)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn optix_problems_are_not_hidden() {
        assert_eq!(optix_log_level(1), tracing::Level::ERROR);
        assert_eq!(optix_log_level(2), tracing::Level::ERROR);
        assert_eq!(optix_log_level(3), tracing::Level::WARN);
        assert_eq!(optix_log_level(4), tracing::Level::DEBUG);
    }
}
