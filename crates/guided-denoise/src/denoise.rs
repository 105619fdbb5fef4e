//! The main entrypoint for running a denoise.

use color_eyre::{eyre::WrapErr as _, Result};

/// Where each input comes from and where the result goes.
#[derive(Debug, Clone)]
pub struct Job {
    /// Directory containing the inputs.
    pub data_dir: std::path::PathBuf,
    /// File names of the inputs within `data_dir`.
    pub names: crate::inputs::InputSet<String>,
    /// Where to save the denoised texture.
    pub output: std::path::PathBuf,
    /// Which denoiser model to use.
    pub model: crate::device::ModelKind,
    /// If set, the inputs must have exactly this resolution.
    pub resolution: Option<crate::layout::Resolution>,
}

/// A summary of a finished run.
#[derive(Debug, Clone, serde::Serialize)]
pub struct Report {
    /// The name of the device that ran the denoiser.
    pub backend: String,
    /// The API version reported by the device's context.
    pub api_version: u32,
    /// The denoiser model.
    pub model: crate::device::ModelKind,
    /// Everything that was allocated on the device.
    pub allocation: crate::layout::AllocationPlan,
    /// Total device memory used by the denoiser algorithm.
    pub total_device_bytes: usize,
    /// The HDR intensity given to the denoiser.
    pub intensity: f32,
    /// The saved texture.
    pub output: std::path::PathBuf,
}

impl Report {
    /// Save the report as JSON.
    pub fn save(&self, path: &std::path::Path) -> Result<()> {
        tracing::debug!("Saving run report to: {}", path.display());
        let serialised = serde_json::to_string_pretty(self)?;
        std::fs::write(path, serialised)?;
        Ok(())
    }
}

/// Handles a single denoise run on a device.
pub struct Denoise<'device, D: crate::device::Device> {
    /// The device doing the work.
    device: &'device mut D,
    /// What to denoise.
    job: &'device Job,
}

impl<'device, D: crate::device::Device> Denoise<'device, D> {
    /// Instantiate.
    pub fn new(device: &'device mut D, job: &'device Job) -> Self {
        Self { device, job }
    }

    /// Pick the one resolution used both to size the denoiser and the input buffers.
    fn denoise_resolution(
        &self,
        inputs: &crate::inputs::Inputs,
    ) -> Result<crate::layout::Resolution> {
        match self.job.resolution {
            Some(requested) if requested != inputs.resolution => {
                color_eyre::eyre::bail!(
                    "Requested denoise resolution {requested} doesn't match the inputs' {}",
                    inputs.resolution
                );
            }
            _ => Ok(inputs.resolution),
        }
    }

    /// Denoise already loaded inputs and save the result.
    pub fn run(&mut self, inputs: crate::inputs::Inputs) -> Result<Report> {
        let api_version = self.device.api_version()?;
        crate::device::check_api_version(api_version)?;
        tracing::debug!("{} context API version: {api_version}", self.device.name());

        self.device
            .create_denoiser(&crate::device::DenoiserSettings::guided(self.job.model))
            .wrap_err("Couldn't create the color-albedo-normal denoiser")?;

        let resolution = self.denoise_resolution(&inputs)?;
        let sizes = self.device.memory_resources(resolution)?;
        let layout = crate::layout::BufferLayout::new(resolution)?;
        let plan = crate::layout::AllocationPlan::new(&layout, &sizes);
        tracing::info!(
            "Total device memory for the denoiser at {resolution}: {} bytes",
            plan.total()
        );

        self.device.allocate(&plan)?;

        let crate::inputs::Inputs {
            textures,
            output: mut output_texture,
            ..
        } = inputs;
        let intensity = self.upload(&layout, textures)?;
        self.device.set_intensity(intensity)?;

        tracing::info!("Denoising...");
        let start = std::time::Instant::now();
        let denoised = self.device.invoke(&layout)?;
        tracing::info!("...denoised in {:?}", start.elapsed());

        crate::pixels::write_half3(&mut output_texture, &denoised)?;
        output_texture
            .write(&self.job.output)
            .wrap_err_with(|| format!("Couldn't save output: {}", self.job.output.display()))?;

        Ok(Report {
            backend: self.device.name().to_owned(),
            api_version,
            model: self.job.model,
            allocation: plan,
            total_device_bytes: plan.total(),
            intensity,
            output: self.job.output.clone(),
        })
    }

    /// Copy every input into its slot, freeing each texture once it is on the device. Returns the
    /// HDR intensity of the color input.
    fn upload(
        &mut self,
        layout: &crate::layout::BufferLayout,
        textures: crate::inputs::InputSet<crate::dds::Texture>,
    ) -> Result<f32> {
        let mut intensity = 1.0;
        for (kind, texture) in textures.into_ordered() {
            let half3 = crate::pixels::to_half3(&texture)?;
            // Free up RAM
            drop(texture);

            if half3.len() != layout.slot_size {
                color_eyre::eyre::bail!(
                    "The {kind} input packs to {} bytes, but its slot is {} bytes",
                    half3.len(),
                    layout.slot_size
                );
            }

            if kind == crate::inputs::InputKind::Color {
                intensity = crate::intensity::hdr_intensity(&half3);
                tracing::debug!("HDR intensity: {intensity}");
            }

            tracing::debug!(
                "Uploading {kind} input ({} bytes) to offset {}",
                half3.len(),
                layout.offset(kind)
            );
            self.device.upload(layout.offset(kind), &half3)?;
        }
        Ok(intensity)
    }
}

/// Load a job's inputs, open the chosen backend and denoise on it.
///
/// Inputs are loaded before the device is opened so that bad inputs never touch the GPU.
pub fn run_on(backend: crate::config::Backend, job: &Job) -> Result<Report> {
    let inputs = crate::inputs::Inputs::load(&job.data_dir, &job.names)?;
    match backend {
        crate::config::Backend::Host => {
            let mut host = crate::device::host::Host::open();
            let report = Denoise::new(&mut host, job).run(inputs)?;
            Ok(report)
        }
        #[cfg(feature = "cuda")]
        crate::config::Backend::Cuda => {
            let mut cuda = crate::device::cuda::Cuda::open()
                .wrap_err("Couldn't initialise CUDA and OptiX")?;
            let report = Denoise::new(&mut cuda, job).run(inputs)?;
            Ok(report)
        }
        #[cfg(not(feature = "cuda"))]
        crate::config::Backend::Cuda => {
            color_eyre::eyre::bail!(
                "This build doesn't include the CUDA backend, rebuild with `--features cuda`"
            )
        }
    }
}
