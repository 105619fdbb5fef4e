//! Defines all the CLI arguments.

use color_eyre::eyre::Result;

/// Where the reference inputs live when no `--data-dir` is given.
pub const DEFAULT_DATA_DIR: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/data");

/// The name of the denoised texture.
pub const DEFAULT_OUTPUT: &str = "outputResult.dds";

/// `Config`
#[derive(clap::Parser, Debug)]
#[clap(author, version)]
#[command(name = "gdn")]
#[command(
    about = "Denoise a rendered image on the GPU, guided by its albedo and normal layers."
)]
pub struct Config {
    #[command(subcommand)]
    /// The subcommand.
    pub command: Commands,
}

/// CLI subcommand.
#[derive(clap::Subcommand, Debug)]
pub enum Commands {
    /// Denoise a single set of inputs.
    Denoise(Denoise),
    /// Denoise many sets of inputs, carrying on past any that fail.
    Batch(Batch),
}

/// Options shared by every command that runs the denoiser.
#[derive(clap::Args, Debug, Clone)]
pub struct Shared {
    /// File name of the albedo guide layer.
    #[arg(long, value_name = "File name", default_value = crate::inputs::DEFAULT_ALBEDO)]
    pub albedo: String,

    /// File name of the noisy color layer.
    #[arg(long, value_name = "File name", default_value = crate::inputs::DEFAULT_COLOR)]
    pub color: String,

    /// File name of the normal guide layer.
    #[arg(long, value_name = "File name", default_value = crate::inputs::DEFAULT_NORMAL)]
    pub normal: String,

    /// Where to run the denoiser.
    #[arg(
        long,
        value_enum,
        value_name = "The device to denoise on",
        default_value_t = Backend::default()
    )]
    pub backend: Backend,

    /// The denoiser model. HDR suits linear renders, LDR suits colors in `0.0..=1.0`.
    #[arg(long, value_enum, value_name = "Model", default_value_t = crate::device::ModelKind::Hdr)]
    pub model: crate::device::ModelKind,

    /// The resolution to set the denoiser up for, as `WIDTHxHEIGHT`. Every input must match it.
    /// Defaults to the inputs' own resolution.
    #[arg(long, value_name = "WIDTHxHEIGHT", value_parser = parse_resolution)]
    pub resolution: Option<crate::layout::Resolution>,
}

impl Shared {
    /// Describe a denoise of the inputs in `data_dir`.
    pub fn job(
        &self,
        data_dir: &std::path::Path,
        output: std::path::PathBuf,
    ) -> crate::denoise::Job {
        crate::denoise::Job {
            data_dir: data_dir.to_path_buf(),
            names: self.names(),
            output,
            model: self.model,
            resolution: self.resolution,
        }
    }

    /// The input file names as a set.
    pub fn names(&self) -> crate::inputs::InputSet<String> {
        crate::inputs::InputSet {
            albedo: self.albedo.clone(),
            color: self.color.clone(),
            normal: self.normal.clone(),
        }
    }
}

/// Arguments to the `denoise` subcommand.
#[derive(clap::Parser, Debug)]
pub struct Denoise {
    /// Directory containing the three input textures.
    #[arg(long, value_name = "Path to the inputs", default_value = DEFAULT_DATA_DIR)]
    pub data_dir: std::path::PathBuf,

    /// Where to save the denoised texture.
    #[arg(long, value_name = "Path to save output to", default_value = DEFAULT_OUTPUT)]
    pub output: std::path::PathBuf,

    /// Save a JSON summary of the run here.
    #[arg(long, value_name = "Path to save the report to")]
    pub report: Option<std::path::PathBuf>,

    /// Options shared with `batch`.
    #[command(flatten)]
    pub shared: Shared,
}

/// Arguments to the `batch` subcommand.
#[derive(clap::Parser, Debug)]
pub struct Batch {
    /// Name of the denoised texture saved inside each directory.
    #[arg(long, value_name = "File name", default_value = DEFAULT_OUTPUT)]
    pub output_name: String,

    /// Options shared with `denoise`.
    #[command(flatten)]
    pub shared: Shared,

    /// Directories, each containing one set of inputs.
    #[arg(value_name = "Input directories", required = true)]
    pub directories: Vec<std::path::PathBuf>,
}

/// Parse a `WIDTHxHEIGHT` resolution.
fn parse_resolution(string: &str) -> Result<crate::layout::Resolution> {
    string.parse()
}

/// Where to run the denoiser.
#[derive(clap::ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum Backend {
    /// Emulate the device in host memory. The color layer is passed through untouched, useful for
    /// checking inputs and the pipeline without a GPU.
    Host,
    /// NVIDIA's OptiX AI denoiser on a CUDA device. Only available when built with the `cuda`
    /// feature.
    Cuda,
}

impl Default for Backend {
    fn default() -> Self {
        if cfg!(feature = "cuda") {
            Self::Cuda
        } else {
            Self::Host
        }
    }
}
