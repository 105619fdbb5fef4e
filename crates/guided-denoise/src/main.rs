//! Guided Denoiser

#![expect(clippy::pub_use, reason = "I admit I don't understand the other way.")]

use clap::Parser as _;
use color_eyre::eyre::Result;
use tracing_subscriber::{layer::SubscriberExt as _, util::SubscriberInitExt as _, Layer as _};

/// Exit code when the device's context API is older than we support.
const UNSUPPORTED_API_EXIT_CODE: u8 = 1;

/// Exit code for every other failure.
const FAILURE_EXIT_CODE: u8 = 2;

mod batch;
mod config;
/// The `.dds` texture container that inputs and outputs are stored in.
mod dds {
    pub mod header;
    pub use header::{Header, PixelFormat, Texture};
    pub mod read;
    pub mod write;
}
mod denoise;
/// Devices that can run the denoiser.
mod device {
    pub mod backend;
    pub use backend::{
        check_api_version, DenoiserSettings, Device, DeviceError, MemoryResources, ModelKind,
    };
    #[cfg(feature = "cuda")]
    pub mod cuda;
    pub mod host;
}
mod inputs;
mod intensity;
mod layout;
mod pixels;

fn main() -> Result<std::process::ExitCode> {
    color_eyre::install()?;
    setup_logging()?;
    let config = crate::config::Config::parse();
    tracing::info!("Initialising with config: {config:?}",);

    let result = match &config.command {
        config::Commands::Denoise(denoise_config) => denoise(denoise_config),
        config::Commands::Batch(batch_config) => crate::batch::run(batch_config),
    };

    match result {
        Ok(()) => Ok(std::process::ExitCode::SUCCESS),
        Err(error) => {
            let code = failure_exit_code(&error);
            if code == UNSUPPORTED_API_EXIT_CODE {
                tracing::error!("{error}");
            } else {
                eprintln!("Error: {error:?}");
            }
            Ok(std::process::ExitCode::from(code))
        }
    }
}

/// Setup logging.
fn setup_logging() -> Result<()> {
    let filters = tracing_subscriber::EnvFilter::builder()
        .with_default_directive("guided_denoise=info".parse()?)
        .from_env_lossy();
    let filter_layer = tracing_subscriber::fmt::layer().with_filter(filters);
    let tracing_setup = tracing_subscriber::registry().with(filter_layer);
    tracing_setup.init();

    Ok(())
}

/// Denoise a single set of inputs.
fn denoise(config: &config::Denoise) -> Result<()> {
    let job = config.shared.job(&config.data_dir, config.output.clone());
    let report = crate::denoise::run_on(config.shared.backend, &job)?;
    tracing::info!("Saved denoised texture to: {}", report.output.display());

    if let Some(path) = &config.report {
        report.save(path)?;
    }

    Ok(())
}

/// The process exit code for a failed run.
fn failure_exit_code(error: &color_eyre::Report) -> u8 {
    if is_unsupported_api_version(error) {
        UNSUPPORTED_API_EXIT_CODE
    } else {
        FAILURE_EXIT_CODE
    }
}

/// Whether the run stopped because the device's API is too old.
fn is_unsupported_api_version(error: &color_eyre::Report) -> bool {
    matches!(
        error.downcast_ref::<crate::device::DeviceError>(),
        Some(crate::device::DeviceError::UnsupportedApiVersion { .. })
    )
}
