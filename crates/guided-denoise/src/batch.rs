//! Denoise many sets of inputs in one go.

use color_eyre::Result;

/// Denoise the inputs in every directory, saving each result alongside its inputs. A failing
/// directory is logged and skipped, the command only fails once every directory has been tried.
pub fn run(config: &crate::config::Batch) -> Result<()> {
    let total = config.directories.len();
    let mut failures = 0usize;

    for (index, directory) in config.directories.iter().enumerate() {
        tracing::info!(
            "Denoising inputs {}/{total} in: {}",
            index + 1,
            directory.display()
        );
        let job = config
            .shared
            .job(directory, directory.join(&config.output_name));

        match crate::denoise::run_on(config.shared.backend, &job) {
            Ok(report) => {
                tracing::info!("Saved denoised texture to: {}", report.output.display());
            }
            Err(error) => {
                failures += 1;
                tracing::error!("Couldn't denoise {}: {error:?}", directory.display());
            }
        }
    }

    if failures > 0 {
        color_eyre::eyre::bail!("{failures} of {total} input directories failed to denoise");
    }

    tracing::info!("Denoised all {total} input directories");
    Ok(())
}

#[cfg(test)]
mod test {
    use clap::Parser as _;

    use super::*;

    fn batch(arguments: &[&std::path::Path]) -> crate::config::Batch {
        let mut command_line = vec![
            "gdn".to_owned(),
            "batch".to_owned(),
            "--backend".to_owned(),
            "host".to_owned(),
        ];
        command_line.extend(
            arguments
                .iter()
                .map(|path| path.to_string_lossy().into_owned()),
        );
        let crate::config::Commands::Batch(batch) =
            crate::config::Config::parse_from(command_line).command
        else {
            panic!("Expected the `batch` subcommand");
        };
        batch
    }

    #[test]
    fn denoises_every_directory() {
        let first = tempfile::tempdir().unwrap();
        let second = tempfile::tempdir().unwrap();
        crate::inputs::test::write_inputs(first.path(), 4, 2);
        crate::inputs::test::write_inputs(second.path(), 2, 2);

        run(&batch(&[first.path(), second.path()])).unwrap();

        assert!(first.path().join("outputResult.dds").exists());
        assert!(second.path().join("outputResult.dds").exists());
    }

    #[test]
    fn carries_on_past_a_failure() {
        let broken = tempfile::tempdir().unwrap();
        let good = tempfile::tempdir().unwrap();
        crate::inputs::test::write_inputs(good.path(), 2, 2);

        let error = run(&batch(&[broken.path(), good.path()])).unwrap_err();

        assert_eq!(
            error.to_string(),
            "1 of 2 input directories failed to denoise"
        );
        assert!(!broken.path().join("outputResult.dds").exists());
        assert!(good.path().join("outputResult.dds").exists());
    }
}
