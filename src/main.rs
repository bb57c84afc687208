use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::{error, info};

use peem_etl_rs::image_pipeline::{
    DenoiseAlgorithm, PeemPipeline, PipelineConfig, PipelineError, StageReport,
};
use peem_etl_rs::logger;

#[derive(Parser, Debug)]
#[command(
    name = "peem-etl",
    version,
    about = "Extract, denoise, normalize and archive PEEM Uview images"
)]
struct Cli {
    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Denoise a .dat file or a directory of .dat files into <stem>_den.npy
    Denoise {
        input: PathBuf,
        #[arg(short, long, default_value = ".")]
        output: PathBuf,
        /// 1 slow, 2 slow with sigma, 3 fast, 4 fast with sigma
        #[arg(short, long, default_value_t = 3, value_parser = clap::value_parser!(u8).range(1..=4))]
        algorithm: u8,
        #[arg(long)]
        show_images: bool,
    },
    /// Normalize a .npy snapshot into <stem>_norm.npy
    Normalize {
        input: PathBuf,
        /// .dat file or directory holding the normalization image
        #[arg(short, long)]
        reference: PathBuf,
        #[arg(short, long, default_value = ".")]
        output: PathBuf,
        #[arg(long)]
        show_images: bool,
    },
    /// Concatenate the .npy snapshots of a directory into one container
    Aggregate {
        input: PathBuf,
        #[arg(short, long, default_value = ".")]
        output: PathBuf,
        /// Container file name
        #[arg(short, long, default_value = "peem_images.npz")]
        name: String,
    },
    /// Extract, denoise, normalize and archive in one pass
    Run {
        input: PathBuf,
        #[arg(short, long, default_value = ".")]
        output: PathBuf,
        #[arg(short, long)]
        reference: Option<PathBuf>,
        #[arg(short, long, default_value_t = 3, value_parser = clap::value_parser!(u8).range(1..=4))]
        algorithm: u8,
        #[arg(long)]
        no_denoise: bool,
        #[arg(long)]
        no_normalize: bool,
        #[arg(long)]
        show_images: bool,
    },
}

fn config(input: &Path, output: &Path, denoise: bool, normalize: bool, show_images: bool) -> Result<PipelineConfig, PipelineError> {
    PipelineConfig::builder()
        .input_path(input)
        .output_path(output)
        .denoise(denoise)
        .normalize(normalize)
        .show_images(show_images)
        .build()
}

fn execute(command: Command) -> anyhow::Result<StageReport> {
    let report = match command {
        Command::Denoise { input, output, algorithm, show_images } => {
            let algorithm = DenoiseAlgorithm::try_from(algorithm)?;
            let pipeline = PeemPipeline::new(config(&input, &output, true, false, show_images)?);
            pipeline
                .denoise_stage(algorithm)
                .with_context(|| format!("denoising {}", input.display()))?
        }
        Command::Normalize { input, reference, output, show_images } => {
            let pipeline = PeemPipeline::new(config(&input, &output, false, true, show_images)?);
            pipeline
                .normalize_stage(&reference)
                .with_context(|| format!("normalizing {}", input.display()))?
        }
        Command::Aggregate { input, output, name } => {
            let pipeline = PeemPipeline::new(config(&input, &output, false, false, false)?);
            pipeline
                .aggregate_stage(&name)
                .with_context(|| format!("aggregating {}", input.display()))?
        }
        Command::Run { input, output, reference, algorithm, no_denoise, no_normalize, show_images } => {
            let algorithm = DenoiseAlgorithm::try_from(algorithm)?;
            let pipeline = PeemPipeline::new(config(&input, &output, !no_denoise, !no_normalize, show_images)?);
            pipeline
                .run(algorithm, reference.as_deref())
                .with_context(|| format!("processing {}", input.display()))?
        }
    };
    Ok(report)
}

fn main() -> ExitCode {
    // Usage errors count as invalid input arguments.
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            return if e.use_stderr() { ExitCode::from(1) } else { ExitCode::SUCCESS };
        }
    };
    logger::init(if cli.verbose { "debug" } else { "info" });

    info!("Starting peem-etl...");

    match execute(cli.command) {
        Ok(report) => {
            info!(
                "Done: {} image(s) in mode {}, {} file(s) written in {:.2} s",
                report.images,
                report.mode,
                report.outputs.len(),
                report.timings.total_duration().as_secs_f64()
            );
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("{:#}", e);
            let code = e
                .downcast_ref::<PipelineError>()
                .map(PipelineError::exit_code)
                .unwrap_or(2);
            ExitCode::from(code)
        }
    }
}
