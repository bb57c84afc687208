//! ETL stages over Uview acquisitions
//!
//! Each stage reads its input, runs one transformation and persists the
//! result, so stages can be chained across separate invocations through
//! `.npy` snapshots, or run back to back with [`PeemPipeline::run`].


use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use ndarray::Array2;
use tracing::{info, info_span, instrument, warn};

use crate::image_pipeline::aggregate::concatenate;
use crate::image_pipeline::batch::{AssembledBatch, BatchAssembler, ImageBatch, PlaneIndex};
use crate::image_pipeline::common::error::{PipelineError, Result};
use crate::image_pipeline::common::timing::StageTimings;
use crate::image_pipeline::config::{PipelineConfig, validate_input};
use crate::image_pipeline::container::{
    CONTAINER_EXTENSION, ContainerLayout, ContainerWriter, NpzContainerWriter,
};
use crate::image_pipeline::denoise::{DenoiseAlgorithm, Denoiser, Fidelity};
use crate::image_pipeline::experiment::{
    ExperimentMode, UVIEW_EXTENSION, classify_path, file_name_of, has_extension,
};
use crate::image_pipeline::normalize::Normalizer;
use crate::image_pipeline::snapshot::{
    DENOISED_SUFFIX, NORMALIZED_SUFFIX, SNAPSHOT_EXTENSION, read_array, read_snapshot,
    snapshot_path, write_snapshot,
};
use crate::image_pipeline::tiff::{PreviewConfig, StandardTiffWriter, TiffWriter};
use crate::image_pipeline::uview::{ImageReader, UviewReader};

/// What a stage produced.
#[derive(Debug)]
pub struct StageReport {
    pub mode: ExperimentMode,
    /// Number of entries along the image axis of the stage result
    pub images: usize,
    /// Snapshots, containers and previews written, in write order
    pub outputs: Vec<PathBuf>,
    /// Per-image PSNR when the stage denoised
    pub fidelity: Vec<Fidelity>,
    pub timings: StageTimings,
}

impl StageReport {
    fn new(mode: ExperimentMode, images: usize) -> Self {
        Self {
            mode,
            images,
            outputs: Vec::new(),
            fidelity: Vec::new(),
            timings: StageTimings::new(),
        }
    }
}

pub struct PeemPipeline<R: ImageReader, W: TiffWriter> {
    assembler: BatchAssembler<R>,
    writer: W,
    container: Box<dyn ContainerWriter>,
    config: PipelineConfig,
    preview: PreviewConfig,
}

impl PeemPipeline<UviewReader, StandardTiffWriter> {
    pub fn new(config: PipelineConfig) -> Self {
        Self::with_custom(UviewReader, StandardTiffWriter, config)
    }
}

impl<R: ImageReader, W: TiffWriter> PeemPipeline<R, W> {
    pub fn with_custom(reader: R, writer: W, config: PipelineConfig) -> Self {
        Self {
            assembler: BatchAssembler::with_reader(reader),
            writer,
            container: Box::new(NpzContainerWriter),
            config,
            preview: PreviewConfig::default(),
        }
    }

    pub fn with_container_writer(mut self, container: impl ContainerWriter + 'static) -> Self {
        self.container = Box::new(container);
        self
    }

    pub fn with_preview_config(mut self, preview: PreviewConfig) -> Self {
        self.preview = preview;
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn set_config(&mut self, config: PipelineConfig) {
        self.config = config;
    }

    /// Decodes the configured `.dat` file or directory into one batch.
    #[instrument(skip(self), fields(input = %self.config.input_path.display()))]
    pub fn extract(&self) -> Result<AssembledBatch> {
        self.extract_from(&self.config.input_path)
    }

    fn extract_from(&self, path: &Path) -> Result<AssembledBatch> {
        validate_input(path, UVIEW_EXTENSION)?;
        info!("Reading images from {}", path.display());

        let classification = {
            let _span = info_span!("classify").entered();
            classify_path(path)?
        };

        let _span = info_span!("assemble", files = classification.files.len()).entered();
        self.assembler.assemble(&classification)
    }

    /// `.dat` file or directory to `<stem>_den.npy`.
    #[instrument(skip(self), fields(input = %self.config.input_path.display()))]
    pub fn denoise_stage(&self, algorithm: DenoiseAlgorithm) -> Result<StageReport> {
        let mut timings = StageTimings::new();
        let stem = self.stem();

        let assembled = timings.time("extract", || self.extract())?;
        self.ensure_output_dir()?;

        let denoised = timings.time("denoise", || {
            let _span = info_span!("denoise", images = assembled.batch.len()).entered();
            Denoiser::new(algorithm).denoise_batch(&assembled.batch)
        })?;

        let mut report = StageReport::new(assembled.mode, denoised.batch.len());
        let path = snapshot_path(&self.config.output_path, &stem, DENOISED_SUFFIX);
        timings.time("write_snapshot", || {
            let _span = info_span!("write_snapshot").entered();
            write_snapshot(&path, &denoised.batch)
        })?;
        info!("Saved denoised images as {}", path.display());
        report.outputs.push(path);

        if self.config.show_images {
            let previews = timings.time("previews", || {
                self.export_previews(&format!("{}_{}", stem, DENOISED_SUFFIX), &denoised.batch)
            })?;
            report.outputs.extend(previews);
        }

        report.fidelity = denoised.fidelity;
        timings.log_summary("denoise");
        report.timings = timings;
        Ok(report)
    }

    /// `.npy` snapshot to `<stem>_norm.npy`, divided by the first image read
    /// from `reference_path`.
    #[instrument(skip(self), fields(input = %self.config.input_path.display()))]
    pub fn normalize_stage(&self, reference_path: &Path) -> Result<StageReport> {
        let mut timings = StageTimings::new();
        let input = &self.config.input_path;
        validate_input(input, SNAPSHOT_EXTENSION)?;
        if !input.is_file() {
            return Err(PipelineError::path(input, "expected a .npy snapshot file"));
        }
        let stem = self.stem();

        let batch = timings.time("read_snapshot", || {
            let _span = info_span!("read_snapshot").entered();
            read_snapshot(input)
        })?;
        let reference = timings.time("read_reference", || self.reference_image(reference_path))?;
        self.ensure_output_dir()?;

        let normalized = timings.time("normalize", || {
            let _span = info_span!("normalize", images = batch.len()).entered();
            Normalizer::new(reference).normalize_batch(&batch)
        })?;

        let mut report = StageReport::new(normalized.mode(), normalized.len());
        let path = snapshot_path(&self.config.output_path, &stem, NORMALIZED_SUFFIX);
        timings.time("write_snapshot", || write_snapshot(&path, &normalized))?;
        info!("Saved normalized images as {}", path.display());
        report.outputs.push(path);

        if self.config.show_images {
            let previews = timings.time("previews", || {
                self.export_previews(&format!("{}_{}", stem, NORMALIZED_SUFFIX), &normalized)
            })?;
            report.outputs.extend(previews);
        }

        timings.log_summary("normalize");
        report.timings = timings;
        Ok(report)
    }

    /// Directory of `.npy` snapshots, concatenated in file-name order, to a
    /// container named `container_name` in the output directory.
    #[instrument(skip(self), fields(input = %self.config.input_path.display()))]
    pub fn aggregate_stage(&self, container_name: &str) -> Result<StageReport> {
        let mut timings = StageTimings::new();
        let input = &self.config.input_path;
        if !input.is_dir() {
            return Err(PipelineError::path(input, "expected a directory of .npy snapshots"));
        }

        let snapshots = self.list_snapshots(input)?;
        if snapshots.is_empty() {
            return Err(PipelineError::ConfigError(format!(
                "no .npy snapshots in {}",
                input.display()
            )));
        }
        info!("Aggregating {} snapshot(s)", snapshots.len());

        let arrays = timings.time("read_snapshots", || {
            let _span = info_span!("read_snapshots", count = snapshots.len()).entered();
            snapshots.iter().map(|p| read_array(p)).collect::<Result<Vec<_>>>()
        })?;
        let batch = timings.time("concatenate", || {
            concatenate(&arrays).and_then(ImageBatch::from_dyn)
        })?;
        self.ensure_output_dir()?;

        let mut report = StageReport::new(batch.mode(), batch.len());
        let path = self.container_path(container_name);
        let layout = ContainerLayout::plan(&batch, None, None, None);
        timings.time("write_container", || {
            let _span = info_span!("write_container").entered();
            self.container.write(&path, &layout, &[])
        })?;
        report.outputs.push(path);

        timings.log_summary("aggregate");
        report.timings = timings;
        Ok(report)
    }

    /// Extract, denoise and normalize as enabled, then write one container
    /// named after the input.
    ///
    /// # Errors
    ///
    /// * `ConfigError` - normalization is enabled but no reference is given
    #[instrument(skip(self), fields(input = %self.config.input_path.display()))]
    pub fn run(&self, algorithm: DenoiseAlgorithm, reference_path: Option<&Path>) -> Result<StageReport> {
        let mut timings = StageTimings::new();
        let stem = self.stem();

        if self.config.normalize_enabled && reference_path.is_none() {
            return Err(PipelineError::ConfigError(
                "normalization enabled but no normalization image given".to_string(),
            ));
        }

        let assembled = timings.time("extract", || self.extract())?;
        self.ensure_output_dir()?;
        let mut report = StageReport::new(assembled.mode, assembled.batch.len());

        let denoised = if self.config.denoise_enabled {
            let result = timings.time("denoise", || {
                let _span = info_span!("denoise", images = assembled.batch.len()).entered();
                Denoiser::new(algorithm).denoise_batch(&assembled.batch)
            })?;
            report.fidelity = result.fidelity;
            Some(result.batch)
        } else {
            None
        };

        let (normalized, reference) = match reference_path.filter(|_| self.config.normalize_enabled) {
            Some(path) => {
                let reference = timings.time("read_reference", || self.reference_image(path))?;
                let source = denoised.as_ref().unwrap_or(&assembled.batch);
                let batch = timings.time("normalize", || {
                    let _span = info_span!("normalize", images = source.len()).entered();
                    Normalizer::new(reference.clone()).normalize_batch(source)
                })?;
                (Some(batch), Some(reference))
            }
            None => (None, None),
        };

        let path = self.container_path(&stem);
        let layout = ContainerLayout::plan(
            &assembled.batch,
            denoised.as_ref(),
            normalized.as_ref(),
            reference.as_ref().map(|r| r.view()),
        );
        timings.time("write_container", || {
            let _span = info_span!("write_container").entered();
            self.container.write(&path, &layout, &assembled.metadata)
        })?;
        report.outputs.push(path);

        if self.config.show_images {
            let shown = normalized.as_ref().or(denoised.as_ref()).unwrap_or(&assembled.batch);
            let previews = timings.time("previews", || self.export_previews(&stem, shown))?;
            report.outputs.extend(previews);
        }

        timings.log_summary("run");
        report.timings = timings;
        Ok(report)
    }

    /// Writes every plane of `batch` as `previews/<prefix>_<tag>.tiff`.
    pub fn export_previews(&self, prefix: &str, batch: &ImageBatch) -> Result<Vec<PathBuf>> {
        let _span = info_span!("export_previews", planes = batch.plane_indices().len()).entered();
        let dir = self.config.output_path.join(&self.preview.directory);
        std::fs::create_dir_all(&dir)?;

        let mut written = Vec::new();
        for (index, plane) in batch.planes() {
            let path = preview_path(&dir, prefix, index);
            let file = File::create(&path).map_err(|e| {
                PipelineError::OutputWriteError(format!("{}: {}", path.display(), e))
            })?;
            let mut output = BufWriter::new(file);
            self.writer.write_plane(plane, &mut output, &self.preview)?;
            written.push(path);
        }
        info!("Wrote {} preview(s) to {}", written.len(), dir.display());
        Ok(written)
    }

    /// First image of the batch read from `path`.
    fn reference_image(&self, path: &Path) -> Result<Array2<u16>> {
        let assembled = self.extract_from(path)?;
        if assembled.batch.is_dual_polarization() {
            return Err(PipelineError::ConfigError(format!(
                "normalization image {} classifies as {}, expected a single-exposure image",
                path.display(),
                assembled.mode
            )));
        }
        if assembled.batch.len() > 1 {
            warn!(
                "{} normalization images found, using the first one",
                assembled.batch.len()
            );
        }
        let first = PlaneIndex {
            image: 0,
            polarization: None,
        };
        Ok(assembled.batch.plane(first).to_owned())
    }

    fn list_snapshots(&self, dir: &Path) -> Result<Vec<PathBuf>> {
        let mut files = Vec::new();
        for entry in std::fs::read_dir(dir)? {
            let path = entry?.path();
            if path.is_file() && has_extension(&path, SNAPSHOT_EXTENSION) {
                files.push(path);
            }
        }
        files.sort_by_key(|p| file_name_of(p));
        Ok(files)
    }

    fn container_path(&self, name: &str) -> PathBuf {
        let path = self.config.output_path.join(name);
        if has_extension(&path, CONTAINER_EXTENSION) {
            path
        } else {
            self.config
                .output_path
                .join(format!("{}.{}", name, CONTAINER_EXTENSION))
        }
    }

    fn ensure_output_dir(&self) -> Result<()> {
        let out = &self.config.output_path;
        if !out.exists() {
            info!("Creating directory {}", out.display());
            std::fs::create_dir_all(out).map_err(|e| {
                PipelineError::OutputWriteError(format!("{}: {}", out.display(), e))
            })?;
        }
        Ok(())
    }

    /// Directory inputs keep their whole name, e.g. `068_Cu_9.5eV`.
    fn stem(&self) -> String {
        let input = &self.config.input_path;
        let name = if input.is_dir() {
            input.file_name()
        } else {
            input.file_stem()
        };
        name.map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "images".to_string())
    }
}

pub fn preview_path(dir: &Path, prefix: &str, index: PlaneIndex) -> PathBuf {
    dir.join(format!("{}_{}.tiff", prefix, index.tag()))
}
