//! `.npy` snapshots of intermediate batches

use std::path::{Path, PathBuf};

use ndarray::ArrayD;
use ndarray_npy::{read_npy, write_npy};
use tracing::debug;

use crate::image_pipeline::batch::ImageBatch;
use crate::image_pipeline::common::error::{PipelineError, Result};

pub const SNAPSHOT_EXTENSION: &str = "npy";
pub const DENOISED_SUFFIX: &str = "den";
pub const NORMALIZED_SUFFIX: &str = "norm";

/// `<output_dir>/<stem>_<suffix>.npy`
pub fn snapshot_path(output_dir: &Path, stem: &str, suffix: &str) -> PathBuf {
    output_dir.join(format!("{}_{}.{}", stem, suffix, SNAPSHOT_EXTENSION))
}

pub fn write_snapshot(path: &Path, batch: &ImageBatch) -> Result<()> {
    debug!("Writing snapshot {:?} to {}", batch.view_dyn().shape(), path.display());
    write_npy(path, &batch.view_dyn())
        .map_err(|e| PipelineError::OutputWriteError(format!("{}: {}", path.display(), e)))
}

/// Reads any `.npy` array of u16 samples, whatever its rank.
pub fn read_array(path: &Path) -> Result<ArrayD<u16>> {
    read_npy::<_, ArrayD<u16>>(path)
        .map_err(|e| PipelineError::InputReadError(format!("{}: {}", path.display(), e)))
}

pub fn read_snapshot(path: &Path) -> Result<ImageBatch> {
    ImageBatch::from_dyn(read_array(path)?)
}
