//! Archival container output
//!
//! Batches are laid out under fixed dataset paths and handed to a
//! [`ContainerWriter`]. The shipped writer stores the datasets in a `.npz`
//! archive and the per-file header records in a JSON sidecar.


use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use ndarray::{ArrayD, ArrayView2, s};
use ndarray_npy::NpzWriter;
use serde::Serialize;
use tracing::{debug, info};

use crate::image_pipeline::batch::ImageBatch;
use crate::image_pipeline::common::error::{PipelineError, Result};
use crate::image_pipeline::experiment::{ExperimentMode, Polarization, has_extension};
use crate::image_pipeline::uview::UviewMetadata;

pub const CONTAINER_EXTENSION: &str = "npz";

const RAW_GROUP: &str = "entry/instrument/detector";
const DATA_GROUP: &str = "entry/data";

/// One named dataset of the container.
#[derive(Debug, Clone, PartialEq)]
pub struct ContainerEntry {
    pub path: String,
    pub data: ArrayD<u16>,
}

/// Ordered datasets of one container, raw images first.
#[derive(Debug, Clone)]
pub struct ContainerLayout {
    pub mode: ExperimentMode,
    pub entries: Vec<ContainerEntry>,
}

impl ContainerLayout {
    /// Raw images go under `entry/instrument/detector`, processed images and the
    /// normalization reference under `entry/data`. Dual-polarization batches are
    /// split into `_plus` and `_minus` datasets.
    pub fn plan(
        raw: &ImageBatch,
        denoised: Option<&ImageBatch>,
        normalized: Option<&ImageBatch>,
        reference: Option<ArrayView2<'_, u16>>,
    ) -> Self {
        let mut entries = Vec::new();

        push_batch(&mut entries, RAW_GROUP, "images", raw);
        if let Some(batch) = denoised {
            push_batch(&mut entries, DATA_GROUP, "denoised_images", batch);
        }
        if let Some(batch) = normalized {
            push_batch(&mut entries, DATA_GROUP, "normalized_images", batch);
        }
        if let Some(image) = reference {
            entries.push(ContainerEntry {
                path: format!("{}/normalization_image", DATA_GROUP),
                data: image.to_owned().into_dyn(),
            });
        }

        Self {
            mode: raw.mode(),
            entries,
        }
    }

    pub fn paths(&self) -> Vec<&str> {
        self.entries.iter().map(|e| e.path.as_str()).collect()
    }

    pub fn get(&self, path: &str) -> Option<&ArrayD<u16>> {
        self.entries.iter().find(|e| e.path == path).map(|e| &e.data)
    }
}

fn push_batch(entries: &mut Vec<ContainerEntry>, group: &str, name: &str, batch: &ImageBatch) {
    match batch {
        ImageBatch::Single(array) => entries.push(ContainerEntry {
            path: format!("{}/{}", group, name),
            data: array.clone().into_dyn(),
        }),
        ImageBatch::DualPolarization(array) => {
            for polarization in [Polarization::Plus, Polarization::Minus] {
                entries.push(ContainerEntry {
                    path: format!("{}/{}_{}", group, name, polarization.suffix()),
                    data: array
                        .slice(s![.., .., .., polarization.plane()])
                        .to_owned()
                        .into_dyn(),
                });
            }
        }
    }
}

pub trait ContainerWriter {
    /// Writes `layout` to `path`, replacing any existing container.
    fn write(&self, path: &Path, layout: &ContainerLayout, metadata: &[UviewMetadata]) -> Result<()>;
}

#[derive(Debug, Serialize)]
struct DatasetManifest<'a> {
    path: &'a str,
    shape: &'a [usize],
}

#[derive(Debug, Serialize)]
struct ContainerManifest<'a> {
    mode: &'a str,
    datasets: Vec<DatasetManifest<'a>>,
    images: &'a [UviewMetadata],
}

/// Writes containers as uncompressed `.npz` archives whose members are named
/// after the dataset paths, e.g. `entry/data/denoised_images.npy`.
pub struct NpzContainerWriter;

impl NpzContainerWriter {
    /// `<container name without .npz>.metadata.json` next to the container.
    pub fn metadata_path(container: &Path) -> PathBuf {
        let name = if has_extension(container, CONTAINER_EXTENSION) {
            container.file_stem()
        } else {
            container.file_name()
        };
        let name = name.map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();
        container.with_file_name(format!("{}.metadata.json", name))
    }
}

impl ContainerWriter for NpzContainerWriter {
    fn write(&self, path: &Path, layout: &ContainerLayout, metadata: &[UviewMetadata]) -> Result<()> {
        if path.exists() {
            debug!("Replacing existing container {}", path.display());
            std::fs::remove_file(path)?;
        }

        let file = File::create(path)
            .map_err(|e| PipelineError::OutputWriteError(format!("{}: {}", path.display(), e)))?;
        let mut npz = NpzWriter::new(file);
        for entry in &layout.entries {
            debug!("Adding dataset {} {:?}", entry.path, entry.data.shape());
            npz.add_array(format!("{}.npy", entry.path), &entry.data)
                .map_err(|e| PipelineError::OutputWriteError(format!("{}: {}", entry.path, e)))?;
        }
        npz.finish()
            .map_err(|e| PipelineError::OutputWriteError(format!("{}: {}", path.display(), e)))?;

        let manifest = ContainerManifest {
            mode: layout.mode.label(),
            datasets: layout
                .entries
                .iter()
                .map(|e| DatasetManifest {
                    path: &e.path,
                    shape: e.data.shape(),
                })
                .collect(),
            images: metadata,
        };
        let metadata_path = Self::metadata_path(path);
        let sidecar = File::create(&metadata_path).map_err(|e| {
            PipelineError::OutputWriteError(format!("{}: {}", metadata_path.display(), e))
        })?;
        serde_json::to_writer_pretty(BufWriter::new(sidecar), &manifest)
            .map_err(|e| PipelineError::OutputWriteError(e.to_string()))?;

        info!(
            "Container written: {} ({} datasets, {} image records)",
            path.display(),
            layout.entries.len(),
            metadata.len()
        );
        Ok(())
    }
}
