//! Image batches and their assembly from decoded Uview files

#[cfg(test)]
mod tests;

use std::path::Path;
use std::time::Instant;

use ndarray::{Array2, Array3, Array4, ArrayD, ArrayView2, ArrayViewD, ArrayViewMut2, Axis, Ix3, Ix4, s};
use tracing::{debug, info, warn};

use crate::image_pipeline::common::error::{PipelineError, Result};
use crate::image_pipeline::experiment::{
    Classification, ExperimentMode, Polarization, file_name_of, polarization_of,
};
use crate::image_pipeline::uview::{DecodedImage, ImageReader, UviewMetadata, UviewReader};

/// A stack of equally sized 16-bit images.
#[derive(Debug, Clone, PartialEq)]
pub enum ImageBatch {
    /// Shape `(N, H, W)`
    Single(Array3<u16>),
    /// Shape `(N, H, W, 2)`; plane 0 is minus, plane 1 is plus polarization
    DualPolarization(Array4<u16>),
}

/// Address of one 2D plane inside a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlaneIndex {
    pub image: usize,
    pub polarization: Option<Polarization>,
}

impl PlaneIndex {
    /// Short tag used in file names, e.g. `0003_minus`.
    pub fn tag(&self) -> String {
        match self.polarization {
            Some(p) => format!("{:04}_{}", self.image, p.suffix()),
            None => format!("{:04}", self.image),
        }
    }
}

impl ImageBatch {
    /// Zero-filled batch for `file_count` files of the given `(height, width)`.
    pub fn zeros(mode: ExperimentMode, file_count: usize, dim: (usize, usize)) -> Self {
        let (height, width) = dim;
        if mode.is_dual_polarization() {
            Self::DualPolarization(Array4::zeros((file_count / 2, height, width, 2)))
        } else {
            Self::Single(Array3::zeros((file_count, height, width)))
        }
    }

    /// Rebuilds a batch from a dynamic-rank array: rank 3 is single-exposure,
    /// rank 4 with a trailing axis of 2 is dual-polarization.
    pub fn from_dyn(array: ArrayD<u16>) -> Result<Self> {
        let shape = array.shape().to_vec();
        match shape.as_slice() {
            [_, _, _] => array
                .into_dimensionality::<Ix3>()
                .map(Self::Single)
                .map_err(|e| PipelineError::ShapeMismatchError(e.to_string())),
            [_, _, _, 2] => array
                .into_dimensionality::<Ix4>()
                .map(Self::DualPolarization)
                .map_err(|e| PipelineError::ShapeMismatchError(e.to_string())),
            _ => Err(PipelineError::ShapeMismatchError(format!(
                "expected an (N, H, W) or (N, H, W, 2) array, got {:?}",
                shape
            ))),
        }
    }

    pub fn into_dyn(self) -> ArrayD<u16> {
        match self {
            Self::Single(a) => a.into_dyn(),
            Self::DualPolarization(a) => a.into_dyn(),
        }
    }

    pub fn view_dyn(&self) -> ArrayViewD<'_, u16> {
        match self {
            Self::Single(a) => a.view().into_dyn(),
            Self::DualPolarization(a) => a.view().into_dyn(),
        }
    }

    pub fn mode(&self) -> ExperimentMode {
        match self {
            Self::Single(_) => ExperimentMode::Single,
            Self::DualPolarization(_) => ExperimentMode::DualPolarization,
        }
    }

    pub fn is_dual_polarization(&self) -> bool {
        matches!(self, Self::DualPolarization(_))
    }

    /// Number of entries along the image axis.
    pub fn len(&self) -> usize {
        match self {
            Self::Single(a) => a.len_of(Axis(0)),
            Self::DualPolarization(a) => a.len_of(Axis(0)),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// `(height, width)` shared by every image.
    pub fn image_dim(&self) -> (usize, usize) {
        match self {
            Self::Single(a) => (a.len_of(Axis(1)), a.len_of(Axis(2))),
            Self::DualPolarization(a) => (a.len_of(Axis(1)), a.len_of(Axis(2))),
        }
    }

    /// Every plane address, image-major, minus before plus.
    pub fn plane_indices(&self) -> Vec<PlaneIndex> {
        match self {
            Self::Single(_) => (0..self.len())
                .map(|image| PlaneIndex {
                    image,
                    polarization: None,
                })
                .collect(),
            Self::DualPolarization(_) => (0..self.len())
                .flat_map(|image| {
                    [Polarization::Minus, Polarization::Plus].map(|p| PlaneIndex {
                        image,
                        polarization: Some(p),
                    })
                })
                .collect(),
        }
    }

    pub fn plane(&self, index: PlaneIndex) -> ArrayView2<'_, u16> {
        match self {
            Self::Single(a) => a.index_axis(Axis(0), index.image),
            Self::DualPolarization(a) => {
                let plane = index.polarization.unwrap_or(Polarization::Minus).plane();
                a.slice(s![index.image, .., .., plane])
            }
        }
    }

    fn plane_mut(&mut self, index: PlaneIndex) -> ArrayViewMut2<'_, u16> {
        match self {
            Self::Single(a) => a.index_axis_mut(Axis(0), index.image),
            Self::DualPolarization(a) => {
                let plane = index.polarization.unwrap_or(Polarization::Minus).plane();
                a.slice_mut(s![index.image, .., .., plane])
            }
        }
    }

    pub fn planes(&self) -> Vec<(PlaneIndex, ArrayView2<'_, u16>)> {
        self.plane_indices()
            .into_iter()
            .map(|index| (index, self.plane(index)))
            .collect()
    }

    /// Same-layout batch whose planes are replaced, in `plane_indices` order.
    pub fn with_planes(&self, planes: Vec<Array2<u16>>) -> Result<Self> {
        let indices = self.plane_indices();
        if planes.len() != indices.len() {
            return Err(PipelineError::ShapeMismatchError(format!(
                "batch has {} planes, got {}",
                indices.len(),
                planes.len()
            )));
        }

        let dim = self.image_dim();
        let mut out = self.clone();
        for (index, plane) in indices.into_iter().zip(planes) {
            if plane.dim() != dim {
                return Err(PipelineError::ShapeMismatchError(format!(
                    "plane {} is {:?}, batch images are {:?}",
                    index.tag(),
                    plane.dim(),
                    dim
                )));
            }
            out.plane_mut(index).assign(&plane);
        }
        Ok(out)
    }
}

#[derive(Debug, Clone)]
pub struct AssembledBatch {
    pub mode: ExperimentMode,
    pub batch: ImageBatch,
    /// Number of files decoded into the batch
    pub images_read: usize,
    /// One record per decoded file, in file-list order
    pub metadata: Vec<UviewMetadata>,
}

/// Decodes a classified file list into one batch.
///
/// Dual-polarization files are placed by independent minus and plus slot
/// counters, so unmatched file counts misalign the pairs rather than fail,
/// until one counter runs past `N/2`.
pub struct BatchAssembler<R: ImageReader> {
    reader: R,
}

impl BatchAssembler<UviewReader> {
    pub fn new() -> Self {
        Self { reader: UviewReader }
    }
}

impl Default for BatchAssembler<UviewReader> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: ImageReader> BatchAssembler<R> {
    pub fn with_reader(reader: R) -> Self {
        Self { reader }
    }

    pub fn assemble(&self, classification: &Classification) -> Result<AssembledBatch> {
        let start = Instant::now();
        let mode = classification.mode;
        let files = &classification.files;
        let file_count = files.len();

        if mode.is_dual_polarization() {
            let minus = classification.count(Polarization::Minus);
            let plus = classification.count(Polarization::Plus);
            if minus != plus {
                warn!(
                    minus,
                    plus, "Different number of images for plus and minus polarizations"
                );
            }
        }

        let mut batch: Option<ImageBatch> = None;
        let mut metadata = Vec::with_capacity(file_count);
        let mut next_minus = 0;
        let mut next_plus = 0;

        for (position, path) in files.iter().enumerate() {
            let name = file_name_of(path);
            if (position + 1) % 50 == 0 || position + 1 == file_count {
                info!("Reading file {:4} of {:4}", position + 1, file_count);
            }

            let decoded = self.read_file(path)?;
            let dim = decoded.pixels.dim();

            if let Some(existing) = &batch {
                if existing.image_dim() != dim {
                    return Err(PipelineError::ShapeMismatchError(format!(
                        "{} is {}x{}, previous images are {}x{}",
                        name,
                        dim.1,
                        dim.0,
                        existing.image_dim().1,
                        existing.image_dim().0
                    )));
                }
            }
            let target = batch.get_or_insert_with(|| ImageBatch::zeros(mode, file_count, dim));

            match target {
                ImageBatch::DualPolarization(array) => {
                    let polarization = polarization_of(&name).ok_or_else(|| {
                        PipelineError::ConfigError(format!(
                            "{} has no polarization token in a dual-polarization set",
                            name
                        ))
                    })?;
                    let slot = match polarization {
                        Polarization::Minus => &mut next_minus,
                        Polarization::Plus => &mut next_plus,
                    };
                    if *slot >= array.len_of(Axis(0)) {
                        return Err(PipelineError::ConfigError(format!(
                            "unpaired polarization files: no {} slot left for {}",
                            polarization.suffix(),
                            name
                        )));
                    }
                    debug!(file = %name, slot = *slot, plane = polarization.plane(), "Storing image");
                    array
                        .slice_mut(s![*slot, .., .., polarization.plane()])
                        .assign(&decoded.pixels);
                    *slot += 1;
                }
                ImageBatch::Single(array) => {
                    array.index_axis_mut(Axis(0), position).assign(&decoded.pixels);
                }
            }

            metadata.push(UviewMetadata::from_header(name, &decoded.header));
        }

        let batch = batch.ok_or_else(|| {
            PipelineError::ConfigError("no Uview images to read".to_string())
        })?;
        let images_read = metadata.len();

        info!(
            "Number of images read    = {:5} in mode: {} in {:5.1} sec",
            images_read,
            mode,
            start.elapsed().as_secs_f64()
        );

        Ok(AssembledBatch {
            mode,
            batch,
            images_read,
            metadata,
        })
    }

    fn read_file(&self, path: &Path) -> Result<DecodedImage> {
        let data = std::fs::read(path).map_err(|e| {
            PipelineError::InputReadError(format!("{}: {}", path.display(), e))
        })?;
        self.reader.read_image(&data).map_err(|e| match e {
            PipelineError::FormatError(msg) => {
                PipelineError::FormatError(format!("{}: {}", path.display(), msg))
            }
            other => other,
        })
    }
}
