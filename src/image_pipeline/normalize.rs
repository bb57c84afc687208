//! Flat-field normalization against a reference image


use ndarray::{Array2, ArrayView2, Zip};
use rayon::prelude::*;
use tracing::info;

use crate::image_pipeline::batch::ImageBatch;
use crate::image_pipeline::common::error::{PipelineError, Result};

/// Scale applied to single-exposure flat-field ratios.
pub const NORMALIZATION_SCALE: f64 = 1023.0;

pub struct Normalizer {
    reference: Array2<u16>,
}

impl Normalizer {
    pub fn new(reference: Array2<u16>) -> Self {
        Self { reference }
    }

    pub fn reference(&self) -> ArrayView2<'_, u16> {
        self.reference.view()
    }

    /// Element-wise `image / reference * scale`, truncated and saturated to u16.
    ///
    /// Division by a zero reference pixel saturates to `u16::MAX`, or gives 0
    /// when the image pixel is also 0.
    pub fn normalize_image(&self, image: ArrayView2<'_, u16>, scale: f64) -> Result<Array2<u16>> {
        if image.dim() != self.reference.dim() {
            return Err(PipelineError::ShapeMismatchError(format!(
                "image is {:?} but the normalization reference is {:?}",
                image.dim(),
                self.reference.dim()
            )));
        }

        Ok(Zip::from(&image)
            .and(&self.reference)
            .map_collect(|&value, &reference| {
                (f64::from(value) / f64::from(reference) * scale) as u16
            }))
    }

    /// Normalizes every plane of `batch`. Single-exposure planes are scaled by
    /// [`NORMALIZATION_SCALE`]; polarization planes are divided unscaled.
    pub fn normalize_batch(&self, batch: &ImageBatch) -> Result<ImageBatch> {
        let scale = if batch.is_dual_polarization() {
            1.0
        } else {
            NORMALIZATION_SCALE
        };
        info!(
            "Normalizing {} image(s) in mode {} with scale {}",
            batch.len(),
            batch.mode(),
            scale
        );

        let planes: Vec<Array2<u16>> = batch
            .planes()
            .into_par_iter()
            .map(|(_, plane)| self.normalize_image(plane, scale))
            .collect::<Result<_>>()?;

        batch.with_planes(planes)
    }
}
