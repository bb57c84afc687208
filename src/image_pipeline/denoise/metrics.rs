use ndarray::{Array2, ArrayView2, Zip};

use crate::image_pipeline::common::error::{PipelineError, Result};

/// Data range of the 16-bit sample type, used as the PSNR peak.
const U16_DATA_RANGE: f64 = u16::MAX as f64;

/// Peak signal-to-noise ratio in dB between two images of the same shape.
///
/// Identical images give `f64::INFINITY`.
pub fn peak_signal_noise_ratio(
    reference: ArrayView2<'_, u16>,
    test: ArrayView2<'_, u16>,
) -> Result<f64> {
    if reference.dim() != test.dim() {
        return Err(PipelineError::ShapeMismatchError(format!(
            "cannot compare a {:?} image with a {:?} image",
            reference.dim(),
            test.dim()
        )));
    }
    if reference.is_empty() {
        return Err(PipelineError::ShapeMismatchError(
            "cannot compare empty images".to_string(),
        ));
    }

    let mut squared_error = 0.0;
    Zip::from(&reference).and(&test).for_each(|&a, &b| {
        let diff = f64::from(a) - f64::from(b);
        squared_error += diff * diff;
    });
    let mse = squared_error / reference.len() as f64;

    if mse == 0.0 {
        return Ok(f64::INFINITY);
    }
    Ok(10.0 * (U16_DATA_RANGE * U16_DATA_RANGE / mse).log10())
}

/// Stretches `image` linearly onto `[0, max_value]` and truncates to u16.
/// A flat image maps to zeros.
pub fn rescale_to_range(image: &Array2<f64>, max_value: f64) -> Array2<u16> {
    let (min, max) = image
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
            (lo.min(v), hi.max(v))
        });
    let span = max - min;

    if !span.is_finite() || span <= 0.0 {
        return Array2::zeros(image.dim());
    }

    // `as` truncates toward zero and saturates, which is the cast we want here.
    image.mapv(|v| ((v - min) / span * max_value) as u16)
}
