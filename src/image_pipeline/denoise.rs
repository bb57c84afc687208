//! Non-local means denoising module
//!
//! Each image plane is denoised independently: the noise level is estimated,
//! the plane is filtered, stretched onto `[0, 1023]` and compared with the
//! input through PSNR.

#[cfg(test)]
mod tests;

mod metrics;
mod nl_means;
mod sigma;

use std::fmt;
use std::str::FromStr;

use ndarray::{Array2, ArrayView2};
use rayon::prelude::*;
use tracing::{debug, info};

use crate::image_pipeline::batch::{ImageBatch, PlaneIndex};
use crate::image_pipeline::common::error::{PipelineError, Result};
use crate::image_pipeline::experiment::Polarization;

pub use metrics::{peak_signal_noise_ratio, rescale_to_range};
pub use nl_means::{NlMeansParams, denoise_nl_means};
pub use sigma::estimate_sigma;

pub const PATCH_SIZE: usize = 5;
pub const PATCH_DISTANCE: usize = 6;
/// Upper bound of the rescaled denoised intensities.
pub const DENOISE_MAX_VALUE: f64 = 1023.0;

/// Algorithm variant, selected on the command line by its number 1-4.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DenoiseAlgorithm {
    /// 1: Gaussian-weighted patches, `h = 1.15 sigma`
    Slow,
    /// 2: Gaussian-weighted patches with the noise level, `h = 0.8 sigma`
    SlowWithSigma,
    /// 3: uniform patches, `h = 0.8 sigma`
    #[default]
    Fast,
    /// 4: uniform patches with the noise level, `h = 0.6 sigma`
    FastWithSigma,
}

impl DenoiseAlgorithm {
    pub fn selector(self) -> u8 {
        match self {
            Self::Slow => 1,
            Self::SlowWithSigma => 2,
            Self::Fast => 3,
            Self::FastWithSigma => 4,
        }
    }

    pub fn h_factor(self) -> f64 {
        match self {
            Self::Slow => 1.15,
            Self::SlowWithSigma | Self::Fast => 0.8,
            Self::FastWithSigma => 0.6,
        }
    }

    pub fn passes_sigma(self) -> bool {
        matches!(self, Self::SlowWithSigma | Self::FastWithSigma)
    }

    pub fn fast_mode(self) -> bool {
        matches!(self, Self::Fast | Self::FastWithSigma)
    }

    /// Filter parameters for an image with estimated noise level `sigma`.
    pub fn params(self, sigma: f64) -> NlMeansParams {
        NlMeansParams {
            patch_size: PATCH_SIZE,
            patch_distance: PATCH_DISTANCE,
            h: self.h_factor() * sigma,
            sigma: if self.passes_sigma() { sigma } else { 0.0 },
            fast_mode: self.fast_mode(),
        }
    }
}

impl TryFrom<u8> for DenoiseAlgorithm {
    type Error = PipelineError;

    fn try_from(selector: u8) -> Result<Self> {
        match selector {
            1 => Ok(Self::Slow),
            2 => Ok(Self::SlowWithSigma),
            3 => Ok(Self::Fast),
            4 => Ok(Self::FastWithSigma),
            other => Err(PipelineError::ConfigError(format!(
                "unknown denoising algorithm {}, expected 1-4",
                other
            ))),
        }
    }
}

impl FromStr for DenoiseAlgorithm {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self> {
        let selector: u8 = s.trim().parse().map_err(|_| {
            PipelineError::ConfigError(format!("unknown denoising algorithm {:?}, expected 1-4", s))
        })?;
        Self::try_from(selector)
    }
}

impl fmt::Display for DenoiseAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Slow => "slow",
            Self::SlowWithSigma => "slow with sigma",
            Self::Fast => "fast",
            Self::FastWithSigma => "fast with sigma",
        };
        write!(f, "{} ({})", self.selector(), name)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DenoiseResult {
    pub image: Array2<u16>,
    pub psnr: f64,
}

/// PSNR of one image index: a single value, or one per polarization plane.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Fidelity {
    Single(f64),
    Paired { minus: f64, plus: f64 },
}

#[derive(Debug, Clone)]
pub struct BatchDenoiseResult {
    pub batch: ImageBatch,
    /// One entry per image index, in batch order
    pub fidelity: Vec<Fidelity>,
}

pub struct Denoiser {
    algorithm: DenoiseAlgorithm,
}

impl Denoiser {
    pub fn new(algorithm: DenoiseAlgorithm) -> Self {
        Self { algorithm }
    }

    pub fn algorithm(&self) -> DenoiseAlgorithm {
        self.algorithm
    }

    pub fn denoise_image(&self, image: ArrayView2<'_, u16>) -> Result<DenoiseResult> {
        let sigma = estimate_sigma(image);
        let params = self.algorithm.params(sigma);
        debug!(sigma, h = params.h, fast = params.fast_mode, "Denoising plane");

        let filtered = denoise_nl_means(image, &params);
        let rescaled = rescale_to_range(&filtered, DENOISE_MAX_VALUE);
        let psnr = peak_signal_noise_ratio(image, rescaled.view())?;

        Ok(DenoiseResult {
            image: rescaled,
            psnr,
        })
    }

    /// Denoises every plane of `batch` in parallel. Output planes and
    /// fidelity entries keep the batch order.
    pub fn denoise_batch(&self, batch: &ImageBatch) -> Result<BatchDenoiseResult> {
        info!(
            "Denoising {} image(s) with algorithm {}",
            batch.len(),
            self.algorithm
        );

        let planes = batch.planes();
        let results: Vec<(PlaneIndex, DenoiseResult)> = planes
            .into_par_iter()
            .map(|(index, plane)| self.denoise_image(plane).map(|r| (index, r)))
            .collect::<Result<_>>()?;

        let mut fidelity = Vec::with_capacity(batch.len());
        let mut images = Vec::with_capacity(results.len());
        let mut pending_minus = None;

        for (index, result) in results {
            match index.polarization {
                None => {
                    info!("PSNR image {:4}: {:.3} dB", index.image, result.psnr);
                    fidelity.push(Fidelity::Single(result.psnr));
                }
                Some(Polarization::Minus) => pending_minus = Some(result.psnr),
                Some(Polarization::Plus) => {
                    let minus = pending_minus.take().unwrap_or(f64::NAN);
                    info!(
                        "PSNR image {:4}: minus {:.3} dB, plus {:.3} dB",
                        index.image, minus, result.psnr
                    );
                    fidelity.push(Fidelity::Paired {
                        minus,
                        plus: result.psnr,
                    });
                }
            }
            images.push(result.image);
        }

        Ok(BatchDenoiseResult {
            batch: batch.with_planes(images)?,
            fidelity,
        })
    }
}
