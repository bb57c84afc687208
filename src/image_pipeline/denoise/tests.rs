use super::*;
use crate::image_pipeline::experiment::ExperimentMode;
use ndarray::{Array3, Array4, s};

fn noisy(height: usize, width: usize, seed: usize) -> Array2<u16> {
    Array2::from_shape_fn((height, width), |(y, x)| {
        let ramp = 300 + 20 * x as u16;
        let noise = ((y * 31 + x * 17 + seed * 7) % 13) as u16;
        ramp + noise
    })
}

#[test]
fn test_selector_round_trip() {
    for selector in 1..=4u8 {
        let algorithm = DenoiseAlgorithm::try_from(selector).unwrap();
        assert_eq!(algorithm.selector(), selector);
    }
    assert_eq!(DenoiseAlgorithm::default(), DenoiseAlgorithm::Fast);
    assert_eq!("4".parse::<DenoiseAlgorithm>().unwrap(), DenoiseAlgorithm::FastWithSigma);
}

#[test]
fn test_unknown_selector_is_config_error() {
    for selector in [0u8, 5, 42] {
        assert!(matches!(
            DenoiseAlgorithm::try_from(selector),
            Err(PipelineError::ConfigError(_))
        ));
    }
    assert!(matches!(
        "fast".parse::<DenoiseAlgorithm>(),
        Err(PipelineError::ConfigError(_))
    ));
}

#[test]
fn test_variant_parameters() {
    let p = DenoiseAlgorithm::Slow.params(10.0);
    assert!((p.h - 11.5).abs() < 1e-12);
    assert_eq!(p.sigma, 0.0);
    assert!(!p.fast_mode);

    let p = DenoiseAlgorithm::FastWithSigma.params(10.0);
    assert!((p.h - 6.0).abs() < 1e-12);
    assert_eq!(p.sigma, 10.0);
    assert!(p.fast_mode);
    assert_eq!((p.patch_size, p.patch_distance), (5, 6));
}

#[test]
fn test_denoised_image_is_within_range() {
    let image = noisy(10, 12, 0);
    let result = Denoiser::new(DenoiseAlgorithm::Fast)
        .denoise_image(image.view())
        .unwrap();
    assert_eq!(result.image.dim(), (10, 12));
    assert!(result.image.iter().all(|&v| v <= 1023));
    assert_eq!(*result.image.iter().max().unwrap(), 1023);
    assert_eq!(*result.image.iter().min().unwrap(), 0);
    assert!(result.psnr.is_finite());
}

#[test]
fn test_denoising_is_idempotent() {
    let image = noisy(9, 9, 3);
    for selector in 1..=4u8 {
        let denoiser = Denoiser::new(DenoiseAlgorithm::try_from(selector).unwrap());
        let first = denoiser.denoise_image(image.view()).unwrap();
        let second = denoiser.denoise_image(image.view()).unwrap();
        assert_eq!(first.image, second.image);
        assert_eq!(first.psnr.to_bits(), second.psnr.to_bits());
    }
}

#[test]
fn test_single_batch_keeps_order() {
    let mut stack = Array3::<u16>::zeros((3, 8, 8));
    for i in 0..3 {
        stack.index_axis_mut(ndarray::Axis(0), i).assign(&noisy(8, 8, i));
    }
    let batch = ImageBatch::Single(stack.clone());
    let denoiser = Denoiser::new(DenoiseAlgorithm::Fast);

    let result = denoiser.denoise_batch(&batch).unwrap();

    assert_eq!(result.batch.mode(), ExperimentMode::Single);
    assert_eq!(result.fidelity.len(), 3);
    for i in 0..3 {
        let expected = denoiser
            .denoise_image(stack.index_axis(ndarray::Axis(0), i))
            .unwrap();
        let index = PlaneIndex {
            image: i,
            polarization: None,
        };
        assert_eq!(result.batch.plane(index), expected.image.view());
        assert_eq!(result.fidelity[i], Fidelity::Single(expected.psnr));
    }
}

#[test]
fn test_dual_batch_reports_paired_metrics() {
    let mut stack = Array4::<u16>::zeros((2, 6, 6, 2));
    for i in 0..2 {
        stack.slice_mut(s![i, .., .., 0]).assign(&noisy(6, 6, i));
        stack.slice_mut(s![i, .., .., 1]).assign(&noisy(6, 6, i + 10));
    }
    let batch = ImageBatch::DualPolarization(stack.clone());
    let denoiser = Denoiser::new(DenoiseAlgorithm::FastWithSigma);

    let result = denoiser.denoise_batch(&batch).unwrap();

    assert!(result.batch.is_dual_polarization());
    assert_eq!(result.fidelity.len(), 2);
    let minus = denoiser.denoise_image(stack.slice(s![1, .., .., 0])).unwrap();
    let plus = denoiser.denoise_image(stack.slice(s![1, .., .., 1])).unwrap();
    assert_eq!(
        result.fidelity[1],
        Fidelity::Paired {
            minus: minus.psnr,
            plus: plus.psnr
        }
    );
}
