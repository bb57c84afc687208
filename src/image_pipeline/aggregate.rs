//! Concatenation of processed batches along the image axis

use ndarray::{ArrayD, ArrayViewD, Axis, concatenate as nd_concatenate};
use tracing::info;

use crate::image_pipeline::common::error::{PipelineError, Result};

/// Stacks `arrays` along axis 0. Every input must share the rank and the
/// trailing dimensions of the first one; their history is not inspected.
pub fn concatenate(arrays: &[ArrayD<u16>]) -> Result<ArrayD<u16>> {
    let first = arrays.first().ok_or_else(|| {
        PipelineError::ConfigError("nothing to aggregate".to_string())
    })?;

    if first.ndim() == 0 {
        return Err(PipelineError::ShapeMismatchError(
            "cannot aggregate zero-dimensional arrays".to_string(),
        ));
    }

    let trailing = &first.shape()[1..];
    for (i, array) in arrays.iter().enumerate().skip(1) {
        if array.ndim() != first.ndim() || &array.shape()[1..] != trailing {
            return Err(PipelineError::ShapeMismatchError(format!(
                "input {} has shape {:?}, expected (_, {:?})",
                i,
                array.shape(),
                trailing
            )));
        }
    }

    let views: Vec<ArrayViewD<'_, u16>> = arrays.iter().map(|a| a.view()).collect();
    let combined = nd_concatenate(Axis(0), &views)
        .map_err(|e| PipelineError::ShapeMismatchError(e.to_string()))?;

    info!(
        "Aggregated {} array(s) into shape {:?}",
        arrays.len(),
        combined.shape()
    );
    Ok(combined)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{Array3, Array4, s};

    fn stack(n: usize, offset: u16) -> ArrayD<u16> {
        Array3::from_shape_fn((n, 2, 3), |(i, y, x)| offset + (i * 100 + y * 10 + x) as u16)
            .into_dyn()
    }

    #[test]
    fn test_concatenation_preserves_content_and_order() {
        let a = stack(2, 0);
        let b = stack(3, 5000);

        let out = concatenate(&[a.clone(), b.clone()]).unwrap();

        assert_eq!(out.shape(), &[5, 2, 3]);
        for i in 0..2 {
            assert_eq!(out.index_axis(Axis(0), i), a.index_axis(Axis(0), i));
        }
        for i in 2..5 {
            assert_eq!(out.index_axis(Axis(0), i), b.index_axis(Axis(0), i - 2));
        }
    }

    #[test]
    fn test_dual_polarization_arrays() {
        let mut a = Array4::<u16>::zeros((1, 2, 2, 2));
        a.slice_mut(s![0, .., .., 1]).fill(9);
        let b = Array4::<u16>::ones((2, 2, 2, 2));

        let out = concatenate(&[a.into_dyn(), b.into_dyn()]).unwrap();

        assert_eq!(out.shape(), &[3, 2, 2, 2]);
        assert_eq!(out[[0, 1, 1, 1]], 9);
        assert_eq!(out[[2, 0, 0, 0]], 1);
    }

    #[test]
    fn test_trailing_dimension_mismatch() {
        let a = stack(1, 0);
        let b = Array3::<u16>::zeros((1, 3, 2)).into_dyn();
        assert!(matches!(
            concatenate(&[a.clone(), b]),
            Err(PipelineError::ShapeMismatchError(_))
        ));

        let c = Array4::<u16>::zeros((1, 2, 3, 2)).into_dyn();
        assert!(matches!(
            concatenate(&[a, c]),
            Err(PipelineError::ShapeMismatchError(_))
        ));
    }

    #[test]
    fn test_empty_input() {
        assert!(matches!(concatenate(&[]), Err(PipelineError::ConfigError(_))));
    }
}
