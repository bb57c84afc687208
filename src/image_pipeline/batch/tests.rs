use super::*;
use crate::image_pipeline::experiment::classify;
use crate::image_pipeline::uview::fixtures::UviewFixture;
use std::path::PathBuf;

fn write_all(dir: &Path, files: &[(&str, UviewFixture)]) -> Vec<PathBuf> {
    files
        .iter()
        .map(|(name, fixture)| fixture.write_to(dir, name))
        .collect()
}

#[test]
fn test_single_mode_batch_of_constant_images() {
    let dir = tempfile::tempdir().unwrap();
    let files = write_all(
        dir.path(),
        &[
            ("s1.dat", UviewFixture::constant(4, 4, 100)),
            ("s2.dat", UviewFixture::constant(4, 4, 100)),
            ("s3.dat", UviewFixture::constant(4, 4, 100)),
        ],
    );

    let classification = classify(files).unwrap();
    let assembled = BatchAssembler::new().assemble(&classification).unwrap();

    assert_eq!(assembled.mode, ExperimentMode::Single);
    assert_eq!(assembled.images_read, 3);
    match &assembled.batch {
        ImageBatch::Single(a) => {
            assert_eq!(a.dim(), (3, 4, 4));
            assert!(a.iter().all(|&v| v == 100));
        }
        other => panic!("expected single batch, got {:?}", other.mode()),
    }
    assert_eq!(assembled.metadata.len(), 3);
    assert_eq!(assembled.metadata[0].file_name, "s1.dat");
}

#[test]
fn test_single_mode_preserves_file_order() {
    let dir = tempfile::tempdir().unwrap();
    let files = write_all(
        dir.path(),
        &[
            ("a.dat", UviewFixture::constant(2, 2, 1)),
            ("b.dat", UviewFixture::constant(2, 2, 2)),
            ("c.dat", UviewFixture::constant(2, 2, 3)),
        ],
    );
    let assembled = BatchAssembler::new()
        .assemble(&classify(files).unwrap())
        .unwrap();
    for (i, expected) in [1u16, 2, 3].iter().enumerate() {
        let plane = assembled.batch.plane(PlaneIndex {
            image: i,
            polarization: None,
        });
        assert!(plane.iter().all(|v| v == expected));
    }
}

#[test]
fn test_dual_polarization_pair() {
    let dir = tempfile::tempdir().unwrap();
    let files = write_all(
        dir.path(),
        &[
            ("a_plus.dat", UviewFixture::constant(2, 2, 200)),
            ("a_min.dat", UviewFixture::constant(2, 2, 50)),
        ],
    );

    let assembled = BatchAssembler::new()
        .assemble(&classify(files).unwrap())
        .unwrap();

    assert_eq!(assembled.mode, ExperimentMode::DualPolarization);
    match &assembled.batch {
        ImageBatch::DualPolarization(a) => {
            assert_eq!(a.dim(), (1, 2, 2, 2));
            assert!(a.slice(s![0, .., .., 1]).iter().all(|&v| v == 200));
            assert!(a.slice(s![0, .., .., 0]).iter().all(|&v| v == 50));
        }
        other => panic!("expected dual batch, got {:?}", other.mode()),
    }
}

#[test]
fn test_polarization_slots_advance_independently() {
    let dir = tempfile::tempdir().unwrap();
    let files = write_all(
        dir.path(),
        &[
            ("e1_min.dat", UviewFixture::constant(2, 2, 10)),
            ("e2_min.dat", UviewFixture::constant(2, 2, 20)),
            ("e3_plus.dat", UviewFixture::constant(2, 2, 30)),
            ("e4_plus.dat", UviewFixture::constant(2, 2, 40)),
        ],
    );

    let assembled = BatchAssembler::new()
        .assemble(&classify(files).unwrap())
        .unwrap();

    let value = |image, p| {
        assembled.batch.plane(PlaneIndex {
            image,
            polarization: Some(p),
        })[[0, 0]]
    };
    assert_eq!(value(0, Polarization::Minus), 10);
    assert_eq!(value(1, Polarization::Minus), 20);
    assert_eq!(value(0, Polarization::Plus), 30);
    assert_eq!(value(1, Polarization::Plus), 40);
}

#[test]
fn test_unpaired_polarization_overflow_is_config_error() {
    let dir = tempfile::tempdir().unwrap();
    let files = write_all(
        dir.path(),
        &[
            ("a_min.dat", UviewFixture::constant(2, 2, 1)),
            ("b_min.dat", UviewFixture::constant(2, 2, 1)),
            ("c_plus.dat", UviewFixture::constant(2, 2, 1)),
        ],
    );
    let result = BatchAssembler::new().assemble(&classify(files).unwrap());
    assert!(matches!(result, Err(PipelineError::ConfigError(_))));
}

#[test]
fn test_single_file_with_both_tokens_cannot_fill_a_pair() {
    let dir = tempfile::tempdir().unwrap();
    let files = write_all(dir.path(), &[("x_min_plus.dat", UviewFixture::constant(2, 2, 1))]);
    let classification = classify(files).unwrap();
    assert_eq!(classification.mode, ExperimentMode::DualPolarization);
    let result = BatchAssembler::new().assemble(&classification);
    assert!(matches!(result, Err(PipelineError::ConfigError(_))));
}

#[test]
fn test_geometry_mismatch_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let files = write_all(
        dir.path(),
        &[
            ("a.dat", UviewFixture::constant(4, 4, 1)),
            ("b.dat", UviewFixture::constant(4, 3, 1)),
        ],
    );
    let result = BatchAssembler::new().assemble(&classify(files).unwrap());
    assert!(matches!(result, Err(PipelineError::ShapeMismatchError(_))));
}

#[test]
fn test_truncated_file_aborts_batch() {
    let dir = tempfile::tempdir().unwrap();
    let mut files = write_all(dir.path(), &[("a.dat", UviewFixture::constant(2, 2, 1))]);
    let broken = dir.path().join("b.dat");
    std::fs::write(&broken, &UviewFixture::constant(2, 2, 1).encode()[..50]).unwrap();
    files.push(broken);

    let result = BatchAssembler::new().assemble(&classify(files).unwrap());
    match result {
        Err(PipelineError::FormatError(msg)) => assert!(msg.contains("b.dat")),
        other => panic!("expected format error, got {:?}", other.map(|b| b.images_read)),
    }
}

#[test]
fn test_dyn_round_trip_keeps_layout() {
    let batch = ImageBatch::zeros(ExperimentMode::DualPolarization, 4, (3, 5));
    let restored = ImageBatch::from_dyn(batch.clone().into_dyn()).unwrap();
    assert_eq!(restored, batch);
    assert_eq!(restored.len(), 2);
    assert_eq!(restored.image_dim(), (3, 5));
}

#[test]
fn test_from_dyn_rejects_other_ranks() {
    let flat = ArrayD::<u16>::zeros(ndarray::IxDyn(&[4, 4]));
    assert!(matches!(
        ImageBatch::from_dyn(flat),
        Err(PipelineError::ShapeMismatchError(_))
    ));
    let three_planes = ArrayD::<u16>::zeros(ndarray::IxDyn(&[1, 2, 2, 3]));
    assert!(matches!(
        ImageBatch::from_dyn(three_planes),
        Err(PipelineError::ShapeMismatchError(_))
    ));
}

#[test]
fn test_with_planes_replaces_in_order() {
    let batch = ImageBatch::zeros(ExperimentMode::DualPolarization, 2, (2, 2));
    let planes = vec![Array2::from_elem((2, 2), 5u16), Array2::from_elem((2, 2), 6u16)];
    let out = batch.with_planes(planes).unwrap();
    match out {
        ImageBatch::DualPolarization(a) => {
            assert!(a.slice(s![0, .., .., 0]).iter().all(|&v| v == 5));
            assert!(a.slice(s![0, .., .., 1]).iter().all(|&v| v == 6));
        }
        ImageBatch::Single(_) => panic!("layout changed"),
    }
}
