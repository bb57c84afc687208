use criterion::{black_box, criterion_group, criterion_main, Criterion, BenchmarkId};
use ndarray::Array2;
use peem_etl_rs::image_pipeline::{
    DenoiseAlgorithm, Denoiser, ImageReader, PreviewConfig, StandardTiffWriter, TiffCompression,
    TiffWriter, UviewReader,
};
use std::io::Cursor;

/// Minimal Uview file: 104-byte file header, 288-byte image header, no
/// markup or LEEM block, then the samples.
fn generate_mock_uview_data(width: u16, height: u16) -> Vec<u8> {
    let mut data = Vec::new();
    data.extend_from_slice(b"UKSOFT2001\0\0\0\0\0\0\0\0\0\0");
    for field in [104u16, 7, 16, 12, 1024] {
        data.extend_from_slice(&field.to_le_bytes());
    }
    data.extend_from_slice(&[1, 1]);
    data.extend_from_slice(&[0; 8]);
    for field in [width, height, 1, 0] {
        data.extend_from_slice(&field.to_le_bytes());
    }
    data.resize(104, 0);
    data.extend_from_slice(&288u16.to_le_bytes());
    data.resize(104 + 288, 0);
    for y in 0..height as usize {
        for x in 0..width as usize {
            let value = (200 + (x * 3 + y * 5) % 400) as u16;
            data.extend_from_slice(&value.to_le_bytes());
        }
    }
    data
}

fn generate_mock_image(size: usize) -> Array2<u16> {
    Array2::from_shape_fn((size, size), |(y, x)| (300 + (x * 7 + y * 13) % 97) as u16)
}

fn benchmark_decode_sizes(c: &mut Criterion) {
    let mut group = c.benchmark_group("decode_by_size");

    let sizes = vec![
        (256, 256, "256x256"),
        (512, 512, "512x512"),
        (1024, 1024, "1024x1024"),
    ];

    for (width, height, label) in sizes {
        let mock_data = generate_mock_uview_data(width, height);

        group.bench_with_input(
            BenchmarkId::from_parameter(label),
            &mock_data,
            |b, data| {
                b.iter(|| {
                    let _ = UviewReader.read_image(black_box(data));
                });
            },
        );
    }

    group.finish();
}

fn benchmark_denoise_algorithms(c: &mut Criterion) {
    let mut group = c.benchmark_group("denoise_algorithms");
    group.sample_size(10);
    let image = generate_mock_image(64);

    for selector in 1..=4u8 {
        let Ok(algorithm) = DenoiseAlgorithm::try_from(selector) else {
            continue;
        };
        group.bench_with_input(
            BenchmarkId::from_parameter(algorithm.selector()),
            &image,
            |b, image| {
                let denoiser = Denoiser::new(algorithm);
                b.iter(|| {
                    let _ = denoiser.denoise_image(black_box(image.view()));
                });
            },
        );
    }

    group.finish();
}

fn benchmark_preview_compression(c: &mut Criterion) {
    let mut group = c.benchmark_group("preview_compression");
    let image = generate_mock_image(512);

    let compressions = vec![
        (TiffCompression::None, "none"),
        (TiffCompression::Lzw, "lzw"),
        (TiffCompression::DeflateFast, "deflate_fast"),
    ];

    for (compression, label) in compressions {
        group.bench_with_input(
            BenchmarkId::from_parameter(label),
            &image,
            |b, image| {
                let config = PreviewConfig::builder()
                    .compression(compression)
                    .build();

                b.iter(|| {
                    let mut output = Cursor::new(Vec::new());
                    let _ = StandardTiffWriter.write_plane(black_box(image.view()), &mut output, &config);
                });
            },
        );
    }

    group.finish();
}

criterion_group!(
    benches,
    benchmark_decode_sizes,
    benchmark_denoise_algorithms,
    benchmark_preview_compression
);
criterion_main!(benches);
