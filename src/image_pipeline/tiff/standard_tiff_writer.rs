use std::io::Write;

use ndarray::ArrayView2;
use tracing::debug;

use crate::image_pipeline::common::error::{PipelineError, Result};
use crate::image_pipeline::tiff::types::{PreviewConfig, TiffCompression};
use crate::image_pipeline::tiff::writer::TiffWriter;

pub struct StandardTiffWriter;

impl TiffWriter for StandardTiffWriter {
    fn write_plane(&self, plane: ArrayView2<'_, u16>, output: &mut dyn Write, config: &PreviewConfig) -> Result<()> {
        let (height, width) = plane.dim();
        debug!("Encoding TIFF preview: {}x{}", width, height);

        let mut buffer = Vec::new();

        let compression = match config.compression {
            TiffCompression::None => tiff::encoder::Compression::Uncompressed,
            TiffCompression::Lzw => tiff::encoder::Compression::Lzw,
            TiffCompression::DeflateFast => tiff::encoder::Compression::Deflate(tiff::encoder::compression::DeflateLevel::Fast),
            TiffCompression::DeflateBalanced => tiff::encoder::Compression::Deflate(tiff::encoder::compression::DeflateLevel::Balanced),
            TiffCompression::DeflateBest => tiff::encoder::Compression::Deflate(tiff::encoder::compression::DeflateLevel::Best),
        };

        let mut encoder = tiff::encoder::TiffEncoder::new(std::io::Cursor::new(&mut buffer))
            .map_err(|e| PipelineError::EncodeError(e.to_string()))?
            .with_compression(compression);

        if let Some(predictor_val) = config.predictor {
            let predictor = match predictor_val {
                2 => tiff::tags::Predictor::Horizontal,
                _ => tiff::tags::Predictor::None,
            };
            encoder = encoder.with_predictor(predictor);
        }

        // Non-contiguous planes (e.g. one polarization of a dual batch) are copied.
        let samples: Vec<u16> = plane.iter().copied().collect();

        encoder
            .write_image::<tiff::encoder::colortype::Gray16>(width as u32, height as u32, &samples)
            .map_err(|e| PipelineError::EncodeError(e.to_string()))?;

        output.write_all(&buffer)?;

        debug!("TIFF encoding complete");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{Array2, Array4, s};

    #[test]
    fn test_preview_decodes_back() {
        let mut stack = Array4::<u16>::zeros((1, 3, 4, 2));
        stack
            .slice_mut(s![0, .., .., 1])
            .assign(&Array2::from_shape_fn((3, 4), |(y, x)| (y * 4 + x) as u16 * 1000));

        let mut bytes = Vec::new();
        let config = PreviewConfig::builder().compression(TiffCompression::Lzw).build();
        StandardTiffWriter
            .write_plane(stack.slice(s![0, .., .., 1]), &mut bytes, &config)
            .unwrap();

        let mut decoder = tiff::decoder::Decoder::new(std::io::Cursor::new(bytes)).unwrap();
        assert_eq!(decoder.dimensions().unwrap(), (4, 3));
        match decoder.read_image().unwrap() {
            tiff::decoder::DecodingResult::U16(data) => {
                assert_eq!(data.len(), 12);
                assert_eq!(data[5], 5000);
            }
            _ => panic!("expected 16-bit samples"),
        }
    }
}
