//! Uview image reader.
//!
//! Decodes the header regions of a `.dat` file and reinterprets the bytes
//! past them as a `(height, width)` grid of little-endian 16-bit samples.

use ndarray::Array2;
use tracing::debug;

use crate::image_pipeline::common::error::{PipelineError, Result};
use crate::image_pipeline::uview::header_parser::decode_header;
use crate::image_pipeline::uview::reader::ImageReader;
use crate::image_pipeline::uview::types::{DecodedImage, RawImage, UviewHeader};

/// Reader for Elmitec Uview `.dat` files.
pub struct UviewReader;

impl ImageReader for UviewReader {
    /// Decodes a whole Uview file held in memory.
    ///
    /// # Arguments
    ///
    /// * `data` - Complete file contents
    ///
    /// # Returns
    ///
    /// * `Ok(DecodedImage)` - Header fields and the pixel grid
    /// * `Err(PipelineError::FormatError)` - Truncated or malformed header or payload
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use peem_etl_rs::image_pipeline::{ImageReader, UviewReader};
    ///
    /// let bytes = std::fs::read("sample_min_001.dat").unwrap();
    /// let image = UviewReader.read_image(&bytes).unwrap();
    /// println!("{:?}", image.pixels.dim());
    /// ```
    fn read_image(&self, data: &[u8]) -> Result<DecodedImage> {
        debug!("Decoding Uview file, {} bytes", data.len());

        let header = decode_header(data)?;
        let pixels = decode_pixels(data, &header)?;

        debug!(
            "Decoded image: {}x{} at payload offset {}",
            header.width(),
            header.height(),
            header.payload_offset()
        );

        Ok(DecodedImage { header, pixels })
    }
}

/// Reads `width * height` samples starting at the header's payload offset.
pub fn decode_pixels(data: &[u8], header: &UviewHeader) -> Result<RawImage> {
    let offset = header.payload_offset();
    let expected = header.file.payload_len();
    let payload = data.get(offset..).unwrap_or(&[]);

    if payload.len() < expected {
        return Err(PipelineError::FormatError(format!(
            "payload holds {} bytes past offset {}, a {}x{} image needs {}",
            payload.len(),
            offset,
            header.width(),
            header.height(),
            expected
        )));
    }

    if payload.len() > expected {
        debug!("Ignoring {} trailing bytes after payload", payload.len() - expected);
    }

    let samples: Vec<u16> = payload[..expected]
        .chunks_exact(2)
        .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
        .collect();

    Array2::from_shape_vec((header.height(), header.width()), samples)
        .map_err(|e| PipelineError::FormatError(e.to_string()))
}
