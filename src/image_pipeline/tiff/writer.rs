use std::io::Write;

use ndarray::ArrayView2;

use crate::image_pipeline::common::error::Result;
use crate::image_pipeline::tiff::types::PreviewConfig;

pub trait TiffWriter {
    /// Encodes one `(height, width)` plane as a 16-bit grayscale TIFF.
    fn write_plane(&self, plane: ArrayView2<'_, u16>, output: &mut dyn Write, config: &PreviewConfig) -> Result<()>;
}
