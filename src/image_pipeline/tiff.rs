//! TIFF preview module
//!
//! This module writes image planes as 16-bit grayscale TIFF files with optional compression.

mod writer;
mod standard_tiff_writer;
pub mod types;

pub use writer::TiffWriter;
pub use standard_tiff_writer::StandardTiffWriter;
pub use types::{TiffCompression, PreviewConfig, PreviewConfigBuilder};
