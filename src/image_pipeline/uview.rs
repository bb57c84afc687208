//! Uview `.dat` reading module
//!
//! This module decodes the Elmitec Uview file format: a fixed binary header
//! region followed by a row-major payload of 16-bit samples.

mod header_parser;
mod reader;
mod uview_reader;
pub mod types;

#[cfg(test)]
pub(crate) mod fixtures;

pub use header_parser::{decode_header, parse_file_header, parse_image_header};
pub use reader::ImageReader;
pub use uview_reader::{UviewReader, decode_pixels};
pub use types::{DecodedImage, FileHeader, ImageHeader, RawImage, UviewHeader, UviewMetadata};
