use winnow::{
    Parser,
    binary::{le_i16, le_u8, le_u16, le_u64},
    error::{ContextError, StrContext},
    token::take,
};

use crate::image_pipeline::common::error::{PipelineError, Result};
use crate::image_pipeline::uview::types::{FileHeader, ImageHeader, UviewHeader};

fn u16_field<'i>(label: &'static str) -> impl Parser<&'i [u8], u16, ContextError> {
    le_u16.context(StrContext::Label(label))
}

fn i16_field<'i>(label: &'static str) -> impl Parser<&'i [u8], i16, ContextError> {
    le_i16.context(StrContext::Label(label))
}

fn u8_field<'i>(label: &'static str) -> impl Parser<&'i [u8], u8, ContextError> {
    le_u8.context(StrContext::Label(label))
}

fn bytes_field<'i>(len: usize, label: &'static str) -> impl Parser<&'i [u8], &'i [u8], ContextError> {
    take(len).context(StrContext::Label(label))
}

/// Parses the fixed file header.
///
/// Layout (little-endian):
/// - 20 bytes: id string, NUL padded
/// - u16 header size, u16 version, u16 bits per pixel, u16 camera bits per pixel,
///   u16 MCP diameter in pixels
/// - u8 horizontal binning, u8 vertical binning
/// - 8 bytes reserved
/// - u16 image width, u16 image height, u16 number of images, u16 attached recipe size
pub fn parse_file_header(input: &mut &[u8]) -> std::result::Result<FileHeader, ContextError> {
    let id = bytes_field(20, "file id").parse_next(input)?;
    let header_size = u16_field("header size").parse_next(input)?;
    let version = u16_field("file version").parse_next(input)?;
    let bits_per_pixel = u16_field("bits per pixel").parse_next(input)?;
    let camera_bits_per_pixel = u16_field("camera bits per pixel").parse_next(input)?;
    let mcp_diameter_px = u16_field("MCP diameter").parse_next(input)?;
    let h_binning = u8_field("horizontal binning").parse_next(input)?;
    let v_binning = u8_field("vertical binning").parse_next(input)?;
    let _ = bytes_field(8, "reserved").parse_next(input)?;
    let image_width = u16_field("image width").parse_next(input)?;
    let image_height = u16_field("image height").parse_next(input)?;
    let nr_images = u16_field("number of images").parse_next(input)?;
    let attached_recipe_size = u16_field("attached recipe size").parse_next(input)?;

    Ok(FileHeader {
        id: String::from_utf8_lossy(id)
            .trim_end_matches('\0')
            .to_string(),
        header_size,
        version,
        bits_per_pixel,
        camera_bits_per_pixel,
        mcp_diameter_px,
        h_binning,
        v_binning,
        image_width,
        image_height,
        nr_images,
        attached_recipe_size,
    })
}

/// Parses the image header that starts right after the file header region.
///
/// Layout (little-endian):
/// - u16 image header size, u16 version, u16 color scale low, u16 color scale high
/// - u64 image time (FILETIME)
/// - i16 mask x shift, i16 mask y shift, u8 rotate mask, 1 spare byte
/// - u16 attached markup size, i16 spin, u16 LEEM data version
pub fn parse_image_header(input: &mut &[u8]) -> std::result::Result<ImageHeader, ContextError> {
    let image_header_size = u16_field("image header size").parse_next(input)?;
    let version = u16_field("image header version").parse_next(input)?;
    let color_scale_low = u16_field("color scale low").parse_next(input)?;
    let color_scale_high = u16_field("color scale high").parse_next(input)?;
    let image_time = le_u64
        .context(StrContext::Label("image time"))
        .parse_next(input)?;
    let mask_x_shift = i16_field("mask x shift").parse_next(input)?;
    let mask_y_shift = i16_field("mask y shift").parse_next(input)?;
    let rotate_mask = u8_field("rotate mask").parse_next(input)?;
    let _ = bytes_field(1, "spare").parse_next(input)?;
    let attached_markup_size = u16_field("attached markup size").parse_next(input)?;
    let spin = i16_field("spin").parse_next(input)?;
    let leem_data_version = u16_field("LEEM data version").parse_next(input)?;

    Ok(ImageHeader {
        image_header_size,
        version,
        color_scale_low,
        color_scale_high,
        image_time,
        mask_x_shift,
        mask_y_shift,
        rotate_mask,
        attached_markup_size,
        spin,
        leem_data_version,
    })
}

/// Decodes and validates both header regions of a Uview file.
///
/// Only the header region is inspected; payload length is checked by the
/// image decoder.
pub fn decode_header(data: &[u8]) -> Result<UviewHeader> {
    let mut input = data;
    let file = parse_file_header(&mut input).map_err(|e| {
        PipelineError::FormatError(format!(
            "truncated file header ({} bytes): {}",
            data.len(),
            e
        ))
    })?;

    if (file.header_size as usize) < FileHeader::FIELDS_LEN {
        return Err(PipelineError::FormatError(format!(
            "declared header size {} is smaller than the {} bytes of header fields",
            file.header_size,
            FileHeader::FIELDS_LEN
        )));
    }

    let mut input = data.get(file.header_size as usize..).unwrap_or(&[]);
    let image = parse_image_header(&mut input).map_err(|e| {
        PipelineError::FormatError(format!(
            "truncated image header at offset {}: {}",
            file.header_size, e
        ))
    })?;

    if (image.image_header_size as usize) < ImageHeader::FIELDS_LEN {
        return Err(PipelineError::FormatError(format!(
            "declared image header size {} is smaller than the {} bytes of image header fields",
            image.image_header_size,
            ImageHeader::FIELDS_LEN
        )));
    }

    if file.image_width == 0 || file.image_height == 0 {
        return Err(PipelineError::FormatError(format!(
            "invalid image dimensions: width={}, height={}",
            file.image_width, file.image_height
        )));
    }

    if file.bits_per_pixel != 16 {
        return Err(PipelineError::FormatError(format!(
            "unsupported bit depth {} (only 16-bit images are supported)",
            file.bits_per_pixel
        )));
    }

    Ok(UviewHeader { file, image })
}
