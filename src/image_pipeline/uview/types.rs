//! Uview `.dat` header and image types

use ndarray::Array2;
use serde::Serialize;

/// A decoded detector frame, shape `(height, width)`, row-major.
pub type RawImage = Array2<u16>;

/// Fixed file header at the start of every Uview file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileHeader {
    /// Format identifier, e.g. `UKSOFT2001`, with trailing NULs stripped
    pub id: String,
    /// Length of the whole file header region in bytes
    pub header_size: u16,
    pub version: u16,
    pub bits_per_pixel: u16,
    pub camera_bits_per_pixel: u16,
    pub mcp_diameter_px: u16,
    pub h_binning: u8,
    pub v_binning: u8,
    pub image_width: u16,
    pub image_height: u16,
    pub nr_images: u16,
    pub attached_recipe_size: u16,
}

impl FileHeader {
    /// Bytes covered by the declared file header fields.
    pub const FIELDS_LEN: usize = 48;

    pub fn pixel_count(&self) -> usize {
        self.image_width as usize * self.image_height as usize
    }

    /// Payload length in bytes, two bytes per sample.
    pub fn payload_len(&self) -> usize {
        self.pixel_count() * 2
    }
}

/// Per-image header following the file header region.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageHeader {
    pub image_header_size: u16,
    pub version: u16,
    pub color_scale_low: u16,
    pub color_scale_high: u16,
    /// Acquisition time as Windows FILETIME ticks
    pub image_time: u64,
    pub mask_x_shift: i16,
    pub mask_y_shift: i16,
    pub rotate_mask: u8,
    /// Markup size as stored in the file, before block rounding
    pub attached_markup_size: u16,
    pub spin: i16,
    pub leem_data_version: u16,
}

impl ImageHeader {
    pub const FIELDS_LEN: usize = 28;

    const MARKUP_BLOCK: usize = 128;
    const LEEM_DATA_SIZE: usize = 256;

    /// Markup is stored in whole 128-byte blocks, always one past the raw size.
    pub fn markup_block_size(&self) -> usize {
        match self.attached_markup_size as usize {
            0 => 0,
            raw => Self::MARKUP_BLOCK * (raw / Self::MARKUP_BLOCK + 1),
        }
    }

    /// Size of the LEEM data block, present from data version 3 on.
    pub fn leem_data_size(&self) -> usize {
        if self.leem_data_version > 2 {
            Self::LEEM_DATA_SIZE
        } else {
            0
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UviewHeader {
    pub file: FileHeader,
    pub image: ImageHeader,
}

impl UviewHeader {
    /// Byte offset where the pixel payload begins.
    pub fn payload_offset(&self) -> usize {
        self.file.header_size as usize
            + self.image.image_header_size as usize
            + self.image.markup_block_size()
            + self.image.leem_data_size()
    }

    pub fn width(&self) -> usize {
        self.file.image_width as usize
    }

    pub fn height(&self) -> usize {
        self.file.image_height as usize
    }
}

#[derive(Debug, Clone)]
pub struct DecodedImage {
    pub header: UviewHeader,
    pub pixels: RawImage,
}

/// Flat, exportable view of every header field of one decoded file.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UviewMetadata {
    pub file_name: String,
    pub id: String,
    pub header_size: u16,
    pub header_version: u16,
    pub bits_per_pixel: u16,
    pub camera_bits_per_pixel: u16,
    pub mcp_diameter_px: u16,
    pub h_binning: u8,
    pub v_binning: u8,
    pub image_width: u16,
    pub image_height: u16,
    pub nr_images: u16,
    pub attached_recipe_size: u16,
    pub image_header_size: u16,
    pub image_header_version: u16,
    pub color_scale_low: u16,
    pub color_scale_high: u16,
    pub image_time: u64,
    pub mask_x_shift: i16,
    pub mask_y_shift: i16,
    pub rotate_mask: u8,
    pub attached_markup_size: u16,
    pub spin: i16,
    pub leem_data_version: u16,
    pub payload_offset: usize,
}

impl UviewMetadata {
    pub fn from_header(file_name: impl Into<String>, header: &UviewHeader) -> Self {
        let UviewHeader { file, image } = header;
        Self {
            file_name: file_name.into(),
            id: file.id.clone(),
            header_size: file.header_size,
            header_version: file.version,
            bits_per_pixel: file.bits_per_pixel,
            camera_bits_per_pixel: file.camera_bits_per_pixel,
            mcp_diameter_px: file.mcp_diameter_px,
            h_binning: file.h_binning,
            v_binning: file.v_binning,
            image_width: file.image_width,
            image_height: file.image_height,
            nr_images: file.nr_images,
            attached_recipe_size: file.attached_recipe_size,
            image_header_size: image.image_header_size,
            image_header_version: image.version,
            color_scale_low: image.color_scale_low,
            color_scale_high: image.color_scale_high,
            image_time: image.image_time,
            mask_x_shift: image.mask_x_shift,
            mask_y_shift: image.mask_y_shift,
            rotate_mask: image.rotate_mask,
            attached_markup_size: image.attached_markup_size,
            spin: image.spin,
            leem_data_version: image.leem_data_version,
            payload_offset: header.payload_offset(),
        }
    }
}
