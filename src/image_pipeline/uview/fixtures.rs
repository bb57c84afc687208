//! Synthetic Uview files for tests.

use std::path::{Path, PathBuf};

pub struct UviewFixture {
    width: u16,
    height: u16,
    pixels: Vec<u16>,
    bits_per_pixel: u16,
    markup_size: u16,
    leem_data_version: u16,
}

impl UviewFixture {
    const HEADER_SIZE: u16 = 104;
    const IMAGE_HEADER_SIZE: u16 = 288;

    pub fn new(width: u16, height: u16, pixels: Vec<u16>) -> Self {
        Self {
            width,
            height,
            pixels,
            bits_per_pixel: 16,
            markup_size: 0,
            leem_data_version: 2,
        }
    }

    pub fn constant(width: u16, height: u16, value: u16) -> Self {
        Self::new(width, height, vec![value; width as usize * height as usize])
    }

    pub fn with_markup(mut self, size: u16) -> Self {
        self.markup_size = size;
        self
    }

    pub fn with_leem_data_version(mut self, version: u16) -> Self {
        self.leem_data_version = version;
        self
    }

    pub fn with_bits_per_pixel(mut self, bits: u16) -> Self {
        self.bits_per_pixel = bits;
        self
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::new();

        let mut id = [0u8; 20];
        id[..10].copy_from_slice(b"UKSOFT2001");
        out.extend_from_slice(&id);
        for field in [Self::HEADER_SIZE, 7, self.bits_per_pixel, 12, 1024] {
            out.extend_from_slice(&field.to_le_bytes());
        }
        out.extend_from_slice(&[1, 1]);
        out.extend_from_slice(&[0; 8]);
        for field in [self.width, self.height, 1, 0] {
            out.extend_from_slice(&field.to_le_bytes());
        }
        out.resize(Self::HEADER_SIZE as usize, 0);

        let image_start = out.len();
        for field in [Self::IMAGE_HEADER_SIZE, 5, 0, 1023] {
            out.extend_from_slice(&field.to_le_bytes());
        }
        out.extend_from_slice(&133_500_000_000_000_000u64.to_le_bytes());
        out.extend_from_slice(&0i16.to_le_bytes());
        out.extend_from_slice(&0i16.to_le_bytes());
        out.extend_from_slice(&[0, 0]);
        out.extend_from_slice(&self.markup_size.to_le_bytes());
        out.extend_from_slice(&0i16.to_le_bytes());
        out.extend_from_slice(&self.leem_data_version.to_le_bytes());
        out.resize(image_start + Self::IMAGE_HEADER_SIZE as usize, 0);

        let markup = match self.markup_size as usize {
            0 => 0,
            raw => 128 * (raw / 128 + 1),
        };
        let leem = if self.leem_data_version > 2 { 256 } else { 0 };
        out.resize(out.len() + markup + leem, 0xAB);

        for value in &self.pixels {
            out.extend_from_slice(&value.to_le_bytes());
        }
        out
    }

    pub fn write_to(&self, dir: &Path, name: &str) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, self.encode()).unwrap();
        path
    }
}
