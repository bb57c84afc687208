//! TIFF preview configuration types

/// TIFF compression methods
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TiffCompression {
    /// No compression (fastest, largest file)
    None,
    /// LZW compression (slow, good compression)
    Lzw,
    /// Deflate compression - fast level
    DeflateFast,
    /// Deflate compression - best compression (slower)
    DeflateBest,
    /// Deflate compression - balanced
    DeflateBalanced,
}

/// Configuration for 16-bit grayscale preview export
#[derive(Debug, Clone)]
pub struct PreviewConfig {
    /// Compression method to use
    pub compression: TiffCompression,
    /// Predictor value for compression (2 for horizontal differencing)
    pub predictor: Option<u16>,
    /// Sub-directory of the output directory receiving the previews
    pub directory: String,
}

impl Default for PreviewConfig {
    fn default() -> Self {
        Self {
            compression: TiffCompression::DeflateFast,
            predictor: Some(2),
            directory: "previews".to_string(),
        }
    }
}

impl PreviewConfig {
    pub fn builder() -> PreviewConfigBuilder {
        PreviewConfigBuilder::default()
    }
}

/// Builder for PreviewConfig
#[derive(Default)]
pub struct PreviewConfigBuilder {
    compression: Option<TiffCompression>,
    predictor: Option<Option<u16>>,
    directory: Option<String>,
}

impl PreviewConfigBuilder {
    pub fn compression(mut self, compression: TiffCompression) -> Self {
        self.compression = Some(compression);
        self
    }

    pub fn predictor(mut self, predictor: Option<u16>) -> Self {
        self.predictor = Some(predictor);
        self
    }

    pub fn directory(mut self, directory: impl Into<String>) -> Self {
        self.directory = Some(directory.into());
        self
    }

    pub fn build(self) -> PreviewConfig {
        let default = PreviewConfig::default();
        PreviewConfig {
            compression: self.compression.unwrap_or(default.compression),
            predictor: self.predictor.unwrap_or(default.predictor),
            directory: self.directory.unwrap_or(default.directory),
        }
    }
}
