//! Pipeline configuration


use std::path::{Path, PathBuf};

use crate::image_pipeline::common::error::{PipelineError, Result};
use crate::image_pipeline::experiment::has_extension;

/// Settings shared by every stage of a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineConfig {
    /// `.dat` file, directory of `.dat` files, or `.npy` snapshot depending on the stage
    pub input_path: PathBuf,
    /// Directory receiving snapshots, containers and previews
    pub output_path: PathBuf,
    pub denoise_enabled: bool,
    pub normalize_enabled: bool,
    /// Export every image plane as a TIFF preview
    pub show_images: bool,
}

impl PipelineConfig {
    pub fn builder() -> PipelineConfigBuilder {
        PipelineConfigBuilder::default()
    }
}

/// Builder for PipelineConfig
#[derive(Default)]
pub struct PipelineConfigBuilder {
    input_path: Option<PathBuf>,
    output_path: Option<PathBuf>,
    denoise_enabled: Option<bool>,
    normalize_enabled: Option<bool>,
    show_images: Option<bool>,
}

impl PipelineConfigBuilder {
    pub fn input_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.input_path = Some(path.into());
        self
    }

    pub fn output_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.output_path = Some(path.into());
        self
    }

    pub fn denoise(mut self, enable: bool) -> Self {
        self.denoise_enabled = Some(enable);
        self
    }

    pub fn normalize(mut self, enable: bool) -> Self {
        self.normalize_enabled = Some(enable);
        self
    }

    pub fn show_images(mut self, enable: bool) -> Self {
        self.show_images = Some(enable);
        self
    }

    /// Denoising and normalization default to enabled, previews to disabled.
    ///
    /// # Errors
    ///
    /// * `PathError` - the input path is unset or does not exist
    /// * `ConfigError` - the output path is unset, empty, or names an existing file
    pub fn build(self) -> Result<PipelineConfig> {
        let input_path = self
            .input_path
            .ok_or_else(|| PipelineError::path("", "no input path given"))?;
        if !input_path.exists() {
            return Err(PipelineError::path(&input_path, "missing or does not exist"));
        }

        let output_path = self
            .output_path
            .filter(|p| !p.as_os_str().is_empty())
            .ok_or_else(|| PipelineError::ConfigError("no output directory given".to_string()))?;
        if output_path.is_file() {
            return Err(PipelineError::ConfigError(format!(
                "output path {} is a file, expected a directory",
                output_path.display()
            )));
        }

        Ok(PipelineConfig {
            input_path,
            output_path,
            denoise_enabled: self.denoise_enabled.unwrap_or(true),
            normalize_enabled: self.normalize_enabled.unwrap_or(true),
            show_images: self.show_images.unwrap_or(false),
        })
    }
}

/// Checks that `path` exists and, when it is a file, carries `extension`.
pub fn validate_input(path: &Path, extension: &str) -> Result<()> {
    if !path.exists() {
        return Err(PipelineError::path(path, "missing or does not exist"));
    }
    if path.is_file() && !has_extension(path, extension) {
        return Err(PipelineError::path(
            path,
            format!("expected a .{} file", extension),
        ));
    }
    Ok(())
}
