//! Experiment classification from Uview file names
//!
//! The acquisition mode of a set of files is encoded in their names: paired
//! polarization exposures carry `min`/`plus` tokens and a flat-field reference
//! carries a `norm` token.


use std::fmt;
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::image_pipeline::common::error::{PipelineError, Result};

pub const MINUS_TOKEN: &str = "min";
pub const PLUS_TOKEN: &str = "plus";
pub const NORMALIZATION_TOKEN: &str = "norm";

pub const UVIEW_EXTENSION: &str = "dat";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExperimentMode {
    /// Single exposures (XAS), batches of shape `(N, H, W)`
    Single,
    /// Paired minus/plus exposures (XMCD/XMLD), batches of shape `(N/2, H, W, 2)`
    DualPolarization,
    /// Flat-field reference images, laid out like `Single`
    Normalization,
}

impl ExperimentMode {
    pub fn is_dual_polarization(self) -> bool {
        matches!(self, Self::DualPolarization)
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Single => "xas",
            Self::DualPolarization => "xmcd",
            Self::Normalization => "norm",
        }
    }
}

impl fmt::Display for ExperimentMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Polarization {
    Minus,
    Plus,
}

impl Polarization {
    /// Index along the trailing axis of a dual-polarization batch.
    pub fn plane(self) -> usize {
        match self {
            Self::Minus => 0,
            Self::Plus => 1,
        }
    }

    pub fn suffix(self) -> &'static str {
        match self {
            Self::Minus => "minus",
            Self::Plus => "plus",
        }
    }
}

/// Polarization encoded in a file name. The minus token wins when both are present.
pub fn polarization_of(file_name: &str) -> Option<Polarization> {
    if file_name.contains(MINUS_TOKEN) {
        Some(Polarization::Minus)
    } else if file_name.contains(PLUS_TOKEN) {
        Some(Polarization::Plus)
    } else {
        None
    }
}

pub fn file_name_of(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string_lossy().into_owned())
}

pub fn has_extension(path: &Path, extension: &str) -> bool {
    path.extension()
        .is_some_and(|ext| ext.to_string_lossy().eq_ignore_ascii_case(extension))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub mode: ExperimentMode,
    pub files: Vec<PathBuf>,
}

impl Classification {
    pub fn count(&self, polarization: Polarization) -> usize {
        self.files
            .iter()
            .filter(|path| polarization_of(&file_name_of(path)) == Some(polarization))
            .count()
    }
}

/// Lists the Uview files named by `path`: the file itself, or the `.dat` files
/// of a directory sorted by name.
pub fn collect_candidates(path: &Path) -> Result<Vec<PathBuf>> {
    if !path.exists() {
        return Err(PipelineError::path(path, "missing or does not exist"));
    }

    if path.is_file() {
        if !has_extension(path, UVIEW_EXTENSION) {
            return Err(PipelineError::path(path, "expected a .dat Uview file"));
        }
        return Ok(vec![path.to_path_buf()]);
    }

    let mut files = Vec::new();
    for entry in std::fs::read_dir(path)? {
        let entry_path = entry?.path();
        if entry_path.is_file() && has_extension(&entry_path, UVIEW_EXTENSION) {
            files.push(entry_path);
        }
    }
    files.sort_by_key(|p| file_name_of(p));

    Ok(files)
}

/// Derives the experiment mode of an ordered file set.
///
/// | minus | plus | norm | mode |
/// |---|---|---|---|
/// | no | no | no | `Single` |
/// | exactly one of them | | no | `Single`, with a naming warning |
/// | yes | yes | no | `DualPolarization` |
/// | any | any | yes | `Normalization` |
pub fn classify(files: Vec<PathBuf>) -> Result<Classification> {
    if files.is_empty() {
        return Err(PipelineError::ConfigError(
            "no Uview images to read".to_string(),
        ));
    }

    let names: Vec<String> = files.iter().map(|p| file_name_of(p)).collect();
    let minus = names.iter().any(|name| name.contains(MINUS_TOKEN));
    let plus = names.iter().any(|name| name.contains(PLUS_TOKEN));
    let normalization = names.iter().any(|name| name.contains(NORMALIZATION_TOKEN));

    let mode = match (minus, plus, normalization) {
        (_, _, true) => ExperimentMode::Normalization,
        (true, true, false) => ExperimentMode::DualPolarization,
        (false, false, false) => ExperimentMode::Single,
        (true, false, false) | (false, true, false) => {
            warn!(
                "Only one polarization token found in file names, experiment mode set to {}; check file names",
                ExperimentMode::Single
            );
            ExperimentMode::Single
        }
    };

    info!("Number of images to read = {:5} in mode: {}", files.len(), mode);

    Ok(Classification { mode, files })
}

pub fn classify_path(path: &Path) -> Result<Classification> {
    classify(collect_candidates(path)?)
}
