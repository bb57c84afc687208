//! PEEM image processing pipeline module
//!
//! This module provides a structured approach to Uview image ETL, with
//! separate modules for `.dat` decoding, batch assembly, denoising,
//! normalization, aggregation, persistence and stage orchestration.

pub mod aggregate;
pub mod batch;
pub mod common;
pub mod config;
pub mod container;
pub mod denoise;
pub mod experiment;
pub mod normalize;
pub mod snapshot;
pub mod stages;
pub mod tiff;
pub mod uview;

pub use common::{
    PipelineError,
    Result,
    StageTimings,
};

pub use uview::{
    DecodedImage,
    ImageReader,
    RawImage,
    UviewHeader,
    UviewMetadata,
    UviewReader,
};

pub use experiment::{
    Classification,
    ExperimentMode,
    Polarization,
    classify,
    classify_path,
};

pub use batch::{
    AssembledBatch,
    BatchAssembler,
    ImageBatch,
    PlaneIndex,
};

pub use denoise::{
    BatchDenoiseResult,
    DenoiseAlgorithm,
    DenoiseResult,
    Denoiser,
    Fidelity,
};

pub use normalize::Normalizer;

pub use aggregate::concatenate;

pub use config::{
    PipelineConfig,
    PipelineConfigBuilder,
    validate_input,
};

pub use container::{
    ContainerLayout,
    ContainerWriter,
    NpzContainerWriter,
};

pub use tiff::{
    TiffCompression,
    PreviewConfig,
    PreviewConfigBuilder,
    TiffWriter,
    StandardTiffWriter,
};

pub use stages::{
    PeemPipeline,
    StageReport,
};
