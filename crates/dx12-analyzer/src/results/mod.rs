//! Result model and serialization
//!
//! Backend output is normalized into [`ShaderResult`] / [`PipelineResult`] records,
//! written to the requested disassembly, statistics and binary files, and for ray
//! tracing summarized in an [`OutputMetadata`] file.

pub mod metadata;
pub mod shader;
pub mod stats;
pub mod writer;

pub use metadata::{OutputMetadata, RayTracingPipelineMetadata, RayTracingShaderMetadata};
pub use shader::*;
