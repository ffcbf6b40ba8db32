//! Ray tracing output metadata
//!
//! A ray tracing run can produce any number of pipelines, each with its own set of
//! shaders and artifact files. The metadata file lists them so other tools can
//! find the outputs without re-deriving file names. Writing and reading back a
//! metadata file reproduces the same structure.

use crate::config::RayTracingMode;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Artifacts of one ray tracing shader
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct RayTracingShaderMetadata {
    /// Export name of the shader
    pub export_name: String,
    /// Disassembly file, if one was written
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub isa_file: Option<PathBuf>,
    /// Statistics file, if one was written
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stats_file: Option<PathBuf>,
}

/// One generated pipeline and its shaders
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct RayTracingPipelineMetadata {
    /// Raygeneration shader name for Unified pipelines, running index for Indirect ones
    pub pipeline_name: String,
    /// Whether one physical shader implements the whole pipeline
    pub is_unified: bool,
    /// Pipeline binary file, if one was written
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pipeline_binary: Option<PathBuf>,
    /// Shaders of the pipeline
    pub shaders: Vec<RayTracingShaderMetadata>,
}

/// Contents of the output metadata file
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct OutputMetadata {
    /// Compilation mode of the run
    pub mode: RayTracingMode,
    /// Generated pipelines, in driver order
    pub pipelines: Vec<RayTracingPipelineMetadata>,
}

impl OutputMetadata {
    /// Serializes the metadata to pretty-printed JSON
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Parses metadata from JSON content
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Writes the metadata file
    ///
    /// # Arguments
    /// * `path` - Output file
    pub fn write_file<P: AsRef<Path>>(&self, path: P) -> Result<(), Box<dyn std::error::Error>> {
        std::fs::write(path, self.to_json()?)?;
        Ok(())
    }

    /// Reads a metadata file
    ///
    /// # Arguments
    /// * `path` - Metadata file written by [`OutputMetadata::write_file`]
    pub fn read_file<P: AsRef<Path>>(path: P) -> Result<Self, Box<dyn std::error::Error>> {
        let content = std::fs::read_to_string(path)?;
        Ok(Self::from_json(&content)?)
    }

    /// Total number of shaders over all pipelines
    pub fn shader_count(&self) -> usize {
        self.pipelines.iter().map(|pipeline| pipeline.shaders.len()).sum()
    }
}
