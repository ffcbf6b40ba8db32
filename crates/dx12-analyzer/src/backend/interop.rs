//! Pipeline and state object creation, and artifact extraction
//!
//! Creation failures are terminal for the compilation unit. Extraction works item
//! by item: a disassembly, statistics block or binary that cannot be retrieved is
//! recorded as a warning and the remaining items are still extracted.

use super::analyzer::{
    ArtifactTarget, ComputePipelineDesc, GeneratedPipeline, GraphicsPipelineDesc, PipelineHandle, RootSignatureHandle, StateObjectHandle, StateObjectMode, StateObjectOutput,
};
use super::buffer::{retrieve_buffer, retrieve_string};
use super::disassembly::{document_text, split_stages};
use super::driver::AnalyzerSession;
use crate::config::ShaderStage;
use crate::dxr::graph::StateObjectDesc;
use crate::error::{Error, ExtractionReport, Result, Warning};
use crate::results::{ComputePipelineResult, GraphicsPipelineResult, PipelineResult, RayTracingStats, ShaderResult, ShaderStats};

/// Artifacts to extract from a compute or graphics pipeline
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArtifactRequest {
    /// Stages whose disassembly is wanted
    pub disassembly: Vec<ShaderStage>,
    /// Whether the pipeline binary is wanted
    pub binary: bool,
}

/// Artifacts retrieved for one ray tracing shader
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RayTracingShaderArtifacts {
    /// Hardware and ray tracing statistics, if they could be retrieved
    pub stats: Option<(ShaderStats, RayTracingStats)>,
    /// Disassembly text, if it could be retrieved
    pub disassembly: Option<String>,
}

impl RayTracingShaderArtifacts {
    /// The shader result, available when the statistics were retrieved
    pub fn to_result(&self) -> Option<ShaderResult> {
        self.stats.map(|(stats, ray_tracing)| ShaderResult {
            disassembly: self.disassembly.clone(),
            ..ShaderResult::ray_tracing(stats, ray_tracing)
        })
    }
}

impl AnalyzerSession {
    /// Registers a root signature blob with the device
    pub fn create_root_signature(&mut self, blob: &[u8]) -> Result<RootSignatureHandle> {
        self.analyzer_mut().create_root_signature(blob).map_err(|status| Error::driver("failed to create the root signature", status))
    }

    /// Creates a compute pipeline
    ///
    /// # Returns
    /// The pipeline handle and its result record
    pub fn create_compute_pipeline(&mut self, desc: &ComputePipelineDesc<'_>) -> Result<(PipelineHandle, ComputePipelineResult)> {
        let output = self
            .analyzer_mut()
            .create_compute_pipeline(desc)
            .map_err(|status| Error::driver("failed to create the compute pipeline", status))?;

        let [x, y, z] = output.thread_group;
        tracing::info!("Created compute pipeline (thread group {x}x{y}x{z})");
        Ok((
            output.handle,
            ComputePipelineResult {
                shader: ShaderResult::standard(output.stats),
                thread_group: output.thread_group,
            },
        ))
    }

    /// Creates a graphics pipeline
    ///
    /// Statistics of a merged physical shader are reported for every stage it covers.
    ///
    /// # Returns
    /// The pipeline handle and its result record
    pub fn create_graphics_pipeline(&mut self, desc: &GraphicsPipelineDesc<'_>) -> Result<(PipelineHandle, GraphicsPipelineResult)> {
        let output = self
            .analyzer_mut()
            .create_graphics_pipeline(desc)
            .map_err(|status| Error::driver("failed to create the graphics pipeline", status))?;

        for shader in output.shaders.iter().filter(|shader| shader.is_merged()) {
            tracing::debug!("Driver merged stages {:#x} into one physical shader", shader.stage_mask);
        }
        tracing::info!("Created graphics pipeline ({} physical shaders)", output.shaders.len());
        Ok((output.handle, GraphicsPipelineResult::from_physical_shaders(&output.shaders)))
    }

    /// Extracts the disassembly and binary of a compute or graphics pipeline
    ///
    /// The disassembly document is split by stage into `result`. A merged stage
    /// without its own section receives the section of the stage it was merged
    /// with.
    ///
    /// # Arguments
    /// * `handle` - The pipeline
    /// * `result` - Result record receiving the disassembly
    /// * `request` - Artifacts to extract
    /// * `report` - Collects per-item failures
    ///
    /// # Returns
    /// The pipeline binary, if requested and retrieved
    pub fn extract_pipeline_artifacts(&self, handle: PipelineHandle, result: &mut PipelineResult, request: &ArtifactRequest, report: &mut ExtractionReport) -> Option<Vec<u8>> {
        if !request.disassembly.is_empty() {
            match retrieve_string(|buffer| self.analyzer().disassembly(ArtifactTarget::Pipeline(handle), buffer)) {
                Ok(document) => distribute_disassembly(&document, result, &request.disassembly, report),
                Err(status) => {
                    for stage in &request.disassembly {
                        report.push(Warning::Extraction {
                            item: format!("{stage} shader"),
                            artifact: "disassembly",
                            reason: status.to_string(),
                        });
                    }
                }
            }
        }

        if !request.binary {
            return None;
        }
        match retrieve_buffer(|buffer| self.analyzer().binary(handle, buffer)) {
            Ok(binary) if !binary.is_empty() => Some(binary),
            Ok(_) => {
                report.push(Warning::Extraction {
                    item: "pipeline".to_string(),
                    artifact: "binary",
                    reason: "the driver returned an empty binary".to_string(),
                });
                None
            }
            Err(status) => {
                report.push(Warning::Extraction {
                    item: "pipeline".to_string(),
                    artifact: "binary",
                    reason: status.to_string(),
                });
                None
            }
        }
    }

    /// Creates a ray tracing state object
    pub fn create_state_object(&mut self, desc: &StateObjectDesc, mode: &StateObjectMode) -> Result<StateObjectOutput> {
        let output = self
            .analyzer_mut()
            .create_state_object(desc, mode)
            .map_err(|status| Error::driver("failed to create the ray tracing state object", status))?;

        // Shader mode compiles one export in isolation and may report no pipeline
        if matches!(mode, StateObjectMode::Pipeline) && output.pipelines.is_empty() {
            return Err(Error::StateDescription("the driver generated no pipeline from the state object".to_string()));
        }
        for (index, pipeline) in output.pipelines.iter().enumerate() {
            tracing::info!(
                "Generated pipeline {}: {} with {} shader(s)",
                index + 1,
                if pipeline.unified { "unified" } else { "indirect" },
                pipeline.shaders.len()
            );
        }
        Ok(output)
    }

    /// Extracts the statistics and disassembly of one ray tracing shader
    ///
    /// # Arguments
    /// * `handle` - The state object
    /// * `pipeline` - Index of the generated pipeline
    /// * `export` - Export name of the shader
    /// * `report` - Collects per-item failures
    pub fn extract_ray_tracing_shader(&self, handle: StateObjectHandle, pipeline: usize, export: &str, report: &mut ExtractionReport) -> RayTracingShaderArtifacts {
        let item = format!("shader '{export}'");

        let stats = match self.analyzer().ray_tracing_shader_stats(handle, pipeline, export) {
            Ok(stats) => Some(stats),
            Err(status) => {
                report.push(Warning::Extraction {
                    item: item.clone(),
                    artifact: "statistics",
                    reason: status.to_string(),
                });
                None
            }
        };

        let target = ArtifactTarget::RayTracingShader { handle, pipeline, export };
        let disassembly = match retrieve_string(|buffer| self.analyzer().disassembly(target, buffer)) {
            Ok(document) => Some(document_text(&document)),
            Err(status) => {
                report.push(Warning::Extraction {
                    item,
                    artifact: "disassembly",
                    reason: status.to_string(),
                });
                None
            }
        };

        RayTracingShaderArtifacts { stats, disassembly }
    }

    /// Number of pipeline binaries the driver holds for a state object
    pub fn pipeline_binary_count(&self, handle: StateObjectHandle, report: &mut ExtractionReport) -> Option<usize> {
        match self.analyzer().pipeline_binary_count(handle) {
            Ok(count) => Some(count),
            Err(status) => {
                report.push(Warning::Extraction {
                    item: "state object".to_string(),
                    artifact: "pipeline binary count",
                    reason: status.to_string(),
                });
                None
            }
        }
    }

    /// Extracts the binary of one generated pipeline
    ///
    /// # Arguments
    /// * `handle` - The state object
    /// * `index` - Zero-based index of the generated pipeline
    /// * `report` - Collects failures
    pub fn extract_pipeline_binary(&self, handle: StateObjectHandle, index: usize, report: &mut ExtractionReport) -> Option<Vec<u8>> {
        match retrieve_buffer(|buffer| self.analyzer().pipeline_binary(handle, index, buffer)) {
            Ok(binary) if !binary.is_empty() => Some(binary),
            Ok(_) => {
                report.push(Warning::Extraction {
                    item: format!("pipeline {}", index + 1),
                    artifact: "binary",
                    reason: "the driver returned an empty binary".to_string(),
                });
                None
            }
            Err(status) => {
                report.push(Warning::Extraction {
                    item: format!("pipeline {}", index + 1),
                    artifact: "binary",
                    reason: status.to_string(),
                });
                None
            }
        }
    }
}

/// Name of a generated pipeline's raygeneration shader, falling back to its first shader
pub fn raygen_name(pipeline: &GeneratedPipeline) -> Option<&str> {
    pipeline.raygen.as_deref().or_else(|| pipeline.shaders.first().map(String::as_str))
}

fn distribute_disassembly(document: &str, result: &mut PipelineResult, wanted: &[ShaderStage], report: &mut ExtractionReport) {
    let sections = split_stages(document);

    if sections.is_empty() {
        // Compute pipelines may come back as a bare document
        if let PipelineResult::Compute(compute) = result {
            let text = document_text(document);
            if !text.trim().is_empty() {
                compute.shader.disassembly = Some(text);
            }
        }
    }

    for (stage, text) in sections {
        match result.stage_mut(stage) {
            Some(shader) => shader.disassembly = Some(text),
            None => tracing::debug!("Ignoring disassembly of the {stage} stage, which has no result"),
        }
    }

    for &stage in ShaderStage::ALL.iter() {
        let Some(shader) = result.stage(stage) else {
            continue;
        };
        if shader.disassembly.is_some() {
            continue;
        }

        let mask = shader.stats.stage_mask;
        let merged = ShaderStage::ALL
            .iter()
            .filter_map(|other| result.stage(*other))
            .find(|other| other.stats.stage_mask == mask && other.disassembly.is_some())
            .and_then(|other| other.disassembly.clone());

        match merged {
            Some(text) => {
                if let Some(shader) = result.stage_mut(stage) {
                    shader.disassembly = Some(text);
                }
            }
            None if wanted.contains(&stage) => report.push(Warning::Extraction {
                item: format!("{stage} shader"),
                artifact: "disassembly",
                reason: format!("the driver disassembly has no {} section", stage.tag()),
            }),
            None => {}
        }
    }
}
