//! Compute and graphics pipeline assembly
//!
//! Compiles the active stages, resolves and registers the root signature, loads the
//! graphics pipeline state, and creates the pipeline through the analyzer session.

use super::compiler::{CompiledStage, ShaderCompiler, StageCompiler};
use super::pipeline_state::PipelineStateDesc;
use super::root_signature::resolve_root_signature;
use crate::backend::{AnalyzerSession, ComputePipelineDesc, GraphicsPipelineDesc, PipelineHandle};
use crate::config::{Config, ShaderStage, non_empty};
use crate::error::{Error, ExtractionReport, Result};
use crate::results::PipelineResult;
use crate::validate::PipelineKind;

/// Appended to pipeline creation failures, which are most often caused by the root signature
const ROOT_SIGNATURE_HINT: &str = "a root signature that does not match the resources the shaders use is a common cause";

/// Builds compute and graphics pipelines from a validated configuration
pub struct PipelineAssembler<'a> {
    config: &'a Config,
    compiler: &'a dyn ShaderCompiler,
}

impl<'a> PipelineAssembler<'a> {
    /// Creates an assembler
    ///
    /// # Arguments
    /// * `config` - The validated configuration
    /// * `compiler` - Front-end HLSL compiler
    pub fn new(config: &'a Config, compiler: &'a dyn ShaderCompiler) -> Self {
        Self { config, compiler }
    }

    /// Stages a pipeline of `kind` is built from, in pipeline order
    pub fn active_stages(&self, kind: PipelineKind) -> Vec<ShaderStage> {
        match kind {
            PipelineKind::Compute => vec![ShaderStage::Compute],
            PipelineKind::Graphics => self.config.used_graphics_stages(),
            PipelineKind::ListTargets | PipelineKind::RayTracing(_) => Vec::new(),
        }
    }

    /// Compiles or reads every active stage
    pub fn compile_stages(&self, kind: PipelineKind, report: &mut ExtractionReport) -> Result<Vec<CompiledStage>> {
        let stage_compiler = StageCompiler::new(self.compiler, &self.config.defines, &self.config.include_dirs);
        self.active_stages(kind)
            .into_iter()
            .map(|stage| stage_compiler.compile_stage(stage, self.config.stage(stage), report))
            .collect()
    }

    /// Loads the graphics pipeline state description, or the defaults when none is configured
    pub fn load_pipeline_state(&self) -> Result<PipelineStateDesc> {
        match non_empty(&self.config.pipeline_state) {
            Some(path) => PipelineStateDesc::from_file(path).map_err(|e| Error::PipelineState {
                path: path.to_path_buf(),
                message: e.to_string(),
            }),
            None => {
                tracing::debug!("No pipeline state description given; using defaults");
                Ok(PipelineStateDesc::default())
            }
        }
    }

    /// Assembles the pipeline and creates it
    ///
    /// # Arguments
    /// * `session` - The analyzer session
    /// * `kind` - [`PipelineKind::Compute`] or [`PipelineKind::Graphics`]
    /// * `report` - Collects non-fatal stage dump failures
    ///
    /// # Returns
    /// The pipeline handle and its result record
    pub fn assemble(&self, session: &mut AnalyzerSession, kind: PipelineKind, report: &mut ExtractionReport) -> Result<(PipelineHandle, PipelineResult)> {
        let stages = self.compile_stages(kind, report)?;
        let resolved = resolve_root_signature(self.config, &stages, self.compiler)?;
        tracing::debug!("Using root signature from {:?}", resolved.source);
        let root_signature = session.create_root_signature(&resolved.blob).map_err(with_root_signature_hint)?;

        match kind {
            PipelineKind::Compute => {
                let Some(shader) = stages.first() else {
                    return Err(Error::Compilation {
                        stage: ShaderStage::Compute.name().to_string(),
                        message: "no compute shader".to_string(),
                    });
                };
                let (handle, result) = session
                    .create_compute_pipeline(&ComputePipelineDesc {
                        root_signature,
                        shader: &shader.bytecode,
                    })
                    .map_err(with_root_signature_hint)?;
                Ok((handle, PipelineResult::Compute(result)))
            }
            PipelineKind::Graphics => {
                let state = self.load_pipeline_state()?;
                let (handle, result) = session
                    .create_graphics_pipeline(&GraphicsPipelineDesc {
                        root_signature,
                        stages: &stages,
                        state: &state,
                    })
                    .map_err(with_root_signature_hint)?;
                Ok((handle, PipelineResult::Graphics(result)))
            }
            PipelineKind::ListTargets | PipelineKind::RayTracing(_) => Err(Error::StateDescription(format!("{kind:?} is not a compute or graphics pipeline"))),
        }
    }
}

fn with_root_signature_hint(error: Error) -> Error {
    match error {
        Error::Driver { context, status } => Error::Driver {
            context: format!("{context} ({ROOT_SIGNATURE_HINT})"),
            status,
        },
        other => other,
    }
}
