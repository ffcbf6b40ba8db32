//! Configuration validation
//!
//! Checks a [`Config`] for mutually exclusive and missing inputs before any device
//! or driver work starts, and determines which kind of pipeline the invocation
//! builds.

use crate::config::{Config, RayTracingMode, ShaderStage, non_empty};
use std::fmt;
use std::path::PathBuf;

/// The kind of work a validated configuration describes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineKind {
    /// Only list the supported targets
    ListTargets,
    /// A compute pipeline
    Compute,
    /// A graphics pipeline
    Graphics,
    /// A ray tracing state object
    RayTracing(RayTracingMode),
}

/// Validates `config` and applies its derived defaults
///
/// Rules are checked in a fixed order and the first violation is returned. On
/// success the root signature source file is defaulted to the single HLSL file in
/// use (when unambiguous) and every stage without a shader model inherits
/// `all_model`.
///
/// # Arguments
/// * `config` - The configuration to check; updated in place on success
///
/// # Returns
/// The pipeline kind the configuration describes
pub fn validate_config(config: &mut Config) -> Result<PipelineKind, ConfigError> {
    if config.list_targets {
        return Ok(PipelineKind::ListTargets);
    }

    let kind = check(config)?;

    if non_empty(&config.rs_macro_file).is_none() {
        config.rs_macro_file = shared_hlsl_file(config);
    }

    if let Some(model) = config.all_model.clone().filter(|m| !m.is_empty()) {
        for stage in ShaderStage::ALL {
            let stage_config = config.stage_mut(stage);
            if stage_config.model.is_empty() {
                stage_config.model = model.clone();
            }
        }
    }

    Ok(kind)
}

/// Runs the validation rules without modifying the configuration
fn check(config: &Config) -> Result<PipelineKind, ConfigError> {
    let compute_used = config.compute.is_used();
    let graphics_used = !config.used_graphics_stages().is_empty();

    if compute_used && graphics_used {
        return Err(ConfigError::MixedComputeAndGraphics);
    }

    let kind = if let Some(mode) = config.ray_tracing_mode() {
        if compute_used || graphics_used {
            return Err(ConfigError::MixedRayTracingAndStages);
        }
        check_ray_tracing(config, mode)?;
        PipelineKind::RayTracing(mode)
    } else if let Some(mode) = config.dxr_mode.as_deref().filter(|m| !m.is_empty()) {
        return Err(ConfigError::UnknownRayTracingMode(mode.to_string()));
    } else if compute_used {
        check_exclusive_input(config, ShaderStage::Compute)?;
        PipelineKind::Compute
    } else if graphics_used {
        if !config.vertex.is_used() {
            return Err(ConfigError::MissingVertexShader);
        }
        for stage in ShaderStage::GRAPHICS {
            check_exclusive_input(config, stage)?;
        }
        PipelineKind::Graphics
    } else if config.compute.entry.is_empty() && !has_compute_outputs(config) {
        return Err(ConfigError::NoInput);
    } else {
        return Err(ConfigError::MissingInput(ShaderStage::Compute));
    };

    if config.rs_macro.as_deref().is_some_and(|m| !m.is_empty()) && non_empty(&config.rs_serialized).is_some() {
        return Err(ConfigError::ConflictingRootSignatureSources);
    }

    Ok(kind)
}

/// Checks that a stage does not name both a source and a binary input
fn check_exclusive_input(config: &Config, stage: ShaderStage) -> Result<(), ConfigError> {
    let stage_config = config.stage(stage);
    if stage_config.hlsl_path().is_some() && stage_config.binary_path().is_some() {
        return Err(ConfigError::ConflictingInputs(stage));
    }
    Ok(())
}

/// Returns true if compute outputs were requested, which implies a compute job
fn has_compute_outputs(config: &Config) -> bool {
    let compute = &config.compute;
    [&compute.isa, &compute.stats, &compute.bytecode_out, &compute.bytecode_isa]
        .into_iter()
        .any(|path| non_empty(path).is_some())
}

fn check_ray_tracing(config: &Config, mode: RayTracingMode) -> Result<(), ConfigError> {
    let state_desc = non_empty(&config.dxr_state_desc);
    let hlsl = non_empty(&config.dxr_hlsl);
    match (state_desc, hlsl) {
        (None, None) => return Err(ConfigError::MissingRayTracingInput),
        (Some(_), Some(_)) => return Err(ConfigError::ConflictingRayTracingInputs),
        _ => {}
    }

    if mode == RayTracingMode::Shader && config.dxr_export.as_deref().is_none_or(str::is_empty) {
        return Err(ConfigError::MissingExport);
    }

    Ok(())
}

/// Returns the HLSL file shared by every populated stage, or `None` when the
/// stages use different files or none at all
fn shared_hlsl_file(config: &Config) -> Option<PathBuf> {
    let mut shared: Option<&std::path::Path> = None;
    for stage in ShaderStage::ALL {
        let Some(hlsl) = config.stage(stage).hlsl_path() else {
            continue;
        };
        match shared {
            None => shared = Some(hlsl),
            Some(existing) if existing == hlsl => {}
            Some(_) => return None,
        }
    }
    shared.map(|path| path.to_path_buf())
}

/// Errors detected while validating a configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// Nothing to compile
    NoInput,
    /// A stage has outputs but neither a source nor a binary input (stage)
    MissingInput(ShaderStage),
    /// A stage has both a source and a binary input (stage)
    ConflictingInputs(ShaderStage),
    /// Graphics stages were given without a vertex shader
    MissingVertexShader,
    /// Compute and graphics inputs were both given
    MixedComputeAndGraphics,
    /// Shader stage inputs were given together with ray tracing inputs
    MixedRayTracingAndStages,
    /// The ray tracing mode is neither `pipeline` nor `shader` (mode)
    UnknownRayTracingMode(String),
    /// Ray tracing was requested without a state description or HLSL file
    MissingRayTracingInput,
    /// Ray tracing was given both a state description and an HLSL file
    ConflictingRayTracingInputs,
    /// Shader mode was requested without naming an export
    MissingExport,
    /// Both a root signature macro and a serialized root signature were given
    ConflictingRootSignatureSources,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoInput => write!(f, "no shader input was provided"),
            Self::MissingInput(stage) => write!(f, "no HLSL source or binary was provided for the {stage} shader"),
            Self::ConflictingInputs(stage) => {
                write!(f, "both an HLSL source and a binary were provided for the {stage} shader; only one may be specified")
            }
            Self::MissingVertexShader => write!(f, "a graphics pipeline requires a vertex shader"),
            Self::MixedComputeAndGraphics => write!(f, "compute and graphics shaders cannot be combined in one pipeline"),
            Self::MixedRayTracingAndStages => write!(f, "ray tracing inputs cannot be combined with compute or graphics shaders"),
            Self::UnknownRayTracingMode(mode) => write!(f, "unknown ray tracing mode '{mode}'; expected 'pipeline' or 'shader'"),
            Self::MissingRayTracingInput => write!(f, "ray tracing requires a state description file or an HLSL file"),
            Self::ConflictingRayTracingInputs => write!(f, "a ray tracing state description and an HLSL file cannot both be provided"),
            Self::MissingExport => write!(f, "shader mode requires the name of the export to compile"),
            Self::ConflictingRootSignatureSources => {
                write!(f, "a root signature macro and a serialized root signature cannot both be provided")
            }
        }
    }
}

impl std::error::Error for ConfigError {}
