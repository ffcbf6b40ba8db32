//! Invocation configuration
//!
//! This module defines the configuration record that drives one analyzer run.
//! The record is normally filled in by an external command-line front end, but it
//! can also be loaded from a YAML document, which is how the bundled tools and the
//! tests build it.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// Default shader model used when neither the stage nor `all_model` names one
pub const DEFAULT_SHADER_MODEL: &str = "6_0";

/// Prefixes of complete target profiles
const PROFILE_PREFIXES: [&str; 7] = ["vs_", "hs_", "ds_", "gs_", "ps_", "cs_", "lib_"];

/// Default root signature version passed to the root signature compiler
pub const DEFAULT_ROOT_SIGNATURE_VERSION: &str = "rootsig_1_1";

/// Default vendor driver module name
pub const DEFAULT_DRIVER_MODULE: &str = "amdxc64.dll";

/// A single programmable shader stage of a compute or graphics pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ShaderStage {
    /// Vertex shader
    Vertex,
    /// Hull (tessellation control) shader
    Hull,
    /// Domain (tessellation evaluation) shader
    Domain,
    /// Geometry shader
    Geometry,
    /// Pixel shader
    Pixel,
    /// Compute shader
    Compute,
}

impl ShaderStage {
    /// Graphics stages in pipeline order
    pub const GRAPHICS: [ShaderStage; 5] = [Self::Vertex, Self::Hull, Self::Domain, Self::Geometry, Self::Pixel];

    /// Every stage, graphics stages first
    pub const ALL: [ShaderStage; 6] = [Self::Vertex, Self::Hull, Self::Domain, Self::Geometry, Self::Pixel, Self::Compute];

    /// Human-readable stage name used in messages
    pub fn name(self) -> &'static str {
        match self {
            Self::Vertex => "vertex",
            Self::Hull => "hull",
            Self::Domain => "domain",
            Self::Geometry => "geometry",
            Self::Pixel => "pixel",
            Self::Compute => "compute",
        }
    }

    /// Two-letter tag used in driver disassembly documents and shader model prefixes
    pub fn tag(self) -> &'static str {
        match self {
            Self::Vertex => "VS",
            Self::Hull => "HS",
            Self::Domain => "DS",
            Self::Geometry => "GS",
            Self::Pixel => "PS",
            Self::Compute => "CS",
        }
    }

    /// Looks a stage up by its disassembly tag, case-insensitively
    pub fn from_tag(tag: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|stage| stage.tag().eq_ignore_ascii_case(tag))
    }

    /// Bit assigned to this stage in a hardware stage mask
    pub fn mask_bit(self) -> u32 {
        match self {
            Self::Vertex => 0x1,
            Self::Hull => 0x2,
            Self::Domain => 0x4,
            Self::Geometry => 0x8,
            Self::Pixel => 0x10,
            Self::Compute => 0x20,
        }
    }
}

impl fmt::Display for ShaderStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Input and output settings of one shader stage
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct StageConfig {
    /// HLSL source file
    pub hlsl: Option<PathBuf>,
    /// Precompiled DXBC/DXIL bytecode file, used instead of `hlsl`
    pub binary: Option<PathBuf>,
    /// Entry point name
    pub entry: String,
    /// Target shader model, either bare (`6_0`) or prefixed (`vs_6_0`)
    pub model: String,
    /// Output path for the ISA disassembly
    pub isa: Option<PathBuf>,
    /// Output path for the statistics block
    pub stats: Option<PathBuf>,
    /// Output path for a dump of the front-end bytecode
    pub bytecode_out: Option<PathBuf>,
    /// Output path for the front-end bytecode disassembly
    pub bytecode_isa: Option<PathBuf>,
}

impl StageConfig {
    /// Returns the HLSL source path when it is set and non-empty
    pub fn hlsl_path(&self) -> Option<&Path> {
        non_empty(&self.hlsl)
    }

    /// Returns the precompiled binary path when it is set and non-empty
    pub fn binary_path(&self) -> Option<&Path> {
        non_empty(&self.binary)
    }

    /// Returns true if either input is populated
    pub fn is_used(&self) -> bool {
        self.hlsl_path().is_some() || self.binary_path().is_some()
    }

    /// Returns the shader model target string for `stage`, e.g. `ps_6_0`
    ///
    /// A model that already carries a stage prefix is returned unchanged.
    pub fn target_profile(&self, stage: ShaderStage) -> String {
        let model = if self.model.is_empty() { DEFAULT_SHADER_MODEL } else { self.model.as_str() };
        let lower = model.to_ascii_lowercase();
        if PROFILE_PREFIXES.iter().any(|prefix| lower.starts_with(prefix)) {
            model.to_string()
        } else {
            format!("{}_{model}", stage.tag().to_ascii_lowercase())
        }
    }
}

/// How the vendor driver module is located
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DriverLoadMode {
    /// Load the module through the system module loader
    #[default]
    Online,
    /// Use a module that has already been injected into the process
    Injected,
}

/// Configuration record for one analyzer invocation
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    /// Only list the supported target GPUs
    pub list_targets: bool,
    /// Target GPU name; the driver default is used when unset
    pub target_gpu: Option<String>,

    /// Vertex stage
    pub vertex: StageConfig,
    /// Hull stage
    pub hull: StageConfig,
    /// Domain stage
    pub domain: StageConfig,
    /// Geometry stage
    pub geometry: StageConfig,
    /// Pixel stage
    pub pixel: StageConfig,
    /// Compute stage
    pub compute: StageConfig,
    /// Shader model applied to every stage that does not name one
    pub all_model: Option<String>,

    /// Preprocessor defines, `NAME` or `NAME=VALUE`
    pub defines: Vec<String>,
    /// Additional include directories, searched after the shader's own directory
    pub include_dirs: Vec<PathBuf>,

    /// Name of the macro holding the root signature definition
    pub rs_macro: Option<String>,
    /// HLSL file that defines `rs_macro`
    pub rs_macro_file: Option<PathBuf>,
    /// Root signature version, e.g. `rootsig_1_1`
    pub rs_macro_version: Option<String>,
    /// Serialized root signature file
    pub rs_serialized: Option<PathBuf>,

    /// Graphics pipeline state description (YAML)
    pub pipeline_state: Option<PathBuf>,
    /// Output path for the compiled pipeline binary
    pub pipeline_binary: Option<PathBuf>,

    /// Ray tracing mode: `pipeline` or `shader`
    pub dxr_mode: Option<String>,
    /// Ray tracing state description file (JSON)
    pub dxr_state_desc: Option<PathBuf>,
    /// Single HLSL file holding the whole ray tracing library
    pub dxr_hlsl: Option<PathBuf>,
    /// Export to compile in shader mode
    pub dxr_export: Option<String>,
    /// Mapping from HLSL library sources to precompiled DXIL libraries (YAML)
    pub dxr_hlsl_mapping: Option<PathBuf>,
    /// Shader model used to compile HLSL libraries
    pub dxr_shader_model: Option<String>,
    /// Per-shader disassembly file name template
    pub dxr_isa: Option<PathBuf>,
    /// Per-shader statistics file name template
    pub dxr_stats: Option<PathBuf>,
    /// Per-pipeline binary file name template
    pub dxr_binary: Option<PathBuf>,
    /// Output metadata file listing every generated pipeline and its artifacts
    pub output_metadata: Option<PathBuf>,

    /// How the driver module is located
    pub driver_load: DriverLoadMode,
    /// Driver module name; defaults to [`DEFAULT_DRIVER_MODULE`]
    pub driver_module: Option<String>,
}

impl Config {
    /// Parses a configuration from YAML content
    ///
    /// # Arguments
    /// * `yaml_content` - YAML string containing the configuration
    pub fn from_yaml(yaml_content: &str) -> Result<Self, serde_norway::Error> {
        serde_norway::from_str(yaml_content)
    }

    /// Parses a configuration from a YAML file
    ///
    /// # Arguments
    /// * `path` - Path to the YAML configuration file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, Box<dyn std::error::Error>> {
        let content = std::fs::read_to_string(path)?;
        Ok(Self::from_yaml(&content)?)
    }

    /// Returns the settings of `stage`
    pub fn stage(&self, stage: ShaderStage) -> &StageConfig {
        match stage {
            ShaderStage::Vertex => &self.vertex,
            ShaderStage::Hull => &self.hull,
            ShaderStage::Domain => &self.domain,
            ShaderStage::Geometry => &self.geometry,
            ShaderStage::Pixel => &self.pixel,
            ShaderStage::Compute => &self.compute,
        }
    }

    /// Returns the settings of `stage` mutably
    pub fn stage_mut(&mut self, stage: ShaderStage) -> &mut StageConfig {
        match stage {
            ShaderStage::Vertex => &mut self.vertex,
            ShaderStage::Hull => &mut self.hull,
            ShaderStage::Domain => &mut self.domain,
            ShaderStage::Geometry => &mut self.geometry,
            ShaderStage::Pixel => &mut self.pixel,
            ShaderStage::Compute => &mut self.compute,
        }
    }

    /// Graphics stages that have an input, in pipeline order
    pub fn used_graphics_stages(&self) -> Vec<ShaderStage> {
        ShaderStage::GRAPHICS.into_iter().filter(|stage| self.stage(*stage).is_used()).collect()
    }

    /// Parsed ray tracing mode, if `dxr_mode` names one
    pub fn ray_tracing_mode(&self) -> Option<RayTracingMode> {
        self.dxr_mode.as_deref().and_then(RayTracingMode::parse)
    }

    /// Root signature version, falling back to [`DEFAULT_ROOT_SIGNATURE_VERSION`]
    pub fn root_signature_version(&self) -> &str {
        self.rs_macro_version.as_deref().filter(|v| !v.is_empty()).unwrap_or(DEFAULT_ROOT_SIGNATURE_VERSION)
    }

    /// Driver module name, falling back to [`DEFAULT_DRIVER_MODULE`]
    pub fn driver_module_name(&self) -> &str {
        self.driver_module.as_deref().filter(|m| !m.is_empty()).unwrap_or(DEFAULT_DRIVER_MODULE)
    }
}

/// Ray tracing compilation mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RayTracingMode {
    /// Compile the whole state object into one or more pipelines
    Pipeline,
    /// Compile a single export in isolation
    Shader,
}

impl RayTracingMode {
    /// Parses a mode string case-insensitively
    pub fn parse(mode: &str) -> Option<Self> {
        if mode.eq_ignore_ascii_case("pipeline") {
            Some(Self::Pipeline)
        } else if mode.eq_ignore_ascii_case("shader") {
            Some(Self::Shader)
        } else {
            None
        }
    }
}

/// Returns the path inside `path` when it is set and non-empty
pub(crate) fn non_empty(path: &Option<PathBuf>) -> Option<&Path> {
    path.as_deref().filter(|p| !p.as_os_str().is_empty())
}
