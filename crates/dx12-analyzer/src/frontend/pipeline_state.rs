//! Graphics pipeline state description
//!
//! The non-shader part of a graphics pipeline (blend, rasterizer, depth-stencil,
//! input layout, topology and output formats) is read from a YAML description.
//! Every field is optional and falls back to the Direct3D 12 default state, so a
//! description only needs to list what differs.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

/// Maximum number of simultaneous render targets
pub const MAX_RENDER_TARGETS: usize = 8;

/// Primitive topology class the pipeline is built for
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PrimitiveTopologyType {
    /// Points
    Point,
    /// Lines
    Line,
    /// Triangles
    #[default]
    Triangle,
    /// Tessellation control points; required with hull and domain shaders
    Patch,
}

/// Polygon fill mode
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FillMode {
    /// Draw edges only
    Wireframe,
    /// Fill polygons
    #[default]
    Solid,
}

/// Face culling mode
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CullMode {
    /// Draw all faces
    None,
    /// Cull front faces
    Front,
    /// Cull back faces
    #[default]
    Back,
}

/// Comparison function for depth and stencil tests
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ComparisonFunc {
    /// Never pass
    Never,
    /// Pass if less
    #[default]
    Less,
    /// Pass if equal
    Equal,
    /// Pass if less or equal
    LessEqual,
    /// Pass if greater
    Greater,
    /// Pass if not equal
    NotEqual,
    /// Pass if greater or equal
    GreaterEqual,
    /// Always pass
    Always,
}

/// Blend state of one render target
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct RenderTargetBlend {
    /// Enable blending
    pub blend_enable: bool,
    /// Enable logic operations
    pub logic_op_enable: bool,
    /// Source color factor, e.g. `one`, `src_alpha`
    pub src_blend: String,
    /// Destination color factor
    pub dest_blend: String,
    /// Color blend operation, e.g. `add`
    pub blend_op: String,
    /// Source alpha factor
    pub src_blend_alpha: String,
    /// Destination alpha factor
    pub dest_blend_alpha: String,
    /// Alpha blend operation
    pub blend_op_alpha: String,
    /// Logic operation
    pub logic_op: String,
    /// Color write mask (bit 0 = red ... bit 3 = alpha)
    pub render_target_write_mask: u8,
}

impl Default for RenderTargetBlend {
    fn default() -> Self {
        Self {
            blend_enable: false,
            logic_op_enable: false,
            src_blend: "one".to_string(),
            dest_blend: "zero".to_string(),
            blend_op: "add".to_string(),
            src_blend_alpha: "one".to_string(),
            dest_blend_alpha: "zero".to_string(),
            blend_op_alpha: "add".to_string(),
            logic_op: "noop".to_string(),
            render_target_write_mask: 0xf,
        }
    }
}

/// Blend state
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct BlendDesc {
    /// Use alpha-to-coverage
    pub alpha_to_coverage_enable: bool,
    /// Use a different blend state per render target
    pub independent_blend_enable: bool,
    /// Per render target blend state
    pub render_targets: Vec<RenderTargetBlend>,
}

/// Rasterizer state
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct RasterizerDesc {
    /// Fill mode
    pub fill_mode: FillMode,
    /// Cull mode
    pub cull_mode: CullMode,
    /// Counter-clockwise triangles are front facing
    pub front_counter_clockwise: bool,
    /// Constant depth bias
    pub depth_bias: i32,
    /// Maximum depth bias
    pub depth_bias_clamp: f32,
    /// Slope scaled depth bias
    pub slope_scaled_depth_bias: f32,
    /// Clip based on distance
    pub depth_clip_enable: bool,
    /// Use the quadrilateral line anti-aliasing algorithm
    pub multisample_enable: bool,
    /// Enable line anti-aliasing
    pub antialiased_line_enable: bool,
    /// Forced sample count for UAV-only rendering
    pub forced_sample_count: u32,
    /// Enable conservative rasterization
    pub conservative_raster: bool,
}

impl Default for RasterizerDesc {
    fn default() -> Self {
        Self {
            fill_mode: FillMode::Solid,
            cull_mode: CullMode::Back,
            front_counter_clockwise: false,
            depth_bias: 0,
            depth_bias_clamp: 0.0,
            slope_scaled_depth_bias: 0.0,
            depth_clip_enable: true,
            multisample_enable: false,
            antialiased_line_enable: false,
            forced_sample_count: 0,
            conservative_raster: false,
        }
    }
}

/// Depth-stencil state
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct DepthStencilDesc {
    /// Enable depth testing
    pub depth_enable: bool,
    /// Write depth
    pub depth_write: bool,
    /// Depth comparison
    pub depth_func: ComparisonFunc,
    /// Enable stencil testing
    pub stencil_enable: bool,
    /// Stencil read mask
    pub stencil_read_mask: u8,
    /// Stencil write mask
    pub stencil_write_mask: u8,
}

impl Default for DepthStencilDesc {
    fn default() -> Self {
        Self {
            depth_enable: true,
            depth_write: true,
            depth_func: ComparisonFunc::Less,
            stencil_enable: false,
            stencil_read_mask: 0xff,
            stencil_write_mask: 0xff,
        }
    }
}

/// One element of the vertex input layout
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct InputElement {
    /// HLSL semantic name
    pub semantic_name: String,
    /// Semantic index
    #[serde(default)]
    pub semantic_index: u32,
    /// DXGI format name
    pub format: String,
    /// Input slot
    #[serde(default)]
    pub input_slot: u32,
    /// Byte offset within the vertex; `None` appends after the previous element
    #[serde(default)]
    pub aligned_byte_offset: Option<u32>,
    /// Per-instance data step rate; zero for per-vertex data
    #[serde(default)]
    pub instance_data_step_rate: u32,
}

/// Complete non-shader state of a graphics pipeline
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct PipelineStateDesc {
    /// Blend state
    pub blend: BlendDesc,
    /// Rasterizer state
    pub rasterizer: RasterizerDesc,
    /// Depth-stencil state
    pub depth_stencil: DepthStencilDesc,
    /// Vertex input layout
    pub input_layout: Vec<InputElement>,
    /// Primitive topology class
    pub primitive_topology: PrimitiveTopologyType,
    /// Render target formats (DXGI format names)
    pub render_target_formats: Vec<String>,
    /// Depth-stencil format (DXGI format name)
    pub depth_stencil_format: String,
    /// Sample mask
    pub sample_mask: u32,
    /// Multisample count
    pub sample_count: u32,
    /// Multisample quality
    pub sample_quality: u32,
}

impl Default for PipelineStateDesc {
    fn default() -> Self {
        Self {
            blend: BlendDesc::default(),
            rasterizer: RasterizerDesc::default(),
            depth_stencil: DepthStencilDesc::default(),
            input_layout: Vec::new(),
            primitive_topology: PrimitiveTopologyType::Triangle,
            render_target_formats: vec!["DXGI_FORMAT_R8G8B8A8_UNORM".to_string()],
            depth_stencil_format: "DXGI_FORMAT_UNKNOWN".to_string(),
            sample_mask: u32::MAX,
            sample_count: 1,
            sample_quality: 0,
        }
    }
}

impl PipelineStateDesc {
    /// Parses a description from YAML content and validates it
    ///
    /// # Arguments
    /// * `yaml_content` - YAML string containing the description
    pub fn from_yaml(yaml_content: &str) -> Result<Self, Box<dyn std::error::Error>> {
        let desc: Self = serde_norway::from_str(yaml_content)?;
        desc.validate()?;
        Ok(desc)
    }

    /// Parses a description from a YAML file and validates it
    ///
    /// # Arguments
    /// * `path` - Path to the YAML description
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, Box<dyn std::error::Error>> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Checks the description for values the driver would reject
    pub fn validate(&self) -> Result<(), PipelineStateError> {
        if self.render_target_formats.len() > MAX_RENDER_TARGETS {
            return Err(PipelineStateError::TooManyRenderTargets(self.render_target_formats.len()));
        }
        if self.blend.render_targets.len() > MAX_RENDER_TARGETS {
            return Err(PipelineStateError::TooManyBlendTargets(self.blend.render_targets.len()));
        }
        if self.sample_count == 0 {
            return Err(PipelineStateError::ZeroSampleCount);
        }
        if let Some(index) = self.input_layout.iter().position(|element| element.semantic_name.is_empty()) {
            return Err(PipelineStateError::EmptySemanticName(index));
        }
        Ok(())
    }
}

/// Errors found while validating a pipeline state description
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineStateError {
    /// More render target formats than the hardware supports (count)
    TooManyRenderTargets(usize),
    /// More blend states than render targets the hardware supports (count)
    TooManyBlendTargets(usize),
    /// Sample count of zero
    ZeroSampleCount,
    /// Input element without a semantic name (element index)
    EmptySemanticName(usize),
}

impl fmt::Display for PipelineStateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TooManyRenderTargets(count) => write!(f, "{count} render target formats given, at most {MAX_RENDER_TARGETS} are supported"),
            Self::TooManyBlendTargets(count) => write!(f, "{count} render target blend states given, at most {MAX_RENDER_TARGETS} are supported"),
            Self::ZeroSampleCount => write!(f, "sample count must be at least 1"),
            Self::EmptySemanticName(index) => write!(f, "input element {index} has an empty semantic name"),
        }
    }
}

impl std::error::Error for PipelineStateError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_for_empty_description() {
        let desc = PipelineStateDesc::from_yaml("{}").unwrap();
        assert_eq!(desc, PipelineStateDesc::default());
        assert_eq!(desc.rasterizer.cull_mode, CullMode::Back);
        assert!(desc.depth_stencil.depth_enable);
        assert_eq!(desc.sample_mask, u32::MAX);
    }

    #[test]
    fn test_description_parsing() {
        let yaml = r#"
primitive_topology: patch
rasterizer:
  cull_mode: none
  fill_mode: wireframe
depth_stencil:
  depth_func: greater_equal
input_layout:
  - semantic_name: POSITION
    format: DXGI_FORMAT_R32G32B32_FLOAT
  - semantic_name: TEXCOORD
    format: DXGI_FORMAT_R32G32_FLOAT
    aligned_byte_offset: 12
render_target_formats:
  - DXGI_FORMAT_R16G16B16A16_FLOAT
  - DXGI_FORMAT_R8G8B8A8_UNORM
depth_stencil_format: DXGI_FORMAT_D32_FLOAT
"#;

        let desc = PipelineStateDesc::from_yaml(yaml).unwrap();
        assert_eq!(desc.primitive_topology, PrimitiveTopologyType::Patch);
        assert_eq!(desc.rasterizer.cull_mode, CullMode::None);
        assert_eq!(desc.rasterizer.fill_mode, FillMode::Wireframe);
        assert!(desc.rasterizer.depth_clip_enable);
        assert_eq!(desc.depth_stencil.depth_func, ComparisonFunc::GreaterEqual);
        assert_eq!(desc.input_layout.len(), 2);
        assert_eq!(desc.input_layout[0].aligned_byte_offset, None);
        assert_eq!(desc.input_layout[1].aligned_byte_offset, Some(12));
        assert_eq!(desc.render_target_formats.len(), 2);
    }

    #[test]
    fn test_validation() {
        let yaml = "render_target_formats: [A, B, C, D, E, F, G, H, I]";
        assert!(PipelineStateDesc::from_yaml(yaml).is_err());

        let desc = PipelineStateDesc {
            sample_count: 0,
            ..Default::default()
        };
        assert_eq!(desc.validate(), Err(PipelineStateError::ZeroSampleCount));
    }

    #[test]
    fn test_unknown_enum_value_is_rejected() {
        assert!(PipelineStateDesc::from_yaml("primitive_topology: hexagon").is_err());
    }
}
