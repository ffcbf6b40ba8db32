//! Per-shader and per-pipeline result records

use crate::config::ShaderStage;
use serde::{Deserialize, Serialize};

/// Register file usage of one register class
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct RegisterUsage {
    /// Registers used by the shader
    pub used: u32,
    /// Registers available to the shader
    pub available: u32,
    /// Physical registers of the hardware
    pub physical: u32,
}

/// Hardware resource usage of one physical shader
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct ShaderStats {
    /// Logical stages implemented by this physical shader ([`ShaderStage::mask_bit`])
    pub stage_mask: u32,
    /// Vector registers
    pub vgprs: RegisterUsage,
    /// Scalar registers
    pub sgprs: RegisterUsage,
    /// LDS available per work group, in bytes
    pub lds_size_bytes: u32,
    /// LDS used, in bytes
    pub lds_usage_bytes: u32,
    /// Scratch memory used, in bytes
    pub scratch_bytes: u32,
    /// Size of the compiled ISA, in bytes
    pub isa_size_bytes: u32,
}

impl ShaderStats {
    /// Returns true if the stage mask covers `stage`
    pub fn covers(&self, stage: ShaderStage) -> bool {
        self.stage_mask & stage.mask_bit() != 0
    }

    /// Returns true if the hardware merged several logical stages into this shader
    pub fn is_merged(&self) -> bool {
        self.stage_mask.count_ones() > 1
    }
}

/// Statistics only reported for ray tracing shaders
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct RayTracingStats {
    /// Stack size, in bytes
    pub stack_size_bytes: u32,
    /// Whether the shader was inlined into its caller
    pub inlined: bool,
}

/// Variant-specific part of a shader result
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShaderResultKind {
    /// Compute or graphics shader
    Standard,
    /// Ray tracing shader
    RayTracing(RayTracingStats),
}

/// Result record of one shader
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShaderResult {
    /// Hardware resource usage
    pub stats: ShaderStats,
    /// ISA disassembly, if it was extracted
    pub disassembly: Option<String>,
    /// Variant-specific data
    pub kind: ShaderResultKind,
}

impl ShaderResult {
    /// Creates the result of a compute or graphics shader
    pub fn standard(stats: ShaderStats) -> Self {
        Self {
            stats,
            disassembly: None,
            kind: ShaderResultKind::Standard,
        }
    }

    /// Creates the result of a ray tracing shader
    pub fn ray_tracing(stats: ShaderStats, ray_tracing: RayTracingStats) -> Self {
        Self {
            stats,
            disassembly: None,
            kind: ShaderResultKind::RayTracing(ray_tracing),
        }
    }

    /// Ray tracing statistics, for ray tracing shaders
    pub fn ray_tracing_stats(&self) -> Option<&RayTracingStats> {
        match &self.kind {
            ShaderResultKind::RayTracing(stats) => Some(stats),
            ShaderResultKind::Standard => None,
        }
    }
}

/// Results of the five graphics stages
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GraphicsPipelineResult {
    /// Vertex stage
    pub vertex: Option<ShaderResult>,
    /// Hull stage
    pub hull: Option<ShaderResult>,
    /// Domain stage
    pub domain: Option<ShaderResult>,
    /// Geometry stage
    pub geometry: Option<ShaderResult>,
    /// Pixel stage
    pub pixel: Option<ShaderResult>,
}

impl GraphicsPipelineResult {
    /// Builds the per-stage results from the physical shaders reported by the driver
    ///
    /// A physical shader whose mask covers several stages (a merged shader) is
    /// copied into every covered stage, so each stage reports the statistics of
    /// the hardware shader that implements it.
    pub fn from_physical_shaders(shaders: &[ShaderStats]) -> Self {
        let mut result = Self::default();
        for stats in shaders {
            for stage in ShaderStage::GRAPHICS {
                if stats.covers(stage) {
                    *result.slot_mut(stage) = Some(ShaderResult::standard(*stats));
                }
            }
        }
        result
    }

    /// Result of `stage`; `None` for compute or unused stages
    pub fn get(&self, stage: ShaderStage) -> Option<&ShaderResult> {
        match stage {
            ShaderStage::Vertex => self.vertex.as_ref(),
            ShaderStage::Hull => self.hull.as_ref(),
            ShaderStage::Domain => self.domain.as_ref(),
            ShaderStage::Geometry => self.geometry.as_ref(),
            ShaderStage::Pixel => self.pixel.as_ref(),
            ShaderStage::Compute => None,
        }
    }

    /// Mutable result of `stage`
    pub fn get_mut(&mut self, stage: ShaderStage) -> Option<&mut ShaderResult> {
        match stage {
            ShaderStage::Compute => None,
            _ => self.slot_mut(stage).as_mut(),
        }
    }

    /// Graphics stages that have a result, in pipeline order
    pub fn stages(&self) -> impl Iterator<Item = (ShaderStage, &ShaderResult)> {
        ShaderStage::GRAPHICS.into_iter().filter_map(|stage| self.get(stage).map(|result| (stage, result)))
    }

    fn slot_mut(&mut self, stage: ShaderStage) -> &mut Option<ShaderResult> {
        match stage {
            ShaderStage::Vertex | ShaderStage::Compute => &mut self.vertex,
            ShaderStage::Hull => &mut self.hull,
            ShaderStage::Domain => &mut self.domain,
            ShaderStage::Geometry => &mut self.geometry,
            ShaderStage::Pixel => &mut self.pixel,
        }
    }
}

/// Result of a compute pipeline
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComputePipelineResult {
    /// The compute shader
    pub shader: ShaderResult,
    /// Thread group dimensions (x, y, z)
    pub thread_group: [u32; 3],
}

/// Result of a compute or graphics pipeline
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineResult {
    /// Graphics pipeline
    Graphics(GraphicsPipelineResult),
    /// Compute pipeline
    Compute(ComputePipelineResult),
}

impl PipelineResult {
    /// Result of `stage`, if the pipeline has one
    pub fn stage(&self, stage: ShaderStage) -> Option<&ShaderResult> {
        match (self, stage) {
            (Self::Compute(compute), ShaderStage::Compute) => Some(&compute.shader),
            (Self::Compute(_), _) => None,
            (Self::Graphics(graphics), stage) => graphics.get(stage),
        }
    }

    /// Mutable result of `stage`
    pub fn stage_mut(&mut self, stage: ShaderStage) -> Option<&mut ShaderResult> {
        match (self, stage) {
            (Self::Compute(compute), ShaderStage::Compute) => Some(&mut compute.shader),
            (Self::Compute(_), _) => None,
            (Self::Graphics(graphics), stage) => graphics.get_mut(stage),
        }
    }
}
