//! Shader analyzer extension interface
//!
//! [`ShaderAnalyzer`] is the boundary to the vendor driver's shader introspection
//! extension. Every call either succeeds or returns the driver's [`DriverStatus`];
//! variable-length outputs use the size-then-fill protocol (see [`super::buffer`]).

use crate::dxr::graph::StateObjectDesc;
use crate::error::DriverStatus;
use crate::frontend::compiler::CompiledStage;
use crate::frontend::pipeline_state::PipelineStateDesc;
use crate::results::{RayTracingStats, ShaderStats};

/// Root signature registered with the device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RootSignatureHandle(pub u64);

/// Compute or graphics pipeline created by the driver
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PipelineHandle(pub u64);

/// Ray tracing state object created by the driver
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StateObjectHandle(pub u64);

/// Compute pipeline descriptor
#[derive(Debug, Clone, Copy)]
pub struct ComputePipelineDesc<'a> {
    /// Registered root signature
    pub root_signature: RootSignatureHandle,
    /// Compute shader bytecode
    pub shader: &'a [u8],
}

/// Graphics pipeline descriptor
#[derive(Debug, Clone, Copy)]
pub struct GraphicsPipelineDesc<'a> {
    /// Registered root signature
    pub root_signature: RootSignatureHandle,
    /// Bytecode of the used stages, in pipeline order
    pub stages: &'a [CompiledStage],
    /// Non-shader pipeline state
    pub state: &'a PipelineStateDesc,
}

/// Output of compute pipeline creation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComputePipelineOutput {
    /// Created pipeline
    pub handle: PipelineHandle,
    /// Statistics of the compute shader
    pub stats: ShaderStats,
    /// Thread group dimensions
    pub thread_group: [u32; 3],
}

/// Output of graphics pipeline creation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GraphicsPipelineOutput {
    /// Created pipeline
    pub handle: PipelineHandle,
    /// Statistics of every physical shader; merged shaders carry several mask bits
    pub shaders: Vec<ShaderStats>,
}

/// What the driver compiles a state object into
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StateObjectMode {
    /// Compile one export in isolation
    Shader {
        /// Export to compile
        export: String,
    },
    /// Compile the whole state object into as many pipelines as the driver chooses
    Pipeline,
}

/// One pipeline generated from a state object
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedPipeline {
    /// Whether one physical shader implements the whole pipeline
    pub unified: bool,
    /// Raygeneration shader of the pipeline, if the driver names one
    pub raygen: Option<String>,
    /// Export names of the participating shaders
    pub shaders: Vec<String>,
}

/// Output of state object creation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateObjectOutput {
    /// Created state object
    pub handle: StateObjectHandle,
    /// Generated pipelines, in driver order
    pub pipelines: Vec<GeneratedPipeline>,
}

/// Object whose disassembly is queried
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactTarget<'a> {
    /// Every stage of a compute or graphics pipeline, as one stage-keyed document
    Pipeline(PipelineHandle),
    /// One shader of a generated ray tracing pipeline
    RayTracingShader {
        /// State object
        handle: StateObjectHandle,
        /// Index of the generated pipeline
        pipeline: usize,
        /// Export name of the shader
        export: &'a str,
    },
}

/// Driver shader analyzer extension
///
/// Methods taking `buffer: Option<&mut [u8]>` implement the size-then-fill
/// protocol: with `None` they return the required size, with a buffer they fill
/// it and return the number of bytes written.
pub trait ShaderAnalyzer {
    /// NUL-separated list of supported target GPU names
    fn list_gpus(&self, buffer: Option<&mut [u8]>) -> Result<usize, DriverStatus>;

    /// Selects the GPU subsequent compilations target
    fn set_target_gpu(&mut self, name: &str) -> Result<(), DriverStatus>;

    /// Registers a root signature blob (serialized, or a container embedding one)
    fn create_root_signature(&mut self, blob: &[u8]) -> Result<RootSignatureHandle, DriverStatus>;

    /// Creates a compute pipeline and reports its shader statistics
    fn create_compute_pipeline(&mut self, desc: &ComputePipelineDesc<'_>) -> Result<ComputePipelineOutput, DriverStatus>;

    /// Creates a graphics pipeline and reports the statistics of its physical shaders
    fn create_graphics_pipeline(&mut self, desc: &GraphicsPipelineDesc<'_>) -> Result<GraphicsPipelineOutput, DriverStatus>;

    /// Creates a ray tracing state object
    fn create_state_object(&mut self, desc: &StateObjectDesc, mode: &StateObjectMode) -> Result<StateObjectOutput, DriverStatus>;

    /// Statistics of one shader of a generated ray tracing pipeline
    fn ray_tracing_shader_stats(&self, handle: StateObjectHandle, pipeline: usize, export: &str) -> Result<(ShaderStats, RayTracingStats), DriverStatus>;

    /// Disassembly document of `target`
    fn disassembly(&self, target: ArtifactTarget<'_>, buffer: Option<&mut [u8]>) -> Result<usize, DriverStatus>;

    /// Compiled binary of a compute or graphics pipeline
    fn binary(&self, handle: PipelineHandle, buffer: Option<&mut [u8]>) -> Result<usize, DriverStatus>;

    /// Number of pipeline binaries of a state object
    fn pipeline_binary_count(&self, handle: StateObjectHandle) -> Result<usize, DriverStatus>;

    /// Compiled binary of one generated ray tracing pipeline
    fn pipeline_binary(&self, handle: StateObjectHandle, index: usize, buffer: Option<&mut [u8]>) -> Result<usize, DriverStatus>;
}
