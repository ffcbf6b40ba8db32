//! Ray tracing state objects
//!
//! The state description is turned into a subobject graph, compiled by the driver
//! in shader or pipeline mode, and its generated pipelines are extracted.

pub mod compile;
pub mod graph;
pub mod naming;
pub mod state_desc;

pub use compile::{RayTracingOutput, RayTracingPipelineResult, RayTracingShaderResult, compile_ray_tracing};
pub use graph::{StateObjectDesc, StateObjectGraph, Subobject};
pub use state_desc::RayTracingStateDesc;
