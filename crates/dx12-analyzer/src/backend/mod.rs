//! Driver extension interop
//!
//! Loads the vendor driver module, owns the shader analyzer extension for the
//! invocation, creates pipelines and state objects through it and pulls back
//! statistics, disassembly and binaries.

pub mod analyzer;
pub mod buffer;
pub mod disassembly;
pub mod driver;
pub mod interop;
pub mod loader;

pub use analyzer::*;
pub use driver::{AnalyzerSession, DriverLoader, DriverModule, ExtensionFactory};
pub use interop::{ArtifactRequest, RayTracingShaderArtifacts, raygen_name};
pub use loader::{DynamicLibraryLoader, NativeDriverModule};
