//! Driver module loading and the analyzer session
//!
//! The driver module, its extension factory and the shader analyzer are owned by a
//! single [`AnalyzerSession`] for the lifetime of one invocation. Nothing is kept
//! in process-wide state.

use super::analyzer::ShaderAnalyzer;
use super::buffer::{retrieve_string, split_names};
use crate::config::DriverLoadMode;
use crate::error::{DriverStatus, Error, Result};

/// Locates the vendor driver module
pub trait DriverLoader {
    /// Loads the module through the system module loader
    fn load_module(&self, name: &str) -> Result<Box<dyn DriverModule>, String>;

    /// Finds a module that has already been loaded into the process
    fn find_loaded_module(&self, name: &str) -> Result<Box<dyn DriverModule>, String>;
}

/// A loaded driver module
pub trait DriverModule {
    /// Obtains the extension factory bound to the active device
    fn create_extension_factory(&self) -> Result<Box<dyn ExtensionFactory>, DriverStatus>;
}

/// Driver extension factory
pub trait ExtensionFactory {
    /// Creates the shader analyzer extension
    fn create_shader_analyzer(&self) -> Result<Box<dyn ShaderAnalyzer>, DriverStatus>;
}

/// Exclusive owner of the driver resources of one invocation
///
/// Fields drop in declaration order, so the analyzer is released before the
/// factory and the module that created it.
pub struct AnalyzerSession {
    analyzer: Box<dyn ShaderAnalyzer>,
    _factory: Box<dyn ExtensionFactory>,
    _module: Box<dyn DriverModule>,
}

impl AnalyzerSession {
    /// Loads the driver module and acquires the shader analyzer
    ///
    /// # Arguments
    /// * `loader` - Module loader
    /// * `mode` - Whether to load the module or use an already injected one
    /// * `module_name` - Driver module name
    pub fn open(loader: &dyn DriverLoader, mode: DriverLoadMode, module_name: &str) -> Result<Self> {
        let module = match mode {
            DriverLoadMode::Online => loader.load_module(module_name),
            DriverLoadMode::Injected => loader.find_loaded_module(module_name),
        }
        .map_err(|e| Error::DriverInit(format!("could not locate driver module '{module_name}': {e}")))?;

        let factory = module
            .create_extension_factory()
            .map_err(|status| Error::DriverInit(format!("could not create the extension factory: {status}")))?;
        let analyzer = factory
            .create_shader_analyzer()
            .map_err(|status| Error::DriverInit(format!("could not create the shader analyzer extension: {status}")))?;

        tracing::info!("Loaded driver module {module_name} ({mode:?})");
        Ok(Self {
            analyzer,
            _factory: factory,
            _module: module,
        })
    }

    /// Target GPUs supported by the driver
    pub fn list_targets(&self) -> Result<Vec<String>> {
        let list = retrieve_string(|buffer| self.analyzer.list_gpus(buffer)).map_err(|status| Error::driver("failed to list the supported targets", status))?;
        Ok(split_names(&list))
    }

    /// Selects the target GPU
    ///
    /// The name is matched case-insensitively against the supported targets and
    /// passed to the driver in its canonical spelling.
    pub fn select_target(&mut self, name: &str) -> Result<()> {
        let targets = self.list_targets()?;
        let Some(target) = targets.iter().find(|target| target.eq_ignore_ascii_case(name)) else {
            return Err(Error::DriverInit(format!("unsupported target GPU '{name}'; supported targets: {}", targets.join(", "))));
        };

        self.analyzer.set_target_gpu(target).map_err(|status| Error::driver(format!("failed to select target GPU '{target}'"), status))?;
        tracing::info!("Targeting {target}");
        Ok(())
    }

    pub(crate) fn analyzer(&self) -> &dyn ShaderAnalyzer {
        self.analyzer.as_ref()
    }

    pub(crate) fn analyzer_mut(&mut self) -> &mut dyn ShaderAnalyzer {
        self.analyzer.as_mut()
    }
}
