//! Driver module loading through the system dynamic loader
//!
//! Online mode loads the module by name; injected mode only looks up a module that
//! another component already loaded into the process, which the system loader
//! supports on Windows only. A module is accepted once it exports the extension
//! entry point.

use super::driver::{DriverLoader, DriverModule, ExtensionFactory};
use crate::error::DriverStatus;
use libloading::Library;
use std::ffi::c_void;

/// Exported function through which the driver hands out its extension interfaces
pub const EXTENSION_ENTRY_POINT: &str = "AmdExtD3DCreateInterface";

/// Status reported when the extension cannot be bound to a device
pub const E_NOINTERFACE: i32 = 0x8000_4002_u32 as i32;

type CreateInterface = unsafe extern "system" fn(outer: *mut c_void, iid: *const c_void, object: *mut *mut c_void) -> i32;

/// [`DriverLoader`] backed by the system dynamic loader
#[derive(Debug, Clone, Copy, Default)]
pub struct DynamicLibraryLoader;

impl DriverLoader for DynamicLibraryLoader {
    fn load_module(&self, name: &str) -> Result<Box<dyn DriverModule>, String> {
        // SAFETY: the driver module runs no initialization beyond the system loader's
        let library = unsafe { Library::new(name) }.map_err(|e| e.to_string())?;
        Ok(Box::new(NativeDriverModule::new(library)?))
    }

    #[cfg(windows)]
    fn find_loaded_module(&self, name: &str) -> Result<Box<dyn DriverModule>, String> {
        let library = libloading::os::windows::Library::open_already_loaded(name).map_err(|e| e.to_string())?;
        Ok(Box::new(NativeDriverModule::new(library.into())?))
    }

    #[cfg(not(windows))]
    fn find_loaded_module(&self, _name: &str) -> Result<Box<dyn DriverModule>, String> {
        Err("looking up an already loaded driver module is only supported on Windows".to_string())
    }
}

/// A driver module exporting [`EXTENSION_ENTRY_POINT`]
pub struct NativeDriverModule {
    library: Library,
}

impl NativeDriverModule {
    /// Wraps `library` after checking that it exports the extension entry point
    pub fn new(library: Library) -> Result<Self, String> {
        let module = Self { library };
        module.entry_point().map_err(|e| format!("the module does not export {EXTENSION_ENTRY_POINT}: {e}"))?;
        Ok(module)
    }

    fn entry_point(&self) -> Result<libloading::Symbol<'_, CreateInterface>, libloading::Error> {
        // SAFETY: the symbol type matches the exported entry point
        unsafe { self.library.get::<CreateInterface>(EXTENSION_ENTRY_POINT.as_bytes()) }
    }
}

impl DriverModule for NativeDriverModule {
    fn create_extension_factory(&self) -> Result<Box<dyn ExtensionFactory>, DriverStatus> {
        self.entry_point().map_err(|e| DriverStatus::new(E_NOINTERFACE, e.to_string()))?;
        // The entry point needs the Direct3D 12 device the extension attaches to
        Err(DriverStatus::new(
            E_NOINTERFACE,
            format!("{EXTENSION_ENTRY_POINT} requires a Direct3D 12 device, and no device binding is available in this build"),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::AnalyzerSession;
    use crate::config::DriverLoadMode;
    use crate::error::Error;

    #[test]
    fn test_missing_module_fails_driver_init() {
        let dir = tempfile::tempdir().unwrap();
        let name = dir.path().join("missing_driver_module.dll");

        let error = AnalyzerSession::open(&DynamicLibraryLoader, DriverLoadMode::Online, &name.to_string_lossy()).err().unwrap();
        assert!(matches!(&error, Error::DriverInit(message) if message.contains("missing_driver_module.dll")), "{error}");
    }

    #[test]
    fn test_module_not_loaded_fails_driver_init() {
        let error = AnalyzerSession::open(&DynamicLibraryLoader, DriverLoadMode::Injected, "missing_driver_module.dll").err().unwrap();
        assert!(matches!(error, Error::DriverInit(_)));
    }

    #[test]
    fn test_file_that_is_not_a_module() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("driver.dll");
        std::fs::write(&path, b"not a module").unwrap();

        assert!(DynamicLibraryLoader.load_module(&path.to_string_lossy()).is_err());
    }
}
