//! Error and warning types
//!
//! Fatal failures abort the current compilation unit and surface as [`Error`].
//! Problems that only affect one output item are [`Warning`]s: they are logged
//! where they happen and collected in an [`ExtractionReport`] so callers can
//! report them per item while the run continues.

use crate::validate::ConfigError;
use std::fmt;
use std::path::PathBuf;

/// Result alias used throughout the crate
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Status reported by a failed driver extension call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DriverStatus {
    /// Raw status code returned by the driver
    pub code: i32,
    /// Short description of the failing call
    pub message: String,
}

impl DriverStatus {
    /// Creates a new driver status
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self { code, message: message.into() }
    }
}

impl fmt::Display for DriverStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (status {:#x})", self.message, self.code)
    }
}

impl std::error::Error for DriverStatus {}

/// Fatal errors
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Mutually exclusive or missing inputs; detected before any compilation work
    #[error("invalid configuration: {0}")]
    Configuration(#[from] ConfigError),

    /// Front-end compilation of a shader stage failed
    #[error("failed to compile {stage} shader: {message}")]
    Compilation {
        /// Stage or library that failed
        stage: String,
        /// Compiler output
        message: String,
    },

    /// No root signature could be resolved
    #[error("{0}")]
    RootSignature(String),

    /// Loading the driver module or acquiring the extension interface failed
    #[error("failed to initialize the driver extension: {0}")]
    DriverInit(String),

    /// A driver call failed for the current compilation unit
    #[error("{context}: {status}")]
    Driver {
        /// What was being done
        context: String,
        /// Driver status
        status: DriverStatus,
    },

    /// The graphics pipeline state description could not be loaded
    #[error("failed to load pipeline state description '{}': {message}", path.display())]
    PipelineState {
        /// Description file
        path: PathBuf,
        /// Parser output
        message: String,
    },

    /// The ray tracing state description is malformed or inconsistent
    #[error("invalid ray tracing state description: {0}")]
    StateDescription(String),

    /// A required input file could not be read
    #[error("failed to read '{}': {source}", path.display())]
    Io {
        /// File that failed
        path: PathBuf,
        /// Underlying error
        source: std::io::Error,
    },
}

impl Error {
    /// Wraps a driver status with context
    pub fn driver(context: impl Into<String>, status: DriverStatus) -> Self {
        Self::Driver { context: context.into(), status }
    }

    /// Wraps an I/O error with the path that caused it
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io { path: path.into(), source }
    }
}

/// Non-fatal problems reported per item
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Warning {
    /// Retrieving a statistics block, disassembly or binary from the driver failed
    Extraction {
        /// Stage, shader or pipeline the artifact belongs to
        item: String,
        /// Which artifact
        artifact: &'static str,
        /// Failure description
        reason: String,
    },
    /// The requested output is not supported for this combination of inputs
    Unsupported {
        /// Description of the skipped output
        message: String,
    },
    /// Writing an output file failed
    Output {
        /// File that could not be written
        path: PathBuf,
        /// Failure description
        reason: String,
    },
    /// Two items of one run expanded to the same output file
    NameCollision {
        /// File claimed by an earlier item
        path: PathBuf,
        /// Item whose output was dropped
        item: String,
    },
    /// An output file name template could not be expanded
    Template {
        /// Offending template
        template: PathBuf,
        /// Item whose output was dropped
        item: String,
    },
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Extraction { item, artifact, reason } => write!(f, "failed to extract {artifact} for {item}: {reason}"),
            Self::Unsupported { message } => write!(f, "{message}"),
            Self::Output { path, reason } => write!(f, "failed to write '{}': {reason}", path.display()),
            Self::NameCollision { path, item } => {
                write!(f, "output file '{}' is already used by another item of this run; no output produced for {item}", path.display())
            }
            Self::Template { template, item } => {
                write!(f, "output file name template '{}' must contain exactly one '*'; no output produced for {item}", template.display())
            }
        }
    }
}

/// Warnings collected over one run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractionReport {
    /// Warnings in the order they were raised
    pub warnings: Vec<Warning>,
}

impl ExtractionReport {
    /// Logs `warning` and records it
    pub fn push(&mut self, warning: Warning) {
        tracing::warn!("{warning}");
        self.warnings.push(warning);
    }

    /// Returns true if nothing went wrong
    pub fn is_clean(&self) -> bool {
        self.warnings.is_empty()
    }
}
