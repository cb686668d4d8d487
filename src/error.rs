//! Error handling for thermview
//!
//! Each concern gets its own error enum so the controller can match on the
//! exact failure (an `OpenError::PermissionDenied` is handled differently from
//! a `ReadError::DeviceDetached`). [`ThermviewError`] wraps them all for code
//! that only needs to propagate.

use std::path::PathBuf;
use thiserror::Error;

/// Startup configuration errors. Always fatal.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// LUT name outside the closed set
    #[error("unknown LUT '{0}'")]
    UnknownLut(String),

    /// Camera type outside the closed set
    #[error("unknown camera type '{0}' (expected BOSON, LEPTON3 or LEPTON2)")]
    UnknownCameraType(String),

    /// Config file could not be read
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Config file is not valid TOML for [`crate::config::AppConfig`]
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    /// Config could not be serialized
    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    /// A value is out of range
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Lookup of a LUT name that is not in the registry
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown LUT '{0}'")]
pub struct UnknownLut(pub String);

/// Host hotplug facility errors
#[derive(Error, Debug)]
pub enum MonitorError {
    /// The device tree could not be read at startup
    #[error("device monitor unavailable: cannot read {path}: {source}")]
    Unavailable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Errors opening a camera
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenError {
    #[error("camera device not found")]
    NotFound,
    #[error("permission denied on camera device (check udev rules / video group membership)")]
    PermissionDenied,
    #[error("camera device is already open")]
    AlreadyOpen,
}

impl OpenError {
    /// Whether another attempt may succeed after a short delay
    pub fn is_retryable(&self) -> bool {
        !matches!(self, OpenError::PermissionDenied)
    }
}

/// Errors reading a frame from an open camera
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadError {
    #[error("camera stalled (no frame within watchdog timeout)")]
    DeviceStalled,
    #[error("camera was detached")]
    DeviceDetached,
    #[error("malformed frame")]
    MalformedFrame,
}

/// Recording errors. These only ever degrade recording, never the live view.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RecorderError {
    /// The encoder rejected a frame (disk full, encoder died, ...)
    #[error("recording write failed: {0}")]
    WriteFailed(String),

    /// Stop or write without an active recording
    #[error("recording not started")]
    NotStarted,

    /// Start while a recording is already running
    #[error("recording already started")]
    AlreadyStarted,

    /// Start while no camera is streaming
    #[error("cannot record: no camera is streaming")]
    NotStreaming,

    /// The encoder could not be launched
    #[error("failed to start recording: {0}")]
    StartFailed(String),
}

impl RecorderError {
    /// Lifecycle misuse (start twice, stop without start) as opposed to I/O failure
    pub fn is_lifecycle_rejection(&self) -> bool {
        matches!(
            self,
            RecorderError::NotStarted | RecorderError::AlreadyStarted | RecorderError::NotStreaming
        )
    }
}

/// Main error type for thermview operations
#[derive(Error, Debug)]
pub enum ThermviewError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("{0}")]
    Monitor(#[from] MonitorError),

    #[error("Open error: {0}")]
    Open(#[from] OpenError),

    #[error("Read error: {0}")]
    Read(#[from] ReadError),

    #[error("Recorder error: {0}")]
    Recorder(#[from] RecorderError),

    #[error(transparent)]
    UnknownLut(#[from] UnknownLut),

    /// Errors related to channel communication
    #[error("Channel error: {0}")]
    Channel(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic errors with context
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<ThermviewError>,
    },
}

impl ThermviewError {
    /// Add context to an error
    pub fn with_context(self, context: impl Into<String>) -> Self {
        ThermviewError::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }
}

/// Result type alias for thermview operations
pub type Result<T> = std::result::Result<T, ThermviewError>;

/// Extension trait for adding context to Results
pub trait ResultExt<T> {
    /// Add context to an error result
    fn context(self, context: impl Into<String>) -> Result<T>;

    /// Add context lazily to an error result
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String;
}

impl<T, E> ResultExt<T> for std::result::Result<T, E>
where
    E: Into<ThermviewError>,
{
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.into().with_context(context))
    }

    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| e.into().with_context(f()))
    }
}
