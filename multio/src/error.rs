use std::fmt;

/// Non-success status reported by a call into the native library.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum NativeStatus {
    EckitException,
    GeneralException,
    UnknownException,
    Other(i32),
}

impl NativeStatus {
    /// Maps a raw status code; `None` means success.
    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            0 => None,
            1 => Some(NativeStatus::EckitException),
            2 => Some(NativeStatus::GeneralException),
            3 => Some(NativeStatus::UnknownException),
            other => Some(NativeStatus::Other(other)),
        }
    }

    pub fn code(&self) -> i32 {
        match self {
            NativeStatus::EckitException => 1,
            NativeStatus::GeneralException => 2,
            NativeStatus::UnknownException => 3,
            NativeStatus::Other(code) => *code,
        }
    }
}

impl fmt::Display for NativeStatus {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            NativeStatus::EckitException => write!(f, "eckit exception"),
            NativeStatus::GeneralException => write!(f, "general exception"),
            NativeStatus::UnknownException => write!(f, "unknown exception"),
            NativeStatus::Other(code) => write!(f, "status {}", code),
        }
    }
}

/// A failed native call: the status plus whatever text the library attached.
#[derive(Clone, PartialEq, Debug, thiserror::Error)]
#[error("{status}: {message}")]
pub struct NativeError {
    pub status: NativeStatus,
    pub message: String,
}

impl NativeError {
    pub fn new<S: Into<String>>(status: NativeStatus, message: S) -> Self {
        NativeError {
            status,
            message: message.into(),
        }
    }
}

pub type NativeResult<T> = std::result::Result<T, NativeError>;

/// Which write entry point a buffer was handed to.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum WriteKind {
    Domain,
    Mask,
    Field,
    Encoded,
}

impl fmt::Display for WriteKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            WriteKind::Domain => write!(f, "domain"),
            WriteKind::Mask => write!(f, "mask"),
            WriteKind::Field => write!(f, "field"),
            WriteKind::Encoded => write!(f, "encoded message"),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Config dictionary is required")]
    MissingConfig,
    #[error("No metadata object instantiated")]
    NoMetadata,
    #[error("Connections are already open")]
    AlreadyOpen,
    #[error("Connections have been closed")]
    ConnectionsClosed,
    #[error("Buffer of {len} elements exceeds the native size limit")]
    BufferTooLarge { len: usize },
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("Invalid metadata: {0}")]
    InvalidMetadata(String),
    #[error("Failed to initialise the multio library: {0}")]
    Initialise(#[source] NativeError),
    #[error("Failed to query the multio version: {0}")]
    Version(#[source] NativeError),
    #[error("Failed to create configuration: {0}")]
    ConfigCreate(#[source] NativeError),
    #[error("Failed to create session: {0}")]
    SessionCreate(#[source] NativeError),
    #[error("Failed to create metadata: {0}")]
    MetadataCreate(#[source] NativeError),
    #[error("Failed to start server: {0}")]
    ServerStart(#[source] NativeError),
    #[error("Failed to toggle connections: {0}")]
    Connection(#[source] NativeError),
    #[error("Failed to write {kind}: {source}")]
    Write {
        kind: WriteKind,
        #[source]
        source: NativeError,
    },
    #[error("Failed to flush: {0}")]
    Flush(#[source] NativeError),
    #[error("Failed to notify: {0}")]
    Notify(#[source] NativeError),
    #[error("Failed to check whether the field is accepted: {0}")]
    FieldAccepted(#[source] NativeError),
}

impl Error {
    /// The native failure behind this error, if it came from the library.
    pub fn native(&self) -> Option<&NativeError> {
        match self {
            Error::Initialise(e)
            | Error::Version(e)
            | Error::ConfigCreate(e)
            | Error::SessionCreate(e)
            | Error::MetadataCreate(e)
            | Error::ServerStart(e)
            | Error::Connection(e)
            | Error::Flush(e)
            | Error::Notify(e)
            | Error::FieldAccepted(e) => Some(e),
            Error::Write { source, .. } => Some(source),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
