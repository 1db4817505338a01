use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    #[error("Query already carries transport {0}")]
    TransportConflict(crate::Transport),

    #[error("Query payload is empty")]
    EmptyPayload,

    #[error("Query payload of {0} bytes exceeds the 65535 byte DNS message limit")]
    PayloadTooLarge(usize),

    #[error("Query has no payload")]
    MissingPayload,

    #[error("Invalid transport: {0}")]
    InvalidTransport(String),

    #[error("No target configured")]
    TargetUnset,

    #[error("Unknown target service: {0}")]
    UnknownService(String),

    #[error("Failed to resolve target {0}: {1}")]
    TargetResolution(String, String),

    #[error("Target {0} resolved to no usable address")]
    NoTargetAddress(String),

    #[error("Client pool is {actual}, expected {expected}")]
    InvalidPoolState {
        expected: &'static str,
        actual: &'static str,
    },

    #[error("Client pool failed to start: {0}")]
    EngineStart(String),

    #[error("Client pool engine terminated abnormally")]
    EngineCrashed,

    #[error("Query queue is closed")]
    QueueClosed,

    #[error("Capture decode error: {0}")]
    CaptureDecode(String),

    #[error("I/O error: {0}")]
    IoError(String),
}

impl From<std::io::Error> for DomainError {
    fn from(err: std::io::Error) -> Self {
        DomainError::IoError(err.to_string())
    }
}
