use thiserror::Error;

#[derive(Error, Debug)]
pub enum PetError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Telemetry error: {0}")]
    Telemetry(String),

    #[error("Window is gone: {0}")]
    WindowGone(&'static str),

    #[error("Unknown character: {0}")]
    UnknownCharacter(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl PetError {
    /// A vanished render target is expected during teardown and is not worth a warning.
    pub fn is_gone(&self) -> bool {
        matches!(self, PetError::WindowGone(_))
    }
}

pub type Result<T> = std::result::Result<T, PetError>;
