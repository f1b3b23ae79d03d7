use thiserror::Error;

/// Errors raised while reading the configuration line from the control input.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Empty config received on stdin")]
    Empty,

    #[error("Failed to read config: {0}")]
    Read(#[from] std::io::Error),

    #[error("Invalid config: {0}")]
    Invalid(String),
}

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Session backend unavailable: {0}")]
    Unavailable(String),

    #[error("Failed to create session: {0}")]
    Create(String),

    #[error("Failed to start session: {0}")]
    Start(String),

    #[error("Failed to read session data: {0}")]
    Poll(String),

    #[error("Failed to stop session: {0}")]
    Stop(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Error, Debug)]
pub enum OutletError {
    #[error("Outlet backend unavailable: {0}")]
    Unavailable(String),

    #[error("Failed to create outlet {name}: {reason}")]
    Create { name: String, reason: String },

    #[error("Failed to push sample to {key}: {reason}")]
    Push { key: String, reason: String },
}

#[derive(Error, Debug)]
pub enum BridgeError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error(transparent)]
    Outlet(#[from] OutletError),
}

pub type ConfigResult<T> = std::result::Result<T, ConfigError>;
pub type SessionResult<T> = std::result::Result<T, SessionError>;
pub type OutletResult<T> = std::result::Result<T, OutletError>;
pub type Result<T> = std::result::Result<T, BridgeError>;
