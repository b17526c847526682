use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("config file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("config parse error: {0}")]
    ParseError(String),

    #[error("config validation error: {0}")]
    ValidationError(String),
}

/// Problems decoding or accepting a wire frame.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("malformed frame: {0}")]
    Malformed(String),

    #[error("unexpected frame: {0}")]
    Unexpected(String),

    #[error("not registered")]
    NotRegistered,

    #[error("identity mismatch: connection is {registered}, message claims {claimed}")]
    IdentityMismatch { registered: String, claimed: String },
}

#[derive(Debug, thiserror::Error)]
pub enum RinglineError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("media error: {0}")]
    Media(String),
}
