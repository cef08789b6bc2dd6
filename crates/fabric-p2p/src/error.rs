use thiserror::Error;

#[derive(Debug, Error, Clone)]
pub enum P2pError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("codec error: {0}")]
    Codec(String),

    #[error("dial error: {0}")]
    Dial(String),

    #[error("peer not found: {0}")]
    PeerNotFound(String),

    #[error("message confirmation timed out")]
    AckTimeout,

    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("probe error: {0}")]
    Probe(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("node already shut down")]
    Shutdown,

    #[error("io error: {0}")]
    Io(String),
}

impl From<std::io::Error> for P2pError {
    fn from(e: std::io::Error) -> Self {
        P2pError::Io(e.to_string())
    }
}

impl From<serde_json::Error> for P2pError {
    fn from(e: serde_json::Error) -> Self {
        P2pError::Serialization(e.to_string())
    }
}
