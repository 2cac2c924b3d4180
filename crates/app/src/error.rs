//! Application error types

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Core(#[from] gatecheck_core::Error),

    #[error(transparent)]
    Net(#[from] gatecheck_net::Error),

    #[error("API request failed: {0}")]
    Api(#[from] reqwest::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Upload rejected by the API: {0}")]
    SyncRejected(String),

    #[error("Local store lock poisoned by an earlier panic")]
    StorePoisoned,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
