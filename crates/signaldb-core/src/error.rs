use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Query text is empty")]
    EmptyQuery,

    #[error("Trader name is empty")]
    EmptyTraderName,

    #[error("Embedding failed: {0}")]
    Embedding(String),

    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("Lexical index unavailable: {0}")]
    IndexUnavailable(String),

    #[error("Invalid filter: {0}")]
    InvalidFilter(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Operation failed: {0}")]
    Operation(String),
}

impl Error {
    /// True for failures that only cost one retrieval path its signal.
    pub fn is_degradation(&self) -> bool {
        matches!(self, Self::Embedding(_) | Self::StoreUnavailable(_) | Self::IndexUnavailable(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
