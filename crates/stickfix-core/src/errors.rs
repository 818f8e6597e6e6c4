use crate::store::StoreError;

/// Core error type for the bot.
///
/// Adapter crates map their specific errors into this type so the dispatcher
/// can treat every handler failure the same way (reset state, log, apologise).
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("config error: {0}")]
    Config(String),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("external error: {0}")]
    External(String),

    #[error("handler error: {0}")]
    Handler(String),
}

pub type Result<T> = std::result::Result<T, Error>;
