/// Core error type for the bot.
///
/// Adapter crates map their specific failures into this type so the dispatch
/// layer can handle every handler outcome the same way: one user-facing
/// reply, one log line.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("config error: {0}")]
    Config(String),

    /// Bad input from the user, detected before any external call.
    #[error("{0}")]
    Validation(String),

    /// An external collaborator returned a failure (non-2xx, RPC error).
    #[error("upstream error: {0}")]
    Upstream(String),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("external error: {0}")]
    External(String),
}

pub type Result<T> = std::result::Result<T, Error>;
