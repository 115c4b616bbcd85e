use thiserror::Error;

pub type FetchResult<T> = Result<T, FetchError>;

/// Failure modes surfaced to either front-end.
#[derive(Debug, Error)]
pub enum FetchError {
    /// The engine could not resolve or fetch the URL: bad link, unsupported
    /// site, network failure, timeout. Carries the engine's own message.
    #[error("{0}")]
    Extraction(String),

    /// The engine reported success but no output file exists under any
    /// expected name or extension.
    #[error("download finished but the output file could not be located")]
    FileResolution,

    /// A quality button was pressed in a chat with no remembered link.
    #[error("I lost track of your link, please send it again")]
    SessionLost,

    #[error("telegram upload failed: {0}")]
    Upload(#[from] teloxide::RequestError),

    #[error("{0}")]
    Config(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
