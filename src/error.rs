/// Failure kinds surfaced by token acquisition and playback operations.
/// Only `Unauthorized` triggers automated recovery (one refresh exchange);
/// every other kind is terminal for the invocation that hit it.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("network failure: {0}")]
    Network(String),

    /// The access token was rejected. A refresh has been attempted; the
    /// caller must re-invoke the original operation.
    #[error("unauthorized: access token rejected")]
    Unauthorized,

    /// The operation was aborted, either by the caller or by an expired
    /// deadline.
    #[error("operation cancelled")]
    Cancelled,

    /// The loopback callback request carried no `code` parameter.
    #[error("malformed callback request: no authorization code")]
    MalformedCallback,

    /// Authorization needs the user to finish the consent flow in the
    /// browser before this operation can proceed.
    #[error("authorization pending: complete the consent flow in the browser")]
    AuthorizationPending,

    #[error("{0}")]
    Unknown(String),
}

impl Error {
    pub(crate) fn unknown(msg: impl std::fmt::Display) -> Self {
        Error::Unknown(msg.to_string())
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            Error::Unknown(format!("response parse: {}", e))
        } else {
            Error::Network(e.to_string())
        }
    }
}

impl From<tokio::task::JoinError> for Error {
    fn from(e: tokio::task::JoinError) -> Self {
        Error::Unknown(format!("background task failed: {}", e))
    }
}
