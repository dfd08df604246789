pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A business-rule violation in a layout configuration.
    ///
    /// The message is user-facing; callers are expected to surface it and let the
    /// user correct the selection, keeping any previously rendered chart on screen.
    #[error("{message}")]
    Validation { message: String },

    /// The response lacks a header that a requested dimension requires.
    ///
    /// This is treated as a validation-class failure: the selection asked for a
    /// dimension the server did not echo back, so no cell lookup can succeed.
    #[error("Response is missing the required header: {name}")]
    MissingHeader { name: String },

    #[error("Malformed analytics response: {message}")]
    Response { message: String },

    #[error("Unsupported chart kind: {kind}")]
    UnsupportedChartKind { kind: String },
}

impl Error {
    pub fn validation(message: impl Into<String>) -> Self {
        Error::Validation {
            message: message.into(),
        }
    }

    pub fn response(message: impl Into<String>) -> Self {
        Error::Response {
            message: message.into(),
        }
    }

    /// Whether the error is recoverable by correcting the layout selection.
    pub fn is_validation(&self) -> bool {
        matches!(self, Error::Validation { .. } | Error::MissingHeader { .. })
    }
}
