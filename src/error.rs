use thiserror::Error;

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, Error>;

/// Error taxonomy for the client core.
///
/// Errors are returned as typed outcomes rather than thrown across
/// component boundaries; callers can tell "retry is safe" apart from
/// "state was reset" without inspecting message strings.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// Local validation failure. Never reaches the network; the caller's
    /// state is unchanged.
    #[error("validation failed: {reason}")]
    Validation { reason: String },

    /// The server rejected the credential and the one permitted
    /// refresh-and-retry did not recover the request.
    #[error("request unauthorized after refresh")]
    AuthExpired,

    /// Refresh itself failed; the session has been logged out and the
    /// credential store cleared. The consumer must re-authenticate.
    #[error("session terminated, re-authentication required")]
    SessionTerminated,

    /// The remote extraction call errored or returned no usable data.
    /// The draft is retained so the caller can retry.
    #[error("extraction failed: {reason}")]
    Extraction { reason: String },

    /// The confirm step failed server-side. Review state and user
    /// corrections are retained.
    #[error("failed to persist bet: {reason}")]
    Persistence { reason: String },

    /// Transport-level failure (connect, timeout, DNS). Not auto-retried
    /// outside the single unauthorized-retry path.
    #[error("network error: {reason}")]
    Network { reason: String },

    /// Non-2xx server response outside the statuses with dedicated
    /// handling; passed through to the caller.
    #[error("API request failed with status {status}: {message}")]
    Api { status: u16, message: String },

    /// An operation was invoked while an equivalent one was already in
    /// flight. Rejected, never queued.
    #[error("pipeline is busy: {operation} already in progress")]
    PipelineBusy { operation: String },

    /// An operation was invoked from a state that does not permit it.
    #[error("invalid transition: cannot {action} from {from}")]
    InvalidTransition { from: String, action: String },

    /// Credential store read/write failure.
    #[error("credential store error: {reason}")]
    Store { reason: String },
}

impl Error {
    /// Create a validation error
    pub fn validation(reason: impl Into<String>) -> Self {
        Error::Validation {
            reason: reason.into(),
        }
    }

    /// Create an extraction error
    pub fn extraction(reason: impl Into<String>) -> Self {
        Error::Extraction {
            reason: reason.into(),
        }
    }

    /// Create a persistence error
    pub fn persistence(reason: impl Into<String>) -> Self {
        Error::Persistence {
            reason: reason.into(),
        }
    }

    /// Create a network error
    pub fn network(reason: impl Into<String>) -> Self {
        Error::Network {
            reason: reason.into(),
        }
    }

    /// Create an API error from a response status and body
    pub fn api(status: u16, message: impl Into<String>) -> Self {
        Error::Api {
            status,
            message: message.into(),
        }
    }

    /// Create a busy error for a named operation
    pub fn busy(operation: impl Into<String>) -> Self {
        Error::PipelineBusy {
            operation: operation.into(),
        }
    }

    /// Create an invalid-transition error
    pub fn invalid_transition(from: impl Into<String>, action: impl Into<String>) -> Self {
        Error::InvalidTransition {
            from: from.into(),
            action: action.into(),
        }
    }

    /// Create a credential store error
    pub fn store(reason: impl Into<String>) -> Self {
        Error::Store {
            reason: reason.into(),
        }
    }

    /// Whether the caller may simply retry the same operation without
    /// re-entering any input or re-authenticating.
    pub fn is_retry_safe(&self) -> bool {
        matches!(
            self,
            Error::Extraction { .. }
                | Error::Persistence { .. }
                | Error::Network { .. }
                | Error::PipelineBusy { .. }
        )
    }

    /// Whether the session was invalidated as part of this failure.
    pub fn is_terminal_for_session(&self) -> bool {
        matches!(self, Error::SessionTerminated)
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        Error::Network {
            reason: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retry_safety_classification() {
        assert!(Error::extraction("no usable data").is_retry_safe());
        assert!(Error::persistence("503").is_retry_safe());
        assert!(Error::network("timeout").is_retry_safe());
        assert!(!Error::SessionTerminated.is_retry_safe());
        assert!(!Error::validation("too large").is_retry_safe());
        assert!(Error::SessionTerminated.is_terminal_for_session());
    }
}
