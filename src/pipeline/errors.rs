// Error types for the extraction-to-preview pipeline

use thiserror::Error;

use super::diagnostics::FailureReason;

/// Coarse error category, used by callers that branch on the failure class
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Engine,
    Validation,
    Resolution,
    Selection,
    Fetch,
    Transcode,
    Busy,
    Io,
    Config,
}

#[derive(Debug, Error)]
pub enum PreviewError {
    /// Engines failed to bootstrap or are not ready yet
    #[error("Engine error: {0}")]
    Engine(String),

    /// Empty or malformed URL; nothing was sent to the engine
    #[error("{0}")]
    Validation(String),

    /// The resolution engine ran but could not extract metadata
    #[error("Could not resolve URL: {message}")]
    Resolution {
        message: String,
        reason: FailureReason,
    },

    /// No format chosen, or nothing to choose from
    #[error("Selection error: {0}")]
    Selection(String),

    /// Relay or network failure while downloading the source stream
    #[error("Fetch failed: {0}")]
    Fetch(String),

    /// Transcoder exited with a failure; `log` holds its diagnostic output
    #[error("Transcode failed: {message}")]
    Transcode { message: String, log: Vec<String> },

    /// A preview run is already in flight
    #[error("A preview is already in progress")]
    Busy,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl PreviewError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Engine(_) => ErrorKind::Engine,
            Self::Validation(_) => ErrorKind::Validation,
            Self::Resolution { .. } => ErrorKind::Resolution,
            Self::Selection(_) => ErrorKind::Selection,
            Self::Fetch(_) => ErrorKind::Fetch,
            Self::Transcode { .. } => ErrorKind::Transcode,
            Self::Busy => ErrorKind::Busy,
            Self::Io(_) => ErrorKind::Io,
            Self::Config(_) => ErrorKind::Config,
        }
    }

    /// Build a resolution error from raw engine stderr, classifying the cause
    pub fn resolution(stderr: &str) -> Self {
        let reason = super::diagnostics::diagnose_error(stderr);
        let message = super::diagnostics::first_error_line(stderr)
            .unwrap_or_else(|| reason.description().to_string());
        Self::Resolution { message, reason }
    }

    /// Short text for a transient notification
    pub fn user_message(&self) -> String {
        match self {
            Self::Resolution { message, reason } => match reason.hint() {
                Some(hint) => format!("{}\n{}", message, hint),
                None => message.clone(),
            },
            other => other.to_string(),
        }
    }
}

impl From<toml::de::Error> for PreviewError {
    fn from(e: toml::de::Error) -> Self {
        Self::Config(e.to_string())
    }
}

impl From<reqwest::Error> for PreviewError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Self::Fetch(format!("request timed out: {}", e))
        } else {
            Self::Fetch(e.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolution_from_stderr() {
        let err = PreviewError::resolution(
            "WARNING: something\nERROR: [youtube] abc: Private video. Sign in if you've been granted access",
        );
        match err {
            PreviewError::Resolution { ref message, reason } => {
                assert_eq!(reason, FailureReason::PrivateVideo);
                assert!(message.starts_with("ERROR: [youtube] abc"));
            }
            other => panic!("unexpected {:?}", other),
        }
        assert!(err.user_message().contains("authorized"));
    }

    #[test]
    fn test_kind_mapping() {
        assert_eq!(PreviewError::Busy.kind(), ErrorKind::Busy);
        assert_eq!(
            PreviewError::Selection("none".into()).kind(),
            ErrorKind::Selection
        );
        let io = std::io::Error::new(std::io::ErrorKind::Other, "disk");
        assert_eq!(PreviewError::from(io).kind(), ErrorKind::Io);
    }
}
