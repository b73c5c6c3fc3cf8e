//! Error types for the narration engine.

/// Result type alias for narration operations
pub type NarrationResult<T> = Result<T, NarrationError>;

/// Main error type for narration operations
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum NarrationError {
    /// Speech synthesis failed or returned an unusable payload
    #[error("Speech synthesis failed: {message}")]
    SynthesisError {
        /// Error message describing the failure
        message: String,
    },

    /// The voice provider reported that its credits are exhausted
    #[error("Voice provider quota exhausted: {message}")]
    QuotaExhausted {
        /// Provider message describing the quota condition
        message: String,
    },

    /// Network or transport error while talking to the synthesis service
    #[error("Network error: {message}")]
    NetworkError {
        /// Error message describing the network issue
        message: String,
    },

    /// Audio could not be decoded or played
    #[error("Audio playback failed: {message}")]
    PlaybackError {
        /// Error message describing the playback failure
        message: String,
    },

    /// The output environment refused to start audio (e.g. autoplay policy)
    #[error("Playback blocked: {message}")]
    PlaybackBlocked {
        /// Error message describing why playback was refused
        message: String,
    },

    /// Invalid input error
    #[error("Invalid input: {message}")]
    InvalidInput {
        /// Error message describing the invalid input
        message: String,
    },

    /// Configuration error
    #[error("Configuration error: {message}")]
    ConfigurationError {
        /// Error message describing the configuration issue
        message: String,
    },

    /// File I/O error
    #[error("File I/O error: {message}")]
    FileError {
        /// Error message describing the file operation failure
        message: String,
    },

    /// Timeout error
    #[error("Operation timed out: {message}")]
    TimeoutError {
        /// Error message describing the timeout
        message: String,
    },
}

impl NarrationError {
    /// Create a new synthesis error
    #[must_use]
    pub fn synthesis<S: Into<String>>(message: S) -> Self {
        Self::SynthesisError {
            message: message.into(),
        }
    }

    /// Create a new quota exhausted error
    #[must_use]
    pub fn quota_exhausted<S: Into<String>>(message: S) -> Self {
        Self::QuotaExhausted {
            message: message.into(),
        }
    }

    /// Create a new network error
    #[must_use]
    pub fn network<S: Into<String>>(message: S) -> Self {
        Self::NetworkError {
            message: message.into(),
        }
    }

    /// Create a new playback error
    #[must_use]
    pub fn playback<S: Into<String>>(message: S) -> Self {
        Self::PlaybackError {
            message: message.into(),
        }
    }

    /// Create a new playback blocked error
    #[must_use]
    pub fn playback_blocked<S: Into<String>>(message: S) -> Self {
        Self::PlaybackBlocked {
            message: message.into(),
        }
    }

    /// Create a new invalid input error
    #[must_use]
    pub fn invalid_input<S: Into<String>>(message: S) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    /// Create a new configuration error
    #[must_use]
    pub fn configuration<S: Into<String>>(message: S) -> Self {
        Self::ConfigurationError {
            message: message.into(),
        }
    }

    /// Create a new file error
    #[must_use]
    pub fn file<S: Into<String>>(message: S) -> Self {
        Self::FileError {
            message: message.into(),
        }
    }

    /// Create a new timeout error
    #[must_use]
    pub fn timeout<S: Into<String>>(message: S) -> Self {
        Self::TimeoutError {
            message: message.into(),
        }
    }

    /// The bare message carried by this error, without the variant prefix
    #[must_use]
    pub fn message(&self) -> &str {
        match self {
            Self::SynthesisError { message }
            | Self::QuotaExhausted { message }
            | Self::NetworkError { message }
            | Self::PlaybackError { message }
            | Self::PlaybackBlocked { message }
            | Self::InvalidInput { message }
            | Self::ConfigurationError { message }
            | Self::FileError { message }
            | Self::TimeoutError { message } => message,
        }
    }

    /// Check if this is an expected failure that must not reach `on_error`
    #[must_use]
    pub const fn is_soft_failure(&self) -> bool {
        matches!(self, Self::PlaybackBlocked { .. })
    }

    /// Check if the provider ran out of credits
    #[must_use]
    pub const fn is_quota_exhausted(&self) -> bool {
        matches!(self, Self::QuotaExhausted { .. })
    }

    /// Check if this error is retriable
    ///
    /// The engine itself never retries; this is a hint for callers that
    /// resubmit from their `on_error` hook.
    #[must_use]
    pub const fn is_retriable(&self) -> bool {
        matches!(self, Self::NetworkError { .. } | Self::TimeoutError { .. })
    }

    /// Get the error category for logging
    #[must_use]
    pub const fn category(&self) -> &'static str {
        match self {
            Self::SynthesisError { .. } => "synthesis",
            Self::QuotaExhausted { .. } => "quota",
            Self::NetworkError { .. } => "network",
            Self::PlaybackError { .. } => "playback",
            Self::PlaybackBlocked { .. } => "playback_blocked",
            Self::InvalidInput { .. } => "input",
            Self::ConfigurationError { .. } => "configuration",
            Self::FileError { .. } => "file",
            Self::TimeoutError { .. } => "timeout",
        }
    }
}

// Convert from common error types
impl From<std::io::Error> for NarrationError {
    fn from(err: std::io::Error) -> Self {
        Self::file(err.to_string())
    }
}

impl From<tokio::time::error::Elapsed> for NarrationError {
    fn from(err: tokio::time::error::Elapsed) -> Self {
        Self::timeout(format!("Speech synthesis timed out: {err}"))
    }
}

impl From<serde_json::Error> for NarrationError {
    fn from(err: serde_json::Error) -> Self {
        Self::synthesis(format!("JSON serialization error: {err}"))
    }
}

impl From<reqwest::Error> for NarrationError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::timeout(format!("Synthesis request timed out: {err}"))
        } else {
            Self::network(err.to_string())
        }
    }
}

impl From<base64::DecodeError> for NarrationError {
    fn from(err: base64::DecodeError) -> Self {
        Self::synthesis(format!("Audio payload is not valid base64: {err}"))
    }
}

impl From<toml::de::Error> for NarrationError {
    fn from(err: toml::de::Error) -> Self {
        Self::configuration(format!("Invalid TOML: {err}"))
    }
}
