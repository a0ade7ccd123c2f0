use std::path::PathBuf;
use thiserror::Error;

/// A convenience `Result` alias using [`ConfideError`].
pub type ConfideResult<T> = Result<T, ConfideError>;

/// Top-level error type for the Confide crates.
#[derive(Error, Debug)]
pub enum ConfideError {
    /// Durable bytes did not parse into a valid record.
    #[error("Decode error: {0}")]
    Decode(#[from] DecodeError),

    /// A durable write could not complete. The previous unit is left intact.
    #[error("Write failure for {}: {source}", path.display())]
    WriteFailure {
        /// Final location the write was aimed at.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// An incoming assessment payload was malformed and was not merged.
    #[error("Invalid assessment: {0}")]
    InvalidAssessment(String),

    /// A session key token is empty, too long, or outside the allowed alphabet.
    #[error("Invalid session key: {0}")]
    InvalidKey(String),

    /// An update would change turns that were already recorded.
    #[error("Transcript rewrite rejected: {existing} recorded turn(s) not a prefix of {incoming} incoming turn(s)")]
    TranscriptRewrite {
        /// Turns held by the record.
        existing: usize,
        /// Turns in the rejected update.
        incoming: usize,
    },

    /// Configuration could not be read or is invalid.
    #[error("Config error: {0}")]
    Config(String),

    /// A JSON serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A standard I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Why a durable unit could not be turned back into a record.
#[derive(Error, Debug)]
pub enum DecodeError {
    /// The unit holds no bytes (e.g. truncated before the first write completed).
    #[error("unit is empty")]
    Empty,

    /// The bytes are not a JSON document of the expected shape.
    #[error("malformed record: {0}")]
    Malformed(#[from] serde_json::Error),

    /// The record declares a schema version this build does not read.
    #[error("unsupported schema version {0}")]
    UnsupportedVersion(u32),

    /// The embedded key is not a valid session key.
    #[error("invalid key: {0}")]
    InvalidKey(String),

    /// A timestamp field could not be parsed.
    #[error("invalid timestamp in `{field}`: {value}")]
    InvalidTimestamp {
        /// Field holding the timestamp.
        field: &'static str,
        /// Raw value found.
        value: String,
    },
}

impl ConfideError {
    /// Returns `true` if this error means a save did not take effect.
    pub fn is_write_failure(&self) -> bool {
        matches!(self, Self::WriteFailure { .. })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_write_failure_is_distinguishable() {
        let err = ConfideError::WriteFailure {
            path: PathBuf::from("/data/chats/p.c.json"),
            source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        };
        assert!(err.is_write_failure());
        assert!(err.to_string().contains("p.c.json"));

        let err = ConfideError::Io(std::io::Error::other("boom"));
        assert!(!err.is_write_failure());
    }

    #[test]
    fn test_decode_error_converts() {
        let json_err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err: ConfideError = DecodeError::from(json_err).into();
        assert!(matches!(err, ConfideError::Decode(DecodeError::Malformed(_))));
    }
}
