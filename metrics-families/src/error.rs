use std::io;

use thiserror::Error as ThisError;

/// Errors caused by misusing the instrumentation API.
///
/// Every variant indicates a programming mistake in the instrumented application rather than a
/// transient condition, so the plain API panics with the error message as soon as one is
/// detected.  The `try_*` counterparts hand the value back instead, which is mostly useful for
/// tests and for tooling that declares metrics from external input.
#[derive(Clone, Debug, Eq, PartialEq, ThisError)]
pub enum UsageError {
    /// A family was declared with an invalid configuration.
    #[error("illegal configuration: {0}")]
    Configuration(String),

    /// A labeling call received an odd number of strings.
    #[error("illegal labels: expected name/value pairs, got {count} strings: {labels:?}")]
    Argument {
        /// Number of strings that were passed.
        count: usize,
        /// The strings themselves.
        labels: Vec<String>,
    },

    /// A new child's labels do not match the family's declared dimensions.
    #[error("illegal labels for {family}: {reason}")]
    Validation {
        /// Name of the family the child was being created in.
        family: String,
        /// What was wrong with the label set.
        reason: String,
    },

    /// Internal bookkeeping was asked to do something impossible.
    ///
    /// Forgetting an instance that is no longer part of its family and registering the same
    /// family name twice both end up here.
    #[error("illegal invariant: {0}")]
    InvariantViolation(String),
}

impl UsageError {
    /// Logs the error and panics with its message.
    #[track_caller]
    pub(crate) fn raise(self) -> ! {
        tracing::error!(error = %self, "metric usage error");
        panic!("{}", self)
    }
}

/// Errors that could occur while dumping metrics to an output sink.
///
/// A dump stops at the first error, so anything written before the failing family stays in the
/// sink.
#[derive(Debug, ThisError)]
pub enum DumpError {
    /// Writing to the output sink failed.
    #[error("failed to write metrics: {0}")]
    Io(#[from] io::Error),

    /// Encoding a protobuf message failed.
    #[error("failed to encode protobuf message: {0}")]
    Encode(#[from] prost::EncodeError),

    /// Encoding a JSON document failed.
    #[error("failed to encode json document: {0}")]
    Json(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::UsageError;

    #[test]
    fn test_messages() {
        let err = UsageError::Argument { count: 1, labels: vec!["method".to_owned()] };
        assert_eq!(
            err.to_string(),
            "illegal labels: expected name/value pairs, got 1 strings: [\"method\"]"
        );

        let err = UsageError::Configuration("Name must be provided".to_owned());
        assert_eq!(err.to_string(), "illegal configuration: Name must be provided");
    }

    #[test]
    #[should_panic(expected = "illegal invariant: missing fingerprint 42")]
    fn test_raise_panics_with_message() {
        UsageError::InvariantViolation("missing fingerprint 42".to_owned()).raise();
    }
}
