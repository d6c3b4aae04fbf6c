//! Error types for the exchange rate pipeline.
//!
//! Only fatal conditions live here. Missing observation values, entities
//! without series and unresolved reference joins are handled in place by
//! the pipeline and never become a `RatesError`.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Main error type for the exchange rate library.
#[derive(Debug, Error)]
pub enum RatesError {
    /// Source and target do not describe the same kind of series.
    #[error(
        "Invalid parameter combination: source '{rate_source}' cannot be used with target '{target}'"
    )]
    InvalidParameterCombination { rate_source: String, target: String },

    /// Backoff delay reached the ceiling while the upstream kept failing.
    #[error("Unable to retrieve {url} even after backing off to {} seconds", .delay.as_secs_f64())]
    RateLimitExhausted { url: String, delay: Duration },

    /// HTTP request failed.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// XML parsing failed.
    #[error("XML parsing failed: {0}")]
    XmlParse(#[from] roxmltree::Error),

    /// JSON (de)serialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A structurally valid document did not have the expected shape.
    #[error("Unexpected {context} response: {message}")]
    Decode { context: String, message: String },

    /// Period label is not annual, quarterly or monthly.
    #[error("Invalid period label: '{0}'. Expected YYYY, YYYY-Qn or YYYY-Mnn")]
    InvalidPeriod(String),

    /// Unknown enumerated value (frequency, source, target, ...).
    #[error("Unknown {kind}: '{value}'")]
    UnknownValue { kind: &'static str, value: String },

    /// Override table could not be read.
    #[error("Failed to read override table {}: {source}", .path.display())]
    OverrideTable {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    /// CSV output failed.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl RatesError {
    /// Build a `Decode` error for the named response kind.
    pub fn decode(context: &str, message: impl Into<String>) -> Self {
        Self::Decode {
            context: context.to_string(),
            message: message.into(),
        }
    }
}

/// Result type alias for exchange rate operations.
pub type Result<T> = std::result::Result<T, RatesError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = RatesError::InvalidParameterCombination {
            rate_source: "ENSE".to_string(),
            target: "USD".to_string(),
        };
        assert!(err.to_string().contains("ENSE"));
        assert!(err.to_string().contains("USD"));
    }

    #[test]
    fn test_rate_limit_exhausted_display() {
        let err = RatesError::RateLimitExhausted {
            url: "https://example.com/data".to_string(),
            delay: Duration::from_millis(60_500),
        };
        assert_eq!(
            err.to_string(),
            "Unable to retrieve https://example.com/data even after backing off to 60.5 seconds"
        );
    }

    #[test]
    fn test_decode_helper() {
        let err = RatesError::decode("exchange rate", "series key '7:0' out of range");
        assert_eq!(
            err.to_string(),
            "Unexpected exchange rate response: series key '7:0' out of range"
        );
    }
}
