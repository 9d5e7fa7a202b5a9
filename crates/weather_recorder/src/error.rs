//! Failure taxonomy for fetching and recording observations.

use chrono::{DateTime, Utc};

/// How the retry loop should react to a [`FetchError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureClass {
    /// Server-side or connectivity failure; retry under the policy.
    Transient,
    /// Retrying cannot help; abort the cycle.
    Fatal,
    /// A response arrived but the station is not reporting; retry under the policy.
    Invalid,
}

/// Errors from acquiring an observation.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("observation endpoint returned HTTP {status}")]
    Status { status: u16 },

    #[error("connection failure: {0}")]
    Connection(String),

    #[error("request failed: {0}")]
    Request(String),

    #[error("unexpected observation payload: {0}")]
    Parse(String),

    #[error("station is not reporting (observation at {time} has no pressure)")]
    Invalid { time: DateTime<Utc> },

    #[error("gave up after {attempts} attempts: {last}")]
    RetriesExhausted {
        attempts: u32,
        last: Box<FetchError>,
    },

    #[error("fetch cancelled by shutdown")]
    Cancelled,
}

impl FetchError {
    /// Classify this error for the retry loop.
    ///
    /// HTTP 5xx and connection-level failures are transient, a non-reporting
    /// station is invalid, and everything else (4xx, contract changes,
    /// unexpected statuses) is fatal.
    pub fn class(&self) -> FailureClass {
        match self {
            FetchError::Status { status } if *status >= 500 => FailureClass::Transient,
            FetchError::Connection(_) => FailureClass::Transient,
            FetchError::Invalid { .. } => FailureClass::Invalid,
            _ => FailureClass::Fatal,
        }
    }
}

/// Errors from the observation store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("observation at {time} is already recorded")]
    Duplicate { time: DateTime<Utc> },

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("corrupt record: {0}")]
    Corrupt(String),
}

/// Errors surfaced by one fetch-then-save cycle.
#[derive(Debug, thiserror::Error)]
pub enum CycleError {
    #[error("fetch failed: {0}")]
    Fetch(#[from] FetchError),

    #[error("store failed: {0}")]
    Store(#[from] StoreError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_errors_are_transient() {
        for status in [500, 502, 503, 504, 599] {
            assert_eq!(
                FetchError::Status { status }.class(),
                FailureClass::Transient,
                "status {status}"
            );
        }
    }

    #[test]
    fn client_errors_are_fatal() {
        for status in [401, 403, 404, 429, 499] {
            assert_eq!(FetchError::Status { status }.class(), FailureClass::Fatal);
        }
    }

    #[test]
    fn other_statuses_are_not_retried() {
        assert_eq!(FetchError::Status { status: 400 }.class(), FailureClass::Fatal);
        assert_eq!(FetchError::Status { status: 304 }.class(), FailureClass::Fatal);
    }

    #[test]
    fn connection_failures_are_transient() {
        let err = FetchError::Connection("connection refused".into());
        assert_eq!(err.class(), FailureClass::Transient);
    }

    #[test]
    fn parse_and_request_errors_are_fatal() {
        assert_eq!(FetchError::Parse("missing field".into()).class(), FailureClass::Fatal);
        assert_eq!(FetchError::Request("bad header".into()).class(), FailureClass::Fatal);
    }

    #[test]
    fn invalid_observation_class() {
        let err = FetchError::Invalid { time: Utc::now() };
        assert_eq!(err.class(), FailureClass::Invalid);
    }

    #[test]
    fn retries_exhausted_reports_last_error() {
        let err = FetchError::RetriesExhausted {
            attempts: 3,
            last: Box::new(FetchError::Status { status: 503 }),
        };
        assert_eq!(
            err.to_string(),
            "gave up after 3 attempts: observation endpoint returned HTTP 503"
        );
        assert_eq!(err.class(), FailureClass::Fatal);
    }
}
