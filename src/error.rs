//! Error handling module for vdbctl
//!
//! `VdbError` is the closed taxonomy every execution unit reports through.
//! `ControlPlaneError` covers the transport underneath it and is carried as
//! the source of the `VdbError` that wraps it.

use crate::types::{JobHandle, ObjectClass, Verb};
use thiserror::Error;

/// Failures talking to an engine's control plane
#[derive(Error, Debug)]
pub enum ControlPlaneError {
    /// Connection, TLS, timeout or protocol errors from the HTTP client
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Response body was not the JSON we expected
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The engine answered with an `ErrorResult` envelope
    #[error("engine error {id}: {details}")]
    Api { id: String, details: String },

    /// Non-success HTTP status without a readable error envelope
    #[error("unexpected HTTP status {status}: {body}")]
    Status { status: u16, body: String },

    /// Well-formed JSON missing a field we rely on
    #[error("malformed response: {0}")]
    Malformed(String),

    /// The verb has no corresponding engine action
    #[error("verb '{0}' has no engine action")]
    Unsupported(Verb),
}

impl ControlPlaneError {
    pub fn api(id: impl Into<String>, details: impl Into<String>) -> Self {
        Self::Api {
            id: id.into(),
            details: details.into(),
        }
    }

    pub fn malformed(msg: impl Into<String>) -> Self {
        Self::Malformed(msg.into())
    }
}

/// Main error type for vdbctl
#[derive(Error, Debug)]
pub enum VdbError {
    /// `-d`/`--engine` named a hostname that is not in the configuration
    #[error("engine \"{identifier}\" cannot be found in the configuration")]
    EngineNotFound { identifier: String },

    /// No engine is marked default and none was named
    #[error("no default engine found in the configuration")]
    NoDefaultEngine,

    /// Configuration file missing, unreadable or invalid
    #[error("Configuration error: {0}")]
    Config(String),

    /// Verb and target name do not fit together
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Session creation or login failed
    #[error("{engine}: authentication failed: {source}")]
    Authentication {
        engine: String,
        #[source]
        source: ControlPlaneError,
    },

    /// No object of the class carries the name
    #[error("{engine}: object \"{name}\" not found in class {class}{}", .cause.as_ref().map(|c| format!(" ({c})")).unwrap_or_default())]
    ObjectNotFound {
        engine: String,
        class: ObjectClass,
        name: String,
        cause: Option<ControlPlaneError>,
    },

    /// The control-plane call itself failed before producing a result
    #[error("{engine}: an error occurred while performing {verb} on {target}: {source}")]
    Operation {
        engine: String,
        verb: Verb,
        target: String,
        #[source]
        source: ControlPlaneError,
    },

    /// A tracked job finished in FAILED
    #[error("{engine}: job {job} failed")]
    JobFailed { engine: String, job: JobHandle },

    /// A tracked job finished in CANCELED (reported, not fatal)
    #[error("{engine}: job {job} was canceled")]
    Canceled { engine: String, job: JobHandle },

    /// Anything else, keeping the original cause for diagnostics
    #[error("{context}: {source}")]
    Unexpected {
        context: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

/// Result type alias for vdbctl operations
pub type Result<T> = std::result::Result<T, VdbError>;

impl VdbError {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an invalid request error
    pub fn invalid_request(msg: impl Into<String>) -> Self {
        Self::InvalidRequest(msg.into())
    }

    /// Wrap any error as unexpected, naming what was being attempted
    pub fn unexpected(
        context: impl Into<String>,
        source: impl Into<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        Self::Unexpected {
            context: context.into(),
            source: source.into(),
        }
    }

    /// Process exit code for this failure class
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::Authentication { .. } => 2,
            Self::JobFailed { .. } => 3,
            Self::Canceled { .. } => 0,
            _ => 1,
        }
    }

    /// Ranking used to collapse many unit failures into one exit code:
    /// authentication > job failure > everything else.
    pub const fn severity(&self) -> u8 {
        match self {
            Self::Authentication { .. } => 3,
            Self::JobFailed { .. } => 2,
            Self::Canceled { .. } => 0,
            _ => 1,
        }
    }

    /// Whether this error should fail the unit that raised it
    pub const fn is_fatal(&self) -> bool {
        !matches!(self, Self::Canceled { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = VdbError::EngineNotFound {
            identifier: "landshark".into(),
        };
        assert_eq!(
            err.to_string(),
            "engine \"landshark\" cannot be found in the configuration"
        );

        let err = VdbError::ObjectNotFound {
            engine: "landshark".into(),
            class: ObjectClass::Source,
            name: "testvdb".into(),
            cause: None,
        };
        assert_eq!(
            err.to_string(),
            "landshark: object \"testvdb\" not found in class source"
        );
    }

    #[test]
    fn test_object_not_found_mentions_cause() {
        let err = VdbError::ObjectNotFound {
            engine: "e1".into(),
            class: ObjectClass::Database,
            name: "db".into(),
            cause: Some(ControlPlaneError::api("exception.webservices.login", "not logged in")),
        };
        assert!(err.to_string().contains("not logged in"));
    }

    #[test]
    fn test_exit_codes() {
        let auth = VdbError::Authentication {
            engine: "e1".into(),
            source: ControlPlaneError::api("x", "bad password"),
        };
        let job = VdbError::JobFailed {
            engine: "e1".into(),
            job: JobHandle::new("JOB-1"),
        };
        assert_eq!(auth.exit_code(), 2);
        assert_eq!(job.exit_code(), 3);
        assert_eq!(VdbError::NoDefaultEngine.exit_code(), 1);
        assert_eq!(VdbError::config("broken").exit_code(), 1);
    }

    #[test]
    fn test_severity_ordering() {
        let auth = VdbError::Authentication {
            engine: "e1".into(),
            source: ControlPlaneError::malformed("no session"),
        };
        let job = VdbError::JobFailed {
            engine: "e1".into(),
            job: JobHandle::new("JOB-1"),
        };
        let generic = VdbError::unexpected("polling", "boom");
        assert!(auth.severity() > job.severity());
        assert!(job.severity() > generic.severity());
    }

    #[test]
    fn test_canceled_is_not_fatal() {
        let err = VdbError::Canceled {
            engine: "e1".into(),
            job: JobHandle::new("JOB-9"),
        };
        assert!(!err.is_fatal());
        assert_eq!(err.exit_code(), 0);
    }
}
