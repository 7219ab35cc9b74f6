//! Error types for convergence operations.
//!
//! Every failure the engine can report is an [`Error`]. Action failures carry
//! a [`FailureCause`] describing what went wrong at the filesystem or process
//! boundary. Errors are grouped into an [`ErrorCategory`] so the driver and
//! callers can decide whether a failure aborts a run.

use std::fmt;
use std::io;
use std::path::PathBuf;
use std::time::Duration;

/// Result type alias for convergence operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Categories of convergence errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// A guard did not hold (never fatal).
    Guard,
    /// Applying a resource failed.
    Action,
    /// A required configuration key is absent.
    Configuration,
    /// Template rendering failed.
    Template,
    /// Downloading remote content failed.
    Network,
    /// Credential or ticket setup failed.
    Authentication,
}

impl ErrorCategory {
    /// Whether an error of this category aborts a convergence run.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Self::Guard)
    }

    /// Get a user-friendly description of this error category.
    #[must_use]
    pub fn description(&self) -> &'static str {
        match self {
            Self::Guard => "Guard not satisfied",
            Self::Action => "Resource action failed",
            Self::Configuration => "Configuration missing",
            Self::Template => "Template rendering failed",
            Self::Network => "Remote fetch failed",
            Self::Authentication => "Authentication failed",
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.description())
    }
}

/// What went wrong while applying a single resource.
#[derive(Debug, thiserror::Error)]
pub enum FailureCause {
    /// Filesystem operation failed.
    #[error("I/O error at {path}: {source}")]
    Io {
        /// Path involved in the error.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },

    /// Operation not permitted for the current user.
    #[error("permission denied: {path}")]
    PermissionDenied {
        /// Path that could not be changed.
        path: PathBuf,
    },

    /// The program to execute could not be found.
    #[error("command not found: {program}")]
    MissingBinary {
        /// Program name or path.
        program: String,
    },

    /// The command exited with a code that is not accepted.
    #[error("returned {code}. {output}")]
    NonZeroExit {
        /// Exit code (-1 when killed by a signal).
        code: i32,
        /// Combined stdout and stderr.
        output: String,
    },

    /// The command did not finish before its deadline.
    #[error("timed out after {}s", after.as_secs())]
    Timeout {
        /// The deadline that expired.
        after: Duration,
    },

    /// The path is occupied by something the resource refuses to replace.
    #[error("{message}")]
    Conflict {
        /// Description of the conflict.
        message: String,
    },

    /// The owner could not be resolved to a uid.
    #[error("unknown user: {0}")]
    UnknownUser(String),

    /// The group could not be resolved to a gid.
    #[error("unknown group: {0}")]
    UnknownGroup(String),

    /// The resource needs elevated privileges that could not be acquired.
    #[error("elevated privileges unavailable: {0}")]
    PrivilegeUnavailable(String),

    /// A status probe found the service stopped.
    #[error("{service} is not running")]
    NotRunning {
        /// Service name.
        service: String,
    },

    /// A status probe could not decide whether the service runs.
    #[error("status of {service} is unknown: {reason}")]
    StatusUnknown {
        /// Service name.
        service: String,
        /// Why the probe was inconclusive.
        reason: String,
    },
}

impl FailureCause {
    /// Build an I/O cause, mapping `PermissionDenied` to its own variant.
    pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        let path = path.into();
        if source.kind() == io::ErrorKind::PermissionDenied {
            Self::PermissionDenied { path }
        } else {
            Self::Io { path, source }
        }
    }
}

/// Errors that can occur during convergence.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A guard did not hold; the action was skipped on purpose.
    #[error("guard not satisfied: {reason}")]
    GuardFailed {
        /// Rendered guard expression.
        reason: String,
    },

    /// Applying a resource failed.
    #[error("{resource} failed: {cause}")]
    ActionFailed {
        /// Resource identity, e.g. `File['/etc/hosts']`.
        resource: String,
        /// What went wrong.
        #[source]
        cause: FailureCause,
    },

    /// A required configuration key has no value and no default.
    #[error("configuration missing: {key}")]
    ConfigurationMissing {
        /// Configuration path that was looked up.
        key: String,
    },

    /// A template referenced a key absent from its bindings.
    #[error("template references missing binding '{key}'")]
    MissingBinding {
        /// The missing key.
        key: String,
    },

    /// A template could not be parsed.
    #[error("invalid template: {message}")]
    Template {
        /// Parse error description.
        message: String,
    },

    /// Downloading remote content failed.
    #[error("failed to fetch {uri}: {message}")]
    RemoteFetchFailed {
        /// The URI that was requested.
        uri: String,
        /// Error message.
        message: String,
    },

    /// Kerberos ticket or credential setup failed.
    #[error("authentication failed: {message}")]
    AuthenticationFailed {
        /// Error message.
        message: String,
    },
}

impl Error {
    /// Build an action failure for a resource.
    pub fn action(resource: impl Into<String>, cause: FailureCause) -> Self {
        Self::ActionFailed {
            resource: resource.into(),
            cause,
        }
    }

    /// Get the category of this error.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::GuardFailed { .. } => ErrorCategory::Guard,
            Self::ActionFailed { .. } => ErrorCategory::Action,
            Self::ConfigurationMissing { .. } => ErrorCategory::Configuration,
            Self::MissingBinding { .. } | Self::Template { .. } => ErrorCategory::Template,
            Self::RemoteFetchFailed { .. } => ErrorCategory::Network,
            Self::AuthenticationFailed { .. } => ErrorCategory::Authentication,
        }
    }

    /// The action failure cause, if this is an action failure.
    #[must_use]
    pub fn cause(&self) -> Option<&FailureCause> {
        match self {
            Self::ActionFailed { cause, .. } => Some(cause),
            _ => None,
        }
    }

    /// Whether this error was caused by a command deadline expiring.
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(self.cause(), Some(FailureCause::Timeout { .. }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_fatality() {
        assert!(!ErrorCategory::Guard.is_fatal());
        assert!(ErrorCategory::Action.is_fatal());
        assert!(ErrorCategory::Configuration.is_fatal());
    }

    #[test]
    fn test_io_permission_maps_to_permission_denied() {
        let cause = FailureCause::io(
            "/root/secret",
            io::Error::from(io::ErrorKind::PermissionDenied),
        );
        assert!(matches!(cause, FailureCause::PermissionDenied { .. }));

        let cause = FailureCause::io("/tmp/x", io::Error::from(io::ErrorKind::NotFound));
        assert!(matches!(cause, FailureCause::Io { .. }));
    }

    #[test]
    fn test_error_display() {
        let err = Error::action(
            "Execute['false']",
            FailureCause::NonZeroExit {
                code: 1,
                output: String::new(),
            },
        );
        assert_eq!(err.to_string(), "Execute['false'] failed: returned 1. ");
        assert_eq!(err.category(), ErrorCategory::Action);

        let err = Error::MissingBinding { key: "user".into() };
        assert!(err.to_string().contains("'user'"));
    }

    #[test]
    fn test_is_timeout() {
        let err = Error::action(
            "Execute['sleep 10']",
            FailureCause::Timeout {
                after: Duration::from_secs(1),
            },
        );
        assert!(err.is_timeout());
        assert!(!Error::ConfigurationMissing { key: "a/b".into() }.is_timeout());
    }
}
