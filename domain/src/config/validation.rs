//! Configuration issues reported by validation.
//!
//! Validation never fails outright: it returns every issue it finds, each
//! with a severity. Callers print warnings and refuse to start on errors.

/// Severity level of a configuration issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Fatal: the configuration cannot work at all.
    Error,
    /// Non-fatal: the configuration works but may not behave as expected.
    Warning,
}

/// Identifies a specific configuration issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigIssueCode {
    /// A threshold that must be at least 1 is 0.
    ZeroThreshold,
    /// A capacity or attempt count is 0.
    ZeroCapacity,
    /// A timeout or interval is 0.
    ZeroDuration,
    /// The strategy override names no known strategy.
    UnknownStrategy,
    /// A score threshold is outside [0, 1].
    ScoreOutOfRange,
    /// Retry base delay exceeds the max delay.
    DelayInverted,
    /// A value was given that is not understood.
    UnknownValue,
    /// An inner time budget does not fit inside the timeout around it.
    TimeoutBudget,
}

/// A detected issue in the configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigIssue {
    pub severity: Severity,
    pub code: ConfigIssueCode,
    pub message: String,
}

impl ConfigIssue {
    pub fn error(code: ConfigIssueCode, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            code,
            message: message.into(),
        }
    }

    pub fn warning(code: ConfigIssueCode, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            code,
            message: message.into(),
        }
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl std::fmt::Display for ConfigIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self.severity {
            Severity::Error => "error",
            Severity::Warning => "warning",
        };
        write!(f, "{}: {}", label, self.message)
    }
}
