//! Failure categories and severities.

use serde::{Deserialize, Serialize};
use std::fmt;

/// High-level categorization of failures for routing and handling decisions.
///
/// Every [`Failure`](super::Failure) carries exactly one category, fixed at
/// construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorCategory {
    /// Credentials are missing, invalid, or expired.
    Authentication,
    /// Credentials are valid but lack permission.
    Authorization,
    /// Local configuration is missing or invalid.
    Configuration,
    /// Input failed validation.
    Validation,
    /// Transport-level failures (timeouts, refused or reset connections).
    Network,
    /// Local file system failures.
    Filesystem,
    /// AI provider failures (rate limits, outages, unknown models).
    Provider,
    /// Agent execution failures.
    Agent,
    /// Command-line usage errors.
    Cli,
    /// Bugs and invariant violations inside this tool.
    Internal,
    /// Third-party services other than AI providers (GitHub, Linear).
    External,
    /// Anything that could not be classified.
    Unknown,
}

impl ErrorCategory {
    /// All categories, in declaration order.
    pub const ALL: [ErrorCategory; 12] = [
        Self::Authentication,
        Self::Authorization,
        Self::Configuration,
        Self::Validation,
        Self::Network,
        Self::Filesystem,
        Self::Provider,
        Self::Agent,
        Self::Cli,
        Self::Internal,
        Self::External,
        Self::Unknown,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Authentication => "authentication",
            Self::Authorization => "authorization",
            Self::Configuration => "configuration",
            Self::Validation => "validation",
            Self::Network => "network",
            Self::Filesystem => "filesystem",
            Self::Provider => "provider",
            Self::Agent => "agent",
            Self::Cli => "cli",
            Self::Internal => "internal",
            Self::External => "external",
            Self::Unknown => "unknown",
        }
    }

    /// Fallback user-facing message when a code has no registry entry.
    pub fn default_user_message(&self) -> &'static str {
        match self {
            Self::Authentication => "Authentication failed. Please check your credentials",
            Self::Authorization => "You do not have permission to perform this action",
            Self::Configuration => "Configuration problem. Please check your settings",
            Self::Validation => "The provided input is invalid",
            Self::Network => "Network problem. Please check your connection and try again",
            Self::Filesystem => "A file system operation failed",
            Self::Provider => "The AI provider returned an error. Please try again",
            Self::Agent => "The agent could not complete its task",
            Self::Cli => "Invalid command usage. Run with --help for usage",
            Self::Internal => "An internal error occurred",
            Self::External => "An external service returned an error",
            Self::Unknown => "An unexpected error occurred",
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Severity level for logging and alerting decisions.
///
/// Ordered from least to most severe, so `severity >= ErrorSeverity::High`
/// selects failures that need attention.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum ErrorSeverity {
    /// Expected or cosmetic failure.
    Low,
    /// Action failed but the system is stable.
    #[default]
    Medium,
    /// Needs attention; the user's task cannot proceed.
    High,
    /// System unusable or data at risk.
    Critical,
}

impl ErrorSeverity {
    pub const ALL: [ErrorSeverity; 4] = [Self::Low, Self::Medium, Self::High, Self::Critical];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }
}

impl fmt::Display for ErrorSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ErrorSeverity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            "critical" => Ok(Self::Critical),
            other => Err(format!("unknown severity: {other}")),
        }
    }
}
