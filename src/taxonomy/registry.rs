//! Static metadata registry keyed by failure code.
//!
//! The registry is the single place where a code's severity, retryability,
//! user-facing message and recovery suggestions are decided. Nothing else in
//! the crate infers retryability ad hoc.

use super::category::{ErrorCategory, ErrorSeverity};
use super::codes;
use crate::logging::log_debug;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

/// Registry entry describing one failure code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorCodeMetadata {
    pub code: String,
    pub severity: ErrorSeverity,
    pub category: ErrorCategory,
    pub description: String,
    pub user_message: String,
    /// Ordered from most to least likely to help.
    pub recovery_suggestions: Vec<String>,
    pub is_retryable: bool,
    #[serde(default)]
    pub related_codes: Vec<String>,
}

impl ErrorCodeMetadata {
    pub fn new(
        code: impl Into<String>,
        category: ErrorCategory,
        severity: ErrorSeverity,
        is_retryable: bool,
    ) -> Self {
        Self {
            code: code.into(),
            severity,
            category,
            description: String::new(),
            user_message: category.default_user_message().to_string(),
            recovery_suggestions: Vec::new(),
            is_retryable,
            related_codes: Vec::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_user_message(mut self, user_message: impl Into<String>) -> Self {
        self.user_message = user_message.into();
        self
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.recovery_suggestions.push(suggestion.into());
        self
    }

    pub fn with_related(mut self, code: impl Into<String>) -> Self {
        self.related_codes.push(code.into());
        self
    }
}

/// Thread-safe registry of [`ErrorCodeMetadata`].
///
/// Entries are only ever added or overwritten, never removed.
#[derive(Debug, Default)]
pub struct ErrorCodeRegistry {
    entries: RwLock<HashMap<String, ErrorCodeMetadata>>,
}

static GLOBAL_REGISTRY: Lazy<ErrorCodeRegistry> = Lazy::new(ErrorCodeRegistry::with_builtin);

impl ErrorCodeRegistry {
    /// Empty registry. Mostly useful in tests.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry pre-populated with the built-in code table.
    pub fn with_builtin() -> Self {
        let registry = Self::new();
        for entry in builtin_entries() {
            registry.insert(entry);
        }
        registry
    }

    /// Process-wide registry used when a failure is built without an
    /// explicit registry.
    pub fn global() -> &'static ErrorCodeRegistry {
        &GLOBAL_REGISTRY
    }

    /// Add or overwrite the entry for `metadata.code`. Last writer wins.
    pub fn register_code(&self, metadata: ErrorCodeMetadata) {
        log_debug!(
            code = %metadata.code,
            category = %metadata.category,
            severity = %metadata.severity,
            is_retryable = metadata.is_retryable,
            "Registering error code"
        );
        self.insert(metadata);
    }

    fn insert(&self, metadata: ErrorCodeMetadata) {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        entries.insert(metadata.code.clone(), metadata);
    }

    pub fn get(&self, code: &str) -> Option<ErrorCodeMetadata> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(code)
            .cloned()
    }

    pub fn contains(&self, code: &str) -> bool {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(code)
    }

    /// Registered retryability, `false` for unknown codes.
    pub fn is_retryable(&self, code: &str) -> bool {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(code)
            .is_some_and(|entry| entry.is_retryable)
    }

    /// Registered severity, `Medium` for unknown codes.
    pub fn severity(&self, code: &str) -> ErrorSeverity {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(code)
            .map(|entry| entry.severity)
            .unwrap_or_default()
    }

    pub fn recovery_suggestions(&self, code: &str) -> Vec<String> {
        self.get(code)
            .map(|entry| entry.recovery_suggestions)
            .unwrap_or_default()
    }

    pub fn by_category(&self, category: ErrorCategory) -> Vec<ErrorCodeMetadata> {
        let mut found: Vec<_> = self
            .entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .filter(|entry| entry.category == category)
            .cloned()
            .collect();
        found.sort_by(|a, b| a.code.cmp(&b.code));
        found
    }

    /// All registered codes, sorted.
    pub fn codes(&self) -> Vec<String> {
        let mut codes: Vec<_> = self
            .entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        codes.sort();
        codes
    }

    pub fn len(&self) -> usize {
        self.entries.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// ============================================================================
// Built-in table
// ============================================================================

fn entry(
    code: &str,
    category: ErrorCategory,
    severity: ErrorSeverity,
    is_retryable: bool,
    description: &str,
    user_message: &str,
    suggestions: &[&str],
) -> ErrorCodeMetadata {
    let mut metadata = ErrorCodeMetadata::new(code, category, severity, is_retryable)
        .with_description(description)
        .with_user_message(user_message);
    metadata.recovery_suggestions = suggestions.iter().map(|s| (*s).to_string()).collect();
    metadata
}

/// The fixed table loaded at process start.
pub fn builtin_entries() -> Vec<ErrorCodeMetadata> {
    use ErrorCategory as C;
    use ErrorSeverity as S;

    vec![
        entry(
            codes::GENERIC_ERROR,
            C::Unknown,
            S::Medium,
            false,
            "Unclassified failure",
            "An unexpected error occurred",
            &["Re-run the command with --verbose for details"],
        ),
        entry(
            codes::UNKNOWN_ERROR,
            C::Unknown,
            S::Medium,
            false,
            "Failure could not be classified",
            "An unexpected error occurred",
            &[
                "Re-run the command with --verbose for details",
                "Report the issue if it persists",
            ],
        ),
        // Authentication / authorization
        entry(
            codes::AUTH_FAILED,
            C::Authentication,
            S::High,
            false,
            "Authentication with a provider or service failed",
            "Authentication failed. Please check your credentials",
            &["Verify your credentials", "Run the login command again"],
        )
        .with_related(codes::AUTH_INVALID_API_KEY)
        .with_related(codes::AUTH_TOKEN_EXPIRED),
        entry(
            codes::AUTH_INVALID_API_KEY,
            C::Authentication,
            S::High,
            false,
            "The API key was rejected by the provider",
            "Your API key is invalid",
            &[
                "Check that the API key environment variable is set",
                "Generate a new API key in the provider dashboard",
                "Make sure the key belongs to the selected provider",
            ],
        )
        .with_related(codes::AUTH_FAILED),
        entry(
            codes::AUTH_TOKEN_EXPIRED,
            C::Authentication,
            S::Medium,
            false,
            "An OAuth or session token has expired",
            "Your session has expired. Please sign in again",
            &["Sign in again to refresh your token"],
        )
        .with_related(codes::AUTH_FAILED),
        entry(
            codes::AUTHZ_PERMISSION_DENIED,
            C::Authorization,
            S::High,
            false,
            "The authenticated identity lacks permission",
            "You do not have permission to perform this action",
            &[
                "Check the scopes granted to your token",
                "Ask a repository or workspace admin for access",
            ],
        ),
        // Configuration
        entry(
            codes::CONFIG_ERROR,
            C::Configuration,
            S::High,
            false,
            "Configuration could not be loaded",
            "Configuration problem. Please check your settings",
            &["Run the config validate command"],
        ),
        entry(
            codes::CONFIG_MISSING,
            C::Configuration,
            S::High,
            false,
            "A required configuration value is missing",
            "A required setting is missing",
            &[
                "Run the init command to create a configuration file",
                "Set the missing value through an environment variable",
            ],
        )
        .with_related(codes::CONFIG_INVALID),
        entry(
            codes::CONFIG_INVALID,
            C::Configuration,
            S::High,
            false,
            "A configuration value is invalid",
            "A setting has an invalid value",
            &["Check the value against the documented format"],
        )
        .with_related(codes::CONFIG_MISSING),
        // Validation
        entry(
            codes::VALIDATION_FAILED,
            C::Validation,
            S::Low,
            false,
            "Input validation failed",
            "The provided input is invalid",
            &["Check the input and try again"],
        ),
        entry(
            codes::VALIDATION_INVALID_INPUT,
            C::Validation,
            S::Low,
            false,
            "A specific input field is malformed",
            "One of the provided values is invalid",
            &["Check the highlighted field and try again"],
        ),
        // Network
        entry(
            codes::NETWORK_ERROR,
            C::Network,
            S::Medium,
            true,
            "Generic transport failure",
            "Network problem. Please check your connection and try again",
            &["Check your internet connection", "Retry in a few moments"],
        ),
        entry(
            codes::NETWORK_TIMEOUT,
            C::Network,
            S::Medium,
            true,
            "The remote side did not answer in time",
            "The request timed out. Please try again",
            &[
                "Retry the command",
                "Increase the request timeout in the configuration",
            ],
        )
        .with_related(codes::NETWORK_ERROR),
        entry(
            codes::NETWORK_CONNECTION_REFUSED,
            C::Network,
            S::Medium,
            true,
            "The remote host refused the connection",
            "Could not connect to the service",
            &[
                "Check that the service is running",
                "Verify the configured base URL and port",
            ],
        ),
        entry(
            codes::NETWORK_CONNECTION_RESET,
            C::Network,
            S::Medium,
            true,
            "The connection was reset mid-request",
            "The connection was interrupted. Please try again",
            &["Retry the command"],
        ),
        entry(
            codes::NETWORK_DNS_FAILED,
            C::Network,
            S::Medium,
            true,
            "Host name could not be resolved",
            "Could not resolve the service address",
            &["Check your DNS settings", "Verify the configured host name"],
        ),
        // File system
        entry(
            codes::FS_ERROR,
            C::Filesystem,
            S::Medium,
            false,
            "Generic file system failure",
            "A file system operation failed",
            &["Check the path and try again"],
        ),
        entry(
            codes::FS_FILE_NOT_FOUND,
            C::Filesystem,
            S::Medium,
            false,
            "A file or directory does not exist",
            "The requested file was not found",
            &["Check that the path exists", "Run the command from the project root"],
        ),
        entry(
            codes::FS_PERMISSION_DENIED,
            C::Filesystem,
            S::High,
            false,
            "The process lacks file permissions",
            "Permission denied while accessing a file",
            &["Check the file permissions", "Avoid running inside protected directories"],
        ),
        entry(
            codes::FS_DISK_FULL,
            C::Filesystem,
            S::Critical,
            false,
            "No space left on the device",
            "The disk is full",
            &["Free some disk space and try again"],
        ),
        // Provider
        entry(
            codes::PROVIDER_ERROR,
            C::Provider,
            S::Medium,
            true,
            "The AI provider returned an error",
            "The AI provider returned an error. Please try again",
            &["Retry the request", "Switch to another provider"],
        ),
        entry(
            codes::PROVIDER_RATE_LIMITED,
            C::Provider,
            S::Medium,
            true,
            "The provider is throttling requests",
            "Too many requests. Please wait a moment and try again",
            &[
                "Wait before retrying",
                "Reduce request concurrency",
                "Upgrade your provider plan for higher limits",
            ],
        )
        .with_related(codes::PROVIDER_QUOTA_EXCEEDED),
        entry(
            codes::PROVIDER_UNAVAILABLE,
            C::Provider,
            S::High,
            true,
            "The provider is down or overloaded (HTTP 503/504)",
            "The AI provider is temporarily unavailable",
            &["Retry in a few minutes", "Switch to another provider"],
        ),
        entry(
            codes::PROVIDER_MODEL_NOT_FOUND,
            C::Provider,
            S::Medium,
            false,
            "The requested model does not exist for this provider",
            "The selected model is not available",
            &["List available models", "Check the model name for typos"],
        ),
        entry(
            codes::PROVIDER_QUOTA_EXCEEDED,
            C::Provider,
            S::High,
            false,
            "Account quota or billing limit reached",
            "Your provider quota has been exhausted",
            &["Check your billing settings", "Switch to another provider"],
        )
        .with_related(codes::PROVIDER_RATE_LIMITED),
        entry(
            codes::PROVIDER_CONTEXT_LENGTH_EXCEEDED,
            C::Provider,
            S::Medium,
            false,
            "Prompt exceeds the model context window",
            "Your request is too long. Please shorten it and try again",
            &["Reduce the amount of context", "Use a model with a larger context window"],
        ),
        // Agent
        entry(
            codes::AGENT_ERROR,
            C::Agent,
            S::Medium,
            false,
            "Agent failure",
            "The agent could not complete its task",
            &["Check the agent logs"],
        ),
        entry(
            codes::AGENT_EXECUTION_FAILED,
            C::Agent,
            S::High,
            false,
            "An agent step raised an error",
            "The agent failed while running a step",
            &["Re-run the task", "Inspect the failing step with --verbose"],
        ),
        entry(
            codes::AGENT_TIMEOUT,
            C::Agent,
            S::Medium,
            true,
            "An agent step exceeded its time budget",
            "The agent took too long to respond",
            &["Retry the task", "Increase the agent timeout"],
        ),
        // CLI
        entry(
            codes::CLI_ERROR,
            C::Cli,
            S::Low,
            false,
            "Command-line usage error",
            "Invalid command usage. Run with --help for usage",
            &["Run the command with --help"],
        ),
        entry(
            codes::CLI_COMMAND_NOT_FOUND,
            C::Cli,
            S::Low,
            false,
            "Unknown sub-command",
            "Unknown command",
            &["Run --help to list available commands"],
        ),
        entry(
            codes::CLI_INVALID_ARGUMENT,
            C::Cli,
            S::Low,
            false,
            "An argument is malformed",
            "One of the arguments is invalid",
            &["Run the command with --help"],
        ),
        // Internal
        entry(
            codes::INTERNAL_ERROR,
            C::Internal,
            S::Critical,
            false,
            "Invariant violation or bug",
            "An internal error occurred",
            &["Report the issue with the output of --verbose"],
        ),
        entry(
            codes::CIRCUIT_OPEN,
            C::Internal,
            S::Medium,
            false,
            "A circuit breaker is rejecting calls to a failing dependency",
            "The service is temporarily disabled after repeated failures",
            &["Wait for the recovery timeout before retrying"],
        ),
        entry(
            codes::AGGREGATE_ERROR,
            C::Internal,
            S::High,
            false,
            "Several failures from one batch operation",
            "Multiple operations failed",
            &["Review each listed failure"],
        ),
        // External
        entry(
            codes::EXTERNAL_SERVICE_ERROR,
            C::External,
            S::Medium,
            true,
            "A third-party service returned an error",
            "An external service returned an error",
            &["Retry later", "Check the service status page"],
        ),
        entry(
            codes::EXTERNAL_GITHUB_API_ERROR,
            C::External,
            S::Medium,
            true,
            "The GitHub API returned an error",
            "GitHub returned an error",
            &["Check https://www.githubstatus.com", "Verify your GitHub token scopes"],
        ),
        entry(
            codes::EXTERNAL_LINEAR_API_ERROR,
            C::External,
            S::Medium,
            true,
            "The Linear API returned an error",
            "Linear returned an error",
            &["Verify your Linear API key", "Retry later"],
        ),
    ]
}
