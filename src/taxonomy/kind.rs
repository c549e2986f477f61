//! Runtime failure kinds and their is-a hierarchy.

use super::category::ErrorCategory;
use super::codes;
use serde::{Deserialize, Serialize};
use std::fmt;

/// The runtime kind of a [`Failure`](super::Failure).
///
/// Kinds form a shallow tree rooted at [`FailureKind::Base`]. Handlers
/// registered against a parent kind also match its children, e.g. a handler
/// for `Network` sees `Timeout` failures.
///
/// | Kind | Parent | Category |
/// |------|--------|----------|
/// | `InvalidApiKey`, `TokenExpired` | `Authentication` | authentication |
/// | `MissingConfig`, `InvalidConfig` | `Configuration` | configuration |
/// | `Timeout`, `ConnectionRefused`, `ConnectionReset`, `DnsResolution` | `Network` | network |
/// | `RateLimit`, `ProviderUnavailable`, `ModelNotFound`, ... | `Provider` | provider |
/// | `CircuitOpen`, `Aggregate` | `Internal` | internal |
/// | `GithubApi`, `LinearApi` | `External` | external |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum FailureKind {
    Base,

    Authentication,
    InvalidApiKey,
    TokenExpired,

    Authorization,

    Configuration,
    MissingConfig,
    InvalidConfig,

    Validation,
    InvalidInput,

    Network,
    Timeout,
    ConnectionRefused,
    ConnectionReset,
    DnsResolution,

    FileSystem,
    FileNotFound,
    PermissionDenied,
    DiskFull,

    Provider,
    RateLimit,
    ProviderUnavailable,
    ModelNotFound,
    QuotaExceeded,
    ContextLengthExceeded,

    Agent,
    AgentExecution,
    AgentTimeout,

    Cli,
    CommandNotFound,
    InvalidArgument,

    Internal,
    CircuitOpen,
    Aggregate,

    External,
    GithubApi,
    LinearApi,

    Unknown,
}

impl FailureKind {
    /// The immediate parent kind, `None` only for [`FailureKind::Base`].
    pub fn parent(&self) -> Option<FailureKind> {
        use FailureKind as K;
        match self {
            K::Base => None,
            K::Authentication
            | K::Authorization
            | K::Configuration
            | K::Validation
            | K::Network
            | K::FileSystem
            | K::Provider
            | K::Agent
            | K::Cli
            | K::Internal
            | K::External
            | K::Unknown => Some(K::Base),
            K::InvalidApiKey | K::TokenExpired => Some(K::Authentication),
            K::MissingConfig | K::InvalidConfig => Some(K::Configuration),
            K::InvalidInput => Some(K::Validation),
            K::Timeout | K::ConnectionRefused | K::ConnectionReset | K::DnsResolution => {
                Some(K::Network)
            }
            K::FileNotFound | K::PermissionDenied | K::DiskFull => Some(K::FileSystem),
            K::RateLimit
            | K::ProviderUnavailable
            | K::ModelNotFound
            | K::QuotaExceeded
            | K::ContextLengthExceeded => Some(K::Provider),
            K::AgentExecution | K::AgentTimeout => Some(K::Agent),
            K::CommandNotFound | K::InvalidArgument => Some(K::Cli),
            K::CircuitOpen | K::Aggregate => Some(K::Internal),
            K::GithubApi | K::LinearApi => Some(K::External),
        }
    }

    /// Whether `self` is `other` or one of its descendants.
    pub fn is_a(&self, other: FailureKind) -> bool {
        let mut current = Some(*self);
        while let Some(kind) = current {
            if kind == other {
                return true;
            }
            current = kind.parent();
        }
        false
    }

    /// Number of is-a hops from `self` up to `ancestor`, if it is one.
    pub fn distance_to(&self, ancestor: FailureKind) -> Option<usize> {
        let mut current = Some(*self);
        let mut hops = 0;
        while let Some(kind) = current {
            if kind == ancestor {
                return Some(hops);
            }
            hops += 1;
            current = kind.parent();
        }
        None
    }

    pub fn category(&self) -> ErrorCategory {
        use FailureKind as K;
        match self {
            K::Base | K::Unknown => ErrorCategory::Unknown,
            K::Authentication | K::InvalidApiKey | K::TokenExpired => ErrorCategory::Authentication,
            K::Authorization => ErrorCategory::Authorization,
            K::Configuration | K::MissingConfig | K::InvalidConfig => ErrorCategory::Configuration,
            K::Validation | K::InvalidInput => ErrorCategory::Validation,
            K::Network
            | K::Timeout
            | K::ConnectionRefused
            | K::ConnectionReset
            | K::DnsResolution => ErrorCategory::Network,
            K::FileSystem | K::FileNotFound | K::PermissionDenied | K::DiskFull => {
                ErrorCategory::Filesystem
            }
            K::Provider
            | K::RateLimit
            | K::ProviderUnavailable
            | K::ModelNotFound
            | K::QuotaExceeded
            | K::ContextLengthExceeded => ErrorCategory::Provider,
            K::Agent | K::AgentExecution | K::AgentTimeout => ErrorCategory::Agent,
            K::Cli | K::CommandNotFound | K::InvalidArgument => ErrorCategory::Cli,
            K::Internal | K::CircuitOpen | K::Aggregate => ErrorCategory::Internal,
            K::External | K::GithubApi | K::LinearApi => ErrorCategory::External,
        }
    }

    /// Code assigned when the caller does not pick one.
    pub fn default_code(&self) -> &'static str {
        use FailureKind as K;
        match self {
            K::Base => codes::GENERIC_ERROR,
            K::Authentication => codes::AUTH_FAILED,
            K::InvalidApiKey => codes::AUTH_INVALID_API_KEY,
            K::TokenExpired => codes::AUTH_TOKEN_EXPIRED,
            K::Authorization => codes::AUTHZ_PERMISSION_DENIED,
            K::Configuration => codes::CONFIG_ERROR,
            K::MissingConfig => codes::CONFIG_MISSING,
            K::InvalidConfig => codes::CONFIG_INVALID,
            K::Validation => codes::VALIDATION_FAILED,
            K::InvalidInput => codes::VALIDATION_INVALID_INPUT,
            K::Network => codes::NETWORK_ERROR,
            K::Timeout => codes::NETWORK_TIMEOUT,
            K::ConnectionRefused => codes::NETWORK_CONNECTION_REFUSED,
            K::ConnectionReset => codes::NETWORK_CONNECTION_RESET,
            K::DnsResolution => codes::NETWORK_DNS_FAILED,
            K::FileSystem => codes::FS_ERROR,
            K::FileNotFound => codes::FS_FILE_NOT_FOUND,
            K::PermissionDenied => codes::FS_PERMISSION_DENIED,
            K::DiskFull => codes::FS_DISK_FULL,
            K::Provider => codes::PROVIDER_ERROR,
            K::RateLimit => codes::PROVIDER_RATE_LIMITED,
            K::ProviderUnavailable => codes::PROVIDER_UNAVAILABLE,
            K::ModelNotFound => codes::PROVIDER_MODEL_NOT_FOUND,
            K::QuotaExceeded => codes::PROVIDER_QUOTA_EXCEEDED,
            K::ContextLengthExceeded => codes::PROVIDER_CONTEXT_LENGTH_EXCEEDED,
            K::Agent => codes::AGENT_ERROR,
            K::AgentExecution => codes::AGENT_EXECUTION_FAILED,
            K::AgentTimeout => codes::AGENT_TIMEOUT,
            K::Cli => codes::CLI_ERROR,
            K::CommandNotFound => codes::CLI_COMMAND_NOT_FOUND,
            K::InvalidArgument => codes::CLI_INVALID_ARGUMENT,
            K::Internal => codes::INTERNAL_ERROR,
            K::CircuitOpen => codes::CIRCUIT_OPEN,
            K::Aggregate => codes::AGGREGATE_ERROR,
            K::External => codes::EXTERNAL_SERVICE_ERROR,
            K::GithubApi => codes::EXTERNAL_GITHUB_API_ERROR,
            K::LinearApi => codes::EXTERNAL_LINEAR_API_ERROR,
            K::Unknown => codes::UNKNOWN_ERROR,
        }
    }

    /// Type-style name used in dedup keys, metrics and rendered output.
    pub fn name(&self) -> &'static str {
        use FailureKind as K;
        match self {
            K::Base => "Error",
            K::Authentication => "AuthenticationError",
            K::InvalidApiKey => "InvalidApiKeyError",
            K::TokenExpired => "TokenExpiredError",
            K::Authorization => "AuthorizationError",
            K::Configuration => "ConfigurationError",
            K::MissingConfig => "MissingConfigError",
            K::InvalidConfig => "InvalidConfigError",
            K::Validation => "ValidationError",
            K::InvalidInput => "InvalidInputError",
            K::Network => "NetworkError",
            K::Timeout => "TimeoutError",
            K::ConnectionRefused => "ConnectionRefusedError",
            K::ConnectionReset => "ConnectionResetError",
            K::DnsResolution => "DnsResolutionError",
            K::FileSystem => "FileSystemError",
            K::FileNotFound => "FileNotFoundError",
            K::PermissionDenied => "PermissionDeniedError",
            K::DiskFull => "DiskFullError",
            K::Provider => "ProviderError",
            K::RateLimit => "RateLimitError",
            K::ProviderUnavailable => "ProviderUnavailableError",
            K::ModelNotFound => "ModelNotFoundError",
            K::QuotaExceeded => "QuotaExceededError",
            K::ContextLengthExceeded => "ContextLengthExceededError",
            K::Agent => "AgentError",
            K::AgentExecution => "AgentExecutionError",
            K::AgentTimeout => "AgentTimeoutError",
            K::Cli => "CliError",
            K::CommandNotFound => "CommandNotFoundError",
            K::InvalidArgument => "InvalidArgumentError",
            K::Internal => "InternalError",
            K::CircuitOpen => "CircuitOpenError",
            K::Aggregate => "AggregateError",
            K::External => "ExternalServiceError",
            K::GithubApi => "GithubApiError",
            K::LinearApi => "LinearApiError",
            K::Unknown => "UnknownError",
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
