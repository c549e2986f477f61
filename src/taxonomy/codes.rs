//! Well-known failure codes.
//!
//! Codes are plain strings so collaborators can register their own through
//! [`ErrorCodeRegistry::register_code`](super::ErrorCodeRegistry::register_code).
//! The constants below cover every code in the built-in table.

// Generic
pub const GENERIC_ERROR: &str = "GENERIC_ERROR";
pub const UNKNOWN_ERROR: &str = "UNKNOWN_ERROR";

// Authentication / authorization
pub const AUTH_FAILED: &str = "AUTH_FAILED";
pub const AUTH_INVALID_API_KEY: &str = "AUTH_INVALID_API_KEY";
pub const AUTH_TOKEN_EXPIRED: &str = "AUTH_TOKEN_EXPIRED";
pub const AUTHZ_PERMISSION_DENIED: &str = "AUTHZ_PERMISSION_DENIED";

// Configuration
pub const CONFIG_ERROR: &str = "CONFIG_ERROR";
pub const CONFIG_MISSING: &str = "CONFIG_MISSING";
pub const CONFIG_INVALID: &str = "CONFIG_INVALID";

// Validation
pub const VALIDATION_FAILED: &str = "VALIDATION_FAILED";
pub const VALIDATION_INVALID_INPUT: &str = "VALIDATION_INVALID_INPUT";

// Network
pub const NETWORK_ERROR: &str = "NETWORK_ERROR";
pub const NETWORK_TIMEOUT: &str = "NETWORK_TIMEOUT";
pub const NETWORK_CONNECTION_REFUSED: &str = "NETWORK_CONNECTION_REFUSED";
pub const NETWORK_CONNECTION_RESET: &str = "NETWORK_CONNECTION_RESET";
pub const NETWORK_DNS_FAILED: &str = "NETWORK_DNS_FAILED";

// File system
pub const FS_ERROR: &str = "FS_ERROR";
pub const FS_FILE_NOT_FOUND: &str = "FS_FILE_NOT_FOUND";
pub const FS_PERMISSION_DENIED: &str = "FS_PERMISSION_DENIED";
pub const FS_DISK_FULL: &str = "FS_DISK_FULL";

// Provider
pub const PROVIDER_ERROR: &str = "PROVIDER_ERROR";
pub const PROVIDER_RATE_LIMITED: &str = "PROVIDER_RATE_LIMITED";
pub const PROVIDER_UNAVAILABLE: &str = "PROVIDER_UNAVAILABLE";
pub const PROVIDER_MODEL_NOT_FOUND: &str = "PROVIDER_MODEL_NOT_FOUND";
pub const PROVIDER_QUOTA_EXCEEDED: &str = "PROVIDER_QUOTA_EXCEEDED";
pub const PROVIDER_CONTEXT_LENGTH_EXCEEDED: &str = "PROVIDER_CONTEXT_LENGTH_EXCEEDED";

// Agent
pub const AGENT_ERROR: &str = "AGENT_ERROR";
pub const AGENT_EXECUTION_FAILED: &str = "AGENT_EXECUTION_FAILED";
pub const AGENT_TIMEOUT: &str = "AGENT_TIMEOUT";

// CLI
pub const CLI_ERROR: &str = "CLI_ERROR";
pub const CLI_COMMAND_NOT_FOUND: &str = "CLI_COMMAND_NOT_FOUND";
pub const CLI_INVALID_ARGUMENT: &str = "CLI_INVALID_ARGUMENT";

// Internal
pub const INTERNAL_ERROR: &str = "INTERNAL_ERROR";
pub const CIRCUIT_OPEN: &str = "CIRCUIT_OPEN";
pub const AGGREGATE_ERROR: &str = "AGGREGATE_ERROR";

// External services
pub const EXTERNAL_SERVICE_ERROR: &str = "EXTERNAL_SERVICE_ERROR";
pub const EXTERNAL_GITHUB_API_ERROR: &str = "EXTERNAL_GITHUB_API_ERROR";
pub const EXTERNAL_LINEAR_API_ERROR: &str = "EXTERNAL_LINEAR_API_ERROR";
