// Test modules for aicli-resilience crate
//
// Each source module has a corresponding test file that focuses on
// behavior verification. Timing-sensitive tests run on a paused tokio clock.

// Shared fixtures
pub mod helpers;

pub mod circuit_breaker;
pub mod config;
pub mod dedup_logger;
pub mod retry;
