// crates/kite-config/src/lib.rs
// ============================================================================
// Module: Kite Configuration Library
// Description: Environment configuration for the Kite server.
// Purpose: Load and validate KITE_* settings before startup.
// Dependencies: kite-core, kite-store-sqlite, thiserror
// ============================================================================

//! ## Overview
//! Environment-variable configuration for the Kite issue-tracking server,
//! with documented defaults and fail-closed validation.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod config;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use config::ConfigError;
pub use config::FeatureFlags;
pub use config::KiteConfig;
pub use config::LogFormat;
pub use config::LoggingConfig;
pub use config::SecurityConfig;
pub use config::ServerConfig;
pub use config::StoreConfig;
pub use config::WebhookConfig;
