// crates/kite-store-sqlite/src/lib.rs
// ============================================================================
// Module: Kite SQLite Store Library
// Description: Durable SQLite-backed issue store for Kite.
// Purpose: Persist issues, scopes, links, and relationships with WAL.
// Dependencies: kite-core, rusqlite
// ============================================================================

//! ## Overview
//! Durable [`kite_core::IssueStore`] implementation over `SQLite` with WAL
//! journaling and transaction-per-operation semantics.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod store;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use store::SqliteIssueStore;
pub use store::SqliteJournalMode;
pub use store::SqliteStoreConfig;
pub use store::SqliteSyncMode;
