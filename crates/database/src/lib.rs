//! # Sqlgate Database Crate
//!
//! This crate is the gateway's only interface to PostgreSQL. It owns the
//! connection handling and the execution of client-supplied SQL.
//!
//! ## Architectural Principles
//!
//! - **Strategy-Agnostic Execution:** The `Database` handle hides whether
//!   connections come from a pool, are opened per statement, or are a single
//!   shared session. Callers run statements the same way under every
//!   strategy.
//! - **Runtime SQL:** Statements arrive from clients at runtime, so queries
//!   are never prepared against a known schema. Results are decoded
//!   dynamically, column by column, into JSON.
//! - **One Statement, One Transaction:** Every statement runs inside its own
//!   transaction. Reads roll back, writes commit, and failures can never
//!   leave a partial commit behind.
//!
//! ## Public API
//!
//! - `Database`: The strategy-aware connection handle, built from `Settings`.
//! - `StatementOutcome`: The select/modify result envelope for one statement.
//! - `is_select` / `has_internal_semicolon`: The lexical checks applied to
//!   incoming statements.
//! - `DbError`: The specific error types that can be returned from this crate.

// Declare the modules that constitute this crate.
pub mod connection;
pub mod error;
pub mod executor;

// Re-export the key components to create a clean, public-facing API.
pub use connection::Database;
pub use error::DbError;
pub use executor::{StatementOutcome, has_internal_semicolon, is_select};
