//! Deplink - dependency relationships between GitHub issues.
//!
//! This crate resolves issue references, reads and writes "blocked by" /
//! "blocks" relationships through the GitHub REST API, and refuses any change
//! that would introduce a dependency cycle.

#![forbid(unsafe_code)]

// Public modules for library usage
pub mod auth;
pub mod config;
pub mod domain;
pub mod error;
pub mod graph;
pub mod orchestrator;
pub mod repository;
pub mod resolver;
pub mod transport;

// Per-run wiring used by the binary
pub mod app;

// In-memory remote for tests
#[cfg(any(test, feature = "test-util"))]
pub mod testing;
