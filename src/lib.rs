//! Exam sniper. Watches a capacity-limited registration portal and claims
//! one of several watched exam slots as soon as it opens.
//!
//! Library crate exposing all modules for use by integration tests
//! and the binary entry point.

pub mod config;
pub mod types;
pub mod surface;
pub mod engine;
pub mod runner;
pub mod scheduler;
pub mod shell;
pub mod server;

#[cfg(any(test, feature = "testkit"))]
pub mod testkit;
