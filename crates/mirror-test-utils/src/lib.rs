//! Shared test utilities for the mirror-sync workspace.
//!
//! This crate provides standardised test fixtures to eliminate duplication
//! across crate test suites. It is a dev-dependency only, never published.
//!
//! # Modules
//!
//! - [`git`]: bare remotes and scratch clones
//! - [`env`]: [`TestEnv`](env::TestEnv) with a remote, install root and sources

pub mod env;
pub mod git;
