//! Integration test suite for pawnpm
//!
//! End-to-end tests of the resolution pipeline against the in-memory git backend, plus CLI
//! tests that run the `pawnpm` binary.
//!
//! ```bash
//! cargo test --test integration
//! ```
//!
//! # Test Organization
//!
//! - **scenarios**: the canonical parse, override, lock and pin walkthroughs
//! - **properties**: cycle safety, outdated detection, pin precedence and parser invariants
//! - **ensure_flow**: graph building plus vendoring, re-runs and lockfile maintenance
//! - **cli**: command-line behavior through `assert_cmd`

mod cli;
mod common;
mod ensure_flow;
mod properties;
mod scenarios;
