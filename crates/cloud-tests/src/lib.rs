//! Cloud Platform Integration Test Suite
//!
//! This crate validates the compute, volume, network and identity services of
//! a cloud deployment through their public APIs. It provides the harness the
//! scenario tests are built from:
//!
//! - [`credentials`]: one credential-provisioning interface over the v2
//!   (tenant) and v3 (project/domain) identity APIs
//! - [`eventual`]: the polling primitive every state-transition wait routes
//!   through
//! - [`scenario`]: ordered multi-step workflows (boot, attach, verify,
//!   teardown) with guaranteed LIFO cleanup
//! - [`fixtures`]: HTTP clients for the live cloud and an `ssh` executor
//!
//! # Features
//!
//! - `smoke`: Identity and credential provisioning against a live cloud
//! - `scenario`: Shelve/unshelve and server basic-ops scenarios against a live cloud
//! - `all`: Enable all live test categories
//!
//! Mock-backed tests always run and need no cloud.
//!
//! # Usage
//!
//! ```bash
//! # Mock-backed suites only
//! cargo test -p cloud-tests
//!
//! # Identity smoke tests (needs CLOUDCHECK_* environment)
//! cargo test -p cloud-tests --features smoke
//!
//! # Full live suite
//! cargo test -p cloud-tests --features all
//! ```

pub mod adapters;
pub mod config;
pub mod credentials;
pub mod eventual;
pub mod fixtures;
pub mod models;
pub mod policy;
pub mod scenario;
pub mod waiters;
