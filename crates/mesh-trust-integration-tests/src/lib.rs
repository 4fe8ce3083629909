//! Integration test crate for mesh-trust.
//!
//! This crate exists solely to run tests that span the trust controller and
//! the node runtime. It has no public API - all functionality is in the test
//! modules.

#![forbid(unsafe_code)]
