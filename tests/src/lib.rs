//! # Knockgate Test Suite
//!
//! Unified test crate containing:
//!
//! ```text
//! tests/src/
//! └── integration/
//!     ├── knock_flows.rs   # End-to-end sequence → grant → revoke flows
//!     ├── expiry.rs        # Timer-driven revocation under a paused clock
//!     ├── abuse.rs         # Scanners, floods, and failure injection
//!     └── daemon.rs        # Config loading through to a live gate
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! cargo test -p kg-tests
//! cargo test -p kg-tests integration::
//! ```

#![allow(dead_code)]

pub mod integration;
