//! Integration test crate for the Velvet daemon.
//!
//! This crate has no library code — it only contains integration tests
//! that exercise end-to-end flows across multiple workspace crates
//! against the in-memory database and mock chain.
//!
//! Run all integration tests:
//! ```sh
//! cargo test -p velvet-integration-tests
//! ```
