//! Integration tests for the portal auth stack
//!
//! These drive the crate strictly through its public surface: a running
//! manager over the in-process provider and store, and the REST store
//! against a local HTTP server.

mod test_harness;

mod session_flow_test;
