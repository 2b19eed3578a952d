//! Common test utilities
//!
//! Each integration test binary pulls in only part of this module.

#![allow(dead_code)]

pub mod deconz_mock;
pub mod scripted;
pub mod test_fixtures;

/// Install a test subscriber once so failures come with their log lines.
pub fn init_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("deflux=debug")
        .with_test_writer()
        .try_init();
}
