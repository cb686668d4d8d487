//! Common test utilities and helpers

#![allow(dead_code)] // Test utilities may not all be used in every test file

pub mod builders;
pub mod harness;

use std::time::{Duration, Instant};

/// How long a test waits for something asynchronous before failing
pub fn test_timeout() -> Duration {
    Duration::from_secs(5)
}

/// Poll `cond` until it holds or the timeout expires
pub fn wait_until(what: &str, mut cond: impl FnMut() -> bool) {
    let deadline = Instant::now() + test_timeout();
    while !cond() {
        assert!(Instant::now() < deadline, "timed out waiting for {}", what);
        std::thread::sleep(Duration::from_millis(5));
    }
}
