//! Shared helpers for integration tests.

#![allow(dead_code, clippy::unwrap_used)]

pub mod fake_browser;

use std::path::Path;

use bibharvest_core::{OutputSink, RunConfig, RunState};

/// Run policy with no politeness delay.
pub fn fast_config(failure_tolerance: u32) -> RunConfig {
    RunConfig {
        delay: std::time::Duration::ZERO,
        failure_tolerance,
    }
}

pub async fn run_state(dir: &Path, failure_tolerance: u32) -> RunState {
    let sink = OutputSink::open(dir).await.unwrap();
    RunState::new(sink, &fast_config(failure_tolerance))
}

/// Smallest body that passes PDF validation.
pub const PDF_BODY: &[u8] = b"%PDF-1.7\n1 0 obj\n<<>>\nendobj\n%%EOF\n";
