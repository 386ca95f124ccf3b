// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # spikenet-observability
//!
//! Logging setup shared by the spikenet tools, with per-crate debug flags.
//!
//! Library crates only emit `tracing` events; installing a subscriber is the
//! binary's job, done once through [`init_logging`].

/// Crate version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod cli;
pub mod init;

pub use cli::*;
pub use init::*;
pub use spikenet_config::{LogFormat, LoggingConfig};

/// Known spikenet crate names for debug flags
pub const KNOWN_CRATES: &[&str] = &[
    "spikenet",
    "spikenet-npu-neural",
    "spikenet-npu-runtime",
    "spikenet-npu-plasticity",
    "spikenet-npu-burst-engine",
    "spikenet-config",
    "spikenet-observability",
];

/// Module path prefix `tracing` uses as the event target for a crate
pub fn crate_target(crate_name: &str) -> String {
    crate_name.replace('-', "_")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_crate_target() {
        assert_eq!(
            crate_target("spikenet-npu-burst-engine"),
            "spikenet_npu_burst_engine"
        );
        assert_eq!(crate_target("spikenet"), "spikenet");
    }
}
