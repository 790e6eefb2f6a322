//! Aggregate Depth Relay - Main Library
//!
//! ## Architecture
//!
//! - **bin_common**: Common utilities for binary executables (CLI, runners)
//! - **depth_relay**: Gate, fan-out, orchestrator and adapters (re-exported from workspace)
//! - **depthsockets**: WebSocket transport (re-exported from workspace)
//!
//! ## Usage in Binaries
//!
//! ```rust,ignore
//! use aggregate_depth::bin_common::resolve_config_path;
//! use aggregate_depth::depth_relay::{RelayApp, RelayConfig};
//! ```

// Re-export workspace libraries for convenience
pub use depth_relay;
pub use depthsockets;

// Binary common utilities
pub mod bin_common {
    //! Common utilities for binary executables

    pub mod cli;
    pub mod runner;

    pub use cli::{parse_args, resolve_config_path, resolve_config_path_with, ConfigSource, CONFIG_ENV_VAR, DEFAULT_CONFIG_PATH};
    pub use runner::{BinaryRunner, RunConfig};
}
