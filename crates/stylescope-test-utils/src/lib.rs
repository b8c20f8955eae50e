#![deny(unsafe_code)]

//! Shared test utilities for the stylescope workspace.
//!
//! Temp-directory workspaces, instrumented loaders and scanners, a settings
//! builder, and tracing setup, so that integration tests stay short.
//!
//! Add this crate as a `[dev-dependency]` of any workspace member:
//!
//! ```toml
//! [dev-dependencies]
//! stylescope-test-utils = { workspace = true }
//! ```

pub mod loaders;
pub mod scanner;
pub mod settings;
pub mod tracing_setup;
pub mod workspace;

pub use loaders::{CountingLoader, GatedLoader};
pub use scanner::{CountingScanner, GatedScanner};
pub use settings::TestSettingsBuilder;
pub use tracing_setup::init_test_tracing;
pub use workspace::TestWorkspace;
