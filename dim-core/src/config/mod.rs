//! Configuration module for dim.
//!
//! Runtime tunables layered from defaults and `DIM_*` environment variables.

mod settings;

pub use settings::{Settings, DEFAULT_USER_AGENT};
