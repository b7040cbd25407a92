//! CLI command implementations.

pub mod defaults;
pub mod offsets;
pub mod watch;
