pub mod config;
pub mod core;

// Re-export commonly used items for convenience
pub use config::{ConciergeConfig, ConfigError};
pub use crate::core::*;
