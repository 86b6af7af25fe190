//! Plume Core
//!
//! Contains the particle simulation data storage:
//! - Type layouts and variables
//! - Double-buffered structure-of-arrays data sets
//! - Register tables for batch (VM) processing
//! - Typed and reflection iterators, diagnostics dump

pub mod data;
pub mod math;
pub mod settings;

pub use glam;

/// Engine version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_is_set() {
        assert!(!VERSION.is_empty());
    }
}
