//! Cadence Core
//!
//! Contains the fundamental simulation systems:
//! - Content hashing
//! - Entity Component System (ECS)
//! - Fixed-timestep time and the simulation loop
//! - The surface abstraction the loop renders into

pub mod ecs;
pub mod hash;
pub mod math;
pub mod runloop;
pub mod surface;
pub mod time;

pub use glam;
pub use hash::{HashKey, HashKeyBuilder};

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
