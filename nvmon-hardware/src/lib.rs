// Re-export main components for easy access
pub use error::{GpuError, Result};
pub use monitor::{GpuSample, NvmlSession};
pub use power::PowerError;

pub mod error;
pub mod monitor;
pub mod power;

/// Version of the nvmon-hardware library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Get library version
pub fn version() -> &'static str {
    VERSION
}
