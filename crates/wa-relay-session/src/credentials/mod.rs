//! Credential storage implementations.

pub mod local;

#[cfg(feature = "memory")]
pub mod memory;

pub use local::LocalCredentials;

#[cfg(feature = "memory")]
pub use memory::MemoryCredentials;
