//! Thread control block storage and lifetime management.
//!
//! Provides the registry arena and the pinning protocol that keeps a control
//! block alive while another thread operates on it.

pub mod pin;
pub mod registry;

pub use pin::PinnedHandle;
pub use registry::{Registry, RegistryGuard};
