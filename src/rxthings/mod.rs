//! Consumers of the receive buffers.

pub mod slots;
pub use slots::*;
