//! Port management: deterministic offset-based allocation with OS-level
//! and cross-environment conflict detection.

pub mod allocator;
pub mod scanner;

pub use allocator::{PortAllocator, EPHEMERAL_END, EPHEMERAL_START, MAX_INDEX, SHIFT};
pub use scanner::PortScanner;
