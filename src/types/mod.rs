//! Core type definitions using newtype patterns for type safety.
//!
//! These types prevent common logic errors by making invalid states unrepresentable
//! at compile time.

mod hwaddr;
mod target;

pub use hwaddr::{HwAddr, HwAddrError};
pub use target::{TargetError, TargetList, TargetSpec};
