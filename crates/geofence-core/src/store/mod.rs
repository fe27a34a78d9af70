// # Region Store Implementations
//
// This module provides implementations of the RegionStore trait for
// different persistence strategies.

pub mod file;
pub mod memory;

pub use file::FileRegionStore;
pub use memory::MemoryRegionStore;
