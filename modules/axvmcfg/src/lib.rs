//! Static partition configuration compiler for type-1 hypervisor images.
//!
//! This crate turns a declarative partitioning scenario (how many VMs of each
//! class exist, and which host-physical ranges the pre-launched ones own)
//! into the frozen constant set the hypervisor build embeds. Construction,
//! validation and emission run once, in order; a scenario that fails
//! validation is discarded wholesale, with every violation reported in a
//! single pass.

#[macro_use]
extern crate log;

mod config;
mod emit;
mod error;
mod region;
mod topology;

pub mod scenario;

pub use config::{FrozenConfig, HvRamConfig, PartitionConfig};
pub use emit::{emit, emit_defconfig};
pub use error::{ConfigError, ConfigResult};
pub use region::{MemoryExtent, MemoryRegionTable, VmMemoryRegion};
pub use topology::{TopologyDescriptor, VmClass};

/// Host physical address.
pub type HostPhysAddr = u64;

/// Physical address width of the generic board.
pub const DEFAULT_PHYS_ADDR_BITS: u32 = 39;

/// Largest VM population any scenario may declare.
pub const MAX_VM_NUM: u32 = 16;

/// Read-only platform inputs the validator checks a scenario against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlatformLimits {
    /// Number of usable host-physical address bits.
    pub phys_addr_bits: u32,
    /// Upper bound on `max_vm_count`.
    pub max_vm_num: u32,
}

impl PlatformLimits {
    /// First host-physical address beyond the addressable range, or
    /// `u64::MAX` when the declared width covers the whole 64-bit space.
    pub fn phys_addr_ceiling(&self) -> u64 {
        match 1u64.checked_shl(self.phys_addr_bits) {
            Some(ceiling) => ceiling,
            None => u64::MAX,
        }
    }
}

impl Default for PlatformLimits {
    fn default() -> Self {
        Self {
            phys_addr_bits: DEFAULT_PHYS_ADDR_BITS,
            max_vm_num: MAX_VM_NUM,
        }
    }
}
