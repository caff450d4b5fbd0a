use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};

use crate::error::{ConfigError, ConfigResult};
use crate::HostPhysAddr;

/// A contiguous host-physical range, `[start_hpa, start_hpa + size)`.
///
/// A zero `size` marks the extent as absent. Absent extents must keep a zero
/// base so that "unused" has exactly one representation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MemoryExtent {
    pub start_hpa: HostPhysAddr,
    pub size: u64,
}

impl MemoryExtent {
    /// The canonical absent extent.
    pub const EMPTY: Self = Self {
        start_hpa: 0,
        size: 0,
    };

    pub const fn new(start_hpa: HostPhysAddr, size: u64) -> Self {
        Self { start_hpa, size }
    }

    pub const fn is_empty(&self) -> bool {
        self.size == 0
    }

    /// Exclusive end address, `None` on 64-bit wrap-around.
    pub fn end(&self) -> Option<u64> {
        self.start_hpa.checked_add(self.size)
    }

    /// Whether the two extents share at least one address.
    pub fn overlaps(&self, other: &MemoryExtent) -> bool {
        if self.is_empty() || other.is_empty() {
            return false;
        }
        let self_end = self.start_hpa.saturating_add(self.size);
        let other_end = other.start_hpa.saturating_add(other.size);
        self.start_hpa < other_end && other.start_hpa < self_end
    }

    pub(crate) fn check_well_formed(&self, vm_index: usize) -> ConfigResult<()> {
        if self.is_empty() {
            if self.start_hpa != 0 {
                return Err(ConfigError::MalformedExtent(
                    vm_index,
                    format!(
                        "zero-sized extent must keep a zero base, found {:#x}",
                        self.start_hpa
                    ),
                ));
            }
            return Ok(());
        }
        if self.end().is_none() {
            return Err(ConfigError::MalformedExtent(
                vm_index,
                format!(
                    "extent at {:#x} with size {:#x} wraps the 64-bit address space",
                    self.start_hpa, self.size
                ),
            ));
        }
        Ok(())
    }
}

impl Display for MemoryExtent {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "[{:#x}, {:#x})",
            self.start_hpa,
            self.start_hpa.saturating_add(self.size)
        )
    }
}

/// The static memory assignment of one pre-launched VM slot: a primary
/// extent plus a second one for split layouts, e.g. memory placed below and
/// above a platform reserved hole.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VmMemoryRegion {
    pub primary: MemoryExtent,
    pub secondary: MemoryExtent,
}

impl VmMemoryRegion {
    pub const fn new(primary: MemoryExtent, secondary: MemoryExtent) -> Self {
        Self { primary, secondary }
    }

    /// Both extents, primary first.
    pub const fn extents(&self) -> [MemoryExtent; 2] {
        [self.primary, self.secondary]
    }
}

/// Memory regions keyed by VM index.
///
/// Slotting is by index rather than call order, so scenario fragments may
/// register their VMs in any order without changing the frozen layout.
#[derive(Debug, Clone, Default)]
pub struct MemoryRegionTable {
    entries: BTreeMap<usize, VmMemoryRegion>,
}

impl MemoryRegionTable {
    pub const fn new() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }

    /// Registers the region pair for `vm_index`. A slot can be filled only
    /// once; a second registration reports the collision instead of silently
    /// replacing the first.
    pub fn add_region(
        &mut self,
        vm_index: usize,
        primary: MemoryExtent,
        secondary: MemoryExtent,
    ) -> ConfigResult<()> {
        if self.entries.contains_key(&vm_index) {
            return Err(ConfigError::Scenario(format!(
                "memory region for VM {} declared twice",
                vm_index
            )));
        }
        self.entries
            .insert(vm_index, VmMemoryRegion::new(primary, secondary));
        Ok(())
    }

    pub fn get(&self, vm_index: usize) -> Option<&VmMemoryRegion> {
        self.entries.get(&vm_index)
    }

    /// Registered regions in VM-index order.
    pub fn iter(&self) -> impl Iterator<Item = (usize, &VmMemoryRegion)> {
        self.entries.iter().map(|(index, region)| (*index, region))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
