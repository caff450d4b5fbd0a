use crate::error::{ConfigError, ConfigResult};
use crate::region::{MemoryExtent, MemoryRegionTable, VmMemoryRegion};
use crate::topology::TopologyDescriptor;
use crate::PlatformLimits;

/// The hypervisor's own RAM placement, carried next to the VM layout so the
/// validator can prove the whole static memory map consistent at once.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HvRamConfig {
    pub ram_start: u64,
    pub ram_size: u64,
    pub stack_size: u64,
}

impl HvRamConfig {
    fn extent(&self) -> MemoryExtent {
        MemoryExtent::new(self.ram_start, self.ram_size)
    }
}

/// A candidate partition configuration: topology plus region table, not yet
/// proven consistent.
///
/// The aggregate is built once, validated once and then frozen; validation
/// failure discards it entirely, there is no partial-apply state.
#[derive(Debug, Clone)]
pub struct PartitionConfig {
    topology: TopologyDescriptor,
    regions: MemoryRegionTable,
    hv_ram: Option<HvRamConfig>,
}

impl PartitionConfig {
    pub fn new(topology: TopologyDescriptor) -> Self {
        Self {
            topology,
            regions: MemoryRegionTable::new(),
            hv_ram: None,
        }
    }

    pub fn topology(&self) -> &TopologyDescriptor {
        &self.topology
    }

    /// Registers the memory region pair of pre-launched VM `vm_index`.
    pub fn add_region(
        &mut self,
        vm_index: usize,
        primary: MemoryExtent,
        secondary: MemoryExtent,
    ) -> ConfigResult<()> {
        self.regions.add_region(vm_index, primary, secondary)
    }

    pub fn set_hv_ram(&mut self, hv_ram: HvRamConfig) {
        self.hv_ram = Some(hv_ram);
    }

    /// Proves the aggregate safe to freeze.
    ///
    /// Collects every non-empty extent tagged with its owning VM, sorts by
    /// start address and walks adjacent pairs for intersections, checks each
    /// end against the platform ceiling, then re-runs the topology rules.
    /// All violations are gathered before returning; hand-edited scenarios
    /// usually carry more than one.
    pub fn validate(self, limits: &PlatformLimits) -> Result<FrozenConfig, Vec<ConfigError>> {
        let mut errors = Vec::new();
        let ceiling = limits.phys_addr_ceiling();

        debug!(
            "validating partition configuration: {} declared region(s), ceiling {:#x}",
            self.regions.len(),
            ceiling
        );

        // Extent shape and bounds, in slot order. `tagged` keeps every
        // usable extent together with its owning VM.
        let mut tagged: Vec<(MemoryExtent, usize)> = Vec::new();
        for (vm_index, region) in self.regions.iter() {
            if vm_index >= self.topology.pre_vm_count as usize {
                errors.push(ConfigError::TopologyInconsistent(format!(
                    "VM {} carries a static memory region but only {} pre-launched slot(s) exist",
                    vm_index, self.topology.pre_vm_count
                )));
            }
            for extent in region.extents() {
                if let Err(err) = extent.check_well_formed(vm_index) {
                    errors.push(err);
                    continue;
                }
                if extent.is_empty() {
                    continue;
                }
                if extent.end() > Some(ceiling) {
                    errors.push(ConfigError::RegionOutOfBounds(vm_index));
                }
                tagged.push((extent, vm_index));
            }
        }

        // Sort is stable, so equal bases keep slot order and the reported
        // pair is deterministic.
        tagged.sort_by_key(|(extent, _)| extent.start_hpa);
        for pair in tagged.windows(2) {
            let (prev, prev_vm) = pair[0];
            let (next, next_vm) = pair[1];
            if prev.overlaps(&next) {
                errors.push(ConfigError::OverlappingRegions(prev_vm, next_vm));
            }
        }

        if let Some(hv) = &self.hv_ram {
            let hv_extent = hv.extent();
            match hv_extent.end() {
                _ if hv_extent.is_empty() => errors.push(ConfigError::Scenario(format!(
                    "hypervisor RAM at {:#x} with size {:#x} is not a usable extent",
                    hv.ram_start, hv.ram_size
                ))),
                None => errors.push(ConfigError::Scenario(format!(
                    "hypervisor RAM at {:#x} with size {:#x} wraps the 64-bit address space",
                    hv.ram_start, hv.ram_size
                ))),
                Some(hv_end) => {
                    if hv_end > ceiling {
                        errors.push(ConfigError::Scenario(
                            "hypervisor RAM exceeds the platform address limit".into(),
                        ));
                    }
                    for &(extent, vm_index) in &tagged {
                        if hv_extent.overlaps(&extent) {
                            errors.push(ConfigError::HypervisorRamConflict(vm_index));
                        }
                    }
                }
            }
        }

        errors.extend(self.topology.violations(limits));

        if !errors.is_empty() {
            warn!(
                "partition configuration rejected with {} violation(s)",
                errors.len()
            );
            return Err(errors);
        }

        // Every pre-launched slot freezes to a region, declared or not;
        // undeclared slots keep canonical zero extents.
        let regions = (0..self.topology.pre_vm_count as usize)
            .map(|vm_index| self.regions.get(vm_index).copied().unwrap_or_default())
            .collect();

        info!(
            "partition configuration frozen: {} pre-launched VM(s), {} extent(s)",
            self.topology.pre_vm_count,
            tagged.len()
        );

        Ok(FrozenConfig {
            topology: self.topology,
            regions,
            hv_ram: self.hv_ram,
        })
    }
}

/// A validated, immutable partition configuration.
///
/// Only [`PartitionConfig::validate`] constructs this type, so emission
/// never has to re-prove consistency.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrozenConfig {
    topology: TopologyDescriptor,
    regions: Vec<VmMemoryRegion>,
    hv_ram: Option<HvRamConfig>,
}

impl FrozenConfig {
    pub fn topology(&self) -> &TopologyDescriptor {
        &self.topology
    }

    /// Regions in VM index order, one per pre-launched slot.
    pub fn regions(&self) -> &[VmMemoryRegion] {
        &self.regions
    }

    pub fn hv_ram(&self) -> Option<&HvRamConfig> {
        self.hv_ram.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn generic_config() -> PartitionConfig {
        let mut config = PartitionConfig::new(TopologyDescriptor::new(2, 0, 14, 16));
        config
            .add_region(
                0,
                MemoryExtent::new(0x1_0000_0000, 0x2000_0000),
                MemoryExtent::EMPTY,
            )
            .unwrap();
        config
            .add_region(
                1,
                MemoryExtent::new(0x1_2000_0000, 0x2000_0000),
                MemoryExtent::EMPTY,
            )
            .unwrap();
        config
    }

    #[test]
    fn generic_layout_freezes() {
        let frozen = generic_config()
            .validate(&PlatformLimits::default())
            .unwrap();
        assert_eq!(frozen.regions().len(), 2);
        assert_eq!(frozen.regions()[1].primary.start_hpa, 0x1_2000_0000);
        assert!(frozen.regions()[0].secondary.is_empty());
    }

    #[test]
    fn overlapping_regions_are_rejected() {
        let mut config = PartitionConfig::new(TopologyDescriptor::new(2, 0, 14, 16));
        config
            .add_region(
                0,
                MemoryExtent::new(0x1_0000_0000, 0x2000_0000),
                MemoryExtent::EMPTY,
            )
            .unwrap();
        config
            .add_region(
                1,
                MemoryExtent::new(0x1_1000_0000, 0x2000_0000),
                MemoryExtent::EMPTY,
            )
            .unwrap();

        let errors = config.validate(&PlatformLimits::default()).unwrap_err();
        assert_eq!(errors, [ConfigError::OverlappingRegions(0, 1)]);
    }

    #[test]
    fn secondary_extents_join_the_overlap_walk() {
        let mut config = PartitionConfig::new(TopologyDescriptor::new(2, 0, 14, 16));
        config
            .add_region(
                0,
                MemoryExtent::new(0x1_0000_0000, 0x1000_0000),
                MemoryExtent::new(0x2_0000_0000, 0x1000_0000),
            )
            .unwrap();
        config
            .add_region(
                1,
                MemoryExtent::new(0x2_0800_0000, 0x1000_0000),
                MemoryExtent::EMPTY,
            )
            .unwrap();

        let errors = config.validate(&PlatformLimits::default()).unwrap_err();
        assert_eq!(errors, [ConfigError::OverlappingRegions(0, 1)]);
    }

    #[test]
    fn regions_beyond_the_ceiling_are_rejected() {
        let mut config = PartitionConfig::new(TopologyDescriptor::new(1, 0, 15, 16));
        config
            .add_region(
                0,
                MemoryExtent::new(0x7f_c000_0000, 0x8000_0000),
                MemoryExtent::EMPTY,
            )
            .unwrap();

        let errors = config.validate(&PlatformLimits::default()).unwrap_err();
        assert_eq!(errors, [ConfigError::RegionOutOfBounds(0)]);
    }

    #[test]
    fn all_violations_surface_in_one_pass() {
        // broken topology sum, malformed extent and an overlap at once
        let mut config = PartitionConfig::new(TopologyDescriptor::new(2, 0, 14, 15));
        config
            .add_region(
                0,
                MemoryExtent::new(0x1_0000_0000, 0x2000_0000),
                MemoryExtent::new(0x5000, 0),
            )
            .unwrap();
        config
            .add_region(
                1,
                MemoryExtent::new(0x1_1000_0000, 0x2000_0000),
                MemoryExtent::EMPTY,
            )
            .unwrap();

        let errors = config.validate(&PlatformLimits::default()).unwrap_err();
        assert!(errors
            .iter()
            .any(|e| matches!(e, ConfigError::MalformedExtent(0, _))));
        assert!(errors
            .iter()
            .any(|e| matches!(e, ConfigError::OverlappingRegions(0, 1))));
        assert!(errors
            .iter()
            .any(|e| matches!(e, ConfigError::TopologyInconsistent(_))));
        assert_eq!(errors.len(), 3);
    }

    #[test]
    fn region_for_missing_slot_is_inconsistent() {
        let mut config = PartitionConfig::new(TopologyDescriptor::new(1, 0, 15, 16));
        config
            .add_region(
                3,
                MemoryExtent::new(0x1_0000_0000, 0x2000_0000),
                MemoryExtent::EMPTY,
            )
            .unwrap();

        let errors = config.validate(&PlatformLimits::default()).unwrap_err();
        assert!(matches!(errors[0], ConfigError::TopologyInconsistent(_)));
    }

    #[test]
    fn undeclared_slots_freeze_to_zero_extents() {
        let mut config = PartitionConfig::new(TopologyDescriptor::new(2, 0, 14, 16));
        config
            .add_region(
                1,
                MemoryExtent::new(0x1_2000_0000, 0x2000_0000),
                MemoryExtent::EMPTY,
            )
            .unwrap();

        let frozen = config.validate(&PlatformLimits::default()).unwrap();
        assert_eq!(frozen.regions()[0], VmMemoryRegion::default());
        assert!(!frozen.regions()[1].primary.is_empty());
    }

    #[test]
    fn hypervisor_ram_must_not_intersect_vm_memory() {
        let mut config = generic_config();
        config.set_hv_ram(HvRamConfig {
            ram_start: 0x1_1000_0000,
            ram_size: 0x2000_0000,
            stack_size: 0x2000,
        });

        let errors = config.validate(&PlatformLimits::default()).unwrap_err();
        assert_eq!(
            errors,
            [
                ConfigError::HypervisorRamConflict(0),
                ConfigError::HypervisorRamConflict(1)
            ]
        );
    }

    #[test]
    fn disjoint_hypervisor_ram_is_accepted() {
        let mut config = generic_config();
        config.set_hv_ram(HvRamConfig {
            ram_start: 0x4000_0000,
            ram_size: 0x200_0000,
            stack_size: 0x2000,
        });

        let frozen = config.validate(&PlatformLimits::default()).unwrap();
        assert_eq!(frozen.hv_ram().unwrap().ram_start, 0x4000_0000);
    }
}
