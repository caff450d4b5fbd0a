//! Serialization of a frozen configuration into the build artifacts the
//! hypervisor image consumes.

use crate::config::FrozenConfig;
use crate::topology::VmClass;

/// Emits the VM configuration header.
///
/// Total and deterministic: the input is already proven consistent, and
/// repeated emission of an unchanged configuration is byte-identical.
/// Topology counts come first, then per-VM extent constants in index order,
/// primary before secondary. Absent extents are emitted as `0x0`, never
/// omitted; downstream consumers expect every constant to exist.
pub fn emit(config: &FrozenConfig) -> String {
    let topology = config.topology();
    let mut out = String::new();

    out.push_str("#ifndef VM_CONFIGURATIONS_H\n");
    out.push_str("#define VM_CONFIGURATIONS_H\n");
    out.push('\n');
    out.push_str("#include <misc_cfg.h>\n");
    out.push_str("#include <pci_devices.h>\n");
    out.push_str(
        "/* SERVICE_VM_NUM can only be 0 or 1; \
When SERVICE_VM_NUM is 1, MAX_POST_VM_NUM must be 0 too. */\n",
    );
    out.push_str(&format!(
        "#define PRE_VM_NUM {}U\n",
        topology.count_of(VmClass::PreLaunched)
    ));
    out.push_str(&format!(
        "#define SERVICE_VM_NUM {}U\n",
        topology.count_of(VmClass::ServiceVm)
    ));
    out.push_str(&format!(
        "#define MAX_POST_VM_NUM {}U\n",
        topology.count_of(VmClass::PostLaunched)
    ));
    out.push_str(&format!(
        "#define CONFIG_MAX_VM_NUM {}U\n",
        topology.max_vm_count
    ));

    for (vm_index, region) in config.regions().iter().enumerate() {
        out.push_str(&format!(
            "#define VM{}_CONFIG_MEM_START_HPA {:#x}UL\n",
            vm_index, region.primary.start_hpa
        ));
        out.push_str(&format!(
            "#define VM{}_CONFIG_MEM_SIZE {:#x}UL\n",
            vm_index, region.primary.size
        ));
        out.push_str(&format!(
            "#define VM{}_CONFIG_MEM_START_HPA2 {:#x}UL\n",
            vm_index, region.secondary.start_hpa
        ));
        out.push_str(&format!(
            "#define VM{}_CONFIG_MEM_SIZE_HPA2 {:#x}UL\n",
            vm_index, region.secondary.size
        ));
    }

    out.push('\n');
    out.push_str("#endif /* VM_CONFIGURATIONS_H */\n");

    debug!("emitted VM configuration header, {} byte(s)", out.len());
    out
}

/// Emits the board defconfig fragment carrying the hypervisor's own RAM
/// placement, or `None` when the scenario declared no hypervisor section.
pub fn emit_defconfig(config: &FrozenConfig) -> Option<String> {
    let hv = config.hv_ram()?;
    let mut out = String::new();

    out.push_str(&format!("CONFIG_HV_RAM_START={:#x}\n", hv.ram_start));
    out.push_str(&format!("CONFIG_HV_RAM_SIZE={:#x}\n", hv.ram_size));
    out.push_str(&format!("CONFIG_STACK_SIZE={:#x}\n", hv.stack_size));
    out.push_str(&format!(
        "CONFIG_MAX_VM_NUM={}\n",
        config.topology().max_vm_count
    ));

    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{HvRamConfig, PartitionConfig};
    use crate::region::MemoryExtent;
    use crate::topology::TopologyDescriptor;
    use crate::PlatformLimits;

    const GENERIC_HEADER: &str = "\
#ifndef VM_CONFIGURATIONS_H
#define VM_CONFIGURATIONS_H

#include <misc_cfg.h>
#include <pci_devices.h>
/* SERVICE_VM_NUM can only be 0 or 1; When SERVICE_VM_NUM is 1, MAX_POST_VM_NUM must be 0 too. */
#define PRE_VM_NUM 2U
#define SERVICE_VM_NUM 0U
#define MAX_POST_VM_NUM 14U
#define CONFIG_MAX_VM_NUM 16U
#define VM0_CONFIG_MEM_START_HPA 0x100000000UL
#define VM0_CONFIG_MEM_SIZE 0x20000000UL
#define VM0_CONFIG_MEM_START_HPA2 0x0UL
#define VM0_CONFIG_MEM_SIZE_HPA2 0x0UL
#define VM1_CONFIG_MEM_START_HPA 0x120000000UL
#define VM1_CONFIG_MEM_SIZE 0x20000000UL
#define VM1_CONFIG_MEM_START_HPA2 0x0UL
#define VM1_CONFIG_MEM_SIZE_HPA2 0x0UL

#endif /* VM_CONFIGURATIONS_H */
";

    fn generic_frozen(first: usize, second: usize) -> crate::FrozenConfig {
        // region registration order is a parameter so tests can prove it
        // does not leak into the output
        let mut config = PartitionConfig::new(TopologyDescriptor::new(2, 0, 14, 16));
        let extents = [
            MemoryExtent::new(0x1_0000_0000, 0x2000_0000),
            MemoryExtent::new(0x1_2000_0000, 0x2000_0000),
        ];
        config
            .add_region(first, extents[first], MemoryExtent::EMPTY)
            .unwrap();
        config
            .add_region(second, extents[second], MemoryExtent::EMPTY)
            .unwrap();
        config.validate(&PlatformLimits::default()).unwrap()
    }

    #[test]
    fn generic_layout_emits_the_consumed_header() {
        assert_eq!(emit(&generic_frozen(0, 1)), GENERIC_HEADER);
    }

    #[test]
    fn emission_is_idempotent() {
        let frozen = generic_frozen(0, 1);
        assert_eq!(emit(&frozen), emit(&frozen));
    }

    #[test]
    fn registration_order_does_not_change_output() {
        assert_eq!(emit(&generic_frozen(1, 0)), emit(&generic_frozen(0, 1)));
    }

    #[test]
    fn absent_extents_emit_as_zero() {
        let out = emit(&generic_frozen(0, 1));
        assert!(out.contains("#define VM0_CONFIG_MEM_START_HPA2 0x0UL\n"));
        assert!(out.contains("#define VM1_CONFIG_MEM_SIZE_HPA2 0x0UL\n"));
    }

    #[test]
    fn defconfig_needs_a_hypervisor_section() {
        assert_eq!(emit_defconfig(&generic_frozen(0, 1)), None);
    }

    #[test]
    fn defconfig_is_stable() {
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
        config.set_hv_ram(HvRamConfig {
            ram_start: 0x4000_0000,
            ram_size: 0x200_0000,
            stack_size: 0x2000,
        });
        let frozen = config.validate(&PlatformLimits::default()).unwrap();

        let expected = "\
CONFIG_HV_RAM_START=0x40000000
CONFIG_HV_RAM_SIZE=0x2000000
CONFIG_STACK_SIZE=0x2000
CONFIG_MAX_VM_NUM=16
";
        let out = emit_defconfig(&frozen).unwrap();
        assert_eq!(out, expected);
        assert_eq!(emit_defconfig(&frozen).unwrap(), out);
    }
}
