//! TOML scenario front end.
//!
//! The scenario file is the configuration source feeding the compiler: VM
//! class counts, one or two host-physical extents per pre-launched VM, and
//! optionally the hypervisor's own RAM placement. Parsing only assembles the
//! candidate aggregate; whether the described layout is actually consistent
//! is the validator's call.

use serde::Deserialize;

use crate::config::{HvRamConfig, PartitionConfig};
use crate::error::{ConfigError, ConfigResult};
use crate::region::MemoryExtent;
use crate::topology::TopologyDescriptor;
use crate::{PlatformLimits, DEFAULT_PHYS_ADDR_BITS, MAX_VM_NUM};

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ScenarioDoc {
    #[serde(default)]
    platform: PlatformSection,
    topology: TopologySection,
    hypervisor: Option<HvSection>,
    #[serde(default, rename = "vm")]
    vms: Vec<VmSection>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct PlatformSection {
    #[serde(default = "default_phys_addr_bits")]
    phys_addr_bits: u32,
    #[serde(default = "default_max_vm_num")]
    max_vm_num: u32,
}

impl Default for PlatformSection {
    fn default() -> Self {
        Self {
            phys_addr_bits: DEFAULT_PHYS_ADDR_BITS,
            max_vm_num: MAX_VM_NUM,
        }
    }
}

fn default_phys_addr_bits() -> u32 {
    DEFAULT_PHYS_ADDR_BITS
}

fn default_max_vm_num() -> u32 {
    MAX_VM_NUM
}

fn default_stack_size() -> u64 {
    0x2000
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct TopologySection {
    pre_launched: u32,
    service: u32,
    max_post_launched: u32,
    max_vms: u32,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct HvSection {
    ram_start: u64,
    ram_size: u64,
    #[serde(default = "default_stack_size")]
    stack_size: u64,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct VmSection {
    name: Option<String>,
    mem_start_hpa: u64,
    mem_size: u64,
    #[serde(default)]
    mem_start_hpa2: u64,
    #[serde(default)]
    mem_size_hpa2: u64,
}

/// Parses a scenario document into the candidate configuration plus the
/// platform limits it must be validated against.
pub fn parse(text: &str) -> ConfigResult<(PartitionConfig, PlatformLimits)> {
    let doc: ScenarioDoc =
        toml_edit::de::from_str(text).map_err(|err| ConfigError::Scenario(err.to_string()))?;

    let limits = PlatformLimits {
        phys_addr_bits: doc.platform.phys_addr_bits,
        max_vm_num: doc.platform.max_vm_num,
    };

    let topology = TopologyDescriptor::new(
        doc.topology.pre_launched,
        doc.topology.service,
        doc.topology.max_post_launched,
        doc.topology.max_vms,
    );

    // One [[vm]] block per pre-launched slot, in slot order.
    if doc.vms.len() != doc.topology.pre_launched as usize {
        return Err(ConfigError::Scenario(format!(
            "{} [[vm]] block(s) declared for {} pre-launched VM(s)",
            doc.vms.len(),
            doc.topology.pre_launched
        )));
    }

    let mut config = PartitionConfig::new(topology);
    for (vm_index, vm) in doc.vms.iter().enumerate() {
        let primary = MemoryExtent::new(vm.mem_start_hpa, vm.mem_size);
        let secondary = MemoryExtent::new(vm.mem_start_hpa2, vm.mem_size_hpa2);
        debug!(
            "scenario VM {} ({}): primary {}, secondary {}",
            vm_index,
            vm.name.as_deref().unwrap_or("unnamed"),
            primary,
            secondary
        );
        config.add_region(vm_index, primary, secondary)?;
    }

    if let Some(hv) = &doc.hypervisor {
        config.set_hv_ram(HvRamConfig {
            ram_start: hv.ram_start,
            ram_size: hv.ram_size,
            stack_size: hv.stack_size,
        });
    }

    Ok((config, limits))
}
