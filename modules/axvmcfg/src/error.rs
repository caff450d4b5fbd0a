pub type ConfigResult<T = (), E = ConfigError> = std::result::Result<T, E>;

/// Violations a candidate configuration can be rejected with.
///
/// Validation never stops at the first violation; the compiler hands the
/// caller every error it found so one pass is enough to fix a hand-edited
/// scenario.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    TopologyInconsistent(String),
    OverlappingRegions(usize, usize),
    RegionOutOfBounds(usize),
    MalformedExtent(usize, String),
    HypervisorRamConflict(usize),
    Scenario(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::TopologyInconsistent(reason) => {
                write!(f, "Inconsistent VM topology: {}", reason)
            }
            ConfigError::OverlappingRegions(vm_a, vm_b) => write!(
                f,
                "Memory regions of VM {} and VM {} overlap.",
                vm_a, vm_b
            ),
            ConfigError::RegionOutOfBounds(vm_index) => write!(
                f,
                "Memory region of VM {} exceeds the platform address limit.",
                vm_index
            ),
            ConfigError::MalformedExtent(vm_index, reason) => {
                write!(f, "Malformed memory extent for VM {}: {}", vm_index, reason)
            }
            ConfigError::HypervisorRamConflict(vm_index) => write!(
                f,
                "Hypervisor RAM overlaps the memory region of VM {}.",
                vm_index
            ),
            ConfigError::Scenario(reason) => write!(f, "Invalid scenario: {}", reason),
        }
    }
}

impl std::error::Error for ConfigError {}
