use crate::error::{ConfigError, ConfigResult};
use crate::PlatformLimits;

/// Classes a VM slot can belong to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VmClass {
    /// Started by the hypervisor at boot, with a statically assigned
    /// host-physical memory region.
    PreLaunched,
    /// The privileged device-mediation VM. At most one may exist, and it
    /// excludes post-launched slots.
    ServiceVm,
    /// Started later by the service VM; carries no static region.
    PostLaunched,
}

/// VM population of a partitioning scenario.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TopologyDescriptor {
    pub pre_vm_count: u32,
    pub service_vm_count: u32,
    pub max_post_vm_count: u32,
    pub max_vm_count: u32,
}

impl TopologyDescriptor {
    pub const fn new(
        pre_vm_count: u32,
        service_vm_count: u32,
        max_post_vm_count: u32,
        max_vm_count: u32,
    ) -> Self {
        Self {
            pre_vm_count,
            service_vm_count,
            max_post_vm_count,
            max_vm_count,
        }
    }

    /// Number of slots of `class` this topology declares.
    pub const fn count_of(&self, class: VmClass) -> u32 {
        match class {
            VmClass::PreLaunched => self.pre_vm_count,
            VmClass::ServiceVm => self.service_vm_count,
            VmClass::PostLaunched => self.max_post_vm_count,
        }
    }

    /// Class of slot `vm_index`, or `None` beyond `max_vm_count`.
    ///
    /// Slots are ordered pre-launched first, then the service VM, then the
    /// post-launched range; index 0 is the primary boot VM. Only meaningful
    /// once the topology has passed validation.
    pub fn class_of(&self, vm_index: u32) -> Option<VmClass> {
        if vm_index < self.pre_vm_count {
            Some(VmClass::PreLaunched)
        } else if vm_index < self.pre_vm_count + self.service_vm_count {
            Some(VmClass::ServiceVm)
        } else if vm_index < self.max_vm_count {
            Some(VmClass::PostLaunched)
        } else {
            None
        }
    }

    /// Collects every violated topology rule.
    pub fn violations(&self, limits: &PlatformLimits) -> Vec<ConfigError> {
        let mut errors = Vec::new();

        let sum = self.pre_vm_count as u64
            + self.service_vm_count as u64
            + self.max_post_vm_count as u64;
        if sum != self.max_vm_count as u64 {
            errors.push(ConfigError::TopologyInconsistent(format!(
                "{} pre-launched + {} service + {} post-launched != {} total",
                self.pre_vm_count,
                self.service_vm_count,
                self.max_post_vm_count,
                self.max_vm_count
            )));
        }
        if self.service_vm_count > 1 {
            errors.push(ConfigError::TopologyInconsistent(format!(
                "at most one service VM is allowed, scenario declares {}",
                self.service_vm_count
            )));
        }
        if self.service_vm_count == 1 && self.max_post_vm_count > 0 {
            errors.push(ConfigError::TopologyInconsistent(format!(
                "{} post-launched VM(s) declared alongside a service VM",
                self.max_post_vm_count
            )));
        }
        if self.max_vm_count > limits.max_vm_num {
            errors.push(ConfigError::TopologyInconsistent(format!(
                "{} VMs declared, platform supports at most {}",
                self.max_vm_count, limits.max_vm_num
            )));
        }
        if self.pre_vm_count > limits.max_vm_num {
            errors.push(ConfigError::TopologyInconsistent(format!(
                "{} pre-launched VMs declared, platform supports at most {}",
                self.pre_vm_count, limits.max_vm_num
            )));
        }

        errors
    }

    /// First violated rule, if any.
    pub fn validate(&self, limits: &PlatformLimits) -> ConfigResult<()> {
        match self.violations(limits).into_iter().next() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}
