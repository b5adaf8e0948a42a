//! Virtual machine resource model.
//!
//! A deliberately small slice of the agent's VM schema: enough to address,
//! version, size, and rewire a machine. Fields the SDK never touches are
//! left to the agent.

use serde::{Deserialize, Serialize};

/// Named machine size presets understood by the fabric agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VirtualMachineSize {
    /// Agent-chosen default (4 vCPU / 4 GiB).
    Default,
    /// 2 vCPU / 2 GiB.
    StandardK8s,
    /// 2 vCPU / 4 GiB.
    StandardK8s2,
    /// 4 vCPU / 6 GiB.
    StandardK8s3,
    /// 4 vCPU / 4 GiB.
    StandardK8s4,
    /// Dimensions taken from the `custom_size` field.
    Custom,
}

/// Explicit dimensions for [`VirtualMachineSize::Custom`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VirtualMachineCustomSize {
    /// Number of virtual CPUs.
    pub cpu_count: u32,
    /// Memory in mebibytes.
    pub memory_mb: u64,
}

/// A data disk attached to a machine, addressed by its backing image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataDisk {
    /// URI of the backing virtual hard disk.
    pub vhd_uri: String,
}

/// Reference to a network interface resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkInterfaceReference {
    /// Identifier of the interface resource.
    pub id: String,
}

/// A virtual machine as held by the fabric agent.
///
/// `version` is assigned by the agent on every write; writes carrying a
/// version that is no longer current are rejected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VirtualMachine {
    /// Machine name, unique within its group.
    pub name: String,
    /// Agent-assigned version of the stored object. `None` for a machine
    /// that has never been written.
    pub version: Option<String>,
    /// Size preset.
    pub vm_size: VirtualMachineSize,
    /// Explicit dimensions, meaningful when `vm_size` is `Custom`.
    pub custom_size: Option<VirtualMachineCustomSize>,
    /// Attached data disks.
    pub data_disks: Vec<DataDisk>,
    /// Attached network interfaces.
    pub network_interfaces: Vec<NetworkInterfaceReference>,
}

impl VirtualMachine {
    /// A machine with the given name, default size, and no attachments.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: None,
            vm_size: VirtualMachineSize::Default,
            custom_size: None,
            data_disks: Vec::new(),
            network_interfaces: Vec::new(),
        }
    }
}

/// Power state transitions the agent can apply to a machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PowerOperation {
    /// Power the machine on.
    Start,
    /// Power the machine off.
    Stop,
    /// Suspend to memory.
    Pause,
    /// Suspend to disk.
    Save,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_machine_has_no_version_or_attachments() {
        let vm = VirtualMachine::new("vm-1");
        assert_eq!(vm.name, "vm-1");
        assert!(vm.version.is_none());
        assert_eq!(vm.vm_size, VirtualMachineSize::Default);
        assert!(vm.data_disks.is_empty());
        assert!(vm.network_interfaces.is_empty());
    }

    #[test]
    fn machine_serialization_round_trip() {
        let mut vm = VirtualMachine::new("vm-1");
        vm.vm_size = VirtualMachineSize::Custom;
        vm.custom_size = Some(VirtualMachineCustomSize {
            cpu_count: 8,
            memory_mb: 16_384,
        });
        vm.data_disks.push(DataDisk {
            vhd_uri: "vhd://images/data-0".into(),
        });

        let json = serde_json::to_string(&vm).unwrap();
        let restored: VirtualMachine = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, vm);
    }
}
