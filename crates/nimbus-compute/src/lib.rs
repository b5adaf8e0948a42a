//! Virtual machine client for the Nimbus SDK.
//!
//! The fabric agent stores machines as versioned objects and rejects
//! writes carrying a stale version. [`VirtualMachineClient`] layers
//! optimistic read-modify-write retries on top of a transport-specific
//! [`VirtualMachineAgent`], plus power-state helpers and attach/detach
//! operations for disks and network interfaces.

#![forbid(unsafe_code)]

pub mod agent;
pub mod client;
pub mod types;

pub use agent::VirtualMachineAgent;
pub use client::VirtualMachineClient;
pub use types::{
    DataDisk, NetworkInterfaceReference, PowerOperation, VirtualMachine,
    VirtualMachineCustomSize, VirtualMachineSize,
};
