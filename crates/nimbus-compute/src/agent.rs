//! Transport seam for virtual machine operations.

use nimbus_core::Result;

use crate::types::{PowerOperation, VirtualMachine};

/// The agent-side API for virtual machines.
///
/// One implementation per transport; the client layers retry and
/// convenience operations on top. Errors use the core taxonomy: notably
/// [`nimbus_core::Error::StaleVersion`] for rejected versioned writes and
/// [`nimbus_core::Error::NotFound`] for absent resources.
pub trait VirtualMachineAgent {
    /// Fetches machines in a group. An empty `name` returns every machine
    /// in the group; otherwise at most one entry is returned.
    fn get(&self, group: &str, name: &str)
    -> impl Future<Output = Result<Vec<VirtualMachine>>> + Send;

    /// Creates the machine or replaces its stored state, returning the
    /// state as written (with the agent-assigned version).
    fn create_or_update(
        &self,
        group: &str,
        name: &str,
        machine: VirtualMachine,
    ) -> impl Future<Output = Result<VirtualMachine>> + Send;

    /// Deletes the machine.
    fn delete(&self, group: &str, name: &str) -> impl Future<Output = Result<()>> + Send;

    /// Applies a power state transition.
    fn operate(
        &self,
        group: &str,
        name: &str,
        operation: PowerOperation,
    ) -> impl Future<Output = Result<()>> + Send;
}
