//! Virtual machine client.
//!
//! Wraps a [`VirtualMachineAgent`] with power-state helpers and
//! optimistic mutations. Every mutation goes through
//! [`nimbus_core::apply_update`] with the client itself as the versioned
//! store, so concurrent writers converge instead of failing.

use nimbus_core::{Error, Result, RetryPolicy, VersionedStore, apply_update, with_deadline};
use tracing::debug;

use crate::agent::VirtualMachineAgent;
use crate::types::{
    DataDisk, NetworkInterfaceReference, PowerOperation, VirtualMachine,
    VirtualMachineCustomSize, VirtualMachineSize,
};

/// Client for virtual machine resources.
pub struct VirtualMachineClient<A> {
    agent: A,
    policy: RetryPolicy,
}

impl<A> VirtualMachineClient<A>
where
    A: VirtualMachineAgent + Sync,
{
    /// Creates a client with the default retry policy.
    pub fn new(agent: A) -> Self {
        Self {
            agent,
            policy: RetryPolicy::default(),
        }
    }

    /// Creates a client with an explicit retry policy for versioned writes.
    pub fn with_policy(agent: A, policy: RetryPolicy) -> Self {
        Self { agent, policy }
    }

    /// Fetches machines in a group. An empty `name` returns every machine.
    ///
    /// # Errors
    ///
    /// Agent errors pass through unchanged; every agent call is bounded by
    /// the system-wide RPC ceiling and fails with
    /// [`Error::DeadlineExceeded`] when it is exceeded.
    pub async fn get(&self, group: &str, name: &str) -> Result<Vec<VirtualMachine>> {
        with_deadline(self.agent.get(group, name)).await
    }

    /// Creates or replaces a machine, returning the stored state.
    ///
    /// # Errors
    ///
    /// Agent errors pass through, including [`Error::StaleVersion`] when
    /// the supplied version is no longer current.
    pub async fn create_or_update(
        &self,
        group: &str,
        name: &str,
        machine: VirtualMachine,
    ) -> Result<VirtualMachine> {
        with_deadline(self.agent.create_or_update(group, name, machine)).await
    }

    /// Deletes a machine.
    ///
    /// # Errors
    ///
    /// [`Error::NotFound`] when no such machine exists.
    pub async fn delete(&self, group: &str, name: &str) -> Result<()> {
        let machines = with_deadline(self.agent.get(group, name)).await?;
        if machines.is_empty() {
            return Err(Error::NotFound(format!("{group}/{name}")));
        }
        debug!(group, name, "deleting virtual machine");
        with_deadline(self.agent.delete(group, name)).await
    }

    /// Powers the machine on. Starting a running machine succeeds.
    ///
    /// # Errors
    ///
    /// Agent errors pass through unchanged.
    pub async fn start(&self, group: &str, name: &str) -> Result<()> {
        with_deadline(self.agent.operate(group, name, PowerOperation::Start)).await
    }

    /// Powers the machine off.
    ///
    /// # Errors
    ///
    /// Agent errors pass through unchanged.
    pub async fn stop(&self, group: &str, name: &str) -> Result<()> {
        with_deadline(self.agent.operate(group, name, PowerOperation::Stop)).await
    }

    /// Stops and then starts the machine.
    ///
    /// # Errors
    ///
    /// Fails on the first operation that fails; a failed stop skips the
    /// start.
    pub async fn restart(&self, group: &str, name: &str) -> Result<()> {
        self.stop(group, name).await?;
        self.start(group, name).await
    }

    /// Suspends the machine to memory.
    ///
    /// # Errors
    ///
    /// Agent errors pass through unchanged.
    pub async fn pause(&self, group: &str, name: &str) -> Result<()> {
        with_deadline(self.agent.operate(group, name, PowerOperation::Pause)).await
    }

    /// Suspends the machine to disk.
    ///
    /// # Errors
    ///
    /// Agent errors pass through unchanged.
    pub async fn save(&self, group: &str, name: &str) -> Result<()> {
        with_deadline(self.agent.operate(group, name, PowerOperation::Save)).await
    }

    /// Applies a caller-supplied mutation to the machine's current state,
    /// retrying the read-modify-write cycle on version conflicts.
    ///
    /// # Errors
    ///
    /// [`Error::NotFound`] when the machine does not exist; the mutation's
    /// own error propagates without a retry.
    pub async fn update<F>(&self, group: &str, name: &str, mutate: F) -> Result<VirtualMachine>
    where
        F: FnMut(VirtualMachine) -> Result<VirtualMachine>,
    {
        apply_update(self, group, name, &self.policy, mutate).await
    }

    /// Changes the machine's size.
    ///
    /// # Errors
    ///
    /// [`Error::NotFound`] when the machine does not exist.
    pub async fn resize(
        &self,
        group: &str,
        name: &str,
        size: VirtualMachineSize,
        custom_size: Option<VirtualMachineCustomSize>,
    ) -> Result<VirtualMachine> {
        self.update(group, name, move |mut machine| {
            machine.vm_size = size;
            machine.custom_size = custom_size;
            Ok(machine)
        })
        .await
    }

    /// Attaches a data disk.
    ///
    /// # Errors
    ///
    /// [`Error::AlreadyExists`] when a disk with the same URI is already
    /// attached.
    pub async fn disk_attach(
        &self,
        group: &str,
        name: &str,
        disk: DataDisk,
    ) -> Result<VirtualMachine> {
        self.update(group, name, move |mut machine| {
            if machine.data_disks.iter().any(|d| d.vhd_uri == disk.vhd_uri) {
                return Err(Error::AlreadyExists(disk.vhd_uri.clone()));
            }
            machine.data_disks.push(disk.clone());
            Ok(machine)
        })
        .await
    }

    /// Detaches a data disk. Detaching a disk that is not attached leaves
    /// the machine unchanged.
    ///
    /// # Errors
    ///
    /// [`Error::NotFound`] when the machine does not exist.
    pub async fn disk_detach(
        &self,
        group: &str,
        name: &str,
        vhd_uri: &str,
    ) -> Result<VirtualMachine> {
        self.update(group, name, |mut machine| {
            machine.data_disks.retain(|d| d.vhd_uri != vhd_uri);
            Ok(machine)
        })
        .await
    }

    /// Adds a network interface.
    ///
    /// # Errors
    ///
    /// [`Error::AlreadyExists`] when the interface is already attached.
    pub async fn network_interface_add(
        &self,
        group: &str,
        name: &str,
        interface: NetworkInterfaceReference,
    ) -> Result<VirtualMachine> {
        self.update(group, name, move |mut machine| {
            if machine.network_interfaces.iter().any(|n| n.id == interface.id) {
                return Err(Error::AlreadyExists(interface.id.clone()));
            }
            machine.network_interfaces.push(interface.clone());
            Ok(machine)
        })
        .await
    }

    /// Removes a network interface. Removing an interface that is not
    /// attached leaves the machine unchanged.
    ///
    /// # Errors
    ///
    /// [`Error::NotFound`] when the machine does not exist.
    pub async fn network_interface_remove(
        &self,
        group: &str,
        name: &str,
        interface_id: &str,
    ) -> Result<VirtualMachine> {
        self.update(group, name, |mut machine| {
            machine.network_interfaces.retain(|n| n.id != interface_id);
            Ok(machine)
        })
        .await
    }
}

impl<A> VersionedStore for VirtualMachineClient<A>
where
    A: VirtualMachineAgent + Sync,
{
    type Item = VirtualMachine;

    async fn fetch(&self, group: &str, name: &str) -> Result<Option<VirtualMachine>> {
        let machines = with_deadline(self.agent.get(group, name)).await?;
        Ok(machines.into_iter().next())
    }

    async fn commit(
        &self,
        group: &str,
        name: &str,
        machine: VirtualMachine,
    ) -> Result<VirtualMachine> {
        with_deadline(self.agent.create_or_update(group, name, machine)).await
    }
}
