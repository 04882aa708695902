//! High-level guest operations with idempotent observable results.
//!
//! Power changes pre-check the current state and report a no-op instead of
//! failing; start and stop re-poll after a short settle delay so the
//! reported state reflects what the hypervisor actually did.

use crate::client::ProxmoxClient;
use crate::models::{
    ConnectionData, GuestKind, GuestListData, GuestStatusData, GuestSummary, PowerActionData,
    SnapshotActionData, SnapshotItem, SnapshotListData,
};
use crate::Result;
use tokio::time::sleep;
use tracing::info;

/// An operation result: a typed payload plus an optional top-level note.
#[derive(Debug, Clone, PartialEq)]
pub struct Outcome<T> {
    /// The payload
    pub data: T,
    /// Human-readable note, e.g. "QEMU is already running"
    pub message: Option<String>,
}

impl<T> Outcome<T> {
    /// An outcome with no note.
    pub fn new(data: T) -> Self {
        Self {
            data,
            message: None,
        }
    }

    /// Attach a note.
    #[must_use]
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

/// Probe connectivity: fetch the API version and the node list.
pub async fn test_connection(client: &ProxmoxClient) -> Result<Outcome<ConnectionData>> {
    let version = client.version().await?;
    let nodes = client.list_nodes().await?;

    let names: Vec<String> = nodes.into_iter().map(|entry| entry.node).collect();
    let data = ConnectionData {
        version: version.version.unwrap_or_else(|| "unknown".to_string()),
        node_count: names.len(),
        nodes: names,
    };
    Ok(Outcome::new(data).with_message("Connection successful"))
}

/// Report the full status of a guest, with zero defaults for counters the
/// hypervisor omits on stopped guests.
pub async fn guest_status(
    client: &ProxmoxClient,
    node: &str,
    kind: GuestKind,
    vmid: u64,
) -> Result<Outcome<GuestStatusData>> {
    let status = client.guest_status(node, kind, vmid).await?;

    Ok(Outcome::new(GuestStatusData {
        vmid,
        node: node.to_string(),
        kind,
        status: status.status.clone(),
        uptime: status.uptime.unwrap_or(0),
        cpus: status.cpus.unwrap_or(0.0),
        memory: status.mem.unwrap_or(0),
        maxmem: status.maxmem.unwrap_or(0),
        name: status
            .name
            .clone()
            .unwrap_or_else(|| format!("{kind}-{vmid}")),
    }))
}

/// Start a guest. Already running is a no-op success; otherwise the status
/// is re-polled after the settle delay.
pub async fn start_guest(
    client: &ProxmoxClient,
    node: &str,
    kind: GuestKind,
    vmid: u64,
) -> Result<Outcome<PowerActionData>> {
    let current = client.guest_status(node, kind, vmid).await?;
    if current.is_running() {
        info!(vmid, "guest already running");
        return Ok(power_outcome(node, kind, vmid, current.status)
            .with_message(format!("{} is already running", kind.label())));
    }

    client.start(node, kind, vmid).await?;
    sleep(client.settle_delay()).await;

    let settled = client.guest_status(node, kind, vmid).await?;
    Ok(power_outcome(node, kind, vmid, settled.status)
        .with_message(format!("{} start initiated", kind.label())))
}

/// Force-stop a guest. Already stopped is a no-op success; otherwise the
/// status is re-polled after the settle delay.
pub async fn stop_guest(
    client: &ProxmoxClient,
    node: &str,
    kind: GuestKind,
    vmid: u64,
) -> Result<Outcome<PowerActionData>> {
    let current = client.guest_status(node, kind, vmid).await?;
    if current.is_stopped() {
        info!(vmid, "guest already stopped");
        return Ok(power_outcome(node, kind, vmid, current.status)
            .with_message(format!("{} is already stopped", kind.label())));
    }

    client.stop(node, kind, vmid).await?;
    sleep(client.settle_delay()).await;

    let settled = client.guest_status(node, kind, vmid).await?;
    Ok(power_outcome(node, kind, vmid, settled.status)
        .with_message(format!("{} stop initiated", kind.label())))
}

/// Ask a guest to shut down gracefully. Already stopped is a no-op
/// success. Shutdown is asynchronous on the hypervisor side, so the
/// reported state is `shutting_down` with no re-poll.
pub async fn shutdown_guest(
    client: &ProxmoxClient,
    node: &str,
    kind: GuestKind,
    vmid: u64,
) -> Result<Outcome<PowerActionData>> {
    let current = client.guest_status(node, kind, vmid).await?;
    if current.is_stopped() {
        info!(vmid, "guest already stopped");
        return Ok(power_outcome(node, kind, vmid, current.status)
            .with_message(format!("{} is already stopped", kind.label())));
    }

    client.shutdown(node, kind, vmid).await?;
    Ok(
        power_outcome(node, kind, vmid, "shutting_down".to_string()).with_message(format!(
            "{} graceful shutdown initiated",
            kind.label()
        )),
    )
}

/// Reboot a guest. No pre-check: rebooting a stopped guest is the
/// hypervisor's error to report.
pub async fn reboot_guest(
    client: &ProxmoxClient,
    node: &str,
    kind: GuestKind,
    vmid: u64,
) -> Result<Outcome<PowerActionData>> {
    client.reboot(node, kind, vmid).await?;

    Ok(Outcome::new(PowerActionData {
        vmid,
        node: node.to_string(),
        kind,
        status: None,
    })
    .with_message(format!("{} reboot initiated", kind.label())))
}

/// List a guest's real snapshots, dropping the synthetic `current` marker.
pub async fn list_guest_snapshots(
    client: &ProxmoxClient,
    node: &str,
    kind: GuestKind,
    vmid: u64,
) -> Result<Outcome<SnapshotListData>> {
    let entries = client.list_snapshots(node, kind, vmid).await?;
    let snapshots: Vec<SnapshotItem> = entries
        .iter()
        .filter_map(SnapshotItem::from_entry)
        .collect();

    Ok(Outcome::new(SnapshotListData {
        vmid,
        node: node.to_string(),
        kind,
        count: snapshots.len(),
        snapshots,
    }))
}

/// Create a named snapshot of a guest.
pub async fn create_guest_snapshot(
    client: &ProxmoxClient,
    node: &str,
    kind: GuestKind,
    vmid: u64,
    name: &str,
    description: &str,
) -> Result<Outcome<SnapshotActionData>> {
    client
        .create_snapshot(node, kind, vmid, name, description)
        .await?;
    Ok(snapshot_outcome(node, kind, vmid, name).with_message(format!("Snapshot {name} created")))
}

/// Roll a guest back to a named snapshot.
pub async fn rollback_guest_snapshot(
    client: &ProxmoxClient,
    node: &str,
    kind: GuestKind,
    vmid: u64,
    name: &str,
) -> Result<Outcome<SnapshotActionData>> {
    client.rollback_snapshot(node, kind, vmid, name).await?;
    Ok(snapshot_outcome(node, kind, vmid, name)
        .with_message(format!("Rolled back to snapshot {name}")))
}

/// Delete a named snapshot of a guest.
pub async fn delete_guest_snapshot(
    client: &ProxmoxClient,
    node: &str,
    kind: GuestKind,
    vmid: u64,
    name: &str,
) -> Result<Outcome<SnapshotActionData>> {
    client.delete_snapshot(node, kind, vmid, name).await?;
    Ok(snapshot_outcome(node, kind, vmid, name).with_message(format!("Snapshot {name} deleted")))
}

/// List every guest on a node, virtual machines and containers merged.
pub async fn list_guests(client: &ProxmoxClient, node: &str) -> Result<Outcome<GuestListData>> {
    let mut vms = Vec::new();

    for kind in [GuestKind::Qemu, GuestKind::Lxc] {
        let entries = client.list_guests(node, kind).await?;
        for entry in entries {
            let Some(vmid) = entry.vmid_u64() else {
                continue;
            };
            let fallback = match kind {
                GuestKind::Qemu => format!("vm-{vmid}"),
                GuestKind::Lxc => format!("ct-{vmid}"),
            };
            vms.push(GuestSummary {
                vmid,
                name: entry.name.unwrap_or(fallback),
                kind,
                status: entry.status.unwrap_or_else(|| "unknown".to_string()),
                cpus: entry.cpus.unwrap_or(0.0),
                maxmem: entry.maxmem.unwrap_or(0),
            });
        }
    }

    Ok(Outcome::new(GuestListData {
        node: node.to_string(),
        count: vms.len(),
        vms,
    }))
}

fn power_outcome(node: &str, kind: GuestKind, vmid: u64, status: String) -> Outcome<PowerActionData> {
    Outcome::new(PowerActionData {
        vmid,
        node: node.to_string(),
        kind,
        status: Some(status),
    })
}

fn snapshot_outcome(node: &str, kind: GuestKind, vmid: u64, name: &str) -> Outcome<SnapshotActionData> {
    Outcome::new(SnapshotActionData {
        vmid,
        node: node.to_string(),
        kind,
        snapshot_name: name.to_string(),
    })
}
