//! Hypervisor API models and typed response payloads.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use vmctl_core::Error;

/// The two guest flavors a node can run.
///
/// Both expose the same operation set under different path segments; this
/// is the single place the dispatch happens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GuestKind {
    /// Full virtual machine
    Qemu,
    /// Container
    Lxc,
}

impl GuestKind {
    /// API path segment for this guest flavor.
    #[must_use]
    pub const fn path_segment(self) -> &'static str {
        match self {
            Self::Qemu => "qemu",
            Self::Lxc => "lxc",
        }
    }

    /// Uppercase label used in human-readable messages.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Qemu => "QEMU",
            Self::Lxc => "LXC",
        }
    }
}

impl fmt::Display for GuestKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.path_segment())
    }
}

impl FromStr for GuestKind {
    type Err = Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "qemu" => Ok(Self::Qemu),
            "lxc" => Ok(Self::Lxc),
            other => Err(Error::InvalidArgument(format!("Invalid VM type: {other}"))),
        }
    }
}

/// The `{"data": ...}` envelope every API response is wrapped in.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiData<T> {
    /// The actual payload
    pub data: T,
}

/// Current status of a guest as reported by `status/current`.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct GuestStatus {
    /// Power state string, `running` or `stopped`
    pub status: String,
    /// Guest name, absent on some container configs
    #[serde(default)]
    pub name: Option<String>,
    /// Uptime in seconds, zero when stopped
    #[serde(default)]
    pub uptime: Option<u64>,
    /// Assigned CPU count
    #[serde(default)]
    pub cpus: Option<f64>,
    /// Current memory use in bytes
    #[serde(default)]
    pub mem: Option<u64>,
    /// Memory limit in bytes
    #[serde(default)]
    pub maxmem: Option<u64>,
}

impl GuestStatus {
    /// True when the guest is powered on.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.status == "running"
    }

    /// True when the guest is powered off.
    #[must_use]
    pub fn is_stopped(&self) -> bool {
        self.status == "stopped"
    }
}

/// One entry of a per-node guest listing.
///
/// `vmid` stays untyped because containers have been observed reporting it
/// as a string.
#[derive(Debug, Clone, Deserialize)]
pub struct GuestListEntry {
    /// Numeric guest id, as number or string
    pub vmid: serde_json::Value,
    /// Guest name
    #[serde(default)]
    pub name: Option<String>,
    /// Power state
    #[serde(default)]
    pub status: Option<String>,
    /// Assigned CPU count
    #[serde(default)]
    pub cpus: Option<f64>,
    /// Memory limit in bytes
    #[serde(default)]
    pub maxmem: Option<u64>,
}

impl GuestListEntry {
    /// The guest id as a number, whichever way it was encoded.
    #[must_use]
    pub fn vmid_u64(&self) -> Option<u64> {
        match &self.vmid {
            serde_json::Value::Number(num) => num.as_u64(),
            serde_json::Value::String(text) => text.parse().ok(),
            _ => None,
        }
    }
}

/// One entry of a guest's snapshot listing, raw from the API.
///
/// The listing always contains a synthetic `current` entry marking the
/// live state; it is filtered out before reporting.
#[derive(Debug, Clone, Deserialize)]
pub struct SnapshotEntry {
    /// Snapshot name, or `current`
    #[serde(default)]
    pub name: Option<String>,
    /// Free-form description
    #[serde(default)]
    pub description: Option<String>,
    /// Creation time as a unix timestamp
    #[serde(default)]
    pub snaptime: Option<i64>,
    /// Whether guest RAM was included
    #[serde(default)]
    pub vmstate: Option<i64>,
}

/// A real snapshot as reported to the caller.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SnapshotItem {
    /// Snapshot name
    pub name: String,
    /// Free-form description, empty when none was given
    pub description: String,
    /// Creation time as a unix timestamp, zero when unknown
    pub snaptime: i64,
    /// Whether guest RAM was included
    pub vmstate: i64,
}

impl SnapshotItem {
    /// Project a raw listing entry, dropping the synthetic `current` marker.
    #[must_use]
    pub fn from_entry(entry: &SnapshotEntry) -> Option<Self> {
        let name = entry.name.as_deref()?;
        if name == "current" {
            return None;
        }
        Some(Self {
            name: name.to_string(),
            description: entry.description.clone().unwrap_or_default(),
            snaptime: entry.snaptime.unwrap_or(0),
            vmstate: entry.vmstate.unwrap_or(0),
        })
    }
}

/// API version report.
#[derive(Debug, Clone, Deserialize)]
pub struct VersionInfo {
    /// Release version string
    #[serde(default)]
    pub version: Option<String>,
}

/// One entry of the cluster node listing.
#[derive(Debug, Clone, Deserialize)]
pub struct NodeEntry {
    /// Node name
    pub node: String,
}

// Typed payloads serialized into the response envelope's `data` field.

/// Full status report for one guest.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct GuestStatusData {
    /// Guest id
    pub vmid: u64,
    /// Hosting node
    pub node: String,
    /// Guest flavor
    #[serde(rename = "type")]
    pub kind: GuestKind,
    /// Power state
    pub status: String,
    /// Uptime in seconds
    pub uptime: u64,
    /// Assigned CPU count
    pub cpus: f64,
    /// Current memory use in bytes
    pub memory: u64,
    /// Memory limit in bytes
    pub maxmem: u64,
    /// Guest name, synthesized as `<kind>-<vmid>` when unset
    pub name: String,
}

/// Result of a power-state operation.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct PowerActionData {
    /// Guest id
    pub vmid: u64,
    /// Hosting node
    pub node: String,
    /// Guest flavor
    #[serde(rename = "type")]
    pub kind: GuestKind,
    /// Power state after the operation; absent for reboot, which reports
    /// no state of its own
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

/// Result of a snapshot create, rollback, or delete.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SnapshotActionData {
    /// Guest id
    pub vmid: u64,
    /// Hosting node
    pub node: String,
    /// Guest flavor
    #[serde(rename = "type")]
    pub kind: GuestKind,
    /// Snapshot the operation acted on
    pub snapshot_name: String,
}

/// Snapshot listing for one guest.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SnapshotListData {
    /// Guest id
    pub vmid: u64,
    /// Hosting node
    pub node: String,
    /// Guest flavor
    #[serde(rename = "type")]
    pub kind: GuestKind,
    /// Real snapshots, `current` marker removed
    pub snapshots: Vec<SnapshotItem>,
    /// Number of snapshots
    pub count: usize,
}

/// One guest in a node listing.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct GuestSummary {
    /// Guest id
    pub vmid: u64,
    /// Guest name, synthesized as `vm-<vmid>` / `ct-<vmid>` when unset
    pub name: String,
    /// Guest flavor
    #[serde(rename = "type")]
    pub kind: GuestKind,
    /// Power state, `unknown` when unreported
    pub status: String,
    /// Assigned CPU count
    pub cpus: f64,
    /// Memory limit in bytes
    pub maxmem: u64,
}

/// Merged guest listing for a node.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct GuestListData {
    /// Node name
    pub node: String,
    /// Guests of both flavors
    pub vms: Vec<GuestSummary>,
    /// Number of guests
    pub count: usize,
}

/// Result of a connectivity probe.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ConnectionData {
    /// API version, `unknown` when unreported
    pub version: String,
    /// Cluster node names
    pub nodes: Vec<String>,
    /// Number of nodes
    pub node_count: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn guest_kind_parsing() {
        assert_eq!("qemu".parse::<GuestKind>().unwrap(), GuestKind::Qemu);
        assert_eq!("lxc".parse::<GuestKind>().unwrap(), GuestKind::Lxc);

        let err = "kvm".parse::<GuestKind>().unwrap_err();
        assert_eq!(err, Error::InvalidArgument("Invalid VM type: kvm".to_string()));
    }

    #[test]
    fn guest_kind_labels() {
        assert_eq!(GuestKind::Qemu.label(), "QEMU");
        assert_eq!(GuestKind::Lxc.label(), "LXC");
        assert_eq!(GuestKind::Lxc.path_segment(), "lxc");
        assert_eq!(GuestKind::Qemu.to_string(), "qemu");
    }

    #[test]
    fn guest_status_defaults() {
        let status: GuestStatus = serde_json::from_value(json!({"status": "stopped"})).unwrap();
        assert!(status.is_stopped());
        assert_eq!(status.uptime, None);
        assert_eq!(status.name, None);
    }

    #[test]
    fn vmid_accepts_number_or_string() {
        let entry: GuestListEntry =
            serde_json::from_value(json!({"vmid": 101, "name": "web"})).unwrap();
        assert_eq!(entry.vmid_u64(), Some(101));

        let entry: GuestListEntry = serde_json::from_value(json!({"vmid": "203"})).unwrap();
        assert_eq!(entry.vmid_u64(), Some(203));

        let entry: GuestListEntry = serde_json::from_value(json!({"vmid": "abc"})).unwrap();
        assert_eq!(entry.vmid_u64(), None);
    }

    #[test]
    fn snapshot_projection_drops_current_marker() {
        let entries: Vec<SnapshotEntry> = serde_json::from_value(json!([
            {"name": "nightly", "description": "pre-upgrade", "snaptime": 1756500000, "vmstate": 0},
            {"name": "current", "description": "You are here!"},
            {"name": "bare"}
        ]))
        .unwrap();

        let items: Vec<SnapshotItem> = entries
            .iter()
            .filter_map(SnapshotItem::from_entry)
            .collect();

        assert_eq!(items.len(), 2);
        assert_eq!(items[0].name, "nightly");
        assert_eq!(items[0].description, "pre-upgrade");
        assert_eq!(items[1].description, "");
        assert_eq!(items[1].snaptime, 0);
    }

    #[test]
    fn payload_kind_serializes_as_type() {
        let data = SnapshotActionData {
            vmid: 101,
            node: "pve1".to_string(),
            kind: GuestKind::Lxc,
            snapshot_name: "nightly".to_string(),
        };
        let json = serde_json::to_value(&data).unwrap();
        assert_eq!(json["type"], "lxc");
        assert!(json.get("kind").is_none());
    }
}
