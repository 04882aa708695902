//! Cloud API models shared by the client, operations, and coordinator.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Server power states reported by the provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServerStatus {
    /// Server is powered on and booted
    Running,
    /// Server is being created
    Initializing,
    /// Server is powering on
    Starting,
    /// Server is shutting down
    Stopping,
    /// Server is powered off
    Off,
    /// Server is being deleted
    Deleting,
    /// Server is migrating between hosts
    Migrating,
    /// Server is being rebuilt
    Rebuilding,
    /// Any state this client does not know about
    #[serde(other)]
    Unknown,
}

impl ServerStatus {
    /// Canonical lowercase form, as printed in response payloads.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Initializing => "initializing",
            Self::Starting => "starting",
            Self::Stopping => "stopping",
            Self::Off => "off",
            Self::Deleting => "deleting",
            Self::Migrating => "migrating",
            Self::Rebuilding => "rebuilding",
            Self::Unknown => "unknown",
        }
    }

    /// True when the server is powered on and booted.
    #[must_use]
    pub const fn is_running(self) -> bool {
        matches!(self, Self::Running)
    }

    /// True when the server is powered off.
    #[must_use]
    pub const fn is_off(self) -> bool {
        matches!(self, Self::Off)
    }
}

/// Assigned public IPv4 address.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Ipv4 {
    /// Dotted-quad address
    pub ip: String,
}

/// Assigned public IPv6 network.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Ipv6 {
    /// Address or network prefix
    pub ip: String,
}

/// Public network attachment of a server.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct PublicNet {
    /// IPv4 assignment, absent for IPv6-only servers
    #[serde(default)]
    pub ipv4: Option<Ipv4>,
    /// IPv6 assignment
    #[serde(default)]
    pub ipv6: Option<Ipv6>,
}

/// Reference to the server's type (flavor).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServerTypeRef {
    /// Type name, e.g. `cx22`
    pub name: String,
}

/// Datacenter placement of a server.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Datacenter {
    /// Datacenter name, e.g. `fsn1-dc14`
    pub name: String,
    /// Owning location
    #[serde(default)]
    pub location: Option<Location>,
}

/// Geographic location of a datacenter.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Location {
    /// Location name, e.g. `fsn1`
    pub name: String,
}

/// Representation of a server as returned by the provider.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Server {
    /// Numeric server id
    pub id: u64,
    /// Server name (hostname-like identifier)
    pub name: String,
    /// Current power state
    pub status: ServerStatus,
    /// Public network attachment
    #[serde(default)]
    pub public_net: Option<PublicNet>,
    /// Server type reference
    #[serde(default)]
    pub server_type: Option<ServerTypeRef>,
    /// Datacenter placement
    #[serde(default)]
    pub datacenter: Option<Datacenter>,
    /// Creation timestamp
    #[serde(default)]
    pub created: Option<DateTime<Utc>>,
    /// Backup window, when backups are enabled
    #[serde(default)]
    pub backup_window: Option<String>,
    /// Whether the server is locked against changes
    #[serde(default)]
    pub locked: Option<bool>,
}

impl Server {
    /// Assigned public IPv4 address, if any.
    #[must_use]
    pub fn public_ipv4(&self) -> Option<&str> {
        self.public_net
            .as_ref()
            .and_then(|net| net.ipv4.as_ref())
            .map(|v4| v4.ip.as_str())
    }

    /// Assigned public IPv6 address, if any.
    #[must_use]
    pub fn public_ipv6(&self) -> Option<&str> {
        self.public_net
            .as_ref()
            .and_then(|net| net.ipv6.as_ref())
            .map(|v6| v6.ip.as_str())
    }
}

/// Execution states of a provider action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionStatus {
    /// Still executing
    Running,
    /// Finished successfully
    Success,
    /// Finished with an error
    Error,
    /// Any state this client does not know about
    #[serde(other)]
    Unknown,
}

/// Error details attached to a failed action.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ActionError {
    /// Machine-readable code
    #[serde(default)]
    pub code: Option<String>,
    /// Human-readable message
    pub message: String,
}

/// An asynchronous provider-side job (power on, create image, ...).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Action {
    /// Numeric action id
    pub id: u64,
    /// Command that created the action, e.g. `start_server`
    #[serde(default)]
    pub command: Option<String>,
    /// Execution state
    pub status: ActionStatus,
    /// Completion percentage
    #[serde(default)]
    pub progress: Option<u8>,
    /// Error details when `status` is `error`
    #[serde(default)]
    pub error: Option<ActionError>,
}

/// Back-reference from a snapshot image to its source server.
///
/// Legacy snapshots may lack this linkage entirely, which is why snapshot
/// listing falls back to description-prefix matching.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CreatedFrom {
    /// Source server id
    pub id: u64,
    /// Source server name at creation time
    #[serde(default)]
    pub name: Option<String>,
}

/// Snapshot image status strings with a known meaning.
pub mod image_status {
    /// Image is still being written
    pub const CREATING: &str = "creating";
    /// Image is complete and usable
    pub const AVAILABLE: &str = "available";
}

/// A disk image; this tooling only deals in images of type `snapshot`.
///
/// `status` stays a plain string because an unexpected terminal state must
/// be reported verbatim to the caller.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Image {
    /// Numeric image id
    pub id: u64,
    /// Free-form description; snapshot tooling writes `<server-name>-<stamp>`
    #[serde(default)]
    pub description: String,
    /// Lifecycle state: `creating`, `available`, or something newer
    pub status: String,
    /// Creation timestamp
    #[serde(default)]
    pub created: Option<DateTime<Utc>>,
    /// Source disk size in GB
    #[serde(default)]
    pub disk_size: Option<f64>,
    /// Actual image size in GB, set once available
    #[serde(default)]
    pub image_size: Option<f64>,
    /// Source server linkage, absent on legacy snapshots
    #[serde(default)]
    pub created_from: Option<CreatedFrom>,
}

impl Image {
    /// True while the provider is still writing the image.
    #[must_use]
    pub fn is_creating(&self) -> bool {
        self.status == image_status::CREATING
    }

    /// True once the image reached its good terminal state.
    #[must_use]
    pub fn is_available(&self) -> bool {
        self.status == image_status::AVAILABLE
    }

    /// Id of the server this image was taken from, if recorded.
    #[must_use]
    pub fn source_server_id(&self) -> Option<u64> {
        self.created_from.as_ref().map(|src| src.id)
    }
}

// Response envelopes: the provider wraps every payload in a named object.

/// Envelope for a single server.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerResponse {
    /// The server
    pub server: Server,
}

/// Envelope for a single action.
#[derive(Debug, Clone, Deserialize)]
pub struct ActionResponse {
    /// The action
    pub action: Action,
}

/// Envelope for a single image.
#[derive(Debug, Clone, Deserialize)]
pub struct ImageResponse {
    /// The image
    pub image: Image,
}

/// Pagination cursor attached to list responses.
#[derive(Debug, Clone, Deserialize)]
pub struct Pagination {
    /// Next page number, absent on the last page
    #[serde(default)]
    pub next_page: Option<u32>,
}

/// List metadata.
#[derive(Debug, Clone, Deserialize)]
pub struct Meta {
    /// Pagination cursor
    #[serde(default)]
    pub pagination: Option<Pagination>,
}

/// Envelope for an image list page.
#[derive(Debug, Clone, Deserialize)]
pub struct ImagesResponse {
    /// Images on this page
    pub images: Vec<Image>,
    /// List metadata
    #[serde(default)]
    pub meta: Option<Meta>,
}

/// Envelope for the image-plus-action pair returned by snapshot creation.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateImageResponse {
    /// The new image, in `creating` state
    pub image: Image,
    /// The provider-side job writing it
    pub action: Action,
}

/// Request payload for creating a snapshot image.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct CreateImageRequest {
    /// Image description
    pub description: String,
    /// Image type; always `snapshot` here
    #[serde(rename = "type")]
    pub image_type: &'static str,
}

impl CreateImageRequest {
    /// Build a snapshot-creation request.
    #[must_use]
    pub fn snapshot(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            image_type: "snapshot",
        }
    }
}

/// Error body shape used by the provider on non-2xx responses.
#[derive(Debug, Clone, Deserialize)]
pub struct ErrorEnvelope {
    /// Error details
    pub error: ApiErrorBody,
}

/// Provider error details.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiErrorBody {
    /// Machine-readable code
    #[serde(default)]
    pub code: Option<String>,
    /// Human-readable message, surfaced verbatim
    pub message: String,
}

// Typed payloads serialized into the response envelope's `data` field.

/// Result of a power-state operation.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct PowerActionData {
    /// Server id
    pub server_id: u64,
    /// Server name
    pub name: String,
    /// Status after the operation (or current status for a no-op)
    pub status: String,
    /// Public IPv4, reported after a successful start
    #[serde(skip_serializing_if = "Option::is_none")]
    pub public_ipv4: Option<String>,
    /// What happened, e.g. "Server is already running"
    pub message: String,
}

/// Full server status report.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ServerStatusData {
    /// Server id
    pub server_id: u64,
    /// Server name
    pub name: String,
    /// Current power state
    pub status: String,
    /// Server type name
    #[serde(skip_serializing_if = "Option::is_none")]
    pub server_type: Option<String>,
    /// Datacenter name
    #[serde(skip_serializing_if = "Option::is_none")]
    pub datacenter: Option<String>,
    /// Location name
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    /// Public IPv4 address
    #[serde(skip_serializing_if = "Option::is_none")]
    pub public_ipv4: Option<String>,
    /// Public IPv6 address
    #[serde(skip_serializing_if = "Option::is_none")]
    pub public_ipv6: Option<String>,
    /// Creation timestamp
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created: Option<DateTime<Utc>>,
    /// Backup window, when enabled
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backup_window: Option<String>,
    /// Lock flag
    #[serde(skip_serializing_if = "Option::is_none")]
    pub locked: Option<bool>,
}

/// Result of a snapshot-creation request.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SnapshotCreateData {
    /// Snapshot image id (new, or the one already in flight)
    pub snapshot_id: u64,
    /// Snapshot description
    pub description: String,
    /// Image status at response time
    pub status: String,
    /// Creation timestamp
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created: Option<DateTime<Utc>>,
    /// Source disk size in GB
    #[serde(skip_serializing_if = "Option::is_none")]
    pub disk_size: Option<f64>,
    /// Image size in GB
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_size: Option<f64>,
    /// Provider action id, absent when attaching to an existing job
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action_id: Option<u64>,
    /// True when an in-flight snapshot was returned instead of a new one
    pub already_in_progress: bool,
    /// What happened
    pub message: String,
}

/// Result of waiting for a snapshot to complete.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SnapshotWaitData {
    /// Snapshot image id
    pub snapshot_id: u64,
    /// Snapshot description
    pub description: String,
    /// Terminal status, always `available` on success
    pub status: String,
    /// Source disk size in GB
    #[serde(skip_serializing_if = "Option::is_none")]
    pub disk_size: Option<f64>,
    /// Image size in GB
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_size: Option<f64>,
    /// Seconds spent waiting
    pub duration_seconds: u64,
    /// What happened
    pub message: String,
}

/// One snapshot in a listing.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SnapshotInfo {
    /// Snapshot image id
    pub snapshot_id: u64,
    /// Snapshot description
    pub description: String,
    /// Lifecycle state
    pub status: String,
    /// Creation timestamp
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created: Option<DateTime<Utc>>,
    /// Source disk size in GB
    #[serde(skip_serializing_if = "Option::is_none")]
    pub disk_size: Option<f64>,
    /// Image size in GB
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_size: Option<f64>,
    /// Recorded source server id, absent on legacy snapshots
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_from_id: Option<u64>,
}

impl From<&Image> for SnapshotInfo {
    fn from(image: &Image) -> Self {
        Self {
            snapshot_id: image.id,
            description: image.description.clone(),
            status: image.status.clone(),
            created: image.created,
            disk_size: image.disk_size,
            image_size: image.image_size,
            created_from_id: image.source_server_id(),
        }
    }
}

/// Which matching strategy produced a snapshot listing.
///
/// `AllProject` is the deliberate "never return nothing when a filter was
/// requested but matched zero legacy items" fallback; automation callers
/// that need strict filtering should branch on this field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterStrategy {
    /// Authoritative match on recorded source-server id
    ServerId,
    /// Convention-based match on `<server-name>-` description prefix
    HostnamePrefix,
    /// Unfiltered fallback: every snapshot in the project
    AllProject,
}

/// Snapshot listing with the strategy that produced it.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SnapshotListData {
    /// Matched snapshots
    pub snapshots: Vec<SnapshotInfo>,
    /// Number of matched snapshots
    pub count: usize,
    /// Strategy that produced the result set
    pub filter_used: FilterStrategy,
}

/// Result of deleting a snapshot.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SnapshotDeleteData {
    /// Deleted snapshot id
    pub snapshot_id: u64,
    /// What happened
    pub message: String,
}

/// Filter for snapshot listings; empty means "everything".
#[derive(Debug, Default, Clone)]
pub struct SnapshotFilter {
    /// Match on recorded source-server id
    pub server_id: Option<u64>,
    /// Match on `<server_name>-` description prefix
    pub server_name: Option<String>,
}

impl SnapshotFilter {
    /// No filtering; list the whole project.
    #[must_use]
    pub fn none() -> Self {
        Self::default()
    }

    /// Filter by server name prefix.
    #[must_use]
    pub fn by_name(name: impl Into<String>) -> Self {
        Self {
            server_id: None,
            server_name: Some(name.into()),
        }
    }

    /// Filter by recorded source-server id.
    #[must_use]
    pub const fn by_id(id: u64) -> Self {
        Self {
            server_id: Some(id),
            server_name: None,
        }
    }

    /// True when no criteria were given.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.server_id.is_none() && self.server_name.is_none()
    }
}
