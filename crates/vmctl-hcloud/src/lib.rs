//! Cloud provider client and snapshot coordination.
//!
//! Provides typed models and an asynchronous client for a Hetzner-Cloud-shaped
//! VM API, high-level power operations with idempotent observable results, and
//! the snapshot coordinator that de-duplicates in-flight snapshot creation.

#![deny(missing_docs)]

pub mod client;
pub mod models;
pub mod ops;
pub mod snapshot;

pub use client::{HcloudClient, HcloudClientBuilder};
pub use models::{
    Action, ActionStatus, CreateImageResponse, FilterStrategy, Image, PowerActionData, Server,
    ServerStatus, ServerStatusData, SnapshotCreateData, SnapshotDeleteData, SnapshotFilter,
    SnapshotInfo, SnapshotListData, SnapshotWaitData,
};
pub use snapshot::{SnapshotCoordinator, SnapshotStore};

/// Convenient result alias that reuses the shared vmctl error type.
pub type Result<T> = vmctl_core::Result<T>;
