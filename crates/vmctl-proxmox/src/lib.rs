//! Hypervisor client for a Proxmox-VE-shaped API.
//!
//! Drives QEMU virtual machines and LXC containers on a single hypervisor
//! node over the `api2/json` REST surface: power control with idempotent
//! pre-checks, per-guest named snapshots, guest listing, and connectivity
//! probing.

#![deny(missing_docs)]

pub mod client;
pub mod models;
pub mod ops;

pub use client::{ProxmoxClient, ProxmoxClientBuilder};
pub use models::{GuestKind, GuestStatus, SnapshotItem};
pub use ops::Outcome;

/// Convenient result alias that reuses the shared vmctl error type.
pub type Result<T> = vmctl_core::Result<T>;
