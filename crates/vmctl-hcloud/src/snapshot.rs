//! Snapshot coordination on top of the raw image API.
//!
//! The provider has no compare-and-swap for "one snapshot per server", so
//! the coordinator enforces it best-effort by detecting an in-flight
//! snapshot before issuing a create. Completion waiting is a bounded poll;
//! an exhausted budget leaves the provider job running.

use crate::client::HcloudClient;
use crate::models::{
    CreateImageResponse, FilterStrategy, Image, Server, SnapshotCreateData, SnapshotDeleteData,
    SnapshotFilter, SnapshotInfo, SnapshotListData, SnapshotWaitData,
};
use crate::Result;
use async_trait::async_trait;
use std::time::{Duration, Instant};
use tokio::time::sleep;
use tracing::{debug, info, warn};
use vmctl_core::client::SNAPSHOT_POLL_INTERVAL_SECS;
use vmctl_core::Error;

/// Provider surface the coordinator needs.
///
/// Implemented by [`HcloudClient`]; mocked in coordinator tests.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SnapshotStore {
    /// Fetch a server by id.
    async fn get_server(&self, server_id: u64) -> Result<Server>;

    /// List every snapshot image in the project.
    async fn list_snapshot_images(&self) -> Result<Vec<Image>>;

    /// Fetch a snapshot image by id.
    async fn get_image(&self, image_id: u64) -> Result<Image>;

    /// Create a snapshot image of a server.
    async fn create_image(&self, server_id: u64, description: String)
        -> Result<CreateImageResponse>;

    /// Delete a snapshot image.
    async fn delete_image(&self, image_id: u64) -> Result<()>;
}

#[async_trait]
impl SnapshotStore for HcloudClient {
    async fn get_server(&self, server_id: u64) -> Result<Server> {
        Self::get_server(self, server_id).await
    }

    async fn list_snapshot_images(&self) -> Result<Vec<Image>> {
        Self::list_snapshot_images(self).await
    }

    async fn get_image(&self, image_id: u64) -> Result<Image> {
        Self::get_image(self, image_id).await
    }

    async fn create_image(
        &self,
        server_id: u64,
        description: String,
    ) -> Result<CreateImageResponse> {
        Self::create_image(self, server_id, &description).await
    }

    async fn delete_image(&self, image_id: u64) -> Result<()> {
        Self::delete_image(self, image_id).await
    }
}

/// Coordinates snapshot creation, waiting, listing, and deletion.
#[derive(Debug)]
pub struct SnapshotCoordinator<S> {
    store: S,
    poll_interval: Duration,
}

impl<S: SnapshotStore> SnapshotCoordinator<S> {
    /// Wrap a provider store with the default completion poll interval.
    pub fn new(store: S) -> Self {
        Self {
            store,
            poll_interval: Duration::from_secs(SNAPSHOT_POLL_INTERVAL_SECS),
        }
    }

    /// Override the completion poll interval.
    #[must_use]
    pub const fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Request a snapshot of a server, de-duplicating against one already
    /// being written.
    ///
    /// An in-flight snapshot for the same server is returned as-is with
    /// `already_in_progress` set; no second create is issued. A failing
    /// in-flight check is logged and treated as "none found".
    pub async fn request_snapshot(
        &self,
        server_id: u64,
        description: &str,
    ) -> Result<SnapshotCreateData> {
        let server = self.store.get_server(server_id).await?;
        debug!(server_id, name = %server.name, "requesting snapshot");

        if let Some(existing) = self.find_in_progress(server_id).await {
            info!(
                server_id,
                snapshot_id = existing.id,
                "snapshot already being written, attaching to it"
            );
            return Ok(SnapshotCreateData {
                snapshot_id: existing.id,
                description: existing.description.clone(),
                status: existing.status.clone(),
                created: existing.created,
                disk_size: existing.disk_size,
                image_size: existing.image_size,
                action_id: None,
                already_in_progress: true,
                message: format!(
                    "Snapshot already in progress: {}. Will wait for it to complete.",
                    existing.description
                ),
            });
        }

        let created = self
            .store
            .create_image(server_id, description.to_string())
            .await?;
        info!(
            server_id,
            snapshot_id = created.image.id,
            action_id = created.action.id,
            "snapshot creation started"
        );

        Ok(SnapshotCreateData {
            snapshot_id: created.image.id,
            description: created.image.description,
            status: created.image.status,
            created: created.image.created,
            disk_size: created.image.disk_size,
            image_size: created.image.image_size,
            action_id: Some(created.action.id),
            already_in_progress: false,
            message: "Snapshot creation initiated".to_string(),
        })
    }

    /// Wait for a snapshot to leave the `creating` state, bounded by
    /// `timeout`.
    ///
    /// Only `available` is a success; any other terminal status is an
    /// unexpected-state failure. On timeout the provider keeps writing the
    /// image, nothing is canceled.
    pub async fn await_snapshot(
        &self,
        snapshot_id: u64,
        timeout: Duration,
    ) -> Result<SnapshotWaitData> {
        let started = Instant::now();

        loop {
            let image = self.store.get_image(snapshot_id).await?;

            if image.is_available() {
                let elapsed = started.elapsed().as_secs();
                info!(snapshot_id, elapsed, "snapshot completed");
                return Ok(SnapshotWaitData {
                    snapshot_id: image.id,
                    description: image.description,
                    status: image.status,
                    disk_size: image.disk_size,
                    image_size: image.image_size,
                    duration_seconds: elapsed,
                    message: "Snapshot completed successfully".to_string(),
                });
            }

            if !image.is_creating() {
                return Err(Error::UnexpectedState(format!(
                    "Unexpected snapshot status: {}",
                    image.status
                )));
            }

            if started.elapsed() >= timeout {
                return Err(Error::Timeout(format!(
                    "Snapshot creation timed out after {} seconds",
                    timeout.as_secs()
                )));
            }

            sleep(self.poll_interval).await;
        }
    }

    /// List snapshots, narrowing by the most specific criterion that
    /// matches anything.
    ///
    /// Precedence: recorded source-server id, then `<name>-` description
    /// prefix, then the whole project. The fallback keeps legacy snapshots
    /// reachable; `filter_used` tells the caller which rule fired.
    pub async fn list_snapshots(&self, filter: &SnapshotFilter) -> Result<SnapshotListData> {
        let images = self.store.list_snapshot_images().await?;

        if let Some(server_id) = filter.server_id {
            let matched: Vec<&Image> = images
                .iter()
                .filter(|image| image.source_server_id() == Some(server_id))
                .collect();
            if !matched.is_empty() {
                return Ok(build_listing(&matched, FilterStrategy::ServerId));
            }
        }

        if let Some(name) = filter.server_name.as_deref() {
            let prefix = format!("{name}-");
            let matched: Vec<&Image> = images
                .iter()
                .filter(|image| image.description.starts_with(&prefix))
                .collect();
            if !matched.is_empty() {
                return Ok(build_listing(&matched, FilterStrategy::HostnamePrefix));
            }
        }

        let all: Vec<&Image> = images.iter().collect();
        let strategy = FilterStrategy::AllProject;
        if !filter.is_empty() {
            debug!("snapshot filter matched nothing, listing whole project");
        }
        Ok(build_listing(&all, strategy))
    }

    /// Delete a snapshot image. An unknown id is a not-found failure.
    pub async fn delete_snapshot(&self, snapshot_id: u64) -> Result<SnapshotDeleteData> {
        self.store.delete_image(snapshot_id).await?;
        info!(snapshot_id, "snapshot deleted");
        Ok(SnapshotDeleteData {
            snapshot_id,
            message: "Snapshot deleted successfully".to_string(),
        })
    }

    async fn find_in_progress(&self, server_id: u64) -> Option<Image> {
        match self.store.list_snapshot_images().await {
            Ok(images) => images
                .into_iter()
                .find(|image| image.is_creating() && image.source_server_id() == Some(server_id)),
            Err(err) => {
                // Best-effort check; a listing failure must not block the
                // snapshot itself.
                warn!("in-flight snapshot check failed: {err}");
                None
            }
        }
    }
}

fn build_listing(images: &[&Image], strategy: FilterStrategy) -> SnapshotListData {
    let snapshots: Vec<SnapshotInfo> = images.iter().map(|image| SnapshotInfo::from(*image)).collect();
    SnapshotListData {
        count: snapshots.len(),
        snapshots,
        filter_used: strategy,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Action, ActionStatus, ServerStatus};
    use mockall::predicate::eq;
    use mockall::Sequence;

    fn server(id: u64, name: &str) -> Server {
        Server {
            id,
            name: name.to_string(),
            status: ServerStatus::Running,
            public_net: None,
            server_type: None,
            datacenter: None,
            created: None,
            backup_window: None,
            locked: None,
        }
    }

    fn image(id: u64, description: &str, status: &str, from: Option<u64>) -> Image {
        Image {
            id,
            description: description.to_string(),
            status: status.to_string(),
            created: None,
            disk_size: Some(40.0),
            image_size: None,
            created_from: from.map(|source| crate::models::CreatedFrom {
                id: source,
                name: None,
            }),
        }
    }

    fn action(id: u64) -> Action {
        Action {
            id,
            command: Some("create_image".to_string()),
            status: ActionStatus::Running,
            progress: Some(0),
            error: None,
        }
    }

    #[tokio::test]
    async fn request_snapshot_creates_when_nothing_in_flight() {
        let mut store = MockSnapshotStore::new();
        store
            .expect_get_server()
            .with(eq(42))
            .times(1)
            .returning(|id| Ok(server(id, "web-01")));
        store
            .expect_list_snapshot_images()
            .times(1)
            .returning(|| Ok(vec![image(5, "web-01-old", "available", Some(42))]));
        store
            .expect_create_image()
            .with(eq(42), eq("web-01-nightly".to_string()))
            .times(1)
            .returning(|server_id, description| {
                Ok(CreateImageResponse {
                    image: image(900, &description, "creating", Some(server_id)),
                    action: action(555),
                })
            });

        let coordinator = SnapshotCoordinator::new(store);
        let result = coordinator
            .request_snapshot(42, "web-01-nightly")
            .await
            .unwrap();

        assert_eq!(result.snapshot_id, 900);
        assert!(!result.already_in_progress);
        assert_eq!(result.action_id, Some(555));
        assert_eq!(result.message, "Snapshot creation initiated");
    }

    #[tokio::test]
    async fn request_snapshot_attaches_to_in_flight_one() {
        let mut store = MockSnapshotStore::new();
        store
            .expect_get_server()
            .with(eq(42))
            .times(1)
            .returning(|id| Ok(server(id, "web-01")));
        store
            .expect_list_snapshot_images()
            .times(1)
            .returning(|| Ok(vec![image(777, "web-01-running", "creating", Some(42))]));
        store.expect_create_image().times(0);

        let coordinator = SnapshotCoordinator::new(store);
        let result = coordinator
            .request_snapshot(42, "web-01-nightly")
            .await
            .unwrap();

        assert_eq!(result.snapshot_id, 777);
        assert!(result.already_in_progress);
        assert_eq!(result.action_id, None);
        assert_eq!(
            result.message,
            "Snapshot already in progress: web-01-running. Will wait for it to complete."
        );
    }

    #[tokio::test]
    async fn repeated_requests_return_the_same_snapshot() {
        let mut store = MockSnapshotStore::new();
        store
            .expect_get_server()
            .times(2)
            .returning(|id| Ok(server(id, "web-01")));

        let mut seq = Sequence::new();
        store
            .expect_list_snapshot_images()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|| Ok(Vec::new()));
        store
            .expect_create_image()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|server_id, description| {
                Ok(CreateImageResponse {
                    image: image(900, &description, "creating", Some(server_id)),
                    action: action(555),
                })
            });
        store
            .expect_list_snapshot_images()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|| Ok(vec![image(900, "web-01-nightly", "creating", Some(42))]));

        let coordinator = SnapshotCoordinator::new(store);
        let first = coordinator.request_snapshot(42, "web-01-nightly").await.unwrap();
        let second = coordinator.request_snapshot(42, "web-01-nightly").await.unwrap();

        assert_eq!(first.snapshot_id, second.snapshot_id);
        assert!(!first.already_in_progress);
        assert!(second.already_in_progress);
    }

    #[tokio::test]
    async fn failing_in_flight_check_does_not_block_creation() {
        let mut store = MockSnapshotStore::new();
        store
            .expect_get_server()
            .times(1)
            .returning(|id| Ok(server(id, "web-01")));
        store
            .expect_list_snapshot_images()
            .times(1)
            .returning(|| Err(Error::Transport("connection reset".to_string())));
        store
            .expect_create_image()
            .times(1)
            .returning(|server_id, description| {
                Ok(CreateImageResponse {
                    image: image(901, &description, "creating", Some(server_id)),
                    action: action(556),
                })
            });

        let coordinator = SnapshotCoordinator::new(store);
        let result = coordinator
            .request_snapshot(42, "web-01-nightly")
            .await
            .unwrap();
        assert!(!result.already_in_progress);
    }

    #[tokio::test]
    async fn request_snapshot_unknown_server_fails() {
        let mut store = MockSnapshotStore::new();
        store
            .expect_get_server()
            .with(eq(9))
            .times(1)
            .returning(|_| Err(Error::NotFound("server with ID '9' not found".to_string())));
        store.expect_list_snapshot_images().times(0);
        store.expect_create_image().times(0);

        let coordinator = SnapshotCoordinator::new(store);
        let err = coordinator.request_snapshot(9, "x").await.unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[tokio::test]
    async fn await_snapshot_polls_until_available() {
        let mut store = MockSnapshotStore::new();
        let mut seq = Sequence::new();
        store
            .expect_get_image()
            .with(eq(900))
            .times(2)
            .in_sequence(&mut seq)
            .returning(|id| Ok(image(id, "web-01-nightly", "creating", Some(42))));
        store
            .expect_get_image()
            .with(eq(900))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|id| {
                let mut done = image(id, "web-01-nightly", "available", Some(42));
                done.image_size = Some(12.5);
                Ok(done)
            });

        let coordinator =
            SnapshotCoordinator::new(store).with_poll_interval(Duration::from_millis(2));
        let result = coordinator
            .await_snapshot(900, Duration::from_secs(5))
            .await
            .unwrap();

        assert_eq!(result.status, "available");
        assert_eq!(result.image_size, Some(12.5));
        assert_eq!(result.message, "Snapshot completed successfully");
    }

    #[tokio::test]
    async fn await_snapshot_times_out_while_still_creating() {
        let mut store = MockSnapshotStore::new();
        store
            .expect_get_image()
            .returning(|id| Ok(image(id, "web-01-nightly", "creating", Some(42))));

        let coordinator =
            SnapshotCoordinator::new(store).with_poll_interval(Duration::from_millis(2));
        let err = coordinator
            .await_snapshot(900, Duration::from_millis(10))
            .await
            .unwrap_err();

        assert_eq!(
            err,
            Error::Timeout("Snapshot creation timed out after 0 seconds".to_string())
        );
    }

    #[tokio::test]
    async fn await_snapshot_rejects_unexpected_terminal_state() {
        let mut store = MockSnapshotStore::new();
        store
            .expect_get_image()
            .times(1)
            .returning(|id| Ok(image(id, "web-01-nightly", "corrupted", Some(42))));

        let coordinator = SnapshotCoordinator::new(store);
        let err = coordinator
            .await_snapshot(900, Duration::from_secs(5))
            .await
            .unwrap_err();

        assert_eq!(
            err,
            Error::UnexpectedState("Unexpected snapshot status: corrupted".to_string())
        );
    }

    fn mixed_inventory() -> Vec<Image> {
        vec![
            image(1, "web-01-2026-08-01", "available", Some(42)),
            image(2, "web-01-2026-08-15", "available", None),
            image(3, "db-01-2026-08-15", "available", Some(7)),
        ]
    }

    #[tokio::test]
    async fn list_snapshots_prefers_server_id_match() {
        let mut store = MockSnapshotStore::new();
        store
            .expect_list_snapshot_images()
            .returning(|| Ok(mixed_inventory()));

        let coordinator = SnapshotCoordinator::new(store);
        let listing = coordinator
            .list_snapshots(&SnapshotFilter {
                server_id: Some(42),
                server_name: Some("web-01".to_string()),
            })
            .await
            .unwrap();

        assert_eq!(listing.filter_used, FilterStrategy::ServerId);
        assert_eq!(listing.count, 1);
        assert_eq!(listing.snapshots[0].snapshot_id, 1);
    }

    #[tokio::test]
    async fn list_snapshots_falls_back_to_name_prefix() {
        let mut store = MockSnapshotStore::new();
        store
            .expect_list_snapshot_images()
            .returning(|| Ok(mixed_inventory()));

        let coordinator = SnapshotCoordinator::new(store);
        let listing = coordinator
            .list_snapshots(&SnapshotFilter::by_name("web-01"))
            .await
            .unwrap();

        assert_eq!(listing.filter_used, FilterStrategy::HostnamePrefix);
        assert_eq!(listing.count, 2);
    }

    #[tokio::test]
    async fn list_snapshots_never_returns_nothing_for_a_filter() {
        let mut store = MockSnapshotStore::new();
        store
            .expect_list_snapshot_images()
            .returning(|| Ok(mixed_inventory()));

        let coordinator = SnapshotCoordinator::new(store);
        let listing = coordinator
            .list_snapshots(&SnapshotFilter::by_name("cache-01"))
            .await
            .unwrap();

        assert_eq!(listing.filter_used, FilterStrategy::AllProject);
        assert_eq!(listing.count, 3);
    }

    #[tokio::test]
    async fn delete_snapshot_reports_success() {
        let mut store = MockSnapshotStore::new();
        store
            .expect_delete_image()
            .with(eq(900))
            .times(1)
            .returning(|_| Ok(()));

        let coordinator = SnapshotCoordinator::new(store);
        let result = coordinator.delete_snapshot(900).await.unwrap();
        assert_eq!(result.snapshot_id, 900);
        assert_eq!(result.message, "Snapshot deleted successfully");
    }

    #[tokio::test]
    async fn delete_snapshot_propagates_not_found() {
        let mut store = MockSnapshotStore::new();
        store
            .expect_delete_image()
            .with(eq(1))
            .returning(|_| Err(Error::NotFound("image with ID '1' not found".to_string())));

        let coordinator = SnapshotCoordinator::new(store);
        let err = coordinator.delete_snapshot(1).await.unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }
}
