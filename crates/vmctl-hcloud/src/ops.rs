//! High-level server power operations.
//!
//! Each operation reports what actually happened: a start on a running
//! server is a successful no-op, not an error, and the payload says so.

use crate::client::HcloudClient;
use crate::models::{PowerActionData, ServerStatusData};
use crate::Result;
use tracing::info;

/// Start a server, waiting for the power-on action to finish.
///
/// A server that is already running is reported as a no-op success and no
/// power-on is issued.
pub async fn start_server(client: &HcloudClient, server_id: u64) -> Result<PowerActionData> {
    let server = client.get_server(server_id).await?;

    if server.status.is_running() {
        info!(server_id, "server already running");
        return Ok(PowerActionData {
            server_id: server.id,
            name: server.name.clone(),
            status: server.status.as_str().to_string(),
            public_ipv4: server.public_ipv4().map(str::to_string),
            message: "Server is already running".to_string(),
        });
    }

    let action = client.power_on(server_id).await?;
    client.wait_action(action.id).await?;

    let server = client.get_server(server_id).await?;
    Ok(PowerActionData {
        server_id: server.id,
        name: server.name.clone(),
        status: server.status.as_str().to_string(),
        public_ipv4: server.public_ipv4().map(str::to_string),
        message: "Server started successfully".to_string(),
    })
}

/// Gracefully stop a server, waiting for the shutdown action to finish.
///
/// A server that is already off is reported as a no-op success.
pub async fn stop_server(client: &HcloudClient, server_id: u64) -> Result<PowerActionData> {
    let server = client.get_server(server_id).await?;

    if server.status.is_off() {
        info!(server_id, "server already stopped");
        return Ok(PowerActionData {
            server_id: server.id,
            name: server.name,
            status: server.status.as_str().to_string(),
            public_ipv4: None,
            message: "Server is already stopped".to_string(),
        });
    }

    let action = client.shutdown(server_id).await?;
    client.wait_action(action.id).await?;

    let server = client.get_server(server_id).await?;
    Ok(PowerActionData {
        server_id: server.id,
        name: server.name.clone(),
        status: server.status.as_str().to_string(),
        public_ipv4: None,
        message: "Server stopped successfully".to_string(),
    })
}

/// Reboot a server, waiting for the reboot action to finish.
pub async fn reboot_server(client: &HcloudClient, server_id: u64) -> Result<PowerActionData> {
    let server = client.get_server(server_id).await?;

    let action = client.reboot(server_id).await?;
    client.wait_action(action.id).await?;

    Ok(PowerActionData {
        server_id: server.id,
        name: server.name,
        status: "rebooting".to_string(),
        public_ipv4: None,
        message: "Server rebooted successfully".to_string(),
    })
}

/// Report the full status of a server.
pub async fn server_status(client: &HcloudClient, server_id: u64) -> Result<ServerStatusData> {
    let server = client.get_server(server_id).await?;

    Ok(ServerStatusData {
        server_id: server.id,
        name: server.name.clone(),
        status: server.status.as_str().to_string(),
        server_type: server.server_type.as_ref().map(|st| st.name.clone()),
        datacenter: server.datacenter.as_ref().map(|dc| dc.name.clone()),
        location: server
            .datacenter
            .as_ref()
            .and_then(|dc| dc.location.as_ref())
            .map(|loc| loc.name.clone()),
        public_ipv4: server.public_ipv4().map(str::to_string),
        public_ipv6: server.public_ipv6().map(str::to_string),
        created: server.created,
        backup_window: server.backup_window.clone(),
        locked: server.locked,
    })
}
