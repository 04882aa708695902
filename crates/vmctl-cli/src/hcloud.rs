//! Dispatcher for the `hcloud-ops` binary.

use crate::args::{optional, parse_u64, require};
use crate::Dispatch;
use std::time::Duration;
use tracing::{info, warn};
use vmctl_core::client::SNAPSHOT_DEFAULT_TIMEOUT_SECS;
use vmctl_core::{CommandResponse, Error, Result};
use vmctl_hcloud::{ops, HcloudClient, HcloudClientBuilder, SnapshotCoordinator, SnapshotFilter};

/// Environment variable overriding the API endpoint, mainly for tests
/// against a local stand-in.
pub const ENDPOINT_VAR: &str = "HCLOUD_ENDPOINT";

const USAGE: &str = "Usage: hcloud-ops <command> <args>";

/// A parsed `hcloud-ops` invocation.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Start a server
    Start {
        /// API token
        token: String,
        /// Server id
        server_id: u64,
    },
    /// Gracefully stop a server
    Stop {
        /// API token
        token: String,
        /// Server id
        server_id: u64,
    },
    /// Reboot a server
    Reboot {
        /// API token
        token: String,
        /// Server id
        server_id: u64,
    },
    /// Report server status
    Status {
        /// API token
        token: String,
        /// Server id
        server_id: u64,
    },
    /// Request a snapshot, de-duplicating an in-flight one
    CreateSnapshot {
        /// API token
        token: String,
        /// Server id
        server_id: u64,
        /// Snapshot description
        description: String,
    },
    /// Wait for a snapshot to become available
    WaitSnapshot {
        /// API token
        token: String,
        /// Snapshot id
        snapshot_id: u64,
        /// Wait budget in seconds
        timeout_secs: u64,
    },
    /// List snapshots, optionally narrowed to one server's
    ListSnapshots {
        /// API token
        token: String,
        /// Server name to narrow by
        server_name: Option<String>,
    },
    /// Delete a snapshot
    DeleteSnapshot {
        /// API token
        token: String,
        /// Snapshot id
        snapshot_id: u64,
    },
}

/// Parse positional arguments into a command.
pub fn parse(args: &[String]) -> Result<Command> {
    let name = require(args, 0, USAGE)?;

    match name {
        "start" | "stop" | "reboot" | "status" => {
            let usage = format!("Usage: hcloud-ops {name} <api_token> <server_id>");
            let token = require(args, 1, &usage)?.to_string();
            let server_id = parse_u64(require(args, 2, &usage)?, "server id")?;
            Ok(match name {
                "start" => Command::Start { token, server_id },
                "stop" => Command::Stop { token, server_id },
                "reboot" => Command::Reboot { token, server_id },
                _ => Command::Status { token, server_id },
            })
        }
        "create_snapshot" => {
            let usage = "Usage: hcloud-ops create_snapshot <api_token> <server_id> <description>";
            let token = require(args, 1, usage)?.to_string();
            let server_id = parse_u64(require(args, 2, usage)?, "server id")?;
            let description = require(args, 3, usage)?.to_string();
            Ok(Command::CreateSnapshot {
                token,
                server_id,
                description,
            })
        }
        "wait_snapshot" => {
            let usage = "Usage: hcloud-ops wait_snapshot <api_token> <snapshot_id> [timeout_seconds]";
            let token = require(args, 1, usage)?.to_string();
            let snapshot_id = parse_u64(require(args, 2, usage)?, "snapshot id")?;
            let timeout_secs = match optional(args, 3) {
                Some(raw) => parse_u64(raw, "timeout")?,
                None => SNAPSHOT_DEFAULT_TIMEOUT_SECS,
            };
            Ok(Command::WaitSnapshot {
                token,
                snapshot_id,
                timeout_secs,
            })
        }
        "list_snapshots" => {
            let usage = "Usage: hcloud-ops list_snapshots <api_token> [server_name]";
            let token = require(args, 1, usage)?.to_string();
            let server_name = optional(args, 2).map(str::to_string);
            Ok(Command::ListSnapshots { token, server_name })
        }
        "delete_snapshot" => {
            let usage = "Usage: hcloud-ops delete_snapshot <api_token> <snapshot_id>";
            let token = require(args, 1, usage)?.to_string();
            let snapshot_id = parse_u64(require(args, 2, usage)?, "snapshot id")?;
            Ok(Command::DeleteSnapshot { token, snapshot_id })
        }
        other => Err(Error::Usage(format!("Unknown command: {other}"))),
    }
}

/// Run a parsed command; logical success and failure both land in the
/// response document.
pub async fn execute(command: Command) -> CommandResponse {
    match run_command(command).await {
        Ok(response) => response,
        Err(err) => {
            warn!(code = err.error_code(), "command failed: {err}");
            CommandResponse::from(&err)
        }
    }
}

/// Parse and run an invocation, deciding the exit code.
pub async fn run(args: &[String]) -> Dispatch {
    match parse(args) {
        Ok(command) => Dispatch::completed(execute(command).await),
        Err(err) => {
            info!("invocation rejected: {err}");
            Dispatch::rejected(CommandResponse::from(&err))
        }
    }
}

fn build_client(token: String) -> Result<HcloudClient> {
    let mut builder = HcloudClientBuilder::new(token);
    if let Ok(endpoint) = std::env::var(ENDPOINT_VAR) {
        builder = builder.with_base_url(endpoint);
    }
    builder.build()
}

async fn run_command(command: Command) -> Result<CommandResponse> {
    match command {
        Command::Start { token, server_id } => {
            let client = build_client(token)?;
            let data = ops::start_server(&client, server_id).await?;
            Ok(CommandResponse::success(&data))
        }
        Command::Stop { token, server_id } => {
            let client = build_client(token)?;
            let data = ops::stop_server(&client, server_id).await?;
            Ok(CommandResponse::success(&data))
        }
        Command::Reboot { token, server_id } => {
            let client = build_client(token)?;
            let data = ops::reboot_server(&client, server_id).await?;
            Ok(CommandResponse::success(&data))
        }
        Command::Status { token, server_id } => {
            let client = build_client(token)?;
            let data = ops::server_status(&client, server_id).await?;
            Ok(CommandResponse::success(&data))
        }
        Command::CreateSnapshot {
            token,
            server_id,
            description,
        } => {
            let coordinator = SnapshotCoordinator::new(build_client(token)?);
            let data = coordinator.request_snapshot(server_id, &description).await?;
            Ok(CommandResponse::success(&data))
        }
        Command::WaitSnapshot {
            token,
            snapshot_id,
            timeout_secs,
        } => {
            let coordinator = SnapshotCoordinator::new(build_client(token)?);
            let data = coordinator
                .await_snapshot(snapshot_id, Duration::from_secs(timeout_secs))
                .await?;
            Ok(CommandResponse::success(&data))
        }
        Command::ListSnapshots { token, server_name } => {
            let coordinator = SnapshotCoordinator::new(build_client(token)?);
            let filter = server_name.map_or_else(SnapshotFilter::none, SnapshotFilter::by_name);
            let data = coordinator.list_snapshots(&filter).await?;
            Ok(CommandResponse::success(&data))
        }
        Command::DeleteSnapshot { token, snapshot_id } => {
            let coordinator = SnapshotCoordinator::new(build_client(token)?);
            let data = coordinator.delete_snapshot(snapshot_id).await?;
            Ok(CommandResponse::success(&data))
        }
    }
}
