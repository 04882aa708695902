//! Dispatcher for the `proxmox-ops` binary.

use crate::args::{optional, parse_bool, parse_u64, require};
use crate::Dispatch;
use tracing::{info, warn};
use vmctl_core::{CommandResponse, Error, Result};
use vmctl_proxmox::ops::{self, Outcome};
use vmctl_proxmox::{GuestKind, ProxmoxClient, ProxmoxClientBuilder};

const USAGE: &str = "Usage: proxmox-ops <command> <api_url> <username> <token> <args>";

/// Connection arguments common to every command.
#[derive(Debug, Clone, PartialEq)]
pub struct ConnArgs {
    /// API endpoint, e.g. `https://pve1:8006`
    pub api_url: String,
    /// Token owner, e.g. `automation@pve`
    pub username: String,
    /// API token credential, `id=secret` or a bare secret
    pub token: String,
    /// Whether to verify the TLS certificate
    pub verify_ssl: bool,
}

/// Guest addressing common to per-guest commands.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GuestArgs {
    /// Guest id
    pub vmid: u64,
    /// Guest flavor
    pub kind: GuestKind,
}

/// Which per-guest operation to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuestOp {
    /// Report status
    Status,
    /// Start the guest
    Start,
    /// Force-stop the guest
    Stop,
    /// Graceful shutdown
    Shutdown,
    /// Reboot the guest
    Reboot,
    /// List snapshots
    ListSnapshots,
}

/// A parsed `proxmox-ops` invocation.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Probe connectivity
    TestConnection {
        /// Connection arguments
        conn: ConnArgs,
    },
    /// List every guest on a node
    ListVms {
        /// Connection arguments
        conn: ConnArgs,
        /// Node name
        node: String,
    },
    /// A per-guest operation without extra arguments
    Guest {
        /// Connection arguments
        conn: ConnArgs,
        /// Node name
        node: String,
        /// Guest addressing
        guest: GuestArgs,
        /// The operation
        op: GuestOp,
    },
    /// Create a named snapshot
    CreateSnapshot {
        /// Connection arguments
        conn: ConnArgs,
        /// Node name
        node: String,
        /// Guest addressing
        guest: GuestArgs,
        /// Snapshot name
        name: String,
        /// Snapshot description
        description: String,
    },
    /// Roll back to a named snapshot
    RollbackSnapshot {
        /// Connection arguments
        conn: ConnArgs,
        /// Node name
        node: String,
        /// Guest addressing
        guest: GuestArgs,
        /// Snapshot name
        name: String,
    },
    /// Delete a named snapshot
    DeleteSnapshot {
        /// Connection arguments
        conn: ConnArgs,
        /// Node name
        node: String,
        /// Guest addressing
        guest: GuestArgs,
        /// Snapshot name
        name: String,
    },
}

fn conn_args(args: &[String], usage: &str, verify_index: usize) -> Result<ConnArgs> {
    Ok(ConnArgs {
        api_url: require(args, 1, usage)?.to_string(),
        username: require(args, 2, usage)?.to_string(),
        token: require(args, 3, usage)?.to_string(),
        verify_ssl: optional(args, verify_index).map_or(true, parse_bool),
    })
}

fn guest_args(args: &[String], usage: &str) -> Result<(String, GuestArgs)> {
    let node = require(args, 4, usage)?.to_string();
    let vmid = parse_u64(require(args, 5, usage)?, "vmid")?;
    let kind: GuestKind = require(args, 6, usage)?.parse()?;
    Ok((node, GuestArgs { vmid, kind }))
}

/// Parse positional arguments into a command.
pub fn parse(args: &[String]) -> Result<Command> {
    let name = require(args, 0, USAGE)?;

    match name {
        "test_connection" => {
            let usage = "Usage: proxmox-ops test_connection <api_url> <username> <token> [verify_ssl]";
            Ok(Command::TestConnection {
                conn: conn_args(args, usage, 4)?,
            })
        }
        "list_vms" => {
            let usage = "Usage: proxmox-ops list_vms <api_url> <username> <token> <node> [verify_ssl]";
            let conn = conn_args(args, usage, 5)?;
            let node = require(args, 4, usage)?.to_string();
            Ok(Command::ListVms { conn, node })
        }
        "get_vm_status" | "start_vm" | "stop_vm" | "shutdown_vm" | "reboot_vm"
        | "list_snapshots" => {
            let usage = format!(
                "Usage: proxmox-ops {name} <api_url> <username> <token> <node> <vmid> <qemu|lxc> [verify_ssl]"
            );
            let conn = conn_args(args, &usage, 7)?;
            let (node, guest) = guest_args(args, &usage)?;
            let op = match name {
                "get_vm_status" => GuestOp::Status,
                "start_vm" => GuestOp::Start,
                "stop_vm" => GuestOp::Stop,
                "shutdown_vm" => GuestOp::Shutdown,
                "reboot_vm" => GuestOp::Reboot,
                _ => GuestOp::ListSnapshots,
            };
            Ok(Command::Guest {
                conn,
                node,
                guest,
                op,
            })
        }
        "create_snapshot" => {
            let usage = "Usage: proxmox-ops create_snapshot <api_url> <username> <token> <node> <vmid> <qemu|lxc> <name> [description] [verify_ssl]";
            let conn = conn_args(args, usage, 9)?;
            let (node, guest) = guest_args(args, usage)?;
            let name = require(args, 7, usage)?.to_string();
            let description = optional(args, 8).unwrap_or_default().to_string();
            Ok(Command::CreateSnapshot {
                conn,
                node,
                guest,
                name,
                description,
            })
        }
        "rollback_snapshot" | "delete_snapshot" => {
            let usage = format!(
                "Usage: proxmox-ops {name} <api_url> <username> <token> <node> <vmid> <qemu|lxc> <name> [verify_ssl]"
            );
            let conn = conn_args(args, &usage, 8)?;
            let (node, guest) = guest_args(args, &usage)?;
            let snap = require(args, 7, &usage)?.to_string();
            Ok(if name == "rollback_snapshot" {
                Command::RollbackSnapshot {
                    conn,
                    node,
                    guest,
                    name: snap,
                }
            } else {
                Command::DeleteSnapshot {
                    conn,
                    node,
                    guest,
                    name: snap,
                }
            })
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

fn build_client(conn: &ConnArgs) -> Result<ProxmoxClient> {
    ProxmoxClientBuilder::new(&conn.api_url, &conn.username, &conn.token)
        .verify_ssl(conn.verify_ssl)
        .build()
}

fn respond<T: serde::Serialize>(outcome: Outcome<T>) -> CommandResponse {
    let response = CommandResponse::success(&outcome.data);
    match outcome.message {
        Some(message) => response.with_message(message),
        None => response,
    }
}

async fn run_command(command: Command) -> Result<CommandResponse> {
    match command {
        Command::TestConnection { conn } => {
            let client = build_client(&conn)?;
            Ok(respond(ops::test_connection(&client).await?))
        }
        Command::ListVms { conn, node } => {
            let client = build_client(&conn)?;
            Ok(respond(ops::list_guests(&client, &node).await?))
        }
        Command::Guest {
            conn,
            node,
            guest,
            op,
        } => {
            let client = build_client(&conn)?;
            let GuestArgs { vmid, kind } = guest;
            Ok(match op {
                GuestOp::Status => respond(ops::guest_status(&client, &node, kind, vmid).await?),
                GuestOp::Start => respond(ops::start_guest(&client, &node, kind, vmid).await?),
                GuestOp::Stop => respond(ops::stop_guest(&client, &node, kind, vmid).await?),
                GuestOp::Shutdown => {
                    respond(ops::shutdown_guest(&client, &node, kind, vmid).await?)
                }
                GuestOp::Reboot => respond(ops::reboot_guest(&client, &node, kind, vmid).await?),
                GuestOp::ListSnapshots => {
                    respond(ops::list_guest_snapshots(&client, &node, kind, vmid).await?)
                }
            })
        }
        Command::CreateSnapshot {
            conn,
            node,
            guest,
            name,
            description,
        } => {
            let client = build_client(&conn)?;
            Ok(respond(
                ops::create_guest_snapshot(
                    &client,
                    &node,
                    guest.kind,
                    guest.vmid,
                    &name,
                    &description,
                )
                .await?,
            ))
        }
        Command::RollbackSnapshot {
            conn,
            node,
            guest,
            name,
        } => {
            let client = build_client(&conn)?;
            Ok(respond(
                ops::rollback_guest_snapshot(&client, &node, guest.kind, guest.vmid, &name).await?,
            ))
        }
        Command::DeleteSnapshot {
            conn,
            node,
            guest,
            name,
        } => {
            let client = build_client(&conn)?;
            Ok(respond(
                ops::delete_guest_snapshot(&client, &node, guest.kind, guest.vmid, &name).await?,
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn argv(parts: &[&str]) -> Vec<String> {
        parts.iter().map(|part| (*part).to_string()).collect()
    }

    const URL: &str = "https://pve1:8006";

    #[test]
    fn parses_test_connection_with_default_verify() {
        let command = parse(&argv(&["test_connection", URL, "root@pam", "tok"])).unwrap();
        let Command::TestConnection { conn } = command else {
            panic!("wrong command");
        };
        assert_eq!(conn.api_url, URL);
        assert!(conn.verify_ssl);
    }

    #[test]
    fn trailing_verify_ssl_flag_is_honored() {
        let command =
            parse(&argv(&["test_connection", URL, "root@pam", "tok", "false"])).unwrap();
        let Command::TestConnection { conn } = command else {
            panic!("wrong command");
        };
        assert!(!conn.verify_ssl);

        let command = parse(&argv(&[
            "get_vm_status",
            URL,
            "root@pam",
            "tok",
            "pve1",
            "101",
            "qemu",
            "false",
        ]))
        .unwrap();
        let Command::Guest { conn, .. } = command else {
            panic!("wrong command");
        };
        assert!(!conn.verify_ssl);
    }

    #[test]
    fn parses_guest_commands() {
        let command = parse(&argv(&[
            "start_vm", URL, "root@pam", "tok", "pve1", "101", "qemu",
        ]))
        .unwrap();
        let Command::Guest {
            node, guest, op, ..
        } = command
        else {
            panic!("wrong command");
        };
        assert_eq!(node, "pve1");
        assert_eq!(guest.vmid, 101);
        assert_eq!(guest.kind, GuestKind::Qemu);
        assert_eq!(op, GuestOp::Start);
    }

    #[test]
    fn invalid_guest_kind_is_rejected() {
        let err = parse(&argv(&[
            "start_vm", URL, "root@pam", "tok", "pve1", "101", "kvm",
        ]))
        .unwrap_err();
        assert_eq!(err, Error::InvalidArgument("Invalid VM type: kvm".to_string()));
    }

    #[test]
    fn invalid_vmid_is_rejected() {
        let err = parse(&argv(&[
            "stop_vm", URL, "root@pam", "tok", "pve1", "web", "qemu",
        ]))
        .unwrap_err();
        assert_eq!(err, Error::InvalidArgument("Invalid vmid: web".to_string()));
    }

    #[test]
    fn create_snapshot_description_is_optional() {
        let command = parse(&argv(&[
            "create_snapshot",
            URL,
            "root@pam",
            "tok",
            "pve1",
            "101",
            "qemu",
            "nightly",
        ]))
        .unwrap();
        let Command::CreateSnapshot {
            name, description, ..
        } = command
        else {
            panic!("wrong command");
        };
        assert_eq!(name, "nightly");
        assert_eq!(description, "");
    }

    #[test]
    fn missing_snapshot_name_is_a_usage_error() {
        let err = parse(&argv(&[
            "rollback_snapshot",
            URL,
            "root@pam",
            "tok",
            "pve1",
            "101",
            "qemu",
        ]))
        .unwrap_err();
        assert!(matches!(err, Error::Usage(_)));
    }

    #[test]
    fn unknown_command_is_named() {
        let err = parse(&argv(&["clone_vm", URL, "root@pam", "tok"])).unwrap_err();
        assert_eq!(err, Error::Usage("Unknown command: clone_vm".to_string()));
    }

    #[tokio::test]
    async fn rejected_invocations_exit_nonzero() {
        let dispatch = run(&argv(&["clone_vm"])).await;
        assert_eq!(dispatch.exit_code, 1);
        assert!(!dispatch.response.success);
        assert_eq!(
            dispatch.response.error.as_deref(),
            Some("Unknown command: clone_vm")
        );
    }
}
