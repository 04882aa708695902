//! Command dispatchers for the vmctl binaries.
//!
//! Each binary parses positional arguments, runs one operation, and prints
//! exactly one pretty JSON document on stdout. Logical failures (a missing
//! server, a provider error) are reported in the document and exit zero;
//! only argument problems and unknown commands exit non-zero.

#![deny(missing_docs)]

pub mod args;
pub mod hcloud;
pub mod proxmox;

use vmctl_core::CommandResponse;

/// What a dispatcher run produced: the document to print and the process
/// exit code.
#[derive(Debug, Clone, PartialEq)]
pub struct Dispatch {
    /// The JSON document for stdout
    pub response: CommandResponse,
    /// Process exit code
    pub exit_code: u8,
}

impl Dispatch {
    /// A completed operation; logical success and failure both exit zero.
    #[must_use]
    pub const fn completed(response: CommandResponse) -> Self {
        Self {
            response,
            exit_code: 0,
        }
    }

    /// A rejected invocation: bad arguments or an unknown command.
    #[must_use]
    pub const fn rejected(response: CommandResponse) -> Self {
        Self {
            response,
            exit_code: 1,
        }
    }
}
