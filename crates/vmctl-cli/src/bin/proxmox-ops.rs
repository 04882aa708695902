//! Hypervisor guest control binary.
//!
//! Prints one pretty JSON document on stdout; diagnostics go to stderr via
//! `RUST_LOG`.

use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let dispatch = vmctl_cli::proxmox::run(&args).await;
    println!("{}", dispatch.response.to_json_pretty());
    ExitCode::from(dispatch.exit_code)
}
