//! # mcp-adb
//!
//! MCP (Model Context Protocol) server that exposes Android devices to AI
//! agents through adb. Runs as a stdio JSON-RPC server — designed to be
//! launched by an AI agent host (e.g. Claude Code).
//!
//! ## Architecture
//!
//! ```text
//! main.rs     — entry point, config loading, MCP server launch
//! config.rs   — CLI / env-var configuration loading
//! adb.rs      — adb subprocess runner with timeouts
//! devices.rs  — device pool with serial resolution and a default device
//! security.rs — command and path risk classification
//! dispatch.rs — shared resolve / assess / run / truncate pipeline
//! mcp.rs      — MCP JSON-RPC protocol handler (stdio)
//! tools.rs    — tool definitions and handlers
//! ```
//!
//! ## Tools
//!
//! - **Device**: `device_list`, `device_connect`, `device_disconnect`,
//!   `device_set_default`, `device_reboot`, `device_properties`
//! - **Apps**: `app_list`, `app_install`, `app_uninstall`, `app_start`,
//!   `app_stop`, `app_clear_data`, `app_info`, `app_manifest`,
//!   `app_permissions`, `app_activities`
//! - **Files**: `file_list`, `file_read`, `file_write`, `file_push`,
//!   `file_pull`, `file_mkdir`, `file_delete`, `file_exists`, `file_stat`
//! - **Shell**: `shell_exec`
//! - **UI**: `ui_screenshot`, `ui_tap`, `ui_swipe`, `ui_input_text`,
//!   `ui_press_key`, `ui_start_intent`
//! - **Diagnostics**: `log_device`, `log_app`, `log_anr`, `log_crash`,
//!   `battery_stats`, `bugreport`, `heap_dump`

mod adb;
mod config;
mod devices;
mod dispatch;
mod mcp;
mod security;
mod tools;

use clap::Parser;
use tracing::info;

use config::Cli;
use devices::DevicePool;

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let cli = Cli::parse();

    let resolved = match config::load_config(&cli) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("mcp-adb: configuration error: {}", e);
            std::process::exit(1);
        }
    };

    // stdout carries the JSON-RPC stream; logs must go to stderr.
    let log_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());
    tracing_subscriber::fmt()
        .with_env_filter(log_filter)
        .with_writer(std::io::stderr)
        .init();

    info!(
        "mcp-adb v{} starting, adb={}, timeout={}s",
        env!("CARGO_PKG_VERSION"),
        resolved.adb_path,
        resolved.default_timeout_secs
    );

    let pool = DevicePool::new(&resolved.adb_path, resolved.default_timeout_secs);
    let discovered = pool.scan().await;
    info!("{} device(s) discovered at startup", discovered.len());

    mcp::run_stdio(pool, resolved).await;
}
