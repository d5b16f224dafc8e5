//! Configuration loading for mcp-adb.
//!
//! Configuration is resolved from CLI flags first, then environment
//! variables:
//!
//! - `--adb <path>` / `ADB_MCP_PATH` — the adb binary to invoke
//!   (defaults to `adb` on PATH)
//! - `--timeout <secs>` / `ADB_MCP_TIMEOUT_SECS` — default command
//!   timeout in seconds (defaults to 30)
//!
//! There is no device list to configure: devices are discovered live from
//! `adb devices` on first use and tracked in the
//! [`DevicePool`](crate::devices::DevicePool).

use clap::Parser;
use std::path::PathBuf;

/// Default per-command timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// CLI arguments parsed by `clap`.
#[derive(Parser)]
#[command(name = "mcp-adb", about = "MCP server for Android devices via ADB")]
pub struct Cli {
    /// Path to the adb binary (default: `adb` on PATH)
    #[arg(long)]
    pub adb: Option<PathBuf>,

    /// Default command timeout in seconds
    #[arg(long)]
    pub timeout: Option<u64>,
}

/// Validated configuration ready for use by the device pool.
#[derive(Clone)]
pub struct ResolvedConfig {
    /// adb binary to invoke for every bridge command.
    pub adb_path: String,
    /// Timeout applied when a tool call does not supply its own.
    pub default_timeout_secs: u64,
}

/// Load and validate configuration from CLI args and env vars.
pub fn load_config(cli: &Cli) -> Result<ResolvedConfig, String> {
    let adb_path = if let Some(path) = &cli.adb {
        path.to_string_lossy().into_owned()
    } else if let Ok(path) = std::env::var("ADB_MCP_PATH") {
        path
    } else {
        "adb".to_string()
    };

    if adb_path.is_empty() {
        return Err("adb path is empty".into());
    }

    let default_timeout_secs = if let Some(t) = cli.timeout {
        t
    } else if let Ok(raw) = std::env::var("ADB_MCP_TIMEOUT_SECS") {
        raw.parse::<u64>()
            .map_err(|_| format!("ADB_MCP_TIMEOUT_SECS is not a number: '{}'", raw))?
    } else {
        DEFAULT_TIMEOUT_SECS
    };

    if default_timeout_secs == 0 {
        return Err("timeout must be at least 1 second".into());
    }

    Ok(ResolvedConfig {
        adb_path,
        default_timeout_secs,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_flags_win() {
        let cli = Cli {
            adb: Some(PathBuf::from("/opt/platform-tools/adb")),
            timeout: Some(120),
        };
        let config = load_config(&cli).unwrap();
        assert_eq!(config.adb_path, "/opt/platform-tools/adb");
        assert_eq!(config.default_timeout_secs, 120);
    }

    #[test]
    fn zero_timeout_rejected() {
        let cli = Cli {
            adb: None,
            timeout: Some(0),
        };
        assert!(load_config(&cli).is_err());
    }
}
