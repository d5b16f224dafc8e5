//! ADB subprocess execution.
//!
//! [`AdbClient`] wraps the `adb` command-line binary and provides the two
//! execution primitives everything else is built on: [`AdbClient::execute`]
//! for host-side adb commands (`devices`, `install`, `push`, ...) and
//! [`AdbClient::shell`] for commands run inside the device's shell.
//!
//! ## Error handling
//!
//! Neither primitive returns a `Result`. Every failure mode — non-zero exit,
//! timeout, spawn failure — is folded into a [`CommandOutput`] value so the
//! tools layer can pattern-match on `success` and relay `output` to the
//! agent verbatim. Child processes are spawned with `kill_on_drop(true)`,
//! so a timed-out command is killed rather than left running detached.

use std::process::Stdio;
use std::time::Duration;

use tokio::process::Command;
use tracing::debug;

/// Normalized result of one adb invocation.
#[derive(Debug, Clone)]
pub struct CommandOutput {
    /// Whether the process exited with code 0.
    pub success: bool,
    /// Trimmed stdout on success, trimmed stderr or a diagnostic message on failure.
    pub output: String,
}

/// Client for a single adb target.
///
/// A client is bound to at most one device serial. An unbound client
/// (`serial == None`) omits the `-s` flag and lets adb apply its own
/// target resolution — used for discovery and `connect`/`disconnect`.
/// Clients are immutable after construction; the
/// [`DevicePool`](crate::devices::DevicePool) owns one per known device.
pub struct AdbClient {
    adb_path: String,
    serial: Option<String>,
}

impl AdbClient {
    /// Create a client bound to a specific device serial.
    pub fn bound(adb_path: &str, serial: &str) -> Self {
        Self {
            adb_path: adb_path.to_string(),
            serial: Some(serial.to_string()),
        }
    }

    /// Create an unbound client (no `-s` flag).
    pub fn unbound(adb_path: &str) -> Self {
        Self {
            adb_path: adb_path.to_string(),
            serial: None,
        }
    }

    /// The device serial this client is bound to, if any.
    pub fn serial(&self) -> Option<&str> {
        self.serial.as_deref()
    }

    /// Execute a host-side adb command, e.g. `execute("devices", 30)` runs
    /// `adb devices`. The command string is split on whitespace.
    pub async fn execute(&self, command: &str, timeout_secs: u64) -> CommandOutput {
        let args: Vec<&str> = command.split_whitespace().collect();
        self.run(&args, timeout_secs).await
    }

    /// Execute a command inside the device shell. The command text is passed
    /// to adb as a single argument, so pipes and redirects run on the device.
    pub async fn shell(&self, command: &str, timeout_secs: u64) -> CommandOutput {
        self.run(&["shell", command], timeout_secs).await
    }

    /// List serials of connected, authorized devices.
    ///
    /// Devices in `unauthorized` or `offline` state are excluded — they are
    /// visible to adb but cannot accept commands. Returns an empty list if
    /// discovery itself fails.
    pub async fn list_devices(&self, timeout_secs: u64) -> Vec<String> {
        let result = self.execute("devices", timeout_secs).await;
        if !result.success {
            debug!("device discovery failed: {}", result.output);
            return Vec::new();
        }
        parse_device_list(&result.output)
    }

    /// Spawn `<adb> [-s <serial>] <args...>` and normalize the outcome.
    async fn run(&self, args: &[&str], timeout_secs: u64) -> CommandOutput {
        let mut cmd = Command::new(&self.adb_path);
        if let Some(serial) = &self.serial {
            cmd.arg("-s").arg(serial);
        }
        cmd.args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let child = match cmd.spawn() {
            Ok(c) => c,
            Err(e) => {
                return CommandOutput {
                    success: false,
                    output: format!("Error executing command: {}", e),
                }
            }
        };

        let timeout = Duration::from_secs(timeout_secs);
        // On timeout the future owning the child is dropped, and
        // kill_on_drop delivers SIGKILL — no process outlives the call.
        match tokio::time::timeout(timeout, child.wait_with_output()).await {
            Ok(Ok(output)) => {
                if output.status.success() {
                    CommandOutput {
                        success: true,
                        output: String::from_utf8_lossy(&output.stdout).trim().to_string(),
                    }
                } else {
                    CommandOutput {
                        success: false,
                        output: String::from_utf8_lossy(&output.stderr).trim().to_string(),
                    }
                }
            }
            Ok(Err(e)) => CommandOutput {
                success: false,
                output: format!("Error executing command: {}", e),
            },
            Err(_) => CommandOutput {
                success: false,
                output: format!("Command timeout after {}s", timeout_secs),
            },
        }
    }
}

/// Parse `adb devices` output into a list of usable serials.
///
/// The first line is the `List of devices attached` header. Each following
/// line is `<serial>\t<state>`; only `state == "device"` counts as usable.
fn parse_device_list(output: &str) -> Vec<String> {
    output
        .lines()
        .skip(1)
        .filter_map(|line| {
            let mut fields = line.split('\t');
            let serial = fields.next()?.trim();
            let state = fields.next()?.trim();
            if !serial.is_empty() && state == "device" {
                Some(serial.to_string())
            } else {
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_devices_basic() {
        let output = "List of devices attached\nAAA111\tdevice\nBBB222\tdevice";
        assert_eq!(parse_device_list(output), vec!["AAA111", "BBB222"]);
    }

    #[test]
    fn parse_devices_skips_unauthorized_and_offline() {
        let output =
            "List of devices attached\nAAA111\tdevice\nCCC333\tunauthorized\nDDD444\toffline";
        assert_eq!(parse_device_list(output), vec!["AAA111"]);
    }

    #[test]
    fn parse_devices_empty() {
        assert_eq!(parse_device_list("List of devices attached"), Vec::<String>::new());
        assert_eq!(parse_device_list(""), Vec::<String>::new());
    }

    #[test]
    fn parse_devices_network_serial() {
        let output = "List of devices attached\n192.168.1.50:5555\tdevice";
        assert_eq!(parse_device_list(output), vec!["192.168.1.50:5555"]);
    }

    // The async tests point the client at ordinary system binaries instead
    // of adb — the runner contract is about process handling, not adb itself.

    #[tokio::test]
    async fn execute_captures_stdout_on_success() {
        let client = AdbClient::unbound("echo");
        let result = client.execute("hello world", 5).await;
        assert!(result.success);
        assert_eq!(result.output, "hello world");
    }

    #[tokio::test]
    async fn execute_reports_failure_on_nonzero_exit() {
        let client = AdbClient::unbound("false");
        let result = client.execute("", 5).await;
        assert!(!result.success);
    }

    #[tokio::test]
    async fn execute_reports_spawn_failure() {
        let client = AdbClient::unbound("/nonexistent/adb-binary");
        let result = client.execute("devices", 5).await;
        assert!(!result.success);
        assert!(result.output.starts_with("Error executing command:"));
    }

    #[tokio::test]
    async fn execute_times_out_and_kills_child() {
        let client = AdbClient::unbound("sleep");
        let start = std::time::Instant::now();
        let result = client.execute("10", 1).await;
        assert!(!result.success);
        assert_eq!(result.output, "Command timeout after 1s");
        // Bounded overhead: the call must not wait for the child's 10s.
        assert!(start.elapsed() < Duration::from_secs(3));
    }

    #[tokio::test]
    async fn bound_client_prefixes_serial_flag() {
        // `echo -s AAA111 devices` prints the -s flag back, proving the
        // selector was inserted before the command args.
        let client = AdbClient::bound("echo", "AAA111");
        let result = client.execute("devices", 5).await;
        assert!(result.success);
        assert_eq!(result.output, "-s AAA111 devices");
    }
}
