//! The single seam every tool call goes through.
//!
//! [`resolve_and_run`] resolves a device handle (explicit serial or pool
//! default), optionally attaches a risk label, executes the command, and
//! post-processes the output. The outcome text is always agent-readable —
//! "device not found", execution failure, and timeout are ordinary values,
//! never errors to the tools layer — with a success flag alongside so
//! callers never have to parse the text.

use std::fmt::Write;

use crate::devices::DevicePool;
use crate::security;

/// Per-call execution options.
pub struct RunOptions {
    /// Run inside the device shell (`adb shell ...`) rather than as a
    /// host-side adb command.
    pub shell: bool,
    pub timeout_secs: u64,
    /// Prefix the result with a `[Risk: ...]` label for the command.
    pub assess_risk: bool,
    /// Keep at most this many output lines.
    pub max_lines: Option<usize>,
    /// Keep at most this many output characters (applied after `max_lines`).
    pub max_chars: Option<usize>,
}

impl RunOptions {
    /// Shell execution with the given timeout, no risk label, no limits.
    pub fn shell(timeout_secs: u64) -> Self {
        Self {
            shell: true,
            timeout_secs,
            assess_risk: false,
            max_lines: None,
            max_chars: None,
        }
    }

    /// Host-side adb execution with the given timeout.
    pub fn adb(timeout_secs: u64) -> Self {
        Self {
            shell: false,
            ..Self::shell(timeout_secs)
        }
    }

    pub fn with_risk(mut self) -> Self {
        self.assess_risk = true;
        self
    }

    pub fn with_limits(mut self, max_lines: Option<usize>, max_chars: Option<usize>) -> Self {
        self.max_lines = max_lines;
        self.max_chars = max_chars;
        self
    }
}

/// The uniform "target not found" message every tool relies on.
pub fn device_not_found(serial: Option<&str>) -> String {
    format!("Device not found: {}", serial.unwrap_or("default"))
}

/// What a facade run produced.
///
/// The text is agent-readable either way; `success` is the authoritative
/// flag, so callers never re-derive failure from the text itself.
pub struct RunOutcome {
    pub success: bool,
    pub text: String,
}

impl RunOutcome {
    fn ok(text: String) -> Self {
        Self { success: true, text }
    }

    fn failed(text: String) -> Self {
        Self { success: false, text }
    }
}

/// Resolve a device and run a command through it.
///
/// Failure is reported in-band: the outcome text either carries the
/// (possibly truncated) command output, or a descriptive failure message.
/// When `assess_risk` is set, the risk label comes first so the agent sees
/// severity before payload.
pub async fn resolve_and_run(
    pool: &DevicePool,
    serial: Option<&str>,
    command: &str,
    options: &RunOptions,
) -> RunOutcome {
    let client = match pool.get(serial).await {
        Some(c) => c,
        None => return RunOutcome::failed(device_not_found(serial)),
    };

    let risk_prefix = if options.assess_risk {
        let assessment = security::classify_command(command);
        format!("[Risk: {}] {}\n\n", assessment.risk, assessment.reason)
    } else {
        String::new()
    };

    let result = if options.shell {
        client.shell(command, options.timeout_secs).await
    } else {
        client.execute(command, options.timeout_secs).await
    };

    if !result.success {
        return RunOutcome::failed(format!(
            "{}Failed to execute: {}",
            risk_prefix, result.output
        ));
    }

    let mut output = result.output;
    if let Some(max) = options.max_lines {
        output = truncate_lines(&output, max);
    }
    if let Some(max) = options.max_chars {
        output = truncate_chars(&output, max);
    }

    RunOutcome::ok(format!("{}{}", risk_prefix, output))
}

/// Keep the first `max_lines` lines, appending a deterministic marker when
/// anything was dropped.
pub fn truncate_lines(output: &str, max_lines: usize) -> String {
    let lines: Vec<&str> = output.split('\n').collect();
    if lines.len() <= max_lines {
        return output.to_string();
    }
    let mut truncated = lines[..max_lines].join("\n");
    let _ = write!(
        truncated,
        "\n... (truncated {} lines)",
        lines.len() - max_lines
    );
    truncated
}

/// Keep the first `max_chars` characters, appending a deterministic marker
/// when anything was dropped. Counts characters, not bytes, so multi-byte
/// output is never split mid-character.
pub fn truncate_chars(output: &str, max_chars: usize) -> String {
    let total = output.chars().count();
    if total <= max_chars {
        return output.to_string();
    }
    let mut truncated: String = output.chars().take(max_chars).collect();
    let _ = write!(truncated, "\n... (truncated {} characters)", total - max_chars);
    truncated
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn line_truncation_appends_marker() {
        let output = "a\nb\nc\nd\ne";
        assert_eq!(truncate_lines(output, 2), "a\nb\n... (truncated 3 lines)");
    }

    #[test]
    fn line_truncation_noop_when_under_limit() {
        assert_eq!(truncate_lines("a\nb", 5), "a\nb");
        assert_eq!(truncate_lines("a\nb", 2), "a\nb");
    }

    #[test]
    fn char_truncation_appends_marker() {
        assert_eq!(
            truncate_chars("abcdefgh", 3),
            "abc\n... (truncated 5 characters)"
        );
    }

    #[test]
    fn char_truncation_counts_chars_not_bytes() {
        // Four multi-byte characters; limit 2 keeps exactly two of them.
        assert_eq!(
            truncate_chars("éééé", 2),
            "éé\n... (truncated 2 characters)"
        );
    }

    #[test]
    fn char_truncation_noop_at_limit() {
        assert_eq!(truncate_chars("abc", 3), "abc");
    }

    #[tokio::test]
    async fn unknown_device_yields_not_found_string() {
        let pool = DevicePool::new("adb", 5);
        let out = resolve_and_run(&pool, Some("NOPE"), "ls", &RunOptions::shell(5)).await;
        assert!(!out.success);
        assert_eq!(out.text, "Device not found: NOPE");

        let out = resolve_and_run(&pool, None, "ls", &RunOptions::shell(5)).await;
        assert!(!out.success);
        assert_eq!(out.text, "Device not found: default");
    }

    #[tokio::test]
    async fn risk_label_prefixes_output() {
        // Pool whose "adb" is echo: the bound client prints its args back,
        // which is enough to observe the facade's formatting.
        let pool = DevicePool::new("echo", 5);
        pool.register("AAA111").await;

        let out = resolve_and_run(
            &pool,
            None,
            "pm uninstall com.example.app",
            &RunOptions::adb(5).with_risk(),
        )
        .await;
        assert!(out.success);
        assert!(out.text.starts_with("[Risk: HIGH] High risk: pm uninstall\n\n"));
        assert!(out.text.contains("pm uninstall com.example.app"));
    }

    #[tokio::test]
    async fn failure_is_reported_in_band() {
        let pool = DevicePool::new("false", 5);
        pool.register("AAA111").await;

        let out = resolve_and_run(&pool, None, "", &RunOptions::adb(5)).await;
        assert!(!out.success);
        assert!(out.text.starts_with("Failed to execute:"));
    }

    #[tokio::test]
    async fn success_flag_is_independent_of_output_text() {
        // A successful command whose stdout contains the failure phrase
        // must still report success; the flag is the source of truth.
        let pool = DevicePool::new("echo", 5);
        pool.register("AAA111").await;

        let out = resolve_and_run(&pool, None, "Failed to execute: earlier run", &RunOptions::adb(5)).await;
        assert!(out.success);
        assert!(out.text.contains("Failed to execute: earlier run"));
    }
}
