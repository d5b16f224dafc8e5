//! Risk classification for ADB commands and device paths.
//!
//! The classifier is pure and stateless: the same input always yields the
//! same [`Assessment`], no I/O is performed. It never blocks anything —
//! `allowed` is always `true`. Its job is to attach a severity label that
//! the tools layer surfaces to the agent before the command output, so a
//! destructive command is disclosed rather than silently executed or
//! silently refused.
//!
//! Command classification is first-match-wins, ordered most severe first,
//! against a lowercased and trimmed copy of the input.

use std::fmt;

/// Ordered severity of a command or path.
///
/// A real enum with derived ordering so tier comparisons like
/// `risk >= RiskLevel::High` are checked by the compiler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum RiskLevel {
    Safe,
    Low,
    Medium,
    High,
    Critical,
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            RiskLevel::Safe => "SAFE",
            RiskLevel::Low => "LOW",
            RiskLevel::Medium => "MEDIUM",
            RiskLevel::High => "HIGH",
            RiskLevel::Critical => "CRITICAL",
        };
        write!(f, "{}", label)
    }
}

/// Result of classifying one command or path.
#[derive(Debug, Clone)]
pub struct Assessment {
    /// Always `true` — classification discloses, it does not enforce.
    pub allowed: bool,
    pub risk: RiskLevel,
    /// Human-readable explanation, never parsed by callers.
    pub reason: String,
}

/// Destructive-intent fragments: filesystem wipe, raw block-device writes,
/// low-level format, bootloader/recovery triggers.
const CRITICAL_PATTERNS: &[&str] = &["rm -rf /", "dd if=", "format", "fastboot", "recovery"];

/// Recursive deletes, world-writable chmod, privileged shell, uninstalls.
const HIGH_PATTERNS: &[&str] = &["rm -rf", "rm -r", "chmod 777", "su -c", "pm uninstall"];

/// Installs, app-data clears, reboots, persistent settings writes.
const MEDIUM_PATTERNS: &[&str] = &["pm install", "pm clear", "reboot", "settings put"];

/// Generic file-mutation verbs, matched as whole words only.
const LOW_WORDS: &[&str] = &["rm", "mv", "cp", "delete"];

/// Device filesystem roots that warrant a HIGH label on any access.
const SENSITIVE_ROOTS: &[&str] = &["/system", "/boot", "/recovery", "/dev"];

/// Classify a shell/adb command string by risk tier.
pub fn classify_command(command: &str) -> Assessment {
    let normalized = command.trim().to_lowercase();

    for pattern in CRITICAL_PATTERNS {
        if normalized.contains(pattern) {
            return Assessment {
                allowed: true,
                risk: RiskLevel::Critical,
                reason: format!("Critical risk: {}", pattern),
            };
        }
    }

    for pattern in HIGH_PATTERNS {
        if normalized.contains(pattern) {
            return Assessment {
                allowed: true,
                risk: RiskLevel::High,
                reason: format!("High risk: {}", pattern),
            };
        }
    }

    for pattern in MEDIUM_PATTERNS {
        if normalized.contains(pattern) {
            return Assessment {
                allowed: true,
                risk: RiskLevel::Medium,
                reason: format!("Medium risk: {}", pattern),
            };
        }
    }

    // Whole-word match so e.g. "form" or "platform" never trips on "rm".
    let has_file_op = normalized
        .split(|c: char| !c.is_ascii_alphanumeric())
        .any(|word| LOW_WORDS.contains(&word));
    if has_file_op {
        return Assessment {
            allowed: true,
            risk: RiskLevel::Low,
            reason: "File operation".to_string(),
        };
    }

    Assessment {
        allowed: true,
        risk: RiskLevel::Safe,
        reason: "Safe operation".to_string(),
    }
}

/// Classify a device filesystem path by risk tier.
///
/// A pure prefix check against [`SENSITIVE_ROOTS`] — nothing is looked up
/// on the device, and paths under protected partitions are labeled, not
/// denied.
pub fn classify_path(path: &str) -> Assessment {
    for root in SENSITIVE_ROOTS {
        if path.starts_with(root) {
            return Assessment {
                allowed: true,
                risk: RiskLevel::High,
                reason: format!("System path: {}", root),
            };
        }
    }

    Assessment {
        allowed: true,
        risk: RiskLevel::Safe,
        reason: "Safe path".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tier_ordering() {
        assert!(RiskLevel::Safe < RiskLevel::Low);
        assert!(RiskLevel::Low < RiskLevel::Medium);
        assert!(RiskLevel::Medium < RiskLevel::High);
        assert!(RiskLevel::High < RiskLevel::Critical);
    }

    #[test]
    fn raw_block_write_is_critical() {
        let a = classify_command("dd if=/dev/zero of=/dev/sda");
        assert_eq!(a.risk, RiskLevel::Critical);
        assert!(a.allowed);
    }

    #[test]
    fn filesystem_wipe_is_critical() {
        let a = classify_command("rm -rf /");
        assert_eq!(a.risk, RiskLevel::Critical);
    }

    #[test]
    fn fastboot_is_critical_regardless_of_case() {
        assert_eq!(classify_command("  FASTBOOT flash boot  ").risk, RiskLevel::Critical);
    }

    #[test]
    fn uninstall_is_high() {
        let a = classify_command("pm uninstall com.example.app");
        assert_eq!(a.risk, RiskLevel::High);
        assert!(a.allowed);
    }

    #[test]
    fn recursive_delete_is_high() {
        assert_eq!(classify_command("rm -rf cache/tmp").risk, RiskLevel::High);
        assert_eq!(classify_command("rm -r cache").risk, RiskLevel::High);
        assert_eq!(classify_command("chmod 777 /sdcard/file").risk, RiskLevel::High);
    }

    #[test]
    fn recursive_delete_of_absolute_path_is_critical() {
        // "rm -rf /" matches the critical tier before the high tier is reached.
        assert_eq!(classify_command("rm -rf /sdcard/tmp").risk, RiskLevel::Critical);
        assert_eq!(classify_command("rm -rf /").risk, RiskLevel::Critical);
    }

    #[test]
    fn install_and_reboot_are_medium() {
        assert_eq!(classify_command("pm install app.apk").risk, RiskLevel::Medium);
        assert_eq!(classify_command("reboot").risk, RiskLevel::Medium);
        assert_eq!(
            classify_command("settings put global adb_enabled 1").risk,
            RiskLevel::Medium
        );
    }

    #[test]
    fn plain_remove_is_low() {
        let a = classify_command("rm somefile");
        assert_eq!(a.risk, RiskLevel::Low);
        assert_eq!(a.reason, "File operation");
    }

    #[test]
    fn low_match_requires_whole_word() {
        // "form" contains "rm" as a substring but is not a file operation.
        assert_eq!(classify_command("form").risk, RiskLevel::Safe);
        assert_eq!(classify_command("ls /data/platform").risk, RiskLevel::Safe);
    }

    #[test]
    fn listing_is_safe() {
        let a = classify_command("ls -la");
        assert_eq!(a.risk, RiskLevel::Safe);
        assert_eq!(a.reason, "Safe operation");
    }

    #[test]
    fn always_allowed_at_every_tier() {
        for cmd in ["ls", "rm x", "reboot", "pm uninstall a", "dd if=/dev/zero"] {
            assert!(classify_command(cmd).allowed, "denied: {}", cmd);
        }
    }

    #[test]
    fn sdcard_path_is_safe() {
        assert_eq!(classify_path("/sdcard/Download/file.txt").risk, RiskLevel::Safe);
    }

    #[test]
    fn system_path_is_high_and_names_root() {
        let a = classify_path("/system/bin/su");
        assert_eq!(a.risk, RiskLevel::High);
        assert!(a.allowed);
        assert!(a.reason.contains("/system"));
    }

    #[test]
    fn dev_path_is_high() {
        assert_eq!(classify_path("/dev/block/sda").risk, RiskLevel::High);
    }

    #[test]
    fn classification_is_deterministic() {
        let first = classify_command("pm clear com.example.app");
        let second = classify_command("pm clear com.example.app");
        assert_eq!(first.risk, second.risk);
        assert_eq!(first.reason, second.reason);
    }
}
