//! MCP tool definitions and handlers.
//!
//! Each tool is defined as a JSON schema (returned by [`tool_definitions`])
//! and handled by an async function dispatched from [`handle_tool_call`].
//! All handlers resolve their device through the shared
//! [`DevicePool`](crate::devices::DevicePool) and return plain text the
//! agent can read directly.
//!
//! ## Tool categories
//!
//! - **Device**: `device_list`, `device_connect`, `device_disconnect`,
//!   `device_set_default`, `device_reboot`, `device_properties`
//! - **Apps**: `app_list`, `app_install`, `app_uninstall`, `app_start`,
//!   `app_stop`, `app_clear_data`, `app_info`, `app_manifest`,
//!   `app_permissions`, `app_activities`
//! - **Files**: `file_list`, `file_read`, `file_write`, `file_push`,
//!   `file_pull`, `file_mkdir`, `file_delete`, `file_exists`, `file_stat`
//! - **Shell**: `shell_exec` (risk-labeled, truncatable output)
//! - **UI**: `ui_screenshot`, `ui_tap`, `ui_swipe`, `ui_input_text`,
//!   `ui_press_key`, `ui_start_intent`
//! - **Diagnostics**: `log_device`, `log_app`, `log_anr`, `log_crash`,
//!   `battery_stats`, `bugreport`, `heap_dump`

use std::sync::Arc;

use serde_json::{json, Value};

use crate::adb::AdbClient;
use crate::config::ResolvedConfig;
use crate::devices::DevicePool;
use crate::dispatch::{self, device_not_found, RunOptions};
use crate::security;

/// Timeout for logcat reads — log dumps can be slow on loaded devices.
const LOGCAT_TIMEOUT_SECS: u64 = 60;
/// Default cap for log/shell output relayed to the agent.
const DEFAULT_MAX_CHARS: usize = 10_000;

const DEVICE_PARAM_DESC: &str = "Device serial. Omit to use the default device.";

/// Returns all tool definitions.
pub fn tool_definitions() -> Vec<Value> {
    let mut tools = device_tool_definitions();
    tools.extend(app_tool_definitions());
    tools.extend(file_tool_definitions());
    tools.extend(shell_tool_definitions());
    tools.extend(ui_tool_definitions());
    tools.extend(diagnostic_tool_definitions());
    tools
}

fn device_tool_definitions() -> Vec<Value> {
    vec![
        json!({
            "name": "device_list",
            "description": "Scan for connected Android devices and list their serials. The first device found becomes the default target for all other tools until changed.",
            "inputSchema": {
                "type": "object",
                "properties": {},
                "additionalProperties": false
            }
        }),
        json!({
            "name": "device_connect",
            "description": "Connect to an Android device over TCP/IP (adb connect). The device must have wireless debugging enabled.",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "address": { "type": "string", "description": "IP address of the device." },
                    "port": { "type": "integer", "description": "Port number. Default 5555." }
                },
                "required": ["address"],
                "additionalProperties": false
            }
        }),
        json!({
            "name": "device_disconnect",
            "description": "Disconnect a TCP/IP-connected Android device and forget it.",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "address": { "type": "string", "description": "IP address of the device." },
                    "port": { "type": "integer", "description": "Port number. Default 5555." }
                },
                "required": ["address"],
                "additionalProperties": false
            }
        }),
        json!({
            "name": "device_set_default",
            "description": "Set the default device used when a tool call omits an explicit serial. The device must already be known (run device_list first).",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "serial": { "type": "string", "description": "Serial of the device to make default." }
                },
                "required": ["serial"],
                "additionalProperties": false
            }
        }),
        json!({
            "name": "device_reboot",
            "description": "Reboot an Android device to normal, recovery, or bootloader mode.",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "device": { "type": "string", "description": DEVICE_PARAM_DESC },
                    "mode": {
                        "type": "string",
                        "description": "Reboot mode. Default 'normal'.",
                        "enum": ["normal", "recovery", "bootloader"]
                    }
                },
                "additionalProperties": false
            }
        }),
        json!({
            "name": "device_properties",
            "description": "Get device properties: model, brand, Android version, SDK level, build number, serial, manufacturer.",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "device": { "type": "string", "description": DEVICE_PARAM_DESC }
                },
                "additionalProperties": false
            }
        }),
    ]
}

fn app_tool_definitions() -> Vec<Value> {
    vec![
        json!({
            "name": "app_list",
            "description": "List installed packages. Third-party apps only unless include_system is true.",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "device": { "type": "string", "description": DEVICE_PARAM_DESC },
                    "include_system": { "type": "boolean", "description": "Include system packages. Default false." }
                },
                "additionalProperties": false
            }
        }),
        json!({
            "name": "app_install",
            "description": "Install an APK from the host onto the device.",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "apk_path": { "type": "string", "description": "Local path to the APK file on the host." },
                    "device": { "type": "string", "description": DEVICE_PARAM_DESC },
                    "reinstall": { "type": "boolean", "description": "Allow replacing an existing install (-r). Default false." },
                    "grant_permissions": { "type": "boolean", "description": "Grant all runtime permissions (-g). Default false." }
                },
                "required": ["apk_path"],
                "additionalProperties": false
            }
        }),
        json!({
            "name": "app_uninstall",
            "description": "Uninstall an application from the device.",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "package": { "type": "string", "description": "Package name to uninstall." },
                    "device": { "type": "string", "description": DEVICE_PARAM_DESC },
                    "keep_data": { "type": "boolean", "description": "Keep app data and cache (-k). Default false." }
                },
                "required": ["package"],
                "additionalProperties": false
            }
        }),
        json!({
            "name": "app_start",
            "description": "Launch an application by package name.",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "package": { "type": "string", "description": "Package name to launch." },
                    "device": { "type": "string", "description": DEVICE_PARAM_DESC }
                },
                "required": ["package"],
                "additionalProperties": false
            }
        }),
        json!({
            "name": "app_stop",
            "description": "Force-stop a running application.",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "package": { "type": "string", "description": "Package name to stop." },
                    "device": { "type": "string", "description": DEVICE_PARAM_DESC }
                },
                "required": ["package"],
                "additionalProperties": false
            }
        }),
        json!({
            "name": "app_clear_data",
            "description": "Clear an application's data and cache.",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "package": { "type": "string", "description": "Package name to clear." },
                    "device": { "type": "string", "description": DEVICE_PARAM_DESC }
                },
                "required": ["package"],
                "additionalProperties": false
            }
        }),
        json!({
            "name": "app_info",
            "description": "Get version and SDK information for an installed application.",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "package": { "type": "string", "description": "Package name." },
                    "device": { "type": "string", "description": DEVICE_PARAM_DESC }
                },
                "required": ["package"],
                "additionalProperties": false
            }
        }),
        json!({
            "name": "app_manifest",
            "description": "Extract AndroidManifest details for an installed application (aapt dump badging).",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "package": { "type": "string", "description": "Package name." },
                    "device": { "type": "string", "description": DEVICE_PARAM_DESC }
                },
                "required": ["package"],
                "additionalProperties": false
            }
        }),
        json!({
            "name": "app_permissions",
            "description": "List an application's permissions and their grant status.",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "package": { "type": "string", "description": "Package name." },
                    "device": { "type": "string", "description": DEVICE_PARAM_DESC }
                },
                "required": ["package"],
                "additionalProperties": false
            }
        }),
        json!({
            "name": "app_activities",
            "description": "List the activities declared by an application.",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "package": { "type": "string", "description": "Package name." },
                    "device": { "type": "string", "description": DEVICE_PARAM_DESC }
                },
                "required": ["package"],
                "additionalProperties": false
            }
        }),
    ]
}

fn file_tool_definitions() -> Vec<Value> {
    vec![
        json!({
            "name": "file_list",
            "description": "List the contents of a directory on the device.",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "path": { "type": "string", "description": "Directory path on the device." },
                    "device": { "type": "string", "description": DEVICE_PARAM_DESC }
                },
                "required": ["path"],
                "additionalProperties": false
            }
        }),
        json!({
            "name": "file_read",
            "description": "Read a text file from the device. Files larger than max_size are refused — use file_pull for those.",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "path": { "type": "string", "description": "File path on the device." },
                    "device": { "type": "string", "description": DEVICE_PARAM_DESC },
                    "max_size": { "type": "integer", "description": "Maximum file size in bytes. Default 102400 (100 KB)." }
                },
                "required": ["path"],
                "additionalProperties": false
            }
        }),
        json!({
            "name": "file_write",
            "description": "Write text content to a file on the device.",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "path": { "type": "string", "description": "File path on the device." },
                    "content": { "type": "string", "description": "Content to write." },
                    "device": { "type": "string", "description": DEVICE_PARAM_DESC }
                },
                "required": ["path", "content"],
                "additionalProperties": false
            }
        }),
        json!({
            "name": "file_push",
            "description": "Upload a file from the host to the device.",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "local_path": { "type": "string", "description": "Source path on the host." },
                    "device_path": { "type": "string", "description": "Destination path on the device." },
                    "device": { "type": "string", "description": DEVICE_PARAM_DESC }
                },
                "required": ["local_path", "device_path"],
                "additionalProperties": false
            }
        }),
        json!({
            "name": "file_pull",
            "description": "Download a file from the device to the host.",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "device_path": { "type": "string", "description": "Source path on the device." },
                    "local_path": { "type": "string", "description": "Destination path on the host. Defaults to the file name in the working directory." },
                    "device": { "type": "string", "description": DEVICE_PARAM_DESC }
                },
                "required": ["device_path"],
                "additionalProperties": false
            }
        }),
        json!({
            "name": "file_mkdir",
            "description": "Create a directory (and parents) on the device.",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "path": { "type": "string", "description": "Directory path to create." },
                    "device": { "type": "string", "description": DEVICE_PARAM_DESC }
                },
                "required": ["path"],
                "additionalProperties": false
            }
        }),
        json!({
            "name": "file_delete",
            "description": "Delete a file or directory on the device. Paths under protected partitions (/system, /boot, /recovery, /dev) are flagged in the result.",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "path": { "type": "string", "description": "Path to delete." },
                    "device": { "type": "string", "description": DEVICE_PARAM_DESC },
                    "recursive": { "type": "boolean", "description": "Delete directories recursively. Default false." }
                },
                "required": ["path"],
                "additionalProperties": false
            }
        }),
        json!({
            "name": "file_exists",
            "description": "Check whether a file or directory exists on the device.",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "path": { "type": "string", "description": "Path to check." },
                    "device": { "type": "string", "description": DEVICE_PARAM_DESC }
                },
                "required": ["path"],
                "additionalProperties": false
            }
        }),
        json!({
            "name": "file_stat",
            "description": "Get metadata (size, permissions, timestamps) for a file or directory on the device.",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "path": { "type": "string", "description": "Path to inspect." },
                    "device": { "type": "string", "description": DEVICE_PARAM_DESC }
                },
                "required": ["path"],
                "additionalProperties": false
            }
        }),
    ]
}

fn shell_tool_definitions() -> Vec<Value> {
    vec![json!({
        "name": "shell_exec",
        "description": "Execute a shell command on the device. The result is prefixed with a risk assessment ([Risk: SAFE|LOW|MEDIUM|HIGH|CRITICAL]) — review it before acting on destructive output. Common safe commands: ls, cat, ps, dumpsys, getprop.",
        "inputSchema": {
            "type": "object",
            "properties": {
                "command": { "type": "string", "description": "Shell command to execute." },
                "device": { "type": "string", "description": DEVICE_PARAM_DESC },
                "timeout_secs": { "type": "integer", "description": "Command timeout in seconds. Defaults to the server's configured timeout (30s)." },
                "max_lines": { "type": "integer", "description": "Limit output to this many lines." },
                "max_chars": { "type": "integer", "description": "Limit output to this many characters. Default 10000." }
            },
            "required": ["command"],
            "additionalProperties": false
        }
    })]
}

fn ui_tool_definitions() -> Vec<Value> {
    vec![
        json!({
            "name": "ui_screenshot",
            "description": "Capture a screenshot of the device screen and save it to the host.",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "device": { "type": "string", "description": DEVICE_PARAM_DESC },
                    "output_path": { "type": "string", "description": "Host path for the PNG. Default 'screenshot.png'." }
                },
                "additionalProperties": false
            }
        }),
        json!({
            "name": "ui_tap",
            "description": "Tap the screen at the given coordinates.",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "x": { "type": "integer", "description": "X coordinate." },
                    "y": { "type": "integer", "description": "Y coordinate." },
                    "device": { "type": "string", "description": DEVICE_PARAM_DESC }
                },
                "required": ["x", "y"],
                "additionalProperties": false
            }
        }),
        json!({
            "name": "ui_swipe",
            "description": "Swipe from one point to another.",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "start_x": { "type": "integer", "description": "Start X coordinate." },
                    "start_y": { "type": "integer", "description": "Start Y coordinate." },
                    "end_x": { "type": "integer", "description": "End X coordinate." },
                    "end_y": { "type": "integer", "description": "End Y coordinate." },
                    "duration_ms": { "type": "integer", "description": "Swipe duration in milliseconds. Default 300." },
                    "device": { "type": "string", "description": DEVICE_PARAM_DESC }
                },
                "required": ["start_x", "start_y", "end_x", "end_y"],
                "additionalProperties": false
            }
        }),
        json!({
            "name": "ui_input_text",
            "description": "Type text into the currently focused input field.",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "text": { "type": "string", "description": "Text to type." },
                    "device": { "type": "string", "description": DEVICE_PARAM_DESC }
                },
                "required": ["text"],
                "additionalProperties": false
            }
        }),
        json!({
            "name": "ui_press_key",
            "description": "Press a key by Android keycode. Common: 3=HOME, 4=BACK, 82=MENU, 24=VOLUME_UP, 25=VOLUME_DOWN, 26=POWER, 66=ENTER.",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "keycode": { "type": "integer", "description": "Android keycode number." },
                    "device": { "type": "string", "description": DEVICE_PARAM_DESC }
                },
                "required": ["keycode"],
                "additionalProperties": false
            }
        }),
        json!({
            "name": "ui_start_intent",
            "description": "Launch an activity via an intent (am start). Optionally target a specific activity and pass string extras.",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "package": { "type": "string", "description": "Package name." },
                    "activity": { "type": "string", "description": "Activity class to start (appended as package/activity)." },
                    "extras": { "type": "string", "description": "String extras as 'key=value,key2=value2'." },
                    "device": { "type": "string", "description": DEVICE_PARAM_DESC }
                },
                "required": ["package"],
                "additionalProperties": false
            }
        }),
    ]
}

fn diagnostic_tool_definitions() -> Vec<Value> {
    vec![
        json!({
            "name": "log_device",
            "description": "Fetch device logs from logcat.",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "device": { "type": "string", "description": DEVICE_PARAM_DESC },
                    "lines": { "type": "integer", "description": "Number of recent log lines. Default 100." },
                    "filter": { "type": "string", "description": "Logcat filter expression, e.g. 'ActivityManager:I *:S'." },
                    "buffer": {
                        "type": "string",
                        "description": "Log buffer to read. Default 'main'.",
                        "enum": ["main", "system", "crash", "events", "radio", "all"]
                    },
                    "max_chars": { "type": "integer", "description": "Limit output to this many characters. Default 10000." }
                },
                "additionalProperties": false
            }
        }),
        json!({
            "name": "log_app",
            "description": "Fetch logs for a specific running application (by PID).",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "package": { "type": "string", "description": "Package name." },
                    "device": { "type": "string", "description": DEVICE_PARAM_DESC },
                    "lines": { "type": "integer", "description": "Number of recent log lines. Default 100." }
                },
                "required": ["package"],
                "additionalProperties": false
            }
        }),
        json!({
            "name": "log_anr",
            "description": "List Application Not Responding (ANR) trace files on the device.",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "device": { "type": "string", "description": DEVICE_PARAM_DESC }
                },
                "additionalProperties": false
            }
        }),
        json!({
            "name": "log_crash",
            "description": "Fetch recent application crash logs from the crash buffer.",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "device": { "type": "string", "description": DEVICE_PARAM_DESC }
                },
                "additionalProperties": false
            }
        }),
        json!({
            "name": "battery_stats",
            "description": "Report battery level, status, health, temperature, and voltage.",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "device": { "type": "string", "description": DEVICE_PARAM_DESC }
                },
                "additionalProperties": false
            }
        }),
        json!({
            "name": "bugreport",
            "description": "Generate a full diagnostic bugreport and save it on the host. Slow — can take minutes.",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "device": { "type": "string", "description": DEVICE_PARAM_DESC },
                    "output_path": { "type": "string", "description": "Host path for the report. Default 'bugreport.zip'." },
                    "timeout_secs": { "type": "integer", "description": "Timeout in seconds. Default 300." }
                },
                "additionalProperties": false
            }
        }),
        json!({
            "name": "heap_dump",
            "description": "Capture a heap dump of a running application and save it on the host.",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "package": { "type": "string", "description": "Package name or PID." },
                    "device": { "type": "string", "description": DEVICE_PARAM_DESC },
                    "output_path": { "type": "string", "description": "Host path for the dump. Default 'heap.hprof'." }
                },
                "required": ["package"],
                "additionalProperties": false
            }
        }),
    ]
}

/// Dispatch a tool call by name.
pub async fn handle_tool_call(
    name: &str,
    args: &Value,
    pool: &DevicePool,
    config: &ResolvedConfig,
) -> ToolResult {
    match name {
        "device_list" => handle_device_list(pool).await,
        "device_connect" => handle_device_connect(args, pool, config).await,
        "device_disconnect" => handle_device_disconnect(args, pool, config).await,
        "device_set_default" => handle_device_set_default(args, pool).await,
        "device_reboot" => handle_device_reboot(args, pool, config).await,
        "device_properties" => handle_device_properties(args, pool, config).await,
        "app_list" => handle_app_list(args, pool, config).await,
        "app_install" => handle_app_install(args, pool, config).await,
        "app_uninstall" => handle_app_uninstall(args, pool, config).await,
        "app_start" => handle_app_start(args, pool, config).await,
        "app_stop" => handle_app_stop(args, pool, config).await,
        "app_clear_data" => handle_app_clear_data(args, pool, config).await,
        "app_info" => handle_app_info(args, pool, config).await,
        "app_manifest" => handle_app_manifest(args, pool, config).await,
        "app_permissions" => handle_app_permissions(args, pool, config).await,
        "app_activities" => handle_app_activities(args, pool, config).await,
        "file_list" => handle_file_list(args, pool, config).await,
        "file_read" => handle_file_read(args, pool, config).await,
        "file_write" => handle_file_write(args, pool, config).await,
        "file_push" => handle_file_push(args, pool, config).await,
        "file_pull" => handle_file_pull(args, pool, config).await,
        "file_mkdir" => handle_file_mkdir(args, pool, config).await,
        "file_delete" => handle_file_delete(args, pool, config).await,
        "file_exists" => handle_file_exists(args, pool, config).await,
        "file_stat" => handle_file_stat(args, pool, config).await,
        "shell_exec" => handle_shell_exec(args, pool, config).await,
        "ui_screenshot" => handle_ui_screenshot(args, pool, config).await,
        "ui_tap" => handle_ui_tap(args, pool, config).await,
        "ui_swipe" => handle_ui_swipe(args, pool, config).await,
        "ui_input_text" => handle_ui_input_text(args, pool, config).await,
        "ui_press_key" => handle_ui_press_key(args, pool, config).await,
        "ui_start_intent" => handle_ui_start_intent(args, pool, config).await,
        "log_device" => handle_log_device(args, pool, config).await,
        "log_app" => handle_log_app(args, pool, config).await,
        "log_anr" => handle_log_anr(args, pool, config).await,
        "log_crash" => handle_log_crash(args, pool, config).await,
        "battery_stats" => handle_battery_stats(args, pool, config).await,
        "bugreport" => handle_bugreport(args, pool, config).await,
        "heap_dump" => handle_heap_dump(args, pool, config).await,
        _ => ToolResult::error(format!("Unknown tool: {}", name)),
    }
}

/// Result of an MCP tool call, ready to be serialized into a JSON-RPC response.
pub struct ToolResult {
    /// MCP content blocks (a single `{"type":"text","text":"..."}` entry).
    pub content: Vec<Value>,
    /// Whether the tool call failed (maps to `isError` in the MCP response).
    pub is_error: bool,
}

impl ToolResult {
    fn text(message: String) -> Self {
        Self {
            content: vec![json!({ "type": "text", "text": message })],
            is_error: false,
        }
    }

    fn error(message: String) -> Self {
        Self {
            content: vec![json!({ "type": "text", "text": message })],
            is_error: true,
        }
    }
}

// --- Argument helpers ---

fn device_param(args: &Value) -> Option<&str> {
    args.get("device").and_then(Value::as_str)
}

fn str_param<'a>(args: &'a Value, key: &str) -> Option<&'a str> {
    args.get(key).and_then(Value::as_str)
}

fn u64_param(args: &Value, key: &str) -> Option<u64> {
    args.get(key).and_then(Value::as_u64)
}

fn bool_param(args: &Value, key: &str, default: bool) -> bool {
    args.get(key).and_then(Value::as_bool).unwrap_or(default)
}

fn missing(key: &str) -> ToolResult {
    ToolResult::error(format!("Missing required parameter: {}", key))
}

/// Resolve the device client for a tool call, or produce the uniform
/// not-found error result.
async fn resolve(args: &Value, pool: &DevicePool) -> Result<Arc<AdbClient>, ToolResult> {
    let serial = device_param(args);
    pool.get(serial)
        .await
        .ok_or_else(|| ToolResult::error(device_not_found(serial)))
}

/// Run one shell command on the resolved device, mapping failure to the
/// given context message.
async fn run_shell_simple(
    args: &Value,
    pool: &DevicePool,
    config: &ResolvedConfig,
    command: &str,
    failure_context: &str,
) -> ToolResult {
    let client = match resolve(args, pool).await {
        Ok(c) => c,
        Err(e) => return e,
    };
    let result = client.shell(command, config.default_timeout_secs).await;
    if result.success {
        ToolResult::text(result.output)
    } else {
        ToolResult::error(format!("{}: {}", failure_context, result.output))
    }
}

// --- Device tools ---

async fn handle_device_list(pool: &DevicePool) -> ToolResult {
    let serials = pool.scan().await;
    let default = pool.default_serial().await;
    ToolResult::text(format_device_list(&serials, default.as_deref()))
}

fn format_device_list(serials: &[String], default: Option<&str>) -> String {
    if serials.is_empty() {
        return "No devices connected".to_string();
    }
    let mut out = format!("Found {} device(s):\n", serials.len());
    for (i, serial) in serials.iter().enumerate() {
        out.push_str(&format!("{}. {}", i + 1, serial));
        if Some(serial.as_str()) == default {
            out.push_str(" (default)");
        }
        out.push('\n');
    }
    out.trim_end().to_string()
}

fn network_serial(args: &Value) -> Option<String> {
    let address = str_param(args, "address")?;
    let port = u64_param(args, "port").unwrap_or(5555);
    Some(format!("{}:{}", address, port))
}

async fn handle_device_connect(
    args: &Value,
    pool: &DevicePool,
    config: &ResolvedConfig,
) -> ToolResult {
    let serial = match network_serial(args) {
        Some(s) => s,
        None => return missing("address"),
    };

    let client = AdbClient::unbound(&config.adb_path);
    let result = client
        .execute(&format!("connect {}", serial), config.default_timeout_secs)
        .await;

    // `adb connect` exits 0 even when the device refuses; the output text
    // is authoritative.
    if result.success && !result.output.contains("failed") && !result.output.contains("cannot") {
        pool.register(&serial).await;
        ToolResult::text(format!("Connected to {}", serial))
    } else {
        ToolResult::error(format!("Failed to connect: {}", result.output))
    }
}

async fn handle_device_disconnect(
    args: &Value,
    pool: &DevicePool,
    config: &ResolvedConfig,
) -> ToolResult {
    let serial = match network_serial(args) {
        Some(s) => s,
        None => return missing("address"),
    };

    let client = AdbClient::unbound(&config.adb_path);
    let result = client
        .execute(&format!("disconnect {}", serial), config.default_timeout_secs)
        .await;

    if result.success {
        pool.remove(&serial).await;
        ToolResult::text(format!("Disconnected from {}", serial))
    } else {
        ToolResult::error(format!("Failed to disconnect: {}", result.output))
    }
}

async fn handle_device_set_default(args: &Value, pool: &DevicePool) -> ToolResult {
    let serial = match str_param(args, "serial") {
        Some(s) => s,
        None => return missing("serial"),
    };
    if pool.set_default(serial).await {
        ToolResult::text(format!("Default device set to {}", serial))
    } else {
        ToolResult::error(device_not_found(Some(serial)))
    }
}

async fn handle_device_reboot(
    args: &Value,
    pool: &DevicePool,
    config: &ResolvedConfig,
) -> ToolResult {
    let client = match resolve(args, pool).await {
        Ok(c) => c,
        Err(e) => return e,
    };
    let mode = str_param(args, "mode").unwrap_or("normal");
    let command = match mode {
        "recovery" => "reboot recovery",
        "bootloader" => "reboot bootloader",
        _ => "reboot",
    };

    let result = client.execute(command, config.default_timeout_secs).await;
    if result.success {
        ToolResult::text(format!("Device rebooting to {} mode", mode))
    } else {
        ToolResult::error(format!("Failed to reboot: {}", result.output))
    }
}

async fn handle_device_properties(
    args: &Value,
    pool: &DevicePool,
    config: &ResolvedConfig,
) -> ToolResult {
    let client = match resolve(args, pool).await {
        Ok(c) => c,
        Err(e) => return e,
    };

    const PROPERTIES: &[(&str, &str)] = &[
        ("Model", "ro.product.model"),
        ("Brand", "ro.product.brand"),
        ("Device", "ro.product.device"),
        ("Android Version", "ro.build.version.release"),
        ("SDK Level", "ro.build.version.sdk"),
        ("Build Number", "ro.build.display.id"),
        ("Serial", "ro.serialno"),
        ("Manufacturer", "ro.product.manufacturer"),
    ];

    let mut lines = Vec::with_capacity(PROPERTIES.len());
    for (label, prop) in PROPERTIES {
        let result = client
            .shell(&format!("getprop {}", prop), config.default_timeout_secs)
            .await;
        if result.success && !result.output.is_empty() {
            lines.push(format!("{}: {}", label, result.output));
        }
    }

    if lines.is_empty() {
        ToolResult::error("Failed to read device properties".to_string())
    } else {
        ToolResult::text(lines.join("\n"))
    }
}

// --- App tools ---

async fn handle_app_list(args: &Value, pool: &DevicePool, config: &ResolvedConfig) -> ToolResult {
    let client = match resolve(args, pool).await {
        Ok(c) => c,
        Err(e) => return e,
    };
    let command = if bool_param(args, "include_system", false) {
        "pm list packages"
    } else {
        "pm list packages -3"
    };

    let result = client.shell(command, config.default_timeout_secs).await;
    if !result.success {
        return ToolResult::error(format!("Failed to list packages: {}", result.output));
    }

    let packages: Vec<&str> = result
        .output
        .lines()
        .filter_map(|line| line.strip_prefix("package:"))
        .collect();
    ToolResult::text(format!(
        "Found {} package(s):\n{}",
        packages.len(),
        packages.join("\n")
    ))
}

async fn handle_app_install(
    args: &Value,
    pool: &DevicePool,
    config: &ResolvedConfig,
) -> ToolResult {
    let client = match resolve(args, pool).await {
        Ok(c) => c,
        Err(e) => return e,
    };
    let apk_path = match str_param(args, "apk_path") {
        Some(p) => p,
        None => return missing("apk_path"),
    };

    let mut command = String::from("install");
    if bool_param(args, "reinstall", false) {
        command.push_str(" -r");
    }
    if bool_param(args, "grant_permissions", false) {
        command.push_str(" -g");
    }
    command.push(' ');
    command.push_str(apk_path);

    let result = client.execute(&command, config.default_timeout_secs).await;
    if result.success {
        ToolResult::text(result.output)
    } else {
        ToolResult::error(format!("Installation failed: {}", result.output))
    }
}

async fn handle_app_uninstall(
    args: &Value,
    pool: &DevicePool,
    config: &ResolvedConfig,
) -> ToolResult {
    let client = match resolve(args, pool).await {
        Ok(c) => c,
        Err(e) => return e,
    };
    let package = match str_param(args, "package") {
        Some(p) => p,
        None => return missing("package"),
    };

    let mut command = String::from("uninstall");
    if bool_param(args, "keep_data", false) {
        command.push_str(" -k");
    }
    command.push(' ');
    command.push_str(package);

    let result = client.execute(&command, config.default_timeout_secs).await;
    if result.success {
        ToolResult::text(result.output)
    } else {
        ToolResult::error(format!("Uninstallation failed: {}", result.output))
    }
}

async fn handle_app_start(args: &Value, pool: &DevicePool, config: &ResolvedConfig) -> ToolResult {
    let package = match str_param(args, "package") {
        Some(p) => p.to_string(),
        None => return missing("package"),
    };
    let command = format!(
        "monkey -p {} -c android.intent.category.LAUNCHER 1",
        package
    );
    match run_shell_simple(args, pool, config, &command, "Failed to start app").await {
        r if r.is_error => r,
        _ => ToolResult::text("App started".to_string()),
    }
}

async fn handle_app_stop(args: &Value, pool: &DevicePool, config: &ResolvedConfig) -> ToolResult {
    let package = match str_param(args, "package") {
        Some(p) => p.to_string(),
        None => return missing("package"),
    };
    let command = format!("am force-stop {}", package);
    match run_shell_simple(args, pool, config, &command, "Failed to stop app").await {
        r if r.is_error => r,
        _ => ToolResult::text("App stopped".to_string()),
    }
}

async fn handle_app_clear_data(
    args: &Value,
    pool: &DevicePool,
    config: &ResolvedConfig,
) -> ToolResult {
    let package = match str_param(args, "package") {
        Some(p) => p.to_string(),
        None => return missing("package"),
    };
    let command = format!("pm clear {}", package);
    run_shell_simple(args, pool, config, &command, "Failed to clear data").await
}

async fn handle_app_info(args: &Value, pool: &DevicePool, config: &ResolvedConfig) -> ToolResult {
    let client = match resolve(args, pool).await {
        Ok(c) => c,
        Err(e) => return e,
    };
    let package = match str_param(args, "package") {
        Some(p) => p,
        None => return missing("package"),
    };

    let result = client
        .shell(&format!("dumpsys package {}", package), config.default_timeout_secs)
        .await;
    if !result.success {
        return ToolResult::error(format!("Failed to get app info: {}", result.output));
    }
    ToolResult::text(extract_version_info(&result.output))
}

/// Pull version/SDK lines from `dumpsys package` output; the interesting
/// fields sit in the first ~50 lines. Falls back to a prefix of the dump.
fn extract_version_info(dump: &str) -> String {
    let info: Vec<&str> = dump
        .lines()
        .take(50)
        .filter(|line| {
            line.contains("versionName") || line.contains("versionCode") || line.contains("targetSdk")
        })
        .map(str::trim)
        .collect();
    if info.is_empty() {
        dispatch::truncate_chars(dump, 500)
    } else {
        info.join("\n")
    }
}

async fn handle_app_manifest(
    args: &Value,
    pool: &DevicePool,
    config: &ResolvedConfig,
) -> ToolResult {
    let client = match resolve(args, pool).await {
        Ok(c) => c,
        Err(e) => return e,
    };
    let package = match str_param(args, "package") {
        Some(p) => p,
        None => return missing("package"),
    };

    let path_result = client
        .shell(&format!("pm path {}", package), config.default_timeout_secs)
        .await;
    if !path_result.success || path_result.output.is_empty() {
        return ToolResult::error(format!("Package not found: {}", package));
    }
    // `pm path` may list split APKs; the base APK comes first.
    let apk_path = path_result
        .output
        .lines()
        .next()
        .unwrap_or("")
        .trim_start_matches("package:")
        .trim();

    let result = client
        .shell(&format!("aapt dump badging {}", apk_path), config.default_timeout_secs)
        .await;
    if result.success {
        ToolResult::text(dispatch::truncate_chars(&result.output, 1000))
    } else {
        ToolResult::error(format!("Failed to get manifest: {}", result.output))
    }
}

async fn handle_app_permissions(
    args: &Value,
    pool: &DevicePool,
    config: &ResolvedConfig,
) -> ToolResult {
    let package = match str_param(args, "package") {
        Some(p) => p.to_string(),
        None => return missing("package"),
    };
    let command = format!("dumpsys package {} | grep permission", package);
    run_shell_simple(args, pool, config, &command, "Failed to get permissions").await
}

async fn handle_app_activities(
    args: &Value,
    pool: &DevicePool,
    config: &ResolvedConfig,
) -> ToolResult {
    let client = match resolve(args, pool).await {
        Ok(c) => c,
        Err(e) => return e,
    };
    let package = match str_param(args, "package") {
        Some(p) => p,
        None => return missing("package"),
    };

    let result = client
        .shell(
            &format!("dumpsys package {} | grep Activity", package),
            config.default_timeout_secs,
        )
        .await;
    if result.success {
        ToolResult::text(dispatch::truncate_chars(&result.output, 1000))
    } else {
        ToolResult::error(format!("Failed to get activities: {}", result.output))
    }
}

// --- File tools ---

async fn handle_file_list(args: &Value, pool: &DevicePool, config: &ResolvedConfig) -> ToolResult {
    let path = match str_param(args, "path") {
        Some(p) => p.to_string(),
        None => return missing("path"),
    };
    let command = format!("ls -la {}", path);
    run_shell_simple(args, pool, config, &command, "Failed to list directory").await
}

async fn handle_file_read(args: &Value, pool: &DevicePool, config: &ResolvedConfig) -> ToolResult {
    let client = match resolve(args, pool).await {
        Ok(c) => c,
        Err(e) => return e,
    };
    let path = match str_param(args, "path") {
        Some(p) => p,
        None => return missing("path"),
    };
    let max_size = u64_param(args, "max_size").unwrap_or(102_400);

    // Size guard first — cat on a huge file would flood the transport.
    let size_result = client
        .shell(&format!("stat -c%s {}", path), config.default_timeout_secs)
        .await;
    if size_result.success {
        if let Ok(size) = size_result.output.parse::<u64>() {
            if size > max_size {
                return ToolResult::error(format!(
                    "File too large ({} bytes). Use file_pull for large files.",
                    size
                ));
            }
        }
    }

    let result = client
        .shell(&format!("cat {}", path), config.default_timeout_secs)
        .await;
    if result.success {
        ToolResult::text(result.output)
    } else {
        ToolResult::error(format!("Failed to read file: {}", result.output))
    }
}

/// Escape content for single-quoted device shell interpolation.
fn shell_single_quote(content: &str) -> String {
    content.replace('\'', "'\\''")
}

async fn handle_file_write(args: &Value, pool: &DevicePool, config: &ResolvedConfig) -> ToolResult {
    let path = match str_param(args, "path") {
        Some(p) => p.to_string(),
        None => return missing("path"),
    };
    let content = match str_param(args, "content") {
        Some(c) => c,
        None => return missing("content"),
    };

    let command = format!("echo '{}' > {}", shell_single_quote(content), path);
    match run_shell_simple(args, pool, config, &command, "Failed to write file").await {
        r if r.is_error => r,
        _ => ToolResult::text("File written successfully".to_string()),
    }
}

async fn handle_file_push(args: &Value, pool: &DevicePool, config: &ResolvedConfig) -> ToolResult {
    let client = match resolve(args, pool).await {
        Ok(c) => c,
        Err(e) => return e,
    };
    let local_path = match str_param(args, "local_path") {
        Some(p) => p,
        None => return missing("local_path"),
    };
    let device_path = match str_param(args, "device_path") {
        Some(p) => p,
        None => return missing("device_path"),
    };

    let result = client
        .execute(
            &format!("push {} {}", local_path, device_path),
            config.default_timeout_secs,
        )
        .await;
    if result.success {
        ToolResult::text(result.output)
    } else {
        ToolResult::error(format!("Failed to push file: {}", result.output))
    }
}

async fn handle_file_pull(args: &Value, pool: &DevicePool, config: &ResolvedConfig) -> ToolResult {
    let client = match resolve(args, pool).await {
        Ok(c) => c,
        Err(e) => return e,
    };
    let device_path = match str_param(args, "device_path") {
        Some(p) => p,
        None => return missing("device_path"),
    };

    let mut command = format!("pull {}", device_path);
    if let Some(local) = str_param(args, "local_path") {
        command.push(' ');
        command.push_str(local);
    }

    let result = client.execute(&command, config.default_timeout_secs).await;
    if result.success {
        ToolResult::text(result.output)
    } else {
        ToolResult::error(format!("Failed to pull file: {}", result.output))
    }
}

async fn handle_file_mkdir(args: &Value, pool: &DevicePool, config: &ResolvedConfig) -> ToolResult {
    let path = match str_param(args, "path") {
        Some(p) => p.to_string(),
        None => return missing("path"),
    };
    let command = format!("mkdir -p {}", path);
    match run_shell_simple(args, pool, config, &command, "Failed to create directory").await {
        r if r.is_error => r,
        _ => ToolResult::text("Directory created".to_string()),
    }
}

async fn handle_file_delete(args: &Value, pool: &DevicePool, config: &ResolvedConfig) -> ToolResult {
    let client = match resolve(args, pool).await {
        Ok(c) => c,
        Err(e) => return e,
    };
    let path = match str_param(args, "path") {
        Some(p) => p,
        None => return missing("path"),
    };
    let recursive = bool_param(args, "recursive", false);

    // Deletes under protected partitions are disclosed, not refused.
    let assessment = security::classify_path(path);
    let risk_prefix = if assessment.risk >= security::RiskLevel::High {
        format!("[Risk: {}] {}\n\n", assessment.risk, assessment.reason)
    } else {
        String::new()
    };

    let command = if recursive {
        format!("rm -rf {}", path)
    } else {
        format!("rm {}", path)
    };
    let result = client.shell(&command, config.default_timeout_secs).await;
    if result.success {
        ToolResult::text(format!("{}Deleted successfully", risk_prefix))
    } else {
        ToolResult::error(format!("{}Failed to delete: {}", risk_prefix, result.output))
    }
}

async fn handle_file_exists(
    args: &Value,
    pool: &DevicePool,
    config: &ResolvedConfig,
) -> ToolResult {
    let path = match str_param(args, "path") {
        Some(p) => p.to_string(),
        None => return missing("path"),
    };
    let command = format!("test -e {} && echo exists || echo not_found", path);
    run_shell_simple(args, pool, config, &command, "Error checking file").await
}

async fn handle_file_stat(args: &Value, pool: &DevicePool, config: &ResolvedConfig) -> ToolResult {
    let path = match str_param(args, "path") {
        Some(p) => p.to_string(),
        None => return missing("path"),
    };
    let command = format!("stat {}", path);
    run_shell_simple(args, pool, config, &command, "Failed to get file stats").await
}

// --- Shell tool ---

async fn handle_shell_exec(args: &Value, pool: &DevicePool, config: &ResolvedConfig) -> ToolResult {
    let command = match str_param(args, "command") {
        Some(c) => c,
        None => return missing("command"),
    };
    let timeout_secs = u64_param(args, "timeout_secs").unwrap_or(config.default_timeout_secs);
    let max_lines = u64_param(args, "max_lines").map(|n| n as usize);
    let max_chars = u64_param(args, "max_chars")
        .map(|n| n as usize)
        .unwrap_or(DEFAULT_MAX_CHARS);

    let options = RunOptions::shell(timeout_secs)
        .with_risk()
        .with_limits(max_lines, Some(max_chars));
    let outcome = dispatch::resolve_and_run(pool, device_param(args), command, &options).await;

    if outcome.success {
        ToolResult::text(outcome.text)
    } else {
        ToolResult::error(outcome.text)
    }
}

// --- UI tools ---

async fn handle_ui_screenshot(
    args: &Value,
    pool: &DevicePool,
    config: &ResolvedConfig,
) -> ToolResult {
    let client = match resolve(args, pool).await {
        Ok(c) => c,
        Err(e) => return e,
    };
    let output_path = str_param(args, "output_path").unwrap_or("screenshot.png");
    let device_path = "/sdcard/screenshot.png";

    let capture = client
        .shell(&format!("screencap -p {}", device_path), config.default_timeout_secs)
        .await;
    if !capture.success {
        return ToolResult::error(format!("Failed to capture screenshot: {}", capture.output));
    }

    let pull = client
        .execute(
            &format!("pull {} {}", device_path, output_path),
            config.default_timeout_secs,
        )
        .await;
    if !pull.success {
        return ToolResult::error(format!("Failed to download screenshot: {}", pull.output));
    }

    // Best-effort cleanup of the temp file on the device.
    let _ = client
        .shell(&format!("rm {}", device_path), config.default_timeout_secs)
        .await;
    ToolResult::text(format!("Screenshot saved to {}", output_path))
}

async fn handle_ui_tap(args: &Value, pool: &DevicePool, config: &ResolvedConfig) -> ToolResult {
    let (x, y) = match (u64_param(args, "x"), u64_param(args, "y")) {
        (Some(x), Some(y)) => (x, y),
        _ => return missing("x/y"),
    };
    let command = format!("input tap {} {}", x, y);
    match run_shell_simple(args, pool, config, &command, "Failed to tap").await {
        r if r.is_error => r,
        _ => ToolResult::text(format!("Tapped at ({}, {})", x, y)),
    }
}

async fn handle_ui_swipe(args: &Value, pool: &DevicePool, config: &ResolvedConfig) -> ToolResult {
    let coords = (
        u64_param(args, "start_x"),
        u64_param(args, "start_y"),
        u64_param(args, "end_x"),
        u64_param(args, "end_y"),
    );
    let (x1, y1, x2, y2) = match coords {
        (Some(a), Some(b), Some(c), Some(d)) => (a, b, c, d),
        _ => return missing("start_x/start_y/end_x/end_y"),
    };
    let duration_ms = u64_param(args, "duration_ms").unwrap_or(300);

    let command = format!("input swipe {} {} {} {} {}", x1, y1, x2, y2, duration_ms);
    match run_shell_simple(args, pool, config, &command, "Failed to swipe").await {
        r if r.is_error => r,
        _ => ToolResult::text(format!("Swiped from ({},{}) to ({},{})", x1, y1, x2, y2)),
    }
}

async fn handle_ui_input_text(
    args: &Value,
    pool: &DevicePool,
    config: &ResolvedConfig,
) -> ToolResult {
    let text = match str_param(args, "text") {
        Some(t) => t,
        None => return missing("text"),
    };

    // `input text` does not accept literal spaces; adb's convention is %s.
    let formatted = text.replace(' ', "%s");
    let command = format!("input text '{}'", formatted);
    match run_shell_simple(args, pool, config, &command, "Failed to input text").await {
        r if r.is_error => r,
        _ => ToolResult::text(format!("Input text: {}", text)),
    }
}

async fn handle_ui_press_key(
    args: &Value,
    pool: &DevicePool,
    config: &ResolvedConfig,
) -> ToolResult {
    let keycode = match u64_param(args, "keycode") {
        Some(k) => k,
        None => return missing("keycode"),
    };
    let command = format!("input keyevent {}", keycode);
    match run_shell_simple(args, pool, config, &command, "Failed to press key").await {
        r if r.is_error => r,
        _ => ToolResult::text(format!("Pressed key {}", keycode)),
    }
}

/// Build an `am start` command line from package, optional activity, and
/// optional `key=value,key2=value2` string extras.
fn build_intent_command(package: &str, activity: Option<&str>, extras: Option<&str>) -> String {
    let mut command = String::from("am start");

    if let Some(activity) = activity {
        command.push_str(&format!(" -n {}/{}", package, activity));
    } else {
        command.push(' ');
        command.push_str(package);
    }

    if let Some(extras) = extras {
        for extra in extras.split(',') {
            if let Some((key, value)) = extra.split_once('=') {
                command.push_str(&format!(" --es {} {}", key, value));
            }
        }
    }

    command
}

async fn handle_ui_start_intent(
    args: &Value,
    pool: &DevicePool,
    config: &ResolvedConfig,
) -> ToolResult {
    let package = match str_param(args, "package") {
        Some(p) => p,
        None => return missing("package"),
    };
    let command = build_intent_command(
        package,
        str_param(args, "activity"),
        str_param(args, "extras"),
    );
    run_shell_simple(args, pool, config, &command, "Failed to start intent").await
}

// --- Diagnostic tools ---

async fn handle_log_device(args: &Value, pool: &DevicePool, _config: &ResolvedConfig) -> ToolResult {
    let client = match resolve(args, pool).await {
        Ok(c) => c,
        Err(e) => return e,
    };
    let lines = u64_param(args, "lines").unwrap_or(100);
    let buffer = str_param(args, "buffer").unwrap_or("main");
    let max_chars = u64_param(args, "max_chars")
        .map(|n| n as usize)
        .unwrap_or(DEFAULT_MAX_CHARS);

    let mut command = format!("logcat -b {} -t {}", buffer, lines);
    if let Some(filter) = str_param(args, "filter") {
        command.push(' ');
        command.push_str(filter);
    }

    let result = client.shell(&command, LOGCAT_TIMEOUT_SECS).await;
    if result.success {
        ToolResult::text(dispatch::truncate_chars(&result.output, max_chars))
    } else {
        ToolResult::error(format!("Failed to get logs: {}", result.output))
    }
}

async fn handle_log_app(args: &Value, pool: &DevicePool, config: &ResolvedConfig) -> ToolResult {
    let client = match resolve(args, pool).await {
        Ok(c) => c,
        Err(e) => return e,
    };
    let package = match str_param(args, "package") {
        Some(p) => p,
        None => return missing("package"),
    };
    let lines = u64_param(args, "lines").unwrap_or(100);

    let pid_result = client
        .shell(&format!("pidof {}", package), config.default_timeout_secs)
        .await;
    if !pid_result.success || pid_result.output.is_empty() {
        return ToolResult::error(format!("App not running: {}", package));
    }
    let pid = pid_result.output;

    let result = client
        .shell(&format!("logcat -t {} --pid={}", lines, pid), LOGCAT_TIMEOUT_SECS)
        .await;
    if result.success {
        ToolResult::text(result.output)
    } else {
        ToolResult::error(format!("Failed to get app logs: {}", result.output))
    }
}

async fn handle_log_anr(args: &Value, pool: &DevicePool, config: &ResolvedConfig) -> ToolResult {
    let client = match resolve(args, pool).await {
        Ok(c) => c,
        Err(e) => return e,
    };
    let result = client.shell("ls -la /data/anr/", config.default_timeout_secs).await;
    if !result.success {
        return ToolResult::error(format!("Failed to access ANR directory: {}", result.output));
    }
    if result.output.contains("No such file") || result.output.is_empty() {
        return ToolResult::text("No ANR traces found".to_string());
    }
    ToolResult::text(result.output)
}

async fn handle_log_crash(args: &Value, pool: &DevicePool, config: &ResolvedConfig) -> ToolResult {
    run_shell_simple(
        args,
        pool,
        config,
        "logcat -b crash -t 50",
        "Failed to get crash logs",
    )
    .await
}

async fn handle_battery_stats(
    args: &Value,
    pool: &DevicePool,
    config: &ResolvedConfig,
) -> ToolResult {
    let client = match resolve(args, pool).await {
        Ok(c) => c,
        Err(e) => return e,
    };
    let result = client.shell("dumpsys battery", config.default_timeout_secs).await;
    if !result.success {
        return ToolResult::error(format!("Failed to get battery stats: {}", result.output));
    }
    ToolResult::text(extract_battery_summary(&result.output))
}

/// Keep the informative lines of `dumpsys battery`; the raw dump has a lot
/// of plumbing state the agent never needs.
fn extract_battery_summary(dump: &str) -> String {
    const KEYS: &[&str] = &["level", "status", "health", "temperature", "voltage"];
    let summary: Vec<&str> = dump
        .lines()
        .filter(|line| KEYS.iter().any(|key| line.contains(key)))
        .map(str::trim)
        .collect();
    if summary.is_empty() {
        dump.to_string()
    } else {
        summary.join("\n")
    }
}

async fn handle_bugreport(args: &Value, pool: &DevicePool, _config: &ResolvedConfig) -> ToolResult {
    let client = match resolve(args, pool).await {
        Ok(c) => c,
        Err(e) => return e,
    };
    let output_path = str_param(args, "output_path").unwrap_or("bugreport.zip");
    let timeout_secs = u64_param(args, "timeout_secs").unwrap_or(300);

    let result = client
        .execute(&format!("bugreport {}", output_path), timeout_secs)
        .await;
    if result.success {
        ToolResult::text(format!("Bugreport saved to {}", output_path))
    } else {
        ToolResult::error(format!("Failed to generate bugreport: {}", result.output))
    }
}

async fn handle_heap_dump(args: &Value, pool: &DevicePool, config: &ResolvedConfig) -> ToolResult {
    let client = match resolve(args, pool).await {
        Ok(c) => c,
        Err(e) => return e,
    };
    let package = match str_param(args, "package") {
        Some(p) => p,
        None => return missing("package"),
    };
    let output_path = str_param(args, "output_path").unwrap_or("heap.hprof");
    let device_path = format!("/sdcard/{}", output_path);

    let dump = client
        .shell(
            &format!("am dumpheap {} {}", package, device_path),
            config.default_timeout_secs,
        )
        .await;
    if !dump.success {
        return ToolResult::error(format!("Failed to dump heap: {}", dump.output));
    }

    let pull = client
        .execute(
            &format!("pull {} {}", device_path, output_path),
            config.default_timeout_secs,
        )
        .await;
    if !pull.success {
        return ToolResult::error(format!("Failed to download heap dump: {}", pull.output));
    }

    let _ = client
        .shell(&format!("rm {}", device_path), config.default_timeout_secs)
        .await;
    ToolResult::text(format!("Heap dump saved to {}", output_path))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn definitions_have_unique_names_and_schemas() {
        let tools = tool_definitions();
        assert_eq!(tools.len(), 39);

        let mut names: Vec<&str> = tools
            .iter()
            .map(|t| t["name"].as_str().expect("tool has a name"))
            .collect();
        names.sort_unstable();
        let before = names.len();
        names.dedup();
        assert_eq!(names.len(), before, "duplicate tool name");

        for tool in &tools {
            assert!(tool["inputSchema"]["type"].as_str() == Some("object"));
            assert!(!tool["description"].as_str().unwrap_or("").is_empty());
        }
    }

    #[tokio::test]
    async fn unknown_tool_is_an_error() {
        let pool = DevicePool::new("adb", 5);
        let config = ResolvedConfig {
            adb_path: "adb".into(),
            default_timeout_secs: 5,
        };
        let result = handle_tool_call("no_such_tool", &json!({}), &pool, &config).await;
        assert!(result.is_error);
    }

    #[tokio::test]
    async fn tool_on_empty_pool_reports_device_not_found() {
        let pool = DevicePool::new("adb", 5);
        let config = ResolvedConfig {
            adb_path: "adb".into(),
            default_timeout_secs: 5,
        };
        let result = handle_tool_call("file_list", &json!({ "path": "/sdcard" }), &pool, &config).await;
        assert!(result.is_error);
        let text = result.content[0]["text"].as_str().unwrap();
        assert_eq!(text, "Device not found: default");
    }

    #[tokio::test]
    async fn shell_exec_trusts_the_facade_success_flag() {
        // Device whose output echoes the failure phrase back: still a success.
        let pool = DevicePool::new("echo", 5);
        pool.register("AAA111").await;
        let config = ResolvedConfig {
            adb_path: "echo".into(),
            default_timeout_secs: 5,
        };
        let args = json!({ "command": "cat app.log with Failed to execute: inside" });
        let result = handle_tool_call("shell_exec", &args, &pool, &config).await;
        assert!(!result.is_error);
        let text = result.content[0]["text"].as_str().unwrap();
        assert!(text.contains("Failed to execute: inside"));
    }

    #[test]
    fn device_list_formatting_marks_default() {
        let serials = vec!["AAA111".to_string(), "BBB222".to_string()];
        let out = format_device_list(&serials, Some("AAA111"));
        assert_eq!(out, "Found 2 device(s):\n1. AAA111 (default)\n2. BBB222");
    }

    #[test]
    fn device_list_formatting_empty() {
        assert_eq!(format_device_list(&[], None), "No devices connected");
    }

    #[test]
    fn single_quote_escaping() {
        assert_eq!(shell_single_quote("it's"), "it'\\''s");
        assert_eq!(shell_single_quote("plain"), "plain");
    }

    #[test]
    fn intent_command_with_activity_and_extras() {
        let cmd = build_intent_command(
            "com.example.app",
            Some(".MainActivity"),
            Some("user=alice,mode=debug"),
        );
        assert_eq!(
            cmd,
            "am start -n com.example.app/.MainActivity --es user alice --es mode debug"
        );
    }

    #[test]
    fn intent_command_package_only() {
        assert_eq!(build_intent_command("com.example.app", None, None), "am start com.example.app");
    }

    #[test]
    fn intent_command_ignores_malformed_extras() {
        let cmd = build_intent_command("com.example.app", None, Some("novalue,k=v"));
        assert_eq!(cmd, "am start com.example.app --es k v");
    }

    #[test]
    fn version_info_extraction() {
        let dump = "Packages:\n  Package [com.example]\n    versionCode=42 minSdk=21\n    versionName=1.2.3\n    targetSdk=34\n    other=stuff";
        let info = extract_version_info(dump);
        assert!(info.contains("versionCode=42"));
        assert!(info.contains("versionName=1.2.3"));
        assert!(info.contains("targetSdk=34"));
        assert!(!info.contains("other=stuff"));
    }

    #[test]
    fn battery_summary_extraction() {
        let dump = "Current Battery Service state:\n  AC powered: false\n  level: 87\n  status: 2\n  health: 2\n  temperature: 250\n  voltage: 4123\n  mBlah: 1";
        let summary = extract_battery_summary(dump);
        assert!(summary.contains("level: 87"));
        assert!(summary.contains("temperature: 250"));
        assert!(!summary.contains("AC powered"));
    }
}
