//! Small helpers shared across modules.

use std::path::Path;
use std::time::Duration;

/// Render a path for display with the home directory replaced by `~`.
pub fn private_path(path: &Path) -> String {
    if let Some(home) = dirs::home_dir()
        && let Ok(stripped) = path.strip_prefix(&home)
    {
        return format!("~/{}", stripped.display());
    }
    path.display().to_string()
}

/// Format a duration in whole milliseconds for log lines.
pub fn format_ms(duration: Duration) -> String {
    format!("{}ms", duration.as_millis())
}

/// Device type string sent when registering with a bridge (`app#host`).
pub fn device_type() -> String {
    let host = std::env::var("HOSTNAME")
        .ok()
        .filter(|h| !h.is_empty())
        .or_else(|| {
            std::fs::read_to_string("/etc/hostname")
                .ok()
                .map(|h| h.trim().to_string())
                .filter(|h| !h.is_empty())
        })
        .unwrap_or_else(|| "unknown".to_string());

    // The bridge rejects devicetype values longer than 40 characters
    let mut devicetype = format!("{}#{host}", env!("CARGO_PKG_NAME"));
    if devicetype.len() > 40 {
        let mut end = 40;
        while !devicetype.is_char_boundary(end) {
            end -= 1;
        }
        devicetype.truncate(end);
    }
    devicetype
}
