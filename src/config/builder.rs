//! Default config generation and in-place config updates.
//!
//! New files are built with [`ConfigBuilder`] so settings and their comments
//! line up. Updates (storing a freshly registered username) edit the existing
//! text line by line so user comments and layout survive.

use anyhow::{Context, Result};
use std::fs;
use std::path::Path;

use crate::common::constants::*;
use crate::common::utils::private_path;

/// Write a commented default `dreamhouse.toml` to `path`.
pub fn create_default_config(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).context("Failed to create config directory")?;
    }

    let seed_hues = DEFAULT_SEED_HUES
        .iter()
        .map(|h| h.to_string())
        .collect::<Vec<_>>()
        .join(", ");
    let excluded = DEFAULT_EXCLUDED_LIGHTS
        .iter()
        .map(|name| format!("\"{name}\""))
        .collect::<Vec<_>>()
        .join(", ");

    let content = ConfigBuilder::new()
        .add_section("Bridge")
        .add_commented_setting(
            "bridge_ip",
            "\"192.168.1.20\"",
            "Bridge address (unset = discover via SSDP)",
        )
        .add_commented_setting(
            "username",
            "\"\"",
            "API username (unset = register on next run)",
        )
        .add_setting(
            "request_timeout_ms",
            &DEFAULT_REQUEST_TIMEOUT_MS.to_string(),
            &format!(
                "HTTP connect/read timeout ({MINIMUM_REQUEST_TIMEOUT_MS}-{MAXIMUM_REQUEST_TIMEOUT_MS})ms"
            ),
        )
        .add_section("Sequence")
        .add_setting(
            "duration",
            &DEFAULT_DURATION_SECS.to_string(),
            &format!("Run length in seconds ({MINIMUM_DURATION_SECS}-{MAXIMUM_DURATION_SECS})"),
        )
        .add_setting(
            "exclude",
            &format!("[{excluded}]"),
            "Lights left out of the sequence",
        )
        .add_setting(
            "pacing_ms",
            &DEFAULT_PACING_MS.to_string(),
            &format!("Pause after each write ({MINIMUM_PACING_MS}-{MAXIMUM_PACING_MS})ms"),
        )
        .add_setting(
            "stagger_ms",
            &DEFAULT_STAGGER_MS.to_string(),
            &format!("Per-light stagger modulus (0-{MAXIMUM_STAGGER_MS})ms"),
        )
        .add_setting(
            "transition_time",
            &DEFAULT_TRANSITION_TIME.to_string(),
            &format!("Transition hint per write (0-{MAXIMUM_TRANSITION_TIME}) x 100ms"),
        )
        .add_section("Hue pool")
        .add_setting(
            "seed_hues",
            &format!("[{seed_hues}]"),
            "Starting pool values (0-65535)",
        )
        .add_setting(
            "jitter_range",
            &DEFAULT_JITTER_RANGE.to_string(),
            &format!("Jitter span per draw (0-{MAXIMUM_JITTER_RANGE})"),
        )
        .add_setting(
            "drift",
            "\"render\"",
            "\"render\" = pool keeps drawn values, \"walk\" = pool keeps jittered values",
        )
        .add_setting(
            "diffuse_interval_ms",
            &DEFAULT_DIFFUSE_INTERVAL_MS.to_string(),
            &format!(
                "Diffuser pause between attempts ({MINIMUM_DIFFUSE_INTERVAL_MS}-{MAXIMUM_DIFFUSE_INTERVAL_MS})ms"
            ),
        )
        .add_section("Stall guard")
        .add_setting(
            "stall_guard",
            &DEFAULT_STALL_GUARD.to_string(),
            "Let round waits give up after the deadline if a light drops out",
        )
        .add_setting(
            "stall_grace_ms",
            &DEFAULT_STALL_GRACE_MS.to_string(),
            &format!("Grace period past the deadline (0-{MAXIMUM_STALL_GRACE_MS})ms"),
        )
        .build();

    fs::write(path, format!("{content}\n"))
        .with_context(|| format!("Failed to write default config to {}", private_path(path)))
}

/// Store `username` in the config file at `path`, keeping its layout.
///
/// An active `username = ...` line is rewritten in place; otherwise a
/// commented-out template line is activated; otherwise the key is appended.
pub fn update_username(path: &Path, username: &str) -> Result<()> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config from {}", private_path(path)))?;

    let value = format!("\"{username}\"");
    let updated = if let Some(line) = find_config_line(&content, "username") {
        content.replacen(&line, &preserve_comment_formatting(&line, "username", &value), 1)
    } else if let Some(line) = find_commented_line(&content, "username") {
        let active = line.trim_start().trim_start_matches('#').trim_start().to_string();
        content.replacen(&line, &preserve_comment_formatting(&active, "username", &value), 1)
    } else {
        let separator = if content.ends_with('\n') || content.is_empty() { "" } else { "\n" };
        format!("{content}{separator}username = {value}\n")
    };

    fs::write(path, updated)
        .with_context(|| format!("Failed to write updated config to {}", private_path(path)))?;

    log_decorated!("Saved username to {}", private_path(path));
    Ok(())
}

/// Find an active (uncommented) config line for `key`.
pub(crate) fn find_config_line(content: &str, key: &str) -> Option<String> {
    content
        .lines()
        .find(|line| {
            let trimmed = line.trim();
            !trimmed.starts_with('#')
                && trimmed
                    .split('=')
                    .next()
                    .is_some_and(|lhs| lhs.trim() == key)
        })
        .map(str::to_string)
}

/// Find a commented-out template line such as `# username = ""`.
fn find_commented_line(content: &str, key: &str) -> Option<String> {
    content
        .lines()
        .find(|line| {
            let trimmed = line.trim_start();
            trimmed.starts_with('#')
                && !trimmed.starts_with("#[")
                && trimmed
                    .trim_start_matches('#')
                    .split('=')
                    .next()
                    .is_some_and(|lhs| lhs.trim() == key)
        })
        .map(str::to_string)
}

/// Rewrite `key = value` while keeping the spacing and text of a trailing comment.
pub(crate) fn preserve_comment_formatting(original_line: &str, key: &str, new_value: &str) -> String {
    let key_value_part = format!("{key} = {new_value}");

    // Skip the value part so a '#' inside a quoted value isn't taken as a comment
    let value_start = original_line.find('=').map_or(0, |pos| pos + 1);
    let comment_pos = find_comment_start(&original_line[value_start..]).map(|pos| pos + value_start);

    if let Some(comment_pos) = comment_pos {
        let comment_part = &original_line[comment_pos..];
        let before_comment = &original_line[..comment_pos];
        let original_spacing = before_comment
            .rfind(|c: char| !c.is_whitespace())
            .map_or(" ", |last| &before_comment[last + 1..]);
        let spacing = if original_spacing.is_empty() { " " } else { original_spacing };

        format!("{key_value_part}{spacing}{comment_part}")
    } else {
        key_value_part
    }
}

fn find_comment_start(value_part: &str) -> Option<usize> {
    let mut in_string = false;
    for (idx, ch) in value_part.char_indices() {
        match ch {
            '"' => in_string = !in_string,
            '#' if !in_string => return Some(idx),
            _ => {}
        }
    }
    None
}

/// Builds a sectioned TOML file with aligned trailing comments.
struct ConfigBuilder {
    entries: Vec<ConfigEntry>,
}

enum ConfigEntry {
    Section(String),
    Setting { line: String, comment: String },
}

impl ConfigBuilder {
    fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    fn add_section(mut self, title: &str) -> Self {
        self.entries.push(ConfigEntry::Section(format!("#[{title}]")));
        self
    }

    fn add_setting(mut self, key: &str, value: &str, comment: &str) -> Self {
        self.entries.push(ConfigEntry::Setting {
            line: format!("{key} = {value}"),
            comment: format!("# {comment}"),
        });
        self
    }

    /// A setting that is present as a template but left disabled.
    fn add_commented_setting(mut self, key: &str, value: &str, comment: &str) -> Self {
        self.entries.push(ConfigEntry::Setting {
            line: format!("# {key} = {value}"),
            comment: format!("# {comment}"),
        });
        self
    }

    fn build(self) -> String {
        let max_width = self
            .entries
            .iter()
            .filter_map(|entry| match entry {
                ConfigEntry::Setting { line, .. } => Some(line.len()),
                ConfigEntry::Section(_) => None,
            })
            .max()
            .unwrap_or(0)
            + 1;

        let mut result = Vec::new();
        for entry in self.entries {
            match entry {
                ConfigEntry::Section(title) => {
                    if !result.is_empty() {
                        result.push(String::new());
                    }
                    result.push(title);
                }
                ConfigEntry::Setting { line, comment } => {
                    let padding = " ".repeat(max_width - line.len());
                    result.push(format!("{line}{padding}{comment}"));
                }
            }
        }

        result.join("\n")
    }
}
