//! Bridge controller: discovery, registration and light enumeration.
//!
//! This is the concrete [`LightController`] used by the binary. It covers the
//! bootstrap steps that happen before a sequence can run:
//!
//! 1. **Discovery**: when no `bridge_ip` is configured, an SSDP `M-SEARCH` is
//!    multicast on the local network and the first bridge to answer is used.
//! 2. **Registration**: when no `username` is configured, the bridge is asked
//!    for one in a loop until its link button is pressed.
//! 3. **Enumeration**: `GET /api/<user>/lights` yields one [`BridgeLight`] per
//!    light, ordered by bridge id.

pub mod client;
pub mod light;

use anyhow::{Context, Result};
use serde_json::Value;
use std::net::UdpSocket;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use crate::common::constants::*;
use crate::config::Config;
use crate::device::{LightController, LightDevice, LightState};
pub use client::{BridgeClient, BridgeError};
pub use light::BridgeLight;

/// Summary of one light as listed by the bridge.
#[derive(Debug, Clone, PartialEq)]
pub struct LightInfo {
    pub id: String,
    pub name: String,
    pub state: LightState,
}

/// Connection to one bridge.
#[derive(Debug, Clone)]
pub struct Bridge {
    pub client: BridgeClient,
    pub username: Option<String>,
}

impl Bridge {
    pub fn new(address: impl Into<String>, username: Option<String>, timeout: Duration) -> Self {
        Self {
            client: BridgeClient::new(address, timeout),
            username,
        }
    }

    pub fn address(&self) -> &str {
        &self.client.address
    }

    fn username(&self) -> Result<&str> {
        self.username
            .as_deref()
            .context("No bridge username configured; run 'dreamhouse register' first")
    }

    /// Ask the bridge for a new username until the link button is pressed.
    ///
    /// Every failure is retried after [`REGISTRATION_RETRY_SECS`]; only a
    /// cleared `running` flag ends the loop without a username.
    pub fn register(&mut self, devicetype: &str, running: &AtomicBool) -> Result<String> {
        log_block_start!("Registering with bridge {}", self.address());
        log_indented!("Device type: {devicetype}");

        while running.load(Ordering::SeqCst) {
            match self
                .client
                .post("/api", &serde_json::json!({ "devicetype": devicetype }))
            {
                Ok(value) => {
                    let username = extract_username(&value)?;
                    log_block_start!("Registered with bridge {}", self.address());
                    self.username = Some(username.clone());
                    return Ok(username);
                }
                Err(e) => {
                    match e.downcast_ref::<BridgeError>() {
                        Some(api) if api.is_link_button() => {
                            log_decorated!("Press the link button on the bridge...");
                        }
                        _ => log_warning!("Registration attempt failed: {e:#}"),
                    }
                    sleep_while_running(Duration::from_secs(REGISTRATION_RETRY_SECS), running);
                }
            }
        }

        anyhow::bail!("Registration interrupted before the bridge issued a username")
    }

    /// List all lights known to the bridge, ordered by id.
    pub fn lights(&self) -> Result<Vec<LightInfo>> {
        let username = self.username()?;
        let value = self
            .client
            .get(&format!("/api/{username}/lights"))
            .context("Failed to list lights")?;
        parse_lights(&value)
    }
}

impl LightController for Bridge {
    fn enumerate(&self) -> Result<Vec<Box<dyn LightDevice>>> {
        let username = self.username()?.to_string();
        Ok(self
            .lights()?
            .into_iter()
            .map(|info| {
                Box::new(BridgeLight::new(
                    info.id,
                    info.name,
                    self.client.clone(),
                    username.clone(),
                )) as Box<dyn LightDevice>
            })
            .collect())
    }
}

/// Open a bridge connection from config, discovering the address when unset.
pub fn connect(config: &Config) -> Result<Bridge> {
    let address = match &config.bridge_ip {
        Some(ip) => ip.clone(),
        None => discover_bridge(Duration::from_millis(DISCOVERY_TIMEOUT_MS))?,
    };
    Ok(Bridge::new(
        address,
        config.username.clone(),
        config.request_timeout(),
    ))
}

fn extract_username(value: &Value) -> Result<String> {
    value
        .as_array()
        .and_then(|items| {
            items.iter().find_map(|item| {
                item.pointer("/success/username")
                    .and_then(Value::as_str)
                    .map(str::to_string)
            })
        })
        .context("Bridge accepted registration but returned no username")
}

/// Parse the `/lights` object into id-ordered [`LightInfo`] entries.
pub fn parse_lights(value: &Value) -> Result<Vec<LightInfo>> {
    let map = value
        .as_object()
        .context("Unexpected light listing from bridge")?;

    let mut lights = map
        .iter()
        .map(|(id, entry)| {
            let name = entry
                .get("name")
                .and_then(Value::as_str)
                .unwrap_or(id)
                .to_string();
            let state = serde_json::from_value(entry.get("state").cloned().unwrap_or_default())
                .with_context(|| format!("Unexpected state for light {id}"))?;
            Ok(LightInfo {
                id: id.clone(),
                name,
                state,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    // Ids are decimal strings; order numerically so "10" follows "9"
    lights.sort_by_key(|light| (light.id.parse::<u64>().unwrap_or(u64::MAX), light.id.clone()));
    Ok(lights)
}

/// Find a bridge on the local network via SSDP.
///
/// Returns the IP address of the first responder that identifies itself as a
/// bridge, or an error once `timeout` has passed without one.
pub fn discover_bridge(timeout: Duration) -> Result<String> {
    log_block_start!("Searching for a bridge on the local network...");

    let socket = UdpSocket::bind("0.0.0.0:0").context("Failed to open discovery socket")?;
    let search = format!(
        "M-SEARCH * HTTP/1.1\r\n\
         HOST: {SSDP_MULTICAST_ADDR}\r\n\
         MAN: \"ssdp:discover\"\r\n\
         MX: 2\r\n\
         ST: {SSDP_SEARCH_TARGET}\r\n\r\n"
    );
    socket
        .send_to(search.as_bytes(), SSDP_MULTICAST_ADDR)
        .context("Failed to send discovery request")?;

    let deadline = Instant::now() + timeout;
    let mut buffer = [0; SSDP_BUFFER_SIZE];

    while let Some(remaining) = deadline.checked_duration_since(Instant::now()) {
        if remaining.is_zero() {
            break;
        }
        socket.set_read_timeout(Some(remaining)).ok();

        match socket.recv_from(&mut buffer) {
            Ok((read, source)) => {
                let response = String::from_utf8_lossy(&buffer[..read]);
                if is_bridge_response(&response) {
                    let ip = source.ip().to_string();
                    log_decorated!("Found bridge at {ip}");
                    return Ok(ip);
                }
            }
            Err(e)
                if matches!(
                    e.kind(),
                    std::io::ErrorKind::WouldBlock | std::io::ErrorKind::TimedOut
                ) =>
            {
                break;
            }
            Err(e) => return Err(e).context("Discovery socket failed"),
        }
    }

    anyhow::bail!(
        "No bridge answered within {}s; set bridge_ip in the config or HUE_IP",
        timeout.as_secs()
    )
}

/// SSDP answers from bridges carry a `hue-bridgeid` header or an `IpBridge` server token.
pub fn is_bridge_response(response: &str) -> bool {
    response.lines().any(|line| {
        let line = line.to_ascii_lowercase();
        line.starts_with("hue-bridgeid:") || (line.starts_with("server:") && line.contains("ipbridge"))
    })
}

fn sleep_while_running(duration: Duration, running: &AtomicBool) {
    let deadline = Instant::now() + duration;
    while running.load(Ordering::SeqCst) && Instant::now() < deadline {
        std::thread::sleep(Duration::from_millis(100));
    }
}
