//! HTTP/JSON client for the bridge REST API.
//!
//! The bridge speaks plain HTTP on the local network. Requests go through one
//! [`ureq::Agent`] per client, configured with the connect and read timeouts
//! from `request_timeout_ms`. Clones share the agent, so every device worker
//! can hold its own handle.
//!
//! ## Error Handling
//!
//! Two failure layers exist:
//! - **Transport**: unreachable bridge, timeouts, non-2xx status, malformed bodies.
//! - **API**: the bridge answers `200 OK` with a JSON array of
//!   `{"error": {"type", "address", "description"}}` objects. These are turned
//!   into a typed [`BridgeError`] so callers can react to specific types (the
//!   registration loop waits on type 101, "link button not pressed").

use anyhow::{Context, Result};
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;

use crate::common::constants::*;

/// Error object reported by the bridge API.
#[derive(Debug, Clone, PartialEq)]
pub struct BridgeError {
    pub kind: u32,
    pub address: String,
    pub description: String,
}

impl std::fmt::Display for BridgeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "bridge error {} at {}: {}",
            self.kind, self.address, self.description
        )
    }
}

impl std::error::Error for BridgeError {}

impl BridgeError {
    pub fn is_link_button(&self) -> bool {
        self.kind == LINK_BUTTON_ERROR_TYPE
    }
}

/// HTTP client bound to one bridge address.
#[derive(Clone)]
pub struct BridgeClient {
    /// `host` or `host:port`; port 80 is assumed when absent.
    pub address: String,
    pub timeout: Duration,
    agent: ureq::Agent,
}

impl std::fmt::Debug for BridgeClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BridgeClient")
            .field("address", &self.address)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl BridgeClient {
    pub fn new(address: impl Into<String>, timeout: Duration) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout_connect(timeout)
            .timeout_read(timeout)
            .timeout_write(timeout)
            .build();

        Self {
            address: address.into(),
            timeout,
            agent,
        }
    }

    pub fn get(&self, path: &str) -> Result<Value> {
        let response = self.agent.get(&self.url(path)).call();
        self.finish("GET", path, response)
    }

    pub fn put<T: Serialize>(&self, path: &str, body: &T) -> Result<Value> {
        let response = self.agent.put(&self.url(path)).send_json(body);
        self.finish("PUT", path, response)
    }

    pub fn post<T: Serialize>(&self, path: &str, body: &T) -> Result<Value> {
        let response = self.agent.post(&self.url(path)).send_json(body);
        self.finish("POST", path, response)
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}{path}", self.address)
    }

    fn finish(
        &self,
        method: &str,
        path: &str,
        response: std::result::Result<ureq::Response, ureq::Error>,
    ) -> Result<Value> {
        let response = match response {
            Ok(response) => response,
            Err(ureq::Error::Status(code, _)) => {
                anyhow::bail!("Bridge answered HTTP {code} to {method} {path}")
            }
            Err(e) => {
                return Err(e).with_context(|| {
                    format!("Failed to reach bridge at {} ({method} {path})", self.address)
                });
            }
        };

        let value: Value = response
            .into_json()
            .with_context(|| format!("Bridge returned invalid JSON for {method} {path}"))?;
        check_api_errors(&value)?;
        Ok(value)
    }
}

/// Turn the first API error object in a response into a [`BridgeError`].
pub fn check_api_errors(value: &Value) -> std::result::Result<(), BridgeError> {
    let Some(items) = value.as_array() else {
        return Ok(());
    };

    for item in items {
        if let Some(error) = item.get("error") {
            return Err(BridgeError {
                kind: error.get("type").and_then(Value::as_u64).unwrap_or(0) as u32,
                address: error
                    .get("address")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string(),
                description: error
                    .get("description")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string(),
            });
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{BufRead, BufReader, Read, Write};
    use std::net::TcpListener;
    use std::thread::JoinHandle;

    /// Answer a single request with `status` and `body`; yields the request line and body.
    fn fake_bridge(status: &'static str, body: &'static str) -> (String, JoinHandle<(String, String)>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let address = listener.local_addr().unwrap().to_string();

        let server = std::thread::spawn(move || {
            let (stream, _) = listener.accept().unwrap();
            let mut reader = BufReader::new(stream);

            let mut request_line = String::new();
            reader.read_line(&mut request_line).unwrap();
            let mut content_length = 0;
            loop {
                let mut header = String::new();
                reader.read_line(&mut header).unwrap();
                if header == "\r\n" || header.is_empty() {
                    break;
                }
                if let Some(value) = header.to_ascii_lowercase().strip_prefix("content-length:") {
                    content_length = value.trim().parse().unwrap();
                }
            }
            let mut request_body = vec![0; content_length];
            reader.read_exact(&mut request_body).unwrap();

            let response = format!(
                "HTTP/1.1 {status}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                body.len()
            );
            reader.get_mut().write_all(response.as_bytes()).unwrap();

            (
                request_line.trim_end().to_string(),
                String::from_utf8(request_body).unwrap(),
            )
        });

        (address, server)
    }

    #[test]
    fn test_url_joins_address_and_path() {
        let client = BridgeClient::new("192.168.1.20", Duration::from_secs(1));
        assert_eq!(client.url("/api/user/lights"), "http://192.168.1.20/api/user/lights");
    }

    #[test]
    fn test_put_sends_json_and_returns_reply() {
        let (address, server) = fake_bridge("200 OK", r#"[{"success":{"/lights/3/state/hue":20000}}]"#);

        let client = BridgeClient::new(address, Duration::from_secs(2));
        let value = client
            .put("/api/user/lights/3/state", &serde_json::json!({"hue": 20000}))
            .unwrap();
        assert!(value[0]["success"].is_object());

        let (request_line, body) = server.join().unwrap();
        assert_eq!(request_line, "PUT /api/user/lights/3/state HTTP/1.1");
        assert_eq!(body, r#"{"hue":20000}"#);
    }

    #[test]
    fn test_api_error_in_ok_reply_is_typed() {
        let (address, server) = fake_bridge(
            "200 OK",
            r#"[{"error":{"type":101,"address":"","description":"link button not pressed"}}]"#,
        );

        let client = BridgeClient::new(address, Duration::from_secs(2));
        let err = client
            .post("/api", &serde_json::json!({"devicetype": "dreamhouse#test"}))
            .unwrap_err();
        server.join().unwrap();

        let api = err.downcast_ref::<BridgeError>().unwrap();
        assert!(api.is_link_button());
    }

    #[test]
    fn test_http_error_status_is_reported() {
        let (address, server) = fake_bridge("503 Service Unavailable", "{}");

        let client = BridgeClient::new(address, Duration::from_secs(2));
        let err = client.get("/api/user/lights").unwrap_err();
        server.join().unwrap();

        assert_eq!(err.to_string(), "Bridge answered HTTP 503 to GET /api/user/lights");
    }

    #[test]
    fn test_invalid_json_is_reported() {
        let (address, server) = fake_bridge("200 OK", "<html>");

        let client = BridgeClient::new(address, Duration::from_secs(2));
        let err = client.get("/api/user/lights").unwrap_err();
        server.join().unwrap();

        assert!(err.to_string().contains("invalid JSON"));
    }

    #[test]
    fn test_unreachable_bridge_names_the_address() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let address = listener.local_addr().unwrap().to_string();
        drop(listener);

        let client = BridgeClient::new(address.clone(), Duration::from_millis(500));
        let err = client.get("/api").unwrap_err();
        assert!(err.to_string().contains(&address));
    }

    #[test]
    fn test_check_api_errors_extracts_first_error() {
        let value = serde_json::json!([
            {"success": {"/lights/1/state/on": true}},
            {"error": {"type": 201, "address": "/lights/1/state/hue", "description": "parameter, hue, is not modifiable. Device is set to off."}}
        ]);

        let err = check_api_errors(&value).unwrap_err();
        assert_eq!(err.kind, 201);
        assert_eq!(err.address, "/lights/1/state/hue");
        assert!(!err.is_link_button());
    }

    #[test]
    fn test_check_api_errors_accepts_objects() {
        assert!(check_api_errors(&serde_json::json!({"1": {"name": "Kitchen"}})).is_ok());
    }
}
