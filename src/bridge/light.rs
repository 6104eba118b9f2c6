//! Light handle backed by the bridge REST API.

use anyhow::{Context, Result};

use super::client::BridgeClient;
use crate::device::{LightDevice, LightState, StateUpdate};

/// One light on a bridge, addressed by its bridge-assigned id.
#[derive(Debug, Clone)]
pub struct BridgeLight {
    pub id: String,
    pub name: String,
    client: BridgeClient,
    username: String,
}

impl BridgeLight {
    pub fn new(id: String, name: String, client: BridgeClient, username: String) -> Self {
        Self {
            id,
            name,
            client,
            username,
        }
    }

    fn path(&self) -> String {
        format!("/api/{}/lights/{}", self.username, self.id)
    }
}

impl LightDevice for BridgeLight {
    fn name(&self) -> &str {
        &self.name
    }

    fn read_state(&mut self) -> Result<LightState> {
        let value = self
            .client
            .get(&self.path())
            .with_context(|| format!("Failed to read attributes of {}", self.name))?;

        let state = value
            .get("state")
            .cloned()
            .with_context(|| format!("Bridge reply for {} has no state", self.name))?;

        serde_json::from_value(state).with_context(|| format!("Unexpected state for {}", self.name))
    }

    fn write_state(&mut self, update: &StateUpdate) -> Result<()> {
        self.client
            .put(&format!("{}/state", self.path()), update)
            .map(|_| ())
    }
}
