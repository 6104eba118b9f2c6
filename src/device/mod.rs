//! Device capability layer.
//!
//! The sequence core never talks to a bridge directly. It only needs to read a
//! light's current state once, write new states repeatedly, and list the lights
//! that exist. [`LightDevice`] and [`LightController`] capture exactly that, so
//! the core can be driven by the HTTP bridge client in `crate::bridge` or by
//! in-memory devices in tests.
//!
//! ## State types
//!
//! - [`LightState`] is what a device reports. Captured once per worker and turned
//!   into the restore write with [`LightState::to_restore_update`].
//! - [`RenderState`] is one animation frame: a hue at full saturation and
//!   brightness with the light switched on.
//! - [`StateUpdate`] is the partial write body; unset fields are left alone by
//!   the device.

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::common::constants::*;

/// State reported by a light.
///
/// Attributes a light does not support are absent (a white-only bulb has no
/// `hue`, an on/off plug has no `bri`).
#[derive(Debug, Clone, PartialEq, Default, Deserialize, Serialize)]
pub struct LightState {
    pub on: bool,
    #[serde(default)]
    pub bri: Option<u8>,
    #[serde(default)]
    pub hue: Option<u16>,
    #[serde(default)]
    pub sat: Option<u8>,
    #[serde(default)]
    pub ct: Option<u16>,
    #[serde(default)]
    pub xy: Option<[f32; 2]>,
    #[serde(default)]
    pub alert: Option<String>,
    #[serde(default)]
    pub effect: Option<String>,
}

impl LightState {
    /// Snapshot of every attribute as a write that puts the light back.
    ///
    /// A light that was off only gets `on: false`; the bridge rejects color
    /// attributes for a light that is being switched off.
    pub fn to_restore_update(&self) -> StateUpdate {
        if !self.on {
            return StateUpdate {
                on: Some(false),
                transitiontime: Some(RESTORE_TRANSITION_TIME),
                ..Default::default()
            };
        }

        StateUpdate {
            on: Some(self.on),
            bri: self.bri,
            hue: self.hue,
            sat: self.sat,
            ct: self.ct,
            xy: self.xy,
            alert: self.alert.clone(),
            effect: self.effect.clone(),
            transitiontime: Some(RESTORE_TRANSITION_TIME),
        }
    }
}

/// Partial state write. Only `Some` fields are serialized.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct StateUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub on: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bri: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hue: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sat: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ct: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub xy: Option<[f32; 2]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alert: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub effect: Option<String>,
    /// Transition hint in units of 100 ms.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transitiontime: Option<u16>,
}

/// One animation frame for a single light.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderState {
    pub hue: u16,
    pub saturation: u8,
    pub brightness: u8,
    pub transition_time: u16,
    pub on: bool,
}

impl RenderState {
    /// Frame showing `hue` at full saturation and brightness.
    pub fn new(hue: u16, transition_time: u16) -> Self {
        Self {
            hue,
            saturation: MAX_SATURATION,
            brightness: MAX_BRIGHTNESS,
            transition_time,
            on: true,
        }
    }
}

impl From<RenderState> for StateUpdate {
    fn from(render: RenderState) -> Self {
        StateUpdate {
            on: Some(render.on),
            bri: Some(render.brightness),
            hue: Some(render.hue),
            sat: Some(render.saturation),
            transitiontime: Some(render.transition_time),
            ..Default::default()
        }
    }
}

/// A single controllable light.
///
/// Each handle is owned by exactly one device worker for the whole run, hence
/// `Send` but no `Sync` requirement.
#[cfg_attr(test, mockall::automock)]
pub trait LightDevice: Send {
    /// Human-readable name, also used for exclusion filtering.
    fn name(&self) -> &str;

    /// Read the light's current state.
    fn read_state(&mut self) -> Result<LightState>;

    /// Write a (partial) state to the light.
    fn write_state(&mut self, update: &StateUpdate) -> Result<()>;
}

/// Source of light handles.
pub trait LightController {
    /// List every light the controller knows about.
    fn enumerate(&self) -> Result<Vec<Box<dyn LightDevice>>>;
}
