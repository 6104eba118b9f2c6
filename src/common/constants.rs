//! Application-wide constants and defaults.
//!
//! Defaults are the values written into a freshly generated `dreamhouse.toml`
//! and used for any key the file leaves out. The `MINIMUM_*`/`MAXIMUM_*` pairs
//! are the hard limits enforced by config validation.

// # Hue space

/// Number of positions on the hue wheel; valid hues are `0..HUE_SPACE`.
pub const HUE_SPACE: u32 = 65536;

/// Saturation and brightness written on every render.
pub const MAX_SATURATION: u8 = 254;
pub const MAX_BRIGHTNESS: u8 = 254;

/// Transition hint attached to restore writes (units of 100 ms).
pub const RESTORE_TRANSITION_TIME: u16 = 1;

// # Run defaults

pub const DEFAULT_DURATION_SECS: u64 = 10;
pub const DEFAULT_PACING_MS: u64 = 200;
pub const DEFAULT_STAGGER_MS: u64 = 10;
pub const DEFAULT_JITTER_RANGE: u32 = 500;
pub const DEFAULT_SEED_HUES: [u16; 4] = [20000, 20100, 20300, 0];
pub const DEFAULT_DIFFUSE_INTERVAL_MS: u64 = 1;
pub const DEFAULT_TRANSITION_TIME: u16 = 1;
pub const DEFAULT_STALL_GUARD: bool = true;
pub const DEFAULT_STALL_GRACE_MS: u64 = 2000;
pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 2000;
pub const DEFAULT_EXCLUDED_LIGHTS: [&str; 1] = ["Dobbin Street"];

// # Validation limits

pub const MINIMUM_DURATION_SECS: u64 = 1;
pub const MAXIMUM_DURATION_SECS: u64 = 3600;
pub const MINIMUM_PACING_MS: u64 = 10;
pub const MAXIMUM_PACING_MS: u64 = 10_000;
pub const MAXIMUM_STAGGER_MS: u64 = 1000;
pub const MAXIMUM_JITTER_RANGE: u32 = HUE_SPACE;
pub const MINIMUM_DIFFUSE_INTERVAL_MS: u64 = 1;
pub const MAXIMUM_DIFFUSE_INTERVAL_MS: u64 = 1000;
pub const MAXIMUM_TRANSITION_TIME: u16 = 100;
pub const MAXIMUM_STALL_GRACE_MS: u64 = 60_000;
pub const MINIMUM_REQUEST_TIMEOUT_MS: u64 = 100;
pub const MAXIMUM_REQUEST_TIMEOUT_MS: u64 = 30_000;

// # Bridge protocol

pub const SSDP_MULTICAST_ADDR: &str = "239.255.255.250:1900";
pub const SSDP_SEARCH_TARGET: &str = "urn:schemas-upnp-org:device:basic:1";
pub const DISCOVERY_TIMEOUT_MS: u64 = 3000;
pub const REGISTRATION_RETRY_SECS: u64 = 5;
pub const SSDP_BUFFER_SIZE: usize = 4096;

/// Hue API error type returned while the bridge link button has not been pressed.
pub const LINK_BUTTON_ERROR_TYPE: u32 = 101;

// # Barrier

/// Slice length for barrier waits so shutdown requests are noticed promptly.
pub const BARRIER_POLL_MS: u64 = 50;

// # Exit codes

pub const EXIT_FAILURE: i32 = 1;
