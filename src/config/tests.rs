use super::builder::{find_config_line, preserve_comment_formatting};
use super::loading::{apply_defaults, parse_config};
use super::validation::validate_config;
use super::*;
use serial_test::serial;
use std::fs;
use tempfile::tempdir;

fn with_env_cleared<T>(f: impl FnOnce() -> T) -> T {
    let saved_ip = std::env::var("HUE_IP").ok();
    let saved_user = std::env::var("HUE_USER").ok();
    unsafe {
        std::env::remove_var("HUE_IP");
        std::env::remove_var("HUE_USER");
    }

    let result = f();

    unsafe {
        match saved_ip {
            Some(val) => std::env::set_var("HUE_IP", val),
            None => std::env::remove_var("HUE_IP"),
        }
        match saved_user {
            Some(val) => std::env::set_var("HUE_USER", val),
            None => std::env::remove_var("HUE_USER"),
        }
    }

    result
}

#[test]
#[serial]
fn test_default_config_round_trips_through_loader() {
    let temp_dir = tempdir().unwrap();
    let path = temp_dir.path().join("dreamhouse").join("dreamhouse.toml");

    create_default_config(&path).unwrap();
    assert!(path.exists());

    let config = with_env_cleared(|| load_from_path(&path)).unwrap();
    assert_eq!(config.bridge_ip, None);
    assert_eq!(config.username, None);
    assert_eq!(config.duration, Some(DEFAULT_DURATION_SECS));
    assert_eq!(config.pacing_ms, Some(DEFAULT_PACING_MS));
    assert_eq!(config.seed_hues(), DEFAULT_SEED_HUES.to_vec());
    assert_eq!(config.excluded(), vec!["Dobbin Street".to_string()]);
    assert_eq!(config.drift, Some(DriftMode::Render));
    assert_eq!(
        config.stall_grace(),
        Some(Duration::from_millis(DEFAULT_STALL_GRACE_MS))
    );
}

#[test]
#[serial]
fn test_env_overrides_bridge_credentials() {
    let temp_dir = tempdir().unwrap();
    let path = temp_dir.path().join("dreamhouse.toml");
    fs::write(&path, "bridge_ip = \"10.0.0.2\"\nusername = \"file-user\"\n").unwrap();

    let config = with_env_cleared(|| {
        unsafe {
            std::env::set_var("HUE_IP", "10.0.0.9");
            std::env::set_var("HUE_USER", "env-user");
        }
        load_from_path(&path)
    })
    .unwrap();

    assert_eq!(config.bridge_ip.as_deref(), Some("10.0.0.9"));
    assert_eq!(config.username.as_deref(), Some("env-user"));
}

#[test]
#[serial]
fn test_empty_env_values_are_ignored() {
    let temp_dir = tempdir().unwrap();
    let path = temp_dir.path().join("dreamhouse.toml");
    fs::write(&path, "bridge_ip = \"10.0.0.2\"\n").unwrap();

    let config = with_env_cleared(|| {
        unsafe {
            std::env::set_var("HUE_IP", "");
        }
        load_from_path(&path)
    })
    .unwrap();

    assert_eq!(config.bridge_ip.as_deref(), Some("10.0.0.2"));
}

#[test]
fn test_load_from_missing_path_fails() {
    let temp_dir = tempdir().unwrap();
    let err = load_from_path(&temp_dir.path().join("nope.toml")).unwrap_err();
    assert!(err.to_string().contains("not found"));
}

#[test]
fn test_unknown_keys_are_rejected() {
    assert!(parse_config("night_temp = 3300\n").is_err());
}

#[test]
fn test_drift_mode_parsing() {
    let config = parse_config("drift = \"walk\"\n").unwrap();
    assert_eq!(config.drift, Some(DriftMode::Walk));
    assert!(parse_config("drift = \"sideways\"\n").is_err());
}

#[test]
fn test_validation_accepts_defaults() {
    let mut config = Config::default();
    apply_defaults(&mut config);
    assert!(validate_config(&config).is_ok());
}

#[test]
fn test_validation_duration_bounds() {
    let mut config = Config {
        duration: Some(0),
        ..Default::default()
    };
    let err = validate_config(&config).unwrap_err();
    assert!(err.to_string().contains("duration"));

    config.duration = Some(MAXIMUM_DURATION_SECS);
    assert!(validate_config(&config).is_ok());

    config.duration = Some(MAXIMUM_DURATION_SECS + 1);
    assert!(validate_config(&config).is_err());
}

#[test]
fn test_validation_pacing_floor() {
    let config = Config {
        pacing_ms: Some(MINIMUM_PACING_MS - 1),
        ..Default::default()
    };
    assert!(
        validate_config(&config)
            .unwrap_err()
            .to_string()
            .contains("pacing_ms")
    );
}

#[test]
fn test_validation_seed_hues() {
    let mut config = Config {
        seed_hues: Some(vec![]),
        ..Default::default()
    };
    assert!(validate_config(&config).is_err());

    config.seed_hues = Some(vec![0, HUE_SPACE - 1]);
    assert!(validate_config(&config).is_ok());

    config.seed_hues = Some(vec![20000, HUE_SPACE]);
    let err = validate_config(&config).unwrap_err();
    assert!(err.to_string().contains("65536"));
}

#[test]
fn test_validation_rejects_blank_credentials() {
    let config = Config {
        bridge_ip: Some("  ".to_string()),
        ..Default::default()
    };
    assert!(validate_config(&config).is_err());

    let config = Config {
        username: Some(String::new()),
        ..Default::default()
    };
    assert!(validate_config(&config).is_err());
}

#[test]
fn test_validation_jitter_and_grace_limits() {
    let config = Config {
        jitter_range: Some(MAXIMUM_JITTER_RANGE + 1),
        ..Default::default()
    };
    assert!(validate_config(&config).is_err());

    let config = Config {
        stall_grace_ms: Some(MAXIMUM_STALL_GRACE_MS + 1),
        ..Default::default()
    };
    assert!(validate_config(&config).is_err());

    let config = Config {
        diffuse_interval_ms: Some(0),
        ..Default::default()
    };
    assert!(validate_config(&config).is_err());
}

#[test]
fn test_stall_guard_off_disables_grace() {
    let config = Config {
        stall_guard: Some(false),
        stall_grace_ms: Some(500),
        ..Default::default()
    };
    assert_eq!(config.stall_grace(), None);
}

#[test]
fn test_update_username_activates_commented_template() {
    let temp_dir = tempdir().unwrap();
    let path = temp_dir.path().join("dreamhouse.toml");
    create_default_config(&path).unwrap();

    update_username(&path, "83b7780291a6ceffbe0bd049104df").unwrap();

    let content = fs::read_to_string(&path).unwrap();
    let line = find_config_line(&content, "username").unwrap();
    assert!(line.starts_with("username = \"83b7780291a6ceffbe0bd049104df\""));
    assert!(line.contains("# API username"));

    let config = parse_config(&content).unwrap();
    assert_eq!(config.username.as_deref(), Some("83b7780291a6ceffbe0bd049104df"));
    // The bridge_ip template stays commented out
    assert_eq!(config.bridge_ip, None);
}

#[test]
fn test_update_username_replaces_existing_value() {
    let temp_dir = tempdir().unwrap();
    let path = temp_dir.path().join("dreamhouse.toml");
    fs::write(&path, "username = \"old\"   # keep me\nduration = 5\n").unwrap();

    update_username(&path, "new").unwrap();

    let content = fs::read_to_string(&path).unwrap();
    assert_eq!(content, "username = \"new\"   # keep me\nduration = 5\n");
}

#[test]
fn test_update_username_appends_when_absent() {
    let temp_dir = tempdir().unwrap();
    let path = temp_dir.path().join("dreamhouse.toml");
    fs::write(&path, "duration = 5").unwrap();

    update_username(&path, "abc").unwrap();

    let config = parse_config(&fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(config.username.as_deref(), Some("abc"));
    assert_eq!(config.duration, Some(5));
}

#[test]
fn test_find_config_line_requires_exact_key() {
    let content = "username_hint = 1\nusername = \"x\"\n";
    assert_eq!(
        find_config_line(content, "username").as_deref(),
        Some("username = \"x\"")
    );
}

#[test]
fn test_preserve_comment_formatting_ignores_hash_in_value() {
    let line = "username = \"a#b\"  # note";
    assert_eq!(
        preserve_comment_formatting(line, "username", "\"c\""),
        "username = \"c\"  # note"
    );
}

#[cfg(test)]
mod property_tests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn test_any_in_range_seed_list_validates(hues in proptest::collection::vec(0u32..HUE_SPACE, 1..16)) {
            let config = Config { seed_hues: Some(hues.clone()), ..Default::default() };
            prop_assert!(validate_config(&config).is_ok());
            let converted: Vec<u32> = config.seed_hues().into_iter().map(u32::from).collect();
            prop_assert_eq!(converted, hues);
        }

        #[test]
        fn test_duration_validation_matches_bounds(duration in 0u64..5000) {
            let config = Config { duration: Some(duration), ..Default::default() };
            let in_range = (MINIMUM_DURATION_SECS..=MAXIMUM_DURATION_SECS).contains(&duration);
            prop_assert_eq!(validate_config(&config).is_ok(), in_range);
        }
    }
}
