use std::collections::HashMap;

use super::*;

fn env(pairs: &[(&str, &str)]) -> Option<HashMap<String, String>> {
    Some(
        pairs
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect(),
    )
}

#[test]
fn defaults_apply_without_file_or_env() {
    let dir = tempfile::tempdir().expect("tempdir");
    let settings = load_settings_with_env(
        &dir.path().join(DEFAULT_CONFIG_FILE),
        env(&[]),
        &SettingsOverrides::default(),
    )
    .expect("settings");

    assert_eq!(settings, ClientSettings::default());
    assert_eq!(settings.poll_interval(), Duration::from_secs(2));
}

#[test]
fn file_then_env_then_flags_take_precedence() {
    let dir = tempfile::tempdir().expect("tempdir");
    let file = dir.path().join(DEFAULT_CONFIG_FILE);
    std::fs::write(
        &file,
        "service_url = \"http://validator.internal:9000\"\npoll_interval_ms = 750\noutput_dir = \"exports\"\n",
    )
    .expect("write config");

    let from_file = load_settings_with_env(&file, env(&[]), &SettingsOverrides::default())
        .expect("file settings");
    assert_eq!(from_file.service_url, "http://validator.internal:9000");
    assert_eq!(from_file.poll_interval_ms, 750);
    assert_eq!(from_file.output_dir, PathBuf::from("exports"));

    let from_env = load_settings_with_env(
        &file,
        env(&[("APP__POLL_INTERVAL_MS", "500")]),
        &SettingsOverrides::default(),
    )
    .expect("env settings");
    assert_eq!(from_env.poll_interval_ms, 500);
    assert_eq!(from_env.service_url, "http://validator.internal:9000");

    let from_flags = load_settings_with_env(
        &file,
        env(&[("APP__SERVICE_URL", "http://env.example:8000")]),
        &SettingsOverrides {
            service_url: Some("https://flag.example".to_string()),
            poll_interval_ms: None,
            output_dir: Some(PathBuf::from("/tmp/out")),
        },
    )
    .expect("flag settings");
    assert_eq!(from_flags.service_url, "https://flag.example");
    assert_eq!(from_flags.poll_interval_ms, 750);
    assert_eq!(from_flags.output_dir, PathBuf::from("/tmp/out"));
}

#[test]
fn rejects_unusable_service_url() {
    let dir = tempfile::tempdir().expect("tempdir");
    let err = load_settings_with_env(
        &dir.path().join(DEFAULT_CONFIG_FILE),
        env(&[("APP__SERVICE_URL", "ftp://files.example")]),
        &SettingsOverrides::default(),
    )
    .expect_err("must fail");
    assert!(err.to_string().contains("service_url"), "{err:#}");
}

#[test]
fn rejects_zero_poll_interval() {
    let dir = tempfile::tempdir().expect("tempdir");
    let err = load_settings_with_env(
        &dir.path().join(DEFAULT_CONFIG_FILE),
        env(&[]),
        &SettingsOverrides {
            poll_interval_ms: Some(0),
            ..SettingsOverrides::default()
        },
    )
    .expect_err("must fail");
    assert!(err.to_string().contains("poll_interval_ms"), "{err:#}");
}
