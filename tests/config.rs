use taskbridge::config::Config;

#[test]
fn test_default_config() {
    let config = Config::default();
    assert_eq!(config.sync.default_reminder_seconds, None);
    assert!(!config.sync.suppress_summary);
    assert!(!config.sync.background_mode);
    assert!(!config.logging.enabled);
}

#[test]
fn test_config_validation() {
    let mut config = Config::default();

    // Valid config should pass
    assert!(config.validate().is_ok());

    // Zero reminder interval should fail
    config.sync.default_reminder_seconds = Some(0);
    assert!(config.validate().is_err());

    // Absurdly large reminder interval should fail
    config.sync.default_reminder_seconds = Some(2 * 365 * 24 * 3600);
    assert!(config.validate().is_err());

    // One day is fine
    config.sync.default_reminder_seconds = Some(86_400);
    assert!(config.validate().is_ok());
}

#[test]
fn test_config_serialization() {
    let mut config = Config::default();
    config.sync.suppress_summary = true;
    let toml_str = toml::to_string_pretty(&config).unwrap();
    assert!(toml_str.contains("suppress_summary = true"));
    assert!(toml_str.contains("background_mode = false"));
}

#[test]
fn test_partial_config_deserialization() {
    // Partial TOML configs merge with defaults
    let partial_toml = r#"
[sync]
default_reminder_seconds = 3600

[logging]
enabled = true
"#;

    let config: Config = toml::from_str(partial_toml).unwrap();

    assert_eq!(config.sync.default_reminder_seconds, Some(3600));
    assert!(config.logging.enabled);

    // unspecified values use defaults
    assert!(!config.sync.suppress_summary);
    assert!(!config.sync.background_mode);
}

#[test]
fn test_load_from_file_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");

    Config::generate_default_config(&path).unwrap();
    let config = Config::load_from_file(&path).unwrap();

    assert_eq!(config.sync.default_reminder_seconds, None);
    assert!(!config.sync.background_mode);
}

#[test]
fn test_invalid_file_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(&path, "[sync]\ndefault_reminder_seconds = 0\n").unwrap();

    assert!(Config::load_from_file(&path).is_err());
}
