/// Integration tests for configuration loading and saving
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use stationdb_core::config::{default_config, load_config, load_config_or_default, save_config};
use stationdb_core::{FormatType, StationDbError};

#[test]
fn test_download_urls_are_keyed_by_format() {
    let config = default_config();

    for format in [FormatType::LicenseA, FormatType::LicenseB] {
        let url = config.download.urls.get(format.config_key());
        assert!(url.is_some(), "missing default URL for {}", format);
        assert!(url.unwrap().starts_with("https://"));
    }
    assert!(config.download.urls.get(FormatType::GenericTv.config_key()).is_none());
}

#[test]
fn test_config_overrides_from_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");

    let data_dir = dir.path().join("data");
    let content = format!(
        r#"
[storage]
data_dir = "{}"
root_database = "engineering"

[cache]
ttl_secs = 0

[live]
credentials_file = "{}"
"#,
        data_dir.display(),
        dir.path().join("live.toml").display()
    );
    fs::write(&path, content).unwrap();

    let config = load_config(&path).unwrap();
    assert_eq!(config.data_dir(), data_dir);
    assert_eq!(config.storage.root_database, "engineering");
    assert_eq!(config.cache_ttl(), Duration::ZERO);
    assert_eq!(config.live_credentials_path(), dir.path().join("live.toml"));
    assert_eq!(config.lock_lease(), None);
}

#[test]
fn test_saved_config_reloads_identically() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("saved.toml");

    let mut config = default_config();
    config.storage.data_dir = Some("/var/lib/stationdb".to_string());
    config
        .download
        .urls
        .insert("wireless".to_string(), "http://mirror.local/wl.zip".to_string());

    save_config(&path, &config).unwrap();
    let reloaded = load_config_or_default(&path).unwrap();

    assert_eq!(reloaded.data_dir(), PathBuf::from("/var/lib/stationdb"));
    assert_eq!(reloaded.download.urls, config.download.urls);
}

#[test]
fn test_wrong_value_type_is_configuration_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bad.toml");
    fs::write(&path, "[cache]\nttl_secs = \"soon\"\n").unwrap();

    assert!(matches!(
        load_config(&path),
        Err(StationDbError::Configuration(_))
    ));
}
