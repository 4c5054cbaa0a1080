use tabviz::config::{AppConfig, ConfigManager, DEFAULT_MAX_FILE_SIZE_MB};
use tabviz::{DatasetService, LoadOptions, MemoryDatastore, NewDataset, StoreError};
use std::fs;
use tempfile::TempDir;

// Helper to create a temporary config directory for testing
fn setup_test_config_dir() -> (TempDir, ConfigManager) {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let config_manager = ConfigManager::with_dir(temp_dir.path().to_path_buf());
    (temp_dir, config_manager)
}

#[test]
fn test_default_config() {
    let config = AppConfig::default();

    assert_eq!(config.version, "0.1");
    assert_eq!(config.file_loading.delimiter, None);
    assert_eq!(config.file_loading.excel_sheet, None);
    assert_eq!(config.file_loading.max_file_size_mb, DEFAULT_MAX_FILE_SIZE_MB);
    assert_eq!(config.query.default_limit, 10);
    assert_eq!(config.query.max_limit, 100);
    assert!(config.chart.palette.is_none());
    assert!(config.store.data_dir.is_none());
    assert_eq!(config.logging.level, "info");
    assert!(!config.logging.json);
    assert!(config.validate().is_ok());
}

#[test]
fn test_generate_default_config() {
    let (_temp_dir, config_manager) = setup_test_config_dir();

    let template = config_manager.generate_default_config().unwrap();

    assert!(template.contains("[file_loading]"));
    assert!(template.contains("[query]"));
    assert!(template.contains("[chart]"));
    assert!(template.contains("[store]"));
    assert!(template.contains("[logging]"));
    assert!(template.contains("# Dataset Store"));

    // Every setting is commented out so defaults apply
    for line in template.lines() {
        let trimmed = line.trim();
        assert!(
            trimmed.is_empty() || trimmed.starts_with('#'),
            "uncommented line: {}",
            line
        );
    }

    // Option fields that serialize to nothing still appear with an example
    assert!(template.contains("# delimiter = 59"));
    assert!(template.contains("# excel_sheet = \"Sales\""));
    assert!(template.contains("# palette = [\"#3B82F6\""));
    assert!(template.contains("# data_dir = \"/var/lib/tabviz/datasets\""));
    assert!(!template.contains("null"));
}

#[test]
fn test_generated_config_parses_to_defaults() {
    let (_temp_dir, config_manager) = setup_test_config_dir();
    let template = config_manager.generate_default_config().unwrap();

    // Uncommenting every setting, examples included, yields a valid config
    let uncommented: String = template
        .lines()
        .filter(|l| l.starts_with("# "))
        .map(|l| &l[2..])
        .filter(|l| l.starts_with('[') || l.contains(" = "))
        .collect::<Vec<_>>()
        .join("\n");
    let parsed: AppConfig = toml::from_str(&uncommented).unwrap();
    assert_eq!(parsed.query.max_limit, 100);
    assert_eq!(parsed.file_loading.max_file_size_mb, 50);
    assert_eq!(parsed.file_loading.delimiter, Some(b';'));
    assert_eq!(parsed.chart.palette.as_ref().map(Vec::len), Some(3));
    assert!(parsed.validate().is_ok());
}

#[test]
fn test_zero_max_file_size_disables_cap() {
    let (_temp_dir, config_manager) = setup_test_config_dir();
    config_manager.ensure_config_dir().unwrap();
    fs::write(
        config_manager.config_path("config.toml"),
        "[file_loading]\nmax_file_size_mb = 0\n",
    )
    .unwrap();

    let config = AppConfig::load_from(&config_manager).unwrap();
    assert_eq!(config.file_loading.max_file_size_mb, 0);
    assert_eq!(config.file_loading.max_file_size_bytes(), None);

    // Just over 1 MB: rejected under a 1 MB cap, accepted with the cap off
    let big = format!("a\n{}", "1\n".repeat(600_000)).into_bytes();

    let mut capped_config = config.clone();
    capped_config.file_loading.max_file_size_mb = 1;
    let mut capped = DatasetService::from_config(MemoryDatastore::new(), &capped_config).unwrap();
    let err = capped
        .upload(NewDataset::new("big", "big.csv", big.clone()))
        .unwrap_err();
    assert!(matches!(
        err.downcast_ref::<StoreError>(),
        Some(StoreError::TooLarge { .. })
    ));

    let mut service = DatasetService::from_config(MemoryDatastore::new(), &config).unwrap();
    assert!(service.upload(NewDataset::new("big", "big.csv", big)).is_ok());
}

#[test]
fn test_write_default_config_requires_force() {
    let (_temp_dir, config_manager) = setup_test_config_dir();

    let path = config_manager.write_default_config(false).unwrap();
    assert!(path.exists());

    let err = config_manager.write_default_config(false).unwrap_err();
    assert!(err.to_string().contains("already exists"));

    assert!(config_manager.write_default_config(true).is_ok());
}

#[test]
fn test_load_from_user_file() {
    let (_temp_dir, config_manager) = setup_test_config_dir();
    config_manager.ensure_config_dir().unwrap();
    fs::write(
        config_manager.config_path("config.toml"),
        r##"
[file_loading]
delimiter = 59
excel_sheet = "Sales"

[query]
default_limit = 25

[chart]
palette = ["#112233", "#445566"]
"##,
    )
    .unwrap();

    let config = AppConfig::load_from(&config_manager).unwrap();
    assert_eq!(config.file_loading.delimiter, Some(b';'));
    assert_eq!(config.query.default_limit, 25);
    assert_eq!(config.query.max_limit, 100);
    assert_eq!(config.logging.level, "info");

    let options = LoadOptions::from(&config.file_loading);
    assert_eq!(options.delimiter, Some(b';'));
    assert_eq!(options.excel_sheet.as_deref(), Some("Sales"));

    let service = DatasetService::from_config(MemoryDatastore::new(), &config).unwrap();
    assert_eq!(service.default_limit(), 25);
}

#[test]
fn test_invalid_user_file_is_reported() {
    let (_temp_dir, config_manager) = setup_test_config_dir();
    config_manager.ensure_config_dir().unwrap();
    fs::write(
        config_manager.config_path("config.toml"),
        "[chart]\npalette = [\"blue\"]\n",
    )
    .unwrap();

    let err = AppConfig::load_from(&config_manager).unwrap_err();
    assert!(err.to_string().starts_with("Invalid configuration in"));
}

#[test]
fn test_merge_keeps_unset_values() {
    let mut base = AppConfig::default();
    base.store.data_dir = Some("/data".to_string());

    let mut other = AppConfig::default();
    other.logging.json = true;
    base.merge(other);

    assert_eq!(base.store.data_dir.as_deref(), Some("/data"));
    assert!(base.logging.json);
}
