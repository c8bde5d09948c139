//! Runtime configuration loaded from disk.

use std::io::Write;

use cellar_resource::{Error, RuntimeConfig};
use pretty_assertions::assert_eq;
use tempfile::NamedTempFile;

fn write_config(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file
}

#[test]
fn file_values_override_defaults() {
    let file = write_config(
        r#"
[cache]
warn_on_duplicate = false

[pool]
default_preload = 8
max_inactive = 32
"#,
    );

    let config = RuntimeConfig::from_file(file.path()).unwrap();
    assert!(!config.cache.warn_on_duplicate);
    assert_eq!(config.pool.default_preload, 8);
    assert_eq!(config.pool.max_inactive, Some(32));
    assert!(config.pool.auto_create);
}

#[test]
fn empty_file_is_the_default_configuration() {
    let file = write_config("");
    assert_eq!(
        RuntimeConfig::from_file(file.path()).unwrap(),
        RuntimeConfig::default()
    );
}

#[test]
fn missing_file_is_a_configuration_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = RuntimeConfig::from_file(dir.path().join("cellar.toml")).unwrap_err();
    assert!(matches!(err, Error::Configuration { .. }));
}

#[test]
fn invalid_values_are_rejected() {
    let file = write_config("[pool]\nmax_inactive = 0\n");
    assert!(matches!(
        RuntimeConfig::from_file(file.path()),
        Err(Error::Configuration { .. })
    ));

    let file = write_config("[pool]\npreload = 3\n");
    assert!(matches!(
        RuntimeConfig::from_file(file.path()),
        Err(Error::Configuration { .. })
    ));
}

#[test]
fn rendered_configuration_reads_back() {
    let mut config = RuntimeConfig::default();
    config.pool.default_preload = 2;
    config.pool.max_inactive = Some(16);

    let file = write_config(&config.to_toml_string().unwrap());
    assert_eq!(RuntimeConfig::from_file(file.path()).unwrap(), config);
}
