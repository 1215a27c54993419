// tests/settings.rs

mod common;
use crate::common::builders::{SettingsBuilder, execute, group};

use std::error::Error;
use std::io::Write;

use tempfile::{NamedTempFile, tempdir};

use taskpilot::config::{ConfigStore, Settings, load_and_validate, load_or_default};
use taskpilot::errors::TaskpilotError;
use taskpilot::types::DebugLevel;

type TestResult = Result<(), Box<dyn Error>>;

fn settings_file(contents: &str) -> Result<NamedTempFile, Box<dyn Error>> {
    let mut file = NamedTempFile::new()?;
    write!(file, "{contents}")?;
    Ok(file)
}

#[test]
fn values_labels_and_debug_level_are_loaded() -> TestResult {
    let file = settings_file(
        r#"
[session]
debug = "verbose"

[project]
path = "~/code/app"

[limits]
retries = 3

[labels]
"project.path" = "Project directory"
"#,
    )?;

    let settings = load_and_validate(file.path())?;

    assert_eq!(settings.debug_level(), DebugLevel::Verbose);
    assert_eq!(settings.value("project.path").as_deref(), Some("~/code/app"));
    assert_eq!(settings.value("limits.retries").as_deref(), Some("3"));
    assert_eq!(settings.value("project"), None);
    assert_eq!(settings.value("project.missing"), None);
    assert_eq!(
        settings.label("project.path").as_deref(),
        Some("Project directory")
    );
    assert_eq!(settings.label("session.debug").as_deref(), Some("Debug level"));
    assert_eq!(settings.label("unknown.key"), None);
    assert_eq!(settings.path(), Some(file.path()));
    Ok(())
}

#[test]
fn invalid_debug_level_is_a_config_error() -> TestResult {
    let file = settings_file("[session]\ndebug = \"loud\"\n")?;

    match load_and_validate(file.path()) {
        Err(TaskpilotError::ConfigError(msg)) => assert!(msg.contains("loud")),
        Err(e) => panic!("Expected ConfigError, got: {e:?}"),
        Ok(_) => panic!("Expected error, got Ok"),
    }
    Ok(())
}

#[test]
fn non_string_labels_are_rejected() -> TestResult {
    let file = settings_file("[labels]\n\"project.path\" = 1\n")?;
    assert!(matches!(
        load_and_validate(file.path()),
        Err(TaskpilotError::ConfigError(_))
    ));
    Ok(())
}

#[test]
fn malformed_toml_is_a_toml_error() -> TestResult {
    let file = settings_file("[session\n")?;
    assert!(matches!(
        load_and_validate(file.path()),
        Err(TaskpilotError::TomlError(_))
    ));
    Ok(())
}

#[test]
fn persisted_values_and_cached_labels_survive_a_reload() -> TestResult {
    let dir = tempdir()?;
    let path = dir.path().join("nested").join("taskpilot.toml");

    let mut settings = load_or_default(&path)?;
    assert_eq!(settings.value("service.model"), None);

    settings.set_value("service.model", "local-7b")?;
    settings.set_value("deploy.target.region", "eu-west-1")?;
    settings.cache_label("deploy.target.region", "Deployment region");
    settings.persist()?;

    let reloaded = load_and_validate(&path)?;
    assert_eq!(reloaded.value("service.model").as_deref(), Some("local-7b"));
    assert_eq!(
        reloaded.value("deploy.target.region").as_deref(),
        Some("eu-west-1")
    );
    assert_eq!(
        reloaded.label("deploy.target.region").as_deref(),
        Some("Deployment region")
    );

    let text = std::fs::read_to_string(&path)?;
    assert!(!text.contains("\"session.debug\""));
    Ok(())
}

#[test]
fn in_memory_settings_never_touch_disk() -> TestResult {
    let mut settings = Settings::in_memory();
    settings.set_value("project.path", "/tmp/app")?;
    settings.persist()?;
    assert_eq!(settings.path(), None);
    Ok(())
}

#[test]
fn reserved_and_malformed_keys_are_rejected() {
    let mut settings = SettingsBuilder::new()
        .with_value("project.path", "/srv/app")
        .build();

    assert!(settings.set_value("labels.project", "x").is_err());
    assert!(settings.set_value("project..path", "x").is_err());
    assert!(settings.set_value("project.path.inner", "x").is_err());
    assert!(settings.set_value("session.debug", "shouty").is_err());
    assert_eq!(settings.value("project.path").as_deref(), Some("/srv/app"));
}

#[test]
fn setting_debug_level_updates_the_typed_value() {
    let settings = SettingsBuilder::new().with_debug("info").build();
    assert_eq!(settings.debug_level(), DebugLevel::Info);
    assert_eq!(settings.value("session.debug").as_deref(), Some("info"));
}

#[test]
fn missing_keys_are_collected_recursively_without_duplicates() {
    let settings = SettingsBuilder::new()
        .with_value("service.key", "secret")
        .build();

    let tasks = vec![
        execute("deploy").with_config(["project.path", "service.key"]),
        group(
            "Notify",
            vec![
                execute("mail").with_config(["mail.to", "project.path"]),
                group("Inner", vec![execute("page").with_config(["pager.id"])]),
            ],
        ),
    ];

    assert_eq!(
        settings.missing_keys(&tasks),
        vec![
            "project.path".to_string(),
            "mail.to".to_string(),
            "pager.id".to_string()
        ]
    );
}

#[test]
fn schema_keys_are_known() {
    let settings = Settings::in_memory();
    let keys = settings.known_schema_keys();
    assert!(keys.contains("session.debug"));
    assert!(keys.contains("service.model"));
    assert!(keys.contains("service.key"));
    assert!(!keys.contains("project.path"));
}
