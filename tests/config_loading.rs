//! Layered configuration loading, sandboxed with figment::Jail.

use figment::Jail;
use gestaudit::config::{AppConfig, ConfigError};
use std::path::PathBuf;

#[test]
fn toml_file_overrides_defaults() {
    Jail::expect_with(|jail| {
        jail.create_file(
            "gestaudit.toml",
            r#"
[database]
path = "data/audits.db"

[dashboard]
deadline_window_days = 45
"#,
        )?;

        let config = AppConfig::load().expect("config loads");
        assert_eq!(config.database.path, PathBuf::from("data/audits.db"));
        assert_eq!(config.dashboard.deadline_window_days, 45);
        // untouched keys keep their defaults
        assert_eq!(config.dashboard.list_limit, 5);
        assert_eq!(config.server.bind, "127.0.0.1:3000");
        Ok(())
    });
}

#[test]
fn env_beats_toml() {
    Jail::expect_with(|jail| {
        jail.create_file("gestaudit.toml", "[server]\nbind = \"0.0.0.0:8080\"\n")?;
        jail.set_env("GESTAUDIT_SERVER__BIND", "127.0.0.1:9999");
        jail.set_env("GESTAUDIT_DASHBOARD__LIST_LIMIT", "10");

        let config = AppConfig::load().expect("config loads");
        assert_eq!(config.server.bind, "127.0.0.1:9999");
        assert_eq!(config.dashboard.list_limit, 10);
        Ok(())
    });
}

#[test]
fn explicit_file_path() {
    Jail::expect_with(|jail| {
        jail.create_file("custom.toml", "[database]\npath = \"elsewhere.db\"\n")?;

        let config = AppConfig::load_from(&PathBuf::from("custom.toml")).expect("config loads");
        assert_eq!(config.database.path, PathBuf::from("elsewhere.db"));
        Ok(())
    });
}

#[test]
fn invalid_values_are_rejected() {
    Jail::expect_with(|jail| {
        jail.set_env("GESTAUDIT_DASHBOARD__LIST_LIMIT", "0");
        match AppConfig::load() {
            Err(ConfigError::InvalidValue { field, .. }) => assert_eq!(field, "dashboard.list_limit"),
            other => panic!("expected InvalidValue, got {:?}", other),
        }
        Ok(())
    });
}

#[test]
fn malformed_value_is_a_figment_error() {
    Jail::expect_with(|jail| {
        jail.set_env("GESTAUDIT_DASHBOARD__DEADLINE_WINDOW_DAYS", "soon");
        assert!(matches!(AppConfig::load(), Err(ConfigError::Figment(_))));
        Ok(())
    });
}
