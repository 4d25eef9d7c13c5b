use super::settings::Settings;
use super::{AuthBackend, load_config};
use serial_test::serial;
use std::env;
use std::fs;
use tempfile::TempDir;

#[test]
fn test_default_settings() {
    let settings = Settings::default();
    assert_eq!(settings.server.host, "127.0.0.1");
    assert_eq!(settings.server.port, 8080);
    assert_eq!(settings.server.auth_timeout_secs, 10);
    assert_eq!(settings.broker.max_connections, 1000);
    assert_eq!(settings.broker.delivery_timeout_ms, 5000);
    assert_eq!(settings.broker.outbound_buffer, 64);
    assert_eq!(settings.auth.backend, AuthBackend::Jwt);
    assert_eq!(settings.logging.level, "info");
}

// Runs `f` with a fresh temporary directory as the working directory.
fn in_temp_dir<F: FnOnce(&TempDir)>(f: F) {
    let tmp = TempDir::new().expect("create tempdir");
    let orig = env::current_dir().expect("current_dir");
    env::set_current_dir(tmp.path()).expect("set current dir");
    f(&tmp);
    env::set_current_dir(orig).expect("restore cwd");
}

#[test]
#[serial]
fn test_load_config_without_sources_uses_defaults() {
    in_temp_dir(|_| {
        let cfg = load_config().expect("load_config failed");
        assert_eq!(cfg.server.port, 8080);
        assert_eq!(cfg.auth.jwt_secret, "secret");
    });
}

#[test]
#[serial]
fn test_load_config_from_file_overrides_defaults() {
    in_temp_dir(|_| {
        fs::create_dir_all("config").expect("create config dir");
        let toml = r#"
            [server]
            host = "0.0.0.0"
            port = 9000

            [broker]
            delivery_timeout_ms = 250

            [auth]
            backend = "access_keys"
            access_key_db = "/var/lib/roomcast/keys"
        "#;
        fs::write("config/default.toml", toml).expect("write config file");

        let cfg = load_config().expect("load_config failed");
        assert_eq!(cfg.server.host, "0.0.0.0");
        assert_eq!(cfg.server.port, 9000);
        assert_eq!(cfg.server.auth_timeout_secs, 10);
        assert_eq!(cfg.broker.delivery_timeout_ms, 250);
        assert_eq!(cfg.broker.max_connections, 1000);
        assert_eq!(cfg.auth.backend, AuthBackend::AccessKeys);
        assert_eq!(cfg.auth.access_key_db, "/var/lib/roomcast/keys");
    });
}

#[test]
#[serial]
fn test_environment_overrides_file() {
    in_temp_dir(|_| {
        fs::create_dir_all("config").expect("create config dir");
        fs::write("config/default.toml", "[server]\nport = 9000\n").expect("write config file");

        temp_env::with_vars(
            [
                ("ROOMCAST_SERVER__PORT", Some("9100")),
                ("ROOMCAST_AUTH__JWT_SECRET", Some("env_secret")),
                ("ROOMCAST_LOGGING__LEVEL", Some("debug")),
            ],
            || {
                let cfg = load_config().expect("load_config failed");
                assert_eq!(cfg.server.port, 9100);
                assert_eq!(cfg.auth.jwt_secret, "env_secret");
                assert_eq!(cfg.logging.level, "debug");
            },
        );
    });
}
