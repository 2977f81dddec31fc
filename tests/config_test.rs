use dbserver::{AppConfig, ConnectionRegistry, Error};
use std::io::Write;
use tempfile::NamedTempFile;

const CONFIG: &str = r#"
[server]
port = 18888

[dbserver]
enabled = true
conn_check_interval = 0

[[dbserver.databases]]
name = "local"
driver = "sqlite3"
url = ":memory:"
max_idle = 1
max_open = 1

[[dbserver.databases]]
name = "mysql1"
driver = "mysql"
url = "root:secret@tcp(127.0.0.1:1)/test"
max_idle = 1
max_open = 1
"#;

fn write_config(content: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file
}

#[tokio::test]
async fn test_start_registry_from_config_file() {
    let file = write_config(CONFIG);
    let config = AppConfig::from_file(file.path()).unwrap();
    config.validate().unwrap();

    let registry = ConnectionRegistry::from_config(&config.dbserver);
    let reconcile_loop = registry.start(&config.dbserver).await;
    assert!(reconcile_loop.is_none());

    assert_eq!(registry.names().await, vec!["local", "mysql1"]);
    assert!(registry.is_connected("local").await);
    // Nothing listens on port 1
    assert!(!registry.is_connected("mysql1").await);

    let masked = config.to_json_masked().unwrap();
    assert!(!masked.contains("secret"));

    registry.shutdown().await;
}

#[test]
fn test_env_overrides() {
    let file = write_config(CONFIG);

    std::env::set_var("DBSERVER_PORT", "19999");
    std::env::set_var("DBSERVER_CONN_CHECK_INTERVAL", "7");
    let config = AppConfig::resolve(Some(file.path()));
    std::env::remove_var("DBSERVER_PORT");
    std::env::remove_var("DBSERVER_CONN_CHECK_INTERVAL");

    let config = config.unwrap();
    assert_eq!(config.server.port, 19999);
    assert_eq!(config.dbserver.conn_check_interval, 7);
}

#[test]
fn test_invalid_toml_is_config_error() {
    let file = write_config("[server\nport = ");
    assert!(matches!(
        AppConfig::from_file(file.path()),
        Err(Error::Config(_))
    ));
}
