use std::time::Duration;
use tempfile::TempDir;
use voyoconfig::Config;

fn load_with(yaml: Option<&str>) -> (TempDir, Config) {
    let dir = TempDir::new().unwrap();
    if let Some(content) = yaml {
        std::fs::write(dir.path().join("config.yaml"), content).unwrap();
    }
    let config = Config::load_config(dir.path().to_str().unwrap()).unwrap();
    (dir, config)
}

#[test]
fn test_embedded_defaults() {
    let (_dir, config) = load_with(None);

    assert_eq!(config.get_http_port(), 8080);
    assert_eq!(config.get_log_min_level(), "INFO");
    assert_eq!(
        config.get_secs(&["resolution_cache", "ttl_secs"], Duration::ZERO),
        Duration::from_secs(4 * 3600)
    );
    assert_eq!(config.get_usize(&["guard", "expensive_ceiling"], 0), 10);
    assert_eq!(config.get_string_list(&["extract", "peer_proxies", "endpoints"]).len(), 2);
}

#[test]
fn test_file_overrides_are_merged() {
    let (_dir, config) = load_with(Some("Host:\n  HTTP_Port: 9191\nguard:\n  window_secs: 5\n"));

    assert_eq!(config.get_http_port(), 9191);
    assert_eq!(config.get_usize(&["guard", "window_secs"], 0), 5);
    // les clés voisines conservent leur valeur par défaut
    assert_eq!(config.get_usize(&["guard", "general_ceiling"], 0), 120);
}

#[test]
fn test_set_value_is_persisted() {
    let (dir, config) = load_with(None);
    config.set_http_port(7000).unwrap();

    let reloaded = Config::load_config(dir.path().to_str().unwrap()).unwrap();
    assert_eq!(reloaded.get_http_port(), 7000);
}

#[test]
fn test_managed_dir_is_created_relative_to_config_dir() {
    let (dir, config) = load_with(None);
    let mirror = config.get_managed_dir(&["mirror", "directory"], "mirror").unwrap();

    assert!(std::path::Path::new(&mirror).is_dir());
    assert!(mirror.starts_with(dir.path().to_str().unwrap()));
}

#[test]
fn test_missing_values_fall_back() {
    let (_dir, config) = load_with(None);

    assert!(config.get_value(&["nope", "nothing"]).is_err());
    assert_eq!(config.get_usize(&["nope"], 42), 42);
    assert!(config.get_bool(&["nope"], true));
    assert_eq!(config.get_string(&["nope"], "x"), "x");
    assert!(config.get_string_list(&["nope"]).is_empty());
}
