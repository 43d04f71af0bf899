//! Configuration loader
//!
//! Builds the host configuration from an optional file and environment
//! overrides.
//!
//! ## Loading Strategy
//! 1. `MINDHIT_CONFIG` names a file explicitly; otherwise standard locations
//!    are probed; otherwise built-in defaults are used
//! 2. `MINDHIT_*` environment variables override individual fields
//! 3. The result is validated
//!
//! ## Environment Variables
//! - `MINDHIT_CONFIG`: Path to a JSON or TOML config file
//! - `MINDHIT_API_BASE_URL`: Events API base URL
//! - `MINDHIT_API_TIMEOUT_SECS`: Delivery timeout in seconds
//! - `MINDHIT_BATCH_SIZE`: Events per batch
//! - `MINDHIT_FLUSH_INTERVAL_MS`: Periodic flush interval
//! - `MINDHIT_MAX_RETRY`: Failed attempts before a batch is persisted
//! - `MINDHIT_STORAGE_PATH`: SQLite file (`memory` or empty for in-memory)
//! - `MINDHIT_STORAGE_POOL_SIZE`: Connection pool size
//! - `MINDHIT_ALLOWED_ORIGINS`: Comma-separated sender origins
//! - `MINDHIT_PROBE_ENABLED`: Enable the health probe (true/false)
//! - `MINDHIT_PROBE_INTERVAL_SECS`: Health probe interval
//! - `MINDHIT_LOG_LEVEL`: Tracing filter directive
//! - `MINDHIT_LOG_JSON`: Emit JSON logs (true/false)
//!
//! ## File Locations
//! The loader probes `mindhit.{toml,json}` then `config.{toml,json}` in the
//! current directory, its parent, and next to the executable.

use std::path::{Path, PathBuf};
use std::str::FromStr;

use mindhit_domain::{Config, MindhitError, Result};

const CONFIG_PATH_VAR: &str = "MINDHIT_CONFIG";
const CONFIG_FILE_NAMES: [&str; 4] = ["mindhit.toml", "mindhit.json", "config.toml", "config.json"];

/// Load, override and validate the host configuration.
///
/// # Errors
/// Returns `MindhitError::Config` if an explicit config file is missing or
/// malformed, an environment override does not parse, or validation fails.
pub fn load() -> Result<Config> {
    let mut config = match std::env::var(CONFIG_PATH_VAR).ok().filter(|p| !p.trim().is_empty()) {
        Some(path) => load_from_file(Some(PathBuf::from(path)))?,
        None => match probe_config_paths() {
            Some(path) => load_from_file(Some(path))?,
            None => {
                tracing::debug!("No config file found, using defaults");
                Config::default()
            }
        },
    };

    apply_env_overrides(&mut config)?;
    config.validate()?;
    Ok(config)
}

/// Load configuration from a file
///
/// If `path` is `None`, probes the standard locations.
/// Supports both JSON and TOML formats (detected by file extension).
/// Missing fields take their defaults.
///
/// # Errors
/// Returns `MindhitError::Config` if:
/// - File not found (when path is specified)
/// - No config file found (when path is `None`)
/// - File format is invalid
pub fn load_from_file(path: Option<PathBuf>) -> Result<Config> {
    let config_path = match path {
        Some(p) => {
            if !p.exists() {
                return Err(MindhitError::Config(format!(
                    "Config file not found: {}",
                    p.display()
                )));
            }
            p
        }
        None => probe_config_paths().ok_or_else(|| {
            MindhitError::Config("No config file found in any of the standard locations".into())
        })?,
    };

    tracing::info!(path = %config_path.display(), "Loading configuration from file");

    let contents = std::fs::read_to_string(&config_path)
        .map_err(|e| MindhitError::Config(format!("Failed to read config file: {e}")))?;

    parse_config(&contents, &config_path)
}

/// Parse configuration from string content; format follows the extension.
fn parse_config(contents: &str, path: &Path) -> Result<Config> {
    let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("json");

    match extension {
        "toml" => toml::from_str(contents)
            .map_err(|e| MindhitError::Config(format!("Invalid TOML format: {e}"))),
        "json" => serde_json::from_str(contents)
            .map_err(|e| MindhitError::Config(format!("Invalid JSON format: {e}"))),
        _ => Err(MindhitError::Config(format!("Unsupported config format: {extension}"))),
    }
}

/// Probe the standard locations for a configuration file
///
/// # Returns
/// The first config file found, or `None` if no file exists.
pub fn probe_config_paths() -> Option<PathBuf> {
    let mut dirs = Vec::new();

    if let Ok(cwd) = std::env::current_dir() {
        dirs.push(cwd.clone());
        dirs.push(cwd.join(".."));
    }

    if let Ok(exe_path) = std::env::current_exe() {
        if let Some(exe_dir) = exe_path.parent() {
            dirs.push(exe_dir.to_path_buf());
        }
    }

    dirs.iter()
        .flat_map(|dir| CONFIG_FILE_NAMES.iter().map(move |name| dir.join(name)))
        .find(|path| path.exists())
}

/// Apply `MINDHIT_*` environment overrides on top of `config`.
///
/// # Errors
/// Returns `MindhitError::Config` if a numeric variable does not parse.
pub fn apply_env_overrides(config: &mut Config) -> Result<()> {
    if let Some(url) = env_string("MINDHIT_API_BASE_URL") {
        config.api.base_url = url;
    }
    if let Some(secs) = env_parse("MINDHIT_API_TIMEOUT_SECS")? {
        config.api.timeout_secs = secs;
    }
    if let Some(size) = env_parse("MINDHIT_BATCH_SIZE")? {
        config.queue.batch_size = size;
    }
    if let Some(ms) = env_parse("MINDHIT_FLUSH_INTERVAL_MS")? {
        config.queue.flush_interval_ms = ms;
    }
    if let Some(retry) = env_parse("MINDHIT_MAX_RETRY")? {
        config.queue.max_retry = retry;
    }
    if let Ok(path) = std::env::var("MINDHIT_STORAGE_PATH") {
        let path = path.trim();
        config.storage.path =
            if path.is_empty() || path.eq_ignore_ascii_case("memory") {
                None
            } else {
                Some(path.to_string())
            };
    }
    if let Some(size) = env_parse("MINDHIT_STORAGE_POOL_SIZE")? {
        config.storage.pool_size = size;
    }
    if let Some(origins) = env_string("MINDHIT_ALLOWED_ORIGINS") {
        config.extension.allowed_origins = origins
            .split(',')
            .map(str::trim)
            .filter(|o| !o.is_empty())
            .map(str::to_string)
            .collect();
    }
    config.connectivity.probe_enabled =
        env_bool("MINDHIT_PROBE_ENABLED", config.connectivity.probe_enabled);
    if let Some(secs) = env_parse("MINDHIT_PROBE_INTERVAL_SECS")? {
        config.connectivity.probe_interval_secs = secs;
    }
    if let Some(level) = env_string("MINDHIT_LOG_LEVEL") {
        config.logging.level = level;
    }
    config.logging.json = env_bool("MINDHIT_LOG_JSON", config.logging.json);

    Ok(())
}

/// Non-empty environment variable
fn env_string(key: &str) -> Option<String> {
    std::env::var(key).ok().map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

/// Parse a numeric environment variable if it is set
///
/// # Errors
/// Returns `MindhitError::Config` if the value does not parse.
fn env_parse<T>(key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    env_string(key)
        .map(|raw| {
            raw.parse::<T>()
                .map_err(|e| MindhitError::Config(format!("Invalid value for {key}: {e}")))
        })
        .transpose()
}

/// Parse boolean from environment variable
///
/// Accepts: `1`/`0`, `true`/`false`, `yes`/`no`, `on`/`off` (case-insensitive)
fn env_bool(key: &str, default: bool) -> bool {
    std::env::var(key)
        .ok()
        .map(|s| matches!(s.to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"))
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use std::io::Write;
    use std::sync::Mutex;

    use once_cell::sync::Lazy;
    use tempfile::{NamedTempFile, TempDir};

    use super::*;

    static ENV_LOCK: Lazy<Mutex<()>> = Lazy::new(|| Mutex::new(()));

    const OVERRIDE_VARS: [&str; 13] = [
        "MINDHIT_API_BASE_URL",
        "MINDHIT_API_TIMEOUT_SECS",
        "MINDHIT_BATCH_SIZE",
        "MINDHIT_FLUSH_INTERVAL_MS",
        "MINDHIT_MAX_RETRY",
        "MINDHIT_STORAGE_PATH",
        "MINDHIT_STORAGE_POOL_SIZE",
        "MINDHIT_ALLOWED_ORIGINS",
        "MINDHIT_PROBE_ENABLED",
        "MINDHIT_PROBE_INTERVAL_SECS",
        "MINDHIT_LOG_LEVEL",
        "MINDHIT_LOG_JSON",
        "MINDHIT_CONFIG",
    ];

    fn clear_env() {
        for key in OVERRIDE_VARS {
            std::env::remove_var(key);
        }
    }

    fn temp_config(contents: &str, extension: &str) -> (TempDir, PathBuf) {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(format!("mindhit.{extension}"));
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        (dir, path)
    }

    #[test]
    fn test_env_bool_parsing() {
        let _guard = ENV_LOCK.lock().expect("env mutex poisoned");

        let truthy = [("TEST_MH_BOOL_1", "1"), ("TEST_MH_BOOL_YES", "YES"), ("TEST_MH_BOOL_ON", "on")];
        for (key, value) in truthy {
            std::env::set_var(key, value);
            assert!(env_bool(key, false), "{value} should be true");
            std::env::remove_var(key);
        }

        std::env::set_var("TEST_MH_BOOL_OFF", "off");
        assert!(!env_bool("TEST_MH_BOOL_OFF", true));
        std::env::remove_var("TEST_MH_BOOL_OFF");

        assert!(env_bool("TEST_MH_BOOL_MISSING", true));
        assert!(!env_bool("TEST_MH_BOOL_MISSING", false));
    }

    #[test]
    fn test_env_overrides_replace_fields() {
        let _guard = ENV_LOCK.lock().expect("env mutex poisoned");
        clear_env();

        std::env::set_var("MINDHIT_API_BASE_URL", "https://api.example.com/v1");
        std::env::set_var("MINDHIT_BATCH_SIZE", "25");
        std::env::set_var("MINDHIT_FLUSH_INTERVAL_MS", "5000");
        std::env::set_var("MINDHIT_STORAGE_PATH", "memory");
        std::env::set_var("MINDHIT_ALLOWED_ORIGINS", "chrome-extension://a/, chrome-extension://b");
        std::env::set_var("MINDHIT_PROBE_ENABLED", "true");
        std::env::set_var("MINDHIT_LOG_JSON", "1");

        let mut config = Config::default();
        apply_env_overrides(&mut config).unwrap();
        clear_env();

        assert_eq!(config.api.base_url, "https://api.example.com/v1");
        assert_eq!(config.queue.batch_size, 25);
        assert_eq!(config.queue.flush_interval_ms, 5000);
        assert_eq!(config.storage.path, None);
        assert_eq!(
            config.extension.allowed_origins,
            vec!["chrome-extension://a/".to_string(), "chrome-extension://b".to_string()]
        );
        assert!(config.connectivity.probe_enabled);
        assert!(config.logging.json);
    }

    #[test]
    fn test_env_override_invalid_number() {
        let _guard = ENV_LOCK.lock().expect("env mutex poisoned");
        clear_env();

        std::env::set_var("MINDHIT_MAX_RETRY", "three");
        let result = apply_env_overrides(&mut Config::default());
        clear_env();

        assert!(matches!(result, Err(MindhitError::Config(_))), "Should be a Config error");
    }

    #[test]
    fn test_load_uses_explicit_file_then_env() {
        let _guard = ENV_LOCK.lock().expect("env mutex poisoned");
        clear_env();

        let (_dir, path) = temp_config("[queue]\nbatch_size = 4\nmax_retry = 5\n", "toml");
        std::env::set_var("MINDHIT_CONFIG", &path);
        std::env::set_var("MINDHIT_MAX_RETRY", "7");

        let result = load();
        clear_env();

        let config = result.expect("config loads");
        assert_eq!(config.queue.batch_size, 4);
        assert_eq!(config.queue.max_retry, 7);
        assert_eq!(config.queue.flush_interval_ms, 30_000);
    }

    #[test]
    fn test_load_rejects_invalid_result() {
        let _guard = ENV_LOCK.lock().expect("env mutex poisoned");
        clear_env();

        let (_dir, path) = temp_config(r#"{"queue": {"batch_size": 0}}"#, "json");
        std::env::set_var("MINDHIT_CONFIG", &path);

        let result = load();
        clear_env();

        assert!(matches!(result, Err(MindhitError::Config(_))));
    }

    #[test]
    fn test_load_from_file_json() {
        let (_dir, path) = temp_config(
            r#"{
                "api": {"base_url": "http://localhost:1234/v1", "timeout_secs": 10},
                "storage": {"path": null}
            }"#,
            "json",
        );

        let config = load_from_file(Some(path)).expect("Should load config from JSON file");
        assert_eq!(config.api.base_url, "http://localhost:1234/v1");
        assert_eq!(config.api.timeout_secs, 10);
        assert_eq!(config.storage.path, None);
        assert_eq!(config.queue.batch_size, 10);
    }

    #[test]
    fn test_load_from_file_not_found() {
        let result = load_from_file(Some(PathBuf::from("/nonexistent/mindhit.toml")));
        assert!(matches!(result, Err(MindhitError::Config(_))), "Should be a Config error");
    }

    #[test]
    fn test_load_from_file_invalid_toml() {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(b"[queue\nbatch_size = ").unwrap();
        let path = temp_file.path().with_extension("toml");
        std::fs::copy(temp_file.path(), &path).unwrap();

        let result = load_from_file(Some(path.clone()));
        assert!(result.is_err(), "Should fail with invalid TOML");

        std::fs::remove_file(path).ok();
    }

    #[test]
    fn test_parse_config_unsupported_format() {
        let result = parse_config("some content", &PathBuf::from("mindhit.yaml"));
        assert!(result.is_err(), "Should fail with unsupported format");
    }
}
