//! Configuration types and loading
//!
//! Precedence: CLI flags > env vars > config file > defaults.
//! The login password is read from CLAIMS_PASSWORD or a password file and
//! never stored in the TOML.

use std::path::{Path, PathBuf};
use std::time::Duration;

use claims_auth::{
    DEFAULT_BASE_URL, DEFAULT_CREDENTIALS_FILE, DEFAULT_LOGIN_PATH, DEFAULT_REFRESH_PATH,
    DEFAULT_TIMEOUT_SECS,
};
use claims_gateway::Endpoints;
use common::Secret;
use serde::Deserialize;

const DEFAULT_CONFIG_FILE: &str = "claims-gateway.toml";

/// Root configuration
#[derive(Debug, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub auth: AuthConfig,
}

/// Backend location and client behaviour
#[derive(Debug, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

/// Token routes and where the session is persisted
#[derive(Debug, Deserialize)]
pub struct AuthConfig {
    #[serde(default = "default_login_path")]
    pub login_path: String,
    #[serde(default = "default_refresh_path")]
    pub refresh_path: String,
    #[serde(default = "default_credentials_path")]
    pub credentials_path: PathBuf,
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_timeout() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

fn default_login_path() -> String {
    DEFAULT_LOGIN_PATH.to_string()
}

fn default_refresh_path() -> String {
    DEFAULT_REFRESH_PATH.to_string()
}

fn default_credentials_path() -> PathBuf {
    PathBuf::from(DEFAULT_CREDENTIALS_FILE)
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_secs: default_timeout(),
        }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            login_path: default_login_path(),
            refresh_path: default_refresh_path(),
            credentials_path: default_credentials_path(),
        }
    }
}

/// Where the config file is expected, and whether someone asked for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigPath {
    pub path: PathBuf,
    /// Named by `--config` or CONFIG_PATH; a missing file is then an error
    pub explicit: bool,
}

impl Config {
    /// Load configuration from a TOML file, then overlay environment variables.
    ///
    /// A missing file is only tolerated at the default location, where it
    /// means "use built-in defaults".
    pub fn load(source: &ConfigPath) -> common::Result<Self> {
        let mut config = match std::fs::read_to_string(&source.path) {
            Ok(contents) => toml::from_str(&contents)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound && !source.explicit => {
                Config::default()
            }
            Err(e) => return Err(e.into()),
        };

        if let Ok(url) = std::env::var("CLAIMS_BASE_URL") {
            config.api.base_url = url;
        }

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> common::Result<()> {
        if !self.api.base_url.starts_with("http://") && !self.api.base_url.starts_with("https://")
        {
            return Err(common::Error::Config(format!(
                "base_url must start with http:// or https://, got: {}",
                self.api.base_url
            )));
        }

        if self.api.timeout_secs == 0 {
            return Err(common::Error::Config(
                "timeout_secs must be greater than 0".into(),
            ));
        }

        for (name, path) in [
            ("login_path", &self.auth.login_path),
            ("refresh_path", &self.auth.refresh_path),
        ] {
            if !path.starts_with('/') {
                return Err(common::Error::Config(format!(
                    "{name} must start with /, got: {path}"
                )));
            }
        }

        Ok(())
    }

    pub fn endpoints(&self) -> Endpoints {
        Endpoints {
            base_url: self.api.base_url.clone(),
            login_path: self.auth.login_path.clone(),
            refresh_path: self.auth.refresh_path.clone(),
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.api.timeout_secs)
    }

    /// Resolve config file path from `--config` (which also reads
    /// CONFIG_PATH), falling back to the default file name.
    pub fn resolve_path(cli_path: Option<&str>) -> ConfigPath {
        match cli_path {
            Some(p) => ConfigPath {
                path: PathBuf::from(p),
                explicit: true,
            },
            None => ConfigPath {
                path: PathBuf::from(DEFAULT_CONFIG_FILE),
                explicit: false,
            },
        }
    }
}

/// Read the login password.
///
/// Resolution order:
/// 1. CLAIMS_PASSWORD env var
/// 2. `--password-file` contents, trailing newline trimmed
pub fn read_password(password_file: Option<&Path>) -> common::Result<Secret<String>> {
    if let Ok(password) = std::env::var("CLAIMS_PASSWORD") {
        return Ok(Secret::new(password));
    }

    let Some(file) = password_file else {
        return Err(common::Error::Config(
            "no password: set CLAIMS_PASSWORD or pass --password-file".into(),
        ));
    };
    let contents = std::fs::read_to_string(file).map_err(|e| {
        common::Error::Config(format!("failed to read password file {}: {e}", file.display()))
    })?;
    let password = contents.trim_end_matches(['\r', '\n']).to_owned();
    if password.is_empty() {
        return Err(common::Error::Config(format!(
            "password file {} is empty",
            file.display()
        )));
    }
    Ok(Secret::new(password))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Serializes tests that touch process environment variables.
    static ENV_MUTEX: Mutex<()> = Mutex::new(());

    /// SAFETY: Callers must hold ENV_MUTEX to prevent concurrent env mutation.
    unsafe fn set_env(key: &str, val: &str) {
        unsafe { std::env::set_var(key, val) };
    }

    unsafe fn remove_env(key: &str) {
        unsafe { std::env::remove_var(key) };
    }

    fn explicit(path: &Path) -> ConfigPath {
        ConfigPath {
            path: path.to_path_buf(),
            explicit: true,
        }
    }

    fn write_config(dir: &tempfile::TempDir, contents: &str) -> PathBuf {
        let path = dir.path().join("claims-gateway.toml");
        std::fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn load_full_config() {
        let _lock = ENV_MUTEX.lock().unwrap();
        unsafe { remove_env("CLAIMS_BASE_URL") };
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(
            &dir,
            r#"
[api]
base_url = "https://claims.example.com"
timeout_secs = 5

[auth]
login_path = "/auth/login/"
refresh_path = "/auth/refresh/"
credentials_path = "/var/lib/claims/session.json"
"#,
        );

        let config = Config::load(&explicit(&path)).unwrap();
        assert_eq!(config.api.base_url, "https://claims.example.com");
        assert_eq!(config.timeout(), Duration::from_secs(5));
        assert_eq!(
            config.endpoints().refresh_url(),
            "https://claims.example.com/auth/refresh/"
        );
        assert_eq!(
            config.auth.credentials_path,
            PathBuf::from("/var/lib/claims/session.json")
        );
    }

    #[test]
    fn empty_file_uses_defaults() {
        let _lock = ENV_MUTEX.lock().unwrap();
        unsafe { remove_env("CLAIMS_BASE_URL") };
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(&dir, "");

        let config = Config::load(&explicit(&path)).unwrap();
        assert_eq!(config.api.base_url, "http://127.0.0.1:8000");
        assert_eq!(config.api.timeout_secs, 20);
        assert_eq!(config.auth.login_path, "/api/token/");
        assert_eq!(config.auth.refresh_path, "/api/token/refresh/");
        assert_eq!(config.auth.credentials_path, PathBuf::from("session.json"));
    }

    #[test]
    fn missing_default_file_falls_back_to_defaults() {
        let _lock = ENV_MUTEX.lock().unwrap();
        unsafe { remove_env("CLAIMS_BASE_URL") };
        let source = ConfigPath {
            path: PathBuf::from("/nonexistent/claims-gateway.toml"),
            explicit: false,
        };
        let config = Config::load(&source).unwrap();
        assert_eq!(config.api.base_url, "http://127.0.0.1:8000");
    }

    #[test]
    fn missing_explicit_file_is_an_error() {
        let result = Config::load(&explicit(Path::new("/nonexistent/path/config.toml")));
        assert!(matches!(result, Err(common::Error::Io(_))));
    }

    #[test]
    fn invalid_toml_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(&dir, "not valid {{{{ toml");
        let result = Config::load(&explicit(&path));
        assert!(matches!(result, Err(common::Error::Toml(_))));
    }

    #[test]
    fn rejects_non_http_base_url() {
        let _lock = ENV_MUTEX.lock().unwrap();
        unsafe { remove_env("CLAIMS_BASE_URL") };
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(&dir, "[api]\nbase_url = \"ftp://claims\"\n");

        let err = Config::load(&explicit(&path)).unwrap_err();
        assert!(err.to_string().contains("base_url"), "got: {err}");
    }

    #[test]
    fn rejects_zero_timeout() {
        let _lock = ENV_MUTEX.lock().unwrap();
        unsafe { remove_env("CLAIMS_BASE_URL") };
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(&dir, "[api]\ntimeout_secs = 0\n");

        let err = Config::load(&explicit(&path)).unwrap_err();
        assert!(err.to_string().contains("timeout_secs"), "got: {err}");
    }

    #[test]
    fn rejects_relative_route() {
        let _lock = ENV_MUTEX.lock().unwrap();
        unsafe { remove_env("CLAIMS_BASE_URL") };
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(&dir, "[auth]\nrefresh_path = \"api/token/refresh/\"\n");

        let err = Config::load(&explicit(&path)).unwrap_err();
        assert!(err.to_string().contains("refresh_path"), "got: {err}");
    }

    #[test]
    fn base_url_env_overrides_file() {
        let _lock = ENV_MUTEX.lock().unwrap();
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(&dir, "[api]\nbase_url = \"http://from-file\"\n");

        unsafe { set_env("CLAIMS_BASE_URL", "https://from-env") };
        let config = Config::load(&explicit(&path)).unwrap();
        unsafe { remove_env("CLAIMS_BASE_URL") };

        assert_eq!(config.api.base_url, "https://from-env");
    }

    #[test]
    fn resolve_path_marks_flag_as_explicit() {
        let from_flag = Config::resolve_path(Some("/etc/claims/claims.toml"));
        let fallback = Config::resolve_path(None);

        assert_eq!(from_flag.path, PathBuf::from("/etc/claims/claims.toml"));
        assert!(from_flag.explicit);
        assert_eq!(fallback.path, PathBuf::from("claims-gateway.toml"));
        assert!(!fallback.explicit);
    }

    #[test]
    fn password_from_env_wins_over_file() {
        let _lock = ENV_MUTEX.lock().unwrap();
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("password");
        std::fs::write(&file, "from-file\n").unwrap();

        unsafe { set_env("CLAIMS_PASSWORD", "from-env") };
        let password = read_password(Some(&file)).unwrap();
        unsafe { remove_env("CLAIMS_PASSWORD") };

        assert_eq!(password.expose(), "from-env");
    }

    #[test]
    fn password_from_file_is_trimmed() {
        let _lock = ENV_MUTEX.lock().unwrap();
        unsafe { remove_env("CLAIMS_PASSWORD") };
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("password");
        std::fs::write(&file, "s3cret pass\n").unwrap();

        let password = read_password(Some(&file)).unwrap();
        assert_eq!(password.expose(), "s3cret pass");
    }

    #[test]
    fn password_missing_everywhere_is_an_error() {
        let _lock = ENV_MUTEX.lock().unwrap();
        unsafe { remove_env("CLAIMS_PASSWORD") };
        let err = read_password(None).unwrap_err();
        assert!(err.to_string().contains("CLAIMS_PASSWORD"), "got: {err}");
    }
}
