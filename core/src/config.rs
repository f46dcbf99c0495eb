use std::ffi::OsString;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use ron::ser::{PrettyConfig, to_string_pretty};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::api::ApiConfig;
use crate::session::TokenSource;
use crate::{Error, StorageAction, targets};

pub const CONFIG_ENV: &str = "FARMPLOT_CONFIG";
pub const DEFAULT_CONFIG_FILE: &str = "farmplot.ron";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub api_base_url: String,
    pub request_timeout_ms: u64,
    pub log_level: String,
    pub default_down_payment_percent: f64,
    /// Groups allowed to create, edit and delete pricing tiers.
    pub agent_groups: Vec<String>,
    /// Serve demo data from memory instead of calling the server.
    pub offline_demo: bool,
    /// File a sign-in helper keeps the current id token in. Without it the
    /// token is read from `FARMPLOT_ID_TOKEN`.
    pub id_token_file: Option<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_base_url: "http://localhost:8000".to_string(),
            request_timeout_ms: 10_000,
            log_level: "info".to_string(),
            default_down_payment_percent: 0.0,
            agent_groups: vec!["agent".to_string()],
            offline_demo: false,
            id_token_file: None,
        }
    }
}

impl AppConfig {
    /// Missing file gives defaults. A file that exists but does not parse is an error.
    pub fn load_or_default(path: &Path) -> Result<Self, Error> {
        let contents = match fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(error) if error.kind() == io::ErrorKind::NotFound => {
                info!(
                    target: targets::STORAGE,
                    path = %path.display(),
                    "No config file; using defaults"
                );
                return Ok(Self::default());
            }
            Err(source) => {
                return Err(Error::StorageIo {
                    action: StorageAction::Load,
                    path: Some(path.display().to_string()),
                    source,
                });
            }
        };

        let config: AppConfig = ron::from_str(&contents).map_err(|error| Error::Ron {
            action: StorageAction::Load,
            path: Some(path.display().to_string()),
            source: error.code,
        })?;
        debug!(
            target: targets::STORAGE,
            path = %path.display(),
            api = %config.api_base_url,
            offline = config.offline_demo,
            "Config loaded"
        );
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<(), Error> {
        let contents =
            to_string_pretty(self, PrettyConfig::new()).map_err(|source| Error::Ron {
                action: StorageAction::Save,
                path: Some(path.display().to_string()),
                source,
            })?;
        fs::write(path, contents).map_err(|source| Error::StorageIo {
            action: StorageAction::Save,
            path: Some(path.display().to_string()),
            source,
        })?;
        debug!(target: targets::STORAGE, path = %path.display(), "Config saved");
        Ok(())
    }

    pub fn api_config(&self) -> ApiConfig {
        ApiConfig {
            base_url: self.api_base_url.clone(),
            timeout: Duration::from_millis(self.request_timeout_ms.max(1)),
        }
    }

    pub fn token_source(&self) -> TokenSource {
        self.id_token_file
            .as_deref()
            .map(str::trim)
            .filter(|path| !path.is_empty())
            .map(|path| TokenSource::File(PathBuf::from(path)))
            .unwrap_or_default()
    }

    /// Configured percentage when it is a usable value.
    pub fn default_down_payment(&self) -> Option<f64> {
        Some(self.default_down_payment_percent)
            .filter(|percent| percent.is_finite() && (0.0..=100.0).contains(percent))
            .filter(|percent| *percent > 0.0)
    }
}

/// `FARMPLOT_CONFIG` when set, otherwise `farmplot.ron` in the working directory.
pub fn config_path() -> PathBuf {
    config_path_from(std::env::var_os(CONFIG_ENV))
}

fn config_path_from(value: Option<OsString>) -> PathBuf {
    value
        .filter(|value| !value.is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("farmplot-{}-{name}.ron", std::process::id()))
    }

    #[test]
    fn missing_file_gives_defaults() {
        let path = scratch_path("missing");
        let _ = fs::remove_file(&path);
        let config = AppConfig::load_or_default(&path).expect("defaults");
        assert_eq!(config, AppConfig::default());
        assert_eq!(config.agent_groups, vec!["agent".to_string()]);
    }

    #[test]
    fn save_then_load_keeps_values() {
        let path = scratch_path("roundtrip");
        let config = AppConfig {
            api_base_url: "https://farm.example/api".to_string(),
            offline_demo: true,
            default_down_payment_percent: 25.0,
            ..AppConfig::default()
        };
        config.save(&path).expect("save");
        let loaded = AppConfig::load_or_default(&path).expect("load");
        let _ = fs::remove_file(&path);

        assert_eq!(loaded, config);
        assert_eq!(loaded.default_down_payment(), Some(25.0));
    }

    #[test]
    fn partial_file_fills_in_defaults() {
        let path = scratch_path("partial");
        fs::write(&path, "(offline_demo: true)").expect("write");
        let loaded = AppConfig::load_or_default(&path).expect("load");
        let _ = fs::remove_file(&path);

        assert!(loaded.offline_demo);
        assert_eq!(loaded.request_timeout_ms, 10_000);
    }

    #[test]
    fn malformed_file_is_a_ron_error() {
        let path = scratch_path("malformed");
        fs::write(&path, "(offline_demo: maybe").expect("write");
        let result = AppConfig::load_or_default(&path);
        let _ = fs::remove_file(&path);

        assert!(matches!(
            result,
            Err(Error::Ron {
                action: StorageAction::Load,
                ..
            })
        ));
    }

    #[test]
    fn path_override() {
        assert_eq!(config_path_from(None), PathBuf::from(DEFAULT_CONFIG_FILE));
        assert_eq!(
            config_path_from(Some(OsString::new())),
            PathBuf::from(DEFAULT_CONFIG_FILE)
        );
        assert_eq!(
            config_path_from(Some(OsString::from("/etc/farmplot.ron"))),
            PathBuf::from("/etc/farmplot.ron")
        );
    }

    #[test]
    fn api_config_uses_timeout() {
        let config = AppConfig {
            request_timeout_ms: 2500,
            ..AppConfig::default()
        };
        assert_eq!(config.api_config().timeout, Duration::from_millis(2500));
        assert_eq!(config.default_down_payment(), None);
    }

    #[test]
    fn token_file_overrides_the_environment() {
        assert_eq!(AppConfig::default().token_source(), TokenSource::default());

        let config = AppConfig {
            id_token_file: Some(" /run/farmplot/id-token ".to_string()),
            ..AppConfig::default()
        };
        assert_eq!(
            config.token_source(),
            TokenSource::File(PathBuf::from("/run/farmplot/id-token"))
        );
    }
}
