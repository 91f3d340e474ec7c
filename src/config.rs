use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::project::MaterialDefaults;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub defaults: MaterialDefaults,
    #[serde(default)]
    pub forecast: ForecastConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_cors_origin")]
    pub cors_origin: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_db_path")]
    pub db_path: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ForecastMode {
    #[default]
    Command,
    Http,
    Disabled,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForecastConfig {
    #[serde(default)]
    pub mode: ForecastMode,
    #[serde(default = "default_forecast_command")]
    pub command: String,
    #[serde(default = "default_forecast_script")]
    pub script: String,
    #[serde(default)]
    pub url: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_filter")]
    pub filter: String,
}

#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub db_path: Option<String>,
}

impl Config {
    pub fn default_path() -> PathBuf {
        let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
        home.join(".config/waste-ledger/config.toml")
    }

    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = path
            .map(|p| p.to_path_buf())
            .unwrap_or_else(Self::default_path);
        if !path.exists() {
            return Ok(Self::default());
        }
        let data = fs::read_to_string(&path)
            .with_context(|| format!("failed reading config: {}", path.display()))?;
        let parsed: Self = toml::from_str(&data)
            .with_context(|| format!("failed parsing TOML config: {}", path.display()))?;
        Ok(parsed)
    }

    pub fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(host) = overrides.host {
            self.server.host = host;
        }
        if let Some(port) = overrides.port {
            self.server.port = port;
        }
        if let Some(db_path) = overrides.db_path {
            self.storage.db_path = db_path;
        }
    }

    pub fn write_template(path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("failed creating config directory: {}", parent.display())
            })?;
        }
        fs::write(path, Self::default_template())
            .with_context(|| format!("failed writing config template: {}", path.display()))
    }

    pub fn resolved_db_path(&self) -> PathBuf {
        expand_tilde(&self.storage.db_path)
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    pub fn default_template() -> String {
        let template = r#"[server]
host = "127.0.0.1"
port = 3001
# origin allowed to call the API from a browser
cors_origin = "http://localhost:5173"

[storage]
db_path = "~/.local/share/waste-ledger/ledger.db"

# used for new projects and for material fields that were never supplied
[defaults]
transport_co2_rate = 0.22
tonnage = 0.0
recycled = 0.0
truck = 10.0
plant_co2_rate = 500.0
final_product_co2_rate = 750.0
landfill_dist = 40.0
plant_dist = 30.0

[forecast]
# command | http | disabled
mode = "command"
command = "python3"
script = "./utils/use_model.py"
url = ""
timeout_secs = 30

[logging]
# overridden by RUST_LOG when set
filter = "info"
"#;
        template.to_string()
    }
}

pub fn expand_tilde(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(stripped);
        }
    }
    PathBuf::from(path)
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            cors_origin: default_cors_origin(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
        }
    }
}

impl Default for ForecastConfig {
    fn default() -> Self {
        Self {
            mode: ForecastMode::default(),
            command: default_forecast_command(),
            script: default_forecast_script(),
            url: String::new(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: default_log_filter(),
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3001
}

fn default_cors_origin() -> String {
    "http://localhost:5173".to_string()
}

fn default_db_path() -> String {
    "~/.local/share/waste-ledger/ledger.db".to_string()
}

fn default_forecast_command() -> String {
    "python3".to_string()
}

fn default_forecast_script() -> String {
    "./utils/use_model.py".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_log_filter() -> String {
    "info".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn template_parses_to_defaults() {
        let parsed: Config = toml::from_str(&Config::default_template()).unwrap();
        let defaults = Config::default();
        assert_eq!(parsed.server.port, defaults.server.port);
        assert_eq!(parsed.server.cors_origin, defaults.server.cors_origin);
        assert_eq!(parsed.storage.db_path, defaults.storage.db_path);
        assert_eq!(parsed.defaults, MaterialDefaults::default());
        assert_eq!(parsed.forecast.mode, ForecastMode::Command);
        assert_eq!(parsed.logging.filter, "info");
    }

    #[test]
    fn partial_file_fills_missing_sections() {
        let parsed: Config = toml::from_str(
            r#"
[defaults]
plant_co2_rate = 420.0

[forecast]
mode = "disabled"
"#,
        )
        .unwrap();
        assert_eq!(parsed.defaults.plant_co2_rate, 420.0);
        assert_eq!(parsed.defaults.truck, 10.0);
        assert_eq!(parsed.forecast.mode, ForecastMode::Disabled);
        assert_eq!(parsed.forecast.timeout_secs, 30);
        assert_eq!(parsed.server.host, "127.0.0.1");
    }

    #[test]
    fn overrides_replace_only_what_is_given() {
        let mut config = Config::default();
        config.apply_overrides(ConfigOverrides {
            port: Some(8080),
            ..ConfigOverrides::default()
        });
        assert_eq!(config.bind_addr(), "127.0.0.1:8080");
    }

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load(Some(&dir.path().join("absent.toml"))).unwrap();
        assert_eq!(config.server.port, 3001);
    }

    #[test]
    fn written_template_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/config.toml");
        Config::write_template(&path).unwrap();
        let config = Config::load(Some(&path)).unwrap();
        assert_eq!(config.forecast.script, "./utils/use_model.py");
    }

    #[test]
    fn tilde_paths_expand_to_home() {
        if let Some(home) = dirs::home_dir() {
            assert_eq!(expand_tilde("~/x.db"), home.join("x.db"));
        }
        assert_eq!(expand_tilde("/tmp/x.db"), PathBuf::from("/tmp/x.db"));
    }
}
