use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::paths::resolve_home_dir;

/// Subdirectory of the user's home used when `server.home_dir` is not set.
pub const DEFAULT_HOME_SUBDIR: &str = ".jsonapi-server";

/// Server configuration: typed global sections plus a per-module bag.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    pub server: ServerConfig,
    /// Logging sections; defaults apply when absent.
    pub logging: Option<LoggingConfig>,
    /// Directory of `<module>.yaml` files merged into `modules`.
    #[serde(default)]
    pub modules_dir: Option<String>,
    /// module name -> raw section, decoded by the module itself.
    #[serde(default)]
    pub modules: HashMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    /// Normalized to an absolute path on load.
    pub home_dir: String,
    pub host: String,
    pub port: u16,
    #[serde(default)]
    pub timeout_sec: u64,
}

/// Subsystem (crate name) -> logging section. `default` catches every other target.
pub type LoggingConfig = HashMap<String, Section>;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Section {
    /// `trace`, `debug`, `info`, `warn`, `error` or `off`.
    pub console_level: String,
    /// Relative paths are resolved against `server.home_dir`; empty disables the file.
    pub file: String,
    #[serde(default)]
    pub file_level: String,
    /// Rotated files older than this are removed.
    pub max_age_days: Option<u32>,
    /// Rotated files kept; takes precedence over `max_age_days`.
    #[serde(default)]
    pub max_backups: Option<usize>,
    #[serde(default)]
    pub max_size_mb: Option<u64>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            // empty: $HOME/.jsonapi-server (%APPDATA% on Windows)
            home_dir: String::new(),
            host: "127.0.0.1".to_string(),
            port: 8087,
            timeout_sec: 0,
        }
    }
}

pub fn default_logging_config() -> LoggingConfig {
    HashMap::from([(
        "default".to_string(),
        Section {
            console_level: "info".to_string(),
            file: "logs/jsonapi-server.log".to_string(),
            file_level: "debug".to_string(),
            max_age_days: Some(7),
            max_backups: Some(3),
            max_size_mb: Some(100),
        },
    )])
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            logging: Some(default_logging_config()),
            modules_dir: None,
            modules: HashMap::new(),
        }
    }
}

impl AppConfig {
    /// Defaults, then the YAML file, then `APP__`-prefixed environment variables
    /// (`APP__SERVER__PORT=8087` sets `server.port`).
    pub fn load_layered<P: AsRef<Path>>(config_path: P) -> Result<Self> {
        use figment::{
            providers::{Env, Format, Serialized, Yaml},
            Figment,
        };

        if !config_path.as_ref().is_file() {
            anyhow::bail!("config file not found: {}", config_path.as_ref().display());
        }

        // Optional sections stay unset unless the file or the environment provide them.
        let base = AppConfig {
            logging: None,
            ..AppConfig::default()
        };

        let mut config: AppConfig = Figment::new()
            .merge(Serialized::defaults(base))
            .merge(Yaml::file(config_path.as_ref()))
            .merge(Env::prefixed("APP__").split("__"))
            .extract()
            .with_context(|| {
                format!(
                    "failed to load configuration from {}",
                    config_path.as_ref().display()
                )
            })?;

        normalize_home_dir(&mut config.server).context("failed to resolve server.home_dir")?;
        if let Some(dir) = config.modules_dir.clone() {
            merge_module_files(&mut config.modules, dir)?;
        }
        Ok(config)
    }

    /// Layered load when a path is given, plain defaults otherwise.
    pub fn load_or_default<P: AsRef<Path>>(config_path: Option<P>) -> Result<Self> {
        match config_path {
            Some(path) => Self::load_layered(path),
            None => {
                let mut config = Self::default();
                normalize_home_dir(&mut config.server)
                    .context("failed to resolve default server.home_dir")?;
                Ok(config)
            }
        }
    }

    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self).context("failed to serialize config to YAML")
    }

    pub fn apply_cli_overrides(&mut self, args: &CliArgs) {
        if let Some(port) = args.port {
            self.server.port = port;
        }

        let logging = self.logging.get_or_insert_with(default_logging_config);
        if let Some(section) = logging.get_mut("default") {
            match args.verbose {
                0 => {}
                1 => section.console_level = "debug".to_string(),
                _ => section.console_level = "trace".to_string(),
            }
        }
    }

    /// Decode the `modules.<name>` section. A missing section yields `T::default()`;
    /// a malformed one is an error naming the module.
    pub fn module_config<T: DeserializeOwned + Default>(&self, name: &str) -> Result<T> {
        match self.modules.get(name) {
            Some(raw) => serde_json::from_value(raw.clone())
                .with_context(|| format!("invalid `{name}` module config")),
            None => Ok(T::default()),
        }
    }

    pub fn home_dir(&self) -> PathBuf {
        PathBuf::from(&self.server.home_dir)
    }
}

/// Command line arguments relevant to configuration.
#[derive(Debug, Clone, Default)]
pub struct CliArgs {
    pub config: Option<String>,
    pub port: Option<u16>,
    pub print_config: bool,
    pub verbose: u8,
}

fn normalize_home_dir(server: &mut ServerConfig) -> Result<()> {
    let configured = Some(server.home_dir.trim())
        .filter(|dir| !dir.is_empty())
        .map(str::to_string);
    let resolved = resolve_home_dir(configured, DEFAULT_HOME_SUBDIR, true)?;
    server.home_dir = resolved.to_string_lossy().into_owned();
    Ok(())
}

fn merge_module_files(
    bag: &mut HashMap<String, serde_json::Value>,
    dir: impl AsRef<Path>,
) -> Result<()> {
    let dir = dir.as_ref();
    if !dir.exists() {
        return Ok(());
    }
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        let is_yaml = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("yml") || ext.eq_ignore_ascii_case("yaml"));
        let Some(name) = path.file_stem().and_then(|s| s.to_str()) else {
            continue;
        };
        if !path.is_file() || !is_yaml {
            continue;
        }
        let raw = std::fs::read_to_string(&path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let value: serde_yaml::Value = serde_yaml::from_str(&raw)
            .with_context(|| format!("invalid YAML in {}", path.display()))?;
        bag.insert(name.to_string(), serde_json::to_value(value)?);
    }
    Ok(())
}
