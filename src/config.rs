use directories::ProjectDirs;
use serde::Deserialize;
use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

pub const DEFAULT_ADDR: &str = "127.0.0.1:8080";
pub const DEFAULT_LOG: &str = "taskpad=info,tower_http=info";

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("reading config {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("parsing config {path:?}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
    #[error("invalid listen address {0:?}")]
    Addr(String),
    #[error("could not locate a data directory")]
    NoDataDir,
}

/// Optional settings read from `taskpad.yml`.
#[derive(Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    pub addr: Option<String>,
    pub data_file: Option<PathBuf>,
    pub log: Option<String>,
}

/// Values given on the command line or through the environment.
#[derive(Debug, Default, Clone)]
pub struct Overrides {
    pub config: Option<PathBuf>,
    pub addr: Option<String>,
    pub data_file: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub addr: SocketAddr,
    pub data_file: PathBuf,
    pub log: String,
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let data = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        if data.trim().is_empty() {
            return Ok(FileConfig::default());
        }
        serde_yaml::from_str(&data).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }
}

impl Config {
    /// Flags and environment win over the config file, which wins over
    /// built-in defaults. An explicit `--config` must exist; the default one
    /// is optional.
    pub fn resolve(overrides: Overrides) -> Result<Self, ConfigError> {
        let file = match &overrides.config {
            Some(path) => FileConfig::load(path)?,
            None => match default_config_path() {
                Some(path) if path.exists() => FileConfig::load(&path)?,
                _ => FileConfig::default(),
            },
        };
        Config::merge(overrides, file, default_data_file)
    }

    fn merge(
        overrides: Overrides,
        file: FileConfig,
        default_data: impl FnOnce() -> Option<PathBuf>,
    ) -> Result<Self, ConfigError> {
        let addr_raw = overrides
            .addr
            .or(file.addr)
            .unwrap_or_else(|| DEFAULT_ADDR.to_string());
        let addr = addr_raw
            .parse()
            .map_err(|_| ConfigError::Addr(addr_raw.clone()))?;
        let data_file = match overrides.data_file.or(file.data_file) {
            Some(path) => path,
            None => default_data().ok_or(ConfigError::NoDataDir)?,
        };
        Ok(Config {
            addr,
            data_file,
            log: file.log.unwrap_or_else(|| DEFAULT_LOG.to_string()),
        })
    }
}

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("", "", "taskpad")
}

fn default_config_path() -> Option<PathBuf> {
    project_dirs().map(|d| d.config_dir().join("taskpad.yml"))
}

fn default_data_file() -> Option<PathBuf> {
    project_dirs().map(|d| d.data_dir().join("tasks.json"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fallback() -> Option<PathBuf> {
        Some(PathBuf::from("/default/tasks.json"))
    }

    #[test]
    fn defaults_apply_when_nothing_is_set() {
        let config = Config::merge(Overrides::default(), FileConfig::default(), fallback).unwrap();
        assert_eq!(config.addr, DEFAULT_ADDR.parse().unwrap());
        assert_eq!(config.data_file, PathBuf::from("/default/tasks.json"));
        assert_eq!(config.log, DEFAULT_LOG);
    }

    #[test]
    fn overrides_beat_file_values() {
        let file = FileConfig {
            addr: Some("0.0.0.0:9000".into()),
            data_file: Some("/file/tasks.json".into()),
            log: Some("debug".into()),
        };
        let overrides = Overrides {
            addr: Some("127.0.0.1:3000".into()),
            ..Overrides::default()
        };
        let config = Config::merge(overrides, file, fallback).unwrap();
        assert_eq!(config.addr, "127.0.0.1:3000".parse().unwrap());
        assert_eq!(config.data_file, PathBuf::from("/file/tasks.json"));
        assert_eq!(config.log, "debug");
    }

    #[test]
    fn bad_addr_is_rejected() {
        let overrides = Overrides {
            addr: Some("localhost".into()),
            ..Overrides::default()
        };
        assert!(matches!(
            Config::merge(overrides, FileConfig::default(), fallback),
            Err(ConfigError::Addr(_))
        ));
    }

    #[test]
    fn missing_data_dir_is_an_error() {
        assert!(matches!(
            Config::merge(Overrides::default(), FileConfig::default(), || None),
            Err(ConfigError::NoDataDir)
        ));
    }

    #[test]
    fn loads_yaml_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("taskpad.yml");
        fs::write(&path, "addr: 0.0.0.0:8081\ndata_file: /srv/tasks.json\n").unwrap();
        let file = FileConfig::load(&path).unwrap();
        assert_eq!(file.addr.as_deref(), Some("0.0.0.0:8081"));
        assert_eq!(file.data_file, Some(PathBuf::from("/srv/tasks.json")));
        assert_eq!(file.log, None);

        fs::write(&path, "port: 1\n").unwrap();
        assert!(matches!(
            FileConfig::load(&path),
            Err(ConfigError::Parse { .. })
        ));
    }

    #[test]
    fn explicit_missing_config_is_an_error() {
        let overrides = Overrides {
            config: Some("/definitely/not/here.yml".into()),
            ..Overrides::default()
        };
        assert!(matches!(
            Config::resolve(overrides),
            Err(ConfigError::Read { .. })
        ));
    }
}
