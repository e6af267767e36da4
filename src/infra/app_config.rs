use crate::application::{ClassifierOptions, ThreadingOptions};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

pub const CONFIG_PATH_ENV: &str = "PRESTO_CONFIG_PATH";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    /// Where `analyze` creates session directories. Current directory when
    /// unset.
    pub sessions_root: Option<PathBuf>,
    pub threading: ThreadingOptions,
    pub classifier: ClassifierOptions,
}

impl AppConfig {
    pub fn sessions_root(&self) -> PathBuf {
        self.sessions_root
            .clone()
            .unwrap_or_else(|| PathBuf::from("."))
    }
}

/// Read the config file. A missing file yields defaults; an unreadable or
/// invalid one is reported and also yields defaults.
pub fn load_config() -> AppConfig {
    let path = config_path();
    let contents = match std::fs::read_to_string(&path) {
        Ok(contents) => contents,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return AppConfig::default(),
        Err(err) => {
            log::warn!("cannot read config {}: {err}", path.display());
            return AppConfig::default();
        }
    };
    parse_config(&contents).unwrap_or_else(|err| {
        log::warn!("ignoring invalid config {}: {err}", path.display());
        AppConfig::default()
    })
}

fn parse_config(contents: &str) -> Result<AppConfig, toml::de::Error> {
    toml::from_str(contents)
}

pub fn config_path() -> PathBuf {
    if let Ok(path) = std::env::var(CONFIG_PATH_ENV) {
        return PathBuf::from(path);
    }

    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("presto")
        .join("config.toml")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_is_defaults() {
        let config = parse_config("").unwrap();
        assert_eq!(config, AppConfig::default());
        assert_eq!(config.sessions_root(), PathBuf::from("."));
        assert!(config.threading.merge_by_location);
    }

    #[test]
    fn sections_override_defaults() {
        let config = parse_config(
            r#"
            sessions_root = "/tmp/reviews"

            [threading]
            merge_by_location = false

            [classifier]
            bot_authors = ["ci-helper"]
            trivial_max_length = 12
            "#,
        )
        .unwrap();
        assert_eq!(config.sessions_root(), PathBuf::from("/tmp/reviews"));
        assert!(!config.threading.merge_by_location);
        assert_eq!(config.classifier.bot_authors, vec!["ci-helper".to_string()]);
        assert_eq!(config.classifier.trivial_max_length, 12);
    }

    #[test]
    fn invalid_file_is_an_error() {
        assert!(parse_config("threading = 3").is_err());
    }
}
