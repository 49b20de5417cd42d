use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use serde::Deserialize;

use crate::automation::ConfigPatch;
use crate::error::{AppError, AppResult};

pub const REGISTRY_URL: &str =
    "https://raw.githubusercontent.com/bombfork/data-breaker-registry/main/brokers.json";

const CONFIG_FILE: &str = "config.json";

/// Contents of the optional `config.json` in the config directory.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileConfig {
    #[serde(default)]
    pub automation: ConfigPatch,
    pub registry_url: Option<String>,
    /// Extra domains automation may target, on top of the built-in list.
    #[serde(default)]
    pub allowed_domains: Vec<String>,
}

impl FileConfig {
    pub fn registry_url(&self) -> &str {
        self.registry_url
            .as_deref()
            .map(str::trim)
            .filter(|u| !u.is_empty())
            .unwrap_or(REGISTRY_URL)
    }
}

pub fn project_dirs() -> AppResult<ProjectDirs> {
    ProjectDirs::from("", "bombfork", "data-breaker")
        .ok_or_else(|| AppError::Config("could not determine home directory".into()))
}

pub fn db_path() -> AppResult<PathBuf> {
    let dirs = project_dirs()?;
    let data_dir = dirs.data_dir();
    std::fs::create_dir_all(data_dir)?;
    Ok(data_dir.join("data-breaker.db"))
}

pub fn config_path() -> AppResult<PathBuf> {
    Ok(project_dirs()?.config_dir().join(CONFIG_FILE))
}

/// Read `config.json` from the config directory. A missing file is the empty
/// config.
pub fn load() -> AppResult<FileConfig> {
    load_from(&config_path()?)
}

/// A file that is present but not valid JSON is ignored with a warning.
pub fn load_from(path: &Path) -> AppResult<FileConfig> {
    let raw = match std::fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(FileConfig::default()),
        Err(e) => return Err(e.into()),
    };

    match serde_json::from_str(&raw) {
        Ok(config) => {
            tracing::debug!("Loaded configuration from {}", path.display());
            Ok(config)
        }
        Err(e) => {
            tracing::warn!("Ignoring malformed {}: {e}", path.display());
            Ok(FileConfig::default())
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn test_missing_file_is_default() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_from(&dir.path().join("config.json")).unwrap();
        assert!(config.automation.timeout_ms.is_none());
        assert_eq!(config.registry_url(), REGISTRY_URL);
    }

    #[test]
    fn test_reads_automation_patch() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"automation": {{"timeoutMs": 5000, "headless": false}},
                "registryUrl": "https://example.org/brokers.json",
                "allowedDomains": ["example.org"]}}"#
        )
        .unwrap();

        let config = load_from(file.path()).unwrap();
        assert_eq!(config.automation.timeout_ms, Some(5000));
        assert_eq!(config.automation.headless, Some(false));
        assert_eq!(config.registry_url(), "https://example.org/brokers.json");
        assert_eq!(config.allowed_domains, vec!["example.org".to_string()]);
    }

    #[test]
    fn test_malformed_file_is_ignored() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{{not json").unwrap();
        let config = load_from(file.path()).unwrap();
        assert!(config.registry_url.is_none());
    }

    #[test]
    fn test_blank_registry_url_falls_back() {
        let config = FileConfig {
            registry_url: Some("  ".into()),
            ..Default::default()
        };
        assert_eq!(config.registry_url(), REGISTRY_URL);
    }
}
