use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

use crate::models::{DEFAULT_MANIFEST_BASE_URL, DEFAULT_MANIFEST_FILE};
use crate::trust::DEFAULT_TRUSTED_REPOS;

const CONFIG_FILE: &str = "config.json";
pub const DEFAULT_ARTIFACT_BASE_URL: &str = "https://media.githubusercontent.com/media";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct HubSettings {
    /// Cache root; `None` means the platform default.
    pub cache_dir: Option<PathBuf>,
    pub manifest_base_url: String,
    pub artifact_base_url: String,
    pub manifest_file: String,
    pub trusted_repos: Vec<String>,
    pub verify_checksums: bool,
    pub user_agent: String,
    pub timeout_secs: Option<u64>,
}

impl Default for HubSettings {
    fn default() -> Self {
        Self {
            cache_dir: None,
            manifest_base_url: DEFAULT_MANIFEST_BASE_URL.into(),
            artifact_base_url: DEFAULT_ARTIFACT_BASE_URL.into(),
            manifest_file: DEFAULT_MANIFEST_FILE.into(),
            trusted_repos: DEFAULT_TRUSTED_REPOS.iter().map(|repo| repo.to_string()).collect(),
            verify_checksums: true,
            user_agent: concat!("onnx-hub/", env!("CARGO_PKG_VERSION")).into(),
            timeout_secs: Some(300),
        }
    }
}

impl HubSettings {
    /// Reads `config.json` from the platform config directory, falling back
    /// to defaults when it does not exist.
    pub fn load_default() -> Result<Self> {
        match resolve_config_path() {
            Some(path) => Self::load(&path),
            None => Ok(Self::default()),
        }
    }

    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let bytes = fs::read(path).with_context(|| format!("failed reading {path:?}"))?;
        serde_json::from_slice(&bytes).context("config json could not be parsed")
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| format!("create dir {parent:?}"))?;
        }
        let serialized =
            serde_json::to_vec_pretty(self).context("serialize settings to json failed")?;
        fs::write(path, serialized).with_context(|| format!("write settings to {path:?}"))?;
        Ok(())
    }

    #[must_use]
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }
}

#[must_use]
pub fn resolve_config_path() -> Option<PathBuf> {
    ProjectDirs::from("org", "onnx", "onnx-hub").map(|dirs| dirs.config_dir().join(CONFIG_FILE))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_yields_defaults() {
        let tmp = tempfile::tempdir().unwrap();
        let settings = HubSettings::load(&tmp.path().join("config.json")).unwrap();
        assert_eq!(settings, HubSettings::default());
        assert!(settings.verify_checksums);
        assert!(settings.trusted_repos.contains(&"onnx/models:main".to_string()));
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("config.json");
        fs::write(
            &path,
            r#"{"cacheDir": "/srv/models", "trustedRepos": ["acme/zoo"], "timeoutSecs": null}"#,
        )
        .unwrap();

        let settings = HubSettings::load(&path).unwrap();
        assert_eq!(settings.cache_dir, Some(PathBuf::from("/srv/models")));
        assert_eq!(settings.trusted_repos, vec!["acme/zoo".to_string()]);
        assert_eq!(settings.timeout(), None);
        assert_eq!(settings.manifest_file, DEFAULT_MANIFEST_FILE);
    }

    #[test]
    fn save_then_load_preserves_settings() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("nested").join("config.json");
        let settings = HubSettings {
            verify_checksums: false,
            ..HubSettings::default()
        };
        settings.save(&path).unwrap();
        assert_eq!(HubSettings::load(&path).unwrap(), settings);
    }

    #[test]
    fn malformed_file_is_an_error() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("config.json");
        fs::write(&path, "{not json").unwrap();
        assert!(HubSettings::load(&path).is_err());
    }
}
