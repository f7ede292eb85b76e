use anyhow::{Context, Result};
use async_trait::async_trait;
use std::path::PathBuf;

use crate::model::Settings;

/// Supplies the operator settings and the keyword list.
///
/// Implementations must re-read their backing store on every call: the
/// orchestrator deliberately never caches settings between runs.
#[async_trait]
pub trait SettingsSource: Send + Sync {
    async fn load(&self) -> Result<Settings>;
    async fn keywords(&self) -> Result<Vec<String>>;
}

/// `SettingsSource` backed by the TOML config file(s) on disk.
pub struct FileSettings {
    default_path: Option<PathBuf>,
    override_path: Option<PathBuf>,
}

impl FileSettings {
    pub fn new(default_path: Option<PathBuf>, override_path: Option<PathBuf>) -> Self {
        Self {
            default_path,
            override_path,
        }
    }

    /// Convenience for a single config file.
    pub fn single(path: impl Into<PathBuf>) -> Self {
        Self::new(None, Some(path.into()))
    }

    async fn read(&self) -> Result<common::Config> {
        common::Config::load_with_defaults(
            self.default_path.as_deref(),
            self.override_path.as_deref(),
        )
        .await
        .context("failed to reload configuration")
    }
}

#[async_trait]
impl SettingsSource for FileSettings {
    async fn load(&self) -> Result<Settings> {
        let cfg = self.read().await?;
        Ok(Settings {
            regions: cfg.curation.regions,
            language: cfg.curation.language,
            limit: cfg.curation.limit,
        })
    }

    async fn keywords(&self) -> Result<Vec<String>> {
        let cfg = self.read().await?;
        Ok(cfg.curation.keywords)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn file_settings_reflect_edits_without_restart() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("config.toml");
        let base = r#"
            [database]
            path = "data/test.db"

            [scheduler]

            [curation]
            regions = ["US"]
            language = "en"
            limit = 3
            keywords = ["rust"]
        "#;
        tokio::fs::write(&path, base).await.expect("write config");

        let source = FileSettings::single(&path);
        let settings = source.load().await.expect("load");
        assert_eq!(settings.limit, 3);
        assert_eq!(source.keywords().await.expect("keywords"), vec!["rust"]);

        // Edit on disk; the next call picks it up.
        let edited = base.replace("limit = 3", "limit = 7");
        tokio::fs::write(&path, edited).await.expect("rewrite config");
        let settings = source.load().await.expect("reload");
        assert_eq!(settings.limit, 7);
    }
}
