use crate::error::Result;
use crate::models::BackendKind;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

pub const CONFIG_FILE: &str = ".patchit.toml";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    pub editor: Option<String>,
    pub package_manager: Option<BackendKind>,
    pub scratch_dir: String,
    pub command_timeout_secs: Option<u64>,
    pub watch: WatchSettings,
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct WatchSettings {
    pub stability_threshold_ms: u64,
    pub poll_interval_ms: u64,
    pub retry_delay_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            editor: None,
            package_manager: None,
            scratch_dir: ".patchit".to_string(),
            command_timeout_secs: None,
            watch: WatchSettings::default(),
        }
    }
}

impl Default for WatchSettings {
    fn default() -> Self {
        Self {
            stability_threshold_ms: 2000,
            poll_interval_ms: 100,
            retry_delay_ms: 100,
        }
    }
}

impl WatchSettings {
    pub fn stability_threshold(&self) -> Duration {
        Duration::from_millis(self.stability_threshold_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}

impl Config {
    /// Loads `.patchit.toml` from the project root, or defaults when absent.
    pub fn load(project_root: &Path) -> Result<Self> {
        let path = project_root.join(CONFIG_FILE);
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(&path)?;
        let config = Self::parse(&content)?;
        tracing::debug!("Loaded config from {:?}", path);
        Ok(config)
    }

    pub fn parse(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    pub fn command_timeout(&self) -> Option<Duration> {
        self.command_timeout_secs.map(Duration::from_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults_when_file_missing() {
        let temp_dir = TempDir::new().unwrap();
        let config = Config::load(temp_dir.path()).unwrap();

        assert!(config.editor.is_none());
        assert!(config.package_manager.is_none());
        assert_eq!(config.scratch_dir, ".patchit");
        assert!(config.command_timeout().is_none());
        assert_eq!(config.watch.stability_threshold(), Duration::from_millis(2000));
        assert_eq!(config.watch.poll_interval(), Duration::from_millis(100));
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let config = Config::parse(
            r#"
            editor = "zed"
            package_manager = "yarn"

            [watch]
            stability_threshold_ms = 500
            "#,
        )
        .unwrap();

        assert_eq!(config.editor.as_deref(), Some("zed"));
        assert_eq!(config.package_manager, Some(BackendKind::Yarn));
        assert_eq!(config.watch.stability_threshold_ms, 500);
        assert_eq!(config.watch.poll_interval_ms, 100);
        assert_eq!(config.watch.retry_delay_ms, 100);
    }

    #[test]
    fn test_load_from_project_root() {
        let temp_dir = TempDir::new().unwrap();
        std::fs::write(
            temp_dir.path().join(CONFIG_FILE),
            "command_timeout_secs = 30\nscratch_dir = \".patches\"\n",
        )
        .unwrap();

        let config = Config::load(temp_dir.path()).unwrap();
        assert_eq!(config.command_timeout(), Some(Duration::from_secs(30)));
        assert_eq!(config.scratch_dir, ".patches");
    }

    #[test]
    fn test_unknown_backend_is_rejected() {
        assert!(Config::parse("package_manager = \"npm\"").is_err());
    }
}
