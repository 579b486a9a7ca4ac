use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::Path;
use tracing::warn;

use crate::coordinator::ImportConfig;
use crate::import::DEFAULT_READ_CHUNK_BYTES;

pub const DEFAULT_CONFIG_PATH: &str = "config/viewer.json";

#[derive(Debug, Clone, Deserialize)]
pub struct WindowConfig {
    #[serde(default = "WindowConfig::default_title")]
    pub title: String,
    #[serde(default = "WindowConfig::default_width")]
    pub width: u32,
    #[serde(default = "WindowConfig::default_height")]
    pub height: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ImportSettings {
    #[serde(default)]
    pub delay_ms: u64,
    #[serde(default)]
    pub profile: bool,
    #[serde(default)]
    pub quit_after_load: bool,
    #[serde(default = "ImportSettings::default_read_chunk_bytes")]
    pub read_chunk_bytes: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HostConfig {
    #[serde(default = "HostConfig::default_frame_interval_ms")]
    pub frame_interval_ms: u64,
    #[serde(default)]
    pub headless: bool,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub window: WindowConfig,
    #[serde(default)]
    pub import: ImportSettings,
    #[serde(default)]
    pub host: HostConfig,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AppConfigOverrides {
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub delay_ms: Option<u64>,
    pub profile: Option<bool>,
    pub quit_after_load: Option<bool>,
    pub headless: Option<bool>,
    pub frame_interval_ms: Option<u64>,
}

impl WindowConfig {
    fn default_title() -> String {
        "glTF Viewer".to_string()
    }

    const fn default_width() -> u32 {
        1280
    }

    const fn default_height() -> u32 {
        720
    }
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self { title: Self::default_title(), width: Self::default_width(), height: Self::default_height() }
    }
}

impl ImportSettings {
    const fn default_read_chunk_bytes() -> usize {
        DEFAULT_READ_CHUNK_BYTES
    }

    pub fn request_config(&self) -> ImportConfig {
        ImportConfig { delay_ms: self.delay_ms, profile: self.profile, quit_after_load: self.quit_after_load }
    }
}

impl Default for ImportSettings {
    fn default() -> Self {
        Self {
            delay_ms: 0,
            profile: false,
            quit_after_load: false,
            read_chunk_bytes: Self::default_read_chunk_bytes(),
        }
    }
}

impl HostConfig {
    const fn default_frame_interval_ms() -> u64 {
        16
    }
}

impl Default for HostConfig {
    fn default() -> Self {
        Self { frame_interval_ms: Self::default_frame_interval_ms(), headless: false }
    }
}

impl AppConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let bytes =
            fs::read(path).with_context(|| format!("Failed to read config file {}", path.display()))?;
        let cfg = serde_json::from_slice(&bytes)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        Ok(cfg)
    }

    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        match Self::load(path) {
            Ok(cfg) => cfg,
            Err(err) => {
                warn!("Config load error: {err:#}. Falling back to defaults.");
                Self::default()
            }
        }
    }

    pub fn apply_overrides(&mut self, overrides: &AppConfigOverrides) {
        if let Some(width) = overrides.width {
            self.window.width = width;
        }
        if let Some(height) = overrides.height {
            self.window.height = height;
        }
        if let Some(delay_ms) = overrides.delay_ms {
            self.import.delay_ms = delay_ms;
        }
        if let Some(profile) = overrides.profile {
            self.import.profile = profile;
        }
        if let Some(quit_after_load) = overrides.quit_after_load {
            self.import.quit_after_load = quit_after_load;
        }
        if let Some(headless) = overrides.headless {
            self.host.headless = headless;
        }
        if let Some(frame_interval_ms) = overrides.frame_interval_ms {
            self.host.frame_interval_ms = frame_interval_ms;
        }
    }
}

impl AppConfigOverrides {
    pub fn is_empty(&self) -> bool {
        self.applied_fields().is_empty()
    }

    pub fn applied_fields(&self) -> Vec<&'static str> {
        let mut fields = Vec::new();
        if self.width.is_some() {
            fields.push("width");
        }
        if self.height.is_some() {
            fields.push("height");
        }
        if self.delay_ms.is_some() {
            fields.push("delay_ms");
        }
        if self.profile.is_some() {
            fields.push("profile");
        }
        if self.quit_after_load.is_some() {
            fields.push("quit_after_load");
        }
        if self.headless.is_some() {
            fields.push("headless");
        }
        if self.frame_interval_ms.is_some() {
            fields.push("frame_interval_ms");
        }
        fields
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn partial_file_keeps_defaults() {
        let mut file = tempfile::NamedTempFile::new().expect("temp config");
        write!(file, r#"{{ "import": {{ "profile": true, "delay_ms": 250 }} }}"#).expect("write config");
        let cfg = AppConfig::load(file.path()).expect("load config");
        assert!(cfg.import.profile);
        assert_eq!(cfg.import.delay_ms, 250);
        assert_eq!(cfg.import.read_chunk_bytes, DEFAULT_READ_CHUNK_BYTES);
        assert_eq!(cfg.window.width, 1280);
        assert_eq!(cfg.host.frame_interval_ms, 16);
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let cfg = AppConfig::load_or_default("does/not/exist.json");
        assert_eq!(cfg.window.title, "glTF Viewer");
        assert_eq!(cfg.import.request_config(), ImportConfig::default());
    }

    #[test]
    fn overrides_replace_only_set_fields() {
        let mut cfg = AppConfig::default();
        let overrides =
            AppConfigOverrides { width: Some(800), quit_after_load: Some(true), ..Default::default() };
        cfg.apply_overrides(&overrides);
        assert_eq!(cfg.window.width, 800);
        assert_eq!(cfg.window.height, 720);
        assert!(cfg.import.quit_after_load);
        assert_eq!(overrides.applied_fields(), vec!["width", "quit_after_load"]);
        assert!(AppConfigOverrides::default().is_empty());
    }
}
