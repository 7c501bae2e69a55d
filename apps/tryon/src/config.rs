use std::{collections::HashMap, fs, path::Path, path::PathBuf, time::Duration};

use anyhow::bail;
use gateway::{
    gemini::{DEFAULT_API_BASE_URL, DEFAULT_MODEL},
    GeminiConfig,
};

pub const SETTINGS_FILE: &str = "tryon.toml";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub api_key: Option<String>,
    pub model: String,
    pub api_base_url: String,
    pub output_dir: PathBuf,
    pub request_timeout_seconds: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_key: None,
            model: DEFAULT_MODEL.into(),
            api_base_url: DEFAULT_API_BASE_URL.into(),
            output_dir: PathBuf::from("./tryon-output"),
            request_timeout_seconds: 180,
        }
    }
}

impl Settings {
    pub fn gemini_config(&self) -> anyhow::Result<GeminiConfig> {
        let Some(api_key) = self.api_key.as_deref().map(str::trim).filter(|k| !k.is_empty())
        else {
            bail!("no image model API key configured; set GEMINI_API_KEY or api_key in {SETTINGS_FILE}");
        };
        Ok(GeminiConfig {
            api_key: api_key.to_string(),
            model: self.model.clone(),
            api_base_url: self.api_base_url.clone(),
            request_timeout: Duration::from_secs(self.request_timeout_seconds),
        })
    }
}

pub fn load_settings() -> Settings {
    load_settings_from(Path::new(SETTINGS_FILE), |key| std::env::var(key).ok())
}

/// Defaults, then `path` (flat string keys), then environment variables.
pub fn load_settings_from(path: &Path, env: impl Fn(&str) -> Option<String>) -> Settings {
    let mut settings = Settings::default();

    if let Ok(raw) = fs::read_to_string(path) {
        if let Ok(file_cfg) = toml::from_str::<HashMap<String, String>>(&raw) {
            if let Some(v) = file_cfg.get("api_key") {
                settings.api_key = Some(v.clone());
            }
            if let Some(v) = file_cfg.get("model") {
                settings.model = v.clone();
            }
            if let Some(v) = file_cfg.get("api_base_url") {
                settings.api_base_url = v.clone();
            }
            if let Some(v) = file_cfg.get("output_dir") {
                settings.output_dir = PathBuf::from(v);
            }
            if let Some(v) = file_cfg.get("request_timeout_seconds") {
                if let Ok(parsed) = v.parse::<u64>() {
                    settings.request_timeout_seconds = parsed;
                }
            }
        }
    }

    if let Some(v) = env("API_KEY") {
        settings.api_key = Some(v);
    }
    if let Some(v) = env("GEMINI_API_KEY") {
        settings.api_key = Some(v);
    }

    if let Some(v) = env("APP__MODEL") {
        settings.model = v;
    }

    if let Some(v) = env("APP__API_BASE_URL") {
        settings.api_base_url = v;
    }

    if let Some(v) = env("APP__OUTPUT_DIR") {
        settings.output_dir = PathBuf::from(v);
    }

    if let Some(v) = env("APP__REQUEST_TIMEOUT_SECONDS") {
        if let Ok(parsed) = v.parse::<u64>() {
            settings.request_timeout_seconds = parsed;
        }
    }

    settings
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
