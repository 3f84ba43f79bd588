use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{DescontosError, Result};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub default_sheet: Option<String>,
    /// Rows shown in the text detail table; 0 shows every row.
    #[serde(default = "default_detail_limit")]
    pub detail_limit: usize,
}

fn default_detail_limit() -> usize {
    50
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            default_sheet: None,
            detail_limit: default_detail_limit(),
        }
    }
}

fn config_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config")
        .join("descontos")
}

pub fn settings_path() -> PathBuf {
    config_dir().join("settings.json")
}

pub fn load_settings() -> Settings {
    load_settings_from(&settings_path())
}

pub fn load_settings_from(path: &Path) -> Settings {
    let Ok(content) = std::fs::read_to_string(path) else {
        return Settings::default();
    };
    match serde_json::from_str(&content) {
        Ok(settings) => settings,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "ignoring malformed settings");
            Settings::default()
        }
    }
}

pub fn save_settings(settings: &Settings) -> Result<()> {
    save_settings_to(&settings_path(), settings)
}

pub fn save_settings_to(path: &Path, settings: &Settings) -> Result<()> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir)?;
    }
    let json = serde_json::to_string_pretty(settings)
        .map_err(|e| DescontosError::Settings(e.to_string()))?;
    std::fs::write(path, format!("{json}\n"))?;
    Ok(())
}

/// Apply `config set KEY VALUE`.
pub fn set_value(settings: &mut Settings, key: &str, value: &str) -> Result<()> {
    match key {
        "default_sheet" => {
            let v = value.trim();
            settings.default_sheet = if v.is_empty() { None } else { Some(v.to_string()) };
        }
        "detail_limit" => {
            settings.detail_limit = value.trim().parse().map_err(|_| {
                DescontosError::Settings(format!("detail_limit must be a whole number, got '{value}'"))
            })?;
        }
        other => {
            return Err(DescontosError::Settings(format!(
                "Unknown key '{other}' (expected default_sheet or detail_limit)"
            )))
        }
    }
    Ok(())
}

/// Sheet to open when none was requested: the configured default if the
/// file has it, else the first sheet.
pub fn pick_sheet(settings: &Settings, available: &[String]) -> Option<String> {
    settings
        .default_sheet
        .as_ref()
        .filter(|s| available.contains(s))
        .or_else(|| available.first())
        .cloned()
}
