use std::fs;
use std::path::PathBuf;

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};

use crate::assistant::{DEFAULT_CHAT_MODEL, DEFAULT_PRO_MODEL};

/// On-disk settings. The API key may live here for machines where exporting
/// `GEMINI_API_KEY` is inconvenient; the environment variable wins.
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct Config {
    pub api_key: Option<String>,
    pub chat_model: Option<String>,
    pub pro_model: Option<String>,
}

impl Config {
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;

        if !config_path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(&config_path)?;
        let config: Config = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// Resolves the API credential once at startup. Absence is fatal: the
    /// application refuses to start rather than failing on first use.
    pub fn resolve_api_key(&self) -> Result<String> {
        std::env::var("GEMINI_API_KEY")
            .ok()
            .filter(|key| !key.is_empty())
            .or_else(|| self.api_key.clone())
            .ok_or_else(|| {
                anyhow!(
                    "GEMINI_API_KEY environment variable not set \
                     (or add \"api_key\" to the config file)"
                )
            })
    }

    /// Model for chat and image analysis.
    pub fn chat_model(&self) -> String {
        self.chat_model
            .clone()
            .unwrap_or_else(|| DEFAULT_CHAT_MODEL.to_string())
    }

    /// Model for complex consultations.
    pub fn pro_model(&self) -> String {
        self.pro_model
            .clone()
            .unwrap_or_else(|| DEFAULT_PRO_MODEL.to_string())
    }

    pub fn config_path() -> Result<PathBuf> {
        let config_dir =
            dirs::config_dir().ok_or_else(|| anyhow!("Could not determine config directory"))?;

        Ok(config_dir.join("fx2").join("config.json"))
    }
}
