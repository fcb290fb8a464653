//! Configuration file support

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

/// Configuration for sage
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Default model to use
    pub model: Option<String>,
    /// Sampling temperature
    pub temperature: Option<f32>,
    /// Maximum tokens per response
    pub max_response_tokens: Option<u32>,
    /// Code span foreground color name
    pub color: Option<String>,
    /// Code span background color name
    pub background_color: Option<String>,
    /// Show the context-usage line after each turn
    pub context_usage: Option<bool>,
    /// API keys (alternative to environment variables)
    #[serde(default)]
    pub api_keys: ApiKeys,
}

/// API key configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiKeys {
    pub openai: Option<String>,
}

impl Config {
    /// Get the config directory
    pub fn config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("sage")
    }

    /// Get the config file path
    pub fn config_path() -> PathBuf {
        // Check for SAGE_CONFIG_PATH env var first
        if let Ok(path) = std::env::var("SAGE_CONFIG_PATH") {
            return PathBuf::from(path);
        }
        Self::config_dir().join("config.toml")
    }

    /// Load config from file
    pub fn load() -> Self {
        let path = Self::config_path();
        if !path.exists() {
            return Self::default();
        }

        match fs::read_to_string(&path) {
            Ok(content) => match toml::from_str(&content) {
                Ok(config) => config,
                Err(e) => {
                    eprintln!("Warning: Failed to parse config file: {}", e);
                    Self::default()
                }
            },
            Err(e) => {
                eprintln!("Warning: Failed to read config file: {}", e);
                Self::default()
            }
        }
    }

    /// Save config to file
    pub fn save(&self) -> std::io::Result<()> {
        let path = Self::config_path();
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)?;
        }

        let content = toml::to_string_pretty(self).map_err(std::io::Error::other)?;
        fs::write(path, content)
    }

    /// Create a default config file if it doesn't exist
    pub fn init() -> std::io::Result<PathBuf> {
        let path = Self::config_path();
        if path.exists() {
            return Ok(path);
        }

        let default_config = Config {
            model: Some(sage_ai::models::DEFAULT_MODEL.to_string()),
            temperature: Some(0.7),
            max_response_tokens: Some(1024),
            color: Some("green".to_string()),
            background_color: Some("black".to_string()),
            context_usage: Some(false),
            api_keys: ApiKeys::default(),
        };

        default_config.save()?;
        Ok(path)
    }

    /// Get the OpenAI API key. The environment variable takes precedence
    /// over the config file.
    pub fn get_api_key(&self) -> Option<String> {
        Self::pick_api_key(
            std::env::var("OPENAI_API_KEY").ok(),
            self.api_keys.openai.clone(),
        )
    }

    fn pick_api_key(env: Option<String>, config: Option<String>) -> Option<String> {
        env.or(config)
    }
}

/// Generate example config content
pub fn example_config() -> &'static str {
    r#"# sage configuration file
# Place at ~/.config/sage/config.toml (Linux/Mac) or %APPDATA%\sage\config.toml (Windows)

# Default model to use
model = "gpt-4-0125-preview"

# Sampling temperature
temperature = 0.7

# Maximum tokens per response
max_response_tokens = 1024

# Code span colors
color = "green"
background_color = "black"

# Show the context-usage line after each turn
context_usage = false

# API keys (optional - can also use environment variables)
# It's recommended to use environment variables instead for security
[api_keys]
# openai = "sk-..."
"#
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_env_key_wins_over_config_key() {
        let picked = Config::pick_api_key(
            Some("sk-from-env".to_string()),
            Some("sk-from-config".to_string()),
        );
        assert_eq!(picked.as_deref(), Some("sk-from-env"));
    }

    #[test]
    fn test_config_key_used_when_env_absent() {
        let picked = Config::pick_api_key(None, Some("sk-from-config".to_string()));
        assert_eq!(picked.as_deref(), Some("sk-from-config"));
    }

    #[test]
    fn test_no_key_anywhere() {
        assert_eq!(Config::pick_api_key(None, None), None);
    }
}
