use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use anyhow::{Result, anyhow};

fn default_model() -> String {
    "openhermes:7b-mistral-v2.5-q6_K".to_string()
}

fn default_ollama_url() -> String {
    "http://localhost:11434".to_string()
}

fn default_interpreter() -> String {
    "python3".to_string()
}

fn default_allow_exec() -> bool {
    true
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Config {
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_ollama_url")]
    pub ollama_url: String,
    /// Interpreter used for the `run` command, invoked as `<interpreter> -c <code>`.
    #[serde(default = "default_interpreter")]
    pub interpreter: String,
    /// Extracted code runs unsandboxed; set to false to turn `run` off entirely.
    #[serde(default = "default_allow_exec")]
    pub allow_exec: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            model: default_model(),
            ollama_url: default_ollama_url(),
            interpreter: default_interpreter(),
            allow_exec: default_allow_exec(),
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::get_config_path()?)
    }

    // The config file is user-edited; the app only ever reads it.
    fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let config_content = fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&config_content)?;
        Ok(config)
    }

    fn get_config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow!("Could not determine config directory"))?;

        Ok(config_dir.join("minillama").join("config.json"))
    }
}
