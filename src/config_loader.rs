use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::vulkan::window_settings::PresentMode;

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Config {
    pub window_width: u32,
    pub window_height: u32,
    pub present_mode: PresentMode,
    pub shader_dir: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            window_width: 1280,
            window_height: 720,
            present_mode: PresentMode::Fifo,
            shader_dir: "assets/shaders".to_string(),
        }
    }
}

pub struct ConfigFileLoader {
    pub path: PathBuf,
    config: Option<Config>,
}

impl ConfigFileLoader {
    pub fn new(path: &str) -> Self {
        Self {
            path: path.into(),
            config: None,
        }
    }

    pub fn load_config(&mut self) -> &Config {
        let config = match std::fs::read_to_string(&self.path) {
            Ok(content) => serde_json::from_str(&content).unwrap_or_else(|e| {
                tracing::warn!("config file {:?} is invalid ({e}), using defaults", self.path);
                Config::default()
            }),
            Err(_) => {
                let config = Config::default();
                self.config = Some(config.clone());
                self.save_config();
                config
            }
        };
        self.config = Some(config);
        self.config.as_ref().unwrap()
    }

    pub fn save_config(&self) {
        if let Some(config) = &self.config {
            if let Ok(content) = serde_json::to_string_pretty(config) {
                let _ = std::fs::write(&self.path, content);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_round_trips_through_json() {
        let config = Config::default();
        let json = serde_json::to_string(&config).unwrap();
        let parsed: Config = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.window_width, config.window_width);
        assert_eq!(parsed.window_height, config.window_height);
        assert_eq!(parsed.shader_dir, config.shader_dir);
    }
}
