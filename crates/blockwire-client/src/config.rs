use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Deserialize)]
pub struct ClientConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_name")]
    pub player_name: String,
    #[serde(default = "default_locale")]
    pub locale: String,
    #[serde(default = "default_view_distance")]
    pub view_distance: i8,
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
    #[serde(default)]
    pub proxy: Option<ProxyConfig>,
}

#[derive(Debug, Deserialize)]
pub struct ProxyConfig {
    pub listen: String,
    pub upstream: String,
}

fn default_host() -> String {
    "127.0.0.1".into()
}

fn default_port() -> u16 {
    25565
}

fn default_name() -> String {
    "blockwire".into()
}

fn default_locale() -> String {
    "en_US".into()
}

fn default_view_distance() -> i8 {
    10
}

fn default_data_dir() -> String {
    "data".into()
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            player_name: default_name(),
            locale: default_locale(),
            view_distance: default_view_distance(),
            data_dir: default_data_dir(),
            proxy: None,
        }
    }
}

impl ClientConfig {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        if path.exists() {
            let contents = std::fs::read_to_string(path)?;
            let config: ClientConfig = toml::from_str(&contents)?;
            Ok(config)
        } else {
            tracing::info!("No config file found at {}, using defaults", path.display());
            Ok(Self::default())
        }
    }
}
