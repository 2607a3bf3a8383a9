use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::BridgeError;

/// Companion settings, read from `klk.toml`.
#[derive(Debug, Default, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub surface: SurfaceSettings,
    #[serde(default)]
    pub storage: StorageSettings,
    #[serde(default)]
    pub transport: TransportSettings,
}

#[derive(Debug, Deserialize)]
pub struct SurfaceSettings {
    #[serde(default = "default_base_url")]
    pub base_url: String,
}

impl Default for SurfaceSettings {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
        }
    }
}

fn default_base_url() -> String {
    "https://exe44.github.io/pebble-klk/config-web/config-klk.html".into()
}

#[derive(Debug, Default, Deserialize)]
pub struct StorageSettings {
    /// Slot file. Defaults to ~/.klk/config.json when unset.
    pub path: Option<PathBuf>,
    /// Keep the slot in memory only; nothing survives a restart.
    #[serde(default)]
    pub in_memory: bool,
}

#[derive(Debug, Default, Deserialize)]
pub struct TransportSettings {
    /// Resolve every send as delivered without waiting for an ack.
    #[serde(default)]
    pub auto_ack: bool,
}

impl Settings {
    pub fn from_file(path: &Path) -> Result<Self, BridgeError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self, BridgeError> {
        toml::from_str(content)
            .map_err(|e| BridgeError::Settings(format!("Failed to parse settings: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_settings_use_defaults() {
        let settings = Settings::from_toml("").unwrap();
        assert_eq!(
            settings.surface.base_url,
            "https://exe44.github.io/pebble-klk/config-web/config-klk.html"
        );
        assert!(settings.storage.path.is_none());
        assert!(!settings.storage.in_memory);
        assert!(!settings.transport.auto_ack);
    }

    #[test]
    fn parses_full_settings() {
        let toml_str = r#"
[surface]
base_url = "http://localhost:8080/config.html"

[storage]
path = "/var/lib/klk/config.json"

[transport]
auto_ack = true
"#;
        let settings = Settings::from_toml(toml_str).unwrap();
        assert_eq!(
            settings.surface.base_url,
            "http://localhost:8080/config.html"
        );
        assert_eq!(
            settings.storage.path,
            Some(PathBuf::from("/var/lib/klk/config.json"))
        );
        assert!(settings.transport.auto_ack);
    }

    #[test]
    fn rejects_bad_types() {
        let result = Settings::from_toml("[transport]\nauto_ack = \"yes\"\n");
        assert!(matches!(result, Err(BridgeError::Settings(_))));
    }

    #[test]
    fn missing_file_is_io_error() {
        let tmp = tempfile::tempdir().unwrap();
        let result = Settings::from_file(&tmp.path().join("klk.toml"));
        assert!(matches!(result, Err(BridgeError::Io(_))));
    }
}
