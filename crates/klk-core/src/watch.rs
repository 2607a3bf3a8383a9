//! Point-in-time facts about the connected watch.

use serde::{Deserialize, Serialize};

use crate::config::Configuration;

/// Query key telling the configuration page whether the watch has a colour display.
pub const KEY_IS_PEBBLE_COLOR: &str = "isPebbleColor";
/// Query key telling the configuration page whether the watch is the aplite class.
pub const KEY_IS_APLITE: &str = "isAplite";

/// Hardware platform class reported by the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Platform {
    /// Lowest-capability class: black and white display.
    Aplite,
    Basalt,
    Chalk,
    Diorite,
    Emery,
    Other(String),
}

impl Platform {
    pub fn as_str(&self) -> &str {
        match self {
            Platform::Aplite => "aplite",
            Platform::Basalt => "basalt",
            Platform::Chalk => "chalk",
            Platform::Diorite => "diorite",
            Platform::Emery => "emery",
            Platform::Other(name) => name,
        }
    }
}

impl From<String> for Platform {
    fn from(name: String) -> Self {
        match name.as_str() {
            "aplite" => Platform::Aplite,
            "basalt" => Platform::Basalt,
            "chalk" => Platform::Chalk,
            "diorite" => Platform::Diorite,
            "emery" => Platform::Emery,
            _ => Platform::Other(name),
        }
    }
}

impl From<&str> for Platform {
    fn from(name: &str) -> Self {
        Platform::from(name.to_string())
    }
}

impl From<Platform> for String {
    fn from(platform: Platform) -> Self {
        platform.as_str().to_string()
    }
}

/// Capability snapshot of the active watch. Never persisted.
///
/// Only the platform class matters for the configuration page; other fields
/// a host reports (model, firmware) are ignored on parse.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WatchInfo {
    pub platform: Platform,
}

impl WatchInfo {
    pub fn new(platform: impl Into<Platform>) -> Self {
        Self {
            platform: platform.into(),
        }
    }

    pub fn is_aplite(&self) -> bool {
        self.platform == Platform::Aplite
    }

    /// Merge the derived capability flags into `config` as 0/1 integers,
    /// overwriting any stored values under the same keys.
    pub fn apply_flags(&self, config: &mut Configuration) {
        let aplite = self.is_aplite();
        config.insert(KEY_IS_PEBBLE_COLOR, i64::from(!aplite));
        config.insert(KEY_IS_APLITE, i64::from(aplite));
    }
}
