use std::sync::Arc;

use klk_store::{SlotStore, StoreError};

use crate::config::Configuration;

/// Typed view over the persisted slot.
///
/// The slot is the single source of truth for the next configuration URL.
/// Anything unreadable in it is treated as "no configuration" so a corrupt
/// or legacy blob never blocks the configuration flow.
#[derive(Clone)]
pub struct ConfigStore {
    slot: Arc<dyn SlotStore>,
}

impl ConfigStore {
    pub fn new(slot: Arc<dyn SlotStore>) -> Self {
        Self { slot }
    }

    /// Last saved configuration, or empty.
    pub fn load(&self) -> Configuration {
        let blob = match self.slot.read() {
            Ok(Some(blob)) => blob,
            Ok(None) => return Configuration::new(),
            Err(e) => {
                tracing::warn!(
                    backend = self.slot.backend_name(),
                    "Failed to read config slot: {e}"
                );
                return Configuration::new();
            }
        };

        match Configuration::from_json(&blob) {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!(
                    backend = self.slot.backend_name(),
                    "Stored config unparsable, using empty config: {e}"
                );
                Configuration::new()
            }
        }
    }

    /// Overwrite the slot with `config`.
    pub fn save(&self, config: &Configuration) -> Result<(), StoreError> {
        let blob = config
            .to_json()
            .map_err(|e| StoreError::Unavailable(format!("cannot serialize config: {e}")))?;
        self.slot.write(&blob)?;
        tracing::info!(
            backend = self.slot.backend_name(),
            keys = config.len(),
            "Config saved"
        );
        Ok(())
    }

    pub fn backend_name(&self) -> &str {
        self.slot.backend_name()
    }
}

#[cfg(test)]
mod tests {
    use klk_store::{FileSlotStore, MemorySlotStore};

    use super::*;

    fn memory_store() -> ConfigStore {
        ConfigStore::new(Arc::new(MemorySlotStore::new()))
    }

    #[test]
    fn load_without_save_is_empty() {
        assert!(memory_store().load().is_empty());
    }

    #[test]
    fn load_after_save_round_trips() {
        let store = memory_store();
        let config =
            Configuration::from_json(r#"{"units":"metric","hour24":true,"offset":-2}"#).unwrap();

        store.save(&config).unwrap();
        assert_eq!(store.load(), config);
    }

    #[test]
    fn empty_config_round_trips() {
        let store = memory_store();
        store.save(&Configuration::new()).unwrap();
        assert!(store.load().is_empty());
    }

    #[test]
    fn save_replaces_wholesale() {
        let store = memory_store();
        store
            .save(&Configuration::from_json(r#"{"a":1,"b":2}"#).unwrap())
            .unwrap();
        store
            .save(&Configuration::from_json(r#"{"c":3}"#).unwrap())
            .unwrap();

        let loaded = store.load();
        assert_eq!(loaded.keys().collect::<Vec<_>>(), vec!["c"]);
    }

    #[test]
    fn corrupt_blob_degrades_to_empty() {
        let store = ConfigStore::new(Arc::new(MemorySlotStore::with_blob("{not json")));
        assert!(store.load().is_empty());
    }

    #[test]
    fn legacy_non_scalar_blob_degrades_to_empty() {
        let store = ConfigStore::new(Arc::new(MemorySlotStore::with_blob(
            r#"{"colors":["red","blue"]}"#,
        )));
        assert!(store.load().is_empty());
    }

    #[test]
    fn file_backed_store_survives_restart() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("config.json");
        let config = Configuration::from_json(r#"{"units":"imperial"}"#).unwrap();

        ConfigStore::new(Arc::new(FileSlotStore::new(path.clone())))
            .save(&config)
            .unwrap();

        let reopened = ConfigStore::new(Arc::new(FileSlotStore::new(path)));
        assert_eq!(reopened.load(), config);
    }
}
