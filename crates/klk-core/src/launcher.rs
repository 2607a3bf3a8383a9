use std::sync::Arc;

use crate::host::HostPlatform;
use crate::store::ConfigStore;

/// Opens the configuration page with the stored configuration and the
/// watch's capability flags encoded as query parameters.
pub struct Launcher {
    base_url: String,
    store: ConfigStore,
    host: Arc<dyn HostPlatform>,
}

impl Launcher {
    pub fn new(
        base_url: impl Into<String>,
        store: ConfigStore,
        host: Arc<dyn HostPlatform>,
    ) -> Self {
        Self {
            base_url: base_url.into(),
            store,
            host,
        }
    }

    /// Build the configuration URL for the current stored state.
    ///
    /// Capability flags are merged into a copy; the store is not touched.
    pub fn build_url(&self) -> String {
        let mut config = self.store.load();

        match self.host.active_watch_info() {
            Some(watch) => {
                tracing::debug!(platform = watch.platform.as_str(), "Watch info available");
                watch.apply_flags(&mut config);
            }
            None => tracing::debug!("No watch info from host, capability flags omitted"),
        }

        for (key, value) in config.iter() {
            tracing::debug!(key, %value, "Config parameter");
        }

        format!("{}{}", self.base_url, config.to_query_string())
    }

    /// Handle a show-configuration request: build the URL and ask the host to
    /// open it. Does not wait for the page; its result arrives as a separate
    /// event. Returns the URL that was opened.
    pub fn show_configuration(&self, payload: &serde_json::Value) -> String {
        tracing::info!(%payload, "Show configuration requested");

        let url = self.build_url();
        tracing::info!(url = %url, "Opening configuration surface");
        self.host.open_url(&url);
        url
    }
}
