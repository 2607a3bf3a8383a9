use crate::config::Configuration;
use crate::error::BridgeError;
use crate::relay::{Dispatch, MessageRelay};
use crate::store::ConfigStore;

/// What a `webviewclosed` response turned into.
pub enum Ingested {
    /// Empty response: the user closed the page without submitting.
    Dismissed,
    /// A configuration was persisted and handed to the relay.
    Submitted {
        config: Configuration,
        dispatch: Dispatch,
    },
}

/// Persists configuration page responses and forwards them to the watch.
pub struct ResponseIngest {
    store: ConfigStore,
    relay: MessageRelay,
}

impl ResponseIngest {
    pub fn new(store: ConfigStore, relay: MessageRelay) -> Self {
        Self { store, relay }
    }

    /// Handle the percent-encoded response of a closed configuration page.
    ///
    /// A malformed non-empty response is returned as an error: it is neither
    /// persisted nor relayed. A store write failure is also returned and
    /// nothing is relayed.
    pub fn ingest(&self, raw: &str) -> Result<Ingested, BridgeError> {
        let decoded = decode_response(raw)?;
        tracing::info!(response = %decoded, "Configuration surface closed");

        if decoded.is_empty() {
            tracing::debug!("Empty response, nothing submitted");
            return Ok(Ingested::Dismissed);
        }

        let config = Configuration::from_json(&decoded)
            .map_err(BridgeError::MalformedResponse)?;

        self.store.save(&config)?;
        let dispatch = self.relay.send(config.clone().into());

        Ok(Ingested::Submitted { config, dispatch })
    }
}

/// Percent-decode a response string. `+` is left as-is.
pub fn decode_response(raw: &str) -> Result<String, BridgeError> {
    urlencoding::decode(raw)
        .map(|s| s.into_owned())
        .map_err(|e| BridgeError::InvalidEncoding(e.to_string()))
}
