use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tokio::sync::mpsc;

use crate::error::BridgeError;
use crate::host::HostPlatform;
use crate::ingest::{Ingested, ResponseIngest};
use crate::launcher::Launcher;
use crate::relay::{DeliveryOutcome, Dispatch, MessageRelay, Transport};
use crate::store::ConfigStore;

/// Notifications the host delivers to the companion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event")]
pub enum HostEvent {
    #[serde(rename = "ready")]
    Ready {
        #[serde(default)]
        payload: Value,
    },
    #[serde(rename = "showConfiguration")]
    ShowConfiguration {
        #[serde(default)]
        payload: Value,
    },
    #[serde(rename = "webviewclosed", alias = "webviewClosed")]
    WebviewClosed {
        #[serde(default)]
        response: String,
    },
    #[serde(rename = "appmessage")]
    AppMessage {
        #[serde(default)]
        payload: Map<String, Value>,
    },
}

impl HostEvent {
    pub fn name(&self) -> &'static str {
        match self {
            HostEvent::Ready { .. } => "ready",
            HostEvent::ShowConfiguration { .. } => "showConfiguration",
            HostEvent::WebviewClosed { .. } => "webviewclosed",
            HostEvent::AppMessage { .. } => "appmessage",
        }
    }
}

/// Where the configuration round-trip stands.
///
/// `showConfiguration` moves to `SurfaceOpenPending`. `webviewclosed` ends
/// the surface; a submission then stays `RelayDispatched` until its delivery
/// settles, a dismissal or malformed response goes straight back to `Idle`.
/// An open surface takes precedence over a delivery still in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    /// A configuration page was opened and has not reported back yet.
    SurfaceOpenPending,
    /// A submitted configuration is on its way to the watch.
    RelayDispatched,
}

/// Wires host events to the launcher, response ingestion and relay.
///
/// Handlers run one at a time in delivery order. Round-trips are not
/// mutually exclusive: a second `showConfiguration` may arrive before the
/// first page closes, and whichever response is ingested last wins.
pub struct Companion {
    launcher: Launcher,
    ingest: ResponseIngest,
    surface_open: bool,
    in_flight: Vec<Dispatch>,
}

impl Companion {
    pub fn new(
        base_url: impl Into<String>,
        store: ConfigStore,
        host: Arc<dyn HostPlatform>,
        transport: Arc<dyn Transport>,
    ) -> Self {
        let relay = MessageRelay::new(transport);
        Self {
            launcher: Launcher::new(base_url, store.clone(), host),
            ingest: ResponseIngest::new(store, relay),
            surface_open: false,
            in_flight: Vec::new(),
        }
    }

    pub fn phase(&self) -> Phase {
        if self.surface_open {
            Phase::SurfaceOpenPending
        } else if self.in_flight.iter().any(|d| !d.is_finished()) {
            Phase::RelayDispatched
        } else {
            Phase::Idle
        }
    }

    /// Number of deliveries not yet awaited via [`Companion::drain`].
    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }

    /// Handle one host event. Must be called from within a tokio runtime.
    pub fn handle(&mut self, event: HostEvent) -> Result<(), BridgeError> {
        match event {
            HostEvent::Ready { payload } => {
                tracing::info!(%payload, "Companion ready");
            }
            HostEvent::ShowConfiguration { payload } => {
                if self.surface_open {
                    tracing::info!("Configuration surface already open, starting another one");
                }
                self.launcher.show_configuration(&payload);
                self.surface_open = true;
            }
            HostEvent::WebviewClosed { response } => {
                // The page is gone whatever its response turns out to be
                self.surface_open = false;
                if let Ingested::Submitted { config, dispatch } = self.ingest.ingest(&response)? {
                    tracing::info!(keys = config.len(), "Configuration submitted");
                    self.in_flight.push(dispatch);
                }
            }
            HostEvent::AppMessage { payload } => {
                let payload = Value::Object(payload);
                tracing::info!(%payload, "AppMessage received");
            }
        }

        Ok(())
    }

    /// Handle one host event, reporting a handler error to the log instead
    /// of returning it. Returns whether the handler succeeded.
    pub fn dispatch(&mut self, event: HostEvent) -> bool {
        let name = event.name();
        match self.handle(event) {
            Ok(()) => true,
            Err(e) => {
                tracing::error!(event = name, "Event handler failed: {e}");
                false
            }
        }
    }

    /// Consume host events until the sender side closes. Handler errors are
    /// reported to the log and never stop the loop.
    pub async fn run(&mut self, mut events: mpsc::Receiver<HostEvent>) {
        while let Some(event) = events.recv().await {
            self.dispatch(event);
        }
        tracing::info!("Host event stream closed");
    }

    /// Wait for every delivery dispatched since the last drain, finished or
    /// not, and return their outcomes in dispatch order. Deliveries whose
    /// task died are skipped.
    pub async fn drain(&mut self) -> Vec<DeliveryOutcome> {
        let mut outcomes = Vec::new();
        for dispatch in self.in_flight.drain(..) {
            if let Some(outcome) = dispatch.outcome().await {
                outcomes.push(outcome);
            }
        }
        outcomes
    }
}
