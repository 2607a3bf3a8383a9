//! Host capabilities over newline-delimited JSON.
//!
//! Host actions go out as one JSON object per line:
//! ```text
//! {"action":"openURL","url":"https://..."}
//! {"action":"sendAppMessage","transactionId":1,"payload":{"units":"metric"}}
//! ```
//! Input lines are host events (`{"event":"showConfiguration"}`) or
//! delivery acknowledgements for earlier sends (`{"ack":1}`,
//! `{"nack":1,"error":"busy"}`).

use std::collections::HashMap;
use std::future::Future;
use std::io::Write;
use std::pin::Pin;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use klk_core::{
    DeliveryOutcome, HostEvent, HostPlatform, OutboundMessage, TransactionId, Transport, WatchInfo,
};
use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;

const TRANSPORT_CLOSED: &str = "transport closed";

#[derive(Serialize)]
#[serde(tag = "action")]
enum HostAction<'a> {
    #[serde(rename = "openURL")]
    OpenUrl { url: &'a str },
    #[serde(rename = "sendAppMessage")]
    SendAppMessage {
        #[serde(rename = "transactionId")]
        transaction_id: TransactionId,
        payload: &'a OutboundMessage,
    },
}

/// One line of host input.
#[derive(Debug, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum InboundLine {
    Ack {
        ack: TransactionId,
    },
    Nack {
        nack: TransactionId,
        #[serde(default)]
        error: String,
    },
    Event(HostEvent),
}

/// Line-oriented writer for host actions.
pub struct ActionSink {
    out: Mutex<Box<dyn Write + Send>>,
}

impl ActionSink {
    pub fn new(out: Box<dyn Write + Send>) -> Self {
        Self {
            out: Mutex::new(out),
        }
    }

    pub fn stdout() -> Self {
        Self::new(Box::new(std::io::stdout()))
    }

    fn emit(&self, action: &HostAction<'_>) -> std::io::Result<()> {
        let line = serde_json::to_string(action)?;
        let mut out = self
            .out
            .lock()
            .map_err(|e| std::io::Error::other(e.to_string()))?;
        writeln!(out, "{line}")?;
        out.flush()
    }
}

/// Host platform that prints `openURL` actions and reports a fixed watch.
pub struct StdioHost {
    sink: std::sync::Arc<ActionSink>,
    watch: Option<WatchInfo>,
}

impl StdioHost {
    pub fn new(sink: std::sync::Arc<ActionSink>, watch: Option<WatchInfo>) -> Self {
        Self { sink, watch }
    }
}

impl HostPlatform for StdioHost {
    fn open_url(&self, url: &str) {
        if let Err(e) = self.sink.emit(&HostAction::OpenUrl { url }) {
            tracing::warn!(url, "Failed to emit openURL action: {e}");
        }
    }

    fn active_watch_info(&self) -> Option<WatchInfo> {
        self.watch.clone()
    }
}

/// Transport that prints `sendAppMessage` actions and waits for the host to
/// acknowledge them by transaction id.
///
/// With `auto_ack` every send is delivered as soon as it is written.
pub struct StdioTransport {
    sink: std::sync::Arc<ActionSink>,
    auto_ack: bool,
    next_id: AtomicU32,
    pending: Mutex<HashMap<TransactionId, oneshot::Sender<Result<(), String>>>>,
    closed: AtomicBool,
}

impl StdioTransport {
    pub fn new(sink: std::sync::Arc<ActionSink>, auto_ack: bool) -> Self {
        Self {
            sink,
            auto_ack,
            next_id: AtomicU32::new(1),
            pending: Mutex::new(HashMap::new()),
            closed: AtomicBool::new(false),
        }
    }

    /// Settle a pending send. Returns false if `id` is unknown or was
    /// already settled.
    pub fn resolve(&self, id: TransactionId, result: Result<(), String>) -> bool {
        let sender = match self.pending.lock() {
            Ok(mut pending) => pending.remove(&id),
            Err(_) => None,
        };
        match sender {
            Some(tx) => tx.send(result).is_ok(),
            None => {
                tracing::warn!(transaction_id = %id, "Acknowledgement for unknown transaction");
                false
            }
        }
    }

    /// Stop accepting acknowledgements. Sends still waiting fail with
    /// "transport closed".
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        if let Ok(mut pending) = self.pending.lock() {
            if !pending.is_empty() {
                tracing::info!(
                    pending = pending.len(),
                    "Closing transport with unacknowledged sends"
                );
            }
            pending.clear();
        }
    }

    fn register(&self, id: TransactionId) -> Option<oneshot::Receiver<Result<(), String>>> {
        if self.closed.load(Ordering::SeqCst) {
            return None;
        }
        let (tx, rx) = oneshot::channel();
        let mut pending = self.pending.lock().ok()?;
        pending.insert(id, tx);
        Some(rx)
    }
}

impl Transport for StdioTransport {
    fn send_message<'a>(
        &'a self,
        message: &'a OutboundMessage,
    ) -> Pin<Box<dyn Future<Output = DeliveryOutcome> + Send + 'a>> {
        Box::pin(async move {
            let transaction_id = TransactionId(self.next_id.fetch_add(1, Ordering::Relaxed));

            // Register before writing so an immediate ack cannot be missed
            let waiter = if self.auto_ack {
                None
            } else {
                match self.register(transaction_id) {
                    Some(rx) => Some(rx),
                    None => {
                        return DeliveryOutcome::Failed {
                            transaction_id,
                            error: TRANSPORT_CLOSED.into(),
                        };
                    }
                }
            };

            let action = HostAction::SendAppMessage {
                transaction_id,
                payload: message,
            };
            if let Err(e) = self.sink.emit(&action) {
                if let Ok(mut pending) = self.pending.lock() {
                    pending.remove(&transaction_id);
                }
                return DeliveryOutcome::Failed {
                    transaction_id,
                    error: e.to_string(),
                };
            }

            let Some(rx) = waiter else {
                return DeliveryOutcome::Delivered { transaction_id };
            };

            match rx.await {
                Ok(Ok(())) => DeliveryOutcome::Delivered { transaction_id },
                Ok(Err(error)) => DeliveryOutcome::Failed {
                    transaction_id,
                    error,
                },
                Err(_) => DeliveryOutcome::Failed {
                    transaction_id,
                    error: TRANSPORT_CLOSED.into(),
                },
            }
        })
    }
}
