use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;

use crate::config::Configuration;

/// Opaque token the transport assigns to correlate a send with its outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TransactionId(pub u32);

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Flat key/value message for the watch, sent as-is without schema checks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OutboundMessage(Configuration);

impl OutboundMessage {
    pub fn payload(&self) -> &Configuration {
        &self.0
    }
}

impl From<Configuration> for OutboundMessage {
    fn from(config: Configuration) -> Self {
        Self(config)
    }
}

/// Result of one delivery attempt. Exactly one is produced per send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryOutcome {
    Delivered {
        transaction_id: TransactionId,
    },
    Failed {
        transaction_id: TransactionId,
        error: String,
    },
}

impl DeliveryOutcome {
    pub fn transaction_id(&self) -> TransactionId {
        match self {
            DeliveryOutcome::Delivered { transaction_id }
            | DeliveryOutcome::Failed { transaction_id, .. } => *transaction_id,
        }
    }

    pub fn is_delivered(&self) -> bool {
        matches!(self, DeliveryOutcome::Delivered { .. })
    }
}

/// Message transport to the watch.
///
/// Implementations own delivery attempts and transaction id assignment.
/// The returned future resolves exactly once, with no timeout imposed by the
/// caller; it may stay pending forever if the transport never answers.
///
/// Uses Pin<Box<dyn Future>> for dyn-compatibility.
pub trait Transport: Send + Sync {
    fn send_message<'a>(
        &'a self,
        message: &'a OutboundMessage,
    ) -> Pin<Box<dyn Future<Output = DeliveryOutcome> + Send + 'a>>;
}

/// Handle to an in-flight delivery.
pub struct Dispatch {
    handle: JoinHandle<DeliveryOutcome>,
}

impl Dispatch {
    /// Wait for the delivery outcome. `None` if the delivery task was
    /// aborted or panicked before the transport answered.
    pub async fn outcome(self) -> Option<DeliveryOutcome> {
        self.handle.await.ok()
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

/// Hands messages to the transport and logs the outcome.
///
/// One attempt per message, no retries. `send` returns immediately; the
/// delivery runs on its own task.
#[derive(Clone)]
pub struct MessageRelay {
    transport: Arc<dyn Transport>,
}

impl MessageRelay {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }

    /// Must be called from within a tokio runtime.
    pub fn send(&self, message: OutboundMessage) -> Dispatch {
        let transport = Arc::clone(&self.transport);
        tracing::debug!(keys = message.payload().len(), "Dispatching app message");

        let handle = tokio::spawn(async move {
            let outcome = transport.send_message(&message).await;
            match &outcome {
                DeliveryOutcome::Delivered { transaction_id } => {
                    tracing::info!(%transaction_id, "Successfully delivered message");
                }
                DeliveryOutcome::Failed {
                    transaction_id,
                    error,
                } => {
                    tracing::warn!(%transaction_id, error = %error, "Unable to deliver message");
                }
            }
            outcome
        });

        Dispatch { handle }
    }
}

/// Transport double with scripted outcomes.
///
/// Each send takes the next entry of the script (cycling); `Err(detail)`
/// entries fail the delivery with that detail. An empty script delivers
/// everything. Every message handed over is recorded.
pub struct StubTransport {
    script: Vec<Result<(), String>>,
    calls: AtomicUsize,
    next_id: AtomicU32,
    sent: Mutex<Vec<OutboundMessage>>,
}

impl StubTransport {
    pub fn new(script: Vec<Result<(), String>>) -> Self {
        Self {
            script,
            calls: AtomicUsize::new(0),
            next_id: AtomicU32::new(1),
            sent: Mutex::new(Vec::new()),
        }
    }

    /// A transport that delivers everything.
    pub fn delivering() -> Self {
        Self::new(Vec::new())
    }

    /// A transport that fails every send with `error`.
    pub fn failing(error: &str) -> Self {
        Self::new(vec![Err(error.to_string())])
    }

    /// Messages handed to this transport, oldest first.
    pub fn sent(&self) -> Vec<OutboundMessage> {
        self.sent.lock().map(|s| s.clone()).unwrap_or_default()
    }

    pub fn send_count(&self) -> usize {
        self.calls.load(Ordering::Relaxed)
    }
}

impl Transport for StubTransport {
    fn send_message<'a>(
        &'a self,
        message: &'a OutboundMessage,
    ) -> Pin<Box<dyn Future<Output = DeliveryOutcome> + Send + 'a>> {
        Box::pin(async move {
            let idx = self.calls.fetch_add(1, Ordering::Relaxed);
            let transaction_id = TransactionId(self.next_id.fetch_add(1, Ordering::Relaxed));

            if let Ok(mut sent) = self.sent.lock() {
                sent.push(message.clone());
            }

            let step = if self.script.is_empty() {
                Ok(())
            } else {
                self.script[idx % self.script.len()].clone()
            };

            match step {
                Ok(()) => DeliveryOutcome::Delivered { transaction_id },
                Err(error) => DeliveryOutcome::Failed {
                    transaction_id,
                    error,
                },
            }
        })
    }
}
