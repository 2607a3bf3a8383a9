//! Companion-side core for the klk watchface.
//!
//! Bridges the watch and its web-hosted configuration page:
//!
//! - [`Launcher`] builds the configuration URL from the stored
//!   [`Configuration`] plus the watch's capability flags and asks the host to
//!   open it.
//! - [`ResponseIngest`] decodes the page's response, persists it through
//!   [`ConfigStore`] and hands it to the [`MessageRelay`].
//! - [`MessageRelay`] sends the result to the watch through a [`Transport`]
//!   and logs the delivery outcome.
//! - [`Companion`] wires host events to all of the above.
//!
//! # Quick start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use klk_core::{Companion, ConfigStore, HostEvent, RecordingHost, StubTransport};
//! use klk_store::MemorySlotStore;
//!
//! # async fn run() -> Result<(), klk_core::BridgeError> {
//! let store = ConfigStore::new(Arc::new(MemorySlotStore::new()));
//! let mut companion = Companion::new(
//!     "https://example.com/config.html",
//!     store,
//!     Arc::new(RecordingHost::new()),
//!     Arc::new(StubTransport::delivering()),
//! );
//!
//! companion.handle(HostEvent::ShowConfiguration { payload: serde_json::Value::Null })?;
//! companion.handle(HostEvent::WebviewClosed {
//!     response: "%7B%22units%22%3A%22metric%22%7D".into(),
//! })?;
//! let outcomes = companion.drain().await;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod controller;
pub mod error;
pub mod host;
pub mod ingest;
pub mod launcher;
pub mod relay;
pub mod settings;
pub mod store;
pub mod watch;

pub use config::{ConfigValue, Configuration};
pub use controller::{Companion, HostEvent, Phase};
pub use error::BridgeError;
pub use host::{HostPlatform, RecordingHost};
pub use ingest::{Ingested, ResponseIngest};
pub use launcher::Launcher;
pub use relay::{
    DeliveryOutcome, Dispatch, MessageRelay, OutboundMessage, StubTransport, TransactionId,
    Transport,
};
pub use settings::Settings;
pub use store::ConfigStore;
pub use watch::{Platform, WatchInfo};
