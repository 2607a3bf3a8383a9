use std::sync::Mutex;

use crate::watch::WatchInfo;

/// Host actions the bridge consumes, other than message transport.
pub trait HostPlatform: Send + Sync {
    /// Ask the host to present `url` as an external surface. Fire-and-forget:
    /// the outcome arrives later as a `webviewclosed` event.
    fn open_url(&self, url: &str);

    /// Capability snapshot of the active watch. `None` when the host is too
    /// old to report one or no watch is connected.
    fn active_watch_info(&self) -> Option<WatchInfo>;
}

/// Host double that records every opened URL and reports a fixed snapshot.
#[derive(Default)]
pub struct RecordingHost {
    watch: Option<WatchInfo>,
    opened: Mutex<Vec<String>>,
}

impl RecordingHost {
    /// A host without capability snapshot support.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_watch(watch: WatchInfo) -> Self {
        Self {
            watch: Some(watch),
            opened: Mutex::new(Vec::new()),
        }
    }

    /// URLs opened so far, oldest first.
    pub fn opened(&self) -> Vec<String> {
        self.opened
            .lock()
            .map(|urls| urls.clone())
            .unwrap_or_default()
    }
}

impl HostPlatform for RecordingHost {
    fn open_url(&self, url: &str) {
        if let Ok(mut urls) = self.opened.lock() {
            urls.push(url.to_string());
        }
    }

    fn active_watch_info(&self) -> Option<WatchInfo> {
        self.watch.clone()
    }
}
