/// Scan lifecycle events: lightweight messages sent from the scanning
/// thread to any number of subscribers via crossbeam channels.
///
/// The aggregated data lives in the scanner's `DirSizes`; these messages
/// carry only state transitions and counters. Consumers that prefer polling
/// can ignore events entirely and call `current_entry_count()` instead.
use super::walk::ScanStats;
use crossbeam_channel::{Receiver, Sender, TrySendError};
use parking_lot::Mutex;
use std::path::PathBuf;
use std::time::Duration;
use tracing::debug;

/// State transitions of a scan session.
///
/// `Done` and `Cancelled` are only sent after the walk has fully returned,
/// so a consumer that sees either may read the map without racing workers.
#[derive(Debug, Clone, PartialEq)]
pub enum ScanEvent {
    /// The map was cleared and the walk is about to begin.
    Started { root: PathBuf },
    /// A directory could not be listed and its subtree was abandoned.
    Error {
        path: PathBuf,
        message: String,
        access_denied: bool,
    },
    /// The walk visited every reachable directory.
    Done { duration: Duration, stats: ScanStats },
    /// The walk stopped early because cancellation was requested.
    Cancelled { duration: Duration, stats: ScanStats },
}

impl ScanEvent {
    /// `true` for the two events that end a session.
    pub fn is_terminal(&self) -> bool {
        matches!(self, ScanEvent::Done { .. } | ScanEvent::Cancelled { .. })
    }
}

/// Maximum number of events queued per subscriber.
///
/// A subscriber stays registered for the scanner's lifetime, so one that
/// never drains its receiver would otherwise accumulate every event of every
/// session. Sends never block: once a queue is full, further events for that
/// subscriber are dropped.
pub const EVENT_CHANNEL_CAPACITY: usize = 4_096;

/// Slots at the end of each queue kept free of `Error` events, so the
/// lifecycle events of later sessions still fit behind a burst of errors.
const LIFECYCLE_RESERVE: usize = 64;

/// Fan-out of [`ScanEvent`]s to every live subscriber.
///
/// Channels are bounded and written with `try_send`, so a slow subscriber
/// never stalls the walk. Subscribers whose receiver was dropped are pruned
/// on the next send.
#[derive(Debug, Default)]
pub(crate) struct EventBus {
    subscribers: Mutex<Vec<Sender<ScanEvent>>>,
}

impl EventBus {
    pub(crate) fn subscribe(&self) -> Receiver<ScanEvent> {
        let (tx, rx) = crossbeam_channel::bounded(EVENT_CHANNEL_CAPACITY);
        self.subscribers.lock().push(tx);
        rx
    }

    pub(crate) fn emit(&self, event: ScanEvent) {
        let mut subscribers = self.subscribers.lock();
        if subscribers.is_empty() {
            return;
        }
        let is_error = matches!(event, ScanEvent::Error { .. });
        subscribers.retain(|tx| {
            if is_error && tx.len() >= EVENT_CHANNEL_CAPACITY - LIFECYCLE_RESERVE {
                return true;
            }
            match tx.try_send(event.clone()) {
                Ok(()) => true,
                Err(TrySendError::Full(dropped)) => {
                    debug!("Event queue full, dropping {dropped:?}");
                    true
                }
                Err(TrySendError::Disconnected(_)) => false,
            }
        });
    }

    #[cfg(test)]
    pub(crate) fn subscriber_count(&self) -> usize {
        self.subscribers.lock().len()
    }
}
