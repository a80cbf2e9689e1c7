//! Observer notifications.

use std::sync::{Arc, Weak};

use crossbeam_channel::{unbounded, Receiver, Sender};
use parking_lot::RwLock;
use pirate_core::{Error, Result, StationEvent};
use tracing::{debug, trace};

/// Receiver of station lifecycle events.
///
/// All callbacks run on the station's event thread, one at a time.
pub trait StationObserver: Send + Sync {
    fn track_started(&self, _track: &str) {}

    fn track_finished(&self, _track: &str) {}

    fn on_error(&self, _error: &Error) {}

    fn stopped(&self) {}
}

type ObserverSlot = Arc<RwLock<Option<Weak<dyn StationObserver>>>>;

/// Sending half of the event channel, cloneable across threads.
#[derive(Clone)]
pub struct Notifier {
    tx: Sender<StationEvent>,
    observer: ObserverSlot,
}

impl Notifier {
    /// Create the channel and start its dispatcher thread. The thread exits
    /// once every clone of the notifier is dropped.
    pub fn new() -> Result<Self> {
        let (tx, rx) = unbounded();
        let observer: ObserverSlot = Arc::new(RwLock::new(None));

        let slot = Arc::clone(&observer);
        std::thread::Builder::new()
            .name("station-events".to_string())
            .spawn(move || dispatch_loop(&rx, &slot))
            .map_err(|e| Error::Unknown(format!("Failed to spawn event dispatcher: {e}")))?;

        Ok(Self { tx, observer })
    }

    /// Register the observer, replacing any previous one. Only a weak
    /// reference is kept.
    pub fn set_observer<O: StationObserver + 'static>(&self, observer: &Arc<O>) {
        let weak = Arc::downgrade(observer);
        let weak: Weak<dyn StationObserver> = weak;
        *self.observer.write() = Some(weak);
    }

    pub fn clear_observer(&self) {
        *self.observer.write() = None;
    }

    pub fn send(&self, event: StationEvent) {
        if self.tx.send(event).is_err() {
            debug!("Event dispatcher gone, event dropped");
        }
    }

    pub fn error(&self, error: Error) {
        self.send(StationEvent::error(error));
    }
}

fn dispatch_loop(rx: &Receiver<StationEvent>, slot: &ObserverSlot) {
    for event in rx {
        let observer = slot.read().as_ref().and_then(Weak::upgrade);
        let Some(observer) = observer else {
            trace!("No observer for {event:?}");
            continue;
        };

        match &event {
            StationEvent::TrackStarted(track) => observer.track_started(track),
            StationEvent::TrackFinished(track) => observer.track_finished(track),
            StationEvent::Error(error) => observer.on_error(error),
            StationEvent::Stopped => observer.stopped(),
        }
    }
    trace!("Event dispatcher exiting");
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::thread::{self, ThreadId};
    use std::time::Duration;

    const WAIT: Duration = Duration::from_secs(5);

    struct Recorder {
        tx: Sender<(String, ThreadId)>,
    }

    impl Recorder {
        fn record(&self, label: String) {
            let _ = self.tx.send((label, thread::current().id()));
        }
    }

    impl StationObserver for Recorder {
        fn track_started(&self, track: &str) {
            self.record(format!("started {track}"));
        }

        fn track_finished(&self, track: &str) {
            self.record(format!("finished {track}"));
        }

        fn on_error(&self, error: &Error) {
            self.record(format!("error {error}"));
        }

        fn stopped(&self) {
            self.record("stopped".to_string());
        }
    }

    #[test]
    fn test_events_delivered_in_order_on_one_thread() {
        let notifier = Notifier::new().unwrap();
        let (tx, rx) = unbounded();
        let recorder = Arc::new(Recorder { tx });
        notifier.set_observer(&recorder);

        let from_other_thread = notifier.clone();
        thread::spawn(move || {
            from_other_thread.send(StationEvent::TrackStarted("a.mp3".to_string()));
        })
        .join()
        .unwrap();
        notifier.send(StationEvent::TrackFinished("a.mp3".to_string()));
        notifier.error(Error::NoTracksFound);
        notifier.send(StationEvent::Stopped);

        let received: Vec<_> = (0..4).map(|_| rx.recv_timeout(WAIT).unwrap()).collect();
        let labels: Vec<_> = received.iter().map(|(label, _)| label.as_str()).collect();
        assert_eq!(
            labels,
            [
                "started a.mp3",
                "finished a.mp3",
                "error No supported audio files in directory",
                "stopped"
            ]
        );

        let dispatcher = received[0].1;
        assert_ne!(dispatcher, thread::current().id());
        assert!(received.iter().all(|(_, id)| *id == dispatcher));
    }

    #[test]
    fn test_dropped_observer_is_skipped() {
        let notifier = Notifier::new().unwrap();
        let (tx, rx) = unbounded();
        let recorder = Arc::new(Recorder { tx: tx.clone() });
        notifier.set_observer(&recorder);
        drop(recorder);

        notifier.send(StationEvent::Stopped);
        assert!(rx.recv_timeout(Duration::from_millis(200)).is_err());
        drop(tx);
    }

    #[test]
    fn test_replace_and_clear_observer() {
        let notifier = Notifier::new().unwrap();
        let (first_tx, first_rx) = unbounded();
        let (second_tx, second_rx) = unbounded();
        let first = Arc::new(Recorder { tx: first_tx });
        let second = Arc::new(Recorder { tx: second_tx });

        notifier.set_observer(&first);
        notifier.set_observer(&second);
        notifier.send(StationEvent::Stopped);
        assert_eq!(second_rx.recv_timeout(WAIT).unwrap().0, "stopped");

        notifier.clear_observer();
        notifier.send(StationEvent::Stopped);
        assert!(second_rx.recv_timeout(Duration::from_millis(100)).is_err());
        assert!(first_rx.try_recv().is_err());
    }
}
