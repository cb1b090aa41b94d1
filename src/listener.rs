use std::sync::Mutex;
use std::sync::mpsc::Sender;

use tracing::{debug, trace, warn};

use crate::{ScanResult, config::ScannerConfig, event::ScanEvent};

/// why a notification was not forwarded
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    /// the notification is for another action
    ForeignAction,
    /// no read session is waiting for scans
    NotReading,
    /// the payload version is below the supported minimum
    UnsupportedVersion(i64),
}

/// what the listener did with a notification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventOutcome {
    /// decoded and handed to the read session
    Queued,
    Ignored(IgnoreReason),
    /// the barcode extras could not be decoded, the notification was dropped
    Malformed,
}

/// receives scan notifications for one event identifier
///
/// The listener never touches controller state. While a read session is running the
/// controller attaches the sending half of the session channel, and every accepted
/// notification is decoded and pushed onto it. Without an attached session all
/// notifications are ignored.
pub struct ScanEventListener {
    event_id: String,
    min_version: i64,
    sink: Mutex<Option<Sender<ScanResult>>>,
}

impl ScanEventListener {
    pub fn new(config: &ScannerConfig) -> Self {
        ScanEventListener {
            event_id: config.event_id.clone(),
            min_version: config.min_event_version,
            sink: Mutex::new(None),
        }
    }

    /// the notification action this listener subscribes to
    pub fn event_id(&self) -> &str {
        &self.event_id
    }

    /// start forwarding scans to a read session
    pub(crate) fn attach(&self, sink: Sender<ScanResult>) {
        *self.sink.lock().unwrap_or_else(|e| e.into_inner()) = Some(sink);
    }

    /// stop forwarding, dropping the sender ends the session's channel
    pub(crate) fn detach(&self) {
        self.sink.lock().unwrap_or_else(|e| e.into_inner()).take();
    }

    pub fn is_attached(&self) -> bool {
        self.sink
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .is_some()
    }

    /// handle a notification delivered by the platform
    pub fn on_receive(&self, event: &ScanEvent) -> EventOutcome {
        if event.action != self.event_id {
            trace!("ignoring notification {}", event.action);
            return EventOutcome::Ignored(IgnoreReason::ForeignAction);
        }
        let mut sink = self.sink.lock().unwrap_or_else(|e| e.into_inner());
        let Some(sender) = sink.as_ref() else {
            debug!("scan notification while not reading, ignored");
            return EventOutcome::Ignored(IgnoreReason::NotReading);
        };
        let version = event.version();
        if version < self.min_version {
            debug!(
                "scan notification version {} below {}, ignored",
                version, self.min_version
            );
            return EventOutcome::Ignored(IgnoreReason::UnsupportedVersion(version));
        }
        let result = match event.decode() {
            Ok(result) => result,
            Err(err) => {
                warn!("dropping scan notification: {}", err);
                return EventOutcome::Malformed;
            }
        };
        debug!("scan received: {}", result);
        if sender.send(result).is_err() {
            // the read session is gone, nobody will ever receive from this sender
            debug!("read session closed, scan discarded");
            sink.take();
            return EventOutcome::Ignored(IgnoreReason::NotReading);
        }
        EventOutcome::Queued
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ACTION_BARCODE_DATA;
    use std::sync::mpsc;

    fn listener() -> ScanEventListener {
        ScanEventListener::new(&ScannerConfig::default())
    }

    #[test]
    fn test_ignored_without_session() {
        let listener = listener();
        let event = ScanEvent::barcode(ACTION_BARCODE_DATA, "12345", "j", "t1");
        assert_eq!(
            listener.on_receive(&event),
            EventOutcome::Ignored(IgnoreReason::NotReading)
        );
    }

    #[test]
    fn test_forwards_scan() {
        let listener = listener();
        let (tx, rx) = mpsc::channel();
        listener.attach(tx);
        let event = ScanEvent::barcode(ACTION_BARCODE_DATA, "12345", "CODE128", "t1");
        assert_eq!(listener.on_receive(&event), EventOutcome::Queued);
        let result = rx.try_recv().unwrap();
        assert_eq!(result.text, "12345");
        assert_eq!(result.format, "CODE128");
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_foreign_action() {
        let listener = listener();
        let (tx, rx) = mpsc::channel();
        listener.attach(tx);
        let event = ScanEvent::barcode("com.example.OTHER", "12345", "j", "t1");
        assert_eq!(
            listener.on_receive(&event),
            EventOutcome::Ignored(IgnoreReason::ForeignAction)
        );
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_old_version() {
        let listener = listener();
        let (tx, rx) = mpsc::channel();
        listener.attach(tx);
        let event =
            ScanEvent::barcode(ACTION_BARCODE_DATA, "12345", "j", "t1").with_extra("version", 0);
        assert_eq!(
            listener.on_receive(&event),
            EventOutcome::Ignored(IgnoreReason::UnsupportedVersion(0))
        );
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_malformed_dropped() {
        let listener = listener();
        let (tx, rx) = mpsc::channel();
        listener.attach(tx);
        let event = ScanEvent::new(ACTION_BARCODE_DATA)
            .with_extra("version", 1)
            .with_extra("codeId", "j")
            .with_extra("timestamp", "t1");
        assert_eq!(listener.on_receive(&event), EventOutcome::Malformed);
        assert!(rx.try_recv().is_err());
        // still attached, the next good scan goes through
        assert!(listener.is_attached());
        let event = ScanEvent::barcode(ACTION_BARCODE_DATA, "67890", "j", "t2");
        assert_eq!(listener.on_receive(&event), EventOutcome::Queued);
    }

    #[test]
    fn test_detach_on_closed_session() {
        let listener = listener();
        let (tx, rx) = mpsc::channel();
        listener.attach(tx);
        drop(rx);
        let event = ScanEvent::barcode(ACTION_BARCODE_DATA, "12345", "j", "t1");
        assert_eq!(
            listener.on_receive(&event),
            EventOutcome::Ignored(IgnoreReason::NotReading)
        );
        assert!(!listener.is_attached());
    }
}
