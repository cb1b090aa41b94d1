//! Delivery of platform notifications to the scan listener.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use anyhow::{Result, anyhow};
use tracing::{debug, trace};

use crate::{
    event::ScanEvent,
    listener::{EventOutcome, ScanEventListener},
};

/// platform mechanism that delivers notifications to subscribed listeners
pub trait EventBus: Send + Sync {
    /// deliver notifications for `listener.event_id()` to `listener`
    fn subscribe(&self, listener: Arc<ScanEventListener>) -> Result<()>;

    /// stop delivering notifications for `event_id`, unknown ids are ignored
    fn unsubscribe(&self, event_id: &str);
}

/// an active subscription, unsubscribed when dropped
pub struct Registration {
    bus: Arc<dyn EventBus>,
    event_id: String,
}

impl Registration {
    pub fn new(bus: Arc<dyn EventBus>, listener: Arc<ScanEventListener>) -> Result<Self> {
        let event_id = listener.event_id().to_owned();
        bus.subscribe(listener)?;
        debug!("subscribed to {}", event_id);
        Ok(Registration { bus, event_id })
    }

    pub fn event_id(&self) -> &str {
        &self.event_id
    }
}

impl Drop for Registration {
    fn drop(&mut self) {
        self.bus.unsubscribe(&self.event_id);
        debug!("unsubscribed from {}", self.event_id);
    }
}

/// in-process bus, one listener per event identifier
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use intent_barcodescanner::{bus::{EventBus, LocalEventBus}, config::ScannerConfig};
/// use intent_barcodescanner::event::ScanEvent;
/// use intent_barcodescanner::listener::ScanEventListener;
///
/// let bus = LocalEventBus::new();
/// let config = ScannerConfig::default();
/// bus.subscribe(Arc::new(ScanEventListener::new(&config))).unwrap();
/// assert!(bus.publish(&ScanEvent::new(&config.event_id)).is_some());
/// assert!(bus.publish(&ScanEvent::new("com.example.OTHER")).is_none());
/// ```
#[derive(Default)]
pub struct LocalEventBus {
    listeners: Mutex<HashMap<String, Arc<ScanEventListener>>>,
}

impl LocalEventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// deliver `event` to the listener subscribed to its action
    ///
    /// returns `None` when nobody is subscribed
    pub fn publish(&self, event: &ScanEvent) -> Option<EventOutcome> {
        // never call into the listener with the registry locked
        let listener = self
            .listeners
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(&event.action)
            .cloned();
        match listener {
            Some(listener) => Some(listener.on_receive(event)),
            None => {
                trace!("no subscriber for {}", event.action);
                None
            }
        }
    }

    pub fn is_subscribed(&self, event_id: &str) -> bool {
        self.listeners
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .contains_key(event_id)
    }

    pub fn subscriber_count(&self) -> usize {
        self.listeners
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .len()
    }
}

impl EventBus for LocalEventBus {
    fn subscribe(&self, listener: Arc<ScanEventListener>) -> Result<()> {
        let mut listeners = self.listeners.lock().unwrap_or_else(|e| e.into_inner());
        if listeners.contains_key(listener.event_id()) {
            return Err(anyhow!(
                "{} already has a subscriber",
                listener.event_id()
            ));
        }
        listeners.insert(listener.event_id().to_owned(), listener);
        Ok(())
    }

    fn unsubscribe(&self, event_id: &str) {
        self.listeners
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(event_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ScannerConfig;
    use crate::listener::IgnoreReason;

    #[test]
    fn test_registration_scope() -> Result<()> {
        let bus = Arc::new(LocalEventBus::new());
        let config = ScannerConfig::default();
        let listener = Arc::new(ScanEventListener::new(&config));
        {
            let registration = Registration::new(bus.clone(), listener)?;
            assert_eq!(registration.event_id(), config.event_id);
            assert!(bus.is_subscribed(&config.event_id));
        }
        assert!(!bus.is_subscribed(&config.event_id));
        assert_eq!(bus.subscriber_count(), 0);
        Ok(())
    }

    #[test]
    fn test_double_subscribe_rejected() -> Result<()> {
        let bus = LocalEventBus::new();
        let config = ScannerConfig::default();
        bus.subscribe(Arc::new(ScanEventListener::new(&config)))?;
        assert!(
            bus.subscribe(Arc::new(ScanEventListener::new(&config)))
                .is_err()
        );
        assert_eq!(bus.subscriber_count(), 1);
        Ok(())
    }

    #[test]
    fn test_publish_routes_by_action() -> Result<()> {
        let bus = LocalEventBus::new();
        let config = ScannerConfig::default();
        bus.subscribe(Arc::new(ScanEventListener::new(&config)))?;
        let event = ScanEvent::barcode(&config.event_id, "12345", "j", "t1");
        assert_eq!(
            bus.publish(&event),
            Some(EventOutcome::Ignored(IgnoreReason::NotReading))
        );
        let event = ScanEvent::barcode("com.example.OTHER", "12345", "j", "t1");
        assert_eq!(bus.publish(&event), None);
        Ok(())
    }
}
