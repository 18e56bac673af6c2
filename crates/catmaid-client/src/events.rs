//! Connector events emitted by the gateway
//!
//! Observers either subscribe to the broadcast channel or register a
//! synchronous [`EventListener`]. Emission is fire-and-forget: a missing or
//! lagging subscriber never affects the operation that produced the event.

use std::sync::{Arc, PoisonError, RwLock};
use tokio::sync::broadcast;
use tracing::{debug, trace};

use crate::types::{EntityId, LinkType, Location};

/// Events emitted after a successful mutation
#[derive(Debug, Clone, PartialEq)]
pub enum ConnectorEvent {
    ConnectorCreated {
        connector_id: EntityId,
        location: Location,
    },
    ConnectorRemoved {
        connector_id: EntityId,
    },
    LinkCreated {
        link_id: EntityId,
        link_type: LinkType,
        node_id: EntityId,
    },
    LinkRemoved {
        link_id: EntityId,
        link_type: Option<LinkType>,
        link_type_id: Option<EntityId>,
        connector_id: EntityId,
        node_id: EntityId,
    },
}

impl ConnectorEvent {
    /// Event name as used by the web client
    pub fn name(&self) -> &'static str {
        match self {
            ConnectorEvent::ConnectorCreated { .. } => "connector_created",
            ConnectorEvent::ConnectorRemoved { .. } => "connector_removed",
            ConnectorEvent::LinkCreated { .. } => "link_created",
            ConnectorEvent::LinkRemoved { .. } => "link_removed",
        }
    }
}

/// Trait for event listeners
pub trait EventListener: Send + Sync {
    fn on_event(&self, event: &ConnectorEvent);
}

/// Event bus for connector events
pub struct EventBus {
    sender: broadcast::Sender<ConnectorEvent>,
    listeners: RwLock<Vec<Arc<dyn EventListener>>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::with_capacity(256)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender,
            listeners: RwLock::new(Vec::new()),
        }
    }

    /// Emit an event to all listeners and subscribers
    pub fn emit(&self, event: ConnectorEvent) {
        trace!(event = ?event, "Emitting connector event");
        let listeners = self
            .listeners
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        for listener in listeners {
            listener.on_event(&event);
        }
        // Ignore send errors (no subscribers)
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ConnectorEvent> {
        self.sender.subscribe()
    }

    pub fn add_listener(&self, listener: Arc<dyn EventListener>) {
        self.listeners
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(listener);
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    pub fn listener_count(&self) -> usize {
        self.listeners
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

/// Logs every event at debug level
pub struct LoggingEventListener;

impl EventListener for LoggingEventListener {
    fn on_event(&self, event: &ConnectorEvent) {
        match event {
            ConnectorEvent::ConnectorCreated {
                connector_id,
                location,
            } => {
                debug!(connector_id, location = %location, "Connector created");
            }
            ConnectorEvent::ConnectorRemoved { connector_id } => {
                debug!(connector_id, "Connector removed");
            }
            ConnectorEvent::LinkCreated {
                link_id,
                link_type,
                node_id,
            } => {
                debug!(link_id, link_type = %link_type, node_id, "Link created");
            }
            ConnectorEvent::LinkRemoved {
                link_id,
                connector_id,
                node_id,
                ..
            } => {
                debug!(link_id, connector_id, node_id, "Link removed");
            }
        }
    }
}

/// Log events from the broadcast channel on a background task
///
/// The task ends when the bus is dropped.
pub fn spawn_logging_listener(event_bus: Arc<EventBus>) -> tokio::task::JoinHandle<()> {
    let mut receiver = event_bus.subscribe();
    drop(event_bus);
    let listener = LoggingEventListener;

    tokio::spawn(async move {
        loop {
            match receiver.recv().await {
                Ok(event) => listener.on_event(&event),
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    debug!(skipped = n, "Event listener lagged, skipped events");
                }
                Err(broadcast::error::RecvError::Closed) => {
                    debug!("Event bus closed, stopping listener");
                    break;
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use tokio::time::{timeout, Duration};

    struct Recorder(Mutex<Vec<&'static str>>);

    impl EventListener for Recorder {
        fn on_event(&self, event: &ConnectorEvent) {
            self.0.lock().unwrap().push(event.name());
        }
    }

    #[tokio::test]
    async fn test_subscriber_receives_event() {
        let bus = EventBus::new();
        let mut receiver = bus.subscribe();

        bus.emit(ConnectorEvent::ConnectorRemoved { connector_id: 4 });

        let event = timeout(Duration::from_millis(100), receiver.recv())
            .await
            .expect("timeout")
            .expect("receive error");
        assert_eq!(event, ConnectorEvent::ConnectorRemoved { connector_id: 4 });
    }

    #[test]
    fn test_listener_is_called_synchronously() {
        let bus = EventBus::new();
        let recorder = Arc::new(Recorder(Mutex::new(Vec::new())));
        bus.add_listener(recorder.clone());

        bus.emit(ConnectorEvent::LinkCreated {
            link_id: 1,
            link_type: LinkType::presynaptic(),
            node_id: 2,
        });

        assert_eq!(*recorder.0.lock().unwrap(), vec!["link_created"]);
        assert_eq!(bus.listener_count(), 1);
    }

    #[tokio::test]
    async fn test_logging_listener_stops_with_bus() {
        let bus = Arc::new(EventBus::new());
        let handle = spawn_logging_listener(bus.clone());
        bus.emit(ConnectorEvent::ConnectorRemoved { connector_id: 2 });
        drop(bus);

        timeout(Duration::from_millis(500), handle)
            .await
            .expect("listener did not stop")
            .unwrap();
    }

    #[test]
    fn test_emit_without_subscribers() {
        let bus = EventBus::new();
        bus.emit(ConnectorEvent::ConnectorRemoved { connector_id: 1 });
        assert_eq!(bus.subscriber_count(), 0);
    }
}
