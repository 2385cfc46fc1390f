//! MIDI pad controller: device discovery, connection state and the receive loop
//!
//! The controller owns a [`DeviceTransport`] and a [`DispatchTable`]. It polls
//! the transport on a fixed interval and dispatches every pending event, one
//! event at a time, awaiting all handlers of an event before reading the next.

pub mod dispatch;
pub mod hotplug;
pub mod mapping;
pub mod transport;

pub use dispatch::{DispatchOutcome, DispatchTable, Handler};
pub use hotplug::HotplugMonitor;
pub use mapping::{ControllerMapping, MappingError, Program};
pub use transport::{DeviceTransport, MidirTransport};

use regex::Regex;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Default interval between two transport polls
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Connection state of the controller
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connected {
        input: String,
        output: Option<String>,
    },
}

/// Pick the device whose name matches `pattern`.
///
/// Zero matches logs a warning and returns `None`. Several matches log a
/// warning and return the first one.
pub fn find_device(pattern: &Regex, names: &[String]) -> Option<String> {
    let mut matches: Vec<&String> = Vec::new();
    for name in names.iter().filter(|n| pattern.is_match(n)) {
        if !matches.contains(&name) {
            matches.push(name);
        }
    }

    match matches.as_slice() {
        [] => {
            warn!("No device matching '{}' (available: {:?})", pattern, names);
            None
        }
        [only] => Some((*only).clone()),
        [first, ..] => {
            warn!(
                "{} devices match '{}': {:?}, using '{}'",
                matches.len(),
                pattern,
                matches,
                first
            );
            Some((*first).clone())
        }
    }
}

/// Controller bound to one physical device
pub struct MidiController<T: DeviceTransport> {
    name_pattern: Regex,
    transport: T,
    table: DispatchTable,
    state: ConnectionState,
    poll_interval: Duration,
}

impl<T: DeviceTransport> MidiController<T> {
    pub fn new(name_pattern: Regex, transport: T, table: DispatchTable) -> Self {
        Self {
            name_pattern,
            transport,
            table,
            state: ConnectionState::Disconnected,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn state(&self) -> &ConnectionState {
        &self.state
    }

    pub fn is_connected(&self) -> bool {
        matches!(self.state, ConnectionState::Connected { .. })
    }

    pub fn table(&self) -> &DispatchTable {
        &self.table
    }

    /// (Re)connect to the device matching the configured name pattern.
    ///
    /// Any open ports are closed first, so this is safe to call again after the
    /// device was unplugged and plugged back. Returns whether the controller is
    /// connected afterwards.
    pub fn connect(&mut self) -> bool {
        self.transport.close();
        self.state = ConnectionState::Disconnected;

        let inputs = match self.transport.input_names() {
            Ok(names) => names,
            Err(e) => {
                warn!("Failed to list MIDI inputs: {:#}", e);
                return false;
            }
        };
        let Some(input) = find_device(&self.name_pattern, &inputs) else {
            return false;
        };

        let output = match self.transport.output_names() {
            Ok(names) => names.into_iter().find(|n| self.name_pattern.is_match(n)),
            Err(e) => {
                debug!("Failed to list MIDI outputs: {:#}", e);
                None
            }
        };

        if let Err(e) = self.transport.open(&input, output.as_deref()) {
            warn!("Failed to open '{}': {:#}", input, e);
            self.transport.close();
            return false;
        }

        info!("🎹 Controller connected: {}", input);
        self.state = ConnectionState::Connected { input, output };
        true
    }

    /// Drain the transport and dispatch every pending event in arrival order.
    ///
    /// Returns the number of events dispatched. Does nothing while disconnected.
    pub async fn poll_once(&mut self) -> usize {
        if !self.is_connected() {
            return 0;
        }

        let events = self.transport.pending();
        for event in &events {
            let outcome = self.table.dispatch(event).await;
            if outcome.failed > 0 {
                debug!("{} of {} bindings failed for {}", outcome.failed, outcome.invoked, event);
            }
        }
        events.len()
    }

    /// Receive loop: poll forever, reconnecting whenever a request arrives on
    /// `reconnect_rx` (hot-plug notifications).
    pub async fn receive(mut self, mut reconnect_rx: mpsc::UnboundedReceiver<()>) {
        info!("👂 Listening for controller events");
        loop {
            let mut reconnect = false;
            while reconnect_rx.try_recv().is_ok() {
                reconnect = true;
            }
            if reconnect {
                // Reconnecting closes the ports, dispatch what they already received
                self.poll_once().await;
                debug!("Reconnect requested");
                self.connect();
            }

            self.poll_once().await;
            tokio::time::sleep(self.poll_interval).await;
        }
    }
}
