//! Binding table mapping device events to ordered handler lists

use crate::midi::{DeviceEvent, EventKind};
use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

/// Asynchronous reaction to a device event
///
/// Note: all methods take &self so handlers can be shared as `Arc<dyn Handler>`.
/// Handlers that keep state use interior mutability.
#[async_trait]
pub trait Handler: Send + Sync {
    /// Short human-readable label used in logs
    fn label(&self) -> String;

    /// React to one event
    async fn handle(&self, event: &DeviceEvent) -> Result<()>;
}

/// Result of dispatching one event
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchOutcome {
    /// Number of handlers invoked
    pub invoked: usize,
    /// Number of handlers that returned an error
    pub failed: usize,
}

/// Registry of `(kind, identifier) -> [handler]`
///
/// Bindings are append-only and live for the whole process. Binding the same
/// pair several times is allowed; every handler fires, in registration order.
#[derive(Default)]
pub struct DispatchTable {
    note_on: HashMap<u8, Vec<Arc<dyn Handler>>>,
    control_change: HashMap<u8, Vec<Arc<dyn Handler>>>,
}

impl DispatchTable {
    pub fn new() -> Self {
        Self::default()
    }

    fn sub_table(&self, kind: EventKind) -> &HashMap<u8, Vec<Arc<dyn Handler>>> {
        match kind {
            EventKind::NoteOn => &self.note_on,
            EventKind::ControlChange => &self.control_change,
        }
    }

    /// Append a handler to the list for `(kind, identifier)`
    pub fn bind(&mut self, kind: EventKind, identifier: u8, handler: Arc<dyn Handler>) {
        debug!("Binding {} #{} -> {}", kind, identifier, handler.label());
        let table = match kind {
            EventKind::NoteOn => &mut self.note_on,
            EventKind::ControlChange => &mut self.control_change,
        };
        table.entry(identifier).or_default().push(handler);
    }

    pub fn bind_note_on(&mut self, note: u8, handler: Arc<dyn Handler>) {
        self.bind(EventKind::NoteOn, note, handler);
    }

    pub fn bind_control_change(&mut self, control: u8, handler: Arc<dyn Handler>) {
        self.bind(EventKind::ControlChange, control, handler);
    }

    /// Handlers bound to `(kind, identifier)`, empty when nothing is bound
    pub fn handlers(&self, kind: EventKind, identifier: u8) -> &[Arc<dyn Handler>] {
        self.sub_table(kind)
            .get(&identifier)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Total number of bound handlers
    pub fn len(&self) -> usize {
        self.note_on.values().chain(self.control_change.values()).map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Invoke every handler bound to the event, one after the other.
    ///
    /// Each handler is awaited before the next one starts. A failing handler is
    /// logged and does not prevent the remaining handlers from running.
    pub async fn dispatch(&self, event: &DeviceEvent) -> DispatchOutcome {
        let handlers = self.handlers(event.kind, event.identifier);
        debug!("Received {}, found {} bindings", event, handlers.len());

        let mut outcome = DispatchOutcome::default();
        for handler in handlers {
            outcome.invoked += 1;
            if let Err(e) = handler.handle(event).await {
                outcome.failed += 1;
                warn!("Binding '{}' failed on {}: {:#}", handler.label(), event, e);
            }
        }
        outcome
    }
}
