//! Audio routing: PulseAudio objects, snapshot mirrors, views and volume controls
//!
//! Two mirrors hold the latest known sinks and sink inputs. Handlers read them
//! through [`View`]s, which filter the current snapshot on every call. The
//! [`Reconciler`] refreshes the mirrors from the audio server's event stream.

pub mod crossfader;
pub mod mirror;
pub mod pactl;
pub mod reconcile;
pub mod sinks;
pub mod stream;
pub mod view;

pub use crossfader::{CrossfadeLevels, CrossfadeTarget, Crossfader, Side};
pub use mirror::{ChangeObserver, Mirror, SinkInputMirror, SinkMirror};
pub use pactl::PactlServer;
pub use reconcile::Reconciler;
pub use sinks::{SinkGroup, SinksCountError};
pub use stream::{StreamControl, StreamMatcher};
pub use view::{SinkInputView, SinkView, View};

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use tokio::sync::mpsc;

pub const APPLICATION_NAME: &str = "application.name";
pub const MEDIA_NAME: &str = "media.name";

/// Sink state as reported by the audio server
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SinkState {
    Running,
    Idle,
    Suspended,
    #[serde(other)]
    Unknown,
}

impl SinkState {
    pub fn parse(value: &str) -> Self {
        match value.to_ascii_lowercase().as_str() {
            "running" => SinkState::Running,
            "idle" => SinkState::Idle,
            "suspended" => SinkState::Suspended,
            _ => SinkState::Unknown,
        }
    }
}

/// Audio output device
#[derive(Debug, Clone, PartialEq)]
pub struct Sink {
    pub index: u32,
    pub name: String,
    pub description: String,
    pub state: SinkState,
    /// Per-channel volume in `[0, 1]` (may exceed 1 when over-amplified)
    pub volume: Vec<f64>,
}

/// Audio stream of one client, routed to a sink
#[derive(Debug, Clone, PartialEq)]
pub struct SinkInput {
    pub index: u32,
    pub sink: u32,
    pub properties: HashMap<String, String>,
    pub volume: Vec<f64>,
}

impl SinkInput {
    pub fn app_name(&self) -> Option<&str> {
        self.properties.get(APPLICATION_NAME).map(String::as_str)
    }

    pub fn media_name(&self) -> Option<&str> {
        self.properties.get(MEDIA_NAME).map(String::as_str)
    }

    pub fn channels(&self) -> usize {
        self.volume.len().max(1)
    }
}

impl Sink {
    pub fn channels(&self) -> usize {
        self.volume.len().max(1)
    }
}

/// Object family an audio server event is about
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Facility {
    Sink,
    SinkInput,
    Other(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerEventKind {
    New,
    Change,
    Remove,
}

/// One notification from the audio server subscription
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerEvent {
    pub facility: Facility,
    pub kind: ServerEventKind,
    pub index: u32,
}

impl fmt::Display for ServerEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let facility = match &self.facility {
            Facility::Sink => "sink",
            Facility::SinkInput => "sink-input",
            Facility::Other(name) => name.as_str(),
        };
        let kind = match self.kind {
            ServerEventKind::New => "new",
            ServerEventKind::Change => "change",
            ServerEventKind::Remove => "remove",
        };
        write!(f, "{} on {} #{}", kind, facility, self.index)
    }
}

/// Connection to the audio server
#[async_trait]
pub trait AudioServer: Send + Sync {
    async fn list_sinks(&self) -> Result<Vec<Sink>>;

    async fn list_sink_inputs(&self) -> Result<Vec<SinkInput>>;

    /// Set a sink's volume, one value per channel
    async fn set_sink_volume(&self, index: u32, volume: &[f64]) -> Result<()>;

    /// Set a sink input's volume, one value per channel
    async fn set_sink_input_volume(&self, index: u32, volume: &[f64]) -> Result<()>;

    async fn move_sink_input(&self, input: u32, sink: u32) -> Result<()>;

    async fn set_default_sink(&self, sink: &Sink) -> Result<()>;

    /// Subscribe to live server events, in server order
    async fn subscribe(&self) -> Result<mpsc::UnboundedReceiver<ServerEvent>>;
}

/// Clamp a volume to `[0, 1]`; NaN becomes silence
pub fn clamp_volume(volume: f64) -> f64 {
    if volume.is_nan() {
        0.0
    } else {
        volume.clamp(0.0, 1.0)
    }
}

/// Uniform per-channel volume vector
pub fn uniform_volume(volume: f64, channels: usize) -> Vec<f64> {
    vec![clamp_volume(volume); channels.max(1)]
}
