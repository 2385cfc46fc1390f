//! In-memory collaborators for tests

use crate::actions::{KeyCombo, KeyEmitter};
use crate::audio::{
    AudioServer, ServerEvent, Sink, SinkInput, SinkState, APPLICATION_NAME, MEDIA_NAME,
};
use crate::controller::{DeviceTransport, Handler};
use crate::focus::{BrowserClient, BrowserTab, TabBroker, Window, WindowSystem};
use crate::midi::DeviceEvent;
use anyhow::{bail, Result};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::subscriber::DefaultGuard;

pub fn sink(index: u32, description: &str, state: SinkState) -> Sink {
    Sink {
        index,
        name: format!("sink_{}", index),
        description: description.to_string(),
        state,
        volume: vec![1.0, 1.0],
    }
}

pub fn sink_input(index: u32, app: Option<&str>, media: Option<&str>) -> SinkInput {
    let mut properties = HashMap::new();
    if let Some(app) = app {
        properties.insert(APPLICATION_NAME.to_string(), app.to_string());
    }
    if let Some(media) = media {
        properties.insert(MEDIA_NAME.to_string(), media.to_string());
    }
    SinkInput { index, sink: 0, properties, volume: vec![1.0, 1.0] }
}

/// Mutation recorded by [`FakeAudioServer`]
#[derive(Debug, Clone, PartialEq)]
pub enum AudioCall {
    SinkVolume(u32, Vec<f64>),
    SinkInputVolume(u32, Vec<f64>),
    MoveSinkInput { input: u32, sink: u32 },
    DefaultSink(u32),
}

/// Audio server serving scripted lists and recording every mutation
///
/// Each `subscribe` opens a fresh event channel, so a subscriber that lost
/// its subscription can come back.
#[derive(Default)]
pub struct FakeAudioServer {
    sinks: Mutex<Vec<Sink>>,
    sink_inputs: Mutex<Vec<SinkInput>>,
    calls: Mutex<Vec<AudioCall>>,
    queries: Mutex<Vec<&'static str>>,
    events_tx: Mutex<Option<mpsc::UnboundedSender<ServerEvent>>>,
    subscriptions: Mutex<usize>,
}

impl FakeAudioServer {
    pub fn set_sinks(&self, sinks: Vec<Sink>) {
        *self.sinks.lock() = sinks;
    }

    pub fn set_sink_inputs(&self, inputs: Vec<SinkInput>) {
        *self.sink_inputs.lock() = inputs;
    }

    pub fn calls(&self) -> Vec<AudioCall> {
        self.calls.lock().clone()
    }

    pub fn clear_calls(&self) {
        self.calls.lock().clear();
    }

    /// Read-side requests (`subscribe`, `list sinks`, `list sink-inputs`) in order
    pub fn queries(&self) -> Vec<&'static str> {
        self.queries.lock().clone()
    }

    pub fn subscriptions(&self) -> usize {
        *self.subscriptions.lock()
    }

    /// Sender feeding the current subscription
    pub fn event_sender(&self) -> mpsc::UnboundedSender<ServerEvent> {
        self.events_tx.lock().clone().expect("not subscribed")
    }

    /// Drop the server's own sender; the subscription ends once every
    /// [`FakeAudioServer::event_sender`] clone is gone too
    pub fn close_subscription(&self) {
        self.events_tx.lock().take();
    }

    fn record(&self, call: AudioCall) {
        self.calls.lock().push(call);
    }
}

#[async_trait]
impl AudioServer for FakeAudioServer {
    async fn list_sinks(&self) -> Result<Vec<Sink>> {
        self.queries.lock().push("list sinks");
        Ok(self.sinks.lock().clone())
    }

    async fn list_sink_inputs(&self) -> Result<Vec<SinkInput>> {
        self.queries.lock().push("list sink-inputs");
        Ok(self.sink_inputs.lock().clone())
    }

    async fn set_sink_volume(&self, index: u32, volume: &[f64]) -> Result<()> {
        self.record(AudioCall::SinkVolume(index, volume.to_vec()));
        Ok(())
    }

    async fn set_sink_input_volume(&self, index: u32, volume: &[f64]) -> Result<()> {
        self.record(AudioCall::SinkInputVolume(index, volume.to_vec()));
        Ok(())
    }

    async fn move_sink_input(&self, input: u32, sink: u32) -> Result<()> {
        self.record(AudioCall::MoveSinkInput { input, sink });
        Ok(())
    }

    async fn set_default_sink(&self, sink: &Sink) -> Result<()> {
        self.record(AudioCall::DefaultSink(sink.index));
        Ok(())
    }

    async fn subscribe(&self) -> Result<mpsc::UnboundedReceiver<ServerEvent>> {
        self.queries.lock().push("subscribe");
        let (tx, rx) = mpsc::unbounded_channel();
        *self.events_tx.lock() = Some(tx);
        *self.subscriptions.lock() += 1;
        Ok(rx)
    }
}

/// How [`FakeWindows`] reacts to an activation request
#[derive(Debug, Clone, Copy)]
enum Activation {
    /// Active after this many active-window queries
    After(usize),
    Never,
}

/// Scripted window manager
pub struct FakeWindows {
    windows: Vec<Window>,
    activation: Activation,
    activated: Mutex<Vec<u64>>,
    queries: Mutex<usize>,
}

impl FakeWindows {
    /// Windows become active on the first query after activation
    pub fn new(windows: Vec<Window>) -> Self {
        Self {
            windows,
            activation: Activation::After(0),
            activated: Mutex::new(Vec::new()),
            queries: Mutex::new(0),
        }
    }

    pub fn activating_after(mut self, queries: usize) -> Self {
        self.activation = Activation::After(queries);
        self
    }

    pub fn never_activating(mut self) -> Self {
        self.activation = Activation::Never;
        self
    }

    pub fn activated(&self) -> Vec<u64> {
        self.activated.lock().clone()
    }
}

#[async_trait]
impl WindowSystem for FakeWindows {
    async fn list_windows(&self) -> Result<Vec<Window>> {
        Ok(self.windows.clone())
    }

    async fn activate(&self, window: &Window) -> Result<()> {
        self.activated.lock().push(window.id);
        *self.queries.lock() = 0;
        Ok(())
    }

    async fn active_window(&self) -> Result<Option<u64>> {
        let mut queries = self.queries.lock();
        *queries += 1;
        let target = self.activated.lock().last().copied();
        Ok(match self.activation {
            Activation::After(n) if *queries > n => target,
            _ => None,
        })
    }
}

/// Scripted tab broker
pub struct FakeTabs {
    clients: Vec<BrowserClient>,
    tabs: Vec<BrowserTab>,
    fail_activation: bool,
    activated: Mutex<Vec<String>>,
}

impl FakeTabs {
    pub fn new(clients: Vec<BrowserClient>, tabs: Vec<BrowserTab>) -> Self {
        Self { clients, tabs, fail_activation: false, activated: Mutex::new(Vec::new()) }
    }

    pub fn failing(mut self) -> Self {
        self.fail_activation = true;
        self
    }

    pub fn activated(&self) -> Vec<String> {
        self.activated.lock().clone()
    }
}

#[async_trait]
impl TabBroker for FakeTabs {
    async fn list_clients(&self) -> Vec<BrowserClient> {
        self.clients.clone()
    }

    async fn list_tabs(&self, client: &BrowserClient) -> Vec<BrowserTab> {
        let prefix = format!("{}.", client.prefix);
        self.tabs.iter().filter(|t| t.id.starts_with(&prefix)).cloned().collect()
    }

    async fn activate(&self, tab: &BrowserTab) -> bool {
        if self.fail_activation {
            return false;
        }
        self.activated.lock().push(tab.id.clone());
        true
    }
}

/// Keyboard recording every combo it is asked to send
#[derive(Default)]
pub struct RecordingKeyboard {
    sent: Mutex<Vec<String>>,
}

impl RecordingKeyboard {
    pub fn sent(&self) -> Vec<String> {
        self.sent.lock().clone()
    }
}

#[async_trait]
impl KeyEmitter for RecordingKeyboard {
    async fn emit_combo(&self, combo: &KeyCombo) -> Result<()> {
        self.sent.lock().push(combo.to_string());
        Ok(())
    }
}

/// Transport fed from a shared queue
#[derive(Default)]
pub struct FakeTransport {
    pub inputs: Arc<Mutex<Vec<String>>>,
    pub outputs: Vec<String>,
    pub queue: Arc<Mutex<Vec<DeviceEvent>>>,
    pub opened: Arc<Mutex<Vec<(String, Option<String>)>>>,
    pub fail_open: bool,
    pub open: bool,
}

impl FakeTransport {
    pub fn with_inputs(inputs: &[&str]) -> Self {
        Self {
            inputs: Arc::new(Mutex::new(inputs.iter().map(|s| s.to_string()).collect())),
            ..Default::default()
        }
    }
}

impl DeviceTransport for FakeTransport {
    fn input_names(&self) -> Result<Vec<String>> {
        Ok(self.inputs.lock().clone())
    }

    fn output_names(&self) -> Result<Vec<String>> {
        Ok(self.outputs.clone())
    }

    fn open(&mut self, input: &str, output: Option<&str>) -> Result<()> {
        if self.fail_open {
            bail!("device busy");
        }
        self.opened.lock().push((input.to_string(), output.map(str::to_string)));
        self.open = true;
        Ok(())
    }

    fn close(&mut self) {
        // Closing a port drops whatever it had buffered
        if self.open {
            self.queue.lock().clear();
        }
        self.open = false;
    }

    fn is_open(&self) -> bool {
        self.open
    }

    fn pending(&mut self) -> Vec<DeviceEvent> {
        if !self.open {
            return Vec::new();
        }
        std::mem::take(&mut *self.queue.lock())
    }
}

/// Handler recording the value of every event it receives
pub struct ValueRecorder(pub Arc<Mutex<Vec<u8>>>);

#[async_trait]
impl Handler for ValueRecorder {
    fn label(&self) -> String {
        "recorder".into()
    }

    async fn handle(&self, event: &DeviceEvent) -> Result<()> {
        self.0.lock().push(event.value);
        Ok(())
    }
}

/// Formatted log output at warn level and above
#[derive(Clone, Default)]
pub struct LogCapture(Arc<Mutex<Vec<u8>>>);

impl LogCapture {
    /// Capture this thread's logs until the guard is dropped
    pub fn install(&self) -> DefaultGuard {
        let capture = self.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || capture.clone())
            .with_ansi(false)
            .with_max_level(tracing::Level::WARN)
            .finish();
        tracing::subscriber::set_default(subscriber)
    }

    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock()).into_owned()
    }
}

impl std::io::Write for LogCapture {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}
