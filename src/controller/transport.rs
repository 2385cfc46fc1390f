//! Device transport: port discovery and event intake from the MIDI pad

use crate::midi::{format_hex, DeviceEvent, MidiMessage};
use anyhow::{anyhow, Context, Result};
use midir::{MidiInput, MidiInputConnection, MidiOutput, MidiOutputConnection};
use tokio::sync::mpsc;
use tracing::{debug, info, trace};

/// Capability to discover, open and read the controller
///
/// Reading is a non-blocking pull: `pending` returns whatever arrived since the
/// previous call and never waits.
pub trait DeviceTransport {
    /// Names of the available input ports
    fn input_names(&self) -> Result<Vec<String>>;

    /// Names of the available output ports
    fn output_names(&self) -> Result<Vec<String>>;

    /// Open ports by exact name, closing whatever was open before
    fn open(&mut self, input: &str, output: Option<&str>) -> Result<()>;

    /// Close all ports
    fn close(&mut self);

    fn is_open(&self) -> bool;

    /// Drain events received since the last call
    fn pending(&mut self) -> Vec<DeviceEvent>;
}

/// midir-backed transport
pub struct MidirTransport {
    client_name: String,
    input_conn: Option<MidiInputConnection<()>>,
    output_conn: Option<MidiOutputConnection>,
    event_tx: mpsc::UnboundedSender<DeviceEvent>,
    event_rx: mpsc::UnboundedReceiver<DeviceEvent>,
}

impl MidirTransport {
    pub fn new(client_name: impl Into<String>) -> Self {
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        Self {
            client_name: client_name.into(),
            input_conn: None,
            output_conn: None,
            event_tx,
            event_rx,
        }
    }
}

impl DeviceTransport for MidirTransport {
    fn input_names(&self) -> Result<Vec<String>> {
        let midi_in = MidiInput::new(&format!("{}-scanner", self.client_name))?;
        Ok(midi_in
            .ports()
            .iter()
            .filter_map(|port| midi_in.port_name(port).ok())
            .collect())
    }

    fn output_names(&self) -> Result<Vec<String>> {
        let midi_out = MidiOutput::new(&format!("{}-scanner", self.client_name))?;
        Ok(midi_out
            .ports()
            .iter()
            .filter_map(|port| midi_out.port_name(port).ok())
            .collect())
    }

    fn open(&mut self, input: &str, output: Option<&str>) -> Result<()> {
        self.close();

        let midi_in = MidiInput::new(&format!("{}-input", self.client_name))
            .context("Failed to create MIDI input")?;
        let in_port = midi_in
            .ports()
            .into_iter()
            .find(|port| midi_in.port_name(port).map(|n| n == input).unwrap_or(false))
            .ok_or_else(|| anyhow!("Input port '{}' not found", input))?;

        let event_tx = self.event_tx.clone();
        let input_conn = midi_in
            .connect(
                &in_port,
                &self.client_name,
                move |_timestamp, data, _| match MidiMessage::parse(data) {
                    Some(message) => {
                        if let Some(event) = DeviceEvent::from_message(&message) {
                            let _ = event_tx.send(event);
                        } else {
                            trace!("Ignoring MIDI message {}", message);
                        }
                    }
                    None => debug!("Failed to parse MIDI: {}", format_hex(data)),
                },
                (),
            )
            .map_err(|e| anyhow!("{}", e))
            .context("Failed to connect to input port")?;
        self.input_conn = Some(input_conn);
        info!("Connected to input port: {}", input);

        if let Some(output) = output {
            let midi_out = MidiOutput::new(&format!("{}-output", self.client_name))
                .context("Failed to create MIDI output")?;
            let out_port = midi_out
                .ports()
                .into_iter()
                .find(|port| midi_out.port_name(port).map(|n| n == output).unwrap_or(false))
                .ok_or_else(|| anyhow!("Output port '{}' not found", output))?;
            let output_conn = midi_out
                .connect(&out_port, &self.client_name)
                .map_err(|e| anyhow!("{}", e))
                .context("Failed to connect to output port")?;
            self.output_conn = Some(output_conn);
            info!("Connected to output port: {}", output);
        }

        Ok(())
    }

    fn close(&mut self) {
        if let Some(conn) = self.input_conn.take() {
            conn.close();
        }
        if let Some(conn) = self.output_conn.take() {
            conn.close();
        }
        // Drop whatever the old connection left behind
        while self.event_rx.try_recv().is_ok() {}
    }

    fn is_open(&self) -> bool {
        self.input_conn.is_some()
    }

    fn pending(&mut self) -> Vec<DeviceEvent> {
        let mut events = Vec::new();
        while let Ok(event) = self.event_rx.try_recv() {
            events.push(event);
        }
        events
    }
}
