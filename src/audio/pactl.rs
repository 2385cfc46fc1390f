//! PulseAudio access through `pactl`

use super::{AudioServer, Facility, ServerEvent, ServerEventKind, Sink, SinkInput, SinkState};
use crate::process;
use anyhow::{Context, Result};
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tokio::sync::mpsc;
use tokio_stream::wrappers::LinesStream;
use tokio_stream::StreamExt;
use tracing::{debug, warn};

/// PulseAudio's 100% volume
const VOLUME_NORM: f64 = 65536.0;

static EVENT_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^Event '(\w+)' on ([\w-]+) #(\d+)$").expect("valid event regex")
});

#[derive(Debug, Deserialize)]
struct ChannelVolume {
    value: u64,
}

#[derive(Debug, Deserialize)]
struct RawSink {
    index: u32,
    #[serde(default)]
    state: String,
    name: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    volume: BTreeMap<String, ChannelVolume>,
}

#[derive(Debug, Deserialize)]
struct RawSinkInput {
    index: u32,
    sink: u32,
    #[serde(default)]
    properties: HashMap<String, Value>,
    #[serde(default)]
    volume: BTreeMap<String, ChannelVolume>,
}

fn channel_volumes(volume: &BTreeMap<String, ChannelVolume>) -> Vec<f64> {
    volume.values().map(|c| c.value as f64 / VOLUME_NORM).collect()
}

/// Parse `pactl -f json list sinks`
pub fn parse_sinks(json: &str) -> Result<Vec<Sink>> {
    let raw: Vec<RawSink> = serde_json::from_str(json).context("Invalid sink list")?;
    Ok(raw
        .into_iter()
        .map(|s| Sink {
            index: s.index,
            state: SinkState::parse(&s.state),
            volume: channel_volumes(&s.volume),
            name: s.name,
            description: s.description,
        })
        .collect())
}

/// Parse `pactl -f json list sink-inputs`
pub fn parse_sink_inputs(json: &str) -> Result<Vec<SinkInput>> {
    let raw: Vec<RawSinkInput> = serde_json::from_str(json).context("Invalid sink input list")?;
    Ok(raw
        .into_iter()
        .map(|i| SinkInput {
            index: i.index,
            sink: i.sink,
            volume: channel_volumes(&i.volume),
            properties: i
                .properties
                .into_iter()
                .map(|(key, value)| match value {
                    Value::String(s) => (key, s),
                    other => (key, other.to_string()),
                })
                .collect(),
        })
        .collect())
}

/// Parse one `pactl subscribe` line
pub fn parse_event(line: &str) -> Option<ServerEvent> {
    let caps = EVENT_LINE.captures(line.trim())?;
    let kind = match &caps[1] {
        "new" => ServerEventKind::New,
        "change" => ServerEventKind::Change,
        "remove" => ServerEventKind::Remove,
        _ => return None,
    };
    let facility = match &caps[2] {
        "sink" => Facility::Sink,
        "sink-input" => Facility::SinkInput,
        other => Facility::Other(other.to_string()),
    };
    let index = caps[3].parse().ok()?;
    Some(ServerEvent { facility, kind, index })
}

fn volume_args(volume: &[f64]) -> Vec<String> {
    volume
        .iter()
        .map(|v| format!("{:.2}%", super::clamp_volume(*v) * 100.0))
        .collect()
}

/// `pactl`-backed audio server
#[derive(Debug, Clone, Default)]
pub struct PactlServer;

impl PactlServer {
    async fn pactl(&self, args: &[&str]) -> Result<String> {
        process::run("pactl", args).await
    }

    async fn set_volume(&self, command: &str, index: u32, volume: &[f64]) -> Result<()> {
        let index = index.to_string();
        let values = volume_args(volume);
        let mut args = vec![command, index.as_str()];
        args.extend(values.iter().map(String::as_str));
        self.pactl(&args).await?;
        Ok(())
    }
}

#[async_trait]
impl AudioServer for PactlServer {
    async fn list_sinks(&self) -> Result<Vec<Sink>> {
        parse_sinks(&self.pactl(&["-f", "json", "list", "sinks"]).await?)
    }

    async fn list_sink_inputs(&self) -> Result<Vec<SinkInput>> {
        parse_sink_inputs(&self.pactl(&["-f", "json", "list", "sink-inputs"]).await?)
    }

    async fn set_sink_volume(&self, index: u32, volume: &[f64]) -> Result<()> {
        self.set_volume("set-sink-volume", index, volume).await
    }

    async fn set_sink_input_volume(&self, index: u32, volume: &[f64]) -> Result<()> {
        self.set_volume("set-sink-input-volume", index, volume).await
    }

    async fn move_sink_input(&self, input: u32, sink: u32) -> Result<()> {
        self.pactl(&["move-sink-input", &input.to_string(), &sink.to_string()])
            .await?;
        Ok(())
    }

    async fn set_default_sink(&self, sink: &Sink) -> Result<()> {
        self.pactl(&["set-default-sink", &sink.name]).await?;
        Ok(())
    }

    async fn subscribe(&self) -> Result<mpsc::UnboundedReceiver<ServerEvent>> {
        let mut child = Command::new("pactl")
            .arg("subscribe")
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .context("Failed to start pactl subscribe")?;
        let stdout = child
            .stdout
            .take()
            .context("pactl subscribe has no stdout")?;

        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(async move {
            let mut lines = LinesStream::new(BufReader::new(stdout).lines());
            while let Some(Ok(line)) = lines.next().await {
                match parse_event(&line) {
                    Some(event) => {
                        if tx.send(event).is_err() {
                            break;
                        }
                    }
                    None => debug!("Ignoring pactl line: {}", line),
                }
            }
            if let Ok(status) = child.wait().await {
                warn!("pactl subscribe exited ({})", status);
            }
        });
        Ok(rx)
    }
}
