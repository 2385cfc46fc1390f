//! Output devices addressed through a sink view

use super::{clamp_volume, uniform_volume, AudioServer, Sink, SinkView};
use anyhow::Result;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

/// A view that had to resolve to exactly one sink did not
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SinksCountError {
    #[error("No sink found ({0})")]
    NoSink(String),
    #[error("Too many sinks {0} found ({1})")]
    TooMany(usize, String),
}

/// Set of sinks selected by a view
#[derive(Clone)]
pub struct SinkGroup {
    view: SinkView,
    server: Arc<dyn AudioServer>,
}

impl SinkGroup {
    pub fn new(view: SinkView, server: Arc<dyn AudioServer>) -> Self {
        Self { view, server }
    }

    pub fn description(&self) -> &str {
        self.view.description()
    }

    pub fn view(&self) -> &SinkView {
        &self.view
    }

    /// Apply `volume` to every matching sink; returns how many were changed
    pub async fn set_volume(&self, volume: f64) -> Result<usize> {
        let volume = clamp_volume(volume);
        let sinks = self.view.get();
        if sinks.is_empty() {
            warn!("No sink to set volume on ({})", self.description());
            return Ok(0);
        }

        for sink in &sinks {
            debug!("Sink '{}' volume -> {:.2}", sink.description, volume);
            self.server
                .set_sink_volume(sink.index, &uniform_volume(volume, sink.channels()))
                .await?;
        }
        Ok(sinks.len())
    }

    /// The single sink this view selects
    pub fn raw_sink(&self) -> Result<Sink, SinksCountError> {
        let mut sinks = self.view.get();
        match sinks.len() {
            0 => Err(SinksCountError::NoSink(self.description().to_string())),
            1 => Ok(sinks.remove(0)),
            n => Err(SinksCountError::TooMany(n, self.description().to_string())),
        }
    }

    pub fn index(&self) -> Result<u32, SinksCountError> {
        self.raw_sink().map(|sink| sink.index)
    }

    /// Make the selected sink the default output.
    ///
    /// Returns `false` without touching the server when the view does not
    /// resolve to exactly one sink.
    pub async fn set_default(&self) -> Result<bool> {
        let sink = match self.raw_sink() {
            Ok(sink) => sink,
            Err(e) => {
                warn!("Cannot set default output: {}", e);
                return Ok(false);
            }
        };

        info!("🔊 Default output -> {}", sink.description);
        self.server.set_default_sink(&sink).await?;
        Ok(true)
    }
}
