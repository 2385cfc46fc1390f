//! Dispatch handlers wrapping actions and audio controls

use crate::actions::{CompositeAction, SoundPlayer};
use crate::audio::{Crossfader, SinkGroup, StreamControl};
use crate::config::SoundMode;
use crate::controller::Handler;
use crate::midi::DeviceEvent;
use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::trace;

/// Focus-then-keys action on a pad
pub struct KeyBinding {
    action: CompositeAction,
    only_nonzero: bool,
}

impl KeyBinding {
    pub fn new(action: CompositeAction, only_nonzero: bool) -> Self {
        Self { action, only_nonzero }
    }
}

#[async_trait]
impl Handler for KeyBinding {
    fn label(&self) -> String {
        format!("keys {}", self.action.label())
    }

    async fn handle(&self, event: &DeviceEvent) -> Result<()> {
        if self.only_nonzero && event.value == 0 {
            trace!("Ignoring release of {}", event);
            return Ok(());
        }
        self.action.send().await?;
        Ok(())
    }
}

/// Knob driving the volume of a sink group
pub struct SinkVolumeBinding {
    sinks: SinkGroup,
}

impl SinkVolumeBinding {
    pub fn new(sinks: SinkGroup) -> Self {
        Self { sinks }
    }
}

#[async_trait]
impl Handler for SinkVolumeBinding {
    fn label(&self) -> String {
        format!("volume of {}", self.sinks.description())
    }

    async fn handle(&self, event: &DeviceEvent) -> Result<()> {
        self.sinks.set_volume(event.unit_value()).await?;
        Ok(())
    }
}

/// Knob driving the volume of an application stream
pub struct StreamVolumeBinding {
    stream: Arc<StreamControl>,
}

impl StreamVolumeBinding {
    pub fn new(stream: Arc<StreamControl>) -> Self {
        Self { stream }
    }
}

#[async_trait]
impl Handler for StreamVolumeBinding {
    fn label(&self) -> String {
        format!("volume of {}", self.stream.description())
    }

    async fn handle(&self, event: &DeviceEvent) -> Result<()> {
        self.stream.set_volume(event.unit_value()).await?;
        Ok(())
    }
}

pub struct CrossfaderBinding {
    crossfader: Crossfader,
}

impl CrossfaderBinding {
    pub fn new(crossfader: Crossfader) -> Self {
        Self { crossfader }
    }
}

#[async_trait]
impl Handler for CrossfaderBinding {
    fn label(&self) -> String {
        format!("crossfader {}", self.crossfader.description())
    }

    async fn handle(&self, event: &DeviceEvent) -> Result<()> {
        self.crossfader.update(event.value).await
    }
}

pub struct SoundBinding {
    player: SoundPlayer,
    mode: SoundMode,
}

impl SoundBinding {
    pub fn new(player: SoundPlayer, mode: SoundMode) -> Self {
        Self { player, mode }
    }
}

#[async_trait]
impl Handler for SoundBinding {
    fn label(&self) -> String {
        let verb = match self.mode {
            SoundMode::Play => "play",
            SoundMode::Toggle => "toggle",
        };
        format!("{} {}", verb, self.player.path().display())
    }

    async fn handle(&self, _event: &DeviceEvent) -> Result<()> {
        match self.mode {
            SoundMode::Play => self.player.play(),
            SoundMode::Toggle => self.player.toggle(),
        }
        Ok(())
    }
}
