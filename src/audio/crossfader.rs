//! One knob fading between two outputs

use super::sinks::SinkGroup;
use super::stream::StreamControl;
use anyhow::Result;
use std::sync::Arc;
use tracing::debug;

/// Knob position between the two halves of the 0..=127 range
pub const MIDPOINT: f64 = 127.0 / 2.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Left,
    Right,
}

/// Volumes derived from one knob position
///
/// Values are not clamped here; [`SinkGroup::set_volume`] clamps them to
/// `[0, 1]` before they reach the audio server.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CrossfadeLevels {
    /// `max((v - m) * 2 / 100, 0)`, applied to the right sink
    pub left: f64,
    /// `max((m - v) * 2 / 100, 0)`, applied to the left sink
    pub right: f64,
    /// Side that becomes the active output
    pub side: Side,
}

/// Compute the crossfade levels for a controller value
pub fn levels(value: u8) -> CrossfadeLevels {
    let value = f64::from(value);
    CrossfadeLevels {
        left: ((value - MIDPOINT) * 2.0 / 100.0).max(0.0),
        right: ((MIDPOINT - value) * 2.0 / 100.0).max(0.0),
        side: if value > MIDPOINT { Side::Right } else { Side::Left },
    }
}

/// What happens to the selected side
#[derive(Clone)]
pub enum CrossfadeTarget {
    /// Make it the default output
    DefaultSink,
    /// Move a stream onto it
    MoveStream(Arc<StreamControl>),
}

pub struct Crossfader {
    left: SinkGroup,
    right: SinkGroup,
    target: CrossfadeTarget,
}

impl Crossfader {
    pub fn new(left: SinkGroup, right: SinkGroup, target: CrossfadeTarget) -> Self {
        Self { left, right, target }
    }

    pub fn description(&self) -> String {
        format!("{} <-> {}", self.left.description(), self.right.description())
    }

    /// Apply a knob position: both volumes first, then the side selection
    pub async fn update(&self, value: u8) -> Result<()> {
        let levels = levels(value);
        debug!("Crossfader {}: {} -> {:?}", self.description(), value, levels);

        self.left.set_volume(levels.right).await?;
        self.right.set_volume(levels.left).await?;

        let selected = match levels.side {
            Side::Left => &self.left,
            Side::Right => &self.right,
        };
        match &self.target {
            CrossfadeTarget::DefaultSink => {
                selected.set_default().await?;
            }
            CrossfadeTarget::MoveStream(stream) => {
                stream.move_to(selected).await?;
            }
        }
        Ok(())
    }
}
