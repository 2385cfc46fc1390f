//! MIDI Shortcuts library
//!
//! Binds the pads and knobs of a MIDI controller to desktop shortcuts,
//! PulseAudio volumes and sound effects.

pub mod actions;
pub mod app;
pub mod audio;
pub mod bindings;
pub mod config;
pub mod controller;
pub mod focus;
pub mod midi;
pub mod paths;
pub mod process;
pub mod sniffer;

#[cfg(test)]
pub(crate) mod testing;
