//! MIDI utilities and device event types
//!
//! Decodes raw MIDI bytes coming from the pad controller and reduces them to the
//! `(kind, identifier, value)` triples the dispatch table binds on.

use std::fmt;
use std::time::Instant;

/// MIDI message types the controller can send
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MidiMessage {
    /// Note Off: channel (0-15), note (0-127), velocity (0-127)
    NoteOff { channel: u8, note: u8, velocity: u8 },

    /// Note On: channel (0-15), note (0-127), velocity (1-127)
    NoteOn { channel: u8, note: u8, velocity: u8 },

    /// Control Change: channel (0-15), cc (0-127), value (0-127)
    ControlChange { channel: u8, cc: u8, value: u8 },

    /// Program Change: channel (0-15), program (0-127)
    ProgramChange { channel: u8, program: u8 },

    /// Anything else (pitch bend, aftertouch, system messages)
    Other { status: u8 },
}

impl MidiMessage {
    /// Parse a MIDI message from raw bytes
    pub fn parse(data: &[u8]) -> Option<Self> {
        let status = *data.first()?;

        // Running status is never used by the pads
        if status < 0x80 {
            return None;
        }

        if status >= 0xF0 {
            return Some(MidiMessage::Other { status });
        }

        let channel = status & 0x0F;
        match status & 0xF0 {
            0x80 => {
                if data.len() < 3 {
                    return None;
                }
                Some(MidiMessage::NoteOff {
                    channel,
                    note: data[1] & 0x7F,
                    velocity: data[2] & 0x7F,
                })
            }
            0x90 => {
                // Note On (velocity 0 = Note Off)
                if data.len() < 3 {
                    return None;
                }
                let note = data[1] & 0x7F;
                let velocity = data[2] & 0x7F;

                if velocity == 0 {
                    Some(MidiMessage::NoteOff { channel, note, velocity: 0 })
                } else {
                    Some(MidiMessage::NoteOn { channel, note, velocity })
                }
            }
            0xB0 => {
                if data.len() < 3 {
                    return None;
                }
                Some(MidiMessage::ControlChange {
                    channel,
                    cc: data[1] & 0x7F,
                    value: data[2] & 0x7F,
                })
            }
            0xC0 => {
                if data.len() < 2 {
                    return None;
                }
                Some(MidiMessage::ProgramChange {
                    channel,
                    program: data[1] & 0x7F,
                })
            }
            _ => Some(MidiMessage::Other { status }),
        }
    }
}

impl fmt::Display for MidiMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            MidiMessage::NoteOff { channel, note, velocity } => {
                write!(f, "NoteOff ch:{} n:{} v:{}", channel + 1, note, velocity)
            }
            MidiMessage::NoteOn { channel, note, velocity } => {
                write!(f, "NoteOn ch:{} n:{} v:{}", channel + 1, note, velocity)
            }
            MidiMessage::ControlChange { channel, cc, value } => {
                write!(f, "CC ch:{} cc:{} v:{}", channel + 1, cc, value)
            }
            MidiMessage::ProgramChange { channel, program } => {
                write!(f, "ProgramChange ch:{} p:{}", channel + 1, program)
            }
            MidiMessage::Other { status } => write!(f, "Other status:{:02X}", status),
        }
    }
}

/// Kind of device event a handler can be bound to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    NoteOn,
    ControlChange,
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventKind::NoteOn => write!(f, "note_on"),
            EventKind::ControlChange => write!(f, "control_change"),
        }
    }
}

/// Timestamped event received from the controller
#[derive(Debug, Clone)]
pub struct DeviceEvent {
    pub timestamp: Instant,
    pub kind: EventKind,
    /// Note number for `NoteOn`, controller number for `ControlChange`
    pub identifier: u8,
    /// Velocity or controller value (0-127)
    pub value: u8,
}

impl DeviceEvent {
    pub fn new(kind: EventKind, identifier: u8, value: u8) -> Self {
        Self {
            timestamp: Instant::now(),
            kind,
            identifier,
            value: value.min(127),
        }
    }

    pub fn note_on(note: u8, velocity: u8) -> Self {
        Self::new(EventKind::NoteOn, note, velocity)
    }

    pub fn control_change(cc: u8, value: u8) -> Self {
        Self::new(EventKind::ControlChange, cc, value)
    }

    /// Reduce a parsed MIDI message to a bindable event.
    ///
    /// Only note-on and control-change messages are bindable; everything else
    /// (including note-off) yields `None`.
    pub fn from_message(message: &MidiMessage) -> Option<Self> {
        match *message {
            MidiMessage::NoteOn { note, velocity, .. } => Some(Self::note_on(note, velocity)),
            MidiMessage::ControlChange { cc, value, .. } => Some(Self::control_change(cc, value)),
            _ => None,
        }
    }

    /// Controller value scaled to `[0, 1]`
    pub fn unit_value(&self) -> f64 {
        self.value as f64 / 127.0
    }
}

impl fmt::Display for DeviceEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} #{} = {}", self.kind, self.identifier, self.value)
    }
}

/// Format MIDI bytes as hex string for debugging
pub fn format_hex(data: &[u8]) -> String {
    data.iter()
        .map(|b| format!("{:02X}", b))
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_note_on_parsing() {
        let data = vec![0x90, 36, 100];
        let msg = MidiMessage::parse(&data).unwrap();

        assert_eq!(msg, MidiMessage::NoteOn { channel: 0, note: 36, velocity: 100 });
    }

    #[test]
    fn test_note_on_velocity_zero_is_not_bindable() {
        let msg = MidiMessage::parse(&[0x90, 36, 0]).unwrap();

        assert_eq!(msg, MidiMessage::NoteOff { channel: 0, note: 36, velocity: 0 });
        assert!(DeviceEvent::from_message(&msg).is_none());
    }

    #[test]
    fn test_control_change_event() {
        let msg = MidiMessage::parse(&[0xB0, 11, 64]).unwrap();
        let event = DeviceEvent::from_message(&msg).unwrap();

        assert_eq!(event.kind, EventKind::ControlChange);
        assert_eq!(event.identifier, 11);
        assert_eq!(event.value, 64);
    }

    #[test]
    fn test_program_change_is_ignored() {
        let msg = MidiMessage::parse(&[0xC0, 2]).unwrap();
        assert_eq!(msg, MidiMessage::ProgramChange { channel: 0, program: 2 });
        assert!(DeviceEvent::from_message(&msg).is_none());
    }

    #[test]
    fn test_pitch_bend_is_not_bindable() {
        let msg = MidiMessage::parse(&[0xE1, 0x00, 0x40]).unwrap();
        assert_eq!(msg, MidiMessage::Other { status: 0xE1 });
        assert!(DeviceEvent::from_message(&msg).is_none());
    }

    #[test]
    fn test_truncated_and_running_status() {
        assert!(MidiMessage::parse(&[]).is_none());
        assert!(MidiMessage::parse(&[0x90, 36]).is_none());
        assert!(MidiMessage::parse(&[0x24, 100]).is_none());
    }

    #[test]
    fn test_unit_value() {
        assert_eq!(DeviceEvent::control_change(1, 0).unit_value(), 0.0);
        assert_eq!(DeviceEvent::control_change(1, 127).unit_value(), 1.0);
    }

    #[test]
    fn test_format_hex() {
        assert_eq!(format_hex(&[0x90, 0x24, 0x7F]), "90 24 7F");
    }
}
