//! Controller programs: which note/controller numbers each pad and knob sends

use std::collections::BTreeMap;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum MappingError {
    #[error("Cannot map program {0} (programs start at 1)")]
    InvalidProgram(u8),
    #[error("Could not find program {0} (programs start at 1)")]
    UnknownProgram(u8),
    #[error("Pad {0} is not mapped")]
    UnmappedPad(usize),
    #[error("Knob {0} is not mapped")]
    UnmappedKnob(usize),
}

/// Identifiers sent by one controller program
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Program {
    pads: Vec<u8>,
    knobs: Vec<u8>,
}

impl Program {
    pub fn new(pads: Vec<u8>, knobs: Vec<u8>) -> Self {
        Self { pads, knobs }
    }

    /// Note/controller number of a pad (one-based)
    pub fn pad(&self, pad: usize) -> Result<u8, MappingError> {
        pad.checked_sub(1)
            .and_then(|i| self.pads.get(i).copied())
            .ok_or(MappingError::UnmappedPad(pad))
    }

    /// Controller number of a knob (one-based)
    pub fn knob(&self, knob: usize) -> Result<u8, MappingError> {
        knob.checked_sub(1)
            .and_then(|i| self.knobs.get(i).copied())
            .ok_or(MappingError::UnmappedKnob(knob))
    }

    pub fn pad_count(&self) -> usize {
        self.pads.len()
    }

    pub fn knob_count(&self) -> usize {
        self.knobs.len()
    }
}

/// Program number -> identifiers
#[derive(Debug, Clone, Default)]
pub struct ControllerMapping {
    programs: BTreeMap<u8, Program>,
}

impl ControllerMapping {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn map(&mut self, program_id: u8, program: Program) -> Result<(), MappingError> {
        if program_id < 1 {
            return Err(MappingError::InvalidProgram(program_id));
        }
        self.programs.insert(program_id, program);
        Ok(())
    }

    pub fn get(&self, program_id: u8) -> Result<&Program, MappingError> {
        self.programs
            .get(&program_id)
            .ok_or(MappingError::UnknownProgram(program_id))
    }
}
