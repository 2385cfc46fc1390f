//! Configuration for MIDI Shortcuts
//!
//! Loads and validates the YAML file describing the controller, its programs
//! and the bindings of every mode. The file is read once at startup.

use crate::actions::KeyCombo;
use crate::audio::{Sink, SinkState, StreamMatcher};
use crate::controller::{ControllerMapping, Program};
use anyhow::{bail, Context, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;

/// Root configuration structure
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AppConfig {
    pub controller: ControllerConfig,
    #[serde(default)]
    pub focus: FocusDefaults,
    pub programs: Vec<ProgramConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sounds_dir: Option<PathBuf>,
    pub modes: Vec<ModeConfig>,
}

/// MIDI device selection
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ControllerConfig {
    /// Regex matched against MIDI port names
    pub name_pattern: String,
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,
    /// Reconnect when a USB device is plugged in
    #[serde(default = "default_true")]
    pub hotplug: bool,
}

/// Window focus timing
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FocusDefaults {
    #[serde(default = "default_window_timeout")]
    pub window_timeout_ms: u64,
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,
}

impl Default for FocusDefaults {
    fn default() -> Self {
        Self {
            window_timeout_ms: default_window_timeout(),
            poll_interval_ms: default_poll_interval(),
        }
    }
}

/// Identifiers sent by one controller program
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ProgramConfig {
    pub id: u8,
    pub pads: Vec<u8>,
    pub knobs: Vec<u8>,
}

/// Set of bindings for one controller program
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ModeConfig {
    pub name: String,
    pub program: u8,
    #[serde(default)]
    pub bindings: Vec<BindingConfig>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BindingConfig {
    /// Focus a target, then send key combinations
    Keys {
        /// Pad sending note-on
        #[serde(skip_serializing_if = "Option::is_none")]
        pad: Option<usize>,
        /// Pad sending control-change (pad CC mode)
        #[serde(skip_serializing_if = "Option::is_none")]
        pad_cc: Option<usize>,
        /// Ignore control-change releases (value 0)
        #[serde(default)]
        only_nonzero: bool,
        #[serde(default)]
        focus: Vec<FocusStep>,
        combos: Vec<Vec<String>>,
    },
    /// Knob setting the volume of sinks or of a stream
    Volume {
        knob: usize,
        #[serde(skip_serializing_if = "Option::is_none")]
        sinks: Option<SinkMatcherConfig>,
        #[serde(skip_serializing_if = "Option::is_none")]
        stream: Option<StreamMatcherConfig>,
    },
    /// Knob fading between two sinks
    Crossfader {
        knob: usize,
        left: SinkMatcherConfig,
        right: SinkMatcherConfig,
        /// Move this stream to the selected side instead of switching the default output
        #[serde(skip_serializing_if = "Option::is_none")]
        stream: Option<StreamMatcherConfig>,
    },
    /// Pad playing a sound effect
    Sound {
        pad: usize,
        file: PathBuf,
        #[serde(default)]
        mode: SoundMode,
        #[serde(default)]
        looping: bool,
    },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SoundMode {
    #[default]
    Play,
    Toggle,
}

/// One step of a focus chain
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FocusStep {
    None,
    Window {
        class: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        name: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        timeout_ms: Option<u64>,
    },
    BrowserTab {
        browser: String,
        tab: String,
    },
}

/// Sink selection criteria (all given criteria must hold)
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct SinkMatcherConfig {
    /// Regex searched in the sink description
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Substring of the sink description
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contains: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<SinkState>,
    /// Name used in logs
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

impl SinkMatcherConfig {
    pub fn label(&self) -> String {
        if let Some(label) = &self.label {
            return label.clone();
        }
        let mut parts = Vec::new();
        if let Some(description) = &self.description {
            parts.push(format!("description /{}/", description));
        }
        if let Some(contains) = &self.contains {
            parts.push(format!("description contains '{}'", contains));
        }
        if let Some(state) = &self.state {
            parts.push(format!("state {:?}", state));
        }
        parts.join(" and ")
    }

    /// Compile into a sink predicate
    pub fn predicate(&self) -> Result<impl Fn(&Sink) -> bool + Send + Sync + 'static> {
        if self.description.is_none() && self.contains.is_none() && self.state.is_none() {
            bail!("Sink matcher needs a description, contains or state criterion");
        }
        let description = self.description.as_deref().map(compile).transpose()?;
        let contains = self.contains.clone();
        let state = self.state;

        Ok(move |sink: &Sink| {
            description.as_ref().map_or(true, |re| re.is_match(&sink.description))
                && contains.as_ref().map_or(true, |c| sink.description.contains(c.as_str()))
                && state.map_or(true, |s| sink.state == s)
        })
    }
}

/// Stream selection criteria
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct StreamMatcherConfig {
    /// Regex searched in `application.name`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub app: Option<String>,
    /// Regex searched in `media.name`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub media: Option<String>,
    /// Re-apply the last volume when the matching streams change
    #[serde(default)]
    pub remember: bool,
}

impl StreamMatcherConfig {
    pub fn matcher(&self) -> Result<StreamMatcher> {
        StreamMatcher::new(
            self.app.as_deref().map(compile).transpose()?,
            self.media.as_deref().map(compile).transpose()?,
        )
    }
}

/// Compile a user-supplied regex
pub fn compile(pattern: &str) -> Result<Regex> {
    Regex::new(pattern).with_context(|| format!("Invalid regex '{}'", pattern))
}

impl AppConfig {
    /// Load configuration from file with validation
    pub async fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config = Self::from_yaml(&contents)
            .with_context(|| format!("Invalid config file: {}", path.display()))?;
        Ok(config)
    }

    /// Parse and validate YAML
    pub fn from_yaml(contents: &str) -> Result<Self> {
        let config: AppConfig =
            serde_yaml::from_str(contents).context("Failed to parse YAML config")?;
        config.validate()?;
        Ok(config)
    }

    pub fn name_pattern(&self) -> Result<Regex> {
        compile(&self.controller.name_pattern)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.controller.poll_interval_ms)
    }

    /// Program table of the controller
    pub fn mapping(&self) -> Result<ControllerMapping> {
        let mut mapping = ControllerMapping::new();
        for program in &self.programs {
            mapping.map(program.id, Program::new(program.pads.clone(), program.knobs.clone()))?;
        }
        Ok(mapping)
    }

    /// Resolve a sound path against `sounds_dir`
    pub fn sound_path(&self, file: &Path) -> PathBuf {
        match &self.sounds_dir {
            Some(dir) if file.is_relative() => dir.join(file),
            _ => file.to_path_buf(),
        }
    }

    /// Validate configuration for correctness and consistency
    pub fn validate(&self) -> Result<()> {
        self.name_pattern().context("Invalid controller name_pattern")?;
        if self.controller.poll_interval_ms == 0 {
            bail!("controller.poll_interval_ms must be positive");
        }
        if self.focus.poll_interval_ms == 0 {
            bail!("focus.poll_interval_ms must be positive");
        }

        let mut ids = HashSet::new();
        for program in &self.programs {
            if !ids.insert(program.id) {
                bail!("Program {} is defined twice", program.id);
            }
            if let Some(id) = program.pads.iter().chain(&program.knobs).find(|id| **id > 127) {
                bail!("Program {} uses identifier {} (must be 0-127)", program.id, id);
            }
        }
        let mapping = self.mapping()?;

        if self.modes.is_empty() {
            bail!("At least one mode must be defined");
        }
        for mode in &self.modes {
            if mode.name.is_empty() {
                bail!("Mode name cannot be empty");
            }
            let program = mapping
                .get(mode.program)
                .with_context(|| format!("Invalid program in mode '{}'", mode.name))?;
            for (idx, binding) in mode.bindings.iter().enumerate() {
                validate_binding(binding, program)
                    .with_context(|| format!("Invalid binding {} in mode '{}'", idx + 1, mode.name))?;
            }
        }

        Ok(())
    }
}

fn validate_binding(binding: &BindingConfig, program: &Program) -> Result<()> {
    match binding {
        BindingConfig::Keys { pad, pad_cc, focus, combos, .. } => {
            match (pad, pad_cc) {
                (Some(pad), None) | (None, Some(pad)) => {
                    program.pad(*pad)?;
                }
                _ => bail!("Key binding needs exactly one of 'pad' or 'pad_cc'"),
            }
            if combos.is_empty() {
                bail!("Key binding needs at least one combo");
            }
            for combo in combos {
                KeyCombo::new(combo.iter().cloned())?;
            }
            for step in focus {
                match step {
                    FocusStep::None => {}
                    FocusStep::Window { class, name, .. } => {
                        compile(class)?;
                        name.as_deref().map(compile).transpose()?;
                    }
                    FocusStep::BrowserTab { browser, tab } => {
                        compile(browser)?;
                        compile(tab)?;
                    }
                }
            }
        }
        BindingConfig::Volume { knob, sinks, stream } => {
            program.knob(*knob)?;
            match (sinks, stream) {
                (Some(sinks), None) => {
                    sinks.predicate()?;
                }
                (None, Some(stream)) => {
                    stream.matcher()?;
                }
                _ => bail!("Volume binding needs exactly one of 'sinks' or 'stream'"),
            }
        }
        BindingConfig::Crossfader { knob, left, right, stream } => {
            program.knob(*knob)?;
            left.predicate().context("Invalid left side")?;
            right.predicate().context("Invalid right side")?;
            if let Some(stream) = stream {
                stream.matcher()?;
            }
        }
        BindingConfig::Sound { pad, .. } => {
            program.pad(*pad)?;
        }
    }
    Ok(())
}

// Default value functions
fn default_true() -> bool { true }
fn default_poll_interval() -> u64 { 100 }
fn default_window_timeout() -> u64 { 5000 }
