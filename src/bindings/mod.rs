//! Turns the configured modes into a dispatch table
//!
//! Every mode is bound at startup. The controller's program switch decides
//! which identifiers the pads and knobs send, so modes live side by side in
//! one table.

mod handlers;


pub use handlers::{
    CrossfaderBinding, KeyBinding, SinkVolumeBinding, SoundBinding, StreamVolumeBinding,
};

use crate::actions::{CompositeAction, KeyCombo, KeyEmitter, KeySequence, SoundPlayer};
use crate::audio::{
    AudioServer, CrossfadeTarget, Crossfader, SinkGroup, SinkInputMirror, SinkMirror,
    StreamControl, View,
};
use crate::config::{
    compile, AppConfig, BindingConfig, FocusStep, SinkMatcherConfig, StreamMatcherConfig,
};
use crate::controller::{DispatchTable, Handler, Program};
use crate::focus::{BrowserTabFocus, Focus, TabBroker, WindowFocus, WindowSystem};
use crate::midi::EventKind;
use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Collaborators and shared state the handlers are built from
#[derive(Clone)]
pub struct Services {
    pub server: Arc<dyn AudioServer>,
    pub sinks: Arc<SinkMirror>,
    pub sink_inputs: Arc<SinkInputMirror>,
    pub windows: Arc<dyn WindowSystem>,
    pub tabs: Arc<dyn TabBroker>,
    pub keyboard: Arc<dyn KeyEmitter>,
}

struct Builder<'a> {
    config: &'a AppConfig,
    services: &'a Services,
}

impl Builder<'_> {
    fn sink_group(&self, matcher: &SinkMatcherConfig) -> Result<SinkGroup> {
        let view = View::new(self.services.sinks.clone(), matcher.label(), matcher.predicate()?);
        Ok(SinkGroup::new(view, self.services.server.clone()))
    }

    fn stream(&self, matcher: &StreamMatcherConfig) -> Result<Arc<StreamControl>> {
        let control = Arc::new(StreamControl::new(
            self.services.sink_inputs.clone(),
            matcher.matcher()?,
            self.services.server.clone(),
        ));
        if matcher.remember {
            debug!("Remembering volume of {}", control.description());
            self.services.sink_inputs.register_on_change(control.clone());
        }
        Ok(control)
    }

    fn focus(&self, step: &FocusStep) -> Result<Focus> {
        let defaults = &self.config.focus;
        Ok(match step {
            FocusStep::None => Focus::None,
            FocusStep::Window { class, name, timeout_ms } => {
                let timeout = timeout_ms.unwrap_or(defaults.window_timeout_ms);
                Focus::Window(
                    WindowFocus::new(
                        compile(class)?,
                        name.as_deref().map(compile).transpose()?,
                        self.services.windows.clone(),
                    )
                    .with_timeout(Duration::from_millis(timeout))
                    .with_poll_interval(Duration::from_millis(defaults.poll_interval_ms)),
                )
            }
            FocusStep::BrowserTab { browser, tab } => Focus::BrowserTab(BrowserTabFocus::new(
                compile(browser)?,
                compile(tab)?,
                self.services.tabs.clone(),
            )),
        })
    }

    /// Handler plus the `(kind, identifier)` it is bound to
    fn binding(
        &self,
        binding: &BindingConfig,
        program: &Program,
    ) -> Result<(EventKind, u8, Arc<dyn Handler>)> {
        Ok(match binding {
            BindingConfig::Keys { pad, pad_cc, only_nonzero, focus, combos } => {
                let (kind, pad) = match (pad, pad_cc) {
                    (Some(pad), None) => (EventKind::NoteOn, *pad),
                    (None, Some(pad)) => (EventKind::ControlChange, *pad),
                    _ => anyhow::bail!("Key binding needs exactly one of 'pad' or 'pad_cc'"),
                };
                let chain = focus.iter().map(|step| self.focus(step)).collect::<Result<Vec<_>>>()?;
                let combos = combos
                    .iter()
                    .map(|keys| KeyCombo::new(keys.iter().cloned()))
                    .collect::<Result<Vec<_>>>()?;
                let effect = Arc::new(KeySequence::new(combos, self.services.keyboard.clone()));
                let handler: Arc<dyn Handler> =
                    Arc::new(KeyBinding::new(CompositeAction::new(chain, effect), *only_nonzero));
                (kind, program.pad(pad)?, handler)
            }
            BindingConfig::Volume { knob, sinks, stream } => {
                let handler: Arc<dyn Handler> = match (sinks, stream) {
                    (Some(sinks), None) => Arc::new(SinkVolumeBinding::new(self.sink_group(sinks)?)),
                    (None, Some(stream)) => Arc::new(StreamVolumeBinding::new(self.stream(stream)?)),
                    _ => anyhow::bail!("Volume binding needs exactly one of 'sinks' or 'stream'"),
                };
                (EventKind::ControlChange, program.knob(*knob)?, handler)
            }
            BindingConfig::Crossfader { knob, left, right, stream } => {
                let target = match stream {
                    Some(stream) => CrossfadeTarget::MoveStream(self.stream(stream)?),
                    None => CrossfadeTarget::DefaultSink,
                };
                let crossfader =
                    Crossfader::new(self.sink_group(left)?, self.sink_group(right)?, target);
                let handler: Arc<dyn Handler> = Arc::new(CrossfaderBinding::new(crossfader));
                (EventKind::ControlChange, program.knob(*knob)?, handler)
            }
            BindingConfig::Sound { pad, file, mode, looping } => {
                let player = SoundPlayer::new(self.config.sound_path(file), *looping);
                let handler: Arc<dyn Handler> = Arc::new(SoundBinding::new(player, *mode));
                (EventKind::NoteOn, program.pad(*pad)?, handler)
            }
        })
    }
}

/// Build the dispatch table for every configured mode
pub fn build_table(config: &AppConfig, services: &Services) -> Result<DispatchTable> {
    let mapping = config.mapping()?;
    let builder = Builder { config, services };
    let mut table = DispatchTable::new();

    for mode in &config.modes {
        let program = mapping
            .get(mode.program)
            .with_context(|| format!("Invalid program in mode '{}'", mode.name))?;
        for (idx, binding) in mode.bindings.iter().enumerate() {
            let (kind, identifier, handler) = builder
                .binding(binding, program)
                .with_context(|| format!("Invalid binding {} in mode '{}'", idx + 1, mode.name))?;
            table.bind(kind, identifier, handler);
        }
        info!("🎛️  Mode '{}' bound on program {} ({} bindings)", mode.name, mode.program, mode.bindings.len());
    }

    Ok(table)
}
