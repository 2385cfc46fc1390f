//! Effects triggered by bindings, and the focus-then-effect composite
//!
//! Keyboard effects send key combinations through a [`KeyEmitter`]. A
//! [`CompositeAction`] resolves its focus chain once and runs its effect only
//! when every focus step succeeded.

pub mod sound;

pub use sound::SoundPlayer;

use crate::focus::{focus_all, Focus};
use crate::process;
use anyhow::{bail, Result};
use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Keys pressed together, e.g. `ctrl+e`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyCombo(Vec<String>);

impl KeyCombo {
    pub fn new<I, S>(keys: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let keys: Vec<String> = keys.into_iter().map(Into::into).collect();
        if keys.is_empty() {
            bail!("Empty key combination");
        }
        if let Some(key) = keys
            .iter()
            .find(|k| k.is_empty() || k.contains('+') || k.contains(char::is_whitespace))
        {
            bail!("Invalid key name '{}'", key);
        }
        Ok(Self(keys))
    }

    pub fn keys(&self) -> &[String] {
        &self.0
    }
}

impl fmt::Display for KeyCombo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.join("+"))
    }
}

/// Synthetic keyboard
#[async_trait]
pub trait KeyEmitter: Send + Sync {
    /// Press every key of the combo, then release them
    async fn emit_combo(&self, combo: &KeyCombo) -> Result<()>;
}

/// `xdotool`-backed keyboard
#[derive(Debug, Clone, Default)]
pub struct Xdotool;

#[async_trait]
impl KeyEmitter for Xdotool {
    async fn emit_combo(&self, combo: &KeyCombo) -> Result<()> {
        process::run("xdotool", &["key", &combo.to_string()]).await?;
        Ok(())
    }
}

/// Something a binding does once its target is focused
#[async_trait]
pub trait Effect: Send + Sync {
    fn label(&self) -> String;

    async fn apply(&self) -> Result<()>;
}

/// Send key combinations in order
pub struct KeySequence {
    combos: Vec<KeyCombo>,
    keyboard: Arc<dyn KeyEmitter>,
}

impl KeySequence {
    pub fn new(combos: Vec<KeyCombo>, keyboard: Arc<dyn KeyEmitter>) -> Self {
        Self { combos, keyboard }
    }
}

#[async_trait]
impl Effect for KeySequence {
    fn label(&self) -> String {
        self.combos
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(", ")
    }

    async fn apply(&self) -> Result<()> {
        for combo in &self.combos {
            self.keyboard.emit_combo(combo).await?;
            debug!("Sent {}", combo);
        }
        Ok(())
    }
}

/// Focus chain followed by an effect
pub struct CompositeAction {
    focus: Vec<Focus>,
    effect: Arc<dyn Effect>,
}

impl CompositeAction {
    pub fn new(focus: Vec<Focus>, effect: Arc<dyn Effect>) -> Self {
        Self { focus, effect }
    }

    pub fn label(&self) -> String {
        if self.focus.is_empty() {
            return self.effect.label();
        }
        let focus: Vec<String> = self.focus.iter().map(ToString::to_string).collect();
        format!("{} -> {}", focus.join(" -> "), self.effect.label())
    }

    /// Returns whether the effect ran
    pub async fn send(&self) -> Result<bool> {
        if !focus_all(&self.focus).await {
            debug!("Focus failed, skipping {}", self.effect.label());
            return Ok(false);
        }
        self.effect.apply().await?;
        Ok(true)
    }
}
