//! Focus resolvers: bring the target of an action to the foreground
//!
//! A resolver answers `true` when the action may proceed. `false` means the
//! target could not be focused; it is an expected outcome, already logged.

pub mod browser;
pub mod window;

pub use browser::{BrowserClient, BrowserTab, BrowserTabFocus, Brotab, TabBroker};
pub use window::{Window, WindowFocus, WindowSystem, Wmctrl};

use std::fmt;

#[derive(Clone)]
pub enum Focus {
    /// Global actions (media keys) that need no window
    None,
    Window(WindowFocus),
    BrowserTab(BrowserTabFocus),
}

impl Focus {
    pub async fn focus(&self) -> bool {
        match self {
            Focus::None => true,
            Focus::Window(window) => window.focus().await,
            Focus::BrowserTab(tab) => tab.focus().await,
        }
    }
}

impl fmt::Display for Focus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Focus::None => write!(f, "no focus"),
            Focus::Window(window) => write!(f, "window {}", window),
            Focus::BrowserTab(tab) => write!(f, "{}", tab),
        }
    }
}

/// Resolve a focus chain in order, stopping at the first failure
pub async fn focus_all(chain: &[Focus]) -> bool {
    for step in chain {
        if !step.focus().await {
            return false;
        }
    }
    true
}
