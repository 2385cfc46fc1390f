//! Native window focus through the window manager

use crate::process;
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, warn};

/// Default time a window gets to become active
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Default interval between two active-window queries
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

static WMCTRL_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(0x[0-9a-fA-F]+)\s+(-?\d+)\s+(\S+)\s+(\S+)\s*(.*)$").expect("valid wmctrl regex")
});

/// Top-level window
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Window {
    pub id: u64,
    /// `instance.Class` as reported by `WM_CLASS`
    pub class: String,
    pub name: String,
}

/// Window manager queries
#[async_trait]
pub trait WindowSystem: Send + Sync {
    async fn list_windows(&self) -> Result<Vec<Window>>;

    async fn activate(&self, window: &Window) -> Result<()>;

    /// Id of the active window, if any
    async fn active_window(&self) -> Result<Option<u64>>;
}

fn parse_window_id(id: &str) -> Option<u64> {
    let id = id.trim();
    let hex = id.strip_prefix("0x").or_else(|| id.strip_prefix("0X"))?;
    u64::from_str_radix(hex, 16).ok()
}

/// Parse `wmctrl -lx` output
pub fn parse_wmctrl(output: &str) -> Vec<Window> {
    output
        .lines()
        .filter_map(|line| {
            let caps = WMCTRL_LINE.captures(line)?;
            Some(Window {
                id: parse_window_id(&caps[1])?,
                class: caps[3].to_string(),
                name: caps[5].to_string(),
            })
        })
        .collect()
}

/// Parse `xprop -root _NET_ACTIVE_WINDOW` output
pub fn parse_active_window(output: &str) -> Option<u64> {
    let (_, id) = output.trim().rsplit_once('#')?;
    match parse_window_id(id)? {
        0 => None,
        id => Some(id),
    }
}

/// `wmctrl` + `xprop` window system
#[derive(Debug, Clone, Default)]
pub struct Wmctrl;

#[async_trait]
impl WindowSystem for Wmctrl {
    async fn list_windows(&self) -> Result<Vec<Window>> {
        Ok(parse_wmctrl(&process::run("wmctrl", &["-lx"]).await?))
    }

    async fn activate(&self, window: &Window) -> Result<()> {
        process::run("wmctrl", &["-ia", &format!("{:#x}", window.id)]).await?;
        Ok(())
    }

    async fn active_window(&self) -> Result<Option<u64>> {
        let output = process::run("xprop", &["-root", "_NET_ACTIVE_WINDOW"])
            .await
            .context("Failed to query the active window")?;
        Ok(parse_active_window(&output))
    }
}

/// Bring a native window to the foreground
#[derive(Clone)]
pub struct WindowFocus {
    class: Regex,
    name: Option<Regex>,
    timeout: Duration,
    poll_interval: Duration,
    windows: Arc<dyn WindowSystem>,
}

impl WindowFocus {
    pub fn new(class: Regex, name: Option<Regex>, windows: Arc<dyn WindowSystem>) -> Self {
        Self {
            class,
            name,
            timeout: DEFAULT_TIMEOUT,
            poll_interval: DEFAULT_POLL_INTERVAL,
            windows,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    fn is_target(&self, window: &Window) -> bool {
        self.class.is_match(&window.class)
            && self.name.as_ref().map_or(true, |name| name.is_match(&window.name))
    }

    async fn find_target(&self) -> Result<Window> {
        let windows = self.windows.list_windows().await?;
        let mut targets = windows.into_iter().filter(|w| self.is_target(w));
        let target = targets
            .next()
            .ok_or_else(|| anyhow!("Could not find window with {}", self))?;
        if targets.next().is_some() {
            warn!("More than one window matched {}, using '{}'", self, target.name);
        }
        Ok(target)
    }

    /// Activate the first matching window and wait until it is reported active.
    ///
    /// Returns `false` when no window matches or when it is not active before
    /// the timeout. The activation request is sent once.
    pub async fn focus(&self) -> bool {
        let target = match self.find_target().await {
            Ok(target) => target,
            Err(e) => {
                warn!("{:#}", e);
                return false;
            }
        };

        if let Err(e) = self.windows.activate(&target).await {
            warn!("Failed to activate '{}': {:#}", target.name, e);
            return false;
        }

        let deadline = Instant::now() + self.timeout;
        while Instant::now() < deadline {
            match self.windows.active_window().await {
                Ok(Some(active)) if active == target.id => {
                    debug!("Window '{}' is active", target.name);
                    // Let the window settle before keys are sent
                    tokio::time::sleep(self.poll_interval).await;
                    return true;
                }
                Ok(_) => {}
                Err(e) => debug!("Active window query failed: {:#}", e),
            }
            tokio::time::sleep(self.poll_interval).await;
        }

        warn!(
            "Could not activate window with {} within {:?}",
            self, self.timeout
        );
        false
    }
}

impl fmt::Display for WindowFocus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.name {
            Some(name) => write!(f, "class /{}/ and name /{}/", self.class, name),
            None => write!(f, "class /{}/", self.class),
        }
    }
}
