//! USB hot-plug notifications used to re-connect the controller after a replug

use anyhow::{Context, Result};
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_stream::wrappers::LinesStream;
use tokio_stream::StreamExt;
use tracing::{debug, info, warn};

/// Extract the action column from a `udevadm monitor` line.
///
/// Lines look like `UDEV  [12345.678901] bind     /devices/... (usb)`.
pub fn parse_action(line: &str) -> Option<&str> {
    let (source, rest) = line.split_once('[')?;
    if !matches!(source.trim(), "UDEV" | "KERNEL") {
        return None;
    }
    let (_timestamp, rest) = rest.split_once(']')?;
    rest.split_whitespace().next()
}

/// Watches `udevadm monitor` for USB `bind` events
pub struct HotplugMonitor;

impl HotplugMonitor {
    /// Spawn the monitor; every USB `bind` sends one reconnect request on `tx`.
    ///
    /// The task ends when the monitor process exits or the receiver is dropped.
    pub fn spawn(tx: mpsc::UnboundedSender<()>) -> Result<JoinHandle<()>> {
        let mut child = Command::new("udevadm")
            .args(["monitor", "--udev", "--subsystem-match=usb"])
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .context("Failed to start udevadm monitor")?;

        let stdout = child
            .stdout
            .take()
            .context("udevadm monitor has no stdout")?;

        info!("🔌 Watching USB hot-plug events");

        Ok(tokio::spawn(async move {
            let mut lines = LinesStream::new(BufReader::new(stdout).lines());
            while let Some(line) = lines.next().await {
                let line = match line {
                    Ok(line) => line,
                    Err(e) => {
                        warn!("Failed reading udevadm output: {}", e);
                        break;
                    }
                };

                if parse_action(&line) == Some("bind") {
                    debug!("USB bind event: {}", line);
                    if tx.send(()).is_err() {
                        break;
                    }
                }
            }

            match child.wait().await {
                Ok(status) => warn!("udevadm monitor exited ({}), hot-plug disabled", status),
                Err(e) => warn!("udevadm monitor failed: {}", e),
            }
        }))
    }
}
