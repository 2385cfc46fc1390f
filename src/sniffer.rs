//! MIDI sniffer for discovering what the controller sends
//!
//! Useful when writing the `programs` section of the configuration: press
//! each pad and turn each knob, then copy the identifiers.

use crate::controller::{find_device, DeviceTransport, MidirTransport};
use anyhow::{anyhow, Result};
use chrono::Local;
use colored::*;
use regex::Regex;
use std::time::Duration;

const SNIFF_INTERVAL: Duration = Duration::from_millis(20);

/// Print the available MIDI ports
pub fn list_ports_formatted() {
    let transport = MidirTransport::new("midi-shortcuts-ports");

    println!("\n{}", "=== Available MIDI Ports ===".bold().cyan());
    print_ports("Input Ports:", transport.input_names());
    print_ports("Output Ports:", transport.output_names());
    println!();
}

fn print_ports(title: &str, names: Result<Vec<String>>) {
    println!("\n{}", title.bold());
    match names {
        Ok(names) if names.is_empty() => println!("  {}", "No ports found".dimmed()),
        Ok(names) => {
            for (index, name) in names.iter().enumerate() {
                println!("  {} {}", format!("[{}]", index).yellow(), name);
            }
        }
        Err(e) => println!("  {} {:#}", "Error:".red(), e),
    }
}

/// Print every event of the device matching `pattern` until Ctrl+C
pub async fn run_sniffer(pattern: Regex) -> Result<()> {
    let mut transport = MidirTransport::new("midi-shortcuts-sniffer");

    let inputs = transport.input_names()?;
    let input = find_device(&pattern, &inputs)
        .ok_or_else(|| anyhow!("No MIDI input matching '{}'", pattern))?;
    transport.open(&input, None)?;

    println!("\n{} {}", "Sniffing".green(), input.bright_white());
    println!("{}", "Format: [time] KIND IDENTIFIER VALUE".dimmed());
    println!("{}\n", "─".repeat(60).dimmed());

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    let mut ticker = tokio::time::interval(SNIFF_INTERVAL);
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                for event in transport.pending() {
                    println!(
                        "[{}] {:<14} {:>3} {:>3}",
                        Local::now().format("%H:%M:%S%.3f").to_string().dimmed(),
                        event.kind.to_string().cyan(),
                        event.identifier.to_string().bright_white(),
                        event.value,
                    );
                }
            }
            _ = &mut ctrl_c => break,
        }
    }

    transport.close();
    println!("\n{}", "Sniffer stopped".yellow());
    Ok(())
}
