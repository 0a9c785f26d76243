//! Terminal control panel: labels on stdout, button presses from stdin.

use super::{PanelEvent, UiSurface};
use crate::control::Intent;
use log::info;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

pub const HELP: &str = "\
Commands:
  <device>        toggle a device (press its button)
  on <device>     turn a device on
  off <device>    turn a device off
  voice           speak a command like 'turn on light'
  status          show every device
  quit            exit";

pub struct ConsoleSurface;

impl UiSurface for ConsoleSurface {
    fn render(&self, _device: &str, label: &str) {
        println!("  [{}]", label);
    }

    fn notice(&self, message: &str) {
        println!("  * {}", message);
    }
}

/// Map one input line to a panel event. Blank lines and `help` yield `None`.
pub fn parse_panel_input(line: &str) -> Option<PanelEvent> {
    let line = line.trim();
    let (command, rest) = match line.split_once(char::is_whitespace) {
        Some((command, rest)) => (command, rest.trim()),
        None => (line, ""),
    };

    match command.to_ascii_lowercase().as_str() {
        "" | "help" | "?" => None,
        "quit" | "exit" | "q" => Some(PanelEvent::Quit),
        "voice" | "v" => Some(PanelEvent::VoiceRequested),
        "status" | "s" => Some(PanelEvent::Status),
        "on" if !rest.is_empty() => Some(PanelEvent::Set(Intent::new(rest, true))),
        "off" if !rest.is_empty() => Some(PanelEvent::Set(Intent::new(rest, false))),
        _ => Some(PanelEvent::Button(line.to_string())),
    }
}

/// Read panel input until EOF, then request shutdown.
pub fn spawn_stdin_reader(
    events: mpsc::UnboundedSender<PanelEvent>,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        println!("{}", HELP);

        loop {
            let line = tokio::select! {
                _ = cancel.cancelled() => break,
                line = lines.next_line() => line,
            };
            let line = match line {
                Ok(Some(line)) => line,
                Ok(None) | Err(_) => {
                    info!("[Panel] Input closed");
                    let _ = events.send(PanelEvent::Quit);
                    break;
                }
            };

            match parse_panel_input(&line) {
                Some(event) => {
                    if events.send(event).is_err() {
                        break;
                    }
                }
                None if !line.trim().is_empty() => println!("{}", HELP),
                None => {}
            }
        }
    })
}
