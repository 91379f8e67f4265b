//! Terminal input: typed commands and keyboard-wedge scans on stdin.

use std::io::BufRead;
use tokio::sync::mpsc;
use yardscan_core::camera::{Camera, DecodeEvent, PermissionStatus};
use yardscan_core::{Slot, UserEvent};

/// Help text listing the typed commands
pub const COMMANDS_HELP: &str =
    "Commands: 1/vehicle, 2/location, s/submit, q/quit, Enter to dismiss a notice";

/// One line typed on stdin
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input {
    Command(UserEvent),
    /// Anything that is not a command, e.g. a code typed by a wedge scanner
    Text(String),
}

pub fn classify(line: &str) -> Input {
    let trimmed = line.trim();
    let event = match trimmed.to_ascii_lowercase().as_str() {
        "" => UserEvent::Acknowledge,
        "1" | "vehicle" => UserEvent::RequestScan(Slot::A),
        "2" | "location" => UserEvent::RequestScan(Slot::B),
        "s" | "submit" => UserEvent::Submit,
        "q" | "quit" | "exit" => UserEvent::Quit,
        _ => return Input::Text(trimmed.to_string()),
    };
    Input::Command(event)
}

/// Scanner that types into the same terminal as the user
pub struct WedgeCamera {
    decodes: mpsc::Receiver<DecodeEvent>,
}

impl WedgeCamera {
    /// Create the camera and the sender the stdin reader feeds it through.
    pub fn channel() -> (mpsc::Sender<DecodeEvent>, Self) {
        let (tx, decodes) = mpsc::channel(16);
        (tx, Self { decodes })
    }
}

impl Camera for WedgeCamera {
    async fn request_permission(&mut self) -> PermissionStatus {
        PermissionStatus::Granted
    }

    fn start(self) -> mpsc::Receiver<DecodeEvent> {
        self.decodes
    }
}

/// Read stdin on a dedicated thread, routing commands to the session and,
/// when `wedge` is set, everything else to the wedge camera.
///
/// Runs on a plain thread: a pending read on tokio's stdin would block
/// runtime shutdown.
pub fn spawn_stdin_reader(wedge: Option<mpsc::Sender<DecodeEvent>>) -> mpsc::Receiver<UserEvent> {
    let (tx, rx) = mpsc::channel(16);

    std::thread::spawn(move || {
        let stdin = std::io::stdin();
        forward_lines(stdin.lock(), &tx, wedge.as_ref());
        tracing::debug!("Stdin reader stopped");
    });

    rx
}

/// Route each line of `reader` until end of input, a read error, or a
/// closed receiver. Lines that are not valid UTF-8 are skipped.
fn forward_lines<R: BufRead>(
    mut reader: R,
    tx: &mpsc::Sender<UserEvent>,
    wedge: Option<&mpsc::Sender<DecodeEvent>>,
) {
    let mut buf = Vec::new();
    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf) {
            Ok(0) => break,
            Ok(_) => {}
            Err(e) => {
                tracing::warn!("Failed to read from stdin: {}", e);
                break;
            }
        }

        let line = match std::str::from_utf8(&buf) {
            Ok(line) => line,
            Err(e) => {
                tracing::warn!("Discarding input that is not UTF-8: {}", e);
                continue;
            }
        };

        let delivered = match classify(line) {
            Input::Command(event) => tx.blocking_send(event).is_ok(),
            Input::Text(text) => match wedge {
                Some(wedge) => wedge.blocking_send(DecodeEvent::new(text)).is_ok(),
                None => {
                    eprintln!("Unknown command '{}'. {}", text, COMMANDS_HELP);
                    true
                }
            },
        };

        if !delivered {
            break;
        }
    }
}
