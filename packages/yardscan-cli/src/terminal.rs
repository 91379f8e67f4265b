//! Rendering of notices and session state on the terminal.

use crate::input::COMMANDS_HELP;
use crate::OutputFormat;
use yardscan_core::notice::{Notice, Notifier};
use yardscan_core::{SessionState, Slot};

pub struct TerminalNotifier {
    format: OutputFormat,
}

impl TerminalNotifier {
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }
}

impl Notifier for TerminalNotifier {
    fn show(&self, notice: &Notice) {
        match self.format {
            OutputFormat::Text => println!("{}", render_notice(notice)),
            OutputFormat::Json => {
                println!(
                    "{}",
                    serde_json::json!({
                        "event": "notice",
                        "kind": notice.kind,
                        "title": notice.title,
                        "body": notice.body,
                    })
                );
            }
        }
    }

    fn state_changed(&self, state: &SessionState) {
        match self.format {
            OutputFormat::Text => println!("{}", render_prompt(state)),
            OutputFormat::Json => {
                println!(
                    "{}",
                    serde_json::json!({
                        "event": "state",
                        "mode": state.mode,
                        "scan_1": state.scan_a.is_some(),
                        "scan_2": state.scan_b.is_some(),
                        "can_submit": state.can_submit(),
                    })
                );
            }
        }
    }
}

pub fn render_notice(notice: &Notice) -> String {
    let mut out = format!("\n== {} ==\n", notice.title);
    if !notice.body.is_empty() {
        out.push_str(&notice.body);
        out.push('\n');
    }
    out.push_str("(press Enter to dismiss)");
    out
}

pub fn render_prompt(state: &SessionState) -> String {
    let mark = |slot: Slot| if state.slot(slot).is_some() { "done" } else { "-" };
    let mut out = format!(
        "[{}] {}: {}  {}: {}  |  1={}  2={}",
        state.mode,
        Slot::A,
        mark(Slot::A),
        Slot::B,
        mark(Slot::B),
        Slot::A.label().to_lowercase(),
        Slot::B.label().to_lowercase(),
    );
    if state.can_submit() {
        out.push_str("  s=submit");
    }
    out.push_str("  q=quit");
    out
}

/// Longer help printed once when an interactive session starts
pub fn session_banner(submit_url: &str, wedge: bool) -> String {
    let source = if wedge {
        "Scan codes with a keyboard-wedge scanner or paste them here."
    } else {
        "Codes are read from the scanner device."
    };
    format!(
        "Submitting to {}\n{}\n{}",
        submit_url, source, COMMANDS_HELP
    )
}
