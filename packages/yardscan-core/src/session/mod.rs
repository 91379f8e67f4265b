//! Capture session controller.
//!
//! Owns the scan slots and the `Idle`/`AwaitingScanA`/`AwaitingScanB`
//! toggle, turns decode events into scan results, and hands completed
//! pairs to a [`Submitter`]. All mutation happens on the caller's task;
//! the only concurrent piece is the spawned submission, which reports back
//! through the outcome channel returned by [`SessionController::new`].

mod runner;

pub use runner::{Session, SessionEnd, UserEvent};

use crate::cloud::{SubmitError, SubmitRequest, Submitter};
use crate::notice::{Notice, NoticeQueue, Notifier};
use crate::scan::{parse_payload, CombinedDocument, ScanResult, Slot};
use chrono::{DateTime, Local, Utc};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Which slot the next successful decode fills
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    /// Decode events are ignored
    #[default]
    Idle,
    AwaitingScanA,
    AwaitingScanB,
}

impl Mode {
    pub fn awaiting(slot: Slot) -> Self {
        match slot {
            Slot::A => Mode::AwaitingScanA,
            Slot::B => Mode::AwaitingScanB,
        }
    }

    /// Slot armed by this mode, if any
    pub fn slot(self) -> Option<Slot> {
        match self {
            Mode::Idle => None,
            Mode::AwaitingScanA => Some(Slot::A),
            Mode::AwaitingScanB => Some(Slot::B),
        }
    }
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.slot() {
            None => write!(f, "idle"),
            Some(slot) => write!(f, "awaiting {} scan", slot.label().to_lowercase()),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionState {
    pub mode: Mode,
    pub scan_a: Option<ScanResult>,
    pub scan_b: Option<ScanResult>,
}

impl SessionState {
    /// Whether the submit trigger is offered. Submitting still needs both slots.
    pub fn can_submit(&self) -> bool {
        self.scan_a.is_some() || self.scan_b.is_some()
    }

    pub fn slot(&self, slot: Slot) -> Option<&ScanResult> {
        match slot {
            Slot::A => self.scan_a.as_ref(),
            Slot::B => self.scan_b.as_ref(),
        }
    }

    fn slot_mut(&mut self, slot: Slot) -> &mut Option<ScanResult> {
        match slot {
            Slot::A => &mut self.scan_a,
            Slot::B => &mut self.scan_b,
        }
    }
}

/// Result of a spawned submission, reported back to the session
#[derive(Debug)]
pub struct SubmitOutcome {
    pub submission: u64,
    pub result: Result<(), SubmitError>,
}

/// Scans captured in a submission that has not settled yet
#[derive(Debug)]
struct InFlight {
    id: u64,
    scan_a: ScanResult,
    scan_b: ScanResult,
}

type Clock = Box<dyn Fn() -> DateTime<Utc> + Send>;

pub struct SessionController<S, N> {
    state: SessionState,
    submitter: Arc<S>,
    notifier: N,
    notices: NoticeQueue,
    in_flight: Option<InFlight>,
    next_submission: u64,
    outcomes: mpsc::UnboundedSender<SubmitOutcome>,
    clock: Clock,
}

impl<S, N> SessionController<S, N>
where
    S: Submitter,
    N: Notifier,
{
    /// Create a controller in `Idle` with both slots empty.
    ///
    /// Submission outcomes arrive on the returned receiver and must be fed
    /// back through [`SessionController::settle`].
    pub fn new(submitter: S, notifier: N) -> (Self, mpsc::UnboundedReceiver<SubmitOutcome>) {
        let (outcomes, outcomes_rx) = mpsc::unbounded_channel();
        let controller = Self {
            state: SessionState::default(),
            submitter: Arc::new(submitter),
            notifier,
            notices: NoticeQueue::default(),
            in_flight: None,
            next_submission: 1,
            outcomes,
            clock: Box::new(Utc::now),
        };
        (controller, outcomes_rx)
    }

    /// Replace the capture time source.
    pub fn with_clock(mut self, clock: impl Fn() -> DateTime<Utc> + Send + 'static) -> Self {
        self.clock = Box::new(clock);
        self
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn mode(&self) -> Mode {
        self.state.mode
    }

    pub fn is_submitting(&self) -> bool {
        self.in_flight.is_some()
    }

    /// Notice currently waiting for acknowledgement
    pub fn open_notice(&self) -> Option<&Notice> {
        self.notices.current()
    }

    /// Arm the camera for `slot`. Valid from any mode.
    pub fn request_scan(&mut self, slot: Slot) {
        tracing::info!("Scanning mode: {}", slot);
        self.state.mode = Mode::awaiting(slot);
    }

    /// Handle raw text from the camera.
    pub fn on_decode(&mut self, raw: &str) {
        let Some(slot) = self.state.mode.slot() else {
            tracing::debug!("Ignoring decode event while idle");
            return;
        };

        let scan = match parse_payload(raw) {
            Ok(payload) => ScanResult::new(payload, (self.clock)()),
            Err(e) => {
                // stays armed; the user can simply rescan
                tracing::warn!("Error parsing QR code data: {}", e);
                return;
            }
        };

        tracing::info!(
            "Captured {} scan with {} fields",
            slot,
            scan.payload.len()
        );

        let notice = Notice::preview(slot, &scan.data());
        *self.state.slot_mut(slot) = Some(scan);
        self.state.mode = Mode::Idle;
        self.present(notice);
    }

    /// Post both scans, or warn when the pair is incomplete.
    ///
    /// The request runs on its own task; its outcome comes back through the
    /// outcome channel and takes effect in [`SessionController::settle`].
    pub fn submit(&mut self) {
        // slots are only cleared when a submission settles, so an
        // in-flight submission implies both slots are filled
        if self.in_flight.is_some() {
            tracing::info!("Submit refused: a submission is already in flight");
            self.present(Notice::submission_pending());
            return;
        }

        let (scan_a, scan_b) = match (&self.state.scan_a, &self.state.scan_b) {
            (Some(scan_a), Some(scan_b)) => (scan_a.clone(), scan_b.clone()),
            _ => {
                tracing::info!("Submit refused: both scans are required");
                self.present(Notice::incomplete_scans());
                return;
            }
        };

        log_captured(Slot::A, &scan_a);
        log_captured(Slot::B, &scan_b);

        let request = SubmitRequest::new(CombinedDocument::new(&scan_a, &scan_b));
        let id = self.next_submission;
        self.next_submission += 1;
        self.in_flight = Some(InFlight { id, scan_a, scan_b });

        let submitter = Arc::clone(&self.submitter);
        let outcomes = self.outcomes.clone();
        tokio::spawn(async move {
            let result = submitter.submit(&request).await;
            if outcomes
                .send(SubmitOutcome {
                    submission: id,
                    result,
                })
                .is_err()
            {
                tracing::debug!("Session ended before submission {} settled", id);
            }
        });

        tracing::info!("Submission {} started", id);
    }

    /// Apply the outcome of a finished submission.
    ///
    /// Success clears the submitted scans (a slot rescanned meanwhile is
    /// kept); failure leaves both slots in place for another attempt.
    pub fn settle(&mut self, outcome: SubmitOutcome) {
        let flight = match self.in_flight.take() {
            Some(flight) if flight.id == outcome.submission => flight,
            other => {
                tracing::warn!(
                    "Ignoring outcome of unknown submission {}",
                    outcome.submission
                );
                self.in_flight = other;
                return;
            }
        };

        match outcome.result {
            Ok(()) => {
                tracing::info!("Submission {} stored", flight.id);
                if self.state.scan_a.as_ref() == Some(&flight.scan_a) {
                    self.state.scan_a = None;
                }
                if self.state.scan_b.as_ref() == Some(&flight.scan_b) {
                    self.state.scan_b = None;
                }
                self.present(Notice::submitted());
            }
            Err(e) => {
                tracing::error!("Error sending data: {}", e);
            }
        }
    }

    /// Dismiss the open notice, revealing the next queued one.
    pub fn acknowledge(&mut self) {
        if let Some(next) = self.notices.acknowledge() {
            self.notifier.show(next);
        }
    }

    fn present(&mut self, notice: Notice) {
        if let Some(visible) = self.notices.push(notice) {
            self.notifier.show(visible);
        }
    }

    fn publish_state(&self) {
        self.notifier.state_changed(&self.state);
    }
}

fn log_captured(slot: Slot, scan: &ScanResult) {
    tracing::debug!(
        "Captured QR data - {}: {} (captured {})",
        slot.document_key(),
        serde_json::to_string(&scan.payload).unwrap_or_default(),
        scan.captured_at
            .with_timezone(&Local)
            .format("%Y-%m-%d %H:%M:%S")
    );
}
