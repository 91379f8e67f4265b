//! Event loop driving a capture session.

use super::{SessionController, SessionState, SubmitOutcome};
use crate::camera::{Camera, PermissionStatus};
use crate::cloud::Submitter;
use crate::notice::{Notice, Notifier};
use crate::scan::Slot;
use tokio::sync::mpsc;
use tracing::Instrument;
use uuid::Uuid;

/// A user trigger on the scanning screen
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserEvent {
    RequestScan(Slot),
    Submit,
    /// Dismiss the open notice
    Acknowledge,
    Quit,
}

/// Why a session stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    /// The user asked to leave
    Quit,
    /// The user event source closed
    InputClosed,
    /// Camera access was not granted at startup
    PermissionRefused(PermissionStatus),
}

/// A controller together with the receiving end of its submissions
pub struct Session<S, N> {
    id: Uuid,
    controller: SessionController<S, N>,
    outcomes: mpsc::UnboundedReceiver<SubmitOutcome>,
}

impl<S, N> Session<S, N>
where
    S: Submitter,
    N: Notifier,
{
    pub fn new(submitter: S, notifier: N) -> Self {
        let (controller, outcomes) = SessionController::new(submitter, notifier);
        Self::from_parts(controller, outcomes)
    }

    pub fn from_parts(
        controller: SessionController<S, N>,
        outcomes: mpsc::UnboundedReceiver<SubmitOutcome>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            controller,
            outcomes,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Run the session until the user quits or input closes.
    ///
    /// Camera permission is requested once before any user event is read.
    /// A submission still in flight when the loop ends is awaited and
    /// settled before returning the final state.
    pub async fn run<C: Camera>(
        self,
        camera: C,
        user_events: mpsc::Receiver<UserEvent>,
    ) -> (SessionEnd, SessionState) {
        let span = tracing::info_span!("session", id = %self.id);
        self.run_inner(camera, user_events).instrument(span).await
    }

    async fn run_inner<C: Camera>(
        self,
        mut camera: C,
        mut user_events: mpsc::Receiver<UserEvent>,
    ) -> (SessionEnd, SessionState) {
        let Self {
            mut controller,
            mut outcomes,
            ..
        } = self;

        let permission = camera.request_permission().await;
        tracing::info!("Camera permission {}", permission);
        if permission != PermissionStatus::Granted {
            controller.present(Notice::permission_denied(permission));
            return (
                SessionEnd::PermissionRefused(permission),
                controller.state().clone(),
            );
        }

        let mut decodes = camera.start();
        let mut camera_open = true;
        controller.publish_state();

        let end = loop {
            tokio::select! {
                event = user_events.recv() => match event {
                    None => break SessionEnd::InputClosed,
                    Some(UserEvent::Quit) => break SessionEnd::Quit,
                    Some(UserEvent::Acknowledge) => controller.acknowledge(),
                    Some(event) if controller.open_notice().is_some() => {
                        tracing::debug!("Ignoring {:?} until the open notice is dismissed", event);
                    }
                    Some(UserEvent::RequestScan(slot)) => controller.request_scan(slot),
                    Some(UserEvent::Submit) => controller.submit(),
                },
                decode = decodes.recv(), if camera_open => match decode {
                    Some(event) => controller.on_decode(&event.text),
                    None => {
                        tracing::info!("Camera stream closed");
                        camera_open = false;
                    }
                },
                Some(outcome) = outcomes.recv() => controller.settle(outcome),
            }
            controller.publish_state();
        };

        if controller.is_submitting() {
            tracing::info!("Waiting for pending submission to settle");
            if let Some(outcome) = outcomes.recv().await {
                controller.settle(outcome);
                controller.publish_state();
            }
        }

        let state = controller.state().clone();
        if state.can_submit() {
            tracing::info!("Session ended with unsubmitted scans");
        }
        tracing::info!("Session ended: {:?}", end);
        (end, state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::DecodeEvent;
    use crate::notice::NoticeKind;
    use crate::session::tests::{stepping_clock, FakeSubmitter};
    use crate::session::Mode;
    use serde_json::json;
    use std::sync::atomic::Ordering;

    /// Camera fed by the test through a channel
    struct FakeCamera {
        permission: PermissionStatus,
        decodes: mpsc::Receiver<DecodeEvent>,
    }

    impl Camera for FakeCamera {
        async fn request_permission(&mut self) -> PermissionStatus {
            self.permission
        }

        fn start(self) -> mpsc::Receiver<DecodeEvent> {
            self.decodes
        }
    }

    /// Forwards everything it sees so the test can step the loop
    struct ChannelNotifier {
        notices: mpsc::UnboundedSender<Notice>,
        states: mpsc::UnboundedSender<SessionState>,
    }

    impl Notifier for ChannelNotifier {
        fn show(&self, notice: &Notice) {
            let _ = self.notices.send(notice.clone());
        }

        fn state_changed(&self, state: &SessionState) {
            let _ = self.states.send(state.clone());
        }
    }

    struct Harness {
        users: mpsc::Sender<UserEvent>,
        decodes: mpsc::Sender<DecodeEvent>,
        notices: mpsc::UnboundedReceiver<Notice>,
        states: mpsc::UnboundedReceiver<SessionState>,
        submitter: FakeSubmitter,
        task: tokio::task::JoinHandle<(SessionEnd, SessionState)>,
    }

    impl Harness {
        fn start(permission: PermissionStatus) -> Self {
            let (users, user_rx) = mpsc::channel(8);
            let (decodes, decode_rx) = mpsc::channel(8);
            let (notice_tx, notices) = mpsc::unbounded_channel();
            let (state_tx, states) = mpsc::unbounded_channel();

            let submitter = FakeSubmitter::default();
            let notifier = ChannelNotifier {
                notices: notice_tx,
                states: state_tx,
            };
            let (controller, outcomes) = SessionController::new(submitter.clone(), notifier);
            let session = Session::from_parts(controller.with_clock(stepping_clock()), outcomes);
            let camera = FakeCamera {
                permission,
                decodes: decode_rx,
            };

            let task = tokio::spawn(session.run(camera, user_rx));
            Self {
                users,
                decodes,
                notices,
                states,
                submitter,
                task,
            }
        }

        async fn user(&mut self, event: UserEvent) -> SessionState {
            self.users.send(event).await.unwrap();
            self.states.recv().await.unwrap()
        }

        async fn scan(&mut self, text: &str) -> SessionState {
            self.decodes.send(DecodeEvent::new(text)).await.unwrap();
            self.states.recv().await.unwrap()
        }
    }

    #[tokio::test]
    async fn test_full_capture_and_submit_cycle() {
        let mut h = Harness::start(PermissionStatus::Granted);
        assert_eq!(h.states.recv().await.unwrap(), SessionState::default());

        // reads before a scan is requested are dropped
        let state = h.scan(r#"{"plate":"IGNORED"}"#).await;
        assert!(state.scan_a.is_none());

        let state = h.user(UserEvent::RequestScan(Slot::A)).await;
        assert_eq!(state.mode, Mode::AwaitingScanA);

        let state = h.scan("not-json").await;
        assert_eq!(state.mode, Mode::AwaitingScanA);
        assert!(state.scan_a.is_none());

        let state = h.scan(r#"{"plate":"ABC123"}"#).await;
        assert_eq!(state.mode, Mode::Idle);
        assert!(state.can_submit());
        assert_eq!(h.notices.recv().await.unwrap().kind, NoticeKind::Preview);

        // triggers wait for the preview to be dismissed
        let state = h.user(UserEvent::RequestScan(Slot::B)).await;
        assert_eq!(state.mode, Mode::Idle);
        h.user(UserEvent::Acknowledge).await;

        let state = h.user(UserEvent::RequestScan(Slot::B)).await;
        assert_eq!(state.mode, Mode::AwaitingScanB);
        h.scan(r#"{"lot":"B7"}"#).await;
        assert_eq!(h.notices.recv().await.unwrap().kind, NoticeKind::Preview);
        h.user(UserEvent::Acknowledge).await;

        h.user(UserEvent::Submit).await;
        // the outcome arrives as its own loop iteration
        let state = h.states.recv().await.unwrap();
        assert!(state.scan_a.is_none());
        assert!(state.scan_b.is_none());
        assert_eq!(h.notices.recv().await.unwrap(), Notice::submitted());

        let requests = h.submitter.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(
            serde_json::to_value(&requests[0]).unwrap(),
            json!({
                "qrData": {
                    "Scan 1": {"data": {"plate": "ABC123", "timestamp": "2024-05-01T08:30:00.000Z"}},
                    "Scan 2": {"data": {"lot": "B7", "timestamp": "2024-05-01T08:30:01.000Z"}},
                }
            })
        );

        h.users.send(UserEvent::Quit).await.unwrap();
        let (end, state) = h.task.await.unwrap();
        assert_eq!(end, SessionEnd::Quit);
        assert_eq!(state, SessionState::default());
    }

    #[tokio::test]
    async fn test_permission_refused_ends_session() {
        let mut h = Harness::start(PermissionStatus::Denied);

        let (end, state) = (&mut h.task).await.unwrap();
        assert_eq!(end, SessionEnd::PermissionRefused(PermissionStatus::Denied));
        assert_eq!(state, SessionState::default());
        assert_eq!(
            h.notices.recv().await.unwrap().kind,
            NoticeKind::PermissionDenied
        );
        // no state is ever published for a session that never started
        assert!(h.states.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_undetermined_permission_ends_session() {
        let mut h = Harness::start(PermissionStatus::Undetermined);

        let (end, _) = (&mut h.task).await.unwrap();
        assert_eq!(
            end,
            SessionEnd::PermissionRefused(PermissionStatus::Undetermined)
        );
        let notice = h.notices.recv().await.unwrap();
        assert_eq!(notice.kind, NoticeKind::PermissionDenied);
        assert!(notice.body.contains("undetermined"));
    }

    #[tokio::test]
    async fn test_closed_camera_keeps_serving_user_events() {
        let mut h = Harness::start(PermissionStatus::Granted);
        h.states.recv().await.unwrap();

        let (unused, _) = mpsc::channel(1);
        drop(std::mem::replace(&mut h.decodes, unused));
        // the closed stream is its own loop iteration
        assert_eq!(h.states.recv().await.unwrap(), SessionState::default());

        let state = h.user(UserEvent::RequestScan(Slot::A)).await;
        assert_eq!(state.mode, Mode::AwaitingScanA);

        h.user(UserEvent::Submit).await;
        assert_eq!(h.notices.recv().await.unwrap(), Notice::incomplete_scans());
        assert!(h.submitter.requests().is_empty());

        h.users.send(UserEvent::Quit).await.unwrap();
        let (end, state) = h.task.await.unwrap();
        assert_eq!(end, SessionEnd::Quit);
        assert_eq!(state.mode, Mode::AwaitingScanA);
    }

    #[tokio::test]
    async fn test_quit_waits_for_pending_submission() {
        let mut h = Harness::start(PermissionStatus::Granted);
        h.states.recv().await.unwrap();
        h.submitter.fail.store(true, Ordering::SeqCst);

        h.user(UserEvent::RequestScan(Slot::A)).await;
        h.scan(r#"{"plate":"ABC123"}"#).await;
        h.user(UserEvent::Acknowledge).await;
        h.user(UserEvent::RequestScan(Slot::B)).await;
        h.scan(r#"{"lot":"B7"}"#).await;
        h.user(UserEvent::Acknowledge).await;

        h.users.send(UserEvent::Submit).await.unwrap();
        h.users.send(UserEvent::Quit).await.unwrap();

        let (end, state) = h.task.await.unwrap();
        assert_eq!(end, SessionEnd::Quit);
        assert_eq!(h.submitter.requests().len(), 1);
        // the failed submission leaves both scans in place
        assert!(state.scan_a.is_some());
        assert!(state.scan_b.is_some());
    }

    #[tokio::test]
    async fn test_closed_input_ends_session() {
        let h = Harness::start(PermissionStatus::Granted);
        drop(h.users);
        let (end, _) = h.task.await.unwrap();
        assert_eq!(end, SessionEnd::InputClosed);
    }
}
