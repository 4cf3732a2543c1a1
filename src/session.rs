// Rickshaw Passenger Unit — Session State Machine
//
// Sequences the whole interaction: authenticate locally, send the ride
// request, wait for the driver, show the result, start over. One instance
// owns every sub-machine and every tick timer; the cooperative loop in
// `main` just feeds it raw samples and the clock. All remote I/O goes
// through the `RideLink` seam, all output through the `FeedbackSink` seam.
//
//   AwaitingAuthentication ──granted press, connect+send ok──▶ AwaitingDriverResponse
//   AwaitingDriverResponse ──status idle/rejected, link down──▶ RideFinished
//   RideFinished ──5 s hold, teardown──────────────────────────▶ AwaitingAuthentication

use crate::auth::AuthMachine;
use crate::config::{AUTH_SCREEN_REFRESH_MS, FINISHED_HOLD_MS, STATUS_POLL_INTERVAL_MS};
use crate::events::{AuthEvent, FeedbackEvent, RideStatus};
use crate::feedback::FeedbackSink;
use crate::input::{Debouncer, Edge};
use crate::link::{LinkError, PollOutcome, RideLink};
use crate::range::RangeFilter;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    AwaitingAuthentication,
    AwaitingDriverResponse,
    RideFinished,
}

/// Raw samples gathered by the loop for one tick. The ranging sensor is
/// only pulsed during `AwaitingAuthentication`, so `range_m` is `None`
/// both for a missed echo and outside that phase.
#[derive(Debug, Clone, Copy)]
pub struct TickInputs {
    pub button_raw_pressed: bool,
    pub range_m: Option<f32>,
    pub ldr_raw: u16,
}

pub struct Session<L: RideLink, F: FeedbackSink> {
    phase: SessionPhase,
    link: L,
    feedback: F,
    auth: AuthMachine,
    button: Debouncer,
    range: RangeFilter,
    last_status: RideStatus,
    last_poll_ms: u32,
    finished_at_ms: u32,
    last_screen_ms: u32,
}

impl<L: RideLink, F: FeedbackSink> Session<L, F> {
    pub fn new(link: L, feedback: F, now_ms: u32) -> Self {
        Self {
            phase: SessionPhase::AwaitingAuthentication,
            link,
            feedback,
            auth: AuthMachine::new(),
            button: Debouncer::new(false, now_ms),
            range: RangeFilter::new(),
            last_status: RideStatus::Idle,
            last_poll_ms: now_ms,
            finished_at_ms: now_ms,
            last_screen_ms: now_ms,
        }
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    /// One cooperative tick. Everything runs to completion before return;
    /// only the connect+send path inside an authorized press blocks.
    pub fn tick(&mut self, inputs: TickInputs, now_ms: u32) {
        match self.phase {
            SessionPhase::AwaitingAuthentication => self.tick_authentication(inputs, now_ms),
            SessionPhase::AwaitingDriverResponse => self.tick_driver_response(now_ms),
            SessionPhase::RideFinished => self.tick_finished(now_ms),
        }
    }

    // ---- AwaitingAuthentication ------------------------------------------

    fn tick_authentication(&mut self, inputs: TickInputs, now_ms: u32) {
        self.range.update(inputs.range_m);

        if let Some(event) = self.auth.tick(self.range.in_range(), inputs.ldr_raw, now_ms) {
            log::debug!("Auth event: {:?}", event);
            match event {
                AuthEvent::CheckWindowOpened => self.feedback.set_indicator(true),
                AuthEvent::PresenceLost | AuthEvent::ResultExpired => {
                    self.feedback.set_indicator(false);
                    self.range.reset();
                }
                AuthEvent::Granted => log::info!("Privilege granted"),
                AuthEvent::Denied => log::info!("Privilege denied (window elapsed)"),
                AuthEvent::PresenceEntered => {}
            }
        }

        if self.button.update(inputs.button_raw_pressed, now_ms) == Some(Edge::Pressed) {
            if self.auth.take_grant() {
                log::info!("Authorized press — connecting and sending request");
                self.attempt_request(now_ms);
            } else {
                log::info!("Button pressed without privilege");
                self.feedback.event(FeedbackEvent::AuthRejected);
            }
        }

        if self.phase == SessionPhase::AwaitingAuthentication
            && now_ms.wrapping_sub(self.last_screen_ms) >= AUTH_SCREEN_REFRESH_MS
        {
            self.last_screen_ms = now_ms;
            self.feedback
                .auth_screen(self.auth.view(now_ms), self.range.distance_m());
        }
    }

    /// Blocking connect + send. The grant was already consumed; whatever
    /// happens here, a fresh presence session is required for another try.
    fn attempt_request(&mut self, now_ms: u32) {
        self.feedback.event(FeedbackEvent::AuthAccepted);
        self.feedback.set_indicator(false);
        self.range.reset();

        self.feedback.message("Connecting", "WiFi...");
        if let Err(e) = self.link.connect_network() {
            self.abort_attempt("WiFi FAILED", "Check credentials", e);
            return;
        }
        self.feedback.message("WiFi OK!", "");

        self.feedback.message("Connecting", "Server...");
        if let Err(e) = self.link.connect_store() {
            self.abort_attempt("Server FAILED", "Check settings", e);
            return;
        }
        self.feedback.message("Server OK!", "Ready.");

        self.feedback.message("Requesting", "Ride...");
        let request_id = format!("esp32-button-{now_ms}");
        match self.link.send_request(&request_id) {
            Ok(()) => {
                log::info!("Ride request sent (id {})", request_id);
                self.feedback.message("Request Sent!", "");
                // The written `requesting` status is picked up by the first
                // poll, which fires the one feedback event for it.
                self.last_status = RideStatus::Idle;
                self.last_poll_ms = now_ms;
                self.phase = SessionPhase::AwaitingDriverResponse;
            }
            Err(e) => {
                self.abort_attempt("Request FAILED", "", e);
            }
        }
    }

    fn abort_attempt(&mut self, line1: &str, line2: &str, err: LinkError) {
        log::warn!("Request attempt aborted: {}", err);
        self.feedback.message(line1, line2);
        self.feedback.event(FeedbackEvent::AuthRejected);
        self.link.shutdown();
    }

    // ---- AwaitingDriverResponse ------------------------------------------

    fn tick_driver_response(&mut self, now_ms: u32) {
        if now_ms.wrapping_sub(self.last_poll_ms) < STATUS_POLL_INTERVAL_MS {
            return;
        }
        self.last_poll_ms = now_ms;

        match self.link.poll() {
            PollOutcome::Status(status) => {
                if status != self.last_status {
                    log::info!(
                        "Ride status changed: {} -> {}",
                        self.last_status.as_str(),
                        status.as_str()
                    );
                    self.last_status = status;
                    self.feedback.event(FeedbackEvent::from_status(status));

                    if status.is_terminal() {
                        if status == RideStatus::Rejected {
                            self.feedback.message("Ride", "Rejected");
                        } else {
                            self.feedback.message("Ride", "Complete");
                        }
                        self.enter_finished(now_ms);
                    }
                }
            }
            PollOutcome::Transient => {
                // Surfaced in the link's log; the next poll retries naturally.
            }
            PollOutcome::LinkDown => {
                log::warn!("Link down while waiting for driver");
                self.feedback.message("Link Error", "Shutting down...");
                self.enter_finished(now_ms);
            }
        }
    }

    fn enter_finished(&mut self, now_ms: u32) {
        self.finished_at_ms = now_ms;
        self.phase = SessionPhase::RideFinished;
    }

    // ---- RideFinished -----------------------------------------------------

    fn tick_finished(&mut self, now_ms: u32) {
        if now_ms.wrapping_sub(self.finished_at_ms) < FINISHED_HOLD_MS {
            return;
        }

        log::info!("Finished hold elapsed — tearing down and returning to authentication");
        self.link.shutdown();
        if self.last_status != RideStatus::Idle {
            // Silence actuators left on by a non-idle final status.
            self.feedback.event(FeedbackEvent::Idle);
            self.last_status = RideStatus::Idle;
        }
        self.feedback.set_indicator(false);
        self.auth.reset();
        self.range.reset();
        self.phase = SessionPhase::AwaitingAuthentication;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feedback::RecordingFeedback;
    use std::collections::VecDeque;

    const IN_RANGE_M: f32 = 0.18;
    const DARK: u16 = 100;
    const BRIGHT: u16 = 3500;

    struct ScriptedLink {
        network: VecDeque<Result<(), LinkError>>,
        store: VecDeque<Result<(), LinkError>>,
        sends: VecDeque<Result<(), LinkError>>,
        polls: VecDeque<PollOutcome>,
        network_calls: usize,
        send_calls: usize,
        poll_calls: usize,
        shutdowns: usize,
        request_ids: Vec<String>,
    }

    impl ScriptedLink {
        fn new() -> Self {
            Self {
                network: VecDeque::new(),
                store: VecDeque::new(),
                sends: VecDeque::new(),
                polls: VecDeque::new(),
                network_calls: 0,
                send_calls: 0,
                poll_calls: 0,
                shutdowns: 0,
                request_ids: Vec::new(),
            }
        }

        fn with_polls(polls: &[PollOutcome]) -> Self {
            let mut link = Self::new();
            link.polls = polls.iter().cloned().collect();
            link
        }
    }

    impl RideLink for ScriptedLink {
        fn connect_network(&mut self) -> Result<(), LinkError> {
            self.network_calls += 1;
            self.network.pop_front().unwrap_or(Ok(()))
        }

        fn connect_store(&mut self) -> Result<(), LinkError> {
            self.store.pop_front().unwrap_or(Ok(()))
        }

        fn send_request(&mut self, request_id: &str) -> Result<(), LinkError> {
            self.send_calls += 1;
            self.request_ids.push(request_id.to_owned());
            self.sends.pop_front().unwrap_or(Ok(()))
        }

        fn poll(&mut self) -> PollOutcome {
            self.poll_calls += 1;
            self.polls.pop_front().unwrap_or(PollOutcome::Transient)
        }

        fn shutdown(&mut self) {
            self.shutdowns += 1;
        }
    }

    type TestSession = Session<ScriptedLink, RecordingFeedback>;

    fn session(link: ScriptedLink) -> TestSession {
        Session::new(link, RecordingFeedback::new(), 0)
    }

    fn idle_inputs() -> TickInputs {
        TickInputs { button_raw_pressed: false, range_m: None, ldr_raw: DARK }
    }

    fn present(ldr: u16) -> TickInputs {
        TickInputs { button_raw_pressed: false, range_m: Some(IN_RANGE_M), ldr_raw: ldr }
    }

    fn pressed(ldr: u16) -> TickInputs {
        TickInputs { button_raw_pressed: true, range_m: Some(IN_RANGE_M), ldr_raw: ldr }
    }

    /// Advance `steps` ticks of `step_ms`, returning the final time.
    fn run(s: &mut TestSession, t: &mut u32, steps: u32, step_ms: u32, inputs: TickInputs) {
        for _ in 0..steps {
            *t += step_ms;
            s.tick(inputs, *t);
        }
    }

    /// Stand in range 3 s, pass the LDR check, press the button (with
    /// debounce). Leaves the session right after the press was handled.
    fn authenticate_and_press(s: &mut TestSession) -> u32 {
        let mut t = 0;
        s.tick(present(DARK), t); // presence entered at t=0
        run(s, &mut t, 31, 100, present(DARK)); // t=3100, window opened at 3000
        run(s, &mut t, 1, 100, present(BRIGHT)); // granted at t=3200
        run(s, &mut t, 1, 100, pressed(BRIGHT)); // raw press edge
        run(s, &mut t, 1, 100, pressed(BRIGHT)); // debounced at t=3400
        t
    }

    fn status_events(feedback: &RecordingFeedback) -> Vec<FeedbackEvent> {
        feedback
            .events
            .iter()
            .copied()
            .filter(|e| {
                !matches!(e, FeedbackEvent::AuthAccepted | FeedbackEvent::AuthRejected)
            })
            .collect()
    }

    #[test]
    fn press_without_grant_causes_no_network_activity() {
        // Pressing while denied (or just unauthenticated) only produces a
        // rejection cue.
        let mut s = session(ScriptedLink::new());
        let mut t = 0;
        run(&mut s, &mut t, 1, 100, pressed(DARK));
        run(&mut s, &mut t, 1, 100, pressed(DARK)); // debounced edge
        assert_eq!(s.phase(), SessionPhase::AwaitingAuthentication);
        assert_eq!(s.feedback.events, vec![FeedbackEvent::AuthRejected]);
        assert_eq!(s.link.network_calls, 0);
        assert_eq!(s.link.send_calls, 0);
    }

    #[test]
    fn authorized_press_sends_and_moves_to_waiting() {
        let mut s = session(ScriptedLink::new());
        authenticate_and_press(&mut s);
        assert_eq!(s.phase(), SessionPhase::AwaitingDriverResponse);
        assert_eq!(s.link.network_calls, 1);
        assert_eq!(s.link.send_calls, 1);
        assert!(s.link.request_ids[0].starts_with("esp32-button-"));
        assert!(s
            .feedback
            .messages
            .contains(&("Request Sent!".to_owned(), String::new())));
        // The indicator LED from the check window is off again.
        assert!(!s.feedback.indicator);
    }

    #[test]
    fn grant_is_consumed_even_when_the_send_fails() {
        let mut link = ScriptedLink::new();
        link.sends.push_back(Err(LinkError::StoreWriteFailure));
        let mut s = session(link);
        let mut t = authenticate_and_press(&mut s);

        assert_eq!(s.phase(), SessionPhase::AwaitingAuthentication);
        assert_eq!(s.link.shutdowns, 1);
        assert!(s.feedback.events.contains(&FeedbackEvent::AuthRejected));

        // A second press without re-authenticating gets nothing: the grant
        // cannot be replayed.
        run(&mut s, &mut t, 10, 100, idle_inputs()); // release the button
        run(&mut s, &mut t, 1, 100, pressed(DARK));
        run(&mut s, &mut t, 1, 100, pressed(DARK));
        assert_eq!(s.link.send_calls, 1);
    }

    #[test]
    fn wifi_timeout_aborts_the_attempt() {
        let mut link = ScriptedLink::new();
        link.network.push_back(Err(LinkError::WifiTimeout));
        let mut s = session(link);
        authenticate_and_press(&mut s);

        assert_eq!(s.phase(), SessionPhase::AwaitingAuthentication);
        assert_eq!(s.link.send_calls, 0);
        assert!(s
            .feedback
            .messages
            .contains(&("WiFi FAILED".to_owned(), "Check credentials".to_owned())));
    }

    #[test]
    fn store_timeout_aborts_the_attempt() {
        let mut link = ScriptedLink::new();
        link.store.push_back(Err(LinkError::StoreTimeout));
        let mut s = session(link);
        authenticate_and_press(&mut s);

        assert_eq!(s.phase(), SessionPhase::AwaitingAuthentication);
        assert_eq!(s.link.send_calls, 0);
        assert!(s
            .feedback
            .messages
            .contains(&("Server FAILED".to_owned(), "Check settings".to_owned())));
    }

    #[test]
    fn polling_respects_the_fixed_interval() {
        let mut s = session(ScriptedLink::with_polls(&[PollOutcome::Status(
            RideStatus::Requesting,
        )]));
        let mut t = authenticate_and_press(&mut s);

        // 4.9 s of ticks — no poll yet.
        run(&mut s, &mut t, 49, 100, idle_inputs());
        assert_eq!(s.link.poll_calls, 0);
        // Crossing 5 s triggers exactly one.
        run(&mut s, &mut t, 2, 100, idle_inputs());
        assert_eq!(s.link.poll_calls, 1);
        // And the next only after another full interval.
        run(&mut s, &mut t, 48, 100, idle_inputs());
        assert_eq!(s.link.poll_calls, 1);
        run(&mut s, &mut t, 2, 100, idle_inputs());
        assert_eq!(s.link.poll_calls, 2);
    }

    #[test]
    fn repeated_status_fires_no_duplicate_feedback() {
        let mut s = session(ScriptedLink::with_polls(&[
            PollOutcome::Status(RideStatus::Requesting),
            PollOutcome::Status(RideStatus::Requesting),
            PollOutcome::Status(RideStatus::Accepted),
        ]));
        let mut t = authenticate_and_press(&mut s);
        run(&mut s, &mut t, 160, 100, idle_inputs()); // three poll intervals

        assert_eq!(
            status_events(&s.feedback),
            vec![FeedbackEvent::Requesting, FeedbackEvent::Accepted]
        );
    }

    #[test]
    fn transient_poll_error_changes_nothing() {
        let mut s = session(ScriptedLink::with_polls(&[
            PollOutcome::Status(RideStatus::Requesting),
            PollOutcome::Transient,
            PollOutcome::Status(RideStatus::Accepted),
        ]));
        let mut t = authenticate_and_press(&mut s);
        run(&mut s, &mut t, 160, 100, idle_inputs());

        assert_eq!(s.phase(), SessionPhase::AwaitingDriverResponse);
        assert_eq!(
            status_events(&s.feedback),
            vec![FeedbackEvent::Requesting, FeedbackEvent::Accepted]
        );
    }

    #[test]
    fn link_down_forces_a_protective_finish() {
        let mut s = session(ScriptedLink::with_polls(&[
            PollOutcome::Status(RideStatus::Requesting),
            PollOutcome::LinkDown,
        ]));
        let mut t = authenticate_and_press(&mut s);
        run(&mut s, &mut t, 110, 100, idle_inputs());

        assert_eq!(s.phase(), SessionPhase::RideFinished);
        assert!(s
            .feedback
            .messages
            .contains(&("Link Error".to_owned(), "Shutting down...".to_owned())));
    }

    #[test]
    fn rejection_finishes_and_silences_on_teardown() {
        let mut s = session(ScriptedLink::with_polls(&[
            PollOutcome::Status(RideStatus::Requesting),
            PollOutcome::Status(RideStatus::Rejected),
        ]));
        let mut t = authenticate_and_press(&mut s);
        run(&mut s, &mut t, 110, 100, idle_inputs());
        assert_eq!(s.phase(), SessionPhase::RideFinished);

        run(&mut s, &mut t, 51, 100, idle_inputs()); // finished hold
        assert_eq!(s.phase(), SessionPhase::AwaitingAuthentication);
        assert_eq!(s.link.shutdowns, 1);
        // Rejected cue, then the teardown silencing cue.
        assert_eq!(
            status_events(&s.feedback),
            vec![
                FeedbackEvent::Requesting,
                FeedbackEvent::Rejected,
                FeedbackEvent::Idle
            ]
        );
    }

    #[test]
    fn full_ride_cycle_fires_one_event_per_transition() {
        // requesting, then accepted, then in_progress, then idle.
        let mut s = session(ScriptedLink::with_polls(&[
            PollOutcome::Status(RideStatus::Requesting),
            PollOutcome::Status(RideStatus::Accepted),
            PollOutcome::Status(RideStatus::InProgress),
            PollOutcome::Status(RideStatus::Idle),
        ]));
        let mut t = authenticate_and_press(&mut s);

        run(&mut s, &mut t, 210, 100, idle_inputs()); // four poll intervals
        assert_eq!(s.phase(), SessionPhase::RideFinished);
        assert_eq!(
            status_events(&s.feedback),
            vec![
                FeedbackEvent::Requesting,
                FeedbackEvent::Accepted,
                FeedbackEvent::InProgress,
                FeedbackEvent::Idle
            ]
        );
        assert!(s
            .feedback
            .messages
            .contains(&("Ride".to_owned(), "Complete".to_owned())));

        // Finished hold, then automatic return to authentication with the
        // link torn down. The final status was already idle, so teardown
        // adds no extra feedback event.
        run(&mut s, &mut t, 51, 100, idle_inputs());
        assert_eq!(s.phase(), SessionPhase::AwaitingAuthentication);
        assert_eq!(s.link.shutdowns, 1);
        assert_eq!(status_events(&s.feedback).len(), 4);
    }
}
