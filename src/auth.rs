// Rickshaw Passenger Unit — Presence / Privilege State Machine
//
// Tracks how long a subject has stayed inside the proximity threshold, then
// arbitrates a timed LDR check that grants or denies the ride-request
// privilege. Driven once per loop tick with the filtered range and a raw
// LDR sample; emits an `AuthEvent` on every transition so the caller can
// update the indicator LED and screen.
//
//   Idle ──in range──▶ InRange ──held 3 s──▶ ThresholdMet ──LDR in band──▶ Decided(granted)
//                                            ThresholdMet ──10 s elapsed─▶ Decided(denied)
//
// Leaving the proximity threshold cancels everything, including an
// in-flight check or a displayed result. A granted decision is consumed by
// exactly one send attempt (or by presence loss), never reused.

use crate::config::{
    LDR_ACCEPT_MAX, LDR_ACCEPT_MIN, PRESENCE_HOLD_MS, PRIVILEGE_WAIT_MS, RESULT_HOLD_MS,
};
use crate::events::AuthEvent;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthState {
    /// No presence.
    Idle,
    /// Subject in range; continuous-hold timer running.
    InRange { entered_ms: u32 },
    /// Hold time met; LDR acceptance window open.
    ThresholdMet { window_start_ms: u32 },
    /// Check resolved; result held on screen until the hold expires.
    Decided { granted: bool, decided_ms: u32 },
}

/// What the auth screen should show this tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthView {
    Waiting,
    Holding { elapsed_ms: u32 },
    Checking { elapsed_ms: u32 },
    Result { granted: bool },
}

pub struct AuthMachine {
    state: AuthState,
}

impl Default for AuthMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl AuthMachine {
    pub fn new() -> Self {
        Self { state: AuthState::Idle }
    }

    /// Advance one tick. `in_range` is the filtered presence flag,
    /// `ldr_raw` the latest light-sensor sample (only read while the check
    /// window is open).
    pub fn tick(&mut self, in_range: bool, ldr_raw: u16, now_ms: u32) -> Option<AuthEvent> {
        match self.state {
            AuthState::Idle => {
                if in_range {
                    self.state = AuthState::InRange { entered_ms: now_ms };
                    return Some(AuthEvent::PresenceEntered);
                }
                None
            }

            AuthState::InRange { entered_ms } => {
                if !in_range {
                    self.state = AuthState::Idle;
                    return Some(AuthEvent::PresenceLost);
                }
                if now_ms.wrapping_sub(entered_ms) >= PRESENCE_HOLD_MS {
                    self.state = AuthState::ThresholdMet { window_start_ms: now_ms };
                    return Some(AuthEvent::CheckWindowOpened);
                }
                None
            }

            AuthState::ThresholdMet { window_start_ms } => {
                if !in_range {
                    self.state = AuthState::Idle;
                    return Some(AuthEvent::PresenceLost);
                }
                // Timeout is checked before the sample so the decision lands
                // exactly at the window edge, never after it.
                if now_ms.wrapping_sub(window_start_ms) >= PRIVILEGE_WAIT_MS {
                    self.state = AuthState::Decided { granted: false, decided_ms: now_ms };
                    return Some(AuthEvent::Denied);
                }
                if (LDR_ACCEPT_MIN..=LDR_ACCEPT_MAX).contains(&ldr_raw) {
                    self.state = AuthState::Decided { granted: true, decided_ms: now_ms };
                    return Some(AuthEvent::Granted);
                }
                None
            }

            AuthState::Decided { decided_ms, .. } => {
                if !in_range {
                    self.state = AuthState::Idle;
                    return Some(AuthEvent::PresenceLost);
                }
                if now_ms.wrapping_sub(decided_ms) >= RESULT_HOLD_MS {
                    self.state = AuthState::Idle;
                    return Some(AuthEvent::ResultExpired);
                }
                None
            }
        }
    }

    /// Whether a granted decision is currently standing.
    pub fn has_grant(&self) -> bool {
        matches!(self.state, AuthState::Decided { granted: true, .. })
    }

    /// Consume a standing grant. Returns `true` (and forces the machine
    /// back to `Idle`) only if a grant was present; a grant can never
    /// authorize two send attempts.
    pub fn take_grant(&mut self) -> bool {
        if self.has_grant() {
            self.state = AuthState::Idle;
            true
        } else {
            false
        }
    }

    /// Drop everything in flight (send attempt made, or session teardown).
    pub fn reset(&mut self) {
        self.state = AuthState::Idle;
    }

    /// Raw state (kept for debugging/logging purposes).
    #[allow(dead_code)]
    pub fn state(&self) -> AuthState {
        self.state
    }

    /// Screen content for this tick.
    pub fn view(&self, now_ms: u32) -> AuthView {
        match self.state {
            AuthState::Idle => AuthView::Waiting,
            AuthState::InRange { entered_ms } => AuthView::Holding {
                elapsed_ms: now_ms.wrapping_sub(entered_ms),
            },
            AuthState::ThresholdMet { window_start_ms } => AuthView::Checking {
                elapsed_ms: now_ms.wrapping_sub(window_start_ms),
            },
            AuthState::Decided { granted, .. } => AuthView::Result { granted },
        }
    }
}
