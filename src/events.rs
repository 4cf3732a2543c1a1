// Rickshaw Passenger Unit — System Events & Data Types

// ---------------------------------------------------------------------------
// Ride status — lifecycle of the remotely-owned request document
// ---------------------------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RideStatus {
    Idle,
    Requesting,
    Accepted,
    InProgress,
    Rejected,
}

impl RideStatus {
    /// Map the remote `status` string field to a `RideStatus`.
    ///
    /// This is the only place the stringly-typed remote value is touched.
    /// A missing document, a missing field, or an unrecognised value all
    /// mean the driver side considers the ride over, so they map to `Idle`.
    pub fn from_field(value: Option<&str>) -> Self {
        match value {
            Some("requesting") => Self::Requesting,
            Some("accepted") => Self::Accepted,
            Some("in_progress") => Self::InProgress,
            Some("rejected") => Self::Rejected,
            _ => Self::Idle,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Requesting => "requesting",
            Self::Accepted => "accepted",
            Self::InProgress => "in_progress",
            Self::Rejected => "rejected",
        }
    }

    /// Statuses that end the ride from this unit's point of view.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Idle | Self::Rejected)
    }
}

impl Default for RideStatus {
    fn default() -> Self {
        Self::Idle
    }
}

// ---------------------------------------------------------------------------
// Feedback events — one per user-visible cue (LED colour + tone + text)
// ---------------------------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedbackEvent {
    /// Request written, waiting for the driver. Yellow, request tone.
    Requesting,
    /// Driver accepted. Green, accept tone.
    Accepted,
    /// Ride underway. Green, silence.
    InProgress,
    /// Driver rejected. Red, reject tone.
    Rejected,
    /// Ride over or nothing pending. Off, silence.
    Idle,
    /// Authentication passed (button press acknowledged). Accept tone only.
    AuthAccepted,
    /// Button pressed without privilege, or a send attempt failed.
    AuthRejected,
}

impl FeedbackEvent {
    pub fn from_status(status: RideStatus) -> Self {
        match status {
            RideStatus::Requesting => Self::Requesting,
            RideStatus::Accepted => Self::Accepted,
            RideStatus::InProgress => Self::InProgress,
            RideStatus::Rejected => Self::Rejected,
            RideStatus::Idle => Self::Idle,
        }
    }
}

// ---------------------------------------------------------------------------
// Auth events — emitted by the presence/privilege machine on transitions
// ---------------------------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthEvent {
    /// Subject entered the proximity threshold.
    PresenceEntered,
    /// Presence lost; everything in flight was cancelled.
    PresenceLost,
    /// Continuous presence reached the hold time; LDR window opened,
    /// indicator LED should be asserted.
    CheckWindowOpened,
    /// LDR sample landed in the acceptance band.
    Granted,
    /// Acceptance window elapsed without a valid sample.
    Denied,
    /// Result display hold expired; machine returned to idle, indicator
    /// LED should be cleared.
    ResultExpired,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_status_strings_parse() {
        assert_eq!(RideStatus::from_field(Some("requesting")), RideStatus::Requesting);
        assert_eq!(RideStatus::from_field(Some("accepted")), RideStatus::Accepted);
        assert_eq!(RideStatus::from_field(Some("in_progress")), RideStatus::InProgress);
        assert_eq!(RideStatus::from_field(Some("rejected")), RideStatus::Rejected);
        assert_eq!(RideStatus::from_field(Some("idle")), RideStatus::Idle);
    }

    #[test]
    fn missing_or_unknown_status_means_idle() {
        assert_eq!(RideStatus::from_field(None), RideStatus::Idle);
        assert_eq!(RideStatus::from_field(Some("")), RideStatus::Idle);
        assert_eq!(RideStatus::from_field(Some("cancelled_v2")), RideStatus::Idle);
    }

    #[test]
    fn terminal_statuses() {
        assert!(RideStatus::Idle.is_terminal());
        assert!(RideStatus::Rejected.is_terminal());
        assert!(!RideStatus::Requesting.is_terminal());
        assert!(!RideStatus::Accepted.is_terminal());
        assert!(!RideStatus::InProgress.is_terminal());
    }
}
