// Rickshaw Passenger Unit — Ride Link
//
// The session state machine talks to the outside world only through
// `RideLink`, so the blocking HTTP implementation can be swapped for a
// scripted fake in tests (or a non-blocking variant later) without
// touching the machine's contract.

use core::fmt;

use crate::events::RideStatus;
use crate::net::WifiLink;
use crate::store::{FirestoreClient, ReadOutcome};

/// Failures of the bounded blocking operations. Read classification lives
/// in `store::ReadOutcome`; these cover connect and write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkError {
    /// WiFi association exceeded its retry budget.
    WifiTimeout,
    /// Store sign-in exceeded its retry budget.
    StoreTimeout,
    /// Document write rejected or failed in transport. Never retried
    /// automatically; the caller decides.
    StoreWriteFailure,
}

impl fmt::Display for LinkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::WifiTimeout => write!(f, "WiFi connect timed out"),
            Self::StoreTimeout => write!(f, "store sign-in timed out"),
            Self::StoreWriteFailure => write!(f, "store write failed"),
        }
    }
}

/// One status poll, already classified for the session machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    /// Document read fine; absence of the document arrives here as `Idle`.
    Status(RideStatus),
    /// Read failed for a transient reason; last-known status stands.
    Transient,
    /// Connectivity is gone; the session should stop waiting on it.
    LinkDown,
}

pub trait RideLink {
    /// Bring the network up. Blocking, bounded (~10 s).
    fn connect_network(&mut self) -> Result<(), LinkError>;
    /// Establish the store session. Blocking, bounded (~30 s).
    fn connect_store(&mut self) -> Result<(), LinkError>;
    /// Write the ride-request document. One shot.
    fn send_request(&mut self, request_id: &str) -> Result<(), LinkError>;
    /// Read the document and classify. Called on the poll interval only.
    fn poll(&mut self) -> PollOutcome;
    /// Tear everything down (store session, then WiFi).
    fn shutdown(&mut self);
}

/// Production link: WiFi + Firestore over HTTPS.
pub struct HttpRideLink {
    wifi: WifiLink,
    store: FirestoreClient,
}

impl HttpRideLink {
    pub fn new(wifi: WifiLink) -> Self {
        Self {
            wifi,
            store: FirestoreClient::new(),
        }
    }
}

impl RideLink for HttpRideLink {
    fn connect_network(&mut self) -> Result<(), LinkError> {
        self.wifi.connect()
    }

    fn connect_store(&mut self) -> Result<(), LinkError> {
        self.store.sign_in()
    }

    fn send_request(&mut self, request_id: &str) -> Result<(), LinkError> {
        self.store.write_request(request_id)
    }

    fn poll(&mut self) -> PollOutcome {
        if !self.wifi.is_connected() || !self.store.is_ready() {
            return PollOutcome::LinkDown;
        }
        match self.store.read_status() {
            ReadOutcome::Found(status) => PollOutcome::Status(status),
            ReadOutcome::NotFound => PollOutcome::Status(RideStatus::Idle),
            ReadOutcome::Transient(reason) => {
                log::warn!("Status poll failed (transient): {}", reason);
                PollOutcome::Transient
            }
        }
    }

    fn shutdown(&mut self) {
        self.store.teardown();
        self.wifi.disconnect();
        log::info!("Link torn down");
    }
}
