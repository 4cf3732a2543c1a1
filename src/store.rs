// Rickshaw Passenger Unit — Firestore Document Store
//
// REST client for the single ride-request document. Three operations:
// establishing a store session (Identity Toolkit email/password sign-in,
// blocking with a ~30 s budget), writing the request document (PATCH), and
// reading it back (GET). Every read funnels through `classify_read` so
// "not found" is uniformly treated as status `idle` and everything else
// non-200 as a transient error that leaves remote-derived state alone.

use std::thread;
use std::time::Duration;

use embedded_svc::http::client::Client;
use embedded_svc::http::Method;
use embedded_svc::io::{Read, Write};
use esp_idf_svc::http::client::{Configuration as HttpConfiguration, EspHttpConnection};
use serde::Deserialize;

use crate::config::{
    ride_document_path, CONNECT_RETRY_STEP_MS, DROPOFF_LOCATION, FIREBASE_API_KEY,
    FIREBASE_PROJECT_ID, FIREBASE_USER_EMAIL, FIREBASE_USER_PASSWORD, PICKUP_LOCATION,
    STORE_CONNECT_RETRIES,
};
use crate::events::RideStatus;
use crate::link::LinkError;

/// Outcome of one document read: found / not-found / transient.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadOutcome {
    Found(RideStatus),
    NotFound,
    Transient(String),
}

#[derive(Deserialize)]
struct SignInResponse {
    #[serde(rename = "idToken")]
    id_token: String,
}

pub struct FirestoreClient {
    token: Option<String>,
}

impl FirestoreClient {
    pub fn new() -> Self {
        Self { token: None }
    }

    pub fn is_ready(&self) -> bool {
        self.token.is_some()
    }

    /// Exchange the configured email/password for a bearer token. Retries
    /// in 500 ms steps until the budget (~30 s) is spent; a timeout is a
    /// failed attempt, never an endless wait.
    pub fn sign_in(&mut self) -> Result<(), LinkError> {
        log::info!("Signing in to the document store…");

        let url = format!(
            "https://identitytoolkit.googleapis.com/v1/accounts:signInWithPassword?key={FIREBASE_API_KEY}"
        );
        let body = serde_json::json!({
            "email": FIREBASE_USER_EMAIL,
            "password": FIREBASE_USER_PASSWORD,
            "returnSecureToken": true,
        })
        .to_string();

        for attempt in 1..=STORE_CONNECT_RETRIES {
            match self.try_sign_in(&url, &body) {
                Ok(token) => {
                    log::info!("Store session established (attempt {})", attempt);
                    self.token = Some(token);
                    return Ok(());
                }
                Err(e) => {
                    log::warn!("Sign-in attempt {} failed: {}", attempt, e);
                    thread::sleep(Duration::from_millis(CONNECT_RETRY_STEP_MS));
                }
            }
        }

        log::warn!("Store sign-in exhausted {} retries", STORE_CONNECT_RETRIES);
        Err(LinkError::StoreTimeout)
    }

    fn try_sign_in(&self, url: &str, body: &str) -> anyhow::Result<String> {
        let (status, payload) = http_request(Method::Post, url, &[], Some(body))?;
        if status != 200 {
            anyhow::bail!("sign-in rejected with HTTP {}", status);
        }
        let parsed: SignInResponse = serde_json::from_slice(&payload)?;
        Ok(parsed.id_token)
    }

    /// Write the ride-request document with status `requesting`. One shot;
    /// the caller decides what a failure means.
    pub fn write_request(&mut self, request_id: &str) -> Result<(), LinkError> {
        let token = self.token.as_deref().ok_or(LinkError::StoreWriteFailure)?;

        let body = serde_json::json!({
            "fields": {
                "status": { "stringValue": RideStatus::Requesting.as_str() },
                "request_id": { "stringValue": request_id },
                "pickup_location": { "stringValue": PICKUP_LOCATION },
                "dropoff_location": { "stringValue": DROPOFF_LOCATION },
            }
        })
        .to_string();

        let auth = format!("Bearer {token}");
        let headers = [("Authorization", auth.as_str())];

        match http_request(Method::Patch, &document_url(), &headers, Some(&body)) {
            Ok((200, _)) => {
                log::info!("Ride request document written");
                Ok(())
            }
            Ok((status, _)) => {
                log::warn!("Request write rejected with HTTP {}", status);
                Err(LinkError::StoreWriteFailure)
            }
            Err(e) => {
                log::warn!("Request write transport error: {}", e);
                Err(LinkError::StoreWriteFailure)
            }
        }
    }

    /// Read the document and classify the outcome. Transport errors are
    /// transient: surfaced, but the last-known status stands.
    pub fn read_status(&mut self) -> ReadOutcome {
        let token = match self.token.as_deref() {
            Some(t) => t,
            None => return ReadOutcome::Transient("no store session".into()),
        };

        let auth = format!("Bearer {token}");
        let headers = [("Authorization", auth.as_str())];

        match http_request(Method::Get, &document_url(), &headers, None) {
            Ok((status, payload)) => classify_read(status, &payload),
            Err(e) => ReadOutcome::Transient(e.to_string()),
        }
    }

    /// Drop the store session.
    pub fn teardown(&mut self) {
        self.token = None;
    }
}

impl Default for FirestoreClient {
    fn default() -> Self {
        Self::new()
    }
}

fn document_url() -> String {
    format!(
        "https://firestore.googleapis.com/v1/projects/{FIREBASE_PROJECT_ID}/databases/(default)/documents/{}",
        ride_document_path()
    )
}

/// Map one HTTP read result onto `ReadOutcome`. 404 is not an error:
/// the driver side deletes the document when a ride is over, so absence
/// means `idle`. A 200 with a malformed body is transient; a 200 with a
/// well-formed body but no status field parses to `idle`.
pub fn classify_read(http_status: u16, body: &[u8]) -> ReadOutcome {
    match http_status {
        200 => match serde_json::from_slice::<serde_json::Value>(body) {
            Ok(doc) => {
                let field = doc
                    .get("fields")
                    .and_then(|f| f.get("status"))
                    .and_then(|s| s.get("stringValue"))
                    .and_then(|v| v.as_str());
                ReadOutcome::Found(RideStatus::from_field(field))
            }
            Err(e) => ReadOutcome::Transient(format!("bad document body: {e}")),
        },
        404 => ReadOutcome::NotFound,
        other => ReadOutcome::Transient(format!("HTTP {other}")),
    }
}

/// One blocking HTTPS exchange: send `body` (if any), drain the response.
fn http_request(
    method: Method,
    url: &str,
    extra_headers: &[(&str, &str)],
    body: Option<&str>,
) -> anyhow::Result<(u16, Vec<u8>)> {
    let connection = EspHttpConnection::new(&HttpConfiguration {
        use_global_ca_store: true,
        crt_bundle_attach: Some(esp_idf_sys::esp_crt_bundle_attach),
        ..Default::default()
    })?;
    let mut client = Client::wrap(connection);

    let mut headers: Vec<(&str, &str)> = vec![("Content-Type", "application/json")];
    headers.extend_from_slice(extra_headers);

    let mut request = client.request(method, url, &headers)?;
    if let Some(body) = body {
        request.write_all(body.as_bytes())?;
        request.flush()?;
    }

    let mut response = request.submit()?;
    let status = response.status();

    let mut payload = Vec::new();
    let mut chunk = [0u8; 512];
    loop {
        let n = response.read(&mut chunk)?;
        if n == 0 {
            break;
        }
        payload.extend_from_slice(&chunk[..n]);
    }

    Ok((status, payload))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc_body(status: &str) -> Vec<u8> {
        serde_json::json!({
            "name": "projects/p/databases/(default)/documents/rides/driver",
            "fields": { "status": { "stringValue": status } },
        })
        .to_string()
        .into_bytes()
    }

    #[test]
    fn ok_response_yields_parsed_status() {
        assert_eq!(
            classify_read(200, &doc_body("accepted")),
            ReadOutcome::Found(RideStatus::Accepted)
        );
        assert_eq!(
            classify_read(200, &doc_body("in_progress")),
            ReadOutcome::Found(RideStatus::InProgress)
        );
    }

    #[test]
    fn not_found_is_classified_not_an_error() {
        assert_eq!(classify_read(404, b"{}"), ReadOutcome::NotFound);
    }

    #[test]
    fn missing_status_field_parses_to_idle() {
        let body = br#"{"fields":{"pickup_location":{"stringValue":"x"}}}"#;
        assert_eq!(classify_read(200, body), ReadOutcome::Found(RideStatus::Idle));
        assert_eq!(classify_read(200, b"{}"), ReadOutcome::Found(RideStatus::Idle));
    }

    #[test]
    fn unknown_status_value_parses_to_idle() {
        assert_eq!(
            classify_read(200, &doc_body("paused")),
            ReadOutcome::Found(RideStatus::Idle)
        );
    }

    #[test]
    fn malformed_body_is_transient() {
        assert!(matches!(
            classify_read(200, b"not json at all"),
            ReadOutcome::Transient(_)
        ));
    }

    #[test]
    fn other_http_statuses_are_transient() {
        assert!(matches!(classify_read(500, b""), ReadOutcome::Transient(_)));
        assert!(matches!(classify_read(403, b"{}"), ReadOutcome::Transient(_)));
        assert!(matches!(classify_read(429, b""), ReadOutcome::Transient(_)));
    }
}
