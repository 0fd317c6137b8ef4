//! Signature smoke test against a deployed webhook endpoint.
//!
//! Sends a correctly signed request, a tampered one and an unsigned one, and
//! checks that only the first is accepted.

use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::{Client, StatusCode};
use serde::Serialize;
use tracing::{info, warn};

use crate::web::signature::{sign, SIGNATURE_HEADER};

/// Body sent when none is supplied. Matches LINE's console "Verify" request.
pub const DEFAULT_BODY: &str = r#"{"destination":"smoke-test","events":[]}"#;

/// HTTP client for probing a webhook endpoint.
#[derive(Clone)]
pub struct SmokeClient {
    client: Client,
}

impl SmokeClient {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self { client })
    }

    /// POST `body` to `url`, with the signature header if one is given.
    pub async fn send(&self, url: &str, body: &[u8], signature: Option<&str>) -> Result<StatusCode> {
        let mut request = self
            .client
            .post(url)
            .header("Content-Type", "application/json")
            .body(body.to_vec());

        if let Some(signature) = signature {
            request = request.header(SIGNATURE_HEADER, signature);
        }

        let response = request
            .send()
            .await
            .with_context(|| format!("Request to {} failed", url))?;

        Ok(response.status())
    }

    /// Run all probes against `url`.
    pub async fn run_probe(&self, url: &str, secret: &str, body: &[u8]) -> Result<SmokeReport> {
        let signature = sign(secret.as_bytes(), body);
        let tampered = tamper(body);

        let signed = self.send(url, body, Some(&signature)).await?;
        let forged = self.send(url, &tampered, Some(&signature)).await?;
        let unsigned = self.send(url, body, None).await?;

        let report = SmokeReport {
            checks: vec![
                SmokeCheck::new("signed_accepted", signed, signed.is_success()),
                SmokeCheck::new("tampered_rejected", forged, is_auth_rejection(forged)),
                SmokeCheck::new("unsigned_rejected", unsigned, is_auth_rejection(unsigned)),
            ],
        };

        for check in &report.checks {
            if check.passed {
                info!(check = check.name, status = check.status, "smoke_check_passed");
            } else {
                warn!(check = check.name, status = check.status, "smoke_check_failed");
            }
        }

        Ok(report)
    }
}

/// Outcome of one probe.
#[derive(Debug, Clone, Serialize)]
pub struct SmokeCheck {
    pub name: &'static str,
    pub status: u16,
    pub passed: bool,
}

impl SmokeCheck {
    fn new(name: &'static str, status: StatusCode, passed: bool) -> Self {
        Self {
            name,
            status: status.as_u16(),
            passed,
        }
    }
}

/// Outcome of a full probe run.
#[derive(Debug, Clone, Serialize)]
pub struct SmokeReport {
    pub checks: Vec<SmokeCheck>,
}

impl SmokeReport {
    pub fn passed(&self) -> bool {
        !self.checks.is_empty() && self.checks.iter().all(|c| c.passed)
    }
}

fn is_auth_rejection(status: StatusCode) -> bool {
    status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN
}

/// Copy of `body` with one byte changed.
fn tamper(body: &[u8]) -> Vec<u8> {
    let mut tampered = body.to_vec();
    match tampered.last_mut() {
        Some(last) => *last ^= 0x01,
        None => tampered.push(b' '),
    }
    tampered
}

#[cfg(test)]
mod tests {
    use tokio::net::TcpListener;

    use super::*;
    use crate::config::Config;
    use crate::queue::Publisher;
    use crate::web::{router, AppState, WEBHOOK_PATH};

    const SECRET: &str = "smoke-secret";

    async fn spawn_gateway() -> String {
        let config = Config::from_lookup(|name| match name {
            "LINE_CHANNEL_SECRET" => Some(SECRET.to_string()),
            _ => None,
        })
        .unwrap();
        let state = AppState::new(config, Publisher::new("amqp://127.0.0.1:1/".to_string())).unwrap();

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router(state)).await.unwrap();
        });

        format!("http://{}{}", addr, WEBHOOK_PATH)
    }

    #[test]
    fn test_tamper_changes_one_byte() {
        let body = DEFAULT_BODY.as_bytes();
        let tampered = tamper(body);

        assert_eq!(tampered.len(), body.len());
        let differing = body.iter().zip(&tampered).filter(|(a, b)| a != b).count();
        assert_eq!(differing, 1);

        assert_eq!(tamper(b""), b" ".to_vec());
    }

    #[test]
    fn test_report_passed() {
        let ok = SmokeCheck::new("a", StatusCode::OK, true);
        let bad = SmokeCheck::new("b", StatusCode::OK, false);

        assert!(SmokeReport { checks: vec![ok.clone()] }.passed());
        assert!(!SmokeReport { checks: vec![ok, bad] }.passed());
        assert!(!SmokeReport { checks: vec![] }.passed());
    }

    #[tokio::test]
    async fn test_probe_against_gateway() {
        let url = spawn_gateway().await;
        let client = SmokeClient::new(Duration::from_secs(5)).unwrap();

        let report = client
            .run_probe(&url, SECRET, DEFAULT_BODY.as_bytes())
            .await
            .unwrap();

        assert!(report.passed(), "{:?}", report);
    }

    #[tokio::test]
    async fn test_probe_with_wrong_secret_fails() {
        let url = spawn_gateway().await;
        let client = SmokeClient::new(Duration::from_secs(5)).unwrap();

        let report = client
            .run_probe(&url, "not-the-secret", DEFAULT_BODY.as_bytes())
            .await
            .unwrap();

        assert!(!report.passed());
        assert_eq!(report.checks[0].status, 401);
    }
}
