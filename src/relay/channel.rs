//! Per-device command channel
//!
//! Synchronous request/response exchange with one device through the relay.
//! Each call is a single `PUT {relay}/devices/{origin}/rgc`; there is no
//! retry inside the channel.
//!
//! ## Failure classification
//!
//! | Condition | Error |
//! |---|---|
//! | binary message without command id | `Protocol` |
//! | network failure or request timeout | `Timeout` |
//! | non-2xx status | `Timeout`, or `ConnectionClosed` on 404 once more than 4 consecutive failures |
//! | 2xx without Content-Type | `Timeout` |
//!
//! The consecutive-error counter resets on any 2xx response.

use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use reqwest::header::CONTENT_TYPE;
use reqwest::StatusCode;
use tracing::{debug, error};

use super::message::{media_type, RelayMessage, RelayResponse, TEXT_PLAIN};
use crate::types::{GateError, Result};

/// Consecutive failures tolerated before a 404 is taken as a disconnect
const MAX_TOLERATED_ERRORS: u32 = 4;

pub struct RelayChannel {
    origin: String,
    endpoint: String,
    http: reqwest::Client,
    default_timeout: Duration,
    errors: AtomicU32,
}

impl RelayChannel {
    pub(crate) fn new(
        origin: &str,
        endpoint: String,
        http: reqwest::Client,
        default_timeout: Duration,
    ) -> Self {
        Self {
            origin: origin.to_string(),
            endpoint,
            http,
            default_timeout,
            errors: AtomicU32::new(0),
        }
    }

    pub fn origin(&self) -> &str {
        &self.origin
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Consecutive failed responses since the last success
    pub fn error_count(&self) -> u32 {
        self.errors.load(Ordering::SeqCst)
    }

    /// Send a text command with the default command timeout
    pub async fn send_text(&self, command: &str) -> Result<RelayResponse> {
        self.send_and_wait(command, self.default_timeout, None).await
    }

    /// Send `message` and wait up to `timeout` for the device's response
    pub async fn send_and_wait(
        &self,
        message: impl Into<RelayMessage>,
        timeout: Duration,
        byte_command: Option<u32>,
    ) -> Result<RelayResponse> {
        let message = message.into();
        if let RelayMessage::Text(text) = &message {
            debug!(origin = %self.origin, "Sending command: {}", text.trim());
        }
        let (body, content_type) = message.encode(byte_command).inspect_err(|e| {
            error!(origin = %self.origin, "Refusing to send invalid message: {}", e);
        })?;

        let response = self
            .http
            .put(&self.endpoint)
            .header(CONTENT_TYPE, content_type)
            .body(body)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| {
                error!(origin = %self.origin, "Error waiting for relay response: {}", e);
                GateError::Timeout(format!("relay request failed: {}", e))
            })?;

        let status = response.status();
        if !status.is_success() {
            let errors = self.errors.fetch_add(1, Ordering::SeqCst) + 1;
            error!(
                origin = %self.origin,
                "Relay answered {} ({} consecutive errors)", status, errors
            );
            // Give the device a chance to reconnect before declaring it gone
            if status == StatusCode::NOT_FOUND && errors > MAX_TOLERATED_ERRORS {
                return Err(GateError::ConnectionClosed(format!(
                    "device {} is no longer connected to the relay",
                    self.origin
                )));
            }
            return Err(GateError::Timeout(format!("relay answered {}", status)));
        }

        self.errors.store(0, Ordering::SeqCst);

        let Some(content_type) = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(media_type)
        else {
            error!(origin = %self.origin, "Relay response has no content type");
            return Err(GateError::Timeout("relay response has no content type".into()));
        };

        let bytes = response
            .bytes()
            .await
            .map_err(|e| GateError::Timeout(format!("failed reading relay response: {}", e)))?;

        if content_type == TEXT_PLAIN {
            let text = String::from_utf8(bytes.to_vec())
                .map_err(|_| GateError::Timeout("relay text response is not UTF-8".into()))?;
            debug!(origin = %self.origin, "Got text response: {}", text.trim());
            Ok(RelayResponse::Text(text))
        } else {
            debug!(origin = %self.origin, "Got binary response ({} bytes)", bytes.len());
            Ok(RelayResponse::Binary(bytes))
        }
    }
}
