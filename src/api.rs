// Remote access layer: the three booking endpoints behind one async trait.
// No retry happens here; retry policy belongs to the caller.

use crate::models::{
    AvailabilityResponse, BookingConfirmation, BookingDraft, BookingId, BookingStatusResponse,
    ErrorBody, RoomOffer,
};
use async_trait::async_trait;
use chrono::NaiveDate;
use parking_lot::Mutex;
use reqwest::{RequestBuilder, Url};
use serde::de::DeserializeOwned;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, error};

// Display of every variant is the message shown to the user
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ApiError {
    #[error("{0}")]
    Network(String),

    #[error("{message}")]
    Server { status_code: u16, message: String },

    #[error("Invalid response from server: {0}")]
    InvalidResponse(String),
}

impl ApiError {
    // Non-2xx response: prefer the body's `message`, else a generic status line
    pub fn from_error_body(status_code: u16, body: &str) -> Self {
        let message = serde_json::from_str::<ErrorBody>(body)
            .ok()
            .and_then(|b| b.message)
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| format!("Server Error ({})", status_code));

        ApiError::Server {
            status_code,
            message,
        }
    }

    pub fn is_network(&self) -> bool {
        matches!(self, ApiError::Network(_))
    }
}

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Initialization error: {0}")]
    InitError(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    CheckAvailability,
    InitiateBooking,
    GetBookingStatus,
}

impl Operation {
    pub fn network_message(&self) -> &'static str {
        match self {
            Operation::CheckAvailability => "Network error. Please check your connection.",
            Operation::InitiateBooking => "Network error. Unable to confirm booking.",
            Operation::GetBookingStatus => "Network error. Unable to check booking status.",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Operation::CheckAvailability => "checkAvailability",
            Operation::InitiateBooking => "initiateBooking",
            Operation::GetBookingStatus => "getBookingStatus",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub base_url: String,
    pub timeout_ms: u64,
    pub user_agent: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:5000/api/v1".to_string(),
            timeout_ms: 10_000,
            user_agent: concat!("boutique-booking/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct ClientStats {
    pub requests_sent: usize,
    pub requests_succeeded: usize,
    pub requests_failed: usize,
    pub network_errors: usize,
    pub average_response_time_ms: f64,
    pub max_response_time_ms: f64,
}

impl ClientStats {
    fn record(&mut self, outcome: Result<(), &ApiError>, elapsed: Duration) {
        let elapsed_ms = elapsed.as_secs_f64() * 1000.0;
        self.requests_sent += 1;
        match outcome {
            Ok(()) => self.requests_succeeded += 1,
            Err(e) => {
                self.requests_failed += 1;
                if e.is_network() {
                    self.network_errors += 1;
                }
            }
        }

        let n = self.requests_sent as f64;
        self.average_response_time_ms += (elapsed_ms - self.average_response_time_ms) / n;
        if elapsed_ms > self.max_response_time_ms {
            self.max_response_time_ms = elapsed_ms;
        }
    }
}

// Callers must treat every call as potentially failing
#[async_trait]
pub trait BookingApi: Send + Sync {
    async fn check_availability(
        &self,
        check_in: NaiveDate,
        check_out: NaiveDate,
        guests: u32,
    ) -> Result<Vec<RoomOffer>, ApiError>;

    async fn initiate_booking(&self, draft: &BookingDraft)
        -> Result<BookingConfirmation, ApiError>;

    async fn get_booking_status(
        &self,
        booking_id: &BookingId,
    ) -> Result<BookingStatusResponse, ApiError>;

    fn stats(&self) -> ClientStats {
        ClientStats::default()
    }
}

#[async_trait]
impl<T: BookingApi + ?Sized> BookingApi for Arc<T> {
    async fn check_availability(
        &self,
        check_in: NaiveDate,
        check_out: NaiveDate,
        guests: u32,
    ) -> Result<Vec<RoomOffer>, ApiError> {
        (**self).check_availability(check_in, check_out, guests).await
    }

    async fn initiate_booking(
        &self,
        draft: &BookingDraft,
    ) -> Result<BookingConfirmation, ApiError> {
        (**self).initiate_booking(draft).await
    }

    async fn get_booking_status(
        &self,
        booking_id: &BookingId,
    ) -> Result<BookingStatusResponse, ApiError> {
        (**self).get_booking_status(booking_id).await
    }

    fn stats(&self) -> ClientStats {
        (**self).stats()
    }
}

pub struct HttpBookingApi {
    base_url: Url,
    client: reqwest::Client,
    stats: Mutex<ClientStats>,
}

impl HttpBookingApi {
    pub fn new(config: ClientConfig) -> Result<Self, ClientError> {
        let base_url = Url::parse(&config.base_url).map_err(|e| {
            ClientError::ConfigError(format!("invalid base url '{}': {}", config.base_url, e))
        })?;
        if base_url.cannot_be_a_base() {
            return Err(ClientError::ConfigError(format!(
                "base url '{}' cannot carry a path",
                config.base_url
            )));
        }

        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.as_str())
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .map_err(|e| ClientError::InitError(e.to_string()))?;

        Ok(Self {
            base_url,
            client,
            stats: Mutex::new(ClientStats::default()),
        })
    }

    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        // checked in new(): the base can carry a path
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    async fn execute<T: DeserializeOwned>(
        &self,
        operation: Operation,
        request: RequestBuilder,
    ) -> Result<T, ApiError> {
        let started = Instant::now();
        let result = Self::send(operation, request).await;

        self.stats
            .lock()
            .record(result.as_ref().map(|_| ()), started.elapsed());

        if let Err(e) = &result {
            error!(operation = %operation, error = %e, "API error");
        }
        result
    }

    async fn send<T: DeserializeOwned>(
        operation: Operation,
        request: RequestBuilder,
    ) -> Result<T, ApiError> {
        let response = request.send().await.map_err(|e| {
            debug!(operation = %operation, cause = %e, "transport failure");
            ApiError::Network(operation.network_message().to_string())
        })?;

        let status = response.status();
        let body = response.bytes().await.map_err(|e| {
            debug!(operation = %operation, cause = %e, "failed reading response body");
            ApiError::Network(operation.network_message().to_string())
        })?;

        if !status.is_success() {
            return Err(ApiError::from_error_body(
                status.as_u16(),
                &String::from_utf8_lossy(&body),
            ));
        }

        serde_json::from_slice(&body).map_err(|e| ApiError::InvalidResponse(e.to_string()))
    }
}

#[async_trait]
impl BookingApi for HttpBookingApi {
    async fn check_availability(
        &self,
        check_in: NaiveDate,
        check_out: NaiveDate,
        guests: u32,
    ) -> Result<Vec<RoomOffer>, ApiError> {
        let request = self.client.get(self.endpoint(&["availability"])).query(&[
            ("checkIn", check_in.to_string()),
            ("checkOut", check_out.to_string()),
            ("guests", guests.to_string()),
        ]);

        let response: AvailabilityResponse =
            self.execute(Operation::CheckAvailability, request).await?;
        debug!(rooms = response.available_rooms.len(), "availability received");
        Ok(response.available_rooms)
    }

    async fn initiate_booking(
        &self,
        draft: &BookingDraft,
    ) -> Result<BookingConfirmation, ApiError> {
        let request = self
            .client
            .post(self.endpoint(&["bookings", "initiate"]))
            .json(&draft.to_request());

        self.execute(Operation::InitiateBooking, request).await
    }

    async fn get_booking_status(
        &self,
        booking_id: &BookingId,
    ) -> Result<BookingStatusResponse, ApiError> {
        let request = self
            .client
            .get(self.endpoint(&["bookings", booking_id.as_str(), "status"]));

        self.execute(Operation::GetBookingStatus, request).await
    }

    fn stats(&self) -> ClientStats {
        self.stats.lock().clone()
    }
}
