// Payment-return verification.
//
// When the payment provider redirects back with `booking_id` plus `status` or
// `tx_ref`, the booking status is polled at a fixed interval with a fixed
// attempt budget until it settles or the budget runs out. A session always
// terminates, and termination strips the query so a reload does not verify
// again.

use crate::api::BookingApi;
use crate::models::{BookingId, BookingStatus};
use reqwest::Url;
use std::time::Duration;
use tracing::{debug, info, warn};

pub const POLL_INTERVAL: Duration = Duration::from_millis(3000);
pub const MAX_POLL_ATTEMPTS: u32 = 10;

pub const DECLINED_MESSAGE: &str = "Payment declined or failed.";
pub const CANCELLED_MESSAGE: &str = "Payment was cancelled.";
pub const TIMED_OUT_MESSAGE: &str =
    "Verification timed out. Please check your email for confirmation or try again.";
pub const CONNECTION_ERROR_MESSAGE: &str =
    "Connection error during verification. Please contact support.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollConfig {
    pub interval: Duration,
    pub max_attempts: u32,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval: POLL_INTERVAL,
            max_attempts: MAX_POLL_ATTEMPTS,
        }
    }
}

/// Query parameters left by the payment provider on the return redirect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentReturn {
    pub booking_id: BookingId,
    pub status: Option<String>,
    pub tx_ref: Option<String>,
}

impl PaymentReturn {
    /// Returns `None` unless `booking_id` and at least one of `status` /
    /// `tx_ref` are present and non-empty. The first occurrence of a
    /// repeated parameter wins.
    pub fn from_url(url: &Url) -> Option<Self> {
        let param = |name: &str| {
            url.query_pairs()
                .find(|(key, _)| key == name)
                .map(|(_, value)| value.into_owned())
                .filter(|value| !value.is_empty())
        };

        let booking_id = param("booking_id")?;
        let status = param("status");
        let tx_ref = param("tx_ref");
        if status.is_none() && tx_ref.is_none() {
            return None;
        }

        Some(Self {
            booking_id: BookingId::new(booking_id),
            status,
            tx_ref,
        })
    }
}

/// The location with query and fragment removed, path kept.
pub fn strip_query(url: &Url) -> Url {
    let mut stripped = url.clone();
    stripped.set_query(None);
    stripped.set_fragment(None);
    stripped
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerificationOutcome {
    Confirmed,
    Declined,
    Cancelled,
    TimedOut,
    ConnectionError,
}

impl VerificationOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, VerificationOutcome::Confirmed)
    }

    pub fn failure_message(&self) -> Option<&'static str> {
        match self {
            VerificationOutcome::Confirmed => None,
            VerificationOutcome::Declined => Some(DECLINED_MESSAGE),
            VerificationOutcome::Cancelled => Some(CANCELLED_MESSAGE),
            VerificationOutcome::TimedOut => Some(TIMED_OUT_MESSAGE),
            VerificationOutcome::ConnectionError => Some(CONNECTION_ERROR_MESSAGE),
        }
    }

    // Status implied by the outcome; timeouts leave the last observed one
    pub fn final_status(&self) -> Option<BookingStatus> {
        match self {
            VerificationOutcome::Confirmed => Some(BookingStatus::Confirmed),
            VerificationOutcome::Declined => Some(BookingStatus::PaymentFailed),
            VerificationOutcome::Cancelled => Some(BookingStatus::Cancelled),
            VerificationOutcome::TimedOut | VerificationOutcome::ConnectionError => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollDecision {
    Continue,
    Finish(VerificationOutcome),
}

/// Classifies one status read. `attempt` is 1-based; once it reaches
/// `max_attempts` a non-terminal status ends the session as a timeout.
///
/// Statuses other than the three terminal ones are treated like
/// `AWAITING_PAYMENT`, which keeps polling even for values the backend
/// should never send.
pub fn classify_status(status: &BookingStatus, attempt: u32, max_attempts: u32) -> PollDecision {
    match status {
        BookingStatus::Confirmed => PollDecision::Finish(VerificationOutcome::Confirmed),
        BookingStatus::PaymentFailed => PollDecision::Finish(VerificationOutcome::Declined),
        BookingStatus::Cancelled => PollDecision::Finish(VerificationOutcome::Cancelled),
        BookingStatus::AwaitingPayment | BookingStatus::Unknown(_) => {
            if attempt < max_attempts {
                PollDecision::Continue
            } else {
                PollDecision::Finish(VerificationOutcome::TimedOut)
            }
        }
    }
}

/// A failed status read is retried while attempts remain.
pub fn classify_error(attempt: u32, max_attempts: u32) -> PollDecision {
    if attempt < max_attempts {
        PollDecision::Continue
    } else {
        PollDecision::Finish(VerificationOutcome::ConnectionError)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PollStep {
    pub attempt: u32,
    pub status: Option<BookingStatus>,
    pub decision: PollDecision,
}

#[derive(Debug, Clone, PartialEq)]
pub struct VerificationReport {
    pub booking_id: BookingId,
    pub outcome: VerificationOutcome,
    pub attempts: u32,
    pub last_status: Option<BookingStatus>,
}

/// One verification session. Each `poll_once` spends one attempt; `run`
/// drives the whole session, sleeping `interval` between attempts.
#[derive(Debug)]
pub struct PaymentVerifier {
    booking_id: BookingId,
    config: PollConfig,
    attempts: u32,
    last_status: Option<BookingStatus>,
    outcome: Option<VerificationOutcome>,
}

impl PaymentVerifier {
    pub fn new(booking_id: BookingId, config: PollConfig) -> Self {
        Self {
            booking_id,
            // a zero budget would never poll at all
            config: PollConfig {
                max_attempts: config.max_attempts.max(1),
                ..config
            },
            attempts: 0,
            last_status: None,
            outcome: None,
        }
    }

    pub fn booking_id(&self) -> &BookingId {
        &self.booking_id
    }

    pub fn config(&self) -> PollConfig {
        self.config
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn outcome(&self) -> Option<VerificationOutcome> {
        self.outcome
    }

    pub async fn poll_once<A: BookingApi + ?Sized>(&mut self, api: &A) -> PollStep {
        if let Some(outcome) = self.outcome {
            return PollStep {
                attempt: self.attempts,
                status: self.last_status.clone(),
                decision: PollDecision::Finish(outcome),
            };
        }

        self.attempts += 1;
        let attempt = self.attempts;
        let max_attempts = self.config.max_attempts;

        let (status, decision) = match api.get_booking_status(&self.booking_id).await {
            Ok(response) => {
                let status = response.status;
                if let BookingStatus::Unknown(raw) = &status {
                    warn!(booking_id = %self.booking_id, attempt, status = %raw, "unexpected booking status, polling on");
                } else {
                    debug!(booking_id = %self.booking_id, attempt, status = %status, "poll result");
                }
                let decision = classify_status(&status, attempt, max_attempts);
                self.last_status = Some(status.clone());
                (Some(status), decision)
            }
            Err(e) => {
                warn!(booking_id = %self.booking_id, attempt, error = %e, "polling error");
                (None, classify_error(attempt, max_attempts))
            }
        };

        if let PollDecision::Finish(outcome) = decision {
            self.outcome = Some(outcome);
        }

        PollStep {
            attempt,
            status,
            decision,
        }
    }

    pub async fn run<A: BookingApi + ?Sized>(mut self, api: &A) -> VerificationReport {
        info!(booking_id = %self.booking_id, "verifying payment");
        let outcome = loop {
            match self.poll_once(api).await.decision {
                PollDecision::Continue => tokio::time::sleep(self.config.interval).await,
                PollDecision::Finish(outcome) => break outcome,
            }
        };
        self.into_report(outcome)
    }

    pub fn into_report(self, outcome: VerificationOutcome) -> VerificationReport {
        info!(
            booking_id = %self.booking_id,
            attempts = self.attempts,
            outcome = ?outcome,
            "payment verification finished"
        );
        VerificationReport {
            booking_id: self.booking_id,
            outcome,
            attempts: self.attempts,
            last_status: self.last_status,
        }
    }
}
