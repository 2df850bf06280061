// Booking data model and the JSON shapes exchanged with the booking backend
use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

// Validated search held in session state until the next search
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchCriteria {
    pub check_in: NaiveDate,
    pub check_out: NaiveDate,
    pub guests: u32,
}

impl SearchCriteria {
    pub fn nights(&self) -> i64 {
        (self.check_out - self.check_in).num_days()
    }
}

// An available room type with the total price for the requested stay
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomOffer {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub total_price: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GuestDetails {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    #[serde(default)]
    pub phone: String,
}

// Room and guest chosen by the user, consumed by the initiate-booking call
#[derive(Debug, Clone, PartialEq)]
pub struct BookingDraft {
    pub criteria: SearchCriteria,
    pub selected_room: RoomOffer,
    pub guest_details: GuestDetails,
}

impl BookingDraft {
    pub fn to_request(&self) -> InitiateBookingRequest {
        InitiateBookingRequest {
            room_type_id: self.selected_room.id.clone(),
            check_in: self.criteria.check_in,
            check_out: self.criteria.check_out,
            guest_details: self.guest_details.clone(),
        }
    }
}

// Opaque booking identifier; the backend may send it as a string or a number
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct BookingId(String);

impl BookingId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BookingId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for BookingId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum RawId {
            Text(String),
            Signed(i64),
            Unsigned(u64),
        }

        Ok(match RawId::deserialize(deserializer)? {
            RawId::Text(s) => BookingId(s),
            RawId::Signed(n) => BookingId(n.to_string()),
            RawId::Unsigned(n) => BookingId(n.to_string()),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum BookingStatus {
    AwaitingPayment,
    Confirmed,
    PaymentFailed,
    Cancelled,
    Unknown(String),
}

impl BookingStatus {
    pub fn as_str(&self) -> &str {
        match self {
            BookingStatus::AwaitingPayment => "AWAITING_PAYMENT",
            BookingStatus::Confirmed => "CONFIRMED",
            BookingStatus::PaymentFailed => "PAYMENT_FAILED",
            BookingStatus::Cancelled => "CANCELLED",
            BookingStatus::Unknown(raw) => raw,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            BookingStatus::Confirmed | BookingStatus::PaymentFailed | BookingStatus::Cancelled
        )
    }
}

// A missing status field reads as an unknown (empty) status
impl Default for BookingStatus {
    fn default() -> Self {
        BookingStatus::Unknown(String::new())
    }
}

impl From<String> for BookingStatus {
    fn from(raw: String) -> Self {
        match raw.as_str() {
            "AWAITING_PAYMENT" => BookingStatus::AwaitingPayment,
            "CONFIRMED" => BookingStatus::Confirmed,
            "PAYMENT_FAILED" => BookingStatus::PaymentFailed,
            "CANCELLED" => BookingStatus::Cancelled,
            _ => BookingStatus::Unknown(raw),
        }
    }
}

impl From<BookingStatus> for String {
    fn from(status: BookingStatus) -> Self {
        status.as_str().to_string()
    }
}

impl fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// Booking as known to the client. The payment link is absent when the record
// was recovered from a payment-provider redirect.
#[derive(Debug, Clone, PartialEq)]
pub struct BookingRecord {
    pub booking_id: BookingId,
    pub payment_link: Option<String>,
    pub status: BookingStatus,
}

impl BookingRecord {
    pub fn awaiting_payment(confirmation: BookingConfirmation) -> Self {
        Self {
            booking_id: confirmation.booking_id,
            payment_link: Some(confirmation.payment_link),
            status: BookingStatus::AwaitingPayment,
        }
    }

    pub fn recovered(booking_id: BookingId) -> Self {
        Self {
            booking_id,
            payment_link: None,
            status: BookingStatus::AwaitingPayment,
        }
    }
}

// Wire shapes

#[derive(Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AvailabilityResponse {
    #[serde(default)]
    pub available_rooms: Vec<RoomOffer>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InitiateBookingRequest {
    pub room_type_id: String,
    pub check_in: NaiveDate,
    pub check_out: NaiveDate,
    pub guest_details: GuestDetails,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingConfirmation {
    pub booking_id: BookingId,
    pub payment_link: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct BookingStatusResponse {
    #[serde(default)]
    pub status: BookingStatus,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ErrorBody {
    pub message: Option<String>,
}
