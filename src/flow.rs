// Booking wizard state machine. `transition` is pure: it takes the current
// state and an event and returns the next state, leaving I/O to the controller.

use crate::models::{
    BookingConfirmation, BookingId, BookingRecord, BookingStatus, RoomOffer, SearchCriteria,
};
use crate::validation::ValidationError;
use crate::verification::VerificationOutcome;
use thiserror::Error;

pub const PROGRESS_STEPS: u8 = 4;

pub const SEARCH_FAILED_TITLE: &str = "Availability Search Failed";
pub const BOOKING_FAILED_TITLE: &str = "Booking Failed";
pub const PAYMENT_FAILED_TITLE: &str = "Payment Failed";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Step {
    Search,
    SelectRoom,
    GuestDetails,
    Payment,
    Verifying,
    Success,
    Error,
}

impl Step {
    // Numbered wizard screens; verifying and error screens have no number
    pub fn number(&self) -> Option<u8> {
        match self {
            Step::Search => Some(1),
            Step::SelectRoom => Some(2),
            Step::GuestDetails => Some(3),
            Step::Payment => Some(4),
            Step::Success => Some(5),
            Step::Verifying | Step::Error => None,
        }
    }

    // Highest progress-bar marker lit for this step (markers 1..=4)
    pub fn progress_index(&self) -> u8 {
        match self {
            Step::Search | Step::Error => 1,
            Step::SelectRoom => 2,
            Step::GuestDetails => 3,
            Step::Payment | Step::Verifying | Step::Success => PROGRESS_STEPS,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Step::Success | Step::Error)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Failure {
    pub title: String,
    pub message: String,
}

impl Failure {
    pub fn new(title: &str, message: impl Into<String>) -> Self {
        Self {
            title: title.to_string(),
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FlowState {
    pub step: Step,
    pub criteria: Option<SearchCriteria>,
    pub available_rooms: Vec<RoomOffer>,
    pub selected_room: Option<RoomOffer>,
    pub booking: Option<BookingRecord>,
    pub inline_error: Option<ValidationError>,
    pub failure: Option<Failure>,
}

impl Default for FlowState {
    fn default() -> Self {
        Self {
            step: Step::Search,
            criteria: None,
            available_rooms: Vec::new(),
            selected_room: None,
            booking: None,
            inline_error: None,
            failure: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum FlowEvent {
    SearchRejected(ValidationError),
    RoomsLoaded {
        criteria: SearchCriteria,
        rooms: Vec<RoomOffer>,
    },
    SearchFailed(String),
    RoomChosen(String),
    GuestDetailsRejected(ValidationError),
    BookingInitiated(BookingConfirmation),
    BookingFailed(String),
    PaymentReturnDetected(BookingId),
    StatusObserved(BookingStatus),
    VerificationFinished(VerificationOutcome),
    Restart,
}

impl FlowEvent {
    pub fn name(&self) -> &'static str {
        match self {
            FlowEvent::SearchRejected(_) => "search_rejected",
            FlowEvent::RoomsLoaded { .. } => "rooms_loaded",
            FlowEvent::SearchFailed(_) => "search_failed",
            FlowEvent::RoomChosen(_) => "room_chosen",
            FlowEvent::GuestDetailsRejected(_) => "guest_details_rejected",
            FlowEvent::BookingInitiated(_) => "booking_initiated",
            FlowEvent::BookingFailed(_) => "booking_failed",
            FlowEvent::PaymentReturnDetected(_) => "payment_return_detected",
            FlowEvent::StatusObserved(_) => "status_observed",
            FlowEvent::VerificationFinished(_) => "verification_finished",
            FlowEvent::Restart => "restart",
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FlowError {
    #[error("event '{event}' is not valid in step {step:?}")]
    InvalidTransition { step: Step, event: &'static str },

    #[error("room '{0}' is not in the current availability list")]
    UnknownRoom(String),
}

pub fn transition(state: &FlowState, event: FlowEvent) -> Result<FlowState, FlowError> {
    let invalid = |event: &FlowEvent| FlowError::InvalidTransition {
        step: state.step,
        event: event.name(),
    };

    let mut next = state.clone();
    match (state.step, event) {
        (Step::Search, FlowEvent::SearchRejected(error)) => {
            next.inline_error = Some(error);
        }
        (Step::Search, FlowEvent::RoomsLoaded { criteria, rooms }) => {
            next.step = Step::SelectRoom;
            next.criteria = Some(criteria);
            next.available_rooms = rooms;
            next.selected_room = None;
            next.inline_error = None;
        }
        (Step::Search, FlowEvent::SearchFailed(message)) => {
            next.step = Step::Error;
            next.inline_error = None;
            next.failure = Some(Failure::new(SEARCH_FAILED_TITLE, message));
        }
        (Step::SelectRoom, FlowEvent::RoomChosen(room_id)) => {
            let Some(room) = state.available_rooms.iter().find(|r| r.id == room_id).cloned()
            else {
                return Err(FlowError::UnknownRoom(room_id));
            };
            next.step = Step::GuestDetails;
            next.selected_room = Some(room);
        }
        (Step::GuestDetails, FlowEvent::GuestDetailsRejected(error)) => {
            next.inline_error = Some(error);
        }
        (Step::GuestDetails, FlowEvent::BookingInitiated(confirmation)) => {
            next.step = Step::Payment;
            next.inline_error = None;
            next.booking = Some(BookingRecord::awaiting_payment(confirmation));
        }
        (Step::GuestDetails, FlowEvent::BookingFailed(message)) => {
            next.step = Step::Error;
            next.inline_error = None;
            next.failure = Some(Failure::new(BOOKING_FAILED_TITLE, message));
        }
        (Step::Search, FlowEvent::PaymentReturnDetected(booking_id)) => {
            next.step = Step::Verifying;
            next.booking = Some(BookingRecord::recovered(booking_id));
        }
        (Step::Verifying, FlowEvent::StatusObserved(status)) => {
            if let Some(booking) = next.booking.as_mut() {
                booking.status = status;
            }
        }
        (Step::Verifying, FlowEvent::VerificationFinished(outcome)) => {
            if let (Some(booking), Some(status)) = (next.booking.as_mut(), outcome.final_status())
            {
                booking.status = status;
            }
            match outcome.failure_message() {
                None => next.step = Step::Success,
                Some(message) => {
                    next.step = Step::Error;
                    next.failure = Some(Failure::new(PAYMENT_FAILED_TITLE, message));
                }
            }
        }
        (step, FlowEvent::Restart) if step != Step::Verifying => {
            next = FlowState::default();
        }
        (_, event) => return Err(invalid(&event)),
    }

    Ok(next)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn criteria() -> SearchCriteria {
        SearchCriteria {
            check_in: NaiveDate::from_ymd_opt(2099, 1, 1).unwrap(),
            check_out: NaiveDate::from_ymd_opt(2099, 1, 3).unwrap(),
            guests: 2,
        }
    }

    fn room(id: &str, price: f64) -> RoomOffer {
        RoomOffer {
            id: id.to_string(),
            name: id.replace('-', " "),
            description: None,
            total_price: price,
        }
    }

    fn at_guest_details() -> FlowState {
        let state = transition(
            &FlowState::default(),
            FlowEvent::RoomsLoaded {
                criteria: criteria(),
                rooms: vec![room("heritage-suite", 150.0), room("garden-double", 90.0)],
            },
        )
        .unwrap();
        transition(&state, FlowEvent::RoomChosen("garden-double".to_string())).unwrap()
    }

    #[test]
    fn test_happy_path_reaches_payment() {
        let state = at_guest_details();
        assert_eq!(state.step, Step::GuestDetails);
        assert_eq!(state.selected_room.as_ref().unwrap().total_price, 90.0);

        let state = transition(
            &state,
            FlowEvent::BookingInitiated(BookingConfirmation {
                booking_id: BookingId::new("bk_1"),
                payment_link: "https://pay.example.com/bk_1".to_string(),
            }),
        )
        .unwrap();

        assert_eq!(state.step, Step::Payment);
        let booking = state.booking.unwrap();
        assert_eq!(booking.status, BookingStatus::AwaitingPayment);
        assert_eq!(booking.payment_link.as_deref(), Some("https://pay.example.com/bk_1"));
    }

    #[test]
    fn test_search_rejection_stays_on_search() {
        let state = transition(
            &FlowState::default(),
            FlowEvent::SearchRejected(ValidationError::CheckInInPast),
        )
        .unwrap();
        assert_eq!(state.step, Step::Search);
        assert_eq!(state.inline_error, Some(ValidationError::CheckInInPast));

        // a later successful search clears the inline error
        let state = transition(
            &state,
            FlowEvent::RoomsLoaded {
                criteria: criteria(),
                rooms: vec![],
            },
        )
        .unwrap();
        assert_eq!(state.step, Step::SelectRoom);
        assert_eq!(state.inline_error, None);
    }

    #[test]
    fn test_failures_carry_titles() {
        let state = transition(
            &FlowState::default(),
            FlowEvent::SearchFailed("Network error. Please check your connection.".to_string()),
        )
        .unwrap();
        assert_eq!(state.step, Step::Error);
        assert_eq!(state.failure.as_ref().unwrap().title, SEARCH_FAILED_TITLE);

        let state = transition(
            &at_guest_details(),
            FlowEvent::BookingFailed("Room no longer available".to_string()),
        )
        .unwrap();
        assert_eq!(
            state.failure,
            Some(Failure::new(BOOKING_FAILED_TITLE, "Room no longer available"))
        );
    }

    #[test]
    fn test_unknown_room_is_rejected_without_change() {
        let state = transition(
            &FlowState::default(),
            FlowEvent::RoomsLoaded {
                criteria: criteria(),
                rooms: vec![room("heritage-suite", 150.0)],
            },
        )
        .unwrap();

        let err = transition(&state, FlowEvent::RoomChosen("penthouse".to_string())).unwrap_err();
        assert_eq!(err, FlowError::UnknownRoom("penthouse".to_string()));
    }

    #[test]
    fn test_verification_outcomes() {
        let verifying = transition(
            &FlowState::default(),
            FlowEvent::PaymentReturnDetected(BookingId::new("bk_7")),
        )
        .unwrap();
        assert_eq!(verifying.step, Step::Verifying);

        let success = transition(
            &verifying,
            FlowEvent::VerificationFinished(VerificationOutcome::Confirmed),
        )
        .unwrap();
        assert_eq!(success.step, Step::Success);
        assert_eq!(success.booking.unwrap().status, BookingStatus::Confirmed);

        let cancelled = transition(
            &verifying,
            FlowEvent::VerificationFinished(VerificationOutcome::Cancelled),
        )
        .unwrap();
        assert_eq!(cancelled.step, Step::Error);
        assert_eq!(cancelled.failure.unwrap().message, "Payment was cancelled.");
        assert_eq!(cancelled.booking.unwrap().status, BookingStatus::Cancelled);

        let observed = transition(
            &verifying,
            FlowEvent::StatusObserved(BookingStatus::Unknown("HELD".to_string())),
        )
        .unwrap();
        let timed_out = transition(
            &observed,
            FlowEvent::VerificationFinished(VerificationOutcome::TimedOut),
        )
        .unwrap();
        assert_eq!(timed_out.step, Step::Error);
        assert_eq!(
            timed_out.booking.unwrap().status,
            BookingStatus::Unknown("HELD".to_string())
        );
    }

    #[test]
    fn test_verifying_cannot_be_restarted_or_reentered() {
        let verifying = transition(
            &FlowState::default(),
            FlowEvent::PaymentReturnDetected(BookingId::new("bk_7")),
        )
        .unwrap();

        assert!(matches!(
            transition(&verifying, FlowEvent::Restart),
            Err(FlowError::InvalidTransition { step: Step::Verifying, .. })
        ));
        assert!(transition(
            &verifying,
            FlowEvent::PaymentReturnDetected(BookingId::new("bk_8"))
        )
        .is_err());
    }

    #[test]
    fn test_restart_from_error_returns_to_search() {
        let failed = transition(
            &FlowState::default(),
            FlowEvent::SearchFailed("Server Error (500)".to_string()),
        )
        .unwrap();
        let restarted = transition(&failed, FlowEvent::Restart).unwrap();
        assert_eq!(restarted, FlowState::default());
    }

    #[test]
    fn test_out_of_order_events_are_invalid() {
        let err = transition(
            &FlowState::default(),
            FlowEvent::RoomChosen("heritage-suite".to_string()),
        )
        .unwrap_err();
        assert_eq!(
            err,
            FlowError::InvalidTransition {
                step: Step::Search,
                event: "room_chosen"
            }
        );
    }

    #[test]
    fn test_progress_indices() {
        assert_eq!(Step::Search.progress_index(), 1);
        assert_eq!(Step::GuestDetails.progress_index(), 3);
        assert_eq!(Step::Success.progress_index(), PROGRESS_STEPS);
        assert_eq!(Step::Error.progress_index(), 1);
        assert_eq!(Step::Success.number(), Some(5));
        assert!(Step::Error.is_terminal() && !Step::Verifying.is_terminal());
    }
}
