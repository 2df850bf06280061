// Boutique hotel booking flow: search, room selection, guest details,
// payment hand-off and payment-return verification.

pub mod api;
pub mod config;
pub mod controller;
pub mod flow;
pub mod models;
pub mod render;
pub mod validation;
pub mod verification;

// Re-export key types for convenience
pub use api::{
    ApiError, BookingApi, ClientConfig, ClientError, ClientStats, HttpBookingApi, Operation,
};
pub use config::AppConfig;
pub use controller::{local_today, BookingController};
pub use flow::{transition, Failure, FlowError, FlowEvent, FlowState, Step};
pub use models::{
    BookingDraft, BookingId, BookingRecord, BookingStatus, GuestDetails, RoomOffer,
    SearchCriteria,
};
pub use render::{room_list, BookingView, RoomCard, RoomList, TerminalView};
pub use validation::{
    min_check_in, min_check_out, validate_guest_details, validate_search, SearchForm,
    ValidationError,
};
pub use verification::{
    PaymentReturn, PaymentVerifier, PollConfig, VerificationOutcome, VerificationReport,
};
