// Booking flow controller: owns the session state, performs the remote calls,
// applies transitions and notifies the view after each one.

use crate::api::BookingApi;
use crate::flow::{transition, FlowError, FlowEvent, FlowState, Step};
use crate::models::{BookingDraft, GuestDetails};
use crate::render::BookingView;
use crate::validation::{validate_guest_details, validate_search, SearchForm};
use crate::verification::{
    strip_query, PaymentReturn, PaymentVerifier, PollConfig, PollDecision, VerificationReport,
};
use chrono::NaiveDate;
use reqwest::Url;
use tracing::{debug, info, warn};

pub fn local_today() -> NaiveDate {
    chrono::Local::now().date_naive()
}

pub struct BookingController<A, V> {
    api: A,
    view: V,
    state: FlowState,
    location: Url,
    poll_config: PollConfig,
    today: fn() -> NaiveDate,
    verification_started: bool,
}

impl<A: BookingApi, V: BookingView> BookingController<A, V> {
    pub fn new(api: A, view: V, location: Url) -> Self {
        Self {
            api,
            view,
            state: FlowState::default(),
            location,
            poll_config: PollConfig::default(),
            today: local_today,
            verification_started: false,
        }
    }

    pub fn with_poll_config(mut self, poll_config: PollConfig) -> Self {
        self.poll_config = poll_config;
        self
    }

    pub fn with_clock(mut self, today: fn() -> NaiveDate) -> Self {
        self.today = today;
        self
    }

    pub fn state(&self) -> &FlowState {
        &self.state
    }

    pub fn api(&self) -> &A {
        &self.api
    }

    pub fn view(&self) -> &V {
        &self.view
    }

    pub fn location(&self) -> &Url {
        &self.location
    }

    pub fn today(&self) -> NaiveDate {
        (self.today)()
    }

    // Form prefilled with today / tomorrow
    pub fn search_form(&self) -> SearchForm {
        SearchForm::with_defaults(self.today())
    }

    // Initial paint of the search screen
    pub fn start(&mut self) {
        self.view.render(&self.state);
    }

    fn apply(&mut self, event: FlowEvent) -> Result<(), FlowError> {
        let event_name = event.name();
        let next = transition(&self.state, event).map_err(|e| {
            warn!(step = ?self.state.step, event = event_name, error = %e, "transition rejected");
            e
        })?;

        if next.step != self.state.step {
            info!(from = ?self.state.step, to = ?next.step, event = event_name, "step change");
        } else {
            debug!(step = ?next.step, event = event_name, "state updated");
        }
        self.state = next;
        self.view.render(&self.state);
        Ok(())
    }

    fn expect_step(&self, step: Step, event: &'static str) -> Result<(), FlowError> {
        if self.state.step != step {
            return Err(FlowError::InvalidTransition {
                step: self.state.step,
                event,
            });
        }
        Ok(())
    }

    pub async fn search(&mut self, form: &SearchForm) -> Result<(), FlowError> {
        self.expect_step(Step::Search, "search")?;

        let criteria = match validate_search(form, self.today()) {
            Ok(criteria) => criteria,
            Err(error) => {
                debug!(error = %error, "search rejected");
                return self.apply(FlowEvent::SearchRejected(error));
            }
        };

        self.view.set_loading(true);
        let result = self
            .api
            .check_availability(criteria.check_in, criteria.check_out, criteria.guests)
            .await;
        self.view.set_loading(false);

        match result {
            Ok(rooms) => {
                info!(rooms = rooms.len(), nights = criteria.nights(), "availability loaded");
                self.apply(FlowEvent::RoomsLoaded { criteria, rooms })
            }
            Err(e) => self.apply(FlowEvent::SearchFailed(e.to_string())),
        }
    }

    pub fn select_room(&mut self, room_id: &str) -> Result<(), FlowError> {
        self.apply(FlowEvent::RoomChosen(room_id.to_string()))
    }

    pub async fn confirm_booking(&mut self, guest_details: GuestDetails) -> Result<(), FlowError> {
        self.expect_step(Step::GuestDetails, "confirm_booking")?;

        if let Err(error) = validate_guest_details(&guest_details) {
            return self.apply(FlowEvent::GuestDetailsRejected(error));
        }

        let (Some(criteria), Some(room)) = (&self.state.criteria, &self.state.selected_room)
        else {
            return Err(FlowError::InvalidTransition {
                step: self.state.step,
                event: "confirm_booking",
            });
        };
        let draft = BookingDraft {
            criteria: criteria.clone(),
            selected_room: room.clone(),
            guest_details,
        };

        self.view.set_loading(true);
        let result = self.api.initiate_booking(&draft).await;
        self.view.set_loading(false);

        match result {
            Ok(confirmation) => {
                info!(booking_id = %confirmation.booking_id, "booking initiated");
                self.apply(FlowEvent::BookingInitiated(confirmation))
            }
            Err(e) => self.apply(FlowEvent::BookingFailed(e.to_string())),
        }
    }

    /// Runs payment verification if the current location is a payment-provider
    /// return. Returns `Ok(None)` when there is nothing to verify or a session
    /// already ran for this controller.
    pub async fn init_payment_verification(
        &mut self,
    ) -> Result<Option<VerificationReport>, FlowError> {
        if self.verification_started {
            debug!("payment verification already ran");
            return Ok(None);
        }
        let Some(payment_return) = PaymentReturn::from_url(&self.location) else {
            return Ok(None);
        };

        info!(
            booking_id = %payment_return.booking_id,
            status = ?payment_return.status,
            tx_ref = ?payment_return.tx_ref,
            "returning from payment provider"
        );
        self.apply(FlowEvent::PaymentReturnDetected(
            payment_return.booking_id.clone(),
        ))?;
        self.verification_started = true;

        let mut verifier = PaymentVerifier::new(payment_return.booking_id, self.poll_config);
        let outcome = loop {
            let step = verifier.poll_once(&self.api).await;
            if let Some(status) = step.status {
                self.apply(FlowEvent::StatusObserved(status))?;
            }
            match step.decision {
                PollDecision::Continue => tokio::time::sleep(verifier.config().interval).await,
                PollDecision::Finish(outcome) => break outcome,
            }
        };

        self.apply(FlowEvent::VerificationFinished(outcome))?;
        self.location = strip_query(&self.location);
        self.view.replace_location(&self.location);

        Ok(Some(verifier.into_report(outcome)))
    }

    pub fn restart(&mut self) -> Result<(), FlowError> {
        self.apply(FlowEvent::Restart)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::mock_api::ScriptedApi;
    use crate::api::{ApiError, Operation};
    use crate::flow::{BOOKING_FAILED_TITLE, PAYMENT_FAILED_TITLE, SEARCH_FAILED_TITLE};
    use crate::models::{
        BookingConfirmation, BookingId, BookingStatus, BookingStatusResponse, RoomOffer,
    };
    use crate::render::{room_list, RoomList, HERITAGE_ROOM_IMAGE};
    use crate::validation::ValidationError;
    use crate::verification::{VerificationOutcome, TIMED_OUT_MESSAGE};
    use std::sync::Arc;

    // Records every render call
    #[derive(Default)]
    struct RecordingView {
        renders: Vec<FlowState>,
        loading: Vec<bool>,
        locations: Vec<Url>,
    }

    impl BookingView for RecordingView {
        fn render(&mut self, state: &FlowState) {
            self.renders.push(state.clone());
        }

        fn set_loading(&mut self, loading: bool) {
            self.loading.push(loading);
        }

        fn replace_location(&mut self, url: &Url) {
            self.locations.push(url.clone());
        }
    }

    fn fixed_today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, 16).unwrap()
    }

    fn controller(
        api: &Arc<ScriptedApi>,
        location: &str,
    ) -> BookingController<Arc<ScriptedApi>, RecordingView> {
        BookingController::new(
            Arc::clone(api),
            RecordingView::default(),
            Url::parse(location).unwrap(),
        )
        .with_clock(fixed_today)
    }

    fn form(check_in: &str, check_out: &str, guests: &str) -> SearchForm {
        SearchForm {
            check_in: check_in.to_string(),
            check_out: check_out.to_string(),
            guests: guests.to_string(),
        }
    }

    fn heritage_suite() -> RoomOffer {
        RoomOffer {
            id: "heritage-suite".to_string(),
            name: "Heritage Suite".to_string(),
            description: None,
            total_price: 150.0,
        }
    }

    fn guest() -> GuestDetails {
        GuestDetails {
            first_name: "Ada".to_string(),
            last_name: "Lovelace".to_string(),
            email: "ada@example.com".to_string(),
            phone: String::new(),
        }
    }

    fn awaiting() -> Result<BookingStatusResponse, ApiError> {
        Ok(BookingStatusResponse {
            status: BookingStatus::AwaitingPayment,
        })
    }

    #[tokio::test]
    async fn test_search_reaches_select_room_with_heritage_card() {
        let api = ScriptedApi::new();
        api.push_availability(Ok(vec![heritage_suite()]));
        let mut c = controller(&api, "https://hotel.example/book.html");

        c.search(&form("2099-01-01", "2099-01-03", "2")).await.unwrap();

        assert_eq!(c.state().step, Step::SelectRoom);
        let RoomList::Cards(cards) = room_list(&c.state().available_rooms) else {
            panic!("expected one card");
        };
        assert_eq!(cards.len(), 1);
        assert_eq!(cards[0].image, HERITAGE_ROOM_IMAGE);
        assert_eq!(cards[0].price, "$150");
        assert_eq!(c.view().loading, vec![true, false]);
    }

    #[tokio::test]
    async fn test_invalid_search_skips_the_network() {
        let api = ScriptedApi::new();
        let mut c = controller(&api, "https://hotel.example/book.html");

        c.search(&form("2026-10-15", "2026-10-18", "2")).await.unwrap();

        assert_eq!(c.state().step, Step::Search);
        assert_eq!(c.state().inline_error, Some(ValidationError::CheckInInPast));
        assert_eq!(api.calls(Operation::CheckAvailability), 0);
        assert!(c.view().loading.is_empty());
    }

    #[tokio::test]
    async fn test_search_failure_shows_error_step() {
        let api = ScriptedApi::new();
        api.push_availability(Err(ApiError::Network(
            "Network error. Please check your connection.".to_string(),
        )));
        let mut c = controller(&api, "https://hotel.example/book.html");

        let defaults = c.search_form();
        c.search(&defaults).await.unwrap();

        let failure = c.state().failure.clone().unwrap();
        assert_eq!(c.state().step, Step::Error);
        assert_eq!(failure.title, SEARCH_FAILED_TITLE);
        assert_eq!(failure.message, "Network error. Please check your connection.");
        assert_eq!(c.view().loading, vec![true, false]);

        c.restart().unwrap();
        assert_eq!(c.state().step, Step::Search);
    }

    #[tokio::test]
    async fn test_booking_reaches_payment() {
        let api = ScriptedApi::new();
        api.push_availability(Ok(vec![heritage_suite()]));
        api.push_booking(Ok(BookingConfirmation {
            booking_id: BookingId::new("bk_1"),
            payment_link: "https://pay.example.com/bk_1".to_string(),
        }));
        let mut c = controller(&api, "https://hotel.example/book.html");

        c.search(&form("2099-01-01", "2099-01-03", "2")).await.unwrap();
        c.select_room("heritage-suite").unwrap();
        assert_eq!(c.state().step, Step::GuestDetails);

        c.confirm_booking(guest()).await.unwrap();

        assert_eq!(c.state().step, Step::Payment);
        let booking = c.state().booking.clone().unwrap();
        assert_eq!(booking.booking_id.as_str(), "bk_1");
        assert_eq!(booking.payment_link.as_deref(), Some("https://pay.example.com/bk_1"));

        let drafts = api.drafts();
        assert_eq!(drafts.len(), 1);
        assert_eq!(drafts[0].to_request().room_type_id, "heritage-suite");
    }

    #[tokio::test]
    async fn test_missing_guest_fields_do_not_book() {
        let api = ScriptedApi::new();
        api.push_availability(Ok(vec![heritage_suite()]));
        let mut c = controller(&api, "https://hotel.example/book.html");
        c.search(&form("2099-01-01", "2099-01-03", "2")).await.unwrap();
        c.select_room("heritage-suite").unwrap();

        let mut details = guest();
        details.email.clear();
        c.confirm_booking(details).await.unwrap();

        assert_eq!(c.state().step, Step::GuestDetails);
        assert_eq!(
            c.state().inline_error,
            Some(ValidationError::MissingGuestDetails)
        );
        assert_eq!(api.calls(Operation::InitiateBooking), 0);
    }

    #[tokio::test]
    async fn test_booking_failure_shows_server_message() {
        let api = ScriptedApi::new();
        api.push_availability(Ok(vec![heritage_suite()]));
        api.push_booking(Err(ApiError::Server {
            status_code: 409,
            message: "Room no longer available".to_string(),
        }));
        let mut c = controller(&api, "https://hotel.example/book.html");
        c.search(&form("2099-01-01", "2099-01-03", "2")).await.unwrap();
        c.select_room("heritage-suite").unwrap();

        c.confirm_booking(guest()).await.unwrap();

        let failure = c.state().failure.clone().unwrap();
        assert_eq!(failure.title, BOOKING_FAILED_TITLE);
        assert_eq!(failure.message, "Room no longer available");
    }

    #[tokio::test]
    async fn test_unknown_room_keeps_state() {
        let api = ScriptedApi::new();
        api.push_availability(Ok(vec![heritage_suite()]));
        let mut c = controller(&api, "https://hotel.example/book.html");
        c.search(&form("2099-01-01", "2099-01-03", "2")).await.unwrap();

        assert!(c.select_room("penthouse").is_err());
        assert_eq!(c.state().step, Step::SelectRoom);
    }

    #[tokio::test]
    async fn test_plain_page_load_does_not_verify() {
        let api = ScriptedApi::new();
        let mut c = controller(&api, "https://hotel.example/book.html?booking_id=12");

        assert_eq!(c.init_payment_verification().await.unwrap(), None);
        assert_eq!(c.state().step, Step::Search);
        assert_eq!(api.status_calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_verification_success_clears_query() {
        let api = ScriptedApi::new();
        for _ in 0..9 {
            api.push_status(awaiting());
        }
        api.push_status(Ok(BookingStatusResponse {
            status: BookingStatus::Confirmed,
        }));
        let mut c = controller(
            &api,
            "https://hotel.example/book.html?booking_id=bk_9&status=successful&tx_ref=TX-9",
        );

        let report = c.init_payment_verification().await.unwrap().unwrap();

        assert_eq!(report.outcome, VerificationOutcome::Confirmed);
        assert_eq!(api.status_calls(), 10);
        assert_eq!(c.state().step, Step::Success);
        assert_eq!(
            c.state().booking.as_ref().unwrap().status,
            BookingStatus::Confirmed
        );
        assert_eq!(c.location().as_str(), "https://hotel.example/book.html");
        assert_eq!(c.view().locations.len(), 1);

        // the first render after detection is the verifying screen
        assert_eq!(c.view().renders[0].step, Step::Verifying);
    }

    #[tokio::test(start_paused = true)]
    async fn test_verification_timeout_ends_in_error() {
        let api = ScriptedApi::new();
        let mut c = controller(&api, "https://hotel.example/book.html?booking_id=bk_9&tx_ref=TX-9");

        let report = c.init_payment_verification().await.unwrap().unwrap();

        assert_eq!(report.outcome, VerificationOutcome::TimedOut);
        assert_eq!(api.status_calls(), 10);
        let failure = c.state().failure.clone().unwrap();
        assert_eq!(failure.title, PAYMENT_FAILED_TITLE);
        assert_eq!(failure.message, TIMED_OUT_MESSAGE);
        assert!(c.location().query().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_verification_runs_once() {
        let api = ScriptedApi::new();
        api.push_status(Ok(BookingStatusResponse {
            status: BookingStatus::Cancelled,
        }));
        let mut c = controller(&api, "https://hotel.example/book.html?booking_id=bk_9&status=cancelled");

        let first = c.init_payment_verification().await.unwrap().unwrap();
        assert_eq!(first.outcome, VerificationOutcome::Cancelled);
        assert_eq!(c.state().step, Step::Error);

        assert_eq!(c.init_payment_verification().await.unwrap(), None);
        assert_eq!(api.status_calls(), 1);

        // a fresh controller on the stripped location has nothing to verify
        let mut reloaded = controller(&api, c.location().as_str());
        assert_eq!(reloaded.init_payment_verification().await.unwrap(), None);
        assert_eq!(api.status_calls(), 1);
    }
}
