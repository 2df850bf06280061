// Local validation of the search form and the guest-details form.
// Failures are shown inline and never advance the flow.

use crate::models::{GuestDetails, SearchCriteria};
use chrono::{Days, NaiveDate};
use thiserror::Error;

pub const DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Please select both check-in and check-out dates.")]
    MissingDates,

    #[error("Please enter dates in YYYY-MM-DD format.")]
    InvalidDate(String),

    #[error("Check-in date cannot be in the past.")]
    CheckInInPast,

    #[error("Check-out date must be after check-in date.")]
    CheckOutNotAfterCheckIn,

    #[error("Please select at least one guest.")]
    InvalidGuests,

    #[error("Please fill in required fields.")]
    MissingGuestDetails,
}

// Raw values as typed into the search form
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchForm {
    pub check_in: String,
    pub check_out: String,
    pub guests: String,
}

impl SearchForm {
    // Check-in today, check-out tomorrow, two guests
    pub fn with_defaults(today: NaiveDate) -> Self {
        Self {
            check_in: today.format(DATE_FORMAT).to_string(),
            check_out: min_check_out(today).format(DATE_FORMAT).to_string(),
            guests: "2".to_string(),
        }
    }
}

pub fn min_check_in(today: NaiveDate) -> NaiveDate {
    today
}

pub fn min_check_out(today: NaiveDate) -> NaiveDate {
    today.checked_add_days(Days::new(1)).unwrap_or(NaiveDate::MAX)
}

fn parse_date(raw: &str) -> Result<NaiveDate, ValidationError> {
    NaiveDate::parse_from_str(raw, DATE_FORMAT)
        .map_err(|_| ValidationError::InvalidDate(raw.to_string()))
}

// Dates are compared as calendar days; `today` carries no time component
pub fn validate_search(
    form: &SearchForm,
    today: NaiveDate,
) -> Result<SearchCriteria, ValidationError> {
    let check_in = form.check_in.trim();
    let check_out = form.check_out.trim();
    if check_in.is_empty() || check_out.is_empty() {
        return Err(ValidationError::MissingDates);
    }

    let check_in = parse_date(check_in)?;
    let check_out = parse_date(check_out)?;

    if check_in < today {
        return Err(ValidationError::CheckInInPast);
    }
    if check_in >= check_out {
        return Err(ValidationError::CheckOutNotAfterCheckIn);
    }

    let guests = form
        .guests
        .trim()
        .parse::<u32>()
        .ok()
        .filter(|g| *g >= 1)
        .ok_or(ValidationError::InvalidGuests)?;

    Ok(SearchCriteria {
        check_in,
        check_out,
        guests,
    })
}

// Presence only: first name, last name and email. Phone is optional.
pub fn validate_guest_details(details: &GuestDetails) -> Result<(), ValidationError> {
    let required = [&details.first_name, &details.last_name, &details.email];
    if required.iter().any(|field| field.trim().is_empty()) {
        return Err(ValidationError::MissingGuestDetails);
    }
    Ok(())
}
