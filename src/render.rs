// Rendering layer. Pure functions turn a FlowState into view models; a
// BookingView receives the state after every transition and draws it.

use crate::flow::{Failure, FlowState, Step, PROGRESS_STEPS};
use crate::models::{BookingId, RoomOffer};
use reqwest::Url;
use std::io::Write;
use tracing::warn;

pub const DEFAULT_ROOM_IMAGE: &str = "assets/images/room1.png";
pub const HERITAGE_ROOM_IMAGE: &str = "assets/images/room2.png";
pub const COURTYARD_ROOM_IMAGE: &str = "assets/images/room3.png";

pub const DEFAULT_ROOM_DESCRIPTION: &str = "A beautiful room.";
pub const NO_ROOMS_NOTICE: &str = "No rooms available.";
pub const EMPTY_SUMMARY_VALUE: &str = "-";

// First matching keyword wins
pub fn room_thumbnail(room_id: &str) -> &'static str {
    if room_id.contains("heritage") {
        HERITAGE_ROOM_IMAGE
    } else if room_id.contains("courtyard") {
        COURTYARD_ROOM_IMAGE
    } else {
        DEFAULT_ROOM_IMAGE
    }
}

// Whole amounts print without decimals: 150.0 -> "$150", 99.5 -> "$99.5"
pub fn format_price(amount: f64) -> String {
    format!("${}", amount)
}

#[derive(Debug, Clone, PartialEq)]
pub struct RoomCard {
    pub room_id: String,
    pub name: String,
    pub description: String,
    pub price: String,
    pub image: &'static str,
}

impl From<&RoomOffer> for RoomCard {
    fn from(room: &RoomOffer) -> Self {
        let description = room
            .description
            .as_deref()
            .filter(|d| !d.is_empty())
            .unwrap_or(DEFAULT_ROOM_DESCRIPTION);

        RoomCard {
            room_id: room.id.clone(),
            name: room.name.clone(),
            description: description.to_string(),
            price: format_price(room.total_price),
            image: room_thumbnail(&room.id),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum RoomList {
    NoRooms,
    Cards(Vec<RoomCard>),
}

impl RoomList {
    pub fn len(&self) -> usize {
        match self {
            RoomList::NoRooms => 0,
            RoomList::Cards(cards) => cards.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

pub fn room_list(rooms: &[RoomOffer]) -> RoomList {
    if rooms.is_empty() {
        return RoomList::NoRooms;
    }
    RoomList::Cards(rooms.iter().map(RoomCard::from).collect())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookingSummary {
    pub check_in: String,
    pub check_out: String,
    pub room_name: String,
    pub total: String,
}

pub fn booking_summary(state: &FlowState) -> BookingSummary {
    let (check_in, check_out) = match &state.criteria {
        Some(c) => (c.check_in.to_string(), c.check_out.to_string()),
        None => (String::new(), String::new()),
    };
    let (room_name, total) = match &state.selected_room {
        Some(room) => (room.name.clone(), format_price(room.total_price)),
        None => (
            EMPTY_SUMMARY_VALUE.to_string(),
            EMPTY_SUMMARY_VALUE.to_string(),
        ),
    };

    BookingSummary {
        check_in,
        check_out,
        room_name,
        total,
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentPanel {
    pub amount: String,
    pub pay_link: String,
}

pub fn payment_panel(state: &FlowState) -> Option<PaymentPanel> {
    let room = state.selected_room.as_ref()?;
    let link = state.booking.as_ref()?.payment_link.clone()?;
    Some(PaymentPanel {
        amount: format_price(room.total_price),
        pay_link: link,
    })
}

// Markers 1..=PROGRESS_STEPS, lit up to the step's progress index
pub fn progress_markers(step: Step) -> Vec<bool> {
    let active = step.progress_index();
    (1..=PROGRESS_STEPS).map(|marker| marker <= active).collect()
}

#[derive(Debug, Clone, PartialEq)]
pub enum Screen {
    Search {
        inline_error: Option<String>,
    },
    SelectRoom(RoomList),
    GuestDetails {
        summary: BookingSummary,
        inline_error: Option<String>,
    },
    Payment {
        summary: BookingSummary,
        panel: Option<PaymentPanel>,
    },
    Verifying {
        booking_id: Option<BookingId>,
    },
    Success {
        booking_id: Option<BookingId>,
    },
    Error(Failure),
}

pub fn screen(state: &FlowState) -> Screen {
    let inline_error = state.inline_error.as_ref().map(|e| e.to_string());
    let booking_id = state.booking.as_ref().map(|b| b.booking_id.clone());

    match state.step {
        Step::Search => Screen::Search { inline_error },
        Step::SelectRoom => Screen::SelectRoom(room_list(&state.available_rooms)),
        Step::GuestDetails => Screen::GuestDetails {
            summary: booking_summary(state),
            inline_error,
        },
        Step::Payment => Screen::Payment {
            summary: booking_summary(state),
            panel: payment_panel(state),
        },
        Step::Verifying => Screen::Verifying { booking_id },
        Step::Success => Screen::Success { booking_id },
        Step::Error => Screen::Error(
            state
                .failure
                .clone()
                .unwrap_or_else(|| Failure::new("Something went wrong", "")),
        ),
    }
}

// Observer notified by the controller after each transition
pub trait BookingView {
    fn render(&mut self, state: &FlowState);

    fn set_loading(&mut self, _loading: bool) {}

    // Called when the visible location changes, e.g. after return params are stripped
    fn replace_location(&mut self, _url: &Url) {}
}

pub struct TerminalView<W: Write> {
    out: W,
}

impl<W: Write> TerminalView<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn draw(&mut self, state: &FlowState) -> std::io::Result<()> {
        let bar: String = progress_markers(state.step)
            .iter()
            .enumerate()
            .map(|(i, lit)| {
                if *lit {
                    format!("[{}]", i + 1)
                } else {
                    " . ".to_string()
                }
            })
            .collect::<Vec<_>>()
            .join("--");
        writeln!(self.out, "\n{}", bar)?;

        match screen(state) {
            Screen::Search { inline_error } => {
                writeln!(self.out, "Check availability")?;
                if let Some(error) = inline_error {
                    writeln!(self.out, "  ! {}", error)?;
                }
            }
            Screen::SelectRoom(RoomList::NoRooms) => {
                writeln!(self.out, "{}", NO_ROOMS_NOTICE)?;
            }
            Screen::SelectRoom(RoomList::Cards(cards)) => {
                writeln!(self.out, "Select a room")?;
                for card in cards {
                    writeln!(
                        self.out,
                        "  {:<24} {:<28} {:>10}  [{}]",
                        card.room_id, card.name, card.price, card.image
                    )?;
                    writeln!(self.out, "      {}", card.description)?;
                }
            }
            Screen::GuestDetails {
                summary,
                inline_error,
            } => {
                writeln!(self.out, "Guest details")?;
                self.draw_summary(&summary)?;
                if let Some(error) = inline_error {
                    writeln!(self.out, "  ! {}", error)?;
                }
            }
            Screen::Payment { summary, panel } => {
                writeln!(self.out, "Payment")?;
                self.draw_summary(&summary)?;
                if let Some(panel) = panel {
                    writeln!(self.out, "  Amount due: {}", panel.amount)?;
                    writeln!(self.out, "  Pay now:    {}", panel.pay_link)?;
                }
            }
            Screen::Verifying { booking_id } => {
                let id = booking_id.map(|id| id.to_string()).unwrap_or_default();
                writeln!(self.out, "Verifying payment for booking {}...", id)?;
            }
            Screen::Success { booking_id } => {
                writeln!(self.out, "Booking confirmed!")?;
                if let Some(id) = booking_id {
                    writeln!(self.out, "  Reference: {}", id)?;
                }
            }
            Screen::Error(failure) => {
                writeln!(self.out, "{}", failure.title)?;
                writeln!(self.out, "  {}", failure.message)?;
            }
        }
        self.out.flush()
    }

    fn draw_summary(&mut self, summary: &BookingSummary) -> std::io::Result<()> {
        writeln!(
            self.out,
            "  {} -> {} | {} | {}",
            summary.check_in, summary.check_out, summary.room_name, summary.total
        )
    }
}

impl<W: Write> BookingView for TerminalView<W> {
    fn render(&mut self, state: &FlowState) {
        if let Err(e) = self.draw(state) {
            warn!(error = %e, "failed to draw booking screen");
        }
    }

    fn set_loading(&mut self, loading: bool) {
        if loading {
            let _ = writeln!(self.out, "  loading...");
        }
    }

    fn replace_location(&mut self, url: &Url) {
        let _ = writeln!(self.out, "  location: {}", url);
    }
}
