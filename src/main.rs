use anyhow::{Context, Result};
use boutique_booking::{
    min_check_in, min_check_out, AppConfig, BookingApi, BookingController, GuestDetails,
    HttpBookingApi, Step, TerminalView,
};
use clap::Parser;
use reqwest::Url;
use std::io::Stdout;
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use tracing::{info, warn};

#[derive(Parser)]
#[command(
    name = "booking-flow",
    about = "Boutique hotel booking wizard",
    version
)]
struct Cli {
    /// Page URL the payment provider redirected back to; verifies that payment and exits
    #[arg(long)]
    return_url: Option<String>,

    /// Booking API base URL (overrides BOOKING_API_BASE_URL)
    #[arg(long)]
    api_url: Option<String>,
}

type Input = Lines<BufReader<Stdin>>;
type Controller = BookingController<HttpBookingApi, TerminalView<Stdout>>;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let mut config = AppConfig::from_env().context("Failed to load configuration")?;
    if let Some(api_url) = cli.api_url {
        config.client.base_url = api_url;
    }

    let location = cli
        .return_url
        .as_deref()
        .unwrap_or(&config.booking_page_url);
    let location = Url::parse(location).with_context(|| format!("Invalid page URL '{}'", location))?;

    let api = HttpBookingApi::new(config.client.clone()).context("Failed to create API client")?;
    let mut controller = BookingController::new(api, TerminalView::new(std::io::stdout()), location)
        .with_poll_config(config.poll);

    if let Some(report) = controller.init_payment_verification().await? {
        info!(
            booking_id = %report.booking_id,
            outcome = ?report.outcome,
            attempts = report.attempts,
            "verification complete"
        );
    } else {
        if cli.return_url.is_some() {
            warn!("return URL carries no payment result, starting a new booking");
        }
        controller.start();
        run_wizard(&mut controller).await?;
    }

    let stats = controller.api().stats();
    info!(
        requests = stats.requests_sent,
        failed = stats.requests_failed,
        network_errors = stats.network_errors,
        avg_ms = stats.average_response_time_ms,
        "session finished"
    );
    Ok(())
}

async fn run_wizard(controller: &mut Controller) -> Result<()> {
    let mut input = BufReader::new(tokio::io::stdin()).lines();

    loop {
        match controller.state().step {
            Step::Search => {
                let mut form = controller.search_form();
                let today = controller.today();
                println!(
                    "  earliest check-in {}, earliest check-out {}",
                    min_check_in(today),
                    min_check_out(today)
                );
                let Some(check_in) = prompt(&mut input, "Check-in", &form.check_in).await? else {
                    break;
                };
                let Some(check_out) = prompt(&mut input, "Check-out", &form.check_out).await?
                else {
                    break;
                };
                let Some(guests) = prompt(&mut input, "Guests", &form.guests).await? else {
                    break;
                };
                form.check_in = check_in;
                form.check_out = check_out;
                form.guests = guests;
                controller.search(&form).await?;
            }
            Step::SelectRoom => {
                if controller.state().available_rooms.is_empty() {
                    let Some(_) = prompt(&mut input, "Press enter to search again", "").await?
                    else {
                        break;
                    };
                    controller.restart()?;
                    continue;
                }
                let Some(room_id) = prompt(&mut input, "Room id (or 'back')", "").await? else {
                    break;
                };
                if room_id == "back" {
                    controller.restart()?;
                } else if let Err(e) = controller.select_room(&room_id) {
                    println!("  ! {}", e);
                }
            }
            Step::GuestDetails => {
                let Some(details) = read_guest_details(&mut input).await? else {
                    break;
                };
                controller.confirm_booking(details).await?;
            }
            Step::Payment => {
                println!("  Complete the payment, then run again with --return-url <redirect url>.");
                break;
            }
            Step::Success | Step::Error => {
                let Some(answer) = prompt(&mut input, "Start a new booking? [y/N]", "n").await?
                else {
                    break;
                };
                if answer.eq_ignore_ascii_case("y") {
                    controller.restart()?;
                } else {
                    break;
                }
            }
            Step::Verifying => break,
        }
    }

    Ok(())
}

async fn read_guest_details(input: &mut Input) -> Result<Option<GuestDetails>> {
    let mut fields = Vec::with_capacity(4);
    for label in ["First name", "Last name", "Email", "Phone (optional)"] {
        match prompt(input, label, "").await? {
            Some(value) => fields.push(value),
            None => return Ok(None),
        }
    }
    let mut fields = fields.into_iter();
    let mut next = || fields.next().unwrap_or_default();
    Ok(Some(GuestDetails {
        first_name: next(),
        last_name: next(),
        email: next(),
        phone: next(),
    }))
}

// Returns None on end of input; an empty answer takes the default
async fn prompt(input: &mut Input, label: &str, default: &str) -> Result<Option<String>> {
    if default.is_empty() {
        println!("{}:", label);
    } else {
        println!("{} [{}]:", label, default);
    }

    let Some(line) = input.next_line().await.context("Failed to read input")? else {
        return Ok(None);
    };
    let line = line.trim();
    Ok(Some(if line.is_empty() {
        default.to_string()
    } else {
        line.to_string()
    }))
}
