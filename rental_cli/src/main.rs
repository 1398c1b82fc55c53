use std::{path::PathBuf, sync::Arc, time::Duration};

use anyhow::{anyhow, Context};
use chrono::{Local, NaiveDate, NaiveTime};
use clap::{Parser, Subcommand, ValueEnum};
use rental_tracker_client::{
    location::replay::ReplayLocationProvider, ClientConfiguration, ExitDecision, FleetApi, HttpFleetApi, SessionContext,
    TrackerError, TripTracker,
};
use rental_tracker_lib::{
    report::{IncidentReport, IssueKind},
    track_session::TrackingStatus,
    trip::{BookingStatus, Trip},
    user::RenterSession,
};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "rental")]
#[command(about = "Renter client for the fleet management backend", long_about = None)]
struct Cli {
    /// Configuration file with `key = value` lines
    #[arg(long)]
    config: Option<PathBuf>,
    /// Base url of the backend, overrides the configuration file
    #[arg(long)]
    api_url: Option<String>,
    #[arg(long)]
    email: String,
    #[arg(long)]
    password: String,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Renter overview and recent trips
    Home,
    /// List rentals with the given status
    Bookings {
        #[arg(long, value_enum, default_value_t = StatusArg::Upcoming)]
        status: StatusArg,
    },
    /// File an incident report
    Report {
        /// accident, mechanical-problem, fuel-issue, flat-tire or other
        #[arg(long)]
        issue: IssueKind,
        #[arg(long)]
        note: String,
        #[arg(long)]
        emergency: bool,
        /// YYYY-MM-DD, defaults to today
        #[arg(long)]
        date: Option<NaiveDate>,
        /// HH:MM:SS, defaults to now
        #[arg(long)]
        time: Option<NaiveTime>,
    },
    /// Track an upcoming rental, replaying device positions from a GPX file
    Track {
        #[arg(long)]
        rented_vehicle_id: i64,
        #[arg(long)]
        gpx: PathBuf,
        /// Delay between replayed positions, defaults to the configured watch interval
        #[arg(long)]
        interval_ms: Option<u64>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum StatusArg {
    Upcoming,
    Completed,
    Canceled,
}

impl From<StatusArg> for BookingStatus {
    fn from(status: StatusArg) -> Self {
        match status {
            StatusArg::Upcoming => BookingStatus::Upcoming,
            StatusArg::Completed => BookingStatus::Completed,
            StatusArg::Canceled => BookingStatus::Canceled,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("{}=info,rental_tracker_client=info", env!("CARGO_CRATE_NAME")).into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => ClientConfiguration::load(path).with_context(|| format!("Failed to load {}", path.display()))?,
        None => ClientConfiguration::default(),
    };
    if let Some(api_url) = &cli.api_url {
        config.api_base_url = api_url.trim_end_matches('/').to_string();
    }
    let api = Arc::new(HttpFleetApi::new(&config)?);
    tracing::debug!("Using backend at {}", api.base_url());

    let mut session = SessionContext::new();
    let renter = session
        .login(api.as_ref(), &cli.email, &cli.password)
        .await
        .map_err(|err| anyhow!(err.user_message()))?;
    println!("Login successful");

    let result = match cli.command {
        Commands::Home => home(api.as_ref(), &renter).await,
        Commands::Bookings { status } => bookings(api.as_ref(), &renter, status.into()).await,
        Commands::Report { issue, note, emergency, date, time } => {
            let date = date.unwrap_or_else(|| Local::now().date_naive());
            let time = time.unwrap_or_else(|| Local::now().time());
            report(api.as_ref(), &renter, IncidentReport::new(renter.renter_id, issue, date, time, &note, emergency)?).await
        }
        Commands::Track { rented_vehicle_id, gpx, interval_ms } => {
            track(api.clone(), renter.clone(), &config, rented_vehicle_id, gpx, interval_ms).await
        }
    };

    session.dispose();
    result
}

fn print_trips(trips: &[Trip], empty: &str) {
    if trips.is_empty() {
        println!("{empty}");
        return;
    }

    for trip in trips {
        println!(
            "{}\t{}\t{}\t{}",
            trip.rented_vehicle_id,
            trip.car_model,
            trip.pickup_date_display().unwrap_or_else(|| "Invalid Date".into()),
            trip.pickup_time_display().unwrap_or_else(|| "Invalid Time".into()),
        );
    }
}

async fn home(api: &dyn FleetApi, renter: &RenterSession) -> anyhow::Result<()> {
    println!("{}", renter.display_name());
    println!("Rented Cars: {}\tUpcoming Rent: {}", renter.rented_vehicle_count(), renter.upcoming_rent_count());

    let trips = api
        .recent_trips(renter.renter_id)
        .await
        .map_err(|err| anyhow!("Failed to fetch recent trips. {}", err.user_message()))?;

    println!("RECENT TRIPS");
    print_trips(&trips, "No recent trips found.");
    Ok(())
}

async fn bookings(api: &dyn FleetApi, renter: &RenterSession, status: BookingStatus) -> anyhow::Result<()> {
    let trips = api
        .rentals_by_status(renter.renter_id, status)
        .await
        .map_err(|err| anyhow!("Failed to fetch rentals. {}", err.user_message()))?;

    println!("{} rentals for {}", status, renter.display_name());
    print_trips(&trips, "No rentals found for this status.");
    Ok(())
}

async fn report(api: &dyn FleetApi, renter: &RenterSession, report: IncidentReport) -> anyhow::Result<()> {
    tracing::info!("Submitting {} report for renter {}", report.nature_of_issue, renter.renter_id);

    api.submit_report(&report)
        .await
        .map_err(|err| anyhow!("Failed to submit the report. Please try again later. ({err})"))?;

    println!("Report submitted successfully");
    Ok(())
}

fn notify(err: &TrackerError) {
    let (title, message) = err.user_message();
    println!("{title}: {message}");
}

fn print_status(tracker: &TripTracker) {
    let snapshot = tracker.snapshot();
    println!("Status: {} [{}]", snapshot.status, snapshot.status.action_label());
    if let Some(trip_id) = &snapshot.server_trip_id {
        println!("Server trip: {trip_id}");
    }
    println!("{}", snapshot.location_line());
}

async fn end_before_leaving(tracker: &mut TripTracker) {
    if tracker.status() != TrackingStatus::Idle {
        match tracker.confirm_exit().await {
            Ok(()) => println!("Trip Stopped Successfully"),
            Err(err) => notify(&err),
        }
    }
}

async fn track(
    api: Arc<HttpFleetApi>,
    renter: Arc<RenterSession>,
    config: &ClientConfiguration,
    rented_vehicle_id: i64,
    gpx: PathBuf,
    interval_ms: Option<u64>,
) -> anyhow::Result<()> {
    let rentals = api
        .rentals_by_status(renter.renter_id, BookingStatus::Upcoming)
        .await
        .map_err(|err| anyhow!("Failed to fetch rentals. {}", err.user_message()))?;
    let trip = rentals
        .into_iter()
        .find(|rental| rental.rented_vehicle_id == rented_vehicle_id)
        .ok_or_else(|| anyhow!("No upcoming rental with id {rented_vehicle_id}"))?;

    let mut provider = ReplayLocationProvider::from_gpx_file(&gpx)?;
    if let Some(interval_ms) = interval_ms {
        provider = provider.with_pace(Duration::from_millis(interval_ms));
    }

    let mut tracker = TripTracker::new(api, Arc::new(provider), renter, trip).with_watch_options(config.watch.clone());

    let trip = tracker.trip();
    println!("Renter: {}", tracker.renter().display_name());
    println!("Car Model: {}", trip.car_model);
    println!("Pick Up Date: {}", trip.pickup_date_display().unwrap_or_else(|| "Invalid Date".into()));
    println!("Pick Up Time: {}", trip.pickup_time_display().unwrap_or_else(|| "Invalid Time".into()));
    println!("Commands: toggle (t), status (s), back (b), quit (q)");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut watching = false;

    loop {
        tokio::select! {
            live = tracker.poll_watch(), if watching => {
                if live {
                    println!("{}", tracker.snapshot().location_line());
                } else {
                    watching = false;
                    println!("No more positions from the device. The trip stays open until it is ended.");
                }
            }
            _ = tokio::signal::ctrl_c() => {
                end_before_leaving(&mut tracker).await;
                break;
            }
            line = lines.next_line() => {
                let Some(line) = line? else {
                    end_before_leaving(&mut tracker).await;
                    break;
                };

                match line.trim() {
                    "toggle" | "t" => {
                        match tracker.toggle().await {
                            Ok(TrackingStatus::Idle) => println!("Trip Stopped Successfully"),
                            Ok(_) => println!("Trip started"),
                            Err(err) => notify(&err),
                        }
                        watching = tracker.is_watching();
                    }
                    "status" | "s" => print_status(&tracker),
                    "back" | "b" => match tracker.request_exit() {
                        ExitDecision::Proceed => break,
                        ExitDecision::ConfirmationRequired => {
                            println!("Trip in Progress. Do you want to end the current trip? [y/N]");
                            let answer = lines.next_line().await?.unwrap_or_default();
                            if matches!(answer.trim(), "y" | "Y" | "yes") {
                                end_before_leaving(&mut tracker).await;
                                break;
                            }
                            println!("Continuing trip");
                        }
                    },
                    "quit" | "q" => {
                        end_before_leaving(&mut tracker).await;
                        break;
                    }
                    "" => {}
                    other => println!("Unknown command {other:?}"),
                }
            }
        }
    }

    tracker.settle_updates().await;
    Ok(())
}
