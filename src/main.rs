//! Walk-Guard companion CLI.
//!
//! Log in once, then track:
//! ```not_rust
//! walkguard login --mobile 9999999999 --stick-id A1B2C3 --password secret
//! walkguard track --lat 12.34 --lon 56.78
//! ```
//!
//! Set `RUST_LOG` to adjust verbosity and `WALKGUARD_API_URL` / `WALKGUARD_INGEST_URL`
//! to point at another backend.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use once_cell::sync::Lazy;
use tokio::sync::mpsc;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use walkguard::handlers::auth::{AccountFlows, FlowOutcome, LoginForm, SignupForm};
use walkguard::handlers::device::{FixedPosition, NoPermissionRequired, PositionProvider, RoutePlayback};
use walkguard::handlers::profile::{Profile, ProfileService};
use walkguard::handlers::storage::{FileStore, KeyValueStore};
use walkguard::models::notification::{Notification, Notifier};
use walkguard::{BackendClient, CompanionError, Config, LocationReporter, Result};

static CONFIG: Lazy<Config> = Lazy::new(Config::init);

#[derive(Parser)]
#[command(name = "walkguard", version, about = "Companion client for the Walk-Guard smart stick")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Log in and remember the account on this device
    Login {
        #[arg(long)]
        mobile: String,
        #[arg(long)]
        stick_id: String,
        #[arg(long)]
        password: String,
    },
    /// Create an account
    Register {
        #[arg(long)]
        name: String,
        #[arg(long)]
        mobile: String,
        #[arg(long)]
        email: String,
        #[arg(long)]
        stick_id: String,
        #[arg(long)]
        password: String,
        /// Emergency contact number, repeatable
        #[arg(long = "contact")]
        contacts: Vec<String>,
    },
    /// Show the stored account's profile
    Profile,
    /// Edit the profile locally
    EditProfile {
        #[arg(long)]
        name: String,
        #[arg(long)]
        stick_id: String,
    },
    /// Forget the stored account
    Logout,
    /// Look the account email up again and store it
    Email,
    /// Report the position every interval until Ctrl-C
    Track {
        #[arg(long, requires = "lon", conflicts_with = "route")]
        lat: Option<f64>,
        #[arg(long, requires = "lat")]
        lon: Option<f64>,
        /// JSON file of `[lat, lon]` pairs replayed in a loop
        #[arg(long)]
        route: Option<PathBuf>,
        /// Stop after this many seconds
        #[arg(long)]
        seconds: Option<u64>,
        /// Refresh the email from the backend before starting
        #[arg(long)]
        refresh_email: bool,
    },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "walkguard=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    if let Err(e) = run(cli.command).await {
        error!("{}", e);
        std::process::exit(1);
    }
}

async fn run(command: Command) -> Result<()> {
    let client = Arc::new(BackendClient::from_config(&CONFIG)?);
    let store: Arc<dyn KeyValueStore> = Arc::new(FileStore::new(CONFIG.store_path.clone()));
    let (notifier, notifications) = Notifier::channel(32);
    let printer = tokio::spawn(print_notifications(notifications));

    let flows = AccountFlows::new(client.clone(), store.clone(), notifier.clone());
    let profiles = ProfileService::new(client.clone(), store.clone(), notifier.clone());

    let result = match command {
        Command::Login { mobile, stick_id, password } => {
            let outcome = flows.login(&LoginForm { mobile, stick_id, password }).await;
            report_outcome(outcome)
        }
        Command::Register { name, mobile, email, stick_id, password, contacts } => {
            let form = SignupForm {
                name,
                mobile,
                email,
                stick_id,
                emergency_contacts: contacts,
                password,
            };
            report_outcome(flows.register(&form).await)
        }
        Command::Profile => profiles.load().await.map(|profile| print_profile(&profile)),
        Command::EditProfile { name, stick_id } => match profiles.load().await {
            Ok(mut profile) => profiles
                .edit(&mut profile, &name, &stick_id)
                .await
                .map(|()| print_profile(&profile)),
            Err(e) => Err(e),
        },
        Command::Logout => profiles.logout().await.and_then(report_outcome),
        Command::Email => flows.refresh_email().await.map(|email| println!("Email: {}", email)),
        Command::Track { lat, lon, route, seconds, refresh_email } => {
            let positions: Arc<dyn PositionProvider> = match (route, lat, lon) {
                (Some(path), _, _) => Arc::new(RoutePlayback::load(path).await?),
                (None, Some(lat), Some(lon)) => Arc::new(FixedPosition::new(lat, lon)),
                _ => return Err(CompanionError::validation("Provide --route or both --lat and --lon")),
            };
            let mut reporter = LocationReporter::new(
                store.clone(),
                Arc::new(NoPermissionRequired),
                positions,
                client.clone(),
                notifier.clone(),
            )
            .with_period(CONFIG.track_interval);
            reporter.initialize().await;

            if refresh_email {
                let email = flows.refresh_email().await?;
                reporter.set_account_email(email);
            }

            track(&mut reporter, seconds.map(Duration::from_secs)).await
        }
    };

    // Let queued notifications print; a sample still in flight may hold a sender.
    drop((flows, profiles, notifier));
    tokio::time::timeout(Duration::from_secs(1), printer).await.ok();
    result
}

async fn track(reporter: &mut LocationReporter, limit: Option<Duration>) -> Result<()> {
    reporter.start()?;
    let mut status = reporter.subscribe();
    let deadline = tokio::time::sleep(limit.unwrap_or(Duration::MAX));
    let interrupt = tokio::signal::ctrl_c();
    tokio::pin!(deadline, interrupt);

    loop {
        tokio::select! {
            _ = &mut interrupt => break,
            _ = &mut deadline, if limit.is_some() => break,
            changed = status.changed() => {
                if changed.is_err() {
                    break;
                }
                if let Some(position) = status.borrow_and_update().last_position {
                    println!("{:.6}, {:.6} at {}", position.latitude, position.longitude, position.captured_at);
                }
            }
        }
    }

    reporter.stop();
    info!("Tracking finished");
    Ok(())
}

fn print_profile(profile: &Profile) {
    println!("Welcome Back {}", profile.details.name);
    println!("  User ID:  {}", profile.mobile);
    println!("  Stick ID: {}", profile.details.stick_id);
    println!("  Status:   {}", profile.details.status.as_deref().unwrap_or("Unknown"));
    if let Some(image) = &profile.details.profile_image {
        println!("  Image:    {}", image);
    }
}

fn report_outcome(outcome: FlowOutcome) -> Result<()> {
    match outcome.navigate_to {
        Some(screen) => {
            info!("Next screen: {:?}", screen);
            Ok(())
        }
        None => Err(CompanionError::validation(outcome.notification.message)),
    }
}

async fn print_notifications(mut notifications: mpsc::Receiver<Notification>) {
    while let Some(notification) = notifications.recv().await {
        println!("{}", notification);
    }
}
