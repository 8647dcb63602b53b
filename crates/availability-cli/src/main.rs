//! `slots` CLI — manage provider availability windows and query bookable slots.
//!
//! State lives in a JSON snapshot file (`availability.json` by default) that is
//! loaded into the in-memory backend for each invocation and written back after
//! every change.
//!
//! ## Usage
//!
//! ```sh
//! # Publish a service (prints the service as JSON)
//! slots --as 6f1c... --role provider service add --name Physio --type MEDICAL --duration 60
//!
//! # Declare a window on Mondays (prints the window id)
//! slots --as 6f1c... --role provider window add --service 9b2e... --day 1 --start 09:00 --end 10:00
//!
//! # List or remove windows
//! slots window list --service 9b2e...
//! slots --as 6f1c... --role provider window remove --service 9b2e... --window 41d0...
//!
//! # Bookable slots on a date
//! slots query --service 9b2e... --date 2026-10-20
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use availability_engine::{
    require_owner, require_provider, AvailabilityManager, BackendSnapshot, EngineConfig,
    InMemoryBackend, NewAvailability, NewService, Principal, PrincipalId, Role, ServiceId,
    ServiceType, WindowId,
};
use availability_engine::time::format_time;
use chrono::{DateTime, Local, NaiveDate, Utc};
use clap::{Parser, Subcommand, ValueEnum};
use mockable::{Clock, DefaultClock};
use serde_json::json;
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "slots",
    version,
    about = "Availability windows and bookable slots"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// JSON snapshot holding services and windows (created if missing)
    #[arg(long, global = true, default_value = "availability.json")]
    state: PathBuf,

    /// Engine configuration file (TOML)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Authenticated principal id acting on the command
    #[arg(long = "as", global = true)]
    principal: Option<PrincipalId>,

    /// Role asserted for the principal (required with --as)
    #[arg(long, global = true, value_enum)]
    role: Option<RoleArg>,

    /// Log debug output to stderr
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Clone, Copy, ValueEnum)]
enum RoleArg {
    Provider,
    Consumer,
}

impl From<RoleArg> for Role {
    fn from(role: RoleArg) -> Self {
        match role {
            RoleArg::Provider => Role::Provider,
            RoleArg::Consumer => Role::Consumer,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Manage services
    Service {
        #[command(subcommand)]
        command: ServiceCommands,
    },
    /// Manage availability windows
    Window {
        #[command(subcommand)]
        command: WindowCommands,
    },
    /// List bookable slots of a service on a date
    Query {
        #[arg(long)]
        service: ServiceId,
        /// Calendar date, YYYY-MM-DD
        #[arg(long)]
        date: NaiveDate,
        /// Override the current time (RFC 3339), mainly for reproducible output
        #[arg(long)]
        now: Option<DateTime<Utc>>,
    },
}

#[derive(Subcommand)]
enum ServiceCommands {
    /// Publish a new service owned by the acting provider
    Add {
        #[arg(long)]
        name: String,
        /// MEDICAL, HOUSE_HELP, BEAUTY, FITNESS, EDUCATION or OTHER
        #[arg(long = "type")]
        service_type: ServiceType,
        /// Duration in minutes: 30, 60, 90 or 120
        #[arg(long)]
        duration: u32,
    },
}

#[derive(Subcommand)]
enum WindowCommands {
    /// Declare an availability window
    Add {
        #[arg(long)]
        service: ServiceId,
        /// Day of week, 0 (Sunday) to 6 (Saturday)
        #[arg(long)]
        day: u8,
        /// Start time, HH:MM
        #[arg(long)]
        start: String,
        /// End time, HH:MM (exclusive)
        #[arg(long)]
        end: String,
    },
    /// List every window of a service
    List {
        #[arg(long)]
        service: ServiceId,
    },
    /// Remove a window
    Remove {
        #[arg(long)]
        service: ServiceId,
        #[arg(long)]
        window: WindowId,
    },
}

/// Clock pinned to `--now`.
struct FixedClock(DateTime<Utc>);

impl Clock for FixedClock {
    fn local(&self) -> DateTime<Local> {
        self.0.with_timezone(&Local)
    }

    fn utc(&self) -> DateTime<Utc> {
        self.0
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = match &cli.config {
        Some(path) => EngineConfig::load(path)
            .with_context(|| format!("Failed to load config: {}", path.display()))?,
        None => EngineConfig::default(),
    };

    let clock: Arc<dyn Clock + Send + Sync> = match &cli.command {
        Commands::Query { now: Some(now), .. } => Arc::new(FixedClock(*now)),
        _ => Arc::new(DefaultClock),
    };

    let backend = Arc::new(load_state(&cli.state)?);
    debug!(state = %cli.state.display(), "state loaded");
    let manager = AvailabilityManager::new(Arc::clone(&backend), clock, &config);
    let principal = match (cli.principal, cli.role) {
        (Some(id), Some(role)) => Some(Principal {
            id,
            role: role.into(),
        }),
        (Some(_), None) => bail!("--as requires --role provider|consumer"),
        (None, _) => None,
    };

    let changed = run(&manager, principal, cli.command).await?;
    if changed {
        save_state(&cli.state, &backend.snapshot().await)?;
        debug!(state = %cli.state.display(), "state saved");
    }

    Ok(())
}

/// Execute one command. Returns whether the state was modified.
async fn run(
    manager: &AvailabilityManager<InMemoryBackend>,
    principal: Option<Principal>,
    command: Commands,
) -> Result<bool> {
    match command {
        Commands::Service {
            command:
                ServiceCommands::Add {
                    name,
                    service_type,
                    duration,
                },
        } => {
            let principal = acting(principal)?;
            require_provider(&principal)?;
            let service = manager
                .register_service(
                    principal.id,
                    NewService {
                        name,
                        service_type,
                        duration_minutes: duration,
                    },
                )
                .await
                .context("Failed to register service")?;
            print_json(&serde_json::to_value(&service)?)?;
            Ok(true)
        }
        Commands::Window {
            command:
                WindowCommands::Add {
                    service,
                    day,
                    start,
                    end,
                },
        } => {
            let principal = acting(principal)?;
            let owned = manager.service(service).await?;
            require_owner(&principal, &owned)?;
            let window_id = manager
                .create_availability(service, NewAvailability::new(day, start, end))
                .await
                .context("Failed to create availability window")?;
            println!("{window_id}");
            Ok(true)
        }
        Commands::Window {
            command: WindowCommands::List { service },
        } => {
            let mut windows = manager.windows_for(service).await?;
            windows.sort_by_key(|w| (w.start_time(), w.id()));
            let rows: Vec<serde_json::Value> = windows
                .iter()
                .map(|w| {
                    json!({
                        "id": w.id(),
                        "day_of_week": w.day_of_week().value(),
                        "start_time": format_time(w.start_time()),
                        "end_time": format_time(w.end_time()),
                    })
                })
                .collect();
            print_json(&json!({ "service_id": service, "windows": rows }))?;
            Ok(false)
        }
        Commands::Window {
            command: WindowCommands::Remove { service, window },
        } => {
            let principal = acting(principal)?;
            let owned = manager.service(service).await?;
            require_owner(&principal, &owned)?;
            if !manager.remove_availability(service, window).await? {
                bail!("Window {} does not belong to service {}", window, service);
            }
            println!("removed {window}");
            Ok(true)
        }
        Commands::Query { service, date, .. } => {
            let slots = manager.query_slots(service, date).await?;
            print_json(&json!({
                "service_id": service,
                "date": date,
                "slots": slots,
            }))?;
            Ok(false)
        }
    }
}

fn acting(principal: Option<Principal>) -> Result<Principal> {
    principal.context("This command requires --as <principal-id>")
}

fn init_logging(verbose: bool) {
    let default = if verbose {
        "availability_engine=debug,slots=debug"
    } else {
        "warn"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .init();
}

fn load_state(path: &Path) -> Result<InMemoryBackend> {
    if !path.exists() {
        return Ok(InMemoryBackend::new());
    }
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read state file: {}", path.display()))?;
    let snapshot: BackendSnapshot = serde_json::from_str(&text)
        .with_context(|| format!("Invalid state file: {}", path.display()))?;
    InMemoryBackend::from_snapshot(snapshot)
        .with_context(|| format!("Inconsistent state file: {}", path.display()))
}

fn save_state(path: &Path, snapshot: &BackendSnapshot) -> Result<()> {
    let text = serde_json::to_string_pretty(snapshot)?;
    std::fs::write(path, text)
        .with_context(|| format!("Failed to write state file: {}", path.display()))
}

fn print_json(value: &serde_json::Value) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
