mod commands;

use std::sync::Arc;

use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use slotwatch_client::{BookingClient, ClientSettings};
use slotwatch_core::{
    JsonFilePreferenceStore, PreferenceStore, RemoteBookingService, VisitPreparer,
};
use slotwatch_search::{Orchestrator, WorkerSettings};

#[derive(Debug, Parser)]
#[command(name = "slotwatch")]
#[command(about = "Search for and book the earliest appointment slot")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Check whether the configured session cookie belongs to a logged-in user
    CheckLogin,
    /// Store search preferences
    Configure {
        /// City to search in; repeat for several cities
        #[arg(long = "city", required = true)]
        cities: Vec<String>,
        /// Latest acceptable appointment date (YYYY-MM-DD)
        #[arg(long)]
        last_date: NaiveDate,
        /// National identity number used to prepare the visit
        #[arg(long, env = "SLOTWATCH_ID_NUMBER", hide_env_values = true)]
        id_number: String,
        /// Contact phone number used to prepare the visit
        #[arg(long = "phone", env = "SLOTWATCH_PHONE", hide_env_values = true)]
        phone_number: String,
    },
    /// List known locations
    Locations {
        /// Only show locations in this city
        #[arg(long)]
        city: Option<String>,
    },
    /// Search until a slot is booked, the deadline passes, or Ctrl-C
    Search,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let config = slotwatch_core::load_app_config()?;
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.clone()))?;
    tracing_subscriber::fmt().with_env_filter(env_filter).init();
    tracing::debug!(env = %config.env, base_url = %config.base_url, "configuration loaded");

    let catalog = match &config.locations_path {
        Some(path) => slotwatch_core::load_catalog(path)?,
        None => slotwatch_core::builtin_catalog()?,
    };
    let store = Arc::new(JsonFilePreferenceStore::new(config.preferences_path.clone()));

    let Some(command) = cli.command else {
        println!("slotwatch ready; run `slotwatch --help` for commands");
        return Ok(());
    };

    match command {
        Commands::Locations { city } => commands::run_locations(&catalog, city.as_deref()),
        Commands::Configure {
            cities,
            last_date,
            id_number,
            phone_number,
        } => {
            commands::run_configure(
                store.as_ref(),
                &catalog,
                commands::ConfigureArgs {
                    cities,
                    last_date,
                    id_number,
                    phone_number,
                },
            )
            .await
        }
        Commands::CheckLogin => {
            let orchestrator = build_orchestrator(&config, Arc::clone(&store), catalog)?;
            commands::run_check_login(&orchestrator, store.as_ref()).await
        }
        Commands::Search => {
            let orchestrator = build_orchestrator(&config, store, catalog)?;
            commands::run_search(&orchestrator).await
        }
    }
}

fn build_orchestrator(
    config: &slotwatch_core::AppConfig,
    store: Arc<JsonFilePreferenceStore>,
    catalog: Vec<slotwatch_core::Location>,
) -> anyhow::Result<Orchestrator> {
    let client = Arc::new(
        BookingClient::new(&ClientSettings::from_app_config(config))
            .map_err(|e| anyhow::anyhow!("failed to build booking client: {e}"))?,
    );

    Ok(Orchestrator::new(
        Arc::clone(&client) as Arc<dyn RemoteBookingService>,
        client as Arc<dyn VisitPreparer>,
        store as Arc<dyn PreferenceStore>,
        catalog,
        WorkerSettings::from_app_config(config),
    ))
}
