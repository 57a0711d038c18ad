//! Command handlers, called from `main` once config and catalog are loaded.

use std::collections::{BTreeSet, HashMap};

use chrono::{Local, NaiveDate};

use slotwatch_core::{Location, PreferenceStore, UserMetadata};
use slotwatch_search::{Orchestrator, RunOutcome};

/// Raw `configure` arguments, validated by [`ConfigureArgs::into_metadata`].
pub(crate) struct ConfigureArgs {
    pub cities: Vec<String>,
    pub last_date: NaiveDate,
    pub id_number: String,
    pub phone_number: String,
}

impl ConfigureArgs {
    /// Validates the arguments against the catalog and today's date.
    ///
    /// City names are matched case-insensitively and stored with the
    /// catalog's spelling.
    ///
    /// # Errors
    ///
    /// Returns an error for an unknown city, a last date before `today`, or
    /// an identity or phone number that is not numeric.
    pub(crate) fn into_metadata(
        self,
        catalog: &[Location],
        today: NaiveDate,
    ) -> anyhow::Result<UserMetadata> {
        let known: HashMap<String, &str> = catalog
            .iter()
            .map(|l| (l.city.trim().to_lowercase(), l.city.as_str()))
            .collect();

        let mut cities = BTreeSet::new();
        for city in &self.cities {
            let key = city.trim().to_lowercase();
            let Some(canonical) = known.get(&key) else {
                let mut names: Vec<&str> = known.values().copied().collect();
                names.sort_unstable();
                anyhow::bail!("unknown city '{city}'; known cities: {}", names.join(", "));
            };
            cities.insert((*canonical).to_owned());
        }

        if self.last_date < today {
            anyhow::bail!("last date {} is already in the past", self.last_date);
        }

        let id_number = self.id_number.trim().to_owned();
        if id_number.is_empty() || !id_number.chars().all(|c| c.is_ascii_digit()) {
            anyhow::bail!("identity number must contain digits only");
        }

        let phone_number: String = self
            .phone_number
            .chars()
            .filter(|c| !matches!(c, ' ' | '-'))
            .collect();
        let digits = phone_number.strip_prefix('+').unwrap_or(&phone_number);
        if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
            anyhow::bail!("phone number must contain digits only");
        }

        Ok(UserMetadata {
            cities,
            last_date: self.last_date,
            id_number,
            phone_number,
        })
    }
}

/// Print the location catalog, optionally limited to one city.
#[allow(clippy::unnecessary_wraps)]
pub(crate) fn run_locations(catalog: &[Location], city: Option<&str>) -> anyhow::Result<()> {
    let wanted = city.map(|c| c.trim().to_lowercase());
    let rows: Vec<&Location> = catalog
        .iter()
        .filter(|l| {
            wanted
                .as_deref()
                .is_none_or(|w| l.city.trim().to_lowercase() == w)
        })
        .collect();

    if rows.is_empty() {
        println!(
            "no locations found{}",
            city.map(|c| format!(" in {c}")).unwrap_or_default()
        );
        return Ok(());
    }

    println!("{:<8}{:<16}NAME", "ID", "CITY");
    for location in rows {
        println!(
            "{:<8}{:<16}{}",
            location.id, location.city, location.display_name
        );
    }
    Ok(())
}

/// Validate and store search preferences.
///
/// # Errors
///
/// Returns an error if validation fails or the store cannot be written.
pub(crate) async fn run_configure(
    store: &dyn PreferenceStore,
    catalog: &[Location],
    args: ConfigureArgs,
) -> anyhow::Result<()> {
    let metadata = args.into_metadata(catalog, Local::now().date_naive())?;
    store.save_user_metadata(&metadata).await?;

    let cities: Vec<&str> = metadata.cities.iter().map(String::as_str).collect();
    println!(
        "saved: cities {}, last date {}",
        cities.join(", "),
        metadata.last_date
    );
    Ok(())
}

/// Check the session and report the stored login state.
///
/// # Errors
///
/// Returns an error if the check fails or no user is logged in.
pub(crate) async fn run_check_login(
    orchestrator: &Orchestrator,
    store: &dyn PreferenceStore,
) -> anyhow::Result<()> {
    if !orchestrator.check_login().await {
        anyhow::bail!("login check failed; see the log for the cause");
    }
    if store.is_logged_in().await? {
        println!("logged in");
        Ok(())
    } else {
        anyhow::bail!("not logged in; refresh the session cookie")
    }
}

/// Search until the run ends, stopping it on Ctrl-C.
///
/// # Errors
///
/// Returns an error unless an appointment was booked.
pub(crate) async fn run_search(orchestrator: &Orchestrator) -> anyhow::Result<()> {
    if !orchestrator.start_searching().await {
        anyhow::bail!("search did not start; run `configure` and `check-login` first");
    }
    println!("searching; press Ctrl-C to stop");

    let outcome = tokio::select! {
        outcome = orchestrator.wait() => outcome,
        signal = tokio::signal::ctrl_c() => {
            signal?;
            tracing::info!("received ctrl-c, stopping search");
            orchestrator.stop_searching().await;
            orchestrator.wait().await
        }
    };

    match outcome {
        Some(booked @ RunOutcome::Booked(_)) => {
            println!("{booked}");
            Ok(())
        }
        Some(other) => anyhow::bail!("no appointment booked: {other}"),
        None => anyhow::bail!("no appointment booked"),
    }
}
