//! Shared domain model and collaborator contracts for `slotwatch`.
//!
//! The search worker only ever talks to the traits in [`remote`] and
//! [`preferences`]; the HTTP binding and the on-disk store live elsewhere.

pub mod app_config;
pub mod config;
pub mod locations;
pub mod model;
pub mod preferences;
pub mod remote;

use thiserror::Error;

pub use app_config::{AppConfig, Environment};
pub use config::{load_app_config, load_app_config_from_env};
pub use locations::{builtin_catalog, filter_by_cities, load_catalog, Location, LocationsFile};
pub use model::{
    Answer, Booking, Calendar, ClaimOutcome, ClaimParams, Identity, PreparedVisit, SearchConfig,
    Service, Slot, UserMetadata,
};
pub use preferences::{JsonFilePreferenceStore, PreferenceStore, StoreError};
pub use remote::{PrepareError, RemoteBookingService, RemoteError, VisitPreparer};

/// Errors raised while loading configuration or the location catalog.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("invalid value for {var}: {reason}")]
    InvalidEnvVar { var: String, reason: String },

    #[error("failed to read locations file {path}: {source}")]
    LocationsFileIo {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse locations file: {0}")]
    LocationsFileParse(#[from] serde_yaml::Error),

    #[error("invalid location catalog: {0}")]
    Validation(String),
}
