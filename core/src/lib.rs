//! Kjerne for aktivitetsdashboardet: lasting og caching av aktivitetstabeller,
//! auto-estimering av FTP/makspuls/vekt og målsporing i W/kg.

pub mod config;
pub mod error;
pub mod fitness;
pub mod goal;
pub mod metrics;
pub mod repository;
pub mod service;
pub mod smoothing;
pub mod storage;
pub mod types;

#[cfg(feature = "python")]
mod py;

pub use config::{load_settings, Settings};
pub use error::{CoreError, CoreResult};
pub use fitness::{
    estimate_ftp, estimate_max_hr, estimate_weight_trend, rolling_ftp, FtpEstimate, MaxHrSample,
    RollingFtp, WeightSample,
};
pub use goal::{
    Goal, GoalConfig, GoalProgress, GoalStatus, GoalSummary, GoalTracker, RampDifficulty,
};
pub use metrics::Metrics;
pub use repository::{ActivityRepository, CsvActivityRepository};
pub use service::ActivityService;
pub use types::{Activity, Cell, MetricView, Table, Variant, YearSummary};
