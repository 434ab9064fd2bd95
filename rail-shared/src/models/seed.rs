use chrono::NaiveTime;
use serde::{Deserialize, Serialize};

/// Bootstrap catalog keyed by natural keys (train number, station name),
/// so applying it twice leaves the store unchanged.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CatalogSeed {
    pub trains: Vec<TrainSeed>,
    pub stations: Vec<StationSeed>,
    pub routes: Vec<RouteSeed>,
    /// Demo passenger profiles for local development.
    #[serde(default)]
    pub passengers: Vec<PassengerSeed>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainSeed {
    pub number: String,
    pub train_type: String,
    pub carriages: Vec<CarriageSeed>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CarriageSeed {
    pub number: i32,
    pub carriage_type: String,
    pub seat_count: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StationSeed {
    pub name: String,
    pub city: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouteSeed {
    pub name: String,
    pub train_number: String,
    pub price_minor: i64,
    pub stops: Vec<StopSeed>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StopSeed {
    pub station_name: String,
    pub stop_order: i32,
    pub arrival_time: Option<NaiveTime>,
    pub departure_time: Option<NaiveTime>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PassengerSeed {
    pub user_id: i64,
    pub first_name: String,
    pub last_name: String,
    pub passport_data: Option<String>,
}

/// Rows actually inserted by a seed run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SeedReport {
    pub trains: u64,
    pub carriages: u64,
    pub seats: u64,
    pub stations: u64,
    pub routes: u64,
    pub stops: u64,
    pub passengers: u64,
}

impl SeedReport {
    pub fn is_empty(&self) -> bool {
        *self == SeedReport::default()
    }
}
