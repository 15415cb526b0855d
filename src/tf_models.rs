// API models and data fetching for the TrainFinder live train service
//
// API Endpoints (relative to the configured base URL):
// - Station directory: GET /train/getStations -> [{ code, fullName }]
// - Live trains:       GET /train/trains      -> [TrainSnapshot]

use chrono::{TimeZone, Utc};
use chrono_tz::Europe::Amsterdam;
use log::warn;
use reqwest::blocking;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use std::time::Duration;

// ============================================================================
// Data Structures
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Station {
    pub code: String,
    #[serde(alias = "name")]
    pub full_name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub latitude: f64,
    pub longitude: f64,
}

impl Position {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Position { latitude, longitude }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrainStop {
    pub station: String,
    /// Unix timestamp in seconds
    #[serde(deserialize_with = "floor_seconds")]
    pub departure_time: i64,
    /// Seconds behind schedule
    #[serde(default, deserialize_with = "floor_seconds_opt")]
    pub delay: Option<i64>,
    #[serde(default)]
    pub track: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrainSnapshot {
    pub ride_code: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub carrier: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub train_type: String,
    pub position: Position,
    #[serde(default)]
    pub next_stop: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub stops: Vec<TrainStop>,
}

impl TrainSnapshot {
    /// Final destination: the last stop in travel order.
    pub fn destination(&self) -> Option<&TrainStop> {
        self.stops.last()
    }

    /// Checks the fields the map needs to place a marker.
    pub fn validate(&self) -> Result<()> {
        if self.ride_code.trim().is_empty() {
            return Err(TFError::InvalidRecord("train record without ride code".to_string()));
        }
        let Position { latitude, longitude } = self.position;
        if !latitude.is_finite() || !longitude.is_finite() {
            return Err(TFError::InvalidRecord(format!(
                "train {} has a non-finite position",
                self.ride_code
            )));
        }
        if !(-90.0..=90.0).contains(&latitude) || !(-180.0..=180.0).contains(&longitude) {
            return Err(TFError::InvalidRecord(format!(
                "train {} is outside the map ({}, {})",
                self.ride_code, latitude, longitude
            )));
        }
        Ok(())
    }
}

// The live service serializes absent values as `null` and may send
// second counts as floating point numbers.

fn null_as_default<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

fn floor_seconds<'de, D>(deserializer: D) -> std::result::Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(f64::deserialize(deserializer)?.floor() as i64)
}

fn floor_seconds_opt<'de, D>(deserializer: D) -> std::result::Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<f64>::deserialize(deserializer)?.map(|secs| secs.floor() as i64))
}

// ============================================================================
// Error Handling
// ============================================================================

#[derive(Debug)]
pub enum TFError {
    NetworkError(String),
    ParseError(String),
    InvalidRecord(String),
}

impl std::fmt::Display for TFError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TFError::NetworkError(e) => write!(f, "Network error: {}", e),
            TFError::ParseError(e) => write!(f, "Parse error: {}", e),
            TFError::InvalidRecord(e) => write!(f, "Invalid record: {}", e),
        }
    }
}

impl std::error::Error for TFError {}

pub type Result<T> = std::result::Result<T, TFError>;

// ============================================================================
// Data Source
// ============================================================================

/// Where the live client gets its data from. Implementations are called from
/// background fetch threads.
pub trait TrainSource: Send + Sync + 'static {
    fn fetch_stations(&self) -> Result<Vec<Station>>;
    fn fetch_trains(&self) -> Result<Vec<TrainSnapshot>>;
}

pub struct TFClient {
    http: blocking::Client,
    stations_url: String,
    trains_url: String,
}

impl TFClient {
    const REQUEST_TIMEOUT_SECS: u64 = 15;

    pub fn new(base_url: &str, stations_path: &str, trains_path: &str) -> Result<Self> {
        let http = blocking::Client::builder()
            .timeout(Duration::from_secs(Self::REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|e| TFError::NetworkError(format!("Failed to create HTTP client: {}", e)))?;

        Ok(TFClient {
            http,
            stations_url: TFModels::join_url(base_url, stations_path),
            trains_url: TFModels::join_url(base_url, trains_path),
        })
    }

    pub fn stations_url(&self) -> &str {
        &self.stations_url
    }

    pub fn trains_url(&self) -> &str {
        &self.trains_url
    }

    fn get_body(&self, url: &str, what: &str) -> Result<String> {
        let response = self
            .http
            .get(url)
            .send()
            .map_err(|e| TFError::NetworkError(format!("Failed to fetch {}: {}", what, e)))?;

        if !response.status().is_success() {
            return Err(TFError::NetworkError(format!(
                "{} request returned {}",
                what,
                response.status()
            )));
        }

        response
            .text()
            .map_err(|e| TFError::NetworkError(format!("Failed to read {} response: {}", what, e)))
    }
}

impl TrainSource for TFClient {
    fn fetch_stations(&self) -> Result<Vec<Station>> {
        let body = self.get_body(&self.stations_url, "stations")?;
        TFModels::parse_stations(&body)
    }

    fn fetch_trains(&self) -> Result<Vec<TrainSnapshot>> {
        let body = self.get_body(&self.trains_url, "trains")?;
        TFModels::parse_trains(&body)
    }
}

// ============================================================================
// Parsing and Formatting
// ============================================================================

pub struct TFModels;

impl TFModels {
    pub fn join_url(base_url: &str, path: &str) -> String {
        format!(
            "{}/{}",
            base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    pub fn parse_stations(body: &str) -> Result<Vec<Station>> {
        Self::parse_records(body, "station")
    }

    pub fn parse_trains(body: &str) -> Result<Vec<TrainSnapshot>> {
        Self::parse_records(body, "train")
    }

    /// Parses a JSON array record by record, dropping the ones that do not fit
    /// the schema instead of failing the whole response.
    fn parse_records<T: DeserializeOwned>(body: &str, kind: &str) -> Result<Vec<T>> {
        let json: serde_json::Value = serde_json::from_str(body)
            .map_err(|e| TFError::ParseError(format!("Invalid JSON response: {}", e)))?;

        let records = json.as_array().ok_or_else(|| {
            TFError::ParseError(format!("Expected an array of {} records", kind))
        })?;

        let parsed = records
            .iter()
            .enumerate()
            .filter_map(|(idx, record)| match T::deserialize(record) {
                Ok(value) => Some(value),
                Err(e) => {
                    let id = record
                        .get("rideCode")
                        .or_else(|| record.get("code"))
                        .and_then(|v| v.as_str())
                        .unwrap_or("?");
                    warn!("Skipping malformed {} record #{} ({}): {}", kind, idx, id, e);
                    None
                }
            })
            .collect();

        Ok(parsed)
    }

    /// Local (Dutch) wall clock time of a departure, `HH:MM`.
    pub fn format_departure(timestamp: i64) -> String {
        match Utc.timestamp_opt(timestamp, 0).single() {
            Some(dt) => dt.with_timezone(&Amsterdam).format("%H:%M").to_string(),
            None => "??:??".to_string(),
        }
    }

    /// Delay annotation shown after a departure time, e.g. `+3min`.
    /// Returns `None` when the train is on time or the delay is unknown.
    pub fn format_delay(delay_seconds: Option<i64>) -> Option<String> {
        match delay_seconds {
            Some(delay) if delay != 0 => Some(format!("{:+}min", delay.div_euclid(60))),
            _ => None,
        }
    }

    pub fn format_timestamp_full(timestamp: i64) -> String {
        match Utc.timestamp_opt(timestamp, 0).single() {
            Some(dt) => dt
                .with_timezone(&Amsterdam)
                .format("%Y-%m-%d %H:%M:%S")
                .to_string(),
            None => format!("Invalid timestamp: {}", timestamp),
        }
    }

    pub fn get_current_timestamp() -> i64 {
        Utc::now().timestamp()
    }
}
