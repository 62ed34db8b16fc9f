//! Domain records read by the dispatch engine.
//!
//! Vehicles and orders are snapshots owned by the caller. The engine never
//! mutates them.

use serde::{Deserialize, Serialize};

/// Minutes in a day; also the default end of an unconstrained window.
pub const MINUTES_PER_DAY: i64 = 24 * 60;

const DEFAULT_MAX_DRIVING_MINUTES: u32 = 10 * 60;

/// A geographic point (lat, lng in degrees).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub lat: f64,
    pub lng: f64,
}

impl Location {
    pub const fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    pub fn coords(&self) -> (f64, f64) {
        (self.lat, self.lng)
    }
}

/// Temperature class of a vehicle body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VehicleClass {
    Frozen,
    Chilled,
    /// Separate frozen and chilled chambers.
    Multi,
    Ambient,
}

/// Temperature requirement of an order's cargo.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CargoTemperature {
    Frozen,
    Chilled,
    Ambient,
}

impl VehicleClass {
    /// Whether a vehicle of this class may carry cargo of the given class.
    ///
    /// Frozen bodies can hold chilled cargo, never the other way round.
    pub fn can_carry(self, cargo: CargoTemperature) -> bool {
        match (self, cargo) {
            (VehicleClass::Multi, _) => true,
            (VehicleClass::Frozen, CargoTemperature::Frozen | CargoTemperature::Chilled) => true,
            (VehicleClass::Chilled, CargoTemperature::Chilled) => true,
            (VehicleClass::Ambient, CargoTemperature::Ambient) => true,
            _ => false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Vehicle {
    #[serde(alias = "vehicle_id")]
    pub id: String,
    #[serde(alias = "vehicle_type")]
    pub temperature_class: VehicleClass,
    pub max_pallets: u32,
    #[serde(default)]
    pub max_weight_kg: f64,
    /// Earliest departure ("HH:MM"). Unbounded when absent.
    #[serde(default)]
    pub work_start_time: Option<String>,
    /// Latest return ("HH:MM"). Unbounded when absent.
    #[serde(default)]
    pub work_end_time: Option<String>,
    #[serde(default = "default_max_driving_minutes")]
    pub max_driving_minutes: u32,
}

fn default_max_driving_minutes() -> u32 {
    DEFAULT_MAX_DRIVING_MINUTES
}

impl Vehicle {
    pub fn new(id: impl Into<String>, temperature_class: VehicleClass, max_pallets: u32) -> Self {
        Self {
            id: id.into(),
            temperature_class,
            max_pallets,
            max_weight_kg: 0.0,
            work_start_time: None,
            work_end_time: None,
            max_driving_minutes: DEFAULT_MAX_DRIVING_MINUTES,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    #[serde(alias = "order_id")]
    pub id: String,
    pub temperature_type: CargoTemperature,
    pub required_pallets: u32,
    #[serde(default)]
    pub weight_kg: f64,
    pub pickup_time_start: String,
    pub pickup_time_end: String,
    /// Only needed when matrices are built from coordinates.
    #[serde(default)]
    pub location: Option<Location>,
}

impl Order {
    pub fn new(id: impl Into<String>, temperature_type: CargoTemperature, required_pallets: u32) -> Self {
        Self {
            id: id.into(),
            temperature_type,
            required_pallets,
            weight_kg: 0.0,
            pickup_time_start: "00:00".to_string(),
            pickup_time_end: "24:00".to_string(),
            location: None,
        }
    }
}

/// Parse an "HH:MM" clock string into minutes from midnight.
///
/// Accepts `0..=24` hours and `0..=59` minutes, with "24:00" as the only
/// value past the last minute of the day.
pub fn parse_clock(value: &str) -> Option<i64> {
    let (hours, minutes) = value.trim().split_once(':')?;
    let hours: i64 = hours.trim().parse().ok()?;
    let minutes: i64 = minutes.trim().parse().ok()?;
    if !(0..60).contains(&minutes) || !(0..=24).contains(&hours) {
        return None;
    }
    let total = hours * 60 + minutes;
    (total <= MINUTES_PER_DAY).then_some(total)
}
