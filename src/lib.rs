//! reefer-dispatch core
//!
//! Assigns temperature-sensitive orders to a refrigerated fleet and sequences
//! each vehicle's stops under capacity, time-window, driving-time and
//! temperature constraints.

pub mod traits;
pub mod model;
pub mod config;
pub mod error;
pub mod input;
pub mod haversine;
pub mod matrix;
pub mod osrm;
pub mod constraints;
pub mod construction;
pub mod local_search;
pub mod extract;
pub mod solver;

pub use config::{SolveOptions, TimeWindowPolicy};
pub use error::DispatchError;
pub use extract::{DispatchReport, Route, RouteStop, Solution, Summary};
pub use model::{CargoTemperature, Location, Order, Vehicle, VehicleClass};
pub use solver::{plan, solve, solve_with_cancel, CancelToken};
