//! Error taxonomy for a solve attempt.

use serde::Serialize;
use thiserror::Error;

/// Why an order could not be placed on any route.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UnassignedReason {
    /// No vehicle's temperature class can carry the cargo.
    NoCompatibleVehicle,
    /// Every compatible vehicle is too small for the order on its own.
    ExceedsCapacity,
    /// Even alone on an empty route, no compatible vehicle can reach the
    /// order inside its window, driving time and work hours.
    NoFeasibleWindow,
    /// The order fits a vehicle on its own, but no route had room for it
    /// next to the orders already placed.
    NoFeasiblePosition,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UnassignedOrder {
    pub order_id: String,
    pub reason: UnassignedReason,
}

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("{nodes} nodes do not match the {matrix} matrix ({rows} rows, row {row} has {cols} columns)")]
    InputShape {
        nodes: usize,
        matrix: &'static str,
        rows: usize,
        row: usize,
        cols: usize,
    },

    #[error("no feasible solution: {reason}")]
    NoFeasibleSolution {
        reason: String,
        unassigned: Vec<UnassignedOrder>,
    },

    #[error("invalid time window {value:?} on {entity} {id}")]
    InvalidTimeWindowFormat {
        entity: &'static str,
        id: String,
        value: String,
    },

    #[error("order {0} has no location")]
    MissingLocation(String),
}

impl DispatchError {
    pub(crate) fn infeasible(reason: impl Into<String>) -> Self {
        DispatchError::NoFeasibleSolution {
            reason: reason.into(),
            unassigned: Vec::new(),
        }
    }
}
