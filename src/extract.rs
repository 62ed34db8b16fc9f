//! Turns solver routes into stop lists and a fleet summary.

use serde::Serialize;

use crate::constraints::ConstraintModel;
use crate::error::{DispatchError, UnassignedOrder};
use crate::local_search::SearchStats;
use crate::model::{CargoTemperature, VehicleClass};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RouteStop {
    /// 1-based position in the route.
    pub sequence: usize,
    pub order_id: String,
    pub temperature_type: CargoTemperature,
    pub pallets: u32,
    pub weight_kg: f64,
    /// Minutes from midnight the vehicle reaches the stop.
    pub arrival_minute: i64,
    /// Minutes from midnight service begins; inside the order's window.
    pub service_start_minute: i64,
    pub cumulative_pallets: u32,
    pub cumulative_weight_kg: f64,
    pub cumulative_distance_km: f64,
    /// Minutes since the vehicle left the depot.
    pub cumulative_time_minutes: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Route {
    pub vehicle_id: String,
    pub vehicle_class: VehicleClass,
    pub departure_minute: i64,
    pub stops: Vec<RouteStop>,
    pub total_distance_km: f64,
    pub total_time_minutes: i64,
    pub total_pallets: u32,
    pub total_weight_kg: f64,
    /// Route pallets over the vehicle's `max_pallets`.
    pub utilization: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Summary {
    pub total_distance_km: f64,
    pub total_time_hours: f64,
    pub total_pallets: u32,
    pub vehicles_used: usize,
    pub orders_assigned: usize,
    /// Mean utilization over used vehicles, 0 when none is used.
    pub average_utilization: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Solution {
    pub routes: Vec<Route>,
    pub summary: Summary,
    /// Sum of arc costs in meters.
    pub objective_value: i64,
    pub search: SearchStats,
}

/// Discriminated result handed to the orchestrating caller.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DispatchReport {
    Success(Solution),
    Failed {
        error: String,
        #[serde(skip_serializing_if = "Vec::is_empty")]
        unassigned: Vec<UnassignedOrder>,
    },
}

impl From<Result<Solution, DispatchError>> for DispatchReport {
    fn from(result: Result<Solution, DispatchError>) -> Self {
        match result {
            Ok(solution) => DispatchReport::Success(solution),
            Err(err) => {
                let error = err.to_string();
                let unassigned = match err {
                    DispatchError::NoFeasibleSolution { unassigned, .. } => unassigned,
                    _ => Vec::new(),
                };
                DispatchReport::Failed { error, unassigned }
            }
        }
    }
}

/// Build the solution for per-vehicle node sequences. Vehicles without
/// stops are left out.
pub fn extract(
    model: &ConstraintModel<'_>,
    routes: &[Vec<usize>],
    search: SearchStats,
) -> Result<Solution, DispatchError> {
    let mut out = Vec::new();
    let mut objective_value = 0;

    for (vehicle_index, nodes) in routes.iter().enumerate() {
        if nodes.is_empty() {
            continue;
        }
        let vehicle = &model.vehicles()[vehicle_index];
        let schedule = model.schedule(vehicle_index, nodes).ok_or_else(|| {
            DispatchError::infeasible(format!("route for vehicle {} violates its constraints", vehicle.id))
        })?;

        let mut stops = Vec::with_capacity(schedule.stops.len());
        for (position, stop) in schedule.stops.iter().enumerate() {
            let Some(order) = model.order_at(stop.node) else {
                continue;
            };
            stops.push(RouteStop {
                sequence: position + 1,
                order_id: order.id.clone(),
                temperature_type: order.temperature_type,
                pallets: order.required_pallets,
                weight_kg: order.weight_kg,
                arrival_minute: stop.arrival,
                service_start_minute: stop.start,
                cumulative_pallets: stop.pallets,
                cumulative_weight_kg: stop.weight_kg,
                cumulative_distance_km: meters_to_km(stop.distance_m),
                cumulative_time_minutes: stop.elapsed,
            });
        }

        let total_pallets = schedule.pallets();
        let utilization = if vehicle.max_pallets == 0 {
            0.0
        } else {
            f64::from(total_pallets) / f64::from(vehicle.max_pallets)
        };

        objective_value += schedule.cost;
        out.push(Route {
            vehicle_id: vehicle.id.clone(),
            vehicle_class: vehicle.temperature_class,
            departure_minute: schedule.departure,
            stops,
            total_distance_km: meters_to_km(schedule.cost),
            total_time_minutes: schedule.elapsed(),
            total_pallets,
            total_weight_kg: schedule.weight_kg(),
            utilization,
        });
    }

    let summary = summarize(&out);
    Ok(Solution {
        routes: out,
        summary,
        objective_value,
        search,
    })
}

fn summarize(routes: &[Route]) -> Summary {
    if routes.is_empty() {
        return Summary::default();
    }

    let total_minutes: i64 = routes.iter().map(|route| route.total_time_minutes).sum();
    Summary {
        total_distance_km: routes.iter().map(|route| route.total_distance_km).sum(),
        total_time_hours: total_minutes as f64 / 60.0,
        total_pallets: routes.iter().map(|route| route.total_pallets).sum(),
        vehicles_used: routes.len(),
        orders_assigned: routes.iter().map(|route| route.stops.len()).sum(),
        average_utilization: routes.iter().map(|route| route.utilization).sum::<f64>()
            / routes.len() as f64,
    }
}

fn meters_to_km(meters: i64) -> f64 {
    meters as f64 / 1000.0
}
