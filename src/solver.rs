//! Dispatch solver entry points.

use std::time::Instant;

use tracing::{debug, info, instrument};

use crate::config::SolveOptions;
use crate::constraints::ConstraintModel;
use crate::construction::construct_within;
use crate::error::{DispatchError, UnassignedOrder};
use crate::extract::{extract, Solution};
use crate::input::assemble_locations;
use crate::local_search::{GuidedLocalSearch, SearchLimits};
use crate::model::{Location, Order, Vehicle};
use crate::traits::MatrixProvider;

pub use crate::local_search::CancelToken;

/// Assign `orders` to `vehicles` over precomputed matrices.
///
/// Matrices are indexed depot first, then orders in input order.
pub fn solve(
    vehicles: &[Vehicle],
    orders: &[Order],
    distance_matrix: &[Vec<f64>],
    time_matrix: &[Vec<f64>],
    options: &SolveOptions,
) -> Result<Solution, DispatchError> {
    solve_with_cancel(vehicles, orders, distance_matrix, time_matrix, options, None)
}

/// [`solve`] with a cancellation token.
///
/// The time limit and the token bound both construction restarts and
/// improvement. Cancelling during improvement keeps the best solution found
/// so far; the first construction pass always runs to completion.
#[instrument(skip_all, fields(vehicles = vehicles.len(), orders = orders.len()))]
pub fn solve_with_cancel(
    vehicles: &[Vehicle],
    orders: &[Order],
    distance_matrix: &[Vec<f64>],
    time_matrix: &[Vec<f64>],
    options: &SolveOptions,
    cancel: Option<CancelToken>,
) -> Result<Solution, DispatchError> {
    let started = Instant::now();
    let model = ConstraintModel::build(vehicles, orders, distance_matrix, time_matrix, options)?;

    let limits = SearchLimits {
        deadline: started.checked_add(options.time_limit()),
        solution_limit: options.solution_limit,
        max_stalled_rounds: options.max_stalled_rounds,
        cancel,
    };

    let construction = construct_within(&model, &limits);
    if !construction.unassigned.is_empty() {
        let unassigned: Vec<UnassignedOrder> = construction
            .unassigned
            .iter()
            .filter_map(|&node| {
                model.order_at(node).map(|order| UnassignedOrder {
                    order_id: order.id.clone(),
                    reason: model.unassigned_reason(node),
                })
            })
            .collect();
        info!(
            unassigned = unassigned.len(),
            attempts = construction.attempts,
            "no feasible assignment for every order"
        );
        return Err(DispatchError::NoFeasibleSolution {
            reason: format!("{} of {} orders could not be routed", unassigned.len(), orders.len()),
            unassigned,
        });
    }
    debug!(
        elapsed_ms = started.elapsed().as_millis() as u64,
        attempts = construction.attempts,
        "first solution built"
    );

    let mut search = GuidedLocalSearch::new(&model, &construction.routes);
    let (routes, stats) = search.run(construction.routes, &limits);

    let solution = extract(&model, &routes, stats)?;
    info!(
        objective = solution.objective_value,
        vehicles_used = solution.summary.vehicles_used,
        orders_assigned = solution.summary.orders_assigned,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "dispatch solved"
    );
    Ok(solution)
}

/// Full pipeline from coordinates: assemble nodes, fetch matrices, solve.
pub fn plan<M: MatrixProvider>(
    depot: Location,
    vehicles: &[Vehicle],
    orders: &[Order],
    provider: &M,
    options: &SolveOptions,
) -> Result<Solution, DispatchError> {
    let locations = assemble_locations(depot, orders)?;
    let matrices = provider.matrices_for(&locations);
    solve(vehicles, orders, &matrices.distance_km, &matrices.time_minutes, options)
}
