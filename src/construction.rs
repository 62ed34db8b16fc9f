//! First-solution heuristics.
//!
//! Path-cheapest-arc builds one route per vehicle by always extending with
//! the cheapest feasible arc. Orders it leaves behind get a second chance
//! through cheapest feasible insertion across all routes, then through
//! ejection: a placed order makes room and is itself reinserted elsewhere.
//! When orders are still left over, construction restarts with the vehicles
//! taken in a different order until every order is placed or the search
//! limits run out.

use tracing::debug;

use crate::constraints::ConstraintModel;
use crate::input::DEPOT;
use crate::local_search::SearchLimits;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Construction {
    /// Node sequence per vehicle, depot excluded.
    pub routes: Vec<Vec<usize>>,
    /// Order nodes no feasible position was found for.
    pub unassigned: Vec<usize>,
    /// Construction passes run, including the first.
    pub attempts: usize,
}

/// A single construction pass with vehicles in input order.
pub fn construct(model: &ConstraintModel<'_>) -> Construction {
    let order: Vec<usize> = (0..model.vehicle_count()).collect();
    construct_ordered(model, &order)
}

/// Construction with restarts, stopping at the first pass that places every
/// order or when `limits` interrupt. Keeps the pass with the fewest
/// unassigned orders, then the lowest cost.
pub fn construct_within(model: &ConstraintModel<'_>, limits: &SearchLimits) -> Construction {
    let mut best = construct(model);
    if best.unassigned.is_empty() {
        return best;
    }

    let mut attempts = best.attempts;
    for order in vehicle_orders(model.vehicle_count()).skip(1) {
        if let Some(reason) = limits.interrupted() {
            debug!(?reason, attempts, "construction restarts interrupted");
            break;
        }

        let attempt = construct_ordered(model, &order);
        attempts += 1;
        let better = attempt.unassigned.len() < best.unassigned.len()
            || (attempt.unassigned.len() == best.unassigned.len()
                && total_cost(model, &attempt.routes) < total_cost(model, &best.routes));
        if better {
            best = attempt;
        }
        if best.unassigned.is_empty() {
            break;
        }
    }

    debug!(attempts, unassigned = best.unassigned.len(), "construction finished");
    best.attempts = attempts;
    best
}

/// Vehicle orders tried by successive passes: every rotation of the input
/// order, then every rotation of its reverse.
fn vehicle_orders(vehicles: usize) -> impl Iterator<Item = Vec<usize>> {
    let forward = (0..vehicles).map(move |shift| {
        (0..vehicles)
            .map(|i| (i + shift) % vehicles)
            .collect::<Vec<usize>>()
    });
    let backward = (0..vehicles).map(move |shift| {
        (0..vehicles)
            .rev()
            .map(|i| (i + shift) % vehicles)
            .collect::<Vec<usize>>()
    });
    forward.chain(backward)
}

fn construct_ordered(model: &ConstraintModel<'_>, vehicle_order: &[usize]) -> Construction {
    let mut visited = vec![false; model.node_count()];
    visited[DEPOT] = true;

    let mut routes: Vec<Vec<usize>> = vec![Vec::new(); model.vehicle_count()];
    for &vehicle in vehicle_order {
        routes[vehicle] = path_cheapest_arc(model, vehicle, &mut visited);
    }

    let mut unassigned: Vec<usize> = model.order_nodes().filter(|&node| !visited[node]).collect();
    debug!(
        routed = model.node_count() - 1 - unassigned.len(),
        leftover = unassigned.len(),
        "path cheapest arc finished"
    );

    // Each placement can open room for an order that failed earlier.
    loop {
        let before = unassigned.len();
        unassigned.retain(|&node| {
            !insert_cheapest(model, &mut routes, node) && !insert_with_ejection(model, &mut routes, node)
        });
        if unassigned.is_empty() || unassigned.len() == before {
            break;
        }
    }

    Construction {
        routes,
        unassigned,
        attempts: 1,
    }
}

fn total_cost(model: &ConstraintModel<'_>, routes: &[Vec<usize>]) -> i64 {
    routes.iter().map(|route| model.route_cost(route)).sum()
}

/// Grow one vehicle's route from the depot, marking taken nodes as visited.
fn path_cheapest_arc(model: &ConstraintModel<'_>, vehicle: usize, visited: &mut [bool]) -> Vec<usize> {
    let mut route: Vec<usize> = Vec::new();

    loop {
        let last = route.last().copied().unwrap_or(DEPOT);
        let mut candidates: Vec<usize> = model
            .order_nodes()
            .filter(|&node| !visited[node] && model.is_allowed(vehicle, node))
            .collect();
        candidates.sort_by_key(|&node| (model.arc_cost(last, node), node));

        let next = candidates.into_iter().find(|&node| {
            route.push(node);
            let feasible = model.schedule(vehicle, &route).is_some();
            route.pop();
            feasible
        });

        match next {
            Some(node) => {
                route.push(node);
                visited[node] = true;
            }
            None => return route,
        }
    }
}

/// Cheapest feasible way to put `node` into `route`, as the new sequence
/// and its cost.
fn cheapest_position(
    model: &ConstraintModel<'_>,
    vehicle: usize,
    route: &[usize],
    node: usize,
) -> Option<(Vec<usize>, i64)> {
    if !model.is_allowed(vehicle, node) {
        return None;
    }

    let mut best: Option<(Vec<usize>, i64)> = None;
    for position in 0..=route.len() {
        let mut candidate = route.to_vec();
        candidate.insert(position, node);

        let cost = model.route_cost(&candidate);
        if best.as_ref().is_some_and(|(_, best_cost)| cost >= *best_cost) {
            continue;
        }
        if model.schedule(vehicle, &candidate).is_some() {
            best = Some((candidate, cost));
        }
    }
    best
}

/// Insert a node at its cheapest feasible position. Returns false if there
/// is none.
fn insert_cheapest(model: &ConstraintModel<'_>, routes: &mut [Vec<usize>], node: usize) -> bool {
    let mut best: Option<(usize, Vec<usize>, i64)> = None;

    for (vehicle, route) in routes.iter().enumerate() {
        let Some((candidate, cost)) = cheapest_position(model, vehicle, route, node) else {
            continue;
        };
        let delta = cost - model.route_cost(route);
        if best.as_ref().is_none_or(|(_, _, best_delta)| delta < *best_delta) {
            best = Some((vehicle, candidate, delta));
        }
    }

    match best {
        Some((vehicle, candidate, _)) => {
            routes[vehicle] = candidate;
            true
        }
        None => false,
    }
}

/// Place `node` by taking a placed order out of a route and reinserting
/// that order elsewhere, possibly back into the same route. Picks the
/// cheapest such exchange. Returns false if there is none.
fn insert_with_ejection(model: &ConstraintModel<'_>, routes: &mut [Vec<usize>], node: usize) -> bool {
    // (host vehicle, host route, receiving vehicle, receiving route, delta)
    let mut best: Option<(usize, Vec<usize>, usize, Vec<usize>, i64)> = None;

    for host in 0..routes.len() {
        if !model.is_allowed(host, node) {
            continue;
        }
        let host_cost = model.route_cost(&routes[host]);

        for position in 0..routes[host].len() {
            let mut reduced = routes[host].clone();
            let ejected = reduced.remove(position);
            let Some((host_route, _)) = cheapest_position(model, host, &reduced, node) else {
                continue;
            };

            for receiver in 0..routes.len() {
                let base = if receiver == host { &host_route } else { &routes[receiver] };
                let Some((receiver_route, receiver_cost)) = cheapest_position(model, receiver, base, ejected)
                else {
                    continue;
                };

                let delta = if receiver == host {
                    receiver_cost - host_cost
                } else {
                    model.route_cost(&host_route) + receiver_cost
                        - host_cost
                        - model.route_cost(&routes[receiver])
                };
                if best.as_ref().is_none_or(|entry| delta < entry.4) {
                    best = Some((host, host_route.clone(), receiver, receiver_route, delta));
                }
            }
        }
    }

    match best {
        Some((host, host_route, receiver, receiver_route, _)) => {
            if host != receiver {
                routes[host] = host_route;
            }
            routes[receiver] = receiver_route;
            true
        }
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use std::time::{Duration, Instant};

    use super::*;
    use crate::config::SolveOptions;
    use crate::local_search::CancelToken;
    use crate::model::{CargoTemperature, Order, Vehicle, VehicleClass};

    fn limits(cancel: Option<CancelToken>) -> SearchLimits {
        SearchLimits {
            deadline: Some(Instant::now() + Duration::from_secs(30)),
            solution_limit: 100,
            max_stalled_rounds: 10,
            cancel,
        }
    }

    fn star(distances_from_depot: &[f64]) -> (Vec<Vec<f64>>, Vec<Vec<f64>>) {
        let size = distances_from_depot.len() + 1;
        let mut distance = vec![vec![0.0; size]; size];
        for (index, &d) in distances_from_depot.iter().enumerate() {
            distance[0][index + 1] = d;
            distance[index + 1][0] = d;
        }
        for i in 1..size {
            for j in 1..size {
                if i != j {
                    distance[i][j] = distance[0][i] + distance[0][j];
                }
            }
        }
        let time = distance.clone();
        (distance, time)
    }

    #[test]
    fn test_cheapest_arc_first() {
        let vehicles = vec![Vehicle::new("v1", VehicleClass::Frozen, 10)];
        let orders = vec![
            Order::new("far", CargoTemperature::Frozen, 1),
            Order::new("near", CargoTemperature::Frozen, 1),
        ];
        let (distance, time) = star(&[9.0, 2.0]);
        let options = SolveOptions::default();
        let model = ConstraintModel::build(&vehicles, &orders, &distance, &time, &options).unwrap();

        let construction = construct(&model);
        assert_eq!(construction.routes, vec![vec![2, 1]]);
        assert!(construction.unassigned.is_empty());
    }

    #[test]
    fn test_full_vehicle_hands_over_to_next() {
        let vehicles = vec![
            Vehicle::new("v1", VehicleClass::Frozen, 5),
            Vehicle::new("v2", VehicleClass::Frozen, 5),
        ];
        let orders = vec![
            Order::new("a", CargoTemperature::Frozen, 4),
            Order::new("b", CargoTemperature::Frozen, 3),
        ];
        let (distance, time) = star(&[1.0, 2.0]);
        let options = SolveOptions::default();
        let model = ConstraintModel::build(&vehicles, &orders, &distance, &time, &options).unwrap();

        let construction = construct(&model);
        assert_eq!(construction.routes, vec![vec![1], vec![2]]);
    }

    #[test]
    fn test_incompatible_order_stays_unassigned() {
        let vehicles = vec![Vehicle::new("v1", VehicleClass::Frozen, 10)];
        let orders = vec![
            Order::new("ice", CargoTemperature::Frozen, 1),
            Order::new("bread", CargoTemperature::Ambient, 1),
        ];
        let (distance, time) = star(&[1.0, 1.0]);
        let options = SolveOptions::default();
        let model = ConstraintModel::build(&vehicles, &orders, &distance, &time, &options).unwrap();

        let construction = construct(&model);
        assert_eq!(construction.routes, vec![vec![1]]);
        assert_eq!(construction.unassigned, vec![2]);
    }

    #[test]
    fn test_insertion_repairs_greedy_dead_end() {
        // Greedy takes the near order first and then cannot reach the far
        // one before its window closes; inserting it first works.
        let vehicles = vec![Vehicle::new("v1", VehicleClass::Frozen, 10)];
        let mut near = Order::new("near", CargoTemperature::Frozen, 1);
        near.pickup_time_start = "00:00".to_string();
        near.pickup_time_end = "02:00".to_string();
        let mut far = Order::new("far", CargoTemperature::Frozen, 1);
        far.pickup_time_start = "00:00".to_string();
        far.pickup_time_end = "00:20".to_string();
        let orders = vec![near, far];
        let (distance, time) = star(&[5.0, 15.0]);
        let options = SolveOptions::default();
        let model = ConstraintModel::build(&vehicles, &orders, &distance, &time, &options).unwrap();

        let construction = construct(&model);
        assert_eq!(construction.routes, vec![vec![2, 1]]);
        assert!(construction.unassigned.is_empty());
    }

    #[test]
    fn test_ejection_makes_room_for_tight_packing() {
        // Greedy loads [4, 5] and [5]; the 6 only fits once a 5 moves over.
        let vehicles = vec![
            Vehicle::new("v1", VehicleClass::Frozen, 10),
            Vehicle::new("v2", VehicleClass::Frozen, 10),
        ];
        let orders = vec![
            Order::new("o1", CargoTemperature::Frozen, 4),
            Order::new("o2", CargoTemperature::Frozen, 5),
            Order::new("o3", CargoTemperature::Frozen, 5),
            Order::new("o4", CargoTemperature::Frozen, 6),
        ];
        let (distance, time) = star(&[1.0, 2.0, 3.0, 4.0]);
        let options = SolveOptions::default();
        let model = ConstraintModel::build(&vehicles, &orders, &distance, &time, &options).unwrap();

        let construction = construct(&model);
        assert!(construction.unassigned.is_empty());
        for (vehicle, route) in construction.routes.iter().enumerate() {
            let pallets: u32 = route.iter().map(|&node| model.demand(node)).sum();
            assert!(pallets <= 10);
            assert!(model.schedule(vehicle, route).is_some());
        }
    }

    #[test]
    fn test_restarts_run_until_orders_exhausted() {
        let vehicles = vec![
            Vehicle::new("v1", VehicleClass::Frozen, 10),
            Vehicle::new("v2", VehicleClass::Frozen, 10),
        ];
        let orders = vec![Order::new("bread", CargoTemperature::Ambient, 1)];
        let (distance, time) = star(&[1.0]);
        let options = SolveOptions::default();
        let model = ConstraintModel::build(&vehicles, &orders, &distance, &time, &options).unwrap();

        let construction = construct_within(&model, &limits(None));
        assert_eq!(construction.unassigned, vec![1]);
        // Two rotations forward, two reversed.
        assert_eq!(construction.attempts, 4);
    }

    #[test]
    fn test_restarts_stop_when_cancelled() {
        let vehicles = vec![
            Vehicle::new("v1", VehicleClass::Frozen, 10),
            Vehicle::new("v2", VehicleClass::Frozen, 10),
        ];
        let orders = vec![Order::new("bread", CargoTemperature::Ambient, 1)];
        let (distance, time) = star(&[1.0]);
        let options = SolveOptions::default();
        let model = ConstraintModel::build(&vehicles, &orders, &distance, &time, &options).unwrap();

        let token = CancelToken::new();
        token.cancel();
        let construction = construct_within(&model, &limits(Some(token)));
        assert_eq!(construction.unassigned, vec![1]);
        assert_eq!(construction.attempts, 1);
    }

    #[test]
    fn test_vehicle_orders_cover_rotations() {
        let orders: Vec<Vec<usize>> = vehicle_orders(3).collect();
        assert_eq!(orders.len(), 6);
        assert_eq!(orders[0], vec![0, 1, 2]);
        assert_eq!(orders[1], vec![1, 2, 0]);
        assert_eq!(orders[3], vec![2, 1, 0]);
        assert!(vehicle_orders(0).next().is_none());
    }
}
