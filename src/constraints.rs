//! Constraint model: the dispatch problem as the search sees it.
//!
//! Vehicles, orders and matrices are translated into per-node demands, arc
//! costs in whole meters, travel times in whole minutes, time windows and a
//! per-vehicle allowed-node set. Constraints are registered by name so the
//! model can be inspected and tested without running a search.

use tracing::warn;

use crate::config::{SolveOptions, TimeWindowPolicy};
use crate::error::{DispatchError, UnassignedReason};
use crate::input::{order_node, validate_shape, NodeKind, DEPOT};
use crate::model::{parse_clock, Order, Vehicle, MINUTES_PER_DAY};

const WEIGHT_EPSILON_KG: f64 = 1e-6;

/// Arc cost and travel time of a pair with no usable route. Large enough to
/// dominate any real route, small enough that sums over a route cannot
/// overflow.
pub const UNREACHABLE: i64 = 1_000_000_000_000;

/// Why a route walk stopped.
enum Rejection {
    /// A stop would wait this many minutes past the slack.
    WaitsTooLong(i64),
    Infeasible,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConstraintKind {
    Capacity,
    Weight,
    TimeWindow,
    Compatibility,
}

#[derive(Debug, Clone)]
struct TimeDimension {
    /// [open, close] per node, minutes from midnight.
    windows: Vec<(i64, i64)>,
    /// [earliest departure, latest return] per vehicle.
    work: Vec<(i64, i64)>,
    /// Elapsed-time ceiling per vehicle.
    max_elapsed: Vec<i64>,
    slack: i64,
}

/// Timing and load at one stop of an evaluated route.
#[derive(Debug, Clone, PartialEq)]
pub struct StopSchedule {
    pub node: usize,
    /// Clock time the vehicle reaches the stop.
    pub arrival: i64,
    /// Clock time service begins, after any wait for the window to open.
    pub start: i64,
    /// Minutes since departure at service start.
    pub elapsed: i64,
    pub pallets: u32,
    pub weight_kg: f64,
    /// Meters driven from the depot up to this stop.
    pub distance_m: i64,
}

/// A feasible route with its timing.
#[derive(Debug, Clone, PartialEq)]
pub struct RouteSchedule {
    pub departure: i64,
    pub end: i64,
    pub stops: Vec<StopSchedule>,
    /// Arc cost in meters, including the closing arc when routes return.
    pub cost: i64,
}

impl RouteSchedule {
    pub fn elapsed(&self) -> i64 {
        self.end - self.departure
    }

    pub fn pallets(&self) -> u32 {
        self.stops.last().map_or(0, |stop| stop.pallets)
    }

    pub fn weight_kg(&self) -> f64 {
        self.stops.last().map_or(0.0, |stop| stop.weight_kg)
    }
}

pub struct ConstraintModel<'a> {
    vehicles: &'a [Vehicle],
    orders: &'a [Order],
    options: &'a SolveOptions,
    arc_cost: Vec<Vec<i64>>,
    travel: Vec<Vec<i64>>,
    demand: Vec<u32>,
    weight: Vec<f64>,
    capacity: bool,
    weight_limit: bool,
    time: Option<TimeDimension>,
    /// `allowed[vehicle][node]`; absent means every pairing is allowed.
    allowed: Option<Vec<Vec<bool>>>,
    registered: Vec<ConstraintKind>,
}

impl<'a> ConstraintModel<'a> {
    /// An unconstrained model over validated inputs.
    pub fn new(
        vehicles: &'a [Vehicle],
        orders: &'a [Order],
        distance_km: &[Vec<f64>],
        time_minutes: &[Vec<f64>],
        options: &'a SolveOptions,
    ) -> Result<Self, DispatchError> {
        let nodes = orders.len() + 1;
        validate_shape(nodes, "distance", distance_km)?;
        validate_shape(nodes, "time", time_minutes)?;

        let mut demand = vec![0; nodes];
        let mut weight = vec![0.0; nodes];
        for (index, order) in orders.iter().enumerate() {
            demand[order_node(index)] = order.required_pallets;
            weight[order_node(index)] = order.weight_kg;
        }

        Ok(Self {
            vehicles,
            orders,
            options,
            arc_cost: to_whole_units(distance_km, 1000.0),
            travel: to_whole_units(time_minutes, 1.0),
            demand,
            weight,
            capacity: false,
            weight_limit: false,
            time: None,
            allowed: None,
            registered: Vec::new(),
        })
    }

    /// A model with every constraint the options ask for.
    pub fn build(
        vehicles: &'a [Vehicle],
        orders: &'a [Order],
        distance_km: &[Vec<f64>],
        time_minutes: &[Vec<f64>],
        options: &'a SolveOptions,
    ) -> Result<Self, DispatchError> {
        let mut model = Self::new(vehicles, orders, distance_km, time_minutes, options)?;
        model.add_compatibility_constraint();
        model.add_capacity_constraint();
        if options.enforce_weight_limit {
            model.add_weight_constraint();
        }
        model.add_time_window_constraint()?;
        Ok(model)
    }

    /// Running pallet load must stay within `max_pallets`.
    pub fn add_capacity_constraint(&mut self) {
        self.capacity = true;
        self.register(ConstraintKind::Capacity);
    }

    /// Running weight must stay within `max_weight_kg`. Vehicles without a
    /// positive weight limit are unconstrained.
    pub fn add_weight_constraint(&mut self) {
        self.weight_limit = true;
        self.register(ConstraintKind::Weight);
    }

    /// Pickup windows, waiting slack, work windows and the driving ceiling.
    pub fn add_time_window_constraint(&mut self) -> Result<(), DispatchError> {
        let policy = self.options.time_window_policy;

        let mut windows = vec![(0, MINUTES_PER_DAY); self.node_count()];
        for (index, order) in self.orders.iter().enumerate() {
            let open = clock("order", &order.id, &order.pickup_time_start, policy)?;
            let close = clock("order", &order.id, &order.pickup_time_end, policy)?;
            windows[order_node(index)] = (open, close);
        }

        let mut work = Vec::with_capacity(self.vehicles.len());
        let mut max_elapsed = Vec::with_capacity(self.vehicles.len());
        for vehicle in self.vehicles {
            let start = match &vehicle.work_start_time {
                Some(value) => clock("vehicle", &vehicle.id, value, policy)?,
                None => 0,
            };
            let end = match &vehicle.work_end_time {
                Some(value) => clock("vehicle", &vehicle.id, value, policy)?,
                None => i64::MAX,
            };
            work.push((start, end));
            max_elapsed.push(
                i64::from(vehicle.max_driving_minutes).min(self.options.max_driving_minutes()),
            );
        }

        self.time = Some(TimeDimension {
            windows,
            work,
            max_elapsed,
            slack: i64::from(self.options.waiting_slack_minutes),
        });
        self.register(ConstraintKind::TimeWindow);
        Ok(())
    }

    /// Remove temperature-incompatible orders from each vehicle's allowed set.
    pub fn add_compatibility_constraint(&mut self) {
        let allowed = self
            .vehicles
            .iter()
            .map(|vehicle| {
                let mut row = vec![true; self.node_count()];
                for (index, order) in self.orders.iter().enumerate() {
                    row[order_node(index)] =
                        vehicle.temperature_class.can_carry(order.temperature_type);
                }
                row
            })
            .collect();
        self.allowed = Some(allowed);
        self.register(ConstraintKind::Compatibility);
    }

    fn register(&mut self, kind: ConstraintKind) {
        if !self.registered.contains(&kind) {
            self.registered.push(kind);
        }
    }

    pub fn constraints(&self) -> &[ConstraintKind] {
        &self.registered
    }

    pub fn vehicles(&self) -> &'a [Vehicle] {
        self.vehicles
    }

    pub fn orders(&self) -> &'a [Order] {
        self.orders
    }

    pub fn options(&self) -> &'a SolveOptions {
        self.options
    }

    pub fn vehicle_count(&self) -> usize {
        self.vehicles.len()
    }

    pub fn node_count(&self) -> usize {
        self.orders.len() + 1
    }

    pub fn order_nodes(&self) -> impl Iterator<Item = usize> {
        1..self.node_count()
    }

    /// The order a node stands for; `None` for the depot.
    pub fn order_at(&self, node: usize) -> Option<&'a Order> {
        match NodeKind::of(node) {
            NodeKind::Depot => None,
            NodeKind::Order(index) => self.orders.get(index),
        }
    }

    pub fn demand(&self, node: usize) -> u32 {
        self.demand[node]
    }

    /// Arc cost in meters.
    pub fn arc_cost(&self, from: usize, to: usize) -> i64 {
        self.arc_cost[from][to]
    }

    pub fn is_allowed(&self, vehicle: usize, node: usize) -> bool {
        self.allowed
            .as_ref()
            .is_none_or(|allowed| allowed[vehicle][node])
    }

    pub fn window(&self, node: usize) -> Option<(i64, i64)> {
        self.time.as_ref().map(|time| time.windows[node])
    }

    /// Arcs a route drives, depot to depot when routes return.
    pub fn route_arcs(&self, nodes: &[usize]) -> Vec<(usize, usize)> {
        let Some(&last) = nodes.last() else {
            return Vec::new();
        };
        let mut arcs = Vec::with_capacity(nodes.len() + 1);
        let mut prev = DEPOT;
        for &node in nodes {
            arcs.push((prev, node));
            prev = node;
        }
        if self.options.return_to_depot {
            arcs.push((last, DEPOT));
        }
        arcs
    }

    /// Arc cost of a route without checking feasibility.
    pub fn route_cost(&self, nodes: &[usize]) -> i64 {
        self.route_arcs(nodes)
            .into_iter()
            .map(|(from, to)| self.arc_cost(from, to))
            .sum()
    }

    /// Evaluate a stop sequence for one vehicle.
    ///
    /// Returns `None` if any registered constraint is violated anywhere along
    /// the route. The vehicle leaves as early as its work window and the
    /// first pickup window allow, later when a stop further down the route
    /// would otherwise wait longer than the slack.
    pub fn schedule(&self, vehicle: usize, nodes: &[usize]) -> Option<RouteSchedule> {
        let mut departure = match (&self.time, nodes.first()) {
            (Some(time), Some(&first)) if first < self.node_count() => {
                let (work_start, _) = time.work[vehicle];
                work_start.max(time.windows[first].0 - self.travel[DEPOT][first])
            }
            (Some(time), _) => time.work[vehicle].0,
            (None, _) => 0,
        };

        // Leaving later never adds waiting and never ends the route earlier,
        // so the first departure that respects every slack is the best one.
        loop {
            match self.simulate(vehicle, nodes, departure) {
                Ok(schedule) => return Some(schedule),
                Err(Rejection::WaitsTooLong(excess)) => departure += excess,
                Err(Rejection::Infeasible) => return None,
            }
        }
    }

    /// Walk the route leaving the depot at `departure`.
    fn simulate(&self, vehicle: usize, nodes: &[usize], departure: i64) -> Result<RouteSchedule, Rejection> {
        let truck = &self.vehicles[vehicle];
        let service = i64::from(self.options.service_minutes);

        let mut clock = departure;
        let mut prev = DEPOT;
        let mut pallets = 0u32;
        let mut weight_kg = 0.0;
        let mut distance_m = 0;
        let mut stops = Vec::with_capacity(nodes.len());

        for &node in nodes {
            if node == DEPOT || node >= self.node_count() || !self.is_allowed(vehicle, node) {
                return Err(Rejection::Infeasible);
            }
            if !self.is_reachable(prev, node) {
                return Err(Rejection::Infeasible);
            }

            pallets = pallets.saturating_add(self.demand[node]);
            if self.capacity && pallets > truck.max_pallets {
                return Err(Rejection::Infeasible);
            }
            weight_kg += self.weight[node];
            if self.weight_limit
                && truck.max_weight_kg > 0.0
                && weight_kg > truck.max_weight_kg + WEIGHT_EPSILON_KG
            {
                return Err(Rejection::Infeasible);
            }

            distance_m += self.arc_cost[prev][node];
            let arrival = clock + self.travel[prev][node];
            let mut start = arrival;
            if let Some(time) = &self.time {
                let (open, close) = time.windows[node];
                if start < open {
                    if open - start > time.slack {
                        return Err(Rejection::WaitsTooLong(open - start - time.slack));
                    }
                    start = open;
                }
                if start > close {
                    return Err(Rejection::Infeasible);
                }
            }

            stops.push(StopSchedule {
                node,
                arrival,
                start,
                elapsed: start - departure,
                pallets,
                weight_kg,
                distance_m,
            });
            clock = start + service;
            prev = node;
        }

        let mut end = clock;
        let mut cost = distance_m;
        if self.options.return_to_depot && !nodes.is_empty() {
            if !self.is_reachable(prev, DEPOT) {
                return Err(Rejection::Infeasible);
            }
            end += self.travel[prev][DEPOT];
            cost += self.arc_cost[prev][DEPOT];
        }

        if let Some(time) = &self.time {
            if end - departure > time.max_elapsed[vehicle] || end > time.work[vehicle].1 {
                return Err(Rejection::Infeasible);
            }
        }

        Ok(RouteSchedule {
            departure,
            end,
            stops,
            cost,
        })
    }

    fn is_reachable(&self, from: usize, to: usize) -> bool {
        self.arc_cost[from][to] < UNREACHABLE && self.travel[from][to] < UNREACHABLE
    }

    /// Best guess at why an order could not be routed.
    pub fn unassigned_reason(&self, node: usize) -> UnassignedReason {
        let compatible: Vec<usize> = (0..self.vehicle_count())
            .filter(|&vehicle| self.is_allowed(vehicle, node))
            .collect();

        if compatible.is_empty() {
            return UnassignedReason::NoCompatibleVehicle;
        }

        let fits = |vehicle: &Vehicle| {
            let pallets_fit = !self.capacity || self.demand[node] <= vehicle.max_pallets;
            let weight_fits = !self.weight_limit
                || vehicle.max_weight_kg <= 0.0
                || self.weight[node] <= vehicle.max_weight_kg + WEIGHT_EPSILON_KG;
            pallets_fit && weight_fits
        };
        let fitting: Vec<usize> = compatible
            .into_iter()
            .filter(|&vehicle| fits(&self.vehicles[vehicle]))
            .collect();
        if fitting.is_empty() {
            return UnassignedReason::ExceedsCapacity;
        }

        if fitting
            .into_iter()
            .any(|vehicle| self.schedule(vehicle, &[node]).is_some())
        {
            UnassignedReason::NoFeasiblePosition
        } else {
            UnassignedReason::NoFeasibleWindow
        }
    }
}

/// Round a real-valued matrix to whole units after scaling. Non-finite and
/// out-of-range entries become [`UNREACHABLE`].
fn to_whole_units(matrix: &[Vec<f64>], scale: f64) -> Vec<Vec<i64>> {
    matrix
        .iter()
        .map(|row| {
            row.iter()
                .map(|value| {
                    let scaled = (value.max(0.0) * scale).round();
                    if !value.is_finite() || scaled >= UNREACHABLE as f64 {
                        UNREACHABLE
                    } else {
                        scaled as i64
                    }
                })
                .collect()
        })
        .collect()
}

fn clock(
    entity: &'static str,
    id: &str,
    value: &str,
    policy: TimeWindowPolicy,
) -> Result<i64, DispatchError> {
    if let Some(minutes) = parse_clock(value) {
        return Ok(minutes);
    }
    match policy {
        TimeWindowPolicy::Strict => Err(DispatchError::InvalidTimeWindowFormat {
            entity,
            id: id.to_string(),
            value: value.to_string(),
        }),
        TimeWindowPolicy::Lenient => {
            warn!(entity, id, value, "malformed time window, defaulting to midnight");
            Ok(0)
        }
    }
}
