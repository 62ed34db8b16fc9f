//! Guided local search over relocate, swap and 2-opt moves.
//!
//! Moves are scored on an augmented cost: arc cost plus `lambda` times the
//! penalty accumulated on every arc the route drives. When no move improves
//! the augmented cost, the arcs with the highest `cost / (1 + penalty)` get
//! one more penalty unit, which pushes the search out of the local optimum.
//! Every accepted move keeps all routes feasible, and the best solution by
//! plain arc cost is what gets returned.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use tracing::{debug, instrument};

use crate::constraints::ConstraintModel;

/// Cooperative cancellation flag, checked once per search iteration.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    SolutionLimit,
    TimeLimit,
    Cancelled,
    /// Penalties stopped producing moves, or there was nothing to move.
    #[default]
    Exhausted,
}

#[derive(Debug, Clone)]
pub struct SearchLimits {
    /// `None` when the time budget does not fit in an `Instant`.
    pub deadline: Option<Instant>,
    pub solution_limit: usize,
    pub max_stalled_rounds: usize,
    pub cancel: Option<CancelToken>,
}

impl SearchLimits {
    /// Cancellation or an expired deadline; the solution limit is checked by
    /// each phase against its own count.
    pub fn interrupted(&self) -> Option<StopReason> {
        if self.cancel.as_ref().is_some_and(CancelToken::is_cancelled) {
            return Some(StopReason::Cancelled);
        }
        if self.deadline.is_some_and(|deadline| Instant::now() >= deadline) {
            return Some(StopReason::TimeLimit);
        }
        None
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SearchStats {
    pub iterations: usize,
    pub accepted_moves: usize,
    pub penalty_rounds: usize,
    pub initial_cost: i64,
    pub best_cost: i64,
    pub stop_reason: StopReason,
}

/// Replacement sequences for the routes a move touches.
type Rewrite = Vec<(usize, Vec<usize>)>;

pub struct GuidedLocalSearch<'m, 'a> {
    model: &'m ConstraintModel<'a>,
    /// Penalty count per directed arc.
    penalties: Vec<Vec<u32>>,
    lambda: i64,
}

impl<'m, 'a> GuidedLocalSearch<'m, 'a> {
    pub fn new(model: &'m ConstraintModel<'a>, routes: &[Vec<usize>]) -> Self {
        let n = model.node_count();
        let arcs: usize = routes.iter().map(|route| model.route_arcs(route).len()).sum();
        let cost: i64 = routes.iter().map(|route| model.route_cost(route)).sum();

        let lambda = if arcs == 0 {
            1
        } else {
            let mean_arc = cost as f64 / arcs as f64;
            ((model.options().penalty_factor * mean_arc).round() as i64).max(1)
        };

        Self {
            model,
            penalties: vec![vec![0; n]; n],
            lambda,
        }
    }

    pub fn lambda(&self) -> i64 {
        self.lambda
    }

    fn augmented_cost(&self, nodes: &[usize]) -> i64 {
        self.model
            .route_arcs(nodes)
            .into_iter()
            .map(|(from, to)| {
                self.model.arc_cost(from, to) + self.lambda * i64::from(self.penalties[from][to])
            })
            .sum()
    }

    fn total_cost(&self, routes: &[Vec<usize>]) -> i64 {
        routes.iter().map(|route| self.model.route_cost(route)).sum()
    }

    /// Improve feasible `routes` until a limit triggers. Returns the best
    /// routes seen by plain arc cost.
    #[instrument(skip_all, fields(lambda = self.lambda))]
    pub fn run(&mut self, mut routes: Vec<Vec<usize>>, limits: &SearchLimits) -> (Vec<Vec<usize>>, SearchStats) {
        let initial_cost = self.total_cost(&routes);
        let mut stats = SearchStats {
            initial_cost,
            best_cost: initial_cost,
            ..SearchStats::default()
        };
        let mut best = routes.clone();
        let mut stalled = 0usize;

        let stop_reason = loop {
            if let Some(reason) = limits.interrupted() {
                break reason;
            }
            if stats.accepted_moves >= limits.solution_limit {
                break StopReason::SolutionLimit;
            }
            stats.iterations += 1;

            match self.best_move(&routes) {
                Some(rewrite) => {
                    for (vehicle, sequence) in rewrite {
                        routes[vehicle] = sequence;
                    }
                    stats.accepted_moves += 1;
                    stalled = 0;

                    let cost = self.total_cost(&routes);
                    if cost < stats.best_cost {
                        stats.best_cost = cost;
                        best.clone_from(&routes);
                    }
                }
                None => {
                    if stalled >= limits.max_stalled_rounds || !self.penalize(&routes) {
                        break StopReason::Exhausted;
                    }
                    stalled += 1;
                    stats.penalty_rounds += 1;
                }
            }
        };

        stats.stop_reason = stop_reason;
        debug!(
            iterations = stats.iterations,
            accepted = stats.accepted_moves,
            penalty_rounds = stats.penalty_rounds,
            initial_cost = stats.initial_cost,
            best_cost = stats.best_cost,
            ?stop_reason,
            "guided local search stopped"
        );
        (best, stats)
    }

    /// Most improving feasible move on the augmented cost, if any.
    fn best_move(&self, routes: &[Vec<usize>]) -> Option<Rewrite> {
        let current: Vec<i64> = routes.iter().map(|route| self.augmented_cost(route)).collect();
        let mut best: Option<(i64, Rewrite)> = None;

        let mut consider = |rewrite: Rewrite| {
            let delta: i64 = rewrite
                .iter()
                .map(|(vehicle, sequence)| self.augmented_cost(sequence) - current[*vehicle])
                .sum();
            let threshold = best.as_ref().map_or(0, |(best_delta, _)| *best_delta);
            if delta >= threshold {
                return;
            }
            let feasible = rewrite
                .iter()
                .all(|(vehicle, sequence)| self.model.schedule(*vehicle, sequence).is_some());
            if feasible {
                best = Some((delta, rewrite));
            }
        };

        for (vehicle, route) in routes.iter().enumerate() {
            for rewrite in two_opt_moves(vehicle, route) {
                consider(rewrite);
            }
        }
        for rewrite in relocate_moves(self.model, routes) {
            consider(rewrite);
        }
        for rewrite in swap_moves(self.model, routes) {
            consider(rewrite);
        }

        best.map(|(_, rewrite)| rewrite)
    }

    /// Penalize the arcs of maximum utility in the current solution.
    /// Returns false if the solution drives no arcs.
    fn penalize(&mut self, routes: &[Vec<usize>]) -> bool {
        let arcs: Vec<(usize, usize)> = routes
            .iter()
            .flat_map(|route| self.model.route_arcs(route))
            .collect();

        // cost / (1 + penalty), compared by cross-multiplication.
        let utility = |&(from, to): &(usize, usize)| {
            (
                i128::from(self.model.arc_cost(from, to)),
                i128::from(self.penalties[from][to]) + 1,
            )
        };
        let Some(max) = arcs
            .iter()
            .map(utility)
            .reduce(|a, b| if b.0 * a.1 > a.0 * b.1 { b } else { a })
        else {
            return false;
        };

        let top: Vec<(usize, usize)> = arcs
            .iter()
            .filter(|&arc| {
                let (cost, weight) = utility(arc);
                cost * max.1 == max.0 * weight
            })
            .copied()
            .collect();
        for (from, to) in top {
            self.penalties[from][to] = self.penalties[from][to].saturating_add(1);
        }
        true
    }
}

/// Reverse every segment of length two or more within one route.
fn two_opt_moves(vehicle: usize, route: &[usize]) -> impl Iterator<Item = Rewrite> + '_ {
    let n = route.len();
    (0..n).flat_map(move |i| {
        (i + 1..n).map(move |j| {
            let mut sequence = route.to_vec();
            sequence[i..=j].reverse();
            vec![(vehicle, sequence)]
        })
    })
}

/// Move one order to another position, in its own route or another one.
fn relocate_moves(model: &ConstraintModel<'_>, routes: &[Vec<usize>]) -> Vec<Rewrite> {
    let mut moves = Vec::new();

    for (from, route) in routes.iter().enumerate() {
        for (i, &node) in route.iter().enumerate() {
            let mut removed = route.clone();
            removed.remove(i);

            for (to, target) in routes.iter().enumerate() {
                if !model.is_allowed(to, node) {
                    continue;
                }
                if from == to {
                    for j in (0..=removed.len()).filter(|&j| j != i) {
                        let mut sequence = removed.clone();
                        sequence.insert(j, node);
                        moves.push(vec![(from, sequence)]);
                    }
                } else {
                    for j in 0..=target.len() {
                        let mut sequence = target.clone();
                        sequence.insert(j, node);
                        moves.push(vec![(from, removed.clone()), (to, sequence)]);
                    }
                }
            }
        }
    }

    moves
}

/// Exchange two orders, within a route or across two routes.
fn swap_moves(model: &ConstraintModel<'_>, routes: &[Vec<usize>]) -> Vec<Rewrite> {
    let mut moves = Vec::new();

    for (a, route_a) in routes.iter().enumerate() {
        for (i, &node_a) in route_a.iter().enumerate() {
            for (b, route_b) in routes.iter().enumerate().skip(a) {
                let start = if a == b { i + 2 } else { 0 };
                for (j, &node_b) in route_b.iter().enumerate().skip(start) {
                    if a == b {
                        let mut sequence = route_a.clone();
                        sequence.swap(i, j);
                        moves.push(vec![(a, sequence)]);
                    } else if model.is_allowed(a, node_b) && model.is_allowed(b, node_a) {
                        let mut left = route_a.clone();
                        let mut right = route_b.clone();
                        left[i] = node_b;
                        right[j] = node_a;
                        moves.push(vec![(a, left), (b, right)]);
                    }
                }
            }
        }
    }

    moves
}
