//! Input assembly: node list and matrix shape validation.

use crate::error::DispatchError;
use crate::model::{Location, Order};

/// Index of the depot in every node list and matrix.
pub const DEPOT: usize = 0;

/// What a node index stands for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Depot,
    /// Position of the order in the caller's order list.
    Order(usize),
}

impl NodeKind {
    pub fn of(node: usize) -> Self {
        if node == DEPOT {
            NodeKind::Depot
        } else {
            NodeKind::Order(node - 1)
        }
    }
}

/// Node index of the order at `order_index`.
pub const fn order_node(order_index: usize) -> usize {
    order_index + 1
}

/// Locations in node order: depot first, then one per order in input order.
pub fn assemble_locations(depot: Location, orders: &[Order]) -> Result<Vec<Location>, DispatchError> {
    let mut locations = Vec::with_capacity(orders.len() + 1);
    locations.push(depot);
    for order in orders {
        let location = order
            .location
            .ok_or_else(|| DispatchError::MissingLocation(order.id.clone()))?;
        locations.push(location);
    }
    Ok(locations)
}

/// Check that a matrix is square and covers exactly `nodes` nodes.
pub fn validate_shape<T>(
    nodes: usize,
    matrix_name: &'static str,
    matrix: &[Vec<T>],
) -> Result<(), DispatchError> {
    let shape_error = |row: usize, cols: usize| DispatchError::InputShape {
        nodes,
        matrix: matrix_name,
        rows: matrix.len(),
        row,
        cols,
    };

    if matrix.len() != nodes {
        return Err(shape_error(0, matrix.first().map_or(0, Vec::len)));
    }
    match matrix.iter().position(|row| row.len() != nodes) {
        Some(row) => Err(shape_error(row, matrix[row].len())),
        None => Ok(()),
    }
}
