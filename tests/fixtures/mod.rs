//! Test fixtures for reefer-dispatch.
//!
//! Seoul metropolitan area depots and customer locations.

pub mod seoul_locations;

pub use seoul_locations::*;
