//! Seoul metropolitan area locations for realistic test fixtures.
//!
//! Coordinates are approximate public landmarks; good enough for
//! straight-line matrices.

use reefer_dispatch::Location;

/// A named location with coordinates.
#[derive(Debug, Clone)]
pub struct Place {
    pub name: &'static str,
    pub lat: f64,
    pub lng: f64,
}

impl Place {
    pub const fn new(name: &'static str, lat: f64, lng: f64) -> Self {
        Self { name, lat, lng }
    }

    pub fn location(&self) -> Location {
        Location::new(self.lat, self.lng)
    }
}

// ============================================================================
// Cold storage hubs (depots)
// ============================================================================

pub const ICHEON_HUB: Place = Place::new("Icheon Logistics Center", 37.2720, 127.4350);
pub const GARAK_MARKET: Place = Place::new("Garak Agricultural Market", 37.4925, 127.1183);

// ============================================================================
// Customers: supermarkets, restaurants, hospitals
// ============================================================================

pub const CUSTOMERS: &[Place] = &[
    Place::new("Gangnam Station", 37.4979, 127.0276),
    Place::new("Jamsil Lotte World", 37.5111, 127.0982),
    Place::new("Seongsu", 37.5446, 127.0557),
    Place::new("Konkuk University", 37.5404, 127.0692),
    Place::new("Hongdae", 37.5563, 126.9236),
    Place::new("Yeouido", 37.5219, 126.9245),
    Place::new("Seoul Station", 37.5547, 126.9707),
    Place::new("Myeongdong", 37.5636, 126.9826),
    Place::new("Bundang Seohyeon", 37.3850, 127.1234),
    Place::new("Pangyo Techno Valley", 37.4016, 127.1086),
    Place::new("Suwon Station", 37.2659, 127.0001),
    Place::new("Yongin City Hall", 37.2411, 127.1776),
    Place::new("Hanam Starfield", 37.5457, 127.2240),
    Place::new("Guri Market", 37.5943, 127.1296),
    Place::new("Anyang Pyeongchon", 37.3943, 126.9639),
    Place::new("Gwacheon", 37.4292, 126.9876),
];
