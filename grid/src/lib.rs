//! Bounded coordinate domain for the warehouse grid.
//!
//! Pure value types only: no I/O, no randomness, no clock. Invalid
//! construction is rejected here so every other component can assume any
//! `Coordinate` it holds is in-bounds (spec invariant: "all coordinates
//! emitted by any component lie in-bounds").

use thiserror::Error;

/// Inclusive aisle bounds (1-based).
pub const MIN_AISLE: u32 = 1;
pub const MAX_AISLE: u32 = 25;
/// Inclusive rack bounds (1-based).
pub const MIN_RACK: u32 = 1;
pub const MAX_RACK: u32 = 20;

/// The fixed coordinate where the robot starts/ends every order. No item
/// may be placed there.
pub const PACKOUT: Coordinate = Coordinate { aisle: 1, rack: 1 };

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum GridError {
    #[error("aisle {0} out of bounds [{MIN_AISLE}, {MAX_AISLE}]")]
    AisleOutOfBounds(u32),
    #[error("rack {0} out of bounds [{MIN_RACK}, {MAX_RACK}]")]
    RackOutOfBounds(u32),
}

/// A 1-based `(aisle, rack)` grid position. Immutable once constructed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Coordinate {
    aisle: u32,
    rack: u32,
}

impl Coordinate {
    /// Construct a coordinate, rejecting out-of-bounds input.
    pub fn new(aisle: u32, rack: u32) -> Result<Self, GridError> {
        if !(MIN_AISLE..=MAX_AISLE).contains(&aisle) {
            return Err(GridError::AisleOutOfBounds(aisle));
        }
        if !(MIN_RACK..=MAX_RACK).contains(&rack) {
            return Err(GridError::RackOutOfBounds(rack));
        }
        Ok(Self { aisle, rack })
    }

    pub fn aisle(&self) -> u32 {
        self.aisle
    }

    pub fn rack(&self) -> u32 {
        self.rack
    }

    /// Whether this aisle is "odd" in the snake-pattern sense (parity).
    pub fn aisle_is_odd(&self) -> bool {
        self.aisle % 2 == 1
    }

    pub fn is_packout(&self) -> bool {
        *self == PACKOUT
    }

    /// Manhattan distance to another coordinate, in grid-units.
    pub fn distance(&self, other: &Coordinate) -> u32 {
        self.aisle.abs_diff(other.aisle) + self.rack.abs_diff(other.rack)
    }

    /// Whether `other` is exactly one grid-unit away (distance == 1).
    /// Adjacency ignores aisle-direction; the path engine enforces
    /// direction, not this type.
    pub fn is_adjacent(&self, other: &Coordinate) -> bool {
        self.distance(other) == 1
    }
}

impl std::fmt::Display for Coordinate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {})", self.aisle, self.rack)
    }
}

/// The fixed warehouse grid bounds. Exists mainly so callers outside this
/// crate have one place to ask "is this coordinate valid" without
/// hardcoding the bound constants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Grid {
    pub width_aisles: u32,
    pub height_racks: u32,
}

impl Default for Grid {
    fn default() -> Self {
        Self {
            width_aisles: MAX_AISLE,
            height_racks: MAX_RACK,
        }
    }
}

impl Grid {
    pub fn valid(&self, c: &Coordinate) -> bool {
        c.aisle() >= MIN_AISLE
            && c.aisle() <= self.width_aisles
            && c.rack() >= MIN_RACK
            && c.rack() <= self.height_racks
    }
}

/// A property of the currently executing path segment (spec §3: "not of
/// the robot's instantaneous velocity"). FORWARD/REVERSE governs how the
/// snake pattern traverses each aisle; see `pathengine`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Forward,
    Reverse,
}

impl Direction {
    pub fn flipped(self) -> Self {
        match self {
            Direction::Forward => Direction::Reverse,
            Direction::Reverse => Direction::Forward,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_out_of_bounds_aisle() {
        assert_eq!(Coordinate::new(0, 5), Err(GridError::AisleOutOfBounds(0)));
        assert_eq!(
            Coordinate::new(26, 5),
            Err(GridError::AisleOutOfBounds(26))
        );
    }

    #[test]
    fn rejects_out_of_bounds_rack() {
        assert_eq!(Coordinate::new(5, 0), Err(GridError::RackOutOfBounds(0)));
        assert_eq!(Coordinate::new(5, 21), Err(GridError::RackOutOfBounds(21)));
    }

    #[test]
    fn accepts_boundary_values() {
        assert!(Coordinate::new(1, 1).is_ok());
        assert!(Coordinate::new(25, 20).is_ok());
    }

    #[test]
    fn packout_is_one_one_and_flagged() {
        let p = Coordinate::new(1, 1).unwrap();
        assert!(p.is_packout());
        assert_eq!(p, PACKOUT);
    }

    #[test]
    fn distance_is_manhattan() {
        let a = Coordinate::new(3, 5).unwrap();
        let b = Coordinate::new(7, 2).unwrap();
        assert_eq!(a.distance(&b), 4 + 3);
    }

    #[test]
    fn adjacency_requires_distance_one() {
        let a = Coordinate::new(5, 5).unwrap();
        let b = Coordinate::new(5, 6).unwrap();
        let c = Coordinate::new(6, 6).unwrap();
        assert!(a.is_adjacent(&b));
        assert!(!a.is_adjacent(&c));
        assert!(!a.is_adjacent(&a));
    }

    #[test]
    fn aisle_parity() {
        assert!(Coordinate::new(1, 1).unwrap().aisle_is_odd());
        assert!(!Coordinate::new(2, 1).unwrap().aisle_is_odd());
    }

    #[test]
    fn grid_default_matches_spec_bounds() {
        let g = Grid::default();
        assert!(g.valid(&Coordinate::new(25, 20).unwrap()));
        assert_eq!(g.width_aisles, 25);
        assert_eq!(g.height_racks, 20);
    }

    #[test]
    fn direction_flips() {
        assert_eq!(Direction::Forward.flipped(), Direction::Reverse);
        assert_eq!(Direction::Reverse.flipped(), Direction::Forward);
    }
}
