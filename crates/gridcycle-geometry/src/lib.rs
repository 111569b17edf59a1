//! Grid geometry primitives: integer 2D vectors and the four cardinal
//! directions a light-cycle can travel in.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

pub use glam::IVec2;

/// One of the four cardinal directions a player's head can travel in.
///
/// Numbered to match the wire encoding in the move packet (`u32`, clamped to
/// `0..=3`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[repr(u8)]
pub enum Direction {
    North = 0,
    East = 1,
    South = 2,
    West = 3,
}

impl Direction {
    /// Maps a raw wire value into a `Direction`, normalizing out-of-range
    /// values into `0..=3` the way `((v mod 4) + 4) mod 4` would.
    #[must_use]
    pub const fn from_wire(value: u32) -> Self {
        match value % 4 {
            0 => Self::North,
            1 => Self::East,
            2 => Self::South,
            _ => Self::West,
        }
    }

    #[must_use]
    pub const fn to_wire(self) -> u32 {
        self as u32
    }

    /// The unit vector this direction moves a head by in one tick.
    #[must_use]
    pub const fn unit_vector(self) -> IVec2 {
        match self {
            Self::North => IVec2::new(0, -1),
            Self::East => IVec2::new(1, 0),
            Self::South => IVec2::new(0, 1),
            Self::West => IVec2::new(-1, 0),
        }
    }

    #[must_use]
    pub const fn is_opposite(self, other: Self) -> bool {
        matches!(
            (self, other),
            (Self::North, Self::South)
                | (Self::South, Self::North)
                | (Self::East, Self::West)
                | (Self::West, Self::East)
        )
    }
}

/// Is `point` inside a `width` x `height` grid with the origin at the top
/// left?
#[must_use]
pub fn inside_grid(point: IVec2, width: i32, height: i32) -> bool {
    point.x >= 0 && point.x < width && point.y >= 0 && point.y < height
}

/// Translates a head position by one step in `direction`.
#[must_use]
pub fn step(point: IVec2, direction: Direction) -> IVec2 {
    point + direction.unit_vector()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_roundtrip_for_valid_values() {
        assert_eq!(Direction::from_wire(0), Direction::North);
        assert_eq!(Direction::from_wire(1), Direction::East);
        assert_eq!(Direction::from_wire(2), Direction::South);
        assert_eq!(Direction::from_wire(3), Direction::West);
    }

    #[test]
    fn wire_values_out_of_range_wrap() {
        assert_eq!(Direction::from_wire(4), Direction::North);
        assert_eq!(Direction::from_wire(7), Direction::West);
        assert_eq!(Direction::from_wire(u32::MAX), Direction::from_wire(u32::MAX % 4));
    }

    #[test]
    fn unit_vectors_point_the_right_way() {
        assert_eq!(Direction::North.unit_vector(), IVec2::new(0, -1));
        assert_eq!(Direction::South.unit_vector(), IVec2::new(0, 1));
        assert_eq!(Direction::East.unit_vector(), IVec2::new(1, 0));
        assert_eq!(Direction::West.unit_vector(), IVec2::new(-1, 0));
    }

    #[test]
    fn opposites_are_symmetric() {
        for &(a, b) in &[
            (Direction::North, Direction::South),
            (Direction::East, Direction::West),
        ] {
            assert!(a.is_opposite(b));
            assert!(b.is_opposite(a));
            assert!(!a.is_opposite(a));
        }
    }

    #[test]
    fn inside_grid_bounds() {
        assert!(inside_grid(IVec2::new(0, 0), 10, 10));
        assert!(inside_grid(IVec2::new(9, 9), 10, 10));
        assert!(!inside_grid(IVec2::new(10, 9), 10, 10));
        assert!(!inside_grid(IVec2::new(0, -1), 10, 10));
    }

    #[test]
    fn step_translates_by_unit_vector() {
        let p = IVec2::new(5, 5);
        assert_eq!(step(p, Direction::North), IVec2::new(5, 4));
        assert_eq!(step(p, Direction::East), IVec2::new(6, 5));
    }
}
