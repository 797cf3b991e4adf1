//! Core type definitions for the simulation.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Unique identifier for an organism, issued by the world in creation order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct OrganismId(pub u64);

impl fmt::Display for OrganismId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "org#{}", self.0)
    }
}

/// Unique identifier for a shelter.
///
/// A shelter destroyed and later rebuilt on the same cell gets a fresh id, so
/// a stale id never resolves to the newer structure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ShelterId(pub u64);

impl fmt::Display for ShelterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "shelter#{}", self.0)
    }
}

/// 2D position in the world
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Position {
    pub x: i32,
    pub y: i32,
}

impl Position {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    pub fn add(&self, dx: i32, dy: i32) -> Self {
        Self {
            x: self.x + dx,
            y: self.y + dy,
        }
    }

    /// Whether the position lies on a `size` x `size` grid
    pub fn in_bounds(&self, size: i32) -> bool {
        self.x >= 0 && self.x < size && self.y >= 0 && self.y < size
    }

    /// Manhattan distance to another position
    pub fn manhattan_distance(&self, other: &Position) -> i32 {
        (self.x - other.x).abs() + (self.y - other.y).abs()
    }

    /// True when `other` is one of the eight cells surrounding `self`
    pub fn is_adjacent(&self, other: &Position) -> bool {
        self != other && (self.x - other.x).abs() <= 1 && (self.y - other.y).abs() <= 1
    }

    /// One diagonal-or-orthogonal step toward `target`
    pub fn step_toward(&self, target: &Position) -> Position {
        self.add((target.x - self.x).signum(), (target.y - self.y).signum())
    }

    /// The in-bounds cells of the 8-neighbourhood, in row-major order
    pub fn neighbors(self, size: i32) -> impl Iterator<Item = Position> {
        Direction::all()
            .into_iter()
            .map(move |dir| {
                let (dx, dy) = dir.to_delta();
                self.add(dx, dy)
            })
            .filter(move |pos| pos.in_bounds(size))
    }
}

/// Direction for movement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    North,
    South,
    East,
    West,
    NorthEast,
    NorthWest,
    SouthEast,
    SouthWest,
}

impl Direction {
    pub fn to_delta(&self) -> (i32, i32) {
        match self {
            Direction::North => (0, -1),
            Direction::South => (0, 1),
            Direction::East => (1, 0),
            Direction::West => (-1, 0),
            Direction::NorthEast => (1, -1),
            Direction::NorthWest => (-1, -1),
            Direction::SouthEast => (1, 1),
            Direction::SouthWest => (-1, 1),
        }
    }

    /// All eight directions, ordered so their targets are visited row-major
    pub fn all() -> [Direction; 8] {
        [
            Direction::NorthWest,
            Direction::North,
            Direction::NorthEast,
            Direction::West,
            Direction::East,
            Direction::SouthWest,
            Direction::South,
            Direction::SouthEast,
        ]
    }
}

/// The population an organism or shelter belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Faction {
    #[default]
    None,
    Alpha,
    Beta,
}

impl Faction {
    /// The two factions that actually field organisms
    pub fn playable() -> [Faction; 2] {
        [Faction::Alpha, Faction::Beta]
    }
}

/// Behavioural specialisation, fixed for an organism's lifetime
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    Normal,
    Builder,
    Miner,
}

impl Role {
    pub fn is_specialist(&self) -> bool {
        !matches!(self, Role::Normal)
    }
}

/// Kind of a resource deposit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResourceKind {
    Food,
    Ore,
    Misc,
}
