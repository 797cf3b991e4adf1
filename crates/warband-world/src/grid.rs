//! Sparse square grid layer: at most one value per cell.

use serde::{Deserialize, Serialize};
use warband_core::Position;

/// A bounded `size` x `size` grid holding at most one `T` per cell
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Layer<T> {
    size: i32,
    cells: Vec<Option<T>>,
}

impl<T> Layer<T> {
    pub fn new(size: i32) -> Self {
        Self {
            size,
            cells: std::iter::repeat_with(|| None).take(cell_count(size)).collect(),
        }
    }

    pub fn size(&self) -> i32 {
        self.size
    }

    pub fn contains(&self, pos: Position) -> bool {
        pos.in_bounds(self.size)
    }

    /// Value at position, `None` when empty or out of bounds
    pub fn get(&self, pos: Position) -> Option<&T> {
        self.index(pos).and_then(|index| self.cells[index].as_ref())
    }

    pub fn get_mut(&mut self, pos: Position) -> Option<&mut T> {
        self.index(pos).and_then(|index| self.cells[index].as_mut())
    }

    pub fn is_empty_at(&self, pos: Position) -> bool {
        self.get(pos).is_none()
    }

    /// Put a value into an empty in-bounds cell, handing it back otherwise
    pub fn insert(&mut self, pos: Position, value: T) -> Result<(), T> {
        match self.index(pos) {
            Some(index) if self.cells[index].is_none() => {
                self.cells[index] = Some(value);
                Ok(())
            }
            _ => Err(value),
        }
    }

    /// Remove and return the value at position
    pub fn take(&mut self, pos: Position) -> Option<T> {
        self.index(pos).and_then(|index| self.cells[index].take())
    }

    /// Number of occupied cells
    pub fn count(&self) -> usize {
        self.cells.iter().filter(|cell| cell.is_some()).count()
    }

    /// Get position from index
    pub fn index_to_pos(&self, index: usize) -> Position {
        let side = self.size.max(1) as usize;
        Position::new((index % side) as i32, (index / side) as i32)
    }

    /// Iterator over all positions in row-major scan order
    pub fn positions(&self) -> impl Iterator<Item = Position> {
        let size = self.size;
        (0..size).flat_map(move |y| (0..size).map(move |x| Position::new(x, y)))
    }

    /// Iterator over occupied cells with positions, in scan order
    pub fn iter(&self) -> impl Iterator<Item = (Position, &T)> + '_ {
        self.cells
            .iter()
            .enumerate()
            .filter_map(move |(i, cell)| cell.as_ref().map(|value| (self.index_to_pos(i), value)))
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (Position, &mut T)> + '_ {
        let side = self.size.max(1) as usize;
        self.cells.iter_mut().enumerate().filter_map(move |(i, cell)| {
            cell.as_mut()
                .map(|value| (Position::new((i % side) as i32, (i / side) as i32), value))
        })
    }

    fn index(&self, pos: Position) -> Option<usize> {
        if pos.in_bounds(self.size) {
            Some(pos.y as usize * self.size as usize + pos.x as usize)
        } else {
            None
        }
    }
}

/// Cells in a `size` x `size` layer, zero for non-positive sizes
fn cell_count(size: i32) -> usize {
    let side = size.max(0) as usize;
    side * side
}
