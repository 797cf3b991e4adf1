//! Resource deposits and their per-cell field.

use crate::grid::Layer;
use rand::Rng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use warband_core::{Position, ResourceKind};

/// Share of cells that receive an ore deposit at world creation
pub const ORE_SHARE: f64 = 0.05;
/// Amount of every seeded ore deposit
pub const ORE_AMOUNT: u32 = 3;
/// Per-tick chance that an empty cell sprouts food
pub const FOOD_SPAWN_CHANCE: f64 = 0.1;
/// Per-tick chance, after a failed food roll, that an empty cell sprouts misc
pub const MISC_SPAWN_CHANCE: f64 = 0.1;

/// A single resource deposit
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ResourceDeposit {
    pub kind: ResourceKind,
    pub amount: u32,
    pub energy_factor: f64,
    pub strength_factor: f64,
}

impl ResourceDeposit {
    pub fn food(amount: u32) -> Self {
        Self {
            kind: ResourceKind::Food,
            amount,
            energy_factor: 1.0,
            strength_factor: 0.0,
        }
    }

    pub fn misc(amount: u32) -> Self {
        Self {
            kind: ResourceKind::Misc,
            amount,
            energy_factor: 0.5,
            strength_factor: 0.5,
        }
    }

    pub fn ore(amount: u32) -> Self {
        Self {
            kind: ResourceKind::Ore,
            amount,
            energy_factor: 3.0,
            strength_factor: 2.0,
        }
    }

    /// Roll for a regenerating deposit of `kind`; ore never regenerates
    pub fn spawn(kind: ResourceKind, rng: &mut ChaCha8Rng) -> Option<Self> {
        let chance = match kind {
            ResourceKind::Food => FOOD_SPAWN_CHANCE,
            ResourceKind::Misc => MISC_SPAWN_CHANCE,
            ResourceKind::Ore => return None,
        };

        if rng.gen::<f64>() < chance {
            let amount = rng.gen_range(1..=3);
            Some(match kind {
                ResourceKind::Food => Self::food(amount),
                _ => Self::misc(amount),
            })
        } else {
            None
        }
    }
}

/// The resource layer of the world
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceField {
    deposits: Layer<ResourceDeposit>,
}

impl ResourceField {
    pub fn new(size: i32) -> Self {
        Self {
            deposits: Layer::new(size),
        }
    }

    /// Number of ore deposits seeded into a fresh world of `size`
    pub fn ore_deposit_count(size: i32) -> usize {
        (f64::from(size) * f64::from(size) * ORE_SHARE) as usize
    }

    /// Place `count` ore deposits on distinct random cells.
    ///
    /// Cells already holding a deposit are skipped, and `count` is capped at
    /// the number of cells so the draw always terminates.
    pub fn seed_ore(&mut self, count: usize, rng: &mut ChaCha8Rng) {
        let size = self.deposits.size();
        let target = count.min((size * size) as usize - self.deposits.count());
        let mut placed = 0;

        while placed < target {
            let pos = Position::new(rng.gen_range(0..size), rng.gen_range(0..size));
            if self.deposits.insert(pos, ResourceDeposit::ore(ORE_AMOUNT)).is_ok() {
                placed += 1;
            }
        }
    }

    /// Sprout food or misc on every resource-free cell.
    ///
    /// Misc is only rolled when the food roll fails, so each cell gains at
    /// most one deposit per call.
    pub fn regenerate(&mut self, rng: &mut ChaCha8Rng) -> usize {
        let empty: Vec<Position> = self
            .deposits
            .positions()
            .filter(|pos| self.deposits.is_empty_at(*pos))
            .collect();

        let mut spawned = 0;
        for pos in empty {
            let deposit = ResourceDeposit::spawn(ResourceKind::Food, rng)
                .or_else(|| ResourceDeposit::spawn(ResourceKind::Misc, rng));
            if let Some(deposit) = deposit {
                if self.deposits.insert(pos, deposit).is_ok() {
                    spawned += 1;
                }
            }
        }
        spawned
    }

    pub fn get(&self, pos: Position) -> Option<&ResourceDeposit> {
        self.deposits.get(pos)
    }

    pub fn take(&mut self, pos: Position) -> Option<ResourceDeposit> {
        self.deposits.take(pos)
    }

    /// Total ore still lying in deposits
    pub fn total_ore(&self) -> u32 {
        self.deposits
            .iter()
            .filter(|(_, deposit)| deposit.kind == ResourceKind::Ore)
            .map(|(_, deposit)| deposit.amount)
            .sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Position, &ResourceDeposit)> + '_ {
        self.deposits.iter()
    }

    pub fn layer(&self) -> &Layer<ResourceDeposit> {
        &self.deposits
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    #[test]
    fn test_seed_ore_distinct_cells() {
        let mut rng = ChaCha8Rng::seed_from_u64(42);
        let mut field = ResourceField::new(20);
        let count = ResourceField::ore_deposit_count(20);
        assert_eq!(count, 20);

        field.seed_ore(count, &mut rng);
        assert_eq!(field.layer().count(), count);
        assert_eq!(field.total_ore(), count as u32 * ORE_AMOUNT);
    }

    #[test]
    fn test_seed_ore_capped_by_grid() {
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let mut field = ResourceField::new(3);
        field.seed_ore(100, &mut rng);
        assert_eq!(field.layer().count(), 9);
    }

    #[test]
    fn test_ore_never_spawns() {
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        for _ in 0..500 {
            assert!(ResourceDeposit::spawn(ResourceKind::Ore, &mut rng).is_none());
        }
    }

    #[test]
    fn test_regenerate_only_fills_empty_cells() {
        let mut rng = ChaCha8Rng::seed_from_u64(9);
        let mut field = ResourceField::new(30);
        field.deposits.insert(Position::new(4, 4), ResourceDeposit::ore(3)).unwrap();

        let spawned = field.regenerate(&mut rng);
        assert!(spawned > 0);
        assert_eq!(field.layer().count(), spawned + 1);
        assert_eq!(field.get(Position::new(4, 4)).unwrap().kind, ResourceKind::Ore);
        assert_eq!(field.total_ore(), 3);

        for (_, deposit) in field.iter() {
            assert!((1..=3).contains(&deposit.amount));
            match deposit.kind {
                ResourceKind::Food => assert_eq!(deposit.strength_factor, 0.0),
                ResourceKind::Misc => assert_eq!(deposit.energy_factor, 0.5),
                ResourceKind::Ore => {}
            }
        }
    }

    #[test]
    fn test_regenerate_rate_near_nineteen_percent() {
        // 0.1 food + 0.9 * 0.1 misc
        let mut rng = ChaCha8Rng::seed_from_u64(11);
        let mut field = ResourceField::new(100);
        let spawned = field.regenerate(&mut rng) as f64 / 10_000.0;
        assert!((spawned - 0.19).abs() < 0.02, "spawn rate {}", spawned);
    }
}
