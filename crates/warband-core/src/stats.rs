//! Per-faction aggregate counters, recomputed by the world every tick.

use crate::Faction;
use serde::{Deserialize, Serialize};

/// Aggregate counters for one faction
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FactionStats {
    /// Organisms on the open grid plus those housed in the faction's shelters
    pub population: u32,
    /// Standing shelters owned by the faction
    pub shelters: u32,
    /// Ore carried in inventories
    pub ore: u32,
    /// Misc carried in inventories
    pub misc: u32,
}

impl FactionStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one organism and its inventory
    pub fn record_organism(&mut self, ore: u32, misc: u32) {
        self.population += 1;
        self.ore += ore;
        self.misc += misc;
    }

    pub fn record_shelter(&mut self) {
        self.shelters += 1;
    }
}

/// Counters for both factions
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorldStats {
    pub alpha: FactionStats,
    pub beta: FactionStats,
}

impl WorldStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Counters for `faction`; `Faction::None` has no counters
    pub fn get_mut(&mut self, faction: Faction) -> Option<&mut FactionStats> {
        match faction {
            Faction::Alpha => Some(&mut self.alpha),
            Faction::Beta => Some(&mut self.beta),
            Faction::None => None,
        }
    }

    pub fn total_population(&self) -> u32 {
        self.alpha.population + self.beta.population
    }

    pub fn total_shelters(&self) -> u32 {
        self.alpha.shelters + self.beta.shelters
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_organism() {
        let mut stats = FactionStats::new();
        stats.record_organism(2, 3);
        stats.record_organism(0, 1);

        assert_eq!(stats.population, 2);
        assert_eq!(stats.ore, 2);
        assert_eq!(stats.misc, 4);
    }

    #[test]
    fn test_world_stats_by_faction() {
        let mut stats = WorldStats::new();
        stats.get_mut(Faction::Alpha).unwrap().record_organism(1, 0);
        stats.get_mut(Faction::Beta).unwrap().record_shelter();
        assert!(stats.get_mut(Faction::None).is_none());

        assert_eq!(stats.alpha.population, 1);
        assert_eq!(stats.beta.shelters, 1);
        assert_eq!(stats.total_population(), 1);
        assert_eq!(stats.total_shelters(), 1);
    }

    #[test]
    fn test_stats_serialization() {
        let mut stats = WorldStats::new();
        stats.alpha.record_organism(3, 4);
        let json = serde_json::to_string(&stats).unwrap();
        let deserialized: WorldStats = serde_json::from_str(&json).unwrap();
        assert_eq!(stats, deserialized);
    }
}
