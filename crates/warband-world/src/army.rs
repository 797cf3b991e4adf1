//! War-bands: groups of Normal organisms that march on the nearest enemy.

use serde::{Deserialize, Serialize};
use warband_core::{Faction, OrganismId};

/// Unsheltered Normal organisms needed before a faction musters a band
pub const ARMY_SIZE: usize = 10;
/// A band with fewer members than this dissolves
pub const MIN_ARMY_SIZE: usize = 4;

/// A standing war-band. Members are referenced by id; the organisms
/// themselves stay on the grid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WarBand {
    pub faction: Faction,
    pub members: Vec<OrganismId>,
}

impl WarBand {
    pub fn new(faction: Faction, members: Vec<OrganismId>) -> Self {
        Self { faction, members }
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Keep only members for which `alive` holds
    pub fn retain_members(&mut self, mut alive: impl FnMut(OrganismId) -> bool) {
        self.members.retain(|id| alive(*id));
    }

    pub fn is_viable(&self) -> bool {
        self.members.len() >= MIN_ARMY_SIZE
    }
}
