//! Read-only view of the world handed to renderers once per tick.

use serde::{Deserialize, Serialize};
use warband_core::{Faction, ResourceKind, Role, WorldStats};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OrganismView {
    pub faction: Faction,
    pub role: Role,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ShelterView {
    pub faction: Faction,
    /// Occupants over capacity, in [0, 1]
    pub occupancy: f64,
}

/// Per-cell snapshot of all three layers, row-major
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorldSnapshot {
    pub tick: u64,
    pub size: i32,
    pub organisms: Vec<Option<OrganismView>>,
    pub resources: Vec<Option<ResourceKind>>,
    pub shelters: Vec<Option<ShelterView>>,
    pub stats: WorldStats,
}

impl WorldSnapshot {
    /// One character per cell: shelters `#`/`%`, organisms `a`/`b`
    /// (upper-case for specialists), resources `f`/`o`/`m`, empty `.`
    pub fn render_ascii(&self) -> String {
        let size = self.size.max(0) as usize;
        let mut out = String::with_capacity(size * (size + 1));

        for y in 0..size {
            for x in 0..size {
                let i = y * size + x;
                let glyph = match (&self.shelters[i], &self.organisms[i], &self.resources[i]) {
                    (Some(shelter), _, _) => match shelter.faction {
                        Faction::Alpha => '#',
                        _ => '%',
                    },
                    (None, Some(organism), _) => {
                        let glyph = match organism.faction {
                            Faction::Alpha => 'a',
                            _ => 'b',
                        };
                        if organism.role.is_specialist() {
                            glyph.to_ascii_uppercase()
                        } else {
                            glyph
                        }
                    }
                    (None, None, Some(ResourceKind::Food)) => 'f',
                    (None, None, Some(ResourceKind::Ore)) => 'o',
                    (None, None, Some(ResourceKind::Misc)) => 'm',
                    (None, None, None) => '.',
                };
                out.push(glyph);
            }
            out.push('\n');
        }

        out
    }
}
