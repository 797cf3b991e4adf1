//! Faction-owned shelters that house, breed and release organisms.

use crate::organism::Organism;
use rand::seq::index::sample;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use warband_core::{Faction, OrganismId, Position, Role, ShelterId};

pub const SHELTER_HEALTH: f64 = 100.0;
pub const SHELTER_CAPACITY: usize = 10;
/// Specialists are never pulled out while occupancy is at or below this
pub const SPECIALIST_GARRISON: usize = 2;
/// Normal occupants released together when a full shelter musters
pub const WAR_BAND_MUSTER: usize = 8;
/// Ticks between in-shelter births
pub const REPRODUCTION_COOLDOWN: u32 = 2;
pub const CHILD_STAT_BOOST: f64 = 1.2;
pub const PARENT_ENERGY_FACTOR: f64 = 0.9;

/// Result of a shelter's reproduction attempt
#[derive(Debug)]
pub enum ShelterOutcome {
    Idle,
    Birth(OrganismId),
    /// Normal occupants released as a war-band; the caller places them
    WarBand(Vec<Organism>),
}

/// Result of damaging a shelter
#[derive(Debug)]
pub enum DamageOutcome {
    Standing,
    /// Health fell to zero; every former occupant is handed to the caller
    Destroyed(Vec<Organism>),
}

/// A shelter structure. Occupants are owned by the shelter, not the grid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Shelter {
    pub id: ShelterId,
    pub faction: Faction,
    pub position: Position,
    pub health: f64,
    pub capacity: usize,
    pub occupants: Vec<Organism>,
    pub cooldown: u32,
}

impl Shelter {
    pub fn new(id: ShelterId, faction: Faction, position: Position) -> Self {
        Self {
            id,
            faction,
            position,
            health: SHELTER_HEALTH,
            capacity: SHELTER_CAPACITY,
            occupants: Vec::new(),
            cooldown: 0,
        }
    }

    pub fn is_full(&self) -> bool {
        self.occupants.len() >= self.capacity
    }

    pub fn has_space(&self) -> bool {
        !self.is_full()
    }

    pub fn is_destroyed(&self) -> bool {
        self.health <= 0.0
    }

    pub fn occupancy_ratio(&self) -> f64 {
        if self.capacity == 0 {
            0.0
        } else {
            self.occupants.len() as f64 / self.capacity as f64
        }
    }

    /// Seat an organism, handing it back when full or of another faction
    pub fn add_occupant(&mut self, mut organism: Organism) -> Result<(), Organism> {
        if self.is_full() || organism.faction != self.faction {
            return Err(organism);
        }

        organism.sheltered = true;
        organism.shelter = Some(self.id);
        organism.position = None;
        self.occupants.push(organism);
        Ok(())
    }

    /// Detach an occupant.
    ///
    /// Specialists stay put while occupancy is at or below the garrison
    /// minimum; `None` is returned for them as well as for unknown ids.
    pub fn remove_occupant(&mut self, id: OrganismId) -> Option<Organism> {
        let index = self.occupants.iter().position(|o| o.id == id)?;
        let garrisoned = self.occupants.len() <= SPECIALIST_GARRISON;
        if self.occupants[index].role.is_specialist() && garrisoned {
            return None;
        }

        let organism = self.occupants.remove(index);
        Some(Self::release(organism))
    }

    /// Subtract health; on destruction every occupant is evicted
    pub fn take_damage(&mut self, amount: f64) -> DamageOutcome {
        self.health -= amount;
        if self.is_destroyed() {
            let evicted = self.occupants.drain(..).map(Self::release).collect();
            DamageOutcome::Destroyed(evicted)
        } else {
            DamageOutcome::Standing
        }
    }

    /// Breed two occupants or, when full of Normal organisms, muster a
    /// war-band.
    pub fn try_reproduce(
        &mut self,
        next_id: impl FnOnce() -> OrganismId,
        rng: &mut ChaCha8Rng,
    ) -> ShelterOutcome {
        if self.occupants.len() < 2 {
            return ShelterOutcome::Idle;
        }

        if self.is_full() {
            let normals = self.occupants.iter().filter(|o| o.role == Role::Normal).count();
            if normals < WAR_BAND_MUSTER {
                return ShelterOutcome::Idle;
            }

            let mut band = Vec::with_capacity(WAR_BAND_MUSTER);
            let mut kept = Vec::with_capacity(self.occupants.len() - WAR_BAND_MUSTER);
            for organism in self.occupants.drain(..) {
                if organism.role == Role::Normal && band.len() < WAR_BAND_MUSTER {
                    band.push(Self::release(organism));
                } else {
                    kept.push(organism);
                }
            }
            self.occupants = kept;
            return ShelterOutcome::WarBand(band);
        }

        if self.cooldown < REPRODUCTION_COOLDOWN {
            return ShelterOutcome::Idle;
        }

        let parents = sample(rng, self.occupants.len(), 2);
        let (first, second) = (parents.index(0), parents.index(1));
        let energy = (self.occupants[first].energy + self.occupants[second].energy) * 0.5;
        let strength = (self.occupants[first].strength + self.occupants[second].strength) * 0.5;

        let child = Organism::new(
            next_id(),
            self.faction,
            energy * CHILD_STAT_BOOST,
            strength * CHILD_STAT_BOOST,
            rng,
        );
        let child_id = child.id;
        if self.add_occupant(child).is_err() {
            return ShelterOutcome::Idle;
        }

        self.occupants[first].scale_energy(PARENT_ENERGY_FACTOR);
        self.occupants[second].scale_energy(PARENT_ENERGY_FACTOR);
        self.cooldown = 0;
        ShelterOutcome::Birth(child_id)
    }

    /// Advance the reproduction cooldown
    pub fn tick(&mut self) {
        self.cooldown += 1;
    }

    fn release(mut organism: Organism) -> Organism {
        organism.sheltered = false;
        organism.shelter = None;
        organism
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    fn member(id: u64, role: Role) -> Organism {
        Organism::with_role(OrganismId(id), Faction::Beta, role, 2.0, 1.0)
    }

    fn shelter() -> Shelter {
        Shelter::new(ShelterId(1), Faction::Beta, Position::new(3, 3))
    }

    #[test]
    fn test_add_occupant_until_full() {
        let mut shelter = shelter();
        for id in 0..SHELTER_CAPACITY as u64 {
            assert!(shelter.add_occupant(member(id, Role::Normal)).is_ok());
        }
        let rejected = shelter.add_occupant(member(99, Role::Normal)).unwrap_err();
        assert_eq!(rejected.id, OrganismId(99));
        assert!(!rejected.sheltered);
        assert_eq!(shelter.occupants.len(), SHELTER_CAPACITY);
        assert!(shelter.occupants.iter().all(|o| o.sheltered && o.shelter == Some(ShelterId(1))));
    }

    #[test]
    fn test_add_occupant_rejects_other_faction() {
        let mut shelter = shelter();
        let stranger = Organism::with_role(OrganismId(4), Faction::Alpha, Role::Normal, 2.0, 1.0);
        assert!(shelter.add_occupant(stranger).is_err());
        assert!(shelter.occupants.is_empty());
    }

    #[test]
    fn test_remove_occupant_protects_specialist_garrison() {
        let mut shelter = shelter();
        shelter.add_occupant(member(1, Role::Builder)).unwrap();
        shelter.add_occupant(member(2, Role::Normal)).unwrap();

        assert!(shelter.remove_occupant(OrganismId(1)).is_none());
        assert_eq!(shelter.occupants.len(), 2);

        let released = shelter.remove_occupant(OrganismId(2)).unwrap();
        assert!(!released.sheltered);
        assert!(released.shelter.is_none());
        assert!(shelter.remove_occupant(OrganismId(42)).is_none());
    }

    #[test]
    fn test_remove_specialist_above_garrison() {
        let mut shelter = shelter();
        shelter.add_occupant(member(1, Role::Miner)).unwrap();
        shelter.add_occupant(member(2, Role::Normal)).unwrap();
        shelter.add_occupant(member(3, Role::Normal)).unwrap();

        assert!(shelter.remove_occupant(OrganismId(1)).is_some());
        assert_eq!(shelter.occupants.len(), 2);
    }

    #[test]
    fn test_take_damage_destroys_and_evicts_everyone() {
        let mut shelter = shelter();
        shelter.add_occupant(member(1, Role::Builder)).unwrap();
        shelter.add_occupant(member(2, Role::Miner)).unwrap();

        assert!(matches!(shelter.take_damage(60.0), DamageOutcome::Standing));
        assert_eq!(shelter.occupants.len(), 2);

        match shelter.take_damage(40.0) {
            DamageOutcome::Destroyed(evicted) => {
                assert_eq!(evicted.len(), 2);
                assert!(evicted.iter().all(|o| !o.sheltered && o.shelter.is_none()));
            }
            DamageOutcome::Standing => panic!("shelter should be destroyed"),
        }
        assert!(shelter.occupants.is_empty());
        assert!(shelter.is_destroyed());
    }

    #[test]
    fn test_try_reproduce_needs_two_occupants() {
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let mut shelter = shelter();
        shelter.cooldown = 5;
        shelter.add_occupant(member(1, Role::Normal)).unwrap();
        assert!(matches!(
            shelter.try_reproduce(|| OrganismId(100), &mut rng),
            ShelterOutcome::Idle
        ));
    }

    #[test]
    fn test_try_reproduce_respects_cooldown() {
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let mut shelter = shelter();
        shelter.add_occupant(member(1, Role::Normal)).unwrap();
        shelter.add_occupant(member(2, Role::Normal)).unwrap();

        shelter.tick();
        assert!(matches!(
            shelter.try_reproduce(|| OrganismId(100), &mut rng),
            ShelterOutcome::Idle
        ));

        shelter.tick();
        match shelter.try_reproduce(|| OrganismId(100), &mut rng) {
            ShelterOutcome::Birth(id) => assert_eq!(id, OrganismId(100)),
            other => panic!("expected a birth, got {:?}", other),
        }
        assert_eq!(shelter.cooldown, 0);
        assert_eq!(shelter.occupants.len(), 3);

        let child = shelter.occupants.last().unwrap();
        assert!((child.energy - 2.4).abs() < 1e-9);
        assert!((child.strength - 1.2).abs() < 1e-9);
        assert!(child.sheltered);
        for parent in &shelter.occupants[..2] {
            assert!((parent.energy - 1.8).abs() < 1e-9);
        }
    }

    #[test]
    fn test_full_shelter_musters_war_band() {
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let mut shelter = shelter();
        shelter.add_occupant(member(0, Role::Builder)).unwrap();
        for id in 1..SHELTER_CAPACITY as u64 {
            shelter.add_occupant(member(id, Role::Normal)).unwrap();
        }

        match shelter.try_reproduce(|| OrganismId(100), &mut rng) {
            ShelterOutcome::WarBand(band) => {
                assert_eq!(band.len(), WAR_BAND_MUSTER);
                assert!(band.iter().all(|o| o.role == Role::Normal && !o.sheltered));
            }
            other => panic!("expected a war-band, got {:?}", other),
        }
        assert_eq!(shelter.occupants.len(), 2);
        assert!(shelter.occupants.iter().any(|o| o.role == Role::Builder));
    }

    #[test]
    fn test_full_shelter_without_enough_normals_stays_idle() {
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let mut shelter = shelter();
        shelter.cooldown = 10;
        for id in 0..3 {
            shelter.add_occupant(member(id, Role::Miner)).unwrap();
        }
        for id in 3..SHELTER_CAPACITY as u64 {
            shelter.add_occupant(member(id, Role::Normal)).unwrap();
        }

        assert!(matches!(
            shelter.try_reproduce(|| OrganismId(100), &mut rng),
            ShelterOutcome::Idle
        ));
        assert_eq!(shelter.occupants.len(), SHELTER_CAPACITY);
    }

    #[test]
    fn test_occupancy_ratio() {
        let mut shelter = shelter();
        assert_eq!(shelter.occupancy_ratio(), 0.0);
        shelter.add_occupant(member(1, Role::Normal)).unwrap();
        assert!((shelter.occupancy_ratio() - 0.1).abs() < 1e-9);
    }
}
