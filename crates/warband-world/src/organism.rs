//! Organism state and behaviour.

use crate::resource::ResourceDeposit;
use crate::shelter::Shelter;
use rand::seq::SliceRandom;
use rand::Rng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use warband_core::{Faction, OrganismId, Position, ResourceKind, Role, ShelterId};

pub const INITIAL_ENERGY: f64 = 2.0;
pub const INITIAL_STRENGTH: f64 = 1.0;

pub const BUILDER_CHANCE: f64 = 0.16;
pub const MINER_CHANCE: f64 = 0.16;

/// Power bonus while housed in a shelter
pub const SHELTER_POWER_BONUS: f64 = 1.5;
/// Energy an organism must exceed to reproduce
pub const REPRODUCTION_ENERGY: f64 = 2.85;
/// Share of the parent's energy handed to a child
pub const CHILD_ENERGY_SHARE: f64 = 0.4;
pub const MUTATION_CHANCE: f64 = 0.15;
pub const MUTATION_BOOST: f64 = 1.2;
/// Energy lost per tick of aging
pub const AGING_DECAY: f64 = 0.08;

pub const BUILD_ORE_COST: u32 = 1;
pub const BUILD_MISC_COST: u32 = 2;

/// A heritable trait tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Mutation {
    EnergyBoost,
    StrengthBoost,
    /// Carried through lineages but has no stat effect
    Efficiency,
}

impl Mutation {
    pub fn all() -> [Mutation; 3] {
        [Mutation::EnergyBoost, Mutation::StrengthBoost, Mutation::Efficiency]
    }
}

/// Carried ore and misc
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Inventory {
    pub ore: u32,
    pub misc: u32,
}

impl Inventory {
    pub fn get(&self, kind: ResourceKind) -> u32 {
        match kind {
            ResourceKind::Ore => self.ore,
            ResourceKind::Misc => self.misc,
            ResourceKind::Food => 0,
        }
    }

    fn slot_mut(&mut self, kind: ResourceKind) -> Option<&mut u32> {
        match kind {
            ResourceKind::Ore => Some(&mut self.ore),
            ResourceKind::Misc => Some(&mut self.misc),
            ResourceKind::Food => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.ore == 0 && self.misc == 0
    }
}

/// An organism in the simulation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Organism {
    pub id: OrganismId,
    pub faction: Faction,
    pub role: Role,
    pub energy: f64,
    pub strength: f64,
    pub age: u64,
    pub mutations: Vec<Mutation>,
    pub last_reproduction: u64,
    pub inventory: Inventory,
    pub sheltered: bool,
    /// Shelter currently housing this organism
    pub shelter: Option<ShelterId>,
    /// Last known grid cell, refreshed whenever the world places it
    pub position: Option<Position>,
}

impl Organism {
    /// Create an organism with a randomly drawn role
    pub fn new(
        id: OrganismId,
        faction: Faction,
        energy: f64,
        strength: f64,
        rng: &mut ChaCha8Rng,
    ) -> Self {
        let role = Self::draw_role(rng);
        Self::with_role(id, faction, role, energy, strength)
    }

    pub fn with_role(
        id: OrganismId,
        faction: Faction,
        role: Role,
        energy: f64,
        strength: f64,
    ) -> Self {
        Self {
            id,
            faction,
            role,
            energy: energy.max(0.0),
            strength: strength.max(0.0),
            age: 0,
            mutations: Vec::new(),
            last_reproduction: 0,
            inventory: Inventory::default(),
            sheltered: false,
            shelter: None,
            position: None,
        }
    }

    /// 16% Builder, 16% Miner, the rest Normal
    pub fn draw_role(rng: &mut ChaCha8Rng) -> Role {
        let roll = rng.gen::<f64>();
        if roll < BUILDER_CHANCE {
            Role::Builder
        } else if roll < BUILDER_CHANCE + MINER_CHANCE {
            Role::Miner
        } else {
            Role::Normal
        }
    }

    pub fn power(&self) -> f64 {
        let base = self.energy + 2.0 * self.strength;
        if self.sheltered {
            base * SHELTER_POWER_BONUS
        } else {
            base
        }
    }

    pub fn can_build(&self) -> bool {
        self.role == Role::Builder
            && self.inventory.ore >= BUILD_ORE_COST
            && self.inventory.misc >= BUILD_MISC_COST
    }

    /// Spend building materials on a shelter at `position`, seated with
    /// this organism as its first occupant.
    ///
    /// Hands the organism back untouched when it cannot build.
    pub fn build_shelter(mut self, id: ShelterId, position: Position) -> Result<Shelter, Organism> {
        if !self.can_build() {
            return Err(self);
        }

        self.inventory.ore -= BUILD_ORE_COST;
        self.inventory.misc -= BUILD_MISC_COST;

        let mut shelter = Shelter::new(id, self.faction, position);
        shelter.add_occupant(self)?;
        Ok(shelter)
    }

    pub fn can_mine(&self) -> bool {
        self.role == Role::Miner
    }

    /// Hand every carried ore and misc to an allied builder
    pub fn transfer_inventory_to(&mut self, builder: &mut Organism) -> bool {
        if builder.role != Role::Builder || builder.faction != self.faction {
            return false;
        }

        builder.inventory.ore += self.inventory.ore;
        builder.inventory.misc += self.inventory.misc;
        self.inventory = Inventory::default();
        true
    }

    /// Absorb a deposit. Returns false when the deposit is left untouched,
    /// which only happens for ore under a non-miner.
    pub fn consume_resource(&mut self, deposit: &ResourceDeposit) -> bool {
        if deposit.kind == ResourceKind::Ore && !self.can_mine() {
            return false;
        }

        if let Some(slot) = self.inventory.slot_mut(deposit.kind) {
            *slot += deposit.amount;
        }
        self.energy += f64::from(deposit.amount) * deposit.energy_factor;
        self.strength += f64::from(deposit.amount) * deposit.strength_factor;
        true
    }

    /// Move `amount` of `kind` to an allied peer
    pub fn transfer_resource_amount(
        &mut self,
        other: &mut Organism,
        kind: ResourceKind,
        amount: u32,
    ) -> bool {
        if other.faction != self.faction || self.inventory.get(kind) < amount {
            return false;
        }

        match (self.inventory.slot_mut(kind), other.inventory.slot_mut(kind)) {
            (Some(from), Some(to)) => {
                *from -= amount;
                *to += amount;
                true
            }
            _ => false,
        }
    }

    pub fn can_reproduce(&self) -> bool {
        self.energy > REPRODUCTION_ENERGY
            && self.age > 1
            && self.age.saturating_sub(self.last_reproduction) > 1
    }

    /// Split off a child carrying 40% of this organism's energy
    pub fn reproduce(&mut self, child_id: OrganismId, rng: &mut ChaCha8Rng) -> Organism {
        let mut child = Organism::new(
            child_id,
            self.faction,
            self.energy * CHILD_ENERGY_SHARE,
            self.strength,
            rng,
        );
        child.mutations = self.mutations.clone();

        self.energy *= 1.0 - CHILD_ENERGY_SHARE;
        self.last_reproduction = self.age;

        if rng.gen::<f64>() < MUTATION_CHANCE {
            if let Some(&mutation) = Mutation::all().choose(rng) {
                match mutation {
                    Mutation::EnergyBoost => child.energy *= MUTATION_BOOST,
                    Mutation::StrengthBoost => child.strength *= MUTATION_BOOST,
                    Mutation::Efficiency => {}
                }
                child.mutations.push(mutation);
            }
        }

        child
    }

    /// Advance one tick of age, decaying energy
    pub fn age_one_tick(&mut self) {
        self.age += 1;
        self.consume_energy(AGING_DECAY);
    }

    /// Deduct energy, clamping at zero
    pub fn consume_energy(&mut self, amount: f64) {
        self.energy = (self.energy - amount).max(0.0);
    }

    pub fn scale_energy(&mut self, factor: f64) {
        self.energy = (self.energy * factor).max(0.0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    fn organism(role: Role) -> Organism {
        Organism::with_role(OrganismId(1), Faction::Alpha, role, INITIAL_ENERGY, INITIAL_STRENGTH)
    }

    #[test]
    fn test_organism_creation() {
        let org = organism(Role::Normal);
        assert_eq!(org.energy, 2.0);
        assert_eq!(org.strength, 1.0);
        assert_eq!(org.age, 0);
        assert!(!org.sheltered);
        assert!(org.shelter.is_none());
        assert!(org.inventory.is_empty());
    }

    #[test]
    fn test_role_distribution() {
        let mut rng = ChaCha8Rng::seed_from_u64(42);
        let mut builders = 0;
        let mut miners = 0;
        for _ in 0..10_000 {
            match Organism::draw_role(&mut rng) {
                Role::Builder => builders += 1,
                Role::Miner => miners += 1,
                Role::Normal => {}
            }
        }
        assert!((1400..1800).contains(&builders), "builders {}", builders);
        assert!((1400..1800).contains(&miners), "miners {}", miners);
    }

    #[test]
    fn test_power() {
        let mut org = organism(Role::Normal);
        org.energy = 3.0;
        org.strength = 1.0;
        assert_eq!(org.power(), 5.0);

        org.sheltered = true;
        assert_eq!(org.power(), 7.5);
    }

    #[test]
    fn test_build_shelter_consumes_materials() {
        let mut builder = organism(Role::Builder);
        builder.inventory = Inventory { ore: 2, misc: 3 };

        let shelter = builder.build_shelter(ShelterId(5), Position::new(2, 2)).unwrap();
        assert_eq!(shelter.faction, Faction::Alpha);
        assert_eq!(shelter.occupants.len(), 1);

        let seated = &shelter.occupants[0];
        assert!(seated.sheltered);
        assert_eq!(seated.shelter, Some(ShelterId(5)));
        assert_eq!(seated.inventory, Inventory { ore: 1, misc: 1 });
    }

    #[test]
    fn test_build_shelter_requires_materials_and_role() {
        let mut builder = organism(Role::Builder);
        builder.inventory = Inventory { ore: 1, misc: 1 };
        let returned = builder.build_shelter(ShelterId(1), Position::new(0, 0)).unwrap_err();
        assert_eq!(returned.inventory, Inventory { ore: 1, misc: 1 });

        let mut miner = organism(Role::Miner);
        miner.inventory = Inventory { ore: 5, misc: 5 };
        assert!(!miner.can_build());
        assert!(miner.build_shelter(ShelterId(2), Position::new(0, 0)).is_err());
    }

    #[test]
    fn test_ore_only_absorbed_by_miners() {
        let ore = ResourceDeposit::ore(3);

        let mut normal = organism(Role::Normal);
        assert!(!normal.consume_resource(&ore));
        assert_eq!(normal.energy, 2.0);
        assert_eq!(normal.inventory.ore, 0);

        let mut miner = organism(Role::Miner);
        assert!(miner.consume_resource(&ore));
        assert_eq!(miner.inventory.ore, 3);
        assert_eq!(miner.energy, 2.0 + 9.0);
        assert_eq!(miner.strength, 1.0 + 6.0);
    }

    #[test]
    fn test_food_and_misc_absorbed_by_everyone() {
        let mut builder = organism(Role::Builder);
        assert!(builder.consume_resource(&ResourceDeposit::food(2)));
        assert_eq!(builder.energy, 4.0);
        assert_eq!(builder.strength, 1.0);

        assert!(builder.consume_resource(&ResourceDeposit::misc(2)));
        assert_eq!(builder.energy, 5.0);
        assert_eq!(builder.strength, 2.0);
        assert_eq!(builder.inventory.misc, 2);
    }

    #[test]
    fn test_transfer_inventory_to_builder() {
        let mut miner = organism(Role::Miner);
        miner.inventory = Inventory { ore: 2, misc: 1 };
        let mut builder = organism(Role::Builder);
        builder.id = OrganismId(2);

        assert!(miner.transfer_inventory_to(&mut builder));
        assert!(miner.inventory.is_empty());
        assert_eq!(builder.inventory, Inventory { ore: 2, misc: 1 });
    }

    #[test]
    fn test_transfer_inventory_rejects_enemy_or_non_builder() {
        let mut miner = organism(Role::Miner);
        miner.inventory = Inventory { ore: 2, misc: 1 };

        let mut enemy = organism(Role::Builder);
        enemy.faction = Faction::Beta;
        assert!(!miner.transfer_inventory_to(&mut enemy));

        let mut peer = organism(Role::Normal);
        assert!(!miner.transfer_inventory_to(&mut peer));
        assert_eq!(miner.inventory, Inventory { ore: 2, misc: 1 });
    }

    #[test]
    fn test_transfer_resource_amount() {
        let mut giver = organism(Role::Miner);
        giver.inventory.misc = 3;
        let mut taker = organism(Role::Normal);

        assert!(giver.transfer_resource_amount(&mut taker, ResourceKind::Misc, 2));
        assert_eq!(giver.inventory.misc, 1);
        assert_eq!(taker.inventory.misc, 2);

        assert!(!giver.transfer_resource_amount(&mut taker, ResourceKind::Misc, 2));
        assert!(!giver.transfer_resource_amount(&mut taker, ResourceKind::Food, 0));

        taker.faction = Faction::Beta;
        assert!(!giver.transfer_resource_amount(&mut taker, ResourceKind::Misc, 1));
    }

    #[test]
    fn test_can_reproduce_thresholds() {
        let mut org = organism(Role::Normal);
        org.energy = 3.0;
        org.age = 3;
        assert!(org.can_reproduce());

        org.energy = 2.85;
        assert!(!org.can_reproduce());

        org.energy = 3.0;
        org.age = 1;
        assert!(!org.can_reproduce());

        org.age = 3;
        org.last_reproduction = 2;
        assert!(!org.can_reproduce());
    }

    #[test]
    fn test_reproduce_splits_energy() {
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let mut parent = organism(Role::Normal);
        parent.energy = 3.0;
        parent.age = 3;
        parent.mutations = vec![Mutation::Efficiency];

        let child = parent.reproduce(OrganismId(9), &mut rng);
        assert!((parent.energy - 1.8).abs() < 1e-9);
        assert_eq!(parent.last_reproduction, 3);
        assert_eq!(child.id, OrganismId(9));
        assert_eq!(child.faction, Faction::Alpha);
        assert_eq!(child.age, 0);
        assert_eq!(child.mutations[0], Mutation::Efficiency);

        let expected_energy = match child.mutations.get(1) {
            Some(Mutation::EnergyBoost) => 1.2 * MUTATION_BOOST,
            _ => 1.2,
        };
        let expected_strength = match child.mutations.get(1) {
            Some(Mutation::StrengthBoost) => MUTATION_BOOST,
            _ => 1.0,
        };
        assert!((child.energy - expected_energy).abs() < 1e-9);
        assert!((child.strength - expected_strength).abs() < 1e-9);
    }

    #[test]
    fn test_mutation_rate() {
        let mut rng = ChaCha8Rng::seed_from_u64(123);
        let mut mutated = 0;
        for i in 0..4000 {
            let mut parent = organism(Role::Normal);
            parent.energy = 10.0;
            if !parent.reproduce(OrganismId(i), &mut rng).mutations.is_empty() {
                mutated += 1;
            }
        }
        assert!((450..750).contains(&mutated), "mutated {}", mutated);
    }

    #[test]
    fn test_aging_clamps_energy() {
        let mut org = organism(Role::Normal);
        org.energy = 0.05;
        org.age_one_tick();
        assert_eq!(org.age, 1);
        assert_eq!(org.energy, 0.0);

        org.energy = 1.0;
        org.age_one_tick();
        assert!((org.energy - 0.92).abs() < 1e-9);
    }
}
