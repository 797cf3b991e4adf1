//! The world: three spatial layers and the ordered per-tick update.

use crate::army::{WarBand, ARMY_SIZE};
use crate::grid::Layer;
use crate::organism::{Organism, INITIAL_ENERGY, INITIAL_STRENGTH};
use crate::resource::ResourceField;
use crate::shelter::{DamageOutcome, Shelter, ShelterOutcome};
use crate::snapshot::{OrganismView, ShelterView, WorldSnapshot};
use rand::seq::SliceRandom;
use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::collections::{HashMap, HashSet};
use tracing::{debug, info, instrument, trace, warn};
use warband_core::{
    Faction, OrganismId, Position, ResourceKind, Result, Role, ShelterId, WorldConfig, WorldStats,
};

/// Manhattan radius of the target search
pub const SEARCH_RADIUS: i32 = 10;
/// Share of an attacker's power dealt to a shelter per hit
pub const SHELTER_DAMAGE_FACTOR: f64 = 0.2;
/// Free neighbouring cells a builder needs before it can build
pub const BUILD_CLEARANCE: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TargetAction {
    Attack,
    Shelter,
    Mate,
}

impl TargetAction {
    /// Lower wins among targets at the same distance
    fn rank(&self) -> u8 {
        match self {
            TargetAction::Attack => 0,
            TargetAction::Shelter | TargetAction::Mate => 1,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Target {
    position: Position,
    action: TargetAction,
}

/// A defender pulled out of its shelter during an attack
#[derive(Debug, Clone, Copy)]
struct Evacuee {
    organism: OrganismId,
    shelter: ShelterId,
    shelter_position: Position,
}

pub struct World {
    config: WorldConfig,
    size: i32,
    organisms: Layer<Organism>,
    resources: ResourceField,
    shelters: Layer<Shelter>,
    war_bands: Vec<WarBand>,
    stats: WorldStats,
    rng: ChaCha8Rng,
    tick: u64,
    next_organism_id: u64,
    next_shelter_id: u64,
}

impl World {
    /// Build a populated world: random factions per cell, then ore deposits
    pub fn new(config: WorldConfig) -> Result<Self> {
        let mut world = Self::blank(config)?;
        let alpha = world.config.alpha_spawn_probability;
        let beta = world.config.beta_spawn_probability;

        let cells: Vec<Position> = world.organisms.positions().collect();
        for pos in cells {
            let roll = world.rng.gen::<f64>();
            let faction = if roll < alpha {
                Faction::Alpha
            } else if roll < alpha + beta {
                Faction::Beta
            } else {
                continue;
            };

            let id = world.issue_organism_id();
            let organism =
                Organism::new(id, faction, INITIAL_ENERGY, INITIAL_STRENGTH, &mut world.rng);
            world.settle(pos, organism);
        }

        let ore_deposits = ResourceField::ore_deposit_count(world.size);
        world.resources.seed_ore(ore_deposits, &mut world.rng);
        world.recount();

        info!(
            grid_size = world.size,
            seed = world.config.seed,
            alpha = world.stats.alpha.population,
            beta = world.stats.beta.population,
            ore_deposits = ore_deposits,
            "World created"
        );

        Ok(world)
    }

    /// An empty world with no organisms and no ore
    pub fn blank(config: WorldConfig) -> Result<Self> {
        config.validate()?;
        let size = config.grid_size;
        let rng = ChaCha8Rng::seed_from_u64(config.seed);

        Ok(Self {
            config,
            size,
            organisms: Layer::new(size),
            resources: ResourceField::new(size),
            shelters: Layer::new(size),
            war_bands: Vec::new(),
            stats: WorldStats::new(),
            rng,
            tick: 0,
            next_organism_id: 0,
            next_shelter_id: 0,
        })
    }

    /// Put a fresh organism on a free cell. Returns `None` when the cell is
    /// out of bounds, taken, or holds a shelter.
    pub fn place_organism(
        &mut self,
        pos: Position,
        faction: Faction,
        role: Role,
        energy: f64,
        strength: f64,
    ) -> Option<OrganismId> {
        if !self.is_free(pos) {
            return None;
        }

        let id = self.issue_organism_id();
        self.settle(pos, Organism::with_role(id, faction, role, energy, strength));
        self.recount();
        Some(id)
    }

    pub fn tick(&self) -> u64 {
        self.tick
    }

    pub fn size(&self) -> i32 {
        self.size
    }

    pub fn config(&self) -> &WorldConfig {
        &self.config
    }

    /// Counters from the most recent recount
    pub fn stats(&self) -> &WorldStats {
        &self.stats
    }

    pub fn organisms(&self) -> &Layer<Organism> {
        &self.organisms
    }

    pub fn shelters(&self) -> &Layer<Shelter> {
        &self.shelters
    }

    pub fn resources(&self) -> &ResourceField {
        &self.resources
    }

    pub fn war_bands(&self) -> &[WarBand] {
        &self.war_bands
    }

    pub fn organism_at(&self, pos: Position) -> Option<&Organism> {
        self.organisms.get(pos)
    }

    pub fn organism_at_mut(&mut self, pos: Position) -> Option<&mut Organism> {
        self.organisms.get_mut(pos)
    }

    pub fn shelter_at(&self, pos: Position) -> Option<&Shelter> {
        self.shelters.get(pos)
    }

    /// Organisms on the grid plus those housed in shelters
    pub fn population(&self) -> usize {
        self.organisms.count()
            + self
                .shelters
                .iter()
                .map(|(_, shelter)| shelter.occupants.len())
                .sum::<usize>()
    }

    /// Ore in deposits plus ore carried by every organism
    pub fn total_ore(&self) -> u32 {
        let carried_on_grid: u32 = self.organisms.iter().map(|(_, o)| o.inventory.ore).sum();
        let carried_inside: u32 = self
            .shelters
            .iter()
            .flat_map(|(_, shelter)| shelter.occupants.iter())
            .map(|o| o.inventory.ore)
            .sum();
        self.resources.total_ore() + carried_on_grid + carried_inside
    }

    /// Run the simulation for `ticks` steps
    #[instrument(skip(self))]
    pub fn run(&mut self, ticks: u64) -> WorldStats {
        info!(
            grid_size = self.size,
            seed = self.config.seed,
            "Starting simulation for {} ticks",
            ticks
        );

        for _ in 0..ticks {
            self.step();

            if self.tick % 100 == 0 {
                self.emit_population_metrics();
            }
        }

        self.stats
    }

    /// Advance every layer by one tick
    pub fn step(&mut self) -> &WorldStats {
        self.tick += 1;
        let born_this_tick = self.next_organism_id;

        let evacuated = self.move_organisms();
        self.resolve_combat();
        self.breed_in_place();
        self.regenerate_resources();
        self.construct_shelters();
        self.defend_shelters();
        self.enter_shelters();
        self.deliver_resources();
        self.return_defenders(&evacuated);
        self.upkeep(born_this_tick);
        self.recount();
        self.muster_war_bands();
        self.march_war_bands();

        debug!(
            tick = self.tick,
            alpha = self.stats.alpha.population,
            beta = self.stats.beta.population,
            shelters = self.stats.total_shelters(),
            war_bands = self.war_bands.len(),
            "Tick complete"
        );

        &self.stats
    }

    /// Read-only copy of all layers for renderers
    pub fn snapshot(&self) -> WorldSnapshot {
        let cells: Vec<Position> = self.organisms.positions().collect();

        WorldSnapshot {
            tick: self.tick,
            size: self.size,
            organisms: cells
                .iter()
                .map(|pos| {
                    self.organisms.get(*pos).map(|o| OrganismView {
                        faction: o.faction,
                        role: o.role,
                    })
                })
                .collect(),
            resources: cells
                .iter()
                .map(|pos| self.resources.get(*pos).map(|deposit| deposit.kind))
                .collect(),
            shelters: cells
                .iter()
                .map(|pos| {
                    self.shelters.get(*pos).map(|shelter| ShelterView {
                        faction: shelter.faction,
                        occupancy: shelter.occupancy_ratio(),
                    })
                })
                .collect(),
            stats: self.stats,
        }
    }

    fn issue_organism_id(&mut self) -> OrganismId {
        let id = OrganismId(self.next_organism_id);
        self.next_organism_id += 1;
        id
    }

    fn issue_shelter_id(&mut self) -> ShelterId {
        let id = ShelterId(self.next_shelter_id);
        self.next_shelter_id += 1;
        id
    }

    /// Organism-free and shelter-free on the committed layers
    fn is_free(&self, pos: Position) -> bool {
        self.organisms.contains(pos)
            && self.organisms.is_empty_at(pos)
            && self.shelters.is_empty_at(pos)
    }

    /// Free for the movement phase: also empty at the start of the phase
    fn is_open(&self, pos: Position, was_occupied: &HashSet<Position>) -> bool {
        !was_occupied.contains(&pos) && self.is_free(pos)
    }

    fn open_cells_around(&self, pos: Position, was_occupied: &HashSet<Position>) -> Vec<Position> {
        pos.neighbors(self.size)
            .filter(|cell| self.is_open(*cell, was_occupied))
            .collect()
    }

    fn free_cells_around(&self, pos: Position) -> Vec<Position> {
        pos.neighbors(self.size).filter(|cell| self.is_free(*cell)).collect()
    }

    /// Put an organism on the grid and record where it stands
    fn settle(&mut self, pos: Position, mut organism: Organism) {
        organism.position = Some(pos);
        if let Err(organism) = self.organisms.insert(pos, organism) {
            warn!(
                organism_id = %organism.id,
                x = pos.x,
                y = pos.y,
                "Cell already taken, organism dropped"
            );
        }
    }

    /// Seat an organism in the shelter at `at`, handing it back on failure
    fn seat(&mut self, at: Position, organism: Organism) -> std::result::Result<(), Organism> {
        match self.shelters.get_mut(at) {
            Some(shelter) => shelter.add_occupant(organism),
            None => Err(organism),
        }
    }

    /// Targeting and movement into a fresh organism layer.
    ///
    /// The previous layer is drained in scan order; organisms not yet
    /// processed stay visible there, processed ones in the new layer.
    fn move_organisms(&mut self) -> Vec<Evacuee> {
        let mut current = std::mem::replace(&mut self.organisms, Layer::new(self.size));
        let was_occupied: HashSet<Position> = current.iter().map(|(pos, _)| pos).collect();
        let order: Vec<Position> = current.iter().map(|(pos, _)| pos).collect();
        let mut evacuated = Vec::new();

        for pos in order {
            let Some(mut organism) = current.take(pos) else {
                continue;
            };

            let enemy_shelters: Vec<Position> = pos
                .neighbors(self.size)
                .filter(|cell| {
                    self.shelters
                        .get(*cell)
                        .is_some_and(|shelter| shelter.faction != organism.faction)
                })
                .collect();
            for at in enemy_shelters {
                self.assault_shelter(at, organism.power(), &was_occupied, Some(&mut evacuated));
            }

            if let Some(deposit) = self.resources.get(pos).copied() {
                if organism.consume_resource(&deposit) {
                    self.resources.take(pos);
                }
            }

            if let Some(target) = self.find_nearest_target(pos, &organism, &current) {
                if pos.is_adjacent(&target.position) {
                    match target.action {
                        TargetAction::Attack => {
                            self.assault_shelter(
                                target.position,
                                organism.power(),
                                &was_occupied,
                                None,
                            );
                        }
                        TargetAction::Mate => {
                            let open = self.open_cells_around(pos, &was_occupied);
                            if let Some(&cell) = open.choose(&mut self.rng) {
                                let child_id = self.issue_organism_id();
                                let child = organism.reproduce(child_id, &mut self.rng);
                                trace!(
                                    parent = %organism.id,
                                    child = %child_id,
                                    x = cell.x,
                                    y = cell.y,
                                    "Mated"
                                );
                                self.settle(cell, child);
                            }
                        }
                        TargetAction::Shelter => {
                            let id = organism.id;
                            match self.seat(target.position, organism) {
                                Ok(()) => {
                                    trace!(
                                        organism_id = %id,
                                        x = target.position.x,
                                        y = target.position.y,
                                        "Entered shelter"
                                    );
                                    continue;
                                }
                                Err(returned) => organism = returned,
                            }
                        }
                    }
                } else {
                    let step = pos.step_toward(&target.position);
                    if self.is_open(step, &was_occupied) {
                        self.settle(step, organism);
                        continue;
                    }
                }
            }

            if self.rng.gen::<f64>() < self.config.move_probability {
                let open = self.open_cells_around(pos, &was_occupied);
                if let Some(&cell) = open.choose(&mut self.rng) {
                    self.settle(cell, organism);
                    continue;
                }
            }

            self.settle(pos, organism);
        }

        evacuated
    }

    /// Nearest enemy shelter, allied shelter with room, or eligible mate
    /// within the search radius. Enemy shelters win ties on distance; after
    /// that, the first candidate in scan order wins.
    fn find_nearest_target(
        &self,
        pos: Position,
        organism: &Organism,
        unmoved: &Layer<Organism>,
    ) -> Option<Target> {
        let wants_mate = organism.can_reproduce();
        let mut best: Option<((i32, u8), Target)> = None;

        let last = self.size - 1;
        let (min_y, max_y) = ((pos.y - SEARCH_RADIUS).max(0), (pos.y + SEARCH_RADIUS).min(last));
        let (min_x, max_x) = ((pos.x - SEARCH_RADIUS).max(0), (pos.x + SEARCH_RADIUS).min(last));

        for y in min_y..=max_y {
            for x in min_x..=max_x {
                let cell = Position::new(x, y);
                let distance = pos.manhattan_distance(&cell);
                if distance > SEARCH_RADIUS || cell == pos {
                    continue;
                }

                let action = if let Some(shelter) = self.shelters.get(cell) {
                    if shelter.faction != organism.faction {
                        Some(TargetAction::Attack)
                    } else if shelter.has_space() {
                        Some(TargetAction::Shelter)
                    } else {
                        None
                    }
                } else if wants_mate {
                    unmoved
                        .get(cell)
                        .or_else(|| self.organisms.get(cell))
                        .filter(|partner| {
                            partner.faction == organism.faction && partner.can_reproduce()
                        })
                        .map(|_| TargetAction::Mate)
                } else {
                    None
                };

                if let Some(action) = action {
                    let key = (distance, action.rank());
                    if best.map_or(true, |(best_key, _)| key < best_key) {
                        let target = Target {
                            position: cell,
                            action,
                        };
                        best = Some((key, target));
                    }
                }
            }
        }

        best.map(|(_, target)| target)
    }

    /// Damage an enemy shelter. A destroyed shelter scatters its occupants
    /// onto open cells; those with nowhere to go are lost. A standing shelter
    /// sends its defenders out when `rally` collects them.
    fn assault_shelter(
        &mut self,
        at: Position,
        power: f64,
        was_occupied: &HashSet<Position>,
        rally: Option<&mut Vec<Evacuee>>,
    ) {
        let Some(shelter) = self.shelters.get_mut(at) else {
            return;
        };
        let shelter_id = shelter.id;

        match shelter.take_damage(power * SHELTER_DAMAGE_FACTOR) {
            DamageOutcome::Destroyed(evicted) => {
                self.shelters.take(at);
                let total = evicted.len();
                let mut open = self.open_cells_around(at, was_occupied);
                open.shuffle(&mut self.rng);

                let mut lost = 0;
                for organism in evicted {
                    match open.pop() {
                        Some(cell) => self.settle(cell, organism),
                        None => lost += 1,
                    }
                }
                debug!(
                    tick = self.tick,
                    shelter_id = %shelter_id,
                    x = at.x,
                    y = at.y,
                    evicted = total,
                    lost = lost,
                    "Shelter destroyed"
                );
            }
            DamageOutcome::Standing => {
                let Some(evacuated) = rally else {
                    return;
                };

                let mut open = self.open_cells_around(at, was_occupied);
                open.shuffle(&mut self.rng);
                let defenders: Vec<OrganismId> = self
                    .shelters
                    .get(at)
                    .map(|shelter| shelter.occupants.iter().map(|o| o.id).collect())
                    .unwrap_or_default();

                let mut sent = 0;
                for id in defenders {
                    let Some(cell) = open.last().copied() else {
                        break;
                    };
                    let released = self.shelters.get_mut(at).and_then(|s| s.remove_occupant(id));
                    if let Some(defender) = released {
                        open.pop();
                        self.settle(cell, defender);
                        evacuated.push(Evacuee {
                            organism: id,
                            shelter: shelter_id,
                            shelter_position: at,
                        });
                        sent += 1;
                    }
                }

                if sent > 0 {
                    debug!(
                        tick = self.tick,
                        shelter_id = %shelter_id,
                        defenders = sent,
                        "Defenders evacuated"
                    );
                }
            }
        }
    }

    /// One pass: every organism eliminates each strictly weaker enemy
    /// neighbour. Organisms already eliminated take no turn.
    fn resolve_combat(&mut self) -> usize {
        let order: Vec<Position> = self.organisms.iter().map(|(pos, _)| pos).collect();
        let mut kills = 0;

        for pos in order {
            let Some(attacker) = self.organisms.get(pos) else {
                continue;
            };
            let (faction, power) = (attacker.faction, attacker.power());

            let victims: Vec<Position> = pos
                .neighbors(self.size)
                .filter(|cell| {
                    self.organisms
                        .get(*cell)
                        .is_some_and(|other| other.faction != faction && power > other.power())
                })
                .collect();

            for cell in victims {
                if let Some(victim) = self.organisms.take(cell) {
                    trace!(
                        tick = self.tick,
                        victim = %victim.id,
                        x = cell.x,
                        y = cell.y,
                        "Organism killed"
                    );
                    kills += 1;
                }
            }
        }

        kills
    }

    /// Every surviving organism able to reproduce spawns next to itself
    fn breed_in_place(&mut self) -> usize {
        let order: Vec<Position> = self.organisms.iter().map(|(pos, _)| pos).collect();
        let mut births = 0;

        for pos in order {
            if !self.organisms.get(pos).is_some_and(|o| o.can_reproduce()) {
                continue;
            }

            let free = self.free_cells_around(pos);
            let Some(&cell) = free.choose(&mut self.rng) else {
                continue;
            };

            let child_id = self.issue_organism_id();
            let child = match self.organisms.get_mut(pos) {
                Some(parent) => parent.reproduce(child_id, &mut self.rng),
                None => continue,
            };
            trace!(tick = self.tick, child = %child_id, x = cell.x, y = cell.y, "Organism born");
            self.settle(cell, child);
            births += 1;
        }

        births
    }

    fn regenerate_resources(&mut self) -> usize {
        self.resources.regenerate(&mut self.rng)
    }

    /// Builders with materials and enough clearance found a shelter on
    /// their own cell
    fn construct_shelters(&mut self) {
        let order: Vec<Position> = self.organisms.iter().map(|(pos, _)| pos).collect();

        for pos in order {
            let ready = self.organisms.get(pos).is_some_and(|o| o.can_build())
                && self.shelters.is_empty_at(pos)
                && self.free_cells_around(pos).len() >= BUILD_CLEARANCE;
            if !ready {
                continue;
            }

            let Some(builder) = self.organisms.take(pos) else {
                continue;
            };
            let shelter_id = self.issue_shelter_id();

            match builder.build_shelter(shelter_id, pos) {
                Ok(shelter) => {
                    let faction = shelter.faction;
                    if let Err(shelter) = self.shelters.insert(pos, shelter) {
                        for occupant in shelter.occupants {
                            self.settle(pos, occupant);
                        }
                        continue;
                    }
                    debug!(
                        tick = self.tick,
                        shelter_id = %shelter_id,
                        faction = ?faction,
                        x = pos.x,
                        y = pos.y,
                        "Shelter built"
                    );
                }
                Err(builder) => self.settle(pos, builder),
            }
        }
    }

    /// Shelters with an enemy next door push their occupants out
    fn defend_shelters(&mut self) {
        let threatened: Vec<Position> = self
            .shelters
            .iter()
            .filter(|(at, shelter)| {
                at.neighbors(self.size).any(|cell| {
                    self.organisms
                        .get(cell)
                        .is_some_and(|o| o.faction != shelter.faction)
                })
            })
            .map(|(at, _)| at)
            .collect();

        for at in threatened {
            let occupants: Vec<OrganismId> = self
                .shelters
                .get(at)
                .map(|shelter| shelter.occupants.iter().map(|o| o.id).collect())
                .unwrap_or_default();

            let mut ejected = 0;
            for id in occupants {
                let Some(cell) = at.neighbors(self.size).find(|cell| self.is_free(*cell)) else {
                    break;
                };
                let released = self.shelters.get_mut(at).and_then(|s| s.remove_occupant(id));
                if let Some(defender) = released {
                    self.settle(cell, defender);
                    ejected += 1;
                }
            }

            if ejected > 0 {
                debug!(
                    tick = self.tick,
                    x = at.x,
                    y = at.y,
                    ejected = ejected,
                    "Shelter under threat ejected defenders"
                );
            }
        }
    }

    /// Unsheltered organisms next to an allied shelter with room move in
    fn enter_shelters(&mut self) {
        let order: Vec<Position> = self.organisms.iter().map(|(pos, _)| pos).collect();

        for pos in order {
            let Some(faction) = self.organisms.get(pos).map(|o| o.faction) else {
                continue;
            };
            let refuge = pos.neighbors(self.size).find(|cell| {
                self.shelters
                    .get(*cell)
                    .is_some_and(|shelter| shelter.faction == faction && shelter.has_space())
            });

            if let Some(at) = refuge {
                if let Some(organism) = self.organisms.take(pos) {
                    if let Err(organism) = self.seat(at, organism) {
                        self.settle(pos, organism);
                    }
                }
            }
        }
    }

    /// Miners hand their haul to an adjacent allied builder
    fn deliver_resources(&mut self) {
        let order: Vec<Position> = self.organisms.iter().map(|(pos, _)| pos).collect();

        for pos in order {
            let Some(faction) = self
                .organisms
                .get(pos)
                .filter(|o| o.role == Role::Miner && !o.inventory.is_empty())
                .map(|o| o.faction)
            else {
                continue;
            };

            let builder_at = pos.neighbors(self.size).find(|cell| {
                self.organisms
                    .get(*cell)
                    .is_some_and(|o| o.role == Role::Builder && o.faction == faction)
            });
            let Some(builder_at) = builder_at else {
                continue;
            };

            let Some(mut miner) = self.organisms.take(pos) else {
                continue;
            };
            if let Some(builder) = self.organisms.get_mut(builder_at) {
                let (ore, misc) = (miner.inventory.ore, miner.inventory.misc);
                if miner.transfer_inventory_to(builder) {
                    trace!(
                        miner = %miner.id,
                        builder = %builder.id,
                        ore = ore,
                        misc = misc,
                        "Resources delivered"
                    );
                }
            }
            self.settle(pos, miner);
        }
    }

    /// Defenders evacuated this tick go back inside if their shelter still
    /// stands and they are next to it
    fn return_defenders(&mut self, evacuated: &[Evacuee]) {
        let mut returned = 0;

        for evacuee in evacuated {
            let standing = self
                .shelters
                .get(evacuee.shelter_position)
                .is_some_and(|shelter| shelter.id == evacuee.shelter && !shelter.is_destroyed());
            if !standing {
                continue;
            }

            let cell = evacuee
                .shelter_position
                .neighbors(self.size)
                .find(|cell| self.organisms.get(*cell).is_some_and(|o| o.id == evacuee.organism));
            let Some(cell) = cell else {
                continue;
            };

            if let Some(defender) = self.organisms.take(cell) {
                match self.seat(evacuee.shelter_position, defender) {
                    Ok(()) => returned += 1,
                    Err(defender) => self.settle(cell, defender),
                }
            }
        }

        if returned > 0 {
            debug!(tick = self.tick, returned = returned, "Defenders returned to shelter");
        }
    }

    /// Shelter cooldowns and in-shelter reproduction, then aging of every
    /// organism issued before `born_this_tick`
    fn upkeep(&mut self, born_this_tick: u64) {
        if self.config.shelter_upkeep {
            let sites: Vec<Position> = self.shelters.iter().map(|(at, _)| at).collect();

            for at in sites {
                let Some(shelter) = self.shelters.get_mut(at) else {
                    continue;
                };
                shelter.tick();

                let faction = shelter.faction;
                let next_id = &mut self.next_organism_id;
                let outcome = shelter.try_reproduce(
                    || {
                        let id = OrganismId(*next_id);
                        *next_id += 1;
                        id
                    },
                    &mut self.rng,
                );

                match outcome {
                    ShelterOutcome::Idle => {}
                    ShelterOutcome::Birth(child) => {
                        debug!(
                            tick = self.tick,
                            child = %child,
                            x = at.x,
                            y = at.y,
                            "Birth inside shelter"
                        );
                    }
                    ShelterOutcome::WarBand(band) => self.deploy_war_band(at, faction, band),
                }
            }
        }

        if self.config.aging {
            for (_, organism) in self.organisms.iter_mut() {
                if organism.id.0 < born_this_tick {
                    organism.age_one_tick();
                }
            }
            for (_, shelter) in self.shelters.iter_mut() {
                for organism in shelter.occupants.iter_mut() {
                    if organism.id.0 < born_this_tick {
                        organism.age_one_tick();
                    }
                }
            }
        }
    }

    /// Place a shelter's released war-band around it. Members with no free
    /// cell are seated again.
    fn deploy_war_band(&mut self, at: Position, faction: Faction, band: Vec<Organism>) {
        let mut members = Vec::with_capacity(band.len());

        for soldier in band {
            match at.neighbors(self.size).find(|cell| self.is_free(*cell)) {
                Some(cell) => {
                    members.push(soldier.id);
                    self.settle(cell, soldier);
                }
                None => {
                    if let Err(soldier) = self.seat(at, soldier) {
                        warn!(
                            organism_id = %soldier.id,
                            "No room to return war-band member, organism dropped"
                        );
                    }
                }
            }
        }

        if !members.is_empty() {
            debug!(
                tick = self.tick,
                faction = ?faction,
                members = members.len(),
                x = at.x,
                y = at.y,
                "Shelter released a war-band"
            );
            self.war_bands.push(WarBand::new(faction, members));
        }
    }

    /// Recompute per-faction population, shelter and inventory counters
    fn recount(&mut self) {
        let mut stats = WorldStats::new();

        for (_, organism) in self.organisms.iter() {
            if let Some(counters) = stats.get_mut(organism.faction) {
                counters.record_organism(organism.inventory.ore, organism.inventory.misc);
            }
        }

        for (_, shelter) in self.shelters.iter() {
            if let Some(counters) = stats.get_mut(shelter.faction) {
                counters.record_shelter();
                for organism in &shelter.occupants {
                    counters.record_organism(organism.inventory.ore, organism.inventory.misc);
                }
            }
        }

        self.stats = stats;
    }

    /// Each faction with enough unenlisted Normal organisms on the grid
    /// musters the first of them, in scan order, into a war-band
    fn muster_war_bands(&mut self) {
        let enlisted: HashSet<OrganismId> = self
            .war_bands
            .iter()
            .flat_map(|band| band.members.iter().copied())
            .collect();

        for faction in Faction::playable() {
            let recruits: Vec<OrganismId> = self
                .organisms
                .iter()
                .filter(|(_, o)| {
                    o.faction == faction
                        && !o.sheltered
                        && o.role == Role::Normal
                        && !enlisted.contains(&o.id)
                })
                .map(|(_, o)| o.id)
                .take(ARMY_SIZE)
                .collect();

            if recruits.len() >= ARMY_SIZE {
                debug!(
                    tick = self.tick,
                    faction = ?faction,
                    members = recruits.len(),
                    "War-band formed"
                );
                self.war_bands.push(WarBand::new(faction, recruits));
            }
        }
    }

    /// Drop fallen members, dissolve depleted bands, and step every
    /// remaining member toward the enemy nearest the band's first member
    fn march_war_bands(&mut self) {
        let mut locations: HashMap<OrganismId, Position> =
            self.organisms.iter().map(|(pos, o)| (o.id, pos)).collect();
        let bands = std::mem::take(&mut self.war_bands);
        let mut standing = Vec::with_capacity(bands.len());

        for mut band in bands {
            band.retain_members(|id| {
                locations
                    .get(&id)
                    .and_then(|pos| self.organisms.get(*pos))
                    .is_some_and(|o| o.id == id && o.energy > 0.0)
            });

            if !band.is_viable() {
                debug!(
                    tick = self.tick,
                    faction = ?band.faction,
                    remaining = band.len(),
                    "War-band dissolved"
                );
                continue;
            }

            let Some(leader) = band.members.first().and_then(|id| locations.get(id)).copied() else {
                continue;
            };
            let target = self
                .organisms
                .iter()
                .filter(|(_, o)| o.faction != band.faction)
                .min_by_key(|(pos, _)| pos.manhattan_distance(&leader))
                .map(|(pos, _)| pos);

            if let Some(target) = target {
                for id in &band.members {
                    let Some(&from) = locations.get(id) else {
                        continue;
                    };
                    let to = from.step_toward(&target);
                    if to == from || !self.is_free(to) {
                        continue;
                    }
                    if let Some(soldier) = self.organisms.take(from) {
                        self.settle(to, soldier);
                        locations.insert(*id, to);
                    }
                }
            }

            standing.push(band);
        }

        self.war_bands = standing;
    }

    fn emit_population_metrics(&self) {
        let deposits = self.resources.layer().count();
        let food = self
            .resources
            .iter()
            .filter(|(_, deposit)| deposit.kind == ResourceKind::Food)
            .count();

        info!(
            event = "population_metrics",
            tick = self.tick,
            alpha_population = self.stats.alpha.population,
            beta_population = self.stats.beta.population,
            alpha_shelters = self.stats.alpha.shelters,
            beta_shelters = self.stats.beta.shelters,
            alpha_ore = self.stats.alpha.ore,
            beta_ore = self.stats.beta.ore,
            alpha_misc = self.stats.alpha.misc,
            beta_misc = self.stats.beta.misc,
            war_bands = self.war_bands.len(),
            deposits = deposits,
            food_deposits = food,
            "Population metrics snapshot"
        );
    }
}
