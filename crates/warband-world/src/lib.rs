//! World simulation engine.
//!
//! Three layers share one bounded square grid: organisms, resource deposits
//! and shelters. [`World::step`] runs the ordered per-tick phases over them.

pub mod army;
pub mod grid;
pub mod organism;
pub mod resource;
pub mod shelter;
pub mod snapshot;
pub mod world;

pub use army::WarBand;
pub use grid::Layer;
pub use organism::{Inventory, Mutation, Organism};
pub use resource::{ResourceDeposit, ResourceField};
pub use shelter::{DamageOutcome, Shelter, ShelterOutcome};
pub use snapshot::{OrganismView, ShelterView, WorldSnapshot};
pub use world::World;
