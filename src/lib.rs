#[macro_use]
extern crate log;

pub mod backup;
pub mod chunk_claims;
pub mod colony;
pub mod compat;
pub mod config;
pub mod events;
pub mod idx;
pub mod interval;
pub mod logger;
pub mod manager;
pub mod messages;
pub mod pos;
pub mod recipes;
pub mod sound;
pub mod store;
pub mod tick;
pub mod views;
pub mod world;

pub use chunk_claims::ChunkClaims;
pub use colony::{Building, Citizen, Colony, Permissions, Rank};
pub use compat::CompatibilityStore;
pub use config::ServerConfigs;
pub use events::ColonyEvent;
pub use idx::*;
pub use manager::{ColonyManager, CreateColonyError, DeletionReport, ManagerSave};
pub use messages::ViewMessage;
pub use pos::{BlockPos, ChunkPos, BLOCKS_PER_CHUNK};
pub use recipes::{Recipe, RecipeStore};
pub use store::ColonyStore;
pub use tick::TickPhase;
pub use views::{ColonyView, ColonyViews};
pub use world::{World, Worlds};

/// Game ticks per second.
pub const TICKS_PER_SECOND: u64 = 20;
/// How many server ticks make one hour of colony age.
pub const TICKS_PER_HOUR: u64 = TICKS_PER_SECOND * 60 * 60;
