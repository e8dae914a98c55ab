use crate::chunk_claims::ChunkClaims;
use crate::idx::{CitizenId, ColonyId, DimensionId, PlayerId};
use crate::pos::BlockPos;
use crate::TICKS_PER_HOUR;
use ahash::AHashMap;
use anyhow::{bail, ensure};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

/// Rank of a player inside a colony's permission table.
///
/// The rules attached to each rank live in the permission handlers,
/// not here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Rank {
    Owner,
    Officer,
    Friend,
    Neutral,
    Hostile,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Permissions {
    owner: PlayerId,
    ranks: AHashMap<PlayerId, Rank>,
}
impl Permissions {
    pub fn owner(&self) -> PlayerId {
        self.owner
    }

    pub fn set_owner(&mut self, player: PlayerId) {
        self.ranks.remove(&self.owner);
        self.owner = player;
        self.ranks.insert(player, Rank::Owner);
    }

    pub fn is_owner(&self, player: PlayerId) -> bool {
        self.owner == player
    }

    pub fn rank(&self, player: PlayerId) -> Rank {
        self.ranks.get(&player).copied().unwrap_or(Rank::Neutral)
    }

    pub fn set_rank(&mut self, player: PlayerId, rank: Rank) {
        self.ranks.insert(player, rank);
    }
}

/// Why a citizen entity left the world.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DespawnCause {
    /// Normal gameplay death.
    Gameplay,
    /// Administrative removal, eg. while deleting the colony.
    Console,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CitizenEntity {
    pub position: BlockPos,
    /// A dead entity lingers until the world removes it.
    pub dead: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Citizen {
    pub name: String,
    /// Set while the citizen entity is materialized in its world.
    pub entity: Option<CitizenEntity>,
}
impl Citizen {
    pub fn new(name: String) -> Self {
        Self { name, entity: None }
    }

    /// Remove the citizen's entity from the world.
    /// A citizen without a materialized entity is left as is.
    pub fn despawn(&mut self, cause: DespawnCause) -> anyhow::Result<()> {
        if let Some(entity) = &mut self.entity {
            if entity.dead {
                bail!("citizen {} entity is already dead", self.name);
            }
            entity.dead = true;
            debug!("Despawned citizen {} ({:?})", self.name, cause);
            self.entity = None;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Building {
    pub position: BlockPos,
    pub kind: String,
    pub level: u32,
    deconstructed: bool,
    destroyed: bool,
}
impl Building {
    pub fn new(position: BlockPos, kind: String, level: u32) -> Self {
        Self {
            position,
            kind,
            level,
            deconstructed: false,
            destroyed: false,
        }
    }

    /// Revert the placed structure. The physical marker block is removed
    /// separately by the caller, which owns the block layer.
    pub fn deconstruct(&mut self) -> anyhow::Result<()> {
        ensure!(
            !self.destroyed,
            "cannot deconstruct {} at {:?}: building state already released",
            self.kind,
            self.position
        );
        self.deconstructed = true;
        Ok(())
    }

    /// Release the in-memory building state.
    pub fn destroy(&mut self) -> anyhow::Result<()> {
        ensure!(
            !self.destroyed,
            "{} at {:?} was already destroyed",
            self.kind,
            self.position
        );
        self.destroyed = true;
        Ok(())
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed
    }
}

/// Authoritative server side colony.
///
/// Owned exclusively by its world's `ColonyStore`. Everything else holds
/// only the `(DimensionId, ColonyId)` lookup path to it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Colony {
    id: ColonyId,
    dimension: DimensionId,
    center: BlockPos,
    pub name: String,
    pub structure_pack: String,
    pub permissions: Permissions,
    pub citizens: IndexMap<CitizenId, Citizen>,
    pub buildings: AHashMap<BlockPos, Building>,
    /// Server ticks since a subscribed player was last around.
    pub last_contact_ticks: u64,
    /// Players always notified of colony wide events.
    pub important_players: SmallVec<[PlayerId; 2]>,
    /// Players currently receiving live view updates.
    pub subscribers: SmallVec<[PlayerId; 4]>,
}
impl Colony {
    pub fn new(id: ColonyId, dimension: DimensionId, center: BlockPos) -> Self {
        Self {
            id,
            dimension,
            center,
            name: String::new(),
            structure_pack: String::new(),
            permissions: Permissions::default(),
            citizens: IndexMap::new(),
            buildings: AHashMap::new(),
            last_contact_ticks: 0,
            important_players: SmallVec::new(),
            subscribers: SmallVec::new(),
        }
    }

    pub fn id(&self) -> ColonyId {
        self.id
    }

    pub fn dimension(&self) -> DimensionId {
        self.dimension
    }

    pub fn center(&self) -> BlockPos {
        self.center
    }

    pub fn distance_squared_to(&self, pos: BlockPos) -> i64 {
        self.center.distance_squared_2d(pos)
    }

    pub fn last_contact_hours(&self) -> u64 {
        self.last_contact_ticks / TICKS_PER_HOUR
    }

    pub fn add_important_player(&mut self, player: PlayerId) {
        if !self.important_players.contains(&player) {
            self.important_players.push(player);
        }
    }

    pub fn add_subscriber(&mut self, player: PlayerId) {
        if !self.subscribers.contains(&player) {
            self.subscribers.push(player);
        }
    }

    pub fn remove_subscriber(&mut self, player: PlayerId) {
        self.subscribers.retain(|p| *p != player);
    }

    /// The building whose footprint covers `pos`, if any.
    pub fn building_at(&self, pos: BlockPos) -> Option<&Building> {
        self.buildings.get(&pos)
    }

    /// Cross world bookkeeping. Runs once per server tick.
    pub fn on_server_tick(&mut self) -> anyhow::Result<()> {
        if self.subscribers.is_empty() {
            self.last_contact_ticks += 1;
        } else {
            self.last_contact_ticks = 0;
        }
        Ok(())
    }

    /// Per world gameplay tick. The colony's claim over its center chunk
    /// is an invariant: losing it means the registry and the ownership
    /// index went out of sync.
    pub fn on_world_tick(
        &mut self,
        dimension: DimensionId,
        claims: &ChunkClaims,
    ) -> anyhow::Result<()> {
        ensure!(
            dimension == self.dimension,
            "colony {:?} belongs to {:?} but was ticked by {:?}",
            self.id,
            self.dimension,
            dimension
        );
        ensure!(
            claims.owner_at(self.center) == Some(self.id),
            "colony {:?} does not own its center chunk",
            self.id
        );

        // The world discards dead entities at the end of its tick.
        for citizen in self.citizens.values_mut() {
            if citizen.entity.as_ref().is_some_and(|entity| entity.dead) {
                citizen.entity = None;
            }
        }
        Ok(())
    }

    pub fn on_world_load(&mut self) {
        debug!("Colony {:?} loaded", self.id);
    }

    /// Entities unload with their world.
    pub fn on_world_unload(&mut self) {
        for citizen in self.citizens.values_mut() {
            citizen.entity = None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_owner_rank() {
        let mut permissions = Permissions::default();
        permissions.set_owner(PlayerId(7));
        permissions.set_rank(PlayerId(8), Rank::Friend);

        assert!(permissions.is_owner(PlayerId(7)));
        assert_eq!(permissions.rank(PlayerId(7)), Rank::Owner);
        assert_eq!(permissions.rank(PlayerId(8)), Rank::Friend);
        assert_eq!(permissions.rank(PlayerId(9)), Rank::Neutral);
    }

    #[test]
    fn test_despawn_dead_citizen_is_a_fault() {
        let mut citizen = Citizen::new("Ray".to_string());
        citizen.entity = Some(CitizenEntity {
            position: BlockPos::default(),
            dead: true,
        });

        assert!(citizen.despawn(DespawnCause::Console).is_err());
    }

    #[test]
    fn test_destroy_building_twice_is_a_fault() {
        let mut building = Building::new(BlockPos::default(), "townhall".to_string(), 1);
        assert!(building.destroy().is_ok());
        assert!(building.destroy().is_err());
        assert!(building.deconstruct().is_err());
    }
}
