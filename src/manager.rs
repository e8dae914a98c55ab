use crate::backup::BackupLedger;
use crate::colony::{Colony, DespawnCause};
use crate::compat::CompatibilityStore;
use crate::config::{ColonyConfigs, ServerConfigs};
use crate::events::{ColonyEvent, EventBus};
use crate::idx::{ColonyId, DimensionId, PlayerId};
use crate::messages::ViewMessage;
use crate::pos::{BlockPos, BLOCKS_PER_CHUNK};
use crate::recipes::RecipeStore;
use crate::sound::SoundManager;
use crate::tick::TickPhase;
use crate::views::ColonyViews;
use crate::world::{Block, World, Worlds};
use crossbeam_channel::Receiver;
use serde::{Deserialize, Serialize};

/// Logged whenever a world without the colony capability is asked about colonies.
const MISSING_STORE_MESSAGE: &str = "World does not have a colony store attached";

/// One shot signal set by the world persistence layer right after it
/// deserialized a colony store. The next world load consumes it; anything
/// else means the store was not read this session and recovery must run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum StoreLoadState {
    #[default]
    Pending,
    JustLoaded,
    Idle,
}

/// Why `create_colony` yielded no colony.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreateColonyError {
    /// The world has no colony store attached.
    StoreUnavailable,
    /// The created colony does not resolve to a loaded world.
    /// Indicates an earlier invariant violation, reported loudly.
    WorldMissing,
}

/// Steps of the colony deletion sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeletionStep {
    UnclaimChunks,
    KillCitizen,
    DestroyBuilding,
    DetachEventHandler,
    NotifyPlayers,
    RemoveFromStore,
    MarkDeleted,
}

/// Outcome of a deletion sequence.
///
/// A fault in one step never aborts the remaining steps and never
/// propagates to the caller; everything lands here and in the log.
#[derive(Debug, Default)]
pub struct DeletionReport {
    pub colony_id: Option<ColonyId>,
    pub deleted: bool,
    pub faults: Vec<(DeletionStep, anyhow::Error)>,
}
impl DeletionReport {
    fn fault(&mut self, step: DeletionStep, err: anyhow::Error) {
        warn!(
            "{:?} fault while deleting colony {:?}: {:#}",
            step, self.colony_id, err
        );
        self.faults.push((step, err));
    }
}

/// Persisted blob of the manager level singleton stores. Individual
/// colonies persist through the authoritative store's own save path.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ManagerSave {
    /// Absent on a save written before the store was first discovered.
    pub compatibility: Option<CompatibilityStore>,
    /// Marks a save whose claim distances are in the chunk based format.
    pub distance_format: bool,
    pub recipes: RecipeStore,
}

/// Links colonies to their worlds.
///
/// Owns the world registry, the client view cache, the manager level
/// singleton stores and the session wide flags. One instance per
/// session, constructed at startup and dropped at shutdown.
pub struct ColonyManager {
    colony_configs: ColonyConfigs,
    worlds: Worlds,
    views: ColonyViews,
    events: EventBus,
    backup: BackupLedger,
    compatibility: CompatibilityStore,
    recipes: RecipeStore,
    store_load_state: StoreLoadState,
    /// Deletion notices waiting to be flushed to player connections.
    outbound: Vec<(PlayerId, ViewMessage)>,
    /// Client only. Set while the client is attached to a world.
    client_in_world: bool,
    /// Client only. Whether a structure pack download finished.
    schematic_downloaded: bool,
    /// Client only. Built lazily on the first client tick.
    sound_manager: Option<SoundManager>,
}
impl ColonyManager {
    pub fn new(configs: &ServerConfigs) -> Self {
        Self {
            colony_configs: configs.colony_configs,
            worlds: Worlds::default(),
            views: ColonyViews::default(),
            events: EventBus::default(),
            backup: BackupLedger::new(configs.backup_configs.backup_path.clone()),
            compatibility: CompatibilityStore::default(),
            recipes: RecipeStore::default(),
            store_load_state: StoreLoadState::default(),
            outbound: Vec::new(),
            client_in_world: false,
            schematic_downloaded: false,
            sound_manager: None,
        }
    }

    /// Register a loaded world. Worlds in this registry are authoritative;
    /// the client side never inserts any.
    pub fn add_world(&mut self, world: World) {
        self.worlds.insert(world);
    }

    pub fn world(&self, dimension: DimensionId) -> Option<&World> {
        self.worlds.get(dimension)
    }

    pub fn world_mut(&mut self, dimension: DimensionId) -> Option<&mut World> {
        self.worlds.get_mut(dimension)
    }

    // ####################################################################
    // ############## DIRECTORY ###########################################
    // ####################################################################

    pub fn create_colony(
        &mut self,
        dimension: DimensionId,
        pos: BlockPos,
        owner: PlayerId,
        name: &str,
        structure_pack: &str,
    ) -> Result<ColonyId, CreateColonyError> {
        let Some(world) = self.worlds.get_mut(dimension) else {
            warn!("{}", MISSING_STORE_MESSAGE);
            return Err(CreateColonyError::StoreUnavailable);
        };
        let Some(store) = world.store.as_mut() else {
            warn!("{}", MISSING_STORE_MESSAGE);
            return Err(CreateColonyError::StoreUnavailable);
        };

        let colony = store.create_colony(dimension, pos);
        colony.name = name.to_string();
        colony.structure_pack = structure_pack.to_string();
        colony.permissions.set_owner(owner);
        colony.add_important_player(owner);
        colony.add_subscriber(owner);
        let id = colony.id();

        info!("New Colony Id: {} by {:?}", id.0, owner);

        if colony.dimension() != dimension {
            error!(
                "Unable to claim chunks because of the missing world in colony {:?}, please report this",
                id
            );
            return Err(CreateColonyError::WorldMissing);
        }

        world
            .claims
            .claim_colony_chunks(true, id, pos, self.colony_configs.initial_colony_size);
        self.events.register_handler(id);
        Ok(id)
    }

    /// Delete a colony and purge all its citizens and buildings.
    ///
    /// A target that does not resolve to a live colony makes this a no-op,
    /// so deleting twice is harmless. Whatever happens, this never panics
    /// out: per step faults are collected in the report.
    pub fn delete_colony(
        &mut self,
        colony_id: ColonyId,
        dimension: DimensionId,
        destroy_buildings: bool,
    ) -> DeletionReport {
        let mut report = DeletionReport::default();

        let radius = self.colony_configs.initial_colony_size;
        let Some(world) = self.worlds.get_mut(dimension) else {
            warn!(
                "Deleting colony {:?} skipped: {:?} is not loaded",
                colony_id, dimension
            );
            return report;
        };
        let Some(store) = world.store.as_mut() else {
            warn!("{}", MISSING_STORE_MESSAGE);
            return report;
        };
        // Work on a detached copy; the store entry goes away at the end.
        let Some(mut colony) = store.colony(colony_id).cloned() else {
            return report;
        };
        report.colony_id = Some(colony_id);

        world
            .claims
            .claim_colony_chunks(false, colony_id, colony.center(), radius);

        info!("Removing citizens for {:?}", colony_id);
        for citizen in colony.citizens.values_mut() {
            if let Err(err) = citizen.despawn(DespawnCause::Console) {
                report.fault(DeletionStep::KillCitizen, err);
            }
        }

        info!("Removing buildings for {:?}", colony_id);
        for building in colony.buildings.values_mut() {
            let position = building.position;
            if destroy_buildings {
                if let Err(err) = building.deconstruct() {
                    report.fault(DeletionStep::DestroyBuilding, err);
                }
            }
            if let Err(err) = building.destroy() {
                report.fault(DeletionStep::DestroyBuilding, err);
            }
            if world.block(position) == Some(Block::HutMarker) {
                debug!("Found marker block at {:?}, deleting", position);
                world.remove_block(position);
            }
        }

        if !self.events.unregister_handler(colony_id) {
            warn!("Can't unregister the event handler twice");
        }

        for player in colony.important_players.iter() {
            self.outbound.push((
                *player,
                ViewMessage::RemoveColony {
                    colony_id,
                    dimension,
                },
            ));
        }

        self.events.emit(ColonyEvent::ColonyDeleted {
            colony_id,
            dimension,
        });

        if let Some(store) = self
            .worlds
            .get_mut(dimension)
            .and_then(|world| world.store.as_mut())
        {
            store.delete_colony(colony_id);
        }

        self.backup.mark_deleted(colony_id, dimension);

        report.deleted = true;
        info!("Successfully deleted colony {:?}", colony_id);
        report
    }

    pub fn colony(&self, colony_id: ColonyId, dimension: DimensionId) -> Option<&Colony> {
        let world = self.worlds.get(dimension)?;
        let Some(store) = &world.store else {
            warn!("{}", MISSING_STORE_MESSAGE);
            return None;
        };
        store.colony(colony_id)
    }

    pub fn colonies(&self, dimension: DimensionId) -> impl Iterator<Item = &Colony> {
        self.worlds
            .get(dimension)
            .and_then(|world| world.store.as_ref())
            .into_iter()
            .flat_map(|store| store.colonies())
    }

    pub fn all_colonies(&self) -> impl Iterator<Item = &Colony> {
        self.worlds
            .iter()
            .filter_map(|world| world.store.as_ref())
            .flat_map(|store| store.colonies())
    }

    /// The colony at `pos`, resolved through the ownership index first.
    /// Falls back to checking building footprints: a building can stand
    /// outside its owning colony's claimed radius.
    pub fn colony_at(&self, dimension: DimensionId, pos: BlockPos) -> Option<&Colony> {
        let world = self.worlds.get(dimension)?;
        if let Some(colony_id) = world.claims.owner_at(pos) {
            return world.store.as_ref()?.colony(colony_id);
        }
        self.colonies(dimension)
            .find(|colony| colony.building_at(pos).is_some())
    }

    /// An owned region resolves directly through the ownership index.
    /// Otherwise every colony in the dimension is scanned; the first
    /// encountered wins on equal distance.
    pub fn closest_colony(&self, dimension: DimensionId, pos: BlockPos) -> Option<&Colony> {
        let world = self.worlds.get(dimension)?;
        if let Some(colony_id) = world.claims.owner_at(pos) {
            return world.store.as_ref()?.colony(colony_id);
        }

        let mut closest: Option<&Colony> = None;
        let mut closest_dist = i64::MAX;
        for colony in self.colonies(dimension) {
            let dist = colony.distance_squared_to(pos);
            if dist < closest_dist {
                closest = Some(colony);
                closest_dist = dist;
            }
        }
        closest
    }

    /// If a new colony at `pos` would keep the configured separation from
    /// every existing colony and its chunk region is free to claim.
    pub fn is_far_enough(&self, dimension: DimensionId, pos: BlockPos) -> bool {
        let block_range = i64::from(
            self.colony_configs
                .min_colony_distance
                .max(self.colony_configs.initial_colony_size)
                * BLOCKS_PER_CHUNK,
        );

        if let Some(closest) = self.closest_colony(dimension, pos) {
            if closest.distance_squared_to(pos) < block_range * block_range {
                return false;
            }
        }

        self.worlds.get(dimension).is_some_and(|world| {
            world
                .claims
                .can_claim_chunks_in_range(pos, self.colony_configs.initial_colony_size)
        })
    }

    /// Colonies across every loaded world without player contact for at
    /// least `hours`.
    pub fn abandoned_since(&self, hours: u64) -> Vec<&Colony> {
        self.all_colonies()
            .filter(|colony| colony.last_contact_hours() >= hours)
            .collect()
    }

    pub fn colony_by_owner(&self, owner: PlayerId) -> Option<&Colony> {
        self.all_colonies()
            .find(|colony| colony.permissions.is_owner(owner))
    }

    pub fn is_coordinate_in_colony(&self, dimension: DimensionId, pos: BlockPos) -> bool {
        self.worlds
            .get(dimension)
            .is_some_and(|world| world.claims.owner_at(pos).is_some())
    }

    /// Highest colony id issued across every loaded world.
    pub fn top_colony_id(&self) -> u32 {
        self.worlds
            .iter()
            .filter_map(|world| world.store.as_ref())
            .map(|store| store.top_id())
            .max()
            .unwrap_or(0)
    }

    /// Town hall radius, padding, then the next town hall radius.
    pub fn min_town_hall_distance(&self) -> i32 {
        self.colony_configs.min_colony_distance * BLOCKS_PER_CHUNK
    }

    // ####################################################################
    // ############## TICK ################################################
    // ####################################################################

    pub fn on_server_tick(&mut self, phase: TickPhase) {
        if phase != TickPhase::End {
            return;
        }
        for world in self.worlds.iter_mut() {
            let Some(store) = world.store.as_mut() else {
                continue;
            };
            for colony in store.colonies_mut() {
                if let Err(err) = colony.on_server_tick() {
                    error!(
                        "Something went wrong ticking colony {:?}: {:#}",
                        colony.id(),
                        err
                    );
                }
            }
        }
    }

    pub fn on_world_tick(&mut self, dimension: DimensionId, phase: TickPhase) {
        if phase != TickPhase::End {
            return;
        }
        let Some(world) = self.worlds.get_mut(dimension) else {
            return;
        };
        let claims = &world.claims;
        let Some(store) = world.store.as_mut() else {
            return;
        };
        for colony in store.colonies_mut() {
            if let Err(err) = colony.on_world_tick(dimension, claims) {
                error!(
                    "Something went wrong ticking colony {:?}: {:#}",
                    colony.id(),
                    err
                );
            }
        }
    }

    /// Client only cache upkeep. Never touches authoritative colonies.
    pub fn on_client_tick(&mut self, phase: TickPhase) {
        if phase != TickPhase::End {
            return;
        }

        if !self.client_in_world && !self.views.is_empty() {
            // The player has left the game. Clear the view cache.
            self.views.reset();
        }

        self.sound_manager
            .get_or_insert_with(SoundManager::new)
            .tick();
    }

    pub fn on_world_load(&mut self, dimension: DimensionId) {
        if self.store_load_state != StoreLoadState::JustLoaded {
            // The store was not deserialized this session: restart recovery.
            let restored = self.backup.reload_missing(&mut self.worlds);
            let radius = self.colony_configs.initial_colony_size;
            for (dim, colony_id) in restored {
                let Some(world) = self.worlds.get_mut(dim) else {
                    continue;
                };
                let center = world
                    .store
                    .as_ref()
                    .and_then(|store| store.colony(colony_id))
                    .map(|colony| colony.center());
                if let Some(center) = center {
                    world
                        .claims
                        .claim_colony_chunks(true, colony_id, center, radius);
                }
            }
            if let Some(save) = self.backup.load_manager_save() {
                self.read(save);
            }
        }
        self.store_load_state = StoreLoadState::Idle;

        if let Some(world) = self.worlds.get_mut(dimension) {
            if let Some(store) = world.store.as_mut() {
                for colony in store.colonies_mut() {
                    colony.on_world_load();
                    self.events.register_handler(colony.id());
                }
            }
        }

        self.events.emit(ColonyEvent::ManagerLoaded { dimension });
    }

    pub fn on_world_unload(&mut self, dimension: DimensionId) {
        let mut had_colonies = false;
        if let Some(world) = self.worlds.get_mut(dimension) {
            if let Some(store) = world.store.as_mut() {
                for colony in store.colonies_mut() {
                    had_colonies = true;
                    colony.on_world_unload();
                }
            }
        }

        if had_colonies {
            self.backup_colony_data();
        }

        self.events.emit(ColonyEvent::ManagerUnloaded { dimension });
    }

    /// One shot, consumed by the next `on_world_load`.
    pub fn mark_store_loaded(&mut self) {
        self.store_load_state = StoreLoadState::JustLoaded;
    }

    // ####################################################################
    // ############## PERSISTENCE #########################################
    // ####################################################################

    /// Snapshot all colony data and the manager save.
    pub fn backup_colony_data(&mut self) {
        let save = self.write();
        if let Err(err) = self.backup.backup_all(&self.worlds, &save) {
            warn!("{:#} while backing up colony data", err);
        }
    }

    pub fn write(&self) -> ManagerSave {
        ManagerSave {
            compatibility: Some(self.compatibility.clone()),
            distance_format: true,
            recipes: self.recipes.clone(),
        }
    }

    pub fn read(&mut self, save: ManagerSave) {
        // Absent on the very first run.
        if let Some(compatibility) = save.compatibility {
            self.compatibility = compatibility;
        }
        self.recipes = save.recipes;
    }

    // ####################################################################
    // ############## VIEWS ###############################################
    // ####################################################################

    /// Client entry point for every inbound view replication message.
    pub fn handle_view_message(&mut self, message: ViewMessage) {
        match message {
            ViewMessage::Colony {
                colony_id,
                dimension,
                new_subscription,
                data,
            } => {
                if self
                    .views
                    .handle_colony_message(colony_id, dimension, new_subscription, &data)
                {
                    self.events.emit(ColonyEvent::ViewUpdated {
                        colony_id,
                        dimension,
                    });
                }
            }
            ViewMessage::Permissions {
                colony_id,
                dimension,
                data,
            } => self
                .views
                .handle_permissions_message(colony_id, dimension, &data),
            ViewMessage::Citizen {
                colony_id,
                dimension,
                citizen_id,
                data,
            } => self
                .views
                .handle_citizen_message(colony_id, dimension, citizen_id, &data),
            ViewMessage::RemoveCitizen {
                colony_id,
                dimension,
                citizen_id,
            } => self
                .views
                .handle_remove_citizen_message(colony_id, dimension, citizen_id),
            ViewMessage::Building {
                colony_id,
                dimension,
                position,
                data,
            } => self
                .views
                .handle_building_message(colony_id, dimension, position, &data),
            ViewMessage::RemoveBuilding {
                colony_id,
                dimension,
                position,
            } => self
                .views
                .handle_remove_building_message(colony_id, dimension, position),
            ViewMessage::WorkOrder {
                colony_id,
                dimension,
                data,
            } => self
                .views
                .handle_work_order_message(colony_id, dimension, &data),
            ViewMessage::RemoveWorkOrder {
                colony_id,
                dimension,
                work_order_id,
            } => self
                .views
                .handle_remove_work_order_message(colony_id, dimension, work_order_id),
            ViewMessage::RemoveColony {
                colony_id,
                dimension,
            } => self.views.remove_view(colony_id, dimension),
        }
    }

    pub fn views(&self) -> &ColonyViews {
        &self.views
    }

    /// Client only. Tell the manager whether a world is attached.
    pub fn set_client_in_world(&mut self, in_world: bool) {
        self.client_in_world = in_world;
    }

    // ####################################################################
    // ############## MISC ################################################
    // ####################################################################

    /// Deletion notices queued for player connections.
    pub fn drain_outbound(&mut self) -> Vec<(PlayerId, ViewMessage)> {
        std::mem::take(&mut self.outbound)
    }

    pub fn subscribe_events(&mut self) -> Receiver<ColonyEvent> {
        self.events.subscribe()
    }

    pub fn compatibility(&self) -> &CompatibilityStore {
        &self.compatibility
    }

    pub fn compatibility_mut(&mut self) -> &mut CompatibilityStore {
        &mut self.compatibility
    }

    pub fn recipes(&self) -> &RecipeStore {
        &self.recipes
    }

    pub fn recipes_mut(&mut self) -> &mut RecipeStore {
        &mut self.recipes
    }

    pub fn is_schematic_downloaded(&self) -> bool {
        self.schematic_downloaded
    }

    pub fn set_schematic_downloaded(&mut self, downloaded: bool) {
        self.schematic_downloaded = downloaded;
    }
}
