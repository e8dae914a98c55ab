use colony_server::colony::CitizenEntity;
use colony_server::world::Block;
use colony_server::*;

fn test_configs(test: &str) -> ServerConfigs {
    let mut configs = ServerConfigs::default();
    configs.backup_configs.backup_path = std::env::temp_dir().join(format!(
        "colony-server-test-{}-{}",
        test,
        std::process::id()
    ));
    let _ = std::fs::remove_dir_all(&configs.backup_configs.backup_path);
    configs
}

fn cleanup(configs: &ServerConfigs) {
    let _ = std::fs::remove_dir_all(&configs.backup_configs.backup_path);
}

fn manager_with_overworld(test: &str) -> (ColonyManager, ServerConfigs) {
    let configs = test_configs(test);
    let mut manager = ColonyManager::new(&configs);
    manager.add_world(World::new(DimensionId::OVERWORLD));
    (manager, configs)
}

#[test]
fn test_create_colony() {
    let (mut manager, configs) = manager_with_overworld("create");
    let owner = PlayerId(42);
    let center = BlockPos::new(100, 64, -200);

    let id = manager
        .create_colony(DimensionId::OVERWORLD, center, owner, "Riverside", "default")
        .unwrap();

    let colony = manager.colony(id, DimensionId::OVERWORLD).unwrap();
    assert_eq!(colony.id(), id);
    assert_eq!(colony.center(), center);
    assert_eq!(colony.name, "Riverside");
    assert!(colony.permissions.is_owner(owner));
    assert!(colony.important_players.contains(&owner));
    assert!(colony.subscribers.contains(&owner));

    // The surrounding region now belongs to the colony.
    assert!(manager.is_coordinate_in_colony(DimensionId::OVERWORLD, center));
    assert_eq!(manager.top_colony_id(), id.0);

    cleanup(&configs);
}

#[test]
fn test_create_colony_without_store() {
    let configs = test_configs("create-no-store");
    let mut manager = ColonyManager::new(&configs);
    manager.add_world(World::without_store(DimensionId(7)));

    assert_eq!(
        manager.create_colony(
            DimensionId(7),
            BlockPos::default(),
            PlayerId(1),
            "Riverside",
            "default"
        ),
        Err(CreateColonyError::StoreUnavailable)
    );

    cleanup(&configs);
}

#[test]
fn test_delete_colony_is_idempotent() {
    let (mut manager, configs) = manager_with_overworld("delete-twice");
    let center = BlockPos::new(0, 64, 0);
    let id = manager
        .create_colony(DimensionId::OVERWORLD, center, PlayerId(1), "Riverside", "default")
        .unwrap();

    let report = manager.delete_colony(id, DimensionId::OVERWORLD, false);
    assert!(report.deleted);
    assert!(report.faults.is_empty());

    assert!(manager.colony(id, DimensionId::OVERWORLD).is_none());
    let world = manager.world(DimensionId::OVERWORLD).unwrap();
    assert!(!world.claims.owning_colonies().any(|owner| owner == id));

    // Second deletion resolves nothing and is a no-op.
    let report = manager.delete_colony(id, DimensionId::OVERWORLD, false);
    assert!(!report.deleted);
    assert!(report.colony_id.is_none());

    cleanup(&configs);
}

#[test]
fn test_delete_colony_purges_buildings_and_notifies() {
    let (mut manager, configs) = manager_with_overworld("delete-purge");
    let center = BlockPos::new(0, 64, 0);
    let owner = PlayerId(9);
    let id = manager
        .create_colony(DimensionId::OVERWORLD, center, owner, "Riverside", "default")
        .unwrap();

    let hut = BlockPos::new(5, 64, 5);
    {
        let world = manager.world_mut(DimensionId::OVERWORLD).unwrap();
        world.set_block(hut, Block::HutMarker);
        let colony = world.store.as_mut().unwrap().colony_mut(id).unwrap();
        colony
            .buildings
            .insert(hut, Building::new(hut, "townhall".to_string(), 1));
        colony
            .citizens
            .insert(CitizenId(1), Citizen::new("Ray".to_string()));
    }

    let events = manager.subscribe_events();
    let report = manager.delete_colony(id, DimensionId::OVERWORLD, true);
    assert!(report.deleted);
    assert!(report.faults.is_empty());

    // The marker block is gone and the owner got a deletion notice.
    assert!(manager
        .world(DimensionId::OVERWORLD)
        .unwrap()
        .block(hut)
        .is_none());
    let outbound = manager.drain_outbound();
    assert_eq!(
        outbound,
        vec![(
            owner,
            ViewMessage::RemoveColony {
                colony_id: id,
                dimension: DimensionId::OVERWORLD
            }
        )]
    );
    assert!(events.try_iter().any(|event| event
        == ColonyEvent::ColonyDeleted {
            colony_id: id,
            dimension: DimensionId::OVERWORLD
        }));

    cleanup(&configs);
}

#[test]
fn test_delete_colony_continues_past_faults() {
    let (mut manager, configs) = manager_with_overworld("delete-faults");
    let center = BlockPos::new(0, 64, 0);
    let id = manager
        .create_colony(DimensionId::OVERWORLD, center, PlayerId(1), "Riverside", "default")
        .unwrap();

    let hut = BlockPos::new(5, 64, 5);
    {
        let world = manager.world_mut(DimensionId::OVERWORLD).unwrap();
        let colony = world.store.as_mut().unwrap().colony_mut(id).unwrap();

        // A citizen whose entity is already dead faults the kill step.
        let mut stuck = Citizen::new("Ray".to_string());
        stuck.entity = Some(CitizenEntity {
            position: center,
            dead: true,
        });
        colony.citizens.insert(CitizenId(1), stuck);

        // A building already destroyed faults both teardown calls.
        let mut broken = Building::new(hut, "townhall".to_string(), 1);
        broken.destroy().unwrap();
        colony.buildings.insert(hut, broken);
    }

    let report = manager.delete_colony(id, DimensionId::OVERWORLD, true);

    // Faulty entities never abort the sequence.
    assert!(report.deleted);
    assert_eq!(report.faults.len(), 3);
    assert!(manager.colony(id, DimensionId::OVERWORLD).is_none());

    cleanup(&configs);
}

#[test]
fn test_closest_colony_prefers_owned_region() {
    let (mut manager, configs) = manager_with_overworld("closest");
    let a = manager
        .create_colony(
            DimensionId::OVERWORLD,
            BlockPos::new(0, 64, 0),
            PlayerId(1),
            "Alpha",
            "default",
        )
        .unwrap();
    let b = manager
        .create_colony(
            DimensionId::OVERWORLD,
            BlockPos::new(100, 64, 0),
            PlayerId(2),
            "Beta",
            "default",
        )
        .unwrap();

    // Inside Alpha's claimed region but geometrically closer to Beta:
    // the ownership index wins without any scan.
    let contested = BlockPos::new(63, 64, 0);
    assert!(contested.distance_squared_2d(BlockPos::new(100, 64, 0)) < contested.distance_squared_2d(BlockPos::new(0, 64, 0)));
    assert_eq!(
        manager
            .closest_colony(DimensionId::OVERWORLD, contested)
            .unwrap()
            .id(),
        a
    );

    // Far outside every claim the distance scan takes over.
    let unclaimed = BlockPos::new(300, 64, 0);
    assert!(!manager.is_coordinate_in_colony(DimensionId::OVERWORLD, unclaimed));
    assert_eq!(
        manager
            .closest_colony(DimensionId::OVERWORLD, unclaimed)
            .unwrap()
            .id(),
        b
    );

    cleanup(&configs);
}

#[test]
fn test_colony_at_falls_back_to_building_footprint() {
    let (mut manager, configs) = manager_with_overworld("colony-at");
    let id = manager
        .create_colony(
            DimensionId::OVERWORLD,
            BlockPos::new(0, 64, 0),
            PlayerId(1),
            "Riverside",
            "default",
        )
        .unwrap();

    // A building outside the claimed radius.
    let outpost = BlockPos::new(500, 64, 500);
    manager
        .world_mut(DimensionId::OVERWORLD)
        .unwrap()
        .store
        .as_mut()
        .unwrap()
        .colony_mut(id)
        .unwrap()
        .buildings
        .insert(outpost, Building::new(outpost, "outpost".to_string(), 1));

    assert!(!manager.is_coordinate_in_colony(DimensionId::OVERWORLD, outpost));
    assert_eq!(
        manager
            .colony_at(DimensionId::OVERWORLD, outpost)
            .unwrap()
            .id(),
        id
    );
    assert!(manager
        .colony_at(DimensionId::OVERWORLD, BlockPos::new(-500, 64, -500))
        .is_none());

    cleanup(&configs);
}

#[test]
fn test_is_far_enough() {
    let (mut manager, configs) = manager_with_overworld("far-enough");
    manager
        .create_colony(
            DimensionId::OVERWORLD,
            BlockPos::new(0, 64, 0),
            PlayerId(1),
            "Riverside",
            "default",
        )
        .unwrap();

    assert!(!manager.is_far_enough(DimensionId::OVERWORLD, BlockPos::new(32, 64, 0)));
    assert!(manager.is_far_enough(DimensionId::OVERWORLD, BlockPos::new(5000, 64, 0)));

    cleanup(&configs);
}

#[test]
fn test_abandoned_since() {
    let (mut manager, configs) = manager_with_overworld("abandoned");
    let ages = [1u64, 5, 10];
    let mut ids = Vec::new();
    for (i, _) in ages.iter().enumerate() {
        ids.push(
            manager
                .create_colony(
                    DimensionId::OVERWORLD,
                    BlockPos::new(i as i32 * 1000, 64, 0),
                    PlayerId(i as u64 + 1),
                    "Riverside",
                    "default",
                )
                .unwrap(),
        );
    }
    {
        let store = manager
            .world_mut(DimensionId::OVERWORLD)
            .unwrap()
            .store
            .as_mut()
            .unwrap();
        for (id, hours) in ids.iter().zip(ages) {
            let colony = store.colony_mut(*id).unwrap();
            colony.subscribers.clear();
            colony.last_contact_ticks = hours * TICKS_PER_HOUR;
        }
    }

    let abandoned: Vec<ColonyId> = manager
        .abandoned_since(5)
        .iter()
        .map(|colony| colony.id())
        .collect();
    assert_eq!(abandoned, vec![ids[1], ids[2]]);

    cleanup(&configs);
}

#[test]
fn test_world_tick_isolates_colony_faults() {
    let (mut manager, configs) = manager_with_overworld("tick-isolation");
    let mut ids = Vec::new();
    for i in 0..3 {
        let id = manager
            .create_colony(
                DimensionId::OVERWORLD,
                BlockPos::new(i * 1000, 64, 0),
                PlayerId(i as u64 + 1),
                "Riverside",
                "default",
            )
            .unwrap();
        // Each colony holds a dead citizen entity that a successful
        // world tick cleans up.
        let mut citizen = Citizen::new("Ray".to_string());
        citizen.entity = Some(CitizenEntity {
            position: BlockPos::new(i * 1000, 64, 0),
            dead: true,
        });
        manager
            .world_mut(DimensionId::OVERWORLD)
            .unwrap()
            .store
            .as_mut()
            .unwrap()
            .colony_mut(id)
            .unwrap()
            .citizens
            .insert(CitizenId(1), citizen);
        ids.push(id);
    }

    // Corrupt the second colony's claim so its tick hook errors out.
    let center = manager
        .colony(ids[1], DimensionId::OVERWORLD)
        .unwrap()
        .center();
    manager
        .world_mut(DimensionId::OVERWORLD)
        .unwrap()
        .claims
        .claim_colony_chunks(false, ids[1], center, 4);

    manager.on_world_tick(DimensionId::OVERWORLD, TickPhase::End);

    let cleaned: Vec<bool> = ids
        .iter()
        .map(|id| {
            manager
                .colony(*id, DimensionId::OVERWORLD)
                .unwrap()
                .citizens[&CitizenId(1)]
                .entity
                .is_none()
        })
        .collect();
    // First and third ticked to completion; the faulty second did not.
    assert_eq!(cleaned, vec![true, false, true]);

    cleanup(&configs);
}

#[test]
fn test_tick_ignores_pre_phase() {
    let (mut manager, configs) = manager_with_overworld("pre-phase");
    let id = manager
        .create_colony(
            DimensionId::OVERWORLD,
            BlockPos::new(0, 64, 0),
            PlayerId(1),
            "Riverside",
            "default",
        )
        .unwrap();
    manager
        .world_mut(DimensionId::OVERWORLD)
        .unwrap()
        .store
        .as_mut()
        .unwrap()
        .colony_mut(id)
        .unwrap()
        .subscribers
        .clear();

    manager.on_server_tick(TickPhase::Pre);
    assert_eq!(
        manager
            .colony(id, DimensionId::OVERWORLD)
            .unwrap()
            .last_contact_ticks,
        0
    );

    manager.on_server_tick(TickPhase::End);
    assert_eq!(
        manager
            .colony(id, DimensionId::OVERWORLD)
            .unwrap()
            .last_contact_ticks,
        1
    );

    cleanup(&configs);
}

#[test]
fn test_manager_save_round_trip() {
    let (mut manager, configs) = manager_with_overworld("save-round-trip");
    let a = manager.recipes_mut().add_recipe(Recipe {
        output: "bread".to_string(),
        inputs: vec!["wheat".to_string()],
    });
    let b = manager.recipes_mut().add_recipe(Recipe {
        output: "plank".to_string(),
        inputs: vec!["log".to_string()],
    });
    manager.compatibility_mut().record("oak_log", "burnable");
    manager.compatibility_mut().set_discovered();

    let buffer = postcard::to_stdvec(&manager.write()).unwrap();
    let save: ManagerSave = postcard::from_bytes(&buffer).unwrap();

    let fresh_configs = test_configs("save-round-trip-fresh");
    let mut fresh = ColonyManager::new(&fresh_configs);
    fresh.read(save);

    assert_eq!(fresh.recipes().len(), 2);
    assert_eq!(fresh.recipes().recipe(a).unwrap().output, "bread");
    assert_eq!(fresh.recipes().recipe(b).unwrap().output, "plank");
    assert!(fresh.compatibility().has_tag("oak_log", "burnable"));
    assert!(fresh.compatibility().is_discovered());

    cleanup(&configs);
    cleanup(&fresh_configs);
}

#[test]
fn test_world_load_recovery_is_one_shot() {
    let configs = test_configs("one-shot-recovery");

    // First session: a colony exists and gets backed up.
    let mut manager = ColonyManager::new(&configs);
    manager.add_world(World::new(DimensionId::OVERWORLD));
    let id = manager
        .create_colony(
            DimensionId::OVERWORLD,
            BlockPos::new(0, 64, 0),
            PlayerId(1),
            "Riverside",
            "default",
        )
        .unwrap();
    manager.backup_colony_data();

    // Second session: the store deserialized normally, so the load
    // consumes the one shot flag and skips recovery.
    let mut manager = ColonyManager::new(&configs);
    manager.add_world(World::new(DimensionId::OVERWORLD));
    manager.mark_store_loaded();
    manager.on_world_load(DimensionId::OVERWORLD);
    assert!(manager.colony(id, DimensionId::OVERWORLD).is_none());

    // The next load without the flag runs restart recovery.
    manager.on_world_load(DimensionId::OVERWORLD);
    let colony = manager.colony(id, DimensionId::OVERWORLD).unwrap();
    assert_eq!(colony.name, "Riverside");
    // The restored colony owns its region again.
    assert!(manager.is_coordinate_in_colony(DimensionId::OVERWORLD, colony.center()));

    cleanup(&configs);
}

#[test]
fn test_deleted_colony_is_not_resurrected() {
    let configs = test_configs("no-resurrection");

    let mut manager = ColonyManager::new(&configs);
    manager.add_world(World::new(DimensionId::OVERWORLD));
    let id = manager
        .create_colony(
            DimensionId::OVERWORLD,
            BlockPos::new(0, 64, 0),
            PlayerId(1),
            "Riverside",
            "default",
        )
        .unwrap();
    manager.backup_colony_data();
    manager.delete_colony(id, DimensionId::OVERWORLD, false);

    // Restart with an empty store; recovery must not bring it back.
    let mut manager = ColonyManager::new(&configs);
    manager.add_world(World::new(DimensionId::OVERWORLD));
    manager.on_world_load(DimensionId::OVERWORLD);
    assert!(manager.colony(id, DimensionId::OVERWORLD).is_none());

    cleanup(&configs);
}

#[test]
fn test_view_messages_through_the_manager() {
    let configs = test_configs("view-messages");
    let mut manager = ColonyManager::new(&configs);
    let dim = DimensionId::OVERWORLD;
    let events = manager.subscribe_events();

    // Removals ahead of any snapshot are silently ignored.
    manager.handle_view_message(ViewMessage::RemoveBuilding {
        colony_id: ColonyId(1),
        dimension: dim,
        position: BlockPos::default(),
    });
    // A permissions patch ahead of the snapshot is an error but must not
    // create or change anything.
    manager.handle_view_message(ViewMessage::Permissions {
        colony_id: ColonyId(1),
        dimension: dim,
        data: messages::PermissionsData::default().encode(),
    });
    assert!(manager.views().view(ColonyId(1), dim).is_none());

    manager.handle_view_message(ViewMessage::Colony {
        colony_id: ColonyId(1),
        dimension: dim,
        new_subscription: true,
        data: messages::ColonyData {
            name: "Riverside".to_string(),
            center: BlockPos::new(10, 64, 10),
            structure_pack: "default".to_string(),
            citizen_count: 1,
        }
        .encode(),
    });
    assert!(events.try_iter().any(|event| event
        == ColonyEvent::ViewUpdated {
            colony_id: ColonyId(1),
            dimension: dim
        }));

    manager.handle_view_message(ViewMessage::Building {
        colony_id: ColonyId(1),
        dimension: dim,
        position: BlockPos::new(12, 64, 12),
        data: messages::BuildingData {
            kind: "townhall".to_string(),
            level: 2,
        }
        .encode(),
    });
    assert_eq!(
        manager
            .views()
            .building_view(dim, BlockPos::new(12, 64, 12))
            .unwrap()
            .level,
        2
    );

    cleanup(&configs);
}

#[test]
fn test_client_tick_clears_views_after_disconnect() {
    let configs = test_configs("client-tick");
    let mut manager = ColonyManager::new(&configs);
    let dim = DimensionId::OVERWORLD;

    manager.set_client_in_world(true);
    manager.handle_view_message(ViewMessage::Colony {
        colony_id: ColonyId(1),
        dimension: dim,
        new_subscription: true,
        data: messages::ColonyData::default().encode(),
    });

    // Still in a world: the cache stays.
    manager.on_client_tick(TickPhase::End);
    assert!(manager.views().view(ColonyId(1), dim).is_some());

    manager.set_client_in_world(false);
    // The pre phase never does cache maintenance.
    manager.on_client_tick(TickPhase::Pre);
    assert!(manager.views().view(ColonyId(1), dim).is_some());

    manager.on_client_tick(TickPhase::End);
    assert!(manager.views().view(ColonyId(1), dim).is_none());

    cleanup(&configs);
}
