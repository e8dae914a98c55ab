use colony_server::*;
use std::path::Path;

fn main() {
    logger::Logger::init();

    let configs = ServerConfigs::load(Path::new("configs.json"));
    let backup_interval = configs.backup_configs.backup_interval;

    let mut manager = ColonyManager::new(&configs);
    manager.add_world(World::new(DimensionId::OVERWORLD));
    manager.on_world_load(DimensionId::OVERWORLD);

    let mut interval = interval::Interval::new(1000 / TICKS_PER_SECOND, 500);
    let mut tick = 0u64;
    loop {
        interval.step();
        tick += 1;

        manager.on_server_tick(TickPhase::End);
        manager.on_world_tick(DimensionId::OVERWORLD, TickPhase::End);

        if backup_interval != 0 && tick % backup_interval == 0 {
            manager.backup_colony_data();
        }
    }
}
