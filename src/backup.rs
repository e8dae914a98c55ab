use crate::colony::Colony;
use crate::idx::{ColonyId, DimensionId};
use crate::manager::ManagerSave;
use crate::world::Worlds;
use ahash::AHashSet;
use anyhow::Context;
use std::path::PathBuf;

const LEDGER_FILE: &str = "deleted_colonies.json";
const MANAGER_FILE: &str = "colony_manager.dat";

/// File backed colony backups and the deletion ledger.
///
/// The ledger is what keeps a deleted colony dead across restarts:
/// `reload_missing` refuses to restore anything recorded in it.
#[derive(Debug)]
pub struct BackupLedger {
    path: PathBuf,
    deleted: AHashSet<(DimensionId, ColonyId)>,
}
impl BackupLedger {
    pub fn new(path: PathBuf) -> Self {
        let deleted = match std::fs::read(path.join(LEDGER_FILE)) {
            Ok(buffer) => match serde_json::from_slice(&buffer) {
                Ok(deleted) => deleted,
                Err(err) => {
                    warn!("{} while reading the deletion ledger. Starting empty...", err);
                    Default::default()
                }
            },
            Err(_) => Default::default(),
        };
        Self { path, deleted }
    }

    /// Record a deletion so a restart does not resurrect the colony.
    pub fn mark_deleted(&mut self, colony_id: ColonyId, dimension: DimensionId) {
        if self.deleted.insert((dimension, colony_id)) {
            if let Err(err) = self.persist_ledger() {
                warn!("{:#} while persisting the deletion ledger", err);
            }
        }
        let _ = std::fs::remove_file(self.colony_file(dimension, colony_id));
    }

    pub fn is_deleted(&self, colony_id: ColonyId, dimension: DimensionId) -> bool {
        self.deleted.contains(&(dimension, colony_id))
    }

    /// Write the deletion ledger back to disk so a restart reads it.
    fn persist_ledger(&self) -> anyhow::Result<()> {
        std::fs::create_dir_all(&self.path)
            .with_context(|| format!("creating backup dir {}", self.path.display()))?;
        let buffer = serde_json::to_vec(&self.deleted)?;
        std::fs::write(self.path.join(LEDGER_FILE), buffer)
            .with_context(|| format!("writing {}", LEDGER_FILE))?;
        Ok(())
    }

    /// Snapshot every colony and the manager save under the backup path,
    /// then keep a dated copy of the lot.
    pub fn backup_all(&self, worlds: &Worlds, manager_save: &ManagerSave) -> anyhow::Result<()> {
        std::fs::create_dir_all(&self.path)
            .with_context(|| format!("creating backup dir {}", self.path.display()))?;

        let mut count = 0usize;
        for world in worlds.iter() {
            let Some(store) = &world.store else {
                continue;
            };
            for colony in store.colonies() {
                let buffer = postcard::to_stdvec(colony)?;
                let file = self.colony_file(world.dimension(), colony.id());
                std::fs::write(&file, buffer)
                    .with_context(|| format!("writing {}", file.display()))?;
                count += 1;
            }
        }

        let buffer = postcard::to_stdvec(manager_save)?;
        std::fs::write(self.path.join(MANAGER_FILE), buffer)
            .context("writing the manager save")?;

        self.dated_copy()?;

        info!("Backed up {} colonies to {}", count, self.path.display());
        Ok(())
    }

    /// Reinsert backed up colonies missing from their store. Colonies in
    /// the deletion ledger stay dead. Returns what was restored so the
    /// directory can re-claim their chunk regions.
    pub fn reload_missing(&self, worlds: &mut Worlds) -> Vec<(DimensionId, ColonyId)> {
        let mut restored = Vec::new();

        let entries = match std::fs::read_dir(&self.path) {
            Ok(entries) => entries,
            // Nothing was ever backed up.
            Err(_) => return restored,
        };

        for entry in entries.flatten() {
            let name = entry.file_name();
            let name = name.to_string_lossy();
            if !name.starts_with("colony-") || !name.ends_with(".dat") {
                continue;
            }

            let colony = match std::fs::read(entry.path())
                .map_err(anyhow::Error::from)
                .and_then(|buffer| Ok(postcard::from_bytes::<Colony>(&buffer)?))
            {
                Ok(colony) => colony,
                Err(err) => {
                    warn!("{:#} while reading colony backup {}", err, name);
                    continue;
                }
            };

            if self.is_deleted(colony.id(), colony.dimension()) {
                continue;
            }
            let Some(store) = worlds
                .get_mut(colony.dimension())
                .and_then(|world| world.store.as_mut())
            else {
                continue;
            };
            if store.contains(colony.id()) {
                continue;
            }

            info!("Restoring colony {:?} from backup", colony.id());
            restored.push((colony.dimension(), colony.id()));
            store.restore_colony(colony);
        }

        restored
    }

    pub fn load_manager_save(&self) -> Option<ManagerSave> {
        let buffer = std::fs::read(self.path.join(MANAGER_FILE)).ok()?;
        match postcard::from_bytes(&buffer) {
            Ok(save) => Some(save),
            Err(err) => {
                warn!("{} while reading the manager save backup.", err);
                None
            }
        }
    }

    fn colony_file(&self, dimension: DimensionId, colony_id: ColonyId) -> PathBuf {
        self.path
            .join(format!("colony-{}-{}.dat", dimension.0, colony_id.0))
    }

    fn dated_copy(&self) -> anyhow::Result<()> {
        let dated = self
            .path
            .join(chrono::Local::now().format("backup-%Y-%m-%d_%H-%M-%S").to_string());
        std::fs::create_dir_all(&dated)?;

        for entry in std::fs::read_dir(&self.path)?.flatten() {
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == "dat") && path.is_file() {
                if let Some(name) = path.file_name() {
                    std::fs::copy(&path, dated.join(name))?;
                }
            }
        }
        Ok(())
    }
}
