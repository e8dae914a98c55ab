use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ServerConfigs {
    pub colony_configs: ColonyConfigs,
    pub backup_configs: BackupConfigs,
}
impl ServerConfigs {
    /// Load configs from a json file. Missing or unreadable file falls
    /// back to defaults so a fresh server can start without any setup.
    pub fn load(path: &Path) -> Self {
        match std::fs::read(path) {
            Ok(buffer) => match serde_json::from_slice(&buffer) {
                Ok(configs) => configs,
                Err(err) => {
                    warn!("{} while parsing {}. Using defaults...", err, path.display());
                    Self::default()
                }
            },
            Err(_) => {
                info!("No config file at {}. Using defaults...", path.display());
                Self::default()
            }
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ColonyConfigs {
    /// Minimum distance between two town halls in chunks.
    pub min_colony_distance: i32,
    /// Radius of the chunk region claimed by a new colony.
    pub initial_colony_size: i32,
}
impl Default for ColonyConfigs {
    fn default() -> Self {
        Self {
            min_colony_distance: 8,
            initial_colony_size: 4,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackupConfigs {
    /// Where colony backups and the deletion ledger are written.
    pub backup_path: PathBuf,
    /// How many server ticks between periodic backups.
    pub backup_interval: u64,
}
impl Default for BackupConfigs {
    fn default() -> Self {
        Self {
            backup_path: PathBuf::from("colony_backups"),
            backup_interval: 20 * 60 * 30,
        }
    }
}
