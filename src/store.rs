use crate::colony::Colony;
use crate::idx::{ColonyId, DimensionId};
use crate::pos::BlockPos;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Authoritative colony store attached to a world.
///
/// Issues ids monotonically. An id is never reused, even after its colony
/// was deleted. Iteration order is insertion order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ColonyStore {
    colonies: IndexMap<ColonyId, Colony>,
    top_id: u32,
}
impl ColonyStore {
    /// Create a colony at `center` and hand out a fresh id.
    pub fn create_colony(&mut self, dimension: DimensionId, center: BlockPos) -> &mut Colony {
        self.top_id += 1;
        let id = ColonyId(self.top_id);
        self.colonies
            .entry(id)
            .or_insert_with(|| Colony::new(id, dimension, center))
    }

    pub fn colony(&self, id: ColonyId) -> Option<&Colony> {
        self.colonies.get(&id)
    }

    pub fn colony_mut(&mut self, id: ColonyId) -> Option<&mut Colony> {
        self.colonies.get_mut(&id)
    }

    pub fn delete_colony(&mut self, id: ColonyId) -> Option<Colony> {
        // Keeps iteration order intact for the remaining colonies.
        self.colonies.shift_remove(&id)
    }

    /// Put back a colony restored from a backup.
    /// The id counter is kept ahead so the id is still never reissued.
    pub fn restore_colony(&mut self, colony: Colony) {
        self.top_id = self.top_id.max(colony.id().0);
        self.colonies.insert(colony.id(), colony);
    }

    pub fn contains(&self, id: ColonyId) -> bool {
        self.colonies.contains_key(&id)
    }

    pub fn colonies(&self) -> impl Iterator<Item = &Colony> {
        self.colonies.values()
    }

    pub fn colonies_mut(&mut self) -> impl Iterator<Item = &mut Colony> {
        self.colonies.values_mut()
    }

    /// Highest id issued so far.
    pub fn top_id(&self) -> u32 {
        self.top_id
    }

    pub fn len(&self) -> usize {
        self.colonies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.colonies.is_empty()
    }
}
