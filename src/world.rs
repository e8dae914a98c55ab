use crate::chunk_claims::ChunkClaims;
use crate::idx::DimensionId;
use crate::pos::BlockPos;
use crate::store::ColonyStore;
use ahash::AHashMap;
use indexmap::IndexMap;

/// The few block kinds this layer knows how to physically remove.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Block {
    /// Marker block left where a colony building stands.
    HutMarker,
}

/// A loaded authoritative world.
///
/// `store` is the per world colony capability. Dimensions this server
/// does not manage carry `None` and every colony operation on them
/// degrades to a logged miss.
#[derive(Debug)]
pub struct World {
    dimension: DimensionId,
    pub claims: ChunkClaims,
    pub store: Option<ColonyStore>,
    blocks: AHashMap<BlockPos, Block>,
}
impl World {
    pub fn new(dimension: DimensionId) -> Self {
        Self {
            dimension,
            claims: ChunkClaims::default(),
            store: Some(ColonyStore::default()),
            blocks: AHashMap::new(),
        }
    }

    /// A world without the colony capability attached.
    pub fn without_store(dimension: DimensionId) -> Self {
        Self {
            dimension,
            claims: ChunkClaims::default(),
            store: None,
            blocks: AHashMap::new(),
        }
    }

    pub fn dimension(&self) -> DimensionId {
        self.dimension
    }

    pub fn block(&self, pos: BlockPos) -> Option<Block> {
        self.blocks.get(&pos).copied()
    }

    pub fn set_block(&mut self, pos: BlockPos, block: Block) {
        self.blocks.insert(pos, block);
    }

    pub fn remove_block(&mut self, pos: BlockPos) -> Option<Block> {
        self.blocks.remove(&pos)
    }
}

/// Registry of loaded worlds, keyed by dimension.
/// Injected into the colony directory at construction.
#[derive(Debug, Default)]
pub struct Worlds {
    worlds: IndexMap<DimensionId, World>,
}
impl Worlds {
    pub fn insert(&mut self, world: World) {
        self.worlds.insert(world.dimension(), world);
    }

    pub fn get(&self, dimension: DimensionId) -> Option<&World> {
        self.worlds.get(&dimension)
    }

    pub fn get_mut(&mut self, dimension: DimensionId) -> Option<&mut World> {
        self.worlds.get_mut(&dimension)
    }

    pub fn iter(&self) -> impl Iterator<Item = &World> {
        self.worlds.values()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut World> {
        self.worlds.values_mut()
    }

    pub fn is_empty(&self) -> bool {
        self.worlds.is_empty()
    }
}
