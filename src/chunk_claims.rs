use crate::idx::ColonyId;
use crate::pos::{BlockPos, ChunkPos};
use ahash::AHashMap;
use serde::{Deserialize, Serialize};

/// Coarse ownership index of a world's chunks.
///
/// Only the colony directory mutates this through the paired
/// claim/unclaim calls. A missing entry means the chunk is unowned.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChunkClaims {
    owners: AHashMap<ChunkPos, ColonyId>,
}
impl ChunkClaims {
    pub fn owner(&self, chunk: ChunkPos) -> Option<ColonyId> {
        self.owners.get(&chunk).copied()
    }

    pub fn owner_at(&self, pos: BlockPos) -> Option<ColonyId> {
        self.owner(pos.chunk())
    }

    /// Claim (or release) the square region of `radius` chunks around `center`
    /// for `colony_id`. Claiming never steals a chunk from another colony and
    /// releasing never drops one. Both directions are idempotent.
    pub fn claim_colony_chunks(
        &mut self,
        claim: bool,
        colony_id: ColonyId,
        center: BlockPos,
        radius: i32,
    ) {
        let center = center.chunk();
        for x in (center.x - radius)..=(center.x + radius) {
            for z in (center.z - radius)..=(center.z + radius) {
                let chunk = ChunkPos { x, z };
                if claim {
                    self.owners.entry(chunk).or_insert(colony_id);
                } else if self.owners.get(&chunk) == Some(&colony_id) {
                    self.owners.remove(&chunk);
                }
            }
        }
    }

    /// If every chunk of the square region of `radius` around `center` is free.
    pub fn can_claim_chunks_in_range(&self, center: BlockPos, radius: i32) -> bool {
        let center = center.chunk();
        for x in (center.x - radius)..=(center.x + radius) {
            for z in (center.z - radius)..=(center.z + radius) {
                if self.owners.contains_key(&ChunkPos { x, z }) {
                    return false;
                }
            }
        }
        true
    }

    /// Every colony id currently owning at least one chunk.
    pub fn owning_colonies(&self) -> impl Iterator<Item = ColonyId> + '_ {
        self.owners.values().copied()
    }

    pub fn is_empty(&self) -> bool {
        self.owners.is_empty()
    }
}

#[test]
fn test_claim_unclaim_paired() {
    let mut claims = ChunkClaims::default();
    let center = BlockPos::new(100, 64, 100);

    claims.claim_colony_chunks(true, ColonyId(1), center, 2);
    assert_eq!(claims.owner_at(center), Some(ColonyId(1)));

    // Claiming twice changes nothing.
    claims.claim_colony_chunks(true, ColonyId(1), center, 2);

    // Another colony cannot steal the region.
    claims.claim_colony_chunks(true, ColonyId(2), center, 2);
    assert_eq!(claims.owner_at(center), Some(ColonyId(1)));

    // Releasing from the wrong colony drops nothing.
    claims.claim_colony_chunks(false, ColonyId(2), center, 2);
    assert_eq!(claims.owner_at(center), Some(ColonyId(1)));

    claims.claim_colony_chunks(false, ColonyId(1), center, 2);
    assert_eq!(claims.owner_at(center), None);
    assert!(claims.is_empty());
}

#[test]
fn test_can_claim_in_range() {
    let mut claims = ChunkClaims::default();
    claims.claim_colony_chunks(true, ColonyId(1), BlockPos::new(0, 0, 0), 1);

    assert!(!claims.can_claim_chunks_in_range(BlockPos::new(32, 0, 0), 1));
    assert!(claims.can_claim_chunks_in_range(BlockPos::new(64, 0, 0), 1));
}
