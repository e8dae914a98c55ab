use serde::{Deserialize, Serialize};

/// Side length of a chunk in blocks.
pub const BLOCKS_PER_CHUNK: i32 = 16;

#[derive(Debug, Clone, Copy, Default, Hash, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockPos {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}
impl BlockPos {
    pub const fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    /// The chunk this block belongs to.
    pub fn chunk(self) -> ChunkPos {
        ChunkPos {
            x: self.x.div_euclid(BLOCKS_PER_CHUNK),
            z: self.z.div_euclid(BLOCKS_PER_CHUNK),
        }
    }

    /// Squared distance on the horizontal plane. Height is ignored.
    pub fn distance_squared_2d(self, other: Self) -> i64 {
        let dx = i64::from(self.x) - i64::from(other.x);
        let dz = i64::from(self.z) - i64::from(other.z);
        dx * dx + dz * dz
    }
}

#[derive(Debug, Clone, Copy, Default, Hash, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkPos {
    pub x: i32,
    pub z: i32,
}

#[test]
fn test_chunk_of_negative_pos() {
    assert_eq!(BlockPos::new(-1, 64, -16).chunk(), ChunkPos { x: -1, z: -1 });
    assert_eq!(BlockPos::new(0, 0, 15).chunk(), ChunkPos { x: 0, z: 0 });
    assert_eq!(BlockPos::new(16, 0, 31).chunk(), ChunkPos { x: 1, z: 1 });
}

#[test]
fn test_distance_squared_ignores_height() {
    let a = BlockPos::new(0, 0, 0);
    let b = BlockPos::new(3, 255, 4);
    assert_eq!(a.distance_squared_2d(b), 25);
}
