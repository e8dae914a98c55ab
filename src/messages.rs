use crate::colony::Rank;
use crate::idx::{CitizenId, ColonyId, DimensionId, PlayerId, WorkOrderId};
use crate::pos::BlockPos;
use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// Opaque component payload carried by a view message.
/// Only the view it is addressed to knows how to decode it.
pub type Payload = Bytes;

/// Server to client view replication messages.
/// Each addresses one colony/dimension pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ViewMessage {
    /// Full snapshot of the colony level fields.
    /// The only message allowed to create a view on the client.
    Colony {
        colony_id: ColonyId,
        dimension: DimensionId,
        new_subscription: bool,
        data: Payload,
    },
    Permissions {
        colony_id: ColonyId,
        dimension: DimensionId,
        data: Payload,
    },
    Citizen {
        colony_id: ColonyId,
        dimension: DimensionId,
        citizen_id: CitizenId,
        data: Payload,
    },
    RemoveCitizen {
        colony_id: ColonyId,
        dimension: DimensionId,
        citizen_id: CitizenId,
    },
    Building {
        colony_id: ColonyId,
        dimension: DimensionId,
        position: BlockPos,
        data: Payload,
    },
    RemoveBuilding {
        colony_id: ColonyId,
        dimension: DimensionId,
        position: BlockPos,
    },
    WorkOrder {
        colony_id: ColonyId,
        dimension: DimensionId,
        data: Payload,
    },
    RemoveWorkOrder {
        colony_id: ColonyId,
        dimension: DimensionId,
        work_order_id: WorkOrderId,
    },
    /// The colony was deleted on the server. Sent to important players.
    RemoveColony {
        colony_id: ColonyId,
        dimension: DimensionId,
    },
}
impl ViewMessage {
    pub fn serialize(&self) -> Vec<u8> {
        match postcard::to_stdvec(self) {
            Ok(v) => v,
            Err(err) => {
                warn!(
                    "{} while trying to serialize ViewMessage. Sending empty packet...",
                    err
                );
                Vec::new()
            }
        }
    }

    pub fn deserialize(buffer: &[u8]) -> Option<Self> {
        match postcard::from_bytes(buffer) {
            Ok(message) => Some(message),
            Err(err) => {
                debug!("{} while trying to deserialize ViewMessage.", err);
                None
            }
        }
    }
}

/// Decode a typed payload body. `None` means the blob did not match the
/// expected shape, which the caller treats as a protocol inconsistency.
pub fn decode_payload<'a, T: Deserialize<'a>>(data: &'a Payload) -> Option<T> {
    match postcard::from_bytes(data) {
        Ok(body) => Some(body),
        Err(err) => {
            debug!("{} while trying to decode a view payload.", err);
            None
        }
    }
}

fn encode_payload<T: Serialize>(body: &T) -> Payload {
    match postcard::to_stdvec(body) {
        Ok(v) => Bytes::from(v),
        Err(err) => {
            warn!("{} while trying to encode a view payload.", err);
            Bytes::new()
        }
    }
}

/// Colony level fields replicated by a full snapshot.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ColonyData {
    pub name: String,
    pub center: BlockPos,
    pub structure_pack: String,
    pub citizen_count: u32,
}
impl ColonyData {
    pub fn encode(&self) -> Payload {
        encode_payload(self)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PermissionsData {
    pub owner: PlayerId,
    pub ranks: Vec<(PlayerId, Rank)>,
}
impl PermissionsData {
    pub fn encode(&self) -> Payload {
        encode_payload(self)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CitizenData {
    pub name: String,
    pub position: Option<BlockPos>,
}
impl CitizenData {
    pub fn encode(&self) -> Payload {
        encode_payload(self)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BuildingData {
    pub kind: String,
    pub level: u32,
}
impl BuildingData {
    pub fn encode(&self) -> Payload {
        encode_payload(self)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkOrderData {
    pub id: WorkOrderId,
    pub kind: String,
    pub target: BlockPos,
    pub priority: i32,
}
impl WorkOrderData {
    pub fn encode(&self) -> Payload {
        encode_payload(self)
    }
}

#[test]
fn test_view_message() {
    let og = ViewMessage::Colony {
        colony_id: ColonyId(3),
        dimension: DimensionId::OVERWORLD,
        new_subscription: true,
        data: ColonyData {
            name: "Riverside".to_string(),
            center: BlockPos::new(120, 64, -80),
            structure_pack: "default".to_string(),
            citizen_count: 4,
        }
        .encode(),
    };
    assert_eq!(og, ViewMessage::deserialize(&og.serialize()).unwrap());
}

#[test]
fn test_remove_message() {
    let og = ViewMessage::RemoveCitizen {
        colony_id: ColonyId(1),
        dimension: DimensionId(2),
        citizen_id: CitizenId(7),
    };
    assert_eq!(og, ViewMessage::deserialize(&og.serialize()).unwrap());
}

#[test]
fn test_deserialize_garbage() {
    assert!(ViewMessage::deserialize(&[0xff, 0xff, 0xff, 0xff]).is_none());
}

#[test]
fn test_decode_wrong_payload() {
    let data = CitizenData {
        name: "Ray".to_string(),
        position: None,
    }
    .encode();
    assert!(decode_payload::<WorkOrderData>(&data).is_none());
}
