use crate::idx::{CitizenId, ColonyId, DimensionId, PlayerId, WorkOrderId};
use crate::messages::{
    decode_payload, BuildingData, CitizenData, ColonyData, Payload, PermissionsData, WorkOrderData,
};
use crate::pos::BlockPos;
use ahash::AHashMap;
use indexmap::IndexMap;

/// Partial, client visible projection of a colony.
///
/// Built incrementally from network patches. Identity and dimension are
/// fixed at creation; everything else fills in as messages arrive.
#[derive(Debug, Default)]
pub struct ColonyView {
    id: ColonyId,
    dimension: DimensionId,
    pub name: String,
    pub center: BlockPos,
    pub structure_pack: String,
    pub citizen_count: u32,
    pub permissions: Option<PermissionsData>,
    pub citizens: IndexMap<CitizenId, CitizenData>,
    pub buildings: AHashMap<BlockPos, BuildingData>,
    pub work_orders: IndexMap<WorkOrderId, WorkOrderData>,
}
impl ColonyView {
    fn empty(id: ColonyId, dimension: DimensionId) -> Self {
        Self {
            id,
            dimension,
            ..Default::default()
        }
    }

    pub fn id(&self) -> ColonyId {
        self.id
    }

    pub fn dimension(&self) -> DimensionId {
        self.dimension
    }

    pub fn building(&self, pos: BlockPos) -> Option<&BuildingData> {
        self.buildings.get(&pos)
    }

    pub fn distance_squared_to(&self, pos: BlockPos) -> i64 {
        self.center.distance_squared_2d(pos)
    }

    pub fn is_owner(&self, player: PlayerId) -> bool {
        self.permissions
            .as_ref()
            .is_some_and(|permissions| permissions.owner == player)
    }

    fn apply_colony_data(&mut self, data: ColonyData, new_subscription: bool) {
        if new_subscription {
            // A resubscription starts the component collections over.
            self.citizens.clear();
            self.buildings.clear();
            self.work_orders.clear();
        }
        self.name = data.name;
        self.center = data.center;
        self.structure_pack = data.structure_pack;
        self.citizen_count = data.citizen_count;
    }
}

/// Per dimension cache of colony views. Lives on the client side only.
///
/// Patches are applied in delivery order; the cache tolerates logical
/// reordering around subscription setup, not concurrent access.
#[derive(Debug, Default)]
pub struct ColonyViews {
    views: AHashMap<DimensionId, IndexMap<ColonyId, ColonyView>>,
}
impl ColonyViews {
    pub fn view(&self, id: ColonyId, dimension: DimensionId) -> Option<&ColonyView> {
        self.views.get(&dimension)?.get(&id)
    }

    fn view_mut(&mut self, id: ColonyId, dimension: DimensionId) -> Option<&mut ColonyView> {
        self.views.get_mut(&dimension)?.get_mut(&id)
    }

    /// Apply a full snapshot, creating the view if this is the first
    /// message to reference it. Returns whether a view was updated.
    ///
    /// This is the only entry point that can create a view.
    pub fn handle_colony_message(
        &mut self,
        id: ColonyId,
        dimension: DimensionId,
        new_subscription: bool,
        data: &Payload,
    ) -> bool {
        let Some(data) = decode_payload::<ColonyData>(data) else {
            error!("Malformed colony snapshot for {:?}", id);
            return false;
        };

        self.views
            .entry(dimension)
            .or_default()
            .entry(id)
            .or_insert_with(|| ColonyView::empty(id, dimension))
            .apply_colony_data(data, new_subscription);
        true
    }

    /// A permissions patch for an unknown view is a protocol bug,
    /// unlike the component patches below.
    pub fn handle_permissions_message(
        &mut self,
        id: ColonyId,
        dimension: DimensionId,
        data: &Payload,
    ) {
        let Some(view) = self.view_mut(id, dimension) else {
            error!("Colony view does not exist for {:?}", id);
            return;
        };
        let Some(data) = decode_payload::<PermissionsData>(data) else {
            error!("Malformed permissions patch for {:?}", id);
            return;
        };
        view.permissions = Some(data);
    }

    /// Can legitimately race ahead of the full snapshot during
    /// subscription setup, in which case it is dropped.
    pub fn handle_citizen_message(
        &mut self,
        id: ColonyId,
        dimension: DimensionId,
        citizen_id: CitizenId,
        data: &Payload,
    ) {
        let Some(view) = self.view_mut(id, dimension) else {
            return;
        };
        let Some(data) = decode_payload::<CitizenData>(data) else {
            error!("Malformed citizen patch for {:?}", id);
            return;
        };
        view.citizens.insert(citizen_id, data);
    }

    /// Can legitimately arrive before the view was ever created.
    pub fn handle_remove_citizen_message(
        &mut self,
        id: ColonyId,
        dimension: DimensionId,
        citizen_id: CitizenId,
    ) {
        if let Some(view) = self.view_mut(id, dimension) {
            view.citizens.shift_remove(&citizen_id);
        }
    }

    pub fn handle_building_message(
        &mut self,
        id: ColonyId,
        dimension: DimensionId,
        position: BlockPos,
        data: &Payload,
    ) {
        let Some(view) = self.view_mut(id, dimension) else {
            return;
        };
        let Some(data) = decode_payload::<BuildingData>(data) else {
            error!("Malformed building patch for {:?}", id);
            return;
        };
        view.buildings.insert(position, data);
    }

    /// Can legitimately arrive before the view was ever created.
    pub fn handle_remove_building_message(
        &mut self,
        id: ColonyId,
        dimension: DimensionId,
        position: BlockPos,
    ) {
        if let Some(view) = self.view_mut(id, dimension) {
            view.buildings.remove(&position);
        }
    }

    pub fn handle_work_order_message(&mut self, id: ColonyId, dimension: DimensionId, data: &Payload) {
        let Some(view) = self.view_mut(id, dimension) else {
            return;
        };
        let Some(data) = decode_payload::<WorkOrderData>(data) else {
            error!("Malformed work order patch for {:?}", id);
            return;
        };
        view.work_orders.insert(data.id, data);
    }

    /// Can legitimately arrive before the view was ever created.
    pub fn handle_remove_work_order_message(
        &mut self,
        id: ColonyId,
        dimension: DimensionId,
        work_order_id: WorkOrderId,
    ) {
        if let Some(view) = self.view_mut(id, dimension) {
            view.work_orders.shift_remove(&work_order_id);
        }
    }

    pub fn remove_view(&mut self, id: ColonyId, dimension: DimensionId) {
        if let Some(views) = self.views.get_mut(&dimension) {
            views.shift_remove(&id);
        }
    }

    /// No spatial index on the client side. View counts are small enough
    /// that checking every known view is fine.
    pub fn building_view(&self, dimension: DimensionId, pos: BlockPos) -> Option<&BuildingData> {
        self.views
            .get(&dimension)?
            .values()
            .find_map(|view| view.building(pos))
    }

    /// The cached view closest to `pos`. First encountered wins on ties.
    pub fn closest_view(&self, dimension: DimensionId, pos: BlockPos) -> Option<&ColonyView> {
        let mut closest: Option<&ColonyView> = None;
        let mut closest_dist = i64::MAX;
        for view in self.views.get(&dimension)?.values() {
            let dist = view.distance_squared_to(pos);
            if dist < closest_dist {
                closest = Some(view);
                closest_dist = dist;
            }
        }
        closest
    }

    pub fn view_by_owner(&self, player: PlayerId, dimension: DimensionId) -> Option<&ColonyView> {
        self.views
            .get(&dimension)?
            .values()
            .find(|view| view.is_owner(player))
    }

    /// Drop every cached view. Used when the client leaves the game.
    pub fn reset(&mut self) {
        self.views.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.views.values().all(|views| views.is_empty())
    }

    pub fn len(&self) -> usize {
        self.views.values().map(|views| views.len()).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(name: &str) -> Payload {
        ColonyData {
            name: name.to_string(),
            center: BlockPos::new(0, 64, 0),
            structure_pack: "default".to_string(),
            citizen_count: 0,
        }
        .encode()
    }

    #[test]
    fn test_only_snapshot_creates_views() {
        let mut views = ColonyViews::default();
        let dim = DimensionId::OVERWORLD;

        // Patches ahead of the snapshot are dropped without error.
        views.handle_citizen_message(
            ColonyId(1),
            dim,
            CitizenId(1),
            &CitizenData::default().encode(),
        );
        views.handle_remove_building_message(ColonyId(1), dim, BlockPos::default());
        views.handle_remove_work_order_message(ColonyId(1), dim, WorkOrderId(4));
        assert!(views.is_empty());

        assert!(views.handle_colony_message(ColonyId(1), dim, true, &snapshot("Riverside")));
        assert_eq!(views.view(ColonyId(1), dim).unwrap().name, "Riverside");
        assert_eq!(views.len(), 1);
    }

    #[test]
    fn test_permissions_patch_needs_a_view() {
        let mut views = ColonyViews::default();
        views.handle_permissions_message(
            ColonyId(8),
            DimensionId::OVERWORLD,
            &PermissionsData::default().encode(),
        );
        assert!(views.is_empty());
    }

    #[test]
    fn test_remove_before_snapshot_is_ignored() {
        let mut views = ColonyViews::default();
        let dim = DimensionId::OVERWORLD;
        views.handle_colony_message(ColonyId(1), dim, true, &snapshot("Riverside"));

        // Removal for a colony whose view never existed.
        views.handle_remove_citizen_message(ColonyId(2), dim, CitizenId(1));
        assert_eq!(views.len(), 1);
    }

    #[test]
    fn test_resubscription_resets_components() {
        let mut views = ColonyViews::default();
        let dim = DimensionId::OVERWORLD;
        views.handle_colony_message(ColonyId(1), dim, true, &snapshot("Riverside"));
        views.handle_work_order_message(
            ColonyId(1),
            dim,
            &WorkOrderData {
                id: WorkOrderId(1),
                kind: "build".to_string(),
                target: BlockPos::default(),
                priority: 1,
            }
            .encode(),
        );
        assert_eq!(views.view(ColonyId(1), dim).unwrap().work_orders.len(), 1);

        views.handle_colony_message(ColonyId(1), dim, true, &snapshot("Riverside"));
        assert!(views.view(ColonyId(1), dim).unwrap().work_orders.is_empty());
    }
}
