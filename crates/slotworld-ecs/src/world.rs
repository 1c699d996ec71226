//! The [`World`] is the top-level container for the ECS. It owns the
//! component registry (and with it every component column) and the entity
//! table.

use std::any::TypeId;

use tracing::warn;

use crate::component::{ComponentInfo, ComponentRegistry, ComponentTypeId};
use crate::entity::{CommitReport, EntityRef, EntityState, EntityTable};
use crate::mask::ComponentMask;
use crate::EcsError;

/// Registry plus entity table, mutated only through `&mut self`.
#[derive(Debug, Default)]
pub struct World {
    pub(crate) registry: ComponentRegistry,
    pub(crate) table: EntityTable,
}

impl World {
    /// Create a world with no component types and every slot unused.
    pub fn new() -> Self {
        Self::default()
    }

    /// Read-only access to the component registry.
    pub fn registry(&self) -> &ComponentRegistry {
        &self.registry
    }

    /// Read-only access to the entity table.
    pub fn table(&self) -> &EntityTable {
        &self.table
    }

    // -- registration -------------------------------------------------------

    /// Register a plain-old-data component type. See
    /// [`ComponentRegistry::register`].
    pub fn register<T: bytemuck::Pod>(
        &mut self,
        name: &str,
        persist: bool,
    ) -> Result<ComponentTypeId, EcsError> {
        self.registry.register::<T>(name, persist)
    }

    /// Register a component type by layout. See
    /// [`ComponentRegistry::register_raw`].
    pub fn register_raw(
        &mut self,
        name: &str,
        element_size: usize,
        alignment: usize,
        persist: bool,
    ) -> Result<ComponentTypeId, EcsError> {
        self.registry
            .register_raw(name, element_size, alignment, persist)
    }

    /// Aligned element size of a registered type.
    pub fn get_size(&self, id: ComponentTypeId) -> Option<usize> {
        self.registry.get_size(id)
    }

    // -- entity lifecycle ---------------------------------------------------

    /// Create an entity carrying `mask`. It becomes visible to queries after
    /// the next [`update`](Self::update).
    ///
    /// Every component element of the claimed slot is zeroed. Fails with
    /// [`EcsError::UnregisteredComponents`] if `mask` names a type that was
    /// never registered, and with [`EcsError::TableFull`] when no slot is
    /// free.
    pub fn add(&mut self, mask: ComponentMask) -> Result<EntityRef, EcsError> {
        let unknown = mask.difference(self.registry.registered_mask());
        if !unknown.is_empty() {
            warn!(%mask, %unknown, "entity mask names unregistered component types");
            return Err(EcsError::UnregisteredComponents { mask: unknown });
        }
        let entity = self.table.add(mask)?;
        self.registry.zero_slot(entity.index() as usize);
        Ok(entity)
    }

    /// Request removal of `entity`. It stays addressable until the next
    /// [`update`](Self::update).
    pub fn remove(&mut self, entity: EntityRef, allow_pending_add: bool) -> Result<(), EcsError> {
        self.table.remove(entity, allow_pending_add)
    }

    /// Commit pending adds and removes. Call once per tick, before queries
    /// that should observe this tick's changes.
    pub fn update(&mut self) -> CommitReport {
        self.table.update()
    }

    /// Whether `entity` is a live handle.
    pub fn is_valid(&self, entity: EntityRef, allow_pending_add: bool) -> bool {
        self.table.is_valid(entity, allow_pending_add)
    }

    /// Mask of a live entity.
    pub fn entity_mask(&self, entity: EntityRef, allow_pending_add: bool) -> Option<ComponentMask> {
        self.table.mask(entity, allow_pending_add)
    }

    /// Lifecycle state of slot `index`.
    pub fn state(&self, index: usize) -> Option<EntityState> {
        self.table.state(index)
    }

    /// The generation the next `add` will hand out.
    pub fn sequence(&self) -> u32 {
        self.table.sequence()
    }

    /// Number of entity slots.
    pub fn capacity(&self) -> usize {
        self.table.capacity()
    }

    /// Number of `Active` entities.
    pub fn active_count(&self) -> usize {
        self.table.count(EntityState::Active)
    }

    /// Commit epoch, bumped by every `update` and load.
    pub fn epoch(&self) -> u64 {
        self.table.epoch()
    }

    // -- component access ---------------------------------------------------

    /// Bytes of component `id` for a live entity.
    ///
    /// The entity's own mask is not consulted; callers pair this with masks
    /// they established on `add` or through a query.
    pub fn get_component(
        &self,
        entity: EntityRef,
        id: ComponentTypeId,
        allow_pending_add: bool,
    ) -> Option<&[u8]> {
        if !self.table.is_valid(entity, allow_pending_add) {
            return None;
        }
        self.registry.column(id)?.element(entity.index() as usize)
    }

    /// Mutable bytes of component `id` for a live entity.
    pub fn get_component_mut(
        &mut self,
        entity: EntityRef,
        id: ComponentTypeId,
        allow_pending_add: bool,
    ) -> Option<&mut [u8]> {
        if !self.table.is_valid(entity, allow_pending_add) {
            return None;
        }
        self.registry
            .column_mut(id)?
            .element_mut(entity.index() as usize)
    }

    /// Typed view of component `id` for a live entity.
    ///
    /// Returns `None` where [`get_component`](Self::get_component) would, and
    /// also when `T` is not the type `id` was registered with or does not fit
    /// its layout.
    pub fn get<T: bytemuck::Pod>(
        &self,
        entity: EntityRef,
        id: ComponentTypeId,
        allow_pending_add: bool,
    ) -> Option<&T> {
        if !type_matches::<T>(self.registry.get_info(id)?) {
            return None;
        }
        cast_ref(self.get_component(entity, id, allow_pending_add)?)
    }

    /// Typed mutable view of component `id` for a live entity.
    pub fn get_mut<T: bytemuck::Pod>(
        &mut self,
        entity: EntityRef,
        id: ComponentTypeId,
        allow_pending_add: bool,
    ) -> Option<&mut T> {
        if !type_matches::<T>(self.registry.get_info(id)?) {
            return None;
        }
        cast_mut(self.get_component_mut(entity, id, allow_pending_add)?)
    }

    /// Bytes of component `id` at slot `index`, without any validity check.
    pub(crate) fn slot_component(&self, index: usize, id: ComponentTypeId) -> Option<&[u8]> {
        self.registry.column(id)?.element(index)
    }

    pub(crate) fn slot_component_mut(
        &mut self,
        index: usize,
        id: ComponentTypeId,
    ) -> Option<&mut [u8]> {
        self.registry.column_mut(id)?.element_mut(index)
    }
}

// ---------------------------------------------------------------------------
// Typed views
// ---------------------------------------------------------------------------

pub(crate) fn type_matches<T: 'static>(info: &ComponentInfo) -> bool {
    match info.type_id {
        Some(registered) if registered != TypeId::of::<T>() => {
            warn!(
                component = %info.name,
                requested = std::any::type_name::<T>(),
                "typed access does not match the registered component type"
            );
            false
        }
        _ => true,
    }
}

pub(crate) fn cast_ref<T: bytemuck::Pod>(bytes: &[u8]) -> Option<&T> {
    let bytes = bytes.get(..std::mem::size_of::<T>())?;
    bytemuck::try_from_bytes(bytes).ok()
}

pub(crate) fn cast_mut<T: bytemuck::Pod>(bytes: &mut [u8]) -> Option<&mut T> {
    let bytes = bytes.get_mut(..std::mem::size_of::<T>())?;
    bytemuck::try_from_bytes_mut(bytes).ok()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
