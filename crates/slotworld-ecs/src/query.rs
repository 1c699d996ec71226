//! Mask queries over the entity table.
//!
//! A query is a linear scan in ascending slot order: a slot matches when its
//! mask covers the query mask and it is `Active` (or `PendingRemove`, which
//! stays visible until the commit that retires it). `PendingAdd` slots are
//! skipped until the next [`World::update`].
//!
//! [`QueryCursor`] holds no borrow of the world, so the caller can read and
//! write components at the current slot between steps:
//!
//! ```
//! use slotworld_ecs::prelude::*;
//!
//! let mut world = World::new();
//! let hp = world.register::<u32>("hp", true).unwrap();
//! world.add(ComponentMask::from(hp)).unwrap();
//! world.update();
//!
//! let mut cursor = world.query(ComponentMask::from(hp));
//! while cursor.is_valid() {
//!     *cursor.get_mut::<u32>(&mut world, hp).unwrap() += 10;
//!     cursor.advance(&world);
//! }
//! ```
//!
//! A cursor records the world's commit epoch. Once `update` or a load has
//! run, the next call that takes the world (`advance`, `entity`, or a
//! component accessor) notices the change, logs a warning and exhausts the
//! cursor. [`QueryCursor::is_valid`] does not see the world, so it keeps
//! reporting the old position until one of those calls is made.

use tracing::warn;

use crate::component::ComponentTypeId;
use crate::entity::EntityRef;
use crate::mask::ComponentMask;
use crate::world::{cast_mut, cast_ref, type_matches, World};

// ---------------------------------------------------------------------------
// QueryCursor
// ---------------------------------------------------------------------------

/// Position in a mask query.
#[derive(Debug, Clone)]
pub struct QueryCursor {
    mask: ComponentMask,
    /// Current slot; `None` once exhausted.
    index: Option<usize>,
    /// Commit epoch the cursor was created in.
    epoch: u64,
}

impl QueryCursor {
    /// Start a query for entities carrying every type in `mask`, positioned
    /// on the first match.
    pub fn new(world: &World, mask: ComponentMask) -> Self {
        Self {
            mask,
            index: world.table().next_match(0, mask),
            epoch: world.epoch(),
        }
    }

    /// The mask this cursor filters by.
    pub fn mask(&self) -> ComponentMask {
        self.mask
    }

    /// Slot index of the current match.
    pub fn index(&self) -> Option<usize> {
        self.index
    }

    /// Whether the cursor is positioned on a match.
    ///
    /// This only reflects the last position the cursor saw; a commit since
    /// then is detected by the next call that takes the world.
    pub fn is_valid(&self) -> bool {
        self.index.is_some()
    }

    /// Move to the next match. An exhausted cursor stays exhausted: it does
    /// not wrap around and restart the scan from slot 0.
    pub fn advance(&mut self, world: &World) {
        if !self.check_epoch(world) {
            return;
        }
        self.index = self
            .index
            .and_then(|index| world.table().next_match(index + 1, self.mask));
    }

    /// Handle for the entity at the cursor.
    pub fn entity(&mut self, world: &World) -> Option<EntityRef> {
        let index = self.current(world)?;
        world.table().entity_at(index)
    }

    /// Bytes of component `id` at the cursor.
    pub fn component<'w>(&mut self, world: &'w World, id: ComponentTypeId) -> Option<&'w [u8]> {
        let index = self.current(world)?;
        world.slot_component(index, id)
    }

    /// Mutable bytes of component `id` at the cursor.
    pub fn component_mut<'w>(
        &mut self,
        world: &'w mut World,
        id: ComponentTypeId,
    ) -> Option<&'w mut [u8]> {
        let index = self.current(world)?;
        world.slot_component_mut(index, id)
    }

    /// Typed view of component `id` at the cursor.
    pub fn get<'w, T: bytemuck::Pod>(
        &mut self,
        world: &'w World,
        id: ComponentTypeId,
    ) -> Option<&'w T> {
        let index = self.current(world)?;
        if !type_matches::<T>(world.registry().get_info(id)?) {
            return None;
        }
        cast_ref(world.slot_component(index, id)?)
    }

    /// Typed mutable view of component `id` at the cursor.
    pub fn get_mut<'w, T: bytemuck::Pod>(
        &mut self,
        world: &'w mut World,
        id: ComponentTypeId,
    ) -> Option<&'w mut T> {
        let index = self.current(world)?;
        if !type_matches::<T>(world.registry().get_info(id)?) {
            return None;
        }
        cast_mut(world.slot_component_mut(index, id)?)
    }

    fn current(&mut self, world: &World) -> Option<usize> {
        if self.check_epoch(world) {
            self.index
        } else {
            None
        }
    }

    /// Exhaust the cursor if the world committed since it was created.
    fn check_epoch(&mut self, world: &World) -> bool {
        if self.epoch == world.epoch() {
            return true;
        }
        if self.index.is_some() {
            warn!(
                cursor_epoch = self.epoch,
                world_epoch = world.epoch(),
                mask = %self.mask,
                "query cursor used across a commit"
            );
            self.index = None;
        }
        false
    }
}

// ---------------------------------------------------------------------------
// QueryIter
// ---------------------------------------------------------------------------

/// Borrowing iterator over the handles matching a mask, in slot order.
#[derive(Debug, Clone)]
pub struct QueryIter<'w> {
    world: &'w World,
    mask: ComponentMask,
    next: usize,
}

impl Iterator for QueryIter<'_> {
    type Item = EntityRef;

    fn next(&mut self) -> Option<EntityRef> {
        let index = self.world.table().next_match(self.next, self.mask)?;
        self.next = index + 1;
        self.world.table().entity_at(index)
    }
}

impl World {
    /// Start a cursor over entities carrying every type in `mask`.
    pub fn query(&self, mask: ComponentMask) -> QueryCursor {
        QueryCursor::new(self, mask)
    }

    /// Iterate handles of entities carrying every type in `mask`.
    pub fn query_iter(&self, mask: ComponentMask) -> QueryIter<'_> {
        QueryIter {
            world: self,
            mask,
            next: 0,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn setup() -> (World, ComponentTypeId, ComponentTypeId) {
        let mut world = World::new();
        let a = world.register::<u32>("a", true).unwrap();
        let b = world.register::<u64>("b", false).unwrap();
        (world, a, b)
    }

    fn collect(world: &World, mask: ComponentMask) -> Vec<EntityRef> {
        let mut out = Vec::new();
        let mut cursor = world.query(mask);
        while cursor.is_valid() {
            out.push(cursor.entity(world).unwrap());
            cursor.advance(world);
        }
        out
    }

    #[test]
    fn empty_world_yields_nothing() {
        let (world, a, _) = setup();
        let cursor = world.query(ComponentMask::from(a));
        assert!(!cursor.is_valid());
        assert_eq!(world.query_iter(ComponentMask::from(a)).count(), 0);
    }

    #[test]
    fn pending_adds_are_invisible_until_update() {
        let (mut world, a, _) = setup();
        world.add(ComponentMask::from(a)).unwrap();
        assert!(collect(&world, ComponentMask::from(a)).is_empty());
        world.update();
        assert_eq!(collect(&world, ComponentMask::from(a)).len(), 1);
    }

    #[test]
    fn matches_supersets_in_ascending_order() {
        let (mut world, a, b) = setup();
        let e0 = world.add(ComponentMask::from(a) | b).unwrap();
        let _e1 = world.add(ComponentMask::from(b)).unwrap();
        let e2 = world.add(ComponentMask::from(a)).unwrap();
        world.update();

        assert_eq!(collect(&world, ComponentMask::from(a)), vec![e0, e2]);
        assert_eq!(collect(&world, ComponentMask::from(a) | b), vec![e0]);
        assert_eq!(
            world.query_iter(ComponentMask::from(a)).collect::<Vec<_>>(),
            vec![e0, e2]
        );
    }

    #[test]
    fn empty_mask_matches_every_active_entity() {
        let (mut world, a, b) = setup();
        world.add(ComponentMask::from(a)).unwrap();
        world.add(ComponentMask::from(b)).unwrap();
        world.update();
        assert_eq!(world.query_iter(ComponentMask::EMPTY).count(), 2);
    }

    #[test]
    fn pending_remove_stays_visible_until_commit() {
        let (mut world, a, _) = setup();
        let e = world.add(ComponentMask::from(a)).unwrap();
        world.update();
        world.remove(e, false).unwrap();
        assert_eq!(collect(&world, ComponentMask::from(a)), vec![e]);
        world.update();
        assert!(collect(&world, ComponentMask::from(a)).is_empty());
    }

    #[test]
    fn cursor_reads_and_writes_components() {
        let (mut world, a, _) = setup();
        let e = world.add(ComponentMask::from(a)).unwrap();
        world.update();

        let mut cursor = world.query(ComponentMask::from(a));
        *cursor.get_mut::<u32>(&mut world, a).unwrap() = 7;
        assert_eq!(cursor.get::<u32>(&world, a), Some(&7));
        assert_eq!(cursor.component(&world, a), Some(&7u32.to_ne_bytes()[..]));
        cursor.component_mut(&mut world, a).unwrap().fill(0);
        assert_eq!(world.get::<u32>(e, a, false), Some(&0));
    }

    #[test]
    fn exhausted_cursor_stays_exhausted() {
        let (mut world, a, _) = setup();
        world.add(ComponentMask::from(a)).unwrap();
        world.update();

        let mut cursor = world.query(ComponentMask::from(a));
        cursor.advance(&world);
        assert!(!cursor.is_valid());
        for _ in 0..3 {
            cursor.advance(&world);
            assert!(!cursor.is_valid());
            assert_eq!(cursor.index(), None);
        }
        assert!(cursor.component(&world, a).is_none());
        assert!(cursor.entity(&world).is_none());
    }

    #[test]
    fn cursor_is_exhausted_after_commit() {
        let (mut world, a, _) = setup();
        world.add(ComponentMask::from(a)).unwrap();
        world.add(ComponentMask::from(a)).unwrap();
        world.update();

        let mut cursor = world.query(ComponentMask::from(a));
        assert!(cursor.is_valid());
        world.update();
        // Staleness is noticed on the next access that sees the world.
        assert!(cursor.is_valid());
        assert!(cursor.get::<u32>(&world, a).is_none());
        assert!(!cursor.is_valid());
        cursor.advance(&world);
        assert!(!cursor.is_valid());
    }
}
