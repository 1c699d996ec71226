//! Entity handles and the fixed-capacity slot table.
//!
//! An [`EntityRef`] is a plain `(index, generation)` value. Every successful
//! [`EntityTable::add`] consumes the next value of a table-wide sequence as
//! the slot's generation, so a generation is never handed out twice even
//! when a slot is recycled. A ref is stale as soon as its slot's generation
//! differs from the ref's.
//!
//! Slots move through a two-phase lifecycle:
//!
//! ```text
//! Unused --add--> PendingAdd --update--> Active --remove--> PendingRemove --update--> Unused
//! ```
//!
//! `add` and `remove` only ever request a transition; [`EntityTable::update`]
//! is the single place where pending slots become visible or disappear.

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::mask::ComponentMask;
use crate::{EcsError, MAX_ENTITIES};

// ---------------------------------------------------------------------------
// EntityRef
// ---------------------------------------------------------------------------

/// A generational handle to an entity slot.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntityRef {
    index: u32,
    generation: u32,
}

impl EntityRef {
    /// Sentinel handle that is never valid.
    pub const INVALID: EntityRef = EntityRef {
        index: u32::MAX,
        generation: 0,
    };

    /// Construct a handle from its parts.
    #[inline]
    pub const fn new(index: u32, generation: u32) -> Self {
        Self { index, generation }
    }

    /// Slot index.
    #[inline]
    pub const fn index(self) -> u32 {
        self.index
    }

    /// Generation the slot had when this handle was issued.
    #[inline]
    pub const fn generation(self) -> u32 {
        self.generation
    }
}

impl Default for EntityRef {
    fn default() -> Self {
        Self::INVALID
    }
}

impl fmt::Debug for EntityRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EntityRef({}v{})", self.index, self.generation)
    }
}

impl fmt::Display for EntityRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}v{}", self.index, self.generation)
    }
}

// ---------------------------------------------------------------------------
// EntityState
// ---------------------------------------------------------------------------

/// Lifecycle state of a slot. Ordered: validity checks compare with `>=`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u32)]
pub enum EntityState {
    /// Free for `add`.
    #[default]
    Unused = 0,
    /// Added this tick, visible after the next `update`.
    PendingAdd = 1,
    /// Visible to queries.
    Active = 2,
    /// Removed this tick, freed by the next `update`.
    PendingRemove = 3,
}

impl EntityState {
    /// Decode the `u32` representation written by the codec.
    pub const fn from_raw(raw: u32) -> Option<Self> {
        match raw {
            0 => Some(Self::Unused),
            1 => Some(Self::PendingAdd),
            2 => Some(Self::Active),
            3 => Some(Self::PendingRemove),
            _ => None,
        }
    }

    /// The `u32` representation written by the codec.
    #[inline]
    pub const fn to_raw(self) -> u32 {
        self as u32
    }

    /// Lowest state a valid handle may point at.
    #[inline]
    const fn floor(allow_pending_add: bool) -> Self {
        if allow_pending_add {
            Self::PendingAdd
        } else {
            Self::Active
        }
    }
}

// ---------------------------------------------------------------------------
// CommitReport
// ---------------------------------------------------------------------------

/// What a single [`EntityTable::update`] changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CommitReport {
    /// Slots promoted from `PendingAdd` to `Active`.
    pub activated: usize,
    /// Slots retired from `PendingRemove` to `Unused`.
    pub retired: usize,
}

// ---------------------------------------------------------------------------
// EntityTable
// ---------------------------------------------------------------------------

/// Fixed array of [`MAX_ENTITIES`] slots: generation, state, and mask each.
#[derive(Debug, Clone)]
pub struct EntityTable {
    /// Next generation to hand out. Starts at 1.
    sequence: u32,
    generations: Vec<u32>,
    states: Vec<EntityState>,
    masks: Vec<ComponentMask>,
    /// Bumped by every commit and restore; query cursors compare against it.
    epoch: u64,
}

impl EntityTable {
    /// Create a table with every slot `Unused`.
    pub fn new() -> Self {
        Self {
            sequence: 1,
            generations: vec![0; MAX_ENTITIES],
            states: vec![EntityState::Unused; MAX_ENTITIES],
            masks: vec![ComponentMask::EMPTY; MAX_ENTITIES],
            epoch: 0,
        }
    }

    /// Number of slots.
    #[inline]
    pub fn capacity(&self) -> usize {
        MAX_ENTITIES
    }

    /// The generation the next `add` will hand out.
    #[inline]
    pub fn sequence(&self) -> u32 {
        self.sequence
    }

    /// Commit epoch.
    #[inline]
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Claim the first `Unused` slot as `PendingAdd` with `mask`.
    pub fn add(&mut self, mask: ComponentMask) -> Result<EntityRef, EcsError> {
        let Some(index) = self.states.iter().position(|&s| s == EntityState::Unused) else {
            warn!(capacity = MAX_ENTITIES, "out of entities");
            return Err(EcsError::TableFull {
                capacity: MAX_ENTITIES,
            });
        };
        let generation = self.sequence;
        let Some(next) = generation.checked_add(1) else {
            warn!("entity sequence exhausted");
            return Err(EcsError::SequenceExhausted);
        };
        self.sequence = next;

        self.generations[index] = generation;
        self.states[index] = EntityState::PendingAdd;
        self.masks[index] = mask;
        Ok(EntityRef::new(index as u32, generation))
    }

    /// Request removal of `entity`; takes effect at the next `update`.
    pub fn remove(&mut self, entity: EntityRef, allow_pending_add: bool) -> Result<(), EcsError> {
        if !self.is_valid(entity, allow_pending_add) {
            warn!(%entity, "attempting to remove inactive entity");
            return Err(EcsError::StaleEntity { entity });
        }
        self.states[entity.index as usize] = EntityState::PendingRemove;
        Ok(())
    }

    /// Commit all pending transitions in one forward pass.
    ///
    /// Retired slots get their mask cleared.
    pub fn update(&mut self) -> CommitReport {
        let mut report = CommitReport::default();
        for (state, mask) in self.states.iter_mut().zip(self.masks.iter_mut()) {
            match *state {
                EntityState::PendingAdd => {
                    *state = EntityState::Active;
                    report.activated += 1;
                }
                EntityState::PendingRemove => {
                    *state = EntityState::Unused;
                    *mask = ComponentMask::EMPTY;
                    report.retired += 1;
                }
                EntityState::Unused | EntityState::Active => {}
            }
        }
        self.epoch += 1;
        if report != CommitReport::default() {
            debug!(activated = report.activated, retired = report.retired, "committed entity changes");
        }
        report
    }

    /// Whether `entity` refers to the current occupant of its slot and that
    /// occupant is `Active` or later (or `PendingAdd` or later when
    /// `allow_pending_add`).
    pub fn is_valid(&self, entity: EntityRef, allow_pending_add: bool) -> bool {
        let index = entity.index as usize;
        index < MAX_ENTITIES
            && self.generations[index] == entity.generation
            && self.states[index] >= EntityState::floor(allow_pending_add)
    }

    /// State of slot `index`.
    pub fn state(&self, index: usize) -> Option<EntityState> {
        self.states.get(index).copied()
    }

    /// Generation of slot `index`.
    pub fn generation(&self, index: usize) -> Option<u32> {
        self.generations.get(index).copied()
    }

    /// Mask of the entity behind a valid handle.
    pub fn mask(&self, entity: EntityRef, allow_pending_add: bool) -> Option<ComponentMask> {
        self.is_valid(entity, allow_pending_add)
            .then(|| self.masks[entity.index as usize])
    }

    /// Handle for the current occupant of slot `index`, regardless of state.
    pub fn entity_at(&self, index: usize) -> Option<EntityRef> {
        self.generation(index)
            .map(|generation| EntityRef::new(index as u32, generation))
    }

    /// Number of slots in `state`.
    pub fn count(&self, state: EntityState) -> usize {
        self.states.iter().filter(|&&s| s == state).count()
    }

    /// First slot at or after `from` whose mask covers `mask` and whose state
    /// is `Active` or later.
    pub fn next_match(&self, from: usize, mask: ComponentMask) -> Option<usize> {
        (from..MAX_ENTITIES).find(|&i| {
            self.masks[i].contains_all(mask) && self.states[i] >= EntityState::Active
        })
    }

    pub(crate) fn generations(&self) -> &[u32] {
        &self.generations
    }

    pub(crate) fn states(&self) -> &[EntityState] {
        &self.states
    }

    pub(crate) fn masks(&self) -> &[ComponentMask] {
        &self.masks
    }

    /// Replace the whole table with decoded contents.
    ///
    /// Callers have already validated lengths and values.
    pub(crate) fn restore(
        &mut self,
        sequence: u32,
        generations: Vec<u32>,
        states: Vec<EntityState>,
        masks: Vec<ComponentMask>,
    ) {
        debug_assert_eq!(generations.len(), MAX_ENTITIES);
        debug_assert_eq!(states.len(), MAX_ENTITIES);
        debug_assert_eq!(masks.len(), MAX_ENTITIES);
        self.sequence = sequence;
        self.generations = generations;
        self.states = states;
        self.masks = masks;
        self.epoch += 1;
    }
}

impl Default for EntityTable {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
