//! Slotworld ECS -- fixed-capacity Entity Component System with bitmask
//! queries and a raw binary save format.
//!
//! Component types are registered up front and get one dense column each,
//! sized for every entity slot. Entities are generational handles into a
//! table of [`MAX_ENTITIES`] slots; adds and removes are staged and become
//! visible only when [`World::update`] commits them. Queries scan the table
//! in slot order for entities whose mask covers the requested types.
//!
//! # Quick Start
//!
//! ```
//! use slotworld_ecs::prelude::*;
//!
//! let mut world = World::new();
//! let health = world.register::<u32>("health", true).unwrap();
//! let speed = world.register::<f32>("speed", false).unwrap();
//!
//! let entity = world.add(ComponentMask::from(health) | speed).unwrap();
//! *world.get_mut::<u32>(entity, health, true).unwrap() = 42;
//! world.update();
//!
//! let fs = MemoryFs::new();
//! world.save(&fs, DEFAULT_SAVE_PATH).unwrap();
//!
//! let mut restored = World::new();
//! let health = restored.register::<u32>("health", true).unwrap();
//! restored.register::<f32>("speed", false).unwrap();
//! restored.load(&fs, DEFAULT_SAVE_PATH).unwrap();
//!
//! let found: Vec<_> = restored.query_iter(ComponentMask::from(health)).collect();
//! assert_eq!(found, vec![entity]);
//! assert_eq!(restored.get::<u32>(entity, health, false), Some(&42));
//! ```

#![deny(unsafe_code)]

pub mod codec;
pub mod component;
pub mod entity;
pub mod mask;
pub mod persist;
pub mod query;
#[allow(unsafe_code)]
pub mod storage;
pub mod world;

pub use world::World;

/// Number of distinct component types a registry can hold.
pub const MAX_COMPONENT_TYPES: usize = 64;

/// Number of entity slots in a world.
pub const MAX_ENTITIES: usize = 512;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors produced by ECS operations.
#[derive(Debug, thiserror::Error)]
pub enum EcsError {
    /// All component type ids are in use.
    #[error("cannot register component '{name}': all {} component types are in use", MAX_COMPONENT_TYPES)]
    RegistryFull { name: String },

    /// The requested size/alignment cannot back a column.
    #[error("component '{name}' has an invalid layout (size {size}, align {align})")]
    InvalidLayout {
        name: String,
        size: usize,
        align: usize,
    },

    /// No `Unused` slot was left.
    #[error("entity table is full ({capacity} slots)")]
    TableFull { capacity: usize },

    /// The handle does not refer to a live entity.
    #[error("entity {entity:?} does not exist (stale or never allocated)")]
    StaleEntity { entity: entity::EntityRef },

    /// A mask named component types that were never registered.
    #[error("mask {mask} names unregistered component types")]
    UnregisteredComponents { mask: mask::ComponentMask },

    /// The generation counter has no values left.
    #[error("entity generation sequence exhausted")]
    SequenceExhausted,

    /// The storage backend failed.
    #[error(transparent)]
    Storage(#[from] slotworld_fs::FsError),

    /// An encoded world does not have the length the registry implies.
    #[error("encoded world is {found} bytes, expected {expected}")]
    LengthMismatch { expected: usize, found: usize },

    /// An encoded slot state is not a known lifecycle state.
    #[error("slot {slot} has invalid state value {value}")]
    InvalidState { slot: usize, value: u32 },

    /// An encoded slot mask names unregistered component types.
    #[error("slot {slot} has mask {mask} with unregistered component types")]
    CorruptMask { slot: usize, mask: mask::ComponentMask },

    /// An encoded generation was never issued by the encoded sequence.
    #[error("slot {slot} has generation {generation} but the sequence is {sequence}")]
    CorruptSequence {
        slot: usize,
        generation: u32,
        sequence: u32,
    },

    /// A saved schema describes a different layout than the registry.
    #[error("saved schema does not match the registry: {details}")]
    SchemaMismatch { details: String },

    /// A schema document could not be read or written.
    #[error("malformed schema document: {details}")]
    SchemaFormat { details: String },
}

// ---------------------------------------------------------------------------
// Prelude
// ---------------------------------------------------------------------------

/// Convenience re-exports for common usage.
pub mod prelude {
    pub use crate::codec::{Schema, SchemaDocument, SchemaEntry};
    pub use crate::component::{ComponentInfo, ComponentRegistry, ComponentTypeId};
    pub use crate::entity::{CommitReport, EntityRef, EntityState, EntityTable};
    pub use crate::mask::ComponentMask;
    pub use crate::persist::{schema_path, DEFAULT_SAVE_PATH};
    pub use crate::query::{QueryCursor, QueryIter};
    pub use crate::world::World;
    pub use crate::{EcsError, MAX_COMPONENT_TYPES, MAX_ENTITIES};
    pub use slotworld_fs::{FileSystem, FsConfig, FsError, MemoryFs, Storage};
}

// ---------------------------------------------------------------------------
// Integration Tests
// ---------------------------------------------------------------------------
