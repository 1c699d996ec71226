//! Component type registration and metadata.
//!
//! Every component type must be registered in the [`ComponentRegistry`]
//! before entities can carry it. Registration produces a [`ComponentTypeId`]
//! in `[0, MAX_COMPONENT_TYPES)` and allocates the type's dense
//! [`Column`], which the registry owns for the lifetime of the world.
//! The registry is append-only.

use std::any::TypeId;
use std::collections::HashMap;
use std::fmt;

use tracing::{debug, warn};

use crate::mask::ComponentMask;
use crate::storage::Column;
use crate::{EcsError, MAX_COMPONENT_TYPES, MAX_ENTITIES};

// ---------------------------------------------------------------------------
// ComponentTypeId
// ---------------------------------------------------------------------------

/// Small integer identifier for a registered component type.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ComponentTypeId(pub(crate) u8);

impl ComponentTypeId {
    /// Build an id from an index, if it is below [`MAX_COMPONENT_TYPES`].
    #[inline]
    pub const fn from_index(index: usize) -> Option<Self> {
        if index < MAX_COMPONENT_TYPES {
            Some(Self(index as u8))
        } else {
            None
        }
    }

    /// The numeric id.
    #[inline]
    pub const fn index(self) -> u8 {
        self.0
    }

    /// This id's bit in a [`ComponentMask`].
    #[inline]
    pub(crate) const fn bit(self) -> u64 {
        1u64 << self.0
    }
}

impl fmt::Debug for ComponentTypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ComponentTypeId({})", self.0)
    }
}

// ---------------------------------------------------------------------------
// ComponentInfo
// ---------------------------------------------------------------------------

/// Metadata about a registered component type. Immutable after registration.
#[derive(Debug, Clone)]
pub struct ComponentInfo {
    /// Id assigned at registration time.
    pub id: ComponentTypeId,
    /// Human-readable name (supplied by the caller).
    pub name: String,
    /// Element size rounded up to `align`.
    pub stride: usize,
    /// Element alignment.
    pub align: usize,
    /// Whether the codec writes this type's column.
    pub persist: bool,
    /// Rust type recorded by [`ComponentRegistry::register`]; `None` for raw
    /// registrations.
    pub type_id: Option<TypeId>,
}

// ---------------------------------------------------------------------------
// ComponentRegistry
// ---------------------------------------------------------------------------

/// Registry of component types and owner of their dense columns.
#[derive(Debug, Default)]
pub struct ComponentRegistry {
    /// Indexed by `ComponentTypeId.0`.
    infos: Vec<ComponentInfo>,
    /// Indexed by `ComponentTypeId.0`, parallel to `infos`.
    columns: Vec<Column>,
    /// First id registered under each name.
    by_name: HashMap<String, ComponentTypeId>,
}

impl ComponentRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a component type from its raw layout.
    ///
    /// `element_size` is rounded up to `alignment`, which must be a non-zero
    /// power of two. Fails with [`EcsError::RegistryFull`] once all
    /// [`MAX_COMPONENT_TYPES`] ids are taken; no id is assigned then.
    pub fn register_raw(
        &mut self,
        name: &str,
        element_size: usize,
        alignment: usize,
        persist: bool,
    ) -> Result<ComponentTypeId, EcsError> {
        self.register_inner(name, element_size, alignment, persist, None)
    }

    /// Register a plain-old-data Rust type. Its size and alignment are taken
    /// from the type, and typed accessors check against it.
    pub fn register<T: bytemuck::Pod>(
        &mut self,
        name: &str,
        persist: bool,
    ) -> Result<ComponentTypeId, EcsError> {
        self.register_inner(
            name,
            std::mem::size_of::<T>(),
            std::mem::align_of::<T>(),
            persist,
            Some(TypeId::of::<T>()),
        )
    }

    fn register_inner(
        &mut self,
        name: &str,
        element_size: usize,
        alignment: usize,
        persist: bool,
        type_id: Option<TypeId>,
    ) -> Result<ComponentTypeId, EcsError> {
        let Some(id) = ComponentTypeId::from_index(self.infos.len()) else {
            warn!(component = name, max = MAX_COMPONENT_TYPES, "out of component types");
            return Err(EcsError::RegistryFull {
                name: name.to_owned(),
            });
        };

        let invalid = || EcsError::InvalidLayout {
            name: name.to_owned(),
            size: element_size,
            align: alignment,
        };
        if alignment == 0 || !alignment.is_power_of_two() {
            return Err(invalid());
        }
        let stride = element_size
            .checked_add(alignment - 1)
            .ok_or_else(invalid)?
            & !(alignment - 1);
        let column = Column::zeroed(stride, alignment, MAX_ENTITIES).ok_or_else(invalid)?;

        self.infos.push(ComponentInfo {
            id,
            name: name.to_owned(),
            stride,
            align: alignment,
            persist,
            type_id,
        });
        self.columns.push(column);
        self.by_name.entry(name.to_owned()).or_insert(id);

        debug!(component = name, id = id.0, stride, persist, "registered component type");
        Ok(id)
    }

    /// Aligned element size of a registered type.
    pub fn get_size(&self, id: ComponentTypeId) -> Option<usize> {
        self.get_info(id).map(|info| info.stride)
    }

    /// Metadata of a registered type.
    pub fn get_info(&self, id: ComponentTypeId) -> Option<&ComponentInfo> {
        self.infos.get(id.0 as usize)
    }

    /// Look up a component type by its registered name.
    pub fn lookup_by_name(&self, name: &str) -> Option<ComponentTypeId> {
        self.by_name.get(name).copied()
    }

    /// Registered types in ascending id order.
    pub fn iter(&self) -> impl Iterator<Item = &ComponentInfo> {
        self.infos.iter()
    }

    /// Mask with a bit set for every registered type.
    pub fn registered_mask(&self) -> ComponentMask {
        self.infos.iter().map(|info| info.id).collect()
    }

    /// Total number of registered component types.
    pub fn len(&self) -> usize {
        self.infos.len()
    }

    /// Whether any component types have been registered.
    pub fn is_empty(&self) -> bool {
        self.infos.is_empty()
    }

    pub(crate) fn column(&self, id: ComponentTypeId) -> Option<&Column> {
        self.columns.get(id.0 as usize)
    }

    pub(crate) fn column_mut(&mut self, id: ComponentTypeId) -> Option<&mut Column> {
        self.columns.get_mut(id.0 as usize)
    }

    /// Zero slot `index` in every column.
    pub(crate) fn zero_slot(&mut self, index: usize) {
        for column in &mut self.columns {
            column.zero_element(index);
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
