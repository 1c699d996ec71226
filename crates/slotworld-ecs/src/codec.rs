//! Binary save format and its schema descriptor.
//!
//! The encoded world is a flat, header-less byte stream in native byte
//! order:
//!
//! ```text
//! sequence                         u32
//! generation[MAX_ENTITIES]         u32 each
//! state[MAX_ENTITIES]              u32 each
//! mask[MAX_ENTITIES]               u64 each
//! column[id] for each persisted    MAX_ENTITIES * stride bytes each,
//!   type, in ascending id order
//! ```
//!
//! Nothing in the stream describes the registry that produced it, so a
//! buffer can only be decoded by a world that registered the same types in
//! the same order. [`Schema`] captures that layout separately; see
//! [`World::save_with_schema`](crate::World::save_with_schema).
//!
//! Decoding validates the whole buffer before it touches the world. Loaded
//! column bytes are copied into the world's own columns; columns of types
//! registered with `persist == false` keep their current contents.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::component::ComponentTypeId;
use crate::entity::EntityState;
use crate::mask::ComponentMask;
use crate::world::World;
use crate::{EcsError, MAX_ENTITIES};

/// Bytes of the global sequence field.
pub const SEQUENCE_BYTES: usize = 4;
/// Bytes of one slot generation.
pub const GENERATION_BYTES: usize = 4;
/// Bytes of one slot state.
pub const STATE_BYTES: usize = 4;
/// Bytes of one slot mask.
pub const MASK_BYTES: usize = 8;
/// Bytes of the per-slot fields of one slot.
pub const SLOT_BYTES: usize = GENERATION_BYTES + STATE_BYTES + MASK_BYTES;
/// Bytes of the entity table section (everything before the columns).
pub const TABLE_BYTES: usize = SEQUENCE_BYTES + MAX_ENTITIES * SLOT_BYTES;

// ---------------------------------------------------------------------------
// Schema
// ---------------------------------------------------------------------------

/// Layout of one registered component type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaEntry {
    pub id: u8,
    pub name: String,
    pub stride: usize,
    pub persist: bool,
}

/// Everything a reader needs to know to decode an encoded world.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schema {
    /// Number of entity slots.
    pub capacity: usize,
    /// Registered types in ascending id order.
    pub components: Vec<SchemaEntry>,
}

impl Schema {
    /// Exact length of a buffer encoded under this schema.
    pub fn encoded_len(&self) -> usize {
        let columns: usize = self
            .components
            .iter()
            .filter(|entry| entry.persist)
            .map(|entry| entry.stride * self.capacity)
            .sum();
        SEQUENCE_BYTES + self.capacity * SLOT_BYTES + columns
    }

    /// BLAKE3 hex digest of the layout-relevant fields.
    ///
    /// Component names are left out: renaming a type does not change how
    /// its bytes are laid out.
    pub fn fingerprint(&self) -> String {
        let mut hasher = blake3::Hasher::new();
        hasher.update(&(self.capacity as u64).to_le_bytes());
        hasher.update(&(self.components.len() as u64).to_le_bytes());
        for entry in &self.components {
            hasher.update(&[entry.id, u8::from(entry.persist)]);
            hasher.update(&(entry.stride as u64).to_le_bytes());
        }
        hasher.finalize().to_hex().to_string()
    }

    /// Fail with [`EcsError::SchemaMismatch`] unless a buffer written under
    /// `stored` can be decoded under `self`.
    pub fn check_compatible(&self, stored: &Schema) -> Result<(), EcsError> {
        let expected = self.fingerprint();
        let found = stored.fingerprint();
        if expected == found {
            return Ok(());
        }
        let details = self.first_difference(stored);
        warn!(%expected, %found, %details, "saved schema does not match the registry");
        Err(EcsError::SchemaMismatch { details })
    }

    fn first_difference(&self, stored: &Schema) -> String {
        if self.capacity != stored.capacity {
            return format!(
                "capacity is {} but the save has {}",
                self.capacity, stored.capacity
            );
        }
        for (ours, theirs) in self.components.iter().zip(&stored.components) {
            if (ours.id, ours.stride, ours.persist) != (theirs.id, theirs.stride, theirs.persist) {
                return format!(
                    "component {} ('{}') is stride {} persist {}, the save has '{}' stride {} persist {}",
                    ours.id,
                    ours.name,
                    ours.stride,
                    ours.persist,
                    theirs.name,
                    theirs.stride,
                    theirs.persist
                );
            }
        }
        format!(
            "{} component types registered but the save has {}",
            self.components.len(),
            stored.components.len()
        )
    }
}

/// JSON sidecar written next to a save: the schema plus its fingerprint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaDocument {
    pub fingerprint: String,
    pub schema: Schema,
}

impl SchemaDocument {
    /// Wrap `schema` with its freshly computed fingerprint.
    pub fn new(schema: Schema) -> Self {
        Self {
            fingerprint: schema.fingerprint(),
            schema,
        }
    }

    /// Pretty-printed JSON.
    pub fn to_json(&self) -> Result<String, EcsError> {
        serde_json::to_string_pretty(self).map_err(|e| EcsError::SchemaFormat {
            details: e.to_string(),
        })
    }

    /// Parse a document and verify that its recorded fingerprint matches
    /// the schema it carries.
    pub fn from_json(json: &str) -> Result<Self, EcsError> {
        let document: SchemaDocument =
            serde_json::from_str(json).map_err(|e| EcsError::SchemaFormat {
                details: e.to_string(),
            })?;
        let actual = document.schema.fingerprint();
        if actual != document.fingerprint {
            return Err(EcsError::SchemaFormat {
                details: format!(
                    "recorded fingerprint {} does not match contents ({actual})",
                    document.fingerprint
                ),
            });
        }
        Ok(document)
    }
}

// ---------------------------------------------------------------------------
// Reader
// ---------------------------------------------------------------------------

/// Forward-only view over a buffer whose total length is already checked.
struct Reader<'a> {
    bytes: &'a [u8],
}

impl<'a> Reader<'a> {
    fn take(&mut self, len: usize) -> &'a [u8] {
        let (head, tail) = self.bytes.split_at(len.min(self.bytes.len()));
        self.bytes = tail;
        head
    }

    fn array<const N: usize>(&mut self) -> [u8; N] {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N));
        out
    }

    fn u32(&mut self) -> u32 {
        u32::from_ne_bytes(self.array())
    }

    fn u64(&mut self) -> u64 {
        u64::from_ne_bytes(self.array())
    }
}

// ---------------------------------------------------------------------------
// World encode / decode
// ---------------------------------------------------------------------------

impl World {
    /// Describe the current registry.
    pub fn schema(&self) -> Schema {
        Schema {
            capacity: self.table.capacity(),
            components: self
                .registry
                .iter()
                .map(|info| SchemaEntry {
                    id: info.id.index(),
                    name: info.name.clone(),
                    stride: info.stride,
                    persist: info.persist,
                })
                .collect(),
        }
    }

    /// Length of the buffer [`encode`](Self::encode) produces.
    pub fn encoded_len(&self) -> usize {
        let columns: usize = self
            .registry
            .iter()
            .filter(|info| info.persist)
            .map(|info| info.stride * MAX_ENTITIES)
            .sum();
        TABLE_BYTES + columns
    }

    /// Serialize the table and every persisted column.
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.encoded_len());
        out.extend_from_slice(&self.table.sequence().to_ne_bytes());
        for generation in self.table.generations() {
            out.extend_from_slice(&generation.to_ne_bytes());
        }
        for state in self.table.states() {
            out.extend_from_slice(&state.to_raw().to_ne_bytes());
        }
        for mask in self.table.masks() {
            out.extend_from_slice(&mask.bits().to_ne_bytes());
        }
        for info in self.registry.iter().filter(|info| info.persist) {
            if let Some(column) = self.registry.column(info.id) {
                out.extend_from_slice(column.as_bytes());
            }
        }
        out
    }

    /// Replace the table and persisted columns with the contents of `bytes`.
    ///
    /// The whole buffer is validated first; on error the world is left
    /// exactly as it was.
    pub fn decode_into(&mut self, bytes: &[u8]) -> Result<(), EcsError> {
        let expected = self.encoded_len();
        if bytes.len() != expected {
            warn!(expected, found = bytes.len(), "encoded world has the wrong length");
            return Err(EcsError::LengthMismatch {
                expected,
                found: bytes.len(),
            });
        }

        let mut reader = Reader { bytes };
        let sequence = reader.u32();

        let generations: Vec<u32> = (0..MAX_ENTITIES).map(|_| reader.u32()).collect();
        if let Some((slot, &generation)) = generations
            .iter()
            .enumerate()
            .find(|&(_, &g)| sequence == 0 || g >= sequence)
        {
            warn!(slot, generation, sequence, "encoded generation is not below the sequence");
            return Err(EcsError::CorruptSequence {
                slot,
                generation,
                sequence,
            });
        }

        let mut states = Vec::with_capacity(MAX_ENTITIES);
        for slot in 0..MAX_ENTITIES {
            let raw = reader.u32();
            let Some(state) = EntityState::from_raw(raw) else {
                warn!(slot, value = raw, "encoded entity state is out of range");
                return Err(EcsError::InvalidState { slot, value: raw });
            };
            states.push(state);
        }

        let registered = self.registry.registered_mask();
        let mut masks = Vec::with_capacity(MAX_ENTITIES);
        for slot in 0..MAX_ENTITIES {
            let mask = ComponentMask::from_bits(reader.u64());
            let unknown = mask.difference(registered);
            if !unknown.is_empty() {
                warn!(slot, %mask, %unknown, "encoded mask names unregistered component types");
                return Err(EcsError::CorruptMask { slot, mask });
            }
            masks.push(mask);
        }

        let columns: Vec<(ComponentTypeId, &[u8])> = self
            .registry
            .iter()
            .filter(|info| info.persist)
            .map(|info| (info.id, reader.take(info.stride * MAX_ENTITIES)))
            .collect();

        // Validated; commit.
        self.table.restore(sequence, generations, states, masks);
        for (id, data) in columns {
            if let Some(column) = self.registry.column_mut(id) {
                let copied = column.copy_from(data);
                debug_assert!(copied, "column length was validated");
            }
        }
        debug!(
            bytes = bytes.len(),
            sequence,
            active = self.active_count(),
            "decoded world"
        );
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
