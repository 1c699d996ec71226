//! Saving and loading a [`World`] through a [`Storage`] backend.
//!
//! Every call issues its requests and blocks until they complete. A failed
//! read never touches the world, and saving never mutates it.

use slotworld_fs::Storage;
use tracing::{debug, warn};

use crate::codec::SchemaDocument;
use crate::world::World;
use crate::EcsError;

/// Path used when the caller has no better name for the save.
pub const DEFAULT_SAVE_PATH: &str = "savegame";

/// Path of the schema sidecar written next to `path`.
pub fn schema_path(path: &str) -> String {
    format!("{path}.schema.json")
}

impl World {
    /// Encode the world and write it to `path`.
    pub fn save<S: Storage + ?Sized>(&self, storage: &S, path: &str) -> Result<(), EcsError> {
        let bytes = self.encode();
        let len = bytes.len();
        let completion = storage.write(path, bytes).into_outcome().map_err(|e| {
            warn!(path, error = %e, "failed to write save");
            e
        })?;
        debug!(path, bytes = len, written = completion.size, "saved world");
        Ok(())
    }

    /// Read `path` and decode it into the world.
    ///
    /// Fails without modifying anything if the read fails or the contents do
    /// not decode under the current registry.
    pub fn load<S: Storage + ?Sized>(&mut self, storage: &S, path: &str) -> Result<(), EcsError> {
        let bytes = storage.read(path).into_buffer().map_err(|e| {
            warn!(path, error = %e, "failed to read save");
            e
        })?;
        self.decode_into(&bytes)?;
        debug!(path, bytes = bytes.len(), "loaded world");
        Ok(())
    }

    /// Write the registry's schema to [`schema_path`]`(path)`, then
    /// [`save`](Self::save).
    ///
    /// The two files are not replaced atomically. A failed schema write
    /// leaves the previous pair untouched; a failed save after it leaves the
    /// new schema next to the previous save.
    pub fn save_with_schema<S: Storage + ?Sized>(
        &self,
        storage: &S,
        path: &str,
    ) -> Result<(), EcsError> {
        let json = SchemaDocument::new(self.schema()).to_json()?;
        let sidecar = schema_path(path);
        storage
            .write(&sidecar, json.into_bytes())
            .into_outcome()
            .map_err(|e| {
                warn!(path = %sidecar, error = %e, "failed to write schema");
                e
            })?;
        self.save(storage, path)
    }

    /// Check the schema sidecar against the current registry, then
    /// [`load`](Self::load).
    ///
    /// A missing or malformed sidecar, or one that describes a different
    /// layout, fails before the save itself is read.
    pub fn load_checked<S: Storage + ?Sized>(
        &mut self,
        storage: &S,
        path: &str,
    ) -> Result<(), EcsError> {
        let sidecar = schema_path(path);
        let bytes = storage.read(&sidecar).into_buffer()?;
        let json = String::from_utf8(bytes).map_err(|e| EcsError::SchemaFormat {
            details: e.to_string(),
        })?;
        let document = SchemaDocument::from_json(&json)?;
        self.schema().check_compatible(&document.schema)?;
        self.load(storage, path)
    }
}
