//! Integration tests for saving and loading a World through storage backends.

use std::path::PathBuf;

use bytemuck_derive::{Pod, Zeroable};
use slotworld_ecs::prelude::*;

// -- test component types ---------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
#[repr(C)]
struct Position {
    x: f32,
    y: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
#[repr(C)]
struct Health(u32);

#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
#[repr(C)]
struct Scratch(u64);

struct Ids {
    position: ComponentTypeId,
    health: ComponentTypeId,
    scratch: ComponentTypeId,
}

fn setup_world() -> (World, Ids) {
    let mut world = World::new();
    let ids = Ids {
        position: world.register::<Position>("position", true).unwrap(),
        health: world.register::<Health>("health", true).unwrap(),
        scratch: world.register::<Scratch>("scratch", false).unwrap(),
    };
    (world, ids)
}

// -- helpers ----------------------------------------------------------------

fn temp_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("slotworld-ecs-{}-{name}", std::process::id()));
    let _ = std::fs::remove_dir_all(&dir);
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

fn populated_world() -> (World, Ids, Vec<EntityRef>) {
    let (mut world, ids) = setup_world();
    let mut entities = Vec::new();
    for i in 0..10u32 {
        let mut mask = ComponentMask::from(ids.position);
        if i % 2 == 0 {
            mask |= ids.health;
        }
        let e = world.add(mask | ids.scratch).unwrap();
        *world.get_mut::<Position>(e, ids.position, true).unwrap() = Position {
            x: i as f32,
            y: -(i as f32),
        };
        if i % 2 == 0 {
            *world.get_mut::<Health>(e, ids.health, true).unwrap() = Health(100 + i);
        }
        *world.get_mut::<Scratch>(e, ids.scratch, true).unwrap() = Scratch(u64::MAX);
        entities.push(e);
    }
    world.update();
    (world, ids, entities)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[test]
fn persisted_component_survives_and_transient_does_not() {
    let mut world = World::new();
    let a = world.register_raw("a", 4, 4, true).unwrap();
    let b = world.register_raw("b", 8, 8, false).unwrap();
    let e = world.add(ComponentMask::from(a) | b).unwrap();
    world
        .get_component_mut(e, a, true)
        .unwrap()
        .copy_from_slice(&42u32.to_ne_bytes());
    world.update();

    let fs = MemoryFs::new();
    world.save(&fs, DEFAULT_SAVE_PATH).unwrap();

    let mut fresh = World::new();
    let a = fresh.register_raw("a", 4, 4, true).unwrap();
    fresh.register_raw("b", 8, 8, false).unwrap();
    fresh.load(&fs, DEFAULT_SAVE_PATH).unwrap();

    let mut cursor = fresh.query(ComponentMask::from(a));
    assert!(cursor.is_valid());
    assert_eq!(cursor.component(&fresh, a), Some(&42u32.to_ne_bytes()[..]));
    assert_eq!(cursor.entity(&fresh), Some(e));
    cursor.advance(&fresh);
    assert!(!cursor.is_valid());
}

#[test]
fn round_trip_reproduces_every_slot() {
    let (mut world, ids, entities) = populated_world();
    world.remove(entities[3], false).unwrap();
    let pending = world.add(ComponentMask::from(ids.health)).unwrap();

    let fs = MemoryFs::new();
    world.save(&fs, "slot").unwrap();
    let (mut restored, restored_ids) = setup_world();
    restored.load(&fs, "slot").unwrap();

    assert_eq!(restored.sequence(), world.sequence());
    for index in 0..MAX_ENTITIES {
        assert_eq!(restored.state(index), world.state(index));
        assert_eq!(restored.table().entity_at(index), world.table().entity_at(index));
    }
    for &e in &entities {
        assert_eq!(
            restored.entity_mask(e, false),
            world.entity_mask(e, false)
        );
        assert_eq!(
            restored.get::<Position>(e, restored_ids.position, false),
            world.get::<Position>(e, ids.position, false)
        );
        // Not persisted.
        assert_eq!(
            restored.get::<Scratch>(e, restored_ids.scratch, false),
            Some(&Scratch(0))
        );
    }
    assert!(restored.is_valid(pending, true));
    assert!(!restored.is_valid(pending, false));
}

#[test]
fn loaded_pending_changes_commit_normally() {
    let (mut world, ids, entities) = populated_world();
    world.remove(entities[0], false).unwrap();
    let added = world.add(ComponentMask::from(ids.position)).unwrap();

    let fs = MemoryFs::new();
    world.save(&fs, "slot").unwrap();
    let (mut restored, restored_ids) = setup_world();
    restored.load(&fs, "slot").unwrap();

    let report = restored.update();
    assert_eq!(report, CommitReport { activated: 1, retired: 1 });
    assert!(!restored.is_valid(entities[0], true));
    assert!(restored.is_valid(added, false));
    assert_eq!(
        restored.query_iter(ComponentMask::from(restored_ids.position)).count(),
        10
    );
}

#[test]
fn failed_read_leaves_world_untouched() {
    let (mut world, ids, entities) = populated_world();
    let before = world.encode();
    let epoch = world.epoch();

    let fs = MemoryFs::new();
    assert!(matches!(
        world.load(&fs, "does-not-exist"),
        Err(EcsError::Storage(FsError::NotFound { .. }))
    ));
    assert_eq!(world.encode(), before);
    assert_eq!(world.epoch(), epoch);
    assert_eq!(
        world.get::<Scratch>(entities[0], ids.scratch, false),
        Some(&Scratch(u64::MAX))
    );
}

#[test]
fn truncated_and_corrupt_saves_are_rejected_without_mutation() {
    let (world, _, _) = populated_world();
    let bytes = world.encode();
    let fs = MemoryFs::new();
    fs.insert("short", bytes[..bytes.len() - 1].to_vec());

    let mut corrupt = bytes.clone();
    let states = 4 + MAX_ENTITIES * 4;
    corrupt[states..states + 4].copy_from_slice(&9u32.to_ne_bytes());
    fs.insert("corrupt", corrupt);

    let (mut target, ids) = setup_world();
    let marker = target.add(ComponentMask::from(ids.health)).unwrap();
    let before = target.encode();

    assert!(matches!(
        target.load(&fs, "short"),
        Err(EcsError::LengthMismatch { .. })
    ));
    assert!(matches!(
        target.load(&fs, "corrupt"),
        Err(EcsError::InvalidState { slot: 0, value: 9 })
    ));
    assert_eq!(target.encode(), before);
    assert!(target.is_valid(marker, true));
}

#[test]
fn load_checked_rejects_different_layout() {
    let (world, _, _) = populated_world();
    let fs = MemoryFs::new();
    world.save_with_schema(&fs, "slot").unwrap();

    let mut reordered = World::new();
    reordered.register::<Health>("health", true).unwrap();
    reordered.register::<Position>("position", true).unwrap();
    reordered.register::<Scratch>("scratch", false).unwrap();

    assert!(matches!(
        reordered.load_checked(&fs, "slot"),
        Err(EcsError::SchemaMismatch { .. })
    ));
    assert_eq!(reordered.sequence(), 1);

    let (mut same, _) = setup_world();
    same.load_checked(&fs, "slot").unwrap();
    assert_eq!(same.encode(), world.encode());
}

#[test]
fn tampered_sidecar_is_rejected() {
    let (world, _, _) = populated_world();
    let fs = MemoryFs::new();
    world.save_with_schema(&fs, "slot").unwrap();

    let sidecar = schema_path("slot");
    let json = String::from_utf8(fs.get(&sidecar).unwrap()).unwrap();
    let tampered = json.replace("\"persist\": false", "\"persist\": true");
    assert_ne!(tampered, json);
    fs.insert(&sidecar, tampered.into_bytes());

    let (mut target, _) = setup_world();
    assert!(matches!(
        target.load_checked(&fs, "slot"),
        Err(EcsError::SchemaFormat { .. })
    ));
}

#[test]
fn file_system_round_trip() {
    let dir = temp_dir("round-trip");
    let fs = FileSystem::new(FsConfig {
        root: dir.clone(),
        ..FsConfig::default()
    })
    .unwrap();

    let (world, ids, entities) = populated_world();
    world.save_with_schema(&fs, DEFAULT_SAVE_PATH).unwrap();
    assert!(dir.join(DEFAULT_SAVE_PATH).exists());
    assert!(dir.join(schema_path(DEFAULT_SAVE_PATH)).exists());
    assert_eq!(
        std::fs::read(dir.join(DEFAULT_SAVE_PATH)).unwrap().len(),
        world.encoded_len()
    );

    let (mut restored, restored_ids) = setup_world();
    restored.load_checked(&fs, DEFAULT_SAVE_PATH).unwrap();
    assert_eq!(
        restored.get::<Health>(entities[4], restored_ids.health, false),
        world.get::<Health>(entities[4], ids.health, false)
    );

    drop(fs);
    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn save_outside_storage_root_is_refused() {
    let dir = temp_dir("escape");
    let fs = FileSystem::new(FsConfig {
        root: dir.join("saves"),
        ..FsConfig::default()
    })
    .unwrap();
    std::fs::create_dir_all(dir.join("saves")).unwrap();

    let (mut world, _, _) = populated_world();
    assert!(matches!(
        world.save(&fs, "../escaped"),
        Err(EcsError::Storage(FsError::InvalidPath { .. }))
    ));
    assert!(!dir.join("escaped").exists());

    let before = world.encode();
    let absolute = dir.join("absolute");
    assert!(matches!(
        world.load(&fs, absolute.to_str().unwrap()),
        Err(EcsError::Storage(FsError::InvalidPath { .. }))
    ));
    assert_eq!(world.encode(), before);

    drop(fs);
    let _ = std::fs::remove_dir_all(&dir);
}
