//! Simulate a few ticks, save the world to disk, and load it into a fresh
//! world.
//!
//! Run with: `cargo run --example save_load`
//! Set `RUST_LOG=debug` to see registry, commit, and save/load events.

use anyhow::Context;
use bytemuck_derive::{Pod, Zeroable};
use slotworld_ecs::prelude::*;

#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
#[repr(C)]
struct Position {
    x: f32,
    y: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
#[repr(C)]
struct Velocity {
    dx: f32,
    dy: f32,
}

/// Per-session bookkeeping that is never written to disk.
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
#[repr(C)]
struct FrameCounter(u32);

struct Ids {
    position: ComponentTypeId,
    velocity: ComponentTypeId,
    frames: ComponentTypeId,
}

fn register(world: &mut World) -> anyhow::Result<Ids> {
    Ok(Ids {
        position: world.register::<Position>("position", true)?,
        velocity: world.register::<Velocity>("velocity", true)?,
        frames: world.register::<FrameCounter>("frames", false)?,
    })
}

fn movement(world: &mut World, ids: &Ids) {
    let mut cursor = world.query(ComponentMask::from(ids.position) | ids.velocity);
    while cursor.is_valid() {
        let v = cursor.get::<Velocity>(world, ids.velocity).copied();
        if let (Some(v), Some(p)) = (v, cursor.get_mut::<Position>(world, ids.position)) {
            p.x += v.dx;
            p.y += v.dy;
        }
        if let Some(frames) = cursor.get_mut::<FrameCounter>(world, ids.frames) {
            frames.0 += 1;
        }
        cursor.advance(world);
    }
}

fn print_positions(label: &str, world: &World, ids: &Ids) {
    println!("{label}:");
    for entity in world.query_iter(ComponentMask::from(ids.position)) {
        if let Some(p) = world.get::<Position>(entity, ids.position, false) {
            println!("  {entity}: ({:.1}, {:.1})", p.x, p.y);
        }
    }
}

fn main() -> Result<(), anyhow::Error> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let mut world = World::new();
    let ids = register(&mut world)?;

    let moving = ComponentMask::from(ids.position) | ids.velocity | ids.frames;
    for i in 0..4 {
        let e = world.add(moving)?;
        if let Some(v) = world.get_mut::<Velocity>(e, ids.velocity, true) {
            *v = Velocity {
                dx: 1.0 + i as f32,
                dy: 0.5,
            };
        }
    }
    let anchor = world.add(ComponentMask::from(ids.position))?;
    world.update();

    for _ in 0..3 {
        movement(&mut world, &ids);
        world.update();
    }
    world.remove(anchor, false)?;
    world.update();
    print_positions("before save", &world, &ids);

    let root = std::env::temp_dir().join(format!("slotworld-save-load-{}", std::process::id()));
    std::fs::create_dir_all(&root).with_context(|| format!("creating {}", root.display()))?;
    let fs = FileSystem::new(FsConfig {
        root: root.clone(),
        ..FsConfig::default()
    })?;
    world
        .save_with_schema(&fs, DEFAULT_SAVE_PATH)
        .context("saving world")?;
    println!(
        "saved {} bytes to {}",
        world.encoded_len(),
        root.join(DEFAULT_SAVE_PATH).display()
    );

    let mut restored = World::new();
    let restored_ids = register(&mut restored)?;
    restored
        .load_checked(&fs, DEFAULT_SAVE_PATH)
        .context("loading world")?;
    print_positions("after load", &restored, &restored_ids);

    drop(fs);
    std::fs::remove_dir_all(&root).with_context(|| format!("removing {}", root.display()))?;
    Ok(())
}
