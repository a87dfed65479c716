//! Integration tests for write-then-read of complete file sets.

use std::fs;

use delve_dungeon::{
    read, CoordinateExport, DoodadPlacement, DungeonBuilder, DungeonDefinition, DungeonWriter,
    LightDef, LightKind, Placement, RoomDefinition, RoomSource, Shape,
};
use delve_shared::{Color, Quaternion, Vec3};

fn three_rooms() -> DungeonDefinition {
    let mut entry = RoomDefinition::new(
        "entry",
        Shape::Box { width: 30.0, length: 40.0, height: 10.0 },
        Vec3::ZERO,
    )
    .connect("hall");
    entry.lights.push(LightDef {
        kind: LightKind::Point,
        position: Placement::Relative { offset: Vec3::new(0.0, 0.0, 8.0) },
        color: Color::rgba(255, 200, 120, 255),
        intensity: 1.5,
        attenuation_start: 2.0,
        attenuation_end: 18.0,
    });

    let mut hall = RoomDefinition::new(
        "hall",
        Shape::Circular { radius: 25.0, height: 15.0, segments: 16 },
        Vec3::new(0.0, 110.0, 0.0),
    )
    .connect("sanctum")
    .with_boss(9001, Vec3::new(0.0, 5.0, 0.0));
    hall.doodads.push(DoodadPlacement {
        model: "props/brazier".to_string(),
        position: Placement::Absolute { position: Vec3::new(3.0, 112.0, 0.0) },
        rotation: Quaternion::from_yaw(0.5),
        scale: 1.25,
        tint: Color::WHITE,
    });

    let sanctum = RoomDefinition::new(
        "sanctum",
        Shape::Chamber { radius: 20.0, height: 12.0, sides: 8 },
        Vec3::new(90.0, 110.0, 4.0),
    );

    DungeonDefinition::new("Crypt", 4201)
        .with_room(entry)
        .with_room(hall)
        .with_room(sanctum)
}

#[test]
fn test_scenario_d_write_then_read_preserves_geometry() {
    let dir = tempfile::tempdir().unwrap();
    let built = DungeonBuilder::default().build(&three_rooms()).unwrap().assembly;
    let written = DungeonWriter::default().write(&built, dir.path()).unwrap();
    assert_eq!(written.groups.len(), 5);

    let output = read(&written.root).unwrap();
    assert!(output.diagnostics.is_empty(), "{:?}", output.diagnostics);
    let loaded = output.assembly;

    assert_eq!(loaded.triangle_count(), built.triangle_count());
    for (a, b) in built.rooms.iter().zip(&loaded.rooms) {
        assert_eq!(a.id, b.id);
        assert_eq!(b.source, RoomSource::RawMesh);
        assert_eq!(a.mesh, b.mesh, "room '{}' mesh differs", a.id);
        assert_eq!(a.collision, b.collision);
        assert_eq!(a.boss, b.boss);
        assert_eq!(a.is_corridor, b.is_corridor);
    }
    assert_eq!(loaded.portals, built.portals);
    assert_eq!(loaded.materials, built.materials);
    assert_eq!(loaded.lights, built.lights);
    assert_eq!(loaded.doodads, built.doodads);
}

#[test]
fn test_coordinate_export_survives_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let built = DungeonBuilder::default().build(&three_rooms()).unwrap().assembly;
    let written = DungeonWriter::default().write(&built, dir.path()).unwrap();
    let loaded = read(&written.root).unwrap().assembly;

    let before = CoordinateExport::from_assembly(&built);
    let after = CoordinateExport::from_assembly(&loaded);
    assert!(before.approx_eq(&after, 1e-4));

    let spawn = after.room("hall").unwrap().boss_spawn.unwrap();
    assert_eq!(spawn.entry, 9001);
    assert!(spawn.position.approx_eq(Vec3::new(0.0, 115.0, 0.0), 1e-4));
}

#[test]
fn test_rewriting_a_loaded_set_is_byte_identical() {
    let first = tempfile::tempdir().unwrap();
    let second = tempfile::tempdir().unwrap();
    let built = DungeonBuilder::default().build(&three_rooms()).unwrap().assembly;
    let writer = DungeonWriter::default();

    let written = writer.write(&built, first.path()).unwrap();
    let loaded = read(&written.root).unwrap().assembly;
    let rewritten = writer.write(&loaded, second.path()).unwrap();

    assert_eq!(fs::read(&written.root).unwrap(), fs::read(&rewritten.root).unwrap());
    for (a, b) in written.groups.iter().zip(&rewritten.groups) {
        assert_eq!(fs::read(a).unwrap(), fs::read(b).unwrap());
    }
}

#[test]
fn test_lights_are_resolved_to_world_space() {
    let built = DungeonBuilder::default().build(&three_rooms()).unwrap().assembly;

    assert_eq!(built.lights.len(), 1);
    assert_eq!(built.lights[0].room, 0);
    assert_eq!(built.lights[0].position, Vec3::new(0.0, 0.0, 8.0));
    assert_eq!(built.doodads[0].room, 1);
    assert_eq!(built.doodads[0].position, Vec3::new(3.0, 112.0, 0.0));
}

#[test]
fn test_custom_extension_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let built = DungeonBuilder::default().build(&three_rooms()).unwrap().assembly;
    let written = DungeonWriter::new("dat").write(&built, dir.path()).unwrap();

    assert_eq!(written.root, dir.path().join("Crypt.dat"));
    assert_eq!(written.groups[4], dir.path().join("Crypt_004.dat"));
    assert_eq!(read(&written.root).unwrap().assembly.rooms.len(), 5);
}
