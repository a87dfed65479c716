//! Integration tests for the build pipeline: primitives, corridors, portals,
//! materials and configuration failures.

use delve_dungeon::{
    BuildConfig, ConfigurationError, DungeonBuilder, DungeonDefinition, DungeonError,
    DungeonWriter, MaterialDesc, MaterialRegistry, MaterialZone, RoomDefinition, Shape,
};
use delve_shared::Vec3;

fn every_shape() -> DungeonDefinition {
    DungeonDefinition::new("Menagerie", 7)
        .with_room(
            RoomDefinition::new("box", Shape::Box { width: 30.0, length: 40.0, height: 10.0 }, Vec3::ZERO)
                .connect("drum"),
        )
        .with_room(
            RoomDefinition::new(
                "drum",
                Shape::Circular { radius: 25.0, height: 15.0, segments: 16 },
                Vec3::new(0.0, 110.0, 0.0),
            )
            .connect("hex"),
        )
        .with_room(
            RoomDefinition::new(
                "hex",
                Shape::Chamber { radius: 20.0, height: 12.0, sides: 6 },
                Vec3::new(100.0, 110.0, 0.0),
            )
            .connect("stairs"),
        )
        .with_room(RoomDefinition::new(
            "stairs",
            Shape::SpiralRamp { radius: 15.0, height: 30.0, turns: 2.0, segments: 12 },
            Vec3::new(100.0, 220.0, 0.0),
        ))
        .with_room(RoomDefinition::new(
            "hallway",
            Shape::Corridor { width: 6.0, length: 50.0, height: 6.0 },
            Vec3::new(-120.0, 0.0, 0.0),
        ))
}

#[test]
fn test_scenario_a_box_room() {
    let def = DungeonDefinition::new("Cell", 1).with_room(RoomDefinition::new(
        "cell",
        Shape::Box { width: 30.0, length: 40.0, height: 10.0 },
        Vec3::ZERO,
    ));
    let output = DungeonBuilder::default().build(&def).unwrap();
    let mesh = &output.assembly.rooms[0].mesh;

    assert_eq!(mesh.vertex_count(), 8);
    assert_eq!(mesh.triangle_count(), 12);
    assert_eq!(mesh.zone_count(MaterialZone::Floor), 2);
    assert!((mesh.zone_area(MaterialZone::Floor) - 1200.0).abs() < 1e-2);
    assert!(mesh.is_closed_manifold());
    assert!(mesh.is_inward_wound());
}

#[test]
fn test_scenario_b_corridor_and_portals() {
    let def = DungeonDefinition::new("Pair", 2)
        .with_room(
            RoomDefinition::new("A", Shape::Box { width: 30.0, length: 40.0, height: 10.0 }, Vec3::ZERO)
                .connect("B"),
        )
        .with_room(RoomDefinition::new(
            "B",
            Shape::Circular { radius: 25.0, height: 15.0, segments: 16 },
            Vec3::new(0.0, 110.0, 0.0),
        ));
    let assembly = DungeonBuilder::default().build(&def).unwrap().assembly;

    assert_eq!(assembly.rooms.len(), 3);
    let corridor = &assembly.rooms[2];
    assert!(corridor.is_corridor);
    // 110 - 20 (box half length) - 25 (cylinder radius)
    let length = corridor.bounds.extents().y;
    assert!((length - 65.0).abs() < 1e-3, "corridor length {length}");

    let pairs: Vec<_> = assembly.portals.iter().map(|p| p.rooms).collect();
    assert_eq!(pairs, [[0, 2], [2, 1]]);
    for portal in &assembly.portals {
        assert_eq!(portal.vertices.len(), 4);
        assert!(portal.polygon_normal().approx_eq(portal.plane.normal, 1e-4));
    }
}

#[test]
fn test_scenario_c_circular_room() {
    let def = DungeonDefinition::new("Drum", 3).with_room(RoomDefinition::new(
        "drum",
        Shape::Circular { radius: 25.0, height: 15.0, segments: 16 },
        Vec3::ZERO,
    ));
    let mesh = &DungeonBuilder::default().build(&def).unwrap().assembly.rooms[0].mesh;

    assert_eq!(mesh.triangle_count(), 64);
    assert!(mesh.is_inward_wound());
    assert!(mesh.is_closed_manifold());
}

#[test]
fn test_every_room_is_closed_with_a_floor() {
    let assembly = DungeonBuilder::default().build(&every_shape()).unwrap().assembly;

    // 5 declared rooms + 3 corridors
    assert_eq!(assembly.rooms.len(), 8);
    for room in &assembly.rooms {
        assert!(room.mesh.is_closed_manifold(), "room '{}' is not closed", room.id);
        assert!(room.mesh.is_inward_wound(), "room '{}' faces outward", room.id);
        assert!(room.mesh.zone_area(MaterialZone::Floor) > 0.0, "room '{}' has no floor", room.id);
        assert!(room.collision.tree.leaf_count() >= 1);
    }
}

#[test]
fn test_portals_lie_within_both_rooms_across_floor_heights() {
    let def = DungeonDefinition::new("Terraces", 8)
        .with_room(
            RoomDefinition::new("gate", Shape::Box { width: 30.0, length: 30.0, height: 10.0 }, Vec3::ZERO)
                .connect("hall"),
        )
        .with_room(
            RoomDefinition::new(
                "hall",
                Shape::Chamber { radius: 20.0, height: 12.0, sides: 8 },
                Vec3::new(0.0, 100.0, 12.0),
            )
            .connect("well"),
        )
        .with_room(RoomDefinition::new(
            "well",
            Shape::SpiralRamp { radius: 15.0, height: 30.0, turns: 2.0, segments: 12 },
            Vec3::new(100.0, 100.0, -6.0),
        ));
    let output = DungeonBuilder::default().build(&def).unwrap();
    let assembly = &output.assembly;

    assert_eq!(assembly.portals.len(), 4);
    for portal in &assembly.portals {
        for &index in &portal.rooms {
            let room = &assembly.rooms[index];
            for v in &portal.vertices {
                assert!(
                    v.z >= room.bounds.min.z - 1e-3 && v.z <= room.bounds.max.z + 1e-3,
                    "portal {:?} vertex z {} outside room '{}' ({}..{})",
                    portal.rooms,
                    v.z,
                    room.id,
                    room.bounds.min.z,
                    room.bounds.max.z
                );
            }
        }
    }
    // Openings sit on each room's floor
    assert!(assembly.portals[1].vertices.iter().map(|v| v.z).fold(f32::INFINITY, f32::min) == 12.0);
    assert!(assembly.portals[3].vertices.iter().map(|v| v.z).fold(f32::INFINITY, f32::min) == -6.0);
    for room in &assembly.rooms {
        assert!(room.mesh.is_closed_manifold(), "room '{}' is not closed", room.id);
        assert!(room.mesh.is_inward_wound(), "room '{}' faces outward", room.id);
    }
}

#[test]
fn test_material_indices_in_range() {
    let assembly = DungeonBuilder::default().build(&every_shape()).unwrap().assembly;

    // Default zone materials are shared by every room
    assert_eq!(assembly.materials.len(), 3);
    for room in &assembly.rooms {
        assert!(room.mesh.materials.iter().all(|m| m.index() < assembly.materials.len()));
    }
    assembly.validate().unwrap();
}

#[test]
fn test_registry_idempotence() {
    let mut registry = MaterialRegistry::new();
    let stone = MaterialDesc::textured("dungeon/stone");
    let moss = MaterialDesc::textured("dungeon/moss");

    let first = registry.register(&stone).unwrap();
    let second = registry.register(&moss).unwrap();
    assert_eq!(registry.register(&stone), Some(first));
    assert_eq!(registry.register(&moss), Some(second));
    assert_eq!(registry.len(), 2);
}

#[test]
fn test_unknown_target_writes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let def = DungeonDefinition::new("Broken", 4).with_room(
        RoomDefinition::new("a", Shape::Box { width: 10.0, length: 10.0, height: 5.0 }, Vec3::ZERO)
            .connect("nowhere"),
    );

    let err = DungeonBuilder::default()
        .build(&def)
        .and_then(|output| DungeonWriter::default().write(&output.assembly, dir.path()))
        .unwrap_err();
    assert!(matches!(
        err,
        DungeonError::Configuration(ConfigurationError::UnknownConnectionTarget { ref target, .. })
            if target == "nowhere"
    ));
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
}

#[test]
fn test_invalid_shape_rejected() {
    let def = DungeonDefinition::new("Bad", 5).with_room(RoomDefinition::new(
        "tri",
        Shape::Chamber { radius: 10.0, height: 5.0, sides: 13 },
        Vec3::ZERO,
    ));
    let err = DungeonBuilder::default().build(&def).unwrap_err();
    assert!(matches!(
        err,
        DungeonError::Configuration(ConfigurationError::InvalidShape { ref room, ref reason })
            if room == "tri" && reason.starts_with("chamber sides")
    ));
}

#[test]
fn test_invalid_config_rejected() {
    let config = BuildConfig {
        bsp_leaf_faces: 0,
        ..BuildConfig::default()
    };
    let err = DungeonBuilder::new(config).build(&every_shape()).unwrap_err();
    assert!(matches!(err, DungeonError::Configuration(ConfigurationError::InvalidConfig(_))));
}

#[test]
fn test_concurrent_builds_are_identical() {
    let def = every_shape();
    let handles: Vec<_> = (0..4)
        .map(|_| {
            let def = def.clone();
            std::thread::spawn(move || DungeonBuilder::default().build(&def).unwrap().assembly)
        })
        .collect();
    let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    for other in &results[1..] {
        assert_eq!(&results[0], other);
    }
}
