//! Round-trip reader: parses a root file and its groups back into a
//! [`DungeonAssembly`] of raw-mesh rooms.
//!
//! Structural problems in a required chunk abort the read with a
//! [`DungeonError::Parse`]. Problems the data can survive (unknown chunks,
//! non-manifold rooms, material ids past the table) are returned as
//! diagnostics next to the assembly.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use super::chunk::{parse_error, split_chunks, tag_name, Chunk, PayloadReader, Tag};
use super::strings::string_at;
use super::{
    group_file_name, record, BSP_NODE_LEAF, BSP_NODE_SPLIT, GROUP_CHUNKS, GROUP_FLAG_BOSS,
    GROUP_FLAG_CORRIDOR, MCVI, MCVT, MODD, MOBA, MOBN, MOBR, MOGI, MOGP, MOHD, MOLT, MOMT, MONR,
    MOPT, MOPV, MOPY, MOTV, MOTX, MOVI, MOVT, MVER, ROOT_CHUNKS,
};
use crate::assembly::{DungeonAssembly, Room, RoomSource};
use crate::bsp::{BspTree, CollisionData, CollisionMesh, CollisionNode};
use crate::definition::{BossMarker, InstanceCategory, LightKind, MaterialDesc, ShaderMode};
use crate::error::{Diagnostic, DungeonError, DungeonResult};
use crate::lighting::{ResolvedDoodad, ResolvedLight};
use crate::material::MaterialId;
use crate::mesh::{MaterialZone, Mesh};
use crate::portal::Portal;
use delve_shared::{Aabb, FORMAT_VERSION};

/// Assembly loaded from disk plus recovered problems.
#[derive(Clone, Debug)]
pub struct ReadOutput {
    /// Loaded dungeon; every room is [`RoomSource::RawMesh`].
    pub assembly: DungeonAssembly,
    /// Unknown chunks, non-manifold rooms and out-of-range materials.
    pub diagnostics: Vec<Diagnostic>,
}

/// Reads the root file at `root_path` and every group it lists.
///
/// Group files are looked up next to the root as `<stem>_<NNN>.<ext>`,
/// using the root file's own stem and extension.
///
/// # Errors
///
/// - [`DungeonError::Io`] if a file cannot be read
/// - [`DungeonError::Parse`] if a required chunk is missing, truncated or
///   inconsistent with the header
pub fn read(root_path: impl AsRef<Path>) -> DungeonResult<ReadOutput> {
    let root_path = root_path.as_ref();
    let mut diagnostics = Vec::new();

    let data = read_file(root_path)?;
    let root = ChunkSet::parse(root_path, &data, &ROOT_CHUNKS, &mut diagnostics)?;
    let header = root.parse_root()?;

    let stem = root_path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let extension = root_path
        .extension()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let dir = root_path.parent().unwrap_or_else(|| Path::new(""));

    let mut rooms = Vec::with_capacity(header.groups.len());
    for (index, info) in header.groups.into_iter().enumerate() {
        let group_path = dir.join(group_file_name(&stem, index, &extension));
        let data = read_file(&group_path)?;
        let group = ChunkSet::parse(&group_path, &data, &GROUP_CHUNKS, &mut diagnostics)?;
        let room = group.parse_group(index, info, header.materials.len(), &mut diagnostics)?;
        tracing::debug!(
            "Loaded group {} '{}' ({} triangles)",
            index,
            room.id,
            room.mesh.triangle_count()
        );
        rooms.push(room);
    }

    let assembly = DungeonAssembly {
        name: header.name,
        map_id: header.map_id,
        category: header.category,
        rooms,
        portals: header.portals,
        materials: header.materials,
        lights: header.lights,
        doodads: header.doodads,
    };

    tracing::info!(
        "Read {} ({} rooms, {} triangles, {} diagnostics)",
        root_path.display(),
        assembly.rooms.len(),
        assembly.triangle_count(),
        diagnostics.len()
    );
    Ok(ReadOutput { assembly, diagnostics })
}

fn read_file(path: &Path) -> DungeonResult<Vec<u8>> {
    fs::read(path).map_err(|source| DungeonError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Per-room entry from `MOGI`.
struct GroupInfo {
    id: String,
    flags: u32,
    center: delve_shared::Vec3,
    boss: Option<BossMarker>,
}

/// Everything the root file carries.
struct RootHeader {
    name: String,
    map_id: u32,
    category: InstanceCategory,
    materials: Vec<MaterialDesc>,
    groups: Vec<GroupInfo>,
    portals: Vec<Portal>,
    lights: Vec<ResolvedLight>,
    doodads: Vec<ResolvedDoodad>,
}

/// Known chunks of one file, keyed by tag.
struct ChunkSet<'a> {
    path: PathBuf,
    chunks: HashMap<Tag, Chunk<'a>>,
}

impl<'a> ChunkSet<'a> {
    /// Splits `data`, keeps the tags in `known` and reports the rest.
    fn parse(
        path: &Path,
        data: &'a [u8],
        known: &[Tag],
        diagnostics: &mut Vec<Diagnostic>,
    ) -> DungeonResult<Self> {
        let mut chunks = HashMap::new();
        for chunk in split_chunks(path, data)? {
            if !known.contains(&chunk.tag) {
                tracing::warn!(
                    "Skipping unknown chunk {} in {}",
                    tag_name(chunk.tag),
                    path.display()
                );
                diagnostics.push(Diagnostic::RoundTripParse {
                    path: path.to_path_buf(),
                    detail: format!(
                        "skipped unknown chunk {} ({} bytes)",
                        tag_name(chunk.tag),
                        chunk.payload.len()
                    ),
                });
                continue;
            }
            if chunks.insert(chunk.tag, chunk).is_some() {
                return Err(parse_error(path, chunk.tag, "chunk appears more than once"));
            }
        }

        let set = Self {
            path: path.to_path_buf(),
            chunks,
        };
        let mut version = set.reader(MVER)?;
        if version.records(4)? != 1 {
            return Err(version.error("expected a single version field"));
        }
        let found = version.u32()?;
        if found != FORMAT_VERSION {
            return Err(version.error(format!(
                "unsupported version {found}, expected {FORMAT_VERSION}"
            )));
        }
        Ok(set)
    }

    fn reader(&self, tag: Tag) -> DungeonResult<PayloadReader<'a>> {
        self.chunks
            .get(&tag)
            .map(|&chunk| PayloadReader::new(&self.path, chunk))
            .ok_or_else(|| parse_error(&self.path, tag, "required chunk is missing"))
    }

    /// Reader over a table chunk that must hold exactly `expected` records.
    fn table(&self, tag: Tag, record_size: usize, expected: usize) -> DungeonResult<PayloadReader<'a>> {
        let reader = self.reader(tag)?;
        let found = reader.records(record_size)?;
        if found != expected {
            return Err(reader.error(format!("holds {found} records, expected {expected}")));
        }
        Ok(reader)
    }

    fn parse_root(&self) -> DungeonResult<RootHeader> {
        let strings = self.reader(MOTX)?;
        let block = self.chunks.get(&MOTX).map_or(&[][..], |c| c.payload);
        let string = |offset: u32| {
            string_at(block, offset)
                .map(str::to_string)
                .ok_or_else(|| strings.error(format!("no string at offset {offset}")))
        };

        let mut header = self.table(MOHD, record::HEADER, 1)?;
        let material_count = header.u32()? as usize;
        let room_count = header.u32()? as usize;
        let portal_count = header.u32()? as usize;
        let light_count = header.u32()? as usize;
        let doodad_count = header.u32()? as usize;
        let map_id = header.u32()?;
        let raw_category = header.u32()?;
        let category = InstanceCategory::from_u32(raw_category)
            .ok_or_else(|| header.error(format!("unknown instance category {raw_category}")))?;
        let name = string(header.u32()?)?;

        let mut momt = self.table(MOMT, record::MATERIAL, material_count)?;
        let mut materials = Vec::with_capacity(material_count);
        for _ in 0..material_count {
            let texture = string(momt.u32()?)?;
            let raw_shader = momt.u32()?;
            let shader = ShaderMode::from_u32(raw_shader)
                .ok_or_else(|| momt.error(format!("unknown shader mode {raw_shader}")))?;
            materials.push(MaterialDesc {
                texture,
                shader,
                flags: momt.u32()?,
                tint: momt.color()?,
            });
        }

        let mut mogi = self.table(MOGI, record::GROUP_INFO, room_count)?;
        let mut groups = Vec::with_capacity(room_count);
        for _ in 0..room_count {
            let id = string(mogi.u32()?)?;
            let flags = mogi.u32()?;
            let center = mogi.vec3()?;
            // Bounds are recomputed from the group file
            mogi.vec3()?;
            mogi.vec3()?;
            let entry = mogi.u32()?;
            let offset = mogi.vec3()?;
            groups.push(GroupInfo {
                id,
                flags,
                center,
                boss: (flags & GROUP_FLAG_BOSS != 0).then_some(BossMarker { entry, offset }),
            });
        }

        let mut mopv = self.reader(MOPV)?;
        let vertex_pool = (0..mopv.records(record::VEC3)?)
            .map(|_| mopv.vec3())
            .collect::<DungeonResult<Vec<_>>>()?;
        let mut mopt = self.table(MOPT, record::PORTAL, portal_count)?;
        let mut portals = Vec::with_capacity(portal_count);
        for i in 0..portal_count {
            let first = mopt.u32()? as usize;
            let count = mopt.u32()? as usize;
            let rooms = [mopt.u32()? as usize, mopt.u32()? as usize];
            let plane = mopt.plane()?;
            let vertices = first
                .checked_add(count)
                .and_then(|end| vertex_pool.get(first..end))
                .ok_or_else(|| mopt.error(format!("portal {i} vertex range is out of bounds")))?;
            if rooms.iter().any(|&r| r >= room_count) {
                return Err(mopt.error(format!("portal {i} references a missing room")));
            }
            portals.push(Portal {
                rooms,
                vertices: vertices.to_vec(),
                plane,
            });
        }

        let mut molt = self.table(MOLT, record::LIGHT, light_count)?;
        let mut lights = Vec::with_capacity(light_count);
        for i in 0..light_count {
            let room = molt.u32()? as usize;
            if room >= room_count {
                return Err(molt.error(format!("light {i} references missing room {room}")));
            }
            let raw_kind = molt.u32()?;
            let kind = LightKind::from_u32(raw_kind)
                .ok_or_else(|| molt.error(format!("unknown light kind {raw_kind}")))?;
            lights.push(ResolvedLight {
                room,
                kind,
                position: molt.vec3()?,
                color: molt.color()?,
                intensity: molt.f32()?,
                attenuation_start: molt.f32()?,
                attenuation_end: molt.f32()?,
            });
        }

        let mut modd = self.table(MODD, record::DOODAD, doodad_count)?;
        let mut doodads = Vec::with_capacity(doodad_count);
        for i in 0..doodad_count {
            let room = modd.u32()? as usize;
            if room >= room_count {
                return Err(modd.error(format!("doodad {i} references missing room {room}")));
            }
            doodads.push(ResolvedDoodad {
                room,
                model: string(modd.u32()?)?,
                position: modd.vec3()?,
                rotation: modd.quat()?,
                scale: modd.f32()?,
                tint: modd.color()?,
            });
        }

        Ok(RootHeader {
            name,
            map_id,
            category,
            materials,
            groups,
            portals,
            lights,
            doodads,
        })
    }

    fn parse_group(
        &self,
        index: usize,
        info: GroupInfo,
        material_count: usize,
        diagnostics: &mut Vec<Diagnostic>,
    ) -> DungeonResult<Room> {
        let mut mogp = self.table(MOGP, record::GROUP_HEADER, 1)?;
        let stored_index = mogp.u32()? as usize;
        if stored_index != index {
            return Err(mogp.error(format!("group index {stored_index}, expected {index}")));
        }
        let flags = mogp.u32()?;
        let bounds = Aabb::new(mogp.vec3()?, mogp.vec3()?);

        let mut movt = self.reader(MOVT)?;
        let vertex_count = movt.records(record::VEC3)?;
        let positions = (0..vertex_count)
            .map(|_| movt.vec3())
            .collect::<DungeonResult<Vec<_>>>()?;
        let mut monr = self.table(MONR, record::VEC3, vertex_count)?;
        let normals = (0..vertex_count)
            .map(|_| monr.vec3())
            .collect::<DungeonResult<Vec<_>>>()?;
        let mut motv = self.table(MOTV, record::VEC2, vertex_count)?;
        let uvs = (0..vertex_count)
            .map(|_| motv.vec2())
            .collect::<DungeonResult<Vec<_>>>()?;

        let mut movi = self.reader(MOVI)?;
        let triangle_count = movi.records(record::TRIANGLE)?;
        let triangles = read_triangles(&mut movi, triangle_count, vertex_count)?;

        let mut mopy = self.table(MOPY, 1, triangle_count)?;
        let mut zones = Vec::with_capacity(triangle_count);
        for i in 0..triangle_count {
            let raw = mopy.u8()?;
            zones.push(
                MaterialZone::from_u8(raw)
                    .ok_or_else(|| mopy.error(format!("triangle {i} has unknown zone {raw}")))?,
            );
        }

        let materials = self.read_batches(triangle_count)?;
        if let Some(bad) = materials.iter().find(|m| m.index() >= material_count) {
            diagnostics.push(Diagnostic::RoundTripParse {
                path: self.path.clone(),
                detail: format!(
                    "room '{}' references material {} but only {} are defined",
                    info.id,
                    bad.raw(),
                    material_count
                ),
            });
        }

        let mesh = Mesh {
            positions,
            normals,
            uvs,
            triangles,
            zones,
            materials,
        };
        let defects = mesh.manifold_defects();
        if defects > 0 {
            tracing::warn!("Room '{}' is not a closed manifold ({} defects)", info.id, defects);
            diagnostics.push(Diagnostic::RoundTripParse {
                path: self.path.clone(),
                detail: format!("room '{}' is not a closed manifold ({defects} edge defects)", info.id),
            });
        }

        Ok(Room {
            id: info.id,
            center: info.center,
            source: RoomSource::RawMesh,
            is_corridor: (flags | info.flags) & GROUP_FLAG_CORRIDOR != 0,
            mesh,
            collision: self.read_collision()?,
            boss: info.boss,
            bounds,
        })
    }

    /// Expands `MOBA` into one material id per triangle.
    fn read_batches(&self, triangle_count: usize) -> DungeonResult<Vec<MaterialId>> {
        let mut moba = self.reader(MOBA)?;
        let mut materials = vec![None; triangle_count];
        for b in 0..moba.records(record::BATCH)? {
            let raw = moba.u32()?;
            let first = moba.u32()? as usize;
            let count = moba.u32()? as usize;
            let id = u16::try_from(raw)
                .map(MaterialId::new)
                .map_err(|_| moba.error(format!("batch {b} material {raw} exceeds u16")))?;
            let slots = first
                .checked_add(count)
                .and_then(|end| materials.get_mut(first..end))
                .ok_or_else(|| moba.error(format!("batch {b} runs past {triangle_count} triangles")))?;
            for slot in slots {
                if slot.replace(id).is_some() {
                    return Err(moba.error(format!("batch {b} overlaps an earlier batch")));
                }
            }
        }
        materials
            .into_iter()
            .enumerate()
            .map(|(i, m)| m.ok_or_else(|| moba.error(format!("triangle {i} belongs to no batch"))))
            .collect()
    }

    fn read_collision(&self) -> DungeonResult<CollisionData> {
        let mut mcvt = self.reader(MCVT)?;
        let vertex_count = mcvt.records(record::VEC3)?;
        let positions = (0..vertex_count)
            .map(|_| mcvt.vec3())
            .collect::<DungeonResult<Vec<_>>>()?;
        let mut mcvi = self.reader(MCVI)?;
        let face_count = mcvi.records(record::TRIANGLE)?;
        let triangles = read_triangles(&mut mcvi, face_count, vertex_count)?;

        let mut mobr = self.reader(MOBR)?;
        let ref_count = mobr.records(4)?;
        let mut face_refs = Vec::with_capacity(ref_count);
        for _ in 0..ref_count {
            let face = mobr.u32()?;
            if face as usize >= face_count {
                return Err(mobr.error(format!("face {face} out of range ({face_count} faces)")));
            }
            face_refs.push(face);
        }

        let mut mobn = self.reader(MOBN)?;
        let node_count = mobn.records(record::BSP_NODE)?;
        let mut nodes = Vec::with_capacity(node_count);
        for i in 0..node_count {
            let kind = mobn.u32()?;
            let plane = mobn.plane()?;
            let a = mobn.u32()?;
            let b = mobn.u32()?;
            let node = match kind {
                BSP_NODE_SPLIT if (a as usize) < node_count && (b as usize) < node_count => {
                    CollisionNode::Split { plane, front: a, back: b }
                }
                BSP_NODE_LEAF if (a as usize).checked_add(b as usize).is_some_and(|end| end <= ref_count) => {
                    CollisionNode::Leaf { first: a, count: b }
                }
                BSP_NODE_SPLIT | BSP_NODE_LEAF => {
                    return Err(mobn.error(format!("node {i} references out of range")));
                }
                _ => return Err(mobn.error(format!("node {i} has unknown kind {kind}"))),
            };
            nodes.push(node);
        }

        Ok(CollisionData {
            mesh: CollisionMesh { positions, triangles },
            tree: BspTree { nodes, face_refs },
        })
    }
}

fn read_triangles(
    reader: &mut PayloadReader<'_>,
    count: usize,
    vertex_count: usize,
) -> DungeonResult<Vec<[u32; 3]>> {
    let mut triangles = Vec::with_capacity(count);
    for i in 0..count {
        let triangle = [reader.u32()?, reader.u32()?, reader.u32()?];
        if triangle.iter().any(|&v| v as usize >= vertex_count) {
            return Err(reader.error(format!(
                "triangle {i} indexes past {vertex_count} vertices"
            )));
        }
        triangles.push(triangle);
    }
    Ok(triangles)
}
