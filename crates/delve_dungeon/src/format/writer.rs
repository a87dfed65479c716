//! Binary assembler: stages the root and group streams in memory, then
//! persists them atomically.
//!
//! Every file is written to a temp file in the target directory, synced, and
//! renamed over the final name, so readers never observe a partial file.
//! Groups are persisted first and the root last: a root on disk always
//! refers to complete groups. The directory is synced after each phase so
//! the renames themselves are durable.
//!
//! Group files left over from an earlier, larger build of the same dungeon
//! are removed once the new root is in place.

use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use byteorder::{LittleEndian, WriteBytesExt};

use super::chunk::{write_chunk, WriteFields};
use super::strings::StringTable;
use super::{
    group_file_name, record, root_file_name, BSP_NODE_LEAF, BSP_NODE_SPLIT, GROUP_FLAG_BOSS,
    GROUP_FLAG_CORRIDOR, MCVI, MCVT, MODD, MOBA, MOBN, MOBR, MOGI, MOGP, MOHD, MOLT, MOMT, MONR,
    MOPT, MOPV, MOPY, MOTV, MOTX, MOVI, MOVT, MVER,
};
use crate::assembly::{DungeonAssembly, Room};
use crate::bsp::CollisionNode;
use crate::config::BuildConfig;
use crate::error::{DungeonError, DungeonResult};
use delve_shared::{Plane, Vec3, FORMAT_VERSION};

/// Distinguishes temp files of concurrent writes within one process.
static TEMP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// In-memory images of one dungeon's files.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EncodedDungeon {
    /// Root file image.
    pub root: Vec<u8>,
    /// Group file images in room index order.
    pub groups: Vec<Vec<u8>>,
}

impl EncodedDungeon {
    /// Total bytes over all files.
    #[must_use]
    pub fn total_bytes(&self) -> usize {
        self.root.len() + self.groups.iter().map(Vec::len).sum::<usize>()
    }
}

/// Paths produced by [`DungeonWriter::write`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WrittenFiles {
    /// Root file.
    pub root: PathBuf,
    /// Group files in room index order.
    pub groups: Vec<PathBuf>,
    /// Total bytes written.
    pub bytes: u64,
}

/// Serializes assemblies to the world-object format.
#[derive(Clone, Debug)]
pub struct DungeonWriter {
    extension: String,
}

impl Default for DungeonWriter {
    fn default() -> Self {
        Self::new(delve_shared::DEFAULT_FILE_EXTENSION)
    }
}

impl DungeonWriter {
    /// Writer producing files with `extension` (without the dot).
    #[must_use]
    pub fn new(extension: impl Into<String>) -> Self {
        Self {
            extension: extension.into(),
        }
    }

    /// Writer using the configured file extension.
    #[must_use]
    pub fn from_config(config: &BuildConfig) -> Self {
        Self::new(config.file_extension.clone())
    }

    /// Path of the root file for `name` under `dir`.
    #[must_use]
    pub fn root_path(&self, dir: &Path, name: &str) -> PathBuf {
        dir.join(root_file_name(name, &self.extension))
    }

    /// Path of group `index` for `name` under `dir`.
    #[must_use]
    pub fn group_path(&self, dir: &Path, name: &str, index: usize) -> PathBuf {
        dir.join(group_file_name(name, index, &self.extension))
    }

    /// Encodes every file in memory without touching the file system.
    ///
    /// # Errors
    ///
    /// Returns [`DungeonError::InvalidAssembly`] if the assembly breaks a
    /// cross reference or exceeds a format limit.
    pub fn encode(&self, assembly: &DungeonAssembly) -> DungeonResult<EncodedDungeon> {
        assembly.validate()?;
        if assembly.name.is_empty() || assembly.name.contains(['/', '\\']) {
            return Err(DungeonError::InvalidAssembly {
                room: assembly.name.clone(),
                reason: "dungeon name cannot be used as a file name".to_string(),
            });
        }

        let limit = |room: &str, e: io::Error| DungeonError::InvalidAssembly {
            room: room.to_string(),
            reason: e.to_string(),
        };
        let root = encode_root(assembly).map_err(|e| limit(&assembly.name, e))?;
        let groups = assembly
            .rooms
            .iter()
            .enumerate()
            .map(|(i, room)| encode_group(i, room).map_err(|e| limit(&room.id, e)))
            .collect::<DungeonResult<Vec<_>>>()?;

        Ok(EncodedDungeon { root, groups })
    }

    /// Writes the root and group files under `dir`, creating it if needed.
    ///
    /// # Errors
    ///
    /// - [`DungeonError::InvalidAssembly`] before any I/O if the assembly
    ///   cannot be encoded
    /// - [`DungeonError::Serialization`] if the file system fails; the
    ///   failing file's temp file is removed and no partial file remains
    pub fn write(&self, assembly: &DungeonAssembly, dir: impl AsRef<Path>) -> DungeonResult<WrittenFiles> {
        let dir = dir.as_ref();
        let encoded = self.encode(assembly)?;

        fs::create_dir_all(dir).map_err(|source| DungeonError::Serialization {
            path: dir.to_path_buf(),
            source,
        })?;

        let mut groups = Vec::with_capacity(encoded.groups.len());
        for (i, bytes) in encoded.groups.iter().enumerate() {
            let path = self.group_path(dir, &assembly.name, i);
            persist(&path, bytes)?;
            groups.push(path);
        }
        sync_dir(dir)?;
        let root = self.root_path(dir, &assembly.name);
        persist(&root, &encoded.root)?;
        sync_dir(dir)?;
        self.remove_stale_groups(dir, &assembly.name, groups.len());

        tracing::info!(
            "Wrote {} ({} groups, {} bytes)",
            root.display(),
            groups.len(),
            encoded.total_bytes()
        );
        Ok(WrittenFiles {
            root,
            groups,
            bytes: encoded.total_bytes() as u64,
        })
    }

    /// Deletes `<name>_<NNN>.<ext>` files in `dir` with `NNN >= count`.
    ///
    /// Failures are logged and ignored; the new file set is already complete.
    fn remove_stale_groups(&self, dir: &Path, name: &str, count: usize) {
        let Ok(entries) = fs::read_dir(dir) else {
            return;
        };
        let prefix = format!("{name}_");
        let suffix = format!(".{}", self.extension);

        for entry in entries.flatten() {
            let file_name = entry.file_name();
            let Some(index) = file_name
                .to_str()
                .and_then(|n| n.strip_prefix(&prefix))
                .and_then(|n| n.strip_suffix(&suffix))
                .filter(|digits| digits.len() >= 3 && digits.bytes().all(|b| b.is_ascii_digit()))
                .and_then(|digits| digits.parse::<usize>().ok())
            else {
                continue;
            };
            if index < count {
                continue;
            }
            let path = entry.path();
            match fs::remove_file(&path) {
                Ok(()) => tracing::debug!("Removed stale group {}", path.display()),
                Err(e) => tracing::warn!("Could not remove stale group {}: {}", path.display(), e),
            }
        }
    }
}

/// Flushes directory entries so completed renames survive a crash.
fn sync_dir(dir: &Path) -> DungeonResult<()> {
    #[cfg(unix)]
    File::open(dir)
        .and_then(|d| d.sync_all())
        .map_err(|source| DungeonError::Serialization {
            path: dir.to_path_buf(),
            source,
        })?;
    #[cfg(not(unix))]
    let _ = dir;
    Ok(())
}

/// Writes `bytes` to `path` via a synced temp file and rename.
fn persist(path: &Path, bytes: &[u8]) -> DungeonResult<()> {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let temp = path.with_file_name(format!(
        ".{file_name}.{}.{}.tmp",
        std::process::id(),
        TEMP_COUNTER.fetch_add(1, Ordering::Relaxed)
    ));

    let result = write_synced(&temp, bytes).and_then(|()| fs::rename(&temp, path));
    if let Err(source) = result {
        let _ = fs::remove_file(&temp);
        tracing::warn!("Failed to write {}: {}", path.display(), source);
        return Err(DungeonError::Serialization {
            path: path.to_path_buf(),
            source,
        });
    }
    tracing::debug!("Persisted {} ({} bytes)", path.display(), bytes.len());
    Ok(())
}

fn write_synced(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let mut file = File::create(path)?;
    file.write_all(bytes)?;
    file.sync_all()
}

fn encode_root(assembly: &DungeonAssembly) -> io::Result<Vec<u8>> {
    let mut strings = StringTable::new();
    let name_offset = strings.intern(&assembly.name);

    let mut momt = Vec::with_capacity(assembly.materials.len() * record::MATERIAL);
    for material in &assembly.materials {
        momt.write_u32::<LittleEndian>(strings.intern(&material.texture))?;
        momt.write_u32::<LittleEndian>(material.shader as u32)?;
        momt.write_u32::<LittleEndian>(material.flags)?;
        momt.write_color(material.tint)?;
    }

    let mut mogi = Vec::with_capacity(assembly.rooms.len() * record::GROUP_INFO);
    for room in &assembly.rooms {
        mogi.write_u32::<LittleEndian>(strings.intern(&room.id))?;
        mogi.write_u32::<LittleEndian>(group_flags(room))?;
        mogi.write_vec3(room.center)?;
        mogi.write_vec3(room.bounds.min)?;
        mogi.write_vec3(room.bounds.max)?;
        let (entry, offset) = room.boss.map_or((0, Vec3::ZERO), |b| (b.entry, b.offset));
        mogi.write_u32::<LittleEndian>(entry)?;
        mogi.write_vec3(offset)?;
    }

    let mut mopt = Vec::with_capacity(assembly.portals.len() * record::PORTAL);
    let mut mopv = Vec::new();
    let mut first_vertex = 0usize;
    for portal in &assembly.portals {
        mopt.write_len(first_vertex)?;
        mopt.write_len(portal.vertices.len())?;
        mopt.write_len(portal.rooms[0])?;
        mopt.write_len(portal.rooms[1])?;
        mopt.write_plane(portal.plane)?;
        for &v in &portal.vertices {
            mopv.write_vec3(v)?;
        }
        first_vertex += portal.vertices.len();
    }

    let mut molt = Vec::with_capacity(assembly.lights.len() * record::LIGHT);
    for light in &assembly.lights {
        molt.write_len(light.room)?;
        molt.write_u32::<LittleEndian>(light.kind as u32)?;
        molt.write_vec3(light.position)?;
        molt.write_color(light.color)?;
        molt.write_f32::<LittleEndian>(light.intensity)?;
        molt.write_f32::<LittleEndian>(light.attenuation_start)?;
        molt.write_f32::<LittleEndian>(light.attenuation_end)?;
    }

    let mut modd = Vec::with_capacity(assembly.doodads.len() * record::DOODAD);
    for doodad in &assembly.doodads {
        modd.write_len(doodad.room)?;
        modd.write_u32::<LittleEndian>(strings.intern(&doodad.model))?;
        modd.write_vec3(doodad.position)?;
        modd.write_quat(doodad.rotation)?;
        modd.write_f32::<LittleEndian>(doodad.scale)?;
        modd.write_color(doodad.tint)?;
    }

    let bounds = assembly.bounds();
    let mut mohd = Vec::with_capacity(record::HEADER);
    mohd.write_len(assembly.materials.len())?;
    mohd.write_len(assembly.rooms.len())?;
    mohd.write_len(assembly.portals.len())?;
    mohd.write_len(assembly.lights.len())?;
    mohd.write_len(assembly.doodads.len())?;
    mohd.write_u32::<LittleEndian>(assembly.map_id)?;
    mohd.write_u32::<LittleEndian>(assembly.category as u32)?;
    mohd.write_u32::<LittleEndian>(name_offset)?;
    mohd.write_vec3(bounds.min)?;
    mohd.write_vec3(bounds.max)?;

    let mut out = Vec::new();
    write_chunk(&mut out, MVER, &FORMAT_VERSION.to_le_bytes())?;
    write_chunk(&mut out, MOHD, &mohd)?;
    write_chunk(&mut out, MOMT, &momt)?;
    write_chunk(&mut out, MOGI, &mogi)?;
    write_chunk(&mut out, MOPT, &mopt)?;
    write_chunk(&mut out, MOPV, &mopv)?;
    write_chunk(&mut out, MOLT, &molt)?;
    write_chunk(&mut out, MODD, &modd)?;
    write_chunk(&mut out, MOTX, strings.as_bytes())?;
    Ok(out)
}

fn group_flags(room: &Room) -> u32 {
    let mut flags = 0;
    if room.is_corridor {
        flags |= GROUP_FLAG_CORRIDOR;
    }
    if room.boss.is_some() {
        flags |= GROUP_FLAG_BOSS;
    }
    flags
}

fn encode_group(index: usize, room: &Room) -> io::Result<Vec<u8>> {
    let mesh = &room.mesh;

    // Triangles grouped by material; stable, so already-sorted meshes keep
    // their order
    let mut order: Vec<usize> = (0..mesh.triangle_count()).collect();
    order.sort_by_key(|&i| mesh.materials[i]);

    let mut mogp = Vec::with_capacity(record::GROUP_HEADER);
    mogp.write_len(index)?;
    mogp.write_u32::<LittleEndian>(group_flags(room))?;
    mogp.write_vec3(room.bounds.min)?;
    mogp.write_vec3(room.bounds.max)?;

    let mut movt = Vec::with_capacity(mesh.vertex_count() * record::VEC3);
    let mut monr = Vec::with_capacity(mesh.vertex_count() * record::VEC3);
    let mut motv = Vec::with_capacity(mesh.vertex_count() * record::VEC2);
    for ((&position, &normal), &uv) in mesh.positions.iter().zip(&mesh.normals).zip(&mesh.uvs) {
        movt.write_vec3(position)?;
        monr.write_vec3(normal)?;
        motv.write_vec2(uv)?;
    }

    let mut movi = Vec::with_capacity(order.len() * record::TRIANGLE);
    let mut mopy = Vec::with_capacity(order.len());
    for &i in &order {
        for v in mesh.triangles[i] {
            movi.write_u32::<LittleEndian>(v)?;
        }
        mopy.push(mesh.zones[i] as u8);
    }

    let sorted: Vec<u16> = order.iter().map(|&i| mesh.materials[i].raw()).collect();
    let mut moba = Vec::new();
    let mut start = 0;
    while start < sorted.len() {
        let material = sorted[start];
        let end = sorted[start..]
            .iter()
            .position(|&m| m != material)
            .map_or(sorted.len(), |n| start + n);
        write_batch(&mut moba, (u32::from(material), start, end - start))?;
        start = end;
    }

    let collision = &room.collision;
    let mut mcvt = Vec::with_capacity(collision.mesh.positions.len() * record::VEC3);
    for &p in &collision.mesh.positions {
        mcvt.write_vec3(p)?;
    }
    let mut mcvi = Vec::with_capacity(collision.mesh.triangles.len() * record::TRIANGLE);
    for triangle in &collision.mesh.triangles {
        for &v in triangle {
            mcvi.write_u32::<LittleEndian>(v)?;
        }
    }

    let mut mobn = Vec::with_capacity(collision.tree.nodes.len() * record::BSP_NODE);
    for node in &collision.tree.nodes {
        let (kind, plane, a, b) = match *node {
            CollisionNode::Split { plane, front, back } => (BSP_NODE_SPLIT, plane, front, back),
            CollisionNode::Leaf { first, count } => (BSP_NODE_LEAF, Plane::default(), first, count),
        };
        mobn.write_u32::<LittleEndian>(kind)?;
        mobn.write_plane(plane)?;
        mobn.write_u32::<LittleEndian>(a)?;
        mobn.write_u32::<LittleEndian>(b)?;
    }
    let mut mobr = Vec::with_capacity(collision.tree.face_refs.len() * 4);
    for &face in &collision.tree.face_refs {
        mobr.write_u32::<LittleEndian>(face)?;
    }

    let mut out = Vec::new();
    write_chunk(&mut out, MVER, &FORMAT_VERSION.to_le_bytes())?;
    write_chunk(&mut out, MOGP, &mogp)?;
    write_chunk(&mut out, MOVT, &movt)?;
    write_chunk(&mut out, MOVI, &movi)?;
    write_chunk(&mut out, MOPY, &mopy)?;
    write_chunk(&mut out, MONR, &monr)?;
    write_chunk(&mut out, MOTV, &motv)?;
    write_chunk(&mut out, MOBA, &moba)?;
    write_chunk(&mut out, MCVT, &mcvt)?;
    write_chunk(&mut out, MCVI, &mcvi)?;
    write_chunk(&mut out, MOBN, &mobn)?;
    write_chunk(&mut out, MOBR, &mobr)?;
    Ok(out)
}

fn write_batch(out: &mut Vec<u8>, (material, first, count): (u32, usize, usize)) -> io::Result<()> {
    out.write_u32::<LittleEndian>(material)?;
    out.write_len(first)?;
    out.write_len(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assembly::DungeonBuilder;
    use crate::definition::{DungeonDefinition, RoomDefinition, Shape};
    use crate::format::chunk::split_chunks;
    use crate::format::{GROUP_CHUNKS, ROOT_CHUNKS};

    fn single_room() -> DungeonAssembly {
        let def = DungeonDefinition::new("Cell", 9).with_room(RoomDefinition::new(
            "cell",
            Shape::Box { width: 30.0, length: 40.0, height: 10.0 },
            Vec3::ZERO,
        ));
        DungeonBuilder::default().build(&def).unwrap().assembly
    }

    #[test]
    fn test_chunk_order_and_sizes() {
        let encoded = DungeonWriter::default().encode(&single_room()).unwrap();

        let root = split_chunks(Path::new("Cell.wmo"), &encoded.root).unwrap();
        let tags: Vec<_> = root.iter().map(|c| c.tag).collect();
        assert_eq!(tags, ROOT_CHUNKS);
        assert_eq!(root[1].payload.len(), record::HEADER);
        assert_eq!(root[2].payload.len(), 3 * record::MATERIAL);
        assert_eq!(root[3].payload.len(), record::GROUP_INFO);

        assert_eq!(encoded.groups.len(), 1);
        let group = split_chunks(Path::new("Cell_000.wmo"), &encoded.groups[0]).unwrap();
        let tags: Vec<_> = group.iter().map(|c| c.tag).collect();
        assert_eq!(tags, GROUP_CHUNKS);
        assert_eq!(group[2].payload.len(), 8 * record::VEC3);
        assert_eq!(group[3].payload.len(), 12 * record::TRIANGLE);
        assert_eq!(group[4].payload.len(), 12);
        // Floor, wall and ceiling batches
        assert_eq!(group[7].payload.len(), 3 * record::BATCH);
    }

    #[test]
    fn test_encoding_is_deterministic() {
        let writer = DungeonWriter::default();
        let assembly = single_room();
        assert_eq!(writer.encode(&assembly).unwrap(), writer.encode(&assembly).unwrap());
    }

    #[test]
    fn test_write_leaves_no_temp_files() {
        let dir = tempfile::tempdir().unwrap();
        let written = DungeonWriter::default().write(&single_room(), dir.path()).unwrap();

        assert_eq!(written.root, dir.path().join("Cell.wmo"));
        assert_eq!(written.groups, vec![dir.path().join("Cell_000.wmo")]);
        let names: Vec<String> = fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names.len(), 2, "unexpected files: {names:?}");
    }

    #[test]
    fn test_smaller_rewrite_removes_stale_groups() {
        let dir = tempfile::tempdir().unwrap();
        let def = DungeonDefinition::new("Cell", 9)
            .with_room(
                RoomDefinition::new("cell", Shape::Box { width: 30.0, length: 40.0, height: 10.0 }, Vec3::ZERO)
                    .connect("yard"),
            )
            .with_room(RoomDefinition::new(
                "yard",
                Shape::Box { width: 20.0, length: 20.0, height: 10.0 },
                Vec3::new(0.0, 80.0, 0.0),
            ));
        let larger = DungeonBuilder::default().build(&def).unwrap().assembly;
        let writer = DungeonWriter::default();
        assert_eq!(writer.write(&larger, dir.path()).unwrap().groups.len(), 3);
        fs::write(dir.path().join("Cell_notes.wmo"), b"keep").unwrap();
        fs::write(dir.path().join("Other_002.wmo"), b"keep").unwrap();

        let written = writer.write(&single_room(), dir.path()).unwrap();
        assert_eq!(written.groups.len(), 1);
        assert!(!dir.path().join("Cell_001.wmo").exists());
        assert!(!dir.path().join("Cell_002.wmo").exists());
        assert!(dir.path().join("Cell_notes.wmo").exists());
        assert!(dir.path().join("Other_002.wmo").exists());
        assert_eq!(crate::format::reader::read(&written.root).unwrap().assembly.rooms.len(), 1);
    }

    #[test]
    fn test_out_of_range_material_rejected_before_io() {
        let mut assembly = single_room();
        assembly.materials.truncate(1);
        let dir = tempfile::tempdir().unwrap();
        let err = DungeonWriter::default().write(&assembly, dir.path()).unwrap_err();

        assert!(matches!(err, DungeonError::InvalidAssembly { .. }));
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_unwritable_directory_is_serialization_error() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("occupied");
        fs::write(&blocker, b"file, not a directory").unwrap();

        let err = DungeonWriter::default().write(&single_room(), &blocker).unwrap_err();
        assert!(matches!(err, DungeonError::Serialization { .. }));
    }
}
