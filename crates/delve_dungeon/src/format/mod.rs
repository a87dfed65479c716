//! # World-Object Format
//!
//! A built dungeon is one root file plus one group file per room:
//!
//! ```text
//! <Name>.<ext>          root: materials, room index, portals, lights, doodads
//! <Name>_000.<ext>      group 0: geometry, batches, collision, BSP
//! <Name>_001.<ext>      group 1
//! ...
//! ```
//!
//! Both are flat sequences of chunks (see [`chunk`]). Chunks appear in the
//! fixed order of [`ROOT_CHUNKS`] and [`GROUP_CHUNKS`]; all numbers are
//! little-endian.
//!
//! ## Root records
//!
//! | Chunk | Record | Layout |
//! |-------|--------|--------|
//! | MVER  | 4 B    | version u32 |
//! | MOHD  | 56 B   | materials, rooms, portals, lights, doodads, map id, category, name offset (u32 each); bounds min, max |
//! | MOMT  | 16 B   | texture offset, shader, flags (u32); tint rgba |
//! | MOGI  | 60 B   | id offset, flags (u32); center; bounds min, max; boss entry u32; boss offset |
//! | MOPT  | 32 B   | first vertex, vertex count, room a, room b (u32); normal; distance f32 |
//! | MOPV  | 12 B   | vertex |
//! | MOLT  | 36 B   | room, kind (u32); position; color rgba; intensity, attenuation start, end (f32) |
//! | MODD  | 44 B   | room, model offset (u32); position; rotation xyzw; scale f32; tint rgba |
//! | MOTX  | -      | NUL-terminated strings |
//!
//! ## Group records
//!
//! | Chunk | Record | Layout |
//! |-------|--------|--------|
//! | MVER  | 4 B    | version u32 |
//! | MOGP  | 32 B   | room index, flags (u32); bounds min, max |
//! | MOVT  | 12 B   | position |
//! | MOVI  | 12 B   | triangle, grouped by material batch |
//! | MOPY  | 1 B    | zone per triangle |
//! | MONR  | 12 B   | normal |
//! | MOTV  | 8 B    | uv |
//! | MOBA  | 12 B   | material, first triangle, triangle count (u32) |
//! | MCVT  | 12 B   | collision vertex |
//! | MCVI  | 12 B   | collision triangle |
//! | MOBN  | 28 B   | kind u32; plane normal, distance; front/first, back/count (u32) |
//! | MOBR  | 4 B    | collision face index |

pub mod chunk;
pub mod reader;
pub mod strings;
pub mod writer;

use chunk::Tag;

/// Version chunk.
pub const MVER: Tag = *b"MVER";
/// Root header.
pub const MOHD: Tag = *b"MOHD";
/// Material table.
pub const MOMT: Tag = *b"MOMT";
/// Room (group) index.
pub const MOGI: Tag = *b"MOGI";
/// Portal table.
pub const MOPT: Tag = *b"MOPT";
/// Portal vertices.
pub const MOPV: Tag = *b"MOPV";
/// Lights.
pub const MOLT: Tag = *b"MOLT";
/// Doodads.
pub const MODD: Tag = *b"MODD";
/// String block.
pub const MOTX: Tag = *b"MOTX";
/// Group header.
pub const MOGP: Tag = *b"MOGP";
/// Vertex positions.
pub const MOVT: Tag = *b"MOVT";
/// Triangle indices.
pub const MOVI: Tag = *b"MOVI";
/// Per-triangle zone.
pub const MOPY: Tag = *b"MOPY";
/// Vertex normals.
pub const MONR: Tag = *b"MONR";
/// Vertex UVs.
pub const MOTV: Tag = *b"MOTV";
/// Material batches.
pub const MOBA: Tag = *b"MOBA";
/// Collision vertices.
pub const MCVT: Tag = *b"MCVT";
/// Collision triangles.
pub const MCVI: Tag = *b"MCVI";
/// BSP nodes.
pub const MOBN: Tag = *b"MOBN";
/// BSP face references.
pub const MOBR: Tag = *b"MOBR";

/// Root chunks in file order.
pub const ROOT_CHUNKS: [Tag; 9] = [MVER, MOHD, MOMT, MOGI, MOPT, MOPV, MOLT, MODD, MOTX];

/// Group chunks in file order.
pub const GROUP_CHUNKS: [Tag; 12] = [
    MVER, MOGP, MOVT, MOVI, MOPY, MONR, MOTV, MOBA, MCVT, MCVI, MOBN, MOBR,
];

/// Record sizes in bytes.
pub mod record {
    /// MOHD payload.
    pub const HEADER: usize = 56;
    /// MOMT entry.
    pub const MATERIAL: usize = 16;
    /// MOGI entry.
    pub const GROUP_INFO: usize = 60;
    /// MOPT entry.
    pub const PORTAL: usize = 32;
    /// MOLT entry.
    pub const LIGHT: usize = 36;
    /// MODD entry.
    pub const DOODAD: usize = 44;
    /// MOGP payload.
    pub const GROUP_HEADER: usize = 32;
    /// MOBA entry.
    pub const BATCH: usize = 12;
    /// MOBN entry.
    pub const BSP_NODE: usize = 28;
    /// MOVT / MONR / MOPV / MCVT entry.
    pub const VEC3: usize = 12;
    /// MOTV entry.
    pub const VEC2: usize = 8;
    /// MOVI / MCVI entry.
    pub const TRIANGLE: usize = 12;
}

/// Room flag: synthesized corridor.
pub const GROUP_FLAG_CORRIDOR: u32 = 1;
/// Room flag: carries a boss spawn marker.
pub const GROUP_FLAG_BOSS: u32 = 1 << 1;

/// BSP node kind: interior split.
pub const BSP_NODE_SPLIT: u32 = 0;
/// BSP node kind: leaf.
pub const BSP_NODE_LEAF: u32 = 1;

/// Root file name, `<name>.<ext>`.
#[must_use]
pub fn root_file_name(name: &str, extension: &str) -> String {
    format!("{name}.{extension}")
}

/// Group file name, `<name>_<NNN>.<ext>`.
#[must_use]
pub fn group_file_name(name: &str, index: usize, extension: &str) -> String {
    format!("{name}_{index:03}.{extension}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_names() {
        assert_eq!(root_file_name("Crypt", "wmo"), "Crypt.wmo");
        assert_eq!(group_file_name("Crypt", 7, "wmo"), "Crypt_007.wmo");
        assert_eq!(group_file_name("Crypt", 1234, "wmo"), "Crypt_1234.wmo");
    }
}
