//! Chunk framing and little-endian field codecs.
//!
//! ```text
//! Chunk:
//! ├── Tag (4 bytes) - ASCII, e.g. "MVER"
//! ├── Size (4 bytes) - payload length, little-endian u32
//! └── Payload (Size bytes)
//! ```

use std::io::{self, Cursor, Read, Write};
use std::path::{Path, PathBuf};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

use crate::error::{DungeonError, DungeonResult};
use delve_shared::{Color, Plane, Quaternion, Vec2, Vec3};

/// Four-character chunk tag.
pub type Tag = [u8; 4];

/// Bytes of tag plus size field.
pub const CHUNK_HEADER_SIZE: usize = 8;

/// Human-readable tag for errors and diagnostics.
#[must_use]
pub fn tag_name(tag: Tag) -> String {
    String::from_utf8_lossy(&tag).into_owned()
}

/// Appends one framed chunk to `out`.
///
/// # Errors
///
/// Fails if the payload does not fit a u32 length.
pub fn write_chunk(out: &mut Vec<u8>, tag: Tag, payload: &[u8]) -> io::Result<()> {
    let size = u32::try_from(payload.len()).map_err(|_| {
        io::Error::new(
            io::ErrorKind::InvalidData,
            format!("chunk {} exceeds 4 GiB", tag_name(tag)),
        )
    })?;
    out.reserve(CHUNK_HEADER_SIZE + payload.len());
    out.write_all(&tag)?;
    out.write_u32::<LittleEndian>(size)?;
    out.write_all(payload)
}

/// Field writers for chunk payloads.
pub trait WriteFields: Write {
    /// Writes a count or index that must fit a u32.
    fn write_len(&mut self, value: usize) -> io::Result<()> {
        let value = u32::try_from(value)
            .map_err(|_| io::Error::new(io::ErrorKind::InvalidData, "count exceeds u32"))?;
        self.write_u32::<LittleEndian>(value)
    }

    /// Writes `x y z` as f32.
    fn write_vec3(&mut self, v: Vec3) -> io::Result<()> {
        for c in v.to_array() {
            self.write_f32::<LittleEndian>(c)?;
        }
        Ok(())
    }

    /// Writes `x y` as f32.
    fn write_vec2(&mut self, v: Vec2) -> io::Result<()> {
        self.write_f32::<LittleEndian>(v.x)?;
        self.write_f32::<LittleEndian>(v.y)
    }

    /// Writes `x y z w` as f32.
    fn write_quat(&mut self, q: Quaternion) -> io::Result<()> {
        for c in q.to_array() {
            self.write_f32::<LittleEndian>(c)?;
        }
        Ok(())
    }

    /// Writes normal then distance.
    fn write_plane(&mut self, plane: Plane) -> io::Result<()> {
        self.write_vec3(plane.normal)?;
        self.write_f32::<LittleEndian>(plane.distance)
    }

    /// Writes `r g b a` bytes.
    fn write_color(&mut self, color: Color) -> io::Result<()> {
        self.write_all(&color.to_bytes())
    }
}

impl<W: Write + ?Sized> WriteFields for W {}

/// Borrowed view of one chunk.
#[derive(Clone, Copy, Debug)]
pub struct Chunk<'a> {
    /// Chunk tag.
    pub tag: Tag,
    /// Payload bytes.
    pub payload: &'a [u8],
}

/// Splits a file image into chunks.
///
/// # Errors
///
/// Returns [`DungeonError::Parse`] when a header or payload runs past the
/// end of the data.
pub fn split_chunks<'a>(path: &Path, data: &'a [u8]) -> DungeonResult<Vec<Chunk<'a>>> {
    let mut chunks = Vec::new();
    let mut rest = data;
    while !rest.is_empty() {
        if rest.len() < CHUNK_HEADER_SIZE {
            return Err(parse_error(path, *b"????", format!(
                "{} trailing bytes are too short for a chunk header",
                rest.len()
            )));
        }
        let mut tag = [0u8; 4];
        tag.copy_from_slice(&rest[..4]);
        let size = u32::from_le_bytes([rest[4], rest[5], rest[6], rest[7]]) as usize;
        let body = &rest[CHUNK_HEADER_SIZE..];
        if body.len() < size {
            return Err(parse_error(path, tag, format!(
                "truncated: declares {size} bytes, {} available",
                body.len()
            )));
        }
        chunks.push(Chunk { tag, payload: &body[..size] });
        rest = &body[size..];
    }
    Ok(chunks)
}

/// Builds a [`DungeonError::Parse`].
pub fn parse_error(path: &Path, tag: Tag, reason: impl Into<String>) -> DungeonError {
    DungeonError::Parse {
        path: path.to_path_buf(),
        chunk: tag_name(tag),
        reason: reason.into(),
    }
}

/// Cursor over a chunk payload whose reads fail with chunk context.
pub struct PayloadReader<'a> {
    cursor: Cursor<&'a [u8]>,
    tag: Tag,
    path: PathBuf,
}

impl<'a> PayloadReader<'a> {
    /// Starts reading `chunk`, which came from `path`.
    #[must_use]
    pub fn new(path: &Path, chunk: Chunk<'a>) -> Self {
        Self {
            cursor: Cursor::new(chunk.payload),
            tag: chunk.tag,
            path: path.to_path_buf(),
        }
    }

    /// Fails unless the payload length is a multiple of `record_size`;
    /// returns the record count.
    ///
    /// # Errors
    ///
    /// Returns [`DungeonError::Parse`] for a ragged payload.
    pub fn records(&self, record_size: usize) -> DungeonResult<usize> {
        let len = self.cursor.get_ref().len();
        if len % record_size == 0 {
            Ok(len / record_size)
        } else {
            Err(self.error(format!("{len} bytes is not a multiple of {record_size}-byte records")))
        }
    }

    /// Builds a parse error for this chunk.
    #[must_use]
    pub fn error(&self, reason: impl Into<String>) -> DungeonError {
        parse_error(&self.path, self.tag, reason)
    }

    fn truncated(&self, e: &io::Error) -> DungeonError {
        self.error(format!("truncated at byte {}: {e}", self.cursor.position()))
    }

    /// Reads a u8.
    ///
    /// # Errors
    ///
    /// Returns [`DungeonError::Parse`] past the end of the payload.
    pub fn u8(&mut self) -> DungeonResult<u8> {
        self.cursor.read_u8().map_err(|e| self.truncated(&e))
    }

    /// Reads a little-endian u32.
    ///
    /// # Errors
    ///
    /// Returns [`DungeonError::Parse`] past the end of the payload.
    pub fn u32(&mut self) -> DungeonResult<u32> {
        self.cursor.read_u32::<LittleEndian>().map_err(|e| self.truncated(&e))
    }

    /// Reads a little-endian f32.
    ///
    /// # Errors
    ///
    /// Returns [`DungeonError::Parse`] past the end of the payload.
    pub fn f32(&mut self) -> DungeonResult<f32> {
        self.cursor.read_f32::<LittleEndian>().map_err(|e| self.truncated(&e))
    }

    /// Reads `x y z`.
    ///
    /// # Errors
    ///
    /// Returns [`DungeonError::Parse`] past the end of the payload.
    pub fn vec3(&mut self) -> DungeonResult<Vec3> {
        Ok(Vec3::new(self.f32()?, self.f32()?, self.f32()?))
    }

    /// Reads `x y`.
    ///
    /// # Errors
    ///
    /// Returns [`DungeonError::Parse`] past the end of the payload.
    pub fn vec2(&mut self) -> DungeonResult<Vec2> {
        Ok(Vec2::new(self.f32()?, self.f32()?))
    }

    /// Reads `x y z w`.
    ///
    /// # Errors
    ///
    /// Returns [`DungeonError::Parse`] past the end of the payload.
    pub fn quat(&mut self) -> DungeonResult<Quaternion> {
        Ok(Quaternion::new(self.f32()?, self.f32()?, self.f32()?, self.f32()?))
    }

    /// Reads normal then distance.
    ///
    /// # Errors
    ///
    /// Returns [`DungeonError::Parse`] past the end of the payload.
    pub fn plane(&mut self) -> DungeonResult<Plane> {
        Ok(Plane::new(self.vec3()?, self.f32()?))
    }

    /// Reads `r g b a`.
    ///
    /// # Errors
    ///
    /// Returns [`DungeonError::Parse`] past the end of the payload.
    pub fn color(&mut self) -> DungeonResult<Color> {
        let mut bytes = [0u8; 4];
        self.cursor.read_exact(&mut bytes).map_err(|e| self.truncated(&e))?;
        Ok(Color::from_bytes(bytes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chunk_framing() {
        let mut out = Vec::new();
        write_chunk(&mut out, *b"MVER", &1u32.to_le_bytes()).unwrap();
        write_chunk(&mut out, *b"MOTX", b"a\0").unwrap();
        assert_eq!(&out[..8], b"MVER\x04\x00\x00\x00");

        let chunks = split_chunks(Path::new("t"), &out).unwrap();
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[1].tag, *b"MOTX");
        assert_eq!(chunks[1].payload, b"a\0");
    }

    #[test]
    fn test_truncated_payload_is_parse_error() {
        let mut out = Vec::new();
        write_chunk(&mut out, *b"MOVT", &[0u8; 12]).unwrap();
        out.truncate(out.len() - 1);
        let err = split_chunks(Path::new("group.wmo"), &out).unwrap_err();
        assert!(matches!(err, DungeonError::Parse { ref chunk, .. } if chunk == "MOVT"));
    }

    #[test]
    fn test_payload_reader_reports_chunk() {
        let mut payload = Vec::new();
        payload.write_vec3(Vec3::new(1.0, 2.0, 3.0)).unwrap();
        let chunk = Chunk { tag: *b"MOVT", payload: &payload };
        let mut reader = PayloadReader::new(Path::new("g"), chunk);

        assert_eq!(reader.records(12).unwrap(), 1);
        assert_eq!(reader.vec3().unwrap(), Vec3::new(1.0, 2.0, 3.0));
        assert!(matches!(reader.u32(), Err(DungeonError::Parse { .. })));
        assert!(reader.records(5).is_err());
    }
}
