//! Shared string block (`MOTX`): NUL-terminated strings addressed by byte
//! offset, each distinct string stored once.

use std::collections::HashMap;

/// Builder for a string block.
#[derive(Debug, Default)]
pub struct StringTable {
    bytes: Vec<u8>,
    offsets: HashMap<String, u32>,
}

impl StringTable {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Offset of `value`, appending it on first use.
    pub fn intern(&mut self, value: &str) -> u32 {
        if let Some(&offset) = self.offsets.get(value) {
            return offset;
        }
        let offset = self.bytes.len() as u32;
        self.bytes.extend_from_slice(value.as_bytes());
        self.bytes.push(0);
        self.offsets.insert(value.to_string(), offset);
        offset
    }

    /// Block contents.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }
}

/// Reads the string starting at `offset`.
///
/// Returns None when the offset is out of range, the string is not
/// terminated, or it is not UTF-8.
#[must_use]
pub fn string_at(block: &[u8], offset: u32) -> Option<&str> {
    let tail = block.get(offset as usize..)?;
    let end = tail.iter().position(|&b| b == 0)?;
    std::str::from_utf8(&tail[..end]).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strings_are_deduplicated() {
        let mut table = StringTable::new();
        let crypt = table.intern("Crypt");
        let stone = table.intern("dungeon/stone");
        assert_eq!(table.intern("Crypt"), crypt);
        assert_eq!(table.as_bytes(), b"Crypt\0dungeon/stone\0");

        assert_eq!(string_at(table.as_bytes(), stone), Some("dungeon/stone"));
        assert_eq!(string_at(table.as_bytes(), 99), None);
        assert_eq!(string_at(b"open", 0), None);
    }
}
