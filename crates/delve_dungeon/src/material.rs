//! Material Registry - one deduplicated table per build
//!
//! Materials are identified by their full description (texture, shader,
//! flags, tint). The first time a description is seen it receives the next
//! index; every later registration of an equal description returns that
//! same index. Indices are never reassigned.

use std::collections::HashMap;

use crate::definition::MaterialDesc;

/// Maximum materials per build.
pub const MAX_MATERIALS: usize = u16::MAX as usize + 1;

/// Registry index of a material (16-bit).
#[repr(transparent)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MaterialId(pub u16);

impl MaterialId {
    /// Creates a new material ID.
    #[inline]
    #[must_use]
    pub const fn new(id: u16) -> Self {
        Self(id)
    }

    /// Returns the raw ID.
    #[inline]
    #[must_use]
    pub const fn raw(self) -> u16 {
        self.0
    }

    /// Index into the material table.
    #[inline]
    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

/// Per-build material table.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MaterialRegistry {
    /// Consumes the registry, yielding the table in index order.
    #[must_use]
    pub fn into_materials(self) -> Vec<MaterialDesc> {
        self.materials
    }
}
