/*!
 * Registered Resource Tables
 * Fixed-size file and buffer tables indexed by a user-chosen slot number
 */

use crate::core::errors::{RingError, RingResult};
use parking_lot::RwLock;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Characters escaped when printing a registered file's path
/// [LINUX-COMPAT] seq_file_path(m, f, " \t\n\\")
pub const PATH_ESCAPE_CHARS: &str = " \t\n\\";

/// Escape a path for line-oriented output
///
/// Characters in `esc` and any other control character become a
/// backslash followed by three octal digits, like the kernel's
/// `mangle_path`. Multi-byte characters pass through unchanged.
pub fn mangle_path(path: &str, esc: &str) -> String {
    let mut out = String::with_capacity(path.len());
    for c in path.chars() {
        if esc.contains(c) || c.is_ascii_control() {
            out.push_str(&format!("\\{:03o}", c as u32));
        } else {
            out.push(c);
        }
    }
    out
}

/// File installed in the registered file table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisteredFile {
    path: PathBuf,
}

impl RegisteredFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Path resolved for display, with separators and control chars escaped
    pub fn display_path(&self) -> String {
        mangle_path(&self.path.to_string_lossy(), PATH_ESCAPE_CHARS)
    }
}

/// Pinned user buffer (`io_mapped_ubuf`)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MappedBuf {
    pub ubuf: u64,
    pub len: u32,
}

/// Fixed-size slot table; a slot may be empty
pub struct SlotTable<T> {
    name: &'static str,
    slots: RwLock<Vec<Option<T>>>,
}

impl<T: Clone> SlotTable<T> {
    pub fn new(name: &'static str, nr: u32) -> Self {
        Self {
            name,
            slots: RwLock::new(vec![None; nr as usize]),
        }
    }

    /// Number of slots, occupied or not
    pub fn len(&self) -> u32 {
        self.slots.read().len() as u32
    }

    pub fn is_empty(&self) -> bool {
        self.slots.read().is_empty()
    }

    /// Number of occupied slots
    pub fn occupied(&self) -> u32 {
        self.slots.read().iter().filter(|s| s.is_some()).count() as u32
    }

    /// Install a value, replacing any previous one
    pub fn set(&self, index: u32, value: T) -> RingResult<Option<T>> {
        let mut slots = self.slots.write();
        let len = slots.len() as u32;
        let slot = slots
            .get_mut(index as usize)
            .ok_or_else(|| RingError::SlotOutOfRange {
                table: self.name.to_string(),
                index,
                len,
            })?;
        Ok(slot.replace(value))
    }

    /// Empty a slot
    pub fn clear(&self, index: u32) -> Option<T> {
        self.slots.write().get_mut(index as usize)?.take()
    }

    pub fn get(&self, index: u32) -> Option<T> {
        self.slots.read().get(index as usize)?.clone()
    }

    /// Visit every slot in index order; stops on the first error
    pub fn try_for_each<E, F>(&self, mut f: F) -> Result<(), E>
    where
        F: FnMut(u32, Option<&T>) -> Result<(), E>,
    {
        for (i, slot) in self.slots.read().iter().enumerate() {
            f(i as u32, slot.as_ref())?;
        }
        Ok(())
    }
}

impl<T> std::fmt::Debug for SlotTable<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SlotTable")
            .field("name", &self.name)
            .field("len", &self.slots.read().len())
            .finish()
    }
}

/// Registered file table
pub type FileTable = SlotTable<Arc<RegisteredFile>>;

/// Registered buffer table
pub type BufTable = SlotTable<MappedBuf>;
