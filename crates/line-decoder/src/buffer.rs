//! Bounded Input Buffer

use crate::TERMINATOR;

/// Normalize an incoming byte before storage
///
/// Only plain ASCII `a..=z` is folded; every other byte passes through.
pub fn normalize(byte: u8) -> u8 {
    byte.to_ascii_uppercase()
}

/// Fixed-capacity byte buffer with an insertion cursor
///
/// Bytes in `[0, cursor)` are valid input; everything past the cursor is
/// stale and never exposed.
pub struct InputBuffer {
    /// Pre-allocated storage
    storage: Box<[u8]>,
    /// Next free slot
    cursor: usize,
}

impl InputBuffer {
    /// Create an empty buffer with the given capacity
    pub fn new(capacity: usize) -> Self {
        Self {
            storage: vec![0u8; capacity].into_boxed_slice(),
            cursor: 0,
        }
    }

    /// Append one byte, normalized
    ///
    /// Returns `false` and stores nothing when the buffer is full.
    pub fn append(&mut self, byte: u8) -> bool {
        if self.is_full() {
            return false;
        }
        self.storage[self.cursor] = normalize(byte);
        self.cursor += 1;
        true
    }

    /// Offset of the first terminator in the valid region
    pub fn find_terminator(&self) -> Option<usize> {
        self.as_bytes()
            .windows(TERMINATOR.len())
            .position(|w| w == &TERMINATOR[..])
    }

    /// Reset to empty
    pub fn clear(&mut self) {
        self.cursor = 0;
    }

    /// Valid bytes
    pub fn as_bytes(&self) -> &[u8] {
        &self.storage[..self.cursor]
    }

    /// Valid bytes as text (lossy for non-UTF-8 input)
    pub fn as_text(&self) -> String {
        String::from_utf8_lossy(self.as_bytes()).into_owned()
    }

    /// Number of valid bytes
    pub fn len(&self) -> usize {
        self.cursor
    }

    /// Check if buffer is empty
    pub fn is_empty(&self) -> bool {
        self.cursor == 0
    }

    /// Check if buffer is full
    pub fn is_full(&self) -> bool {
        self.cursor >= self.storage.len()
    }

    /// Get the buffer capacity
    pub fn capacity(&self) -> usize {
        self.storage.len()
    }
}
