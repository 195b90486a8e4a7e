//! Conversion between character offsets and UTF-8 byte offsets

/// Byte position of every character boundary in a text.
///
/// `boundaries[i]` is the byte offset of character `i`; the final entry is
/// `text.len()`, so a text of `n` chars has `n + 1` boundaries.
pub(crate) struct CharIndex {
    boundaries: Vec<usize>,
}

impl CharIndex {
    pub(crate) fn new(text: &str) -> Self {
        let mut boundaries: Vec<usize> = text.char_indices().map(|(i, _)| i).collect();
        boundaries.push(text.len());
        Self { boundaries }
    }

    /// Number of characters in the text
    pub(crate) fn len_chars(&self) -> usize {
        self.boundaries.len() - 1
    }

    /// Character offset of a byte offset that lies on a char boundary.
    pub(crate) fn char_at(&self, byte: usize) -> usize {
        match self.boundaries.binary_search(&byte) {
            Ok(i) => i,
            // Mid-character offsets round down to the containing char
            Err(i) => i.saturating_sub(1),
        }
    }

    /// Byte offset of a character offset, if it is within `[0, len_chars]`.
    pub(crate) fn byte_at(&self, ch: usize) -> Option<usize> {
        self.boundaries.get(ch).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ascii_offsets_are_identity() {
        let idx = CharIndex::new("hello");
        assert_eq!(idx.len_chars(), 5);
        assert_eq!(idx.char_at(3), 3);
        assert_eq!(idx.byte_at(5), Some(5));
        assert_eq!(idx.byte_at(6), None);
    }

    #[test]
    fn test_multibyte_offsets() {
        // 'é' is two bytes, '李' is three
        let text = "é李a";
        let idx = CharIndex::new(text);
        assert_eq!(idx.len_chars(), 3);
        assert_eq!(idx.byte_at(1), Some(2));
        assert_eq!(idx.byte_at(2), Some(5));
        assert_eq!(idx.char_at(5), 2);
        assert_eq!(idx.char_at(6), 3);
    }

    #[test]
    fn test_empty_text() {
        let idx = CharIndex::new("");
        assert_eq!(idx.len_chars(), 0);
        assert_eq!(idx.byte_at(0), Some(0));
    }
}
