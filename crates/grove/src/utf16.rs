//
// utf16.rs
//
// LSP positions count UTF-16 code units; the syntax tree counts bytes.
//

use tower_lsp::lsp_types::Position;

/// Convert a UTF-16 column offset (from LSP Position.character) to a byte
/// offset within the given line.
pub fn utf16_column_to_byte_offset(line: &str, utf16_col: u32) -> usize {
    let mut utf16_count = 0;
    for (byte_idx, ch) in line.char_indices() {
        if utf16_count >= utf16_col as usize {
            return byte_idx;
        }
        utf16_count += ch.len_utf16();
    }
    line.len()
}

/// Count UTF-16 code units in `text`.
pub fn utf16_len(text: &str) -> u32 {
    text.chars().map(|c| c.len_utf16() as u32).sum()
}

/// Byte offsets of every line start in a text.
#[derive(Debug, Clone, Default)]
pub struct LineIndex {
    line_starts: Vec<u32>,
}

impl LineIndex {
    pub fn new(text: &str) -> Self {
        let mut line_starts = vec![0];
        for (i, b) in text.bytes().enumerate() {
            if b == b'\n' {
                line_starts.push(i as u32 + 1);
            }
        }
        Self { line_starts }
    }

    pub fn line_count(&self) -> usize {
        self.line_starts.len()
    }

    /// Byte offset -> LSP position. Offsets past the end clamp to the end.
    pub fn position(&self, text: &str, offset: u32) -> Position {
        let offset = offset.min(text.len() as u32);
        let line = match self.line_starts.binary_search(&offset) {
            Ok(line) => line,
            Err(next) => next - 1,
        };
        let start = self.line_starts[line] as usize;
        let mut end = offset as usize;
        while !text.is_char_boundary(end) {
            end -= 1;
        }
        Position::new(line as u32, utf16_len(&text[start..end]))
    }

    /// LSP position -> byte offset. Lines past the end clamp to the end of
    /// the text, columns past the end of a line clamp to the line end.
    pub fn offset(&self, text: &str, position: Position) -> u32 {
        let Some(&start) = self.line_starts.get(position.line as usize) else {
            return text.len() as u32;
        };
        let end = self
            .line_starts
            .get(position.line as usize + 1)
            .map(|&next| next - 1)
            .unwrap_or(text.len() as u32);
        let line = &text[start as usize..end as usize];
        let line = line.strip_suffix('\r').unwrap_or(line);
        start + utf16_column_to_byte_offset(line, position.character) as u32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_column_conversion_ascii() {
        assert_eq!(utf16_column_to_byte_offset("hello", 3), 3);
        assert_eq!(utf16_column_to_byte_offset("hello", 10), 5);
    }

    #[test]
    fn test_column_conversion_multibyte() {
        // 'é' is 2 bytes / 1 unit, '𝔸' is 4 bytes / 2 units
        let line = "é𝔸x";
        assert_eq!(utf16_column_to_byte_offset(line, 1), 2);
        assert_eq!(utf16_column_to_byte_offset(line, 3), 6);
    }

    #[test]
    fn test_line_index_roundtrip() {
        let text = "module A\nfoo = \"é\"\nbar";
        let index = LineIndex::new(text);
        assert_eq!(index.line_count(), 3);
        let bar = text.find("bar").unwrap() as u32;
        assert_eq!(index.position(text, bar), Position::new(2, 0));
        assert_eq!(index.offset(text, Position::new(2, 0)), bar);
        let after_e = text.find("é").unwrap() as u32 + 2;
        assert_eq!(index.position(text, after_e), Position::new(1, 8));
    }

    #[test]
    fn test_offset_clamps() {
        let text = "ab\ncd";
        let index = LineIndex::new(text);
        assert_eq!(index.offset(text, Position::new(0, 99)), 2);
        assert_eq!(index.offset(text, Position::new(9, 0)), 5);
    }
}
