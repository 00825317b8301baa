// ==============================================================================
// LineIndex: byte offset <-> LSP Position conversion
// ==============================================================================
//
// Builds a line-start offset table from source text, then converts between
// byte offsets (what test cases carry) and LSP line/character positions.
// LSP characters are UTF-16 code units, so columns are counted by walking the
// line's chars rather than subtracting byte offsets.

use tower_lsp::lsp_types::Position;

/// Pre-computed line start byte offsets for fast offset <-> position conversion.
#[derive(Clone)]
pub struct LineIndex<'a> {
    text: &'a str,
    /// Byte offset of the start of each line (line 0 starts at offset 0).
    line_starts: Vec<usize>,
}

impl<'a> LineIndex<'a> {
    pub fn new(text: &'a str) -> Self {
        let mut line_starts = vec![0];
        for (i, byte) in text.bytes().enumerate() {
            if byte == b'\n' {
                line_starts.push(i + 1);
            }
        }
        LineIndex { text, line_starts }
    }

    fn line_of(&self, offset: usize) -> usize {
        match self.line_starts.binary_search(&offset) {
            Ok(line) => line,
            Err(next) => next - 1,
        }
    }

    /// Convert a byte offset to an LSP Position. Offsets past the end clamp
    /// to the end of the text; offsets inside a multi-byte char count up to
    /// the start of that char.
    pub fn position(&self, offset: usize) -> Position {
        let offset = offset.min(self.text.len());
        let line = self.line_of(offset);
        let start = self.line_starts[line];

        let character: usize = self.text[start..]
            .char_indices()
            .take_while(|(i, _)| start + i < offset)
            .map(|(_, c)| c.len_utf16())
            .sum();
        Position::new(line as u32, character as u32)
    }

    /// Convert an LSP Position to a byte offset. Characters past the end of
    /// the line clamp to the line end.
    pub fn offset(&self, pos: Position) -> usize {
        let line = pos.line as usize;
        let Some(&start) = self.line_starts.get(line) else {
            return self.text.len();
        };
        let end = self
            .line_starts
            .get(line + 1)
            .map_or(self.text.len(), |next| next - 1);

        let mut units = 0usize;
        for (i, c) in self.text[start..end].char_indices() {
            if units >= pos.character as usize {
                return start + i;
            }
            units += c.len_utf16();
        }
        end
    }
}
