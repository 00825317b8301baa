// ==============================================================================
// Cursor placement
// ==============================================================================
//
// The annotated line carries no explicit cursor marker; the completion point is
// derived from the code that precedes the comment:
//
//   `foo.`   → just after the dot   (members of `foo`)
//   `foo`    → on the final `o`     (completions that extend the identifier)
//
// Only plain spaces are skipped when looking for the last character.

/// Byte offset, relative to the start of `code`, where completion is
/// requested. `None` when `code` holds nothing but spaces.
pub fn resolve_cursor(code: &str) -> Option<usize> {
    let trimmed = code.trim_end_matches(' ');
    let last = trimmed.chars().next_back()?;
    let at = trimmed.len() - last.len_utf8();

    if last == '.' {
        Some(at + 1)
    } else {
        Some(at)
    }
}
